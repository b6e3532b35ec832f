//! # VASP POSCAR 格式解析器
//!
//! 解析和写出 VASP POSCAR/CONTCAR 文件。
//!
//! ## POSCAR 格式说明
//! ```text
//! Comment line (structure name)
//! 1.0                    # scaling factor (负数表示目标体积)
//! a1 a2 a3               # lattice vector a
//! b1 b2 b3               # lattice vector b
//! c1 c2 c3               # lattice vector c
//! Element1 Element2 ...  # element symbols (VASP 5+)
//! n1 n2 ...              # number of atoms per element
//! Selective dynamics     # optional
//! Direct/Cartesian       # coordinate type
//! x1 y1 z1               # atom positions
//! ...
//! ```
//!
//! ## 依赖关系
//! - 被 `workflow/`, `analysis/` 使用
//! - 使用 `models/structure.rs`

use crate::error::{Result, VaspflowError};
use crate::models::{Atom, Crystal, Lattice};
use std::fs;
use std::path::Path;

/// 解析 POSCAR/CONTCAR 文件
pub fn parse_poscar_file(path: &Path) -> Result<Crystal> {
    let content = fs::read_to_string(path).map_err(|e| VaspflowError::read(path, e))?;

    parse_poscar_content(&content, path)
}

/// 读取结构的体积，保留 6 位小数
pub fn read_volume(path: &Path) -> Result<f64> {
    let crystal = parse_poscar_file(path)?;
    Ok(round6(crystal.volume()))
}

/// 四舍五入到 6 位小数（体积比较统一使用此精度）
pub fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

/// 从字符串内容解析 POSCAR 格式
pub fn parse_poscar_content(content: &str, path: &Path) -> Result<Crystal> {
    let lines: Vec<&str> = content.lines().collect();
    let fail = |reason: String| VaspflowError::parse("poscar", path, reason);

    if lines.len() < 8 {
        return Err(fail("File too short".to_string()));
    }

    // Line 0: Comment/name
    let name = lines[0].trim().to_string();

    // Line 1: Scaling factor
    let scale: f64 = lines[1]
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| fail(format!("Invalid scaling factor '{}'", lines[1].trim())))?;

    // Lines 2-4: Lattice vectors
    let mut matrix = [[0.0; 3]; 3];
    for i in 0..3 {
        let parts: Vec<f64> = lines[2 + i]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() < 3 {
            return Err(fail(format!("Invalid lattice vector at line {}", 3 + i)));
        }
        matrix[i] = [parts[0], parts[1], parts[2]];
    }
    let raw = Lattice::from_vectors(matrix);
    let lattice = if scale < 0.0 {
        raw.scale_to_volume(-scale)?
    } else {
        let mut scaled = matrix;
        for row in scaled.iter_mut() {
            for x in row.iter_mut() {
                *x *= scale;
            }
        }
        Lattice::from_vectors(scaled)
    };

    // Line 5: Element symbols (VASP 5+) or atom counts (VASP 4)
    let line5_parts: Vec<&str> = lines[5].split_whitespace().collect();
    if line5_parts.is_empty() {
        return Err(fail("Missing species line".to_string()));
    }
    let (elements, counts, atom_line_start) = if line5_parts[0].parse::<usize>().is_ok() {
        // VASP 4 format: no element line, only counts
        let counts: Vec<usize> = line5_parts.iter().filter_map(|s| s.parse().ok()).collect();
        let elements: Vec<String> = (0..counts.len()).map(|i| format!("X{}", i + 1)).collect();
        (elements, counts, 6)
    } else {
        // VASP 5+ 的元素行可能带有 POTCAR 后缀，如 "Fe_pv/abc123"
        let elements: Vec<String> = line5_parts
            .iter()
            .map(|s| s.split(['_', '/']).next().unwrap_or(s).to_string())
            .collect();
        let counts: Vec<usize> = lines[6]
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        (elements, counts, 7)
    };

    if counts.len() != elements.len() {
        return Err(fail(format!(
            "{} element symbols but {} counts",
            elements.len(),
            counts.len()
        )));
    }

    // Check for "Selective dynamics" line
    let mut coord_line = atom_line_start;
    if lines.len() > coord_line
        && lines[coord_line]
            .trim()
            .to_lowercase()
            .starts_with('s')
    {
        coord_line += 1;
    }

    if lines.len() <= coord_line {
        return Err(fail("Missing coordinate type line".to_string()));
    }

    let coord_type = lines[coord_line].trim().to_lowercase();
    let is_cartesian = coord_type.starts_with('c') || coord_type.starts_with('k');
    let cart_scale = if scale < 0.0 { 1.0 } else { scale };

    // Parse atom positions
    let total: usize = counts.iter().sum();
    let mut atoms: Vec<Atom> = Vec::with_capacity(total);
    let mut line_idx = coord_line + 1;

    for (elem, &count) in elements.iter().zip(counts.iter()) {
        for _ in 0..count {
            let parts: Vec<f64> = lines
                .get(line_idx)
                .map(|l| {
                    l.split_whitespace()
                        .take(3)
                        .filter_map(|s| s.parse().ok())
                        .collect()
                })
                .unwrap_or_default();

            if parts.len() < 3 {
                return Err(fail(format!("Invalid atom position at line {}", line_idx + 1)));
            }

            let position = if is_cartesian {
                lattice.cart_to_frac([
                    parts[0] * cart_scale,
                    parts[1] * cart_scale,
                    parts[2] * cart_scale,
                ])
            } else {
                [parts[0], parts[1], parts[2]]
            };
            atoms.push(Atom::new(elem.clone(), position));
            line_idx += 1;
        }
    }

    Ok(Crystal::new(name, lattice, atoms))
}

/// 按原子顺序划分连续的同元素区块
///
/// 重复出现的元素（如 `Fe Se Fe`）保持为独立区块，与 POTCAR 和 MAGMOM 的顺序一致。
pub fn species_blocks(crystal: &Crystal) -> Vec<(String, usize)> {
    let mut blocks: Vec<(String, usize)> = Vec::new();
    for atom in &crystal.atoms {
        match blocks.last_mut() {
            Some((element, n)) if *element == atom.element => *n += 1,
            _ => blocks.push((atom.element.clone(), 1)),
        }
    }
    blocks
}

/// 将 Crystal 转换为 POSCAR 格式字符串
///
/// 原子按原有顺序写出。
pub fn to_poscar_string(crystal: &Crystal) -> String {
    let blocks = species_blocks(crystal);

    let mut result = String::new();

    // Line 0: Comment
    result.push_str(&format!("{}\n", crystal.name));

    // Line 1: Scale
    result.push_str("1.0\n");

    // Lines 2-4: Lattice
    for row in &crystal.lattice.matrix {
        result.push_str(&format!(
            "  {:20.16}  {:20.16}  {:20.16}\n",
            row[0], row[1], row[2]
        ));
    }

    // Line 5-6: Elements / counts
    let names: Vec<&str> = blocks.iter().map(|(e, _)| e.as_str()).collect();
    let counts: Vec<String> = blocks.iter().map(|(_, n)| n.to_string()).collect();
    result.push_str(&format!("   {}\n", names.join("   ")));
    result.push_str(&format!("   {}\n", counts.join("   ")));

    result.push_str("Direct\n");

    for atom in &crystal.atoms {
        let pos = atom.position;
        result.push_str(&format!(
            "  {:20.16}  {:20.16}  {:20.16} {}\n",
            pos[0], pos[1], pos[2], atom.element
        ));
    }

    result
}

/// 写出 POSCAR 文件
pub fn write_poscar_file(crystal: &Crystal, path: &Path) -> Result<()> {
    fs::write(path, to_poscar_string(crystal)).map_err(|e| VaspflowError::write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn parse(content: &str) -> Result<Crystal> {
        parse_poscar_content(content, Path::new("POSCAR"))
    }

    #[test]
    fn test_parse_poscar_vasp5() {
        let content = r#"NaCl
1.0
5.64 0.0 0.0
0.0 5.64 0.0
0.0 0.0 5.64
Na Cl
4 4
Direct
0.0 0.0 0.0
0.5 0.5 0.0
0.5 0.0 0.5
0.0 0.5 0.5
0.5 0.0 0.0
0.0 0.5 0.0
0.0 0.0 0.5
0.5 0.5 0.5
"#;
        let crystal = parse(content).unwrap();
        assert_eq!(crystal.name, "NaCl");
        assert_eq!(crystal.num_sites(), 8);
        assert_eq!(
            crystal.species_counts(),
            vec![("Na".to_string(), 4), ("Cl".to_string(), 4)]
        );
    }

    #[test]
    fn test_parse_poscar_with_scale() {
        let content = r#"Si
2.0
2.0 0.0 0.0
0.0 2.0 0.0
0.0 0.0 2.0
Si
2
Direct
0.0 0.0 0.0
0.5 0.5 0.5
"#;
        let crystal = parse(content).unwrap();
        assert_relative_eq!(crystal.volume(), 64.0, epsilon = 1e-9);
    }

    #[test]
    fn test_parse_poscar_negative_scale_is_volume() {
        let content = r#"Si
-27.0
1.0 0.0 0.0
0.0 1.0 0.0
0.0 0.0 1.0
Si
1
Direct
0.0 0.0 0.0
"#;
        let crystal = parse(content).unwrap();
        assert_relative_eq!(crystal.volume(), 27.0, epsilon = 1e-9);
    }

    #[test]
    fn test_parse_poscar_cartesian() {
        let content = r#"Fe
1.0
2.0 0.0 0.0
0.0 2.0 0.0
0.0 0.0 2.0
Fe
2
Cartesian
0.0 0.0 0.0
1.0 1.0 1.0
"#;
        let crystal = parse(content).unwrap();
        for x in crystal.atoms[1].position {
            assert_relative_eq!(x, 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_parse_poscar_selective_dynamics() {
        let content = r#"Fe with selective
1.0
2.87 0.0 0.0
0.0 2.87 0.0
0.0 0.0 2.87
Fe
2
Selective dynamics
Direct
0.0 0.0 0.0 T T T
0.5 0.5 0.5 F F F
"#;
        let crystal = parse(content).unwrap();
        assert_eq!(crystal.num_sites(), 2);
    }

    #[test]
    fn test_parse_poscar_truncated_positions() {
        let content = r#"Fe
1.0
2.87 0.0 0.0
0.0 2.87 0.0
0.0 0.0 2.87
Fe
3
Direct
0.0 0.0 0.0
0.5 0.5 0.5
"#;
        assert!(parse(content).is_err());
    }

    #[test]
    fn test_written_poscar_keeps_species_order() {
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 4.0]]);
        let atoms = vec![
            Atom::new("Ti", [0.0, 0.0, 0.0]),
            Atom::new("O", [0.5, 0.5, 0.0]),
            Atom::new("O", [0.5, 0.0, 0.5]),
        ];
        let crystal = Crystal::new("TiO2", lattice, atoms);

        let text = to_poscar_string(&crystal);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[5].split_whitespace().collect::<Vec<_>>(), vec!["Ti", "O"]);
        assert_eq!(lines[6].split_whitespace().collect::<Vec<_>>(), vec!["1", "2"]);

        let parsed = parse(&text).unwrap();
        assert_relative_eq!(parsed.volume(), 64.0, epsilon = 1e-9);
    }

    #[test]
    fn test_repeated_species_blocks_survive_rewrite() {
        let content = r#"FeSeFe
1.0
3.0 0.0 0.0
0.0 3.0 0.0
0.0 0.0 3.0
Fe Se Fe
1 1 1
Direct
0.0 0.0 0.0
0.5 0.5 0.5
0.25 0.25 0.25
"#;
        let mut crystal = parse(content).unwrap();
        crystal.scale_lattice(30.0).unwrap();

        let text = to_poscar_string(&crystal);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[5].split_whitespace().collect::<Vec<_>>(), vec!["Fe", "Se", "Fe"]);
        assert_eq!(lines[6].split_whitespace().collect::<Vec<_>>(), vec!["1", "1", "1"]);

        let parsed = parse(&text).unwrap();
        let elements: Vec<&str> = parsed.atoms.iter().map(|a| a.element.as_str()).collect();
        assert_eq!(elements, vec!["Fe", "Se", "Fe"]);
        assert_relative_eq!(parsed.atoms[1].position[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(parsed.atoms[2].position[2], 0.25, epsilon = 1e-12);
        assert_relative_eq!(parsed.volume(), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_round6() {
        assert_eq!(round6(333.0000004), 333.0);
        assert_eq!(round6(12.3456789), 12.345679);
    }
}
