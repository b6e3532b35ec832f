//! # 磁性分析
//!
//! - 磁有序类型判定
//! - 输出磁矩相对输入 MAGMOM 的显著变化
//! - 带磁矩的结构以及构型之间的磁有序等价性
//!
//! 等价性判定不做对称性分析：按元素统计向上/向下/零磁矩的离子数，
//! 并对全局自旋翻转取规范形式，签名相同的构型视为等价。
//!
//! ## 依赖关系
//! - 被 `analysis/configs.rs`, `commands/analyze/` 使用
//! - 使用 `parsers/outcar.rs`, `parsers/poscar.rs`, `models/`

use crate::error::{Result, VaspflowError};
use crate::models::{Crystal, IonMoment, MagneticOrdering};
use crate::parsers::{outcar, poscar};
use crate::utils::output;
use crate::workflow::files::{dir_name, list_subdirs};

use serde::Serialize;
use std::path::Path;

/// 小于此值的磁矩在等价性判定中视为零 (μB)
pub const ZERO_MOMENT_THRESHOLD: f64 = 0.1;

/// 判定磁有序类型
pub fn determine_magnetic_ordering(moments: &[IonMoment], magmom_tol: f64, total_tol: f64) -> MagneticOrdering {
    let tot: Vec<f64> = moments.iter().map(|m| m.tot).collect();
    MagneticOrdering::classify(&tot, magmom_tol, total_tol)
}

/// 任一离子的输出磁矩偏离输入磁矩超过 `|tol|` 时返回 true
pub fn significant_magmom_change(outcar_path: &Path, tol: f64) -> Result<bool> {
    let input = outcar::extract_input_mag_data(outcar_path)?;
    let output = outcar::extract_tot_mag_data(outcar_path)?;
    if input.len() != output.len() {
        return Err(VaspflowError::InvalidArgument(format!(
            "{}: MAGMOM lists {} ions but magnetization has {}",
            outcar_path.display(),
            input.len(),
            output.len()
        )));
    }

    let tol = tol.abs();
    Ok(input
        .iter()
        .zip(&output)
        .any(|(i, o)| o.tot < i.tot - tol || o.tot > i.tot + tol))
}

/// 读取结构并附上 OUTCAR 最后一步的各离子磁矩
pub fn get_magnetic_structure(poscar_path: &Path, outcar_path: &Path) -> Result<Crystal> {
    let mut crystal = poscar::parse_poscar_file(poscar_path)?;
    let moments = outcar::extract_tot_mag_data(outcar_path)?;
    if moments.len() != crystal.num_sites() {
        return Err(VaspflowError::InvalidStructure(format!(
            "{} has {} sites but {} lists {} moments",
            poscar_path.display(),
            crystal.num_sites(),
            outcar_path.display(),
            moments.len()
        )));
    }
    for (atom, m) in crystal.atoms.iter_mut().zip(&moments) {
        atom.magmom = Some(m.tot);
    }
    Ok(crystal)
}

/// 每种元素的 (元素, 向上, 向下, 零) 离子数
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct OrderingSignature(Vec<(String, usize, usize, usize)>);

impl OrderingSignature {
    pub fn from_crystal(crystal: &Crystal, threshold: f64) -> Self {
        let count = |flip: bool| {
            let mut counts: Vec<(String, usize, usize, usize)> = Vec::new();
            for atom in &crystal.atoms {
                let m = atom.magmom.unwrap_or(0.0) * if flip { -1.0 } else { 1.0 };
                let entry = match counts.iter().position(|c| c.0 == atom.element) {
                    Some(i) => &mut counts[i],
                    None => {
                        counts.push((atom.element.clone(), 0, 0, 0));
                        let last = counts.len() - 1;
                        &mut counts[last]
                    }
                };
                if m > threshold {
                    entry.1 += 1;
                } else if m < -threshold {
                    entry.2 += 1;
                } else {
                    entry.3 += 1;
                }
            }
            counts.sort();
            counts
        };
        // 全局自旋翻转不改变有序类型
        OrderingSignature(count(false).max(count(true)))
    }
}

/// 一个构型及与其磁有序等价的其他构型
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Equivalence {
    pub config: String,
    pub matches: Vec<String>,
}

/// 第一个同时含有 CONTCAR/OUTCAR 且可读取的 `vol_*` 目录的磁结构
fn first_magnetic_structure(config_dir: &Path, contcar: &str, outcar_name: &str) -> Result<Crystal> {
    for vol_dir in list_subdirs(config_dir, "vol_")? {
        match get_magnetic_structure(&vol_dir.join(contcar), &vol_dir.join(outcar_name)) {
            Ok(crystal) => return Ok(crystal),
            Err(e) => output::print_warning(&format!(
                "missing or unreadable {}/{} in {}: {}",
                contcar,
                outcar_name,
                vol_dir.display(),
                e
            )),
        }
    }
    Err(VaspflowError::FileNotFound {
        path: format!("{}/vol_*/{{{},{}}}", config_dir.display(), contcar, outcar_name),
    })
}

/// 查找 `path` 下磁有序等价的 `config_*` 构型
pub fn equivalent_orderings(path: &Path, contcar: &str, outcar_name: &str) -> Result<Vec<Equivalence>> {
    let mut signatures = Vec::new();
    for config_dir in list_subdirs(path, "config_")? {
        let crystal = first_magnetic_structure(&config_dir, contcar, outcar_name)?;
        let name = dir_name(&config_dir)
            .trim_start_matches("config_")
            .to_string();
        signatures.push((name, OrderingSignature::from_crystal(&crystal, ZERO_MOMENT_THRESHOLD)));
    }

    let mut result: Vec<Equivalence> = signatures
        .iter()
        .map(|(name, _)| Equivalence {
            config: name.clone(),
            matches: Vec::new(),
        })
        .collect();
    for i in 0..signatures.len() {
        for j in (i + 1)..signatures.len() {
            if signatures[i].1 == signatures[j].1 {
                let (a, b) = (signatures[i].0.clone(), signatures[j].0.clone());
                result[i].matches.push(b);
                result[j].matches.push(a);
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ev::tests::cubic_poscar;
    use crate::models::{Atom, Lattice};
    use std::fs;
    use tempfile::TempDir;

    fn outcar(input: &str, moments: &[f64]) -> String {
        let mut text = format!("   MAGMOM = {}\n magnetization (x)\n\n# of ion       s       p       d       tot\n----------\n", input);
        for (i, m) in moments.iter().enumerate() {
            text.push_str(&format!("    {}   0.0   0.0   {:.3}   {:.3}\n", i + 1, m, m));
        }
        text.push_str("----------\ntot 0 0 0 0\n");
        text
    }

    fn crystal(moments: &[(&str, f64)]) -> Crystal {
        let atoms = moments
            .iter()
            .map(|(el, m)| Atom::new(*el, [0.0, 0.0, 0.0]).with_magmom(*m))
            .collect();
        Crystal::new("test", Lattice::from_parameters(3.0, 3.0, 3.0, 90.0, 90.0, 90.0), atoms)
    }

    #[test]
    fn test_significant_magmom_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("OUTCAR");

        fs::write(&path, outcar("2*3.0", &[2.8, 2.7])).unwrap();
        assert!(!significant_magmom_change(&path, 0.5).unwrap());
        // 负容差按绝对值处理
        assert!(!significant_magmom_change(&path, -0.5).unwrap());

        fs::write(&path, outcar("3.0 -3.0", &[2.8, 0.1])).unwrap();
        assert!(significant_magmom_change(&path, 0.5).unwrap());

        fs::write(&path, outcar("3*3.0", &[2.8, 0.1])).unwrap();
        assert!(significant_magmom_change(&path, 0.5).is_err());
    }

    #[test]
    fn test_get_magnetic_structure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("CONTCAR"), cubic_poscar(2.8)).unwrap();
        fs::write(dir.path().join("OUTCAR"), outcar("2*3", &[2.2, -2.2])).unwrap();

        let crystal = get_magnetic_structure(&dir.path().join("CONTCAR"), &dir.path().join("OUTCAR")).unwrap();
        assert_eq!(crystal.atoms[0].magmom, Some(2.2));
        assert_eq!(crystal.atoms[1].magmom, Some(-2.2));

        fs::write(dir.path().join("OUTCAR"), outcar("3*3", &[2.2, -2.2, 1.0])).unwrap();
        assert!(get_magnetic_structure(&dir.path().join("CONTCAR"), &dir.path().join("OUTCAR")).is_err());
    }

    #[test]
    fn test_signature_is_invariant_to_spin_flip() {
        let a = crystal(&[("Fe", 2.0), ("Fe", -2.0), ("Se", 0.0)]);
        let b = crystal(&[("Fe", -2.1), ("Fe", 2.1), ("Se", 0.01)]);
        let fm = crystal(&[("Fe", 2.0), ("Fe", 2.0), ("Se", 0.0)]);
        let fm_flipped = crystal(&[("Fe", -2.0), ("Fe", -2.0), ("Se", 0.0)]);

        let sig = |c: &Crystal| OrderingSignature::from_crystal(c, ZERO_MOMENT_THRESHOLD);
        assert_eq!(sig(&a), sig(&b));
        assert_eq!(sig(&fm), sig(&fm_flipped));
        assert_ne!(sig(&a), sig(&fm));
    }

    #[test]
    fn test_equivalent_orderings() {
        let dir = TempDir::new().unwrap();
        let write = |config: &str, vol: &str, moments: &[f64]| {
            let vol_dir = dir.path().join(config).join(vol);
            fs::create_dir_all(&vol_dir).unwrap();
            fs::write(vol_dir.join("CONTCAR"), cubic_poscar(2.8)).unwrap();
            fs::write(vol_dir.join("OUTCAR"), outcar("2*3", moments)).unwrap();
        };
        write("config_1", "vol_0", &[2.0, -2.0]);
        write("config_2", "vol_0", &[2.0, 2.0]);
        write("config_3", "vol_0", &[-2.1, 2.1]);
        // config_4 的 vol_0 缺少 OUTCAR，使用 vol_1
        fs::create_dir_all(dir.path().join("config_4/vol_0")).unwrap();
        write("config_4", "vol_1", &[-2.0, -2.0]);

        let eq = equivalent_orderings(dir.path(), "CONTCAR", "OUTCAR").unwrap();
        assert_eq!(eq.len(), 4);
        assert_eq!(eq[0], Equivalence { config: "1".into(), matches: vec!["3".into()] });
        assert_eq!(eq[1].matches, vec!["4".to_string()]);
        assert_eq!(eq[2].matches, vec!["1".to_string()]);
        assert_eq!(eq[3].matches, vec!["2".to_string()]);

        fs::create_dir_all(dir.path().join("config_5/vol_0")).unwrap();
        assert!(equivalent_orderings(dir.path(), "CONTCAR", "OUTCAR").is_err());
    }
}
