//! # VASP CHGCAR 体数据
//!
//! 读取 CHGCAR 的结构头、网格与总电荷密度（以及可选的自旋密度块），
//! 支持两个网格相同的 CHGCAR 相减，用于电荷密度差分析。
//!
//! PAW 增广占据数 (augmentation occupancies) 不参与差分，写出时省略。
//!
//! ## 依赖关系
//! - 被 `workflow/chgdiff.rs` 使用

use crate::error::{Result, VaspflowError};
use std::fs;
use std::ops::Sub;
use std::path::Path;

/// CHGCAR 体数据
#[derive(Debug, Clone, PartialEq)]
pub struct Chgcar {
    /// 结构头部（POSCAR 部分），原样保留
    pub header: Vec<String>,
    pub grid: [usize; 3],
    /// 总密度 × 晶胞体积，x 变化最快
    pub total: Vec<f64>,
    /// 自旋密度 (ISPIN=2)
    pub diff: Option<Vec<f64>>,
}

impl Chgcar {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| VaspflowError::read(path, e))?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let fail = |reason: &str| VaspflowError::parse("CHGCAR", path, reason);
        let lines: Vec<&str> = content.lines().collect();

        // 结构头以空行结束
        let blank = lines
            .iter()
            .position(|l| l.trim().is_empty())
            .ok_or_else(|| fail("missing blank line after structure"))?;
        let header: Vec<String> = lines[..blank].iter().map(|l| l.to_string()).collect();

        let grid = lines
            .get(blank + 1)
            .and_then(|l| parse_grid_line(l))
            .ok_or_else(|| fail("missing grid dimensions"))?;
        let n = grid[0] * grid[1] * grid[2];

        let (total, next) = read_block(&lines, blank + 2, n).ok_or_else(|| fail("truncated density block"))?;

        // 自旋块以同样的网格行开头，之前可能有增广占据数
        let mut diff = None;
        if let Some(offset) = lines[next..]
            .iter()
            .position(|l| parse_grid_line(l) == Some(grid))
        {
            let (values, _) = read_block(&lines, next + offset + 1, n)
                .ok_or_else(|| fail("truncated spin density block"))?;
            diff = Some(values);
        }

        Ok(Chgcar {
            header,
            grid,
            total,
            diff,
        })
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_string()).map_err(|e| VaspflowError::write(path, e))
    }

    fn write_block(out: &mut String, grid: [usize; 3], values: &[f64]) {
        out.push_str(&format!(" {:>4} {:>4} {:>4}\n", grid[0], grid[1], grid[2]));
        for chunk in values.chunks(5) {
            let line: Vec<String> = chunk.iter().map(|&x| fortran_sci(x)).collect();
            out.push(' ');
            out.push_str(&line.join(" "));
            out.push('\n');
        }
    }
}

impl std::fmt::Display for Chgcar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        for line in &self.header {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        Chgcar::write_block(&mut out, self.grid, &self.total);
        if let Some(diff) = &self.diff {
            Chgcar::write_block(&mut out, self.grid, diff);
        }
        write!(f, "{}", out)
    }
}

impl Sub for &Chgcar {
    type Output = Result<Chgcar>;

    /// 逐点相减；结构头取被减数
    fn sub(self, rhs: &Chgcar) -> Result<Chgcar> {
        if self.grid != rhs.grid {
            return Err(VaspflowError::InvalidArgument(format!(
                "CHGCAR grids differ: {:?} vs {:?}",
                self.grid, rhs.grid
            )));
        }
        let minus = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(x, y)| x - y).collect::<Vec<_>>();

        Ok(Chgcar {
            header: self.header.clone(),
            grid: self.grid,
            total: minus(&self.total, &rhs.total),
            diff: match (&self.diff, &rhs.diff) {
                (Some(a), Some(b)) => Some(minus(a, b)),
                _ => None,
            },
        })
    }
}

fn parse_grid_line(line: &str) -> Option<[usize; 3]> {
    let parts: Vec<usize> = line
        .split_whitespace()
        .map(|s| s.parse().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [a, b, c] => Some([*a, *b, *c]),
        _ => None,
    }
}

/// 从 `start` 行开始读取 n 个数，返回数据和下一行的下标
fn read_block(lines: &[&str], start: usize, n: usize) -> Option<(Vec<f64>, usize)> {
    let mut values = Vec::with_capacity(n);
    let mut idx = start;
    while values.len() < n {
        let line = lines.get(idx)?;
        for tok in line.split_whitespace() {
            values.push(tok.parse().ok()?);
        }
        idx += 1;
    }
    values.truncate(n);
    Some((values, idx))
}

/// Fortran 风格科学计数法，如 `0.12345678901E+01` 写作 `1.2345678901E+00`
fn fortran_sci(x: f64) -> String {
    let s = format!("{:.10E}", x);
    match s.split_once('E') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}E{}{:02}", mantissa, sign, exp.abs())
        }
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chgcar(values: &[f64], spin: Option<&[f64]>) -> String {
        let mut s = String::from(
            "Fe\n1.0\n2.0 0.0 0.0\n0.0 2.0 0.0\n0.0 0.0 2.0\nFe\n1\nDirect\n0.0 0.0 0.0\n\n    2    1    2\n",
        );
        s.push_str(&values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" "));
        s.push('\n');
        if let Some(spin) = spin {
            s.push_str("augmentation occupancies   1  15\n 0.1 0.2 0.3\n");
            s.push_str("    2    1    2\n");
            s.push_str(&spin.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("\n"));
            s.push('\n');
        }
        s
    }

    #[test]
    fn test_parse_chgcar_with_spin_block() {
        let c = Chgcar::parse(&chgcar(&[1.0, 2.0, 3.0, 4.0], Some(&[0.5, 0.5, 0.0, 0.0])), Path::new("CHGCAR")).unwrap();
        assert_eq!(c.grid, [2, 1, 2]);
        assert_eq!(c.header.len(), 9);
        assert_eq!(c.total, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(c.diff, Some(vec![0.5, 0.5, 0.0, 0.0]));
    }

    #[test]
    fn test_difference() {
        let a = Chgcar::parse(&chgcar(&[1.0, 2.0, 3.0, 4.0], None), Path::new("a")).unwrap();
        let b = Chgcar::parse(&chgcar(&[0.5, 0.5, 0.5, 0.5], None), Path::new("b")).unwrap();
        let d = (&a - &b).unwrap();
        assert_eq!(d.total, vec![0.5, 1.5, 2.5, 3.5]);
        assert!(d.diff.is_none());

        let reparsed = Chgcar::parse(&d.to_string(), Path::new("d")).unwrap();
        assert_eq!(reparsed.total, d.total);
    }

    #[test]
    fn test_truncated_block_is_an_error() {
        let text = chgcar(&[1.0, 2.0], None);
        assert!(Chgcar::parse(&text, Path::new("CHGCAR")).is_err());
    }

    #[test]
    fn test_fortran_sci() {
        assert_eq!(fortran_sci(12.5), "1.2500000000E+01");
        assert_eq!(fortran_sci(-0.00125), "-1.2500000000E-03");
        assert_eq!(fortran_sci(0.0), "0.0000000000E+00");
    }
}
