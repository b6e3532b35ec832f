//! # VASP KPOINTS 生成
//!
//! 按倒空间 k 点密度 (k-points per reciprocal atom, KPPA) 自动生成网格。
//!
//! ## 依赖关系
//! - 被 `workflow/convergence.rs`, `workflow/phonon.rs` 使用
//! - 使用 `models/structure.rs`

use crate::error::{Result, VaspflowError};
use crate::models::structure::{HEX_ANGLE_TOL, HEX_LENGTH_TOL};
use crate::models::Crystal;
use std::fmt;
use std::fs;
use std::path::Path;

/// 网格类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KpointsStyle {
    Gamma,
    Monkhorst,
}

impl fmt::Display for KpointsStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KpointsStyle::Gamma => write!(f, "Gamma"),
            KpointsStyle::Monkhorst => write!(f, "Monkhorst"),
        }
    }
}

/// 自动网格 KPOINTS
#[derive(Debug, Clone, PartialEq)]
pub struct Kpoints {
    pub comment: String,
    pub style: KpointsStyle,
    pub divisions: [usize; 3],
    pub shift: [f64; 3],
}

impl Kpoints {
    /// 按 KPPA 生成网格
    ///
    /// 每个方向的分割数与晶格常数成反比，总点数约为 `kppa / nsites`。
    /// 含奇数分割、六方晶格或 `force_gamma` 时使用 Gamma 中心网格。
    pub fn automatic_density(crystal: &Crystal, kppa: f64, force_gamma: bool) -> Result<Self> {
        if crystal.num_sites() == 0 || kppa <= 0.0 {
            return Err(VaspflowError::InvalidArgument(format!(
                "cannot build k-point mesh with kppa={} for {} sites",
                kppa,
                crystal.num_sites()
            )));
        }

        let lengths = crystal.lattice.lengths();
        let ngrid = kppa / crystal.num_sites() as f64;
        let mult = (ngrid * lengths[0] * lengths[1] * lengths[2]).cbrt();

        let mut divisions = [1usize; 3];
        for (d, len) in divisions.iter_mut().zip(lengths.iter()) {
            *d = (mult / len).max(1.0).floor() as usize;
        }

        let has_odd = divisions.iter().any(|d| d % 2 == 1);
        let is_hexagonal = crystal.lattice.is_hexagonal(HEX_LENGTH_TOL, HEX_ANGLE_TOL);
        let style = if has_odd || is_hexagonal || force_gamma {
            KpointsStyle::Gamma
        } else {
            KpointsStyle::Monkhorst
        };

        Ok(Kpoints {
            comment: format!("vaspflow with grid density = {:.0} / number of atoms", kppa),
            style,
            divisions,
            shift: [0.0; 3],
        })
    }

    /// 写出 KPOINTS 文件
    pub fn write_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_string()).map_err(|e| VaspflowError::write(path, e))
    }
}

impl fmt::Display for Kpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.comment)?;
        writeln!(f, "0")?;
        writeln!(f, "{}", self.style)?;
        let [a, b, c] = self.divisions;
        writeln!(f, "{} {} {}", a, b, c)?;
        let [x, y, z] = self.shift;
        writeln!(f, "{} {} {}", x, y, z)
    }
}
