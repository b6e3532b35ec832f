//! # VASP OSZICAR 解析器
//!
//! 提取最终能量以及每个离子步的电子步数。
//!
//! ## OSZICAR 格式
//! ```text
//!        N       E                     dE             d eps       ncg     rms          rms(c)
//! DAV:   1     0.1000E+03    0.1000E+03   -0.3E+03   900   0.1E+02
//! ...
//!    1 F= -.10128406E+03 E0= -.10127993E+03  d E =-.101284E+03  mag=     2.9646
//! ```
//!
//! ## 依赖关系
//! - 被 `analysis/`, `job/handlers.rs` 使用

use super::outcar::check_file_name;
use crate::error::{Result, VaspflowError};
use std::fs;
use std::path::Path;

/// 一个离子步的汇总
#[derive(Debug, Clone, PartialEq)]
pub struct IonicStep {
    pub step: usize,
    /// 自由能 F
    pub free_energy: f64,
    /// E0 = energy(sigma->0)
    pub e0: f64,
    /// 该离子步的电子步数
    pub electronic_steps: usize,
}

/// 提取最终能量（最后一行 `F=` 的第 5 个字段，即 E0）
pub fn extract_energy(path: &Path) -> Result<f64> {
    check_file_name(path, "OSZICAR")?;
    let content = fs::read_to_string(path).map_err(|e| VaspflowError::read(path, e))?;

    let line = content
        .lines()
        .rev()
        .find(|l| l.contains("F="))
        .ok_or_else(|| VaspflowError::parse("OSZICAR", path, "no 'F=' line found"))?;

    line.split_whitespace()
        .nth(4)
        .and_then(parse_fortran_float)
        .ok_or_else(|| {
            VaspflowError::parse("OSZICAR", path, format!("cannot read energy from '{}'", line.trim()))
        })
}

/// 列出全部离子步
pub fn ionic_steps(path: &Path) -> Result<Vec<IonicStep>> {
    let content = fs::read_to_string(path).map_err(|e| VaspflowError::read(path, e))?;
    Ok(parse_ionic_steps(&content))
}

pub(crate) fn parse_ionic_steps(content: &str) -> Vec<IonicStep> {
    let mut steps = Vec::new();
    let mut electronic = 0;

    for line in content.lines() {
        let trimmed = line.trim_start();
        if ["DAV:", "RMM:", "CG :", "ALG:"]
            .iter()
            .any(|tag| trimmed.starts_with(tag))
        {
            electronic += 1;
        } else if line.contains("F=") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let step = parts.first().and_then(|s| s.parse().ok());
            let f = parts.get(2).and_then(|s| parse_fortran_float(s));
            let e0 = parts.get(4).and_then(|s| parse_fortran_float(s));
            if let (Some(step), Some(free_energy), Some(e0)) = (step, f, e0) {
                steps.push(IonicStep {
                    step,
                    free_energy,
                    e0,
                    electronic_steps: electronic,
                });
            }
            electronic = 0;
        }
    }

    steps
}

/// 解析 Fortran 风格浮点数，如 `-.10128406E+03`
fn parse_fortran_float(s: &str) -> Option<f64> {
    s.replace(['D', 'd'], "E").parse().ok()
}
