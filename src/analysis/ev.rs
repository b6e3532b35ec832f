//! # E-V / P-V 数据
//!
//! 从 `vol*` 目录的静态计算结果中收集 体积-能量 与 体积-压力 数据，
//! 按体积排序后写入 `volume_energy.txt` / `volume_pressure.txt`。
//!
//! ## 依赖关系
//! - 被 `commands/analyze/` 使用
//! - 使用 `parsers/poscar.rs`, `parsers/oszicar.rs`, `parsers/outcar.rs`

use crate::error::{Result, VaspflowError};
use crate::parsers::{oszicar, outcar, poscar};
use crate::workflow::files::list_subdirs;

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub const EV_FILE: &str = "volume_energy.txt";
pub const PV_FILE: &str = "volume_pressure.txt";

/// 按体积排序的 (体积, 值) 数据
fn collect_series(path: &Path, read_value: impl Fn(&Path) -> Result<f64>) -> Result<Vec<[f64; 2]>> {
    let dirs = list_subdirs(path, "vol")?;
    if dirs.is_empty() {
        return Err(VaspflowError::InvalidArgument(format!(
            "no vol* folders in {}",
            path.display()
        )));
    }

    let mut rows = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let volume = poscar::read_volume(&dir.join("CONTCAR.3static"))?;
        rows.push([volume, read_value(&dir)?]);
    }
    rows.sort_by(|a, b| a[0].total_cmp(&b[0]));
    Ok(rows)
}

/// 写出以空格分隔、保留 6 位小数的数据表
pub fn write_columns<const N: usize>(path: &Path, rows: &[[f64; N]]) -> Result<()> {
    let mut text = String::new();
    for row in rows {
        let line: Vec<String> = row.iter().map(|v| format!("{:.6}", v)).collect();
        let _ = writeln!(text, "{}", line.join(" "));
    }
    fs::write(path, text).map_err(|e| VaspflowError::write(path, e))
}

/// 收集体积-能量数据
pub fn volume_energy(path: &Path) -> Result<Vec<[f64; 2]>> {
    collect_series(path, |dir| oszicar::extract_energy(&dir.join("OSZICAR.3static")))
}

/// 收集体积-压力数据 (kB)
pub fn volume_pressure(path: &Path) -> Result<Vec<[f64; 2]>> {
    collect_series(path, |dir| outcar::extract_pressure(&dir.join("OUTCAR.3static")))
}

/// 在 `path` 中写出 `volume_energy.txt`，返回写出的数据
pub fn write_ev(path: &Path) -> Result<Vec<[f64; 2]>> {
    let rows = volume_energy(path)?;
    let out = path.join(EV_FILE);
    write_columns(&out, &rows)?;
    log::info!("wrote {} E-V points to {}", rows.len(), out.display());
    Ok(rows)
}

/// 在 `path` 中写出 `volume_pressure.txt`，返回写出的数据
pub fn write_pv(path: &Path) -> Result<Vec<[f64; 2]>> {
    let rows = volume_pressure(path)?;
    let out = path.join(PV_FILE);
    write_columns(&out, &rows)?;
    log::info!("wrote {} P-V points to {}", rows.len(), out.display());
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// 边长为 `a` 的两原子立方 Fe 结构
    pub(crate) fn cubic_poscar(a: f64) -> String {
        format!(
            "Fe2\n1.0\n{a} 0.0 0.0\n0.0 {a} 0.0\n0.0 0.0 {a}\nFe\n2\nDirect\n0.0 0.0 0.0\n0.5 0.5 0.5\n"
        )
    }

    pub(crate) fn oszicar(energy: f64) -> String {
        format!("   1 F= {:.8E} E0= {:.8E}  d E =-.1E+00\n", energy + 0.01, energy)
    }

    /// 写出一个完成了静态计算的体积目录
    pub(crate) fn write_static_outputs(dir: &Path, a: f64, energy: f64, pressure: f64) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("CONTCAR.3static"), cubic_poscar(a)).unwrap();
        fs::write(dir.join("OSZICAR.3static"), oszicar(energy)).unwrap();
        fs::write(
            dir.join("OUTCAR.3static"),
            format!("  external pressure =     {:.2} kB  Pullay stress =        0.00 kB\n", pressure),
        )
        .unwrap();
    }

    #[test]
    fn test_write_ev_and_pv_sorted_by_volume() {
        let dir = TempDir::new().unwrap();
        // vol_0 体积最大，输出中应排在最后
        write_static_outputs(&dir.path().join("vol_0"), 3.0, -10.5, -19.74);
        write_static_outputs(&dir.path().join("vol_1"), 2.0, -12.25, 8.5);

        let rows = write_ev(dir.path()).unwrap();
        assert_eq!(rows.len(), 2);
        let text = fs::read_to_string(dir.path().join(EV_FILE)).unwrap();
        assert_eq!(text, "8.000000 -12.250000\n27.000000 -10.500000\n");

        write_pv(dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join(PV_FILE)).unwrap();
        assert_eq!(text, "8.000000 8.500000\n27.000000 -19.740000\n");
    }

    #[test]
    fn test_missing_static_files_are_errors() {
        let dir = TempDir::new().unwrap();
        assert!(write_ev(dir.path()).is_err());

        fs::create_dir(dir.path().join("vol_0")).unwrap();
        assert!(write_ev(dir.path()).is_err());
    }
}
