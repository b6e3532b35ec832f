//! # E-V 曲线系列计算
//!
//! 对一组体积依次做三步弛豫。第 i 个体积在 `vol_i/` 中计算，
//! 初始结构取自上一个体积的 `CONTCAR.3static` 并缩放到目标体积。
//!
//! 中断后可用 `restarting` 继续：已开始的体积必须与给定体积列表的前缀一致，
//! 最后一个目录根据已有的 `.2relax` / `.1relax` 文件恢复或重算。
//!
//! ## 依赖关系
//! - 被 `commands/run.rs` 使用
//! - 使用 `workflow/relax.rs`, `workflow/files.rs`, `workflow/params.rs`, `parsers/poscar.rs`

use super::files::{self, copy_pairs, create_new_dir, list_subdirs, remove_all_except, remove_files};
use super::params::SeriesParams;
use super::relax::{three_step_relaxation, RelaxOptions, RelaxOverrides};
use crate::config::RunSettings;
use crate::error::{Result, VaspflowError};
use crate::parsers::poscar::{self, round6};
use crate::utils::output;

use std::fs;
use std::path::Path;

/// E-V 系列选项
#[derive(Debug, Clone, Default)]
pub struct EvCurveOptions {
    pub restarting: bool,
    pub keep_wavecar: bool,
    pub keep_chgcar: bool,
    pub copy_magmom: bool,
    /// `None` 使用默认的三步弛豫设置
    pub overrides: Option<RelaxOverrides>,
}

/// 体积目录完成后要删除的大文件
pub fn bulky_files(keep_wavecar: bool, keep_chgcar: bool) -> Vec<String> {
    let mut names = Vec::new();
    for suffix in [".1relax", ".2relax", ".3static"] {
        for base in ["WAVECAR", "CHGCAR", "CHG", "PROCAR"] {
            if suffix == ".3static" && ((base == "WAVECAR" && keep_wavecar) || (base == "CHGCAR" && keep_chgcar)) {
                continue;
            }
            names.push(format!("{}{}", base, suffix));
        }
    }
    names
}

/// 运行 E-V 系列
pub fn ev_curve_series(
    path: &Path,
    volumes: &[f64],
    settings: &RunSettings,
    opts: &EvCurveOptions,
) -> Result<()> {
    if volumes.is_empty() {
        return Err(VaspflowError::InvalidArgument("volume list is empty".to_string()));
    }
    if !path.is_dir() {
        return Err(VaspflowError::DirectoryNotFound {
            path: path.display().to_string(),
        });
    }

    let params = SeriesParams::new(path, volumes, settings, opts.restarting).write_next(path)?;
    log::info!("parameters written to {}", params.display());

    let start = if opts.restarting {
        restart_last_folder(path, volumes, settings, opts)?
    } else {
        0
    };

    let to_delete = bulky_files(opts.keep_wavecar, opts.keep_chgcar);
    let relax_opts = RelaxOptions {
        copy_magmom: opts.copy_magmom,
        backup: false,
        overrides: opts.overrides.clone(),
    };

    for (i, &volume) in volumes.iter().enumerate().skip(start) {
        let vol_dir = path.join(format!("vol_{}", i));
        create_new_dir(&vol_dir)?;

        if i == 0 {
            copy_pairs(
                path,
                &vol_dir,
                &[("INCAR", "INCAR"), ("KPOINTS", "KPOINTS"), ("POSCAR", "POSCAR"), ("POTCAR", "POTCAR")],
            )?;
        } else {
            let prev = path.join(format!("vol_{}", i - 1));
            copy_pairs(
                &prev,
                &vol_dir,
                &[
                    ("CONTCAR.3static", "POSCAR"),
                    ("INCAR.2relax", "INCAR"),
                    ("KPOINTS.1relax", "KPOINTS"),
                    ("POTCAR", "POTCAR"),
                    ("WAVECAR.3static", "WAVECAR"),
                    ("CHGCAR.3static", "CHGCAR"),
                ],
            )?;
            remove_files(&prev, &to_delete)?;
        }

        let poscar_path = vol_dir.join("POSCAR");
        let mut crystal = poscar::parse_poscar_file(&poscar_path)?;
        crystal.scale_lattice(volume)?;
        poscar::write_poscar_file(&crystal, &poscar_path)?;

        output::print_info(&format!("Running three step relaxation for volume {}", volume));
        three_step_relaxation(&vol_dir, settings, &relax_opts)?;
        output::print_success(&format!("vol_{} finished (V = {})", i, volume));
    }

    let last = path.join(format!("vol_{}", volumes.len() - 1));
    if last.is_dir() {
        remove_files(&last, &to_delete)?;
    }
    Ok(())
}

/// 初始体积：优先 `POSCAR.1relax`，否则 `POSCAR`
fn started_volume(vol_dir: &Path) -> Result<f64> {
    match poscar::read_volume(&vol_dir.join("POSCAR.1relax")) {
        Ok(v) => Ok(v),
        Err(e) => {
            log::warn!("{}, trying POSCAR", e);
            poscar::read_volume(&vol_dir.join("POSCAR")).map_err(|e| {
                VaspflowError::RestartMismatch(format!(
                    "cannot read the starting volume in {}: {}",
                    vol_dir.display(),
                    e
                ))
            })
        }
    }
}

/// 检查已开始的体积并处理最后一个目录，返回下一个要计算的体积下标
fn restart_last_folder(
    path: &Path,
    volumes: &[f64],
    settings: &RunSettings,
    opts: &EvCurveOptions,
) -> Result<usize> {
    let vol_dirs = list_subdirs(path, "vol")?;
    let Some(last) = vol_dirs.last() else {
        output::print_info("No volume folders found, starting from the first volume");
        return Ok(0);
    };

    let started = vol_dirs
        .iter()
        .map(|d| started_volume(d))
        .collect::<Result<Vec<_>>>()?;
    let supplied: Vec<f64> = volumes.iter().map(|&v| round6(v)).collect();

    if started.len() > supplied.len() || started[..] != supplied[..started.len()] {
        return Err(VaspflowError::RestartMismatch(format!(
            "the started volumes do not match the beginning of the volume list\n  input volumes (rounded): {:?}\n  started volumes: {:?}",
            supplied, started
        )));
    }
    output::print_info("Started volumes match the volume list, continuing restart");

    let j = vol_dirs.len() - 1;
    let has_all = |suffix: &str| {
        ["INCAR", "POSCAR", "KPOINTS"]
            .iter()
            .all(|f| last.join(format!("{}{}", f, suffix)).is_file())
    };

    // 三步已全部完成
    if last.join("CONTCAR.3static").is_file() && last.join("OSZICAR.3static").is_file() {
        output::print_skip(&format!("{} already finished", files::dir_name(last)));
        return Ok(j + 1);
    }

    for suffix in [".2relax", ".1relax"] {
        if !has_all(suffix) {
            continue;
        }
        let owned: Vec<(String, &str)> = [
            ("INCAR", "INCAR"),
            ("CONTCAR", "POSCAR"),
            ("KPOINTS", "KPOINTS"),
            ("CHGCAR", "CHGCAR"),
            ("WAVECAR", "WAVECAR"),
        ]
        .iter()
        .map(|(src, dest)| (format!("{}{}", src, suffix), *dest))
        .collect();
        let pairs: Vec<(&str, &str)> = owned.iter().map(|(s, d)| (s.as_str(), *d)).collect();

        copy_pairs(last, last, &pairs)?;
        remove_all_except(last, &["INCAR", "POSCAR", "KPOINTS", "CHGCAR", "WAVECAR", "POTCAR"])?;

        output::print_info(&format!(
            "Restarting {} from {} files (V = {})",
            files::dir_name(last),
            suffix,
            volumes[j]
        ));
        let relax_opts = RelaxOptions {
            copy_magmom: opts.copy_magmom,
            backup: false,
            overrides: None,
        };
        three_step_relaxation(last, settings, &relax_opts)?;
        return Ok(j + 1);
    }

    // 第一步就失败了：整个目录重算
    output::print_warning(&format!("Removing {} and starting it again", last.display()));
    fs::remove_dir_all(last).map_err(|e| VaspflowError::write(last, e))?;
    Ok(j)
}
