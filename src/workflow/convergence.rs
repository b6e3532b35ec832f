//! # 收敛性测试
//!
//! - k 点密度 (KPPA) 测试：`kpoints_conv/` 中按每个 KPPA 生成 KPOINTS 并做静态计算
//! - 截断能 (ENCUT) 测试：`encut_conv/` 中按每个 ENCUT 做静态计算
//!
//! 每次计算的输出带后缀 `.<value>`，随后删除其中的大文件。
//!
//! ## 依赖关系
//! - 被 `commands/conv.rs` 使用
//! - 使用 `job/`, `parsers/kpoints.rs`, `workflow/files.rs`

use super::files::{copy_required, create_new_dir, remove_files};
use crate::config::RunSettings;
use crate::error::{Result, VaspflowError};
use crate::job::SettingsOverride;
use crate::parsers::poscar;
use crate::parsers::{IncarValue, Kpoints};
use crate::utils::output;

use std::fmt::Display;
use std::path::{Path, PathBuf};

/// 收敛测试类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvKind {
    Kpoints,
    Encut,
}

impl ConvKind {
    /// 测试目录名
    pub fn dir_name(&self) -> &'static str {
        match self {
            ConvKind::Kpoints => "kpoints_conv",
            ConvKind::Encut => "encut_conv",
        }
    }

    /// 能量收敛数据文件名（写在测试目录的上一级）
    pub fn energy_file(&self) -> &'static str {
        match self {
            ConvKind::Kpoints => "kppa_energy.txt",
            ConvKind::Encut => "encut_energy.txt",
        }
    }

    pub fn plot_file(&self) -> &'static str {
        match self {
            ConvKind::Kpoints => "kpoint_conv.png",
            ConvKind::Encut => "encut_conv.png",
        }
    }

    /// 横轴标签
    pub fn axis_label(&self) -> &'static str {
        match self {
            ConvKind::Kpoints => "k-point density",
            ConvKind::Encut => "ENCUT (eV)",
        }
    }
}

/// 把数值格式化为文件后缀；整数值不带小数点
pub fn value_label(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn clean_bulky(dir: &Path, label: &impl Display) -> Result<()> {
    let names: Vec<String> = ["WAVECAR", "CHGCAR", "CHG", "PROCAR"]
        .iter()
        .map(|b| format!("{}.{}", b, label))
        .collect();
    remove_files(dir, &names)
}

fn check_values(values: &[f64], what: &str) -> Result<()> {
    if values.is_empty() {
        return Err(VaspflowError::InvalidArgument(format!("{} list is empty", what)));
    }
    if let Some(v) = values.iter().find(|v| **v <= 0.0) {
        return Err(VaspflowError::InvalidArgument(format!("{} must be positive, got {}", what, v)));
    }
    Ok(())
}

/// k 点收敛测试，返回测试目录
pub fn kpoints_conv_test(
    path: &Path,
    kppa_list: &[f64],
    settings: &RunSettings,
    force_gamma: bool,
    backup: bool,
) -> Result<PathBuf> {
    check_values(kppa_list, "KPPA")?;
    let conv_dir = path.join(ConvKind::Kpoints.dir_name());
    create_new_dir(&conv_dir)?;
    copy_required(path, &conv_dir, &["POSCAR", "POTCAR", "INCAR"])?;

    let crystal = poscar::parse_poscar_file(&conv_dir.join("POSCAR"))?;
    for (i, &kppa) in kppa_list.iter().enumerate() {
        let label = value_label(kppa);
        let kpoints = Kpoints::automatic_density(&crystal, kppa, force_gamma)?;
        kpoints.write_file(&conv_dir.join("KPOINTS"))?;
        output::print_info(&format!("KPPA = {} -> {:?} {}", label, kpoints.divisions, kpoints.style));

        let job = settings
            .job()
            .suffix(&format!(".{}", label))
            .final_job(i == kppa_list.len() - 1)
            .backup(backup)
            .settings(vec![SettingsOverride::incar([
                ("IBRION", IncarValue::from(-1)),
                ("NSW", IncarValue::from(0)),
            ])]);
        settings.run_jobs(&conv_dir, vec![job])?;
        clean_bulky(&conv_dir, &label)?;
    }

    output::print_done(&format!("k-point convergence runs in {}", conv_dir.display()));
    Ok(conv_dir)
}

/// 截断能收敛测试，返回测试目录
pub fn encut_conv_test(
    path: &Path,
    encut_list: &[f64],
    settings: &RunSettings,
    backup: bool,
) -> Result<PathBuf> {
    check_values(encut_list, "ENCUT")?;
    let conv_dir = path.join(ConvKind::Encut.dir_name());
    create_new_dir(&conv_dir)?;
    copy_required(path, &conv_dir, &["POSCAR", "KPOINTS", "POTCAR", "INCAR"])?;

    for (i, &encut) in encut_list.iter().enumerate() {
        let label = value_label(encut);
        let encut_value = if encut.fract() == 0.0 {
            IncarValue::from(encut as i64)
        } else {
            IncarValue::from(encut)
        };

        let job = settings
            .job()
            .suffix(&format!(".{}", label))
            .final_job(i == encut_list.len() - 1)
            .backup(backup)
            .settings(vec![SettingsOverride::incar([
                ("IBRION", IncarValue::from(-1)),
                ("NSW", IncarValue::from(0)),
                ("ENCUT", encut_value),
            ])]);
        settings.run_jobs(&conv_dir, vec![job])?;
        clean_bulky(&conv_dir, &label)?;
    }

    output::print_done(&format!("ENCUT convergence runs in {}", conv_dir.display()));
    Ok(conv_dir)
}
