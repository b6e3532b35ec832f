//! # relax / ev / chgdiff 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/run.rs`

use super::RunArgs;
use clap::Args;
use std::path::PathBuf;

/// relax 子命令参数
#[derive(Args, Debug)]
pub struct RelaxArgs {
    /// Directory containing INCAR, KPOINTS, POSCAR and POTCAR
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Write the final magnetic moments of each step into the next INCAR
    #[arg(long)]
    pub copy_magmom: bool,

    /// Keep copies of the original inputs as *.orig
    #[arg(long)]
    pub backup: bool,

    /// JSON file with custom overrides for the second and third steps
    #[arg(long)]
    pub overrides: Option<PathBuf>,

    #[command(flatten)]
    pub run: RunArgs,
}

/// ev 子命令参数
#[derive(Args, Debug)]
pub struct EvArgs {
    /// Directory containing INCAR, KPOINTS, POSCAR and POTCAR
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Cell volumes in Å^3 (comma-separated), one vol_<i> folder each
    #[arg(long, required = true, value_delimiter = ',')]
    pub volumes: Vec<f64>,

    /// Resume an interrupted series from the existing vol_* folders
    #[arg(long)]
    pub restart: bool,

    /// Keep WAVECAR.3static in each finished volume folder
    #[arg(long)]
    pub keep_wavecar: bool,

    /// Keep CHGCAR.3static in each finished volume folder
    #[arg(long)]
    pub keep_chgcar: bool,

    #[arg(long)]
    pub copy_magmom: bool,

    /// JSON file with custom overrides for the second and third steps
    #[arg(long)]
    pub overrides: Option<PathBuf>,

    #[command(flatten)]
    pub run: RunArgs,
}

/// chgdiff 子命令参数
#[derive(Args, Debug)]
pub struct ChgdiffArgs {
    /// Directory containing INCAR, KPOINTS, POSCAR and POTCAR
    #[arg(default_value = ".")]
    pub path: PathBuf,

    #[arg(long)]
    pub backup: bool,

    #[command(flatten)]
    pub run: RunArgs,
}
