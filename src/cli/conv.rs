//! # conv 子命令 CLI 定义
//!
//! - `kpoints`: k 点密度 (KPPA) 收敛测试
//! - `encut`: 截断能收敛测试
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/conv.rs`

use super::RunArgs;
use clap::{ArgAction, Args, Subcommand};
use std::path::PathBuf;

/// conv 主命令参数
#[derive(Args, Debug)]
pub struct ConvArgs {
    #[command(subcommand)]
    pub command: ConvCommands,
}

/// conv 子命令
#[derive(Subcommand, Debug)]
pub enum ConvCommands {
    /// Static runs over a list of k-point densities (kpoints_conv/)
    Kpoints(KpointsConvArgs),

    /// Static runs over a list of plane-wave cutoffs (encut_conv/)
    Encut(EncutConvArgs),
}

/// k 点收敛测试参数
#[derive(Args, Debug)]
pub struct KpointsConvArgs {
    /// Directory containing INCAR, POSCAR and POTCAR
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// k-points per reciprocal atom (comma-separated)
    #[arg(long, required = true, value_delimiter = ',')]
    pub kppa: Vec<f64>,

    /// Always write Gamma-centred meshes
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub force_gamma: bool,

    #[arg(long)]
    pub backup: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

/// 截断能收敛测试参数
#[derive(Args, Debug)]
pub struct EncutConvArgs {
    /// Directory containing INCAR, KPOINTS, POSCAR and POTCAR
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// ENCUT values in eV (comma-separated)
    #[arg(long, required = true, value_delimiter = ',')]
    pub encut: Vec<f64>,

    #[arg(long)]
    pub backup: bool,

    #[command(flatten)]
    pub run: RunArgs,
}
