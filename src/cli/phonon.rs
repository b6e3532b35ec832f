//! # phonon 子命令 CLI 定义
//!
//! - `prepare`: 为选定体积建立 `phonon_<k>` 目录并写出提交脚本
//! - `run`: 在声子目录中运行弛豫 + 有限位移计算
//! - `yphon`: 用 YPHON 处理声子态密度
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/phonon.rs`

use super::RunArgs;
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// phonon 主命令参数
#[derive(Args, Debug)]
pub struct PhononArgs {
    #[command(subcommand)]
    pub command: PhononCommands,
}

/// phonon 子命令
#[derive(Subcommand, Debug)]
pub enum PhononCommands {
    /// Create phonon_<k> folders for finished E-V volumes
    Prepare(PrepareArgs),

    /// Run the relaxation and finite-difference steps in a phonon folder
    Run(PhononRunArgs),

    /// Post-process phonon_* folders with vasp_fij and Yphon
    Yphon(YphonArgs),
}

/// prepare 参数
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// E-V series directory containing vol_* folders
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Volumes to compute phonons for (comma-separated, matched to 6 decimals)
    #[arg(long, required = true, value_delimiter = ',')]
    pub volumes: Vec<f64>,

    /// Supercell multipliers along a, b and c
    #[arg(long, value_delimiter = ',', default_values_t = [2, 2, 2])]
    pub supercell: Vec<usize>,

    /// k-points per reciprocal atom of the supercell
    #[arg(long, default_value_t = 1000.0)]
    pub kppa: f64,

    /// Script header (#SBATCH lines, module loads); generated when omitted
    #[arg(long)]
    pub header: Option<PathBuf>,

    /// Command appended to the job script
    #[arg(long, default_value = "vaspflow phonon run")]
    pub run_command: String,

    /// Submit each job script with sbatch
    #[arg(long)]
    pub submit: bool,

    // ─────────────────────────────────────────────────────────────
    // 生成脚本的 Slurm 选项
    // ─────────────────────────────────────────────────────────────
    /// Slurm partition
    #[arg(long)]
    pub partition: Option<String>,

    /// Number of nodes
    #[arg(long, default_value_t = 1)]
    pub nodes: u32,

    /// Number of MPI tasks
    #[arg(long, default_value_t = 32)]
    pub ntasks: u32,

    /// Memory per CPU
    #[arg(long, default_value = "3G")]
    pub mem_per_cpu: String,

    /// Time limit
    #[arg(long, default_value = "24:00:00")]
    pub time: String,

    /// Modules to load (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub modules: Vec<String>,
}

/// run 参数
#[derive(Args, Debug)]
pub struct PhononRunArgs {
    /// Phonon folder containing INCAR, KPOINTS, POSCAR and POTCAR
    #[arg(default_value = ".")]
    pub path: PathBuf,

    #[arg(long)]
    pub copy_magmom: bool,

    #[arg(long)]
    pub backup: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

/// yphon 参数
#[derive(Args, Debug)]
pub struct YphonArgs {
    /// Directory containing the phonon_* folders
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Command producing superfij.out from the phonon outputs
    #[arg(long, default_value = "vasp_fij")]
    pub vasp_fij: String,

    /// Yphon command (reads superfij.out on stdin)
    #[arg(long, default_value = "Yphon")]
    pub yphon: String,
}
