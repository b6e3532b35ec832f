//! # analyze 子命令 CLI 定义
//!
//! 分析功能统一入口，包含多个子命令：
//! - `ev` / `pv`: 体积-能量、体积-压力数据
//! - `configs`: 构型数据表
//! - `conv`: 收敛性测试结果
//! - `magnetism`: 单个 OUTCAR 的磁矩分析
//! - `equivalent`: 磁有序等价构型
//! - `check`: 失败计算诊断
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/analyze/` 相应模块

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────
// Analyze 主命令
// ─────────────────────────────────────────────────────────────

/// analyze 主命令参数
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(subcommand)]
    pub command: AnalyzeCommands,
}

/// analyze 子命令
#[derive(Subcommand, Debug)]
pub enum AnalyzeCommands {
    /// Write volume_energy.txt from the vol_* folders of an E-V series
    Ev(SeriesArgs),

    /// Write volume_pressure.txt from the vol_* folders of an E-V series
    Pv(SeriesArgs),

    /// Tabulate config_*/vol_* results and export them to CSV
    Configs(ConfigsArgs),

    /// Tabulate a k-point or ENCUT convergence test
    Conv(ConvAnalyzeArgs),

    /// Per-ion moments, ordering and moment change of one OUTCAR
    Magnetism(MagnetismArgs),

    /// Group configurations with matching magnetic ordering
    Equivalent(EquivalentArgs),

    /// Report error.* folders and runs that hit NELM
    Check(CheckArgs),
}

/// E-V 系列目录
#[derive(Args, Debug)]
pub struct SeriesArgs {
    /// Directory containing the vol_* folders
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

// ─────────────────────────────────────────────────────────────
// 构型数据
// ─────────────────────────────────────────────────────────────

/// configs 参数
#[derive(Args, Debug)]
pub struct ConfigsArgs {
    /// Directory containing the config_* folders
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Pattern selecting configuration folders
    #[arg(long, default_value = "config_*")]
    pub pattern: String,

    #[arg(long, default_value = "OUTCAR.3static")]
    pub outcar: String,

    #[arg(long, default_value = "OSZICAR.3static")]
    pub oszicar: String,

    #[arg(long, default_value = "CONTCAR.3static")]
    pub contcar: String,

    /// Also collect magnetization data and classify the ordering
    #[arg(long)]
    pub mag: bool,

    /// Per-ion moment below which an ion counts as non-magnetic
    #[arg(long, default_value_t = 1e-12)]
    pub magmom_tol: f64,

    /// Total moment below which the cell counts as compensated
    #[arg(long, default_value_t = 1e-12)]
    pub total_tol: f64,

    /// Number of lowest-energy configurations to print
    #[arg(long, default_value_t = 10)]
    pub top_n: usize,

    /// CSV output file
    #[arg(short, long, default_value = "configurations.csv")]
    pub output: PathBuf,

    /// Number of parallel jobs (0 = all CPUs)
    #[arg(short = 'j', long, default_value_t = 0)]
    pub jobs: usize,
}

// ─────────────────────────────────────────────────────────────
// 收敛性
// ─────────────────────────────────────────────────────────────

/// 收敛测试类型
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ConvTarget {
    /// k-point density (kpoints_conv/)
    Kpoints,
    /// Plane-wave cutoff (encut_conv/)
    Encut,
}

/// conv 分析参数
#[derive(Args, Debug)]
pub struct ConvAnalyzeArgs {
    /// Directory containing kpoints_conv/ or encut_conv/
    #[arg(default_value = ".")]
    pub path: PathBuf,

    #[arg(long, value_enum)]
    pub kind: ConvTarget,

    /// Tested values (comma-separated, as used for the runs)
    #[arg(long, required = true, value_delimiter = ',')]
    pub values: Vec<f64>,

    /// Skip the PNG plot
    #[arg(long)]
    pub no_plot: bool,
}

// ─────────────────────────────────────────────────────────────
// 磁性
// ─────────────────────────────────────────────────────────────

/// magnetism 参数
#[derive(Args, Debug)]
pub struct MagnetismArgs {
    /// OUTCAR file
    #[arg(default_value = "OUTCAR")]
    pub outcar: PathBuf,

    /// Tolerance for the change of each moment relative to MAGMOM
    #[arg(long, default_value_t = 0.5)]
    pub tol: f64,

    #[arg(long, default_value_t = 1e-12)]
    pub magmom_tol: f64,

    #[arg(long, default_value_t = 1e-12)]
    pub total_tol: f64,
}

/// equivalent 参数
#[derive(Args, Debug)]
pub struct EquivalentArgs {
    /// Directory containing the config_* folders
    #[arg(default_value = ".")]
    pub path: PathBuf,

    #[arg(long, default_value = "CONTCAR")]
    pub contcar: String,

    #[arg(long, default_value = "OUTCAR")]
    pub outcar: String,
}

// ─────────────────────────────────────────────────────────────
// 诊断
// ─────────────────────────────────────────────────────────────

/// check 参数
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Directory to inspect
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Number of parallel jobs (0 = all CPUs)
    #[arg(short = 'j', long, default_value_t = 0)]
    pub jobs: usize,
}
