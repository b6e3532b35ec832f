//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `relax`: 三步弛豫
//! - `ev`: E-V 曲线系列
//! - `conv`: 收敛性测试（`kpoints` / `encut`）
//! - `phonon`: 声子计算（`prepare` / `run` / `yphon`）
//! - `chgdiff`: 电荷密度差
//! - `analyze`: 结果分析（嵌套子命令）
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: run, conv, phonon, analyze

pub mod analyze;
pub mod conv;
pub mod phonon;
pub mod run;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// vaspflow - VASP 工作流工具
#[derive(Parser)]
#[command(name = "vaspflow")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "VASP workflow automation: E-V curves, convergence tests, phonons and analysis", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Run a three-step relaxation (.1relax, .2relax, .3static) in a directory
    Relax(run::RelaxArgs),

    /// Run an energy-volume series of three-step relaxations
    Ev(run::EvArgs),

    /// Run k-point density or ENCUT convergence tests
    Conv(conv::ConvArgs),

    /// Prepare, run and post-process finite-difference phonon calculations
    Phonon(phonon::PhononArgs),

    /// Compute the charge density difference (SCF minus one-step reference)
    Chgdiff(run::ChgdiffArgs),

    /// Analyze finished calculations
    Analyze(analyze::AnalyzeArgs),
}

// ─────────────────────────────────────────────────────────────
// 共享的作业参数
// ─────────────────────────────────────────────────────────────

/// VASP 作业设置，覆盖 TOML 配置中的值
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// TOML run configuration (vasp_cmd, handlers, max_errors, output_file)
    #[arg(long, env = "VASPFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Command used to launch VASP, e.g. "srun vasp_std"
    #[arg(long)]
    pub vasp_cmd: Option<String>,

    /// Error handlers (comma-separated: vasp, unconverged, nonconverging)
    #[arg(long, value_delimiter = ',')]
    pub handlers: Option<Vec<String>>,

    /// Maximum number of corrections before giving up
    #[arg(long)]
    pub max_errors: Option<usize>,

    /// File receiving VASP stdout/stderr
    #[arg(long)]
    pub output_file: Option<String>,
}
