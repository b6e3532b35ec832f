//! # analyze 命令实现
//!
//! 分析功能统一入口，包含多个子命令：
//! - `ev` / `pv` / `conv`: 数据表
//! - `configs`: 构型数据
//! - `magnetism` / `equivalent`: 磁性
//! - `check`: 诊断
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 子模块: tables, configs, magnetism, check

pub mod check;
pub mod configs;
pub mod magnetism;
pub mod tables;

use crate::cli::analyze::{AnalyzeArgs, AnalyzeCommands};
use crate::error::Result;

/// 执行 analyze 命令
pub fn execute(args: AnalyzeArgs) -> Result<()> {
    match args.command {
        AnalyzeCommands::Ev(a) => tables::ev(a),
        AnalyzeCommands::Pv(a) => tables::pv(a),
        AnalyzeCommands::Conv(a) => tables::conv(a),
        AnalyzeCommands::Configs(a) => configs::execute(a),
        AnalyzeCommands::Magnetism(a) => magnetism::magnetism(a),
        AnalyzeCommands::Equivalent(a) => magnetism::equivalent(a),
        AnalyzeCommands::Check(a) => check::execute(a),
    }
}
