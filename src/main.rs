//! # vaspflow - VASP 工作流工具
//!
//! 将 E-V 曲线、收敛性测试、声子与电荷密度差等多步 VASP 计算
//! 统一成单一可执行文件，并提供结果分析。
//!
//! ## 子命令
//! - `relax`   - 三步弛豫
//! - `ev`      - E-V 曲线系列（支持断点续算）
//! - `conv`    - k 点 / 截断能收敛测试
//! - `phonon`  - 声子计算准备、运行与 YPHON 后处理
//! - `chgdiff` - 电荷密度差
//! - `analyze` - 结果分析
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── workflow/  (多步计算编排)
//!   │     ├── analysis/  (结果分析)
//!   │     └── config.rs  (运行配置)
//!   ├── job/        (VASP 作业监管与错误处理)
//!   ├── parsers/    (VASP 文件解析)
//!   ├── models/     (数据模型)
//!   ├── batch/      (并行批处理)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod analysis;
mod batch;
mod cli;
mod commands;
mod config;
mod error;
mod job;
mod models;
mod parsers;
mod utils;
mod workflow;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        log::debug!("{:?}", e);
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
