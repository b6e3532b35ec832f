//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `workflow/`, `analysis/`, `utils/`
//! - 子模块: run, conv, phonon, analyze

pub mod analyze;
pub mod conv;
pub mod phonon;
pub mod run;

use crate::cli::{Commands, RunArgs};
use crate::config::RunSettings;
use crate::error::Result;
use crate::utils::output;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Relax(args) => run::relax(args),
        Commands::Ev(args) => run::ev(args),
        Commands::Conv(args) => conv::execute(args),
        Commands::Phonon(args) => phonon::execute(args),
        Commands::Chgdiff(args) => run::chgdiff(args),
        Commands::Analyze(args) => analyze::execute(args),
    }
}

/// 读取 TOML 配置并应用命令行覆盖
pub(crate) fn load_settings(args: RunArgs) -> Result<RunSettings> {
    let settings = RunSettings::load(args.config.as_deref())?.with_overrides(
        args.vasp_cmd.as_deref(),
        args.handlers,
        args.max_errors,
        args.output_file,
    )?;
    output::print_info(&format!(
        "VASP command: '{}', handlers: [{}], max errors: {}",
        settings.vasp_cmd.join(" "),
        settings.handlers.join(", "),
        settings.max_errors
    ));
    Ok(settings)
}
