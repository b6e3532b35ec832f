//! # conv 命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/conv.rs` 定义的参数
//! - 使用 `workflow/convergence.rs`

use super::load_settings;
use crate::cli::conv::{ConvArgs, ConvCommands};
use crate::error::Result;
use crate::utils::output;
use crate::workflow::convergence::{encut_conv_test, kpoints_conv_test};

/// 执行 conv 命令
pub fn execute(args: ConvArgs) -> Result<()> {
    match args.command {
        ConvCommands::Kpoints(args) => {
            output::print_header("k-point Convergence Test");
            let settings = load_settings(args.run)?;
            let dir = kpoints_conv_test(&args.path, &args.kppa, &settings, args.force_gamma, args.backup)?;
            output::print_info(&format!(
                "Run `vaspflow analyze conv {} --kind kpoints --values {}` to tabulate",
                args.path.display(),
                join_values(&args.kppa)
            ));
            log::debug!("k-point runs in {}", dir.display());
        }
        ConvCommands::Encut(args) => {
            output::print_header("ENCUT Convergence Test");
            let settings = load_settings(args.run)?;
            let dir = encut_conv_test(&args.path, &args.encut, &settings, args.backup)?;
            output::print_info(&format!(
                "Run `vaspflow analyze conv {} --kind encut --values {}` to tabulate",
                args.path.display(),
                join_values(&args.encut)
            ));
            log::debug!("ENCUT runs in {}", dir.display());
        }
    }
    Ok(())
}

fn join_values(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
