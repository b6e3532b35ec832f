//! # 诊断命令
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 使用 `analysis/diagnostics.rs`

use crate::analysis::diagnostics::{custodian_errors_location, nelm_reached};
use crate::cli::analyze::CheckArgs;
use crate::error::Result;
use crate::utils::output;

/// 执行 analyze check
pub fn execute(args: CheckArgs) -> Result<()> {
    output::print_header("Calculation Diagnostics");

    let errors = custodian_errors_location(&args.path)?;
    if errors.is_empty() {
        output::print_success("No error folders in vol* directories");
    }
    for e in &errors {
        output::print_warning(&format!("In {} there are error folders: {}", e.vol_dir, e.errors.join(", ")));
    }

    output::print_separator();

    let hits = nelm_reached(&args.path, args.jobs)?;
    if hits.is_empty() {
        output::print_success("No file reports reaching NELM");
    }
    for file in &hits {
        output::print_warning(&format!("{} has reached NELM.", file.display()));
    }
    Ok(())
}
