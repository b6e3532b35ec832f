//! # 磁性分析命令
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 使用 `analysis/magnetism.rs`, `parsers/outcar.rs`

use crate::analysis::magnetism::{determine_magnetic_ordering, equivalent_orderings, significant_magmom_change};
use crate::cli::analyze::{EquivalentArgs, MagnetismArgs};
use crate::error::Result;
use crate::parsers::outcar;
use crate::utils::output;

use tabled::{Table, Tabled};

#[derive(Tabled)]
struct MomentRow {
    #[tabled(rename = "Ion")]
    ion: usize,
    #[tabled(rename = "MAGMOM in")]
    input: String,
    #[tabled(rename = "tot out")]
    output: String,
}

#[derive(Tabled)]
struct EquivalenceRow {
    #[tabled(rename = "Config")]
    config: String,
    #[tabled(rename = "Equivalent to")]
    matches: String,
}

/// 执行 analyze magnetism
pub fn magnetism(args: MagnetismArgs) -> Result<()> {
    output::print_header(&format!("Magnetization of {}", args.outcar.display()));

    let moments = outcar::extract_tot_mag_data(&args.outcar)?;
    let input = outcar::extract_input_mag_data(&args.outcar).ok();

    let table_rows: Vec<MomentRow> = moments
        .iter()
        .map(|m| MomentRow {
            ion: m.ion,
            input: input
                .as_ref()
                .and_then(|v| v.iter().find(|i| i.ion == m.ion))
                .map(|i| format!("{:.3}", i.tot))
                .unwrap_or_default(),
            output: format!("{:.3}", m.tot),
        })
        .collect();
    println!("{}", Table::new(&table_rows));

    let total: f64 = moments.iter().map(|m| m.tot).sum();
    let ordering = determine_magnetic_ordering(&moments, args.magmom_tol, args.total_tol);
    output::print_info(&format!("Total moment: {:.3} μB, ordering: {}", total, ordering));

    if input.is_some() {
        if significant_magmom_change(&args.outcar, args.tol)? {
            output::print_warning(&format!("At least one moment changed by more than {}", args.tol.abs()));
        } else {
            output::print_success(&format!("All moments within {} of MAGMOM", args.tol.abs()));
        }
    } else {
        output::print_skip("No MAGMOM line found; skipping moment change check");
    }
    Ok(())
}

/// 执行 analyze equivalent
pub fn equivalent(args: EquivalentArgs) -> Result<()> {
    output::print_header("Equivalent Magnetic Orderings");

    let groups = equivalent_orderings(&args.path, &args.contcar, &args.outcar)?;
    let table_rows: Vec<EquivalenceRow> = groups
        .iter()
        .map(|g| EquivalenceRow {
            config: g.config.clone(),
            matches: g.matches.join(", "),
        })
        .collect();
    println!("{}", Table::new(&table_rows));

    let unique = groups
        .iter()
        .enumerate()
        .filter(|(i, g)| {
            // 只计数每组中第一个出现的构型
            !g.matches
                .iter()
                .any(|m| groups[..*i].iter().any(|earlier| &earlier.config == m))
        })
        .count();
    output::print_done(&format!("{} configurations, {} distinct orderings", groups.len(), unique));
    Ok(())
}
