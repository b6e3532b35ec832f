//! # E-V / P-V / 收敛性数据表
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 使用 `analysis/ev.rs`, `analysis/convergence.rs`

use crate::analysis::{self, ev as series, ConvPoint};
use crate::cli::analyze::{ConvAnalyzeArgs, ConvTarget, SeriesArgs};
use crate::error::Result;
use crate::utils::output;
use crate::workflow::ConvKind;

use tabled::{Table, Tabled};

#[derive(Tabled)]
struct SeriesRow {
    #[tabled(rename = "Volume (Å³)")]
    volume: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct ConvRow {
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Energy (eV)")]
    energy: String,
    #[tabled(rename = "ΔE (meV/atom)")]
    delta: String,
    #[tabled(rename = "< 1 meV")]
    converged: String,
}

fn print_series(rows: &[[f64; 2]]) {
    let table_rows: Vec<SeriesRow> = rows
        .iter()
        .map(|r| SeriesRow {
            volume: format!("{:.6}", r[0]),
            value: format!("{:.6}", r[1]),
        })
        .collect();
    println!("{}", Table::new(&table_rows));
}

/// 执行 analyze ev
pub fn ev(args: SeriesArgs) -> Result<()> {
    output::print_header("Volume - Energy (eV)");
    let rows = analysis::write_ev(&args.path)?;
    print_series(&rows);
    output::print_success(&format!("Saved to '{}'", args.path.join(series::EV_FILE).display()));
    Ok(())
}

/// 执行 analyze pv
pub fn pv(args: SeriesArgs) -> Result<()> {
    output::print_header("Volume - Pressure (kB)");
    let rows = analysis::write_pv(&args.path)?;
    print_series(&rows);
    output::print_success(&format!("Saved to '{}'", args.path.join(series::PV_FILE).display()));
    Ok(())
}

/// 执行 analyze conv
pub fn conv(args: ConvAnalyzeArgs) -> Result<()> {
    let kind = match args.kind {
        ConvTarget::Kpoints => ConvKind::Kpoints,
        ConvTarget::Encut => ConvKind::Encut,
    };
    output::print_header(&format!("{} Convergence", kind.axis_label()));

    let points = analysis::calculate_conv(&args.path, kind, &args.values, !args.no_plot)?;
    let table_rows: Vec<ConvRow> = points
        .iter()
        .enumerate()
        .map(|(i, p): (usize, &ConvPoint)| ConvRow {
            value: format!("{}", p.value),
            energy: format!("{:.6}", p.energy),
            delta: format!("{:.3}", p.delta_mev_per_atom),
            converged: if i > 0 && p.delta_mev_per_atom.abs() < 1.0 {
                "yes".to_string()
            } else {
                "-".to_string()
            },
        })
        .collect();
    println!("{}", Table::new(&table_rows));

    output::print_success(&format!("Saved to '{}'", args.path.join(kind.energy_file()).display()));
    if !args.no_plot {
        output::print_success(&format!(
            "Convergence plot saved to '{}'",
            args.path.join(kind.plot_file()).display()
        ));
    }
    Ok(())
}
