//! # 构型数据表
//!
//! ## 依赖关系
//! - 使用 `cli/analyze.rs` 定义的参数
//! - 使用 `analysis/configs.rs`, `batch/collector.rs`

use crate::analysis::configs::{write_csv, OutputNames};
use crate::analysis::{recursive_extract_configuration_data, ExtractOptions};
use crate::batch::FileCollector;
use crate::cli::analyze::ConfigsArgs;
use crate::error::Result;
use crate::models::lowest_energy_configs;
use crate::utils::output;

use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ConfigTableRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Config")]
    config: String,
    #[tabled(rename = "V/atom (Å³)")]
    volume_per_atom: String,
    #[tabled(rename = "E/atom (eV)")]
    energy_per_atom: String,
    #[tabled(rename = "Ordering")]
    ordering: String,
    #[tabled(rename = "M tot (μB)")]
    total_moment: String,
}

/// 执行 analyze configs
pub fn execute(args: ConfigsArgs) -> Result<()> {
    output::print_header("Configuration Data");

    let dirs = FileCollector::new(&args.path)
        .with_pattern(&args.pattern)
        .directories(true)
        .collect()?;
    output::print_info(&format!("Found {} configuration folder(s)", dirs.len()));

    let opts = ExtractOptions {
        names: OutputNames {
            outcar: args.outcar,
            oszicar: args.oszicar,
            contcar: args.contcar,
        },
        collect_mag_data: args.mag,
        magmom_tol: args.magmom_tol,
        total_tol: args.total_tol,
    };
    let rows = recursive_extract_configuration_data(dirs, &opts, args.jobs)?;
    if rows.is_empty() {
        output::print_warning("No finished volume folders found");
        return Ok(());
    }

    let table_rows: Vec<ConfigTableRow> = lowest_energy_configs(&rows, args.top_n)
        .into_iter()
        .enumerate()
        .map(|(i, r)| ConfigTableRow {
            rank: i + 1,
            config: r.config,
            volume_per_atom: format!("{:.4}", r.volume_per_atom),
            energy_per_atom: format!("{:.6}", r.energy_per_atom),
            ordering: r.magnetic_ordering.map(|o| o.to_string()).unwrap_or_default(),
            total_moment: r
                .total_magnetic_moment
                .map(|m| format!("{:.3}", m))
                .unwrap_or_default(),
        })
        .collect();

    println!("{}", Table::new(&table_rows));

    write_csv(&rows, &args.output)?;
    output::print_success(&format!(
        "{} rows saved to '{}'",
        rows.len(),
        args.output.display()
    ));
    Ok(())
}
