//! # relax / ev / chgdiff 命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/run.rs` 定义的参数
//! - 使用 `workflow/relax.rs`, `workflow/ev_curve.rs`, `workflow/chgdiff.rs`

use super::load_settings;
use crate::cli::run::{ChgdiffArgs, EvArgs, RelaxArgs};
use crate::error::Result;
use crate::parsers::poscar;
use crate::utils::output;
use crate::workflow::chgdiff::charge_density_difference;
use crate::workflow::{ev_curve_series, three_step_relaxation, EvCurveOptions, RelaxOptions, RelaxOverrides};

use std::path::Path;

fn read_overrides(path: Option<&Path>) -> Result<Option<RelaxOverrides>> {
    path.map(RelaxOverrides::from_file).transpose()
}

/// 执行 relax 命令
pub fn relax(args: RelaxArgs) -> Result<()> {
    output::print_header("Three-step Relaxation");
    let settings = load_settings(args.run)?;
    let opts = RelaxOptions {
        copy_magmom: args.copy_magmom,
        backup: args.backup,
        overrides: read_overrides(args.overrides.as_deref())?,
    };
    if let Ok(crystal) = poscar::parse_poscar_file(&args.path.join("POSCAR")) {
        output::print_info(&format!("Structure: {} ({} atoms)", crystal.formula(), crystal.num_sites()));
    }
    three_step_relaxation(&args.path, &settings, &opts)?;
    output::print_done(&format!("Relaxation finished in {}", args.path.display()));
    Ok(())
}

/// 执行 ev 命令
pub fn ev(args: EvArgs) -> Result<()> {
    output::print_header("E-V Curve Series");
    let settings = load_settings(args.run)?;
    let opts = EvCurveOptions {
        restarting: args.restart,
        keep_wavecar: args.keep_wavecar,
        keep_chgcar: args.keep_chgcar,
        copy_magmom: args.copy_magmom,
        overrides: read_overrides(args.overrides.as_deref())?,
    };
    output::print_info(&format!("{} volumes: {:?}", args.volumes.len(), args.volumes));
    ev_curve_series(&args.path, &args.volumes, &settings, &opts)?;
    output::print_done(&format!("E-V series finished in {}", args.path.display()));
    Ok(())
}

/// 执行 chgdiff 命令
pub fn chgdiff(args: ChgdiffArgs) -> Result<()> {
    output::print_header("Charge Density Difference");
    let settings = load_settings(args.run)?;
    charge_density_difference(&args.path, &settings, args.backup)?;
    Ok(())
}
