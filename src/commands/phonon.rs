//! # phonon 命令实现
//!
//! ## 依赖关系
//! - 使用 `cli/phonon.rs` 定义的参数
//! - 使用 `workflow/phonon.rs`, `utils/slurm.rs`

use super::load_settings;
use crate::cli::phonon::{PhononArgs, PhononCommands, PrepareArgs};
use crate::error::{Result, VaspflowError};
use crate::utils::output;
use crate::utils::slurm::SlurmConfig;
use crate::workflow::phonon::{
    phonons_parallel, process_phonon_dos_yphon, run_phonons, PhononSetup, ScriptSource, YphonCommands,
};

/// 执行 phonon 命令
pub fn execute(args: PhononArgs) -> Result<()> {
    match args.command {
        PhononCommands::Prepare(args) => prepare(args),
        PhononCommands::Run(args) => {
            output::print_header("Phonon Calculation");
            let settings = load_settings(args.run)?;
            run_phonons(&args.path, &settings, args.copy_magmom, args.backup)
        }
        PhononCommands::Yphon(args) => {
            output::print_header("YPHON Post-processing");
            let commands = YphonCommands {
                vasp_fij: split_command(&args.vasp_fij)?,
                yphon: split_command(&args.yphon)?,
            };
            let results = process_phonon_dos_yphon(&args.path, &commands)?;
            output::print_done(&format!("Phonon DOS collected in {}", results.display()));
            Ok(())
        }
    }
}

fn split_command(cmd: &str) -> Result<Vec<String>> {
    let parts: Vec<String> = cmd.split_whitespace().map(String::from).collect();
    if parts.is_empty() {
        return Err(VaspflowError::InvalidArgument("empty command".to_string()));
    }
    Ok(parts)
}

fn prepare(args: PrepareArgs) -> Result<()> {
    output::print_header("Phonon Preparation");

    let supercell: [usize; 3] = args.supercell.as_slice().try_into().map_err(|_| {
        VaspflowError::InvalidArgument(format!(
            "--supercell needs three multipliers, got {:?}",
            args.supercell
        ))
    })?;

    let script = match args.header {
        Some(header) => ScriptSource::Header(header),
        None => ScriptSource::Generated(SlurmConfig {
            partition: args.partition,
            nodes: args.nodes,
            ntasks: args.ntasks,
            mem_per_cpu: args.mem_per_cpu,
            time_limit: args.time,
            modules: args.modules,
            ..SlurmConfig::default()
        }),
    };

    let setup = PhononSetup {
        supercell,
        kppa: args.kppa,
        script,
        run_command: args.run_command,
        submit: args.submit,
    };

    let created = phonons_parallel(&args.path, &args.volumes, &setup)?;
    output::print_done(&format!("Prepared {} phonon folder(s)", created.len()));
    Ok(())
}
