//! # 声子计算
//!
//! 在选定的 E-V 体积上做有限位移声子计算：
//! - `phonons_parallel`: 为每个匹配的 `vol_<k>` 建立 `phonon_<k>/`（超胞 + Gamma KPOINTS + 提交脚本）
//! - `run_phonons`: 在单个声子目录中运行 `.1relax` 与 `.2phonons`
//! - `process_phonon_dos_yphon`: 调用 YPHON (`vasp_fij`, `Yphon`) 计算声子态密度
//!
//! ## 依赖关系
//! - 被 `commands/phonon.rs` 使用
//! - 使用 `job/`, `parsers/`, `utils/slurm.rs`, `workflow/files.rs`

use super::files::{copy_file, copy_pairs, copy_required, dir_name, folder_index, list_subdirs};
use crate::config::RunSettings;
use crate::error::{Result, VaspflowError};
use crate::job::SettingsOverride;
use crate::parsers::poscar::{self, round6};
use crate::parsers::{IncarValue, Kpoints};
use crate::utils::output;
use crate::utils::slurm::{self, SlurmConfig};

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// 声子目录中的提交脚本名
pub const RUN_SCRIPT: &str = "run_phonons";

/// 声子计算的两步作业
pub fn phonon_jobs(settings: &RunSettings, copy_magmom: bool, backup: bool) -> Vec<crate::job::VaspJob> {
    let relax = settings
        .job()
        .suffix(".1relax")
        .final_job(false)
        .backup(backup)
        .copy_magmom(copy_magmom);
    let phonons = settings
        .job()
        .suffix(".2phonons")
        .final_job(true)
        .backup(backup)
        .copy_magmom(copy_magmom)
        .settings(vec![
            SettingsOverride::incar([
                ("EDIFF", IncarValue::from("1E-6")),
                ("IBRION", IncarValue::from(6)),
                ("NSW", IncarValue::from(1)),
                ("ISIF", IncarValue::from(0)),
                ("POTIM", IncarValue::from(0.015)),
                ("ISYM", IncarValue::from(2)),
                ("NCORE", IncarValue::from(1)),
            ]),
            SettingsOverride::contcar_to_poscar(),
        ]);
    vec![relax, phonons]
}

/// 在 `dir` 中运行声子计算
pub fn run_phonons(dir: &Path, settings: &RunSettings, copy_magmom: bool, backup: bool) -> Result<()> {
    settings.run_jobs(dir, phonon_jobs(settings, copy_magmom, backup))
}

/// 提交脚本的来源
#[derive(Debug, Clone)]
pub enum ScriptSource {
    /// 用户提供的脚本头（#SBATCH 行、module load 等），末尾追加运行命令
    Header(PathBuf),
    /// 由 Slurm 配置生成
    Generated(SlurmConfig),
}

/// 声子准备选项
#[derive(Debug, Clone)]
pub struct PhononSetup {
    pub supercell: [usize; 3],
    pub kppa: f64,
    pub script: ScriptSource,
    /// 写入脚本的运行命令，如 `vaspflow phonon run --config vaspflow.toml`
    pub run_command: String,
    pub submit: bool,
}

fn build_script(setup: &PhononSetup, dir: &Path) -> Result<String> {
    match &setup.script {
        ScriptSource::Header(path) => {
            let header = fs::read_to_string(path).map_err(|e| VaspflowError::read(path, e))?;
            Ok(format!("{}\n\n{}\n", header.trim_end(), setup.run_command))
        }
        ScriptSource::Generated(config) => {
            let mut config = config.clone();
            config.job_name = dir_name(dir);
            Ok(slurm::generate_sbatch_script(&config, dir, &setup.run_command))
        }
    }
}

/// 已完成的 E-V 体积与其目录编号
fn finished_volumes(path: &Path) -> Result<Vec<(f64, String)>> {
    let mut finished = Vec::new();
    for vol_dir in list_subdirs(path, "vol")? {
        let contcar = vol_dir.join("CONTCAR.3static");
        let Some(index) = folder_index(&vol_dir) else {
            continue;
        };
        match poscar::read_volume(&contcar) {
            Ok(v) => finished.push((v, index)),
            Err(_) => output::print_skip(&format!("{} has no CONTCAR.3static", dir_name(&vol_dir))),
        }
    }
    Ok(finished)
}

/// 为匹配的体积准备声子目录，返回创建的目录
pub fn phonons_parallel(path: &Path, phonon_volumes: &[f64], setup: &PhononSetup) -> Result<Vec<PathBuf>> {
    let requested: Vec<f64> = phonon_volumes.iter().map(|&v| round6(v)).collect();
    let matches: Vec<(f64, String)> = finished_volumes(path)?
        .into_iter()
        .filter(|(v, _)| requested.contains(v))
        .collect();

    if matches.is_empty() {
        output::print_warning("No finished E-V volume matches the requested phonon volumes");
    }

    let mut created = Vec::new();
    for (volume, index) in matches {
        let vol_dir = path.join(format!("vol_{}", index));
        let ph_dir = path.join(format!("phonon_{}", index));
        fs::create_dir_all(&ph_dir).map_err(|e| VaspflowError::write(&ph_dir, e))?;

        copy_pairs(
            &vol_dir,
            &ph_dir,
            &[("CONTCAR.3static", "POSCAR"), ("INCAR.2relax", "INCAR"), ("POTCAR", "POTCAR")],
        )?;

        let poscar_path = ph_dir.join("POSCAR");
        let mut crystal = poscar::parse_poscar_file(&poscar_path)?;
        crystal.make_supercell(setup.supercell)?;
        poscar::write_poscar_file(&crystal, &poscar_path)?;

        let kpoints = Kpoints::automatic_density(&crystal, setup.kppa, true)?;
        kpoints.write_file(&ph_dir.join("KPOINTS"))?;

        let script_path = ph_dir.join(RUN_SCRIPT);
        fs::write(&script_path, build_script(setup, &ph_dir)?)
            .map_err(|e| VaspflowError::write(&script_path, e))?;

        output::print_success(&format!(
            "{}: V = {}, {} sites, k-mesh {:?}",
            dir_name(&ph_dir),
            volume,
            crystal.num_sites(),
            kpoints.divisions
        ));

        if setup.submit {
            let msg = slurm::submit(&ph_dir, RUN_SCRIPT)?;
            output::print_success(&format!("Submitted {}: {}", dir_name(&ph_dir), msg));
        }
        created.push(ph_dir);
    }

    Ok(created)
}

/// YPHON 命令
#[derive(Debug, Clone)]
pub struct YphonCommands {
    pub vasp_fij: Vec<String>,
    pub yphon: Vec<String>,
}

impl Default for YphonCommands {
    fn default() -> Self {
        YphonCommands {
            vasp_fij: vec!["vasp_fij".to_string()],
            yphon: vec!["Yphon".to_string()],
        }
    }
}

/// 运行外部命令，可选从文件读取 stdin
fn run_external(cmd: &[String], dir: &Path, stdin: Option<&Path>) -> Result<()> {
    let (program, args) = cmd
        .split_first()
        .ok_or_else(|| VaspflowError::InvalidArgument("empty command".to_string()))?;
    let input = match stdin {
        Some(p) => Stdio::from(File::open(p).map_err(|e| VaspflowError::read(p, e))?),
        None => Stdio::null(),
    };

    log::debug!("running {} in {}", cmd.join(" "), dir.display());
    let out = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(input)
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VaspflowError::CommandNotFound {
                command: program.clone(),
            },
            _ => VaspflowError::CommandFailed {
                command: cmd.join(" "),
                stderr: e.to_string(),
            },
        })?;

    if out.status.success() {
        Ok(())
    } else {
        Err(VaspflowError::CommandFailed {
            command: cmd.join(" "),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        })
    }
}

/// 用 YPHON 处理全部 `phonon*` 目录，结果汇总到 `YPHON_results/`
pub fn process_phonon_dos_yphon(path: &Path, commands: &YphonCommands) -> Result<PathBuf> {
    let results = path.join("YPHON_results");
    fs::create_dir_all(&results).map_err(|e| VaspflowError::write(&results, e))?;

    for ph_dir in list_subdirs(path, "phonon")? {
        let index = folder_index(&ph_dir).ok_or_else(|| {
            VaspflowError::InvalidArgument(format!("cannot read index of {}", ph_dir.display()))
        })?;
        let dos_dir = ph_dir.join("phonon_dos");
        fs::create_dir_all(&dos_dir).map_err(|e| VaspflowError::write(&dos_dir, e))?;

        for (src, dest) in [
            ("CONTCAR.2phonons", "CONTCAR"),
            ("OUTCAR.2phonons", "OUTCAR"),
            ("vasprun.xml.2phonons", "vasprun.xml"),
        ] {
            let src = ph_dir.join(src);
            if !src.is_file() {
                return Err(VaspflowError::FileNotFound {
                    path: src.display().to_string(),
                });
            }
            copy_file(&src, &dos_dir.join(dest))?;
        }

        let contcar = dos_dir.join("CONTCAR");
        let crystal = poscar::parse_poscar_file(&contcar)?;
        let volume_per_atom = poscar::round6(crystal.volume()) / crystal.num_sites() as f64;
        let volph = format!("volph_{}", index);
        let volph_path = dos_dir.join(&volph);
        fs::write(&volph_path, format!("{}", volume_per_atom))
            .map_err(|e| VaspflowError::write(&volph_path, e))?;

        run_external(&commands.vasp_fij, &dos_dir, None)?;
        run_external(&commands.yphon, &dos_dir, Some(&dos_dir.join("superfij.out")))?;

        let vdos = format!("vdos_{}", index);
        let vdos_path = dos_dir.join(&vdos);
        fs::rename(dos_dir.join("vdos.out"), &vdos_path).map_err(|e| VaspflowError::write(&vdos_path, e))?;

        copy_required(&dos_dir, &results, &[vdos.as_str(), volph.as_str()])?;
        output::print_success(&format!("{}: phonon DOS written to {}", dir_name(&ph_dir), vdos));
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::relax::tests::{fake_vasp_settings, write_inputs, POSCAR};
    use crate::parsers::Incar;
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn finished_series(dir: &Path, volumes: &[f64]) {
        for (i, &v) in volumes.iter().enumerate() {
            let vol = dir.join(format!("vol_{}", i));
            fs::create_dir(&vol).unwrap();
            let mut crystal = poscar::parse_poscar_content(POSCAR, Path::new("POSCAR")).unwrap();
            crystal.scale_lattice(v).unwrap();
            poscar::write_poscar_file(&crystal, &vol.join("CONTCAR.3static")).unwrap();
            fs::write(vol.join("INCAR.2relax"), "ENCUT = 520\n").unwrap();
            fs::write(vol.join("POTCAR"), "PAW_PBE Fe\n").unwrap();
        }
    }

    #[test]
    fn test_phonons_parallel_prepares_matching_volumes() {
        let dir = TempDir::new().unwrap();
        finished_series(dir.path(), &[20.0, 22.0, 24.0]);
        let header = dir.path().join("header.sh");
        fs::write(&header, "#!/bin/bash\n#SBATCH -n 8\n").unwrap();

        let setup = PhononSetup {
            supercell: [2, 2, 2],
            kppa: 1000.0,
            script: ScriptSource::Header(header),
            run_command: "vaspflow phonon run".to_string(),
            submit: false,
        };
        let created = phonons_parallel(dir.path(), &[22.0, 24.0, 30.0], &setup).unwrap();
        assert_eq!(created.len(), 2);

        let ph = dir.path().join("phonon_1");
        let crystal = poscar::parse_poscar_file(&ph.join("POSCAR")).unwrap();
        assert_eq!(crystal.num_sites(), 16);
        assert_relative_eq!(crystal.volume(), 22.0 * 8.0, epsilon = 1e-6);
        assert!(fs::read_to_string(ph.join("KPOINTS")).unwrap().contains("Gamma"));
        let script = fs::read_to_string(ph.join(RUN_SCRIPT)).unwrap();
        assert!(script.starts_with("#!/bin/bash\n#SBATCH -n 8\n"));
        assert!(script.trim_end().ends_with("vaspflow phonon run"));
        assert!(!dir.path().join("phonon_0").exists());
    }

    #[test]
    fn test_run_phonons_sets_finite_difference_tags() {
        let dir = TempDir::new().unwrap();
        write_inputs(dir.path());
        run_phonons(dir.path(), &fake_vasp_settings(), false, false).unwrap();

        let incar = Incar::from_file(&dir.path().join("INCAR.2phonons")).unwrap();
        assert_eq!(incar.get_int("IBRION"), Some(6));
        assert_eq!(incar.get_float("POTIM"), Some(0.015));
        assert!(dir.path().join("OSZICAR.1relax").is_file());
    }

    #[test]
    fn test_process_phonon_dos_yphon() {
        let dir = TempDir::new().unwrap();
        let ph = dir.path().join("phonon_3");
        fs::create_dir(&ph).unwrap();
        fs::write(ph.join("CONTCAR.2phonons"), POSCAR).unwrap();
        fs::write(ph.join("OUTCAR.2phonons"), "").unwrap();
        fs::write(ph.join("vasprun.xml.2phonons"), "<modeling/>").unwrap();

        let commands = YphonCommands {
            vasp_fij: sh("echo fij > superfij.out"),
            yphon: sh("cat > /dev/null; echo dos > vdos.out"),
        };
        let results = process_phonon_dos_yphon(dir.path(), &commands).unwrap();

        assert!(results.join("vdos_3").is_file());
        let volph: f64 = fs::read_to_string(results.join("volph_3")).unwrap().parse().unwrap();
        assert_relative_eq!(volph, 2.8f64.powi(3) / 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_yphon_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let ph = dir.path().join("phonon_0");
        fs::create_dir(&ph).unwrap();
        fs::write(ph.join("CONTCAR.2phonons"), POSCAR).unwrap();
        fs::write(ph.join("OUTCAR.2phonons"), "").unwrap();
        fs::write(ph.join("vasprun.xml.2phonons"), "").unwrap();

        let commands = YphonCommands {
            vasp_fij: sh("exit 2"),
            yphon: sh("true"),
        };
        assert!(matches!(
            process_phonon_dos_yphon(dir.path(), &commands),
            Err(VaspflowError::CommandFailed { .. })
        ));
    }
}
