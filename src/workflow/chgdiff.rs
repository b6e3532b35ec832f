//! # 电荷密度差
//!
//! 在 `charge_density_difference/` 中做两次静态计算：只跑一个电子步的参考计算
//! (`.reference`) 和自洽收敛的计算 (`.charge_density`)，
//! 两者 CHGCAR 之差写入 `CHGCAR.difference`。
//!
//! ## 依赖关系
//! - 被 `commands/run.rs` 使用
//! - 使用 `job/`, `parsers/chgcar.rs`, `workflow/files.rs`

use super::files::{copy_required, create_new_dir};
use crate::config::RunSettings;
use crate::error::Result;
use crate::job::{SettingsOverride, VaspJob};
use crate::parsers::{Chgcar, IncarValue};
use crate::utils::output;

use std::path::{Path, PathBuf};

pub const CHGDIFF_DIR: &str = "charge_density_difference";

fn static_tags(nelm: i64) -> SettingsOverride {
    SettingsOverride::incar([
        ("EDIFF", IncarValue::from("1E-6")),
        ("IBRION", IncarValue::from(-1)),
        ("NSW", IncarValue::from(1)),
        ("ISIF", IncarValue::from(2)),
        ("NELM", IncarValue::from(nelm)),
        ("ISMEAR", IncarValue::from(-5)),
        ("SIGMA", IncarValue::from(0.05)),
        ("LCHARG", IncarValue::from(true)),
    ])
}

/// 参考计算与自洽计算
pub fn chgdiff_jobs(settings: &RunSettings, backup: bool) -> Vec<VaspJob> {
    vec![
        settings
            .job()
            .suffix(".reference")
            .final_job(false)
            .backup(backup)
            .settings(vec![static_tags(1)]),
        settings
            .job()
            .suffix(".charge_density")
            .final_job(true)
            .backup(backup)
            .settings(vec![static_tags(100)]),
    ]
}

/// 运行电荷密度差计算，返回 `CHGCAR.difference` 的路径
pub fn charge_density_difference(path: &Path, settings: &RunSettings, backup: bool) -> Result<PathBuf> {
    let dir = path.join(CHGDIFF_DIR);
    create_new_dir(&dir)?;
    copy_required(path, &dir, &["POSCAR", "POTCAR", "INCAR", "KPOINTS"])?;

    settings.run_jobs(&dir, chgdiff_jobs(settings, backup))?;

    let converged = Chgcar::from_file(&dir.join("CHGCAR.charge_density"))?;
    let reference = Chgcar::from_file(&dir.join("CHGCAR.reference"))?;
    let difference = (&converged - &reference)?;

    let out = dir.join("CHGCAR.difference");
    difference.write_file(&out)?;
    output::print_done(&format!("Charge density difference written to {}", out.display()));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::Incar;
    use crate::workflow::relax::tests::write_inputs;
    use std::fs;
    use tempfile::TempDir;

    /// NELM = 1 时写出密度 1，否则写出密度 3
    fn fake_chgcar_settings() -> RunSettings {
        let script = "if grep -q 'NELM *= *1$' INCAR; then v=1.0; else v=3.0; fi; \
            { cat POSCAR; echo; echo '    1    1    2'; echo \"$v $v\"; } > CHGCAR";
        RunSettings {
            vasp_cmd: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            handlers: vec![],
            ..RunSettings::default()
        }
    }

    #[test]
    fn test_charge_density_difference() {
        let dir = TempDir::new().unwrap();
        write_inputs(dir.path());

        let out = charge_density_difference(dir.path(), &fake_chgcar_settings(), false).unwrap();
        let diff = Chgcar::from_file(&out).unwrap();
        assert_eq!(diff.grid, [1, 1, 2]);
        assert_eq!(diff.total, vec![2.0, 2.0]);

        let reference = Incar::from_file(&dir.path().join(CHGDIFF_DIR).join("INCAR.reference")).unwrap();
        assert_eq!(reference.get_int("NELM"), Some(1));
        assert_eq!(reference.get("LCHARG"), Some(".TRUE."));
    }

    #[test]
    fn test_existing_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_inputs(dir.path());
        fs::create_dir(dir.path().join(CHGDIFF_DIR)).unwrap();
        assert!(charge_density_difference(dir.path(), &fake_chgcar_settings(), false).is_err());
    }
}
