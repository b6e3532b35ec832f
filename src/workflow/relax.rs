//! # 三步弛豫
//!
//! 两次连续的结构弛豫 (`.1relax`, `.2relax`) 加一次静态计算 (`.3static`)。
//!
//! ## 依赖关系
//! - 被 `workflow/ev_curve.rs` 和 `commands/run.rs` 使用
//! - 使用 `job/`, `config.rs`

use crate::config::RunSettings;
use crate::error::{Result, VaspflowError};
use crate::job::{SettingsOverride, VaspJob};
use crate::parsers::IncarValue;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 第二、三步的设置修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaxOverrides {
    #[serde(default)]
    pub relax2: Vec<SettingsOverride>,
    #[serde(default)]
    pub static3: Vec<SettingsOverride>,
}

impl Default for RelaxOverrides {
    fn default() -> Self {
        RelaxOverrides {
            relax2: vec![SettingsOverride::contcar_to_poscar()],
            static3: vec![
                SettingsOverride::incar([
                    ("ALGO", IncarValue::from("Normal")),
                    ("IBRION", IncarValue::from(-1)),
                    ("NSW", IncarValue::from(0)),
                    ("ISMEAR", IncarValue::from(-5)),
                ]),
                SettingsOverride::contcar_to_poscar(),
            ],
        }
    }
}

impl RelaxOverrides {
    /// 从 JSON 文件读取
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| VaspflowError::read(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// 三步弛豫选项
#[derive(Debug, Clone, Default)]
pub struct RelaxOptions {
    pub copy_magmom: bool,
    pub backup: bool,
    /// `None` 使用默认设置
    pub overrides: Option<RelaxOverrides>,
}

/// 三步弛豫的作业列表
pub fn relaxation_jobs(settings: &RunSettings, opts: &RelaxOptions) -> Vec<VaspJob> {
    let overrides = opts.overrides.clone().unwrap_or_default();
    let step = |suffix: &str, is_final: bool, actions: Vec<SettingsOverride>| {
        settings
            .job()
            .suffix(suffix)
            .final_job(is_final)
            .backup(opts.backup)
            .copy_magmom(opts.copy_magmom)
            .settings(actions)
    };

    vec![
        step(".1relax", false, Vec::new()),
        step(".2relax", false, overrides.relax2),
        step(".3static", true, overrides.static3),
    ]
}

/// 在 `dir` 中运行三步弛豫；目录中需有 POSCAR, POTCAR, INCAR, KPOINTS
pub fn three_step_relaxation(dir: &Path, settings: &RunSettings, opts: &RelaxOptions) -> Result<()> {
    settings.run_jobs(dir, relaxation_jobs(settings, opts))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parsers::Incar;
    use tempfile::TempDir;

    /// 模拟 VASP：把 POSCAR 复制为 CONTCAR，写出 OSZICAR/OUTCAR
    pub(crate) fn fake_vasp_settings() -> RunSettings {
        let script = "cp POSCAR CONTCAR; \
            printf '   1 F= -.10000000E+02 E0= -.10000000E+02  d E =-.1E+00\\n' > OSZICAR; \
            printf '  external pressure =       1.50 kB  Pullay stress =        0.00 kB\\n' > OUTCAR";
        RunSettings {
            vasp_cmd: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            handlers: vec!["vasp".to_string()],
            ..RunSettings::default()
        }
    }

    pub(crate) const POSCAR: &str = "Fe2\n1.0\n2.8 0.0 0.0\n0.0 2.8 0.0\n0.0 0.0 2.8\nFe\n2\nDirect\n0.0 0.0 0.0\n0.5 0.5 0.5\n";

    pub(crate) fn write_inputs(dir: &Path) {
        fs::write(dir.join("POSCAR"), POSCAR).unwrap();
        fs::write(dir.join("INCAR"), "ALGO = Fast\nIBRION = 2\nNSW = 40\nISIF = 3\n").unwrap();
        fs::write(dir.join("KPOINTS"), "auto\n0\nGamma\n8 8 8\n0 0 0\n").unwrap();
        fs::write(dir.join("POTCAR"), "PAW_PBE Fe\n").unwrap();
    }

    #[test]
    fn test_three_step_relaxation_outputs() {
        let dir = TempDir::new().unwrap();
        write_inputs(dir.path());

        three_step_relaxation(dir.path(), &fake_vasp_settings(), &RelaxOptions::default()).unwrap();

        for suffix in [".1relax", ".2relax", ".3static"] {
            assert!(dir.path().join(format!("OSZICAR{}", suffix)).is_file());
            assert!(dir.path().join(format!("INCAR{}", suffix)).is_file());
        }
        // 最终作业移动输出
        assert!(!dir.path().join("CONTCAR").exists());
        assert!(dir.path().join("CONTCAR.3static").is_file());

        let static_incar = Incar::from_file(&dir.path().join("INCAR.3static")).unwrap();
        assert_eq!(static_incar.get_int("IBRION"), Some(-1));
        assert_eq!(static_incar.get_int("NSW"), Some(0));
        assert_eq!(static_incar.get_int("ISMEAR"), Some(-5));
        let relax_incar = Incar::from_file(&dir.path().join("INCAR.2relax")).unwrap();
        assert_eq!(relax_incar.get("ALGO"), Some("Fast"));
    }

    #[test]
    fn test_custom_overrides_replace_defaults() {
        let overrides = RelaxOverrides {
            relax2: vec![],
            static3: vec![SettingsOverride::incar([("NSW", 0)])],
        };
        let opts = RelaxOptions {
            overrides: Some(overrides),
            ..RelaxOptions::default()
        };
        let jobs = relaxation_jobs(&RunSettings::default(), &opts);
        assert!(jobs[1].settings_override.is_empty());
        assert_eq!(jobs[2].settings_override.len(), 1);
        assert!(jobs[2].is_final);
        assert!(!jobs[0].is_final);
    }

    #[test]
    fn test_overrides_from_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("overrides.json");
        fs::write(
            &path,
            r#"{"static3": [{"action": "incar_set", "tags": {"NSW": 0, "LORBIT": 11}}]}"#,
        )
        .unwrap();
        let o = RelaxOverrides::from_file(&path).unwrap();
        assert!(o.relax2.is_empty());
        assert_eq!(o.static3, vec![SettingsOverride::incar([("NSW", 0), ("LORBIT", 11)])]);
    }
}
