//! # 运行配置
//!
//! 所有工作流共享的作业设置，可从 TOML 文件读取，命令行参数覆盖文件中的值。
//!
//! ```toml
//! vasp_cmd = ["srun", "vasp_std"]
//! handlers = ["vasp", "unconverged"]
//! errors_subset = ["zbrent", "brmix"]
//! max_errors = 3
//! output_file = "vasp.out"
//! ```
//!
//! ## 依赖关系
//! - 被 `commands/` 和 `workflow/` 使用
//! - 使用 `job/`

use crate::error::{Result, VaspflowError};
use crate::job::{handler_from_name, Custodian, ErrorHandler, VaspJob};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 作业设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    /// 运行 VASP 的命令，如 `["srun", "vasp_std"]`
    pub vasp_cmd: Vec<String>,
    /// 错误处理器名称
    pub handlers: Vec<String>,
    /// `vasp` 处理器只捕获这些错误
    pub errors_subset: Option<Vec<String>>,
    pub max_errors: usize,
    pub output_file: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            vasp_cmd: vec!["vasp_std".to_string()],
            handlers: vec!["vasp".to_string(), "unconverged".to_string()],
            errors_subset: None,
            max_errors: 3,
            output_file: "vasp.out".to_string(),
        }
    }
}

impl RunSettings {
    /// 读取 TOML 配置；`path` 为 `None` 时使用默认值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path).map_err(|e| VaspflowError::read(path, e))?;
        let settings: Self = toml::from_str(&contents)?;
        settings.validate()?;
        log::debug!("loaded run settings from {}", path.display());
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.vasp_cmd.is_empty() {
            return Err(VaspflowError::InvalidArgument(
                "vasp_cmd must contain at least one element".to_string(),
            ));
        }
        Ok(())
    }

    /// 命令行参数覆盖
    pub fn with_overrides(
        mut self,
        vasp_cmd: Option<&str>,
        handlers: Option<Vec<String>>,
        max_errors: Option<usize>,
        output_file: Option<String>,
    ) -> Result<Self> {
        if let Some(cmd) = vasp_cmd {
            self.vasp_cmd = cmd.split_whitespace().map(String::from).collect();
        }
        if let Some(h) = handlers {
            self.handlers = h;
        }
        if let Some(m) = max_errors {
            self.max_errors = m;
        }
        if let Some(o) = output_file {
            self.output_file = o;
        }
        self.validate()?;
        Ok(self)
    }

    /// 构造处理器实例
    pub fn build_handlers(&self) -> Result<Vec<Box<dyn ErrorHandler>>> {
        self.handlers
            .iter()
            .map(|name| handler_from_name(name, &self.output_file, self.errors_subset.as_deref()))
            .collect()
    }

    /// 带有本设置中命令与输出文件的作业模板
    pub fn job(&self) -> VaspJob {
        VaspJob::new(self.vasp_cmd.clone()).output_file(&self.output_file)
    }

    /// 监管一组作业
    pub fn custodian(&self, jobs: Vec<VaspJob>) -> Result<Custodian> {
        Ok(Custodian::new(self.build_handlers()?, jobs, self.max_errors))
    }

    /// 在 `dir` 中运行一组作业
    pub fn run_jobs(&self, dir: &Path, jobs: Vec<VaspJob>) -> Result<()> {
        self.custodian(jobs)?.run(dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let s = RunSettings::load(None).unwrap();
        assert_eq!(s.vasp_cmd, vec!["vasp_std"]);
        assert_eq!(s.max_errors, 3);
        assert_eq!(s.build_handlers().unwrap().len(), 2);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vaspflow.toml");
        fs::write(&path, "vasp_cmd = [\"srun\", \"vasp_std\"]\nmax_errors = 5\n").unwrap();

        let s = RunSettings::load(Some(&path)).unwrap();
        assert_eq!(s.vasp_cmd, vec!["srun", "vasp_std"]);
        assert_eq!(s.max_errors, 5);
        assert_eq!(s.output_file, "vasp.out");
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vaspflow.toml");
        fs::write(&path, "max_error = 5\n").unwrap();
        assert!(matches!(
            RunSettings::load(Some(&path)),
            Err(VaspflowError::ConfigError(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let s = RunSettings::default()
            .with_overrides(Some("mpirun -np 4 vasp_gam"), Some(vec!["nonconverging".into()]), Some(1), None)
            .unwrap();
        assert_eq!(s.vasp_cmd, vec!["mpirun", "-np", "4", "vasp_gam"]);
        assert_eq!(s.handlers, vec!["nonconverging"]);
        assert_eq!(s.max_errors, 1);
        assert!(RunSettings::default().with_overrides(Some("  "), None, None, None).is_err());
    }
}
