//! # 单个 VASP 作业
//!
//! 一个 `VaspJob` 对应一次 VASP 运行，分三个阶段：
//! - `setup`: 备份输入、按顺序应用 `settings_override`
//! - `run`: 在作业目录中启动 `vasp_cmd`，stdout/stderr 重定向到 `output_file`
//! - `postprocess`: 给输出文件加后缀（最终作业移动，否则复制），可选传递 MAGMOM
//!
//! ## 依赖关系
//! - 被 `job/custodian.rs` 和 `workflow/` 使用
//! - 使用 `parsers/incar.rs`, `parsers/outcar.rs`, `utils/progress.rs`

use crate::error::{Result, VaspflowError};
use crate::parsers::outcar;
use crate::parsers::{Incar, IncarValue};
use crate::utils::progress;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

/// VASP 输入文件
pub const VASP_INPUT_FILES: &[&str] = &["INCAR", "KPOINTS", "POSCAR", "POTCAR"];

/// VASP 输出文件（以及运行时会被改写的输入文件）
pub const VASP_OUTPUT_FILES: &[&str] = &[
    "INCAR",
    "KPOINTS",
    "POSCAR",
    "CONTCAR",
    "OUTCAR",
    "OSZICAR",
    "vasprun.xml",
    "CHGCAR",
    "CHG",
    "WAVECAR",
    "PROCAR",
    "EIGENVAL",
    "DOSCAR",
    "IBZKPT",
    "PCDAT",
    "XDATCAR",
];

/// 作业开始前（或纠错时）对作业目录的修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SettingsOverride {
    /// 设置 INCAR 参数
    IncarSet { tags: BTreeMap<String, IncarValue> },
    /// 复制文件（源文件不存在时跳过）
    FileCopy { src: String, dest: String },
    /// 移动文件（源文件不存在时跳过）
    FileMove { src: String, dest: String },
    /// 删除文件
    FileDelete { path: String },
}

impl SettingsOverride {
    /// 由 `(TAG, value)` 列表构造 INCAR 修改
    pub fn incar<I, K, V>(tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<IncarValue>,
    {
        SettingsOverride::IncarSet {
            tags: tags
                .into_iter()
                .map(|(k, v)| (k.into().to_uppercase(), v.into()))
                .collect(),
        }
    }

    pub fn copy(src: &str, dest: &str) -> Self {
        SettingsOverride::FileCopy {
            src: src.to_string(),
            dest: dest.to_string(),
        }
    }

    pub fn delete(path: &str) -> Self {
        SettingsOverride::FileDelete {
            path: path.to_string(),
        }
    }

    /// 用上一步的 CONTCAR 作为本步的 POSCAR
    pub fn contcar_to_poscar() -> Self {
        Self::copy("CONTCAR", "POSCAR")
    }

    /// 在 `dir` 中执行修改
    pub fn apply(&self, dir: &Path) -> Result<()> {
        match self {
            SettingsOverride::IncarSet { tags } => {
                let path = dir.join("INCAR");
                let mut incar = if path.is_file() {
                    Incar::from_file(&path)?
                } else {
                    Incar::default()
                };
                for (tag, value) in tags {
                    incar.set(tag, value.clone());
                }
                incar.write_file(&path)?;
                log::debug!("{}: set {:?}", path.display(), tags.keys().collect::<Vec<_>>());
            }
            SettingsOverride::FileCopy { src, dest } => {
                let (src, dest) = (dir.join(src), dir.join(dest));
                if src.is_file() {
                    fs::copy(&src, &dest).map_err(|e| VaspflowError::write(&dest, e))?;
                    log::debug!("copied {} -> {}", src.display(), dest.display());
                } else {
                    log::warn!("{} not found, copy skipped", src.display());
                }
            }
            SettingsOverride::FileMove { src, dest } => {
                let (src, dest) = (dir.join(src), dir.join(dest));
                if src.is_file() {
                    fs::rename(&src, &dest).map_err(|e| VaspflowError::write(&dest, e))?;
                    log::debug!("moved {} -> {}", src.display(), dest.display());
                }
            }
            SettingsOverride::FileDelete { path } => {
                let path = dir.join(path);
                if path.is_file() {
                    fs::remove_file(&path).map_err(|e| VaspflowError::write(&path, e))?;
                    log::debug!("deleted {}", path.display());
                }
            }
        }
        Ok(())
    }
}

/// 单个 VASP 作业
#[derive(Debug, Clone)]
pub struct VaspJob {
    pub vasp_cmd: Vec<String>,
    pub output_file: String,
    /// 输出文件后缀，如 `.1relax`
    pub suffix: String,
    /// 最终作业：输出文件被移动而不是复制
    pub is_final: bool,
    /// 运行前把输入文件备份为 `*.orig`
    pub backup: bool,
    /// 把本次 OUTCAR 的磁矩写回 INCAR 的 MAGMOM
    pub copy_magmom: bool,
    pub settings_override: Vec<SettingsOverride>,
}

impl VaspJob {
    pub fn new(vasp_cmd: Vec<String>) -> Self {
        VaspJob {
            vasp_cmd,
            output_file: "vasp.out".to_string(),
            suffix: String::new(),
            is_final: true,
            backup: false,
            copy_magmom: false,
            settings_override: Vec::new(),
        }
    }

    pub fn output_file(mut self, name: &str) -> Self {
        self.output_file = name.to_string();
        self
    }

    pub fn suffix(mut self, suffix: &str) -> Self {
        self.suffix = suffix.to_string();
        self
    }

    pub fn final_job(mut self, is_final: bool) -> Self {
        self.is_final = is_final;
        self
    }

    pub fn backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    pub fn copy_magmom(mut self, copy_magmom: bool) -> Self {
        self.copy_magmom = copy_magmom;
        self
    }

    pub fn settings(mut self, settings: Vec<SettingsOverride>) -> Self {
        self.settings_override = settings;
        self
    }

    /// 作业名称，用于日志和 custodian.json
    pub fn name(&self) -> String {
        if self.suffix.is_empty() {
            "VaspJob".to_string()
        } else {
            format!("VaspJob{}", self.suffix)
        }
    }

    /// 准备作业目录
    pub fn setup(&self, dir: &Path) -> Result<()> {
        if self.backup {
            for name in VASP_INPUT_FILES {
                let src = dir.join(name);
                if src.is_file() {
                    let dest = dir.join(format!("{}.orig", name));
                    fs::copy(&src, &dest).map_err(|e| VaspflowError::write(&dest, e))?;
                }
            }
        }
        for action in &self.settings_override {
            action.apply(dir)?;
        }
        Ok(())
    }

    /// 启动 VASP 并等待结束
    pub fn run(&self, dir: &Path) -> Result<ExitStatus> {
        let (program, args) = self.vasp_cmd.split_first().ok_or_else(|| {
            VaspflowError::InvalidArgument("vasp_cmd must not be empty".to_string())
        })?;

        let out_path = dir.join(&self.output_file);
        let stdout = File::create(&out_path).map_err(|e| VaspflowError::write(&out_path, e))?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| VaspflowError::write(&out_path, e))?;

        log::info!("{}: running {} in {}", self.name(), self.vasp_cmd.join(" "), dir.display());
        let mut child = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => VaspflowError::CommandNotFound {
                    command: program.clone(),
                },
                _ => VaspflowError::CommandFailed {
                    command: self.vasp_cmd.join(" "),
                    stderr: e.to_string(),
                },
            })?;

        let spinner = progress::create_spinner(&format!("{} in {}", self.name(), dir.display()));
        let status = child.wait().map_err(|e| VaspflowError::CommandFailed {
            command: self.vasp_cmd.join(" "),
            stderr: e.to_string(),
        });
        spinner.finish_and_clear();

        let status = status?;
        log::debug!("{} exited with {}", self.name(), status);
        Ok(status)
    }

    /// 给输出文件加后缀，并按需传递磁矩
    pub fn postprocess(&self, dir: &Path) -> Result<()> {
        if !self.suffix.is_empty() {
            let names = VASP_OUTPUT_FILES
                .iter()
                .copied()
                .chain(std::iter::once(self.output_file.as_str()));
            for name in names {
                let src = dir.join(name);
                if !src.is_file() {
                    continue;
                }
                let dest = dir.join(format!("{}{}", name, self.suffix));
                if self.is_final {
                    fs::rename(&src, &dest).map_err(|e| VaspflowError::write(&dest, e))?;
                } else {
                    fs::copy(&src, &dest).map_err(|e| VaspflowError::write(&dest, e))?;
                }
            }
        }

        if self.copy_magmom && !self.is_final {
            self.copy_magmom_to_incar(dir)?;
        }
        Ok(())
    }

    fn copy_magmom_to_incar(&self, dir: &Path) -> Result<()> {
        let outcar_path = dir.join("OUTCAR");
        let moments = match outcar::extract_tot_mag_data(&outcar_path) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("MAGMOM not copied: {}", e);
                return Ok(());
            }
        };

        let incar_path = dir.join("INCAR");
        let mut incar = Incar::from_file(&incar_path)?;
        let magmom = moments
            .iter()
            .map(|m| format!("{:.3}", m.tot))
            .collect::<Vec<_>>()
            .join(" ");
        incar.set("MAGMOM", magmom);
        incar.write_file(&incar_path)
    }
}
