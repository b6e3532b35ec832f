//! # 参数记录
//!
//! 每次 E-V 系列计算把参数写入第一个未被占用的 `params_<n>.json`。

use crate::config::RunSettings;
use crate::error::{Result, VaspflowError};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesParams {
    pub path: String,
    pub volumes: Vec<f64>,
    pub vasp_cmd: Vec<String>,
    pub handlers: Vec<String>,
    pub errors_subset: Option<Vec<String>>,
    pub restarting: bool,
}

impl SeriesParams {
    pub fn new(path: &Path, volumes: &[f64], settings: &RunSettings, restarting: bool) -> Self {
        SeriesParams {
            path: path.display().to_string(),
            volumes: volumes.to_vec(),
            vasp_cmd: settings.vasp_cmd.clone(),
            handlers: settings.handlers.clone(),
            errors_subset: settings.errors_subset.clone(),
            restarting,
        }
    }

    /// 写入 `dir/params_<n>.json`，返回文件路径
    pub fn write_next(&self, dir: &Path) -> Result<PathBuf> {
        let path = (0..)
            .map(|n| dir.join(format!("params_{}.json", n)))
            .find(|p| !p.exists())
            .ok_or_else(|| VaspflowError::Other("no free params file name".to_string()))?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| VaspflowError::write(&path, e))?;
        Ok(path)
    }
}
