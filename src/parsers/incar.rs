//! # VASP INCAR 读写
//!
//! INCAR 表示为有序的 `(TAG, value)` 列表，修改参数时保留原有顺序，
//! 便于与用户模板对照。
//!
//! ## 依赖关系
//! - 被 `job/` 与 `workflow/` 使用

use crate::error::{Result, VaspflowError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// INCAR 参数值
///
/// 从 TOML/JSON 配置读入时按原生类型区分；写入 INCAR 时统一格式化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for IncarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncarValue::Bool(true) => write!(f, ".TRUE."),
            IncarValue::Bool(false) => write!(f, ".FALSE."),
            IncarValue::Int(i) => write!(f, "{}", i),
            IncarValue::Float(x) => write!(f, "{}", x),
            IncarValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for IncarValue {
    fn from(v: bool) -> Self {
        IncarValue::Bool(v)
    }
}

impl From<i64> for IncarValue {
    fn from(v: i64) -> Self {
        IncarValue::Int(v)
    }
}

impl From<i32> for IncarValue {
    fn from(v: i32) -> Self {
        IncarValue::Int(v as i64)
    }
}

impl From<f64> for IncarValue {
    fn from(v: f64) -> Self {
        IncarValue::Float(v)
    }
}

impl From<&str> for IncarValue {
    fn from(v: &str) -> Self {
        IncarValue::Text(v.to_string())
    }
}

impl From<String> for IncarValue {
    fn from(v: String) -> Self {
        IncarValue::Text(v)
    }
}

/// INCAR 文件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Incar {
    params: Vec<(String, String)>,
}

impl Incar {
    /// 读取 INCAR 文件
    pub fn from_file(path: &Path) -> Result<Self> {
        // INCAR 中可能含有无效的 UTF-8 字符
        let bytes = fs::read(path).map_err(|e| VaspflowError::read(path, e))?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    /// 从字符串解析，`#` 与 `!` 之后为注释，同一行可用 `;` 分隔多个赋值
    pub fn parse(content: &str) -> Self {
        let mut incar = Incar::default();

        for line in content.lines() {
            let line = line.split(['#', '!']).next().unwrap_or_default();
            for assignment in line.split(';') {
                if let Some((tag, value)) = assignment.split_once('=') {
                    let tag = tag.trim().to_uppercase();
                    if tag.is_empty() {
                        continue;
                    }
                    incar.set(&tag, value.trim());
                }
            }
        }

        incar
    }

    /// 获取参数值（TAG 不区分大小写）
    pub fn get(&self, tag: &str) -> Option<&str> {
        let tag = tag.to_uppercase();
        self.params
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
    }

    /// 获取整数参数
    pub fn get_int(&self, tag: &str) -> Option<i64> {
        self.get(tag).and_then(|v| v.parse().ok())
    }

    /// 获取浮点参数
    pub fn get_float(&self, tag: &str) -> Option<f64> {
        self.get(tag)
            .and_then(|v| v.replace(['D', 'd'], "E").parse().ok())
    }

    /// 设置参数；已存在的 TAG 原位替换，否则追加
    pub fn set(&mut self, tag: &str, value: impl Into<IncarValue>) {
        let tag = tag.to_uppercase();
        let value = value.into().to_string();
        match self.params.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, v)) => *v = value,
            None => self.params.push((tag, value)),
        }
    }

    /// 写出 INCAR 文件
    pub fn write_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_string()).map_err(|e| VaspflowError::write(path, e))
    }
}

impl fmt::Display for Incar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.params.iter().map(|(t, _)| t.len()).max().unwrap_or(0);
        for (tag, value) in &self.params {
            writeln!(f, "{:n$} = {}", tag, value, n = n)?;
        }
        Ok(())
    }
}
