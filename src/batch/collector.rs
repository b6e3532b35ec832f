//! # 文件收集器
//!
//! 根据根目录和名称模式收集待处理的文件或目录。
//!
//! ## 功能
//! - glob 模式匹配（逗号分隔多模式）
//! - 可选递归
//! - 可选只收集目录
//!
//! ## 依赖关系
//! - 被 `analysis/diagnostics.rs`, `commands/analyze/` 调用
//! - 使用 `walkdir` 遍历目录, `glob` 匹配名称

use crate::error::{Result, VaspflowError};
use crate::workflow::files::natural_cmp;

use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 文件收集器
pub struct FileCollector {
    /// 根目录
    root: PathBuf,
    /// 匹配模式列表
    patterns: Vec<String>,
    /// 是否递归
    recursive: bool,
    /// 收集目录而不是文件
    directories: bool,
}

impl FileCollector {
    /// 创建新的文件收集器
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            patterns: vec!["*".to_string()],
            recursive: false,
            directories: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.patterns = pattern
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if self.patterns.is_empty() {
            self.patterns = vec!["*".to_string()];
        }
        self
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn directories(mut self, directories: bool) -> Self {
        self.directories = directories;
        self
    }

    /// 收集所有匹配的条目，按路径自然顺序排序
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(VaspflowError::DirectoryNotFound {
                path: self.root.display().to_string(),
            });
        }

        let patterns = self
            .patterns
            .iter()
            .map(|p| Pattern::new(p).map_err(|e| VaspflowError::InvalidArgument(format!("pattern '{}': {}", p, e))))
            .collect::<Result<Vec<_>>>()?;

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut found: Vec<PathBuf> = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                if self.directories {
                    e.file_type().is_dir()
                } else {
                    e.file_type().is_file()
                }
            })
            .filter(|e| Self::matches(&patterns, e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();

        found.sort_by(|a, b| natural_cmp(&a.display().to_string(), &b.display().to_string()));
        Ok(found)
    }

    /// 检查名称是否匹配任一模式
    fn matches(patterns: &[Pattern], path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        patterns.iter().any(|p| p.matches(name))
    }
}
