//! # 失败计算诊断
//!
//! - 列出各 `vol*` 目录中由作业监管留下的 `error*` 备份
//! - 递归查找出现 NELM 未收敛提示的文件
//!
//! ## 依赖关系
//! - 被 `commands/analyze/` 使用
//! - 使用 `batch/`, `parsers/outcar.rs`

use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::error::{Result, VaspflowError};
use crate::parsers::outcar;
use crate::workflow::files::{dir_name, list_subdirs, natural_cmp};

use std::fs;
use std::path::{Path, PathBuf};

/// 含有 `error*` 条目的体积目录
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorFolders {
    pub vol_dir: String,
    pub errors: Vec<String>,
}

/// 每个 `vol*` 目录下以 `error` 开头的条目；没有错误的目录不列出
pub fn custodian_errors_location(path: &Path) -> Result<Vec<ErrorFolders>> {
    let mut found = Vec::new();
    for vol_dir in list_subdirs(path, "vol")? {
        let mut errors: Vec<String> = fs::read_dir(&vol_dir)
            .map_err(|e| VaspflowError::read(&vol_dir, e))?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("error"))
            .collect();
        if errors.is_empty() {
            continue;
        }
        errors.sort_by(|a, b| natural_cmp(a, b));
        found.push(ErrorFolders {
            vol_dir: dir_name(&vol_dir),
            errors,
        });
    }
    Ok(found)
}

/// 递归查找包含 NELM 未收敛提示的文件，`jobs == 0` 时使用全部 CPU
pub fn nelm_reached(path: &Path, jobs: usize) -> Result<Vec<PathBuf>> {
    let files = FileCollector::new(path).recursive(true).collect()?;
    let result = BatchRunner::new(jobs).quiet().run(files, |file| match outcar::nelm_reached(file) {
        Ok(true) => ProcessResult::Success(()),
        Ok(false) => ProcessResult::Skipped("converged".to_string()),
        Err(e) => ProcessResult::Failed(e.to_string()),
    })?;

    log::info!(
        "scanned {} files, {} with NELM hits, {} unreadable",
        result.total(),
        result.outputs.len(),
        result.failures.len()
    );
    for (file, err) in &result.failures {
        log::warn!("cannot scan {}: {}", file.display(), err);
    }
    Ok(result.outputs.into_iter().map(|(file, _)| file).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::outcar::NELM_MESSAGE;
    use tempfile::TempDir;

    #[test]
    fn test_custodian_errors_location() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("vol_0/error.10")).unwrap();
        fs::create_dir_all(dir.path().join("vol_0/error.2")).unwrap();
        fs::create_dir_all(dir.path().join("vol_1")).unwrap();
        fs::write(dir.path().join("vol_1/INCAR"), "").unwrap();

        let found = custodian_errors_location(dir.path()).unwrap();
        assert_eq!(
            found,
            vec![ErrorFolders {
                vol_dir: "vol_0".to_string(),
                errors: vec!["error.2".to_string(), "error.10".to_string()],
            }]
        );
    }

    #[test]
    fn test_nelm_reached_walks_tree() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("vol_0/error.1")).unwrap();
        fs::write(dir.path().join("vol_0/OUTCAR.1relax"), "all fine\n").unwrap();
        fs::write(
            dir.path().join("vol_0/error.1/vasp.out"),
            format!(" {} number of steps\n", NELM_MESSAGE),
        )
        .unwrap();
        // 非 UTF-8 文件同样可以扫描
        fs::write(dir.path().join("vol_0/WAVECAR"), [0xff, 0xfe, 0x00]).unwrap();

        let hits = nelm_reached(dir.path(), 2).unwrap();
        assert_eq!(hits, vec![dir.path().join("vol_0/error.1/vasp.out")]);
    }
}
