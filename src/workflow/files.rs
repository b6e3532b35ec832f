//! # 目录与文件操作
//!
//! 工作流在体积目录之间复制、重命名、删除文件的辅助函数。
//!
//! ## 依赖关系
//! - 被 `workflow/` 与 `analysis/` 使用

use crate::error::{Result, VaspflowError};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

/// 列出 `dir` 下名称以 `prefix` 开头的子目录，按自然顺序排序（`vol_2` 在 `vol_10` 之前）
pub fn list_subdirs(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(VaspflowError::DirectoryNotFound {
            path: dir.display().to_string(),
        });
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| VaspflowError::read(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| dir_name(p).starts_with(prefix))
        .collect();
    dirs.sort_by(|a, b| natural_cmp(&dir_name(a), &dir_name(b)));
    Ok(dirs)
}

/// 路径最后一段
pub fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 目录名最后一个 `_` 之后的编号，如 `vol_12` -> `12`
pub fn folder_index(path: &Path) -> Option<String> {
    dir_name(path).rsplit_once('_').map(|(_, idx)| idx.to_string())
}

/// 自然排序：数字段按数值比较
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a.chars().peekable(), b.chars().peekable());
    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let mut na = String::new();
                while let Some(c) = a.peek().copied().filter(|c| c.is_ascii_digit()) {
                    na.push(c);
                    a.next();
                }
                let mut nb = String::new();
                while let Some(c) = b.peek().copied().filter(|c| c.is_ascii_digit()) {
                    nb.push(c);
                    b.next();
                }
                let ord = na
                    .trim_start_matches('0')
                    .len()
                    .cmp(&nb.trim_start_matches('0').len())
                    .then_with(|| na.trim_start_matches('0').cmp(nb.trim_start_matches('0')));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

/// 复制单个文件
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    fs::copy(src, dest).map_err(|e| VaspflowError::write(dest, e))?;
    log::debug!("copied {} -> {}", src.display(), dest.display());
    Ok(())
}

/// 从 `src_dir` 复制 `(源文件名, 目标文件名)`，源文件不存在时跳过
pub fn copy_pairs(src_dir: &Path, dest_dir: &Path, pairs: &[(&str, &str)]) -> Result<()> {
    for (src, dest) in pairs {
        let src = src_dir.join(src);
        if src.is_file() {
            copy_file(&src, &dest_dir.join(dest))?;
        }
    }
    Ok(())
}

/// 复制必需的文件，缺失时报错
pub fn copy_required(src_dir: &Path, dest_dir: &Path, names: &[&str]) -> Result<()> {
    for name in names {
        let src = src_dir.join(name);
        if !src.is_file() {
            return Err(VaspflowError::FileNotFound {
                path: src.display().to_string(),
            });
        }
        copy_file(&src, &dest_dir.join(name))?;
    }
    Ok(())
}

/// 删除存在的文件
pub fn remove_files(dir: &Path, names: &[String]) -> Result<()> {
    for name in names {
        let path = dir.join(name);
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| VaspflowError::write(&path, e))?;
            log::debug!("removed {}", path.display());
        }
    }
    Ok(())
}

/// 删除 `dir` 中除 `keep` 以外的全部文件和子目录
pub fn remove_all_except(dir: &Path, keep: &[&str]) -> Result<()> {
    for entry in fs::read_dir(dir).map_err(|e| VaspflowError::read(dir, e))? {
        let entry = entry.map_err(|e| VaspflowError::read(dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if keep.contains(&name.as_str()) {
            continue;
        }
        let path = entry.path();
        let removed = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.map_err(|e| VaspflowError::write(&path, e))?;
    }
    Ok(())
}

/// 创建一个此前不存在的目录
pub fn create_new_dir(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(VaspflowError::AlreadyExists {
            path: path.display().to_string(),
        });
    }
    fs::create_dir_all(path).map_err(|e| VaspflowError::write(path, e))
}
