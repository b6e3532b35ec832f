//! # Slurm 脚本生成工具
//!
//! 生成 sbatch 提交脚本并提交。
//!
//! ## 依赖关系
//! - 被 `workflow/phonon.rs` 使用

use crate::error::{Result, VaspflowError};
use std::path::Path;
use std::process::Command;

/// Slurm 作业配置
#[derive(Debug, Clone)]
pub struct SlurmConfig {
    pub job_name: String,
    pub partition: Option<String>,
    pub nodes: u32,
    pub ntasks: u32,
    pub cpus_per_task: u32,
    pub mem_per_cpu: String,
    pub time_limit: String,
    pub modules: Vec<String>,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        SlurmConfig {
            job_name: "phonons".to_string(),
            partition: None,
            nodes: 1,
            ntasks: 32,
            cpus_per_task: 1,
            mem_per_cpu: "3G".to_string(),
            time_limit: "24:00:00".to_string(),
            modules: vec![],
        }
    }
}

/// 生成 sbatch 脚本内容
pub fn generate_sbatch_script(config: &SlurmConfig, workdir: &Path, exec_cmd: &str) -> String {
    let module_loads = config
        .modules
        .iter()
        .map(|m| format!("module load {}", m))
        .collect::<Vec<_>>()
        .join("\n");
    let partition = config
        .partition
        .as_ref()
        .map(|p| format!("#SBATCH --partition {}\n", p))
        .unwrap_or_default();

    format!(
        r#"#!/bin/bash
{}#SBATCH --nodes={}
#SBATCH --mem-per-cpu {}
#SBATCH --time {}
#SBATCH -c {}
#SBATCH -n {}
#SBATCH -J {}
#SBATCH -o %x.out
#SBATCH -e %x.err

set -euo pipefail

{}

cd "{}"
echo "Running: {}"
{}
"#,
        partition,
        config.nodes,
        config.mem_per_cpu,
        config.time_limit,
        config.cpus_per_task,
        config.ntasks,
        config.job_name,
        module_loads,
        workdir.display(),
        exec_cmd,
        exec_cmd,
    )
}

/// 在 `dir` 中执行 `sbatch <script>`，返回 sbatch 的输出
pub fn submit(dir: &Path, script: &str) -> Result<String> {
    let out = Command::new("sbatch")
        .arg(script)
        .current_dir(dir)
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VaspflowError::CommandNotFound {
                command: "sbatch".to_string(),
            },
            _ => VaspflowError::CommandFailed {
                command: format!("sbatch {}", script),
                stderr: e.to_string(),
            },
        })?;

    if out.status.success() {
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    } else {
        Err(VaspflowError::CommandFailed {
            command: format!("sbatch {}", script),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        })
    }
}
