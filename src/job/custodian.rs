//! # 作业监管
//!
//! 依次运行一组 `VaspJob`。每次运行结束后用全部处理器检查输出，
//! 发现问题时把当前文件备份到 `error.<n>/`、应用纠正动作并重新运行。
//! 整个监管过程中的纠错次数不超过 `max_errors`。
//!
//! 运行记录写入作业目录下的 `custodian.json`。
//!
//! ## 依赖关系
//! - 被 `workflow/` 使用
//! - 使用 `job/vasp_job.rs`, `job/handlers.rs`

use super::handlers::{Correction, ErrorHandler};
use super::vasp_job::VaspJob;
use crate::error::{Result, VaspflowError};
use crate::utils::output;

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// 运行记录文件名
pub const RUN_LOG: &str = "custodian.json";

/// 单个作业的运行记录
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job: String,
    pub suffix: String,
    pub corrections: Vec<Correction>,
    pub nonzero_return_code: bool,
}

/// 作业监管器
pub struct Custodian {
    handlers: Vec<Box<dyn ErrorHandler>>,
    jobs: Vec<VaspJob>,
    max_errors: usize,
}

impl Custodian {
    pub fn new(handlers: Vec<Box<dyn ErrorHandler>>, jobs: Vec<VaspJob>, max_errors: usize) -> Self {
        Custodian {
            handlers,
            jobs,
            max_errors,
        }
    }

    /// 在 `dir` 中运行全部作业
    pub fn run(&mut self, dir: &Path) -> Result<Vec<JobRecord>> {
        if !dir.is_dir() {
            return Err(VaspflowError::DirectoryNotFound {
                path: dir.display().to_string(),
            });
        }

        let mut records = Vec::new();
        let mut total_errors = 0;

        for job in self.jobs.clone() {
            output::print_info(&format!("{} in {}", job.name(), dir.display()));
            let record = self.run_job(&job, dir, &mut total_errors, &mut records)?;
            records.push(record);
            write_run_log(dir, &records)?;
        }

        Ok(records)
    }

    fn run_job(
        &mut self,
        job: &VaspJob,
        dir: &Path,
        total_errors: &mut usize,
        records: &mut Vec<JobRecord>,
    ) -> Result<JobRecord> {
        job.setup(dir)?;

        let mut record = JobRecord {
            job: job.name(),
            suffix: job.suffix.clone(),
            corrections: Vec::new(),
            nonzero_return_code: false,
        };

        loop {
            let status = job.run(dir)?;
            record.nonzero_return_code = !status.success();

            let mut triggered = Vec::new();
            for (i, handler) in self.handlers.iter_mut().enumerate() {
                if handler.check(dir)? {
                    log::info!("{} triggered by {}", handler.name(), job.name());
                    triggered.push(i);
                }
            }

            if triggered.is_empty() {
                if status.success() {
                    break;
                }
                records.push(record.clone());
                write_run_log(dir, records)?;
                return Err(VaspflowError::UnrecoverableError {
                    job: job.name(),
                    reason: format!("VASP exited with {} and no handler matched", status),
                });
            }

            if *total_errors >= self.max_errors {
                records.push(record.clone());
                write_run_log(dir, records)?;
                return Err(VaspflowError::MaxErrorsReached {
                    max_errors: self.max_errors,
                    dir: dir.display().to_string(),
                });
            }

            let backup = backup_error_files(dir)?;
            log::debug!("backed up {} to {}", dir.display(), backup.display());

            for i in triggered {
                let handler = &mut self.handlers[i];
                let correction = handler.correct(dir)?;
                *total_errors += 1;
                if correction.actions.is_empty() {
                    record.corrections.push(correction.clone());
                    records.push(record.clone());
                    write_run_log(dir, records)?;
                    return Err(VaspflowError::UnrecoverableError {
                        job: job.name(),
                        reason: format!("{} has no correction for {:?}", correction.handler, correction.errors),
                    });
                }
                for action in &correction.actions {
                    action.apply(dir)?;
                }
                output::print_warning(&format!(
                    "{}: {:?} corrected by {}",
                    job.name(),
                    correction.errors,
                    correction.handler
                ));
                record.corrections.push(correction);
            }
        }

        job.postprocess(dir)?;
        Ok(record)
    }
}

/// 把作业目录中的全部普通文件复制到下一个 `error.<n>/`
pub fn backup_error_files(dir: &Path) -> Result<PathBuf> {
    let existing = fs::read_dir(dir)
        .map_err(|e| VaspflowError::read(dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("error."))
        .count();

    let backup = dir.join(format!("error.{}", existing + 1));
    fs::create_dir(&backup).map_err(|e| VaspflowError::write(&backup, e))?;

    for entry in fs::read_dir(dir).map_err(|e| VaspflowError::read(dir, e))? {
        let entry = entry.map_err(|e| VaspflowError::read(dir, e))?;
        let path = entry.path();
        if path.is_file() {
            let dest = backup.join(entry.file_name());
            fs::copy(&path, &dest).map_err(|e| VaspflowError::write(&dest, e))?;
        }
    }
    Ok(backup)
}

fn write_run_log(dir: &Path, records: &[JobRecord]) -> Result<()> {
    let path = dir.join(RUN_LOG);
    let json = serde_json::to_string_pretty(records)?;
    fs::write(&path, json).map_err(|e| VaspflowError::write(&path, e))
}
