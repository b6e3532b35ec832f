//! # 批量处理模块
//!
//! 对大量计算目录做并行分析。
//!
//! ## 功能
//! - 收集匹配的文件或目录
//! - 并行处理
//! - 进度反馈与统计
//!
//! ## 依赖关系
//! - 被 `analysis/` 与 `commands/analyze/` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::{BatchResult, BatchRunner, ProcessResult};
