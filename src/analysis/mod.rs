//! # 结果分析模块
//!
//! 从已完成的计算目录中提取数据：E-V/P-V 曲线、构型数据表、磁性、
//! 收敛性测试结果以及失败计算的诊断。
//!
//! ## 依赖关系
//! - 被 `commands/analyze/` 使用
//! - 使用 `parsers/`, `models/`, `batch/`
//! - 子模块: ev, configs, magnetism, convergence, diagnostics

pub mod configs;
pub mod convergence;
pub mod diagnostics;
pub mod ev;
pub mod magnetism;

pub use configs::{recursive_extract_configuration_data, ExtractOptions};
pub use convergence::{calculate_conv, ConvPoint};
pub use ev::{write_ev, write_pv};
