//! # 作业监管模块
//!
//! 运行 VASP 并在出错时自动纠正、重试。
//!
//! ## 依赖关系
//! - 被 `workflow/` 使用
//! - 子模块: vasp_job, handlers, custodian

pub mod custodian;
pub mod handlers;
pub mod vasp_job;

pub use custodian::Custodian;
pub use handlers::{handler_from_name, ErrorHandler};
pub use vasp_job::{SettingsOverride, VaspJob};
