//! # 工作流模块
//!
//! 多步 VASP 计算的编排：准备目录、组织作业并交给 `job::Custodian` 运行。
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `job/`, `parsers/`, `config.rs`
//! - 子模块: files, params, relax, ev_curve, convergence, phonon, chgdiff

pub mod chgdiff;
pub mod convergence;
pub mod ev_curve;
pub mod files;
pub mod params;
pub mod phonon;
pub mod relax;

pub use convergence::ConvKind;
pub use ev_curve::{ev_curve_series, EvCurveOptions};
pub use relax::{three_step_relaxation, RelaxOptions, RelaxOverrides};
