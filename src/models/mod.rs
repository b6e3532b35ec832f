//! # 数据模型模块
//!
//! 定义晶体结构、磁化数据和计算结果数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `workflow/` 和 `analysis/` 使用
//! - 子模块: structure, magnetism, calculation

pub mod calculation;
pub mod magnetism;
pub mod structure;

pub use calculation::{lowest_energy_configs, ConfigRow};
pub use magnetism::{IonMoment, MagRow, MagTable, MagneticOrdering};
pub use structure::{Atom, Crystal, Lattice};
