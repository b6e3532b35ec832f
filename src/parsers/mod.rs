//! # 解析器模块
//!
//! VASP 输入/输出文件的读写。
//!
//! ## 依赖关系
//! - 被 `job/`, `workflow/`, `analysis/` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: poscar, incar, kpoints, outcar, oszicar, chgcar

pub mod chgcar;
pub mod incar;
pub mod kpoints;
pub mod oszicar;
pub mod outcar;
pub mod poscar;

pub use chgcar::Chgcar;
pub use incar::{Incar, IncarValue};
pub use kpoints::Kpoints;
