//! # 计算结果数据模型
//!
//! E-V 系列中每个体积点提取出的数据行。
//!
//! ## 依赖关系
//! - 被 `analysis/configs.rs` 构造
//! - 被 `commands/analyze/` 输出为表格/CSV

use super::magnetism::{IonMoment, MagneticOrdering};
use serde::Serialize;

/// 构型 (config_*) 在某一体积 (vol_*) 下的结果
#[derive(Debug, Clone, Serialize)]
pub struct ConfigRow {
    pub config: String,
    pub volume: f64,
    pub volume_per_atom: f64,
    pub energy: f64,
    pub energy_per_atom: f64,
    pub number_of_atoms: usize,
    pub total_magnetic_moment: Option<f64>,
    pub magnetic_ordering: Option<MagneticOrdering>,
    /// 各离子磁矩，不写入 CSV
    #[serde(skip)]
    pub mag_data: Option<Vec<IonMoment>>,
}

/// 按每原子能量取最低的 n 个
pub fn lowest_energy_configs(rows: &[ConfigRow], n: usize) -> Vec<ConfigRow> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| {
        a.energy_per_atom
            .partial_cmp(&b.energy_per_atom)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(n);
    sorted
}
