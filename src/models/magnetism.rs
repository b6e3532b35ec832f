//! # 磁化数据模型
//!
//! OUTCAR 中 `magnetization (x)` 表格的表示，以及磁有序类型判定。
//!
//! ## 依赖关系
//! - 被 `parsers/outcar.rs` 构造
//! - 被 `analysis/magnetism.rs`, `analysis/configs.rs` 使用

use serde::{Deserialize, Serialize};

/// 单个离子的总磁矩
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IonMoment {
    /// 离子序号（从 1 开始，与 OUTCAR 一致）
    pub ion: usize,
    /// 总磁矩 (μB)
    pub tot: f64,
}

/// 磁化表中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct MagRow {
    /// 离子步序号（从 1 开始）
    pub step: usize,
    pub ion: usize,
    /// 与 `MagTable::headers` 一一对应
    pub values: Vec<f64>,
}

/// 一个 OUTCAR 中全部离子步的磁化数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MagTable {
    /// 列名（去掉 `# of ion` 之后），如 `s p d tot`
    pub headers: Vec<String>,
    pub rows: Vec<MagRow>,
}

impl MagTable {
    /// 最后一个离子步的序号
    pub fn last_step(&self) -> Option<usize> {
        self.rows.iter().map(|r| r.step).max()
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// 最后一个离子步中每个离子的 `tot` 磁矩
    pub fn last_step_tot(&self) -> Vec<IonMoment> {
        let (Some(step), Some(col)) = (self.last_step(), self.column("tot")) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter(|r| r.step == step)
            .filter_map(|r| {
                r.values.get(col).map(|&tot| IonMoment { ion: r.ion, tot })
            })
            .collect()
    }
}

/// 磁有序类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MagneticOrdering {
    /// 非磁
    NM,
    /// 反铁磁
    AFM,
    /// 铁磁
    FM,
    /// 亚铁磁
    FiM,
    /// 其他（自旋无序/阻挫）
    SF,
}

impl MagneticOrdering {
    /// 根据各离子总磁矩判定磁有序类型
    ///
    /// 判定顺序：全部为零 -> NM；总和为零 -> AFM；同号 -> FM；
    /// 正负离子数相等 -> FiM；否则 SF。
    pub fn classify(moments: &[f64], magmom_tol: f64, total_tol: f64) -> Self {
        let total: f64 = moments.iter().sum();

        if moments.iter().all(|m| m.abs() <= magmom_tol) {
            MagneticOrdering::NM
        } else if total.abs() <= total_tol {
            MagneticOrdering::AFM
        } else if moments.iter().all(|&m| m >= magmom_tol)
            || moments.iter().all(|&m| m <= -magmom_tol)
        {
            MagneticOrdering::FM
        } else {
            let up = moments.iter().filter(|&&m| m > magmom_tol).count();
            let down = moments.iter().filter(|&&m| m < -magmom_tol).count();
            if up == down {
                MagneticOrdering::FiM
            } else {
                MagneticOrdering::SF
            }
        }
    }
}

impl std::fmt::Display for MagneticOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MagneticOrdering::NM => "NM",
            MagneticOrdering::AFM => "AFM",
            MagneticOrdering::FM => "FM",
            MagneticOrdering::FiM => "FiM",
            MagneticOrdering::SF => "SF",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_orderings() {
        let tol = 1e-12;
        assert_eq!(MagneticOrdering::classify(&[0.0, 0.0], tol, tol), MagneticOrdering::NM);
        assert_eq!(MagneticOrdering::classify(&[2.1, -2.1], tol, tol), MagneticOrdering::AFM);
        assert_eq!(MagneticOrdering::classify(&[2.1, 1.9], tol, tol), MagneticOrdering::FM);
        assert_eq!(MagneticOrdering::classify(&[-2.1, -1.9], tol, tol), MagneticOrdering::FM);
        assert_eq!(
            MagneticOrdering::classify(&[3.0, -1.0, 2.0, -2.0], tol, tol),
            MagneticOrdering::FiM
        );
        assert_eq!(
            MagneticOrdering::classify(&[3.0, -1.0, 2.0], tol, tol),
            MagneticOrdering::SF
        );
    }

    #[test]
    fn test_last_step_tot() {
        let table = MagTable {
            headers: vec!["s".into(), "p".into(), "d".into(), "tot".into()],
            rows: vec![
                MagRow { step: 1, ion: 1, values: vec![0.0, 0.0, 1.0, 1.0] },
                MagRow { step: 2, ion: 1, values: vec![0.0, 0.0, 2.0, 2.1] },
                MagRow { step: 2, ion: 2, values: vec![0.0, 0.0, -2.0, -2.1] },
            ],
        };
        let tot = table.last_step_tot();
        assert_eq!(tot.len(), 2);
        assert_eq!(tot[0], IonMoment { ion: 1, tot: 2.1 });
        assert_eq!(tot[1], IonMoment { ion: 2, tot: -2.1 });
    }
}
