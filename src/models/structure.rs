//! # 晶体结构数据模型
//!
//! 晶格 + 分数坐标的最小结构表示，满足工作流所需的操作：
//! 体积缩放、超胞构造、六方晶格判断。
//!
//! ## 依赖关系
//! - 被 `parsers/poscar.rs`, `parsers/kpoints.rs`, `workflow/` 使用
//! - 无外部模块依赖

use crate::error::{Result, VaspflowError};
use serde::{Deserialize, Serialize};

/// 晶格参数表示
/// 六方判断的边长容差 (Å)
pub const HEX_LENGTH_TOL: f64 = 0.01;
/// 六方判断的角度容差 (°)
pub const HEX_ANGLE_TOL: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    #[cfg(test)]
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let cos_gamma = gamma.to_radians().cos();
        let sin_gamma = gamma.to_radians().sin();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).sqrt();

        Lattice {
            matrix: [a_vec, b_vec, [c1, c2, c3]],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 晶格常数 (a, b, c)
    pub fn lengths(&self) -> [f64; 3] {
        let norm = |v: [f64; 3]| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        [
            norm(self.matrix[0]),
            norm(self.matrix[1]),
            norm(self.matrix[2]),
        ]
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a, b, c] = self.lengths();
        let dot = |u: [f64; 3], v: [f64; 3]| u[0] * v[0] + u[1] * v[1] + u[2] * v[2];
        let [a_vec, b_vec, c_vec] = self.matrix;

        let alpha = (dot(b_vec, c_vec) / (b * c)).acos().to_degrees();
        let beta = (dot(a_vec, c_vec) / (a * c)).acos().to_degrees();
        let gamma = (dot(a_vec, b_vec) / (a * b)).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }

    /// 计算晶格体积（带符号的行列式）
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;
        a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0])
    }

    /// 各向同性缩放到目标体积
    pub fn scale_to_volume(&self, volume: f64) -> Result<Lattice> {
        let current = self.volume().abs();
        if volume <= 0.0 || current <= 0.0 {
            return Err(VaspflowError::InvalidStructure(format!(
                "cannot scale lattice of volume {} to {}",
                current, volume
            )));
        }
        let factor = (volume / current).cbrt();
        let mut matrix = self.matrix;
        for row in matrix.iter_mut() {
            for x in row.iter_mut() {
                *x *= factor;
            }
        }
        Ok(Lattice { matrix })
    }

    /// 判断是否为六方晶格：两个边长相等，夹角为 90/90/120（任意排列）
    ///
    /// 常用容差为 [`HEX_LENGTH_TOL`] 与 [`HEX_ANGLE_TOL`]。
    pub fn is_hexagonal(&self, length_tol: f64, angle_tol: f64) -> bool {
        let (a, b, c, alpha, beta, gamma) = self.parameters();
        let lengths = [a, b, c];
        let angles = [alpha, beta, gamma];

        let right = angles
            .iter()
            .filter(|x| (**x - 90.0).abs() < angle_tol)
            .count();
        let hex_angle = angles
            .iter()
            .position(|x| (*x - 120.0).abs() < angle_tol);

        match hex_angle {
            // 120° 夹角对应的两个边长必须相等
            Some(i) if right == 2 => {
                let (j, k) = match i {
                    0 => (1, 2),
                    1 => (0, 2),
                    _ => (0, 1),
                };
                (lengths[j] - lengths[k]).abs() < length_tol
            }
            _ => false,
        }
    }

    /// 笛卡尔坐标转分数坐标
    pub fn cart_to_frac(&self, cart: [f64; 3]) -> [f64; 3] {
        let m = self.matrix;
        let det = self.volume();

        if det.abs() < 1e-10 {
            return cart;
        }

        let inv = [
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) / det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) / det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) / det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
            ],
        ];

        // 行向量约定: cart = frac · M  =>  frac = cart · M^-1
        [
            cart[0] * inv[0][0] + cart[1] * inv[1][0] + cart[2] * inv[2][0],
            cart[0] * inv[0][1] + cart[1] * inv[1][1] + cart[2] * inv[2][1],
            cart[0] * inv[0][2] + cart[1] * inv[1][2] + cart[2] * inv[2][2],
        ]
    }
}

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号
    pub element: String,

    /// 分数坐标 [x, y, z]
    pub position: [f64; 3],

    /// 磁矩 (μB)，来自 OUTCAR
    pub magmom: Option<f64>,
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
            magmom: None,
        }
    }

    pub fn with_magmom(mut self, magmom: f64) -> Self {
        self.magmom = Some(magmom);
        self
    }
}

/// 晶体结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crystal {
    /// 结构名称
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表
    pub atoms: Vec<Atom>,
}

impl Crystal {
    pub fn new(name: impl Into<String>, lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Crystal {
            name: name.into(),
            lattice,
            atoms,
        }
    }

    pub fn num_sites(&self) -> usize {
        self.atoms.len()
    }

    /// 晶胞体积 (Å³)
    pub fn volume(&self) -> f64 {
        self.lattice.volume().abs()
    }

    /// 缩放晶格到目标体积，分数坐标保持不变
    pub fn scale_lattice(&mut self, volume: f64) -> Result<()> {
        self.lattice = self.lattice.scale_to_volume(volume)?;
        Ok(())
    }

    /// 按对角缩放矩阵 [na, nb, nc] 构造超胞
    pub fn make_supercell(&mut self, scaling: [usize; 3]) -> Result<()> {
        if scaling.iter().any(|&n| n == 0) {
            return Err(VaspflowError::InvalidStructure(format!(
                "supercell multipliers must be positive, got {:?}",
                scaling
            )));
        }

        let mut matrix = self.lattice.matrix;
        for (row, &n) in matrix.iter_mut().zip(scaling.iter()) {
            for x in row.iter_mut() {
                *x *= n as f64;
            }
        }

        let [na, nb, nc] = scaling;
        let mut atoms = Vec::with_capacity(self.atoms.len() * na * nb * nc);
        for atom in &self.atoms {
            for i in 0..na {
                for j in 0..nb {
                    for k in 0..nc {
                        let p = atom.position;
                        let mut replica = atom.clone();
                        replica.position = [
                            (p[0] + i as f64) / na as f64,
                            (p[1] + j as f64) / nb as f64,
                            (p[2] + k as f64) / nc as f64,
                        ];
                        atoms.push(replica);
                    }
                }
            }
        }

        self.lattice = Lattice::from_vectors(matrix);
        self.atoms = atoms;
        Ok(())
    }

    /// 元素计数（按首次出现顺序）
    pub fn species_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for atom in &self.atoms {
            match counts.iter_mut().find(|(e, _)| *e == atom.element) {
                Some((_, n)) => *n += 1,
                None => counts.push((atom.element.clone(), 1)),
            }
        }
        counts
    }

    /// 计算化学式（元素按首次出现顺序）
    pub fn formula(&self) -> String {
        self.species_counts()
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fe_bcc() -> Crystal {
        let lattice = Lattice::from_vectors([[2.87, 0.0, 0.0], [0.0, 2.87, 0.0], [0.0, 0.0, 2.87]]);
        Crystal::new(
            "Fe",
            lattice,
            vec![
                Atom::new("Fe", [0.0, 0.0, 0.0]),
                Atom::new("Fe", [0.5, 0.5, 0.5]),
            ],
        )
    }

    #[test]
    fn test_lattice_volume_cubic() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        assert_relative_eq!(lattice.volume().abs(), 125.0, epsilon = 1e-6);
    }

    #[test]
    fn test_scale_lattice_keeps_fractional_coordinates() {
        let mut crystal = fe_bcc();
        let before: Vec<[f64; 3]> = crystal.atoms.iter().map(|a| a.position).collect();

        crystal.scale_lattice(30.0).unwrap();

        assert_relative_eq!(crystal.volume(), 30.0, epsilon = 1e-9);
        let after: Vec<[f64; 3]> = crystal.atoms.iter().map(|a| a.position).collect();
        assert_eq!(before, after);

        let (a, b, c, _, _, _) = crystal.lattice.parameters();
        assert_relative_eq!(a, b, epsilon = 1e-12);
        assert_relative_eq!(b, c, epsilon = 1e-12);
    }

    #[test]
    fn test_scale_lattice_rejects_non_positive_volume() {
        let mut crystal = fe_bcc();
        assert!(crystal.scale_lattice(0.0).is_err());
        assert!(crystal.scale_lattice(-3.0).is_err());
    }

    #[test]
    fn test_make_supercell() {
        let mut crystal = fe_bcc();
        let volume = crystal.volume();

        crystal.make_supercell([2, 2, 1]).unwrap();

        assert_eq!(crystal.num_sites(), 8);
        assert_relative_eq!(crystal.volume(), volume * 4.0, epsilon = 1e-9);
        assert!(crystal
            .atoms
            .iter()
            .all(|a| a.position.iter().all(|&x| (0.0..1.0).contains(&x))));
        assert!(crystal.make_supercell([0, 1, 1]).is_err());
    }

    #[test]
    fn test_is_hexagonal() {
        let hex = Lattice::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 120.0);
        assert!(hex.is_hexagonal(HEX_LENGTH_TOL, HEX_ANGLE_TOL));

        let cubic = Lattice::from_parameters(3.0, 3.0, 3.0, 90.0, 90.0, 90.0);
        assert!(!cubic.is_hexagonal(HEX_LENGTH_TOL, HEX_ANGLE_TOL));

        // 轻微畸变的六方晶胞仍视为六方
        let distorted = Lattice::from_parameters(3.0, 3.005, 5.0, 90.5, 89.0, 119.0);
        assert!(distorted.is_hexagonal(HEX_LENGTH_TOL, HEX_ANGLE_TOL));
        let monoclinic = Lattice::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 110.0);
        assert!(!monoclinic.is_hexagonal(HEX_LENGTH_TOL, HEX_ANGLE_TOL));
        let unequal = Lattice::from_parameters(3.0, 3.1, 5.0, 90.0, 90.0, 120.0);
        assert!(!unequal.is_hexagonal(HEX_LENGTH_TOL, HEX_ANGLE_TOL));
    }

    #[test]
    fn test_cart_to_frac() {
        let lattice = Lattice::from_vectors([[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 5.0]]);
        let frac = lattice.cart_to_frac([1.0, 1.0, 4.0]);
        let expected = [0.5, 0.25, 0.8];
        for i in 0..3 {
            assert_relative_eq!(frac[i], expected[i], epsilon = 1e-10);
        }
    }

    #[test]
    fn test_species_counts_and_formula() {
        let lattice = Lattice::from_parameters(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        let crystal = Crystal::new(
            "FeSe",
            lattice,
            vec![
                Atom::new("Fe", [0.0, 0.0, 0.0]),
                Atom::new("Se", [0.5, 0.0, 0.2]),
                Atom::new("Fe", [0.5, 0.5, 0.0]),
            ],
        );
        assert_eq!(
            crystal.species_counts(),
            vec![("Fe".to_string(), 2), ("Se".to_string(), 1)]
        );
        assert_eq!(crystal.formula(), "Fe2Se");
    }
}
