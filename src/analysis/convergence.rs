//! # 收敛性数据分析
//!
//! 读取 `kpoints_conv/` 或 `encut_conv/` 中每个测试值的 `OSZICAR.<value>`，
//! 计算相邻测试值之间每原子能量差 (meV/atom)，写出数据表并可选绘图。
//!
//! ## 依赖关系
//! - 被 `commands/analyze/` 使用
//! - 使用 `parsers/oszicar.rs`, `parsers/poscar.rs`, `plotters`

use super::ev::write_columns;
use crate::error::{Result, VaspflowError};
use crate::parsers::{oszicar, poscar};
use crate::workflow::convergence::{value_label, ConvKind};

use serde::Serialize;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// 收敛表中的一行
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConvPoint {
    pub value: f64,
    pub energy: f64,
    /// 与上一个测试值的每原子能量差 (meV/atom)，第一行为 0
    pub delta_mev_per_atom: f64,
}

/// 按测试值排序并计算能量差
pub fn convergence_table(mut data: Vec<(f64, f64)>, num_atoms: usize) -> Vec<ConvPoint> {
    data.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut points = Vec::with_capacity(data.len());
    let mut previous: Option<f64> = None;
    for (value, energy) in data {
        let delta = previous
            .map(|e| (energy - e) / num_atoms as f64 * 1000.0)
            .unwrap_or(0.0);
        points.push(ConvPoint {
            value,
            energy,
            delta_mev_per_atom: delta,
        });
        previous = Some(energy);
    }
    points
}

/// 读取收敛测试结果，写出 `kppa_energy.txt`/`encut_energy.txt`，可选生成 PNG
///
/// 原子数取自最后一个测试值的 `POSCAR.<value>`。
pub fn calculate_conv(path: &Path, kind: ConvKind, values: &[f64], plot: bool) -> Result<Vec<ConvPoint>> {
    let last = values
        .last()
        .ok_or_else(|| VaspflowError::InvalidArgument("no convergence values given".to_string()))?;
    let conv_dir = path.join(kind.dir_name());

    let data = values
        .iter()
        .map(|&v| {
            let energy = oszicar::extract_energy(&conv_dir.join(format!("OSZICAR.{}", value_label(v))))?;
            Ok((v, energy))
        })
        .collect::<Result<Vec<_>>>()?;

    let num_atoms = poscar::parse_poscar_file(&conv_dir.join(format!("POSCAR.{}", value_label(*last))))?
        .num_sites();
    if num_atoms == 0 {
        return Err(VaspflowError::InvalidStructure("structure has no atoms".to_string()));
    }

    let points = convergence_table(data, num_atoms);
    let rows: Vec<[f64; 3]> = points
        .iter()
        .map(|p| [p.value, p.energy, p.delta_mev_per_atom])
        .collect();
    write_columns(&path.join(kind.energy_file()), &rows)?;

    if plot {
        plot_convergence(&points, kind, &path.join(kind.plot_file()))?;
    }
    Ok(points)
}

/// 坐标范围，两端各留 5% 余量
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let margin = if (max - min).abs() > f64::EPSILON {
        (max - min) * 0.05
    } else {
        1.0
    };
    (min - margin)..(max + margin)
}

/// 左图：能量；右图：能量差，附 ±1 meV/atom 参考线
fn plot_convergence(points: &[ConvPoint], kind: ConvKind, output_path: &Path) -> Result<PathBuf> {
    use plotters::prelude::*;

    let root = BitMapBackend::new(output_path, (1200, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| VaspflowError::Other(e.to_string()))?;
    let panels = root.split_evenly((1, 2));

    let x_range = padded_range(points.iter().map(|p| p.value));

    // 能量
    let mut chart = ChartBuilder::on(&panels[0])
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range.clone(), padded_range(points.iter().map(|p| p.energy)))
        .map_err(|e| VaspflowError::Other(e.to_string()))?;
    chart
        .configure_mesh()
        .x_desc(kind.axis_label())
        .y_desc("Energy (eV)")
        .draw()
        .map_err(|e| VaspflowError::Other(e.to_string()))?;
    chart
        .draw_series(LineSeries::new(points.iter().map(|p| (p.value, p.energy)), BLUE.stroke_width(2)))
        .map_err(|e| VaspflowError::Other(e.to_string()))?;
    chart
        .draw_series(points.iter().map(|p| Circle::new((p.value, p.energy), 4, BLUE.filled())))
        .map_err(|e| VaspflowError::Other(e.to_string()))?;

    // 能量差
    let y_range = padded_range(
        points
            .iter()
            .map(|p| p.delta_mev_per_atom)
            .chain([-1.0, 1.0]),
    );
    let mut chart = ChartBuilder::on(&panels[1])
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range.clone(), y_range)
        .map_err(|e| VaspflowError::Other(e.to_string()))?;
    chart
        .configure_mesh()
        .x_desc(kind.axis_label())
        .y_desc("ΔEnergy (meV/atom)")
        .draw()
        .map_err(|e| VaspflowError::Other(e.to_string()))?;
    for guide in [1.0, -1.0] {
        chart
            .draw_series(LineSeries::new(
                [(x_range.start, guide), (x_range.end, guide)],
                BLACK.stroke_width(1),
            ))
            .map_err(|e| VaspflowError::Other(e.to_string()))?;
    }
    chart
        .draw_series(LineSeries::new(
            points.iter().map(|p| (p.value, p.delta_mev_per_atom)),
            RED.stroke_width(2),
        ))
        .map_err(|e| VaspflowError::Other(e.to_string()))?;
    chart
        .draw_series(
            points
                .iter()
                .map(|p| Circle::new((p.value, p.delta_mev_per_atom), 4, RED.filled())),
        )
        .map_err(|e| VaspflowError::Other(e.to_string()))?;

    root.present().map_err(|e| VaspflowError::Other(e.to_string()))?;
    Ok(output_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ev::tests::{cubic_poscar, oszicar};
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_convergence_table() {
        let points = convergence_table(vec![(2000.0, -10.004), (1000.0, -10.0), (3000.0, -10.005)], 2);
        assert_eq!(points[0].value, 1000.0);
        assert_eq!(points[0].delta_mev_per_atom, 0.0);
        assert_relative_eq!(points[1].delta_mev_per_atom, -2.0, epsilon = 1e-9);
        assert_relative_eq!(points[2].delta_mev_per_atom, -0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_calculate_conv_writes_table() {
        let dir = TempDir::new().unwrap();
        let conv = dir.path().join(ConvKind::Encut.dir_name());
        fs::create_dir(&conv).unwrap();
        for (encut, e) in [(400.0, -10.0), (500.0, -10.004)] {
            let label = value_label(encut);
            fs::write(conv.join(format!("OSZICAR.{}", label)), oszicar(e)).unwrap();
            fs::write(conv.join(format!("POSCAR.{}", label)), cubic_poscar(2.8)).unwrap();
        }

        let points = calculate_conv(dir.path(), ConvKind::Encut, &[500.0, 400.0], false).unwrap();
        assert_eq!(points.len(), 2);
        assert_relative_eq!(points[1].delta_mev_per_atom, -2.0, epsilon = 1e-6);

        let text = fs::read_to_string(dir.path().join("encut_energy.txt")).unwrap();
        assert_eq!(
            text,
            "400.000000 -10.000000 0.000000\n500.000000 -10.004000 -2.000000\n"
        );
        assert!(!dir.path().join("encut_conv.png").exists());
    }

    #[test]
    fn test_missing_oszicar_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("kpoints_conv")).unwrap();
        assert!(calculate_conv(dir.path(), ConvKind::Kpoints, &[1000.0], false).is_err());
        assert!(calculate_conv(dir.path(), ConvKind::Kpoints, &[], false).is_err());
    }
}
