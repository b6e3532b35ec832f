//! # 构型数据提取
//!
//! 从 `config_*/vol_*` 目录中提取体积、能量、原子数及可选的磁化数据，
//! 多个构型目录并行处理。
//!
//! ## 依赖关系
//! - 被 `commands/analyze/` 使用
//! - 使用 `parsers/`, `models/calculation.rs`, `batch/`

use super::magnetism::determine_magnetic_ordering;
use crate::batch::{BatchRunner, ProcessResult};
use crate::error::Result;
use crate::models::ConfigRow;
use crate::parsers::{oszicar, outcar, poscar};
use crate::utils::output;
use crate::workflow::files::{dir_name, list_subdirs};

use std::path::{Path, PathBuf};

/// 每个体积目录中读取的输出文件名
#[derive(Debug, Clone)]
pub struct OutputNames {
    pub outcar: String,
    pub oszicar: String,
    pub contcar: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        OutputNames {
            outcar: "OUTCAR.3static".to_string(),
            oszicar: "OSZICAR.3static".to_string(),
            contcar: "CONTCAR.3static".to_string(),
        }
    }
}

/// 提取选项
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub names: OutputNames,
    pub collect_mag_data: bool,
    /// 单个离子磁矩视为零的阈值
    pub magmom_tol: f64,
    /// 总磁矩视为零的阈值
    pub total_tol: f64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            names: OutputNames::default(),
            collect_mag_data: false,
            magmom_tol: 1e-12,
            total_tol: 1e-12,
        }
    }
}

/// 路径中 `config_` 之后的部分；没有 `config_` 时取目录名
pub fn config_name(path: &Path) -> String {
    let text = path.to_string_lossy();
    match text.find("config_") {
        Some(start) => text[start + "config_".len()..]
            .trim_end_matches(std::path::MAIN_SEPARATOR)
            .to_string(),
        None => dir_name(path),
    }
}

/// 提取单个构型目录的数据
///
/// 缺少任一输出文件的体积目录会被警告并跳过。
pub fn extract_configuration_data(path: &Path, opts: &ExtractOptions) -> Result<Vec<ConfigRow>> {
    let config = config_name(path);
    let mut rows = Vec::new();

    for vol_dir in list_subdirs(path, "vol_")? {
        let outcar_path = vol_dir.join(&opts.names.outcar);
        let oszicar_path = vol_dir.join(&opts.names.oszicar);
        let contcar_path = vol_dir.join(&opts.names.contcar);

        if let Some(missing) = [&outcar_path, &oszicar_path, &contcar_path]
            .into_iter()
            .find(|p| !p.is_file())
        {
            output::print_warning(&format!("File {} does not exist. Skipping.", missing.display()));
            continue;
        }

        let crystal = poscar::parse_poscar_file(&contcar_path)?;
        let number_of_atoms = crystal.num_sites();
        let volume = poscar::round6(crystal.volume());
        let energy = oszicar::extract_energy(&oszicar_path)?;

        let (total_magnetic_moment, magnetic_ordering, mag_data) = if opts.collect_mag_data {
            let moments = outcar::extract_tot_mag_data(&outcar_path)?;
            let total: f64 = moments.iter().map(|m| m.tot).sum();
            let ordering = determine_magnetic_ordering(&moments, opts.magmom_tol, opts.total_tol);
            (Some(total), Some(ordering), Some(moments))
        } else {
            (None, None, None)
        };

        rows.push(ConfigRow {
            config: config.clone(),
            volume,
            volume_per_atom: volume / number_of_atoms as f64,
            energy,
            energy_per_atom: energy / number_of_atoms as f64,
            number_of_atoms,
            total_magnetic_moment,
            magnetic_ordering,
            mag_data,
        });
    }

    Ok(rows)
}

/// 并行提取多个构型目录，出错的目录打印错误后跳过
///
/// `jobs == 0` 时使用全部 CPU。结果按输入目录顺序拼接。
pub fn recursive_extract_configuration_data(
    config_dirs: Vec<PathBuf>,
    opts: &ExtractOptions,
    jobs: usize,
) -> Result<Vec<ConfigRow>> {
    let result = BatchRunner::new(jobs).run(config_dirs, |dir| {
        match extract_configuration_data(dir, opts) {
            Ok(rows) => ProcessResult::Success(rows),
            Err(e) => ProcessResult::Failed(e.to_string()),
        }
    })?;

    for (dir, err) in &result.failures {
        output::print_error(&format!("Error in {}: {}", dir.display(), err));
    }

    Ok(result.outputs.into_iter().flat_map(|(_, rows)| rows).collect())
}

/// 保存为 CSV
pub fn write_csv(rows: &[ConfigRow], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| crate::error::VaspflowError::write(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ev::tests::write_static_outputs;
    use crate::models::MagneticOrdering;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::TempDir;

    const MAG_BLOCK: &str = " magnetization (x)

# of ion       s       p       d       tot
------------------------------------------
    1        0.010   0.020   2.100   2.130
    2        0.010   0.020  -2.100  -2.130
--------------------------------------------------
tot          0.020   0.040   0.000   0.000
";

    fn write_config(root: &Path, name: &str) -> PathBuf {
        let config = root.join(name);
        write_static_outputs(&config.join("vol_0"), 2.0, -16.0, 1.0);
        write_static_outputs(&config.join("vol_1"), 3.0, -15.0, -1.0);
        for vol in ["vol_0", "vol_1"] {
            let outcar = config.join(vol).join("OUTCAR.3static");
            let mut text = fs::read_to_string(&outcar).unwrap();
            text.push_str(MAG_BLOCK);
            fs::write(outcar, text).unwrap();
        }
        config
    }

    #[test]
    fn test_config_name() {
        assert_eq!(config_name(Path::new("/data/FeSe/config_18")), "18");
        assert_eq!(config_name(Path::new("runs/config_afm_1/")), "afm_1");
        assert_eq!(config_name(Path::new("/data/fm")), "fm");
    }

    #[test]
    fn test_extract_configuration_data() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), "config_3");
        // 缺少输出文件的体积目录被跳过
        fs::create_dir(config.join("vol_2")).unwrap();

        let opts = ExtractOptions {
            collect_mag_data: true,
            magmom_tol: 0.1,
            total_tol: 0.1,
            ..ExtractOptions::default()
        };
        let rows = extract_configuration_data(&config, &opts).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.config, "3");
        assert_eq!(first.number_of_atoms, 2);
        assert_relative_eq!(first.volume, 8.0);
        assert_relative_eq!(first.volume_per_atom, 4.0);
        assert_relative_eq!(first.energy_per_atom, -8.0);
        assert_eq!(first.magnetic_ordering, Some(MagneticOrdering::AFM));
        assert_relative_eq!(first.total_magnetic_moment.unwrap(), 0.0);
        assert_eq!(first.mag_data.as_ref().map(Vec::len), Some(2));

        let plain = extract_configuration_data(&config, &ExtractOptions::default()).unwrap();
        assert!(plain[0].magnetic_ordering.is_none());
    }

    #[test]
    fn test_recursive_extract_reports_and_skips_bad_dirs() {
        let dir = TempDir::new().unwrap();
        let a = write_config(dir.path(), "config_1");
        let b = write_config(dir.path(), "config_2");
        let missing = dir.path().join("config_9");

        let rows = recursive_extract_configuration_data(vec![a, missing, b], &ExtractOptions::default(), 2).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.config.as_str()).collect();
        assert_eq!(names, vec!["1", "1", "2", "2"]);

        let csv_path = dir.path().join("configs.csv");
        write_csv(&rows, &csv_path).unwrap();
        let text = fs::read_to_string(csv_path).unwrap();
        assert!(text.starts_with("config,volume,volume_per_atom,energy,energy_per_atom,number_of_atoms"));
        assert_eq!(text.lines().count(), 5);
    }
}
