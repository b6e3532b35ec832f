//! # VASP OUTCAR 解析器
//!
//! 从 OUTCAR 中提取压力、磁化表、输入 MAGMOM 以及收敛状态。
//!
//! ## 依赖关系
//! - 被 `analysis/`, `job/handlers.rs`, `job/vasp_job.rs` 使用
//! - 使用 `models/magnetism.rs`

use crate::error::{Result, VaspflowError};
use crate::models::{IonMoment, MagRow, MagTable};
use crate::utils::output;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// VASP 在电子步达到 NELM 仍未收敛时写入的提示
pub const NELM_MESSAGE: &str = "The electronic self-consistency was not achieved in the given";

/// 检查文件名前缀，防止把 OSZICAR 当成 OUTCAR 读
pub(crate) fn check_file_name(path: &Path, expected: &str) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if name.starts_with(expected) {
        Ok(())
    } else {
        Err(VaspflowError::UnexpectedFileName {
            name: name.to_string(),
            expected: expected.to_string(),
        })
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| VaspflowError::read(path, e))?;
    Ok(BufReader::new(file))
}

/// 逐行读取的迭代器，非 UTF-8 字节按有损方式解码
pub struct LossyLines {
    reader: BufReader<File>,
    buf: Vec<u8>,
    path: PathBuf,
}

impl Iterator for LossyLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                let line = String::from_utf8_lossy(&self.buf);
                Some(Ok(line.trim_end_matches(['\n', '\r']).to_string()))
            }
            Err(e) => Some(Err(VaspflowError::read(&self.path, e))),
        }
    }
}

/// 逐行读取文件（OUTCAR 偶尔含有非 UTF-8 字节）
pub fn lossy_lines(path: &Path) -> Result<LossyLines> {
    Ok(LossyLines {
        reader: open(path)?,
        buf: Vec::new(),
        path: path.to_path_buf(),
    })
}

/// 分块搜索文件中的字节串，找到即返回
///
/// 不按行读取，WAVECAR 等没有换行的二进制文件也只占用固定内存。
pub fn file_contains(path: &Path, needle: &str) -> Result<bool> {
    let needle = needle.as_bytes();
    if needle.is_empty() {
        return Ok(true);
    }
    let mut reader = open(path)?;
    let mut window: Vec<u8> = Vec::new();

    loop {
        let n = {
            let chunk = reader.fill_buf().map_err(|e| VaspflowError::read(path, e))?;
            if chunk.is_empty() {
                return Ok(false);
            }
            window.extend_from_slice(chunk);
            chunk.len()
        };
        reader.consume(n);

        if window.windows(needle.len()).any(|w| w == needle) {
            return Ok(true);
        }
        // 保留末尾不足一个匹配长度的字节，匹配可能跨越两块
        let keep = (needle.len() - 1).min(window.len());
        window.drain(..window.len() - keep);
    }
}

/// 提取最后一次出现的压力 (kB)
///
/// `  in kB ... ` 之后的行形如 `external pressure =  -19.74 kB  Pullay stress = 0.00 kB`
pub fn extract_pressure(path: &Path) -> Result<f64> {
    check_file_name(path, "OUTCAR")?;

    let mut last = None;
    for line in lossy_lines(path)? {
        let line = line?;
        if line.contains("pressure") {
            last = Some(line);
        }
    }
    let line = last.ok_or_else(|| VaspflowError::parse("OUTCAR", path, "no pressure line found"))?;

    line.split_whitespace()
        .nth(3)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            VaspflowError::parse("OUTCAR", path, format!("cannot read pressure from '{}'", line.trim()))
        })
}

/// 解析全部 `magnetization (x)` 表格
///
/// 文件不存在时打印警告并返回 `None`。
pub fn extract_mag_data(path: &Path) -> Result<Option<MagTable>> {
    if !path.is_file() {
        output::print_warning(&format!("File {} does not exist. Skipping.", path.display()));
        return Ok(None);
    }
    parse_mag_lines(lossy_lines(path)?, path).map(Some)
}

/// 从逐行输入解析磁化表
pub fn parse_mag_lines<I, S>(lines: I, path: &Path) -> Result<MagTable>
where
    I: IntoIterator<Item = Result<S>>,
    S: AsRef<str>,
{
    let mut table = MagTable::default();
    let mut step = 0;
    let mut found = false;
    let mut in_data = false;

    for line in lines {
        let line = line?;
        let line = line.as_ref();
        if line.contains("magnetization (x)") {
            found = true;
            step += 1;
        } else if found && !in_data && line.contains("# of ion") {
            // "# of ion       s       p       d       tot"
            table.headers = line.split_whitespace().skip(3).map(String::from).collect();
        } else if found && !in_data && line.contains("----") {
            in_data = true;
        } else if in_data && line.contains("----") {
            in_data = false;
            found = false;
        } else if in_data {
            let mut parts = line.split_whitespace();
            let ion = parts
                .next()
                .and_then(|s| s.parse::<usize>().ok())
                .ok_or_else(|| {
                    VaspflowError::parse("OUTCAR", path, format!("bad magnetization row '{}'", line.trim()))
                })?;
            let values = parts
                .map(|s| s.parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| VaspflowError::parse("OUTCAR", path, e.to_string()))?;
            table.rows.push(MagRow { step, ion, values });
        }
    }

    Ok(table)
}

/// 最后一个离子步中各离子的总磁矩
pub fn extract_tot_mag_data(path: &Path) -> Result<Vec<IonMoment>> {
    let table = extract_mag_data(path)?.ok_or_else(|| VaspflowError::FileNotFound {
        path: path.display().to_string(),
    })?;
    let tot = table.last_step_tot();
    if tot.is_empty() {
        return Err(VaspflowError::parse(
            "OUTCAR",
            path,
            "no magnetization (x) data found",
        ));
    }
    Ok(tot)
}

/// 解析 VASP 格式的 MAGMOM 行，支持 `N*value` 简写
pub fn parse_magmom_line(line: &str) -> Result<Vec<IonMoment>> {
    let values = line
        .split_once('=')
        .map(|(_, rhs)| rhs)
        .unwrap_or(line);
    // 去掉 INCAR 行内注释
    let values = values.split(['#', '!']).next().unwrap_or_default();

    let invalid = || VaspflowError::InvalidArgument(format!("invalid MAGMOM line '{}'", line.trim()));

    let mut magmoms = Vec::new();
    for part in values.split_whitespace() {
        if let Some((count, value)) = part.split_once('*') {
            let count: usize = count.parse().map_err(|_| invalid())?;
            let value: f64 = value.parse().map_err(|_| invalid())?;
            magmoms.extend(std::iter::repeat(value).take(count));
        } else {
            magmoms.push(part.parse().map_err(|_| invalid())?);
        }
    }

    Ok(magmoms
        .into_iter()
        .enumerate()
        .map(|(i, tot)| IonMoment { ion: i + 1, tot })
        .collect())
}

/// 读取第一处包含 MAGMOM 的行作为输入磁矩（OUTCAR 与 INCAR 均适用）
pub fn extract_input_mag_data(path: &Path) -> Result<Vec<IonMoment>> {
    for line in lossy_lines(path)? {
        let line = line?;
        if line.to_uppercase().contains("MAGMOM") {
            return parse_magmom_line(&line);
        }
    }
    Err(VaspflowError::parse("OUTCAR", path, "no MAGMOM line found"))
}

/// 文件中是否出现 NELM 未收敛提示
pub fn nelm_reached(path: &Path) -> Result<bool> {
    file_contains(path, NELM_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    const OUTCAR_SNIPPET: &str = r#"
   POTCAR:    PAW_PBE Fe_pv 02Aug2007
   MAGMOM =       2*3.0000 -1.5 0
  in kB      -19.71    -19.71    -19.79     0.00     0.00     0.00
  external pressure =      -10.00 kB  Pullay stress =        0.00 kB

 magnetization (x)

# of ion       s       p       d       tot
------------------------------------------
    1        0.010   0.020   1.900   1.930
    2        0.010   0.020  -1.900  -1.870
--------------------------------------------------
tot          0.020   0.040   0.000   0.060

  external pressure =      -19.74 kB  Pullay stress =        0.00 kB

 magnetization (x)

# of ion       s       p       d       tot
------------------------------------------
    1        0.011   0.021   2.100   2.132
    2        0.011   0.021  -2.100  -2.068
--------------------------------------------------
tot          0.022   0.042   0.000   0.064
"#;

    fn write_outcar(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_extract_pressure_takes_last_occurrence() {
        let dir = TempDir::new().unwrap();
        let path = write_outcar(&dir, "OUTCAR.3static", OUTCAR_SNIPPET);
        assert_eq!(extract_pressure(&path).unwrap(), -19.74);
    }

    #[test]
    fn test_extract_pressure_rejects_other_files() {
        let dir = TempDir::new().unwrap();
        let path = write_outcar(&dir, "OSZICAR", OUTCAR_SNIPPET);
        assert!(matches!(
            extract_pressure(&path),
            Err(VaspflowError::UnexpectedFileName { .. })
        ));
    }

    #[test]
    fn test_extract_mag_data_steps_and_headers() {
        let lines = OUTCAR_SNIPPET.lines().map(Ok);
        let table = parse_mag_lines(lines, Path::new("OUTCAR")).unwrap();
        assert_eq!(table.headers, vec!["s", "p", "d", "tot"]);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.last_step(), Some(2));
        assert_eq!(table.rows[0].step, 1);
        assert_eq!(table.rows[3].values, vec![0.011, 0.021, -2.1, -2.068]);
    }

    #[test]
    fn test_extract_tot_mag_data() {
        let dir = TempDir::new().unwrap();
        let path = write_outcar(&dir, "OUTCAR", OUTCAR_SNIPPET);
        let tot = extract_tot_mag_data(&path).unwrap();
        assert_eq!(
            tot,
            vec![
                IonMoment { ion: 1, tot: 2.132 },
                IonMoment { ion: 2, tot: -2.068 }
            ]
        );
    }

    #[test]
    fn test_missing_outcar_is_skipped() {
        let dir = TempDir::new().unwrap();
        assert!(extract_mag_data(&dir.path().join("OUTCAR")).unwrap().is_none());
    }

    #[test]
    fn test_parse_magmom_line() {
        let moments = parse_magmom_line("MAGMOM = 2*3.0 -1.5 0 # comment").unwrap();
        let tot: Vec<f64> = moments.iter().map(|m| m.tot).collect();
        assert_eq!(tot, vec![3.0, 3.0, -1.5, 0.0]);
        assert_eq!(moments[3].ion, 4);
        assert!(parse_magmom_line("MAGMOM = x*2").is_err());
    }

    #[test]
    fn test_extract_input_mag_data() {
        let dir = TempDir::new().unwrap();
        let path = write_outcar(&dir, "OUTCAR", OUTCAR_SNIPPET);
        let moments = extract_input_mag_data(&path).unwrap();
        assert_eq!(moments.len(), 4);

        let plain = write_outcar(&dir, "INCAR", "ENCUT = 500\n");
        assert!(extract_input_mag_data(&plain).is_err());
    }

    #[test]
    fn test_nelm_marker() {
        let dir = TempDir::new().unwrap();
        let path = write_outcar(
            &dir,
            "OUTCAR",
            &format!("{}\n {} NELM\n", OUTCAR_SNIPPET, NELM_MESSAGE),
        );
        assert!(nelm_reached(&path).unwrap());
        assert!(!nelm_reached(&write_outcar(&dir, "OUTCAR.ok", OUTCAR_SNIPPET)).unwrap());
    }

    #[test]
    fn test_file_contains_across_chunk_boundary() {
        let dir = TempDir::new().unwrap();
        // 默认缓冲区为 8 KiB，提示跨越第一块的末尾；无换行的二进制内容
        let mut bytes = vec![0xffu8; 8192 - 10];
        bytes.extend_from_slice(NELM_MESSAGE.as_bytes());
        bytes.extend(std::iter::repeat(0xfe).take(20000));
        let path = dir.path().join("WAVECAR");
        fs::write(&path, &bytes).unwrap();
        assert!(nelm_reached(&path).unwrap());

        let clean = dir.path().join("CHGCAR");
        fs::write(&clean, vec![0u8; 30000]).unwrap();
        assert!(!nelm_reached(&clean).unwrap());
        assert!(file_contains(&clean, "").unwrap());
    }

    #[test]
    fn test_lossy_lines_decode_invalid_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("OUTCAR");
        fs::write(&path, b"first\r\nbad \xff byte\nMAGMOM = 2*1.0\n").unwrap();
        let lines: Vec<String> = lossy_lines(&path).unwrap().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "first");
        assert!(lines[1].starts_with("bad "));
        assert_eq!(extract_input_mag_data(&path).unwrap().len(), 2);
    }
}
