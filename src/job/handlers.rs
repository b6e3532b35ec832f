//! # VASP 错误处理器
//!
//! 每个处理器检查作业目录中的输出，发现问题时给出一组纠正动作
//! （`SettingsOverride`），由 `Custodian` 应用后重新运行作业。
//!
//! | 名称 | 处理器 | 检测 |
//! |------|--------|------|
//! | `vasp` | `VaspErrorHandler` | 输出文件中的已知错误字符串 |
//! | `unconverged` | `UnconvergedErrorHandler` | 最后一个离子步电子步达到 NELM，或离子步达到 NSW |
//! | `nonconverging` | `NonConvergingErrorHandler` | 连续多个离子步电子步均达到 NELM |
//!
//! ## 依赖关系
//! - 被 `job/custodian.rs`, `config.rs` 使用
//! - 使用 `parsers/incar.rs`, `parsers/oszicar.rs`, `parsers/outcar.rs`

use super::vasp_job::SettingsOverride;
use crate::error::{Result, VaspflowError};
use crate::parsers::oszicar::{self, IonicStep};
use crate::parsers::outcar;
use crate::parsers::{Incar, IncarValue};

use regex::Regex;
use serde::Serialize;
use std::path::Path;

/// VASP 默认的最大电子步数
const DEFAULT_NELM: i64 = 60;

/// 一次纠错的记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correction {
    pub handler: String,
    pub errors: Vec<String>,
    pub actions: Vec<SettingsOverride>,
}

/// 错误处理器接口
pub trait ErrorHandler: Send {
    fn name(&self) -> &str;

    /// 作业目录中是否存在本处理器能识别的问题
    fn check(&mut self, dir: &Path) -> Result<bool>;

    /// 生成纠正动作；`actions` 为空表示无法纠正
    fn correct(&mut self, dir: &Path) -> Result<Correction>;
}

/// 按名称构造处理器
pub fn handler_from_name(
    name: &str,
    output_file: &str,
    errors_subset: Option<&[String]>,
) -> Result<Box<dyn ErrorHandler>> {
    match name.to_lowercase().as_str() {
        "vasp" => {
            let mut handler = VaspErrorHandler::new(output_file);
            if let Some(subset) = errors_subset {
                handler = handler.errors_subset(subset)?;
            }
            Ok(Box::new(handler))
        }
        "unconverged" => Ok(Box::new(UnconvergedErrorHandler::default())),
        "nonconverging" => Ok(Box::new(NonConvergingErrorHandler::default())),
        other => Err(VaspflowError::InvalidArgument(format!(
            "unknown error handler '{}' (expected vasp, unconverged or nonconverging)",
            other
        ))),
    }
}

fn read_incar(dir: &Path) -> Result<Incar> {
    let path = dir.join("INCAR");
    if path.is_file() {
        Incar::from_file(&path)
    } else {
        Ok(Incar::default())
    }
}

fn incar_str(incar: &Incar, tag: &str) -> String {
    incar.get(tag).unwrap_or_default().to_lowercase()
}

// ─────────────────────────────────────────────────────────────
// VaspErrorHandler
// ─────────────────────────────────────────────────────────────

/// 已知错误及其在输出中的特征字符串
pub const ERROR_SIGNATURES: &[(&str, &[&str])] = &[
    (
        "tet",
        &[
            "Tetrahedron method fails",
            "tetrahedron method fails",
            "Fatal error detecting k-mesh",
            "Fatal error: unable to match k-point",
            "Routine TETIRR needs special values",
            "BZINTS",
        ],
    ),
    ("inv_rot_mat", &["rotation matrix was not found (increase SYMPREC)"]),
    ("brmix", &["BRMIX: very serious problems"]),
    ("subspacematrix", &["WARNING: Sub-Space-Matrix is not hermitian in DAV"]),
    ("zbrent", &["ZBRENT: fatal internal in", "ZBRENT: fatal error in bracketing"]),
    ("edddav", &["Error EDDDAV: Call to ZHEGV failed"]),
    ("rspher", &["ERROR RSPHER"]),
    ("pricel", &["internal error in subroutine PRICEL"]),
    ("posmap", &["POSMAP"]),
    ("too_few_bands", &["TOO FEW BANDS"]),
    ("real_optlay", &["REAL_OPTLAY: internal error", "REAL_OPT: internal ERROR"]),
    ("zpotrf", &["LAPACK: Routine ZPOTRF failed", "Routine ZPOTRF ZTRTRI"]),
    ("eddrmm", &["WARNING in EDDRMM: call to ZHEGV failed"]),
];

/// 扫描 VASP 标准输出中的已知错误
#[derive(Debug, Clone)]
pub struct VaspErrorHandler {
    output_file: String,
    /// 只捕获这些错误
    subset: Vec<String>,
    /// 最近一次 check 发现的错误
    errors: Vec<String>,
}

impl VaspErrorHandler {
    pub fn new(output_file: &str) -> Self {
        VaspErrorHandler {
            output_file: output_file.to_string(),
            subset: ERROR_SIGNATURES.iter().map(|(e, _)| e.to_string()).collect(),
            errors: Vec::new(),
        }
    }

    /// 限定要捕获的错误（未知名称报错）
    pub fn errors_subset(mut self, subset: &[String]) -> Result<Self> {
        for name in subset {
            if !ERROR_SIGNATURES.iter().any(|(e, _)| e == name) {
                return Err(VaspflowError::InvalidArgument(format!(
                    "unknown VASP error '{}'",
                    name
                )));
            }
        }
        self.subset = subset.to_vec();
        Ok(self)
    }

    /// 当前 NBANDS：INCAR 优先，否则从 OUTCAR 读取
    fn current_nbands(dir: &Path, incar: &Incar) -> Option<i64> {
        if let Some(n) = incar.get_int("NBANDS") {
            return Some(n);
        }
        let re = Regex::new(r"NBANDS\s*=\s*(\d+)").ok()?;
        outcar::lossy_lines(&dir.join("OUTCAR"))
            .ok()?
            .map_while(|line| line.ok())
            .filter_map(|line| re.captures(&line).and_then(|c| c[1].parse().ok()))
            .last()
    }

    fn actions_for(error: &str, dir: &Path, incar: &Incar) -> Vec<SettingsOverride> {
        match error {
            "tet" => vec![SettingsOverride::incar([
                ("ISMEAR", IncarValue::from(0)),
                ("SIGMA", IncarValue::from(0.05)),
            ])],
            "inv_rot_mat" | "pricel" => vec![SettingsOverride::incar([
                ("SYMPREC", IncarValue::from(1e-8)),
                ("ISYM", IncarValue::from(0)),
            ])],
            "brmix" => {
                if incar.get_int("IMIX") != Some(1) {
                    vec![SettingsOverride::incar([("IMIX", 1)])]
                } else if incar.get_int("ISYM") != Some(0) {
                    vec![SettingsOverride::incar([("ISYM", 0)])]
                } else {
                    Vec::new()
                }
            }
            "subspacematrix" | "edddav" => {
                if incar_str(incar, "ALGO") != "all" {
                    vec![
                        SettingsOverride::incar([("ALGO", "All")]),
                        SettingsOverride::delete("CHGCAR"),
                    ]
                } else {
                    Vec::new()
                }
            }
            "zbrent" => vec![
                SettingsOverride::incar([("IBRION", 1)]),
                SettingsOverride::contcar_to_poscar(),
            ],
            "rspher" | "real_optlay" => {
                if incar_str(incar, "LREAL") != ".false." {
                    vec![SettingsOverride::incar([("LREAL", false)])]
                } else {
                    Vec::new()
                }
            }
            "posmap" => {
                let symprec = incar.get_float("SYMPREC").unwrap_or(1e-5);
                vec![SettingsOverride::incar([("SYMPREC", symprec / 10.0)])]
            }
            "too_few_bands" => match Self::current_nbands(dir, incar) {
                // ceil(1.1 * n)
                Some(n) => vec![SettingsOverride::incar([("NBANDS", n + (n + 9) / 10)])],
                None => Vec::new(),
            },
            "zpotrf" => vec![
                SettingsOverride::incar([("ISYM", 0)]),
                SettingsOverride::delete("CHGCAR"),
                SettingsOverride::delete("WAVECAR"),
            ],
            "eddrmm" => {
                let algo = incar_str(incar, "ALGO");
                let mut actions = if algo == "fast" || algo == "veryfast" {
                    vec![SettingsOverride::incar([("ALGO", "Normal")])]
                } else {
                    let potim = incar.get_float("POTIM").unwrap_or(0.5);
                    vec![SettingsOverride::incar([("POTIM", potim / 2.0)])]
                };
                actions.push(SettingsOverride::delete("CHGCAR"));
                actions.push(SettingsOverride::delete("WAVECAR"));
                actions
            }
            _ => Vec::new(),
        }
    }
}

impl ErrorHandler for VaspErrorHandler {
    fn name(&self) -> &str {
        "VaspErrorHandler"
    }

    fn check(&mut self, dir: &Path) -> Result<bool> {
        self.errors.clear();
        let path = dir.join(&self.output_file);
        if !path.is_file() {
            return Ok(false);
        }
        let watched: Vec<&(&str, &[&str])> = ERROR_SIGNATURES
            .iter()
            .filter(|(error, _)| self.subset.iter().any(|s| s == error))
            .collect();

        for line in outcar::lossy_lines(&path)? {
            let line = line?;
            for (error, signatures) in &watched {
                if signatures.iter().any(|sig| line.contains(sig)) && !self.errors.iter().any(|e| e == error) {
                    self.errors.push(error.to_string());
                }
            }
        }
        // 按签名表顺序报告
        self.errors
            .sort_by_key(|e| ERROR_SIGNATURES.iter().position(|(name, _)| name == e));
        Ok(!self.errors.is_empty())
    }

    fn correct(&mut self, dir: &Path) -> Result<Correction> {
        let incar = read_incar(dir)?;
        let mut actions: Vec<SettingsOverride> = Vec::new();
        for error in &self.errors {
            for action in Self::actions_for(error, dir, &incar) {
                if !actions.contains(&action) {
                    actions.push(action);
                }
            }
        }
        Ok(Correction {
            handler: self.name().to_string(),
            errors: self.errors.clone(),
            actions,
        })
    }
}

// ─────────────────────────────────────────────────────────────
// UnconvergedErrorHandler
// ─────────────────────────────────────────────────────────────

/// 计算正常结束但未收敛
#[derive(Debug, Clone, Default)]
pub struct UnconvergedErrorHandler {
    electronic: bool,
    ionic: bool,
}

impl UnconvergedErrorHandler {
    fn read_steps(dir: &Path) -> Result<Option<Vec<IonicStep>>> {
        let path = dir.join("OSZICAR");
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(oszicar::ionic_steps(&path)?))
    }
}

impl ErrorHandler for UnconvergedErrorHandler {
    fn name(&self) -> &str {
        "UnconvergedErrorHandler"
    }

    fn check(&mut self, dir: &Path) -> Result<bool> {
        self.electronic = false;
        self.ionic = false;

        let steps = match Self::read_steps(dir)? {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(false),
        };
        let incar = read_incar(dir)?;
        let nelm = incar.get_int("NELM").unwrap_or(DEFAULT_NELM);
        let nsw = incar.get_int("NSW").unwrap_or(0);
        let ibrion = incar.get_int("IBRION").unwrap_or(if nsw > 0 { 0 } else { -1 });

        if let Some(last) = steps.last() {
            self.electronic = last.electronic_steps as i64 >= nelm;
        }
        // 结构弛豫用完 NSW 步
        self.ionic = nsw > 0 && ibrion > 0 && steps.len() as i64 >= nsw;

        Ok(self.electronic || self.ionic)
    }

    fn correct(&mut self, dir: &Path) -> Result<Correction> {
        let incar = read_incar(dir)?;
        let mut errors = Vec::new();
        let mut actions = Vec::new();

        if self.electronic {
            errors.push("Unconverged electronic".to_string());
            match incar_str(&incar, "ALGO").as_str() {
                "fast" | "veryfast" => actions.push(SettingsOverride::incar([("ALGO", "Normal")])),
                "all" => {
                    if incar.get_float("AMIX").map_or(true, |a| a > 0.1) {
                        actions.push(SettingsOverride::incar([
                            ("AMIX", IncarValue::from(0.1)),
                            ("BMIX", IncarValue::from(0.01)),
                            ("ICHARG", IncarValue::from(2)),
                        ]));
                    }
                }
                _ => actions.push(SettingsOverride::incar([("ALGO", "All")])),
            }
        }
        if self.ionic {
            errors.push("Unconverged ionic".to_string());
            actions.push(SettingsOverride::contcar_to_poscar());
        }

        Ok(Correction {
            handler: self.name().to_string(),
            errors,
            actions,
        })
    }
}

// ─────────────────────────────────────────────────────────────
// NonConvergingErrorHandler
// ─────────────────────────────────────────────────────────────

/// 连续多个离子步的电子步都没有收敛
#[derive(Debug, Clone)]
pub struct NonConvergingErrorHandler {
    pub nionic_steps: usize,
}

impl Default for NonConvergingErrorHandler {
    fn default() -> Self {
        NonConvergingErrorHandler { nionic_steps: 10 }
    }
}

impl ErrorHandler for NonConvergingErrorHandler {
    fn name(&self) -> &str {
        "NonConvergingErrorHandler"
    }

    fn check(&mut self, dir: &Path) -> Result<bool> {
        let path = dir.join("OSZICAR");
        if !path.is_file() {
            return Ok(false);
        }
        let steps = oszicar::ionic_steps(&path)?;
        if steps.len() < self.nionic_steps {
            return Ok(false);
        }
        let nelm = read_incar(dir)?.get_int("NELM").unwrap_or(DEFAULT_NELM);
        Ok(steps[steps.len() - self.nionic_steps..]
            .iter()
            .all(|s| s.electronic_steps as i64 >= nelm))
    }

    fn correct(&mut self, dir: &Path) -> Result<Correction> {
        let incar = read_incar(dir)?;
        let algo = incar_str(&incar, "ALGO");
        let amix = incar.get_float("AMIX").unwrap_or(0.4);
        let bmix = incar.get_float("BMIX").unwrap_or(1.0);
        let amin = incar.get_float("AMIN").unwrap_or(0.1);

        let actions = if algo == "fast" || algo == "veryfast" {
            vec![SettingsOverride::incar([("ALGO", "Normal")])]
        } else if amix > 0.1 && bmix > 0.01 {
            vec![SettingsOverride::incar([
                ("AMIX", IncarValue::from(0.1)),
                ("BMIX", IncarValue::from(0.01)),
                ("ICHARG", IncarValue::from(2)),
            ])]
        } else if bmix < 3.0 && amin > 0.01 {
            vec![SettingsOverride::incar([
                ("AMIN", IncarValue::from(0.01)),
                ("BMIX", IncarValue::from(3.0)),
                ("ICHARG", IncarValue::from(2)),
            ])]
        } else {
            Vec::new()
        };

        Ok(Correction {
            handler: self.name().to_string(),
            errors: vec!["Non-converging job".to_string()],
            actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn oszicar_with(electronic_per_step: &[usize]) -> String {
        let mut s = String::new();
        for (i, &n) in electronic_per_step.iter().enumerate() {
            for j in 0..n {
                s.push_str(&format!("DAV: {:3}    -0.1E+03   -0.1E-01   -0.1E-01  100   0.1E+00\n", j + 1));
            }
            s.push_str(&format!("   {} F= -.10E+03 E0= -.10E+03  d E =-.1E+00\n", i + 1));
        }
        s
    }

    #[test]
    fn test_vasp_handler_detects_and_corrects_zbrent() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("INCAR"), "IBRION = 2\n").unwrap();
        fs::write(dir.path().join("vasp.out"), " ZBRENT: fatal error in bracketing\n").unwrap();

        let mut handler = VaspErrorHandler::new("vasp.out");
        assert!(handler.check(dir.path()).unwrap());
        let c = handler.correct(dir.path()).unwrap();
        assert_eq!(c.errors, vec!["zbrent"]);
        assert_eq!(
            c.actions,
            vec![
                SettingsOverride::incar([("IBRION", 1)]),
                SettingsOverride::contcar_to_poscar()
            ]
        );
    }

    #[test]
    fn test_vasp_handler_reports_each_error_once_in_table_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("vasp.out"),
            b" ZBRENT: fatal error in bracketing\n\xff\xfe garbage\nBRMIX: very serious problems\n ZBRENT: fatal internal in\n",
        )
        .unwrap();

        let mut handler = VaspErrorHandler::new("vasp.out");
        assert!(handler.check(dir.path()).unwrap());
        assert_eq!(handler.errors, vec!["brmix", "zbrent"]);
    }

    #[test]
    fn test_vasp_handler_subset() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("vasp.out"), "BRMIX: very serious problems\n").unwrap();

        let mut handler = VaspErrorHandler::new("vasp.out")
            .errors_subset(&["tet".to_string()])
            .unwrap();
        assert!(!handler.check(dir.path()).unwrap());
        assert!(VaspErrorHandler::new("vasp.out")
            .errors_subset(&["nope".to_string()])
            .is_err());
    }

    #[test]
    fn test_too_few_bands_reads_outcar() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("vasp.out"), "TOO FEW BANDS\n").unwrap();
        fs::write(dir.path().join("OUTCAR"), "   number of bands    NBANDS=     20\n").unwrap();

        let mut handler = VaspErrorHandler::new("vasp.out");
        assert!(handler.check(dir.path()).unwrap());
        let c = handler.correct(dir.path()).unwrap();
        assert_eq!(c.actions, vec![SettingsOverride::incar([("NBANDS", 22)])]);
    }

    #[test]
    fn test_unconverged_electronic_switches_algo() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("INCAR"), "ALGO = Fast\nNELM = 3\n").unwrap();
        fs::write(dir.path().join("OSZICAR"), oszicar_with(&[2, 3])).unwrap();

        let mut handler = UnconvergedErrorHandler::default();
        assert!(handler.check(dir.path()).unwrap());
        let c = handler.correct(dir.path()).unwrap();
        assert_eq!(c.actions, vec![SettingsOverride::incar([("ALGO", "Normal")])]);

        fs::write(dir.path().join("OSZICAR"), oszicar_with(&[3, 2])).unwrap();
        assert!(!handler.check(dir.path()).unwrap());
    }

    #[test]
    fn test_unconverged_ionic_copies_contcar() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("INCAR"), "IBRION = 2\nNSW = 2\n").unwrap();
        fs::write(dir.path().join("OSZICAR"), oszicar_with(&[5, 4])).unwrap();

        let mut handler = UnconvergedErrorHandler::default();
        assert!(handler.check(dir.path()).unwrap());
        let c = handler.correct(dir.path()).unwrap();
        assert_eq!(c.errors, vec!["Unconverged ionic"]);
        assert_eq!(c.actions, vec![SettingsOverride::contcar_to_poscar()]);
    }

    #[test]
    fn test_nonconverging_needs_consecutive_steps() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("INCAR"), "NELM = 2\n").unwrap();
        let mut handler = NonConvergingErrorHandler { nionic_steps: 2 };

        fs::write(dir.path().join("OSZICAR"), oszicar_with(&[2, 1, 2])).unwrap();
        assert!(!handler.check(dir.path()).unwrap());

        fs::write(dir.path().join("OSZICAR"), oszicar_with(&[1, 2, 2])).unwrap();
        assert!(handler.check(dir.path()).unwrap());
        let c = handler.correct(dir.path()).unwrap();
        assert_eq!(c.actions.len(), 1);
    }

    #[test]
    fn test_handler_from_name() {
        assert_eq!(handler_from_name("vasp", "vasp.out", None).unwrap().name(), "VaspErrorHandler");
        assert_eq!(
            handler_from_name("Unconverged", "vasp.out", None).unwrap().name(),
            "UnconvergedErrorHandler"
        );
        assert!(handler_from_name("frozen", "vasp.out", None).is_err());
    }
}
