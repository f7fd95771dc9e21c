use crate::error::HarnessError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_WORKERS: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 1200;
pub const DEFAULT_OUTPUT_CSV: &str = "comparison_result.csv";
pub const DEFAULT_EXTENSION: &str = "smt2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverSpec {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusSpec {
    pub dir: PathBuf,
    /// File extension without the leading dot.
    pub extension: String,
    pub recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub oracle: SolverSpec,
    pub target: SolverSpec,
    pub corpus: CorpusSpec,
    pub max_workers: usize,
    pub timeout: Duration,
    pub output_csv: PathBuf,
    pub summary_json: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverLayer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorpusLayer {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub recursive: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    #[serde(default)]
    pub oracle: SolverLayer,
    #[serde(default)]
    pub target: SolverLayer,
    #[serde(default)]
    pub corpus: CorpusLayer,
    #[serde(default)]
    pub max_workers: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub output_csv: Option<PathBuf>,
    #[serde(default)]
    pub summary_json: Option<PathBuf>,
}

impl ConfigLayer {
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let raw = fs::read_to_string(path).map_err(|e| HarnessError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_yaml::from_str(&raw).map_err(|e| HarnessError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Fields set in `self` win over fields set in `base`.
    pub fn over(self, base: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            oracle: SolverLayer {
                name: self.oracle.name.or(base.oracle.name),
                path: self.oracle.path.or(base.oracle.path),
            },
            target: SolverLayer {
                name: self.target.name.or(base.target.name),
                path: self.target.path.or(base.target.path),
            },
            corpus: CorpusLayer {
                dir: self.corpus.dir.or(base.corpus.dir),
                extension: self.corpus.extension.or(base.corpus.extension),
                recursive: self.corpus.recursive.or(base.corpus.recursive),
            },
            max_workers: self.max_workers.or(base.max_workers),
            timeout_secs: self.timeout_secs.or(base.timeout_secs),
            output_csv: self.output_csv.or(base.output_csv),
            summary_json: self.summary_json.or(base.summary_json),
        }
    }
}

pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

fn required(value: Option<PathBuf>, pointer: &str) -> Result<PathBuf, HarnessError> {
    value
        .map(|p| expand_home(&p))
        .ok_or_else(|| HarnessError::InvalidConfig(format!("missing {}", pointer)))
}

impl HarnessConfig {
    pub fn from_layer(layer: ConfigLayer) -> Result<Self, HarnessError> {
        let oracle_path = required(layer.oracle.path, "oracle.path")?;
        let target_path = required(layer.target.path, "target.path")?;
        let corpus_dir = required(layer.corpus.dir, "corpus.dir")?;
        let extension = layer
            .corpus
            .extension
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
            .trim_start_matches('.')
            .to_string();
        Ok(HarnessConfig {
            oracle: SolverSpec {
                name: layer.oracle.name.unwrap_or_else(|| "oracle".to_string()),
                path: oracle_path,
            },
            target: SolverSpec {
                name: layer.target.name.unwrap_or_else(|| "target".to_string()),
                path: target_path,
            },
            corpus: CorpusSpec {
                dir: corpus_dir,
                extension,
                recursive: layer.corpus.recursive.unwrap_or(false),
            },
            max_workers: layer.max_workers.unwrap_or(DEFAULT_MAX_WORKERS),
            timeout: Duration::from_secs(layer.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            output_csv: layer
                .output_csv
                .map(|p| expand_home(&p))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_CSV)),
            summary_json: layer.summary_json.map(|p| expand_home(&p)),
        })
    }

    /// Setup-time checks. Any failure here aborts the run before a single
    /// input is scheduled.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.max_workers == 0 {
            return Err(HarnessError::InvalidConfig(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(HarnessError::InvalidConfig(
                "timeout must be positive".to_string(),
            ));
        }
        if Instant::now().checked_add(self.timeout).is_none() {
            return Err(HarnessError::InvalidConfig(format!(
                "timeout of {}s is out of range",
                self.timeout.as_secs()
            )));
        }
        if !self.oracle.path.is_file() {
            return Err(HarnessError::OracleBinaryMissing(self.oracle.path.clone()));
        }
        if !self.target.path.is_file() {
            return Err(HarnessError::TargetBinaryMissing(self.target.path.clone()));
        }
        check_executable("oracle", &self.oracle.path)?;
        check_executable("target", &self.target.path)?;
        if !self.corpus.dir.is_dir() {
            return Err(HarnessError::CorpusUnreadable {
                path: self.corpus.dir.clone(),
                message: "not a directory".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(unix)]
fn check_executable(role: &'static str, path: &Path) -> Result<(), HarnessError> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)
        .map(|m| m.permissions().mode())
        .unwrap_or(0);
    if mode & 0o111 == 0 {
        return Err(HarnessError::BinaryNotExecutable {
            role,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_executable(_role: &'static str, _path: &Path) -> Result<(), HarnessError> {
    Ok(())
}
