use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("oracle binary not found at {0}")]
    OracleBinaryMissing(PathBuf),
    #[error("target binary not found at {0}")]
    TargetBinaryMissing(PathBuf),
    #[error("{role} binary is not executable: {path}")]
    BinaryNotExecutable { role: &'static str, path: PathBuf },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },
    #[error("corpus directory {path} unreadable: {message}")]
    CorpusUnreadable { path: PathBuf, message: String },
    #[error("failed writing results to {path}: {source}")]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed writing summary to {path}: {source}")]
    SummaryWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::OracleBinaryMissing(_) => "oracle_binary_missing",
            HarnessError::TargetBinaryMissing(_) => "target_binary_missing",
            HarnessError::BinaryNotExecutable { .. } => "binary_not_executable",
            HarnessError::InvalidConfig(_) => "invalid_config",
            HarnessError::ConfigParse { .. } => "config_parse",
            HarnessError::CorpusUnreadable { .. } => "corpus_unreadable",
            HarnessError::SinkWrite { .. } => "sink_write",
            HarnessError::SummaryWrite { .. } => "summary_write",
        }
    }
}
