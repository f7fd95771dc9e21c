//! Differential execution engine: runs an oracle and a target solver on every
//! corpus input under a timeout, classifies each pair, and streams the
//! records into a crash-safe CSV.

pub mod compare;
pub mod corpus;
pub mod process;
pub mod scheduler;
pub mod sink;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use solverdiff_core::{Classification, ComparisonRecord, HarnessConfig, HarnessError, Summary};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub use compare::PairwiseComparator;
pub use corpus::{discover_corpus, input_id};
pub use process::{run_solver, CancelFlag};
pub use scheduler::run_all;
pub use sink::{DurableWrite, ResultSink};

/// Receives live progress. Called on the consuming thread only, after the
/// record has been persisted.
pub trait ProgressObserver {
    fn on_start(&mut self, _total: usize, _config: &HarnessConfig) {}
    fn on_record(&mut self, completed: usize, total: usize, record: &ComparisonRecord);
}

pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_record(&mut self, _completed: usize, _total: usize, _record: &ComparisonRecord) {}
}

pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub summary: Summary,
    pub output_csv: PathBuf,
    pub summary_json: Option<PathBuf>,
}

pub struct RunPlan {
    pub corpus: Vec<PathBuf>,
}

pub fn plan_comparison(config: &HarnessConfig) -> Result<RunPlan, HarnessError> {
    config.validate()?;
    let corpus = discover_corpus(&config.corpus)?;
    Ok(RunPlan { corpus })
}

pub fn run_comparison(
    config: &HarnessConfig,
    observer: &mut dyn ProgressObserver,
) -> Result<RunReport, HarnessError> {
    let plan = plan_comparison(config)?;
    let total = plan.corpus.len();
    let started_at = Utc::now();
    let run_id = format!("run_{}", started_at.format("%Y%m%d_%H%M%S"));
    tracing::info!(
        run_id = %run_id,
        total,
        workers = config.max_workers,
        timeout_secs = config.timeout.as_secs_f64(),
        "starting comparison run"
    );

    let mut sink = ResultSink::create(&config.output_csv)?;
    observer.on_start(total, config);

    let cancel = CancelFlag::new();
    let comparator = PairwiseComparator::new(config, cancel.clone());
    let mut completed = 0usize;
    run_all(
        &plan.corpus,
        config.max_workers,
        &cancel,
        |input| comparator.compare(input),
        |record| {
            sink.record(&record)?;
            completed += 1;
            if record.classification == Classification::Mismatch {
                tracing::warn!(
                    input = %record.input_id,
                    oracle = %record.oracle.stdout,
                    target = %record.target.stdout,
                    "output mismatch"
                );
            }
            observer.on_record(completed, total, &record);
            Ok(())
        },
    )?;

    let summary = sink.summary().clone();
    let report = RunReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        total,
        summary,
        output_csv: config.output_csv.clone(),
        summary_json: config.summary_json.clone(),
    };
    if let Some(path) = &config.summary_json {
        write_summary_json(path, &report_to_json(config, &report))?;
    }
    tracing::info!(
        run_id = %report.run_id,
        matches = report.summary.matches(),
        mismatches = report.summary.mismatches(),
        timeouts = report.summary.timeouts(),
        "comparison run finished"
    );
    Ok(report)
}

pub fn report_to_json(config: &HarnessConfig, report: &RunReport) -> Value {
    json!({
        "schema_version": "solverdiff_summary_v1",
        "run_id": report.run_id,
        "started_at": report.started_at.to_rfc3339(),
        "finished_at": report.finished_at.to_rfc3339(),
        "oracle": { "name": config.oracle.name, "path": config.oracle.path.display().to_string() },
        "target": { "name": config.target.name, "path": config.target.path.display().to_string() },
        "corpus_dir": config.corpus.dir.display().to_string(),
        "max_workers": config.max_workers,
        "timeout_secs": config.timeout.as_secs_f64(),
        "total": report.total,
        "summary": report.summary.to_json(),
        "output_csv": report.output_csv.display().to_string(),
    })
}

fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(
        ".{}.tmp.{}.{}",
        name,
        std::process::id(),
        Utc::now().timestamp_micros()
    ));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    sink::sync_parent_dir(path);
    Ok(())
}

fn write_summary_json(path: &Path, value: &Value) -> Result<(), HarnessError> {
    let to_err = |source: std::io::Error| HarnessError::SummaryWrite {
        path: path.to_path_buf(),
        source,
    };
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| to_err(e.into()))?;
    atomic_write_bytes(path, &bytes).map_err(to_err)
}
