use solverdiff_core::{ComparisonRecord, HarnessError, Summary};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const CSV_HEADER: [&str; 7] = [
    "filename",
    "status",
    "oracle_time",
    "target_time",
    "time_diff",
    "oracle_result",
    "target_result",
];

pub trait DurableWrite: Write {
    fn sync(&mut self) -> io::Result<()>;
}

impl DurableWrite for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

impl DurableWrite for Vec<u8> {
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub(crate) fn sync_parent_dir(path: &Path) {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(p) => p,
        None => Path::new("."),
    };
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }
}

fn collapse_newlines(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn secs(value: f64) -> String {
    format!("{:.4}", value)
}

pub fn csv_row(record: &ComparisonRecord) -> String {
    let fields = [
        csv_field(&record.input_id),
        record.classification.as_str().to_string(),
        secs(record.oracle.elapsed.as_secs_f64()),
        secs(record.target.elapsed.as_secs_f64()),
        secs(record.time_delta_secs),
        csv_field(&collapse_newlines(&record.oracle.stdout)),
        csv_field(&collapse_newlines(&record.target.stdout)),
    ];
    let mut row = fields.join(",");
    row.push('\n');
    row
}

pub struct ResultSink<W: DurableWrite> {
    writer: W,
    path: PathBuf,
    summary: Summary,
}

impl ResultSink<File> {
    /// Opens `path` fresh, discarding any previous run's rows. Each `record`
    /// call is on disk before it returns, so a crash after N calls leaves
    /// exactly N complete rows.
    pub fn create(path: &Path) -> Result<Self, HarnessError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| HarnessError::SinkWrite {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| HarnessError::SinkWrite {
                path: path.to_path_buf(),
                source,
            })?;
        let sink = Self::with_writer(file, path)?;
        sync_parent_dir(path);
        Ok(sink)
    }
}

impl<W: DurableWrite> ResultSink<W> {
    pub fn with_writer(writer: W, path: &Path) -> Result<Self, HarnessError> {
        let mut sink = ResultSink {
            writer,
            path: path.to_path_buf(),
            summary: Summary::default(),
        };
        let header = format!("{}\n", CSV_HEADER.join(","));
        sink.write_durably(header.as_bytes())?;
        Ok(sink)
    }

    fn write_durably(&mut self, bytes: &[u8]) -> Result<(), HarnessError> {
        self.writer
            .write_all(bytes)
            .and_then(|_| self.writer.flush())
            .and_then(|_| self.writer.sync())
            .map_err(|source| HarnessError::SinkWrite {
                path: self.path.clone(),
                source,
            })
    }

    pub fn record(&mut self, record: &ComparisonRecord) -> Result<(), HarnessError> {
        self.write_durably(csv_row(record).as_bytes())?;
        self.summary.record(record.classification);
        Ok(())
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_parts(self) -> (W, Summary) {
        (self.writer, self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solverdiff_core::{Classification, RunOutcome};
    use std::time::Duration;

    fn record(id: &str, oracle: &str, target: &str) -> ComparisonRecord {
        ComparisonRecord::from_outcomes(
            id,
            RunOutcome::finished(0, oracle, "", Duration::from_millis(1500)),
            RunOutcome::finished(0, target, "", Duration::from_millis(250)),
        )
    }

    /// Accepts `budget` writes, then fails like a full disk.
    struct FailingWriter {
        budget: usize,
        written: Vec<u8>,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "No space left on device"));
            }
            self.budget -= 1;
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl DurableWrite for FailingWriter {
        fn sync(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_header_then_one_row_per_record() {
        let mut sink = ResultSink::with_writer(Vec::new(), Path::new("mem.csv")).expect("sink");
        sink.record(&record("a.smt2", "sat", "sat")).expect("row");
        sink.record(&record("b.smt2", "unsat", "sat")).expect("row");
        let (bytes, summary) = sink.into_parts();
        let text = String::from_utf8(bytes).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "filename,status,oracle_time,target_time,time_diff,oracle_result,target_result",
                "a.smt2,MATCH,1.5000,0.2500,1.2500,sat,sat",
                "b.smt2,MISMATCH,1.5000,0.2500,1.2500,unsat,sat",
            ]
        );
        assert_eq!(summary.matches(), 1);
        assert_eq!(summary.mismatches(), 1);
    }

    #[test]
    fn multi_line_results_are_collapsed_and_quoted() {
        let r = record("x,y.smt2", "sat\n(model \"m\")", "sat\r\nunknown");
        assert_eq!(
            csv_row(&r),
            "\"x,y.smt2\",MISMATCH,1.5000,0.2500,1.2500,\"sat (model \"\"m\"\")\",sat unknown\n"
        );
    }

    #[test]
    fn negative_delta_keeps_sign() {
        let r = ComparisonRecord::from_outcomes(
            "slow.smt2",
            RunOutcome::finished(0, "sat", "", Duration::from_millis(100)),
            RunOutcome::timed_out(Duration::from_secs(2)),
        );
        assert_eq!(r.classification, Classification::TargetTimeout);
        assert!(csv_row(&r).starts_with("slow.smt2,TARGET_TIMEOUT,0.1000,2.0000,-1.9000,sat,\n"));
    }

    #[test]
    fn write_failure_is_fatal_and_not_counted() {
        let writer = FailingWriter {
            budget: 3,
            written: Vec::new(),
        };
        let mut sink = ResultSink::with_writer(writer, Path::new("full.csv")).expect("header");
        sink.record(&record("a.smt2", "sat", "sat")).expect("first row");
        sink.record(&record("b.smt2", "sat", "sat")).expect("second row");
        let err = sink
            .record(&record("c.smt2", "sat", "sat"))
            .expect_err("third row must fail");
        assert!(matches!(err, HarnessError::SinkWrite { .. }));
        assert_eq!(sink.summary().total(), 2);
        let (writer, _) = sink.into_parts();
        let text = String::from_utf8(writer.written).expect("utf8");
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().all(|l| l.split(',').count() == 7));
    }

    #[test]
    fn parent_dir_sync_tolerates_bare_and_missing_parents() {
        sync_parent_dir(Path::new("result.csv"));
        sync_parent_dir(Path::new("/definitely/not/here/result.csv"));
    }

    #[test]
    fn create_truncates_an_existing_file() {
        let dir = std::env::temp_dir().join(format!(
            "solverdiff_sink_{}_{}",
            std::process::id(),
            chrono::Utc::now().timestamp_micros()
        ));
        std::fs::create_dir_all(&dir).expect("dir");
        let path = dir.join("result.csv");
        std::fs::write(&path, "stale,row\nstale,row\nstale,row\n").expect("seed");
        let mut sink = ResultSink::create(&path).expect("create");
        sink.record(&record("a.smt2", "sat", "sat")).expect("row");
        drop(sink);
        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(text.lines().count(), 2);
        assert!(!text.contains("stale"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
