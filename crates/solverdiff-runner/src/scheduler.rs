use crate::corpus::input_id;
use crate::process::CancelFlag;
use solverdiff_core::{ComparisonRecord, HarnessError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("harness task panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("harness task panicked: {}", s)
    } else {
        "harness task panicked".to_string()
    }
}

/// Runs `task` once per corpus entry with at most `max_workers` in flight,
/// handing each record to `sink` on the calling thread as it completes
/// (completion order, never concurrently). Returns the number of records
/// delivered.
///
/// A panicking task becomes a `harness_failure` record for its input. A sink
/// error is fatal: the cancel flag is raised, no further items start, and
/// the error is returned once every worker has stopped.
pub fn run_all<F, S>(
    corpus: &[PathBuf],
    max_workers: usize,
    cancel: &CancelFlag,
    task: F,
    mut sink: S,
) -> Result<usize, HarnessError>
where
    F: Fn(&Path) -> ComparisonRecord + Sync,
    S: FnMut(ComparisonRecord) -> Result<(), HarnessError>,
{
    if corpus.is_empty() {
        return Ok(0);
    }
    let workers = max_workers.clamp(1, corpus.len());
    let cursor = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<ComparisonRecord>();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let cursor = &cursor;
            let task = &task;
            scope.spawn(move || loop {
                if cancel.is_cancelled() {
                    break;
                }
                let idx = cursor.fetch_add(1, Ordering::SeqCst);
                let Some(path) = corpus.get(idx) else {
                    break;
                };
                let record = panic::catch_unwind(AssertUnwindSafe(|| task(path)))
                    .unwrap_or_else(|payload| {
                        let message = panic_message(payload);
                        tracing::error!(input = %path.display(), %message, "comparison task failed");
                        ComparisonRecord::harness_failure(input_id(path), &message)
                    });
                if tx.send(record).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        let mut delivered = 0usize;
        let mut failure = None;
        for record in rx.iter() {
            if let Err(e) = sink(record) {
                tracing::error!(error = %e, "result sink failed; cancelling run");
                cancel.cancel();
                failure = Some(e);
                break;
            }
            delivered += 1;
        }
        drop(rx);
        match failure {
            Some(e) => Err(e),
            None => Ok(delivered),
        }
    })
}
