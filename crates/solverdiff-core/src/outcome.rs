use crate::classify::{classify, Classification};
use serde::Serialize;
use std::time::Duration;

pub const NO_EXIT_CODE: i32 = -1;

pub const TIMEOUT_MESSAGE: &str = "Process timed out";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Finished,
    TimedOut,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
    pub exit_code: i32,
}

impl RunOutcome {
    pub fn finished(exit_code: i32, stdout: &str, stderr: &str, elapsed: Duration) -> Self {
        Self {
            status: RunStatus::Finished,
            stdout: stdout.trim().to_string(),
            stderr: stderr.trim().to_string(),
            elapsed,
            exit_code,
        }
    }

    /// A run killed at the bound; elapsed is reported as the bound itself.
    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            status: RunStatus::TimedOut,
            stdout: String::new(),
            stderr: TIMEOUT_MESSAGE.to_string(),
            elapsed: timeout,
            exit_code: NO_EXIT_CODE,
        }
    }

    pub fn errored(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Errored,
            stdout: String::new(),
            stderr: message.into().trim().to_string(),
            elapsed: Duration::ZERO,
            exit_code: NO_EXIT_CODE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRecord {
    pub input_id: String,
    pub classification: Classification,
    pub oracle: RunOutcome,
    pub target: RunOutcome,
    /// Oracle seconds minus target seconds; positive means the target was faster.
    pub time_delta_secs: f64,
}

impl ComparisonRecord {
    pub fn from_outcomes(input_id: impl Into<String>, oracle: RunOutcome, target: RunOutcome) -> Self {
        let classification = classify(&oracle, &target);
        let time_delta_secs = oracle.elapsed.as_secs_f64() - target.elapsed.as_secs_f64();
        Self {
            input_id: input_id.into(),
            classification,
            oracle,
            target,
            time_delta_secs,
        }
    }

    /// Record for a task that failed inside the harness itself (e.g. a worker
    /// panic). Both sides carry the failure, so it classifies as an oracle error.
    pub fn harness_failure(input_id: impl Into<String>, message: &str) -> Self {
        Self::from_outcomes(
            input_id,
            RunOutcome::errored(message),
            RunOutcome::errored(message),
        )
    }
}
