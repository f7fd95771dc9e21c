use crate::corpus::input_id;
use crate::process::{run_solver, CancelFlag, CANCELLED_MESSAGE};
use solverdiff_core::{ComparisonRecord, HarnessConfig, RunOutcome};
use std::path::Path;

pub struct PairwiseComparator<'a> {
    config: &'a HarnessConfig,
    cancel: CancelFlag,
}

impl<'a> PairwiseComparator<'a> {
    pub fn new(config: &'a HarnessConfig, cancel: CancelFlag) -> Self {
        Self { config, cancel }
    }

    fn run(&self, binary: &Path, input: &Path) -> RunOutcome {
        if self.cancel.is_cancelled() {
            return RunOutcome::errored(CANCELLED_MESSAGE);
        }
        run_solver(binary, input, self.config.timeout, &self.cancel)
    }

    pub fn compare(&self, input: &Path) -> ComparisonRecord {
        let oracle = self.run(&self.config.oracle.path, input);
        let target = self.run(&self.config.target.path, input);
        let record = ComparisonRecord::from_outcomes(input_id(input), oracle, target);
        tracing::debug!(
            input = %record.input_id,
            classification = %record.classification,
            oracle_secs = record.oracle.elapsed.as_secs_f64(),
            target_secs = record.target.elapsed.as_secs_f64(),
            "comparison finished"
        );
        record
    }
}
