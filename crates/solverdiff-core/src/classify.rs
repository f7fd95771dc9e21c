//! Oracle/target verdicts.
//!
//! A verdict depends only on the two run statuses and the two trimmed
//! stdout strings. Failure rules are checked in table order, oracle first,
//! and the first hit wins; when both sides finished, stdout is compared for
//! exact string equality with no normalisation.

use crate::outcome::{RunOutcome, RunStatus};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Match = 0,
    Mismatch = 1,
    OracleTimeout = 2,
    OracleError = 3,
    TargetTimeout = 4,
    TargetError = 5,
}

impl Classification {
    pub const COUNT: usize = 6;

    pub const ALL: [Classification; Self::COUNT] = [
        Classification::Match,
        Classification::Mismatch,
        Classification::OracleTimeout,
        Classification::OracleError,
        Classification::TargetTimeout,
        Classification::TargetError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Match => "MATCH",
            Classification::Mismatch => "MISMATCH",
            Classification::OracleTimeout => "ORACLE_TIMEOUT",
            Classification::OracleError => "ORACLE_ERROR",
            Classification::TargetTimeout => "TARGET_TIMEOUT",
            Classification::TargetError => "TARGET_ERROR",
        }
    }

    pub fn is_timeout(self) -> bool {
        matches!(
            self,
            Classification::OracleTimeout | Classification::TargetTimeout
        )
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            Classification::OracleError | Classification::TargetError
        )
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Oracle,
    Target,
}

struct FailureRule {
    side: Side,
    status: RunStatus,
    verdict: Classification,
}

const FAILURE_RULES: [FailureRule; 4] = [
    FailureRule {
        side: Side::Oracle,
        status: RunStatus::TimedOut,
        verdict: Classification::OracleTimeout,
    },
    FailureRule {
        side: Side::Oracle,
        status: RunStatus::Errored,
        verdict: Classification::OracleError,
    },
    FailureRule {
        side: Side::Target,
        status: RunStatus::TimedOut,
        verdict: Classification::TargetTimeout,
    },
    FailureRule {
        side: Side::Target,
        status: RunStatus::Errored,
        verdict: Classification::TargetError,
    },
];

pub fn classify_parts(
    oracle_status: RunStatus,
    target_status: RunStatus,
    oracle_stdout: &str,
    target_stdout: &str,
) -> Classification {
    for rule in FAILURE_RULES.iter() {
        let status = match rule.side {
            Side::Oracle => oracle_status,
            Side::Target => target_status,
        };
        if status == rule.status {
            return rule.verdict;
        }
    }
    if oracle_stdout == target_stdout {
        Classification::Match
    } else {
        Classification::Mismatch
    }
}

pub fn classify(oracle: &RunOutcome, target: &RunOutcome) -> Classification {
    classify_parts(oracle.status, target.status, &oracle.stdout, &target.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn done(stdout: &str) -> RunOutcome {
        RunOutcome::finished(0, stdout, "", Duration::from_millis(10))
    }

    #[test]
    fn equal_outputs_match() {
        assert_eq!(classify(&done("sat"), &done("sat")), Classification::Match);
    }

    #[test]
    fn differing_outputs_mismatch() {
        assert_eq!(
            classify(&done("unsat"), &done("sat")),
            Classification::Mismatch
        );
    }

    #[test]
    fn comparison_is_case_sensitive() {
        assert_eq!(classify(&done("SAT"), &done("sat")), Classification::Mismatch);
    }

    #[test]
    fn surrounding_whitespace_is_ignored_but_inner_is_not() {
        assert_eq!(
            classify(&done("sat\n"), &done("  sat")),
            Classification::Match
        );
        assert_eq!(
            classify(&done("sat\nunsat"), &done("sat unsat")),
            Classification::Mismatch
        );
    }

    #[test]
    fn oracle_timeout_beats_target_timeout() {
        let oracle = RunOutcome::timed_out(Duration::from_secs(1));
        let target = RunOutcome::timed_out(Duration::from_secs(1));
        assert_eq!(classify(&oracle, &target), Classification::OracleTimeout);
    }

    #[test]
    fn oracle_error_beats_target_timeout() {
        let oracle = RunOutcome::errored("boom");
        let target = RunOutcome::timed_out(Duration::from_secs(1));
        assert_eq!(classify(&oracle, &target), Classification::OracleError);
    }

    #[test]
    fn target_timeout_beats_target_output() {
        let target = RunOutcome::timed_out(Duration::from_secs(1));
        assert_eq!(classify(&done("sat"), &target), Classification::TargetTimeout);
    }

    #[test]
    fn target_error_after_oracle_success() {
        let target = RunOutcome::errored("permission denied");
        assert_eq!(classify(&done("sat"), &target), Classification::TargetError);
    }

    #[test]
    fn nonzero_exit_codes_still_compare_stdout() {
        let oracle = RunOutcome::finished(10, "sat", "", Duration::ZERO);
        let target = RunOutcome::finished(20, "sat", "", Duration::ZERO);
        assert_eq!(classify(&oracle, &target), Classification::Match);
    }

    fn any_status() -> impl Strategy<Value = RunStatus> {
        prop_oneof![
            Just(RunStatus::Finished),
            Just(RunStatus::TimedOut),
            Just(RunStatus::Errored),
        ]
    }

    proptest! {
        #[test]
        fn classification_is_deterministic(
            o in any_status(),
            t in any_status(),
            a in "[a-z \\n]{0,12}",
            b in "[a-z \\n]{0,12}",
        ) {
            prop_assert_eq!(classify_parts(o, t, &a, &b), classify_parts(o, t, &a, &b));
        }

        #[test]
        fn oracle_timeout_always_wins(
            t in any_status(),
            a in ".{0,8}",
            b in ".{0,8}",
        ) {
            prop_assert_eq!(
                classify_parts(RunStatus::TimedOut, t, &a, &b),
                Classification::OracleTimeout
            );
        }

        #[test]
        fn finished_pairs_match_iff_equal(a in "[a-z]{0,6}", b in "[a-z]{0,6}") {
            let verdict = classify_parts(RunStatus::Finished, RunStatus::Finished, &a, &b);
            prop_assert_eq!(verdict == Classification::Match, a == b);
        }
    }
}
