pub mod classify;
pub mod config;
pub mod error;
pub mod outcome;
pub mod summary;

pub use classify::{classify, classify_parts, Classification};
pub use config::{
    expand_home, ConfigLayer, CorpusLayer, CorpusSpec, HarnessConfig, SolverLayer, SolverSpec,
};
pub use error::HarnessError;
pub use outcome::{ComparisonRecord, RunOutcome, RunStatus, NO_EXIT_CODE, TIMEOUT_MESSAGE};
pub use summary::Summary;
