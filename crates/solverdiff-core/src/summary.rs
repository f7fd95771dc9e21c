use crate::classify::Classification;
use crate::outcome::ComparisonRecord;
use serde_json::{json, Map, Value};

/// Per-classification counts. Only grows through `record`, so it can always
/// be rebuilt from the records themselves with `from_records`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    counts: [usize; Classification::COUNT],
}

fn slot(classification: Classification) -> usize {
    classification as usize
}

impl Summary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ComparisonRecord>) -> Self {
        let mut summary = Summary::default();
        for record in records {
            summary.record(record.classification);
        }
        summary
    }

    pub fn record(&mut self, classification: Classification) {
        self.counts[slot(classification)] += 1;
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.counts[slot(classification)]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn matches(&self) -> usize {
        self.count(Classification::Match)
    }

    pub fn mismatches(&self) -> usize {
        self.count(Classification::Mismatch)
    }

    pub fn timeouts(&self) -> usize {
        self.count(Classification::OracleTimeout) + self.count(Classification::TargetTimeout)
    }

    pub fn errors(&self) -> usize {
        self.count(Classification::OracleError) + self.count(Classification::TargetError)
    }

    pub fn to_json(&self) -> Value {
        let mut counts = Map::new();
        for c in Classification::ALL {
            counts.insert(c.as_str().to_string(), json!(self.count(c)));
        }
        json!({
            "total": self.total(),
            "counts": counts,
            "timeouts": self.timeouts(),
            "errors": self.errors(),
        })
    }
}
