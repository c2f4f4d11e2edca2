pub mod recorder;

use serde::{Deserialize, Serialize};

use crate::corpus::Item;
use crate::pipeline::types::{StageId, StageRecord};

pub use recorder::{read_traces, TraceError, TraceWriter};

/// Everything observed while running one corpus item through the chain: the
/// item itself plus one record per stage, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub item: Item,
    pub records: Vec<StageRecord>,
}

impl Trace {
    pub fn record(&self, stage: StageId) -> Option<&StageRecord> {
        self.records.iter().find(|record| record.stage == stage)
    }

    pub fn final_record(&self) -> Option<&StageRecord> {
        self.records.last()
    }
}

pub fn trace_file_name(kind: &str, condition: Option<&str>, train_size: u64) -> String {
    match condition {
        Some(condition) => format!("{kind}_{condition}_test_size_{train_size}.jsonl"),
        None => format!("{kind}_test_size_{train_size}.jsonl"),
    }
}
