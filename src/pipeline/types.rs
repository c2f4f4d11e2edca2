use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::corpus::Item;
use crate::gateway::types::ChatMessage;
use crate::pipeline::shape::OutputShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    ReverseComplement,
    BaseComparison,
    BasePairing,
    StructureConversion,
    SecondaryStructure,
    FreeEnergy,
    SequenceDesign,
    StructureCheck,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::ReverseComplement => "reverse_complement",
            StageId::BaseComparison => "base_comparison",
            StageId::BasePairing => "base_pairing",
            StageId::StructureConversion => "structure_conversion",
            StageId::SecondaryStructure => "secondary_structure",
            StageId::FreeEnergy => "free_energy",
            StageId::SequenceDesign => "sequence_design",
            StageId::StructureCheck => "structure_check",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one stage. Failure is a value, never a sentinel string
/// mixed into the answer domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageResult {
    Accepted { value: String },
    Failed,
}

impl StageResult {
    pub fn accepted(value: impl Into<String>) -> Self {
        StageResult::Accepted { value: value.into() }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            StageResult::Accepted { value } => Some(value),
            StageResult::Failed => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StageResult::Failed)
    }
}

/// What one stage did for one item. `expected` is the ground-truth answer
/// captured at run time so scoring never recomputes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageId,
    pub expected: String,
    #[serde(flatten)]
    pub result: StageResult,
    /// Completion calls issued, including ones that timed out.
    pub invocations: u32,
    /// Replies the shape check turned away.
    pub rejections: u32,
}

/// Accepted upstream values visible to later stages of the same item run.
pub struct WorkingState<'a> {
    pub item: &'a Item,
    accepted: Vec<(StageId, String)>,
}

impl<'a> WorkingState<'a> {
    pub fn new(item: &'a Item) -> Self {
        Self { item, accepted: Vec::new() }
    }

    pub fn accept(&mut self, stage: StageId, value: String) {
        self.accepted.push((stage, value));
    }

    pub fn value_of(&self, stage: StageId) -> Option<&str> {
        self.accepted
            .iter()
            .find(|(id, _)| *id == stage)
            .map(|(_, value)| value.as_str())
    }
}

pub type PromptFn = Arc<dyn Fn(&WorkingState<'_>) -> Vec<ChatMessage> + Send + Sync>;
pub type ShapeFn = Arc<dyn Fn(&Item) -> OutputShape + Send + Sync>;
pub type ExpectedFn = Arc<dyn Fn(&Item) -> String + Send + Sync>;

/// Everything the driver needs to run one expert: which model to call, how
/// to phrase the request from current state, what shape the reply must have,
/// and how many rejected replies to tolerate.
#[derive(Clone)]
pub struct StageSpec {
    pub stage: StageId,
    pub model: String,
    pub max_tries: u32,
    pub prompt: PromptFn,
    pub shape: ShapeFn,
    pub expected: ExpectedFn,
}

impl fmt::Debug for StageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageSpec")
            .field("stage", &self.stage)
            .field("model", &self.model)
            .field("max_tries", &self.max_tries)
            .finish_non_exhaustive()
    }
}
