pub mod driver;
pub mod invoker;
pub mod ports;
pub mod prompts;
pub mod retry;
pub mod shape;
pub mod stages;
pub mod testing;
pub mod types;

pub use driver::PipelineDriver;
pub use invoker::{InvokeOutcome, StageInvoker};
pub use ports::InferencePort;
pub use retry::{RetryController, StageOutcome};
pub use shape::{OutputShape, ShapeViolation};
pub use stages::{build, Experiment, ExperimentConfig, ExperimentKind};
pub use types::{StageId, StageRecord, StageResult, StageSpec, WorkingState};
