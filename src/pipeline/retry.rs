use std::time::Duration;

use tokio::time::sleep;

use crate::gateway::error::GatewayError;
use crate::pipeline::invoker::{InvokeOutcome, StageInvoker};
use crate::pipeline::types::{StageResult, StageSpec, WorkingState};

/// Counters for one stage run. `invocations` counts every call issued,
/// `rejections` only replies the shape check refused. Timed-out calls add an
/// invocation but never a rejection, so they cannot exhaust a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub result: StageResult,
    pub invocations: u32,
    pub rejections: u32,
}

pub struct RetryController {
    retry_delay: Duration,
}

impl RetryController {
    pub fn new(retry_delay: Duration) -> Self {
        Self { retry_delay }
    }

    /// Drives one stage to a terminal result: accepted on the first
    /// well-shaped reply, failed once `max_tries` replies have been
    /// rejected. Timeouts pause for the retry delay and go again.
    pub async fn run_stage(
        &self,
        invoker: &StageInvoker,
        spec: &StageSpec,
        state: &WorkingState<'_>,
    ) -> Result<StageOutcome, GatewayError> {
        let shape = (spec.shape)(state.item);
        let mut invocations: u32 = 0;
        let mut rejections: u32 = 0;
        loop {
            invocations = invocations.saturating_add(1);
            match invoker.invoke(spec, state).await? {
                InvokeOutcome::Response(raw) => match shape.check(&raw) {
                    Ok(value) => {
                        tracing::debug!(
                            target: "pipeline",
                            stage = %spec.stage,
                            invocations,
                            rejections,
                            "stage_accepted"
                        );
                        return Ok(StageOutcome {
                            result: StageResult::accepted(value),
                            invocations,
                            rejections,
                        });
                    }
                    Err(violation) => {
                        rejections = rejections.saturating_add(1);
                        tracing::debug!(
                            target: "pipeline",
                            stage = %spec.stage,
                            rejections,
                            max_tries = spec.max_tries,
                            violation = %violation,
                            "stage_reply_rejected"
                        );
                        if rejections >= spec.max_tries {
                            tracing::debug!(
                                target: "pipeline",
                                stage = %spec.stage,
                                invocations,
                                rejections,
                                "stage_failed"
                            );
                            return Ok(StageOutcome {
                                result: StageResult::Failed,
                                invocations,
                                rejections,
                            });
                        }
                    }
                },
                InvokeOutcome::TimedOut => {
                    sleep(self.retry_delay).await;
                }
            }
        }
    }
}
