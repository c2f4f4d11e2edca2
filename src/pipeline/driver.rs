use std::sync::Arc;
use std::time::Duration;

use crate::corpus::Item;
use crate::gateway::error::GatewayError;
use crate::pipeline::invoker::StageInvoker;
use crate::pipeline::ports::InferencePort;
use crate::pipeline::retry::RetryController;
use crate::pipeline::types::{StageRecord, StageResult, StageSpec, WorkingState};
use crate::trace::Trace;

/// Runs the expert chain for one item at a time. Stages execute strictly in
/// order; each accepted value becomes visible to every later stage's prompt.
/// A failed stage short-circuits the rest of the chain, which is recorded as
/// failed without a single call, and the item still yields a full trace.
pub struct PipelineDriver {
    invoker: StageInvoker,
    retry: RetryController,
}

impl PipelineDriver {
    pub fn new(
        port: Arc<dyn InferencePort>,
        request_timeout: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            invoker: StageInvoker::new(port, request_timeout),
            retry: RetryController::new(retry_delay),
        }
    }

    pub async fn run_item(
        &self,
        specs: &[StageSpec],
        item: &Item,
    ) -> Result<Trace, GatewayError> {
        let mut state = WorkingState::new(item);
        let mut records = Vec::with_capacity(specs.len());
        let mut short_circuited = false;

        for spec in specs {
            let expected = (spec.expected)(item);
            if short_circuited {
                records.push(StageRecord {
                    stage: spec.stage,
                    expected,
                    result: StageResult::Failed,
                    invocations: 0,
                    rejections: 0,
                });
                continue;
            }

            let outcome = self.retry.run_stage(&self.invoker, spec, &state).await?;
            if let StageResult::Accepted { value } = &outcome.result {
                state.accept(spec.stage, value.clone());
            } else {
                short_circuited = true;
            }
            records.push(StageRecord {
                stage: spec.stage,
                expected,
                result: outcome.result,
                invocations: outcome.invocations,
                rejections: outcome.rejections,
            });
        }

        Ok(Trace {
            item: item.clone(),
            records,
        })
    }
}
