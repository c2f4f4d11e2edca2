use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::gateway::error::GatewayError;
use crate::gateway::types::CompletionRequest;
use crate::pipeline::ports::InferencePort;
use crate::pipeline::types::{StageSpec, WorkingState};

/// One completion call that either produced text or is worth reissuing.
/// Gateway errors that retrying cannot mend surface as `Err` and abort the
/// run; they mean the operator has to fix something.
#[derive(Debug, PartialEq)]
pub enum InvokeOutcome {
    Response(String),
    TimedOut,
}

pub struct StageInvoker {
    port: Arc<dyn InferencePort>,
    request_timeout: Duration,
}

impl StageInvoker {
    pub fn new(port: Arc<dyn InferencePort>, request_timeout: Duration) -> Self {
        Self { port, request_timeout }
    }

    pub async fn invoke(
        &self,
        spec: &StageSpec,
        state: &WorkingState<'_>,
    ) -> Result<InvokeOutcome, GatewayError> {
        let request = CompletionRequest {
            model: spec.model.clone(),
            messages: (spec.prompt)(state),
        };
        match timeout(self.request_timeout, self.port.complete(request)).await {
            Ok(Ok(text)) => Ok(InvokeOutcome::Response(text)),
            Ok(Err(err)) if err.retryable => {
                tracing::warn!(
                    target: "pipeline",
                    stage = %spec.stage,
                    model = %spec.model,
                    error = %err,
                    "stage_call_transient_failure"
                );
                Ok(InvokeOutcome::TimedOut)
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                tracing::warn!(
                    target: "pipeline",
                    stage = %spec.stage,
                    model = %spec.model,
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "stage_call_timeout"
                );
                Ok(InvokeOutcome::TimedOut)
            }
        }
    }
}
