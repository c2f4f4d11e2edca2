use async_trait::async_trait;

use crate::gateway::error::GatewayError;
use crate::gateway::types::CompletionRequest;

/// Boundary to the model backend. The pipeline never sees transport details,
/// only completion text or a gateway error.
#[async_trait]
pub trait InferencePort: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError>;
}
