pub mod error;
pub mod openai;
pub mod types;

pub use error::{GatewayError, GatewayErrorKind};
pub use openai::OpenAiCompatibleClient;
pub use types::{ChatMessage, ChatRole, CompletionRequest, GatewayConfig};
