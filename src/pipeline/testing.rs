//! Scriptable ports for exercising the pipeline without a live backend.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::fold::{FoldError, FoldOutcome, FoldPort};
use crate::gateway::error::{internal_error, GatewayError, GatewayErrorKind};
use crate::gateway::types::CompletionRequest;
use crate::pipeline::ports::InferencePort;

pub type CompletionFuture = Pin<Box<dyn Future<Output = Result<String, GatewayError>> + Send>>;
pub type CompletionHook = Arc<dyn Fn(CompletionRequest) -> CompletionFuture + Send + Sync>;

pub fn boxed<T>(
    future: impl Future<Output = T> + Send + 'static,
) -> Pin<Box<dyn Future<Output = T> + Send>>
where
    T: Send + 'static,
{
    Box::pin(future)
}

/// Inference port whose behavior a test supplies as a closure. Every request
/// is captured before the hook runs so assertions can inspect prompts.
pub struct HookedInference {
    hook: CompletionHook,
    pub calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl HookedInference {
    pub fn new(hook: CompletionHook) -> Self {
        Self {
            hook,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl InferencePort for HookedInference {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        self.calls.lock().await.push(request.clone());
        (self.hook)(request).await
    }
}

/// Canned reply for one completion call, consumed in order.
pub enum ScriptedReply {
    Text(String),
    /// A retryable gateway failure, treated like a timeout by the pipeline.
    Transient,
    /// Never resolves. Drive it with a short request timeout to exercise
    /// the timeout path.
    Hang,
}

impl ScriptedReply {
    pub fn text(value: impl Into<String>) -> Self {
        ScriptedReply::Text(value.into())
    }
}

/// Inference port that plays back a fixed script. Running past the end of
/// the script fails the call with a non-retryable error so the test aborts
/// instead of spinning.
pub struct ScriptedInference {
    replies: Mutex<VecDeque<ScriptedReply>>,
    pub calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedInference {
    pub fn new(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl InferencePort for ScriptedInference {
    async fn complete(&self, request: CompletionRequest) -> Result<String, GatewayError> {
        self.calls.lock().await.push(request);
        let reply = self.replies.lock().await.pop_front();
        match reply {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Transient) => Err(GatewayError::new(
                GatewayErrorKind::BackendTransient,
                "scripted transient failure",
            )),
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Err(internal_error("completion script exhausted")),
        }
    }
}

pub type FoldHook = Arc<dyn Fn(&str, &str) -> Result<FoldOutcome, FoldError> + Send + Sync>;

/// Fold port backed by a synchronous closure, for dataset generation and
/// design verification tests.
pub struct HookedFold {
    hook: FoldHook,
}

impl HookedFold {
    pub fn new(hook: FoldHook) -> Self {
        Self { hook }
    }
}

#[async_trait]
impl FoldPort for HookedFold {
    async fn fold(&self, seq_a: &str, seq_b: &str) -> Result<FoldOutcome, FoldError> {
        (self.hook)(seq_a, seq_b)
    }
}

/// Deterministic stand-in for a real thermodynamic backend: a base pairs
/// exactly where the two strands are complementary, and each pair lowers the
/// energy by one unit. Consistent with `fold::pairing_mask` and the
/// generator's structure filters.
pub fn complementarity_fold(seq_a: &str, seq_b: &str) -> Result<FoldOutcome, FoldError> {
    let strand_len = seq_a.chars().count();
    if strand_len == 0 || seq_b.chars().count() != strand_len {
        return Err(FoldError::Rejected("strands must be equal length".to_string()));
    }
    let comparison = crate::dna::base_comparison(seq_a, &crate::dna::reverse_complement(seq_b));

    let first_half: String = comparison
        .chars()
        .map(|bit| if bit == '1' { '(' } else { '.' })
        .collect();
    let second_half: String = comparison
        .chars()
        .rev()
        .map(|bit| if bit == '1' { ')' } else { '.' })
        .collect();
    let structure = format!("{first_half}+{second_half}");

    let total = strand_len * 2;
    let mut pair_probabilities = vec![vec![0.0; total]; total];
    for (index, bit) in comparison.chars().enumerate() {
        if bit == '1' {
            let partner = total - 1 - index;
            pair_probabilities[index][partner] = 1.0;
            pair_probabilities[partner][index] = 1.0;
        }
    }

    let paired = comparison.chars().filter(|bit| *bit == '1').count();
    Ok(FoldOutcome {
        structure,
        pair_probabilities,
        free_energy: -(paired as f64),
    })
}
