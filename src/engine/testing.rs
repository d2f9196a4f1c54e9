//! Test doubles for the engine's external capabilities

use crate::capabilities::{NluResult, NluService, ResponseGenerator};
use crate::constraint::ConstraintPayload;
use crate::error::CapabilityError;
use crate::session::Slots;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

// ============================================================================
// Mock NLU
// ============================================================================

/// NLU that returns queued results in order; an empty queue yields no intent
#[derive(Default)]
pub struct ScriptedNlu {
    results: Mutex<VecDeque<Result<NluResult, CapabilityError>>>,
    /// Record of every (constraints, input) pair seen
    pub requests: Mutex<Vec<(ConstraintPayload, String)>>,
}

impl ScriptedNlu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful result
    #[must_use]
    pub fn then(self, result: NluResult) -> Self {
        self.results.lock().unwrap().push_back(Ok(result));
        self
    }

    /// Queue a failure
    #[must_use]
    pub fn then_fail(self, message: &str) -> Self {
        self.results
            .lock()
            .unwrap()
            .push_back(Err(CapabilityError::new("nlu", message)));
        self
    }

    pub fn recorded_requests(&self) -> Vec<(ConstraintPayload, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl NluService for ScriptedNlu {
    async fn understand(
        &self,
        constraints: &ConstraintPayload,
        user_input: &str,
    ) -> Result<NluResult, CapabilityError> {
        self.requests
            .lock()
            .unwrap()
            .push((constraints.clone(), user_input.to_string()));
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(NluResult::none()))
    }
}

/// NLU that always fails
pub struct FailingNlu;

#[async_trait]
impl NluService for FailingNlu {
    async fn understand(
        &self,
        _constraints: &ConstraintPayload,
        _user_input: &str,
    ) -> Result<NluResult, CapabilityError> {
        Err(CapabilityError::new("nlu", "model unavailable"))
    }
}

/// NLU that never completes (for cancellation testing)
pub struct HangingNlu;

#[async_trait]
impl NluService for HangingNlu {
    async fn understand(
        &self,
        _constraints: &ConstraintPayload,
        _user_input: &str,
    ) -> Result<NluResult, CapabilityError> {
        std::future::pending().await
    }
}

// ============================================================================
// Mock response generators
// ============================================================================

/// Echoes the prompt followed by `name=value` pairs for each slot
pub struct EchoResponder;

#[async_trait]
impl ResponseGenerator for EchoResponder {
    async fn generate(&self, prompt: &str, slots: &Slots) -> Result<String, CapabilityError> {
        let pairs: Vec<String> = slots
            .iter()
            .map(|(name, value)| match value.as_str() {
                Some(s) => format!("{name}={s}"),
                None => format!("{name}={value}"),
            })
            .collect();
        Ok(format!("{prompt} [{}]", pairs.join(", ")))
    }
}

/// Response generator that always fails
pub struct FailingResponder;

#[async_trait]
impl ResponseGenerator for FailingResponder {
    async fn generate(&self, _prompt: &str, _slots: &Slots) -> Result<String, CapabilityError> {
        Err(CapabilityError::new("response_generator", "model unavailable"))
    }
}
