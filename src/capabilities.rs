//! External capabilities consumed by the engine
//!
//! NLU and response generation are the only model-facing calls a turn makes.
//! The engine is generic over both so tests can swap in scripted doubles.

use crate::constraint::ConstraintPayload;
use crate::error::CapabilityError;
use crate::session::Slots;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What the NLU step extracted from one user input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NluResult {
    /// `None` when nothing in the allowed set fit
    pub intent: Option<String>,
    /// Raw slot candidates, keyed by slot name
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
}

impl NluResult {
    pub fn intent(intent: impl Into<String>) -> Self {
        Self {
            intent: Some(intent.into()),
            slots: BTreeMap::new(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_slot(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.slots.insert(name.into(), value.into());
        self
    }
}

/// Classifies user input against a constraint payload
#[async_trait]
pub trait NluService: Send + Sync {
    async fn understand(
        &self,
        constraints: &ConstraintPayload,
        user_input: &str,
    ) -> Result<NluResult, CapabilityError>;
}

/// Generates response text for states that declare a `response_prompt`
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, slots: &Slots) -> Result<String, CapabilityError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: NluService + ?Sized> NluService for Arc<T> {
    async fn understand(
        &self,
        constraints: &ConstraintPayload,
        user_input: &str,
    ) -> Result<NluResult, CapabilityError> {
        (**self).understand(constraints, user_input).await
    }
}

#[async_trait]
impl<T: ResponseGenerator + ?Sized> ResponseGenerator for Arc<T> {
    async fn generate(&self, prompt: &str, slots: &Slots) -> Result<String, CapabilityError> {
        (**self).generate(prompt, slots).await
    }
}
