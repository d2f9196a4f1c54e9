//! Capability registry
//!
//! Maps the symbolic names used in a flow document to the validator,
//! enricher, action, condition, and response-function implementations the
//! host registers. Names are checked against the flow once, when the engine
//! is built, so a typo surfaces at startup rather than mid-conversation.
//!
//! Plain closures implement every capability trait; anything that needs
//! I/O (an HTTP enricher, a database-backed action) implements the async
//! trait directly and is added with the `insert_*` methods.

use crate::error::CapabilityError;
use crate::session::{SessionContext, Slots};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Capability traits
// ============================================================================

/// Accepts or rejects a raw slot value
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, value: &Value) -> Result<bool, CapabilityError>;
}

/// Transforms an accepted slot value
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, value: &Value) -> Result<Value, CapabilityError>;
}

/// Runs on entry into an action state
#[async_trait]
pub trait Action: Send + Sync {
    async fn execute(&self, context: &SessionContext) -> Result<ActionOutcome, CapabilityError>;
}

/// Guards an intent transition
#[async_trait]
pub trait Condition: Send + Sync {
    async fn check(&self, context: &SessionContext) -> Result<bool, CapabilityError>;
}

/// Produces response text from session state; `None` defers to the template or prompt
#[async_trait]
pub trait ResponseFunction: Send + Sync {
    async fn render(&self, context: &SessionContext) -> Result<Option<String>, CapabilityError>;
}

/// Result of running an action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// Looked up in the action state's result map
    pub result: String,
    /// Merged into the session slots before the result is resolved
    pub slot_updates: Slots,
}

impl ActionOutcome {
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            slot_updates: Slots::new(),
        }
    }

    pub fn success() -> Self {
        Self::new(crate::flow::SUCCESS_RESULT)
    }

    #[must_use]
    pub fn with_slot(mut self, name: impl Into<String>, value: Value) -> Self {
        self.slot_updates.insert(name.into(), value);
        self
    }
}

// ============================================================================
// Closure implementations
// ============================================================================

#[async_trait]
impl<F> Validator for F
where
    F: Fn(&Value) -> Result<bool, CapabilityError> + Send + Sync,
{
    async fn validate(&self, value: &Value) -> Result<bool, CapabilityError> {
        self(value)
    }
}

#[async_trait]
impl<F> Enricher for F
where
    F: Fn(&Value) -> Result<Value, CapabilityError> + Send + Sync,
{
    async fn enrich(&self, value: &Value) -> Result<Value, CapabilityError> {
        self(value)
    }
}

#[async_trait]
impl<F> Action for F
where
    F: Fn(&SessionContext) -> Result<ActionOutcome, CapabilityError> + Send + Sync,
{
    async fn execute(&self, context: &SessionContext) -> Result<ActionOutcome, CapabilityError> {
        self(context)
    }
}

#[async_trait]
impl<F> Condition for F
where
    F: Fn(&SessionContext) -> Result<bool, CapabilityError> + Send + Sync,
{
    async fn check(&self, context: &SessionContext) -> Result<bool, CapabilityError> {
        self(context)
    }
}

#[async_trait]
impl<F> ResponseFunction for F
where
    F: Fn(&SessionContext) -> Result<Option<String>, CapabilityError> + Send + Sync,
{
    async fn render(&self, context: &SessionContext) -> Result<Option<String>, CapabilityError> {
        self(context)
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Named capabilities available to flows
///
/// Read-only once handed to the engine; cheap to clone and share.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    validators: HashMap<String, Arc<dyn Validator>>,
    enrichers: HashMap<String, Arc<dyn Enricher>>,
    actions: HashMap<String, Arc<dyn Action>>,
    conditions: HashMap<String, Arc<dyn Condition>>,
    responses: HashMap<String, Arc<dyn ResponseFunction>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_validator<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<bool, CapabilityError> + Send + Sync + 'static,
    {
        self.insert_validator(name, Arc::new(f))
    }

    pub fn register_enricher<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<Value, CapabilityError> + Send + Sync + 'static,
    {
        self.insert_enricher(name, Arc::new(f))
    }

    pub fn register_action<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&SessionContext) -> Result<ActionOutcome, CapabilityError> + Send + Sync + 'static,
    {
        self.insert_action(name, Arc::new(f))
    }

    pub fn register_condition<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&SessionContext) -> Result<bool, CapabilityError> + Send + Sync + 'static,
    {
        self.insert_condition(name, Arc::new(f))
    }

    pub fn register_response_function<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&SessionContext) -> Result<Option<String>, CapabilityError> + Send + Sync + 'static,
    {
        self.insert_response_function(name, Arc::new(f))
    }

    pub fn insert_validator(&mut self, name: impl Into<String>, v: Arc<dyn Validator>) -> &mut Self {
        self.validators.insert(name.into(), v);
        self
    }

    pub fn insert_enricher(&mut self, name: impl Into<String>, e: Arc<dyn Enricher>) -> &mut Self {
        self.enrichers.insert(name.into(), e);
        self
    }

    pub fn insert_action(&mut self, name: impl Into<String>, a: Arc<dyn Action>) -> &mut Self {
        self.actions.insert(name.into(), a);
        self
    }

    pub fn insert_condition(&mut self, name: impl Into<String>, c: Arc<dyn Condition>) -> &mut Self {
        self.conditions.insert(name.into(), c);
        self
    }

    pub fn insert_response_function(
        &mut self,
        name: impl Into<String>,
        r: Arc<dyn ResponseFunction>,
    ) -> &mut Self {
        self.responses.insert(name.into(), r);
        self
    }

    pub fn validator(&self, name: &str) -> Option<&Arc<dyn Validator>> {
        self.validators.get(name)
    }

    pub fn enricher(&self, name: &str) -> Option<&Arc<dyn Enricher>> {
        self.enrichers.get(name)
    }

    pub fn action(&self, name: &str) -> Option<&Arc<dyn Action>> {
        self.actions.get(name)
    }

    pub fn condition(&self, name: &str) -> Option<&Arc<dyn Condition>> {
        self.conditions.get(name)
    }

    pub fn response_function(&self, name: &str) -> Option<&Arc<dyn ResponseFunction>> {
        self.responses.get(name)
    }

    pub fn has_validator(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    pub fn has_enricher(&self, name: &str) -> bool {
        self.enrichers.contains_key(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn has_condition(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    pub fn has_response_function(&self, name: &str) -> bool {
        self.responses.contains_key(name)
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn sorted<T>(map: &HashMap<String, T>) -> Vec<&str> {
            let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
            names.sort_unstable();
            names
        }
        f.debug_struct("CapabilityRegistry")
            .field("validators", &sorted(&self.validators))
            .field("enrichers", &sorted(&self.enrichers))
            .field("actions", &sorted(&self.actions))
            .field("conditions", &sorted(&self.conditions))
            .field("responses", &sorted(&self.responses))
            .finish()
    }
}
