//! LLM-backed NLU and response generation

use super::{LlmRequest, LlmService};
use crate::capabilities::{NluResult, NluService, ResponseGenerator};
use crate::constraint::{ConstraintPayload, UNKNOWN_INTENT};
use crate::error::CapabilityError;
use crate::session::Slots;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const RESPONSE_INSTRUCTIONS: &str = "Your task is to generate a natural language response from the \
provided instruction and context. Use the values in the context to fill in the details the \
instruction asks for. You MUST output strict JSON in the following format:
{
  \"answer\": \"Your natural language response here\"
}";

/// Parse the outermost `{ ... }` span of a model reply
pub fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    let candidate = text.get(start..=end)?;
    serde_json::from_str(candidate).ok()
}

/// Turn a classification reply into an `NluResult`.
///
/// Intents outside the allowed set, `UNKNOWN`, and unparseable replies all
/// mean "no intent".
fn parse_classification(text: &str, constraints: &ConstraintPayload) -> NluResult {
    let Some(reply) = extract_json_object(text) else {
        tracing::warn!(reply = %text, "NLU reply contained no JSON object");
        return NluResult::none();
    };

    let intent = reply
        .get("intent")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|i| !i.is_empty() && *i != UNKNOWN_INTENT)
        .and_then(|i| {
            if constraints.allows_intent(i) {
                Some(i.to_string())
            } else {
                tracing::debug!(intent = %i, "Discarding intent outside the allowed set");
                None
            }
        });

    let slots = reply
        .get("entities")
        .or_else(|| reply.get("slots"))
        .and_then(Value::as_object)
        .map(|entities| {
            entities
                .iter()
                .filter_map(|(name, value)| slot_text(value).map(|text| (name.clone(), text)))
                .collect()
        })
        .unwrap_or_default();

    NluResult { intent, slots }
}

fn slot_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// NLU capability backed by a generative model
pub struct LlmNlu {
    service: Arc<dyn LlmService>,
}

impl LlmNlu {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl NluService for LlmNlu {
    async fn understand(
        &self,
        constraints: &ConstraintPayload,
        user_input: &str,
    ) -> Result<NluResult, CapabilityError> {
        let request = LlmRequest::single_turn(
            constraints.to_system_prompt(),
            format!("User Input: {user_input}"),
        )
        .with_max_tokens(512)
        .deterministic();

        let response = self
            .service
            .complete(&request)
            .await
            .map_err(|e| e.into_capability_error("nlu"))?;
        Ok(parse_classification(&response.text(), constraints))
    }
}

/// Response generator backed by a generative model
pub struct LlmResponder {
    service: Arc<dyn LlmService>,
}

impl LlmResponder {
    pub fn new(service: Arc<dyn LlmService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ResponseGenerator for LlmResponder {
    async fn generate(&self, prompt: &str, slots: &Slots) -> Result<String, CapabilityError> {
        let context = serde_json::to_string(slots).unwrap_or_else(|_| "{}".to_string());
        let request = LlmRequest::single_turn(
            RESPONSE_INSTRUCTIONS,
            format!("Context: {context}\nInstruction: {prompt}\nOutput:"),
        )
        .with_max_tokens(512);

        let response = self
            .service
            .complete(&request)
            .await
            .map_err(|e| e.into_capability_error("response_generator"))?;
        let text = response.text();

        // Raw text when the reply ignores the JSON contract
        let answer = extract_json_object(&text)
            .and_then(|reply| reply.get("answer").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| text.trim().to_string());
        Ok(answer)
    }
}
