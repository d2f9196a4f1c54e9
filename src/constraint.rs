//! Constraint builder
//!
//! Computes the bounded action space handed to the NLU step for a single
//! state: its description, the intents it accepts, and the slots it still
//! wants. Targets are never included, so the NLU call cannot learn anything
//! about the shape of the graph beyond the current state.

use crate::error::ConfigurationError;
use crate::flow::{FlowDefinition, State, StateKind};
use crate::session::{is_filled, Slots};
use serde::Serialize;
use std::fmt::Write;

/// Intent label the NLU step uses when nothing fits
pub const UNKNOWN_INTENT: &str = "UNKNOWN";

/// What the NLU step may choose from at this state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllowedMoves {
    /// Standard state: classify into exactly one of these
    Intents { intents: Vec<String> },
    /// Action state: the named action runs without classification
    Action { action: String },
    /// Terminal state: nothing is legal
    Nothing,
}

/// A slot the NLU step should try to extract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRequest {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Instruction payload for one NLU call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintPayload {
    pub state: String,
    pub description: String,
    pub allowed: AllowedMoves,
    pub slots: Vec<SlotRequest>,
}

impl ConstraintPayload {
    pub fn intents(&self) -> &[String] {
        match &self.allowed {
            AllowedMoves::Intents { intents } => intents,
            _ => &[],
        }
    }

    pub fn allows_intent(&self, intent: &str) -> bool {
        self.intents().iter().any(|i| i == intent)
    }

    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    /// Render as a system prompt for a generative NLU model
    pub fn to_system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are a dialog decision engine. Analyze the user input and extract structured data.\n\n",
        );

        let _ = writeln!(prompt, "Context:");
        let _ = writeln!(prompt, "- Current state: {}", self.state);
        let _ = writeln!(prompt, "- State description: {}\n", self.description);

        let _ = writeln!(prompt, "Constraints:");
        let intents = serde_json::to_string(self.intents()).unwrap_or_else(|_| "[]".to_string());
        let _ = writeln!(
            prompt,
            "1. Intent classification: classify the input into EXACTLY ONE of these intents: {intents}"
        );
        let _ = writeln!(
            prompt,
            "   If the input matches none of them, use \"{UNKNOWN_INTENT}\"."
        );

        if self.slots.is_empty() {
            let _ = writeln!(
                prompt,
                "2. Entity extraction: do NOT extract any entities. Return an empty object."
            );
        } else {
            let _ = writeln!(
                prompt,
                "2. Entity extraction: extract values for these slots when present, keyed by slot name:"
            );
            for slot in &self.slots {
                let marker = if slot.required { "required" } else { "optional" };
                let _ = writeln!(prompt, "   - {} ({marker}): {}", slot.name, slot.description);
            }
        }

        prompt.push_str(
            "\nOutput strict JSON only:\n{\n  \"intent\": \"<classified_intent>\",\n  \"entities\": { \"<slot_name>\": \"<extracted_value>\" }\n}\n",
        );
        prompt
    }
}

/// Build the constraint payload for `state_id`.
///
/// `filled` is the caller's current slot map; required slots that already
/// hold a value are left out.
pub fn build_constraints(
    flow: &FlowDefinition,
    state_id: &str,
    filled: &Slots,
) -> Result<ConstraintPayload, ConfigurationError> {
    let state = flow
        .state(state_id)
        .ok_or_else(|| ConfigurationError::UnknownState(state_id.to_string()))?;
    Ok(constraints_for(state, filled))
}

pub(crate) fn constraints_for(state: &State, filled: &Slots) -> ConstraintPayload {
    let allowed = match state.kind {
        StateKind::Action => AllowedMoves::Action {
            action: state.action_name.clone().unwrap_or_default(),
        },
        _ if state.is_terminal() => AllowedMoves::Nothing,
        _ => AllowedMoves::Intents {
            intents: state.intents().into_iter().map(str::to_string).collect(),
        },
    };

    let missing_required = state
        .slots_required
        .iter()
        .filter(|name| !filled.get(name.as_str()).is_some_and(is_filled))
        .map(|name| slot_request(state, name, true));
    let optional = state
        .slots_optional
        .iter()
        .filter(|name| !state.slots_required.contains(name))
        .map(|name| slot_request(state, name, false));

    ConstraintPayload {
        state: state.id.clone(),
        description: state.description.clone(),
        allowed,
        slots: missing_required.chain(optional).collect(),
    }
}

fn slot_request(state: &State, name: &str, required: bool) -> SlotRequest {
    let description = state
        .slot_config
        .get(name)
        .and_then(|cfg| cfg.description.clone())
        .unwrap_or_else(|| format!("Extract the {name} from the text"));
    SlotRequest {
        name: name.to_string(),
        description,
        required,
    }
}
