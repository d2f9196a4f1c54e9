//! Flow model types
//!
//! Parsed, validated representation of a flow document. Pure data: nothing
//! here performs I/O or calls a capability.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved state the `oos` fallback routes to
pub const OUT_OF_SCOPE_STATE: &str = "out_of_scope";

/// Failure state used when `settings.failure_state` is not set
pub const DEFAULT_FAILURE_STATE: &str = "system_failure";

/// Default cap on consecutive action states entered in a single turn
pub const DEFAULT_MAX_ACTION_CHAIN: usize = 10;

/// Condition name that checks the source state's required slots
pub const ALL_SLOTS_FILLED: &str = "all_slots_filled";

/// Result string that selects the legacy `on_success` target
pub const SUCCESS_RESULT: &str = "success";

/// Result string used when an action capability fails
pub const ERROR_RESULT: &str = "error";

pub const DEFAULT_RECLASSIFY_MESSAGE: &str = "I didn't quite get that. Could you clarify?";

pub const DEFAULT_FAILURE_RESPONSE: &str =
    "Sorry, something went wrong on our side. Please start again.";

/// Engine-wide settings from the `settings` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSettings {
    pub start_state: String,
    pub max_action_chain: usize,
    pub failure_state: String,
    pub reclassify_message: String,
}

/// How a state was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Standard,
    Action,
    Terminal,
}

/// What to do when no intent transition matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackBehavior {
    /// Route to the reserved `out_of_scope` state
    #[default]
    Oos,
    /// Stay in the current state and ask the user to rephrase
    AskReclassify,
}

/// Per-slot processing configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotConfig {
    pub validator: Option<String>,
    pub enricher: Option<String>,
    /// Handed to the NLU step as an extraction hint
    pub description: Option<String>,
}

/// Eligibility guard on an intent transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionCondition {
    /// Every `slots_required` name of the source state is present in context
    AllSlotsFilled,
    /// A registered condition capability
    Named(String),
}

impl TransitionCondition {
    pub fn parse(raw: &str) -> Self {
        if raw == ALL_SLOTS_FILLED {
            TransitionCondition::AllSlotsFilled
        } else {
            TransitionCondition::Named(raw.to_string())
        }
    }
}

/// One entry of a standard state's ordered transition list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentTransition {
    pub intent: String,
    pub target: String,
    pub condition: Option<TransitionCondition>,
    /// Removed from context, in order, when this transition is taken
    pub clear_slots: Vec<String>,
}

impl IntentTransition {
    pub fn new(intent: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            target: target.into(),
            condition: None,
            clear_slots: Vec::new(),
        }
    }

    #[must_use]
    pub fn when(mut self, condition: TransitionCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    #[must_use]
    pub fn clearing<I, S>(mut self, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clear_slots = slots.into_iter().map(Into::into).collect();
        self
    }
}

/// Outgoing edges of a state, selected by state kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionSet {
    /// Standard states: first eligible match in declaration order wins
    IntentList(Vec<IntentTransition>),
    /// Action states: result string to target, plus legacy single-target fallbacks
    ResultMap {
        results: BTreeMap<String, String>,
        on_success: Option<String>,
        on_error: Option<String>,
    },
}

impl TransitionSet {
    pub fn empty() -> Self {
        TransitionSet::IntentList(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            TransitionSet::IntentList(list) => list.is_empty(),
            TransitionSet::ResultMap {
                results,
                on_success,
                on_error,
            } => results.is_empty() && on_success.is_none() && on_error.is_none(),
        }
    }

    /// Every target this set can route to, in declaration order
    pub fn targets(&self) -> Vec<&str> {
        match self {
            TransitionSet::IntentList(list) => list.iter().map(|t| t.target.as_str()).collect(),
            TransitionSet::ResultMap {
                results,
                on_success,
                on_error,
            } => results
                .values()
                .map(String::as_str)
                .chain(on_success.as_deref())
                .chain(on_error.as_deref())
                .collect(),
        }
    }
}

/// Response production for a state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseSpec {
    /// Static text with `{{slot}}` placeholders
    pub template: Option<String>,
    /// Instruction for the response-generation capability
    pub prompt: Option<String>,
    /// Registered response function, consulted before template and prompt
    pub function: Option<String>,
}

impl ResponseSpec {
    pub fn template(text: impl Into<String>) -> Self {
        Self {
            template: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            prompt: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_none() && self.prompt.is_none() && self.function.is_none()
    }
}

/// A dialog state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    pub id: String,
    pub description: String,
    pub kind: StateKind,
    pub slots_required: Vec<String>,
    pub slots_optional: Vec<String>,
    pub slot_config: BTreeMap<String, SlotConfig>,
    pub transitions: TransitionSet,
    pub action_name: Option<String>,
    pub response: ResponseSpec,
    pub fallback: FallbackBehavior,
}

impl State {
    /// Terminal by declaration, or a standard state with nowhere to go
    pub fn is_terminal(&self) -> bool {
        match self.kind {
            StateKind::Terminal => true,
            StateKind::Standard => self.transitions.is_empty() && self.action_name.is_none(),
            StateKind::Action => false,
        }
    }

    pub fn is_action(&self) -> bool {
        self.kind == StateKind::Action
    }

    /// Whether NLU output for `slot` may enter the session at this state
    pub fn accepts_slot(&self, slot: &str) -> bool {
        self.slot_config.contains_key(slot)
            || self.slots_required.iter().any(|s| s == slot)
            || self.slots_optional.iter().any(|s| s == slot)
    }

    /// Intent names in declaration order, without duplicates
    pub fn intents(&self) -> Vec<&str> {
        let TransitionSet::IntentList(list) = &self.transitions else {
            return Vec::new();
        };
        let mut intents: Vec<&str> = Vec::with_capacity(list.len());
        for transition in list {
            if !intents.contains(&transition.intent.as_str()) {
                intents.push(&transition.intent);
            }
        }
        intents
    }
}

/// A loaded, validated flow
///
/// Immutable after load; shared read-only across every session.
#[derive(Debug, Clone)]
pub struct FlowDefinition {
    pub settings: FlowSettings,
    pub(crate) states: BTreeMap<String, State>,
}

impl FlowDefinition {
    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.states.contains_key(id)
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    pub fn start_state(&self) -> &str {
        &self.settings.start_state
    }

    pub fn failure_state(&self) -> &str {
        &self.settings.failure_state
    }
}
