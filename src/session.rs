//! Per-conversation session context
//!
//! One `SessionContext` per conversation, owned by the caller. The engine
//! holds no session storage; it mutates the context it is handed, once per
//! turn, after every external call of that turn has completed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Accumulated slot values, keyed by slot name
pub type Slots = BTreeMap<String, Value>;

/// Whether a slot value counts as filled (`null` and `""` do not)
pub fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// A transition (intent or action result) was taken
    Transitioned,
    /// No intent matched and the session was routed to `out_of_scope`
    OutOfScope,
    /// No intent matched and the user was asked to rephrase
    Reprompted,
    /// A runtime error was caught and the session routed to the failure state
    Recovered { reason: String },
}

/// One recorded turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub user_input: String,
    pub intent: Option<String>,
    pub state_in: String,
    pub state_out: String,
    pub response: String,
    /// Slot values after the turn
    pub slots: Slots,
    pub outcome: TurnOutcome,
    pub at: DateTime<Utc>,
}

/// Mutable per-conversation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    session_id: String,
    current_state: String,
    #[serde(default)]
    previous_state: Option<String>,
    #[serde(default)]
    slots: Slots,
    #[serde(default)]
    history: Vec<Turn>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, start_state: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            current_state: start_state.into(),
            previous_state: None,
            slots: Slots::new(),
            history: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn current_state(&self) -> &str {
        &self.current_state
    }

    pub fn previous_state(&self) -> Option<&str> {
        self.previous_state.as_deref()
    }

    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&Value> {
        self.slots.get(name)
    }

    /// Slot as text, if it holds a string
    pub fn slot_str(&self, name: &str) -> Option<&str> {
        self.slots.get(name).and_then(Value::as_str)
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.slots.get(name).is_some_and(is_filled)
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.history.last()
    }

    /// JSON view for debugging and demo output
    pub fn snapshot(&self) -> Value {
        json!({
            "session_id": self.session_id,
            "current_state": self.current_state,
            "slots": self.slots,
            "last_turn": self.history.last(),
        })
    }

    /// Every transition records where it came from, self-loops included
    pub(crate) fn move_to(&mut self, state: &str) {
        self.previous_state = Some(std::mem::replace(
            &mut self.current_state,
            state.to_string(),
        ));
    }

    pub(crate) fn set_slot(&mut self, name: impl Into<String>, value: Value) {
        self.slots.insert(name.into(), value);
    }

    pub(crate) fn clear_slots<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        for name in names {
            self.slots.remove(name);
        }
    }

    pub(crate) fn restart(&mut self, start_state: &str) {
        self.move_to(start_state);
        self.slots.clear();
    }

    pub(crate) fn record_turn(&mut self, turn: Turn) {
        self.history.push(turn);
    }
}
