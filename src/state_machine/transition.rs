//! Pure transition resolution
//!
//! Given the same state, intent/result, slots, and condition outcomes,
//! these functions always choose the same next state and perform no I/O.
//! Named conditions are evaluated by the caller beforehand and passed in.

use crate::error::ResolveError;
use crate::flow::{
    FallbackBehavior, State, TransitionCondition, TransitionSet, OUT_OF_SCOPE_STATE,
    SUCCESS_RESULT,
};
use crate::session::{is_filled, SessionContext, Slots};
use std::collections::HashMap;

/// Outcomes of named conditions, keyed by condition name
pub type ConditionResults = HashMap<String, bool>;

/// Next step chosen for a standard state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Clear the listed slots, then move to `target`
    Transition {
        target: String,
        clear_slots: Vec<String>,
    },
    /// No transition matched; route to the reserved out-of-scope state
    OutOfScope,
    /// No transition matched; stay and ask the user to rephrase
    Reprompt,
}

impl Resolution {
    /// State the session is in after this resolution is applied
    pub fn target<'a>(&'a self, current: &'a str) -> &'a str {
        match self {
            Resolution::Transition { target, .. } => target.as_str(),
            Resolution::OutOfScope => OUT_OF_SCOPE_STATE,
            Resolution::Reprompt => current,
        }
    }

    /// Apply to a session: clear slots first, then move.
    pub fn apply(&self, context: &mut SessionContext) {
        match self {
            Resolution::Transition {
                target,
                clear_slots,
            } => {
                context.clear_slots(clear_slots);
                context.move_to(target);
            }
            Resolution::OutOfScope => context.move_to(OUT_OF_SCOPE_STATE),
            Resolution::Reprompt => {}
        }
    }
}

/// `all_slots_filled` for `state`: every required slot holds a value
pub fn all_slots_filled(state: &State, slots: &Slots) -> bool {
    state
        .slots_required
        .iter()
        .all(|name| slots.get(name).is_some_and(is_filled))
}

/// Resolve a standard state against the extracted intent.
///
/// Walks the transition list in declaration order and takes the first entry
/// whose intent matches and whose condition, if any, holds. When nothing
/// matches the state's fallback policy decides.
pub fn resolve_intent(
    state: &State,
    intent: Option<&str>,
    slots: &Slots,
    conditions: &ConditionResults,
) -> Resolution {
    if let (Some(intent), TransitionSet::IntentList(list)) = (intent, &state.transitions) {
        let matched = list.iter().find(|t| {
            t.intent == intent
                && match &t.condition {
                    None => true,
                    Some(TransitionCondition::AllSlotsFilled) => all_slots_filled(state, slots),
                    Some(TransitionCondition::Named(name)) => {
                        conditions.get(name).copied().unwrap_or(false)
                    }
                }
        });
        if let Some(t) = matched {
            return Resolution::Transition {
                target: t.target.clone(),
                clear_slots: t.clear_slots.clone(),
            };
        }
    }

    match state.fallback {
        FallbackBehavior::Oos => Resolution::OutOfScope,
        FallbackBehavior::AskReclassify => Resolution::Reprompt,
    }
}

/// Resolve an action state against the result its action returned.
///
/// The result map takes precedence; `on_success` covers an unmapped
/// `success` and `on_error` covers any other unmapped result.
pub fn resolve_action_result(state: &State, result: &str) -> Result<String, ResolveError> {
    let TransitionSet::ResultMap {
        results,
        on_success,
        on_error,
    } = &state.transitions
    else {
        return Err(ResolveError::NotAnActionState {
            state: state.id.clone(),
        });
    };

    let legacy = if result == SUCCESS_RESULT {
        on_success
    } else {
        on_error
    };

    results
        .get(result)
        .or(legacy.as_ref())
        .cloned()
        .ok_or_else(|| ResolveError::UnhandledActionResult {
            state: state.id.clone(),
            result: result.to_string(),
        })
}
