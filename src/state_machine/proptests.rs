//! Property-based tests for transition resolution
//!
//! These tests verify key invariants hold across all possible inputs:
//! - Standard-state resolution is deterministic and picks the earliest match
//! - `clear_slots` removes exactly the named keys
//! - Action-state resolution is total
//! - Template rendering substitutes each placeholder exactly once

use super::transition::*;
use crate::engine::render_template;
use crate::error::ResolveError;
use crate::flow::{
    FallbackBehavior, IntentTransition, ResponseSpec, State, StateKind, TransitionCondition,
    TransitionSet, OUT_OF_SCOPE_STATE, SUCCESS_RESULT,
};
use crate::session::{is_filled, SessionContext, Slots};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Arbitrary Generators
// ============================================================================

const INTENTS: &[&str] = &["book_flight", "cancel", "provide_city", "greet"];
const SLOT_NAMES: &[&str] = &["destination", "date", "amount", "account"];
const TEMPLATE_SLOT_NAMES: &[&str] = &["destination", "account-name", "first.name", "amount_2"];
const CONDITION_NAMES: &[&str] = &["check_ready", "has_results"];

fn arb_intent() -> impl Strategy<Value = String> {
    proptest::sample::select(INTENTS).prop_map(str::to_string)
}

fn arb_slot_name() -> impl Strategy<Value = String> {
    proptest::sample::select(SLOT_NAMES).prop_map(str::to_string)
}

fn arb_condition() -> impl Strategy<Value = Option<TransitionCondition>> {
    prop_oneof![
        Just(None),
        Just(Some(TransitionCondition::AllSlotsFilled)),
        proptest::sample::select(CONDITION_NAMES)
            .prop_map(|n| Some(TransitionCondition::Named(n.to_string()))),
    ]
}

fn arb_transition() -> impl Strategy<Value = IntentTransition> {
    (
        arb_intent(),
        "[a-z]{3,8}",
        arb_condition(),
        proptest::collection::vec(arb_slot_name(), 0..3),
    )
        .prop_map(|(intent, target, condition, clear_slots)| IntentTransition {
            intent,
            target,
            condition,
            clear_slots,
        })
}

fn arb_slot_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(json!("")),
        "[a-zA-Z]{1,10}".prop_map(Value::String),
        (0i64..1000).prop_map(|n| json!(n)),
    ]
}

fn arb_slots() -> impl Strategy<Value = Slots> {
    proptest::collection::btree_map(arb_slot_name(), arb_slot_value(), 0..4)
}

fn arb_condition_results() -> impl Strategy<Value = ConditionResults> {
    proptest::collection::hash_map(
        proptest::sample::select(CONDITION_NAMES).prop_map(str::to_string),
        any::<bool>(),
        0..3,
    )
}

fn arb_fallback() -> impl Strategy<Value = FallbackBehavior> {
    prop_oneof![
        Just(FallbackBehavior::Oos),
        Just(FallbackBehavior::AskReclassify),
    ]
}

fn arb_standard_state() -> impl Strategy<Value = State> {
    (
        proptest::collection::vec(arb_transition(), 0..6),
        proptest::collection::vec(arb_slot_name(), 0..3),
        arb_fallback(),
    )
        .prop_map(|(transitions, slots_required, fallback)| State {
            id: "current".to_string(),
            description: "state under test".to_string(),
            kind: StateKind::Standard,
            slots_required,
            slots_optional: vec![],
            slot_config: BTreeMap::new(),
            transitions: TransitionSet::IntentList(transitions),
            action_name: None,
            response: ResponseSpec::template("ok"),
            fallback,
        })
}

fn arb_result() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("success".to_string()),
        Just("error".to_string()),
        Just("not_found".to_string()),
        Just("insufficient_funds".to_string()),
    ]
}

fn arb_action_state() -> impl Strategy<Value = State> {
    (
        proptest::collection::btree_map(arb_result(), "[a-z]{3,8}", 0..4),
        proptest::option::of("[a-z]{3,8}"),
        proptest::option::of("[a-z]{3,8}"),
    )
        .prop_map(|(results, on_success, on_error)| State {
            id: "act".to_string(),
            description: "action under test".to_string(),
            kind: StateKind::Action,
            slots_required: vec![],
            slots_optional: vec![],
            slot_config: BTreeMap::new(),
            transitions: TransitionSet::ResultMap {
                results,
                on_success,
                on_error,
            },
            action_name: Some("run".to_string()),
            response: ResponseSpec::default(),
            fallback: FallbackBehavior::Oos,
        })
}

// ============================================================================
// Reference model
// ============================================================================

/// Index of the first eligible transition, scanning in declaration order
fn expected_match(
    state: &State,
    intent: &str,
    slots: &Slots,
    conditions: &ConditionResults,
) -> Option<usize> {
    let TransitionSet::IntentList(list) = &state.transitions else {
        return None;
    };
    for (index, t) in list.iter().enumerate() {
        if t.intent != intent {
            continue;
        }
        let eligible = match &t.condition {
            None => true,
            Some(TransitionCondition::AllSlotsFilled) => state
                .slots_required
                .iter()
                .all(|s| slots.get(s).is_some_and(is_filled)),
            Some(TransitionCondition::Named(n)) => conditions.get(n) == Some(&true),
        };
        if eligible {
            return Some(index);
        }
    }
    None
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Invariant 1: Same inputs always select the same, earliest eligible transition
    #[test]
    fn prop_resolution_is_deterministic_and_earliest(
        state in arb_standard_state(),
        intent in arb_intent(),
        slots in arb_slots(),
        conditions in arb_condition_results(),
    ) {
        let first = resolve_intent(&state, Some(&intent), &slots, &conditions);
        let second = resolve_intent(&state, Some(&intent), &slots, &conditions);
        prop_assert_eq!(&first, &second);

        match expected_match(&state, &intent, &slots, &conditions) {
            Some(index) => {
                let TransitionSet::IntentList(list) = &state.transitions else {
                    unreachable!()
                };
                prop_assert_eq!(
                    first,
                    Resolution::Transition {
                        target: list[index].target.clone(),
                        clear_slots: list[index].clear_slots.clone(),
                    }
                );
            }
            None => {
                let expected = match state.fallback {
                    FallbackBehavior::Oos => Resolution::OutOfScope,
                    FallbackBehavior::AskReclassify => Resolution::Reprompt,
                };
                prop_assert_eq!(first, expected);
            }
        }
    }

    // Invariant 2: No intent never takes a transition
    #[test]
    fn prop_missing_intent_falls_back(state in arb_standard_state(), slots in arb_slots()) {
        let resolution = resolve_intent(&state, None, &slots, &ConditionResults::new());
        prop_assert!(matches!(resolution, Resolution::OutOfScope | Resolution::Reprompt));
    }

    // Invariant 3: clear_slots removes exactly the named keys; the rest persist unchanged
    #[test]
    fn prop_clear_slots_exact(
        slots in arb_slots(),
        clear in proptest::collection::vec(arb_slot_name(), 0..4),
    ) {
        let mut ctx = SessionContext::new("s", "current");
        for (name, value) in &slots {
            ctx.set_slot(name.clone(), value.clone());
        }

        Resolution::Transition { target: "next".to_string(), clear_slots: clear.clone() }
            .apply(&mut ctx);

        let cleared: BTreeSet<&String> = clear.iter().collect();
        for name in &cleared {
            prop_assert!(ctx.slot(name).is_none());
        }
        for (name, value) in &slots {
            if !cleared.contains(name) {
                prop_assert_eq!(ctx.slot(name), Some(value));
            }
        }
        prop_assert_eq!(
            ctx.slots().len(),
            slots.keys().filter(|k| !cleared.contains(k)).count()
        );
        prop_assert_eq!(ctx.current_state(), "next");
    }

    // Invariant 4: Out-of-scope always lands on the reserved state
    #[test]
    fn prop_out_of_scope_target(current in "[a-z]{3,8}") {
        prop_assert_eq!(Resolution::OutOfScope.target(&current), OUT_OF_SCOPE_STATE);
        prop_assert_eq!(Resolution::Reprompt.target(&current), current.as_str());
    }

    // Invariant 5: Action resolution is total - a declared target or UnhandledActionResult
    #[test]
    fn prop_action_resolution_total(state in arb_action_state(), result in arb_result()) {
        let TransitionSet::ResultMap { results, on_success, on_error } = &state.transitions else {
            unreachable!()
        };
        match resolve_action_result(&state, &result) {
            Ok(target) => {
                let expected = results.get(&result).cloned().or_else(|| {
                    if result == SUCCESS_RESULT { on_success.clone() } else { on_error.clone() }
                });
                prop_assert_eq!(Some(target), expected);
            }
            Err(ResolveError::UnhandledActionResult { state: id, result: r }) => {
                prop_assert_eq!(id, "act");
                prop_assert_eq!(&r, &result);
                prop_assert!(!results.contains_key(&result));
                if result == SUCCESS_RESULT {
                    prop_assert!(on_success.is_none());
                } else {
                    prop_assert!(on_error.is_none());
                }
            }
            Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
        }
    }

    // Invariant 6: Rendering replaces each placeholder with its slot text once,
    // never rescanning substituted values
    #[test]
    fn prop_template_substitution(
        segments in prop::collection::vec(("[a-z ,.!]{0,8}", proptest::option::of(proptest::sample::select(TEMPLATE_SLOT_NAMES))), 0..6),
        values in prop::collection::btree_map(proptest::sample::select(TEMPLATE_SLOT_NAMES), "[A-Za-z0-9 {}]{0,6}", 0..4),
    ) {
        let slots: Slots = values
            .iter()
            .map(|(name, value)| ((*name).to_string(), Value::String(value.clone())))
            .collect();

        let mut template = String::new();
        let mut expected = String::new();
        for (literal, slot) in &segments {
            template.push_str(literal);
            expected.push_str(literal);
            if let Some(name) = slot {
                template.push_str(&format!("{{{{ {name} }}}}"));
                expected.push_str(values.get(name).map_or("", String::as_str));
            }
        }

        prop_assert_eq!(render_template(&template, &slots), expected);
    }
}
