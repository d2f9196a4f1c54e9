//! Load-time validation of flow structure and capability references

use super::model::{FallbackBehavior, FlowDefinition, StateKind, TransitionCondition, TransitionSet, OUT_OF_SCOPE_STATE};
use crate::error::ConfigIssue;
use crate::registry::CapabilityRegistry;

/// Validate a converted flow for structural correctness.
///
/// Returns every issue found rather than stopping at the first one.
pub fn validate_flow(flow: &FlowDefinition) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    // 1. Settings reference real states.
    if !flow.contains(&flow.settings.start_state) {
        issues.push(ConfigIssue::new(
            "settings.start_state",
            format!("references undefined state `{}`", flow.settings.start_state),
        ));
    }
    if !flow.contains(&flow.settings.failure_state) {
        issues.push(ConfigIssue::new(
            "settings.failure_state",
            format!("references undefined state `{}`", flow.settings.failure_state),
        ));
    }
    if flow.settings.max_action_chain == 0 {
        issues.push(ConfigIssue::new(
            "settings.max_action_chain",
            "must be at least 1",
        ));
    }

    for state in flow.states() {
        let path = format!("states.{}", state.id);

        // 2. Every transition target exists.
        match &state.transitions {
            TransitionSet::IntentList(list) => {
                for (index, transition) in list.iter().enumerate() {
                    if !flow.contains(&transition.target) {
                        issues.push(ConfigIssue::new(
                            format!("{path}.transitions[{index}].target"),
                            format!("references undefined state `{}`", transition.target),
                        ));
                    }
                }
            }
            TransitionSet::ResultMap {
                results,
                on_success,
                on_error,
            } => {
                for (result, target) in results {
                    if !flow.contains(target) {
                        issues.push(ConfigIssue::new(
                            format!("{path}.transitions.{result}"),
                            format!("references undefined state `{target}`"),
                        ));
                    }
                }
                for (field, target) in [("on_success", on_success), ("on_error", on_error)] {
                    if let Some(target) = target {
                        if !flow.contains(target) {
                            issues.push(ConfigIssue::new(
                                format!("{path}.{field}"),
                                format!("references undefined state `{target}`"),
                            ));
                        }
                    }
                }
            }
        }

        // 3. Action states name their action and route somewhere.
        if state.kind == StateKind::Action {
            if state.action_name.as_deref().is_none_or(str::is_empty) {
                issues.push(ConfigIssue::new(
                    format!("{path}.action_name"),
                    "is required on action states",
                ));
            }
            if state.transitions.is_empty() {
                issues.push(ConfigIssue::new(
                    format!("{path}.transitions"),
                    "action states need at least one result mapping or on_success/on_error",
                ));
            }
        } else if state.action_name.is_some() {
            issues.push(ConfigIssue::new(
                format!("{path}.action_name"),
                "is only valid on action states",
            ));
        }

        // 4. Exactly one response mode.
        let response = &state.response;
        if response.template.is_some() && response.prompt.is_some() {
            issues.push(ConfigIssue::new(
                path.clone(),
                "response_template and response_prompt are mutually exclusive",
            ));
        } else if state.kind != StateKind::Action && response.is_empty() {
            issues.push(ConfigIssue::new(
                path.clone(),
                "one of response_template or response_prompt is required",
            ));
        }

        // 5. The oos fallback needs somewhere to go.
        if state.kind == StateKind::Standard
            && !state.is_terminal()
            && state.fallback == FallbackBehavior::Oos
            && !flow.contains(OUT_OF_SCOPE_STATE)
        {
            issues.push(ConfigIssue::new(
                format!("{path}.fallback_behavior"),
                format!("`oos` fallback requires a `{OUT_OF_SCOPE_STATE}` state"),
            ));
        }
    }

    issues
}

/// Check that every capability name the flow references is registered.
pub fn check_capabilities(flow: &FlowDefinition, registry: &CapabilityRegistry) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    for state in flow.states() {
        let path = format!("states.{}", state.id);

        for (slot, config) in &state.slot_config {
            if let Some(name) = &config.validator {
                if !registry.has_validator(name) {
                    issues.push(ConfigIssue::new(
                        format!("{path}.slot_config.{slot}.validator"),
                        format!("validator `{name}` is not registered"),
                    ));
                }
            }
            if let Some(name) = &config.enricher {
                if !registry.has_enricher(name) {
                    issues.push(ConfigIssue::new(
                        format!("{path}.slot_config.{slot}.enricher"),
                        format!("enricher `{name}` is not registered"),
                    ));
                }
            }
        }

        if let Some(name) = &state.action_name {
            if !registry.has_action(name) {
                issues.push(ConfigIssue::new(
                    format!("{path}.action_name"),
                    format!("action `{name}` is not registered"),
                ));
            }
        }

        if let Some(name) = &state.response.function {
            if !registry.has_response_function(name) {
                issues.push(ConfigIssue::new(
                    format!("{path}.response_function"),
                    format!("response function `{name}` is not registered"),
                ));
            }
        }

        if let TransitionSet::IntentList(list) = &state.transitions {
            for (index, transition) in list.iter().enumerate() {
                if let Some(TransitionCondition::Named(name)) = &transition.condition {
                    if !registry.has_condition(name) {
                        issues.push(ConfigIssue::new(
                            format!("{path}.transitions[{index}].condition"),
                            format!("condition `{name}` is not registered"),
                        ));
                    }
                }
            }
        }
    }

    issues
}
