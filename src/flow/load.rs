//! Flow document loading
//!
//! Deserializes the JSON document into loose raw shapes first, then converts
//! each state by hand so that every problem can be reported with its field
//! path instead of serde's first-failure message.

use super::model::{
    FallbackBehavior, FlowDefinition, FlowSettings, IntentTransition, ResponseSpec, SlotConfig,
    State, StateKind, TransitionCondition, TransitionSet, DEFAULT_FAILURE_RESPONSE,
    DEFAULT_FAILURE_STATE, DEFAULT_MAX_ACTION_CHAIN, DEFAULT_RECLASSIFY_MESSAGE,
};
use super::validate::validate_flow;
use crate::error::{ConfigIssue, ConfigurationError};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawFlow {
    settings: RawSettings,
    states: BTreeMap<String, RawState>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    start_state: String,
    #[serde(default)]
    max_action_chain: Option<usize>,
    #[serde(default)]
    failure_state: Option<String>,
    #[serde(default)]
    reclassify_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawState {
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    slots_required: Vec<String>,
    #[serde(default)]
    slots_optional: Vec<String>,
    #[serde(default)]
    slot_config: BTreeMap<String, RawSlotConfig>,
    /// List for standard states, map for action states
    #[serde(default)]
    transitions: Option<Value>,
    #[serde(default)]
    on_success: Option<String>,
    #[serde(default)]
    on_error: Option<String>,
    #[serde(default)]
    action_name: Option<String>,
    #[serde(default)]
    response_template: Option<String>,
    #[serde(default)]
    response_prompt: Option<String>,
    #[serde(default)]
    response_function: Option<String>,
    #[serde(default)]
    fallback_behavior: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSlotConfig {
    #[serde(default)]
    validator: Option<String>,
    #[serde(default)]
    enricher: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIntentTransition {
    intent: String,
    target: String,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    context_updates: Option<RawContextUpdates>,
}

#[derive(Debug, Default, Deserialize)]
struct RawContextUpdates {
    #[serde(default)]
    clear_slots: Vec<String>,
}

impl FlowDefinition {
    /// Load and validate a flow file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loading flow definition");
        Self::from_json_str(&text)
    }

    /// Parse and validate a flow document
    pub fn from_json_str(text: &str) -> Result<Self, ConfigurationError> {
        let raw: RawFlow = serde_json::from_str(text)?;
        let mut issues = Vec::new();
        let flow = convert_flow(raw, &mut issues);
        issues.extend(validate_flow(&flow));

        if issues.is_empty() {
            tracing::info!(
                states = flow.states.len(),
                start = %flow.settings.start_state,
                "Flow definition loaded"
            );
            Ok(flow)
        } else {
            Err(ConfigurationError::Invalid(issues))
        }
    }
}

fn convert_flow(raw: RawFlow, issues: &mut Vec<ConfigIssue>) -> FlowDefinition {
    let explicit_failure = raw.settings.failure_state.is_some();
    let settings = FlowSettings {
        start_state: raw.settings.start_state,
        max_action_chain: raw.settings.max_action_chain.unwrap_or(DEFAULT_MAX_ACTION_CHAIN),
        failure_state: raw
            .settings
            .failure_state
            .unwrap_or_else(|| DEFAULT_FAILURE_STATE.to_string()),
        reclassify_message: raw
            .settings
            .reclassify_message
            .unwrap_or_else(|| DEFAULT_RECLASSIFY_MESSAGE.to_string()),
    };

    let mut states = BTreeMap::new();
    for (id, raw_state) in raw.states {
        let state = convert_state(&id, raw_state, issues);
        states.insert(id, state);
    }

    // An explicitly named failure state must exist; the default one is supplied
    if !explicit_failure && !states.contains_key(&settings.failure_state) {
        states.insert(
            settings.failure_state.clone(),
            builtin_failure_state(&settings.failure_state),
        );
    }

    FlowDefinition { settings, states }
}

fn builtin_failure_state(id: &str) -> State {
    State {
        id: id.to_string(),
        description: "Unrecoverable runtime failure".to_string(),
        kind: StateKind::Terminal,
        slots_required: Vec::new(),
        slots_optional: Vec::new(),
        slot_config: BTreeMap::new(),
        transitions: TransitionSet::empty(),
        action_name: None,
        response: ResponseSpec::template(DEFAULT_FAILURE_RESPONSE),
        fallback: FallbackBehavior::Oos,
    }
}

fn convert_state(id: &str, raw: RawState, issues: &mut Vec<ConfigIssue>) -> State {
    let path = format!("states.{id}");

    let description = match raw.description {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            issues.push(ConfigIssue::new(
                format!("{path}.description"),
                "is required and must not be empty",
            ));
            String::new()
        }
    };

    let is_map = matches!(raw.transitions, Some(Value::Object(_)));
    let kind = match raw.kind.as_deref() {
        Some("standard") => StateKind::Standard,
        Some("action") => StateKind::Action,
        Some("terminal") => StateKind::Terminal,
        Some(other) => {
            issues.push(ConfigIssue::new(
                format!("{path}.type"),
                format!("unknown state type `{other}` (expected standard, action or terminal)"),
            ));
            StateKind::Standard
        }
        None if raw.action_name.is_some() || is_map => StateKind::Action,
        None => StateKind::Standard,
    };

    let fallback = match raw.fallback_behavior.as_deref() {
        None | Some("oos") => FallbackBehavior::Oos,
        Some("ask_reclassify") => FallbackBehavior::AskReclassify,
        Some(other) => {
            issues.push(ConfigIssue::new(
                format!("{path}.fallback_behavior"),
                format!("unknown fallback `{other}` (expected oos or ask_reclassify)"),
            ));
            FallbackBehavior::Oos
        }
    };

    let transitions = convert_transitions(
        &path,
        kind,
        raw.transitions,
        raw.on_success,
        raw.on_error,
        issues,
    );

    let slot_config = raw
        .slot_config
        .into_iter()
        .map(|(name, cfg)| {
            (
                name,
                SlotConfig {
                    validator: cfg.validator,
                    enricher: cfg.enricher,
                    description: cfg.description,
                },
            )
        })
        .collect();

    State {
        id: id.to_string(),
        description,
        kind,
        slots_required: dedup(raw.slots_required),
        slots_optional: dedup(raw.slots_optional),
        slot_config,
        transitions,
        action_name: raw.action_name,
        response: ResponseSpec {
            template: raw.response_template,
            prompt: raw.response_prompt,
            function: raw.response_function,
        },
        fallback,
    }
}

fn convert_transitions(
    path: &str,
    kind: StateKind,
    raw: Option<Value>,
    on_success: Option<String>,
    on_error: Option<String>,
    issues: &mut Vec<ConfigIssue>,
) -> TransitionSet {
    match kind {
        StateKind::Action => {
            let mut results = BTreeMap::new();
            match raw {
                None | Some(Value::Null) => {}
                Some(Value::Object(map)) => {
                    for (result, target) in map {
                        match target {
                            Value::String(target) => {
                                results.insert(result, target);
                            }
                            other => issues.push(ConfigIssue::new(
                                format!("{path}.transitions.{result}"),
                                format!("expected a state id string, found {}", json_kind(&other)),
                            )),
                        }
                    }
                }
                // Some authoring tools emit `[]` for "no transitions"
                Some(Value::Array(list)) if list.is_empty() => {}
                Some(other) => issues.push(ConfigIssue::new(
                    format!("{path}.transitions"),
                    format!(
                        "action states map results to targets; expected an object, found {}",
                        json_kind(&other)
                    ),
                )),
            }
            TransitionSet::ResultMap {
                results,
                on_success,
                on_error,
            }
        }
        StateKind::Standard | StateKind::Terminal => {
            if on_success.is_some() || on_error.is_some() {
                issues.push(ConfigIssue::new(
                    path.to_string(),
                    "on_success/on_error are only valid on action states",
                ));
            }
            let list = match raw {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items
                    .into_iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        convert_intent_transition(&format!("{path}.transitions[{index}]"), item, issues)
                    })
                    .collect(),
                Some(other) => {
                    issues.push(ConfigIssue::new(
                        format!("{path}.transitions"),
                        format!(
                            "standard states declare an ordered list; expected an array, found {}",
                            json_kind(&other)
                        ),
                    ));
                    Vec::new()
                }
            };
            if kind == StateKind::Terminal && !list.is_empty() {
                issues.push(ConfigIssue::new(
                    format!("{path}.transitions"),
                    "terminal states cannot declare transitions",
                ));
            }
            TransitionSet::IntentList(list)
        }
    }
}

fn convert_intent_transition(
    path: &str,
    item: Value,
    issues: &mut Vec<ConfigIssue>,
) -> Option<IntentTransition> {
    match serde_json::from_value::<RawIntentTransition>(item) {
        Ok(raw) => Some(IntentTransition {
            intent: raw.intent,
            target: raw.target,
            condition: raw.condition.as_deref().map(TransitionCondition::parse),
            clear_slots: raw.context_updates.unwrap_or_default().clear_slots,
        }),
        Err(e) => {
            issues.push(ConfigIssue::new(path.to_string(), e.to_string()));
            None
        }
    }
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
