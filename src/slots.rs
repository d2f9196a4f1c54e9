//! Slot pipeline
//!
//! Every value the NLU step extracts passes through here before it may
//! enter the session: validator first, then enricher, then overwrite. A
//! rejection is a normal outcome and is reported, never raised.

use crate::error::CapabilityError;
use crate::flow::State;
use crate::registry::CapabilityRegistry;
use crate::session::Slots;
use serde_json::Value;
use std::collections::BTreeMap;

/// Why a candidate slot value was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRejection {
    /// The validator returned `false`
    Invalid { validator: String },
    /// The validator or enricher failed
    CapabilityFailed(String),
}

/// Per-turn account of what the pipeline did with each candidate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotReport {
    /// Slot names written, with their final (possibly enriched) values.
    /// Empty when the turn was re-prompted.
    pub accepted: Slots,
    pub rejected: BTreeMap<String, SlotRejection>,
    /// Extracted names this state does not declare
    pub ignored: Vec<String>,
}

/// Run the NLU slot candidates for `state` through validation and enrichment,
/// writing survivors into `slots`.
pub async fn run_slot_pipeline(
    state: &State,
    registry: &CapabilityRegistry,
    candidates: &BTreeMap<String, String>,
    slots: &mut Slots,
) -> SlotReport {
    let mut report = SlotReport::default();

    for (name, raw) in candidates {
        if !state.accepts_slot(name) {
            report.ignored.push(name.clone());
            continue;
        }
        // Nothing extracted
        if raw.trim().is_empty() {
            continue;
        }

        let config = state.slot_config.get(name);
        let raw_value = Value::String(raw.clone());

        match process_value(
            registry,
            config.and_then(|c| c.validator.as_deref()),
            config.and_then(|c| c.enricher.as_deref()),
            raw_value,
        )
        .await
        {
            Ok(value) => {
                tracing::debug!(slot = %name, state = %state.id, "Slot accepted");
                slots.insert(name.clone(), value.clone());
                report.accepted.insert(name.clone(), value);
            }
            Err(rejection) => {
                tracing::warn!(slot = %name, state = %state.id, reason = ?rejection, "Slot rejected");
                report.rejected.insert(name.clone(), rejection);
            }
        }
    }

    report
}

async fn process_value(
    registry: &CapabilityRegistry,
    validator: Option<&str>,
    enricher: Option<&str>,
    value: Value,
) -> Result<Value, SlotRejection> {
    if let Some(name) = validator {
        let valid = match registry.validator(name) {
            Some(v) => v.validate(&value).await.map_err(rejected)?,
            None => return Err(rejected(unregistered(name))),
        };
        if !valid {
            return Err(SlotRejection::Invalid {
                validator: name.to_string(),
            });
        }
    }

    match enricher {
        Some(name) => match registry.enricher(name) {
            Some(e) => e.enrich(&value).await.map_err(rejected),
            None => Err(rejected(unregistered(name))),
        },
        None => Ok(value),
    }
}

fn rejected(error: CapabilityError) -> SlotRejection {
    SlotRejection::CapabilityFailed(error.to_string())
}

fn unregistered(name: &str) -> CapabilityError {
    CapabilityError::new(name, "not registered")
}
