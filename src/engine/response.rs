//! Response selection and template rendering

use crate::capabilities::ResponseGenerator;
use crate::error::CapabilityError;
use crate::flow::State;
use crate::registry::CapabilityRegistry;
use crate::session::{SessionContext, Slots};
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

/// `{{ name }}` with optional inner whitespace; any name without braces or spaces
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").unwrap());

/// Substitute `{{name}}` placeholders with slot values.
///
/// A placeholder with no matching slot renders as the empty string. String
/// values are inserted verbatim, other JSON values in their compact form.
pub fn render_template(template: &str, slots: &Slots) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            slots.get(&caps[1]).map(display_value).unwrap_or_default()
        })
        .into_owned()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Produce the response for `state`.
///
/// A registered response function wins when it yields text; otherwise the
/// template is rendered, otherwise the prompt goes to the generator. A state
/// with none of the three responds with nothing.
pub(crate) async fn produce_response<R: ResponseGenerator>(
    state: &State,
    context: &SessionContext,
    registry: &CapabilityRegistry,
    responder: &R,
) -> Result<String, CapabilityError> {
    if let Some(name) = &state.response.function {
        match registry.response_function(name) {
            Some(function) => match function.render(context).await {
                Ok(Some(text)) => return Ok(text),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(state = %state.id, function = %name, error = %e, "Response function failed, falling through");
                }
            },
            None => tracing::warn!(state = %state.id, function = %name, "Response function not registered"),
        }
    }

    if let Some(template) = &state.response.template {
        return Ok(render_template(template, context.slots()));
    }

    if let Some(prompt) = &state.response.prompt {
        return responder.generate(prompt, context.slots()).await;
    }

    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{EchoResponder, FailingResponder};
    use crate::flow::{FallbackBehavior, ResponseSpec, StateKind, TransitionSet};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn state(response: ResponseSpec) -> State {
        State {
            id: "confirm".to_string(),
            description: "Confirms the booking".to_string(),
            kind: StateKind::Terminal,
            slots_required: vec![],
            slots_optional: vec![],
            slot_config: BTreeMap::new(),
            transitions: TransitionSet::empty(),
            action_name: None,
            response,
            fallback: FallbackBehavior::Oos,
        }
    }

    fn context() -> SessionContext {
        let mut ctx = SessionContext::new("s", "confirm");
        ctx.set_slot("destination", json!("Paris"));
        ctx.set_slot("amount", json!(150.5));
        ctx
    }

    #[test]
    fn test_render_template() {
        let slots = Slots::from([
            ("destination".to_string(), json!("Paris")),
            ("seats".to_string(), json!(2)),
            ("note".to_string(), Value::Null),
        ]);
        assert_eq!(
            render_template("Flying to {{destination}} with {{ seats }} seats", &slots),
            "Flying to Paris with 2 seats"
        );
        assert_eq!(render_template("Hi {{name}}!", &slots), "Hi !");
        assert_eq!(render_template("[{{note}}]", &slots), "[]");
        assert_eq!(render_template("no placeholders", &slots), "no placeholders");
        let keyed = Slots::from([("account-name".to_string(), json!("Savings"))]);
        assert_eq!(render_template("Your {{account-name}} balance", &keyed), "Your Savings balance");
        assert_eq!(render_template("[{{first.name}}]", &keyed), "[]");
        // Substituted text is never re-scanned
        let tricky = Slots::from([("a".to_string(), json!("{{b}}")), ("b".to_string(), json!("x"))]);
        assert_eq!(render_template("{{a}}", &tricky), "{{b}}");
    }

    #[tokio::test]
    async fn test_template_beats_generator() {
        let state = state(ResponseSpec::template("Booked {{destination}}"));
        let text = produce_response(&state, &context(), &CapabilityRegistry::new(), &FailingResponder)
            .await
            .unwrap();
        assert_eq!(text, "Booked Paris");
    }

    #[tokio::test]
    async fn test_prompt_uses_generator() {
        let state = state(ResponseSpec::prompt("Summarize the booking"));
        let text = produce_response(&state, &context(), &CapabilityRegistry::new(), &EchoResponder)
            .await
            .unwrap();
        assert!(text.starts_with("Summarize the booking"));
        assert!(text.contains("destination=Paris"));

        let err = produce_response(&state, &context(), &CapabilityRegistry::new(), &FailingResponder)
            .await
            .unwrap_err();
        assert_eq!(err.capability, "response_generator");
    }

    #[tokio::test]
    async fn test_response_function_precedence() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register_response_function("balance", |ctx: &SessionContext| {
                Ok(ctx.slot("amount").map(|a| format!("Balance: {a}")))
            })
            .register_response_function("nothing", |_: &SessionContext| Ok(None))
            .register_response_function("broken", |_: &SessionContext| {
                Err(CapabilityError::new("broken", "db down"))
            });

        let with = |function: &str| {
            state(ResponseSpec {
                template: Some("Fallback".to_string()),
                prompt: None,
                function: Some(function.to_string()),
            })
        };

        let ctx = context();
        let text = produce_response(&with("balance"), &ctx, &registry, &EchoResponder).await.unwrap();
        assert_eq!(text, "Balance: 150.5");
        let text = produce_response(&with("nothing"), &ctx, &registry, &EchoResponder).await.unwrap();
        assert_eq!(text, "Fallback");
        let text = produce_response(&with("broken"), &ctx, &registry, &EchoResponder).await.unwrap();
        assert_eq!(text, "Fallback");
    }
}
