//! Demo banking capabilities for `demos/banking_flow.json`
//!
//! Balances come from a fixed in-memory account list; transfers are checked
//! against it but never applied.

use chrono::Utc;
use rudder::error::CapabilityError;
use rudder::registry::{ActionOutcome, CapabilityRegistry};
use rudder::session::{is_filled, SessionContext};
use serde_json::{json, Value};

struct Account {
    key: &'static str,
    name: &'static str,
    available_balance: f64,
}

const ACCOUNTS: &[Account] = &[
    Account {
        key: "spending",
        name: "Spending Account",
        available_balance: 11_556.00,
    },
    Account {
        key: "savings",
        name: "High-Yield Savings",
        available_balance: 45_230.00,
    },
    Account {
        key: "vacation",
        name: "Vacation Fund",
        available_balance: 3_200.00,
    },
    Account {
        key: "joint",
        name: "Joint Checking",
        available_balance: 8_750.00,
    },
];

const DEFAULT_SOURCE: &str = "spending";

const ACCOUNT_ALIASES: &[(&str, &str)] = &[
    ("checking", "spending"),
    ("main", "spending"),
    ("primary", "spending"),
    ("debit", "spending"),
    ("emergency", "savings"),
    ("rainy day", "savings"),
    ("high yield", "savings"),
    ("travel fund", "vacation"),
    ("trip", "vacation"),
    ("holiday", "vacation"),
    ("shared", "joint"),
    ("household", "joint"),
    ("family", "joint"),
];

/// Register every capability the demo flow references
pub fn register(registry: &mut CapabilityRegistry) {
    registry
        .register_validator("validate_positive", |value: &Value| Ok(validate_positive(value)))
        .register_enricher("normalize_account_name", |value: &Value| {
            Ok(Value::String(normalize_account_name(value)))
        })
        .register_action("get_balance", |ctx: &SessionContext| Ok(get_balance(ctx)))
        .register_action("execute_transfer", execute_transfer)
        .register_condition("check_transfer_ready", |ctx: &SessionContext| {
            Ok(ctx.has_slot("transfer_amount") && ctx.has_slot("destination_account"))
        })
        .register_response_function("display_balance", |ctx: &SessionContext| Ok(display_balance(ctx)))
        .register_response_function("confirm_transfer_details", |ctx: &SessionContext| {
            Ok(confirm_transfer_details(ctx))
        });
}

fn find_account(name: &str) -> Option<&'static Account> {
    let wanted = name.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    ACCOUNTS
        .iter()
        .find(|a| a.key == wanted || a.name.to_lowercase() == wanted)
        .or_else(|| ACCOUNTS.iter().find(|a| a.name.to_lowercase().contains(&wanted)))
}

/// Numeric amount from raw text (`"$1,200"`), a number, or a Duckling value object
fn amount_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let digits: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            digits.parse().ok()
        }
        Value::Object(map) => map.get("value").and_then(amount_of),
        _ => None,
    }
}

fn format_currency(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::new();
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}

fn validate_positive(value: &Value) -> bool {
    amount_of(value).is_some_and(|amount| amount > 0.0)
}

fn normalize_account_name(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("value"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let normalized = text.trim().to_lowercase();
    ACCOUNT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map_or(normalized, |(_, canonical)| (*canonical).to_string())
}

fn get_balance(ctx: &SessionContext) -> ActionOutcome {
    let Some(requested) = ctx.slot_str("account").filter(|name| !name.is_empty()) else {
        let summary = ACCOUNTS
            .iter()
            .map(|a| format!("{}: {}", a.name, format_currency(a.available_balance)))
            .collect::<Vec<_>>()
            .join("\n");
        return ActionOutcome::success()
            .with_slot("balance_type", json!("all"))
            .with_slot("balance_summary", json!(summary));
    };

    match find_account(requested) {
        Some(account) => ActionOutcome::success()
            .with_slot("balance_type", json!("single"))
            .with_slot("account_name", json!(account.name))
            .with_slot("balance", json!(format_currency(account.available_balance))),
        None => ActionOutcome::new("not_found"),
    }
}

fn execute_transfer(ctx: &SessionContext) -> Result<ActionOutcome, CapabilityError> {
    let Some(amount) = ctx.slot("transfer_amount").and_then(amount_of) else {
        return Ok(ActionOutcome::new("error").with_slot("transfer_error", json!("Invalid amount")));
    };

    let destination_name = ctx.slot_str("destination_account").unwrap_or_default();
    let Some(destination) = find_account(destination_name) else {
        return Ok(ActionOutcome::new("invalid_account").with_slot(
            "transfer_error",
            json!(format!("Could not find destination account: {destination_name}")),
        ));
    };

    let source = ctx
        .slot_str("source_account")
        .and_then(find_account)
        .or_else(|| find_account(DEFAULT_SOURCE))
        .ok_or_else(|| CapabilityError::new("execute_transfer", "no default source account"))?;

    if amount > source.available_balance {
        return Ok(ActionOutcome::new("insufficient_funds")
            .with_slot(
                "transfer_error",
                json!(format!(
                    "Insufficient funds. Available: {}",
                    format_currency(source.available_balance)
                )),
            )
            .with_slot("source_balance", json!(source.available_balance)));
    }

    let stamp = Utc::now().format("%H%M%S").to_string();
    Ok(ActionOutcome::success()
        .with_slot("transfer_source", json!(source.name))
        .with_slot("transfer_destination", json!(destination.name))
        .with_slot("transfer_display_amount", json!(format_currency(amount)))
        .with_slot("confirmation_number", json!(stamp)))
}

fn display_balance(ctx: &SessionContext) -> Option<String> {
    let text = match ctx.slot_str("balance_type") {
        Some("single") => format!(
            "The available balance for your {} is {}.",
            ctx.slot_str("account_name").unwrap_or("account"),
            ctx.slot_str("balance").unwrap_or("unknown")
        ),
        Some("all") => format!(
            "Here are your balances:\n{}",
            ctx.slot_str("balance_summary").unwrap_or_default()
        ),
        _ => return None,
    };
    Some(text)
}

fn confirm_transfer_details(ctx: &SessionContext) -> Option<String> {
    let amount = ctx.slot("transfer_amount").and_then(amount_of)?;
    let source = ctx
        .slot("source_account")
        .filter(|v| is_filled(v))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_SOURCE);
    let destination = ctx.slot_str("destination_account").unwrap_or("unknown");
    Some(format!(
        "Transfer {} from {source} to {destination}? (yes/no)",
        format_currency(amount)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rudder::flow::{check_capabilities, FlowDefinition};

    fn context_with(slots: &[(&str, Value)]) -> SessionContext {
        let mut snapshot = json!({
            "session_id": "test",
            "current_state": "get_balance",
            "slots": {},
        });
        for (name, value) in slots {
            snapshot["slots"][*name] = value.clone();
        }
        serde_json::from_value(snapshot).unwrap()
    }

    #[test]
    fn test_demo_flow_capabilities_are_registered() {
        let flow = FlowDefinition::from_json_str(include_str!("../demos/banking_flow.json")).unwrap();
        let mut registry = CapabilityRegistry::new();
        register(&mut registry);
        rudder::duckling::DucklingClient::new("http://localhost:8000", "en_GB")
            .unwrap()
            .register_standard(&mut registry);
        assert!(check_capabilities(&flow, &registry).is_empty());
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(&json!("$1,200")));
        assert!(validate_positive(&json!(5)));
        assert!(validate_positive(&json!({ "type": "value", "value": 50, "unit": "USD" })));
        assert!(!validate_positive(&json!("-20")));
        assert!(!validate_positive(&json!("lots")));
        assert!(!validate_positive(&Value::Null));
    }

    #[test]
    fn test_normalize_account_name() {
        assert_eq!(normalize_account_name(&json!("  Rainy Day ")), "savings");
        assert_eq!(normalize_account_name(&json!("Trip")), "vacation");
        assert_eq!(normalize_account_name(&json!("joint")), "joint");
        assert_eq!(normalize_account_name(&json!({ "text": "household" })), "joint");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(11_556.0), "$11,556.00");
        assert_eq!(format_currency(45.5), "$45.50");
        assert_eq!(format_currency(1_000_000.0), "$1,000,000.00");
    }

    #[test]
    fn test_get_balance() {
        let single = get_balance(&context_with(&[("account", json!("savings"))]));
        assert_eq!(single.result, "success");
        assert_eq!(single.slot_updates["account_name"], "High-Yield Savings");
        assert_eq!(single.slot_updates["balance"], "$45,230.00");

        let all = get_balance(&context_with(&[]));
        assert_eq!(all.slot_updates["balance_type"], "all");

        let missing = get_balance(&context_with(&[("account", json!("brokerage"))]));
        assert_eq!(missing.result, "not_found");
    }

    #[test]
    fn test_execute_transfer_results() {
        let ok = execute_transfer(&context_with(&[
            ("transfer_amount", json!({ "value": 200, "unit": "USD" })),
            ("destination_account", json!("vacation")),
        ]))
        .unwrap();
        assert_eq!(ok.result, "success");
        assert_eq!(ok.slot_updates["transfer_source"], "Spending Account");
        assert_eq!(ok.slot_updates["transfer_display_amount"], "$200.00");

        let broke = execute_transfer(&context_with(&[
            ("transfer_amount", json!("5000")),
            ("destination_account", json!("savings")),
            ("source_account", json!("vacation")),
        ]))
        .unwrap();
        assert_eq!(broke.result, "insufficient_funds");

        let nowhere = execute_transfer(&context_with(&[
            ("transfer_amount", json!("10")),
            ("destination_account", json!("offshore")),
        ]))
        .unwrap();
        assert_eq!(nowhere.result, "invalid_account");

        let junk = execute_transfer(&context_with(&[("transfer_amount", json!("some"))])).unwrap();
        assert_eq!(junk.result, "error");
    }

    #[test]
    fn test_confirm_transfer_details() {
        let ctx = context_with(&[
            ("transfer_amount", json!("250")),
            ("destination_account", json!("joint")),
        ]);
        assert_eq!(
            confirm_transfer_details(&ctx).unwrap(),
            "Transfer $250.00 from spending to joint? (yes/no)"
        );
        assert_eq!(confirm_transfer_details(&context_with(&[])), None);
    }
}
