//! Rudder - interactive console for a dialog flow
//!
//! Loads a flow, wires the LLM-backed NLU and response generator, and runs a
//! read-eval loop on stdin.

mod banking;

use rudder::duckling::DucklingClient;
use rudder::llm::{LlmConfig, LlmNlu, LlmResponder, LlmService};
use rudder::{CapabilityRegistry, DialogEngine, DialogError, FlowDefinition};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FLOW_PATH: &str = "demos/banking_flow.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rudder=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let flow_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("RUDDER_FLOW_PATH").ok())
        .unwrap_or_else(|| DEFAULT_FLOW_PATH.to_string());
    let flow = FlowDefinition::load(&flow_path)?;

    let llm = LlmConfig::from_env().build_service()?;
    tracing::info!(model = %llm.model_id(), "LLM service initialized");

    let mut registry = CapabilityRegistry::new();
    banking::register(&mut registry);
    DucklingClient::from_env()?.register_standard(&mut registry);

    let engine = DialogEngine::new(flow, registry, LlmNlu::new(llm.clone()), LlmResponder::new(llm))?;
    let mut session = engine.start_session();
    tracing::info!(session = %session.session_id(), flow = %flow_path, "Session started");

    println!("Rudder console. Type 'reset' to start over, 'exit' to quit.");
    println!("Bot: {}", engine.current_response(&session).await?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input.to_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" => break,
            "reset" => {
                engine.reset(&mut session);
                println!("Bot: {}", engine.current_response(&session).await?);
                continue;
            }
            _ => {}
        }

        match engine.process_turn(input, &mut session).await {
            Ok(reply) => {
                println!("Bot: {}", reply.response);
                println!("     [state: {}]", reply.state);
                if reply.ended {
                    println!("(conversation finished, type 'reset' to start again)");
                }
            }
            Err(DialogError::SessionEnded { .. }) => {
                println!("(conversation finished, type 'reset' to start again)");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
