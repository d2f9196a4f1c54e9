//! Rudder - a deterministic dialog-flow interpreter
//!
//! Conversations are driven by a JSON flow of states and transitions. A
//! language model only classifies each user turn into one of the intents the
//! current state allows and extracts slot values; every state change is
//! decided by the flow itself.

pub mod capabilities;
pub mod constraint;
pub mod duckling;
pub mod engine;
pub mod error;
pub mod flow;
pub mod llm;
pub mod registry;
pub mod session;
pub mod slots;
pub mod state_machine;

pub use capabilities::{NluResult, NluService, ResponseGenerator};
pub use engine::{DialogEngine, TurnReply};
pub use error::{CapabilityError, ConfigurationError, DialogError, ResolveError};
pub use flow::FlowDefinition;
pub use registry::{ActionOutcome, CapabilityRegistry};
pub use session::{SessionContext, TurnOutcome};
