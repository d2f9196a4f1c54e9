//! Flow definitions
//!
//! A flow is loaded once, validated, and then shared read-only by the engine
//! for every session it serves.

mod load;
pub mod model;
pub mod validate;

pub use model::{
    FallbackBehavior, FlowDefinition, FlowSettings, IntentTransition, ResponseSpec, SlotConfig,
    State, StateKind, TransitionCondition, TransitionSet, ALL_SLOTS_FILLED,
    DEFAULT_FAILURE_RESPONSE, DEFAULT_FAILURE_STATE, DEFAULT_MAX_ACTION_CHAIN,
    DEFAULT_RECLASSIFY_MESSAGE, ERROR_RESULT, OUT_OF_SCOPE_STATE, SUCCESS_RESULT,
};
pub use validate::check_capabilities;
