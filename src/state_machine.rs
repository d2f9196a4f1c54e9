//! Dialog state machine
//!
//! Pure transition resolution for standard and action states. The engine
//! owns all I/O; this module only decides where a session goes next.

pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use transition::{
    all_slots_filled, resolve_action_result, resolve_intent, ConditionResults, Resolution,
};
