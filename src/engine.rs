//! Dialog engine
//!
//! Runs one conversational turn at a time against a caller-owned
//! [`SessionContext`]. A turn works on a private copy of the context and
//! commits it only after every external call has returned, so dropping an
//! in-flight turn leaves the caller's context untouched.
//!
//! Runtime failures (a capability erroring, an action result with no
//! target, a runaway action chain) never escape `process_turn`; they are
//! logged and the session is routed to the flow's failure state.

mod response;

#[cfg(test)]
pub(crate) mod testing;

pub use response::render_template;

use crate::capabilities::{NluResult, NluService, ResponseGenerator};
use crate::constraint::{build_constraints, constraints_for, ConstraintPayload, UNKNOWN_INTENT};
use crate::error::{ConfigurationError, DialogError, ResolveError};
use crate::flow::{
    check_capabilities, FlowDefinition, State, TransitionCondition, TransitionSet,
    DEFAULT_FAILURE_RESPONSE, ERROR_RESULT, SUCCESS_RESULT,
};
use crate::registry::CapabilityRegistry;
use crate::session::{SessionContext, Turn, TurnOutcome};
use crate::slots::{run_slot_pipeline, SlotReport};
use crate::state_machine::{resolve_action_result, resolve_intent, ConditionResults, Resolution};
use chrono::Utc;
use response::produce_response;
use std::sync::Arc;

/// What a turn produced
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    /// Text to show the user
    pub response: String,
    /// State the session is in after the turn
    pub state: String,
    /// Intent the NLU step settled on, if any
    pub intent: Option<String>,
    pub outcome: TurnOutcome,
    pub slot_report: SlotReport,
    /// The session reached a terminal state; call [`DialogEngine::reset`] to continue
    pub ended: bool,
}

/// Deterministic dialog-flow interpreter
pub struct DialogEngine<N, R>
where
    N: NluService,
    R: ResponseGenerator,
{
    flow: Arc<FlowDefinition>,
    registry: CapabilityRegistry,
    nlu: N,
    responder: R,
}

impl<N, R> DialogEngine<N, R>
where
    N: NluService,
    R: ResponseGenerator,
{
    /// Build an engine, rejecting flows that name unregistered capabilities.
    pub fn new(
        flow: impl Into<Arc<FlowDefinition>>,
        registry: CapabilityRegistry,
        nlu: N,
        responder: R,
    ) -> Result<Self, ConfigurationError> {
        let flow = flow.into();
        let issues = check_capabilities(&flow, &registry);
        if !issues.is_empty() {
            return Err(ConfigurationError::Invalid(issues));
        }
        tracing::info!(
            start_state = %flow.start_state(),
            states = flow.states().count(),
            "Dialog engine ready"
        );
        Ok(Self {
            flow,
            registry,
            nlu,
            responder,
        })
    }

    pub fn flow(&self) -> &FlowDefinition {
        &self.flow
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// New session at the start state with a generated id
    pub fn start_session(&self) -> SessionContext {
        self.start_session_with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn start_session_with_id(&self, session_id: impl Into<String>) -> SessionContext {
        SessionContext::new(session_id, self.flow.start_state())
    }

    /// Return a session to the start state with no slots; history is kept.
    pub fn reset(&self, context: &mut SessionContext) {
        tracing::info!(session = %context.session_id(), "Resetting session");
        context.restart(self.flow.start_state());
    }

    /// Constraint payload for the session's current state
    pub fn constraints(&self, context: &SessionContext) -> Result<ConstraintPayload, ConfigurationError> {
        build_constraints(&self.flow, context.current_state(), context.slots())
    }

    /// Response of the current state without consuming input, e.g. a greeting
    pub async fn current_response(&self, context: &SessionContext) -> Result<String, DialogError> {
        let state = self.state_of(context.current_state())?;
        Ok(self.respond_or_apologize(state, context).await)
    }

    /// Process one user input.
    ///
    /// Errors only on caller-contract violations: the session is already in
    /// a terminal state, or names a state this flow does not have.
    pub async fn process_turn(
        &self,
        user_input: &str,
        context: &mut SessionContext,
    ) -> Result<TurnReply, DialogError> {
        let state = self.state_of(context.current_state())?;
        if state.is_terminal() {
            return Err(DialogError::SessionEnded {
                state: state.id.clone(),
            });
        }

        let mut working = context.clone();
        let mut intent = None;
        let mut slot_report = SlotReport::default();

        let mut outcome = if state.is_action() {
            // Entered at the end of an earlier turn; runs before any input is read
            self.settle(&mut working, TurnOutcome::Transitioned).await
        } else {
            let nlu = self.understand(state, &working, user_input).await;
            intent = nlu
                .intent
                .filter(|i| !i.is_empty() && i != UNKNOWN_INTENT);

            let mut scratch = working.slots().clone();
            slot_report = run_slot_pipeline(state, &self.registry, &nlu.slots, &mut scratch).await;

            let before_slots = working.clone();
            for (name, value) in &slot_report.accepted {
                working.set_slot(name.clone(), value.clone());
            }

            let conditions = self.evaluate_conditions(state, intent.as_deref(), &working).await;
            let resolution = resolve_intent(state, intent.as_deref(), working.slots(), &conditions);
            tracing::debug!(intent = ?intent, resolution = ?resolution, "Resolved intent");

            match resolution {
                Resolution::Reprompt => {
                    working = before_slots;
                    slot_report.accepted.clear();
                    TurnOutcome::Reprompted
                }
                Resolution::OutOfScope => {
                    resolution.apply(&mut working);
                    self.settle(&mut working, TurnOutcome::OutOfScope).await
                }
                Resolution::Transition { .. } => {
                    resolution.apply(&mut working);
                    self.settle(&mut working, TurnOutcome::Transitioned).await
                }
            }
        };

        let response = if outcome == TurnOutcome::Reprompted {
            self.flow.settings.reclassify_message.clone()
        } else {
            let landed = self.state_of(working.current_state())?;
            match produce_response(landed, &working, &self.registry, &self.responder).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(state = %landed.id, error = %e, "Response generation failed");
                    outcome = TurnOutcome::Recovered {
                        reason: e.to_string(),
                    };
                    self.route_to_failure(&mut working);
                    self.failure_response(&working).await
                }
            }
        };

        let ended = self
            .flow
            .state(working.current_state())
            .is_some_and(State::is_terminal);

        tracing::info!(
            session = %working.session_id(),
            state = %state.id,
            intent = ?intent,
            next_state = %working.current_state(),
            outcome = ?outcome,
            "Turn complete"
        );

        working.record_turn(Turn {
            user_input: user_input.to_string(),
            intent: intent.clone(),
            state_in: state.id.clone(),
            state_out: working.current_state().to_string(),
            response: response.clone(),
            slots: working.slots().clone(),
            outcome: outcome.clone(),
            at: Utc::now(),
        });

        let reply = TurnReply {
            response,
            state: working.current_state().to_string(),
            intent,
            outcome,
            slot_report,
            ended,
        };
        *context = working;
        Ok(reply)
    }

    fn state_of(&self, id: &str) -> Result<&State, DialogError> {
        self.flow
            .state(id)
            .ok_or_else(|| DialogError::UnknownState(id.to_string()))
    }

    async fn understand(&self, state: &State, context: &SessionContext, user_input: &str) -> NluResult {
        let constraints = constraints_for(state, context.slots());
        match self.nlu.understand(&constraints, user_input).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(error = %e, "NLU failed, treating input as unrecognized");
                NluResult::none()
            }
        }
    }

    /// Evaluate the named conditions guarding transitions for `intent`.
    ///
    /// A condition that fails counts as false.
    async fn evaluate_conditions(
        &self,
        state: &State,
        intent: Option<&str>,
        context: &SessionContext,
    ) -> ConditionResults {
        let mut results = ConditionResults::new();
        let (Some(intent), TransitionSet::IntentList(list)) = (intent, &state.transitions) else {
            return results;
        };

        for transition in list.iter().filter(|t| t.intent == intent) {
            let Some(TransitionCondition::Named(name)) = &transition.condition else {
                continue;
            };
            if results.contains_key(name) {
                continue;
            }
            let holds = match self.registry.condition(name) {
                Some(condition) => condition.check(context).await.unwrap_or_else(|e| {
                    tracing::warn!(condition = %name, error = %e, "Condition failed, treating as false");
                    false
                }),
                None => false,
            };
            results.insert(name.clone(), holds);
        }
        results
    }

    /// Run any action chain starting at the current state, recovering errors
    async fn settle(&self, context: &mut SessionContext, outcome: TurnOutcome) -> TurnOutcome {
        match self.run_action_chain(context).await {
            Ok(()) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Flow-authoring defect, routing to failure state");
                self.route_to_failure(context);
                TurnOutcome::Recovered {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Execute action states until the session rests on a non-action state.
    async fn run_action_chain(&self, context: &mut SessionContext) -> Result<(), ResolveError> {
        let limit = self.flow.settings.max_action_chain;
        let mut depth = 0;

        while let Some(state) = self.flow.state(context.current_state()).filter(|s| s.is_action()) {
            if depth >= limit {
                return Err(ResolveError::TransitionLoop {
                    state: state.id.clone(),
                    limit,
                });
            }
            depth += 1;

            let result = self.execute_action(state, context).await;
            let target = resolve_action_result(state, &result)?;
            tracing::info!(action_state = %state.id, result = %result, target = %target, "Action resolved");
            context.move_to(&target);
        }
        Ok(())
    }

    /// Run a state's action once and merge its slot updates; returns the result string.
    async fn execute_action(&self, state: &State, context: &mut SessionContext) -> String {
        let name = state.action_name.as_deref().unwrap_or_default();
        let Some(action) = self.registry.action(name) else {
            tracing::error!(action = %name, "Action not registered");
            return ERROR_RESULT.to_string();
        };

        match action.execute(context).await {
            Ok(outcome) => {
                for (slot, value) in outcome.slot_updates {
                    context.set_slot(slot, value);
                }
                if outcome.result.is_empty() {
                    SUCCESS_RESULT.to_string()
                } else {
                    outcome.result
                }
            }
            Err(e) => {
                tracing::warn!(action = %name, error = %e, "Action failed");
                ERROR_RESULT.to_string()
            }
        }
    }

    fn route_to_failure(&self, context: &mut SessionContext) {
        context.move_to(self.flow.failure_state());
    }

    async fn failure_response(&self, context: &SessionContext) -> String {
        match self.flow.state(self.flow.failure_state()) {
            Some(state) => self.respond_or_apologize(state, context).await,
            None => DEFAULT_FAILURE_RESPONSE.to_string(),
        }
    }

    async fn respond_or_apologize(&self, state: &State, context: &SessionContext) -> String {
        produce_response(state, context, &self.registry, &self.responder)
            .await
            .unwrap_or_else(|e| {
                tracing::error!(state = %state.id, error = %e, "Response generation failed");
                DEFAULT_FAILURE_RESPONSE.to_string()
            })
    }
}
