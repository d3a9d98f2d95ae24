use thiserror::Error;

use crate::flows::states::{TurnEvent, TurnState, TurnTermination, TurnTransition};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnTransitionError {
    #[error("turn already replied; rejected event {event:?}")]
    AlreadyReplied { event: TurnEvent },
    #[error("event {event:?} is not valid from state {from:?}")]
    InvalidTransition { from: TurnState, event: TurnEvent },
}

/// Transition table for a single chat turn.
///
/// Happy path: `Resolving -> Dispatching -> Synthesizing -> Replied`.
/// Escapes: `Dispatching -> Replied` on a lookup error, and any non-terminal
/// state `-> Replied` on failure.
#[derive(Clone, Debug, Default)]
pub struct TurnFlow;

impl TurnFlow {
    pub fn initial_state(&self) -> TurnState {
        TurnState::Resolving
    }

    pub fn apply(
        &self,
        current: TurnState,
        event: TurnEvent,
    ) -> Result<TurnTransition, TurnTransitionError> {
        use TurnEvent::*;
        use TurnState::*;

        if current.is_terminal() {
            return Err(TurnTransitionError::AlreadyReplied { event });
        }

        let to = match (current, event) {
            (_, Failed) => Replied,
            (Resolving, IntentResolved) => Dispatching,
            (Resolving, IntentUnresolved) => Synthesizing,
            (Dispatching, LookupCompleted) => Synthesizing,
            (Dispatching, LookupFailed) => Replied,
            (Synthesizing, AnswerSynthesized) => Replied,
            (from, event) => return Err(TurnTransitionError::InvalidTransition { from, event }),
        };

        Ok(TurnTransition { from: current, to, event })
    }
}

/// Walks one turn through [`TurnFlow`], keeping the applied transitions.
#[derive(Clone, Debug)]
pub struct TurnTracker {
    flow: TurnFlow,
    state: TurnState,
    transitions: Vec<TurnTransition>,
    termination: Option<TurnTermination>,
}

impl Default for TurnTracker {
    fn default() -> Self {
        let flow = TurnFlow;
        Self { state: flow.initial_state(), flow, transitions: Vec::new(), termination: None }
    }
}

impl TurnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn termination(&self) -> Option<TurnTermination> {
        self.termination
    }

    pub fn transitions(&self) -> &[TurnTransition] {
        &self.transitions
    }

    pub fn advance(&mut self, event: TurnEvent) -> Result<TurnState, TurnTransitionError> {
        let transition = self.flow.apply(self.state, event)?;
        self.state = transition.to;
        if transition.to.is_terminal() {
            self.termination = Some(match event {
                TurnEvent::LookupFailed => TurnTermination::LookupFailed,
                TurnEvent::Failed => TurnTermination::Failed,
                _ => TurnTermination::Answered,
            });
        }
        self.transitions.push(transition);
        Ok(self.state)
    }

    pub fn into_transitions(self) -> Vec<TurnTransition> {
        self.transitions
    }
}
