use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Resolving,
    Dispatching,
    Synthesizing,
    Replied,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Replied)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEvent {
    /// The resolver produced an action worth looking up.
    IntentResolved,
    /// The resolver fell back to `unknown`; the store is skipped.
    IntentUnresolved,
    LookupCompleted,
    LookupFailed,
    AnswerSynthesized,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnTermination {
    Answered,
    LookupFailed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnTransition {
    pub from: TurnState,
    pub to: TurnState,
    pub event: TurnEvent,
}
