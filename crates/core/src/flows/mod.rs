pub mod engine;
pub mod states;

pub use engine::{TurnFlow, TurnTracker, TurnTransitionError};
pub use states::{TurnEvent, TurnState, TurnTermination, TurnTransition};
