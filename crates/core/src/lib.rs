//! Domain model, configuration, and turn state machine shared by every shopkeep crate.

pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use domain::intent::{Intent, IntentAction, QueryParams};
pub use domain::product::{CatalogField, NewProduct, Product, ProductId, ProductPatch};
pub use errors::{ApplicationError, DomainError};
pub use flows::{TurnEvent, TurnState, TurnTermination, TurnTracker, TurnTransition};
