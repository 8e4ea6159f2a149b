//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, the lifecycle state machine trait, the
//! event emitter and the error taxonomy that the rest of the crate speaks.

mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{ErrorCategory, ErrorCode, XrtmlError};
pub use events::{EventEmitter, ListenerId};
pub use ids::{ConnectionInternalId, ConsumerId};
pub use state_machine::{InvalidTransition, StateMachine};
pub use timestamp::Timestamp;
