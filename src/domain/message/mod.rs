//! Message module - the routed envelope and its wire form.

pub mod codec;
mod envelope;
pub mod sentinel;

pub use codec::{decode, encode, is_valid, validate, validate_value, InvalidReason, MessageError, Validity};
pub use envelope::{Envelope, TriggerDescriptor, TriggerSpec, ACTIVATE_ACTION, DEACTIVATE_ACTION};
pub use sentinel::Sentinel;
