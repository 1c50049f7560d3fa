//! Fire-and-forget notifications about committed settlement changes.
//!
//! Register async hooks in [`EventHooks`], turn them into running [`EventHandlers`], and hand the
//! [`EventProducers`] to the API objects. Events are only ever published after the change they describe has been
//! committed.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
