//! Upload/elicitation orchestrator state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! UI and transport events go in, a new [`FlowState`] and a list of
//! [`Effect`]s come out. The runtime executes the effects.

mod effect;
pub mod event;
pub mod state;
pub mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{AttachedFile, FlowState, Message, MessageKind, UploadDirective};
pub use transition::{transition, Transition};
