//! Dialog state machine
//!
//! Slot filling as pure state transitions: `(state, event) -> (state, effects)`.
//! The runtime executes the effects; nothing in here performs I/O.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::{BotReply, Effect};
pub use event::Event;
pub use state::{DialogState, Phase};
pub use transition::{transition, TransitionError, TransitionResult};
