//! Conversation workflow state machine
//!
//! A fixed pipeline of pure steps over [`ConversationState`]. Steps never do
//! I/O: they describe the external call they need as an [`Effect`] and
//! receive its [`Reply`]. Routers decide where a run resumes and whether it
//! continues after each step.

pub mod citations;
mod effect;
pub mod quiz;
pub mod routing;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, Reply};
pub use routing::{entry_route, route, Entry, MismatchPolicy, Next};
pub use state::{ConversationState, MessageType, ResponseType, Status};
pub use transition::{effect_for, step, StepId};
