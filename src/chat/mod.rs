//! Conversational front-end logic.
//!
//! An explicit state machine replaces per-user string tags: [`ChatState`]
//! names what the conversation waits for, [`Input`] is what the front end
//! delivers, and [`ChatMachine::handle`] maps the pair to a [`Reply`] and the
//! next state. Buttons carry [`Action`]s encoded as callback-data strings.

mod action;
mod input;
mod machine;
mod reply;
mod session;
mod state;

pub use action::Action;
pub use input::{Command, Input, parse_line};
pub use machine::ChatMachine;
pub use reply::{Button, Reply};
pub use session::{Session, SessionStore};
pub use state::ChatState;
