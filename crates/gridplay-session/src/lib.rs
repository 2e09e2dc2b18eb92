//! Connection lifecycle for Gridplay.
//!
//! Two layers live here:
//!
//! 1. **Link** ([`Link`]): a transport connection split into a writer task
//!    and a reader task, with best-effort `send`/`ping`, a sticky failure
//!    flag and a one-shot exit signal.
//! 2. **Session** ([`Session`]): the per-connection actor that turns
//!    decoded messages into [`SessionEvent`]s and routes them to the room
//!    seat it is bound to, or answers them itself while idle.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room / Mediator (above)  ← bind sessions, receive their events
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Transport + Protocol (below)  ← frames in, ClientMessage out
//! ```

mod error;
mod link;
mod session;

pub use error::SessionError;
pub use link::{Inbound, Link};
pub use session::{
    Disconnected, NOT_RUNNING, Session, SessionEvent, SessionHandler,
};
