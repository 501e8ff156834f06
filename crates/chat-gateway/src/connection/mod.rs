//! Connection management
//!
//! Per-connection handle, lifecycle states, outbound queue and the session
//! state machine that drives them.

mod connection;
mod outbound;
mod session;
mod state;

pub use connection::{Connection, ConnectionId};
pub use outbound::{OutboundQueue, PushOutcome};
pub use session::{ConnectionSession, SessionContext, SessionOutcome};
pub use state::{InvalidTransition, SessionState};
