//! Session handlers
//!
//! Identify at handshake, authorize once per connection, ingest per frame.

mod authorize;
mod error;
mod identify;
mod ingest;

pub use authorize::MembershipGuard;
pub use error::{IngestError, IngestResult};
pub use identify::{Credential, IdentifyHandler};
pub use ingest::{MessageIngestor, LAST_MESSAGE_PREVIEW_LEN};
