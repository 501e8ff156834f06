use crate::entities::Identity;
use crate::error::AuthError;

/// Validates an opaque bearer credential against a trust anchor fixed at
/// process start.
///
/// Implementations are pure: no I/O, no per-call state. A connection is
/// verified once during its handshake and never again.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, credential: &str) -> Result<Identity, AuthError>;
}
