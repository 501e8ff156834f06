use thiserror::Error;

/// Reasons a bearer credential is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No credential supplied")]
    Missing,

    #[error("Credential is malformed")]
    Malformed,

    #[error("Credential has expired")]
    Expired,

    #[error("Credential signature is invalid")]
    InvalidSignature,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing => "MISSING_TOKEN",
            Self::Malformed => "MALFORMED_TOKEN",
            Self::Expired => "TOKEN_EXPIRED",
            Self::InvalidSignature => "INVALID_SIGNATURE",
        }
    }
}
