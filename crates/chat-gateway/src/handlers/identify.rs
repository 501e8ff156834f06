//! Handshake authentication

use axum::http::{header, HeaderMap};
use chat_core::{AuthError, Identity, IdentityVerifier};

/// Credential pulled from the upgrade request
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(Option<String>);

impl Credential {
    /// `Authorization: Bearer <token>` wins over `?token=`
    pub fn from_request(headers: &HeaderMap, query_token: Option<&str>) -> Self {
        let from_header = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token);

        let token = from_header
            .or(query_token)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string);

        Self(token)
    }

    pub fn token(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self(Some(token.to_string()))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential")
            .field(&self.0.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

/// Verifies the handshake credential
pub struct IdentifyHandler;

impl IdentifyHandler {
    pub fn handle(
        verifier: &dyn IdentityVerifier,
        credential: &Credential,
    ) -> Result<Identity, AuthError> {
        let token = credential.token().ok_or(AuthError::Missing)?;
        verifier.verify(token)
    }
}
