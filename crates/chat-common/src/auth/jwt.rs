//! JWT verification for gateway handshakes
//!
//! Tokens are HS256 access tokens minted by the CRUD side with a shared secret.
//! The claim layout follows that issuer: `user_id`, `token_type`, `exp`, `iat`,
//! `jti`, plus an optional `username` the gateway uses as display name.

use chat_core::{AuthError, Identity, IdentityVerifier, UserId};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::AppError;

/// Token type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Accepts both `17` and `"17"`; issuers disagree on the encoding
    #[serde(deserialize_with = "deserialize_user_id")]
    pub user_id: UserId,
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Claims {
    /// Check if this is an access token
    #[must_use]
    pub fn is_access_token(&self) -> bool {
        self.token_type == TokenType::Access
    }

    /// Identity carried by these claims
    #[must_use]
    pub fn identity(&self) -> Identity {
        match self.username.as_deref() {
            Some(name) if !name.trim().is_empty() => Identity::new(self.user_id, name),
            _ => Identity::anonymous(self.user_id),
        }
    }
}

fn deserialize_user_id<'de, D>(deserializer: D) -> Result<UserId, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct UserIdVisitor;

    impl Visitor<'_> for UserIdVisitor {
        type Value = UserId;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer user id")
        }

        fn visit_i64<E>(self, value: i64) -> Result<UserId, E>
        where
            E: de::Error,
        {
            Ok(UserId::new(value))
        }

        fn visit_u64<E>(self, value: u64) -> Result<UserId, E>
        where
            E: de::Error,
        {
            i64::try_from(value)
                .map(UserId::new)
                .map_err(|_| de::Error::custom("user id out of range"))
        }

        fn visit_str<E>(self, value: &str) -> Result<UserId, E>
        where
            E: de::Error,
        {
            UserId::parse(value).map_err(|_| de::Error::custom("invalid user id string"))
        }
    }

    deserializer.deserialize_any(UserIdVisitor)
}

/// JWT service holding the trust anchor
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry: i64,
}

impl JwtService {
    /// Create a new JWT service with the given secret and access-token lifetime (seconds)
    #[must_use]
    pub fn new(secret: &str, access_token_expiry: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expiry,
        }
    }

    /// Mint an access token. End-user issuance belongs to the CRUD side; this
    /// exists for tooling and tests.
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn issue_access_token(
        &self,
        user_id: UserId,
        username: Option<&str>,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            token_type: TokenType::Access,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            jti: Some(uuid::Uuid::new_v4().simple().to_string()),
            username: username.map(str::to_string),
        };

        self.encode_claims(&claims)
    }

    /// Encode arbitrary claims with the service key
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn encode_claims(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to encode JWT")))
    }

    /// Decode and validate a JWT token
    pub fn decode_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::default();

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Malformed,
            }
        })?;

        Ok(token_data.claims)
    }
}

impl IdentityVerifier for JwtService {
    fn verify(&self, credential: &str) -> Result<Identity, AuthError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(AuthError::Missing);
        }

        let claims = self.decode_token(credential)?;

        // Refresh tokens are well-formed but not accepted as connection credentials
        if !claims.is_access_token() {
            return Err(AuthError::Malformed);
        }

        Ok(claims.identity())
    }
}

impl fmt::Debug for JwtService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtService")
            .field("access_token_expiry", &self.access_token_expiry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> JwtService {
        JwtService::new("test-secret-key-that-is-long-enough", 900)
    }

    fn claims_for(user_id: i64, token_type: TokenType, exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            user_id: UserId::new(user_id),
            token_type,
            iat: now,
            exp: now + exp_offset,
            jti: None,
            username: None,
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let service = create_test_service();
        let token = service
            .issue_access_token(UserId::new(12345), Some("alice"))
            .unwrap();

        let identity = service.verify(&token).unwrap();
        assert_eq!(identity.id(), UserId::new(12345));
        assert_eq!(identity.display_name(), "alice");
    }

    #[test]
    fn test_missing_username_falls_back_to_id() {
        let service = create_test_service();
        let token = service.issue_access_token(UserId::new(77), None).unwrap();

        let identity = service.verify(&token).unwrap();
        assert_eq!(identity.display_name(), "77");
    }

    #[test]
    fn test_missing_credential() {
        let service = create_test_service();
        assert_eq!(service.verify(""), Err(AuthError::Missing));
        assert_eq!(service.verify("   "), Err(AuthError::Missing));
    }

    #[test]
    fn test_malformed_credential() {
        let service = create_test_service();
        assert_eq!(service.verify("invalid.token.here"), Err(AuthError::Malformed));
        assert_eq!(service.verify("not-a-jwt"), Err(AuthError::Malformed));
    }

    #[test]
    fn test_expired_credential() {
        let service = create_test_service();
        // Well past the default validation leeway
        let token = service
            .encode_claims(&claims_for(1, TokenType::Access, -3600))
            .unwrap();

        assert_eq!(service.verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn test_wrong_secret() {
        let service = create_test_service();
        let other = JwtService::new("a-completely-different-secret", 900);
        let token = other.issue_access_token(UserId::new(1), None).unwrap();

        assert_eq!(service.verify(&token), Err(AuthError::InvalidSignature));
    }

    #[test]
    fn test_refresh_token_rejected() {
        let service = create_test_service();
        let token = service
            .encode_claims(&claims_for(1, TokenType::Refresh, 3600))
            .unwrap();

        assert_eq!(service.verify(&token), Err(AuthError::Malformed));
    }

    #[test]
    fn test_user_id_claim_accepts_string_or_number() {
        let from_number: Claims = serde_json::from_str(
            r#"{"user_id": 5, "token_type": "access", "iat": 0, "exp": 1}"#,
        )
        .unwrap();
        let from_string: Claims = serde_json::from_str(
            r#"{"user_id": "5", "token_type": "access", "iat": 0, "exp": 1, "jti": "abc"}"#,
        )
        .unwrap();

        assert_eq!(from_number.user_id, UserId::new(5));
        assert_eq!(from_string.user_id, UserId::new(5));
        assert_eq!(from_string.jti.as_deref(), Some("abc"));
    }
}
