use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::TokenSettings;
use crate::error::AppError;

/// The purpose a token was issued for. A token is only accepted for its own kind.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Reset,
    Verification,
}

/// Represents the claims encoded within a JWT (JSON Web Token).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id for access and refresh tokens, email address for reset and verification tokens.
    pub sub: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

/// Signs and verifies HS256 tokens with a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    settings: TokenSettings,
}

impl TokenCodec {
    pub fn new(settings: &TokenSettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            settings: settings.clone(),
        }
    }

    pub fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.settings.access_ttl,
            TokenKind::Refresh => self.settings.refresh_ttl,
            TokenKind::Reset => self.settings.reset_ttl,
            TokenKind::Verification => self.settings.verification_ttl,
        }
    }

    pub fn issue(&self, subject: &str, kind: TokenKind) -> Result<String, AppError> {
        self.issue_at(subject, kind, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        subject: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = Claims {
            sub: subject.to_string(),
            kind,
            iat: now.timestamp(),
            exp: (now + self.ttl(kind)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
    }

    /// Verifies `token` and returns its subject.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<String, AppError> {
        self.verify_at(token, expected, Utc::now())
    }

    /// Verifies `token` as if the current time were `now`.
    ///
    /// Fails with `AppError::InvalidToken` when the token is malformed, its signature
    /// does not match, it is at or past its expiry, it was issued for another kind,
    /// or it carries an empty subject.
    pub fn verify_at(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against `now` below.
        validation.validate_exp = false;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::InvalidToken(format!("Could not validate credentials: {}", e)))?;

        if now.timestamp() >= claims.exp {
            return Err(AppError::InvalidToken("Token has expired".into()));
        }
        if claims.kind != expected {
            return Err(AppError::InvalidToken("Invalid token type".into()));
        }
        if claims.sub.is_empty() {
            return Err(AppError::InvalidToken("Token has no subject".into()));
        }

        Ok(claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(&TokenSettings::with_secret("test_secret_for_tokens"))
    }

    #[test]
    fn test_token_generation_and_verification() {
        let codec = codec();
        let token = codec.issue("user-1", TokenKind::Access).unwrap();
        assert_eq!(codec.verify(&token, TokenKind::Access).unwrap(), "user-1");
    }

    #[test]
    fn test_access_token_expiry_boundary() {
        let codec = codec();
        let issued = Utc::now();
        let token = codec.issue_at("user-1", TokenKind::Access, issued).unwrap();

        assert!(codec
            .verify_at(&token, TokenKind::Access, issued + Duration::minutes(14))
            .is_ok());
        assert!(matches!(
            codec.verify_at(&token, TokenKind::Access, issued + Duration::minutes(15)),
            Err(AppError::InvalidToken(_))
        ));
        assert!(matches!(
            codec.verify_at(&token, TokenKind::Access, issued + Duration::minutes(16)),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_kind_confusion_is_rejected() {
        let codec = codec();
        let kinds = [
            TokenKind::Access,
            TokenKind::Refresh,
            TokenKind::Reset,
            TokenKind::Verification,
        ];

        for issued_as in kinds {
            let token = codec.issue("subject", issued_as).unwrap();
            for expected in kinds {
                let result = codec.verify(&token, expected);
                if issued_as == expected {
                    assert!(result.is_ok(), "{:?} should verify", issued_as);
                } else {
                    assert!(
                        matches!(result, Err(AppError::InvalidToken(_))),
                        "{:?} accepted as {:?}",
                        issued_as,
                        expected
                    );
                }
            }
        }
    }

    #[test]
    fn test_invalid_token_signature() {
        let token = codec().issue("user-1", TokenKind::Access).unwrap();
        let other = TokenCodec::new(&TokenSettings::with_secret("a_completely_different_secret"));

        assert!(matches!(
            other.verify(&token, TokenKind::Access),
            Err(AppError::InvalidToken(_))
        ));
        assert!(matches!(
            codec().verify("not-a-jwt", TokenKind::Access),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_empty_subject_is_rejected() {
        let codec = codec();
        let token = codec.issue("", TokenKind::Reset).unwrap();
        assert!(matches!(
            codec.verify(&token, TokenKind::Reset),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_claims_carry_kind_tag() {
        let codec = codec();
        let now = Utc::now();
        let token = codec.issue_at("a@example.com", TokenKind::Verification, now).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let claims = decode::<serde_json::Value>(
            &token,
            &DecodingKey::from_secret(b"test_secret_for_tokens"),
            &validation,
        )
        .unwrap()
        .claims;

        assert_eq!(claims["type"], "verification");
        assert_eq!(claims["sub"], "a@example.com");
        assert_eq!(claims["iat"], now.timestamp());
        assert_eq!(claims["exp"], (now + Duration::hours(24)).timestamp());
    }
}
