//! HS256 JSON Web Tokens.
//!
//! Tokens are `base64url(header).base64url(claims).base64url(signature)` with
//! an HMAC-SHA256 signature over the first two segments. Only `HS256` is
//! accepted. Every token carries a `kind` claim, so a refresh token is never
//! accepted where an access token is expected and vice versa.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use basket_core::{Email, UserId};

use crate::models::CurrentUser;

type HmacSha256 = Hmac<Sha256>;

/// Errors that can occur when issuing or verifying a token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Not three base64url segments of JSON.
    #[error("token is malformed")]
    Malformed,

    /// Header names an algorithm other than HS256.
    #[error("token algorithm is not supported")]
    UnsupportedAlgorithm,

    /// Signature does not match.
    #[error("token signature is invalid")]
    BadSignature,

    /// `exp` is in the past.
    #[error("token has expired")]
    Expired,

    /// A refresh token was presented as an access token or the reverse.
    #[error("expected {expected} token, got {actual} token")]
    WrongKind { expected: TokenKind, actual: TokenKind },

    /// Claims could not be encoded or the key was rejected.
    #[error("token could not be signed")]
    Signing,
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        })
    }
}

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub kind: TokenKind,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub uid: String,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub kind: TokenKind,
    pub uid: String,
    pub iat: i64,
    pub exp: i64,
}

trait Claims: DeserializeOwned {
    const KIND: TokenKind;

    fn kind(&self) -> TokenKind;
    fn exp(&self) -> i64;
}

impl Claims for AccessClaims {
    const KIND: TokenKind = TokenKind::Access;

    fn kind(&self) -> TokenKind {
        self.kind
    }

    fn exp(&self) -> i64 {
        self.exp
    }
}

impl Claims for RefreshClaims {
    const KIND: TokenKind = TokenKind::Refresh;

    fn kind(&self) -> TokenKind {
        self.kind
    }

    fn exp(&self) -> i64 {
        self.exp
    }
}

impl AccessClaims {
    /// Identity carried by these claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Malformed` if the `uid` or `email` claim does not
    /// parse.
    pub fn current_user(&self) -> Result<CurrentUser, TokenError> {
        Ok(CurrentUser {
            id: UserId::parse(&self.uid).map_err(|_| TokenError::Malformed)?,
            email: Email::parse(&self.email).map_err(|_| TokenError::Malformed)?,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        })
    }
}

/// An access token and its refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

/// Signs and verifies tokens with a shared secret.
pub struct TokenIssuer {
    secret: SecretString,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer.
    #[must_use]
    pub const fn new(secret: SecretString, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            secret,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Issue an access token and a refresh token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if the claims cannot be encoded.
    pub fn issue(&self, user: &CurrentUser, now: DateTime<Utc>) -> Result<TokenPair, TokenError> {
        let iat = now.timestamp();
        let access = AccessClaims {
            kind: TokenKind::Access,
            email: user.email.to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            uid: user.id.to_string(),
            iat,
            exp: (now + self.access_ttl).timestamp(),
        };
        let refresh = RefreshClaims {
            kind: TokenKind::Refresh,
            uid: user.id.to_string(),
            iat,
            exp: (now + self.refresh_ttl).timestamp(),
        };

        Ok(TokenPair {
            token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
        })
    }

    /// Verify an access token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns a `TokenError` describing why the token was rejected.
    pub fn verify_access(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, TokenError> {
        self.verify(token, now)
    }

    /// Verify a refresh token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns a `TokenError` describing why the token was rejected.
    pub fn verify_refresh(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshClaims, TokenError> {
        self.verify(token, now)
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::Signing)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        let header = Header {
            alg: "HS256".to_owned(),
            typ: "JWT".to_owned(),
        };
        let header = serde_json::to_vec(&header).map_err(|_| TokenError::Signing)?;
        let claims = serde_json::to_vec(claims).map_err(|_| TokenError::Signing)?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }

    fn verify<T: Claims>(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<T, TokenError> {
        let token = token.trim();
        let Some((signing_input, signature)) = token.rsplit_once('.') else {
            return Err(TokenError::Malformed);
        };
        let Some((header, claims)) = signing_input.split_once('.') else {
            return Err(TokenError::Malformed);
        };
        if claims.contains('.') {
            return Err(TokenError::Malformed);
        }

        let header: Header = decode_segment(header)?;
        if header.alg != "HS256" {
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: T = decode_segment(claims)?;
        if claims.kind() != T::KIND {
            return Err(TokenError::WrongKind {
                expected: T::KIND,
                actual: claims.kind(),
            });
        }
        if claims.exp() <= now.timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            SecretString::from("k9#Vq2!mZ7@xR4$wT8^pL1&nB6*cY3(e".to_owned()),
            Duration::hours(24),
            Duration::hours(168),
        )
    }

    fn user() -> CurrentUser {
        CurrentUser {
            id: UserId::generate(),
            email: Email::parse("jo@example.com").unwrap(),
            first_name: "Jo".to_owned(),
            last_name: "March".to_owned(),
        }
    }

    #[test]
    fn test_issue_then_verify_access() {
        let issuer = issuer();
        let user = user();
        let now = Utc::now();

        let pair = issuer.issue(&user, now).unwrap();
        let claims = issuer.verify_access(&pair.token, now).unwrap();

        assert_eq!(claims.current_user().unwrap(), user);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_refresh_token_outlives_access_token() {
        let issuer = issuer();
        let now = Utc::now();
        let pair = issuer.issue(&user(), now).unwrap();

        let later = now + Duration::hours(48);
        assert_eq!(
            issuer.verify_access(&pair.token, later),
            Err(TokenError::Expired)
        );
        assert!(issuer.verify_refresh(&pair.refresh_token, later).is_ok());
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let issuer = issuer();
        let now = Utc::now();
        let pair = issuer.issue(&user(), now).unwrap();

        assert_eq!(
            issuer.verify_refresh(&pair.token, now),
            Err(TokenError::WrongKind {
                expected: TokenKind::Refresh,
                actual: TokenKind::Access,
            })
        );
        assert_eq!(
            issuer.verify_access(&pair.refresh_token, now),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let issuer = issuer();
        let now = Utc::now();
        let pair = issuer.issue(&user(), now).unwrap();

        let mut parts: Vec<&str> = pair.token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&AccessClaims {
                kind: TokenKind::Access,
                email: "admin@example.com".to_owned(),
                first_name: "A".to_owned(),
                last_name: "B".to_owned(),
                uid: UserId::generate().to_string(),
                iat: now.timestamp(),
                exp: now.timestamp() + 60,
            })
            .unwrap(),
        );
        parts[1] = &forged;
        let tampered = parts.join(".");

        assert_eq!(
            issuer.verify_access(&tampered, now),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_other_secret_rejected() {
        let now = Utc::now();
        let pair = issuer().issue(&user(), now).unwrap();
        let other = TokenIssuer::new(
            SecretString::from("a-completely-different-secret-value-42!".to_owned()),
            Duration::hours(1),
            Duration::hours(1),
        );

        assert_eq!(
            other.verify_access(&pair.token, now),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let issuer = issuer();
        let now = Utc::now();
        assert_eq!(issuer.verify_access("", now), Err(TokenError::Malformed));
        assert_eq!(
            issuer.verify_access("a.b", now),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            issuer.verify_access("a.b.c.d", now),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_none_algorithm_rejected() {
        let issuer = issuer();
        let now = Utc::now();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(br#"{"uid":"x","iat":0,"exp":9999999999}"#);

        assert_eq!(
            issuer.verify_refresh(&format!("{header}.{claims}."), now),
            Err(TokenError::UnsupportedAlgorithm)
        );
    }
}
