use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identity claim carried by a session token. Shared between the REST
/// middleware and the gateway handshake so both surfaces decode the
/// exact same thing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

#[derive(Debug, Error)]
pub enum TokenError {
    /// Missing, malformed, tampered, or expired — deliberately one kind.
    #[error("invalid token")]
    Invalid,

    #[error("token encoding failed: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

/// HS256 signing keys, built once at startup from the process-wide
/// secret and passed to the components that need them.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a signed, stateless token for the given identity.
    /// Tokens expire after 30 days; there is no revocation.
    pub fn issue(&self, user_id: Uuid, username: &str) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(TokenError::Encode)
    }

    /// Validate signature and expiry, decode the claim.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_verify_roundtrip() {
        let keys = TokenKeys::new("test-secret");
        let user_id = Uuid::new_v4();

        let token = keys.issue(user_id, "alice").unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn tampered_token_rejected() {
        let keys = TokenKeys::new("test-secret");
        let token = keys.issue(Uuid::new_v4(), "alice").unwrap();

        // Flip a character in the payload segment
        let mut chars: Vec<char> = token.chars().collect();
        let mid = token.len() / 2;
        chars[mid] = if chars[mid] == 'a' { 'b' } else { 'a' };
        let tampered: String = chars.into_iter().collect();

        assert!(matches!(keys.verify(&tampered), Err(TokenError::Invalid)));
    }

    #[test]
    fn wrong_secret_rejected() {
        let keys = TokenKeys::new("secret-one");
        let other = TokenKeys::new("secret-two");

        let token = keys.issue(Uuid::new_v4(), "alice").unwrap();
        assert!(matches!(other.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn garbage_rejected() {
        let keys = TokenKeys::new("test-secret");
        assert!(matches!(keys.verify("not-a-token"), Err(TokenError::Invalid)));
        assert!(matches!(keys.verify(""), Err(TokenError::Invalid)));
    }
}
