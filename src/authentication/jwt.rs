use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::error::Error;
use crate::schema::{User, Uuid};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, lifetime: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + lifetime).timestamp();

        Self {
            user_id: id,
            iat,
            exp,
        }
    }
}

/// Identity of the caller, resolved from a verified token and a live user row.
/// Every owner-scoped action takes one of these explicitly.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Uuid,
}

impl From<&User> for SessionData {
    fn from(user: &User) -> Self {
        SessionData {
            user_id: user.id,
        }
    }
}

/// Signing key and lifetime for bearer tokens.
#[derive(Clone)]
pub struct SessionKeys {
    key: Hmac<Sha256>,
    lifetime: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], lifetime: Duration) -> Result<Self, Error> {
        let key = Hmac::<Sha256>::new_from_slice(secret)
            .map_err(|e| Error::Internal(format!("Invalid token secret: {e}")))?;

        Ok(Self { key, lifetime })
    }

    pub fn generate_jwt_session(&self, user: &User) -> Result<String, Error> {
        let claims = JwtSessionData::new(user.id, self.lifetime);

        claims
            .sign_with_key(&self.key)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {e}")))
    }

    pub fn verify_jwt_session(&self, token: &str) -> Result<JwtSessionData, Error> {
        let session: JwtSessionData = token.verify_with_key(&self.key).map_err(|e| {
            log::trace!("> Rejected token: {e}");
            Error::InvalidToken
        })?;

        let now = Utc::now().timestamp();
        if (session.exp - now).is_negative() {
            log::trace!("> Rejected expired token for user {}", session.user_id);
            return Err(Error::InvalidToken);
        }

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 7,
            email: String::from("test@recipe.com"),
            password: String::new(),
            name: String::from("Test"),
            is_active: true,
            is_staff: false,
            is_superuser: false,
        }
    }

    #[test]
    fn issued_token_verifies() {
        let keys = SessionKeys::new(b"secret", Duration::hours(1)).unwrap();
        let token = keys.generate_jwt_session(&user()).unwrap();

        let session = keys.verify_jwt_session(&token).unwrap();
        assert_eq!(session.user_id, 7);
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let keys = SessionKeys::new(b"secret", Duration::hours(1)).unwrap();
        let other = SessionKeys::new(b"another secret", Duration::hours(1)).unwrap();
        let token = other.generate_jwt_session(&user()).unwrap();

        assert!(matches!(
            keys.verify_jwt_session(&token),
            Err(Error::InvalidToken)
        ));
        assert!(matches!(
            keys.verify_jwt_session("not.a.token"),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = SessionKeys::new(b"secret", Duration::seconds(-60)).unwrap();
        let token = keys.generate_jwt_session(&user()).unwrap();

        assert!(matches!(
            keys.verify_jwt_session(&token),
            Err(Error::InvalidToken)
        ));
    }
}
