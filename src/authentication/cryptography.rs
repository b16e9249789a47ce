use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::error::Error;

const DUMMY_PASSWORD: &str = "recipe-api-dummy-password";

/// Argon2id with configurable cost. Verification reads the cost back out of
/// the stored hash, so changing it never invalidates existing passwords.
#[derive(Clone, Debug)]
pub struct Hasher {
    params: Params,
    dummy_hash: String,
}

impl Hasher {
    pub fn new(memory_kib: u32, iterations: u32) -> Result<Self, Error> {
        let params = Params::new(memory_kib, iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| Error::Internal(format!("Invalid password hashing parameters: {e}")))?;

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash_password(DUMMY_PASSWORD)?;

        Ok(hasher)
    }

    /// A hash at the configured cost that matches no real account. Checking a
    /// password against it costs as much as checking a real one.
    pub fn dummy_hash(&self) -> &str {
        &self.dummy_hash
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash_password(&self, password: &str) -> Result<String, Error> {
        let salt = SaltString::generate(&mut OsRng);

        Ok(self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Internal(format!("Failed to hash password: {e}")))?
            .to_string())
    }
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, Error> {
    let argon2 = Argon2::default();
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| Error::Internal(format!("Stored password hash is unreadable: {e}")))?;

    Ok(argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Hasher {
        Hasher::new(8, 1).unwrap()
    }

    #[test]
    fn hashed_password_verifies() {
        let hash = hasher().hash_password("testpass").unwrap();

        assert_ne!(hash, "testpass");
        assert!(verify_password("testpass", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let hasher = hasher();

        assert_ne!(
            hasher.hash_password("testpass").unwrap(),
            hasher.hash_password("testpass").unwrap()
        );
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_password("testpass", "not-a-hash").is_err());
    }

    #[test]
    fn dummy_hash_uses_configured_cost() {
        let hasher = Hasher::new(16, 2).unwrap();
        let parsed = PasswordHash::new(hasher.dummy_hash()).unwrap();

        assert_eq!(parsed.params.get_decimal("m"), Some(16));
        assert_eq!(parsed.params.get_decimal("t"), Some(2));
        assert!(!verify_password("testpass", hasher.dummy_hash()).unwrap());
    }

    #[test]
    fn invalid_cost_is_rejected() {
        assert!(Hasher::new(1, 1).is_err());
    }
}
