use std::{env, fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use rand::{distributions::Alphanumeric, Rng};

use crate::error::Error;

pub struct Config {
    pub address: SocketAddr,
    pub database_url: String,
    pub token_secret: String,
    pub token_lifetime_hours: i64,
    pub media_root: PathBuf,
    pub max_upload_bytes: u64,
    pub password_memory_kib: u32,
    pub password_iterations: u32,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        Ok(Self {
            address: try_load("RECIPE_API_ADDR", "0.0.0.0:8000")?,
            database_url: try_load("DATABASE_URL", "sqlite://recipes.db")?,
            token_secret: var("TOKEN_SECRET").unwrap_or_else(|_| {
                log::warn!("TOKEN_SECRET not set, issued tokens will not survive a restart");
                random_secret()
            }),
            token_lifetime_hours: try_load("TOKEN_LIFETIME_HOURS", "24")?,
            media_root: try_load("MEDIA_ROOT", "./media")?,
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", "5242880")?,
            password_memory_kib: try_load("PASSWORD_MEMORY_KIB", "19456")?,
            password_iterations: try_load("PASSWORD_ITERATIONS", "2")?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([0, 0, 0, 0], 8000)),
            database_url: String::from("sqlite://recipes.db"),
            token_secret: random_secret(),
            token_lifetime_hours: 24,
            media_root: PathBuf::from("./media"),
            max_upload_bytes: 5 * 1024 * 1024,
            password_memory_kib: 19456,
            password_iterations: 2,
        }
    }
}

fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        log::debug!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, Error>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            log::warn!("Invalid {key} value: {e}");
            Error::Configuration(format!("Invalid {key} value: {e}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variable_falls_back_to_default() {
        let port: u16 = try_load("RECIPE_API_TEST_UNSET_PORT", "1111").unwrap();

        assert_eq!(port, 1111);
    }

    #[test]
    fn unparsable_value_is_a_configuration_error() {
        let result: Result<u16, Error> = try_load("RECIPE_API_TEST_UNSET_PORT", "not-a-port");

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn generated_secrets_differ() {
        let secret = random_secret();

        assert_eq!(secret.len(), 64);
        assert_ne!(secret, random_secret());
    }
}
