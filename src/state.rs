use std::{path::PathBuf, sync::Arc};

use chrono::Duration;
use sqlx::{Pool, Sqlite};

use crate::{
    config::Config,
    cryptography::Hasher,
    error::Error,
    jwt::SessionKeys,
    pool::{connect, migrate},
};

/// Everything a request handler needs. Built once, shared read-only.
pub struct Context {
    pub pool: Pool<Sqlite>,
    pub keys: SessionKeys,
    pub hasher: Hasher,
    pub media_root: PathBuf,
    pub max_upload_bytes: u64,
}

impl Context {
    pub async fn new(config: &Config) -> Result<Arc<Self>, Error> {
        let pool = connect(&config.database_url).await?;
        migrate(&pool).await?;

        Self::with_pool(pool, config)
    }

    pub fn with_pool(pool: Pool<Sqlite>, config: &Config) -> Result<Arc<Self>, Error> {
        let keys = SessionKeys::new(
            config.token_secret.as_bytes(),
            Duration::hours(config.token_lifetime_hours),
        )?;
        let hasher = Hasher::new(config.password_memory_kib, config.password_iterations)?;

        Ok(Arc::new(Self {
            pool,
            keys,
            hasher,
            media_root: config.media_root.to_owned(),
            max_upload_bytes: config.max_upload_bytes,
        }))
    }
}
