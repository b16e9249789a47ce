use std::str::FromStr;

use sqlx::{
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Executor, Pool, Sqlite,
};

use super::error::{Error, QueryError};

const POOL_SIZE: u32 = 8;

/// Opens the store at `url`, creating the file if needed.
///
/// An in-memory database lives only as long as its connection, so those get a
/// single connection that is never recycled.
pub async fn connect(url: &str) -> Result<Pool<Sqlite>, Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = if url.contains(":memory:") || url.contains("mode=memory") {
        pool_options()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        pool_options()
            .max_connections(POOL_SIZE)
            .connect_with(options)
            .await?
    };

    Ok(pool)
}

fn pool_options() -> SqlitePoolOptions {
    // A write abandoned mid-request comes back with its transaction still open.
    SqlitePoolOptions::new().after_release(|conn, _| {
        Box::pin(async move {
            if conn.execute("ROLLBACK").await.is_ok() {
                log::warn!("Rolled back a write left open on a released connection");
            }
            Ok(true)
        })
    })
}

/// Starts a write transaction holding the store's write lock from the first
/// statement, so concurrent writers queue on the busy timeout instead of
/// failing when they go from reading to writing.
pub async fn begin_write(pool: &Pool<Sqlite>) -> Result<PoolConnection<Sqlite>, Error> {
    let mut conn = pool.acquire().await.map_err(QueryError::from)?;
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *conn)
        .await
        .map_err(|_| QueryError::new("Could not start transaction".to_owned()))?;

    Ok(conn)
}

/// Commits a transaction from [`begin_write`] if `result` is a success and
/// rolls it back otherwise.
pub async fn finish_write<T>(
    mut conn: PoolConnection<Sqlite>,
    result: Result<T, Error>,
) -> Result<T, Error> {
    match result {
        Ok(value) => {
            sqlx::query("COMMIT")
                .execute(&mut *conn)
                .await
                .map_err(|_| QueryError::new("Could not commit transaction".to_owned()))?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                log::error!("> Rollback failed: {rollback}");
            }
            Err(e)
        }
    }
}

pub async fn migrate(pool: &Pool<Sqlite>) -> Result<(), Error> {
    sqlx::migrate!()
        .run(pool)
        .await
        .map_err(|e| Error::Internal(format!("Migration failed: {e}")))?;

    log::info!("Database schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_keeps_its_schema() {
        let pool = connect("sqlite::memory:").await.unwrap();
        migrate(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' AND name NOT LIKE 'sqlite%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let tables: Vec<String> = tables.into_iter().map(|t| t.0).collect();

        assert_eq!(
            tables,
            [
                "ingredients",
                "recipe_ingredients",
                "recipe_tags",
                "recipes",
                "tags",
                "users"
            ]
        );
    }

    #[tokio::test]
    async fn failed_write_is_rolled_back() {
        let pool = connect("sqlite::memory:").await.unwrap();
        migrate(&pool).await.unwrap();

        let mut conn = begin_write(&pool).await.unwrap();
        sqlx::query("INSERT INTO users (email, password) VALUES ('a@b.com', 'x')")
            .execute(&mut *conn)
            .await
            .unwrap();
        let result = finish_write::<()>(conn, Err(Error::NotFound)).await;
        assert!(matches!(result, Err(Error::NotFound)));

        let users: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users.0, 0);
    }

    #[tokio::test]
    async fn abandoned_write_does_not_block_the_next() {
        let pool = connect("sqlite::memory:").await.unwrap();
        migrate(&pool).await.unwrap();

        let mut conn = begin_write(&pool).await.unwrap();
        sqlx::query("INSERT INTO users (email, password) VALUES ('a@b.com', 'x')")
            .execute(&mut *conn)
            .await
            .unwrap();
        drop(conn);

        let conn = begin_write(&pool).await.unwrap();
        finish_write(conn, Ok(())).await.unwrap();

        let users: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(users.0, 0);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect("sqlite::memory:").await.unwrap();

        migrate(&pool).await.unwrap();
        migrate(&pool).await.unwrap();
    }
}
