use crate::{
    authentication::cryptography::{verify_password, Hasher},
    error::{Error, QueryError},
    form::{normalize_email, Credentials, NewUser, UserChanges},
    jwt::{SessionData, SessionKeys},
    schema::{User, Uuid},
};

use sqlx::{Pool, Sqlite};

const EMAIL_TAKEN: &str = "user with this email already exists.";

pub async fn get_user(pool: &Pool<Sqlite>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Sqlite>, user_id: Uuid) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

async fn hash(hasher: &Hasher, password: String) -> Result<String, Error> {
    let hasher = hasher.clone();

    tokio::task::spawn_blocking(move || hasher.hash_password(&password))
        .await
        .map_err(|e| Error::Internal(format!("Password hashing task failed: {e}")))?
}

async fn verify(password: String, password_hash: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| Error::Internal(format!("Password verification task failed: {e}")))?
}

async fn insert_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password_hash: &str,
    name: &str,
    is_staff: bool,
    is_superuser: bool,
) -> Result<User, Error> {
    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, password, name, is_staff, is_superuser)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
    ",
    )
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .bind(is_staff)
    .bind(is_superuser)
    .fetch_one(pool)
    .await
    .map_err(|e| QueryError::from(e).on_conflict("email", EMAIL_TAKEN))?;

    log::info!("Created user {} ({})", user.id, user.email);
    Ok(user)
}

/// Stores a new account with a hashed password.
/// The email is lowercased; an empty one is rejected. The password is stored
/// as given, length rules belong to the API payload.
pub async fn create_user(
    pool: &Pool<Sqlite>,
    hasher: &Hasher,
    email: &str,
    password: &str,
    name: &str,
) -> Result<User, Error> {
    let email = normalize_email(email)?;
    let password_hash = hash(hasher, password.to_owned()).await?;

    insert_user(pool, &email, &password_hash, name, false, false).await
}

pub async fn create_superuser(
    pool: &Pool<Sqlite>,
    hasher: &Hasher,
    email: &str,
    password: &str,
) -> Result<User, Error> {
    let email = normalize_email(email)?;
    let password_hash = hash(hasher, password.to_owned()).await?;

    insert_user(pool, &email, &password_hash, "", true, true).await
}

/// Account creation from a validated registration payload.
pub async fn register_user(
    user: NewUser,
    pool: &Pool<Sqlite>,
    hasher: &Hasher,
) -> Result<User, Error> {
    create_user(pool, hasher, &user.email, &user.password, &user.name).await
}

pub async fn set_user_active(
    pool: &Pool<Sqlite>,
    email: &str,
    active: bool,
) -> Result<User, Error> {
    let email = normalize_email(email)?;

    let user: Option<User> =
        sqlx::query_as("UPDATE users SET is_active = ? WHERE email = ? RETURNING *")
            .bind(active)
            .bind(email)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    user.ok_or(Error::NotFound)
}

/// Exchanges credentials for a bearer token. Unknown emails, inactive
/// accounts and wrong passwords all fail the same way, and take as long.
pub async fn login_user(
    credentials: Credentials,
    pool: &Pool<Sqlite>,
    keys: &SessionKeys,
    hasher: &Hasher,
) -> Result<String, Error> {
    let user = match get_user(pool, &credentials.email).await? {
        Some(user) if user.is_active => user,
        _ => {
            verify(credentials.password, hasher.dummy_hash().to_owned()).await?;
            return Err(Error::InvalidCredentials);
        }
    };

    let authenticated = verify(credentials.password, user.password.to_owned()).await?;
    if !authenticated {
        log::trace!("> Wrong password for user {}", user.id);
        return Err(Error::InvalidCredentials);
    }

    keys.generate_jwt_session(&user)
}

pub async fn update_user(
    session: &SessionData,
    changes: UserChanges,
    pool: &Pool<Sqlite>,
    hasher: &Hasher,
) -> Result<User, Error> {
    let user = get_user_by_id(pool, session.user_id)
        .await?
        .ok_or(Error::NotFound)?;

    let password = match changes.password {
        Some(password) => hash(hasher, password).await?,
        None => user.password,
    };

    let user: User =
        sqlx::query_as("UPDATE users SET email = ?, name = ?, password = ? WHERE id = ? RETURNING *")
            .bind(changes.email.unwrap_or(user.email))
            .bind(changes.name.unwrap_or(user.name))
            .bind(password)
            .bind(user.id)
            .fetch_one(pool)
            .await
            .map_err(|e| QueryError::from(e).on_conflict("email", EMAIL_TAKEN))?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{connect, migrate};
    use chrono::Duration;

    async fn pool() -> Pool<Sqlite> {
        let pool = connect("sqlite::memory:").await.unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    fn hasher() -> Hasher {
        Hasher::new(8, 1).unwrap()
    }

    fn keys() -> SessionKeys {
        SessionKeys::new(b"secret", Duration::hours(1)).unwrap()
    }

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_owned(),
            password: password.to_owned(),
        }
    }

    #[tokio::test]
    async fn create_user_with_email_successful() {
        let pool = pool().await;
        let user = create_user(&pool, &hasher(), "test@appdev.com", "Test123", "")
            .await
            .unwrap();

        assert_eq!(user.email, "test@appdev.com");
        assert!(verify_password("Test123", &user.password).unwrap());
        assert!(user.is_active);
        assert!(!user.is_staff);
    }

    #[tokio::test]
    async fn new_user_email_normalized() {
        let pool = pool().await;
        let user = create_user(&pool, &hasher(), "A@B.COM", "test123", "")
            .await
            .unwrap();

        assert_eq!(user.email, "a@b.com");
        assert!(get_user(&pool, "a@b.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn new_user_empty_email_fails() {
        let pool = pool().await;
        let result = create_user(&pool, &hasher(), "", "test123", "").await;

        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let pool = pool().await;
        create_user(&pool, &hasher(), "test@appdev.com", "test123", "")
            .await
            .unwrap();

        let result = create_user(&pool, &hasher(), "TEST@appdev.com", "test123", "").await;
        assert!(matches!(result, Err(Error::Conflict { .. })));
    }

    #[tokio::test]
    async fn create_new_superuser() {
        let pool = pool().await;
        let user = create_superuser(&pool, &hasher(), "test@appdev.com", "test123")
            .await
            .unwrap();

        assert!(user.is_superuser);
        assert!(user.is_staff);
    }

    #[tokio::test]
    async fn login_requires_matching_active_user() {
        let pool = pool().await;
        let keys = keys();
        let hasher = hasher();
        create_user(&pool, &hasher, "test@appdev.com", "test123", "")
            .await
            .unwrap();

        let token = login_user(credentials("test@appdev.com", "test123"), &pool, &keys, &hasher)
            .await
            .unwrap();
        assert!(keys.verify_jwt_session(&token).is_ok());

        let wrong = login_user(credentials("test@appdev.com", "wrong"), &pool, &keys, &hasher).await;
        assert!(matches!(wrong, Err(Error::InvalidCredentials)));

        let missing = login_user(credentials("nobody@appdev.com", "test123"), &pool, &keys, &hasher).await;
        assert!(matches!(missing, Err(Error::InvalidCredentials)));

        set_user_active(&pool, "test@appdev.com", false).await.unwrap();
        let inactive = login_user(credentials("test@appdev.com", "test123"), &pool, &keys, &hasher).await;
        assert!(matches!(inactive, Err(Error::InvalidCredentials)));
    }

    #[tokio::test]
    async fn update_rehashes_password() {
        let pool = pool().await;
        let user = create_user(&pool, &hasher(), "test@appdev.com", "test123", "old")
            .await
            .unwrap();
        let session = SessionData::from(&user);

        let changes = UserChanges {
            email: None,
            password: Some(String::from("newpassword")),
            name: Some(String::from("new")),
        };
        let updated = update_user(&session, changes, &pool, &hasher()).await.unwrap();

        assert_eq!(updated.name, "new");
        assert_eq!(updated.email, "test@appdev.com");
        assert!(verify_password("newpassword", &updated.password).unwrap());
        assert!(!verify_password("test123", &updated.password).unwrap());
    }
}
