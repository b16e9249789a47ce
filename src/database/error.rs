use serde_json::{json, Map, Value};
use thiserror::Error;
use warp::http::StatusCode;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("{field}: {message}")]
    Conflict { field: String, message: String },

    #[error("Unable to authenticate with provided credentials")]
    InvalidCredentials,

    #[error("JSON parse error - {0}")]
    MalformedPayload(String),

    #[error("Authentication credentials were not provided.")]
    Unauthenticated,

    #[error("Invalid token.")]
    InvalidToken,

    #[error("Not found.")]
    NotFound,

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(u64),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_owned(),
            message: message.to_owned(),
        }
    }

    pub fn conflict(field: &str, message: &str) -> Self {
        Self::Conflict {
            field: field.to_owned(),
            message: message.to_owned(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::Validation { .. }
            | Error::Conflict { .. }
            | Error::InvalidCredentials
            | Error::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Error::Unauthenticated | Error::InvalidToken => StatusCode::UNAUTHORIZED,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Query(_) | Error::Internal(_) | Error::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Response body. Server-side failures are reported without their details.
    pub fn body(&self) -> Value {
        match self {
            Error::Validation { field, message } | Error::Conflict { field, message } => {
                let mut body = Map::new();
                body.insert(field.to_owned(), json!([message]));
                Value::Object(body)
            }
            Error::InvalidCredentials => json!({ "non_field_errors": [self.to_string()] }),
            Error::Query(_) | Error::Internal(_) | Error::Configuration(_) => {
                json!({ "detail": "A server error occurred." })
            }
            _ => json!({ "detail": self.to_string() }),
        }
    }
}

impl warp::reject::Reject for Error {}

/// Storage failures. Unique violations carry the offending field so they can
/// be reported against it; everything else is an opaque query error.
pub struct QueryError {
    info: String,
    unique_violation: bool,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            unique_violation: false,
        }
    }

    /// Maps a unique violation onto `field`, leaving other failures as they are.
    pub fn on_conflict(self, field: &str, message: &str) -> Error {
        if self.unique_violation {
            Error::conflict(field, message)
        } else {
            self.into()
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => Self {
                unique_violation: e.is_unique_violation(),
                info: format!("{e}"),
            },
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(format!("Unknown error")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        log::error!("> Query failed: {}", value.info);
        Error::Query(value.info)
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        QueryError::from(value).into()
    }
}
