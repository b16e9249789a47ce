use std::{convert::Infallible, sync::Arc};

use serde::de::DeserializeOwned;
use warp::{hyper::body::Bytes, reject::Rejection, Filter};

use super::jwt::SessionData;
use crate::{
    actions::get_user_by_id, constants::MAX_JSON_BYTES, error::Error, form::parse_json,
    state::Context,
};

const BEARER: &str = "bearer";

pub fn with_context(
    ctx: Arc<Context>,
) -> impl Filter<Extract = (Arc<Context>,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Resolves the `Authorization: Bearer <token>` header to the active user it
/// was issued for.
pub fn with_session(
    ctx: Arc<Context>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let ctx = ctx.clone();
        async move {
            authenticate(header.as_deref(), &ctx)
                .await
                .map_err(Rejection::from)
        }
    })
}

pub async fn authenticate(header: Option<&str>, ctx: &Context) -> Result<SessionData, Error> {
    let token = bearer_token(header.ok_or(Error::Unauthenticated)?)?;
    let claims = ctx.keys.verify_jwt_session(token)?;

    match get_user_by_id(&ctx.pool, claims.user_id).await? {
        Some(user) if user.is_active => Ok(SessionData::from(&user)),
        _ => {
            log::trace!("> Token for unknown or inactive user {}", claims.user_id);
            Err(Error::InvalidToken)
        }
    }
}

/// A header naming some other scheme counts as no credentials at all.
fn bearer_token(header: &str) -> Result<&str, Error> {
    let mut parts = header.split_whitespace();

    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case(BEARER) => Ok(token),
        (Some(scheme), _, _) if scheme.eq_ignore_ascii_case(BEARER) => Err(Error::InvalidToken),
        _ => Err(Error::Unauthenticated),
    }
}

/// Reads the whole body as JSON into `T`. Oversized bodies are refused before
/// they are buffered.
pub fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send + 'static,
{
    warp::body::content_length_limit(MAX_JSON_BYTES as u64)
        .and(warp::body::bytes())
        .and_then(|body: Bytes| async move { parse_json::<T>(&body).map_err(Rejection::from) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer_token("Bearer abc").unwrap(), "abc");
        assert_eq!(bearer_token("bearer abc").unwrap(), "abc");
    }

    #[test]
    fn malformed_bearer_header_is_an_invalid_token() {
        assert!(matches!(bearer_token("Bearer"), Err(Error::InvalidToken)));
        assert!(matches!(bearer_token("Bearer a b"), Err(Error::InvalidToken)));
    }

    #[test]
    fn other_schemes_are_unauthenticated() {
        assert!(matches!(
            bearer_token("Basic dXNlcjpwYXNz"),
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(bearer_token(""), Err(Error::Unauthenticated)));
    }
}
