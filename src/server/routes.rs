use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use serde_json::{json, Value};
use warp::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    reject::{InvalidHeader, LengthRequired, MethodNotAllowed, PayloadTooLarge, Rejection},
    reply::{self, Reply},
    Filter,
};

use super::handlers;
use crate::{
    error::Error,
    middleware::{json_body, with_context, with_session},
    schema::{Ingredient, Tag, Uuid},
    state::Context,
};

/// The whole API, with rejections rendered as JSON error bodies.
///
/// Every route matches its path and method before authenticating, so an
/// unknown path stays a 404 and a wrong method a 405 regardless of credentials.
pub fn routes(ctx: Arc<Context>) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path("media").and(warp::get()).and(warp::fs::dir(ctx.media_root.clone()));

    user_routes(ctx.clone())
        .or(attribute_routes(ctx.clone()))
        .or(recipe_routes(ctx))
        .or(media)
        .recover(handle_rejection)
        .with(warp::log("recipe_api"))
}

fn user_routes(ctx: Arc<Context>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let create = warp::path!("users")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(json_body())
        .and_then(handlers::create_user);

    let token = warp::path!("users" / "token")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(json_body())
        .and_then(handlers::create_token);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(handlers::get_me);

    let update_me = warp::path!("users" / "me")
        .and(warp::patch())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and(json_body())
        .and_then(handlers::update_me);

    create.or(token).or(me).or(update_me)
}

fn attribute_routes(
    ctx: Arc<Context>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list_tags = warp::path!("tags")
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(handlers::list_attributes::<Tag>);

    let create_tag = warp::path!("tags")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and(json_body())
        .and_then(handlers::create_attribute::<Tag>);

    let list_ingredients = warp::path!("ingredients")
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(handlers::list_attributes::<Ingredient>);

    let create_ingredient = warp::path!("ingredients")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and(json_body())
        .and_then(handlers::create_attribute::<Ingredient>);

    list_tags
        .or(create_tag)
        .or(list_ingredients)
        .or(create_ingredient)
}

fn recipe_routes(ctx: Arc<Context>) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let max_upload_bytes = ctx.max_upload_bytes;

    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(handlers::list_recipes);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and(json_body())
        .and_then(handlers::create_recipe);

    let detail = warp::path!("recipes" / Uuid)
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(handlers::get_recipe);

    let replace = warp::path!("recipes" / Uuid)
        .and(warp::put())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and(json_body())
        .and_then(handlers::replace_recipe);

    let patch = warp::path!("recipes" / Uuid)
        .and(warp::patch())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and(json_body())
        .and_then(handlers::patch_recipe);

    let delete = warp::path!("recipes" / Uuid)
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(handlers::delete_recipe);

    let image = warp::path!("recipes" / Uuid / "image")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and(warp::header::optional::<String>("content-type"))
        .and(warp::body::content_length_limit(max_upload_bytes))
        .and(warp::body::bytes())
        .and_then(handlers::upload_recipe_image);

    list.or(create)
        .or(detail)
        .or(replace)
        .or(patch)
        .or(delete)
        .or(image)
}

fn detail(message: &str) -> Value {
    json!({ "detail": message })
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(error) = err.find::<Error>() {
        (error.status(), error.body())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, detail("Not found."))
    } else if err.find::<PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, detail("Request body is too large."))
    } else if err.find::<LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, detail("Content-Length header is required."))
    } else if err.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, detail("Method not allowed."))
    } else if let Some(e) = err.find::<InvalidHeader>() {
        (StatusCode::BAD_REQUEST, detail(&e.to_string()))
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            detail("A server error occurred."),
        )
    };

    let mut response = reply::with_status(reply::json(&body), status).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer realm=\"api\""));
    }

    Ok(response)
}

/// Serves `routes` on `address` until Ctrl+C or SIGTERM.
pub async fn serve(ctx: Arc<Context>, address: SocketAddr) -> Result<(), Error> {
    let (bound, server) = warp::serve(routes(ctx))
        .try_bind_with_graceful_shutdown(address, shutdown_signal())
        .map_err(|e| Error::Configuration(format!("Could not bind {address}: {e}")))?;

    log::info!("Listening on {bound}");
    server.await;
    log::info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
