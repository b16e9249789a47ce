use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use warp::{
    http::StatusCode,
    hyper::body::Bytes,
    reject::Rejection,
    reply::{self, Reply},
};

use super::media::{remove_image, store_image};
use crate::{
    actions::{self, Attribute},
    error::Error,
    form::{AttributeForm, CredentialsForm, RecipeForm, UserForm},
    jwt::SessionData,
    schema::{RecipeImage, UserProfile, Uuid},
    state::Context,
};

// Users

pub async fn create_user(ctx: Arc<Context>, form: UserForm) -> Result<impl Reply, Rejection> {
    let user = actions::register_user(form.validate_new()?, &ctx.pool, &ctx.hasher).await?;

    Ok(reply::with_status(
        reply::json(&UserProfile::from(user)),
        StatusCode::CREATED,
    ))
}

pub async fn create_token(
    ctx: Arc<Context>,
    form: CredentialsForm,
) -> Result<impl Reply, Rejection> {
    let token = actions::login_user(form.validate()?, &ctx.pool, &ctx.keys, &ctx.hasher).await?;

    Ok(reply::json(&json!({ "token": token })))
}

pub async fn get_me(session: SessionData, ctx: Arc<Context>) -> Result<impl Reply, Rejection> {
    let user = actions::get_user_by_id(&ctx.pool, session.user_id)
        .await?
        .ok_or(Error::NotFound)?;

    Ok(reply::json(&UserProfile::from(user)))
}

pub async fn update_me(
    session: SessionData,
    ctx: Arc<Context>,
    form: UserForm,
) -> Result<impl Reply, Rejection> {
    let changes = form.validate_changes()?;
    let user = actions::update_user(&session, changes, &ctx.pool, &ctx.hasher).await?;

    Ok(reply::json(&UserProfile::from(user)))
}

// Tags and ingredients

pub async fn list_attributes<T>(
    session: SessionData,
    ctx: Arc<Context>,
) -> Result<impl Reply, Rejection>
where
    T: Attribute + Serialize,
{
    let list = actions::list_attributes::<T>(&session, &ctx.pool).await?;

    Ok(reply::json(&list))
}

pub async fn create_attribute<T>(
    session: SessionData,
    ctx: Arc<Context>,
    form: AttributeForm,
) -> Result<impl Reply, Rejection>
where
    T: Attribute + Serialize,
{
    let name = form.validate()?;
    let record = actions::create_attribute::<T>(&session, &name, &ctx.pool).await?;

    Ok(reply::with_status(reply::json(&record), StatusCode::CREATED))
}

// Recipes

pub async fn list_recipes(session: SessionData, ctx: Arc<Context>) -> Result<impl Reply, Rejection> {
    let list = actions::list_recipes(&session, &ctx.pool).await?;

    Ok(reply::json(&list))
}

pub async fn create_recipe(
    session: SessionData,
    ctx: Arc<Context>,
    form: RecipeForm,
) -> Result<impl Reply, Rejection> {
    let recipe = actions::create_recipe(&session, form.validate_new()?, &ctx.pool).await?;

    Ok(reply::with_status(reply::json(&recipe), StatusCode::CREATED))
}

pub async fn get_recipe(
    id: Uuid,
    session: SessionData,
    ctx: Arc<Context>,
) -> Result<impl Reply, Rejection> {
    let recipe = actions::fetch_recipe_detail(id, &session, &ctx.pool).await?;

    Ok(reply::json(&recipe))
}

pub async fn replace_recipe(
    id: Uuid,
    session: SessionData,
    ctx: Arc<Context>,
    form: RecipeForm,
) -> Result<impl Reply, Rejection> {
    let changes = form.validate_new()?.into();
    let recipe = actions::update_recipe(id, &session, changes, &ctx.pool).await?;

    Ok(reply::json(&recipe))
}

pub async fn patch_recipe(
    id: Uuid,
    session: SessionData,
    ctx: Arc<Context>,
    form: RecipeForm,
) -> Result<impl Reply, Rejection> {
    let changes = form.validate_changes()?;
    let recipe = actions::update_recipe(id, &session, changes, &ctx.pool).await?;

    Ok(reply::json(&recipe))
}

pub async fn delete_recipe(
    id: Uuid,
    session: SessionData,
    ctx: Arc<Context>,
) -> Result<impl Reply, Rejection> {
    let recipe = actions::delete_recipe(id, &session, &ctx.pool).await?;
    if let Some(image) = &recipe.image {
        remove_image(&ctx.media_root, image).await;
    }

    Ok(reply::with_status(reply::reply(), StatusCode::NO_CONTENT))
}

/// Replaces the recipe image with the raw request body. Ownership is checked
/// before anything touches the disk.
pub async fn upload_recipe_image(
    id: Uuid,
    session: SessionData,
    ctx: Arc<Context>,
    content_type: Option<String>,
    body: Bytes,
) -> Result<impl Reply, Rejection> {
    {
        let mut conn = ctx.pool.acquire().await.map_err(Error::from)?;
        actions::get_recipe_mut(id, &session, &mut conn).await?;
    }

    let content_type = content_type.unwrap_or_default();
    let path = store_image(&ctx.media_root, &content_type, &body).await?;

    let (recipe, previous) =
        match actions::update_recipe_image(id, &session, Some(&path), &ctx.pool).await {
            Ok(updated) => updated,
            Err(e) => {
                remove_image(&ctx.media_root, &path).await;
                return Err(e.into());
            }
        };

    if let Some(previous) = previous {
        remove_image(&ctx.media_root, &previous).await;
    }

    Ok(reply::json(&RecipeImage {
        id: recipe.id,
        image: recipe.image,
    }))
}
