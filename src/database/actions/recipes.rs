use sqlx::{Pool, Sqlite, SqliteConnection};

use super::attributes::{
    list_recipe_attribute_ids, list_recipe_attributes, map_recipe_attribute_ids,
    replace_recipe_attributes, verify_owned_ids,
};
use crate::{
    error::{Error, QueryError},
    form::{NewRecipe, RecipeChanges},
    jwt::SessionData,
    pool::{begin_write, finish_write},
    schema::{Ingredient, Recipe, RecipeDetail, RecipeRow, Tag, Uuid},
};

const TITLE_TAKEN: &str = "recipe with this title already exists.";

/// The caller's recipes, newest first.
pub async fn list_recipes(
    session: &SessionData,
    pool: &Pool<Sqlite>,
) -> Result<Vec<RecipeRow>, Error> {
    let rows: Vec<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE user_id = ? ORDER BY id DESC")
        .bind(session.user_id)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let mut tags = map_recipe_attribute_ids::<Tag>(session, pool).await?;
    let mut ingredients = map_recipe_attribute_ids::<Ingredient>(session, pool).await?;

    Ok(rows
        .into_iter()
        .map(|recipe| {
            let tags = tags.remove(&recipe.id).unwrap_or_default();
            let ingredients = ingredients.remove(&recipe.id).unwrap_or_default();
            RecipeRow::from_parts(recipe, tags, ingredients)
        })
        .collect())
}

pub async fn get_recipe(id: Uuid, conn: &mut SqliteConnection) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Looks up a recipe the caller may read or change.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    conn: &mut SqliteConnection,
) -> Result<Recipe, Error> {
    let recipe = get_recipe(id, conn).await?;

    session.claim(recipe)
}

pub async fn fetch_recipe_detail(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Sqlite>,
) -> Result<RecipeDetail, Error> {
    let mut conn = pool.acquire().await.map_err(QueryError::from)?;

    let recipe = get_recipe_mut(id, session, &mut conn).await?;
    let tags = list_recipe_attributes::<Tag>(recipe.id, &mut conn).await?;
    let ingredients = list_recipe_attributes::<Ingredient>(recipe.id, &mut conn).await?;

    Ok(RecipeDetail::from_parts(recipe, tags, ingredients))
}

async fn load_row(recipe: Recipe, conn: &mut SqliteConnection) -> Result<RecipeRow, Error> {
    let tags = list_recipe_attribute_ids::<Tag>(recipe.id, conn).await?;
    let ingredients = list_recipe_attribute_ids::<Ingredient>(recipe.id, conn).await?;

    Ok(RecipeRow::from_parts(recipe, tags, ingredients))
}

/// Creates a recipe owned by the caller, linking the given tags and
/// ingredients. Nothing is stored unless every linked record is the caller's.
pub async fn create_recipe(
    session: &SessionData,
    recipe: NewRecipe,
    pool: &Pool<Sqlite>,
) -> Result<RecipeRow, Error> {
    let mut conn = begin_write(pool).await?;
    let result = insert_recipe(session, recipe, &mut conn).await;
    let row = finish_write(conn, result).await?;

    log::info!("User {} created recipe {}", session.user_id, row.id);
    Ok(row)
}

async fn insert_recipe(
    session: &SessionData,
    recipe: NewRecipe,
    conn: &mut SqliteConnection,
) -> Result<RecipeRow, Error> {
    verify_owned_ids::<Tag>(session, &recipe.tags, conn).await?;
    verify_owned_ids::<Ingredient>(session, &recipe.ingredients, conn).await?;

    let created: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (title, time_minutes, price_of_ingredient, user_id)
        VALUES (?, ?, ?, ?)
        RETURNING *
    ",
    )
    .bind(&recipe.title)
    .bind(recipe.time_minutes)
    .bind(recipe.price_of_ingredient)
    .bind(session.user_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| QueryError::from(e).on_conflict("title", TITLE_TAKEN))?;

    replace_recipe_attributes::<Tag>(created.id, &recipe.tags, conn).await?;
    replace_recipe_attributes::<Ingredient>(created.id, &recipe.ingredients, conn).await?;

    load_row(created, conn).await
}

/// Applies `changes` to one of the caller's recipes. Full replacement is a
/// change set with every field present.
pub async fn update_recipe(
    id: Uuid,
    session: &SessionData,
    changes: RecipeChanges,
    pool: &Pool<Sqlite>,
) -> Result<RecipeRow, Error> {
    let mut conn = begin_write(pool).await?;
    let result = apply_recipe_changes(id, session, changes, &mut conn).await;

    finish_write(conn, result).await
}

async fn apply_recipe_changes(
    id: Uuid,
    session: &SessionData,
    changes: RecipeChanges,
    conn: &mut SqliteConnection,
) -> Result<RecipeRow, Error> {
    let recipe = get_recipe_mut(id, session, conn).await?;

    if let Some(tags) = &changes.tags {
        verify_owned_ids::<Tag>(session, tags, conn).await?;
    }
    if let Some(ingredients) = &changes.ingredients {
        verify_owned_ids::<Ingredient>(session, ingredients, conn).await?;
    }

    let updated: Recipe = sqlx::query_as(
        "
        UPDATE recipes SET title = ?, time_minutes = ?, price_of_ingredient = ?
        WHERE id = ?
        RETURNING *
    ",
    )
    .bind(changes.title.unwrap_or(recipe.title))
    .bind(changes.time_minutes.unwrap_or(recipe.time_minutes))
    .bind(changes.price_of_ingredient.unwrap_or(recipe.price_of_ingredient))
    .bind(recipe.id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| QueryError::from(e).on_conflict("title", TITLE_TAKEN))?;

    if let Some(tags) = &changes.tags {
        replace_recipe_attributes::<Tag>(updated.id, tags, conn).await?;
    }
    if let Some(ingredients) = &changes.ingredients {
        replace_recipe_attributes::<Ingredient>(updated.id, ingredients, conn).await?;
    }

    load_row(updated, conn).await
}

/// Points the recipe at a new image path and returns the path it replaced.
pub async fn update_recipe_image(
    id: Uuid,
    session: &SessionData,
    image: Option<&str>,
    pool: &Pool<Sqlite>,
) -> Result<(Recipe, Option<String>), Error> {
    let mut conn = begin_write(pool).await?;
    let result = swap_recipe_image(id, session, image, &mut conn).await;

    finish_write(conn, result).await
}

async fn swap_recipe_image(
    id: Uuid,
    session: &SessionData,
    image: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(Recipe, Option<String>), Error> {
    let recipe = get_recipe_mut(id, session, conn).await?;

    let updated: Recipe = sqlx::query_as("UPDATE recipes SET image = ? WHERE id = ? RETURNING *")
        .bind(image)
        .bind(recipe.id)
        .fetch_one(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok((updated, recipe.image))
}

/// Deletes one of the caller's recipes along with its links. The linked tags
/// and ingredients survive. Returns the deleted row.
pub async fn delete_recipe(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Sqlite>,
) -> Result<Recipe, Error> {
    let mut conn = begin_write(pool).await?;
    let result = remove_recipe(id, session, &mut conn).await;
    let recipe = finish_write(conn, result).await?;

    log::info!("User {} deleted recipe {}", session.user_id, recipe.id);
    Ok(recipe)
}

async fn remove_recipe(
    id: Uuid,
    session: &SessionData,
    conn: &mut SqliteConnection,
) -> Result<Recipe, Error> {
    let recipe = get_recipe_mut(id, session, conn).await?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = ?")
        .bind(recipe.id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = ?")
        .bind(recipe.id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM recipes WHERE id = ?")
        .bind(recipe.id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(recipe)
}
