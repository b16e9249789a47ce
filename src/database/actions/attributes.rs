//! Tags and ingredients: labels a user attaches to their own recipes.
//!
//! Both kinds behave identically, so every operation here is generic over
//! [`Attribute`] and the concrete table names come from the trait.

use std::collections::{HashMap, HashSet};

use sqlx::{sqlite::SqliteRow, FromRow, Pool, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    authentication::permissions::Owned,
    error::{Error, QueryError},
    jwt::SessionData,
    schema::{Ingredient, RecipeLink, Tag, Uuid},
};

pub trait Attribute: Owned + for<'r> FromRow<'r, SqliteRow> + Send + Unpin {
    /// Table holding the records.
    const TABLE: &'static str;
    /// Join table linking records to recipes, and its record column.
    const LINK_TABLE: &'static str;
    const LINK_COLUMN: &'static str;
    /// Name of the id list on recipe payloads.
    const FIELD: &'static str;
    /// Human readable singular, used in error messages.
    const LABEL: &'static str;
}

impl Attribute for Tag {
    const TABLE: &'static str = "tags";
    const LINK_TABLE: &'static str = "recipe_tags";
    const LINK_COLUMN: &'static str = "tag_id";
    const FIELD: &'static str = "tags";
    const LABEL: &'static str = "tag";
}

impl Attribute for Ingredient {
    const TABLE: &'static str = "ingredients";
    const LINK_TABLE: &'static str = "recipe_ingredients";
    const LINK_COLUMN: &'static str = "ingredient_id";
    const FIELD: &'static str = "ingredients";
    const LABEL: &'static str = "ingredient";
}

/// The caller's own records, by name descending.
pub async fn list_attributes<T: Attribute>(
    session: &SessionData,
    pool: &Pool<Sqlite>,
) -> Result<Vec<T>, Error> {
    let sql = format!("SELECT * FROM {} WHERE user_id = ? ORDER BY name DESC", T::TABLE);
    let list: Vec<T> = sqlx::query_as(&sql)
        .bind(session.user_id)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

/// Creates a record owned by the caller. `name` must already be validated.
pub async fn create_attribute<T: Attribute>(
    session: &SessionData,
    name: &str,
    pool: &Pool<Sqlite>,
) -> Result<T, Error> {
    let sql = format!("INSERT INTO {} (name, user_id) VALUES (?, ?) RETURNING *", T::TABLE);
    let record: T = sqlx::query_as(&sql)
        .bind(name)
        .bind(session.user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            QueryError::from(e).on_conflict("name", &format!("{} with this name already exists.", T::LABEL))
        })?;

    log::trace!("> User {} created {} {name:?}", session.user_id, T::LABEL);
    Ok(record)
}

/// Records linked to one recipe, by id.
pub async fn list_recipe_attributes<T: Attribute>(
    recipe_id: Uuid,
    conn: &mut SqliteConnection,
) -> Result<Vec<T>, Error> {
    let sql = format!(
        "
        SELECT a.*
        FROM {} a
        INNER JOIN {} l ON l.{} = a.id
        WHERE l.recipe_id = ?
        ORDER BY a.id
    ",
        T::TABLE,
        T::LINK_TABLE,
        T::LINK_COLUMN
    );
    let list: Vec<T> = sqlx::query_as(&sql)
        .bind(recipe_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

/// Ids linked to one recipe, ascending.
pub async fn list_recipe_attribute_ids<T: Attribute>(
    recipe_id: Uuid,
    conn: &mut SqliteConnection,
) -> Result<Vec<Uuid>, Error> {
    let sql = format!(
        "SELECT {} FROM {} WHERE recipe_id = ? ORDER BY {}",
        T::LINK_COLUMN,
        T::LINK_TABLE,
        T::LINK_COLUMN
    );
    let ids: Vec<(Uuid,)> = sqlx::query_as(&sql)
        .bind(recipe_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(ids.into_iter().map(|id| id.0).collect())
}

/// Linked ids of every recipe the caller owns, grouped by recipe.
pub async fn map_recipe_attribute_ids<T: Attribute>(
    session: &SessionData,
    pool: &Pool<Sqlite>,
) -> Result<HashMap<Uuid, Vec<Uuid>>, Error> {
    let sql = format!(
        "
        SELECT l.recipe_id AS recipe_id, l.{} AS target_id
        FROM {} l
        INNER JOIN recipes r ON r.id = l.recipe_id
        WHERE r.user_id = ?
        ORDER BY l.{}
    ",
        T::LINK_COLUMN,
        T::LINK_TABLE,
        T::LINK_COLUMN
    );
    let links: Vec<RecipeLink> = sqlx::query_as(&sql)
        .bind(session.user_id)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    links.into_iter().for_each(|link| {
        hashmap
            .entry(link.recipe_id)
            .or_default()
            .push(link.target_id)
    });

    Ok(hashmap)
}

/// Fails unless every id names a record the caller owns. Reports the first
/// offending id in the order given.
pub async fn verify_owned_ids<T: Attribute>(
    session: &SessionData,
    ids: &[Uuid],
    conn: &mut SqliteConnection,
) -> Result<(), Error> {
    if ids.is_empty() {
        return Ok(());
    }

    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT id FROM {} WHERE user_id = ", T::TABLE));
    query.push_bind(session.user_id);
    query.push(" AND id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let found: Vec<(Uuid,)> = query
        .build_query_as()
        .fetch_all(&mut *conn)
        .await
        .map_err(QueryError::from)?;
    let found: HashSet<Uuid> = found.into_iter().map(|id| id.0).collect();

    match ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(Error::validation(
            T::FIELD,
            &format!("Invalid pk \"{missing}\" - object does not exist."),
        )),
        None => Ok(()),
    }
}

/// Makes `ids` the complete set of records linked to `recipe_id`.
pub async fn replace_recipe_attributes<T: Attribute>(
    recipe_id: Uuid,
    ids: &[Uuid],
    conn: &mut SqliteConnection,
) -> Result<(), Error> {
    sqlx::query(&format!("DELETE FROM {} WHERE recipe_id = ?", T::LINK_TABLE))
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    let insert = format!(
        "INSERT INTO {} (recipe_id, {}) VALUES (?, ?) ON CONFLICT DO NOTHING",
        T::LINK_TABLE,
        T::LINK_COLUMN
    );
    for id in ids {
        sqlx::query(&insert)
            .bind(recipe_id)
            .bind(*id)
            .execute(&mut *conn)
            .await
            .map_err(QueryError::from)?;
    }

    Ok(())
}
