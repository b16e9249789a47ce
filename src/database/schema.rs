use std::fmt::{self, Display};

use serde::Serialize;

pub type Uuid = i64;

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// What a user sees of their own account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
}

impl From<User> for UserProfile {
    fn from(value: User) -> Self {
        Self {
            email: value.email,
            name: value.name,
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i64,
    pub price_of_ingredient: f64,
    pub image: Option<String>,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
}

impl Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

/// Link row of one of the recipe join tables.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeLink {
    pub recipe_id: Uuid,
    pub target_id: Uuid,
}

/// Recipe as listed and as returned from writes: related records by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeRow {
    pub id: Uuid,
    pub title: String,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<Uuid>,
    pub time_minutes: i64,
    pub price_of_ingredient: f64,
    pub image: Option<String>,
}

impl RecipeRow {
    pub fn from_parts(recipe: Recipe, tags: Vec<Uuid>, ingredients: Vec<Uuid>) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            tags,
            ingredients,
            time_minutes: recipe.time_minutes,
            price_of_ingredient: recipe.price_of_ingredient,
            image: recipe.image,
        }
    }
}

/// Recipe as returned by id: related records nested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeDetail {
    pub id: Uuid,
    pub title: String,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<Ingredient>,
    pub time_minutes: i64,
    pub price_of_ingredient: f64,
    pub image: Option<String>,
}

impl RecipeDetail {
    pub fn from_parts(recipe: Recipe, tags: Vec<Tag>, ingredients: Vec<Ingredient>) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            tags,
            ingredients,
            time_minutes: recipe.time_minutes,
            price_of_ingredient: recipe.price_of_ingredient,
            image: recipe.image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeImage {
    pub id: Uuid,
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_displays_as_its_name() {
        let tag = Tag {
            id: 1,
            name: String::from("Vegan"),
            user_id: 1,
        };

        assert_eq!(tag.to_string(), "Vegan");
    }

    #[test]
    fn serialized_records_hide_private_fields() {
        let user = User {
            id: 1,
            email: String::from("test@recipeapp.com"),
            password: String::from("$argon2id$v=19$..."),
            name: String::from("name"),
            is_active: true,
            is_staff: false,
            is_superuser: false,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());

        let profile = serde_json::to_value(UserProfile::from(user)).unwrap();
        assert_eq!(
            profile,
            serde_json::json!({ "email": "test@recipeapp.com", "name": "name" })
        );

        let ingredient = Ingredient {
            id: 4,
            name: String::from("Salt"),
            user_id: 9,
        };
        assert_eq!(
            serde_json::to_value(&ingredient).unwrap(),
            serde_json::json!({ "id": 4, "name": "Salt" })
        );
    }
}
