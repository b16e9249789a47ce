//! Request payloads and the rules they are checked against.
//!
//! Every payload deserializes into a loose `*Form` with optional fields and is
//! then validated into a typed value the actions accept. Actions never see an
//! unvalidated form.

use serde::{de::DeserializeOwned, Deserialize};

use super::{error::Error, schema::Uuid};
use crate::constants::{MAX_FIELD_LENGTH, MAX_JSON_BYTES, MAX_PRICE, MIN_PASSWORD_LENGTH};

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

pub fn parse_json<T>(body: &[u8]) -> Result<T, Error>
where
    T: DeserializeOwned,
{
    if body.len() > MAX_JSON_BYTES {
        return Err(Error::PayloadTooLarge(MAX_JSON_BYTES as u64));
    }
    serde_json::from_slice(body).map_err(|e| Error::MalformedPayload(e.to_string()))
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, Error> {
    value.ok_or_else(|| Error::validation(field, REQUIRED))
}

/// Trims `value` and checks it is non-blank and within the column limit.
pub fn validate_text(field: &str, value: &str) -> Result<String, Error> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(field, BLANK));
    }
    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err(Error::validation(
            field,
            &format!("Ensure this field has no more than {MAX_FIELD_LENGTH} characters."),
        ));
    }

    Ok(value.to_owned())
}

/// Trims and lowercases `value`. Only rejects an empty address; the shape is
/// checked by [`validate_email`].
pub fn normalize_email(value: &str) -> Result<String, Error> {
    let email = value.trim().to_lowercase();
    if email.is_empty() {
        return Err(Error::validation("email", BLANK));
    }

    Ok(email)
}

pub fn validate_email(value: &str) -> Result<String, Error> {
    let email = normalize_email(value)?;
    let email = validate_text("email", &email)?;

    let invalid = || Error::validation("email", "Enter a valid email address.");
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }

    Ok(email)
}

pub fn validate_password(value: &str) -> Result<(), Error> {
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::validation(
            "password",
            &format!("Ensure this field has at least {MIN_PASSWORD_LENGTH} characters."),
        ));
    }

    Ok(())
}

pub fn validate_time_minutes(value: i64) -> Result<i64, Error> {
    if value < 0 {
        return Err(Error::validation(
            "time_minutes",
            "Ensure this value is greater than or equal to 0.",
        ));
    }

    Ok(value)
}

pub fn validate_price(value: f64) -> Result<f64, Error> {
    const FIELD: &str = "price_of_ingredient";

    if !value.is_finite() {
        return Err(Error::validation(FIELD, "A valid number is required."));
    }
    if value < 0. || value > MAX_PRICE {
        return Err(Error::validation(
            FIELD,
            &format!("Ensure this value is between 0 and {MAX_PRICE}."),
        ));
    }
    let cents = value * 100.;
    if (cents - cents.round()).abs() > 1e-6 {
        return Err(Error::validation(
            FIELD,
            "Ensure that there are no more than 2 decimal places.",
        ));
    }

    Ok(cents.round() / 100.)
}

fn collect_ids(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

// Users

#[derive(Deserialize, Debug, Default)]
pub struct UserForm {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

impl UserForm {
    pub fn validate_new(self) -> Result<NewUser, Error> {
        let email = validate_email(&required("email", self.email)?)?;
        let password = required("password", self.password)?;
        validate_password(&password)?;
        let name = validate_text("name", &required("name", self.name)?)?;

        Ok(NewUser {
            email,
            password,
            name,
        })
    }

    pub fn validate_changes(self) -> Result<UserChanges, Error> {
        let email = self.email.map(|email| validate_email(&email)).transpose()?;
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        let name = self
            .name
            .map(|name| validate_text("name", &name))
            .transpose()?;

        Ok(UserChanges {
            email,
            password: self.password,
            name,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct CredentialsForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl CredentialsForm {
    /// Passwords are taken verbatim, surrounding whitespace included.
    pub fn validate(self) -> Result<Credentials, Error> {
        let email = normalize_email(&required("email", self.email)?)?;
        let password = required("password", self.password)?;
        if password.is_empty() {
            return Err(Error::validation("password", BLANK));
        }

        Ok(Credentials { email, password })
    }
}

// Tags and ingredients

#[derive(Deserialize, Debug, Default)]
pub struct AttributeForm {
    pub name: Option<String>,
}

impl AttributeForm {
    pub fn validate(self) -> Result<String, Error> {
        validate_text("name", &required("name", self.name)?)
    }
}

// Recipes

#[derive(Deserialize, Debug, Default)]
pub struct RecipeForm {
    pub title: Option<String>,
    pub time_minutes: Option<i64>,
    pub price_of_ingredient: Option<f64>,
    pub tags: Option<Vec<Uuid>>,
    pub ingredients: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i64,
    pub price_of_ingredient: f64,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<Uuid>,
}

/// Partial recipe update. A present id list replaces the whole set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i64>,
    pub price_of_ingredient: Option<f64>,
    pub tags: Option<Vec<Uuid>>,
    pub ingredients: Option<Vec<Uuid>>,
}

impl RecipeForm {
    /// Used for creation and full replacement; omitted id lists mean "none".
    pub fn validate_new(self) -> Result<NewRecipe, Error> {
        Ok(NewRecipe {
            title: validate_text("title", &required("title", self.title)?)?,
            time_minutes: validate_time_minutes(required("time_minutes", self.time_minutes)?)?,
            price_of_ingredient: validate_price(required(
                "price_of_ingredient",
                self.price_of_ingredient,
            )?)?,
            tags: collect_ids(self.tags.unwrap_or_default()),
            ingredients: collect_ids(self.ingredients.unwrap_or_default()),
        })
    }

    pub fn validate_changes(self) -> Result<RecipeChanges, Error> {
        Ok(RecipeChanges {
            title: self
                .title
                .map(|title| validate_text("title", &title))
                .transpose()?,
            time_minutes: self.time_minutes.map(validate_time_minutes).transpose()?,
            price_of_ingredient: self.price_of_ingredient.map(validate_price).transpose()?,
            tags: self.tags.map(collect_ids),
            ingredients: self.ingredients.map(collect_ids),
        })
    }
}

impl From<NewRecipe> for RecipeChanges {
    fn from(value: NewRecipe) -> Self {
        Self {
            title: Some(value.title),
            time_minutes: Some(value.time_minutes),
            price_of_ingredient: Some(value.price_of_ingredient),
            tags: Some(value.tags),
            ingredients: Some(value.ingredients),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(error: Error) -> String {
        match error {
            Error::Validation { field, .. } => field,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn email_is_normalized_to_lowercase() {
        assert_eq!(validate_email("A@B.COM").unwrap(), "a@b.com");
        assert_eq!(normalize_email("  test@APPDEV.COM ").unwrap(), "test@appdev.com");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for email in ["", "   ", "plain", "@b.com", "a@", "a@b", "a@b..com", "a b@c.com", "a@b@c.com"] {
            assert!(validate_email(email).is_err(), "{email} should be rejected");
        }
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert_eq!(field_of(validate_password("pw").unwrap_err()), "password");
        assert!(validate_password("1234").is_err());
        assert!(validate_password("12345").is_ok());
    }

    #[test]
    fn text_length_is_counted_in_characters() {
        assert!(validate_text("name", &"é".repeat(255)).is_ok());
        assert!(validate_text("name", &"a".repeat(256)).is_err());
        assert_eq!(validate_text("name", "  Vegan ").unwrap(), "Vegan");
    }

    #[test]
    fn new_user_requires_every_field() {
        let form = UserForm {
            email: Some(String::from("test@recipeapp.com")),
            password: None,
            name: Some(String::from("name")),
        };
        assert_eq!(field_of(form.validate_new().unwrap_err()), "password");

        let form = UserForm {
            email: Some(String::from("Test@RecipeApp.com")),
            password: Some(String::from("test123")),
            name: Some(String::from("name")),
        };
        let user = form.validate_new().unwrap();
        assert_eq!(user.email, "test@recipeapp.com");
        assert_eq!(user.password, "test123");
    }

    #[test]
    fn credentials_keep_password_whitespace() {
        let form = CredentialsForm {
            email: Some(String::from("USER@example.com")),
            password: Some(String::from(" secret ")),
        };
        let credentials = form.validate().unwrap();

        assert_eq!(credentials.email, "user@example.com");
        assert_eq!(credentials.password, " secret ");
    }

    #[test]
    fn price_allows_two_decimal_places() {
        assert_eq!(validate_price(100.).unwrap(), 100.);
        assert_eq!(validate_price(5.25).unwrap(), 5.25);
        assert!(validate_price(5.255).is_err());
        assert!(validate_price(-1.).is_err());
        assert!(validate_price(1000.).is_err());
        assert!(validate_price(f64::NAN).is_err());
    }

    #[test]
    fn recipe_id_lists_collapse_duplicates() {
        let form = RecipeForm {
            title: Some(String::from("Sample recipe")),
            time_minutes: Some(10),
            price_of_ingredient: Some(5.),
            tags: Some(vec![3, 1, 3]),
            ingredients: None,
        };
        let recipe = form.validate_new().unwrap();

        assert_eq!(recipe.tags, vec![1, 3]);
        assert!(recipe.ingredients.is_empty());
    }

    #[test]
    fn partial_recipe_keeps_absent_fields_absent() {
        let form: RecipeForm = parse_json(br#"{"title": "Chicken tikka"}"#).unwrap();
        let changes = form.validate_changes().unwrap();

        assert_eq!(changes.title.as_deref(), Some("Chicken tikka"));
        assert_eq!(changes.tags, None);
        assert_eq!(changes.price_of_ingredient, None);
    }

    #[test]
    fn wrongly_typed_json_is_malformed() {
        let result = parse_json::<RecipeForm>(br#"{"time_minutes": "ten"}"#);

        assert!(matches!(result, Err(Error::MalformedPayload(_))));
    }
}
