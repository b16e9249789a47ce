use crate::{
    error::Error,
    jwt::SessionData,
    schema::{Ingredient, Recipe, Tag, Uuid},
};

/// A record that belongs to exactly one user.
pub trait Owned {
    fn owner_id(&self) -> Uuid;
}

impl Owned for Tag {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Owned for Ingredient {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Owned for Recipe {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl SessionData {
    pub fn owns<T: Owned>(&self, record: &T) -> bool {
        record.owner_id() == self.user_id
    }

    /// Hands out a looked-up record only to its owner. A record owned by
    /// someone else is reported exactly like a missing one.
    pub fn claim<T: Owned>(&self, record: Option<T>) -> Result<T, Error> {
        match record {
            Some(record) if self.owns(&record) => Ok(record),
            Some(_) => {
                log::trace!("> User {} denied a record they do not own", self.user_id);
                Err(Error::NotFound)
            }
            None => Err(Error::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::User;

    fn session(user_id: Uuid) -> SessionData {
        SessionData { user_id }
    }

    fn recipe(user_id: Uuid) -> Recipe {
        Recipe {
            id: 1,
            title: String::from("Sample recipe"),
            time_minutes: 10,
            price_of_ingredient: 100.,
            image: None,
            user_id,
        }
    }

    #[test]
    fn owner_can_claim_record() {
        assert_eq!(session(1).claim(Some(recipe(1))).unwrap().id, 1);
    }

    #[test]
    fn foreign_and_missing_records_look_the_same() {
        assert!(matches!(
            session(2).claim(Some(recipe(1))),
            Err(Error::NotFound)
        ));
        assert!(matches!(
            session(2).claim::<Recipe>(None),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn staff_gets_no_special_access() {
        let admin = User {
            id: 3,
            email: String::from("admin@recipe.com"),
            password: String::new(),
            name: String::new(),
            is_active: true,
            is_staff: true,
            is_superuser: true,
        };
        let staff = SessionData::from(&admin);

        assert!(!staff.owns(&recipe(1)));
        assert!(staff.claim(Some(recipe(1))).is_err());
    }
}
