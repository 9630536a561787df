use std::fmt;

use serde::{Deserialize, Serialize};

/// Signed-in staff member. Every query is scoped to `restaurant_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<i64>,
    pub email: String,
    pub restaurant_id: i64,
}

/// Role given to whoever opens a new restaurant
pub const OWNER_ROLE: &str = "admin";

/// Details of a sign-up. The account owns a restaurant created with it.
#[derive(Clone, PartialEq)]
pub struct NewAccount {
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: Option<i64>,
    pub password: String,
}

impl NewAccount {
    /// Name the new restaurant starts with, e.g. "Asha's Restaurant"
    pub fn restaurant_name(&self) -> String {
        format!("{}'s Restaurant", self.name)
    }

    /// The user row stored for this account
    pub fn into_user(self, id: i64, restaurant_id: i64) -> User {
        User {
            id,
            username: self.username,
            role: OWNER_ROLE.to_string(),
            name: self.name,
            phone: self.phone,
            email: self.email,
            restaurant_id,
        }
    }
}

// Keeps the password out of logs
impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("name", &self.name)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_owns_its_restaurant() {
        let account = NewAccount {
            name: "Asha".to_string(),
            username: "asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: Some(5550100),
            password: "secret".to_string(),
        };

        assert_eq!(account.restaurant_name(), "Asha's Restaurant");
        assert!(!format!("{account:?}").contains("secret"));

        let user = account.into_user(7, 3);
        assert_eq!(user.role, "admin");
        assert_eq!(user.restaurant_id, 3);
        assert_eq!(user.phone, Some(5550100));
    }
}
