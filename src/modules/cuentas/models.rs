use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use validator::{Validate, ValidationError};

static USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+\z").expect("username pattern"));

/// Stored account. The password hash never leaves this module.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

/// Registration fields as read from the request, before value rules run
#[derive(Debug, Validate)]
pub struct RegistrationForm {
    #[validate(
        length(max = 150),
        custom(
            function = "username_charset",
            message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
        )
    )]
    pub username: Option<String>,
    /// Blank addresses are left out so only real ones are checked
    #[validate(
        length(max = 254),
        custom(
            function = "biblioteca_http::validation::email_address",
            message = "Enter a valid email address."
        )
    )]
    pub email: Option<String>,
    #[validate(length(max = 128))]
    pub password: Option<String>,
}

/// Letters (any script), digits and `@ . + - _`
pub fn username_charset(value: &str) -> Result<(), ValidationError> {
    if USERNAME.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_username"))
    }
}

/// Validated registration request
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Public part of a freshly registered account
#[derive(Debug, Clone, Serialize)]
pub struct RegisteredUser {
    pub username: String,
    pub email: String,
}

/// Body returned by a successful registration
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResponse {
    pub message: &'static str,
    pub usuario: RegisteredUser,
}

impl From<&User> for RegisteredUser {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}
