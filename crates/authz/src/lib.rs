//! Authentication primitives: bcrypt password hashing, HS256 access/refresh
//! tokens, refresh rotation and the token blacklist.

pub mod error;
pub mod service;

use biblioteca_db::Migration;

pub use error::AuthError;
pub use service::{AuthConfig, AuthService, Claims, TokenPair, TokenType};

/// Schema backing the refresh-token blacklist
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_token_blacklist",
        up: r#"
            CREATE TABLE token_blacklist (
                jti            TEXT PRIMARY KEY,
                user_id        INTEGER NOT NULL,
                expires_at     INTEGER NOT NULL,
                blacklisted_at TEXT NOT NULL
            );
            CREATE INDEX token_blacklist_expires_at ON token_blacklist (expires_at);
            "#,
    }]
}
