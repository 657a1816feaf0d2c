use thiserror::Error;

/// Failures raised while hashing passwords or handling tokens
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token is invalid or expired")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("token has wrong type")]
    WrongTokenType,

    #[error("token is blacklisted")]
    Blacklisted,

    #[error("token signing failed")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl AuthError {
    /// Whether the error is the caller's fault rather than an infrastructure failure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidToken(_) | AuthError::WrongTokenType | AuthError::Blacklisted
        )
    }
}
