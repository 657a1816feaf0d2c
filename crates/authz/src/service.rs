use biblioteca_db::Database;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT payload shared by access and refresh tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub token_type: TokenType,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub user_id: i64,
}

/// Token lifetimes, rotation policy and hashing cost
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret_key: String,
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
    pub rotate_refresh_tokens: bool,
    pub blacklist_after_rotation: bool,
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            access_token_lifetime: Duration::minutes(60),
            refresh_token_lifetime: Duration::days(1),
            rotate_refresh_tokens: true,
            blacklist_after_rotation: true,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Pair returned by a login or a refresh.
///
/// `refresh` is only present on refresh when rotation is enabled.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
    pub access: String,
}

pub struct AuthService {
    config: AuthConfig,
    db: Database,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Database) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret_key.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret_key.as_bytes());
        Self {
            config,
            db,
            encoding_key,
            decoding_key,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        Ok(bcrypt::hash(password, self.config.bcrypt_cost)?)
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        Ok(bcrypt::verify(password, hash)?)
    }

    /// Issue a fresh access/refresh pair for a user
    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair> {
        let refresh = self.create_token(user_id, TokenType::Refresh)?;
        let access = self.create_token(user_id, TokenType::Access)?;
        Ok(TokenPair {
            refresh: Some(refresh),
            access,
        })
    }

    /// Validate an access token and return its claims
    pub fn verify_access_token(&self, token: &str) -> Result<Claims> {
        self.decode_token(token, TokenType::Access)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// With rotation the caller also receives a new refresh token, and with
    /// blacklisting the presented one can never be used again.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.verified_refresh_claims(refresh_token).await?;

        let access = self.create_token(claims.user_id, TokenType::Access)?;
        if !self.config.rotate_refresh_tokens {
            return Ok(TokenPair {
                refresh: None,
                access,
            });
        }

        if self.config.blacklist_after_rotation {
            self.insert_blacklist(&claims).await?;
        }
        let refresh = self.create_token(claims.user_id, TokenType::Refresh)?;

        tracing::debug!(user_id = claims.user_id, "rotated refresh token");
        Ok(TokenPair {
            refresh: Some(refresh),
            access,
        })
    }

    /// Revoke a refresh token
    pub async fn blacklist(&self, refresh_token: &str) -> Result<()> {
        let claims = self.verified_refresh_claims(refresh_token).await?;
        self.insert_blacklist(&claims).await?;
        tracing::info!(user_id = claims.user_id, "refresh token blacklisted");
        Ok(())
    }

    /// Drop blacklist rows whose tokens would have expired anyway
    pub async fn flush_expired_blacklist(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at < ?")
            .bind(Utc::now().timestamp())
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn verified_refresh_claims(&self, token: &str) -> Result<Claims> {
        let claims = self.decode_token(token, TokenType::Refresh)?;
        if self.is_blacklisted(&claims.jti).await? {
            return Err(AuthError::Blacklisted);
        }
        Ok(claims)
    }

    async fn is_blacklisted(&self, jti: &str) -> Result<bool> {
        let hit: Option<i64> = sqlx::query_scalar("SELECT 1 FROM token_blacklist WHERE jti = ?")
            .bind(jti)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(hit.is_some())
    }

    async fn insert_blacklist(&self, claims: &Claims) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO token_blacklist (jti, user_id, expires_at, blacklisted_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&claims.jti)
        .bind(claims.user_id)
        .bind(claims.exp)
        .bind(Utc::now().to_rfc3339())
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    fn create_token(&self, user_id: i64, token_type: TokenType) -> Result<String> {
        let lifetime = match token_type {
            TokenType::Access => self.config.access_token_lifetime,
            TokenType::Refresh => self.config.refresh_token_lifetime,
        };
        let now = Utc::now();
        let claims = Claims {
            token_type,
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().simple().to_string(),
            user_id,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::Signing)
    }

    fn decode_token(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(AuthError::InvalidToken)?;
        if data.claims.token_type != expected {
            return Err(AuthError::WrongTokenType);
        }
        Ok(data.claims)
    }
}
