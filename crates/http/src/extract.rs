//! Request extractors shared by module handlers

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use biblioteca_authz::AuthService;
use serde_json::{Map, Value};

use crate::{error::AppError, validation::type_name};

/// JSON request body that must be an object
#[derive(Debug, Clone)]
pub struct Payload(pub Map<String, Value>);

impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;

        match value {
            Value::Object(map) => Ok(Payload(map)),
            other => Err(AppError::field(
                "non_field_errors",
                format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    type_name(&other)
                ),
            )),
        }
    }
}

/// Caller identified by a valid `Authorization: Bearer <access token>` header
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser {
    pub user_id: i64,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::unauthorized("Authentication credentials were not provided.")
            })?;

        let token = match header.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("Bearer") => token.trim(),
            _ => {
                return Err(AppError::unauthorized(
                    "Authentication credentials were not provided.",
                ))
            }
        };

        let auth = Arc::<AuthService>::from_ref(state);
        let claims = auth.verify_access_token(token).map_err(|err| {
            tracing::debug!(error = %err, "rejected access token");
            AppError::invalid_token("Given token not valid for any token type")
        })?;

        Ok(AuthenticatedUser {
            user_id: claims.user_id,
        })
    }
}
