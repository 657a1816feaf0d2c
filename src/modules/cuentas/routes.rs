use std::sync::Arc;

use anyhow::Context;
use axum::{extract::State, http::StatusCode, Json};
use biblioteca_authz::{AuthService, TokenPair};
use biblioteca_http::{AppError, Fields, Payload};
use serde_json::{json, Value};

use super::{
    models::{NewUser, RegisteredUser, RegistrationForm, RegistrationResponse},
    store,
};
use crate::modules::AppState;

pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
const NO_ACTIVE_ACCOUNT: &str = "No active account found with the given credentials";

/// POST /registro
pub async fn register(
    State(state): State<AppState>,
    Payload(data): Payload,
) -> Result<(StatusCode, Json<RegistrationResponse>), AppError> {
    let pool = state.db.pool();
    let mut fields = Fields::new(&data);

    let form = RegistrationForm {
        username: fields.required_string("username"),
        email: fields
            .optional_string("email")
            .filter(|email| !email.is_empty()),
        password: fields.required_string("password"),
    };
    fields.check(&form);

    if let Some(name) = form.username.as_deref() {
        if !fields.has_error("username") && store::username_taken(pool, name).await? {
            fields.reject("username", USERNAME_TAKEN);
        }
    }
    fields.finish()?;

    let RegistrationForm {
        username: Some(username),
        email,
        password: Some(password),
    } = form
    else {
        return Err(AppError::Internal(anyhow::anyhow!(
            "registration passed validation with missing fields"
        )));
    };
    let new_user = NewUser {
        username,
        email: email.unwrap_or_default(),
        password,
    };

    let password_hash = hash_off_thread(&state.auth, new_user.password).await?;
    let user = store::insert(pool, &new_user.username, &new_user.email, &password_hash)
        .await
        .map_err(|err| {
            if err
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                AppError::field("username", USERNAME_TAKEN)
            } else {
                AppError::from(err)
            }
        })?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            message: "Usuario creado con éxito.",
            usuario: RegisteredUser::from(&user),
        }),
    ))
}

/// POST /token
pub async fn obtain_token(
    State(state): State<AppState>,
    Payload(data): Payload,
) -> Result<Json<TokenPair>, AppError> {
    let mut fields = Fields::new(&data);
    let username = fields.required_string("username");
    let password = fields.required_string("password");
    fields.finish()?;

    let (Some(username), Some(password)) = (username, password) else {
        return Err(AppError::Internal(anyhow::anyhow!(
            "credentials passed validation with missing fields"
        )));
    };

    let Some(user) = store::find_by_username(state.db.pool(), &username).await? else {
        tracing::info!(username = %username, "login for unknown user");
        return Err(AppError::unauthorized(NO_ACTIVE_ACCOUNT));
    };

    let auth = Arc::clone(&state.auth);
    let hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || auth.verify_password(&password, &hash))
        .await
        .context("password verification task failed")??;

    if !matches || !user.is_active {
        tracing::info!(user_id = user.id, "rejected login");
        return Err(AppError::unauthorized(NO_ACTIVE_ACCOUNT));
    }

    tracing::info!(user_id = user.id, "token pair issued");
    Ok(Json(state.auth.issue_pair(user.id)?))
}

/// POST /token/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    Payload(data): Payload,
) -> Result<Json<TokenPair>, AppError> {
    let token = refresh_field(&data)?;
    Ok(Json(state.auth.refresh(&token).await?))
}

/// POST /token/blacklist
pub async fn blacklist_token(
    State(state): State<AppState>,
    Payload(data): Payload,
) -> Result<Json<Value>, AppError> {
    let token = refresh_field(&data)?;
    state.auth.blacklist(&token).await?;
    Ok(Json(json!({})))
}

fn refresh_field(data: &serde_json::Map<String, Value>) -> Result<String, AppError> {
    let mut fields = Fields::new(data);
    let token = fields.required_string("refresh");
    fields.finish()?;
    token.ok_or_else(|| AppError::field("refresh", biblioteca_http::validation::REQUIRED))
}

async fn hash_off_thread(auth: &Arc<AuthService>, password: String) -> Result<String, AppError> {
    let auth = Arc::clone(auth);
    let hash = tokio::task::spawn_blocking(move || auth.hash_password(&password))
        .await
        .context("password hashing task failed")??;
    Ok(hash)
}
