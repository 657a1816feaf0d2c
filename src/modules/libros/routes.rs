//! Generic list/create/retrieve/update/destroy handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use biblioteca_http::{AppError, AuthenticatedUser, Payload};
use serde_json::Value;

use super::resource::{self, Resource};
use crate::modules::{cuentas::store, AppState};

const NOT_FOUND: &str = "Not found.";

/// Collection and item routes for one resource
pub fn resource_routes<R: Resource>() -> Router<AppState> {
    Router::new()
        .route(R::PATH, get(list::<R>).post(create::<R>))
        .route(
            &format!("{}/{{id}}", R::PATH),
            get(retrieve::<R>)
                .put(update::<R>)
                .patch(partial_update::<R>)
                .delete(destroy::<R>),
        )
}

async fn list<R: Resource>(State(state): State<AppState>) -> Result<Json<Vec<R>>, AppError> {
    Ok(Json(resource::list::<R>(state.db.pool()).await?))
}

async fn create<R: Resource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Payload(data): Payload,
) -> Result<(StatusCode, Json<R>), AppError> {
    ensure_active(&state, user).await?;
    let pool = state.db.pool();

    let input = R::validate(pool, &data, None).await?;
    let id = R::insert(pool, input, user.user_id).await?;
    let record = load::<R>(&state, id).await?;

    tracing::info!(resource = R::TABLE, id, user_id = user.user_id, "created");
    Ok((StatusCode::CREATED, Json(record)))
}

async fn retrieve<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<R>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(load::<R>(&state, id).await?))
}

async fn update<R: Resource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Payload(data): Payload,
) -> Result<Json<R>, AppError> {
    ensure_active(&state, user).await?;
    let id = parse_id(&id)?;
    load::<R>(&state, id).await?;

    replace::<R>(&state, id, &data).await.map(Json)
}

/// Fields missing from the body keep their stored values
async fn partial_update<R: Resource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Payload(data): Payload,
) -> Result<Json<R>, AppError> {
    ensure_active(&state, user).await?;
    let id = parse_id(&id)?;
    let current = load::<R>(&state, id).await?;

    let mut merged = match serde_json::to_value(&current) {
        Ok(Value::Object(map)) => map,
        Ok(_) => serde_json::Map::new(),
        Err(err) => return Err(AppError::Internal(err.into())),
    };
    merged.extend(data);

    replace::<R>(&state, id, &merged).await.map(Json)
}

async fn destroy<R: Resource>(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ensure_active(&state, user).await?;
    let id = parse_id(&id)?;

    if !resource::delete::<R>(state.db.pool(), id).await? {
        return Err(AppError::not_found(NOT_FOUND));
    }
    tracing::info!(resource = R::TABLE, id, user_id = user.user_id, "deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn replace<R: Resource>(
    state: &AppState,
    id: i64,
    data: &serde_json::Map<String, Value>,
) -> Result<R, AppError> {
    let pool = state.db.pool();
    let input = R::validate(pool, data, Some(id)).await?;
    R::update(pool, id, input).await?;

    tracing::info!(resource = R::TABLE, id, "updated");
    load::<R>(state, id).await
}

async fn load<R: Resource>(state: &AppState, id: i64) -> Result<R, AppError> {
    resource::fetch::<R>(state.db.pool(), id)
        .await?
        .ok_or_else(|| AppError::not_found(NOT_FOUND))
}

// Non-numeric ids can never match a row
fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::not_found(NOT_FOUND))
}

/// Tokens of deleted or deactivated accounts are refused
async fn ensure_active(state: &AppState, user: AuthenticatedUser) -> Result<(), AppError> {
    if store::is_active(state.db.pool(), user.user_id).await? {
        Ok(())
    } else {
        Err(AppError::invalid_token("User not found"))
    }
}
