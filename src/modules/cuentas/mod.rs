//! Accounts: registration and JWT token endpoints.

pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{routing::post, Router};
use biblioteca_kernel::{InitCtx, Migration, Module};
use serde_json::json;

use super::AppState;

pub struct CuentasModule;

impl CuentasModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for CuentasModule {
    fn name(&self) -> &'static str {
        "cuentas"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            access_minutes = ctx.auth.config().access_token_lifetime.num_minutes(),
            rotate_refresh = ctx.auth.config().rotate_refresh_tokens,
            "accounts module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        Router::new()
            .route("/registro", post(routes::register))
            .route("/token", post(routes::obtain_token))
            .route("/token/refresh", post(routes::refresh_token))
            .route("/token/blacklist", post(routes::blacklist_token))
            .with_state(AppState::from_ctx(ctx))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let validation = json!({
            "description": "Validation error",
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/ValidationErrors" }
                }
            }
        });
        let unauthorized = json!({
            "description": "Invalid credentials or token",
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                }
            }
        });
        let token_body = |schema: &str| {
            json!({
                "required": true,
                "content": {
                    "application/json": {
                        "schema": { "$ref": format!("#/components/schemas/{schema}") }
                    }
                }
            })
        };

        Some(json!({
            "paths": {
                "/registro": {
                    "post": {
                        "summary": "Register a user",
                        "tags": ["Cuentas"],
                        "requestBody": token_body("Registro"),
                        "responses": {
                            "201": {
                                "description": "User created",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/RegistroRespuesta" }
                                    }
                                }
                            },
                            "400": validation
                        }
                    }
                },
                "/token": {
                    "post": {
                        "summary": "Obtain an access/refresh token pair",
                        "tags": ["Cuentas"],
                        "requestBody": token_body("Credenciales"),
                        "responses": {
                            "200": {
                                "description": "Token pair",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/TokenPair" }
                                    }
                                }
                            },
                            "400": validation,
                            "401": unauthorized
                        }
                    }
                },
                "/token/refresh": {
                    "post": {
                        "summary": "Exchange a refresh token",
                        "tags": ["Cuentas"],
                        "requestBody": token_body("RefreshToken"),
                        "responses": {
                            "200": {
                                "description": "New access token, plus a rotated refresh token",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/TokenPair" }
                                    }
                                }
                            },
                            "400": validation,
                            "401": unauthorized
                        }
                    }
                },
                "/token/blacklist": {
                    "post": {
                        "summary": "Revoke a refresh token",
                        "tags": ["Cuentas"],
                        "requestBody": token_body("RefreshToken"),
                        "responses": {
                            "200": { "description": "Token revoked" },
                            "400": validation,
                            "401": unauthorized
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Registro": {
                        "type": "object",
                        "properties": {
                            "username": { "type": "string", "maxLength": 150 },
                            "email": { "type": "string", "format": "email", "maxLength": 254 },
                            "password": { "type": "string", "maxLength": 128, "writeOnly": true }
                        },
                        "required": ["username", "password"]
                    },
                    "RegistroRespuesta": {
                        "type": "object",
                        "properties": {
                            "message": { "type": "string" },
                            "usuario": {
                                "type": "object",
                                "properties": {
                                    "username": { "type": "string" },
                                    "email": { "type": "string" }
                                }
                            }
                        }
                    },
                    "Credenciales": {
                        "type": "object",
                        "properties": {
                            "username": { "type": "string" },
                            "password": { "type": "string" }
                        },
                        "required": ["username", "password"]
                    },
                    "RefreshToken": {
                        "type": "object",
                        "properties": { "refresh": { "type": "string" } },
                        "required": ["refresh"]
                    },
                    "TokenPair": {
                        "type": "object",
                        "properties": {
                            "access": { "type": "string" },
                            "refresh": { "type": "string" }
                        },
                        "required": ["access"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        let mut migrations = vec![Migration {
            id: "001_users",
            up: r#"
                CREATE TABLE users (
                    id            INTEGER PRIMARY KEY AUTOINCREMENT,
                    username      TEXT NOT NULL UNIQUE,
                    email         TEXT NOT NULL DEFAULT '',
                    password_hash TEXT NOT NULL,
                    is_active     INTEGER NOT NULL DEFAULT 1,
                    date_joined   TEXT NOT NULL
                );
                "#,
        }];
        migrations.extend(biblioteca_authz::migrations());
        migrations
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "accounts module stopped");
        Ok(())
    }
}

/// Create a new instance of the accounts module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(CuentasModule::new())
}
