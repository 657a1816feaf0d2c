//! Catalogue: genres, authors, books and ratings.

pub mod models;
pub mod resource;
pub mod routes;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use biblioteca_kernel::{InitCtx, Migration, Module};
use serde_json::{json, Value};

use super::AppState;
use models::{Author, Book, Genre, Rating};
use resource::Resource;

pub struct LibrosModule;

impl LibrosModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for LibrosModule {
    fn name(&self) -> &'static str {
        "libros"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "catalogue module initialized"
        );
        Ok(())
    }

    fn routes(&self, ctx: &InitCtx<'_>) -> Router {
        Router::new()
            .merge(routes::resource_routes::<Genre>())
            .merge(routes::resource_routes::<Author>())
            .merge(routes::resource_routes::<Book>())
            .merge(routes::resource_routes::<Rating>())
            .with_state(AppState::from_ctx(ctx))
    }

    fn openapi(&self) -> Option<Value> {
        let mut paths = serde_json::Map::new();
        for (path, tag, schema) in [
            (Genre::PATH, "Generos", "Genero"),
            (Author::PATH, "Autores", "Autor"),
            (Book::PATH, "Libros", "Libro"),
            (Rating::PATH, "Calificaciones", "Calificacion"),
        ] {
            let (collection, item) = resource_paths(tag, schema);
            paths.insert(path.to_string(), collection);
            paths.insert(format!("{path}/{{id}}"), item);
        }

        Some(json!({
            "paths": paths,
            "components": {
                "schemas": {
                    "Genero": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "readOnly": true },
                            "nombre": { "type": "string", "maxLength": 100 }
                        },
                        "required": ["nombre"]
                    },
                    "Autor": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "readOnly": true },
                            "nombre": { "type": "string", "maxLength": 100 },
                            "nacionalidad": { "type": "string", "maxLength": 100 }
                        },
                        "required": ["nombre", "nacionalidad"]
                    },
                    "Libro": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "readOnly": true },
                            "titulo": { "type": "string", "maxLength": 200 },
                            "autor": { "type": "integer", "description": "Author id" },
                            "genero": { "type": "integer", "description": "Genre id" },
                            "fecha_publicacion": { "type": "string", "format": "date" },
                            "isbn": { "type": "string", "maxLength": 13 },
                            "url": { "type": ["string", "null"], "format": "uri", "maxLength": 200 }
                        },
                        "required": ["titulo", "autor", "genero", "fecha_publicacion", "isbn"]
                    },
                    "Calificacion": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "readOnly": true },
                            "libro": { "type": "integer", "description": "Book id" },
                            "calificacion": { "type": "integer", "minimum": 1, "maximum": 5 }
                        },
                        "required": ["libro", "calificacion"]
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_catalogue",
            up: r#"
                CREATE TABLE genres (
                    id   INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL
                );
                CREATE TABLE authors (
                    id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    name        TEXT NOT NULL,
                    nationality TEXT NOT NULL
                );
                CREATE TABLE books (
                    id           INTEGER PRIMARY KEY AUTOINCREMENT,
                    title        TEXT NOT NULL,
                    author_id    INTEGER NOT NULL REFERENCES authors (id) ON DELETE CASCADE,
                    genre_id     INTEGER NOT NULL REFERENCES genres (id) ON DELETE CASCADE,
                    published_on TEXT NOT NULL,
                    isbn         TEXT NOT NULL UNIQUE,
                    url          TEXT
                );
                CREATE INDEX books_author_id ON books (author_id);
                CREATE INDEX books_genre_id ON books (genre_id);
                CREATE TABLE ratings (
                    id      INTEGER PRIMARY KEY AUTOINCREMENT,
                    book_id INTEGER NOT NULL REFERENCES books (id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                    score   INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5)
                );
                CREATE INDEX ratings_book_id ON ratings (book_id);
                CREATE INDEX ratings_user_id ON ratings (user_id);
                "#,
        }]
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "catalogue module stopped");
        Ok(())
    }
}

/// OpenAPI path items for a collection and its `{id}` item route
fn resource_paths(tag: &str, schema: &str) -> (Value, Value) {
    let reference = json!({ "$ref": format!("#/components/schemas/{schema}") });
    let body = json!({
        "required": true,
        "content": { "application/json": { "schema": reference } }
    });
    let one = json!({
        "description": schema,
        "content": { "application/json": { "schema": reference } }
    });
    let error = json!({
        "content": {
            "application/json": { "schema": { "$ref": "#/components/schemas/ErrorResponse" } }
        }
    });
    let with_description = |description: &str| {
        let mut response = error.clone();
        response["description"] = json!(description);
        response
    };
    let invalid = json!({
        "description": "Validation error",
        "content": {
            "application/json": { "schema": { "$ref": "#/components/schemas/ValidationErrors" } }
        }
    });
    let secured = json!([{ "bearerAuth": [] }]);
    let id_param = json!([{
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "integer" }
    }]);

    let collection = json!({
        "get": {
            "summary": format!("List {tag}"),
            "tags": [tag],
            "responses": {
                "200": {
                    "description": format!("All {tag} ordered by id"),
                    "content": {
                        "application/json": { "schema": { "type": "array", "items": reference } }
                    }
                }
            }
        },
        "post": {
            "summary": format!("Create {schema}"),
            "tags": [tag],
            "security": secured,
            "requestBody": body,
            "responses": {
                "201": one,
                "400": invalid,
                "401": with_description("Authentication required")
            }
        }
    });

    let write = |summary: String| {
        json!({
            "summary": summary,
            "tags": [tag],
            "security": secured,
            "parameters": id_param,
            "requestBody": body,
            "responses": {
                "200": one,
                "400": invalid,
                "401": with_description("Authentication required"),
                "404": with_description("Not found")
            }
        })
    };

    let item = json!({
        "get": {
            "summary": format!("Retrieve {schema}"),
            "tags": [tag],
            "parameters": id_param,
            "responses": {
                "200": one,
                "404": with_description("Not found")
            }
        },
        "put": write(format!("Replace {schema}")),
        "patch": write(format!("Update {schema} fields")),
        "delete": {
            "summary": format!("Delete {schema}"),
            "tags": [tag],
            "security": secured,
            "parameters": id_param,
            "responses": {
                "204": { "description": "Deleted" },
                "401": with_description("Authentication required"),
                "404": with_description("Not found")
            }
        }
    });

    (collection, item)
}

/// Create a new instance of the catalogue module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(LibrosModule::new())
}
