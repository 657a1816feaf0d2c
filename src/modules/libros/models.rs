//! Catalogue records. Field names on the wire follow the public API.

use chrono::NaiveDate;
use serde::Serialize;
use validator::Validate;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Genre {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Author {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "nacionalidad")]
    pub nationality: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Book {
    pub id: i64,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "autor")]
    pub author_id: i64,
    #[serde(rename = "genero")]
    pub genre_id: i64,
    #[serde(rename = "fecha_publicacion")]
    pub published_on: NaiveDate,
    pub isbn: String,
    pub url: Option<String>,
}

/// A user's score for a book. The owner is never serialized.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Rating {
    pub id: i64,
    #[serde(rename = "libro")]
    pub book_id: i64,
    #[serde(rename = "calificacion")]
    pub score: i64,
    #[serde(skip)]
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct GenreInput {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct AuthorInput {
    pub name: String,
    pub nationality: String,
}

#[derive(Debug, Clone)]
pub struct BookInput {
    pub title: String,
    pub author_id: i64,
    pub genre_id: i64,
    pub published_on: NaiveDate,
    pub isbn: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RatingInput {
    pub book_id: i64,
    pub score: i64,
}

// Value rules per resource, keyed by wire field name. Fields that could
// not be read are `None` and skip their rules.

#[derive(Debug, Validate)]
pub struct GenreForm {
    #[validate(length(max = 100))]
    pub nombre: Option<String>,
}

#[derive(Debug, Validate)]
pub struct AuthorForm {
    #[validate(length(max = 100))]
    pub nombre: Option<String>,
    #[validate(length(max = 100))]
    pub nacionalidad: Option<String>,
}

#[derive(Debug, Validate)]
pub struct BookForm {
    #[validate(length(max = 200))]
    pub titulo: Option<String>,
    #[validate(length(max = 13))]
    pub isbn: Option<String>,
    #[validate(
        length(max = 200),
        custom(
            function = "biblioteca_http::validation::web_url",
            message = "Enter a valid URL."
        )
    )]
    pub url: Option<String>,
}

#[derive(Debug, Validate)]
pub struct RatingForm {
    #[validate(range(min = 1, max = 5))]
    pub calificacion: Option<i64>,
}
