//! Table-backed catalogue resources.
//!
//! Each record type knows its table, how to validate an incoming JSON
//! object and how to persist the validated input. Listing, fetching and
//! deleting are shared.

use async_trait::async_trait;
use biblioteca_http::{AppError, Fields};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{sqlite::SqliteRow, FromRow, SqlitePool};

use super::models::{
    Author, AuthorForm, AuthorInput, Book, BookForm, BookInput, Genre, GenreForm, GenreInput,
    Rating, RatingForm, RatingInput,
};

pub const ISBN_TAKEN: &str = "book with this isbn already exists.";

#[async_trait]
pub trait Resource: Serialize + for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static {
    type Input: Send + 'static;

    /// Route segment under `/api`
    const PATH: &'static str;
    const TABLE: &'static str;
    const COLUMNS: &'static str;

    /// Validate a complete representation. `current` is the id being
    /// replaced, if any, so uniqueness checks can skip it.
    async fn validate(
        pool: &SqlitePool,
        data: &Map<String, Value>,
        current: Option<i64>,
    ) -> Result<Self::Input, AppError>;

    /// Insert and return the new id; `owner` is the authenticated caller
    async fn insert(pool: &SqlitePool, input: Self::Input, owner: i64) -> Result<i64, AppError>;

    async fn update(pool: &SqlitePool, id: i64, input: Self::Input) -> Result<(), AppError>;
}

pub async fn list<R: Resource>(pool: &SqlitePool) -> Result<Vec<R>, sqlx::Error> {
    sqlx::query_as::<_, R>(&format!(
        "SELECT {} FROM {} ORDER BY id",
        R::COLUMNS,
        R::TABLE
    ))
    .fetch_all(pool)
    .await
}

pub async fn fetch<R: Resource>(pool: &SqlitePool, id: i64) -> Result<Option<R>, sqlx::Error> {
    sqlx::query_as::<_, R>(&format!(
        "SELECT {} FROM {} WHERE id = ?",
        R::COLUMNS,
        R::TABLE
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Delete a row; `false` when nothing matched
pub async fn delete<R: Resource>(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", R::TABLE))
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn row_exists(pool: &SqlitePool, table: &str, id: i64) -> Result<bool, sqlx::Error> {
    let hit: Option<i64> = sqlx::query_scalar(&format!("SELECT 1 FROM {table} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(hit.is_some())
}

/// Read a primary key field and check the referenced row exists
async fn existing_pk(
    pool: &SqlitePool,
    fields: &mut Fields<'_>,
    name: &str,
    table: &str,
) -> Result<Option<i64>, AppError> {
    let Some(id) = fields.required_pk(name) else {
        return Ok(None);
    };
    if row_exists(pool, table, id).await? {
        Ok(Some(id))
    } else {
        fields.reject(name, format!("Invalid pk \"{id}\" - object does not exist."));
        Ok(None)
    }
}

fn incomplete(table: &str) -> AppError {
    AppError::Internal(anyhow::anyhow!(
        "{table} input incomplete after successful validation"
    ))
}

fn isbn_conflict(err: sqlx::Error) -> AppError {
    if err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        AppError::field("isbn", ISBN_TAKEN)
    } else {
        AppError::from(err)
    }
}

#[async_trait]
impl Resource for Genre {
    type Input = GenreInput;

    const PATH: &'static str = "/generos";
    const TABLE: &'static str = "genres";
    const COLUMNS: &'static str = "id, name";

    async fn validate(
        _pool: &SqlitePool,
        data: &Map<String, Value>,
        _current: Option<i64>,
    ) -> Result<GenreInput, AppError> {
        let mut fields = Fields::new(data);
        let form = GenreForm {
            nombre: fields.required_string("nombre"),
        };
        fields.check(&form);
        fields.finish()?;

        let name = form.nombre.ok_or_else(|| incomplete(Self::TABLE))?;
        Ok(GenreInput { name })
    }

    async fn insert(pool: &SqlitePool, input: GenreInput, _owner: i64) -> Result<i64, AppError> {
        let id = sqlx::query_scalar("INSERT INTO genres (name) VALUES (?) RETURNING id")
            .bind(input.name)
            .fetch_one(pool)
            .await?;
        Ok(id)
    }

    async fn update(pool: &SqlitePool, id: i64, input: GenreInput) -> Result<(), AppError> {
        sqlx::query("UPDATE genres SET name = ? WHERE id = ?")
            .bind(input.name)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for Author {
    type Input = AuthorInput;

    const PATH: &'static str = "/autores";
    const TABLE: &'static str = "authors";
    const COLUMNS: &'static str = "id, name, nationality";

    async fn validate(
        _pool: &SqlitePool,
        data: &Map<String, Value>,
        _current: Option<i64>,
    ) -> Result<AuthorInput, AppError> {
        let mut fields = Fields::new(data);
        let form = AuthorForm {
            nombre: fields.required_string("nombre"),
            nacionalidad: fields.required_string("nacionalidad"),
        };
        fields.check(&form);
        fields.finish()?;

        let AuthorForm {
            nombre: Some(name),
            nacionalidad: Some(nationality),
        } = form
        else {
            return Err(incomplete(Self::TABLE));
        };
        Ok(AuthorInput { name, nationality })
    }

    async fn insert(pool: &SqlitePool, input: AuthorInput, _owner: i64) -> Result<i64, AppError> {
        let id = sqlx::query_scalar(
            "INSERT INTO authors (name, nationality) VALUES (?, ?) RETURNING id",
        )
        .bind(input.name)
        .bind(input.nationality)
        .fetch_one(pool)
        .await?;
        Ok(id)
    }

    async fn update(pool: &SqlitePool, id: i64, input: AuthorInput) -> Result<(), AppError> {
        sqlx::query("UPDATE authors SET name = ?, nationality = ? WHERE id = ?")
            .bind(input.name)
            .bind(input.nationality)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for Book {
    type Input = BookInput;

    const PATH: &'static str = "/libros";
    const TABLE: &'static str = "books";
    const COLUMNS: &'static str = "id, title, author_id, genre_id, published_on, isbn, url";

    async fn validate(
        pool: &SqlitePool,
        data: &Map<String, Value>,
        current: Option<i64>,
    ) -> Result<BookInput, AppError> {
        let mut fields = Fields::new(data);
        let title = fields.required_string("titulo");
        let author_id = existing_pk(pool, &mut fields, "autor", "authors").await?;
        let genre_id = existing_pk(pool, &mut fields, "genero", "genres").await?;
        let published_on = fields.required_date("fecha_publicacion");
        let isbn = fields.required_string("isbn");
        let url = fields.nullable_string("url");

        let form = BookForm {
            titulo: title,
            isbn,
            url: url.clone().filter(|u| !u.is_empty()),
        };
        fields.check(&form);
        let BookForm {
            titulo: title,
            isbn,
            ..
        } = form;

        if let Some(isbn) = isbn.as_deref().filter(|_| !fields.has_error("isbn")) {
            let taken: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM books WHERE isbn = ? AND id IS NOT ?")
                    .bind(isbn)
                    .bind(current)
                    .fetch_optional(pool)
                    .await?;
            if taken.is_some() {
                fields.reject("isbn", ISBN_TAKEN);
            }
        }

        fields.finish()?;

        let (Some(title), Some(author_id), Some(genre_id), Some(published_on), Some(isbn)) =
            (title, author_id, genre_id, published_on, isbn)
        else {
            return Err(incomplete(Self::TABLE));
        };
        Ok(BookInput {
            title,
            author_id,
            genre_id,
            published_on,
            isbn,
            url,
        })
    }

    async fn insert(pool: &SqlitePool, input: BookInput, _owner: i64) -> Result<i64, AppError> {
        sqlx::query_scalar(
            "INSERT INTO books (title, author_id, genre_id, published_on, isbn, url)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(input.title)
        .bind(input.author_id)
        .bind(input.genre_id)
        .bind(input.published_on)
        .bind(input.isbn)
        .bind(input.url)
        .fetch_one(pool)
        .await
        .map_err(isbn_conflict)
    }

    async fn update(pool: &SqlitePool, id: i64, input: BookInput) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE books
             SET title = ?, author_id = ?, genre_id = ?, published_on = ?, isbn = ?, url = ?
             WHERE id = ?",
        )
        .bind(input.title)
        .bind(input.author_id)
        .bind(input.genre_id)
        .bind(input.published_on)
        .bind(input.isbn)
        .bind(input.url)
        .bind(id)
        .execute(pool)
        .await
        .map_err(isbn_conflict)?;
        Ok(())
    }
}

#[async_trait]
impl Resource for Rating {
    type Input = RatingInput;

    const PATH: &'static str = "/calificaciones";
    const TABLE: &'static str = "ratings";
    const COLUMNS: &'static str = "id, book_id, score, user_id";

    async fn validate(
        pool: &SqlitePool,
        data: &Map<String, Value>,
        _current: Option<i64>,
    ) -> Result<RatingInput, AppError> {
        let mut fields = Fields::new(data);
        let book_id = existing_pk(pool, &mut fields, "libro", "books").await?;
        let form = RatingForm {
            calificacion: fields.required_int("calificacion"),
        };
        fields.check(&form);
        fields.finish()?;

        let (Some(book_id), Some(score)) = (book_id, form.calificacion) else {
            return Err(incomplete(Self::TABLE));
        };
        Ok(RatingInput { book_id, score })
    }

    /// The owner always comes from the caller, never from the payload
    async fn insert(pool: &SqlitePool, input: RatingInput, owner: i64) -> Result<i64, AppError> {
        let id = sqlx::query_scalar(
            "INSERT INTO ratings (book_id, user_id, score) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(input.book_id)
        .bind(owner)
        .bind(input.score)
        .fetch_one(pool)
        .await?;
        Ok(id)
    }

    async fn update(pool: &SqlitePool, id: i64, input: RatingInput) -> Result<(), AppError> {
        sqlx::query("UPDATE ratings SET book_id = ?, score = ? WHERE id = ?")
            .bind(input.book_id)
            .bind(input.score)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
