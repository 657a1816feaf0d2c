//! Aggregates behind the ten report charts

use sqlx::SqlitePool;

/// Label with a value, in chart order
pub type Series = Vec<(String, f64)>;

const TOP_N: i64 = 10;

async fn counts(pool: &SqlitePool, sql: &str) -> Result<Series, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(sql).fetch_all(pool).await?;
    Ok(rows
        .into_iter()
        .map(|(label, count)| (label, count as f64))
        .collect())
}

async fn averages(pool: &SqlitePool, sql: &str) -> Result<Series, sqlx::Error> {
    sqlx::query_as(sql).fetch_all(pool).await
}

/// Books per genre, genres without books left out
pub async fn books_per_genre(pool: &SqlitePool) -> Result<Series, sqlx::Error> {
    counts(
        pool,
        "SELECT g.name, COUNT(b.id) AS total
         FROM genres g JOIN books b ON b.genre_id = g.id
         GROUP BY g.id
         ORDER BY g.id",
    )
    .await
}

/// Ten authors with the fewest books, ascending
pub async fn books_per_author(pool: &SqlitePool) -> Result<Series, sqlx::Error> {
    counts(
        pool,
        &format!(
            "SELECT a.name, COUNT(b.id) AS total
             FROM authors a LEFT JOIN books b ON b.author_id = a.id
             GROUP BY a.id
             ORDER BY total ASC, a.id
             LIMIT {TOP_N}"
        ),
    )
    .await
}

/// Ten best rated books by mean score
pub async fn mean_rating_per_book(pool: &SqlitePool) -> Result<Series, sqlx::Error> {
    averages(
        pool,
        &format!(
            "SELECT b.title, AVG(r.score) AS mean
             FROM books b JOIN ratings r ON r.book_id = b.id
             GROUP BY b.id
             ORDER BY mean DESC, b.id
             LIMIT {TOP_N}"
        ),
    )
    .await
}

/// Mean score per genre that has ratings
pub async fn mean_rating_per_genre(pool: &SqlitePool) -> Result<Series, sqlx::Error> {
    averages(
        pool,
        "SELECT g.name, AVG(r.score) AS mean
         FROM genres g
         JOIN books b ON b.genre_id = g.id
         JOIN ratings r ON r.book_id = b.id
         GROUP BY g.id
         ORDER BY g.id",
    )
    .await
}

/// Number of ratings per user that rated anything
pub async fn ratings_per_user(pool: &SqlitePool) -> Result<Series, sqlx::Error> {
    counts(
        pool,
        "SELECT u.username, COUNT(r.id) AS total
         FROM users u JOIN ratings r ON r.user_id = u.id
         GROUP BY u.id
         ORDER BY u.id",
    )
    .await
}

/// Ten rated books with the fewest ratings, ascending
pub async fn most_rated_books(pool: &SqlitePool) -> Result<Series, sqlx::Error> {
    counts(
        pool,
        &format!(
            "SELECT b.title, COUNT(r.id) AS total
             FROM books b JOIN ratings r ON r.book_id = b.id
             GROUP BY b.id
             ORDER BY total ASC, b.id
             LIMIT {TOP_N}"
        ),
    )
    .await
}

/// Ten authors whose books collected the most ratings
pub async fn most_rated_authors(pool: &SqlitePool) -> Result<Series, sqlx::Error> {
    counts(
        pool,
        &format!(
            "SELECT a.name, COUNT(r.id) AS total
             FROM authors a
             JOIN books b ON b.author_id = a.id
             JOIN ratings r ON r.book_id = b.id
             GROUP BY a.id
             ORDER BY total DESC, a.id
             LIMIT {TOP_N}"
        ),
    )
    .await
}

/// Books published per calendar year, ascending
pub async fn books_per_year(pool: &SqlitePool) -> Result<Vec<(i64, f64)>, sqlx::Error> {
    let rows: Vec<(i64, i64)> = sqlx::query_as(
        "SELECT CAST(strftime('%Y', published_on) AS INTEGER) AS year, COUNT(*) AS total
         FROM books
         WHERE strftime('%Y', published_on) IS NOT NULL
         GROUP BY year
         ORDER BY year",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(year, total)| (year, total as f64))
        .collect())
}

/// Every rating score
pub async fn rating_scores(pool: &SqlitePool) -> Result<Vec<f64>, sqlx::Error> {
    sqlx::query_scalar("SELECT CAST(score AS REAL) FROM ratings ORDER BY id")
        .fetch_all(pool)
        .await
}

/// Mean score per user that rated anything
pub async fn mean_rating_per_user(pool: &SqlitePool) -> Result<Series, sqlx::Error> {
    averages(
        pool,
        "SELECT u.username, AVG(r.score) AS mean
         FROM users u JOIN ratings r ON r.user_id = u.id
         GROUP BY u.id
         ORDER BY u.id",
    )
    .await
}
