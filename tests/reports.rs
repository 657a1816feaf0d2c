use biblioteca_app::{
    reports::{queries, REPORT_FILES},
    App,
};
use biblioteca_kernel::settings::Settings;
use sqlx::SqlitePool;

async fn test_app(output_dir: &std::path::Path) -> App {
    let mut settings = Settings::default();
    settings.database.url = "sqlite::memory:".to_string();
    settings.auth.secret_key = "test-secret".to_string();
    settings.auth.bcrypt_cost = 4;
    settings.reports.output_dir = output_dir.join("graficos").display().to_string();
    App::bootstrap(settings).await.unwrap()
}

async fn execute(pool: &SqlitePool, sql: &str) {
    sqlx::raw_sql(sql).execute(pool).await.unwrap();
}

#[tokio::test]
async fn empty_catalogue_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;

    let summary = app.generate_reports().await.unwrap();

    assert!(summary.written.is_empty());
    assert_eq!(summary.skipped, REPORT_FILES.to_vec());
    assert!(dir.path().join("graficos").is_dir());
}

#[tokio::test]
async fn authors_without_books_still_chart() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;
    execute(
        app.db().pool(),
        "INSERT INTO authors (name, nationality) VALUES ('Borges', 'Argentina');",
    )
    .await;

    let summary = app.generate_reports().await.unwrap();

    assert_eq!(summary.written.len(), 1);
    assert!(summary.written[0].ends_with("2_libros_por_autor.png"));
    assert!(summary.written[0].is_file());
}

#[tokio::test]
async fn full_catalogue_writes_every_report() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;
    execute(
        app.db().pool(),
        "INSERT INTO users (username, email, password_hash, date_joined)
         VALUES ('ana', '', 'x', '2024-01-01T00:00:00Z'),
                ('luis', '', 'x', '2024-01-01T00:00:00Z');
         INSERT INTO genres (name) VALUES ('Novela'), ('Cuento');
         INSERT INTO authors (name, nationality)
         VALUES ('García Márquez', 'Colombiana'), ('Cortázar', 'Argentina');
         INSERT INTO books (title, author_id, genre_id, published_on, isbn)
         VALUES ('Cien años de soledad', 1, 1, '1967-05-30', '9780307474728'),
                ('Rayuela', 2, 1, '1963-06-28', '9788437604572'),
                ('Bestiario', 2, 2, '1951-01-01', '9788466331906');
         INSERT INTO ratings (book_id, user_id, score)
         VALUES (1, 1, 5), (1, 2, 4), (2, 1, 3), (3, 2, 2), (3, 1, 5);",
    )
    .await;

    let summary = app.generate_reports().await.unwrap();

    assert!(summary.skipped.is_empty());
    assert_eq!(summary.written.len(), REPORT_FILES.len());
    for (path, name) in summary.written.iter().zip(REPORT_FILES) {
        assert!(path.ends_with(name));
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}

#[tokio::test]
async fn rerun_overwrites_previous_files() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;
    execute(
        app.db().pool(),
        "INSERT INTO genres (name) VALUES ('Novela');
         INSERT INTO authors (name, nationality) VALUES ('Rulfo', 'Mexicana');
         INSERT INTO books (title, author_id, genre_id, published_on, isbn)
         VALUES ('Pedro Páramo', 1, 1, '1955-03-19', '9788437604183');",
    )
    .await;

    let first = app.generate_reports().await.unwrap();
    let second = app.generate_reports().await.unwrap();

    assert_eq!(first.written, second.written);
    assert!(second
        .written
        .iter()
        .any(|p| p.ends_with("1_libros_por_genero.png")));
}

fn labels(series: &queries::Series) -> Vec<String> {
    series.iter().map(|(label, _)| label.clone()).collect()
}

#[tokio::test]
async fn author_ranking_keeps_the_ten_smallest_counts() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;
    let books_by_author = [3, 0, 2, 1, 4, 0, 5, 1, 2, 6, 3, 1];

    let mut sql = String::from("INSERT INTO genres (name) VALUES ('Novela');\n");
    for (i, count) in books_by_author.iter().enumerate() {
        let author = i + 1;
        sql.push_str(&format!(
            "INSERT INTO authors (name, nationality) VALUES ('Autor {author:02}', 'Chilena');\n"
        ));
        for n in 0..*count {
            sql.push_str(&format!(
                "INSERT INTO books (title, author_id, genre_id, published_on, isbn)
                 VALUES ('Libro {author}-{n}', {author}, 1, '2000-01-01', '{author:03}{n:010}');\n"
            ));
        }
    }
    execute(app.db().pool(), &sql).await;

    let series = queries::books_per_author(app.db().pool()).await.unwrap();

    assert_eq!(
        labels(&series),
        [
            "Autor 02", "Autor 06", "Autor 04", "Autor 08", "Autor 12", "Autor 03", "Autor 09",
            "Autor 01", "Autor 11", "Autor 05",
        ]
    );
    let totals: Vec<f64> = series.iter().map(|(_, total)| *total).collect();
    assert_eq!(totals, [0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0]);
}

#[tokio::test]
async fn rated_book_ranking_keeps_the_ten_smallest_counts() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path()).await;
    let ratings_by_book = [6, 1, 2, 5, 3, 1, 4, 6, 2, 1, 5, 3, 0];

    let mut sql = String::from(
        "INSERT INTO genres (name) VALUES ('Poesía');
         INSERT INTO authors (name, nationality) VALUES ('Mistral', 'Chilena');\n",
    );
    for user in 1..=6 {
        sql.push_str(&format!(
            "INSERT INTO users (username, email, password_hash, date_joined)
             VALUES ('lector{user}', '', 'x', '2024-01-01T00:00:00Z');\n"
        ));
    }
    for (i, count) in ratings_by_book.iter().enumerate() {
        let book = i + 1;
        sql.push_str(&format!(
            "INSERT INTO books (title, author_id, genre_id, published_on, isbn)
             VALUES ('Libro {book:02}', 1, 1, '1945-01-01', '{book:013}');\n"
        ));
        for user in 1..=*count {
            sql.push_str(&format!(
                "INSERT INTO ratings (book_id, user_id, score) VALUES ({book}, {user}, 4);\n"
            ));
        }
    }
    execute(app.db().pool(), &sql).await;

    let series = queries::most_rated_books(app.db().pool()).await.unwrap();

    assert_eq!(
        labels(&series),
        [
            "Libro 02", "Libro 06", "Libro 10", "Libro 03", "Libro 09", "Libro 05", "Libro 12",
            "Libro 07", "Libro 04", "Libro 11",
        ]
    );
    let totals: Vec<f64> = series.iter().map(|(_, total)| *total).collect();
    assert_eq!(totals, [1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 5.0, 5.0]);
}
