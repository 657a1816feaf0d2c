use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use biblioteca_app::App;
use biblioteca_kernel::settings::Settings;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn test_app() -> App {
    let mut settings = Settings::default();
    settings.database.url = "sqlite::memory:".to_string();
    settings.auth.secret_key = "test-secret".to_string();
    settings.auth.bcrypt_cost = 4;
    App::bootstrap(settings).await.unwrap()
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

/// Register a user and return its access and refresh tokens
async fn login(router: &Router, username: &str) -> (String, String) {
    let (status, _) = send(
        router,
        Method::POST,
        "/api/registro",
        None,
        Some(json!({"username": username, "email": "lector@example.com", "password": "s3creta"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        router,
        Method::POST,
        "/api/token",
        None,
        Some(json!({"username": username, "password": "s3creta"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (
        body["access"].as_str().unwrap().to_string(),
        body["refresh"].as_str().unwrap().to_string(),
    )
}

/// Create an author, a genre and a book, returning the book id
async fn seed_book(router: &Router, token: &str, isbn: &str) -> i64 {
    let (_, genre) = send(
        router,
        Method::POST,
        "/api/generos",
        Some(token),
        Some(json!({"nombre": "Novela"})),
    )
    .await;
    let (_, author) = send(
        router,
        Method::POST,
        "/api/autores",
        Some(token),
        Some(json!({"nombre": "Gabriel García Márquez", "nacionalidad": "Colombiana"})),
    )
    .await;
    let (status, book) = send(
        router,
        Method::POST,
        "/api/libros",
        Some(token),
        Some(json!({
            "titulo": "Cien años de soledad",
            "autor": author["id"],
            "genero": genre["id"],
            "fecha_publicacion": "1967-05-30",
            "isbn": isbn,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{book}");
    book["id"].as_i64().unwrap()
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = test_app().await;
    let (status, body) = send(&app.router(), Method::GET, "/healthz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn registration_returns_public_user() {
    let app = test_app().await;
    let router = app.router();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/registro",
        None,
        Some(json!({"username": "ana", "email": "ana@example.com", "password": "clave"})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Usuario creado con éxito.");
    assert_eq!(body["usuario"], json!({"username": "ana", "email": "ana@example.com"}));
}

#[tokio::test]
async fn registration_reports_field_errors() {
    let app = test_app().await;
    let router = app.router();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/registro",
        None,
        Some(json!({"username": "con espacios", "email": "no-es-correo"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"][0].as_str().unwrap().starts_with("Enter a valid username"));
    assert_eq!(body["email"][0], "Enter a valid email address.");
    assert_eq!(body["password"][0], "This field is required.");
}

#[tokio::test]
async fn registration_email_follows_address_rules() {
    let app = test_app().await;
    let router = app.router();

    for email in ["a..b@x.org", "a(b)@x.org", "<a>@x.org", ".a@x.org"] {
        let (status, body) = send(
            &router,
            Method::POST,
            "/api/registro",
            None,
            Some(json!({"username": "ana", "email": email, "password": "clave"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{email}");
        assert_eq!(body["email"][0], "Enter a valid email address.", "{email}");
    }

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/registro",
        None,
        Some(json!({"username": "ana", "email": "user@[192.168.0.1]", "password": "clave"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["usuario"]["email"], "user@[192.168.0.1]");
}

#[tokio::test]
async fn registration_email_may_be_blank_but_not_null() {
    let app = test_app().await;
    let router = app.router();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/registro",
        None,
        Some(json!({"username": "ana", "email": null, "password": "clave"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["email"][0], "This field may not be null.");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/registro",
        None,
        Some(json!({"username": "ana", "email": "", "password": "clave"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["usuario"]["email"], "");
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let app = test_app().await;
    let router = app.router();
    login(&router, "ana").await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/registro",
        None,
        Some(json!({"username": "ana", "password": "otra"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["username"][0], "A user with that username already exists.");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = test_app().await;
    let router = app.router();
    login(&router, "ana").await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/token",
        None,
        Some(json!({"username": "ana", "password": "incorrecta"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["error"]["message"],
        "No active account found with the given credentials"
    );
}

#[tokio::test]
async fn refresh_rotates_and_blacklists_the_old_token() {
    let app = test_app().await;
    let router = app.router();
    let (_, refresh) = login(&router, "ana").await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/token/refresh",
        None,
        Some(json!({"refresh": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access"].is_string());
    let rotated = body["refresh"].as_str().unwrap().to_string();
    assert_ne!(rotated, refresh);

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/token/refresh",
        None,
        Some(json!({"refresh": refresh})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "token_not_valid");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/token/blacklist",
        None,
        Some(json!({"refresh": rotated})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/token/refresh",
        None,
        Some(json!({"refresh": rotated})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_requires_the_field() {
    let app = test_app().await;
    let (status, body) = send(
        &app.router(),
        Method::POST,
        "/api/token/refresh",
        None,
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["refresh"][0], "This field is required.");
}

#[tokio::test]
async fn writes_require_a_token_but_reads_do_not() {
    let app = test_app().await;
    let router = app.router();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/generos",
        None,
        Some(json!({"nombre": "Poesía"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "not_authenticated");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/generos",
        Some("basura"),
        Some(json!({"nombre": "Poesía"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "token_not_valid");

    let (status, body) = send(&router, Method::GET, "/api/generos", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let app = test_app().await;
    let router = app.router();
    let (_, refresh) = login(&router, "ana").await;

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/generos",
        Some(&refresh),
        Some(json!({"nombre": "Poesía"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn genre_crud_round_trip() {
    let app = test_app().await;
    let router = app.router();
    let (token, _) = login(&router, "ana").await;

    let (status, created) = send(
        &router,
        Method::POST,
        "/api/generos",
        Some(&token),
        Some(json!({"nombre": "  Ensayo "})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["nombre"], "Ensayo");
    let uri = format!("/api/generos/{}", created["id"]);

    let (status, fetched) = send(&router, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = send(
        &router,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({"nombre": "Ensayo literario"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["nombre"], "Ensayo literario");

    let (status, body) = send(&router, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&router, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn keys(value: &Value) -> Vec<&str> {
    let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

#[tokio::test]
async fn catalogue_records_carry_exactly_their_fields() {
    let app = test_app().await;
    let router = app.router();
    let (token, _) = login(&router, "ana").await;

    let (status, genre) = send(
        &router,
        Method::POST,
        "/api/generos",
        Some(&token),
        Some(json!({"nombre": "Cuento", "extra": "ignorado"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(keys(&genre), ["id", "nombre"]);

    let (status, author) = send(
        &router,
        Method::POST,
        "/api/autores",
        Some(&token),
        Some(json!({"nombre": "Julio Cortázar", "nacionalidad": "Argentina"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(keys(&author), ["id", "nacionalidad", "nombre"]);

    let (status, book) = send(
        &router,
        Method::POST,
        "/api/libros",
        Some(&token),
        Some(json!({
            "titulo": "Bestiario",
            "autor": author["id"],
            "genero": genre["id"],
            "fecha_publicacion": "1951-01-01",
            "isbn": "9788466331906",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{book}");
    let book_fields = [
        "autor",
        "fecha_publicacion",
        "genero",
        "id",
        "isbn",
        "titulo",
        "url",
    ];
    assert_eq!(keys(&book), book_fields);
    assert_eq!(book["url"], Value::Null);

    for (uri, expected) in [
        ("/api/generos", vec!["id", "nombre"]),
        ("/api/autores", vec!["id", "nacionalidad", "nombre"]),
        ("/api/libros", book_fields.to_vec()),
    ] {
        let (status, list) = send(&router, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        let records = list.as_array().unwrap();
        assert_eq!(records.len(), 1, "{uri}");
        assert_eq!(keys(&records[0]), expected, "{uri}");
    }

    let (_, books) = send(&router, Method::GET, "/api/libros", None, None).await;
    assert_eq!(books[0]["url"], Value::Null);
}

#[tokio::test]
async fn unknown_or_malformed_ids_are_not_found() {
    let app = test_app().await;
    let router = app.router();

    let (status, body) = send(&router, Method::GET, "/api/libros/999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Not found.");

    let (status, _) = send(&router, Method::GET, "/api/autores/abc", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn book_validation_checks_references_and_isbn() {
    let app = test_app().await;
    let router = app.router();
    let (token, _) = login(&router, "ana").await;
    seed_book(&router, &token, "9780307474728").await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/libros",
        Some(&token),
        Some(json!({
            "titulo": "Otro",
            "autor": 42,
            "genero": 1,
            "fecha_publicacion": "30/05/1967",
            "isbn": "9780307474728",
            "url": "no es url",
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["autor"][0], "Invalid pk \"42\" - object does not exist.");
    assert!(body.get("genero").is_none());
    assert!(body["fecha_publicacion"][0].is_string());
    assert!(body["isbn"][0].is_string());
    assert!(body["url"][0].is_string());
}

#[tokio::test]
async fn book_partial_update_keeps_other_fields() {
    let app = test_app().await;
    let router = app.router();
    let (token, _) = login(&router, "ana").await;
    let book = seed_book(&router, &token, "9780307474728").await;
    let uri = format!("/api/libros/{book}");

    let (status, body) = send(
        &router,
        Method::PATCH,
        &uri,
        Some(&token),
        Some(json!({"url": "https://example.com/cien-anos"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["titulo"], "Cien años de soledad");
    assert_eq!(body["isbn"], "9780307474728");
    assert_eq!(body["fecha_publicacion"], "1967-05-30");
    assert_eq!(body["url"], "https://example.com/cien-anos");
}

#[tokio::test]
async fn rating_owner_comes_from_the_token() {
    let app = test_app().await;
    let router = app.router();
    let (token, _) = login(&router, "ana").await;
    let book = seed_book(&router, &token, "9780307474728").await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/calificaciones",
        Some(&token),
        Some(json!({"libro": book, "calificacion": 5, "usuario": 999})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["libro"], book);
    assert_eq!(body["calificacion"], 5);
    assert!(body.get("usuario").is_none());

    let owner: i64 = sqlx::query_scalar("SELECT user_id FROM ratings WHERE id = ?")
        .bind(body["id"].as_i64().unwrap())
        .fetch_one(app.db().pool())
        .await
        .unwrap();
    let ana: i64 = sqlx::query_scalar("SELECT id FROM users WHERE username = 'ana'")
        .fetch_one(app.db().pool())
        .await
        .unwrap();
    assert_eq!(owner, ana);
}

#[tokio::test]
async fn rating_score_must_be_in_range() {
    let app = test_app().await;
    let router = app.router();
    let (token, _) = login(&router, "ana").await;
    let book = seed_book(&router, &token, "9780307474728").await;

    for score in [json!(0), json!(6), json!("cinco")] {
        let (status, body) = send(
            &router,
            Method::POST,
            "/api/calificaciones",
            Some(&token),
            Some(json!({"libro": book, "calificacion": score})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["calificacion"][0].is_string());
    }
}

#[tokio::test]
async fn deleting_a_genre_cascades_to_its_books() {
    let app = test_app().await;
    let router = app.router();
    let (token, _) = login(&router, "ana").await;
    let book = seed_book(&router, &token, "9780307474728").await;

    let (_, fetched) = send(&router, Method::GET, &format!("/api/libros/{book}"), None, None).await;
    let genre_uri = format!("/api/generos/{}", fetched["genero"]);
    let (status, _) = send(&router, Method::DELETE, &genre_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, books) = send(&router, Method::GET, "/api/libros", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(books, json!([]));
}

#[tokio::test]
async fn non_object_body_is_rejected() {
    let app = test_app().await;
    let router = app.router();
    let (token, _) = login(&router, "ana").await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/generos",
        Some(&token),
        Some(json!(["Novela"])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["non_field_errors"][0],
        "Invalid data. Expected a dictionary, but got list."
    );
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = test_app().await;
    let (status, body) = send(&app.router(), Method::GET, "/docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/libros/{id}"].is_object());
    assert!(body["paths"]["/api/token/refresh"].is_object());
}

#[tokio::test]
async fn access_token_cannot_be_refreshed() {
    let app = test_app().await;
    let router = app.router();
    let (access, _) = login(&router, "ana").await;

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/token/refresh",
        None,
        Some(json!({"refresh": access})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "token_not_valid");
}
