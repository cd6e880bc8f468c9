//! HTTP-level tests for staged uploads, links, operator retry and the
//! package archive download.

mod common;

use std::io::{Cursor, Read};

use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use common::{
    body_bytes, body_json, build_test_app, delete, get, post_empty, post_files, post_json,
    seed_package, wait_for_status, TestApp, COORDINATOR, OTHER_PROFESSOR, PROFESSOR,
};
use serde_json::{json, Value};
use sgpi_core::document::MAX_UPLOAD_ATTEMPTS;
use sqlx::PgPool;

fn package_id(package: &Value) -> i64 {
    package["id"].as_i64().unwrap()
}

async fn add_link(app: &TestApp, package_id: i64, title: &str, url: &str) -> Response<Body> {
    post_json(
        app,
        &format!("/api/v1/packages/{package_id}/links"),
        PROFESSOR,
        json!({ "title": title, "url": url }),
    )
    .await
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn upload_is_staged_then_relocated(pool: PgPool) {
    let app = build_test_app(pool).await;
    let package = seed_package(&app, "Provas P1").await;
    let id = package_id(&package);

    let response = post_files(
        &app,
        &format!("/api/v1/packages/{id}/documents"),
        PROFESSOR,
        &[("Relatório Final.pdf", "application/pdf", &b"%PDF-1.4 test"[..])],
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await["data"][0].clone();
    assert_eq!(created["status"], "PENDING");
    assert_eq!(created["original_name"], "Relatório Final.pdf");
    assert_eq!(created["size_bytes"], 13);
    let staged = created["local_staging_path"].as_str().unwrap().to_string();

    let done = wait_for_status(&app, created["id"].as_i64().unwrap(), "COMPLETED").await;
    assert_eq!(done["payload"]["kind"], "remote_object");
    assert!(done["local_staging_path"].is_null());
    assert!(!std::path::Path::new(&staged).exists(), "staged file removed");

    let container = package["remote_folder_id"].as_str().unwrap();
    let children = app.storage.children(Some(container)).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].1.name, "Relatorio_Final.pdf");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn upload_without_file_part_is_rejected(pool: PgPool) {
    let app = build_test_app(pool).await;
    let id = package_id(&seed_package(&app, "Provas P1").await);

    let response = post_files(&app, &format!("/api/v1/packages/{id}/documents"), PROFESSOR, &[]).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn oversized_part_rejects_whole_request(pool: PgPool) {
    let app = build_test_app(pool).await;
    let id = package_id(&seed_package(&app, "Provas P1").await);
    let too_big = vec![b'x'; 1024 * 1024 + 100 * 1024];

    let response = post_files(
        &app,
        &format!("/api/v1/packages/{id}/documents"),
        PROFESSOR,
        &[
            ("ok.pdf", "application/pdf", &b"%PDF-1.4 ok"[..]),
            ("video.mp4", "video/mp4", &too_big[..]),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents WHERE package_id = $1")
        .bind(id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);

    let leftovers = std::fs::read_dir(&app.staging_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0, "staged parts are removed");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn other_professor_cannot_upload(pool: PgPool) {
    let app = build_test_app(pool).await;
    let id = package_id(&seed_package(&app, "Provas P1").await);

    let response = post_files(
        &app,
        &format!("/api/v1/packages/{id}/documents"),
        OTHER_PROFESSOR,
        &[("a.pdf", "application/pdf", &b"a"[..])],
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn link_is_completed_immediately(pool: PgPool) {
    let app = build_test_app(pool).await;
    let id = package_id(&seed_package(&app, "Provas P1").await);

    let response = add_link(&app, id, "Vídeo aula", "https://example.org/aula").await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "COMPLETED");
    assert_eq!(json["data"]["original_name"], "Vídeo aula.url");
    assert_eq!(json["data"]["payload"]["kind"], "external_link");
    assert_eq!(json["data"]["payload"]["value"], "https://example.org/aula");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn link_with_bad_scheme_is_rejected(pool: PgPool) {
    let app = build_test_app(pool).await;
    let id = package_id(&seed_package(&app, "Provas P1").await);

    let response = add_link(&app, id, "Aula", "ftp://example.org").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Retry and deletion
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn only_failed_documents_can_be_retried(pool: PgPool) {
    let app = build_test_app(pool).await;
    let id = package_id(&seed_package(&app, "Provas P1").await);
    let link = body_json(add_link(&app, id, "Aula", "https://example.org").await).await;
    let document_id = link["data"]["id"].as_i64().unwrap();

    let response = post_empty(&app, &format!("/api/v1/documents/{document_id}/retry"), COORDINATOR).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let missing = post_empty(&app, "/api/v1/documents/9999/retry", COORDINATOR).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let professor = post_empty(&app, &format!("/api/v1/documents/{document_id}/retry"), PROFESSOR).await;
    assert_eq!(professor.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn dead_lettered_upload_gets_fresh_attempts(pool: PgPool) {
    let app = build_test_app(pool).await;
    let id = package_id(&seed_package(&app, "Provas P1").await);
    let response = post_files(
        &app,
        &format!("/api/v1/packages/{id}/documents"),
        PROFESSOR,
        &[("a.pdf", "application/pdf", &b"a"[..])],
    )
    .await;
    let document_id = body_json(response).await["data"][0]["id"].as_i64().unwrap();
    wait_for_status(&app, document_id, "COMPLETED").await;

    // Force the row into the dead-letter state.
    sqlx::query(
        "UPDATE documents SET status_id = (SELECT id FROM document_statuses WHERE name = 'ERROR'),
                retry_count = $2, error_log = 'provider unavailable',
                local_staging_path = '/nonexistent/a.pdf'
         WHERE id = $1",
    )
    .bind(document_id)
    .bind(MAX_UPLOAD_ATTEMPTS)
    .execute(&app.pool)
    .await
    .unwrap();

    let before = body_json(get(&app, &format!("/api/v1/documents/{document_id}"), PROFESSOR).await).await;
    assert_eq!(before["data"]["dead_letter"], true);

    let response = post_empty(&app, &format!("/api/v1/documents/{document_id}/retry"), COORDINATOR).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["retry_count"], 0);
    assert_eq!(json["data"]["dead_letter"], false);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn deleting_a_link_removes_it(pool: PgPool) {
    let app = build_test_app(pool).await;
    let id = package_id(&seed_package(&app, "Provas P1").await);
    let link = body_json(add_link(&app, id, "Aula", "https://example.org").await).await;
    let document_id = link["data"]["id"].as_i64().unwrap();

    let response = delete(&app, &format!("/api/v1/documents/{document_id}"), PROFESSOR).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let gone = get(&app, &format!("/api/v1/documents/{document_id}"), PROFESSOR).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn deleting_an_upload_trashes_the_remote_object(pool: PgPool) {
    let app = build_test_app(pool).await;
    let package = seed_package(&app, "Provas P1").await;
    let id = package_id(&package);
    let response = post_files(
        &app,
        &format!("/api/v1/packages/{id}/documents"),
        PROFESSOR,
        &[("a.pdf", "application/pdf", &b"a"[..])],
    )
    .await;
    let document_id = body_json(response).await["data"][0]["id"].as_i64().unwrap();
    wait_for_status(&app, document_id, "COMPLETED").await;

    let container = package["remote_folder_id"].as_str().unwrap();
    let object_id = app.storage.children(Some(container)).await.unwrap()[0].0.clone();

    let response = delete(&app, &format!("/api/v1/documents/{document_id}"), PROFESSOR).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.storage.entry(&object_id).await.unwrap().trashed);
}

// ---------------------------------------------------------------------------
// Archive and queue status
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn archive_bundles_completed_documents(pool: PgPool) {
    let app = build_test_app(pool).await;
    let id = package_id(&seed_package(&app, "Provas P1").await);
    let response = post_files(
        &app,
        &format!("/api/v1/packages/{id}/documents"),
        PROFESSOR,
        &[("Prova.pdf", "application/pdf", &b"prova"[..])],
    )
    .await;
    let document_id = body_json(response).await["data"][0]["id"].as_i64().unwrap();
    wait_for_status(&app, document_id, "COMPLETED").await;
    add_link(&app, id, "Gabarito", "https://example.org/gabarito").await;

    let response = get(&app, &format!("/api/v1/packages/{id}/archive"), PROFESSOR).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("Provas_P1.zip"), "{disposition}");

    let bytes = body_bytes(response).await;
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, ["Gabarito.url", "Prova.pdf"]);

    let mut content = String::new();
    zip.by_name("Prova.pdf").unwrap().read_to_string(&mut content).unwrap();
    assert_eq!(content, "prova");
    let mut shortcut = String::new();
    zip.by_name("Gabarito.url").unwrap().read_to_string(&mut shortcut).unwrap();
    assert!(shortcut.contains("URL=https://example.org/gabarito"));
}

#[sqlx::test(migrations = "../db/migrations")]
async fn empty_package_archive_is_404(pool: PgPool) {
    let app = build_test_app(pool).await;
    let id = package_id(&seed_package(&app, "Provas P1").await);

    let response = get(&app, &format!("/api/v1/packages/{id}/archive"), PROFESSOR).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOTHING_TO_DOWNLOAD");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn queue_status_counts_every_status(pool: PgPool) {
    let app = build_test_app(pool).await;
    let id = package_id(&seed_package(&app, "Provas P1").await);
    add_link(&app, id, "Aula 1", "https://example.org/1").await;
    add_link(&app, id, "Aula 2", "https://example.org/2").await;

    let json = body_json(get(&app, "/api/v1/uploads/queue", COORDINATOR).await).await;

    let counts = &json["data"]["counts"];
    assert_eq!(counts["COMPLETED"], 2);
    assert_eq!(counts["PENDING"], 0);
    assert_eq!(counts["UPLOADING"], 0);
    assert_eq!(counts["ERROR"], 0);
    assert_eq!(json["data"]["dead_letter"], 0);
}
