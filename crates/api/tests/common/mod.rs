//! Shared helpers for HTTP-level integration tests.
//!
//! The app runs on the full middleware stack with local-directory storage
//! in a temp dir and a live upload worker over the test database.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sgpi_api::config::{PipelineConfig, ServerConfig};
use sgpi_api::router::build_app_router;
use sgpi_api::state::AppState;
use sgpi_cloud::local::LocalStorage;
use sgpi_db::models::discipline::{CreateDiscipline, Discipline};
use sgpi_db::models::semester::{CreateSemester, Semester};
use sgpi_db::repositories::{DisciplineRepo, SemesterRepo};
use sgpi_pipeline::extract::RedirectPatternExtractor;
use sgpi_pipeline::ledger::{DocumentLedger, PgLedger};
use sgpi_pipeline::queue::UploadQueue;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Caller identity sent as `x-user-id` / `x-user-role`.
pub type Who = (&'static str, &'static str);

pub const PROFESSOR: Who = ("prof-1", "professor");
pub const OTHER_PROFESSOR: Who = ("prof-2", "professor");
pub const COORDINATOR: Who = ("coord-1", "coordenador");

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub storage: Arc<LocalStorage>,
    pub staging_dir: PathBuf,
    cancel: CancellationToken,
    _dir: tempfile::TempDir,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
pub async fn build_test_app(pool: PgPool) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::open(dir.path().join("remote")).await.unwrap());
    let staging_dir = dir.path().join("uploads");

    let pipeline = PipelineConfig {
        staging_dir: staging_dir.clone(),
        max_upload_bytes: 1024 * 1024,
        stale_upload_secs: 900,
        staging_max_age_secs: 3600,
        staging_sweep_interval_secs: 86_400,
        semester_check_interval_secs: 86_400,
    };

    let cancel = CancellationToken::new();
    let ledger: Arc<dyn DocumentLedger> = Arc::new(PgLedger::new(pool.clone()));
    let queue = UploadQueue::new(
        Arc::clone(&ledger),
        storage.clone(),
        Arc::new(RedirectPatternExtractor),
    );
    let (uploads, _task) = queue.spawn(pipeline.stale_upload_after(), cancel.clone());

    let config = test_config();
    let state = AppState::new(
        pool.clone(),
        config.clone(),
        pipeline,
        storage.clone(),
        None,
        ledger,
        uploads,
    );

    TestApp {
        router: build_app_router(state, &config),
        pool,
        storage,
        staging_dir,
        cancel,
        _dir: dir,
    }
}

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

pub async fn seed_discipline(pool: &PgPool, name: &str) -> Discipline {
    DisciplineRepo::create(
        pool,
        &CreateDiscipline {
            name: name.to_string(),
            course_level: "Graduação".to_string(),
        },
    )
    .await
    .unwrap()
}

pub async fn seed_semester(pool: &PgPool, label: &str) -> Semester {
    SemesterRepo::create_active(
        pool,
        &CreateSemester {
            label: label.to_string(),
            remote_root_id: None,
        },
    )
    .await
    .unwrap()
}

/// Active semester, one discipline and one package owned by [`PROFESSOR`].
/// Returns the package JSON.
pub async fn seed_package(app: &TestApp, title: &str) -> Value {
    if SemesterRepo::find_active(&app.pool).await.unwrap().is_none() {
        seed_semester(&app.pool, "2025_1").await;
    }
    let discipline = match DisciplineRepo::list(&app.pool).await.unwrap().into_iter().next() {
        Some(d) => d,
        None => seed_discipline(&app.pool, "Cálculo I").await,
    };

    let response = post_json(
        app,
        "/api/v1/packages",
        PROFESSOR,
        serde_json::json!({ "title": title, "discipline_id": discipline.id }),
    )
    .await;
    assert_eq!(response.status(), 201, "package creation failed");
    body_json(response).await["data"].clone()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

fn builder(method: Method, uri: &str, who: Option<Who>) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user_id, role)) = who {
        builder = builder.header("x-user-id", user_id).header("x-user-role", role);
    }
    builder
}

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get_anonymous(app: &TestApp, uri: &str) -> Response<Body> {
    send(app, builder(Method::GET, uri, None).body(Body::empty()).unwrap()).await
}

pub async fn get(app: &TestApp, uri: &str, who: Who) -> Response<Body> {
    send(app, builder(Method::GET, uri, Some(who)).body(Body::empty()).unwrap()).await
}

pub async fn delete(app: &TestApp, uri: &str, who: Who) -> Response<Body> {
    send(app, builder(Method::DELETE, uri, Some(who)).body(Body::empty()).unwrap()).await
}

pub async fn post_empty(app: &TestApp, uri: &str, who: Who) -> Response<Body> {
    send(app, builder(Method::POST, uri, Some(who)).body(Body::empty()).unwrap()).await
}

async fn send_json(app: &TestApp, method: Method, uri: &str, who: Who, body: Value) -> Response<Body> {
    let request = builder(method, uri, Some(who))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &TestApp, uri: &str, who: Who, body: Value) -> Response<Body> {
    send_json(app, Method::POST, uri, who, body).await
}

pub async fn put_json(app: &TestApp, uri: &str, who: Who, body: Value) -> Response<Body> {
    send_json(app, Method::PUT, uri, who, body).await
}

const BOUNDARY: &str = "sgpi-test-boundary";

/// POST a multipart body with one `file` part per `(name, mime, bytes)`.
pub async fn post_files(
    app: &TestApp,
    uri: &str,
    who: Who,
    files: &[(&str, &str, &[u8])],
) -> Response<Body> {
    let mut body = Vec::new();
    for (name, mime, bytes) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let request = builder(Method::POST, uri, Some(who))
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll a document until its status is `status`, failing after a few
/// seconds.
pub async fn wait_for_status(app: &TestApp, document_id: i64, status: &str) -> Value {
    for _ in 0..100 {
        let json = body_json(get(app, &format!("/api/v1/documents/{document_id}"), PROFESSOR).await).await;
        if json["data"]["status"] == status {
            return json["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("document {document_id} never reached {status}");
}
