//! Route definitions for packages and their contents.
//!
//! ```text
//! POST   /                      create_package
//! PUT    /{id}                  update_package
//! DELETE /{id}                  delete_package
//! POST   /{id}/documents        upload_documents (multipart)
//! POST   /{id}/links            add_link
//! GET    /{id}/archive          download_archive
//! ```

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{documents, packages};
use crate::state::AppState;

/// Package routes, mounted at `/packages`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(packages::create_package))
        .route(
            "/{id}",
            put(packages::update_package).delete(packages::delete_package),
        )
        // Uploads are size-checked per file while streaming to disk.
        .route(
            "/{id}/documents",
            post(documents::upload_documents).layer(DefaultBodyLimit::disable()),
        )
        .route("/{id}/links", post(documents::add_link))
        .route("/{id}/archive", get(packages::download_archive))
}
