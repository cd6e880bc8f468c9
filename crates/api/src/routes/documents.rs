use axum::routing::{get, post};
use axum::Router;

use crate::handlers::documents;
use crate::state::AppState;

/// Document routes, mounted at `/documents`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/{id}/retry", post(documents::retry_document))
}
