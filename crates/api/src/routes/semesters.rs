//! ```text
//! POST   /          create_semester
//! GET    /active    get_active
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::semesters;
use crate::state::AppState;

/// Semester routes, mounted at `/semesters`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(semesters::create_semester))
        .route("/active", get(semesters::get_active))
}
