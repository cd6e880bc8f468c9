use axum::routing::get;
use axum::Router;

use crate::handlers::disciplines;
use crate::state::AppState;

/// Discipline routes, mounted at `/disciplines`.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/",
        get(disciplines::list_disciplines).post(disciplines::create_discipline),
    )
}
