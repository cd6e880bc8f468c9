use axum::routing::get;
use axum::Router;

use crate::handlers::uploads;
use crate::state::AppState;

/// Upload queue routes, mounted at `/uploads`.
pub fn router() -> Router<AppState> {
    Router::new().route("/queue", get(uploads::queue_status))
}
