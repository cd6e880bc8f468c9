pub mod disciplines;
pub mod documents;
pub mod health;
pub mod packages;
pub mod semesters;
pub mod uploads;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /semesters                        create (coordinator)
/// /semesters/active                 active semester
///
/// /disciplines                      list, create (coordinator)
///
/// /packages                         create (provisions remote containers)
/// /packages/{id}                    rename, delete (coordinator, retention rule)
/// /packages/{id}/documents          multipart upload into the staging area
/// /packages/{id}/links              add link document
/// /packages/{id}/archive            streaming zip download
///
/// /documents/{id}                   get, delete
/// /documents/{id}/retry             reset a failed upload (coordinator)
///
/// /uploads/queue                    queue counts and worker state
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/semesters", semesters::router())
        .nest("/disciplines", disciplines::router())
        .nest("/packages", packages::router())
        .nest("/documents", documents::router())
        .nest("/uploads", uploads::router())
}
