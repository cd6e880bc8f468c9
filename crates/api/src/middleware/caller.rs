//! Caller identity asserted by the external authentication layer.
//!
//! Authentication happens in front of this service; the proxy forwards the
//! authenticated user id and role as headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sgpi_core::error::CoreError;
use sgpi_core::roles::Role;

use crate::error::AppError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The user making the request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    /// Owners may act on their own packages; coordinators on any.
    pub fn can_manage(&self, owner_id: &str) -> bool {
        self.role.is_coordinator() || self.user_id == owner_id
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, USER_ID_HEADER).ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized("Missing caller identity".into()))
        })?;

        let role = header(parts, USER_ROLE_HEADER)
            .and_then(Role::from_name)
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Missing or unknown caller role".into()))
            })?;

        Ok(Caller {
            user_id: user_id.to_string(),
            role,
        })
    }
}

/// Requires the coordinator role. Rejects with 403 Forbidden otherwise.
pub struct RequireCoordinator(pub Caller);

impl FromRequestParts<AppState> for RequireCoordinator {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        if !caller.role.is_coordinator() {
            return Err(AppError::Core(CoreError::Forbidden(
                "Coordinator role required".into(),
            )));
        }
        Ok(RequireCoordinator(caller))
    }
}
