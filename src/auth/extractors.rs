use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    Router,
};
use tracing::{debug, warn};

use super::{jwt::JwtKeys, roles::Role};
use crate::{error::AppError, state::AppState};

/// Identity attached to a request once its bearer token has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
    pub role: Role,
}

/// Pulls `<token>` out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let raw = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthenticated("Authorization header required".into()))?;

    let malformed = || AppError::Unauthenticated("Format should be: Bearer <token>".into());
    let value = raw.to_str().map_err(|_| malformed())?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(malformed()),
    }
}

/// Authentication stage: verifies the bearer token and stores [`CurrentUser`]
/// in the request extensions.
pub async fn require_auth(
    State(keys): State<Arc<JwtKeys>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())?;

    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "bearer token rejected");
        AppError::from(e)
    })?;

    debug!(user_id = claims.sub, role = %claims.role, "request authenticated");
    req.extensions_mut().insert(CurrentUser {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
    });
    Ok(next.run(req).await)
}

/// Authorization stage. Must sit inside [`require_auth`]; see [`admin_only`].
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let role = req
        .extensions()
        .get::<CurrentUser>()
        .map(|u| u.role)
        .ok_or_else(|| AppError::Unauthenticated("Please login again".into()))?;

    if role != Role::Admin {
        return Err(AppError::Forbidden);
    }
    Ok(next.run(req).await)
}

/// Wraps every route of `router` in the authentication stage.
pub fn protected(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(from_fn_with_state(state.clone(), require_auth))
}

/// Authentication then admin check. The later `route_layer` is the outer one,
/// so `require_auth` always runs first.
pub fn admin_only(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    protected(router.route_layer(from_fn(require_admin)), state)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthenticated("Please login again".into()))
    }
}
