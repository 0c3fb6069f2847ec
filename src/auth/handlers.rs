use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, Pagination, ProfileResponse, RegisterRequest,
            UserListResponse,
        },
        extractors::{admin_only, protected, CurrentUser},
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn user_routes(state: &AppState) -> Router<AppState> {
    protected(Router::new().route("/user/profile", get(get_profile)), state)
}

pub fn admin_routes(state: &AppState) -> Router<AppState> {
    admin_only(Router::new().route("/admin/users", get(list_users)), state)
}

// axum answers 422 for well-formed JSON of the wrong shape; callers get 400 either way
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AppError::Validation(format!("Invalid request data: {}", e.body_text())))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    params
        .map(|Query(v)| v)
        .map_err(|e| AppError::Validation(format!("Invalid query parameters: {}", e.body_text())))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let res = services::register(&state, body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let res = services::login(&state, body(payload)?).await?;
    Ok(Json(res))
}

#[instrument(skip(state), fields(user_id = current.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = services::profile(&state, &current).await?;
    Ok(Json(ProfileResponse { user }))
}

#[instrument(skip(state, page), fields(admin_id = current.id))]
pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
    page: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<UserListResponse>, AppError> {
    let users = services::list_users(&state, &query(page)?).await?;
    Ok(Json(UserListResponse { users }))
}
