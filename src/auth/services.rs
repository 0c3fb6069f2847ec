use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, Pagination, PublicUser, RegisterRequest},
        extractors::CurrentUser,
        password::{HashingError, PasswordCodec},
        repo::UserStore,
        repo_types::NewUser,
        roles::Role,
    },
    error::AppError,
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

// Argon2 is CPU-bound; keep it off the async workers.
async fn hash_blocking(codec: PasswordCodec, plain: String) -> Result<String, HashingError> {
    tokio::task::spawn_blocking(move || codec.hash(&plain))
        .await
        .map_err(|e| HashingError(format!("hashing task failed: {e}")))?
}

async fn verify_blocking(
    codec: PasswordCodec,
    hash: String,
    plain: String,
) -> Result<bool, HashingError> {
    tokio::task::spawn_blocking(move || codec.verify(&hash, &plain))
        .await
        .map_err(|e| HashingError(format!("verify task failed: {e}")))?
}

pub async fn register(st: &AppState, payload: RegisterRequest) -> Result<AuthResponse, AppError> {
    let name = payload.name.trim().to_string();
    let email = payload.email.trim().to_string();

    if name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email".into()));
    }
    let min = st.config.password.min_length;
    if payload.password.chars().count() < min {
        return Err(AppError::Validation(format!(
            "Password must be at least {min} characters"
        )));
    }

    // Ensure email is not taken; the store's unique index settles any race after this
    if st.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::AlreadyExists);
    }

    let password_hash = hash_blocking(st.passwords, payload.password).await?;

    let pending = st
        .users
        .insert(NewUser {
            name,
            email,
            password_hash,
            role: Role::default(),
        })
        .await?;

    // the token needs the new id; the row only persists once it is signed
    let fresh = pending.user();
    let token = st.keys.issue(fresh.id, &fresh.email, fresh.role).map_err(|e| {
        error!(error = %e, user_id = fresh.id, "jwt sign failed; discarding new user");
        AppError::Signing(e)
    })?;
    let user = pending.commit().await?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(AuthResponse {
        message: "User created successfully",
        user: user.into(),
        token,
    })
}

pub async fn login(st: &AppState, payload: LoginRequest) -> Result<AuthResponse, AppError> {
    let email = payload.email.trim().to_string();

    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password is required".into()));
    }

    let user = match st.users.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            // burn the same Argon2 work as a real check; the result is irrelevant
            verify_blocking(st.passwords, st.dummy_hash.to_string(), payload.password).await?;
            warn!(%email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        }
    };

    let ok = verify_blocking(st.passwords, user.password_hash.clone(), payload.password).await?;
    if !ok {
        warn!(%email, user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = st.keys.issue(user.id, &user.email, user.role)?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(AuthResponse {
        message: "Login successful",
        user: user.into(),
        token,
    })
}

pub async fn profile(st: &AppState, current: &CurrentUser) -> Result<PublicUser, AppError> {
    st.users
        .find_by_id(current.id)
        .await?
        .map(PublicUser::from)
        .ok_or(AppError::NotFound("User"))
}

pub async fn list_users(st: &AppState, page: &Pagination) -> Result<Vec<PublicUser>, AppError> {
    let (limit, offset) = page.clamped();
    let users = st.users.list(limit, offset).await?;
    Ok(users.into_iter().map(PublicUser::from).collect())
}
