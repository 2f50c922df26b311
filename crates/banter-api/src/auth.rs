use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use banter_types::api::{
    LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, UserPublic,
};

use crate::AppState;
use crate::error::ApiError;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::InvalidRequest(
            "Username must be 3-32 characters",
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::InvalidRequest(
            "Password must be at least 8 characters",
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    // Uniqueness is enforced by the store, not pre-checked; a duplicate
    // insert surfaces as StoreError::DuplicateUsername.
    let db = state.db.clone();
    let username = req.username.clone();
    tokio::task::spawn_blocking(move || {
        db.create_user(&user_id.to_string(), &username, &password_hash)
    })
    .await??;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserPublic {
                id: user_id,
                username: req.username,
            },
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let username = req.username.clone();
    let user = tokio::task::spawn_blocking(move || db.get_user_by_username(&username))
        .await??
        .ok_or(ApiError::InvalidCredentials)?;

    verify_password(&req.password, &user.password)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e: uuid::Error| ApiError::Internal(e.into()))?;

    let token = state.tokens.issue(user_id, &user.username)?;

    Ok(Json(LoginResponse { token }))
}

/// Argon2id with a fresh random salt, encoded as a PHC string.
fn hash_password(plaintext: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

/// Uniform failure: a wrong password yields the same error the caller
/// sees for an unknown username.
fn verify_password(plaintext: &str, stored_hash: &str) -> Result<(), ApiError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash: {}", e)))?;

    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .map_err(|_| ApiError::InvalidCredentials)
}
