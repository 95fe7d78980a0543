//! Handlers for account login and registration.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use swapdeck_core::accounts::{validate_login, validate_registration};
use swapdeck_core::error::CoreError;
use swapdeck_db::models::user::CreateUser;
use swapdeck_db::StoreError;

use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::state::AppState;

/// Message for every failed credential check. Does not reveal which half
/// was wrong.
const INVALID_CREDENTIALS: &str = "Invalid credentials";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Successful login: the caller's stored upstream key.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub username: String,
    pub api_key: String,
}

/// Request body for `POST /api/register`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub master_code: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/login
///
/// Check username + password and return the account's upstream key.
pub async fn login(
    State(state): State<AppState>,
    AppJson(input): AppJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (username, password) = validate_login(input.username.as_deref(), input.password.as_deref())?;

    // 1. Find user by username.
    let user = state
        .users
        .find_by_username(username)
        .await
        .map_err(AppError::store("Login failed"))?
        .ok_or_else(|| {
            tracing::info!(username, "Login for unknown user");
            AppError::Core(CoreError::Unauthorized(INVALID_CREDENTIALS.into()))
        })?;

    // 2. Verify password.
    let password_valid = verify_password(password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        tracing::info!(username, "Login with wrong password");
        return Err(AppError::Core(CoreError::Unauthorized(
            INVALID_CREDENTIALS.into(),
        )));
    }

    tracing::info!(user_id = user.id, username, "User logged in");

    Ok(Json(LoginResponse {
        success: true,
        username: user.username,
        api_key: user.upstream_api_key,
    }))
}

/// POST /api/register
///
/// Create an account. Requires the shared master access code.
pub async fn register(
    State(state): State<AppState>,
    AppJson(input): AppJson<RegisterRequest>,
) -> AppResult<Json<RegisterResponse>> {
    // 1. Master code, required fields, lengths.
    let account = validate_registration(
        &state.config.master_access_code,
        input.master_code.as_deref(),
        input.username.as_deref(),
        input.password.as_deref(),
        input.api_key.as_deref(),
    )
    .inspect_err(|err| {
        if matches!(err, CoreError::Forbidden(_)) {
            tracing::warn!("Registration attempt with wrong master code");
        }
    })?;

    // 2. Uniqueness, checked before paying for the hash.
    let taken = state
        .users
        .username_exists(&account.username)
        .await
        .map_err(AppError::store("Registration failed"))?;
    if taken {
        return Err(AppError::Store {
            context: "Registration failed",
            source: StoreError::DuplicateUsername(account.username),
        });
    }

    // 3. Hash and insert. A concurrent registration of the same name still
    //    surfaces as a duplicate from the store.
    let password_hash = hash_password(&account.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = state
        .users
        .create(CreateUser {
            username: account.username,
            password_hash,
            upstream_api_key: account.api_key,
        })
        .await
        .map_err(AppError::store("Registration failed"))?;

    tracing::info!(user_id = user.id, username = %user.username, "Account created");

    Ok(Json(RegisterResponse {
        success: true,
        message: "Account created successfully",
    }))
}
