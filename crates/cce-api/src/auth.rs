use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info, warn};
use uuid::Uuid;

use cce_db::Store;
use cce_db::dates::parse_timestamp;
use cce_types::api::{
    Claims, LoginRequest, ResetConfirmRequest, ResetRequest, SessionResponse, SignupRequest,
    UpdateProfileRequest,
};
use cce_types::models::{SUBMISSION_PHASE, User};

use crate::error::ApiError;

const MIN_PASSWORD_LEN: usize = 8;
const TOKEN_TTL_DAYS: i64 = 30;
const RESET_TTL_HOURS: i64 = 1;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Store,
    pub jwt_secret: String,
    /// Signups with this address are granted the admin flag.
    pub admin_email: Option<String>,
}

/// Runs `f` on the blocking pool. Every handler goes through here for SQLite
/// access and password hashing.
pub(crate) async fn run_blocking<T, F>(state: &AppState, what: &'static str, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(state.as_ref()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::internal(what)
        })?
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::InvalidArgument(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| ApiError::internal("hash password"))
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    if email.len() < 3 || !email.contains('@') {
        return Err(ApiError::InvalidArgument("A valid email is required".into()));
    }
    if req.formal_name.trim().is_empty() {
        return Err(ApiError::InvalidArgument("Formal name is required".into()));
    }
    validate_password(&req.password)?;

    let formal_name = req.formal_name.trim().to_string();
    let preferred_name = req.preferred_name.trim().to_string();
    let user = run_blocking(&state, "sign up", move |state| {
        if state.store.account_by_email(&email).is_some() {
            return Err(ApiError::AlreadyExists("An account with this email already exists".into()));
        }

        let password_hash = hash_password(&req.password)?;
        let user_id = Uuid::new_v4();

        if !state.store.create_account(user_id, &email, &password_hash) {
            return Err(ApiError::internal("create account"));
        }

        let is_admin = state
            .admin_email
            .as_deref()
            .is_some_and(|admin| normalize_email(admin) == email);

        let user = User {
            id: user_id,
            email,
            formal_name,
            preferred_name,
            is_admin,
            phase: SUBMISSION_PHASE,
            created_at: Utc::now(),
        };

        if !state.store.create_user(&user) {
            // Don't leave an identity behind without its profile.
            state.store.delete_account(user_id);
            return Err(ApiError::internal("create user profile"));
        }

        info!("New signup {} (admin: {})", user.email, is_admin);
        Ok(user)
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.id, &user.email)?;
    Ok((StatusCode::CREATED, Json(SessionResponse { token, user })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);

    let user = run_blocking(&state, "sign in", move |state| {
        let invalid = || ApiError::Unauthenticated("Invalid email or password".into());
        let account = state.store.account_by_email(&email).ok_or_else(invalid)?;

        let parsed_hash = PasswordHash::new(&account.password)
            .map_err(|_| ApiError::internal("read credentials"))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| invalid())?;

        let user_id = account
            .user_id()
            .map_err(|_| ApiError::internal("read credentials"))?;

        // Identities survive "delete all data"; their profiles do not.
        state.store.get_user(user_id).ok_or_else(|| {
            warn!("Login for {} has no profile document", email);
            ApiError::PermissionDenied("No profile exists for this account".into())
        })
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.id, &user.email)?;
    Ok(Json(SessionResponse { token, user }))
}

/// Sessions are stateless; the client drops its token.
pub async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Always answers 202 so the endpoint can't be used to probe for accounts.
pub async fn request_reset(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);

    run_blocking(&state, "issue reset token", move |state| {
        let Some(account) = state.store.account_by_email(&email) else {
            return Ok(());
        };
        let user_id = account
            .user_id()
            .map_err(|_| ApiError::internal("read credentials"))?;
        let token = B64.encode(rand::random::<[u8; 32]>());
        let expires_at = Utc::now() + Duration::hours(RESET_TTL_HOURS);

        if !state.store.set_reset_token(user_id, &token, expires_at) {
            return Err(ApiError::internal("issue reset token"));
        }
        // No mail transport: operators relay the token from the log.
        info!("Password reset token for {}: {}", email, token);
        Ok(())
    })
    .await?;

    Ok(StatusCode::ACCEPTED)
}

pub async fn confirm_reset(
    State(state): State<AppState>,
    Json(req): Json<ResetConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, "reset password", move |state| {
        let invalid = || ApiError::InvalidArgument("Invalid or expired reset token".into());

        let account = state.store.account_by_reset_token(&req.token).ok_or_else(invalid)?;
        let expired = account
            .reset_expires_at
            .as_deref()
            .and_then(parse_timestamp)
            .is_none_or(|at| at < Utc::now());
        if expired {
            return Err(invalid());
        }

        validate_password(&req.password)?;
        let user_id = account.user_id().map_err(|_| invalid())?;
        let password_hash = hash_password(&req.password)?;

        if !state.store.update_password(user_id, &password_hash) {
            return Err(ApiError::internal("update password"));
        }

        info!("Password reset completed for {}", account.email);
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// Self-service profile edit. Phase and admin flag are admin-managed.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let formal_name = req
        .formal_name
        .map(|s| s.trim().to_string())
        .unwrap_or(user.formal_name);
    let preferred_name = req
        .preferred_name
        .map(|s| s.trim().to_string())
        .unwrap_or(user.preferred_name);

    if formal_name.is_empty() {
        return Err(ApiError::InvalidArgument("Formal name is required".into()));
    }

    let user_id = user.id;
    run_blocking(&state, "update profile", move |state| {
        if !state.store.update_profile(user_id, &formal_name, &preferred_name) {
            return Err(ApiError::internal("update profile"));
        }
        state
            .store
            .get_user(user_id)
            .ok_or_else(|| ApiError::internal("reload profile"))
    })
    .await
    .map(Json)
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| ApiError::internal("issue session token"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cce_db::Database;

    fn state() -> AppState {
        Arc::new(AppStateInner {
            store: Store::new(Database::open_in_memory().unwrap(), 50),
            jwt_secret: "test-secret".into(),
            admin_email: None,
        })
    }

    #[tokio::test]
    async fn blocking_work_returns_its_result() {
        let state = state();
        let count = run_blocking(&state, "count posts", |s| {
            s.store
                .user_post_count(Uuid::new_v4())
                .ok_or_else(|| ApiError::internal("count posts"))
        })
        .await
        .unwrap();
        assert_eq!(count, 0);

        let err = run_blocking(&state, "load user", |s| {
            s.store
                .get_user(Uuid::new_v4())
                .ok_or_else(|| ApiError::NotFound("missing".into()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), "not-found");
    }

    #[tokio::test]
    async fn panicking_work_becomes_internal() {
        let err = run_blocking(&state(), "explode", |_| -> Result<(), ApiError> {
            panic!("boom")
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), "internal");
        assert_eq!(err.to_string(), "Failed to explode");
    }

    #[test]
    fn passwords_hash_and_verify() {
        let hash = hash_password("correct-horse").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"correct-horse", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }
}
