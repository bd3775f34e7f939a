use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use cce_types::api::Claims;
use cce_types::models::User;
use jsonwebtoken::{DecodingKey, Validation, decode};

use crate::auth::{AppState, AppStateInner, run_blocking};
use crate::error::ApiError;

/// Extract and validate the JWT from the Authorization header, then load the
/// caller's profile. Both `Claims` and `User` are inserted as extensions.
///
/// An identity whose profile document is gone (e.g. after "delete all data")
/// is rejected here instead of reaching any handler.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or_else(ApiError::unauthenticated)?;

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::unauthenticated())?
    .claims;

    let lookup = claims.clone();
    let user = run_blocking(&state, "load profile", move |state| load_profile(state, &lookup)).await?;

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

pub fn load_profile(state: &AppStateInner, claims: &Claims) -> Result<User, ApiError> {
    state.store.get_user(claims.sub).ok_or_else(|| {
        ApiError::PermissionDenied(format!("No profile exists for {}", claims.email))
    })
}

pub fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.is_admin {
        Ok(())
    } else {
        Err(ApiError::admin_only())
    }
}
