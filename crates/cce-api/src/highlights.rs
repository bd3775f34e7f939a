use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use cce_db::queries::HighlightToggle;
use cce_policy::policy::can_interact;
use cce_types::api::{CommentRequest, HighlightRequest, HighlightResponse};
use cce_types::models::User;

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;
use crate::posts::fetch_post;

/// POST /posts/{id}/highlights: toggles the caller's highlight.
pub async fn toggle_highlight(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(req): Json<HighlightRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let toggled = run_blocking(&state, "update highlights", move |state| {
        let post = fetch_post(state, post_id)?;
        if !can_interact(Some(&user), &post) {
            return Err(ApiError::PermissionDenied("You cannot highlight this post".into()));
        }

        let reason = req.reason.trim();
        if reason.is_empty() && !post.highlighted_by(user.id) {
            return Err(ApiError::InvalidArgument("A highlight needs a reason".into()));
        }

        state
            .store
            .add_highlight(post_id, user.id, user.display_name(), reason)
            .ok_or_else(|| ApiError::internal("update highlights"))
    })
    .await?;

    Ok(Json(HighlightResponse {
        highlighted: toggled == HighlightToggle::Added,
    }))
}

/// POST /posts/{id}/comments
pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::InvalidArgument("Comment must not be empty".into()));
    }

    let content = content.to_string();
    let comment = run_blocking(&state, "add comment", move |state| {
        let post = fetch_post(state, post_id)?;
        if !can_interact(Some(&user), &post) {
            return Err(ApiError::PermissionDenied("You cannot comment on this post".into()));
        }

        state
            .store
            .add_comment(post_id, user.id, user.display_name(), &content)
            .ok_or_else(|| ApiError::internal("add comment"))
    })
    .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}
