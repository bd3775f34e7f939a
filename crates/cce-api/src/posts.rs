use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use cce_policy::policy::{
    MAX_POSTS_PER_USER, SubmissionDenied, can_delete_post, can_edit_post, can_view_post,
    submission_gate, visible_feed,
};
use cce_policy::survey::{normalize, validate_experience};
use cce_types::api::{DeletedPostsResponse, SubmitPostRequest};
use cce_types::models::{Post, SUBMISSION_PHASE, User};
use cce_types::survey::ServiceExperience;

use crate::auth::{AppState, AppStateInner, run_blocking};
use crate::error::ApiError;

/// Normalizes and re-validates a report received from a client. The wizard
/// gates are enforced here too; clients are not trusted to have run them.
fn checked_experience(mut experience: ServiceExperience) -> Result<ServiceExperience, ApiError> {
    normalize(&mut experience);
    validate_experience(&experience)?;
    Ok(experience)
}

/// Post-level fields derived from the report.
fn apply_experience(post: &mut Post, experience: ServiceExperience) {
    post.content = experience.narrative.clone();
    post.category = experience.organization.organization_type.clone();
    post.service_experience = experience;
}

pub(crate) fn fetch_post(state: &AppStateInner, id: Uuid) -> Result<Post, ApiError> {
    state
        .store
        .get_post(id)
        .ok_or_else(|| ApiError::NotFound(format!("Post {} not found", id)))
}

/// Posts `user` may see, newest first. Phase-1 students read their own rows
/// directly so the feed cap never pushes them out.
fn feed_for(state: &AppStateInner, user: &User) -> Vec<Post> {
    let posts = if !user.is_admin && user.phase <= SUBMISSION_PHASE {
        state.store.posts_by_author(user.id)
    } else {
        state.store.feed_posts()
    };
    visible_feed(Some(user), posts)
}

/// GET /posts: the caller's visibility-filtered feed, newest first.
pub async fn feed(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, "load feed", move |state| Ok(feed_for(state, &user)))
        .await
        .map(Json)
}

/// GET /posts/mine
pub async fn my_posts(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, "load posts", move |state| Ok(state.store.posts_by_author(user.id)))
        .await
        .map(Json)
}

/// POST /posts: submit a new report under the caller's current phase.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<SubmitPostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = run_blocking(&state, "create post", move |state| {
        let existing = state
            .store
            .user_post_count(user.id)
            .ok_or_else(|| ApiError::internal("count existing posts"))?;
        submission_gate(Some(&user), existing)?;

        let experience = checked_experience(req.service_experience)?;

        let now = Utc::now();
        let mut post = Post {
            id: Uuid::new_v4(),
            author_id: user.id,
            author_name: user.display_name().to_string(),
            content: String::new(),
            category: String::new(),
            phase: user.phase,
            service_experience: ServiceExperience::default(),
            highlights: vec![],
            comments: vec![],
            created_at: now,
            updated_at: now,
        };
        apply_experience(&mut post, experience);

        // Re-checked inside the insert transaction.
        if user.is_admin {
            if !state.store.create_post(&post) {
                return Err(ApiError::internal("create post"));
            }
        } else {
            match state.store.create_post_within_limit(&post, MAX_POSTS_PER_USER) {
                Some(true) => {}
                Some(false) => return Err(SubmissionDenied::PostLimitReached.into()),
                None => return Err(ApiError::internal("create post")),
            }
        }

        info!("{} submitted post {}", user.email, post.id);
        Ok(post)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /posts/{id}
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let post = run_blocking(&state, "load post", move |state| fetch_post(state, post_id)).await?;
    if !can_view_post(Some(&user), &post) {
        return Err(ApiError::PermissionDenied("You cannot view this post yet".into()));
    }
    Ok(Json(post))
}

/// PUT /posts/{id}: author edit, allowed until the author changes phase.
pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(req): Json<SubmitPostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, "update post", move |state| {
        let mut post = fetch_post(state, post_id)?;
        if !can_edit_post(Some(&user), &post) {
            return Err(ApiError::PermissionDenied("This post can no longer be edited".into()));
        }

        let experience = checked_experience(req.service_experience)?;
        apply_experience(&mut post, experience);
        post.author_name = user.display_name().to_string();

        if !state.store.update_post(&post) {
            return Err(ApiError::internal("update post"));
        }
        fetch_post(state, post_id)
    })
    .await
    .map(Json)
}

/// DELETE /posts/{id}
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, "delete post", move |state| {
        let post = fetch_post(state, post_id)?;
        if !can_delete_post(Some(&user), &post) {
            return Err(ApiError::PermissionDenied("Only the author can delete this post".into()));
        }
        if !state.store.delete_post(post_id) {
            return Err(ApiError::internal("delete post"));
        }
        info!("{} deleted post {}", user.email, post_id);
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /posts/mine: remove every post the caller authored.
pub async fn delete_my_posts(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted_posts = run_blocking(&state, "delete posts", move |state| {
        let deleted = state
            .store
            .delete_posts_by_author(user.id)
            .ok_or_else(|| ApiError::internal("delete posts"))?;
        info!("{} deleted {} of their posts", user.email, deleted);
        Ok(deleted)
    })
    .await?;

    Ok(Json(DeletedPostsResponse { deleted_posts }))
}
