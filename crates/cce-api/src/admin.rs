use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use cce_db::Store;
use cce_policy::survey::normalize;
use cce_types::api::{
    AdminDeleteResponse, AdminPostUpdate, BulkPhaseResponse, DeleteAllRequest, DeleteAllResponse,
    SetAdminRequest, SetPhaseRequest, UserTargetRequest,
};
use cce_types::models::{GALLERY_PHASE, Post, SUBMISSION_PHASE, User};

use crate::auth::{AppState, run_blocking};
use crate::error::ApiError;
use crate::export::{export_filename, posts_to_csv};
use crate::middleware::require_admin;
use crate::posts::fetch_post;

/// Phrase the client must echo back as the second confirmation of "delete all data".
pub const DELETE_ALL_CONFIRMATION: &str = "DELETE ALL DATA";

fn check_phase(phase: u8) -> Result<(), ApiError> {
    if (SUBMISSION_PHASE..=GALLERY_PHASE).contains(&phase) {
        Ok(())
    } else {
        Err(ApiError::InvalidArgument(format!("Phase must be {} or {}", SUBMISSION_PHASE, GALLERY_PHASE)))
    }
}

/// Shared prologue of the privileged procedures: authenticated admin and a target id.
fn authorize_target(caller: Option<&User>, user_id: Option<Uuid>) -> Result<(&User, Uuid), ApiError> {
    let caller = caller.ok_or_else(ApiError::unauthenticated)?;
    require_admin(caller)?;
    let target = user_id.ok_or_else(|| ApiError::InvalidArgument("user_id is required".into()))?;
    Ok((caller, target))
}

/// Deletes the target's posts, then their profile, then their identity
/// account. Steps are not rolled back; a failure part-way leaves the later
/// records in place so the operation can be retried.
pub fn delete_user_cascade(
    store: &Store,
    caller: Option<&User>,
    user_id: Option<Uuid>,
) -> Result<AdminDeleteResponse, ApiError> {
    let (caller, target_id) = authorize_target(caller, user_id)?;

    if target_id == caller.id {
        return Err(ApiError::PermissionDenied("Cannot delete your own account".into()));
    }
    let target = store
        .get_user(target_id)
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", target_id)))?;
    if target.is_admin {
        return Err(ApiError::PermissionDenied("Cannot delete another admin".into()));
    }

    let deleted_posts = store
        .delete_posts_by_author(target_id)
        .ok_or_else(|| ApiError::internal("delete the user's posts"))?;

    if !store.delete_user(target_id) {
        error!("Deleted {} posts of {} but the profile delete failed", deleted_posts, target_id);
        return Err(ApiError::internal("delete the user profile"));
    }

    if !store.delete_account(target_id) {
        error!("Profile {} deleted but the identity account remains", target_id);
        return Err(ApiError::internal("delete the identity account"));
    }

    info!("{} deleted user {} and {} posts", caller.email, target.email, deleted_posts);
    Ok(AdminDeleteResponse {
        success: true,
        message: format!("Deleted user {} and {} posts", target.email, deleted_posts),
        deleted_posts,
    })
}

/// Deletes only the target's posts; the profile is untouched.
pub fn delete_user_posts(
    store: &Store,
    caller: Option<&User>,
    user_id: Option<Uuid>,
) -> Result<AdminDeleteResponse, ApiError> {
    let (caller, target_id) = authorize_target(caller, user_id)?;

    let deleted_posts = store
        .delete_posts_by_author(target_id)
        .ok_or_else(|| ApiError::internal("delete the user's posts"))?;

    info!("{} deleted {} posts of user {}", caller.email, deleted_posts, target_id);
    Ok(AdminDeleteResponse {
        success: true,
        message: format!("Deleted {} posts", deleted_posts),
        deleted_posts,
    })
}

/// Deletes every post, then every non-admin profile. Identity accounts are
/// left behind and must be removed by an operator; those identities can still
/// authenticate but are refused for lack of a profile.
pub fn delete_all_data(store: &Store, caller: &User, confirm: &str) -> Result<DeleteAllResponse, ApiError> {
    require_admin(caller)?;
    if confirm != DELETE_ALL_CONFIRMATION {
        return Err(ApiError::InvalidArgument(format!(
            "Type \"{}\" to confirm",
            DELETE_ALL_CONFIRMATION
        )));
    }

    let deleted_posts = store
        .delete_all_posts()
        .ok_or_else(|| ApiError::internal("delete all posts"))?;
    let deleted_users = store
        .delete_non_admin_users()
        .ok_or_else(|| ApiError::internal("delete user profiles"))?;

    warn!(
        "{} deleted all data: {} posts, {} users; identity accounts were not removed",
        caller.email, deleted_posts, deleted_users
    );
    Ok(DeleteAllResponse {
        deleted_posts,
        deleted_users,
    })
}

/// Moves every non-admin to `phase`, one at a time. Individual failures are
/// counted and skipped.
pub fn advance_all(store: &Store, phase: u8) -> Result<BulkPhaseResponse, ApiError> {
    check_phase(phase)?;

    let mut succeeded = 0;
    let mut failed = 0;
    for user in store.all_users().iter().filter(|u| !u.is_admin) {
        if store.set_user_phase(user.id, phase) {
            succeeded += 1;
        } else {
            warn!("Failed to move {} to phase {}", user.email, phase);
            failed += 1;
        }
    }

    info!("Bulk phase {}: {} succeeded, {} failed", phase, succeeded, failed);
    Ok(BulkPhaseResponse { succeeded, failed })
}

// -- Handlers --

/// GET /admin/users: every user, uncapped.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    run_blocking(&state, "list users", |state| Ok(state.store.all_users()))
        .await
        .map(Json)
}

/// GET /admin/posts: every post, uncapped.
pub async fn list_posts(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    run_blocking(&state, "list posts", |state| Ok(state.store.all_posts()))
        .await
        .map(Json)
}

/// PUT /admin/users/{id}/phase
pub async fn set_user_phase(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(req): Json<SetPhaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    check_phase(req.phase)?;

    run_blocking(&state, "set user phase", move |state| {
        if !state.store.set_user_phase(user_id, req.phase) {
            return Err(ApiError::NotFound(format!("User {} not found", user_id)));
        }
        info!("{} moved user {} to phase {}", user.email, user_id, req.phase);
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /admin/users/{id}/admin
pub async fn set_user_admin(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(req): Json<SetAdminRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    if user_id == user.id && !req.is_admin {
        return Err(ApiError::PermissionDenied("Cannot revoke your own admin flag".into()));
    }

    run_blocking(&state, "set admin flag", move |state| {
        if !state.store.set_user_admin(user_id, req.is_admin) {
            return Err(ApiError::NotFound(format!("User {} not found", user_id)));
        }
        info!("{} set admin={} on user {}", user.email, req.is_admin, user_id);
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/phase: bulk transition of all non-admin users.
pub async fn bulk_set_phase(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<SetPhaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    run_blocking(&state, "run bulk phase update", move |state| advance_all(&state.store, req.phase))
        .await
        .map(Json)
}

/// POST /admin/delete-user
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<UserTargetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, "delete user", move |state| {
        delete_user_cascade(&state.store, Some(&user), req.user_id)
    })
    .await
    .map(Json)
}

/// POST /admin/delete-user-posts
pub async fn delete_posts_of_user(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<UserTargetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, "delete user posts", move |state| {
        delete_user_posts(&state.store, Some(&user), req.user_id)
    })
    .await
    .map(Json)
}

/// POST /admin/delete-all
pub async fn delete_all(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(req): Json<DeleteAllRequest>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, "delete all data", move |state| {
        delete_all_data(&state.store, &user, &req.confirm)
    })
    .await
    .map(Json)
}

/// PUT /admin/posts/{id}: arbitrary field edit.
pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(req): Json<AdminPostUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    if let Some(phase) = req.phase {
        check_phase(phase)?;
    }

    run_blocking(&state, "update post", move |state| {
        let mut post: Post = fetch_post(state, post_id)?;

        if let Some(phase) = req.phase {
            post.phase = phase;
        }
        if let Some(content) = req.content {
            post.content = content;
        }
        if let Some(category) = req.category {
            post.category = category;
        }
        if let Some(author_name) = req.author_name {
            post.author_name = author_name;
        }
        if let Some(mut experience) = req.service_experience {
            normalize(&mut experience);
            post.service_experience = experience;
        }

        if !state.store.update_post(&post) {
            return Err(ApiError::internal("update post"));
        }

        info!("{} edited post {}", user.email, post_id);
        fetch_post(state, post_id)
    })
    .await
    .map(Json)
}

/// DELETE /admin/posts/{id}
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;
    run_blocking(&state, "delete post", move |state| {
        if !state.store.delete_post(post_id) {
            return Err(ApiError::NotFound(format!("Post {} not found", post_id)));
        }
        info!("{} deleted post {}", user.email, post_id);
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/export.csv
pub async fn export_csv(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;

    let body = run_blocking(&state, "build export", |state| {
        Ok(posts_to_csv(&state.store.all_posts(), &state.store.all_users()))
    })
    .await?;

    let disposition = format!("attachment; filename=\"{}\"", export_filename(Utc::now()));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cce_db::Database;

    fn store() -> Store {
        Store::new(Database::open_in_memory().unwrap(), 50)
    }

    fn user(store: &Store, is_admin: bool) -> User {
        let u = User {
            id: Uuid::new_v4(),
            email: format!("{}@example.edu", Uuid::new_v4()),
            formal_name: "F".into(),
            preferred_name: String::new(),
            is_admin,
            phase: SUBMISSION_PHASE,
            created_at: Utc::now(),
        };
        assert!(store.create_user(&u));
        assert!(store.create_account(u.id, &u.email, "hash"));
        u
    }

    #[test]
    fn privileged_procedures_reject_anonymous_callers() {
        let s = store();
        let target = Some(Uuid::new_v4());
        assert!(matches!(
            delete_user_cascade(&s, None, target),
            Err(ApiError::Unauthenticated(_))
        ));
        assert!(matches!(
            delete_user_posts(&s, None, target),
            Err(ApiError::Unauthenticated(_))
        ));
    }

    #[test]
    fn rejected_deletes_have_no_side_effects() {
        let s = store();
        let admin = user(&s, true);
        let other_admin = user(&s, true);

        assert!(matches!(
            delete_user_cascade(&s, Some(&admin), Some(admin.id)),
            Err(ApiError::PermissionDenied(_))
        ));
        assert!(matches!(
            delete_user_cascade(&s, Some(&admin), Some(other_admin.id)),
            Err(ApiError::PermissionDenied(_))
        ));
        assert!(matches!(
            delete_user_cascade(&s, Some(&admin), Some(Uuid::new_v4())),
            Err(ApiError::NotFound(_))
        ));
        assert_eq!(s.all_users().len(), 2);
        assert!(s.account_by_email(&other_admin.email).is_some());
    }

    #[test]
    fn bulk_phase_skips_admins() {
        let s = store();
        let admin = user(&s, true);
        let students: Vec<User> = (0..3).map(|_| user(&s, false)).collect();

        let result = advance_all(&s, GALLERY_PHASE).unwrap();
        assert_eq!(result.succeeded, 3);
        assert_eq!(result.failed, 0);
        assert!(students.iter().all(|u| s.get_user(u.id).unwrap().phase == GALLERY_PHASE));
        assert_eq!(s.get_user(admin.id).unwrap().phase, SUBMISSION_PHASE);

        assert!(matches!(advance_all(&s, 3), Err(ApiError::InvalidArgument(_))));
    }

    #[test]
    fn delete_all_requires_admin_and_phrase() {
        let s = store();
        let student = user(&s, false);
        let admin = user(&s, true);

        assert!(matches!(
            delete_all_data(&s, &student, DELETE_ALL_CONFIRMATION),
            Err(ApiError::PermissionDenied(_))
        ));
        assert!(matches!(
            delete_all_data(&s, &admin, "delete all data"),
            Err(ApiError::InvalidArgument(_))
        ));
        assert_eq!(s.all_users().len(), 2);

        let result = delete_all_data(&s, &admin, DELETE_ALL_CONFIRMATION).unwrap();
        assert_eq!(result.deleted_users, 1);
        assert!(s.account_by_email(&student.email).is_some());
    }
}
