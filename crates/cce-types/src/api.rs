use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::User;
use crate::survey::ServiceExperience;

// -- JWT Claims --

/// Session token claims issued at signup/login and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub formal_name: String,
    #[serde(default)]
    pub preferred_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub formal_name: Option<String>,
    pub preferred_name: Option<String>,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitPostRequest {
    pub service_experience: ServiceExperience,
}

/// Arbitrary field edit available to admins.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminPostUpdate {
    pub content: Option<String>,
    pub category: Option<String>,
    pub phase: Option<u8>,
    pub author_name: Option<String>,
    pub service_experience: Option<ServiceExperience>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HighlightRequest {
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HighlightResponse {
    pub highlighted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedPostsResponse {
    pub deleted_posts: usize,
}

// -- Admin --

/// Body of the privileged delete procedures.
#[derive(Debug, Deserialize)]
pub struct UserTargetRequest {
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminDeleteResponse {
    pub success: bool,
    pub message: String,
    pub deleted_posts: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteAllRequest {
    pub confirm: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteAllResponse {
    pub deleted_posts: usize,
    pub deleted_users: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPhaseRequest {
    pub phase: u8,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetAdminRequest {
    pub is_admin: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkPhaseResponse {
    pub succeeded: usize,
    pub failed: usize,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
