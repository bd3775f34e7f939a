use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::survey::ServiceExperience;

/// Phase in which students submit their own reports.
pub const SUBMISSION_PHASE: u8 = 1;

/// Phase in which students browse and highlight each other's reports.
pub const GALLERY_PHASE: u8 = 2;

/// Prefix of the comment mirrored from a highlight.
pub const HIGHLIGHT_COMMENT_PREFIX: &str = "Highlighted: ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub formal_name: String,
    pub preferred_name: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default = "default_phase")]
    pub phase: u8,
    pub created_at: DateTime<Utc>,
}

fn default_phase() -> u8 {
    SUBMISSION_PHASE
}

impl User {
    /// Name shown next to posts and comments.
    pub fn display_name(&self) -> &str {
        if self.preferred_name.trim().is_empty() {
            &self.formal_name
        } else {
            &self.preferred_name
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub user_id: Uuid,
    pub user_name: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// True for the synthetic comment written alongside a highlight.
    pub fn mirrors_highlight_of(&self, user_id: Uuid) -> bool {
        self.author_id == user_id && self.content.starts_with(HIGHLIGHT_COMMENT_PREFIX)
    }
}

/// A submitted service-experience report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub content: String,
    pub category: String,
    /// Phase of the author when the post was created.
    pub phase: u8,
    pub service_experience: ServiceExperience,
    #[serde(default)]
    pub highlights: Vec<Highlight>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn highlighted_by(&self, user_id: Uuid) -> bool {
        self.highlights.iter().any(|h| h.user_id == user_id)
    }

    /// Comments in display order (oldest first).
    pub fn sorted_comments(&self) -> Vec<&Comment> {
        let mut comments: Vec<&Comment> = self.comments.iter().collect();
        comments.sort_by_key(|c| c.created_at);
        comments
    }
}
