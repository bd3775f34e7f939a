use std::sync::Arc;

use anyhow::Result;
use cce_types::models::{Comment, HIGHLIGHT_COMMENT_PREFIX, Highlight, Post, User};
use chrono::{DateTime, Utc};
use tracing::error;
use uuid::Uuid;

use crate::Database;
use crate::models::AccountRow;
use crate::queries::HighlightToggle;

/// Default cap on general feed reads.
pub const DEFAULT_FEED_LIMIT: u32 = 50;

/// Data-access boundary used by the HTTP layer.
///
/// Every failure is logged and collapsed into `None`, `false` or an empty
/// list. Callers cannot tell "not found" from "store failed"; a falsy
/// result is the only failure signal.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
    feed_limit: u32,
}

fn logged<T>(op: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            error!("{} failed: {:#}", op, e);
            None
        }
    }
}

impl Store {
    pub fn new(db: Database, feed_limit: u32) -> Self {
        Self {
            db: Arc::new(db),
            feed_limit,
        }
    }

    pub fn feed_limit(&self) -> u32 {
        self.feed_limit
    }

    // -- Accounts --

    pub fn create_account(&self, id: Uuid, email: &str, password_hash: &str) -> bool {
        logged("create_account", self.db.create_account(id, email, password_hash)).is_some()
    }

    pub fn account_by_email(&self, email: &str) -> Option<AccountRow> {
        logged("account_by_email", self.db.get_account_by_email(email)).flatten()
    }

    pub fn account_by_reset_token(&self, token: &str) -> Option<AccountRow> {
        logged("account_by_reset_token", self.db.get_account_by_reset_token(token)).flatten()
    }

    pub fn set_reset_token(&self, id: Uuid, token: &str, expires_at: DateTime<Utc>) -> bool {
        logged("set_reset_token", self.db.set_reset_token(id, token, expires_at)).unwrap_or(false)
    }

    pub fn update_password(&self, id: Uuid, password_hash: &str) -> bool {
        logged("update_password", self.db.update_password(id, password_hash)).unwrap_or(false)
    }

    pub fn delete_account(&self, id: Uuid) -> bool {
        logged("delete_account", self.db.delete_account(id)).unwrap_or(false)
    }

    // -- Users --

    pub fn create_user(&self, user: &User) -> bool {
        logged("create_user", self.db.create_user(user)).is_some()
    }

    pub fn get_user(&self, id: Uuid) -> Option<User> {
        logged("get_user", self.db.get_user(id)).flatten()
    }

    pub fn update_profile(&self, id: Uuid, formal_name: &str, preferred_name: &str) -> bool {
        logged("update_profile", self.db.update_profile(id, formal_name, preferred_name))
            .unwrap_or(false)
    }

    pub fn set_user_phase(&self, id: Uuid, phase: u8) -> bool {
        logged("set_user_phase", self.db.set_user_phase(id, phase)).unwrap_or(false)
    }

    pub fn set_user_admin(&self, id: Uuid, is_admin: bool) -> bool {
        logged("set_user_admin", self.db.set_user_admin(id, is_admin)).unwrap_or(false)
    }

    /// Every user, newest first. Admin views rely on this being uncapped.
    pub fn all_users(&self) -> Vec<User> {
        logged("all_users", self.db.list_users(None)).unwrap_or_default()
    }

    pub fn delete_user(&self, id: Uuid) -> bool {
        logged("delete_user", self.db.delete_user(id)).unwrap_or(false)
    }

    pub fn delete_non_admin_users(&self) -> Option<usize> {
        logged("delete_non_admin_users", self.db.delete_non_admin_users())
    }

    // -- Posts --

    pub fn create_post(&self, post: &Post) -> bool {
        logged("create_post", self.db.insert_post(post)).is_some()
    }

    /// Inserts unless the author already owns `max` posts. `Some(false)` means
    /// the cap was hit; `None` means the store failed.
    pub fn create_post_within_limit(&self, post: &Post, max: usize) -> Option<bool> {
        logged("create_post_within_limit", self.db.insert_post_within_limit(post, max))
    }

    pub fn get_post(&self, id: Uuid) -> Option<Post> {
        logged("get_post", self.db.get_post(id)).flatten()
    }

    pub fn update_post(&self, post: &Post) -> bool {
        logged("update_post", self.db.update_post(post)).unwrap_or(false)
    }

    pub fn delete_post(&self, id: Uuid) -> bool {
        logged("delete_post", self.db.delete_post(id)).unwrap_or(false)
    }

    /// General feed read, capped at the configured limit.
    pub fn feed_posts(&self) -> Vec<Post> {
        logged("feed_posts", self.db.list_posts(Some(self.feed_limit))).unwrap_or_default()
    }

    /// Every post, newest first, with no cap.
    pub fn all_posts(&self) -> Vec<Post> {
        logged("all_posts", self.db.list_posts(None)).unwrap_or_default()
    }

    pub fn posts_by_author(&self, author_id: Uuid) -> Vec<Post> {
        logged("posts_by_author", self.db.list_posts_by_author(author_id)).unwrap_or_default()
    }

    /// `None` when the count could not be read; never guess zero.
    pub fn user_post_count(&self, author_id: Uuid) -> Option<usize> {
        logged("user_post_count", self.db.count_posts_by_author(author_id))
    }

    pub fn delete_posts_by_author(&self, author_id: Uuid) -> Option<usize> {
        logged("delete_posts_by_author", self.db.delete_posts_by_author(author_id))
    }

    pub fn delete_all_posts(&self) -> Option<usize> {
        logged("delete_all_posts", self.db.delete_all_posts())
    }

    // -- Highlights & comments --

    /// Toggles `user_id`'s highlight on a post, writing the mirror comment
    /// `"Highlighted: <reason>"` alongside it.
    pub fn add_highlight(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        user_name: &str,
        reason: &str,
    ) -> Option<HighlightToggle> {
        let now = Utc::now();
        let highlight = Highlight {
            user_id,
            user_name: user_name.to_string(),
            reason: reason.to_string(),
            created_at: now,
        };
        let mirror = Comment {
            id: Uuid::new_v4(),
            author_id: user_id,
            author_name: user_name.to_string(),
            content: format!("{}{}", HIGHLIGHT_COMMENT_PREFIX, reason),
            created_at: now,
        };

        logged("add_highlight", self.db.toggle_highlight(post_id, highlight, mirror)).flatten()
    }

    pub fn add_comment(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        author_name: &str,
        content: &str,
    ) -> Option<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            author_id,
            author_name: author_name.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };

        match logged("add_comment", self.db.append_comment(post_id, comment.clone())) {
            Some(true) => Some(comment),
            _ => None,
        }
    }
}
