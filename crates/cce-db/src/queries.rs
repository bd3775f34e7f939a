use anyhow::Result;
use cce_types::models::{Comment, Highlight, Post, User};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::Database;
use crate::dates::format_timestamp;
use crate::models::{AccountRow, PostRow, UserRow};

/// Outcome of toggling a highlight on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightToggle {
    Added,
    Removed,
}

/// SQLite treats a negative LIMIT as "no limit".
fn sql_limit(limit: Option<u32>) -> i64 {
    limit.map(i64::from).unwrap_or(-1)
}

impl Database {
    // -- Accounts (identity provider) --

    pub fn create_account(&self, id: Uuid, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO accounts (id, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), email, password_hash, format_timestamp(Utc::now())],
            )?;
            Ok(())
        })
    }

    pub fn get_account_by_email(&self, email: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "email = ?1", email))
    }

    pub fn get_account_by_reset_token(&self, token: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "reset_token = ?1", token))
    }

    pub fn set_reset_token(&self, id: Uuid, token: &str, expires_at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE accounts SET reset_token = ?2, reset_expires_at = ?3 WHERE id = ?1",
                params![id.to_string(), token, format_timestamp(expires_at)],
            )?;
            Ok(n > 0)
        })
    }

    /// Sets a new password hash and burns any outstanding reset token.
    pub fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE accounts SET password = ?2, reset_token = NULL, reset_expires_at = NULL
                 WHERE id = ?1",
                params![id.to_string(), password_hash],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_account(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM accounts WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    // -- Users --

    pub fn create_user(&self, user: &User) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, formal_name, preferred_name, is_admin, phase, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.formal_name,
                    user.preferred_name,
                    user.is_admin,
                    user.phase,
                    format_timestamp(user.created_at),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users WHERE id = ?1",
                UserRow::COLUMNS
            ))?;
            let row = stmt
                .query_row([id.to_string()], UserRow::from_row)
                .optional()?;
            row.map(UserRow::into_user).transpose()
        })
    }

    pub fn update_profile(&self, id: Uuid, formal_name: &str, preferred_name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET formal_name = ?2, preferred_name = ?3 WHERE id = ?1",
                params![id.to_string(), formal_name, preferred_name],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_user_phase(&self, id: Uuid, phase: u8) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET phase = ?2 WHERE id = ?1",
                params![id.to_string(), phase],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_user_admin(&self, id: Uuid, is_admin: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET is_admin = ?2 WHERE id = ?1",
                params![id.to_string(), is_admin],
            )?;
            Ok(n > 0)
        })
    }

    /// Newest first. `None` reads every row.
    pub fn list_users(&self, limit: Option<u32>) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY created_at DESC LIMIT ?1",
                UserRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map([sql_limit(limit)], UserRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(UserRow::into_user).collect()
        })
    }

    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    /// Removes every profile without the admin flag. Accounts are left alone.
    pub fn delete_non_admin_users(&self) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE is_admin = 0", [])?))
    }

    // -- Posts --

    pub fn insert_post(&self, post: &Post) -> Result<()> {
        self.with_conn(|conn| insert_post_row(conn, post))
    }

    /// Counts the author's posts and inserts only while they own fewer than
    /// `max`. Both happen in one transaction, so concurrent submissions from
    /// the same author cannot overshoot the cap. Returns false when full.
    pub fn insert_post_within_limit(&self, post: &Post, max: usize) -> Result<bool> {
        self.with_tx(|conn| {
            if count_by_author(conn, post.author_id)? >= max {
                return Ok(false);
            }
            insert_post_row(conn, post)?;
            Ok(true)
        })
    }

    pub fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Overwrites every mutable field of the post. Last write wins.
    pub fn update_post(&self, post: &Post) -> Result<bool> {
        let service_experience = serde_json::to_string(&post.service_experience)?;
        let highlights = serde_json::to_string(&post.highlights)?;
        let comments = serde_json::to_string(&post.comments)?;

        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE posts SET author_name = ?2, content = ?3, category = ?4, phase = ?5,
                     service_experience = ?6, highlights = ?7, comments = ?8, updated_at = ?9
                 WHERE id = ?1",
                params![
                    post.id.to_string(),
                    post.author_name,
                    post.content,
                    post.category,
                    post.phase,
                    service_experience,
                    highlights,
                    comments,
                    format_timestamp(Utc::now()),
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_post(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM posts WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    /// Newest first. `None` reads every row.
    pub fn list_posts(&self, limit: Option<u32>) -> Result<Vec<Post>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM posts ORDER BY created_at DESC LIMIT ?1",
                PostRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map([sql_limit(limit)], PostRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(PostRow::into_post).collect()
        })
    }

    pub fn list_posts_by_author(&self, author_id: Uuid) -> Result<Vec<Post>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM posts WHERE author_id = ?1 ORDER BY created_at DESC",
                PostRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map([author_id.to_string()], PostRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(PostRow::into_post).collect()
        })
    }

    pub fn count_posts_by_author(&self, author_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| count_by_author(conn, author_id))
    }

    pub fn delete_posts_by_author(&self, author_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM posts WHERE author_id = ?1", [author_id.to_string()])?)
        })
    }

    pub fn delete_all_posts(&self) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM posts", [])?))
    }

    // -- Highlights & comments --

    /// Toggle a highlight: removes the user's highlight and its mirror comment
    /// if present, otherwise adds both. Both arrays are written by one UPDATE
    /// inside one transaction. Returns `None` when the post does not exist.
    pub fn toggle_highlight(
        &self,
        post_id: Uuid,
        highlight: Highlight,
        mirror: Comment,
    ) -> Result<Option<HighlightToggle>> {
        self.with_tx(|conn| {
            let Some(mut post) = query_post(conn, post_id)? else {
                return Ok(None);
            };

            let user_id = highlight.user_id;
            let outcome = if post.highlighted_by(user_id) {
                post.highlights.retain(|h| h.user_id != user_id);
                post.comments.retain(|c| !c.mirrors_highlight_of(user_id));
                HighlightToggle::Removed
            } else {
                post.highlights.push(highlight);
                post.comments.push(mirror);
                HighlightToggle::Added
            };

            conn.execute(
                "UPDATE posts SET highlights = ?2, comments = ?3, updated_at = ?4 WHERE id = ?1",
                params![
                    post_id.to_string(),
                    serde_json::to_string(&post.highlights)?,
                    serde_json::to_string(&post.comments)?,
                    format_timestamp(Utc::now()),
                ],
            )?;
            Ok(Some(outcome))
        })
    }

    /// Appends a comment. Returns false when the post does not exist.
    pub fn append_comment(&self, post_id: Uuid, comment: Comment) -> Result<bool> {
        self.with_tx(|conn| {
            let Some(mut post) = query_post(conn, post_id)? else {
                return Ok(false);
            };
            post.comments.push(comment);

            conn.execute(
                "UPDATE posts SET comments = ?2, updated_at = ?3 WHERE id = ?1",
                params![
                    post_id.to_string(),
                    serde_json::to_string(&post.comments)?,
                    format_timestamp(Utc::now()),
                ],
            )?;
            Ok(true)
        })
    }
}

fn query_account(conn: &Connection, predicate: &str, value: &str) -> Result<Option<AccountRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM accounts WHERE {}",
        AccountRow::COLUMNS,
        predicate
    ))?;
    let row = stmt.query_row([value], AccountRow::from_row).optional()?;
    Ok(row)
}

fn insert_post_row(conn: &Connection, post: &Post) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO posts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            PostRow::COLUMNS
        ),
        params![
            post.id.to_string(),
            post.author_id.to_string(),
            post.author_name,
            post.content,
            post.category,
            post.phase,
            serde_json::to_string(&post.service_experience)?,
            serde_json::to_string(&post.highlights)?,
            serde_json::to_string(&post.comments)?,
            format_timestamp(post.created_at),
            format_timestamp(post.updated_at),
        ],
    )?;
    Ok(())
}

fn count_by_author(conn: &Connection, author_id: Uuid) -> Result<usize> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
        [author_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(n as usize)
}

fn query_post(conn: &Connection, id: Uuid) -> Result<Option<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM posts WHERE id = ?1",
        PostRow::COLUMNS
    ))?;
    let row = stmt.query_row([id.to_string()], PostRow::from_row).optional()?;
    row.map(PostRow::into_post).transpose()
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
