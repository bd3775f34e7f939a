/// Database row types. These map directly to SQLite rows.
/// Conversion into cce-types models happens here so timestamps and JSON
/// documents are normalized in one place.
use anyhow::{Context, Result};
use cce_types::models::{Comment, Highlight, Post, User};
use cce_types::survey::ServiceExperience;
use rusqlite::Row;
use uuid::Uuid;

use crate::dates::normalize_timestamp;

pub struct AccountRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub reset_token: Option<String>,
    pub reset_expires_at: Option<String>,
    pub created_at: String,
}

impl AccountRow {
    pub const COLUMNS: &'static str =
        "id, email, password, reset_token, reset_expires_at, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            password: row.get(2)?,
            reset_token: row.get(3)?,
            reset_expires_at: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    pub fn user_id(&self) -> Result<Uuid> {
        self.id
            .parse()
            .with_context(|| format!("Corrupt account id '{}'", self.id))
    }
}

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub formal_name: String,
    pub preferred_name: String,
    pub is_admin: bool,
    pub phase: i64,
    pub created_at: String,
}

impl UserRow {
    pub const COLUMNS: &'static str =
        "id, email, formal_name, preferred_name, is_admin, phase, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            formal_name: row.get(2)?,
            preferred_name: row.get(3)?,
            is_admin: row.get(4)?,
            phase: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub fn into_user(self) -> Result<User> {
        let context = format!("user '{}'", self.id);
        Ok(User {
            id: self
                .id
                .parse()
                .with_context(|| format!("Corrupt user id '{}'", self.id))?,
            email: self.email,
            formal_name: self.formal_name,
            preferred_name: self.preferred_name,
            is_admin: self.is_admin,
            phase: u8::try_from(self.phase)
                .with_context(|| format!("Invalid phase {} on {}", self.phase, context))?,
            created_at: normalize_timestamp(&self.created_at, &context),
        })
    }
}

pub struct PostRow {
    pub id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub category: String,
    pub phase: i64,
    pub service_experience: String,
    pub highlights: String,
    pub comments: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PostRow {
    pub const COLUMNS: &'static str = "id, author_id, author_name, content, category, phase, \
         service_experience, highlights, comments, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            author_id: row.get(1)?,
            author_name: row.get(2)?,
            content: row.get(3)?,
            category: row.get(4)?,
            phase: row.get(5)?,
            service_experience: row.get(6)?,
            highlights: row.get(7)?,
            comments: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    pub fn into_post(self) -> Result<Post> {
        let context = format!("post '{}'", self.id);
        let service_experience: ServiceExperience = serde_json::from_str(&self.service_experience)
            .with_context(|| format!("Corrupt service_experience on {}", context))?;
        let highlights: Vec<Highlight> = serde_json::from_str(&self.highlights)
            .with_context(|| format!("Corrupt highlights on {}", context))?;
        let comments: Vec<Comment> = serde_json::from_str(&self.comments)
            .with_context(|| format!("Corrupt comments on {}", context))?;

        Ok(Post {
            id: self
                .id
                .parse()
                .with_context(|| format!("Corrupt post id '{}'", self.id))?,
            author_id: self
                .author_id
                .parse()
                .with_context(|| format!("Corrupt author_id '{}' on {}", self.author_id, context))?,
            author_name: self.author_name,
            content: self.content,
            category: self.category,
            phase: u8::try_from(self.phase)
                .with_context(|| format!("Invalid phase {} on {}", self.phase, context))?,
            service_experience,
            highlights,
            comments,
            created_at: normalize_timestamp(&self.created_at, &context),
            updated_at: normalize_timestamp(&self.updated_at, &context),
        })
    }
}
