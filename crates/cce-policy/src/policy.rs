use cce_types::models::{Post, SUBMISSION_PHASE, User};
use thiserror::Error;

/// Posts a non-admin may own.
pub const MAX_POSTS_PER_USER: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionDenied {
    #[error("sign in to submit a report")]
    NotSignedIn,

    #[error("submissions are closed in phase {0}")]
    PhaseClosed(u8),

    #[error("you have already submitted the maximum of two reports")]
    PostLimitReached,
}

/// Whether `user` may create a post in `phase`. Only the submission phase
/// accepts new posts from students; admins are unrestricted.
pub fn can_create_in_phase(user: Option<&User>, phase: u8) -> bool {
    match user {
        Some(u) if u.is_admin => true,
        Some(u) => u.phase == phase && phase == SUBMISSION_PHASE,
        None => false,
    }
}

pub fn can_create_more_posts(user: Option<&User>, existing_posts: usize) -> bool {
    match user {
        Some(u) if u.is_admin => true,
        Some(_) => existing_posts < MAX_POSTS_PER_USER,
        None => false,
    }
}

/// Later-phase users see earlier-phase content, never the reverse.
pub fn can_view_phase_posts(user: Option<&User>, post_phase: u8) -> bool {
    match user {
        Some(u) => u.is_admin || u.phase >= post_phase,
        None => false,
    }
}

/// Feed visibility of a single post. Phase-1 students only ever see their own.
pub fn can_view_post(user: Option<&User>, post: &Post) -> bool {
    match user {
        Some(u) if u.is_admin => true,
        Some(u) if u.phase <= SUBMISSION_PHASE => post.author_id == u.id,
        Some(u) => can_view_phase_posts(Some(u), post.phase),
        None => false,
    }
}

/// Filters `posts` down to what `user` may see, keeping their order.
pub fn visible_feed(user: Option<&User>, posts: Vec<Post>) -> Vec<Post> {
    posts
        .into_iter()
        .filter(|p| can_view_post(user, p))
        .collect()
}

/// Authors may edit until they are moved past the post's phase.
pub fn can_edit_post(user: Option<&User>, post: &Post) -> bool {
    match user {
        Some(u) if u.is_admin => true,
        Some(u) => post.author_id == u.id && u.phase == post.phase,
        None => false,
    }
}

pub fn can_delete_post(user: Option<&User>, post: &Post) -> bool {
    match user {
        Some(u) => u.is_admin || post.author_id == u.id,
        None => false,
    }
}

/// Highlighting and commenting are open to anyone who can see the post.
pub fn can_interact(user: Option<&User>, post: &Post) -> bool {
    can_view_post(user, post)
}

/// Combined creation gate checked before any write.
pub fn submission_gate(user: Option<&User>, existing_posts: usize) -> Result<(), SubmissionDenied> {
    let Some(u) = user else {
        return Err(SubmissionDenied::NotSignedIn);
    };
    if !can_create_in_phase(user, u.phase) {
        return Err(SubmissionDenied::PhaseClosed(u.phase));
    }
    if !can_create_more_posts(user, existing_posts) {
        return Err(SubmissionDenied::PostLimitReached);
    }
    Ok(())
}
