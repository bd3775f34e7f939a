use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use cce_types::models::{Post, User};
use cce_types::survey::{REQUIRED_ATTRIBUTES, VariabilityKind};

/// Quotes a field when it contains a comma, quote or line break.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn header() -> Vec<String> {
    let mut cols: Vec<String> = [
        "post_id",
        "author_id",
        "author_name",
        "author_email",
        "category",
        "phase",
        "created_at",
        "organization_name",
        "organization_type",
        "service_type",
        "service_date",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    for rank in 1..=REQUIRED_ATTRIBUTES {
        cols.push(format!("attribute_{}_name", rank));
        cols.push(format!("attribute_{}_rank", rank));
        cols.push(format!("attribute_{}_rating", rank));
    }
    for kind in VariabilityKind::ALL {
        cols.push(format!("{}_present", kind.as_str()));
        cols.push(format!("{}_description", kind.as_str()));
        cols.push(format!("{}_strategy", kind.as_str()));
    }
    cols.extend(
        [
            "overall_satisfaction",
            "compatibility",
            "likelihood_to_return",
            "narrative",
            "lesson",
            "media_links",
            "highlight_count",
            "comment_count",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    cols
}

fn row(post: &Post, author_email: &str) -> Vec<String> {
    let exp = &post.service_experience;
    let org = &exp.organization;

    let mut cols = vec![
        post.id.to_string(),
        post.author_id.to_string(),
        post.author_name.clone(),
        author_email.to_string(),
        post.category.clone(),
        post.phase.to_string(),
        post.created_at.to_rfc3339(),
        org.organization_name.clone(),
        org.organization_type.clone(),
        org.service_type.clone(),
        org.service_date.clone(),
    ];

    for rank in 1..=REQUIRED_ATTRIBUTES as u8 {
        match exp.attribute_at_rank(rank) {
            Some(attr) => {
                cols.push(attr.name.clone());
                cols.push(attr.user_ranking.to_string());
                cols.push(attr.performance_rating.to_string());
            }
            None => cols.extend([String::new(), String::new(), String::new()]),
        }
    }
    for kind in VariabilityKind::ALL {
        match exp.assessment(kind) {
            Some(v) => {
                cols.push(v.present.to_string());
                cols.push(v.description.clone());
                cols.push(v.strategy.clone());
            }
            None => cols.extend([String::new(), String::new(), String::new()]),
        }
    }

    cols.extend([
        exp.ratings.overall_satisfaction.to_string(),
        exp.ratings.compatibility.to_string(),
        exp.ratings.likelihood_to_return.to_string(),
        exp.narrative.clone(),
        exp.lesson.clone(),
        exp.media_links.join(" "),
        post.highlights.len().to_string(),
        post.comments.len().to_string(),
    ]);
    cols
}

fn join_line(cols: &[String]) -> String {
    cols.iter()
        .map(|c| escape_field(c))
        .collect::<Vec<_>>()
        .join(",")
}

/// One row per post with the survey flattened into fixed columns.
pub fn posts_to_csv(posts: &[Post], users: &[User]) -> String {
    let emails: HashMap<Uuid, &str> = users.iter().map(|u| (u.id, u.email.as_str())).collect();

    let mut out = join_line(&header());
    out.push('\n');
    for post in posts {
        let email = emails.get(&post.author_id).copied().unwrap_or("");
        out.push_str(&join_line(&row(post, email)));
        out.push('\n');
    }
    out
}

pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("cce-export-{}.csv", now.format("%Y%m%d-%H%M%S"))
}
