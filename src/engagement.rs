use spin_sdk::http::{Request, Response};
use serde::Serialize;

use crate::auth::verify;
use crate::config::{post_key, user_key, MAX_COMMENT_LENGTH};
use crate::core::errors::ApiError;
use crate::core::helpers::{now_iso, path_segment, sanitize_text, store, validate_uuid};
use crate::core::store::{DocumentStore, DocumentStoreExt};
use crate::models::models::{Comment, Post, User, UserSummary};

#[derive(Serialize, Debug)]
pub struct LikeOutcome {
    pub liked: bool,
    pub likes_count: usize,
}

fn load_post(store: &dyn DocumentStore, post_id: &str) -> Result<Post, ApiError> {
    store
        .get_json::<Post>(&post_key(post_id))?
        .ok_or_else(|| ApiError::NotFound("post".to_string()))
}

/// Adds or removes `actor_id` in the post's like set. Membership is
/// checked on every toggle, so a replayed request can never push the
/// count more than one past its baseline.
pub fn toggle_like(
    store: &dyn DocumentStore,
    post_id: &str,
    actor_id: &str,
) -> Result<LikeOutcome, ApiError> {
    let mut post = load_post(store, post_id)?;

    let liked = if post.likes.iter().any(|id| id == actor_id) {
        post.likes.retain(|id| id != actor_id);
        false
    } else {
        post.likes.push(actor_id.to_string());
        true
    };
    let likes_count = post.likes.len();
    store.set_json(&post_key(post_id), &post)?;

    Ok(LikeOutcome { liked, likes_count })
}

/// Appends a comment with a server-assigned timestamp. Comments are
/// append-only: never reordered, deduplicated, edited, or deleted.
pub fn add_comment(
    store: &dyn DocumentStore,
    post_id: &str,
    actor_id: &str,
    text: &str,
) -> Result<Comment, ApiError> {
    let cleaned = sanitize_text(text).trim().to_string();
    if cleaned.is_empty() {
        return Err(ApiError::Validation("Comment text required".to_string()));
    }
    if cleaned.len() > MAX_COMMENT_LENGTH {
        return Err(ApiError::Validation("Comment too long".to_string()));
    }

    let mut post = load_post(store, post_id)?;
    let comment = Comment {
        user_id: actor_id.to_string(),
        text: cleaned,
        created_at: now_iso(),
    };
    post.comments.push(comment.clone());
    store.set_json(&post_key(post_id), &post)?;

    Ok(comment)
}

pub fn likers(store: &dyn DocumentStore, post_id: &str) -> Result<Vec<UserSummary>, ApiError> {
    let post = load_post(store, post_id)?;
    let mut result = Vec::with_capacity(post.likes.len());
    for id in &post.likes {
        if let Some(user) = store.get_json::<User>(&user_key(id))? {
            result.push(user.summary());
        }
    }
    Ok(result)
}

// === HTTP Handlers ===

pub fn handle_like(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let actor_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    let post_id = path_segment(req.path(), 1).unwrap_or_default();
    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::Validation("Post ID required".to_string()).into());
    }

    match toggle_like(store.as_ref(), post_id, &actor_id) {
        Ok(outcome) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&outcome)?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_likers(req: Request) -> anyhow::Result<Response> {
    let store = store();
    if let Err(err) = verify(store.as_ref(), &req) {
        return Ok(err.into());
    }

    let post_id = path_segment(req.path(), 1).unwrap_or_default();
    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::Validation("Post ID required".to_string()).into());
    }

    match likers(store.as_ref(), post_id) {
        Ok(users) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({ "likes": users }))?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_comment(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let actor_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    let post_id = path_segment(req.path(), 1).unwrap_or_default();
    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::Validation("Post ID required".to_string()).into());
    }

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let text = value["text"].as_str().unwrap_or_default();

    match add_comment(store.as_ref(), post_id, &actor_id, text) {
        Ok(comment) => Ok(Response::builder()
            .status(201)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&comment)?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}
