use spin_sdk::http::{Request, Response};
use uuid::Uuid;

use crate::auth::verify;
use crate::config::{post_key, FEED_KEY, MAX_CAPTION_LENGTH, POSTS_PER_PAGE};
use crate::core::errors::ApiError;
use crate::core::helpers::{now_iso, path_segment, sanitize_text, store, validate_uuid};
use crate::core::query_params::{get_int, parse_query_params};
use crate::core::store::{DocumentStore, DocumentStoreExt};
use crate::feed;
use crate::models::models::Post;

fn clean_caption(caption: &str) -> Result<String, ApiError> {
    let cleaned = sanitize_text(caption).trim().to_string();
    if cleaned.len() > MAX_CAPTION_LENGTH {
        return Err(ApiError::Validation("Caption too long".to_string()));
    }
    Ok(cleaned)
}

/// Creates a post owned by `actor_id` and prepends it to the global feed
/// index. At least one of caption and image must survive sanitization.
pub fn create_post(
    store: &dyn DocumentStore,
    actor_id: &str,
    caption: &str,
    image_url: &str,
) -> Result<Post, ApiError> {
    let caption = clean_caption(caption)?;
    let image_url = image_url.trim().to_string();
    if caption.is_empty() && image_url.is_empty() {
        return Err(ApiError::Validation(
            "A caption or an image is required".to_string(),
        ));
    }

    let post = Post {
        id: Uuid::new_v4().to_string(),
        user_id: actor_id.to_string(),
        caption,
        image_url,
        likes: Vec::new(),
        comments: Vec::new(),
        created_at: now_iso(),
    };

    store.set_json(&post_key(&post.id), &post)?;

    let mut feed_ids: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    feed_ids.insert(0, post.id.clone());
    store.set_json(FEED_KEY, &feed_ids)?;

    tracing::info!(post = %post.id, owner = actor_id, "post created");
    Ok(post)
}

/// Replaces the caption. Only the owner may edit, and the post must keep
/// either a caption or an image.
pub fn edit_caption(
    store: &dyn DocumentStore,
    post_id: &str,
    actor_id: &str,
    caption: &str,
) -> Result<Post, ApiError> {
    let mut post = store
        .get_json::<Post>(&post_key(post_id))?
        .ok_or_else(|| ApiError::NotFound("post".to_string()))?;
    if post.user_id != actor_id {
        return Err(ApiError::Forbidden);
    }

    let caption = clean_caption(caption)?;
    if caption.is_empty() && post.image_url.is_empty() {
        return Err(ApiError::Validation(
            "A caption or an image is required".to_string(),
        ));
    }

    post.caption = caption;
    store.set_json(&post_key(post_id), &post)?;
    Ok(post)
}

/// Deletes the post and its feed index entry. Embedded likes and comments
/// vanish with the document; nothing else references them.
pub fn delete_post(store: &dyn DocumentStore, post_id: &str, actor_id: &str) -> Result<(), ApiError> {
    let post = store
        .get_json::<Post>(&post_key(post_id))?
        .ok_or_else(|| ApiError::NotFound("post".to_string()))?;
    if post.user_id != actor_id {
        return Err(ApiError::Forbidden);
    }

    store.delete(&post_key(post_id))?;
    let mut feed_ids: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    feed_ids.retain(|id| id != post_id);
    store.set_json(FEED_KEY, &feed_ids)?;

    tracing::info!(post = post_id, owner = actor_id, "post deleted");
    Ok(())
}

// === HTTP Handlers ===

pub fn handle_create(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let actor_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let caption = value["caption"].as_str().unwrap_or_default();
    let image_url = value["image_url"].as_str().unwrap_or_default();

    match create_post(store.as_ref(), &actor_id, caption, image_url) {
        Ok(post) => Ok(Response::builder()
            .status(201)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&post)?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_edit(req: Request) -> anyhow::Result<Response> {
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
    let caption = value["caption"].as_str().unwrap_or_default();

    match edit_caption(store.as_ref(), post_id, &actor_id, caption) {
        Ok(post) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&post)?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_delete(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let actor_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    let post_id = path_segment(req.path(), 1).unwrap_or_default();
    if post_id.is_empty() || !validate_uuid(post_id) {
        return Ok(ApiError::Validation("Post ID required".to_string()).into());
    }

    match delete_post(store.as_ref(), post_id, &actor_id) {
        Ok(()) => Ok(Response::builder().status(204).build()),
        Err(err) => Ok(err.into()),
    }
}

/// Global feed, newest first, paginated with `?page=`.
pub fn handle_global_feed(req: Request) -> anyhow::Result<Response> {
    let store = store();
    if let Err(err) = verify(store.as_ref(), &req) {
        return Ok(err.into());
    }

    let params = parse_query_params(req.uri());
    let page = get_int(&params, "page", 1);
    let start_idx = (page - 1) * POSTS_PER_PAGE;

    match feed::global_feed(store.as_ref()) {
        Ok(posts) => {
            let page_posts: Vec<_> = posts.into_iter().skip(start_idx).take(POSTS_PER_PAGE).collect();
            Ok(Response::builder()
                .status(200)
                .header("Content-Type", "application/json")
                .body(serde_json::to_vec(&serde_json::json!({ "posts": page_posts }))?)
                .build())
        }
        Err(err) => Ok(err.into()),
    }
}

/// Posts from followed users plus the viewer's own.
pub fn handle_following_feed(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let viewer_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    match feed::following_feed(store.as_ref(), &viewer_id) {
        Ok(posts) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({ "posts": posts }))?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}
