use spin_sdk::http::{Request, Response};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::auth::verify;
use crate::config::{
    story_key, story_ttl_hours, user_key, DEFAULT_STORY_BACKGROUND, DEFAULT_STORY_TEXT_COLOR,
    MAX_CAPTION_LENGTH, STORIES_LIST_KEY,
};
use crate::core::errors::ApiError;
use crate::core::helpers::{now_iso, parse_timestamp, path_segment, sanitize_text, store, validate_uuid};
use crate::core::store::{DocumentStore, DocumentStoreExt};
use crate::models::models::{Story, StoryView, User, UserSummary};

pub struct StoryInput {
    pub caption: String,
    pub image_url: String,
    pub background_color: String,
    pub text_color: String,
}

fn expired(story: &Story, now: DateTime<Utc>) -> bool {
    match parse_timestamp(&story.created_at) {
        Some(created) => now - created >= Duration::hours(story_ttl_hours()),
        // Unreadable creation time counts as expired
        None => true,
    }
}

pub fn create_story(
    store: &dyn DocumentStore,
    actor_id: &str,
    input: StoryInput,
) -> Result<Story, ApiError> {
    let caption = sanitize_text(&input.caption).trim().to_string();
    if caption.len() > MAX_CAPTION_LENGTH {
        return Err(ApiError::Validation("Caption too long".to_string()));
    }
    let image_url = input.image_url.trim().to_string();
    if caption.is_empty() && image_url.is_empty() {
        return Err(ApiError::Validation(
            "A caption or an image is required".to_string(),
        ));
    }

    let story = Story {
        id: Uuid::new_v4().to_string(),
        user_id: actor_id.to_string(),
        caption,
        image_url,
        background_color: if input.background_color.trim().is_empty() {
            DEFAULT_STORY_BACKGROUND.to_string()
        } else {
            input.background_color.trim().to_string()
        },
        text_color: if input.text_color.trim().is_empty() {
            DEFAULT_STORY_TEXT_COLOR.to_string()
        } else {
            input.text_color.trim().to_string()
        },
        created_at: now_iso(),
    };

    store.set_json(&story_key(&story.id), &story)?;
    let mut ids: Vec<String> = store.get_json(STORIES_LIST_KEY)?.unwrap_or_default();
    ids.insert(0, story.id.clone());
    store.set_json(STORIES_LIST_KEY, &ids)?;

    tracing::info!(story = %story.id, owner = actor_id, "story created");
    Ok(story)
}

/// Every story younger than the TTL at `now`, newest first. Records past
/// the TTL are invisible here no matter when a purge last ran; the read
/// also lazily deletes them and rewrites the index.
pub fn active_stories(store: &dyn DocumentStore, now: DateTime<Utc>) -> Result<Vec<Story>, ApiError> {
    let ids: Vec<String> = store.get_json(STORIES_LIST_KEY)?.unwrap_or_default();
    let mut active = Vec::new();
    let mut kept_ids = Vec::with_capacity(ids.len());

    for id in &ids {
        match store.get_json::<Story>(&story_key(id))? {
            Some(story) if !expired(&story, now) => {
                kept_ids.push(id.clone());
                active.push(story);
            }
            Some(_) => store.delete(&story_key(id))?,
            // Dangling index entry, drop it
            None => {}
        }
    }

    if kept_ids.len() != ids.len() {
        store.set_json(STORIES_LIST_KEY, &kept_ids)?;
    }

    active.sort_by(|a, b| {
        (b.created_at.as_str(), b.id.as_str()).cmp(&(a.created_at.as_str(), a.id.as_str()))
    });
    Ok(active)
}

pub fn user_stories(
    store: &dyn DocumentStore,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Story>, ApiError> {
    Ok(active_stories(store, now)?
        .into_iter()
        .filter(|s| s.user_id == user_id)
        .collect())
}

pub fn delete_story(store: &dyn DocumentStore, story_id: &str, actor_id: &str) -> Result<(), ApiError> {
    let story = store
        .get_json::<Story>(&story_key(story_id))?
        .ok_or_else(|| ApiError::NotFound("story".to_string()))?;
    if story.user_id != actor_id {
        return Err(ApiError::Forbidden);
    }

    store.delete(&story_key(story_id))?;
    let mut ids: Vec<String> = store.get_json(STORIES_LIST_KEY)?.unwrap_or_default();
    ids.retain(|id| id != story_id);
    store.set_json(STORIES_LIST_KEY, &ids)?;
    Ok(())
}

fn to_view(store: &dyn DocumentStore, story: Story) -> Result<StoryView, ApiError> {
    let user = store
        .get_json::<User>(&user_key(&story.user_id))?
        .map(|u| u.summary())
        .unwrap_or(UserSummary {
            id: story.user_id.clone(),
            name: "Unknown".to_string(),
            profile_picture: String::new(),
            followers_count: 0,
            is_following: None,
        });
    Ok(StoryView {
        id: story.id,
        user,
        caption: story.caption,
        image_url: story.image_url,
        background_color: story.background_color,
        text_color: story.text_color,
        created_at: story.created_at,
    })
}

// === HTTP Handlers ===

pub fn handle_create(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let actor_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let input = StoryInput {
        caption: value["caption"].as_str().unwrap_or_default().to_string(),
        image_url: value["image_url"].as_str().unwrap_or_default().to_string(),
        background_color: value["background_color"].as_str().unwrap_or_default().to_string(),
        text_color: value["text_color"].as_str().unwrap_or_default().to_string(),
    };

    match create_story(store.as_ref(), &actor_id, input) {
        Ok(story) => Ok(Response::builder()
            .status(201)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&story)?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_list(req: Request) -> anyhow::Result<Response> {
    let store = store();
    if let Err(err) = verify(store.as_ref(), &req) {
        return Ok(err.into());
    }

    match active_stories(store.as_ref(), Utc::now()) {
        Ok(stories) => {
            let mut views = Vec::with_capacity(stories.len());
            for story in stories {
                views.push(to_view(store.as_ref(), story)?);
            }
            Ok(Response::builder()
                .status(200)
                .header("Content-Type", "application/json")
                .body(serde_json::to_vec(&serde_json::json!({ "stories": views }))?)
                .build())
        }
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_mine(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let actor_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    match user_stories(store.as_ref(), &actor_id, Utc::now()) {
        Ok(stories) => {
            let mut views = Vec::with_capacity(stories.len());
            for story in stories {
                views.push(to_view(store.as_ref(), story)?);
            }
            Ok(Response::builder()
                .status(200)
                .header("Content-Type", "application/json")
                .body(serde_json::to_vec(&serde_json::json!({ "stories": views }))?)
                .build())
        }
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_delete(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let actor_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    let story_id = path_segment(req.path(), 1).unwrap_or_default();
    if story_id.is_empty() || !validate_uuid(story_id) {
        return Ok(ApiError::Validation("Story ID required".to_string()).into());
    }

    match delete_story(store.as_ref(), story_id, &actor_id) {
        Ok(()) => Ok(Response::builder().status(204).build()),
        Err(err) => Ok(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use crate::users::register_user;

    fn text_story(store: &MemoryStore, owner: &str, caption: &str) -> Story {
        create_story(
            store,
            owner,
            StoryInput {
                caption: caption.to_string(),
                image_url: String::new(),
                background_color: String::new(),
                text_color: String::new(),
            },
        )
        .unwrap()
    }

    #[test]
    fn create_requires_caption_or_image_and_defaults_colors() {
        let store = MemoryStore::new();
        let ana = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();

        let err = create_story(
            &store,
            &ana.id,
            StoryInput {
                caption: "  ".to_string(),
                image_url: String::new(),
                background_color: String::new(),
                text_color: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let story = text_story(&store, &ana.id, "hi");
        assert_eq!(story.background_color, DEFAULT_STORY_BACKGROUND);
        assert_eq!(story.text_color, DEFAULT_STORY_TEXT_COLOR);
    }

    #[test]
    fn stories_expire_after_24_hours() {
        let store = MemoryStore::new();
        let ana = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        let story = text_story(&store, &ana.id, "ephemeral");
        let created = parse_timestamp(&story.created_at).unwrap();

        let just_before = created + Duration::hours(23) + Duration::minutes(59);
        let listed = active_stories(&store, just_before).unwrap();
        assert_eq!(listed.len(), 1);

        let just_after = created + Duration::hours(24) + Duration::minutes(1);
        let listed = active_stories(&store, just_after).unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn expired_stories_are_purged_lazily() {
        let store = MemoryStore::new();
        let ana = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        let story = text_story(&store, &ana.id, "ephemeral");
        let created = parse_timestamp(&story.created_at).unwrap();

        active_stories(&store, created + Duration::hours(25)).unwrap();

        // The record and its index entry are gone, not just filtered
        assert!(store.get_json::<Story>(&story_key(&story.id)).unwrap().is_none());
        let ids: Vec<String> = store.get_json(STORIES_LIST_KEY).unwrap().unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let store = MemoryStore::new();
        let ana = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        let story = text_story(&store, &ana.id, "ephemeral");
        let created = parse_timestamp(&story.created_at).unwrap();

        let at_24h = created + Duration::hours(24);
        assert!(active_stories(&store, at_24h).unwrap().is_empty());
    }

    #[test]
    fn user_stories_filters_by_owner() {
        let store = MemoryStore::new();
        let ana = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        let bob = register_user(&store, "Bob", "bob@example.com", "secret").unwrap();
        text_story(&store, &ana.id, "ana's");
        text_story(&store, &bob.id, "bob's");

        let mine = user_stories(&store, &ana.id, Utc::now()).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].caption, "ana's");
    }

    #[test]
    fn delete_enforces_ownership() {
        let store = MemoryStore::new();
        let ana = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        let bob = register_user(&store, "Bob", "bob@example.com", "secret").unwrap();
        let story = text_story(&store, &ana.id, "mine");

        let err = delete_story(&store, &story.id, &bob.id).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));

        delete_story(&store, &story.id, &ana.id).unwrap();
        assert!(matches!(
            delete_story(&store, &story.id, &ana.id).unwrap_err(),
            ApiError::NotFound(_)
        ));
    }
}
