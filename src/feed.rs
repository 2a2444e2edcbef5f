use crate::config::{post_key, user_key, FEED_KEY};
use crate::core::errors::ApiError;
use crate::core::store::{DocumentStore, DocumentStoreExt};
use crate::models::models::{CommentView, FeedPost, Post, User, UserSummary};

/// Stand-in summary for an owner document that no longer resolves. Feeds
/// keep rendering instead of failing on one dangling reference.
fn unknown_user() -> UserSummary {
    UserSummary {
        id: String::new(),
        name: "Unknown".to_string(),
        profile_picture: String::new(),
        followers_count: 0,
        is_following: None,
    }
}

fn summary_for(store: &dyn DocumentStore, user_id: &str) -> Result<UserSummary, ApiError> {
    Ok(store
        .get_json::<User>(&user_key(user_id))?
        .map(|u| u.summary())
        .unwrap_or_else(unknown_user))
}

/// Read-only projection of a post for the feed: owner summary, resolved
/// likers, and comments with their author summaries. Never writes back.
pub fn decorate(store: &dyn DocumentStore, post: &Post) -> Result<FeedPost, ApiError> {
    let user = summary_for(store, &post.user_id)?;

    let mut likes = Vec::with_capacity(post.likes.len());
    for id in &post.likes {
        if let Some(liker) = store.get_json::<User>(&user_key(id))? {
            likes.push(liker.summary());
        }
    }

    let mut comments = Vec::with_capacity(post.comments.len());
    for comment in &post.comments {
        comments.push(CommentView {
            user: summary_for(store, &comment.user_id)?,
            text: comment.text.clone(),
            created_at: comment.created_at.clone(),
        });
    }

    Ok(FeedPost {
        id: post.id.clone(),
        user,
        caption: post.caption.clone(),
        image_url: post.image_url.clone(),
        likes_count: post.likes.len(),
        likes,
        comments,
        created_at: post.created_at.clone(),
    })
}

/// All posts, newest first. Creation-time ties break on id descending so
/// the order is stable across reads.
fn load_sorted(store: &dyn DocumentStore) -> Result<Vec<Post>, ApiError> {
    let ids: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
    let mut posts = Vec::with_capacity(ids.len());
    for id in &ids {
        if let Some(post) = store.get_json::<Post>(&post_key(id))? {
            posts.push(post);
        }
    }
    posts.sort_by(|a, b| {
        (b.created_at.as_str(), b.id.as_str()).cmp(&(a.created_at.as_str(), a.id.as_str()))
    });
    Ok(posts)
}

pub fn global_feed(store: &dyn DocumentStore) -> Result<Vec<FeedPost>, ApiError> {
    load_sorted(store)?
        .iter()
        .map(|p| decorate(store, p))
        .collect()
}

/// Posts whose owner the viewer follows, plus the viewer's own.
pub fn following_feed(store: &dyn DocumentStore, viewer_id: &str) -> Result<Vec<FeedPost>, ApiError> {
    let viewer = store
        .get_json::<User>(&user_key(viewer_id))?
        .ok_or_else(|| ApiError::NotFound("user".to_string()))?;

    load_sorted(store)?
        .iter()
        .filter(|p| p.user_id == viewer_id || viewer.following.iter().any(|f| *f == p.user_id))
        .map(|p| decorate(store, p))
        .collect()
}

pub fn user_posts(store: &dyn DocumentStore, user_id: &str) -> Result<Vec<FeedPost>, ApiError> {
    load_sorted(store)?
        .iter()
        .filter(|p| p.user_id == user_id)
        .map(|p| decorate(store, p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use crate::engagement::{add_comment, toggle_like};
    use crate::follow::toggle_follow;
    use crate::posts::create_post;
    use crate::users::register_user;

    fn put_post(store: &MemoryStore, id: &str, user_id: &str, created_at: &str) {
        let post = Post {
            id: id.to_string(),
            user_id: user_id.to_string(),
            caption: format!("post {}", id),
            image_url: String::new(),
            likes: Vec::new(),
            comments: Vec::new(),
            created_at: created_at.to_string(),
        };
        store.set_json(&post_key(id), &post).unwrap();
        let mut feed: Vec<String> = store.get_json(FEED_KEY).unwrap().unwrap_or_default();
        feed.insert(0, id.to_string());
        store.set_json(FEED_KEY, &feed).unwrap();
    }

    #[test]
    fn global_feed_is_newest_first_with_id_tiebreak() {
        let store = MemoryStore::new();
        let ana = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        put_post(&store, "a1", &ana.id, "2026-01-01T10:00:00+00:00");
        put_post(&store, "a3", &ana.id, "2026-01-02T10:00:00+00:00");
        // Same instant as a3: the larger id wins
        put_post(&store, "a2", &ana.id, "2026-01-02T10:00:00+00:00");

        let feed = global_feed(&store).unwrap();
        let ids: Vec<&str> = feed.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a3", "a2", "a1"]);
    }

    #[test]
    fn following_feed_filters_by_graph() {
        let store = MemoryStore::new();
        let a = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        let b = register_user(&store, "Bob", "bob@example.com", "secret").unwrap();
        let c = register_user(&store, "Cleo", "cleo@example.com", "secret").unwrap();

        toggle_follow(&store, &a.id, &b.id).unwrap();
        let p2 = create_post(&store, &b.id, "hello from bob", "").unwrap();

        let for_a = following_feed(&store, &a.id).unwrap();
        assert!(for_a.iter().any(|p| p.id == p2.id));

        // C follows nobody, so B's post is invisible there
        let for_c = following_feed(&store, &c.id).unwrap();
        assert!(for_c.is_empty());
    }

    #[test]
    fn following_feed_includes_own_posts() {
        let store = MemoryStore::new();
        let a = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        let own = create_post(&store, &a.id, "mine", "").unwrap();

        let feed = following_feed(&store, &a.id).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id, own.id);
    }

    #[test]
    fn decoration_resolves_owner_likers_and_comment_authors() {
        let store = MemoryStore::new();
        let a = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        let b = register_user(&store, "Bob", "bob@example.com", "secret").unwrap();
        let post = create_post(&store, &a.id, "look", "").unwrap();

        toggle_like(&store, &post.id, &b.id).unwrap();
        add_comment(&store, &post.id, &b.id, "nice").unwrap();

        let feed = user_posts(&store, &a.id).unwrap();
        assert_eq!(feed.len(), 1);
        let decorated = &feed[0];
        assert_eq!(decorated.user.name, "Ana");
        assert_eq!(decorated.likes_count, 1);
        assert_eq!(decorated.likes[0].name, "Bob");
        assert_eq!(decorated.comments.len(), 1);
        assert_eq!(decorated.comments[0].user.name, "Bob");
        assert_eq!(decorated.comments[0].text, "nice");

        // Projection left the stored document untouched
        let raw: Post = store.get_json(&post_key(&post.id)).unwrap().unwrap();
        assert_eq!(raw.likes, vec![b.id.clone()]);
        assert_eq!(raw.comments.len(), 1);
    }

    #[test]
    fn dangling_owner_gets_placeholder() {
        let store = MemoryStore::new();
        put_post(&store, "p1", "ghost-user", "2026-01-01T10:00:00+00:00");
        let feed = global_feed(&store).unwrap();
        assert_eq!(feed[0].user.name, "Unknown");
    }
}
