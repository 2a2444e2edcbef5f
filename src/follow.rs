use spin_sdk::http::{Request, Response};
use serde::Serialize;

use crate::auth::verify;
use crate::config::{user_key, DEFAULT_SUGGESTION_LIMIT, USERS_LIST_KEY};
use crate::core::errors::ApiError;
use crate::core::helpers::{path_segment, store, validate_uuid};
use crate::core::query_params::{get_int, parse_query_params};
use crate::core::store::{DocumentStore, DocumentStoreExt};
use crate::models::models::{User, UserSummary};

#[derive(Serialize, Debug, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum FollowAction {
    Follow,
    Unfollow,
}

#[derive(Serialize, Debug)]
pub struct FollowOutcome {
    pub action: FollowAction,
    pub actor: UserSummary,
    pub target: UserSummary,
}

fn load_user(store: &dyn DocumentStore, id: &str) -> Result<User, ApiError> {
    store
        .get_json::<User>(&user_key(id))?
        .ok_or_else(|| ApiError::NotFound("user".to_string()))
}

/// Toggles the follow edge from `actor_id` to `target_id`.
///
/// The direction is decided solely from `actor.following`, and both sides
/// of the mirrored pair are rewritten to match it: a partial write leaves a
/// state the next toggle converges back to symmetry. Membership is checked
/// before every insert, so replays never duplicate an edge.
pub fn toggle_follow(
    store: &dyn DocumentStore,
    actor_id: &str,
    target_id: &str,
) -> Result<FollowOutcome, ApiError> {
    if actor_id == target_id {
        return Err(ApiError::SelfFollow);
    }

    let mut actor = load_user(store, actor_id)?;
    let mut target = load_user(store, target_id)?;

    let action = if actor.following.iter().any(|id| id == target_id) {
        actor.following.retain(|id| id != target_id);
        target.followers.retain(|id| id != actor_id);
        FollowAction::Unfollow
    } else {
        actor.following.push(target_id.to_string());
        if !target.followers.iter().any(|id| id == actor_id) {
            target.followers.push(actor_id.to_string());
        }
        FollowAction::Follow
    };

    // Target first: if the second write fails, actor.following still holds
    // the old direction and a retry re-converges both documents.
    store.set_json(&user_key(target_id), &target)?;
    store.set_json(&user_key(actor_id), &actor)?;

    tracing::info!(actor = actor_id, target = target_id, ?action, "follow toggled");

    Ok(FollowOutcome {
        action,
        actor: actor.summary(),
        target: target.summary(),
    })
}

/// Pure membership check. A self-check is `false`, never an error.
pub fn follow_status(
    store: &dyn DocumentStore,
    actor_id: &str,
    target_id: &str,
) -> Result<bool, ApiError> {
    if actor_id == target_id {
        return Ok(false);
    }
    let actor = load_user(store, actor_id)?;
    Ok(actor.following.iter().any(|id| id == target_id))
}

/// Everyone the actor does not already follow, excluding the actor,
/// newest account first (id-descending tiebreak), capped at `limit`.
pub fn suggestions(
    store: &dyn DocumentStore,
    actor_id: &str,
    limit: usize,
) -> Result<Vec<UserSummary>, ApiError> {
    let actor = load_user(store, actor_id)?;
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();

    let mut candidates = Vec::new();
    for id in users {
        if id == actor_id || actor.following.iter().any(|f| *f == id) {
            continue;
        }
        if let Some(user) = store.get_json::<User>(&user_key(&id))? {
            candidates.push(user);
        }
    }

    candidates.sort_by(|a, b| {
        (b.created_at.as_str(), b.id.as_str()).cmp(&(a.created_at.as_str(), a.id.as_str()))
    });
    candidates.truncate(limit);

    Ok(candidates
        .iter()
        .map(|u| {
            let mut summary = u.summary();
            summary.is_following = Some(false);
            summary
        })
        .collect())
}

/// The viewer's followers, each annotated with whether the viewer follows
/// them back (drives the Follow-back button).
pub fn followers(store: &dyn DocumentStore, viewer_id: &str) -> Result<Vec<UserSummary>, ApiError> {
    let viewer = load_user(store, viewer_id)?;
    let mut result = Vec::with_capacity(viewer.followers.len());
    for id in &viewer.followers {
        if let Some(user) = store.get_json::<User>(&user_key(id))? {
            let mut summary = user.summary();
            summary.is_following = Some(viewer.following.iter().any(|f| f == id));
            result.push(summary);
        }
    }
    Ok(result)
}

pub fn following(store: &dyn DocumentStore, viewer_id: &str) -> Result<Vec<UserSummary>, ApiError> {
    let viewer = load_user(store, viewer_id)?;
    let mut result = Vec::with_capacity(viewer.following.len());
    for id in &viewer.following {
        if let Some(user) = store.get_json::<User>(&user_key(id))? {
            let mut summary = user.summary();
            summary.is_following = Some(true);
            result.push(summary);
        }
    }
    Ok(result)
}

// === HTTP Handlers ===

pub fn handle_follow(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let actor_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    let target_id = path_segment(req.path(), 1).unwrap_or_default();
    if target_id.is_empty() || !validate_uuid(target_id) {
        return Ok(ApiError::Validation("Invalid target user".to_string()).into());
    }

    match toggle_follow(store.as_ref(), &actor_id, target_id) {
        Ok(outcome) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&outcome)?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_follow_status(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let actor_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    let target_id = path_segment(req.path(), 2).unwrap_or_default();
    if target_id.is_empty() || !validate_uuid(target_id) {
        return Ok(ApiError::Validation("User ID required".to_string()).into());
    }

    match follow_status(store.as_ref(), &actor_id, target_id) {
        Ok(is_following) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({
                "is_following": is_following
            }))?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_suggestions(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let actor_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    let params = parse_query_params(req.uri());
    let limit = get_int(&params, "limit", DEFAULT_SUGGESTION_LIMIT);

    match suggestions(store.as_ref(), &actor_id, limit) {
        Ok(users) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({ "users": users }))?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_followers(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let viewer_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    match followers(store.as_ref(), &viewer_id) {
        Ok(users) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({ "followers": users }))?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_following(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let viewer_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    match following(store.as_ref(), &viewer_id) {
        Ok(users) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({ "following": users }))?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use crate::users::register_user;

    fn two_users(store: &MemoryStore) -> (User, User) {
        let a = register_user(store, "Ana", "ana@example.com", "secret").unwrap();
        let b = register_user(store, "Bob", "bob@example.com", "secret").unwrap();
        (a, b)
    }

    #[test]
    fn follow_mirrors_both_documents() {
        let store = MemoryStore::new();
        let (a, b) = two_users(&store);

        let outcome = toggle_follow(&store, &a.id, &b.id).unwrap();
        assert_eq!(outcome.action, FollowAction::Follow);

        assert!(follow_status(&store, &a.id, &b.id).unwrap());
        let a_doc: User = store.get_json(&user_key(&a.id)).unwrap().unwrap();
        let b_doc: User = store.get_json(&user_key(&b.id)).unwrap().unwrap();
        assert!(a_doc.following.contains(&b.id));
        assert!(b_doc.followers.contains(&a.id));
        // The reverse direction was not created
        assert!(!b_doc.following.contains(&a.id));
        assert!(!a_doc.followers.contains(&b.id));
    }

    #[test]
    fn toggle_follows_then_unfollows_then_refollows() {
        let store = MemoryStore::new();
        let (a, b) = two_users(&store);

        assert_eq!(
            toggle_follow(&store, &a.id, &b.id).unwrap().action,
            FollowAction::Follow
        );
        assert_eq!(
            toggle_follow(&store, &a.id, &b.id).unwrap().action,
            FollowAction::Unfollow
        );
        assert!(!follow_status(&store, &a.id, &b.id).unwrap());
        let b_doc: User = store.get_json(&user_key(&b.id)).unwrap().unwrap();
        assert!(b_doc.followers.is_empty());

        assert_eq!(
            toggle_follow(&store, &a.id, &b.id).unwrap().action,
            FollowAction::Follow
        );
        assert!(follow_status(&store, &a.id, &b.id).unwrap());
    }

    #[test]
    fn self_follow_always_fails() {
        let store = MemoryStore::new();
        let (a, _) = two_users(&store);
        let err = toggle_follow(&store, &a.id, &a.id).unwrap_err();
        assert!(matches!(err, ApiError::SelfFollow));
        // And the status check on self is a plain false
        assert!(!follow_status(&store, &a.id, &a.id).unwrap());
    }

    #[test]
    fn follow_unknown_target_is_not_found() {
        let store = MemoryStore::new();
        let (a, _) = two_users(&store);
        let err = toggle_follow(&store, &a.id, "00000000-0000-0000-0000-000000000000").unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn asymmetric_state_converges_on_next_toggle() {
        let store = MemoryStore::new();
        let (a, b) = two_users(&store);

        // Simulate a partial write: target gained the follower edge but the
        // actor document was never updated.
        let mut b_doc: User = store.get_json(&user_key(&b.id)).unwrap().unwrap();
        b_doc.followers.push(a.id.clone());
        store.set_json(&user_key(&b.id), &b_doc).unwrap();

        let outcome = toggle_follow(&store, &a.id, &b.id).unwrap();
        assert_eq!(outcome.action, FollowAction::Follow);

        let a_doc: User = store.get_json(&user_key(&a.id)).unwrap().unwrap();
        let b_doc: User = store.get_json(&user_key(&b.id)).unwrap().unwrap();
        assert_eq!(a_doc.following, vec![b.id.clone()]);
        // No duplicate follower entry was appended
        assert_eq!(b_doc.followers, vec![a.id.clone()]);
    }

    #[test]
    fn suggestions_exclude_self_and_followed() {
        let store = MemoryStore::new();
        let (a, b) = two_users(&store);
        let c = register_user(&store, "Cleo", "cleo@example.com", "secret").unwrap();

        toggle_follow(&store, &a.id, &b.id).unwrap();

        let suggested = suggestions(&store, &a.id, 10).unwrap();
        let ids: Vec<&str> = suggested.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec![c.id.as_str()]);
        assert_eq!(suggested[0].is_following, Some(false));
    }

    #[test]
    fn suggestions_respect_limit() {
        let store = MemoryStore::new();
        let a = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        for i in 0..5 {
            register_user(
                &store,
                &format!("User{}", i),
                &format!("user{}@example.com", i),
                "secret",
            )
            .unwrap();
        }
        assert_eq!(suggestions(&store, &a.id, 3).unwrap().len(), 3);
    }

    #[test]
    fn follower_listing_annotates_follow_back() {
        let store = MemoryStore::new();
        let (a, b) = two_users(&store);
        let c = register_user(&store, "Cleo", "cleo@example.com", "secret").unwrap();

        // Both follow Ana; Ana follows only Bob back.
        toggle_follow(&store, &b.id, &a.id).unwrap();
        toggle_follow(&store, &c.id, &a.id).unwrap();
        toggle_follow(&store, &a.id, &b.id).unwrap();

        let list = followers(&store, &a.id).unwrap();
        assert_eq!(list.len(), 2);
        let bob = list.iter().find(|u| u.id == b.id).unwrap();
        let cleo = list.iter().find(|u| u.id == c.id).unwrap();
        assert_eq!(bob.is_following, Some(true));
        assert_eq!(cleo.is_following, Some(false));

        let mine = following(&store, &a.id).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, b.id);
        assert_eq!(mine[0].is_following, Some(true));
    }
}
