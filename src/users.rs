use spin_sdk::http::{Request, Response};
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::auth::{issue_token, revoke_user_tokens, verify};
use crate::config::{
    user_key, MAX_BIO_LENGTH, MAX_NAME_LENGTH, MIN_PASSWORD_LENGTH, USERS_LIST_KEY,
};
use crate::core::errors::ApiError;
use crate::core::helpers::{
    hash_password, now_iso, path_segment, sanitize_text, store, validate_uuid, verify_password,
};
use crate::core::store::{DocumentStore, DocumentStoreExt};
use crate::feed;
use crate::models::models::User;

fn email_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Regex should compile")
    })
}

fn profile_json(user: &User, include_email: bool) -> serde_json::Value {
    let mut value = serde_json::json!({
        "id": user.id,
        "name": user.name,
        "bio": user.bio,
        "profile_picture": user.profile_picture,
        "followers_count": user.followers.len(),
        "following_count": user.following.len(),
        "created_at": user.created_at,
    });
    if include_email {
        value["email"] = serde_json::Value::String(user.email.clone());
    }
    value
}

/// Creates an account. Emails are unique across the store; names are
/// stored as sanitized plain text.
pub fn register_user(
    store: &dyn DocumentStore,
    name: &str,
    email: &str,
    password: &str,
) -> Result<User, ApiError> {
    let name = sanitize_text(name).trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("Name is required".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(ApiError::Validation("Name too long".to_string()));
    }
    let email = email.trim().to_lowercase();
    if !email_regex().is_match(&email) {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let existing: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in &existing {
        if let Some(u) = store.get_json::<User>(&user_key(id))? {
            if u.email == email {
                return Err(ApiError::Conflict("Email already registered".to_string()));
            }
        }
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name,
        email,
        password: hash_password(password).map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            ApiError::Storage(crate::core::store::StoreError::Backend(e.to_string()))
        })?,
        bio: String::new(),
        profile_picture: String::new(),
        followers: Vec::new(),
        following: Vec::new(),
        created_at: now_iso(),
    };

    store.set_json(&user_key(&user.id), &user)?;
    let mut users = existing;
    users.push(user.id.clone());
    store.set_json(USERS_LIST_KEY, &users)?;

    tracing::info!(user = %user.id, "account created");
    Ok(user)
}

// === HTTP Handlers ===

pub fn handle_signup(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let name = value["name"].as_str().unwrap_or_default();
    let email = value["email"].as_str().unwrap_or_default();
    let password = value["password"].as_str().unwrap_or_default();

    match register_user(store.as_ref(), name, email, password) {
        Ok(user) => Ok(Response::builder()
            .status(201)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({
                "message": "Account created successfully",
                "user": profile_json(&user, true),
            }))?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_get_profile(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    match store.get_json::<User>(&user_key(&user_id))? {
        Some(user) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({
                "user": profile_json(&user, true)
            }))?)
            .build()),
        None => Ok(ApiError::NotFound("user".to_string()).into()),
    }
}

pub fn handle_update_profile(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    let mut user = match store.get_json::<User>(&user_key(&user_id))? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("user".to_string()).into()),
    };

    let value: serde_json::Value = serde_json::from_slice(req.body())?;
    let mut password_changed = false;

    if let Some(name) = value["name"].as_str() {
        let name = sanitize_text(name).trim().to_string();
        if name.is_empty() {
            return Ok(ApiError::Validation("Name is required".to_string()).into());
        }
        if name.len() > MAX_NAME_LENGTH {
            return Ok(ApiError::Validation("Name too long".to_string()).into());
        }
        user.name = name;
    }

    if let Some(bio) = value["bio"].as_str() {
        if bio.len() > MAX_BIO_LENGTH {
            return Ok(ApiError::Validation("Bio too long (max 500 chars)".to_string()).into());
        }
        user.bio = sanitize_text(bio).trim().to_string();
    }

    if let Some(picture) = value["profile_picture"].as_str() {
        user.profile_picture = picture.trim().to_string();
    }

    if let Some(new_password) = value["new_password"].as_str() {
        if new_password.len() < MIN_PASSWORD_LENGTH {
            return Ok(ApiError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ))
            .into());
        }
        let old_password = value["old_password"].as_str().unwrap_or_default();
        if !verify_password(old_password, &user.password) {
            return Ok(ApiError::Auth.into());
        }
        user.password = hash_password(new_password)?;
        password_changed = true;
    }

    store.set_json(&user_key(&user_id), &user)?;

    let mut response = serde_json::json!({ "user": profile_json(&user, true) });
    if password_changed {
        // Stale sessions stop resolving; the caller keeps this one.
        match revoke_user_tokens(store.as_ref(), &user_id)
            .and_then(|_| issue_token(store.as_ref(), &user_id))
        {
            Ok(token) => response["token"] = serde_json::Value::String(token),
            Err(err) => return Ok(err.into()),
        }
    }

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&response)?)
        .build())
}

pub fn handle_remove_picture(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    let mut user = match store.get_json::<User>(&user_key(&user_id))? {
        Some(u) => u,
        None => return Ok(ApiError::NotFound("user".to_string()).into()),
    };

    user.profile_picture = String::new();
    store.set_json(&user_key(&user_id), &user)?;

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({
            "user": profile_json(&user, true)
        }))?)
        .build())
}

pub fn handle_profile_posts(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let user_id = match verify(store.as_ref(), &req) {
        Ok(uid) => uid,
        Err(err) => return Ok(err.into()),
    };

    match feed::user_posts(store.as_ref(), &user_id) {
        Ok(posts) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({ "posts": posts }))?)
            .build()),
        Err(err) => Ok(err.into()),
    }
}

pub fn handle_get_user(req: Request) -> anyhow::Result<Response> {
    let store = store();
    if let Err(err) = verify(store.as_ref(), &req) {
        return Ok(err.into());
    }

    let user_id = path_segment(req.path(), 1).unwrap_or_default();
    if user_id.is_empty() || !validate_uuid(user_id) {
        return Ok(ApiError::Validation("User ID required".to_string()).into());
    }

    match store.get_json::<User>(&user_key(user_id))? {
        Some(user) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&serde_json::json!({
                "user": profile_json(&user, false)
            }))?)
            .build()),
        None => Ok(ApiError::NotFound("user".to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;

    #[test]
    fn signup_creates_account_with_empty_graph() {
        let store = MemoryStore::new();
        let user = register_user(&store, "Ana", "Ana@Example.com", "secret").unwrap();

        assert_eq!(user.email, "ana@example.com");
        assert!(user.followers.is_empty());
        assert!(user.following.is_empty());
        assert!(user.bio.is_empty());
        assert!(user.profile_picture.is_empty());

        let ids: Vec<String> = store.get_json(USERS_LIST_KEY).unwrap().unwrap();
        assert_eq!(ids, vec![user.id]);
    }

    #[test]
    fn duplicate_email_conflicts() {
        let store = MemoryStore::new();
        register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        let err = register_user(&store, "Ana Again", "ana@example.com", "secret").unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn signup_validation() {
        let store = MemoryStore::new();
        assert!(matches!(
            register_user(&store, "", "ana@example.com", "secret").unwrap_err(),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            register_user(&store, "Ana", "not-an-email", "secret").unwrap_err(),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            register_user(&store, "Ana", "ana@example.com", "xx").unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[test]
    fn names_are_sanitized() {
        let store = MemoryStore::new();
        let user = register_user(&store, "<i>Ana</i>", "ana@example.com", "secret").unwrap();
        assert_eq!(user.name, "Ana");
    }

    #[test]
    fn profile_json_hides_email_from_others() {
        let store = MemoryStore::new();
        let user = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        let public = profile_json(&user, false);
        assert!(public.get("email").is_none());
        let own = profile_json(&user, true);
        assert_eq!(own["email"], "ana@example.com");
    }
}
