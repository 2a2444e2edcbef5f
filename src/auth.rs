use spin_sdk::http::{Request, Response};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::{token_expiration_hours, token_key, user_key, TOKENS_LIST_KEY, USERS_LIST_KEY};
use crate::core::errors::ApiError;
use crate::core::helpers::{now_iso, parse_timestamp, store, verify_password};
use crate::core::store::{DocumentStore, DocumentStoreExt};
use crate::models::models::{TokenData, User};

pub fn find_user_by_email(store: &dyn DocumentStore, email: &str) -> Result<Option<User>, ApiError> {
    let users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    for id in users {
        if let Some(u) = store.get_json::<User>(&user_key(&id))? {
            if u.email == email {
                return Ok(Some(u));
            }
        }
    }
    Ok(None)
}

/// Checks credentials and issues a fresh bearer token.
pub fn signin_user(
    store: &dyn DocumentStore,
    email: &str,
    password: &str,
) -> Result<(String, String), ApiError> {
    let user = match find_user_by_email(store, email)? {
        Some(u) if verify_password(password, &u.password) => u,
        _ => return Err(ApiError::Auth),
    };
    let token = issue_token(store, &user.id)?;
    Ok((token, user.id))
}

pub fn issue_token(store: &dyn DocumentStore, user_id: &str) -> Result<String, ApiError> {
    let token = Uuid::new_v4().to_string();
    let data = TokenData {
        user_id: user_id.to_string(),
        created_at: now_iso(),
    };
    store.set_json(&token_key(&token), &data)?;

    let mut tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();
    tokens.push(token.clone());
    store.set_json(TOKENS_LIST_KEY, &tokens)?;

    Ok(token)
}

/// Deletes every outstanding token belonging to `user_id`. Used when the
/// password changes so stale sessions stop resolving.
pub fn revoke_user_tokens(store: &dyn DocumentStore, user_id: &str) -> Result<(), ApiError> {
    let tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();
    let mut kept = Vec::with_capacity(tokens.len());
    for token in tokens {
        let key = token_key(&token);
        match store.get_json::<TokenData>(&key)? {
            Some(data) if data.user_id == user_id => store.delete(&key)?,
            Some(_) => kept.push(token),
            // Dangling list entry, drop it
            None => {}
        }
    }
    store.set_json(TOKENS_LIST_KEY, &kept)?;
    Ok(())
}

pub(crate) fn token_expired(data: &TokenData, now: DateTime<Utc>) -> bool {
    match parse_timestamp(&data.created_at) {
        Some(created) => (now - created).num_hours() >= token_expiration_hours(),
        // Unreadable creation time counts as expired
        None => true,
    }
}

/// Resolves the request's bearer token to a user id. Fails with `Auth` on a
/// missing or malformed header, an unknown or expired token, or a token
/// whose user no longer resolves. Never falls back to a default identity.
pub fn verify(store: &dyn DocumentStore, req: &Request) -> Result<String, ApiError> {
    let auth_header = req
        .header("Authorization")
        .and_then(|h| h.as_str())
        .unwrap_or_default();
    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) if !t.is_empty() => t,
        _ => return Err(ApiError::Auth),
    };

    let data = store
        .get_json::<TokenData>(&token_key(token))?
        .ok_or(ApiError::Auth)?;
    if token_expired(&data, Utc::now()) {
        return Err(ApiError::Auth);
    }
    // The account may have vanished since the token was issued
    if store.get_json::<User>(&user_key(&data.user_id))?.is_none() {
        return Err(ApiError::Auth);
    }
    Ok(data.user_id)
}

// === HTTP Handlers ===

pub fn signin(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let creds: serde_json::Value = serde_json::from_slice(req.body())?;
    let email = creds["email"].as_str().unwrap_or_default();
    let password = creds["password"].as_str().unwrap_or_default();

    match signin_user(store.as_ref(), email, password) {
        Ok((token, user_id)) => {
            let resp = serde_json::json!({
                "token": token,
                "user_id": user_id
            });
            Ok(Response::builder()
                .status(200)
                .header("Content-Type", "application/json")
                .body(serde_json::to_vec(&resp)?)
                .build())
        }
        Err(err) => {
            tracing::debug!(email, "signin rejected");
            Ok(err.into())
        }
    }
}

pub fn logout(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let auth_header = req
        .header("Authorization")
        .and_then(|h| h.as_str())
        .unwrap_or_default();

    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) if !t.is_empty() => t,
        _ => return Ok(ApiError::Auth.into()),
    };

    store.delete(&token_key(token))?;
    let tokens: Vec<String> = store.get_json(TOKENS_LIST_KEY)?.unwrap_or_default();
    let kept: Vec<String> = tokens.into_iter().filter(|t| t != token).collect();
    store.set_json(TOKENS_LIST_KEY, &kept)?;

    let resp = serde_json::json!({
        "message": "Logged out successfully"
    });
    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&resp)?)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use crate::users::register_user;
    use chrono::Duration;

    #[test]
    fn signin_issues_resolvable_token() {
        let store = MemoryStore::new();
        let user = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();

        let (token, user_id) = signin_user(&store, "ana@example.com", "secret").unwrap();
        assert_eq!(user_id, user.id);

        let data: TokenData = store.get_json(&token_key(&token)).unwrap().unwrap();
        assert_eq!(data.user_id, user.id);
    }

    #[test]
    fn wrong_password_is_auth_error() {
        let store = MemoryStore::new();
        register_user(&store, "Ana", "ana@example.com", "secret").unwrap();

        let err = signin_user(&store, "ana@example.com", "wrong").unwrap_err();
        assert!(matches!(err, ApiError::Auth));
        let err = signin_user(&store, "nobody@example.com", "secret").unwrap_err();
        assert!(matches!(err, ApiError::Auth));
    }

    #[test]
    fn tokens_expire() {
        let data = TokenData {
            user_id: "u".to_string(),
            created_at: now_iso(),
        };
        assert!(!token_expired(&data, Utc::now()));
        assert!(token_expired(&data, Utc::now() + Duration::hours(25)));

        let garbled = TokenData {
            user_id: "u".to_string(),
            created_at: "around noon".to_string(),
        };
        assert!(token_expired(&garbled, Utc::now()));
    }

    #[test]
    fn revoke_drops_only_that_users_tokens() {
        let store = MemoryStore::new();
        let ana = register_user(&store, "Ana", "ana@example.com", "secret").unwrap();
        let bob = register_user(&store, "Bob", "bob@example.com", "secret").unwrap();
        let ana_token = issue_token(&store, &ana.id).unwrap();
        let bob_token = issue_token(&store, &bob.id).unwrap();

        revoke_user_tokens(&store, &ana.id).unwrap();

        assert!(store
            .get_json::<TokenData>(&token_key(&ana_token))
            .unwrap()
            .is_none());
        assert!(store
            .get_json::<TokenData>(&token_key(&bob_token))
            .unwrap()
            .is_some());
    }
}
