use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use uuid::Uuid;

use crate::core::store::DocumentStore;

/// Opens the request-scoped store handle. Inside the Spin sandbox this is
/// the component's default key-value store; on native builds every request
/// shares one process-wide in-memory store.
#[cfg(target_arch = "wasm32")]
pub fn store() -> Arc<dyn DocumentStore> {
    Arc::new(crate::core::store::SpinStore::open_default().expect("KV store must exist"))
}

#[cfg(not(target_arch = "wasm32"))]
pub fn store() -> Arc<dyn DocumentStore> {
    use std::sync::OnceLock;
    static SHARED: OnceLock<Arc<crate::core::store::MemoryStore>> = OnceLock::new();
    SHARED
        .get_or_init(|| Arc::new(crate::core::store::MemoryStore::new()))
        .clone()
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::PasswordHash;

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub fn validate_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Strips all HTML from user-supplied text. Fields are stored as plain
/// text only; entity-escaping of the survivors is ammonia's.
pub fn sanitize_text(text: &str) -> String {
    ammonia::Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string()
}

/// Path segment by index, with the leading slash skipped:
/// `segment("/posts/42/like", 1)` is `Some("42")`.
pub fn path_segment(path: &str, idx: usize) -> Option<&str> {
    path.trim_start_matches('/')
        .split('/')
        .nth(idx)
        .filter(|s| !s.is_empty())
}
