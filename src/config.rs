pub const USERS_LIST_KEY: &str = "users_list";
pub const FEED_KEY: &str = "feed";
pub const STORIES_LIST_KEY: &str = "stories_list";
pub const TOKENS_LIST_KEY: &str = "tokens_list";

pub const MAX_NAME_LENGTH: usize = 80;
pub const MIN_PASSWORD_LENGTH: usize = 3;
pub const MAX_BIO_LENGTH: usize = 500;
pub const MAX_CAPTION_LENGTH: usize = 2000;
pub const MAX_COMMENT_LENGTH: usize = 1000;
pub const POSTS_PER_PAGE: usize = 20;
pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;

pub const DEFAULT_STORY_BACKGROUND: &str = "#0095f6";
pub const DEFAULT_STORY_TEXT_COLOR: &str = "#ffffff";

pub fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

pub fn post_key(id: &str) -> String {
    format!("post:{}", id)
}

pub fn story_key(id: &str) -> String {
    format!("story:{}", id)
}

pub fn token_key(token: &str) -> String {
    format!("token:{}", token)
}

pub fn media_key(id: &str) -> String {
    format!("media:{}", id)
}

pub fn media_meta_key(id: &str) -> String {
    format!("media_meta:{}", id)
}

pub fn token_expiration_hours() -> i64 {
    std::env::var("MURAL_TOKEN_EXPIRATION_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(24)
}

pub fn story_ttl_hours() -> i64 {
    std::env::var("MURAL_STORY_TTL_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(24)
}
