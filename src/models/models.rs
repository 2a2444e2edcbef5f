use serde::{Serialize, Deserialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub profile_picture: String,
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub following: Vec<String>,
    pub created_at: String,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            profile_picture: self.profile_picture.clone(),
            followers_count: self.followers.len(),
            is_following: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Comment {
    pub user_id: String,
    pub text: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Story {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub image_url: String,
    pub background_color: String,
    pub text_color: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenData {
    pub user_id: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize)]
pub struct MediaMeta {
    pub content_type: String,
    pub ratio: String,
    pub user_id: String,
    pub created_at: String,
}

/// Public projection of a user, safe to embed in API responses.
/// `is_following` is only set on listings where the viewer's own
/// relation to the entry matters (followers, following, suggestions).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub profile_picture: String,
    pub followers_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
}

#[derive(Serialize, Clone)]
pub struct CommentView {
    pub user: UserSummary,
    pub text: String,
    pub created_at: String,
}

#[derive(Serialize, Clone)]
pub struct FeedPost {
    pub id: String,
    pub user: UserSummary,
    pub caption: String,
    pub image_url: String,
    pub likes_count: usize,
    pub likes: Vec<UserSummary>,
    pub comments: Vec<CommentView>,
    pub created_at: String,
}

#[derive(Serialize, Clone)]
pub struct StoryView {
    pub id: String,
    pub user: UserSummary,
    pub caption: String,
    pub image_url: String,
    pub background_color: String,
    pub text_color: String,
    pub created_at: String,
}
