use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub url: String,
    pub is_public: bool,
    pub created_datetime_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caption {
    pub id: String,
    pub content: Option<String>,
    pub image_id: String,
    pub is_public: bool,
    pub is_featured: bool,
    pub like_count: i64,
    pub created_datetime_utc: DateTime<Utc>,
    pub image: Image,
}

/// The signed-in user as far as this app can see: the auth provider owns
/// everything else.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: Option<String>,
    /// Raw bearer token, forwarded to the captioning API.
    pub access_token: String,
}

impl SessionUser {
    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or("Google user")
    }
}
