use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Caption;

// -- Session --

/// Claims of the auth provider's access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub access_token: Option<String>,
    pub next: Option<String>,
}

/// The sign-in / sign-out button.
#[derive(Debug, Clone, Serialize)]
pub struct AuthControls {
    pub signed_in: bool,
    pub label: String,
    pub method: String,
    pub action: String,
}

impl AuthControls {
    pub fn signed_in() -> Self {
        Self {
            signed_in: true,
            label: "Sign out".into(),
            method: "POST".into(),
            action: "/auth/sign-out".into(),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            signed_in: false,
            label: "Sign in with Google".into(),
            method: "GET".into(),
            action: "/auth/sign-in".into(),
        }
    }
}

// -- Feed --

#[derive(Debug, Clone, Serialize)]
pub struct FeedLinks {
    pub newest: String,
    pub most_liked: String,
    pub featured_only: String,
    pub all_captions: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub rows: Vec<Caption>,
    pub page: u32,
    pub per_page: u32,
    pub order: String,
    pub featured: bool,
    pub public_only: bool,
    pub previous: Option<String>,
    pub next: Option<String>,
    pub links: FeedLinks,
    pub message: Option<String>,
    pub error: Option<String>,
    pub auth: AuthControls,
}

/// Hidden fields the vote form posts back so the redirect lands on the same
/// caption.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteFormState {
    pub caption_id: String,
    pub page: u32,
    pub index: usize,
    pub order: String,
    pub featured: bool,
    pub public_only: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingPage {
    pub signed_in_as: String,
    pub caption: Option<Caption>,
    pub user_vote: Option<i64>,
    pub page: u32,
    pub index: usize,
    pub row_count: usize,
    pub previous: Option<String>,
    pub next: Option<String>,
    pub links: FeedLinks,
    pub form: Option<VoteFormState>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub auth: AuthControls,
}

// -- Votes --

/// Form values stay strings: anything that is not a valid vote is a silent no-op.
#[derive(Debug, Default, Deserialize)]
pub struct VoteForm {
    pub caption_id: Option<String>,
    pub vote_value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnVoteForm {
    pub caption_id: Option<String>,
    pub vote_value: Option<String>,
    pub page: Option<String>,
    pub index: Option<String>,
    pub order: Option<String>,
    pub featured: Option<String>,
    #[serde(rename = "publicOnly")]
    pub public_only: Option<String>,
}

// -- Upload --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPage {
    pub signed_in_as: String,
    pub allowed_types: Vec<String>,
    pub auth: AuthControls,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub cdn_url: String,
    pub image_id: String,
    pub captions: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
