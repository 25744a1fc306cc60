use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use reqwest::Url;
use tracing::{info, warn};

use studio_db::Database;
use studio_pipeline::PipelineClient;
use studio_types::api::{CallbackQuery, FeedPage, VotingPage};

use crate::cache::RenderCache;
use crate::middleware::{SESSION_COOKIE, decode_session};

/// The one OAuth provider users can sign in with.
pub const OAUTH_PROVIDER: &str = "google";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub pipeline: PipelineClient,
    pub auth: AuthSettings,
    pub feed_cache: RenderCache<FeedPage>,
    pub voting_cache: RenderCache<VotingPage>,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Secret the provider signs access tokens with.
    pub jwt_secret: String,
    pub anon_key: String,
    /// Provider base, e.g. `https://<project>.supabase.co/auth/v1`.
    pub auth_url: String,
    /// Public origin of this app, used for the OAuth callback.
    pub site_url: String,
}

impl AuthSettings {
    pub fn authorize_url(&self) -> anyhow::Result<Url> {
        let redirect_to = format!("{}/auth/callback", self.site_url.trim_end_matches('/'));
        let mut params = vec![("provider", OAUTH_PROVIDER), ("redirect_to", redirect_to.as_str())];
        if !self.anon_key.is_empty() {
            params.push(("apikey", self.anon_key.as_str()));
        }
        let url = Url::parse_with_params(
            &format!("{}/authorize", self.auth_url.trim_end_matches('/')),
            &params,
        )?;
        Ok(url)
    }

    fn secure_cookies(&self) -> bool {
        self.site_url.starts_with("https://")
    }
}

/// GET /auth/sign-in — hands the browser to the provider's OAuth flow.
pub async fn sign_in(State(state): State<AppState>) -> impl IntoResponse {
    match state.auth.authorize_url() {
        Ok(url) => Redirect::to(url.as_str()),
        Err(e) => {
            warn!("Cannot build authorize URL: {}", e);
            Redirect::to("/")
        }
    }
}

/// GET /auth/callback — the provider finished the exchange and hands back an
/// access token, which becomes the session cookie.
pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    let Some(token) = query.access_token.filter(|t| !t.is_empty()) else {
        return (jar, Redirect::to("/"));
    };

    let Some(user) = decode_session(&token, &state.auth.jwt_secret) else {
        warn!("Rejected invalid access token on auth callback");
        return (jar, Redirect::to("/"));
    };

    info!("User {} signed in", user.id);

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(state.auth.secure_cookies())
        .same_site(SameSite::Lax);

    let next = safe_next(query.next.as_deref());
    (jar.add(cookie), Redirect::to(&next))
}

/// POST /auth/sign-out — clears the session and sends the browser home.
/// Repeated submissions land in the same place.
pub async fn sign_out(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Redirect::to("/"))
}

/// Only same-site absolute paths are followed after sign-in.
fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => "/protected".to_string(),
    }
}
