use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode};

use studio_types::api::Claims;
use studio_types::models::SessionUser;

use crate::auth::AppState;

pub const SESSION_COOKIE: &str = "studio-session";

/// Where protected pages send visitors without a session.
pub const SIGN_IN_REDIRECT: &str = "/?next=/protected";

/// "Current user or none", resolved once per request.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<SessionUser>);

/// Validate an access token issued by the auth provider.
pub fn decode_session(token: &str, secret: &str) -> Option<SessionUser> {
    // Provider tokens carry an audience this app has no opinion on.
    let mut validation = Validation::default();
    validation.validate_aud = false;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .ok()?;

    Some(SessionUser {
        id: token_data.claims.sub,
        email: token_data.claims.email,
        access_token: token.to_string(),
    })
}

/// Session cookie first, then an `Authorization: Bearer` header.
fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Attach a `CurrentUser` to every request. An invalid or expired token is
/// the same as no token.
pub async fn resolve_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let user = session_token(req.headers())
        .and_then(|token| decode_session(&token, &state.auth.jwt_secret));

    req.extensions_mut().insert(CurrentUser(user));
    next.run(req).await
}

/// Gate for protected pages: no user means a redirect home, otherwise the
/// `SessionUser` is handed to the handler directly.
pub async fn require_session(mut req: Request, next: Next) -> Response {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .and_then(|current| current.0.clone());

    match user {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None => Redirect::to(SIGN_IN_REDIRECT).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    fn token(secret: &str, exp_offset: i64) -> (Uuid, String) {
        let sub = Uuid::new_v4();
        let claims = Claims {
            sub,
            email: Some("ada@example.com".into()),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        (sub, token)
    }

    #[test]
    fn valid_token_resolves_user() {
        let (sub, token) = token("secret", 3600);
        let user = decode_session(&token, "secret").unwrap();
        assert_eq!(user.id, sub);
        assert_eq!(user.display_name(), "ada@example.com");
        assert_eq!(user.access_token, token);
    }

    #[test]
    fn wrong_secret_or_expired_is_no_user() {
        let (_, token_a) = token("secret", 3600);
        assert!(decode_session(&token_a, "other").is_none());

        let (_, expired) = token("secret", -3600);
        assert!(decode_session(&expired, "secret").is_none());
        assert!(decode_session("not-a-jwt", "secret").is_none());
    }

    #[test]
    fn cookie_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("other=1; studio-session=from-cookie"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("from-cookie"));
    }
}
