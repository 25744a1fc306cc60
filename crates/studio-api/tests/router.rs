use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use studio_api::cache::RenderCache;
use studio_api::{AppState, AppStateInner, AuthSettings, router};
use studio_db::models::{CaptionRow, ImageRow};
use studio_db::{Database, format_timestamp};
use studio_pipeline::PipelineClient;
use studio_types::api::Claims;

const SECRET: &str = "test-secret";

fn state(cache_ttl: Duration) -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory("captions").unwrap(),
        // Nothing listens here; tests that reach the network would fail.
        pipeline: PipelineClient::new("http://127.0.0.1:9"),
        auth: AuthSettings {
            jwt_secret: SECRET.into(),
            anon_key: String::new(),
            auth_url: "https://auth.test/auth/v1".into(),
            site_url: "http://localhost:3000".into(),
        },
        feed_cache: RenderCache::new(cache_ttl),
        voting_cache: RenderCache::new(cache_ttl),
    })
}

fn token(user: Uuid) -> String {
    let claims = Claims {
        sub: user,
        email: Some("tester@example.com".into()),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn seed(state: &AppState, public_captions: usize) {
    let base: DateTime<Utc> = "2025-06-01T00:00:00Z".parse().unwrap();
    state
        .db
        .insert_image(&ImageRow {
            id: "img-1".into(),
            url: Some("https://cdn.test/img-1.png".into()),
            is_public: true,
            created_datetime_utc: format_timestamp(base),
        })
        .unwrap();
    for n in 0..public_captions {
        state
            .db
            .insert_caption(&CaptionRow {
                id: format!("cap-{:02}", n),
                content: Some(format!("Caption number {}", n)),
                image_id: "img-1".into(),
                is_public: true,
                is_featured: false,
                like_count: n as i64,
                created_datetime_utc: format_timestamp(base + chrono::Duration::minutes(n as i64)),
            })
            .unwrap();
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap().to_vec();
    (status, headers, body)
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("studio-session={}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn location(headers: &axum::http::HeaderMap) -> &str {
    headers.get(header::LOCATION).unwrap().to_str().unwrap()
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn protected_pages_redirect_without_session() {
    let app = router(state(Duration::ZERO));

    for uri in ["/protected", "/protected/upload"] {
        let (status, headers, _) = send(&app, get(uri, None)).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location(&headers), "/?next=/protected");
    }
}

#[tokio::test]
async fn public_feed_pages_through_fifteen_captions() {
    let state = state(Duration::ZERO);
    seed(&state, 15);
    let app = router(state);

    let (status, _, body) = send(
        &app,
        get("/?order=caption_created_desc&featured=false&publicOnly=true&page=1", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let page = json(&body);
    let rows = page["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 12);
    assert_eq!(rows[0]["id"], "cap-14");
    assert_eq!(rows[11]["id"], "cap-03");
    assert!(page["previous"].is_null());
    assert_eq!(
        page["next"],
        "/?page=2&order=caption_created_desc&featured=false&publicOnly=true"
    );
    assert_eq!(page["auth"]["label"], "Sign in with Google");

    let (_, _, body) = send(
        &app,
        get("/?order=caption_created_desc&featured=false&publicOnly=true&page=2", None),
    )
    .await;
    let page = json(&body);
    let ids: Vec<&str> = page["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["cap-02", "cap-01", "cap-00"]);
    assert!(page["next"].is_null());
    assert!(page["previous"].is_string());
}

#[tokio::test]
async fn empty_feed_names_the_table() {
    let app = router(state(Duration::ZERO));
    let (_, _, body) = send(&app, get("/", None)).await;
    assert_eq!(json(&body)["message"], "No rows found in \"captions\".");
}

#[tokio::test]
async fn invalid_vote_values_change_nothing() {
    let state = state(Duration::ZERO);
    seed(&state, 1);
    let app = router(state.clone());
    let user = Uuid::new_v4();
    let token = token(user);

    for body in [
        "caption_id=cap-00&vote_value=2",
        "caption_id=cap-00&vote_value=0",
        "caption_id=&vote_value=1",
        "vote_value=1",
    ] {
        let (status, headers, _) = send(&app, post_form("/protected/vote", Some(&token), body)).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location(&headers), "/protected");
    }

    let total: i64 = state
        .db
        .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM caption_votes", [], |r| r.get(0))?))
        .unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn votes_without_session_are_ignored() {
    let state = state(Duration::ZERO);
    seed(&state, 1);
    let app = router(state.clone());

    let (status, _, _) = send(
        &app,
        post_form("/protected/vote", None, "caption_id=cap-00&vote_value=1"),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    let total: i64 = state
        .db
        .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM caption_votes", [], |r| r.get(0))?))
        .unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn revote_keeps_one_row_and_returns_to_the_same_caption() {
    let state = state(Duration::ZERO);
    seed(&state, 3);
    let app = router(state.clone());
    let user = Uuid::new_v4();
    let token = token(user);

    let form = "caption_id=cap-01&vote_value=1&page=1&index=1&order=likes_desc&featured=false&publicOnly=true";
    let (status, headers, _) = send(&app, post_form("/protected/vote/return", Some(&token), form)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        location(&headers),
        "/protected?page=1&index=1&order=likes_desc&featured=false&publicOnly=true"
    );

    let form = "caption_id=cap-01&vote_value=-1&page=1&index=1&order=likes_desc&featured=false&publicOnly=true";
    send(&app, post_form("/protected/vote/return", Some(&token), form)).await;

    let seeded: Vec<String> = (0..3).map(|n| format!("cap-{:02}", n)).collect();
    let votes = state
        .db
        .get_votes_for_captions(&user.to_string(), &seeded)
        .unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].caption_id, "cap-01");
    assert_eq!(votes[0].vote_value, -1);
}

#[tokio::test]
async fn voting_view_shows_own_vote_after_revalidation() {
    let state = state(Duration::from_secs(60));
    seed(&state, 3);
    let app = router(state.clone());
    let token = token(Uuid::new_v4());

    let uri = "/protected?order=caption_created_desc&index=0";
    let (status, _, body) = send(&app, get(uri, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let page = json(&body);
    assert_eq!(page["caption"]["id"], "cap-02");
    assert!(page["userVote"].is_null());
    assert_eq!(page["signedInAs"], "tester@example.com");
    assert_eq!(page["form"]["captionId"], "cap-02");
    assert!(page["previous"].is_null());
    assert_eq!(
        page["next"],
        "/protected?page=1&index=1&order=caption_created_desc&featured=false&publicOnly=true"
    );

    let cookie_form = Request::builder()
        .method("POST")
        .uri("/protected/vote")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, format!("studio-session={}", token))
        .body(Body::from("caption_id=cap-02&vote_value=1"))
        .unwrap();
    send(&app, cookie_form).await;

    let (_, _, body) = send(&app, get(uri, Some(&token))).await;
    assert_eq!(json(&body)["userVote"], 1);
}

#[tokio::test]
async fn voting_view_clamps_index() {
    let state = state(Duration::ZERO);
    seed(&state, 3);
    let app = router(state);
    let token = token(Uuid::new_v4());

    let (_, _, body) = send(&app, get("/protected?index=40", Some(&token))).await;
    let page = json(&body);
    assert_eq!(page["index"], 2);
    assert_eq!(page["caption"]["id"], "cap-00");
    assert!(page["next"].is_null());
}

#[tokio::test]
async fn disallowed_uploads_fail_before_the_pipeline() {
    let app = router(state(Duration::ZERO));
    let token = token(Uuid::new_v4());

    let req = Request::builder()
        .method("POST")
        .uri("/protected/upload")
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::COOKIE, format!("studio-session={}", token))
        .body(Body::from("not an image"))
        .unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json(&body)["error"],
        "Unsupported image type. Please use jpeg, jpg, png, webp, gif, or heic."
    );

    let req = Request::builder()
        .method("POST")
        .uri("/protected/upload")
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::COOKIE, format!("studio-session={}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "Please choose an image file.");
}

#[tokio::test]
async fn unreachable_pipeline_is_a_bad_gateway() {
    let app = router(state(Duration::ZERO));
    let token = token(Uuid::new_v4());

    let req = Request::builder()
        .method("POST")
        .uri("/protected/upload")
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(header::COOKIE, format!("studio-session={}", token))
        .body(Body::from(vec![0xffu8, 0xd8, 0xff]))
        .unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json(&body)["error"].as_str().unwrap().starts_with("Request failed"));
}

#[tokio::test]
async fn upload_page_lists_allowed_types() {
    let app = router(state(Duration::ZERO));
    let token = token(Uuid::new_v4());

    let (status, _, body) = send(&app, get("/protected/upload", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let page = json(&body);
    assert_eq!(page["allowedTypes"].as_array().unwrap().len(), 6);
    assert_eq!(page["auth"]["action"], "/auth/sign-out");
}

#[tokio::test]
async fn callback_sets_session_and_sign_out_clears_it() {
    let app = router(state(Duration::ZERO));
    let token = token(Uuid::new_v4());

    let (status, headers, _) = send(
        &app,
        get(&format!("/auth/callback?access_token={}", token), None),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/protected");
    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("studio-session="));
    assert!(cookie.contains("HttpOnly"));

    let (status, headers, _) = send(&app, get("/auth/callback?access_token=forged", None)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/");
    assert!(headers.get(header::SET_COOKIE).is_none());

    let sign_out = Request::builder()
        .method("POST")
        .uri("/auth/sign-out")
        .header(header::COOKIE, format!("studio-session={}", token))
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(&app, sign_out).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/");
    let cleared = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.starts_with("studio-session="));
    assert!(cleared.contains("Max-Age=0"));
}

#[tokio::test]
async fn sign_in_redirects_to_provider() {
    let app = router(state(Duration::ZERO));
    let (status, headers, _) = send(&app, get("/auth/sign-in", None)).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let target = location(&headers);
    assert!(target.starts_with("https://auth.test/auth/v1/authorize?provider=google"));
    assert!(target.contains("redirect_to=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fcallback"));
}
