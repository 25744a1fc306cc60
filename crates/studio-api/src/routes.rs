use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::feed;
use crate::middleware::{require_session, resolve_session};
use crate::upload::{self, MAX_UPLOAD_SIZE};
use crate::votes;

/// Every route of the app. Session resolution wraps everything; page routes
/// under /protected additionally require a user.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(feed::public_feed))
        .route("/health", get(health))
        .route("/auth/sign-in", get(auth::sign_in))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/sign-out", post(auth::sign_out));

    let protected_routes = Router::new()
        .route("/protected", get(feed::voting_feed))
        .route(
            "/protected/upload",
            get(upload::upload_page).post(upload::upload_image),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(middleware::from_fn(require_session));

    // Actions resolve the user themselves and no-op without one.
    let action_routes = Router::new()
        .route("/protected/vote", post(votes::vote))
        .route("/protected/vote/return", post(votes::vote_and_return));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(action_routes)
        .layer(middleware::from_fn_with_state(state.clone(), resolve_session))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
