use axum::{
    Extension, Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use tracing::{debug, error, warn};

use studio_types::api::{ReturnVoteForm, VoteForm};
use studio_types::feed::{FeedParams, parse_index};
use studio_types::models::SessionUser;

use crate::auth::AppState;
use crate::feed::VOTING_PATH;
use crate::middleware::CurrentUser;

/// POST /protected/vote
pub async fn vote(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<VoteForm>,
) -> impl IntoResponse {
    if let Some(user) = current.0 {
        apply_vote(&state, &user, form.caption_id, form.vote_value.as_deref()).await;
    }
    Redirect::to(VOTING_PATH)
}

/// POST /protected/vote/return — votes, then sends the browser back to the
/// caption it was looking at, rebuilt from the form's hidden fields.
pub async fn vote_and_return(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<ReturnVoteForm>,
) -> impl IntoResponse {
    if let Some(user) = current.0 {
        apply_vote(&state, &user, form.caption_id, form.vote_value.as_deref()).await;
    }

    let params = FeedParams::from_raw(
        form.page.as_deref(),
        form.order.as_deref(),
        form.featured.as_deref(),
        form.public_only.as_deref(),
    );
    let index = parse_index(form.index.as_deref()).max(0) as usize;
    Redirect::to(&params.href_with_index(VOTING_PATH, index))
}

/// Exactly 1 or -1; anything else is not a vote.
pub fn parse_vote_value(raw: Option<&str>) -> Option<i64> {
    match raw?.trim().parse::<i64>().ok()? {
        v @ (1 | -1) => Some(v),
        _ => None,
    }
}

/// Record the vote and revalidate the voting page. Invalid input and store
/// failures leave everything untouched.
async fn apply_vote(
    state: &AppState,
    user: &SessionUser,
    caption_id: Option<String>,
    vote_value: Option<&str>,
) {
    let Some(caption_id) = caption_id.filter(|id| !id.is_empty()) else {
        return;
    };
    let Some(vote_value) = parse_vote_value(vote_value) else {
        debug!("Ignoring vote with invalid value on caption {}", caption_id);
        return;
    };

    let db = state.clone();
    let profile_id = user.id.to_string();
    let cid = caption_id.clone();
    let result =
        tokio::task::spawn_blocking(move || db.db.upsert_vote(&profile_id, &cid, vote_value))
            .await;

    match result {
        Ok(Ok(outcome)) => {
            debug!(
                "Vote {:?} by {} on caption {}: {}",
                outcome, user.id, caption_id, vote_value
            );
            state.voting_cache.revalidate(VOTING_PATH);
        }
        Ok(Err(e)) => warn!("Vote on caption {} failed: {}", caption_id, e),
        Err(e) => error!("spawn_blocking join error: {}", e),
    }
}
