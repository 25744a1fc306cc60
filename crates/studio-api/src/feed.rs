use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};
use tracing::{error, warn};

use studio_db::models::FeedRow;
use studio_db::{FeedView, parse_timestamp};
use studio_types::api::{AuthControls, FeedLinks, FeedPage, VoteFormState, VotingPage};
use studio_types::feed::{FeedOrder, FeedParams, FeedQuery, PAGE_SIZE, parse_index};
use studio_types::models::{Caption, Image, SessionUser};

use crate::auth::AppState;
use crate::middleware::CurrentUser;
use crate::navigation::navigate;

pub const PUBLIC_PATH: &str = "/";
pub const VOTING_PATH: &str = "/protected";

/// GET / — the public caption feed.
pub async fn public_feed(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedPage>, StatusCode> {
    let params = FeedParams::from_query(&query);
    let signed_in = current.0.is_some();
    let cache_key = format!("{}|{}", signed_in, params.cache_key());

    if let Some(page) = state.feed_cache.get(PUBLIC_PATH, &cache_key) {
        return Ok(Json(page));
    }

    let generation = state.feed_cache.generation(PUBLIC_PATH);
    let db = state.clone();
    let result = tokio::task::spawn_blocking(move || db.db.feed(&params, FeedView::Public))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let auth = if signed_in {
        AuthControls::signed_in()
    } else {
        AuthControls::signed_out()
    };

    let mut page = FeedPage {
        rows: vec![],
        page: params.page,
        per_page: PAGE_SIZE,
        order: params.order.as_str().to_string(),
        featured: params.featured,
        public_only: params.public_only,
        previous: (params.page > 1).then(|| params.with_page(params.page - 1).href(PUBLIC_PATH)),
        next: None,
        links: feed_links(&params, PUBLIC_PATH),
        message: None,
        error: None,
        auth,
    };

    match result {
        Ok(rows) => {
            if rows.rows.len() == PAGE_SIZE as usize {
                page.next = Some(params.with_page(params.page + 1).href(PUBLIC_PATH));
            }
            if rows.rows.is_empty() {
                page.message = Some(no_rows_message(state.db.captions_table()));
            }
            page.rows = rows.rows.into_iter().map(caption_from_row).collect();
            state.feed_cache.put(PUBLIC_PATH, generation, cache_key, page.clone());
        }
        Err(e) => {
            warn!("Feed query failed: {}", e);
            page.error = Some(format!("Failed to load rows: {}", e));
        }
    }

    Ok(Json(page))
}

/// GET /protected — one caption at a time with the caller's vote.
pub async fn voting_feed(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<VotingPage>, StatusCode> {
    let params = FeedParams::from_query(&query);
    let requested_index = parse_index(query.index.as_deref());
    let cache_key = format!("{}|{}|{}", user.id, params.cache_key(), requested_index);

    if let Some(page) = state.voting_cache.get(VOTING_PATH, &cache_key) {
        return Ok(Json(page));
    }

    let generation = state.voting_cache.generation(VOTING_PATH);

    // Run all blocking DB queries off the async runtime
    let db = state.clone();
    let profile_id = user.id.to_string();
    let result = tokio::task::spawn_blocking(move || {
        let rows = db.db.feed(&params, FeedView::Voting)?;

        let caption_ids: Vec<String> = rows.rows.iter().map(|r| r.caption.id.clone()).collect();
        let votes = db.db.get_votes_for_captions(&profile_id, &caption_ids)?;

        Ok::<_, anyhow::Error>((rows, votes))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let mut page = VotingPage {
        signed_in_as: user.display_name().to_string(),
        caption: None,
        user_vote: None,
        page: params.page,
        index: 0,
        row_count: 0,
        previous: None,
        next: None,
        links: feed_links(&params, VOTING_PATH),
        form: None,
        message: None,
        error: None,
        auth: AuthControls::signed_in(),
    };

    let (rows, votes) = match result {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!("Voting feed query failed: {}", e);
            page.error = Some(format!("Failed to load rows: {}", e));
            return Ok(Json(page));
        }
    };

    let vote_map: HashMap<String, i64> = votes
        .into_iter()
        .map(|v| (v.caption_id, v.vote_value))
        .collect();

    let nav = navigate(params.page, requested_index, rows.rows.len(), rows.paginated);
    let href = |(page, index): (u32, usize)| {
        params.with_page(page).href_with_index(VOTING_PATH, index)
    };

    page.index = nav.index;
    page.row_count = rows.rows.len();
    page.previous = nav.previous.map(href);
    page.next = nav.next.map(href);

    match rows.rows.into_iter().nth(nav.index) {
        Some(row) => {
            page.user_vote = vote_map.get(&row.caption.id).copied();
            page.form = Some(VoteFormState {
                caption_id: row.caption.id.clone(),
                page: params.page,
                index: nav.index,
                order: params.order.as_str().to_string(),
                featured: params.featured,
                public_only: params.public_only,
            });
            page.caption = Some(caption_from_row(row));
        }
        None => page.message = Some(no_rows_message(state.db.captions_table())),
    }

    state.voting_cache.put(VOTING_PATH, generation, cache_key, page.clone());
    Ok(Json(page))
}

fn feed_links(params: &FeedParams, path: &str) -> FeedLinks {
    FeedLinks {
        newest: params.with_order(FeedOrder::CaptionCreatedDesc).href(path),
        most_liked: params.with_order(FeedOrder::LikesDesc).href(path),
        featured_only: params.with_featured(true).href(path),
        all_captions: params.with_featured(false).href(path),
    }
}

fn no_rows_message(table: &str) -> String {
    format!("No rows found in \"{}\".", table)
}

pub fn caption_from_row(row: FeedRow) -> Caption {
    let FeedRow { caption, image } = row;

    let caption_created = parse_timestamp(&caption.created_datetime_utc).unwrap_or_else(|| {
        warn!(
            "Corrupt created_datetime_utc '{}' on caption '{}'",
            caption.created_datetime_utc, caption.id
        );
        chrono::DateTime::default()
    });
    let image_created = parse_timestamp(&image.created_datetime_utc).unwrap_or_else(|| {
        warn!(
            "Corrupt created_datetime_utc '{}' on image '{}'",
            image.created_datetime_utc, image.id
        );
        chrono::DateTime::default()
    });

    Caption {
        id: caption.id,
        content: caption.content,
        image_id: caption.image_id,
        is_public: caption.is_public,
        is_featured: caption.is_featured,
        like_count: caption.like_count,
        created_datetime_utc: caption_created,
        image: Image {
            id: image.id,
            url: image.url.unwrap_or_default(),
            is_public: image.is_public,
            created_datetime_utc: image_created,
        },
    }
}
