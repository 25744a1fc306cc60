use crate::models::{CaptionRow, FeedRow, ImageRow, VoteRow};
use crate::{Database, format_timestamp};
use anyhow::{Result, bail};
use rusqlite::{Connection, Row, ToSql};
use studio_types::feed::{FeedOrder, FeedParams, PAGE_SIZE};
use uuid::Uuid;

/// Caption IDs per vote lookup statement.
const VOTE_LOOKUP_CHUNK: usize = 1000;

/// Which page is reading the feed. The voting view is stricter about images
/// and breaks sort ties so that walking rows by index is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedView {
    Public,
    Voting,
}

#[derive(Debug)]
pub struct FeedRows {
    pub rows: Vec<FeedRow>,
    /// False when the whole filtered set was fetched in one go.
    pub paginated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Inserted,
    Updated,
}

impl Database {
    // -- Feed --

    pub fn feed(&self, params: &FeedParams, view: FeedView) -> Result<FeedRows> {
        let (sql, paginated) = feed_sql(&self.captions_table, params, view);
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = if paginated {
                stmt.query_map(
                    rusqlite::params![PAGE_SIZE as i64, params.offset() as i64],
                    feed_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?
            } else {
                stmt.query_map([], feed_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };
            Ok(rows)
        })?;

        Ok(FeedRows { rows, paginated })
    }

    // -- Images & captions --

    /// Idempotent: an image id that already exists is left alone.
    pub fn insert_image(&self, image: &ImageRow) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO images (id, url, is_public, created_datetime_utc)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    image.id,
                    image.url,
                    image.is_public,
                    image.created_datetime_utc
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn insert_caption(&self, caption: &CaptionRow) -> Result<bool> {
        let sql = format!(
            "INSERT OR IGNORE INTO {} (id, content, image_id, is_public, is_featured, like_count, created_datetime_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            self.captions_table
        );
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                &sql,
                rusqlite::params![
                    caption.id,
                    caption.content,
                    caption.image_id,
                    caption.is_public,
                    caption.is_featured,
                    caption.like_count,
                    caption.created_datetime_utc
                ],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Votes --

    /// Upsert-by-lookup of the (profile, caption) vote. Lookup and write
    /// happen under the writer lock, so concurrent votes cannot both insert.
    pub fn upsert_vote(
        &self,
        profile_id: &str,
        caption_id: &str,
        vote_value: i64,
    ) -> Result<VoteOutcome> {
        if vote_value != 1 && vote_value != -1 {
            bail!("Invalid vote value: {}", vote_value);
        }

        let now = format_timestamp(chrono::Utc::now());

        self.with_conn_mut(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM caption_votes WHERE profile_id = ?1 AND caption_id = ?2",
                    rusqlite::params![profile_id, caption_id],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing_id) = existing {
                conn.execute(
                    "UPDATE caption_votes SET vote_value = ?1, modified_datetime_utc = ?2 WHERE id = ?3",
                    rusqlite::params![vote_value, now, existing_id],
                )?;
                Ok(VoteOutcome::Updated)
            } else {
                conn.execute(
                    "INSERT INTO caption_votes (id, caption_id, profile_id, vote_value, created_datetime_utc)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        Uuid::new_v4().to_string(),
                        caption_id,
                        profile_id,
                        vote_value,
                        now
                    ],
                )?;
                Ok(VoteOutcome::Inserted)
            }
        })
    }

    /// Batch-fetch one profile's votes for a set of caption IDs. Long ID
    /// lists are split so no statement exceeds SQLite's variable limit.
    pub fn get_votes_for_captions(
        &self,
        profile_id: &str,
        caption_ids: &[String],
    ) -> Result<Vec<VoteRow>> {
        if caption_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let mut votes = Vec::new();
            for chunk in caption_ids.chunks(VOTE_LOOKUP_CHUNK) {
                votes.extend(query_votes_for_captions(conn, profile_id, chunk)?);
            }
            Ok(votes)
        })
    }

    #[cfg(test)]
    pub fn get_votes_by_profile(&self, profile_id: &str) -> Result<Vec<VoteRow>> {
        self.with_conn(|conn| query_votes_by_profile(conn, profile_id))
    }
}

fn feed_sql(table: &str, params: &FeedParams, view: FeedView) -> (String, bool) {
    let mut filters = vec!["i.url IS NOT NULL"];
    if params.public_only {
        filters.push("c.is_public = 1");
    }
    if params.featured {
        filters.push("c.is_featured = 1");
    }
    if view == FeedView::Voting {
        filters.push("i.is_public = 1");
    }

    let order_by = match (params.order, view) {
        (FeedOrder::LikesDesc, FeedView::Public) => "c.like_count DESC",
        (FeedOrder::LikesDesc, FeedView::Voting) => {
            "c.like_count DESC, c.created_datetime_utc DESC"
        }
        (FeedOrder::ImageCreatedDesc, _) => "i.created_datetime_utc DESC",
        (FeedOrder::CaptionCreatedDesc, FeedView::Public) => "c.created_datetime_utc DESC",
        (FeedOrder::CaptionCreatedDesc, FeedView::Voting) => {
            "c.created_datetime_utc DESC, c.id DESC"
        }
    };

    // The featured voting view walks every featured caption by index.
    let paginated = !(view == FeedView::Voting && params.featured);

    let mut sql = format!(
        "SELECT c.id, c.content, c.image_id, c.is_public, c.is_featured, c.like_count, c.created_datetime_utc,
                i.id, i.url, i.is_public, i.created_datetime_utc
         FROM {table} c
         INNER JOIN images i ON i.id = c.image_id
         WHERE {filters}
         ORDER BY {order_by}",
        table = table,
        filters = filters.join(" AND "),
        order_by = order_by,
    );
    if paginated {
        sql.push_str(" LIMIT ?1 OFFSET ?2");
    }

    (sql, paginated)
}

fn feed_row(row: &Row<'_>) -> rusqlite::Result<FeedRow> {
    Ok(FeedRow {
        caption: CaptionRow {
            id: row.get(0)?,
            content: row.get(1)?,
            image_id: row.get(2)?,
            is_public: row.get(3)?,
            is_featured: row.get(4)?,
            like_count: row.get(5)?,
            created_datetime_utc: row.get(6)?,
        },
        image: ImageRow {
            id: row.get(7)?,
            url: row.get(8)?,
            is_public: row.get(9)?,
            created_datetime_utc: row.get(10)?,
        },
    })
}

fn vote_row(row: &Row<'_>) -> rusqlite::Result<VoteRow> {
    Ok(VoteRow {
        id: row.get(0)?,
        caption_id: row.get(1)?,
        profile_id: row.get(2)?,
        vote_value: row.get(3)?,
        created_datetime_utc: row.get(4)?,
        modified_datetime_utc: row.get(5)?,
    })
}

fn query_votes_for_captions(
    conn: &Connection,
    profile_id: &str,
    caption_ids: &[String],
) -> Result<Vec<VoteRow>> {
    let placeholders: Vec<String> = (2..=caption_ids.len() + 1)
        .map(|i| format!("?{}", i))
        .collect();
    let sql = format!(
        "SELECT id, caption_id, profile_id, vote_value, created_datetime_utc, modified_datetime_utc
         FROM caption_votes WHERE profile_id = ?1 AND caption_id IN ({})",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(caption_ids.len() + 1);
    params.push(&profile_id);
    params.extend(caption_ids.iter().map(|id| id as &dyn ToSql));

    let rows = stmt
        .query_map(params.as_slice(), vote_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
fn query_votes_by_profile(conn: &Connection, profile_id: &str) -> Result<Vec<VoteRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, caption_id, profile_id, vote_value, created_datetime_utc, modified_datetime_utc
         FROM caption_votes WHERE profile_id = ?1
         ORDER BY created_datetime_utc",
    )?;

    let rows = stmt
        .query_map([profile_id], vote_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
