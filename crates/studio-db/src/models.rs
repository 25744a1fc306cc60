/// Database row types — these map directly to SQLite rows.
/// Distinct from studio-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct ImageRow {
    pub id: String,
    pub url: Option<String>,
    pub is_public: bool,
    pub created_datetime_utc: String,
}

#[derive(Debug, Clone)]
pub struct CaptionRow {
    pub id: String,
    pub content: Option<String>,
    pub image_id: String,
    pub is_public: bool,
    pub is_featured: bool,
    pub like_count: i64,
    pub created_datetime_utc: String,
}

/// A caption joined with its image, as the feed reads it.
#[derive(Debug, Clone)]
pub struct FeedRow {
    pub caption: CaptionRow,
    pub image: ImageRow,
}

#[derive(Debug, Clone)]
pub struct VoteRow {
    pub id: String,
    pub caption_id: String,
    pub profile_id: String,
    pub vote_value: i64,
    pub created_datetime_utc: String,
    pub modified_datetime_utc: Option<String>,
}
