use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Creates the schema. `captions_table` must already be a validated identifier.
pub fn run(conn: &Connection, captions_table: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS images (
            id                      TEXT PRIMARY KEY,
            url                     TEXT,
            is_public               INTEGER NOT NULL DEFAULT 0,
            created_datetime_utc    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {table} (
            id                      TEXT PRIMARY KEY,
            content                 TEXT,
            image_id                TEXT NOT NULL REFERENCES images(id),
            is_public               INTEGER NOT NULL DEFAULT 0,
            is_featured             INTEGER NOT NULL DEFAULT 0,
            like_count              INTEGER NOT NULL DEFAULT 0,
            created_datetime_utc    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_{table}_created
            ON {table}(created_datetime_utc);

        CREATE INDEX IF NOT EXISTS idx_{table}_image
            ON {table}(image_id);

        CREATE TABLE IF NOT EXISTS caption_votes (
            id                      TEXT PRIMARY KEY,
            caption_id              TEXT NOT NULL,
            profile_id              TEXT NOT NULL,
            vote_value              INTEGER NOT NULL CHECK (vote_value IN (-1, 1)),
            created_datetime_utc    TEXT NOT NULL,
            modified_datetime_utc   TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_caption_votes_profile_caption
            ON caption_votes(profile_id, caption_id);
        ",
        table = captions_table
    ))?;

    info!("Database migrations complete");
    Ok(())
}
