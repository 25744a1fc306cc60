use std::{collections::HashMap, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};
use tracing::info;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "super-secret-jwt-token-with-at-least-32-characters-long",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub anon_key: String,
    pub auth_url: String,
    pub site_url: String,
    pub captions_table: String,
    pub pipeline_base_url: String,
    pub cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Builds the config from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let var = |key: &str, default: &str| -> String {
            match vars.get(key) {
                Some(value) => value.clone(),
                None => {
                    info!("{key} not set, using default: {default}");
                    default.to_string()
                }
            }
        };

        let jwt_secret = vars.get("STUDIO_JWT_SECRET").cloned().unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("STUDIO_JWT_SECRET is unset or still a placeholder; it must match the auth provider's JWT secret");
        }

        Ok(Self {
            host: var("STUDIO_HOST", "0.0.0.0"),
            port: parse("STUDIO_PORT", &var("STUDIO_PORT", "3000"))?,
            db_path: var("STUDIO_DB_PATH", "studio.db").into(),
            jwt_secret,
            anon_key: vars.get("STUDIO_ANON_KEY").cloned().unwrap_or_default(),
            auth_url: var("STUDIO_AUTH_URL", "http://localhost:9999/auth/v1"),
            site_url: var("STUDIO_SITE_URL", "http://localhost:3000"),
            captions_table: var("SUPABASE_TABLE", "captions"),
            pipeline_base_url: var("PIPELINE_BASE_URL", studio_pipeline::DEFAULT_BASE_URL),
            cache_ttl: Duration::from_secs(parse(
                "STUDIO_CACHE_TTL_SECS",
                &var("STUDIO_CACHE_TTL_SECS", "30"),
            )?),
        })
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid {key} value: {raw:?}"))
}
