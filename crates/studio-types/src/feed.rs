use serde::{Deserialize, Serialize};

/// Rows per feed page.
pub const PAGE_SIZE: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedOrder {
    #[default]
    CaptionCreatedDesc,
    LikesDesc,
    ImageCreatedDesc,
}

impl FeedOrder {
    /// Unknown or missing values fall back to newest captions first.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("likes_desc") => Self::LikesDesc,
            Some("image_created_desc") => Self::ImageCreatedDesc,
            _ => Self::CaptionCreatedDesc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaptionCreatedDesc => "caption_created_desc",
            Self::LikesDesc => "likes_desc",
            Self::ImageCreatedDesc => "image_created_desc",
        }
    }
}

/// Raw query string of the feed routes. Everything stays a string so that
/// malformed values degrade to defaults instead of rejecting the request.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FeedQuery {
    pub page: Option<String>,
    pub order: Option<String>,
    pub featured: Option<String>,
    #[serde(rename = "publicOnly")]
    pub public_only: Option<String>,
    pub index: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedParams {
    pub order: FeedOrder,
    pub featured: bool,
    pub public_only: bool,
    /// 1-based.
    pub page: u32,
}

impl Default for FeedParams {
    fn default() -> Self {
        Self {
            order: FeedOrder::default(),
            featured: false,
            public_only: true,
            page: 1,
        }
    }
}

impl FeedParams {
    pub fn from_raw(
        page: Option<&str>,
        order: Option<&str>,
        featured: Option<&str>,
        public_only: Option<&str>,
    ) -> Self {
        Self {
            order: FeedOrder::parse(order),
            featured: featured == Some("true"),
            public_only: public_only != Some("false"),
            page: parse_page(page),
        }
    }

    pub fn from_query(query: &FeedQuery) -> Self {
        Self::from_raw(
            query.page.as_deref(),
            query.order.as_deref(),
            query.featured.as_deref(),
            query.public_only.as_deref(),
        )
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1) * PAGE_SIZE
    }

    pub fn with_page(self, page: u32) -> Self {
        Self { page: page.max(1), ..self }
    }

    pub fn with_order(self, order: FeedOrder) -> Self {
        Self { order, page: 1, ..self }
    }

    pub fn with_featured(self, featured: bool) -> Self {
        Self { featured, page: 1, ..self }
    }

    /// Stable key for caching a rendering of these parameters.
    pub fn cache_key(&self) -> String {
        self.query_string()
    }

    pub fn query_string(&self) -> String {
        format!(
            "page={}&order={}&featured={}&publicOnly={}",
            self.page,
            self.order.as_str(),
            self.featured,
            self.public_only
        )
    }

    pub fn href(&self, path: &str) -> String {
        format!("{}?{}", path, self.query_string())
    }

    /// Link into the single-caption voting view at a given row.
    pub fn href_with_index(&self, path: &str, index: usize) -> String {
        format!(
            "{}?page={}&index={}&order={}&featured={}&publicOnly={}",
            path,
            self.page,
            index,
            self.order.as_str(),
            self.featured,
            self.public_only
        )
    }
}

fn parse_page(raw: Option<&str>) -> u32 {
    raw.and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .map(|p| p.min(u32::MAX as i64 / PAGE_SIZE as i64) as u32)
        .unwrap_or(1)
}

/// Parses the voting view's `index`; anything unparseable selects the first row.
pub fn parse_index(raw: Option<&str>) -> i64 {
    raw.and_then(|i| i.trim().parse::<i64>().ok()).unwrap_or(0)
}
