//! Client for the remote captioning API.
//!
//! An upload is four strictly sequential calls: ask for a presigned upload
//! URL, PUT the bytes there, register the public URL as an image, then ask
//! for captions of that image. The first failure aborts the run.

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.almostcrackd.ai";

/// Content types the captioning API accepts.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/heic",
];

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Please choose an image file.")]
    MissingFile,

    #[error("Unsupported image type. Please use jpeg, jpg, png, webp, gif, or heic.")]
    UnsupportedType,

    #[error("Missing auth access token. Please sign in again.")]
    MissingAccessToken,

    #[error("Request failed ({status}): {body}")]
    Request { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl PipelineError {
    /// True for failures caught before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingFile | Self::UnsupportedType | Self::MissingAccessToken
        )
    }
}

/// Raw file as received from the browser.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    pub presigned_url: String,
    pub cdn_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredImage {
    #[serde(deserialize_with = "id_as_string")]
    pub image_id: String,
    #[serde(default)]
    pub now: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub cdn_url: String,
    pub image_id: String,
    /// Opaque caption objects, passed through as the API returned them.
    pub captions: Vec<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PresignRequest<'a> {
    content_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    image_url: &'a str,
    is_common_use: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CaptionsRequest<'a> {
    image_id: &'a str,
}

/// Checks everything that can be checked without the network.
pub fn validate_upload(upload: Option<&ImageUpload>) -> Result<&ImageUpload, PipelineError> {
    let upload = upload
        .filter(|u| !u.bytes.is_empty())
        .ok_or(PipelineError::MissingFile)?;

    if !ALLOWED_CONTENT_TYPES.contains(&upload.content_type.as_str()) {
        return Err(PipelineError::UnsupportedType);
    }

    Ok(upload)
}

#[derive(Clone)]
pub struct PipelineClient {
    http: reqwest::Client,
    base_url: String,
}

impl PipelineClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Validates, then runs the four remote steps in order.
    pub async fn run(
        &self,
        access_token: Option<&str>,
        upload: Option<&ImageUpload>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let upload = validate_upload(upload)?;
        let access_token = access_token
            .filter(|t| !t.is_empty())
            .ok_or(PipelineError::MissingAccessToken)?;

        let presigned = self
            .generate_presigned_url(access_token, &upload.content_type)
            .await?;
        self.upload_to_presigned_url(&presigned.presigned_url, upload)
            .await?;

        let registered = self
            .register_image_url(access_token, &presigned.cdn_url)
            .await?;
        let captions = self
            .generate_captions(access_token, &registered.image_id)
            .await?;

        info!(
            "Pipeline produced {} captions for image {}",
            captions.len(),
            registered.image_id
        );

        Ok(PipelineOutcome {
            cdn_url: presigned.cdn_url,
            image_id: registered.image_id,
            captions,
        })
    }

    pub async fn generate_presigned_url(
        &self,
        access_token: &str,
        content_type: &str,
    ) -> Result<PresignedUpload, PipelineError> {
        debug!("Requesting presigned URL for {}", content_type);
        let res = self
            .http
            .post(format!("{}/pipeline/generate-presigned-url", self.base_url))
            .bearer_auth(access_token)
            .json(&PresignRequest { content_type })
            .send()
            .await?;

        Ok(ensure_success(res).await?.json().await?)
    }

    /// Object storage takes a bare PUT; no bearer token goes there.
    pub async fn upload_to_presigned_url(
        &self,
        presigned_url: &str,
        upload: &ImageUpload,
    ) -> Result<(), PipelineError> {
        debug!("Uploading {} bytes", upload.bytes.len());
        let res = self
            .http
            .put(presigned_url)
            .header(reqwest::header::CONTENT_TYPE, &upload.content_type)
            .body(upload.bytes.clone())
            .send()
            .await?;

        ensure_success(res).await?;
        Ok(())
    }

    pub async fn register_image_url(
        &self,
        access_token: &str,
        image_url: &str,
    ) -> Result<RegisteredImage, PipelineError> {
        debug!("Registering image {}", image_url);
        let res = self
            .http
            .post(format!("{}/pipeline/upload-image-from-url", self.base_url))
            .bearer_auth(access_token)
            .json(&RegisterRequest {
                image_url,
                is_common_use: false,
            })
            .send()
            .await?;

        Ok(ensure_success(res).await?.json().await?)
    }

    pub async fn generate_captions(
        &self,
        access_token: &str,
        image_id: &str,
    ) -> Result<Vec<Value>, PipelineError> {
        debug!("Requesting captions for image {}", image_id);
        let res = self
            .http
            .post(format!("{}/pipeline/generate-captions", self.base_url))
            .bearer_auth(access_token)
            .json(&CaptionsRequest { image_id })
            .send()
            .await?;

        Ok(ensure_success(res).await?.json().await?)
    }
}

async fn ensure_success(res: reqwest::Response) -> Result<reqwest::Response, PipelineError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(PipelineError::Request {
        status: status.as_u16(),
        body,
    })
}

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Reads the `id` of an opaque caption object, if it has a usable one.
pub fn caption_id(caption: &Value) -> Option<String> {
    match caption.get("id")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads the text `content` of an opaque caption object.
pub fn caption_content(caption: &Value) -> Option<&str> {
    caption.get("content")?.as_str()
}
