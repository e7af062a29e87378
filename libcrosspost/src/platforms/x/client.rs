//! HTTP handles for the two X API surfaces
//!
//! The v1.1 handle is used only for media upload; the v2 handle only for
//! tweet creation. Neither owns a persistent transport: every call builds its
//! own HTTP client and drops it when the call returns.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::oauth::OAuth1Signer;
use super::{MediaId, TweetRequest, XApi};
use crate::config::{Config, XConfig};
use crate::error::{ConfigError, MediaError, PlatformError, Result};
use crate::media::LocalImage;
use crate::platforms::{http_error, session_client, transport_error, upload_http_error};

const PLATFORM: &str = "X";

/// v1.1 handle (OAuth1 user context), media upload only
#[derive(Debug, Clone)]
pub struct XV1Client {
    config: XConfig,
    timeout: Duration,
}

/// Images above this size, and every GIF, go through the chunked upload
const SIMPLE_UPLOAD_LIMIT: u64 = 4883 * 1024;

/// Segment size for chunked APPEND requests
const CHUNK_SIZE: usize = 1024 * 1024;

/// STATUS polls allowed while X processes a chunked upload
const MAX_STATUS_CHECKS: u32 = 30;

#[derive(Deserialize)]
struct MediaUploadResponse {
    media_id_string: Option<String>,
    media_id: Option<u64>,
    processing_info: Option<ProcessingInfo>,
}

impl MediaUploadResponse {
    fn media_id(&self) -> Result<MediaId> {
        self.media_id_string
            .clone()
            .or_else(|| self.media_id.map(|id| id.to_string()))
            .map(MediaId::new)
            .ok_or_else(|| {
                PlatformError::Posting("X media upload response had no media id".to_string())
                    .into()
            })
    }
}

#[derive(Deserialize)]
struct ProcessingInfo {
    state: String,
    check_after_secs: Option<u64>,
    error: Option<ProcessingError>,
}

#[derive(Deserialize)]
struct ProcessingError {
    message: Option<String>,
}

fn needs_chunked_upload(image: &LocalImage) -> bool {
    image.mime_str() == "image/gif" || image.size() > SIMPLE_UPLOAD_LIMIT
}

fn media_category(image: &LocalImage) -> &'static str {
    if image.mime_str() == "image/gif" {
        "tweet_gif"
    } else {
        "tweet_image"
    }
}

impl XV1Client {
    pub fn new(config: XConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    fn upload_url(&self) -> String {
        format!("{}/1.1/media/upload.json", self.config.upload_url)
    }

    /// Upload a local image and return its media id
    ///
    /// Small still images are sent in one multipart request. GIFs and large
    /// files use the INIT/APPEND/FINALIZE sequence, waiting for X to finish
    /// processing when it asks to.
    pub async fn media_upload(&self, image: &LocalImage) -> Result<MediaId> {
        self.config.require_user_context()?;

        let http = session_client(self.timeout, true)?;
        let signer = OAuth1Signer::from_config(&self.config);

        if needs_chunked_upload(image) {
            self.chunked_upload(&http, &signer, image).await
        } else {
            self.simple_upload(&http, &signer, image).await
        }
    }

    async fn simple_upload(
        &self,
        http: &reqwest::Client,
        signer: &OAuth1Signer,
        image: &LocalImage,
    ) -> Result<MediaId> {
        let url = self.upload_url();
        let authorization = signer.authorization_header("POST", &url, &[])?;

        let part = Part::bytes(image.bytes().to_vec())
            .file_name(image.file_name())
            .mime_str(image.mime_str())
            .map_err(|e| MediaError::Unreadable(format!("{}: {}", image.path().display(), e)))?;
        let form = Form::new().part("media", part);

        debug!(
            "Uploading {} ({} bytes) to X",
            image.path().display(),
            image.size()
        );

        let response = http
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(PLATFORM, "media upload", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upload_http_error(PLATFORM, "media upload", status, &body));
        }

        let uploaded: MediaUploadResponse = response
            .json()
            .await
            .map_err(|e| transport_error(PLATFORM, "media upload", e))?;

        uploaded.media_id()
    }

    async fn chunked_upload(
        &self,
        http: &reqwest::Client,
        signer: &OAuth1Signer,
        image: &LocalImage,
    ) -> Result<MediaId> {
        let url = self.upload_url();
        let total_bytes = image.size().to_string();

        let init = self
            .upload_command(
                http,
                signer,
                Method::POST,
                &[
                    ("command", "INIT"),
                    ("total_bytes", total_bytes.as_str()),
                    ("media_type", image.mime_str()),
                    ("media_category", media_category(image)),
                ],
            )
            .await?;
        let media_id = init.media_id()?;

        debug!(
            "Uploading {} ({} bytes) to X in chunks as media {}",
            image.path().display(),
            image.size(),
            media_id.as_str()
        );

        for (index, chunk) in image.bytes().chunks(CHUNK_SIZE).enumerate() {
            // Multipart fields are not part of the OAuth1 signature
            let authorization = signer.authorization_header("POST", &url, &[])?;
            let form = Form::new()
                .text("command", "APPEND")
                .text("media_id", media_id.as_str().to_string())
                .text("segment_index", index.to_string())
                .part("media", Part::bytes(chunk.to_vec()).file_name(image.file_name()));

            let response = http
                .post(&url)
                .header(AUTHORIZATION, authorization)
                .multipart(form)
                .send()
                .await
                .map_err(|e| transport_error(PLATFORM, "media upload APPEND", e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(upload_http_error(PLATFORM, "media upload APPEND", status, &body));
            }
        }

        let finalized = self
            .upload_command(
                http,
                signer,
                Method::POST,
                &[("command", "FINALIZE"), ("media_id", media_id.as_str())],
            )
            .await?;

        let mut processing = finalized.processing_info;
        let mut checks = 0;
        while let Some(info) = processing {
            match info.state.as_str() {
                "succeeded" => break,
                "failed" => {
                    let reason = info
                        .error
                        .and_then(|e| e.message)
                        .unwrap_or_else(|| "processing failed".to_string());
                    return Err(MediaError::Rejected(format!(
                        "X could not process {}: {}",
                        image.path().display(),
                        reason
                    ))
                    .into());
                }
                _ => {}
            }

            if checks >= MAX_STATUS_CHECKS {
                return Err(PlatformError::Posting(format!(
                    "X media {} was still processing after {} status checks",
                    media_id.as_str(),
                    MAX_STATUS_CHECKS
                ))
                .into());
            }
            checks += 1;

            let wait = info.check_after_secs.unwrap_or(1);
            debug!(
                "X media {} is {}, checking again in {}s",
                media_id.as_str(),
                info.state,
                wait
            );
            tokio::time::sleep(Duration::from_secs(wait)).await;

            processing = self
                .upload_command(
                    http,
                    signer,
                    Method::GET,
                    &[("command", "STATUS"), ("media_id", media_id.as_str())],
                )
                .await?
                .processing_info;
        }

        Ok(media_id)
    }

    /// Send one signed INIT, FINALIZE or STATUS command
    async fn upload_command(
        &self,
        http: &reqwest::Client,
        signer: &OAuth1Signer,
        method: Method,
        params: &[(&str, &str)],
    ) -> Result<MediaUploadResponse> {
        let url = self.upload_url();
        let context = format!(
            "media upload {}",
            params.first().map(|(_, command)| *command).unwrap_or_default()
        );
        let authorization = signer.authorization_header(method.as_str(), &url, params)?;

        let request = if method == Method::GET {
            http.get(&url).query(params)
        } else {
            http.post(&url).form(params)
        };

        let response = request
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| transport_error(PLATFORM, &context, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upload_http_error(PLATFORM, &context, status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| transport_error(PLATFORM, &context, e))
    }
}

/// v2 handle, tweet creation only
#[derive(Debug, Clone)]
pub struct XV2Client {
    config: XConfig,
    timeout: Duration,
}

#[derive(Deserialize)]
struct CreateTweetResponse {
    data: TweetData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

impl XV2Client {
    pub fn new(config: XConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    /// Tweets are signed in the user context when an access token is
    /// configured, otherwise sent with the bearer token
    fn authorization(&self, url: &str) -> Result<String> {
        if self.config.has_user_context() {
            return OAuth1Signer::from_config(&self.config).authorization_header("POST", url, &[]);
        }

        let bearer = self.config.bearer_token.expose_secret();
        if bearer.trim().is_empty() {
            // Report what the preferred scheme is missing
            self.config.require_user_context()?;
            return Err(ConfigError::MissingField("X_BEARER_TOKEN".to_string()).into());
        }

        Ok(format!("Bearer {}", bearer))
    }

    pub async fn create_tweet(&self, tweet: &TweetRequest) -> Result<String> {
        let url = format!("{}/2/tweets", self.config.api_url);
        let authorization = self.authorization(&url)?;

        let http = session_client(self.timeout, true)?;
        let response = http
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/json")
            .json(tweet)
            .send()
            .await
            .map_err(|e| transport_error(PLATFORM, "create tweet", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(PLATFORM, "create tweet", status, &body));
        }

        let created: CreateTweetResponse = response
            .json()
            .await
            .map_err(|e| transport_error(PLATFORM, "create tweet", e))?;

        Ok(created.data.id)
    }
}

/// Production [`XApi`]: one v1.1 handle plus one v2 handle
#[derive(Debug, Clone)]
pub struct XHttpApi {
    v1: XV1Client,
    v2: XV2Client,
}

impl XHttpApi {
    pub fn new(v1: XV1Client, v2: XV2Client) -> Self {
        Self { v1, v2 }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            XV1Client::new(config.x.clone(), config.http_timeout),
            XV2Client::new(config.x.clone(), config.http_timeout),
        )
    }
}

#[async_trait]
impl XApi for XHttpApi {
    async fn upload_media(&self, image: &LocalImage) -> Result<MediaId> {
        self.v1.media_upload(image).await
    }

    async fn create_tweet(&self, tweet: &TweetRequest) -> Result<String> {
        self.v2.create_tweet(tweet).await
    }
}
