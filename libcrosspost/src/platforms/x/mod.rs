//! X (Twitter) platform implementation
//!
//! Publishing composes two sub-protocols of the same platform: the legacy
//! v1.1 media upload endpoint turns a local image into a media id, and the v2
//! tweet endpoint creates the tweet that references it.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::media::LocalImage;
use crate::platforms::Platform;
use crate::types::PostData;

pub mod client;
pub mod oauth;

pub use client::{XHttpApi, XV1Client, XV2Client};

/// Platform-side reference to an uploaded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaId(String);

impl MediaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of a v2 tweet creation request
///
/// The two shapes are distinct on the wire: a text-only tweet has no
/// `media` key at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TweetRequest {
    Text { text: String },
    WithMedia { text: String, media: TweetMedia },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TweetMedia {
    pub media_ids: Vec<String>,
}

impl TweetRequest {
    pub fn new(text: String, media_id: Option<MediaId>) -> Self {
        match media_id {
            Some(id) => TweetRequest::WithMedia {
                text,
                media: TweetMedia {
                    media_ids: vec![id.0],
                },
            },
            None => TweetRequest::Text { text },
        }
    }

    pub fn text(&self) -> &str {
        match self {
            TweetRequest::Text { text } | TweetRequest::WithMedia { text, .. } => text,
        }
    }

    pub fn media_ids(&self) -> Option<&[String]> {
        match self {
            TweetRequest::Text { .. } => None,
            TweetRequest::WithMedia { media, .. } => Some(&media.media_ids),
        }
    }
}

/// Tweet text is the title and body separated by one blank line
pub fn compose_tweet_text(title: &str, body: &str) -> String {
    format!("{}\n\n{}", title, body)
}

/// Operations the X adapter needs from the platform
#[async_trait]
pub trait XApi: Send + Sync {
    /// Upload through the v1.1 handle
    async fn upload_media(&self, image: &LocalImage) -> Result<MediaId>;

    /// Create a tweet through the v2 handle, returning the tweet id
    async fn create_tweet(&self, tweet: &TweetRequest) -> Result<String>;
}

/// X adapter
pub struct XPlatform<A: XApi = XHttpApi> {
    api: A,
}

impl XPlatform<XHttpApi> {
    pub fn from_config(config: &Config) -> Self {
        Self::with_api(XHttpApi::from_config(config))
    }
}

impl<A: XApi> XPlatform<A> {
    pub fn with_api(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

#[async_trait]
impl<A: XApi> Platform for XPlatform<A> {
    fn name(&self) -> &str {
        "x"
    }

    async fn create_post(&self, post: &PostData) -> Result<String> {
        post.validate()?;

        let media_id = match post.image_path() {
            Some(path) => {
                let image = LocalImage::open(path).await?;
                let media_id = self.api.upload_media(&image).await?;
                debug!("Uploaded {} to X as media {}", path.display(), media_id);
                Some(media_id)
            }
            None => None,
        };

        let tweet = TweetRequest::new(compose_tweet_text(&post.title, &post.body), media_id);
        let tweet_id = self.api.create_tweet(&tweet).await?;

        info!("Created tweet {}", tweet_id);
        Ok(tweet_id)
    }
}
