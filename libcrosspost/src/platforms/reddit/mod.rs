//! Reddit platform implementation
//!
//! A post becomes a self-text submission in the target subreddit. Each
//! `create_post` opens its own authenticated session and releases it before
//! returning, whether or not the submission succeeded.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::media::LocalImage;
use crate::platforms::Platform;
use crate::types::PostData;

pub mod client;

pub use client::{RedditHttpApi, RedditSession};

/// Key under which a post's image is attached; `{image}` in the body marks
/// where it is rendered
pub const IMAGE_KEY: &str = "image";

/// A resolved community handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subreddit {
    pub display_name: String,
}

/// Self-text submission with its inline media set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfPost {
    pub title: String,
    pub body: String,
    pub inline_media: BTreeMap<String, LocalImage>,
}

/// Operations the Reddit adapter needs from the platform
#[async_trait]
pub trait RedditApi: Send + Sync {
    type Session: Send + Sync;

    /// Authenticate and open a session
    async fn open_session(&self) -> Result<Self::Session>;

    async fn resolve_subreddit(&self, session: &Self::Session, name: &str) -> Result<Subreddit>;

    /// Submit the post and return its fullname (e.g. `t3_abc123`)
    async fn submit_self_post(
        &self,
        session: &Self::Session,
        subreddit: &Subreddit,
        post: &SelfPost,
    ) -> Result<String>;

    /// Release the session; failures are logged, never returned
    async fn close_session(&self, session: Self::Session);
}

/// Reddit adapter
pub struct RedditPlatform<A: RedditApi = RedditHttpApi> {
    api: A,
}

impl RedditPlatform<RedditHttpApi> {
    pub fn from_config(config: &Config) -> Self {
        Self::with_api(RedditHttpApi::new(config.reddit.clone(), config.http_timeout))
    }
}

impl<A: RedditApi> RedditPlatform<A> {
    pub fn with_api(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    async fn submit(&self, session: &A::Session, post: SelfPost, target: &str) -> Result<String> {
        let subreddit = self.api.resolve_subreddit(session, target).await?;
        debug!("Resolved subreddit r/{}", subreddit.display_name);
        self.api.submit_self_post(session, &subreddit, &post).await
    }
}

/// Build the inline media set for an optional image path
async fn inline_media_for(image_path: Option<&Path>) -> Result<BTreeMap<String, LocalImage>> {
    let mut media = BTreeMap::new();
    if let Some(path) = image_path {
        media.insert(IMAGE_KEY.to_string(), LocalImage::open(path).await?);
    }
    Ok(media)
}

#[async_trait]
impl<A: RedditApi> Platform for RedditPlatform<A> {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn create_post(&self, post: &PostData) -> Result<String> {
        post.validate()?;

        let self_post = SelfPost {
            title: post.title.clone(),
            body: post.body.clone(),
            inline_media: inline_media_for(post.image_path()).await?,
        };

        let session = self.api.open_session().await?;
        let result = self.submit(&session, self_post, &post.target).await;
        self.api.close_session(session).await;

        let post_id = result?;
        info!("Submitted Reddit post {} to r/{}", post_id, post.target);
        Ok(post_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CrosspostError, PlatformError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeState {
        opened: AtomicUsize,
        closed: AtomicUsize,
        submissions: Mutex<Vec<(String, SelfPost)>>,
    }

    #[derive(Clone, Default)]
    struct FakeRedditApi {
        state: Arc<FakeState>,
        forbidden: Vec<String>,
        fail_auth: bool,
    }

    struct FakeSession(usize);

    #[async_trait]
    impl RedditApi for FakeRedditApi {
        type Session = FakeSession;

        async fn open_session(&self) -> Result<FakeSession> {
            if self.fail_auth {
                return Err(PlatformError::Authentication("invalid_grant".to_string()).into());
            }
            let n = self.state.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSession(n))
        }

        async fn resolve_subreddit(&self, _session: &FakeSession, name: &str) -> Result<Subreddit> {
            if self.forbidden.iter().any(|f| f == name) {
                return Err(PlatformError::Forbidden(format!("r/{} is private", name)).into());
            }
            Ok(Subreddit {
                display_name: name.to_string(),
            })
        }

        async fn submit_self_post(
            &self,
            session: &FakeSession,
            subreddit: &Subreddit,
            post: &SelfPost,
        ) -> Result<String> {
            self.state
                .submissions
                .lock()
                .unwrap()
                .push((subreddit.display_name.clone(), post.clone()));
            Ok(format!("t3_fake{}", session.0))
        }

        async fn close_session(&self, _session: FakeSession) {
            self.state.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_text_post_has_empty_attachment_set() {
        let api = FakeRedditApi::default();
        let platform = RedditPlatform::with_api(api.clone());

        let id = platform
            .create_post(&PostData::new("test", "test text", "test"))
            .await
            .unwrap();
        assert_eq!(id, "t3_fake0");

        let submissions = api.state.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        let (subreddit, post) = &submissions[0];
        assert_eq!(subreddit, "test");
        assert_eq!(post.title, "test");
        assert_eq!(post.body, "test text");
        assert!(post.inline_media.is_empty());
        assert!(!post.inline_media.contains_key(IMAGE_KEY));
    }

    #[tokio::test]
    async fn test_image_becomes_inline_media() {
        let image = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        let api = FakeRedditApi::default();
        let platform = RedditPlatform::with_api(api.clone());

        let post = PostData::new("test", "look: {image}", "test").with_image(image.path());
        platform.create_post(&post).await.unwrap();

        let submissions = api.state.submissions.lock().unwrap();
        let media = &submissions[0].1.inline_media;
        assert_eq!(media.len(), 1);
        assert_eq!(media[IMAGE_KEY].path(), image.path());
        assert_eq!(media[IMAGE_KEY].mime_str(), "image/jpeg");
    }

    #[tokio::test]
    async fn test_session_closed_after_success() {
        let api = FakeRedditApi::default();
        let platform = RedditPlatform::with_api(api.clone());

        platform
            .create_post(&PostData::new("t", "b", "rust"))
            .await
            .unwrap();

        assert_eq!(api.state.opened.load(Ordering::SeqCst), 1);
        assert_eq!(api.state.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_closed_after_failure() {
        let api = FakeRedditApi {
            forbidden: vec!["private".to_string()],
            ..Default::default()
        };
        let platform = RedditPlatform::with_api(api.clone());

        let result = platform
            .create_post(&PostData::new("t", "b", "private"))
            .await;

        assert!(matches!(
            result,
            Err(CrosspostError::Platform(PlatformError::Forbidden(_)))
        ));
        assert_eq!(api.state.closed.load(Ordering::SeqCst), 1);
        assert!(api.state.submissions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_surfaces() {
        let api = FakeRedditApi {
            fail_auth: true,
            ..Default::default()
        };
        let platform = RedditPlatform::with_api(api.clone());

        let result = platform.create_post(&PostData::new("t", "b", "rust")).await;
        assert!(matches!(
            result,
            Err(CrosspostError::Platform(PlatformError::Authentication(_)))
        ));
        assert_eq!(api.state.closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_image_fails_before_session() {
        let api = FakeRedditApi::default();
        let platform = RedditPlatform::with_api(api.clone());

        let post = PostData::new("t", "b", "rust").with_image("/nonexistent/crosspost.jpg");
        let result = platform.create_post(&post).await;

        assert!(matches!(result, Err(CrosspostError::Media(_))));
        assert_eq!(api.state.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_each_post_gets_its_own_session() {
        let api = FakeRedditApi::default();
        let platform = RedditPlatform::with_api(api.clone());
        let post = PostData::new("same", "same", "rust");

        let first = platform.create_post(&post).await.unwrap();
        let second = platform.create_post(&post).await.unwrap();

        // No deduplication: two sessions, two submissions
        assert_ne!(first, second);
        assert_eq!(api.state.opened.load(Ordering::SeqCst), 2);
        assert_eq!(api.state.closed.load(Ordering::SeqCst), 2);
        assert_eq!(api.state.submissions.lock().unwrap().len(), 2);
    }
}
