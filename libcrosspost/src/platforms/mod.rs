//! Platform abstraction and implementations
//!
//! Each adapter turns a [`PostData`] into one platform's posting protocol.
//! Adapters are peers: they share no state, and each `create_post` call opens
//! and releases its own transport session, so one adapter instance can serve
//! several posts concurrently.
//!
//! # Examples
//!
//! ```no_run
//! use libcrosspost::config::Config;
//! use libcrosspost::platforms::{reddit::RedditPlatform, Platform};
//! use libcrosspost::PostData;
//!
//! # async fn example() -> libcrosspost::Result<()> {
//! let config = Config::from_env();
//! let reddit = RedditPlatform::from_config(&config);
//!
//! let post = PostData::new("Hello", "Posted from crosspost", "test");
//! let post_id = reddit.create_post(&post).await?;
//! println!("Posted: {}", post_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::{CrosspostError, MediaError, PlatformError, Result};
use crate::types::PostData;

pub mod mock;
pub mod reddit;
pub mod x;

/// A publishing target
#[async_trait]
pub trait Platform: Send + Sync {
    /// Lowercase identifier ("reddit", "x")
    fn name(&self) -> &str;

    /// Publish the post and return the platform-side post id
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The post is malformed (`CrosspostError::InvalidInput`)
    /// - A credential is missing (`CrosspostError::Config`)
    /// - The image is missing or rejected (`CrosspostError::Media`)
    /// - The platform refuses the request (`CrosspostError::Platform`)
    /// - The platform cannot be reached (`CrosspostError::Transport`)
    async fn create_post(&self, post: &PostData) -> Result<String>;
}

/// Build a dedicated HTTP client for one session
pub(crate) fn session_client(
    timeout: std::time::Duration,
    follow_redirects: bool,
) -> Result<reqwest::Client> {
    let redirect = if follow_redirects {
        reqwest::redirect::Policy::default()
    } else {
        reqwest::redirect::Policy::none()
    };

    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(redirect)
        .build()
        .map_err(|e| CrosspostError::Transport(format!("Failed to build HTTP client: {}", e)))
}

/// Map a reqwest failure (connect, timeout, decode) to a transport error
pub(crate) fn transport_error(platform: &str, context: &str, error: reqwest::Error) -> CrosspostError {
    let detail = if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else if error.is_decode() {
        format!("unexpected response body: {}", error)
    } else {
        error.to_string()
    };

    CrosspostError::Transport(format!("{} {} failed: {}", platform, context, detail))
}

/// Map an unsuccessful HTTP status to the error taxonomy
///
/// # Error Mapping
///
/// - 401 → `PlatformError::Authentication`
/// - 403 → `PlatformError::Forbidden`
/// - 400 / 422 → `PlatformError::Validation`
/// - 429 → `PlatformError::RateLimit`
/// - 5xx → `CrosspostError::Transport`
/// - anything else → `PlatformError::Posting`
pub(crate) fn http_error(
    platform: &str,
    context: &str,
    status: StatusCode,
    body: &str,
) -> CrosspostError {
    let body = body.trim();
    let detail = if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {}", status.as_u16(), truncate(body, 300))
    };

    match status.as_u16() {
        401 => PlatformError::Authentication(format!(
            "{} rejected credentials ({}): {}",
            platform, context, detail
        ))
        .into(),
        403 => PlatformError::Forbidden(format!(
            "{} refused access ({}): {}",
            platform, context, detail
        ))
        .into(),
        400 | 422 => PlatformError::Validation(format!(
            "{} rejected the request ({}): {}",
            platform, context, detail
        ))
        .into(),
        429 => PlatformError::RateLimit(format!(
            "{} rate limit exceeded ({}): {}",
            platform, context, detail
        ))
        .into(),
        500..=599 => CrosspostError::Transport(format!(
            "{} server error ({}): {}",
            platform, context, detail
        )),
        _ => PlatformError::Posting(format!("{} {} failed: {}", platform, context, detail)).into(),
    }
}

/// Like [`http_error`], but client errors on an upload mean the image was refused
pub(crate) fn upload_http_error(
    platform: &str,
    context: &str,
    status: StatusCode,
    body: &str,
) -> CrosspostError {
    match status.as_u16() {
        400 | 413 | 415 | 422 => MediaError::Rejected(format!(
            "{} refused the image ({}): HTTP {}: {}",
            platform,
            context,
            status.as_u16(),
            truncate(body.trim(), 300)
        ))
        .into(),
        _ => http_error(platform, context, status, body),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
