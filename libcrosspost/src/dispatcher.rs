//! Multi-platform publishing orchestration
//!
//! The dispatcher publishes every post to every adapter concurrently. Tasks
//! are fully independent: a failure (or panic) in one never cancels or
//! delays another, and `run` returns only once all of them have settled.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{CrosspostError, Result};
use crate::platforms::{reddit::RedditPlatform, x::XPlatform, Platform};
use crate::types::PostData;

/// Names accepted by [`create_platforms`]
pub const PLATFORM_NAMES: [&str; 2] = ["reddit", "x"];

/// Outcome of publishing one post to one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    /// Platform name (e.g. "reddit", "x")
    pub platform: String,
    pub post_title: String,
    pub success: bool,
    /// Platform-side post id (if successful)
    pub platform_post_id: Option<String>,
    /// Error message (if failed)
    pub error: Option<String>,
    /// Error category (if failed), see [`CrosspostError::kind`]
    pub error_kind: Option<String>,
    #[serde(skip)]
    pub exit_code: i32,
}

impl DispatchResult {
    fn succeeded(platform: &str, post: &PostData, post_id: String) -> Self {
        Self {
            platform: platform.to_string(),
            post_title: post.title.clone(),
            success: true,
            platform_post_id: Some(post_id),
            error: None,
            error_kind: None,
            exit_code: 0,
        }
    }

    fn failed(platform: &str, post: &PostData, error: &CrosspostError) -> Self {
        Self {
            platform: platform.to_string(),
            post_title: post.title.clone(),
            success: false,
            platform_post_id: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            exit_code: error.exit_code(),
        }
    }

    fn aborted(platform: &str, post: &PostData, error: &JoinError) -> Self {
        let message = if error.is_panic() {
            format!("{} task panicked", platform)
        } else {
            format!("{} task was cancelled", platform)
        };

        Self {
            platform: platform.to_string(),
            post_title: post.title.clone(),
            success: false,
            platform_post_id: None,
            error: Some(message),
            error_kind: Some("internal".to_string()),
            exit_code: 1,
        }
    }
}

/// All results of one dispatch, in (post, adapter) order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub results: Vec<DispatchResult>,
}

impl DispatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DispatchResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// 0 when every task succeeded, otherwise the highest failure exit code
    pub fn exit_code(&self) -> i32 {
        self.failures().map(|r| r.exit_code).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Fans posts out to a fixed set of adapters
pub struct Dispatcher {
    platforms: Vec<Arc<dyn Platform>>,
}

impl Dispatcher {
    pub fn new(platforms: Vec<Arc<dyn Platform>>) -> Self {
        Self { platforms }
    }

    pub fn platforms(&self) -> &[Arc<dyn Platform>] {
        &self.platforms
    }

    /// Publish every post to every adapter
    ///
    /// N posts and M adapters produce exactly N×M tasks. All tasks are
    /// spawned before any is awaited.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use libcrosspost::{create_platforms, Config, Dispatcher, PostData};
    ///
    /// # async fn example() -> libcrosspost::Result<()> {
    /// let config = Config::load(None)?;
    /// let dispatcher = Dispatcher::new(create_platforms(&config, None)?);
    ///
    /// let report = dispatcher
    ///     .run(&[PostData::new("Hello", "Posted from crosspost", "test")])
    ///     .await;
    /// for result in report.failures() {
    ///     eprintln!("{} failed: {:?}", result.platform, result.error);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(&self, posts: &[PostData]) -> DispatchReport {
        let mut tasks = Vec::with_capacity(posts.len() * self.platforms.len());

        for post in posts {
            for platform in &self.platforms {
                let platform = Arc::clone(platform);
                let task_post = post.clone();
                let name = platform.name().to_string();
                debug!("Spawning {} task for '{}'", name, post.title);

                let handle = tokio::spawn(async move {
                    match platform.create_post(&task_post).await {
                        Ok(post_id) => {
                            info!(
                                "Published '{}' to {}: {}",
                                task_post.title,
                                platform.name(),
                                post_id
                            );
                            DispatchResult::succeeded(platform.name(), &task_post, post_id)
                        }
                        Err(e) => {
                            warn!(
                                "Failed to publish '{}' to {}: {}",
                                task_post.title,
                                platform.name(),
                                e
                            );
                            DispatchResult::failed(platform.name(), &task_post, &e)
                        }
                    }
                });

                tasks.push((name, post, handle));
            }
        }

        let handles = tasks.iter_mut().map(|(_, _, handle)| handle);
        let outcomes = join_all(handles).await;

        let results = tasks
            .iter()
            .zip(outcomes)
            .map(|((name, post, _), outcome)| {
                outcome.unwrap_or_else(|e| {
                    warn!("{} task for '{}' did not complete: {}", name, post.title, e);
                    DispatchResult::aborted(name, post, &e)
                })
            })
            .collect();

        DispatchReport { results }
    }
}

/// Build the platform adapters, optionally filtered by name
///
/// Names are case-insensitive; `twitter` is accepted for `x`.
///
/// # Errors
///
/// Returns `CrosspostError::InvalidInput` for an unknown platform name or
/// an empty selection.
pub fn create_platforms(
    config: &Config,
    filter_platforms: Option<&[String]>,
) -> Result<Vec<Arc<dyn Platform>>> {
    let selected: Vec<&str> = match filter_platforms {
        None => PLATFORM_NAMES.to_vec(),
        Some(names) => {
            let mut selected = Vec::new();
            for name in names {
                let canonical = canonical_platform_name(name)?;
                if !selected.contains(&canonical) {
                    selected.push(canonical);
                }
            }
            selected
        }
    };

    if selected.is_empty() {
        return Err(CrosspostError::InvalidInput(
            "No platforms selected".to_string(),
        ));
    }

    let platforms = selected
        .into_iter()
        .map(|name| -> Arc<dyn Platform> {
            info!("Creating {} platform client", name);
            match name {
                "reddit" => Arc::new(RedditPlatform::from_config(config)),
                _ => Arc::new(XPlatform::from_config(config)),
            }
        })
        .collect();

    Ok(platforms)
}

fn canonical_platform_name(name: &str) -> Result<&'static str> {
    match name.trim().to_lowercase().as_str() {
        "reddit" => Ok("reddit"),
        "x" | "twitter" => Ok("x"),
        other => Err(CrosspostError::InvalidInput(format!(
            "Unknown platform '{}' (expected one of: {})",
            other,
            PLATFORM_NAMES.join(", ")
        ))),
    }
}
