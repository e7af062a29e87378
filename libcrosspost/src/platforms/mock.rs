//! Mock platform implementation for testing
//!
//! A configurable adapter that can succeed, fail, stall or panic without any
//! credentials or network access. Every call is recorded so dispatcher tests
//! can check exactly which posts reached which adapter.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{CrosspostError, PlatformError, Result};
use crate::platforms::Platform;
use crate::types::PostData;

/// How a mock `create_post` call ends
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Succeed,
    Fail(PlatformError),
    TransportFail(String),
    /// Panic inside the task, as a buggy adapter would
    Panic,
}

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name (e.g. "mock-reddit")
    pub name: String,

    pub outcome: MockOutcome,

    /// Delay before completing (simulates network latency)
    pub delay: Duration,

    /// Number of times create_post has been called
    pub call_count: Arc<Mutex<usize>>,

    /// Posts that have been received, in call order
    pub received: Arc<Mutex<Vec<PostData>>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            outcome: MockOutcome::Succeed,
            delay: Duration::from_millis(0),
            call_count: Arc::new(Mutex::new(0)),
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Mock platform for testing
#[derive(Debug, Clone)]
pub struct MockPlatform {
    config: MockConfig,
}

impl MockPlatform {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// Create a mock platform that always succeeds
    pub fn success(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        })
    }

    /// Create a mock platform whose posts are refused
    pub fn post_failure(name: &str, error: &str) -> Self {
        Self::failing_with(name, PlatformError::Posting(error.to_string()))
    }

    pub fn failing_with(name: &str, error: PlatformError) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            outcome: MockOutcome::Fail(error),
            ..Default::default()
        })
    }

    /// Create a mock platform that cannot be reached
    pub fn transport_failure(name: &str, error: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            outcome: MockOutcome::TransportFail(error.to_string()),
            ..Default::default()
        })
    }

    pub fn panicking(name: &str) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            outcome: MockOutcome::Panic,
            ..Default::default()
        })
    }

    /// Create a mock platform with a delay
    pub fn with_delay(name: &str, delay: Duration) -> Self {
        Self::new(MockConfig {
            name: name.to_string(),
            delay,
            ..Default::default()
        })
    }

    pub fn call_count(&self) -> usize {
        *self.config.call_count.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All posts this platform was asked to publish
    pub fn received(&self) -> Vec<PostData> {
        self.config
            .received
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn create_post(&self, post: &PostData) -> Result<String> {
        *self
            .config
            .call_count
            .lock()
            .unwrap_or_else(|e| e.into_inner()) += 1;
        self.config
            .received
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(post.clone());

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        post.validate()?;

        match &self.config.outcome {
            MockOutcome::Succeed => Ok(format!(
                "{}-{}",
                self.config.name,
                uuid::Uuid::new_v4()
            )),
            MockOutcome::Fail(error) => Err(error.clone().into()),
            MockOutcome::TransportFail(message) => {
                Err(CrosspostError::Transport(message.clone()))
            }
            MockOutcome::Panic => panic!("mock platform {} panicked", self.config.name),
        }
    }
}
