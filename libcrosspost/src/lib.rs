//! Crosspost - publish one post to Reddit and X at the same time
//!
//! This library adapts a single [`PostData`] into each platform's posting
//! protocol and fans the publications out concurrently.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod media;
pub mod platforms;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use dispatcher::{create_platforms, DispatchReport, DispatchResult, Dispatcher};
pub use error::{CrosspostError, Result};
pub use types::{PostData, PostsFile};
