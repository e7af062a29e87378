//! Core types for Crosspost

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, CrosspostError, Result};

/// A single logical post, published unchanged to every platform.
///
/// `target` is the platform-specific community identifier (a subreddit name
/// for Reddit; ignored by X). A post without `image_path` is text-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostData {
    pub title: String,
    #[serde(alias = "text")]
    pub body: String,
    #[serde(alias = "subreddit")]
    pub target: String,
    #[serde(default, alias = "image")]
    pub image_path: Option<PathBuf>,
}

impl PostData {
    /// Create a text-only post
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            target: target.into(),
            image_path: None,
        }
    }

    /// Attach a local image to the post
    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }

    /// Check that every required field is non-blank
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("title", &self.title),
            ("body", &self.body),
            ("target", &self.target),
        ] {
            if value.trim().is_empty() {
                return Err(CrosspostError::InvalidInput(format!(
                    "Post {} cannot be empty",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// A batch of posts read from a TOML file
///
/// ```toml
/// [[posts]]
/// title = "test"
/// body = "test text"
/// target = "test"
/// image_path = "~/Pictures/test.jpg"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PostsFile {
    pub posts: Vec<PostData>,
}

impl PostsFile {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut file: PostsFile = toml::from_str(content).map_err(ConfigError::ParseError)?;

        for post in &mut file.posts {
            if let Some(path) = post.image_path.take() {
                let expanded = shellexpand::tilde(&path.to_string_lossy()).to_string();
                post.image_path = Some(PathBuf::from(expanded));
            }
        }

        Ok(file)
    }
}

/// Supported image MIME types for attachments
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageMimeType {
    /// Detect MIME type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the MIME type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }
}

impl std::fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_new_is_text_only() {
        let post = PostData::new("test", "test text", "test");

        assert_eq!(post.title, "test");
        assert_eq!(post.body, "test text");
        assert_eq!(post.target, "test");
        assert!(post.image_path().is_none());
    }

    #[test]
    fn test_post_with_image() {
        let post = PostData::new("test", "test text", "test").with_image("/tmp/test.jpg");
        assert_eq!(post.image_path(), Some(Path::new("/tmp/test.jpg")));
    }

    #[test]
    fn test_validate_accepts_well_formed_post() {
        assert!(PostData::new("title", "body", "rust").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let cases = [
            PostData::new("", "body", "rust"),
            PostData::new("title", "   ", "rust"),
            PostData::new("title", "body", "\n"),
        ];

        for post in cases {
            let err = post.validate().unwrap_err();
            assert!(matches!(err, CrosspostError::InvalidInput(_)));
            assert!(err.to_string().contains("cannot be empty"));
        }
    }

    #[test]
    fn test_validate_names_the_blank_field() {
        let err = PostData::new("title", "body", "").validate().unwrap_err();
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn test_posts_file_parse() {
        let content = r#"
[[posts]]
title = "first"
body = "first body"
target = "rust"

[[posts]]
title = "second"
text = "second body"
subreddit = "programming"
image_path = "/tmp/second.png"
"#;

        let file = PostsFile::parse(content).unwrap();
        assert_eq!(file.posts.len(), 2);
        assert_eq!(file.posts[0], PostData::new("first", "first body", "rust"));
        assert_eq!(file.posts[1].body, "second body");
        assert_eq!(file.posts[1].target, "programming");
        assert_eq!(
            file.posts[1].image_path(),
            Some(Path::new("/tmp/second.png"))
        );
    }

    #[test]
    fn test_posts_file_expands_tilde() {
        let content = r#"
[[posts]]
title = "t"
body = "b"
target = "r"
image_path = "~/img.jpg"
"#;

        let file = PostsFile::parse(content).unwrap();
        let path = file.posts[0].image_path().unwrap().to_string_lossy().to_string();
        assert!(!path.starts_with('~'));
        assert!(path.ends_with("img.jpg"));
    }

    #[test]
    fn test_posts_file_parse_error() {
        let result = PostsFile::parse("[[posts]]\ntitle = 1");
        assert!(matches!(
            result,
            Err(CrosspostError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_posts_file_missing_file() {
        let result = PostsFile::load_from_path(Path::new("/nonexistent/posts.toml"));
        assert!(matches!(
            result,
            Err(CrosspostError::Config(ConfigError::ReadError(_)))
        ));
    }

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(ImageMimeType::from_extension("JPG"), Some(ImageMimeType::Jpeg));
        assert_eq!(ImageMimeType::from_extension("png"), Some(ImageMimeType::Png));
        assert_eq!(ImageMimeType::from_extension("webp"), Some(ImageMimeType::WebP));
        assert_eq!(ImageMimeType::from_extension("bmp"), None);
        assert_eq!(
            ImageMimeType::from_path(Path::new("/a/b.gif")),
            Some(ImageMimeType::Gif)
        );
        assert_eq!(ImageMimeType::from_path(Path::new("/a/noext")), None);
    }
}
