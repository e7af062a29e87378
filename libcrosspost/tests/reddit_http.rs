//! Reddit adapter against a local HTTP server

use libcrosspost::error::{ConfigError, MediaError, PlatformError};
use libcrosspost::platforms::reddit::RedditPlatform;
use libcrosspost::platforms::Platform;
use libcrosspost::{Config, CrosspostError, PostData};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let vars = vec![
        ("REDDIT_CLIENT_ID".to_string(), "client-id".to_string()),
        ("REDDIT_CLIENT_SECRET".to_string(), "client-secret".to_string()),
        ("REDDIT_USER_AGENT".to_string(), "crosspost-test/0.1".to_string()),
        ("REDDIT_USERNAME".to_string(), "poster".to_string()),
        ("REDDIT_PASSWORD".to_string(), "hunter2".to_string()),
        ("REDDIT_AUTH_URL".to_string(), server.uri()),
        ("REDDIT_API_URL".to_string(), server.uri()),
    ];

    Config::from_lookup(move |name| {
        vars.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    })
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(header("User-Agent", "crosspost-test/0.1"))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=poster"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "session-token",
            "token_type": "bearer",
            "expires_in": 86400,
            "scope": "*"
        })))
        .mount(server)
        .await;
}

async fn mount_about(server: &MockServer, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/r/{}/about", name)))
        .and(header("Authorization", "Bearer session-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "kind": "t5",
            "data": { "display_name": name }
        })))
        .mount(server)
        .await;
}

async fn mount_revoke(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/revoke_token"))
        .and(body_string_contains("token=session-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(times)
        .mount(server)
        .await;
}

fn submit_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "json": {
            "errors": [],
            "data": {
                "url": "https://www.reddit.com/r/test/comments/abc123/test/",
                "id": "abc123",
                "name": "t3_abc123"
            }
        }
    }))
}

#[tokio::test]
async fn test_text_post_submits_self_post() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_about(&server, "test").await;
    mount_revoke(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .and(header("Authorization", "Bearer session-token"))
        .and(body_string_contains("sr=test"))
        .and(body_string_contains("kind=self"))
        .and(body_string_contains("title=test"))
        .and(body_string_contains("text=test+text"))
        .respond_with(submit_ok())
        .expect(1)
        .mount(&server)
        .await;

    let platform = RedditPlatform::from_config(&config_for(&server));
    let id = platform
        .create_post(&PostData::new("test", "test text", "test"))
        .await
        .unwrap();

    assert_eq!(id, "t3_abc123");
}

#[tokio::test]
async fn test_image_is_uploaded_and_referenced_inline() {
    let server = MockServer::start().await;
    let image = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    std::fs::write(image.path(), b"\x89PNG fake").unwrap();

    mount_token(&server).await;
    mount_about(&server, "test").await;
    mount_revoke(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/media/asset.json"))
        .and(body_string_contains("mimetype=image%2Fpng"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "args": {
                "action": format!("{}/media-bucket", server.uri()),
                "fields": [
                    { "name": "key", "value": "uploads/asset-42.png" },
                    { "name": "Content-Type", "value": "image/png" }
                ]
            },
            "asset": { "asset_id": "asset-42" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/media-bucket"))
        .and(body_string_contains("uploads/asset-42.png"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    // ![img](asset-42 "") in the form-encoded markdown
    Mock::given(method("POST"))
        .and(path("/api/convert_rte_body_format"))
        .and(header("Authorization", "Bearer session-token"))
        .and(body_string_contains("output_mode=rtjson"))
        .and(body_string_contains("%21%5Bimg%5D%28asset-42+%22%22%29"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "output": {
                "document": [
                    { "e": "par", "c": [{ "e": "text", "t": "see " }] },
                    { "e": "img", "id": "asset-42", "c": "" }
                ]
            },
            "output_mode": "rtjson"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .and(body_string_contains("richtext_json="))
        .and(body_string_contains("asset-42"))
        .respond_with(submit_ok())
        .expect(1)
        .mount(&server)
        .await;

    let platform = RedditPlatform::from_config(&config_for(&server));
    let post = PostData::new("test", "see {image}", "test").with_image(image.path());

    assert_eq!(platform.create_post(&post).await.unwrap(), "t3_abc123");
}

#[tokio::test]
async fn test_text_post_skips_richtext_conversion() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_about(&server, "test").await;
    mount_revoke(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/convert_rte_body_format"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .and(body_string_contains("text=plain+body"))
        .respond_with(submit_ok())
        .expect(1)
        .mount(&server)
        .await;

    let platform = RedditPlatform::from_config(&config_for(&server));
    let id = platform
        .create_post(&PostData::new("t", "plain body", "test"))
        .await
        .unwrap();

    assert_eq!(id, "t3_abc123");
}

// /proc/self/mem is a regular file whose reads fail at offset 0
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_unreadable_image_sends_nothing() {
    let server = MockServer::start().await;

    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let platform = RedditPlatform::from_config(&config_for(&server));
    let post = PostData::new("t", "b", "test").with_image("/proc/self/mem");

    let result = platform.create_post(&post).await;
    assert!(matches!(
        result,
        Err(CrosspostError::Media(MediaError::Unreadable(_)))
    ));
}

#[tokio::test]
async fn test_empty_subreddit_name_is_invalid_input() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_revoke(&server, 1).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let platform = RedditPlatform::from_config(&config_for(&server));
    let err = platform
        .create_post(&PostData::new("t", "b", "r/"))
        .await
        .unwrap_err();

    assert!(matches!(err, CrosspostError::InvalidInput(_)));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn test_unknown_subreddit_redirect_is_forbidden() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_revoke(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/r/doesnotexist/about"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/subreddits/search.json?q=doesnotexist"),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .respond_with(submit_ok())
        .expect(0)
        .mount(&server)
        .await;

    let platform = RedditPlatform::from_config(&config_for(&server));
    let result = platform
        .create_post(&PostData::new("t", "b", "doesnotexist"))
        .await;

    assert!(matches!(
        result,
        Err(CrosspostError::Platform(PlatformError::Forbidden(_)))
    ));
}

#[tokio::test]
async fn test_private_subreddit_is_forbidden() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_revoke(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/r/secret/about"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "reason": "private",
            "message": "Forbidden",
            "error": 403
        })))
        .mount(&server)
        .await;

    let platform = RedditPlatform::from_config(&config_for(&server));
    let result = platform.create_post(&PostData::new("t", "b", "secret")).await;

    assert!(matches!(
        result,
        Err(CrosspostError::Platform(PlatformError::Forbidden(_)))
    ));
}

#[tokio::test]
async fn test_invalid_grant_is_authentication_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "error": "invalid_grant" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    mount_revoke(&server, 0).await;

    let platform = RedditPlatform::from_config(&config_for(&server));
    let err = platform
        .create_post(&PostData::new("t", "b", "test"))
        .await
        .unwrap_err();

    match err {
        CrosspostError::Platform(PlatformError::Authentication(msg)) => {
            assert!(msg.contains("invalid_grant"));
        }
        other => panic!("Expected authentication failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_submit_ratelimit_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_about(&server, "test").await;
    mount_revoke(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "json": {
                "errors": [["RATELIMIT", "you are doing that too much. try again in 9 minutes.", "ratelimit"]]
            }
        })))
        .mount(&server)
        .await;

    let platform = RedditPlatform::from_config(&config_for(&server));
    let result = platform.create_post(&PostData::new("t", "b", "test")).await;

    assert!(matches!(
        result,
        Err(CrosspostError::Platform(PlatformError::RateLimit(_)))
    ));
}

#[tokio::test]
async fn test_missing_credentials_send_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = Config::from_lookup(|name| match name {
        "REDDIT_AUTH_URL" | "REDDIT_API_URL" => Some(server.uri()),
        _ => None,
    });
    let platform = RedditPlatform::from_config(&config);
    let result = platform.create_post(&PostData::new("t", "b", "test")).await;

    match result {
        Err(CrosspostError::Config(ConfigError::MissingField(field))) => {
            assert_eq!(field, "REDDIT_CLIENT_ID");
        }
        other => panic!("Expected MissingField, got {:?}", other),
    }
}
