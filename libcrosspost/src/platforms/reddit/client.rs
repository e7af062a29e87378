//! Reddit OAuth API client
//!
//! Sessions use the script-app password grant. Each session owns its own
//! HTTP client, with redirects disabled so that a community lookup that
//! Reddit redirects to search is reported as unknown instead of followed.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::USER_AGENT;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::{RedditApi, SelfPost, Subreddit};
use crate::config::RedditConfig;
use crate::error::{CrosspostError, MediaError, PlatformError, Result};
use crate::media::LocalImage;
use crate::platforms::{http_error, session_client, transport_error, upload_http_error};

const PLATFORM: &str = "Reddit";

/// Community names are letters, digits and underscores; anything else is escaped
const SUBREDDIT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'-');

/// An authenticated Reddit session
pub struct RedditSession {
    http: reqwest::Client,
    access_token: SecretString,
}

impl std::fmt::Debug for RedditSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditSession").finish_non_exhaustive()
    }
}

/// Production [`RedditApi`] over the public OAuth endpoints
#[derive(Debug, Clone)]
pub struct RedditHttpApi {
    config: RedditConfig,
    timeout: Duration,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct AboutResponse {
    kind: Option<String>,
    data: Option<AboutData>,
}

#[derive(Deserialize)]
struct AboutData {
    display_name: String,
}

#[derive(Deserialize)]
struct AssetLease {
    args: UploadArgs,
    asset: Asset,
}

#[derive(Deserialize)]
struct UploadArgs {
    action: String,
    fields: Vec<UploadField>,
}

#[derive(Deserialize)]
struct UploadField {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct Asset {
    asset_id: String,
}

#[derive(Deserialize)]
struct ConvertedBody {
    output: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    json: SubmitJson,
}

#[derive(Deserialize)]
struct SubmitJson {
    #[serde(default)]
    errors: Vec<Vec<serde_json::Value>>,
    data: Option<SubmitData>,
}

#[derive(Deserialize)]
struct SubmitData {
    name: Option<String>,
    id: Option<String>,
}

impl RedditHttpApi {
    pub fn new(config: RedditConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    /// Lease an upload slot, push the file to it and return the asset id
    async fn upload_inline_image(
        &self,
        session: &RedditSession,
        image: &LocalImage,
    ) -> Result<String> {
        let url = format!("{}/api/media/asset.json", self.config.api_url);
        let file_name = image.file_name();
        let response = session
            .http
            .post(&url)
            .header(USER_AGENT, self.user_agent())
            .bearer_auth(session.access_token.expose_secret())
            .form(&[("filepath", file_name.as_str()), ("mimetype", image.mime_str())])
            .send()
            .await
            .map_err(|e| transport_error(PLATFORM, "media lease", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upload_http_error(PLATFORM, "media lease", status, &body));
        }

        let lease: AssetLease = response
            .json()
            .await
            .map_err(|e| transport_error(PLATFORM, "media lease", e))?;

        let action = if lease.args.action.starts_with("//") {
            format!("https:{}", lease.args.action)
        } else {
            lease.args.action
        };

        let part = Part::bytes(image.bytes().to_vec())
            .file_name(file_name)
            .mime_str(image.mime_str())
            .map_err(|e| MediaError::Unreadable(format!("{}: {}", image.path().display(), e)))?;
        let form = lease
            .args
            .fields
            .into_iter()
            .fold(Form::new(), |form, field| form.text(field.name, field.value))
            .part("file", part);

        debug!(
            "Uploading {} ({} bytes) to Reddit asset {}",
            image.path().display(),
            image.size(),
            lease.asset.asset_id
        );

        let response = session
            .http
            .post(&action)
            .header(USER_AGENT, self.user_agent())
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(PLATFORM, "media upload", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upload_http_error(PLATFORM, "media upload", status, &body));
        }

        Ok(lease.asset.asset_id)
    }

    /// Convert markdown to Reddit's richtext JSON, the only body format in
    /// which inline images are embedded
    async fn convert_to_richtext(
        &self,
        session: &RedditSession,
        markdown: &str,
    ) -> Result<String> {
        let url = format!("{}/api/convert_rte_body_format", self.config.api_url);
        let response = session
            .http
            .post(&url)
            .header(USER_AGENT, self.user_agent())
            .bearer_auth(session.access_token.expose_secret())
            .form(&[("output_mode", "rtjson"), ("markdown_text", markdown)])
            .send()
            .await
            .map_err(|e| transport_error(PLATFORM, "body conversion", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(PLATFORM, "body conversion", status, &body));
        }

        let converted: ConvertedBody = response
            .json()
            .await
            .map_err(|e| transport_error(PLATFORM, "body conversion", e))?;

        let output = converted.output.ok_or_else(|| {
            CrosspostError::from(PlatformError::Posting(
                "Reddit body conversion returned no richtext".to_string(),
            ))
        })?;

        Ok(output.to_string())
    }
}

/// Place each uploaded asset at its `{key}` placeholder, or append it.
///
/// Every image becomes its own paragraph so the richtext converter turns it
/// into an embedded media block.
pub fn render_inline_media(body: &str, assets: &BTreeMap<String, String>) -> String {
    let mut text = body.to_string();
    for (key, asset_id) in assets {
        let placeholder = format!("{{{}}}", key);
        let reference = format!("\n\n![img]({} \"\")\n\n", asset_id);
        if text.contains(&placeholder) {
            text = text.replace(&placeholder, &reference);
        } else {
            text.push_str(&reference);
        }
    }
    text
}

/// Strip an optional `r/` or `/r/` prefix
fn normalize_subreddit(name: &str) -> &str {
    let name = name.trim();
    name.strip_prefix("/r/")
        .or_else(|| name.strip_prefix("r/"))
        .unwrap_or(name)
}

/// Path of the community's `about` resource
fn about_path(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(CrosspostError::InvalidInput("Target subreddit has no name".to_string()));
    }
    Ok(format!(
        "/r/{}/about",
        utf8_percent_encode(name, SUBREDDIT_ENCODE_SET)
    ))
}

fn submit_error(code: &str, message: &str) -> PlatformError {
    let detail = format!("Reddit rejected the submission: {}: {}", code, message);
    match code {
        "SUBREDDIT_NOEXIST" | "SUBREDDIT_NOTALLOWED" => PlatformError::Forbidden(detail),
        "RATELIMIT" => PlatformError::RateLimit(detail),
        _ => PlatformError::Posting(detail),
    }
}

#[async_trait]
impl RedditApi for RedditHttpApi {
    type Session = RedditSession;

    async fn open_session(&self) -> Result<RedditSession> {
        self.config.require_credentials()?;

        let http = session_client(self.timeout, false)?;
        let url = format!("{}/api/v1/access_token", self.config.auth_url);
        let response = http
            .post(&url)
            .header(USER_AGENT, self.user_agent())
            .basic_auth(
                self.config.client_id.expose_secret(),
                Some(self.config.client_secret.expose_secret()),
            )
            .form(&[
                ("grant_type", "password"),
                ("username", self.config.username.as_str()),
                ("password", self.config.password.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(PLATFORM, "authentication", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = http_error(PLATFORM, "authentication", status, &body);
            // The token endpoint answers bad client credentials with 400
            return Err(match status.as_u16() {
                400 | 403 => CrosspostError::from(PlatformError::Authentication(err.to_string())),
                _ => err,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| transport_error(PLATFORM, "authentication", e))?;

        match (token.access_token, token.error) {
            (Some(access_token), None) if !access_token.is_empty() => {
                debug!("Opened Reddit session for {}", self.config.username);
                Ok(RedditSession {
                    http,
                    access_token: SecretString::from(access_token),
                })
            }
            (_, error) => Err(PlatformError::Authentication(format!(
                "Reddit authentication failed: {}",
                error
                    .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
                    .unwrap_or_else(|| "no access token returned".to_string())
            ))
            .into()),
        }
    }

    async fn resolve_subreddit(&self, session: &RedditSession, name: &str) -> Result<Subreddit> {
        let name = normalize_subreddit(name);
        let url = format!("{}{}", self.config.api_url, about_path(name)?);
        let response = session
            .http
            .get(&url)
            .header(USER_AGENT, self.user_agent())
            .bearer_auth(session.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| transport_error(PLATFORM, "subreddit lookup", e))?;

        let status = response.status();
        if status.is_redirection() || status.as_u16() == 404 {
            return Err(PlatformError::Forbidden(format!("Subreddit r/{} does not exist", name)).into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(PLATFORM, "subreddit lookup", status, &body));
        }

        let about: AboutResponse = response
            .json()
            .await
            .map_err(|e| transport_error(PLATFORM, "subreddit lookup", e))?;

        match (about.kind.as_deref(), about.data) {
            (Some("t5"), Some(data)) => Ok(Subreddit {
                display_name: data.display_name,
            }),
            _ => Err(PlatformError::Forbidden(format!("Subreddit r/{} does not exist", name)).into()),
        }
    }

    async fn submit_self_post(
        &self,
        session: &RedditSession,
        subreddit: &Subreddit,
        post: &SelfPost,
    ) -> Result<String> {
        let mut assets = BTreeMap::new();
        for (key, image) in &post.inline_media {
            let asset_id = self.upload_inline_image(session, image).await?;
            assets.insert(key.clone(), asset_id);
        }

        // Text-only posts go up as markdown; with images the body must be richtext
        let (body_field, body) = if assets.is_empty() {
            ("text", post.body.clone())
        } else {
            let markdown = render_inline_media(&post.body, &assets);
            ("richtext_json", self.convert_to_richtext(session, &markdown).await?)
        };

        let url = format!("{}/api/submit", self.config.api_url);
        let response = session
            .http
            .post(&url)
            .header(USER_AGENT, self.user_agent())
            .bearer_auth(session.access_token.expose_secret())
            .form(&[
                ("sr", subreddit.display_name.as_str()),
                ("kind", "self"),
                ("title", post.title.as_str()),
                (body_field, body.as_str()),
                ("api_type", "json"),
            ])
            .send()
            .await
            .map_err(|e| transport_error(PLATFORM, "submit", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(PLATFORM, "submit", status, &body));
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| transport_error(PLATFORM, "submit", e))?;

        if let Some(error) = submitted.json.errors.first() {
            let code = error.first().and_then(|v| v.as_str()).unwrap_or("UNKNOWN");
            let message = error.get(1).and_then(|v| v.as_str()).unwrap_or("");
            return Err(submit_error(code, message).into());
        }

        submitted
            .json
            .data
            .and_then(|data| data.name.or(data.id))
            .ok_or_else(|| {
                PlatformError::Posting("Reddit submit response had no post id".to_string()).into()
            })
    }

    async fn close_session(&self, session: RedditSession) {
        let url = format!("{}/api/v1/revoke_token", self.config.auth_url);
        let result = session
            .http
            .post(&url)
            .header(USER_AGENT, self.user_agent())
            .basic_auth(
                self.config.client_id.expose_secret(),
                Some(self.config.client_secret.expose_secret()),
            )
            .form(&[
                ("token", session.access_token.expose_secret()),
                ("token_type_hint", "access_token"),
            ])
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!("Revoked Reddit session token");
            }
            Ok(response) => {
                warn!("Reddit token revocation returned HTTP {}", response.status());
            }
            Err(e) => {
                warn!("Reddit token revocation failed: {}", e);
            }
        }
    }
}
