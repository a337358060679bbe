//! HTTP client for the forge REST API

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ApiConfig;
use crate::forge::types::{BlobPayload, RepositoryId, RepositoryMetadata, TreeListing};

const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATELIMIT_RESET: &str = "x-ratelimit-reset";
const RETRY_AFTER: &str = "retry-after";

/// Failures surfaced by the forge API layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("rate limited by the forge API{}", describe_reset(.retry_after, .reset_at))]
    RateLimited {
        retry_after: Option<Duration>,
        reset_at: Option<DateTime<Utc>>,
    },

    #[error("authentication required")]
    AuthRequired,

    #[error("access denied")]
    AccessDenied,

    #[error("not found")]
    NotFound,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

fn describe_reset(retry_after: &Option<Duration>, reset_at: &Option<DateTime<Utc>>) -> String {
    match (retry_after, reset_at) {
        (Some(after), _) => format!(" (retry after {}s)", after.as_secs()),
        (None, Some(at)) => format!(" (quota resets at {})", at.format("%H:%M:%S UTC")),
        (None, None) => String::new(),
    }
}

impl ApiError {
    /// Whether retrying the same request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } | ApiError::Transport(_) => true,
            ApiError::Status(code) => *code >= 500 || *code == 408,
            ApiError::AuthRequired
            | ApiError::AccessDenied
            | ApiError::NotFound
            | ApiError::Decode(_) => false,
        }
    }

    /// Whether a credentialed retry may change the answer
    pub fn is_auth_related(&self) -> bool {
        matches!(
            self,
            ApiError::AuthRequired | ApiError::AccessDenied | ApiError::NotFound
        )
    }

    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Transport(format!("request timed out: {}", err))
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Rate-limit signals extracted from a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSignal {
    pub retry_after: Option<Duration>,
    pub reset_at: Option<DateTime<Utc>>,
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Detect a rate-limited response.
///
/// A failed response is rate limited when the remaining quota is zero, when the
/// status is 429, or when a 403 carries `retry-after` / `x-ratelimit-reset`.
pub fn detect_rate_limit(status: StatusCode, headers: &HeaderMap) -> Option<RateLimitSignal> {
    if status.is_success() {
        return None;
    }

    let retry_after = header_u64(headers, RETRY_AFTER).map(Duration::from_secs);
    let reset_at = header_u64(headers, RATELIMIT_RESET)
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
    let quota_exhausted = header_u64(headers, RATELIMIT_REMAINING) == Some(0);

    let limited = quota_exhausted
        || status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (retry_after.is_some() || reset_at.is_some()));

    limited.then_some(RateLimitSignal {
        retry_after,
        reset_at,
    })
}

/// Map a non-success response onto the failure taxonomy
pub fn classify_status(status: StatusCode, headers: &HeaderMap) -> ApiError {
    if let Some(signal) = detect_rate_limit(status, headers) {
        return ApiError::RateLimited {
            retry_after: signal.retry_after,
            reset_at: signal.reset_at,
        };
    }

    match status {
        StatusCode::UNAUTHORIZED => ApiError::AuthRequired,
        StatusCode::FORBIDDEN => ApiError::AccessDenied,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        other => ApiError::Status(other.as_u16()),
    }
}

/// Decode a blob payload into raw bytes
pub(crate) fn decode_blob(payload: BlobPayload) -> Result<Vec<u8>, ApiError> {
    match payload.encoding.as_deref() {
        Some("base64") => {
            // The forge wraps base64 content at 60 columns
            let cleaned: String = payload
                .content
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            base64::engine::general_purpose::STANDARD
                .decode(cleaned.as_bytes())
                .map_err(|e| ApiError::Decode(format!("invalid base64 blob content: {}", e)))
        }
        Some("utf-8") | Some("utf8") | None => Ok(payload.content.into_bytes()),
        Some(other) => Err(ApiError::Decode(format!(
            "unsupported blob encoding '{}'",
            other
        ))),
    }
}

/// Whether a request should carry the stored credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Anonymous,
    /// Attach the credential when one is configured, otherwise go anonymous
    Credentialed,
}

/// Bearer token, redacted in debug output
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank tokens
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Operations the ingestion pipeline needs from a forge
#[async_trait]
pub trait ForgeApi: Send + Sync {
    /// Repository metadata (default branch, visibility)
    async fn repository(
        &self,
        repo: &RepositoryId,
        auth: AuthMode,
    ) -> Result<RepositoryMetadata, ApiError>;

    /// Fully recursive tree listing for a reference
    async fn tree(
        &self,
        repo: &RepositoryId,
        reference: &str,
        auth: AuthMode,
    ) -> Result<TreeListing, ApiError>;

    /// Raw content of a single blob
    async fn blob(
        &self,
        repo: &RepositoryId,
        content_ref: &str,
        auth: AuthMode,
    ) -> Result<Vec<u8>, ApiError>;

    /// Whether a credential is available for credentialed retries
    fn has_credential(&self) -> bool;
}

#[async_trait]
impl<T: ForgeApi + ?Sized> ForgeApi for Arc<T> {
    async fn repository(
        &self,
        repo: &RepositoryId,
        auth: AuthMode,
    ) -> Result<RepositoryMetadata, ApiError> {
        (**self).repository(repo, auth).await
    }

    async fn tree(
        &self,
        repo: &RepositoryId,
        reference: &str,
        auth: AuthMode,
    ) -> Result<TreeListing, ApiError> {
        (**self).tree(repo, reference, auth).await
    }

    async fn blob(
        &self,
        repo: &RepositoryId,
        content_ref: &str,
        auth: AuthMode,
    ) -> Result<Vec<u8>, ApiError> {
        (**self).blob(repo, content_ref, auth).await
    }

    fn has_credential(&self) -> bool {
        (**self).has_credential()
    }
}

/// GitHub-compatible REST client
#[derive(Debug, Clone)]
pub struct ForgeClient {
    http: reqwest::Client,
    base_url: Url,
    credential: Option<Credential>,
}

impl ForgeClient {
    /// Create a client from API configuration and an optional token
    pub fn new(config: &ApiConfig, credential: Option<Credential>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        // Url::join drops the last path segment unless it ends with '/'
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url =
            Url::parse(&base).with_context(|| format!("Invalid API base URL: {}", base))?;

        Ok(Self {
            http,
            base_url,
            credential,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("cannot-be-a-base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issue a GET request and parse the JSON body
    #[instrument(skip(self, url), fields(url = %url))]
    async fn get_json<T: DeserializeOwned>(&self, url: Url, auth: AuthMode) -> Result<T, ApiError> {
        let mut request = self.http.get(url.clone());
        if auth == AuthMode::Credentialed {
            if let Some(credential) = &self.credential {
                request = request.bearer_auth(credential.expose());
            }
        }

        let response = request.send().await.map_err(ApiError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            let error = classify_status(status, response.headers());
            if matches!(error, ApiError::RateLimited { .. }) {
                warn!("Forge API rate limit hit: {}", error);
            } else {
                debug!("Forge API returned {}: {}", status, error);
            }
            return Err(error);
        }

        response.json::<T>().await.map_err(ApiError::from_transport)
    }
}

#[async_trait]
impl ForgeApi for ForgeClient {
    async fn repository(
        &self,
        repo: &RepositoryId,
        auth: AuthMode,
    ) -> Result<RepositoryMetadata, ApiError> {
        let url = self.endpoint(&["repos", repo.owner.as_str(), repo.name.as_str()])?;
        self.get_json(url, auth).await
    }

    async fn tree(
        &self,
        repo: &RepositoryId,
        reference: &str,
        auth: AuthMode,
    ) -> Result<TreeListing, ApiError> {
        let mut segments = vec!["repos", repo.owner.as_str(), repo.name.as_str(), "git", "trees"];
        segments.extend(reference.split('/').filter(|s| !s.is_empty()));
        let mut url = self.endpoint(&segments)?;
        url.query_pairs_mut().append_pair("recursive", "1");
        self.get_json(url, auth).await
    }

    async fn blob(
        &self,
        repo: &RepositoryId,
        content_ref: &str,
        auth: AuthMode,
    ) -> Result<Vec<u8>, ApiError> {
        let url = self.endpoint(&[
            "repos",
            repo.owner.as_str(),
            repo.name.as_str(),
            "git",
            "blobs",
            content_ref,
        ])?;
        let payload: BlobPayload = self.get_json(url, auth).await?;
        decode_blob(payload)
    }

    fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_quota_exhausted_is_rate_limited() {
        let h = headers(&[("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", "1700000000")]);
        let error = classify_status(StatusCode::FORBIDDEN, &h);
        match error {
            ApiError::RateLimited { reset_at, .. } => {
                assert_eq!(reset_at.unwrap().timestamp(), 1_700_000_000);
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn test_forbidden_with_retry_after_is_rate_limited() {
        let h = headers(&[("retry-after", "30")]);
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, &h),
            ApiError::RateLimited {
                retry_after: Some(Duration::from_secs(30)),
                reset_at: None,
            }
        );
    }

    #[test]
    fn test_plain_forbidden_is_access_denied() {
        let h = headers(&[("x-ratelimit-remaining", "42")]);
        assert_eq!(classify_status(StatusCode::FORBIDDEN, &h), ApiError::AccessDenied);
    }

    #[test]
    fn test_status_taxonomy() {
        let h = HeaderMap::new();
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED, &h), ApiError::AuthRequired);
        assert_eq!(classify_status(StatusCode::NOT_FOUND, &h), ApiError::NotFound);
        assert_eq!(classify_status(StatusCode::CONFLICT, &h), ApiError::Status(409));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, &h),
            ApiError::RateLimited { .. }
        ));
    }

    #[test]
    fn test_successful_response_never_rate_limited() {
        let h = headers(&[("x-ratelimit-remaining", "0")]);
        assert!(detect_rate_limit(StatusCode::OK, &h).is_none());
    }

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::Status(502).is_transient());
        assert!(ApiError::Transport("reset".into()).is_transient());
        assert!(ApiError::RateLimited {
            retry_after: None,
            reset_at: None
        }
        .is_transient());
        assert!(!ApiError::NotFound.is_transient());
        assert!(!ApiError::Status(422).is_transient());
    }

    #[test]
    fn test_decode_base64_blob_with_line_breaks() {
        let payload = BlobPayload {
            content: "Zm4gbWFpbigp\nIHt9\n".to_string(),
            encoding: Some("base64".to_string()),
        };
        assert_eq!(decode_blob(payload).unwrap(), b"fn main() {}".to_vec());
    }

    #[test]
    fn test_decode_rejects_unknown_encoding() {
        let payload = BlobPayload {
            content: String::new(),
            encoding: Some("rot13".to_string()),
        };
        assert!(matches!(decode_blob(payload), Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_credential_is_redacted() {
        let credential = Credential::new("ghp_secret").unwrap();
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert!(Credential::new("   ").is_none());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let config = ApiConfig {
            base_url: "https://ghe.example.com/api/v3".to_string(),
            ..ApiConfig::default()
        };
        let client = ForgeClient::new(&config, None).unwrap();
        let url = client.endpoint(&["repos", "acme", "widgets"]).unwrap();
        assert_eq!(url.as_str(), "https://ghe.example.com/api/v3/repos/acme/widgets");
        assert!(!client.has_credential());
    }
}
