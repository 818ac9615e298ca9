use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use thiserror::Error;

/// Production release feed host.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

pub(crate) const USER_AGENT: &str = "gust-plugin-updater";
const ACCEPT: &str = "application/vnd.github.v3+json";

/// Latest-release metadata, fetched fresh on every check and never cached.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub html_url: String,
    pub zipball_url: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
}

/// Informational snapshot of the feed's API quota. Fetching it does not
/// consume quota, and nothing in the core gates behavior on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u64,
    pub remaining: u64,
    pub resets_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawRateLimit {
    rate: RawRate,
}

#[derive(Deserialize)]
struct RawRate {
    limit: u64,
    remaining: u64,
    reset: i64,
}

#[derive(Deserialize)]
struct FeedMessage {
    message: String,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("feed rejected the request with HTTP {status}: {message}")]
    Client {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("unexpected feed response: HTTP {status}")]
    Status { status: reqwest::StatusCode },
    #[error("failed to parse feed response: {0}")]
    Parse(#[source] reqwest::Error),
}

/// Read-only client for one `{owner}/{repo}` release feed.
///
/// The HTTP client is injected; the base URL defaults to the production API
/// host and is overridable for tests. No call here mutates local state.
pub struct FeedClient {
    client: reqwest::Client,
    base_url: String,
    owner: String,
    repo: String,
}

impl FeedClient {
    pub fn new(client: reqwest::Client, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client,
            base_url: DEFAULT_API_BASE.to_string(),
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch the latest published release, or `None` when the feed's latest
    /// entry is a draft or prerelease (only full releases are eligible).
    ///
    /// # Errors
    /// Returns a [`FeedError`] on transport failure, a 4xx rejection, any
    /// other non-200 status, or an unparseable body.
    pub async fn latest_release(&self) -> Result<Option<Release>, FeedError> {
        let path = format!("/repos/{}/{}/releases/latest", self.owner, self.repo);
        let response = self.get(&path).await?;
        let release: Release = response.json().await.map_err(FeedError::Parse)?;

        if release.draft || release.prerelease {
            debug!(
                "Ignoring ineligible release {} (draft: {}, prerelease: {})",
                release.tag_name, release.draft, release.prerelease
            );
            return Ok(None);
        }

        Ok(Some(release))
    }

    /// Fetch the current API rate-limit snapshot.
    ///
    /// # Errors
    /// Returns a [`FeedError`] on transport failure, a non-200 status, or an
    /// unparseable body.
    pub async fn rate_limit(&self) -> Result<RateLimitStatus, FeedError> {
        let response = self.get("/rate_limit").await?;
        let raw: RawRateLimit = response.json().await.map_err(FeedError::Parse)?;

        Ok(RateLimitStatus {
            limit: raw.rate.limit,
            remaining: raw.rate.remaining,
            resets_at: DateTime::from_timestamp(raw.rate.reset, 0).unwrap_or_else(Utc::now),
        })
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, FeedError> {
        debug!("GET {path}");

        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT)
            .send()
            .await
            .map_err(FeedError::Transport)?;

        let status = response.status();
        debug!("HTTP {status}");

        if status.is_success() {
            Ok(response)
        } else if status.is_client_error() {
            let message = response
                .text()
                .await
                .ok()
                .and_then(|body| serde_json::from_str::<FeedMessage>(&body).ok())
                .map(|m| m.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("client error")
                        .to_string()
                });
            Err(FeedError::Client { status, message })
        } else {
            Err(FeedError::Status { status })
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{FeedClient, FeedError};

    fn feed(server: &MockServer) -> FeedClient {
        FeedClient::new(reqwest::Client::new(), "acme", "widget").with_base_url(server.uri())
    }

    #[tokio::test]
    async fn latest_release_sends_identifying_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget/releases/latest"))
            .and(header("User-Agent", "gust-plugin-updater"))
            .and(header("Accept", "application/vnd.github.v3+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tag_name": "v1.2.0",
                "html_url": "https://example.com/releases/v1.2.0",
                "zipball_url": "https://example.com/zipball/v1.2.0",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let release = feed(&server)
            .latest_release()
            .await
            .expect("request should succeed")
            .expect("a full release should be returned");

        assert_eq!(release.tag_name, "v1.2.0");
        assert_eq!(release.html_url, "https://example.com/releases/v1.2.0");
        assert!(!release.draft);
    }

    #[tokio::test]
    async fn draft_and_prerelease_entries_are_ineligible() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tag_name": "v2.0.0-rc.1",
                "html_url": "https://example.com/releases/v2.0.0-rc.1",
                "zipball_url": "https://example.com/zipball/v2.0.0-rc.1",
                "prerelease": true,
            })))
            .mount(&server)
            .await;

        let release = feed(&server)
            .latest_release()
            .await
            .expect("request should succeed");

        assert!(release.is_none());
    }

    #[tokio::test]
    async fn client_error_carries_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget/releases/latest"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })),
            )
            .mount(&server)
            .await;

        let err = feed(&server)
            .latest_release()
            .await
            .expect_err("a 4xx should surface as an error");

        assert!(
            matches!(err, FeedError::Client { status, ref message }
                if status.as_u16() == 404 && message == "Not Found"),
            "expected Client error with upstream message, got {err:?}"
        );
    }

    #[tokio::test]
    async fn client_error_without_message_falls_back_to_canonical_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget/releases/latest"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;

        let err = feed(&server)
            .latest_release()
            .await
            .expect_err("a 4xx should surface as an error");

        assert!(
            matches!(err, FeedError::Client { status, ref message }
                if status.as_u16() == 404 && message == "Not Found"),
            "expected Client error with canonical reason, got {err:?}"
        );
        assert!(!err.to_string().ends_with(": "));
    }

    #[tokio::test]
    async fn server_error_surfaces_as_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widget/releases/latest"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = feed(&server)
            .latest_release()
            .await
            .expect_err("a 5xx should surface as an error");

        assert!(matches!(err, FeedError::Status { status } if status.as_u16() == 502));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_transport() {
        let client = FeedClient::new(reqwest::Client::new(), "acme", "widget")
            .with_base_url("http://127.0.0.1:1");

        let err = client
            .latest_release()
            .await
            .expect_err("an unreachable host should surface as an error");

        assert!(matches!(err, FeedError::Transport(_)));
    }

    #[tokio::test]
    async fn rate_limit_parses_quota_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "rate": { "limit": 60, "remaining": 42, "reset": 1_700_000_000 }
            })))
            .mount(&server)
            .await;

        let status = feed(&server)
            .rate_limit()
            .await
            .expect("rate limit request should succeed");

        assert_eq!(status.limit, 60);
        assert_eq!(status.remaining, 42);
        assert_eq!(status.resets_at.timestamp(), 1_700_000_000);
    }
}
