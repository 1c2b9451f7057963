//! MediaWiki Action API client
//!
//! Implements [`CatalogClient`] over `api.php` with `format=json` and
//! `formatversion=2`. Every request carries `maxlag`; lag refusals and
//! overload statuses are retried after the server-advised delay, all other
//! failures surface immediately as a typed [`CatalogError`].

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, direct::NotKeyed},
};
use reqwest::{Client, StatusCode, header::RETRY_AFTER};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::catalog_client::{CatalogClient, ListPage};
use crate::domain::catalog_item::{BasicRecord, ItemAttributes, PageId};
use crate::domain::cursor::ListCursor;
use crate::domain::errors::{CatalogError, CatalogResult};
use crate::infrastructure::config::RemoteConfig;

/// Anonymous clients may pass at most this many ids in `pageids`
pub const MAX_PAGEIDS_PER_QUERY: usize = 50;

/// Error codes that mean "come back later" rather than "this request is wrong"
const RETRYABLE_API_CODES: [&str; 3] = ["maxlag", "ratelimited", "readonly"];

/// HTTP client configuration for the Action API
#[derive(Debug, Clone)]
pub struct MediaWikiClientConfig {
    pub api_url: String,
    pub namespace: i32,
    pub max_lag_seconds: u32,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub max_retries: u32,
    pub user_agent: String,
    /// First backoff step when the server gives no `Retry-After`
    pub retry_base_delay: Duration,
    /// Upper bound for any single wait between attempts
    pub max_retry_delay: Duration,
}

impl MediaWikiClientConfig {
    pub fn from_remote_config(remote: &RemoteConfig) -> Self {
        Self {
            api_url: remote.api_url.clone(),
            namespace: remote.namespace,
            max_lag_seconds: remote.max_lag_seconds,
            timeout_seconds: remote.request_timeout_seconds,
            max_requests_per_second: remote.max_requests_per_second,
            max_retries: remote.max_retries,
            user_agent: remote.user_agent.clone(),
            ..Self::default()
        }
    }
}

impl Default for MediaWikiClientConfig {
    fn default() -> Self {
        let remote = RemoteConfig::default();
        Self {
            api_url: remote.api_url,
            namespace: remote.namespace,
            max_lag_seconds: remote.max_lag_seconds,
            timeout_seconds: remote.request_timeout_seconds,
            max_requests_per_second: remote.max_requests_per_second,
            max_retries: remote.max_retries,
            user_agent: remote.user_agent,
            retry_base_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(60),
        }
    }
}

/// Rate-limited Action API client
pub struct MediaWikiClient {
    client: Client,
    api_url: Url,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: MediaWikiClientConfig,
}

impl MediaWikiClient {
    /// Create a new client with the given configuration
    pub fn new(config: MediaWikiClientConfig) -> Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .with_context(|| format!("Invalid API URL: {}", config.api_url))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        info!(
            "🌐 MediaWiki client for {} (namespace {}, maxlag {}s, {} req/s)",
            api_url, config.namespace, config.max_lag_seconds, config.max_requests_per_second
        );

        Ok(Self {
            client,
            api_url,
            rate_limiter: RateLimiter::direct(quota),
            config,
        })
    }

    /// Issue one `action=query` request and decode the body into `T`.
    async fn query<T: DeserializeOwned>(
        &self,
        context: &str,
        params: &[(&str, String)],
    ) -> CatalogResult<T> {
        let body = self.query_json(context, params).await?;
        serde_json::from_value(body).map_err(|e| CatalogError::malformed(context, e.to_string()))
    }

    async fn query_json(
        &self,
        context: &str,
        params: &[(&str, String)],
    ) -> CatalogResult<serde_json::Value> {
        let mut query: Vec<(&str, String)> = vec![
            ("action", "query".to_string()),
            ("format", "json".to_string()),
            ("formatversion", "2".to_string()),
            ("maxlag", self.config.max_lag_seconds.to_string()),
        ];
        query.extend(params.iter().cloned());

        let attempts = self.config.max_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            self.rate_limiter.until_ready().await;
            debug!("🌐 {} request (attempt {}/{})", context, attempt, attempts);

            let failure = match self.send_once(context, &query).await {
                Ok(body) => return Ok(body),
                Err(failure) => failure,
            };

            if !failure.retry || attempt == attempts {
                return Err(failure.error);
            }

            let delay = self.retry_delay(attempt, failure.retry_after);
            warn!(
                "⏳ {} attempt {}/{} failed ({}), retrying in {:?}",
                context, attempt, attempts, failure.error, delay
            );
            last_error = Some(failure.error);
            tokio::time::sleep(delay).await;
        }

        Err(last_error.unwrap_or_else(|| CatalogError::transient("http", "no attempt was made")))
    }

    async fn send_once(
        &self,
        context: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, RequestFailure> {
        let response = self
            .client
            .get(self.api_url.clone())
            .query(query)
            .send()
            .await
            .map_err(|e| RequestFailure {
                error: CatalogError::transient("http", e.to_string()),
                retry: true,
                retry_after: None,
            })?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers().get(RETRY_AFTER));

        if !status.is_success() {
            let error = CatalogError::transient(
                format!("http-{}", status.as_u16()),
                format!("{context} request returned {status}"),
            );
            return Err(RequestFailure {
                error,
                retry: is_retryable_status(status),
                retry_after,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RequestFailure::fatal(CatalogError::malformed(context, e.to_string())))?;

        if let Some(api_error) = body.get("error") {
            let code = api_error
                .get("code")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let message = api_error
                .get("info")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let retry = RETRYABLE_API_CODES.contains(&code.as_str());
            return Err(RequestFailure {
                error: CatalogError::Transient { code, message },
                retry,
                retry_after,
            });
        }

        Ok(body)
    }

    /// Server advice wins; otherwise exponential backoff with jitter.
    fn retry_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = retry_after.unwrap_or_else(|| {
            let base = self.config.retry_base_delay.as_millis();
            let exp = base.saturating_mul(1u128 << (attempt - 1).min(16));
            let jitter = u128::from(fastrand::u64(0..=u64::try_from(base).unwrap_or(0) / 2 + 1));
            Duration::from_millis(u64::try_from(exp + jitter).unwrap_or(u64::MAX))
        });
        delay.min(self.config.max_retry_delay)
    }

    fn validate_batch(&self, ids: &[PageId]) -> CatalogResult<()> {
        if ids.is_empty() {
            return Err(CatalogError::InvalidRequest {
                reason: "attribute lookup needs at least one page id".to_string(),
            });
        }
        if ids.len() > MAX_PAGEIDS_PER_QUERY {
            return Err(CatalogError::InvalidRequest {
                reason: format!(
                    "attribute lookup of {} ids exceeds the limit of {}",
                    ids.len(),
                    MAX_PAGEIDS_PER_QUERY
                ),
            });
        }
        Ok(())
    }
}

/// One failed attempt plus any server-advised wait
struct RequestFailure {
    error: CatalogError,
    retry: bool,
    retry_after: Option<Duration>,
}

impl RequestFailure {
    const fn fatal(error: CatalogError) -> Self {
        Self {
            error,
            retry: false,
            retry_after: None,
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

// ---------------------------------------------------------------------------
// Response shapes (formatversion=2)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AllPagesResponse {
    #[serde(rename = "continue")]
    continuation: Option<AllPagesContinue>,
    query: Option<AllPagesQuery>,
}

#[derive(Debug, Deserialize)]
struct AllPagesContinue {
    apcontinue: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AllPagesQuery {
    allpages: Vec<AllPagesEntry>,
}

#[derive(Debug, Deserialize)]
struct AllPagesEntry {
    pageid: PageId,
    title: String,
}

#[derive(Debug, Deserialize)]
struct PagesResponse<P> {
    query: Option<PagesQuery<P>>,
}

#[derive(Debug, Deserialize)]
struct PagesQuery<P> {
    #[serde(default = "Vec::new")]
    pages: Vec<P>,
}

#[derive(Debug, Deserialize)]
struct RevisionPage {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    revisions: Vec<Revision>,
}

#[derive(Debug, Deserialize)]
struct Revision {
    slots: RevisionSlots,
}

#[derive(Debug, Deserialize)]
struct RevisionSlots {
    main: MainSlot,
}

#[derive(Debug, Deserialize)]
struct MainSlot {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfoPage {
    pageid: Option<PageId>,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    contentmodel: Option<String>,
    touched: Option<String>,
    length: Option<i64>,
}

impl InfoPage {
    fn into_attributes(self) -> Result<Option<(PageId, ItemAttributes)>, String> {
        if self.missing || self.invalid {
            return Ok(None);
        }
        let id = self.pageid.ok_or("page entry without pageid")?;
        let kind = self
            .contentmodel
            .ok_or_else(|| format!("page {id} has no contentmodel"))?;
        let touched = self
            .touched
            .ok_or_else(|| format!("page {id} has no touched timestamp"))?;
        let length = self.length.ok_or_else(|| format!("page {id} has no length"))?;
        let modified = DateTime::parse_from_rfc3339(&touched)
            .map_err(|e| format!("page {id} touched '{touched}': {e}"))?
            .with_timezone(&Utc);

        Ok(Some((id, ItemAttributes { kind, modified, length })))
    }
}

#[async_trait]
impl CatalogClient for MediaWikiClient {
    async fn list_page(&self, cursor: &ListCursor) -> CatalogResult<ListPage> {
        let mut params = vec![
            ("list", "allpages".to_string()),
            ("apnamespace", self.config.namespace.to_string()),
            ("aplimit", "max".to_string()),
        ];
        if let Some(token) = cursor.token() {
            params.push(("apcontinue", token.to_string()));
        }

        let response: AllPagesResponse = self.query("allpages", &params).await?;
        let query = response
            .query
            .ok_or_else(|| CatalogError::malformed("allpages", "response has no query block"))?;
        let next_cursor = match response.continuation {
            Some(AllPagesContinue { apcontinue: Some(token) }) => Some(token),
            Some(AllPagesContinue { apcontinue: None }) => {
                return Err(CatalogError::malformed(
                    "allpages",
                    "continue block without apcontinue",
                ));
            }
            None => None,
        };

        Ok(ListPage {
            items: query
                .allpages
                .into_iter()
                .map(|entry| BasicRecord::new(entry.pageid, entry.title))
                .collect(),
            next_cursor,
        })
    }

    async fn fetch_content(&self, id: PageId) -> CatalogResult<String> {
        let params = [
            ("prop", "revisions".to_string()),
            ("rvprop", "content".to_string()),
            ("rvslots", "main".to_string()),
            ("pageids", id.to_string()),
        ];

        let response: PagesResponse<RevisionPage> = self.query("revisions", &params).await?;
        let page = response
            .query
            .and_then(|q| q.pages.into_iter().next())
            .ok_or_else(|| CatalogError::malformed("revisions", "response has no pages"))?;

        if page.missing || page.invalid {
            return Err(CatalogError::NotFound { id });
        }

        page.revisions
            .into_iter()
            .next()
            .and_then(|rev| rev.slots.main.content)
            .ok_or(CatalogError::NotFound { id })
    }

    async fn fetch_attributes(
        &self,
        ids: &[PageId],
    ) -> CatalogResult<HashMap<PageId, ItemAttributes>> {
        self.validate_batch(ids)?;

        let joined = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("|");
        let params = [("prop", "info".to_string()), ("pageids", joined)];

        let response: PagesResponse<InfoPage> = self.query("info", &params).await?;
        let pages = response
            .query
            .ok_or_else(|| CatalogError::malformed("info", "response has no query block"))?
            .pages;

        let requested: HashSet<PageId> = ids.iter().copied().collect();
        let mut attributes = HashMap::with_capacity(pages.len());
        for page in pages {
            match page.into_attributes() {
                Ok(Some((id, attrs))) if requested.contains(&id) => {
                    attributes.insert(id, attrs);
                }
                Ok(_) => {}
                Err(reason) => return Err(CatalogError::malformed("info", reason)),
            }
        }

        debug!("Attributes for {}/{} requested pages", attributes.len(), ids.len());
        Ok(attributes)
    }

    fn max_attribute_batch(&self) -> usize {
        MAX_PAGEIDS_PER_QUERY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(max_requests_per_second: u32) -> Result<MediaWikiClient> {
        MediaWikiClient::new(MediaWikiClientConfig {
            max_requests_per_second,
            ..MediaWikiClientConfig::default()
        })
    }

    #[test]
    fn test_client_creation() {
        assert!(client(5).is_ok());
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(client(0).is_err());
    }

    #[test]
    fn invalid_url_is_rejected() {
        let result = MediaWikiClient::new(MediaWikiClientConfig {
            api_url: "not a url".to_string(),
            ..MediaWikiClientConfig::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn retry_after_header_caps_at_max_delay() {
        let client = client(5).unwrap();
        assert_eq!(
            client.retry_delay(1, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            client.retry_delay(1, Some(Duration::from_secs(600))),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn backoff_grows_without_server_advice() {
        let client = client(5).unwrap();
        let first = client.retry_delay(1, None);
        let third = client.retry_delay(3, None);
        assert!(first >= Duration::from_secs(1));
        assert!(third >= Duration::from_secs(4));
    }

    #[test]
    fn batch_validation_limits() {
        let client = client(5).unwrap();
        assert!(client.validate_batch(&[]).is_err());
        let too_many: Vec<PageId> = (0..=50).collect();
        assert!(client.validate_batch(&too_many).is_err());
        assert!(client.validate_batch(&too_many[..50]).is_ok());
    }

    #[test]
    fn info_page_requires_full_triple() {
        let page: InfoPage = serde_json::from_value(serde_json::json!({
            "pageid": 5,
            "contentmodel": "Scribunto",
            "length": 10
        }))
        .unwrap();
        assert!(page.into_attributes().is_err());

        let missing: InfoPage =
            serde_json::from_value(serde_json::json!({ "pageid": 6, "missing": true })).unwrap();
        assert_eq!(missing.into_attributes(), Ok(None));
    }
}
