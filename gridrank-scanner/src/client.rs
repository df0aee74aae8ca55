use crate::error::{Result, ScanError};
use crate::result::{Coordinate, RankLookup};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub(crate) const USER_AGENT: &str = concat!("gridrank/", env!("CARGO_PKG_VERSION"));

/// A source of local-search rank positions.
///
/// Implementations must be shareable across the scanner's worker tasks.
#[async_trait]
pub trait RankChecker: Send + Sync {
    async fn check_rank(
        &self,
        keyword: &str,
        target: Option<&str>,
        at: Coordinate,
    ) -> Result<RankLookup>;
}

#[derive(Debug, Serialize)]
struct RankRequest<'a> {
    keyword: &'a str,
    latitude: f64,
    longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RankResponse {
    #[serde(default)]
    position: Option<i64>,
    #[serde(default)]
    business_count: Option<i64>,
}

impl RankResponse {
    // Positions are 1-based; anything else means "not found".
    fn into_lookup(self) -> RankLookup {
        RankLookup {
            position: self
                .position
                .filter(|p| *p > 0)
                .and_then(|p| u32::try_from(p).ok()),
            business_count: self
                .business_count
                .filter(|c| *c >= 0)
                .and_then(|c| u32::try_from(c).ok()),
        }
    }
}

/// JSON rank-check API client (`POST {base}/v1/rank`).
#[derive(Clone)]
pub struct HttpRankClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpRankClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs((timeout_secs / 2).max(1)))
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        let endpoint = join_endpoint(base_url, "v1/rank")?;

        Ok(Self {
            client,
            endpoint,
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RankChecker for HttpRankClient {
    async fn check_rank(
        &self,
        keyword: &str,
        target: Option<&str>,
        at: Coordinate,
    ) -> Result<RankLookup> {
        debug!(
            "Rank lookup '{}' at {:.5},{:.5}",
            keyword, at.latitude, at.longitude
        );

        let body = RankRequest {
            keyword,
            latitude: at.latitude,
            longitude: at.longitude,
            target,
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ScanError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let parsed: RankResponse = serde_json::from_str(&text)
            .map_err(|e| ScanError::ParseError(format!("rank response: {}", e)))?;

        Ok(parsed.into_lookup())
    }
}

/// Join `path` onto `base`, treating `base` as a directory.
pub(crate) fn join_endpoint(base: &str, path: &str) -> Result<Url> {
    let mut base_url =
        Url::parse(base).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", base, e)))?;

    if !base_url.path().ends_with('/') {
        let with_slash = format!("{}/", base_url.path());
        base_url.set_path(&with_slash);
    }

    base_url
        .join(path)
        .map_err(|e| ScanError::InvalidUrl(format!("{}{}: {}", base, path, e)))
}
