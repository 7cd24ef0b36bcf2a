//! Rate-limited HTTP collaborator used by the standings refresh.
//!
//! Both upstreams get a fixed delay between requests: the competition API
//! throttles per minute, and the scraped sites ask for polite crawling.

use anyhow::{anyhow, Context, Result};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{info, warn};

use super::snapshot::{SeasonPayload, SourceBundle};
use crate::config::Config;

const API_BASE: &str = "https://api.football-data.org/v4";
const FIRST_DIVISION_CODE: &str = "FL1";
const SECOND_DIVISION_PAGE: &str =
    "https://fr.wikipedia.org/wiki/Championnat_de_France_de_football_de_deuxi%C3%A8me_division";

type DirectLimiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// One request per `delay`; a zero delay disables throttling.
fn fixed_delay(delay: Duration) -> DirectLimiter {
    let quota = Quota::with_period(delay).unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
    RateLimiter::direct(quota)
}

pub struct Fetcher {
    http_client: reqwest::Client,
    api_key: Option<String>,
    api_limiter: DirectLimiter,
    page_limiter: DirectLimiter,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("league-ingestion/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(2)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            api_key: config.football_data_api_key.clone(),
            api_limiter: fixed_delay(Duration::from_secs(config.api_request_delay_seconds)),
            page_limiter: fixed_delay(Duration::from_secs(config.page_request_delay_seconds)),
        })
    }

    /// GET `{API_BASE}/{path}` with the auth token.
    pub async fn api_get(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("FOOTBALL_DATA_API_KEY is not configured"))?;

        self.api_limiter.until_ready().await;

        let url = format!("{}/{}", API_BASE, path.trim_start_matches('/'));
        let response = self
            .http_client
            .get(&url)
            .header("X-Auth-Token", api_key)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if let Some(remaining) = response.headers().get("x-requests-available-minute") {
            info!("API requests available this minute: {}", remaining.to_str().unwrap_or("?"));
        }

        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;
        if !status.is_success() {
            return Err(anyhow!("API error (status {}) for {}: {}", status, url, body));
        }
        Ok(body)
    }

    pub async fn page_get(&self, url: &str) -> Result<String> {
        self.page_limiter.until_ready().await;

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Page fetch failed (status {}) for {}", status, url));
        }
        response.text().await.context("Failed to read page body")
    }

    /// Current standings from both sources. A failed fetch leaves that source
    /// out of the bundle; nothing is written on its behalf.
    pub async fn current_standings(&self, season: i32) -> SourceBundle {
        let mut bundle = SourceBundle::default();

        let path = format!("competitions/{}/standings", FIRST_DIVISION_CODE);
        match self.api_get(&path, &[("season", season.to_string())]).await {
            Ok(body) => bundle.api_standings.push(SeasonPayload { season, body }),
            Err(e) => warn!("Standings fetch failed for {}: {:?}", season, e),
        }

        let url = format!("{}_{}-{}", SECOND_DIVISION_PAGE, season, season + 1);
        match self.page_get(&url).await {
            Ok(body) => bundle.wiki_rankings.push(SeasonPayload { season, body }),
            Err(e) => warn!("Ranking page fetch failed for {}: {:?}", season, e),
        }

        bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_delay_never_waits() {
        let limiter = fixed_delay(Duration::ZERO);
        for _ in 0..100 {
            assert!(limiter.check().is_ok());
        }
    }

    #[tokio::test]
    async fn fixed_delay_allows_one_request_per_period() {
        let limiter = fixed_delay(Duration::from_secs(60));
        tokio_test::assert_ok!(limiter.check());
        tokio_test::assert_err!(limiter.check());
    }

    #[tokio::test]
    async fn api_calls_need_a_key() {
        let config = Config {
            football_data_api_key: None,
            ..Config::default()
        };
        let fetcher = Fetcher::new(&config).unwrap();
        tokio_test::assert_err!(fetcher.api_get("competitions/FL1/standings", &[]).await);
    }
}
