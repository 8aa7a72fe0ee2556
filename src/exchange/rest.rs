//! Signed REST client with retry, deadlines, and cursor pagination.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::auth::RequestSigner;
use super::dto::{
    EventResponse, EventsResponse, ExchangeStatus, MarketResponse, MarketsResponse,
    OrderbookResponse, SeriesResponse,
};
use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// Deadline adopted by pagination loops whose caller supplied none.
const PAGINATION_DEADLINE: Duration = Duration::from_secs(600);

/// Base delay for the retry backoff schedule.
const RETRY_BASE: Duration = Duration::from_secs(1);

/// Optional filters for the paginated market listing.
#[derive(Debug, Clone, Default)]
pub struct MarketFilter {
    pub event_ticker: Option<String>,
    pub series_ticker: Option<String>,
    pub tickers: Option<Vec<String>>,
    pub status: Option<String>,
}

impl MarketFilter {
    fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(event) = &self.event_ticker {
            pairs.push(("event_ticker".into(), event.clone()));
        }
        if let Some(series) = &self.series_ticker {
            pairs.push(("series_ticker".into(), series.clone()));
        }
        if let Some(tickers) = &self.tickers {
            pairs.push(("tickers".into(), tickers.join(",")));
        }
        if let Some(status) = &self.status {
            pairs.push(("status".into(), status.clone()));
        }
        pairs
    }
}

/// Signed HTTP client for the exchange REST API.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    /// Path component of the base URL; part of every signed payload.
    base_path: String,
    signer: Arc<RequestSigner>,
    max_retries: u32,
    request_timeout: Duration,
    page_size: u32,
}

impl RestClient {
    pub fn new(config: &ApiConfig, signer: Arc<RequestSigner>, page_size: u32) -> Result<Self> {
        let parsed = url::Url::parse(&config.base_url)?;
        let base_path = parsed.path().trim_end_matches('/').to_string();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            base_path,
            signer,
            max_retries: config.max_retries,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            page_size,
        })
    }

    /// `GET /exchange/status`
    pub async fn exchange_status(&self) -> Result<ExchangeStatus> {
        self.signed_get("/exchange/status", &[], None).await
    }

    /// Paginated `GET /markets`, drained to the last cursor.
    pub async fn all_markets(&self, filter: &MarketFilter) -> Result<Vec<super::MarketDto>> {
        let deadline = Instant::now() + PAGINATION_DEADLINE;
        let mut markets = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = filter.query_pairs();
            query.push(("limit".into(), self.page_size.to_string()));
            if let Some(c) = &cursor {
                query.push(("cursor".into(), c.clone()));
            }

            let page: MarketsResponse = self
                .signed_get("/markets", &query, Some(deadline))
                .await?;
            markets.extend(page.markets);

            match page.cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        debug!(count = markets.len(), "Fetched market universe");
        Ok(markets)
    }

    /// `GET /markets/{ticker}`
    pub async fn market(&self, ticker: &str) -> Result<super::MarketDto> {
        let response: MarketResponse = self
            .signed_get(&format!("/markets/{ticker}"), &[], None)
            .await?;
        Ok(response.market)
    }

    /// `GET /markets/{ticker}/orderbook`
    pub async fn orderbook(&self, ticker: &str, depth: Option<u32>) -> Result<OrderbookResponse> {
        let mut query = Vec::new();
        if let Some(depth) = depth {
            query.push(("depth".into(), depth.to_string()));
        }
        self.signed_get(&format!("/markets/{ticker}/orderbook"), &query, None)
            .await
    }

    /// Paginated `GET /events`, drained to the last cursor.
    pub async fn all_events(&self) -> Result<Vec<super::EventDto>> {
        let deadline = Instant::now() + PAGINATION_DEADLINE;
        let mut events = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("limit".into(), self.page_size.to_string())];
            if let Some(c) = &cursor {
                query.push(("cursor".into(), c.clone()));
            }

            let page: EventsResponse = self.signed_get("/events", &query, Some(deadline)).await?;
            events.extend(page.events);

            match page.cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
        }

        Ok(events)
    }

    /// `GET /events/{ticker}`
    pub async fn event(&self, ticker: &str) -> Result<super::EventDto> {
        let response: EventResponse = self
            .signed_get(&format!("/events/{ticker}"), &[], None)
            .await?;
        Ok(response.event)
    }

    /// `GET /series/{ticker}`
    pub async fn series(&self, ticker: &str) -> Result<super::SeriesDto> {
        let response: SeriesResponse = self
            .signed_get(&format!("/series/{ticker}"), &[], None)
            .await?;
        Ok(response.series)
    }

    /// Issue one signed GET with retry on transient failures.
    ///
    /// Transport errors, 5xx, and 429 retry with exponential backoff and
    /// ±50% jitter up to `max_retries`; other 4xx are terminal. `deadline`
    /// bounds the whole call including backoff sleeps.
    async fn signed_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        deadline: Option<Instant>,
    ) -> Result<T> {
        let deadline = deadline.unwrap_or_else(|| Instant::now() + self.request_timeout * 2);
        let mut attempt: u32 = 0;

        loop {
            match self.signed_get_once(path, query, deadline).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let wait = backoff_with_jitter(attempt);
                    attempt += 1;
                    warn!(
                        path,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Transient API failure, retrying"
                    );
                    if Instant::now() + wait >= deadline {
                        return Err(e);
                    }
                    tokio::time::sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn signed_get_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        deadline: Instant,
    ) -> Result<T> {
        let signed_path = format!("{}{}", self.base_path, path);
        let headers = self.signer.sign("GET", &signed_path);

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::Api {
                status: 0,
                body: "deadline exhausted".into(),
            });
        }

        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .header(RequestSigner::KEY_HEADER, headers.key.as_str())
            .header(
                RequestSigner::TIMESTAMP_HEADER,
                headers.timestamp_ms.to_string(),
            )
            .header(RequestSigner::SIGNATURE_HEADER, headers.signature.as_str())
            .timeout(remaining.min(self.request_timeout))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        // 5xx and 429 are transient (see Error::is_transient); other 4xx are
        // terminal: bad request, auth failure, unknown resource.
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            body,
        })
    }
}

/// Exponential backoff with ±50% jitter: 1s, 2s, 4s, ...
fn backoff_with_jitter(attempt: u32) -> Duration {
    let base = RETRY_BASE * 2u32.saturating_pow(attempt);
    let jitter = rand::thread_rng().gen_range(0.5..1.5);
    base.mul_f64(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_with_bounded_jitter() {
        for attempt in 0..4 {
            let base = RETRY_BASE * 2u32.pow(attempt);
            let wait = backoff_with_jitter(attempt);
            assert!(wait >= base.mul_f64(0.5));
            assert!(wait <= base.mul_f64(1.5));
        }
    }

    #[test]
    fn filter_builds_expected_query() {
        let filter = MarketFilter {
            event_ticker: Some("EVT-1".into()),
            status: Some("active".into()),
            ..Default::default()
        };
        let pairs = filter.query_pairs();
        assert!(pairs.contains(&("event_ticker".into(), "EVT-1".into())));
        assert!(pairs.contains(&("status".into(), "active".into())));
        assert_eq!(pairs.len(), 2);
    }
}
