//! HTTP ingestion client for structured financials and classified news.
//!
//! Implements the core provider traits over a Polygon-style REST API with a
//! sliding-window rate limiter and automatic 429 retry. Feeds that carry
//! upstream sentiment insights are trusted as-is; bare headlines go through
//! the rule classifier.

pub mod classify;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use credit_core::{
    FinancialSnapshot, FinancialsProvider, MarketEvent, NewsProvider, PipelineError, Sentiment,
};
use reqwest::Client;
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// Sliding-window rate limiter: at most `max_requests` per `window`.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests,
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            let oldest = match ts.front() {
                Some(&t) => t,
                None => continue,
            };
            let sleep_dur = (oldest + self.window).duration_since(now) + Duration::from_millis(50);
            drop(ts);
            tracing::debug!(
                "rate limiter: waiting {:.1}s for an API slot",
                sleep_dur.as_secs_f64()
            );
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[derive(Clone)]
pub struct MarketDataClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl MarketDataClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        // Free-tier users should set MARKET_DATA_RATE_LIMIT=5.
        let rate_limit: usize = std::env::var("MARKET_DATA_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100)
            .max(1);

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url,
            client,
            rate_limiter: RateLimiter::new(rate_limit, Duration::from_secs(60)),
        }
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, PipelineError> {
        let request = builder
            .build()
            .map_err(|e| PipelineError::Ingestion(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request
                .try_clone()
                .ok_or_else(|| PipelineError::Ingestion("cannot clone request".to_string()))?;
            let response = self
                .client
                .execute(req_clone)
                .await
                .map_err(|e| PipelineError::Ingestion(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!(
                "rate limited upstream, waiting {}s before retry {}/3",
                wait_secs,
                attempt + 1
            );
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(PipelineError::Ingestion(
            "rate limited upstream after 3 retries".to_string(),
        ))
    }

    /// Fetch recent financial statements, most recent period first.
    pub async fn fetch_financials(
        &self,
        symbol: &str,
    ) -> Result<Vec<FinancialSnapshot>, PipelineError> {
        let url = format!("{}/vX/reference/financials", self.base_url);

        let response = self
            .send_request(self.client.get(&url).query(&[
                ("ticker", symbol),
                ("timeframe", "annual"),
                ("apiKey", self.api_key.as_str()),
                ("limit", "4"),
            ]))
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::Ingestion(format!(
                "financials HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let body: FinancialsResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Ingestion(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .map(|r| result_to_snapshot(r, symbol))
            .collect())
    }

    /// Fetch recent news for a symbol as classified market events.
    pub async fn fetch_news(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<Vec<MarketEvent>, PipelineError> {
        let url = format!("{}/v2/reference/news", self.base_url);

        let limit_param = limit.to_string();
        let response = self
            .send_request(self.client.get(&url).query(&[
                ("ticker", symbol),
                ("apiKey", self.api_key.as_str()),
                ("limit", limit_param.as_str()),
                ("order", "desc"),
            ]))
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::Ingestion(format!(
                "news HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let body: NewsResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Ingestion(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .map(|r| article_to_event(r, symbol))
            .collect())
    }
}

/// Map one reporting period into a snapshot. Debt comes from the long-term
/// debt line when the filing breaks it out; total liabilities is the fallback
/// proxy (it overstates leverage but keeps the ratio defined).
fn result_to_snapshot(result: FinancialResult, symbol: &str) -> FinancialSnapshot {
    let income = result.financials.income_statement;
    let balance = result.financials.balance_sheet;

    let debt = statement_value(&balance, "long_term_debt")
        .or_else(|| statement_value(&balance, "liabilities"));

    FinancialSnapshot {
        symbol: symbol.to_string(),
        fiscal_period: result.fiscal_period,
        fiscal_year: result.fiscal_year.parse().unwrap_or(0),
        revenue: statement_value(&income, "revenues"),
        operating_income: statement_value(&income, "operating_income_loss"),
        net_income: statement_value(&income, "net_income_loss"),
        total_assets: statement_value(&balance, "assets"),
        current_assets: statement_value(&balance, "current_assets"),
        current_liabilities: statement_value(&balance, "current_liabilities"),
        total_debt: debt,
        stockholder_equity: statement_value(&balance, "equity"),
    }
}

/// Map one raw article into a classified event. Upstream insight sentiment
/// for this ticker wins; otherwise the rule classifier decides.
fn article_to_event(article: NewsResult, symbol: &str) -> MarketEvent {
    let insight = article
        .insights
        .iter()
        .flatten()
        .find(|i| i.ticker.as_deref() == Some(symbol));

    let sentiment = insight
        .and_then(|i| parse_sentiment(i.sentiment.as_deref()))
        .unwrap_or_else(|| classify::classify_sentiment(&article.title));

    let mut entities = classify::extract_entities(&article.title);
    entities.extend(article.tickers.iter().cloned());
    let mut seen = HashSet::new();
    entities.retain(|e| seen.insert(e.clone()));

    MarketEvent {
        event_type: classify::classify_event_type(&article.title).to_string(),
        sentiment,
        magnitude: None,
        entities,
        published_utc: article
            .published_utc
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        headline: article.title,
    }
}

fn parse_sentiment(raw: Option<&str>) -> Option<Sentiment> {
    match raw {
        Some("positive") => Some(Sentiment::Positive),
        Some("negative") => Some(Sentiment::Negative),
        Some("neutral") => Some(Sentiment::Neutral),
        _ => None,
    }
}

fn statement_value(statement: &HashMap<String, serde_json::Value>, key: &str) -> Option<f64> {
    statement
        .get(key)
        .and_then(|v| v.get("value"))
        .and_then(|v| v.as_f64())
}

#[async_trait]
impl FinancialsProvider for MarketDataClient {
    async fn latest_snapshot(
        &self,
        symbol: &str,
    ) -> Result<Option<FinancialSnapshot>, PipelineError> {
        let mut periods = self.fetch_financials(symbol).await?;
        if periods.is_empty() {
            // Absence of filings is a valid outcome, not a fetch error.
            return Ok(None);
        }
        Ok(Some(periods.remove(0)))
    }
}

#[async_trait]
impl NewsProvider for MarketDataClient {
    async fn recent_events(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<Vec<MarketEvent>, PipelineError> {
        self.fetch_news(symbol, limit).await
    }
}

#[derive(Debug, Deserialize)]
struct FinancialsResponse {
    #[serde(default)]
    results: Vec<FinancialResult>,
}

#[derive(Debug, Deserialize)]
struct FinancialResult {
    fiscal_period: String,
    fiscal_year: String,
    financials: FinancialStatements,
}

#[derive(Debug, Deserialize)]
struct FinancialStatements {
    #[serde(default)]
    income_statement: HashMap<String, serde_json::Value>,
    #[serde(default)]
    balance_sheet: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsResult>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    title: String,
    #[serde(default)]
    published_utc: Option<String>,
    #[serde(default)]
    tickers: Vec<String>,
    #[serde(default)]
    insights: Option<Vec<NewsInsight>>,
}

#[derive(Debug, Deserialize)]
struct NewsInsight {
    #[serde(default)]
    ticker: Option<String>,
    #[serde(default)]
    sentiment: Option<String>,
}
