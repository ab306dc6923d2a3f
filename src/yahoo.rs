use crate::data::{Candle, MarketDataProvider, PriceSeries, SymbolListing};
use crate::error::ProviderError;
use crate::nasdaq::SymbolDirectory;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Deserialize, Debug)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooChartError>,
}

#[derive(Deserialize, Debug)]
struct YahooChartError {
    code: String,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct YahooResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Deserialize, Debug)]
struct YahooIndicators {
    #[serde(default)]
    quote: Vec<YahooQuote>,
    #[serde(default)]
    adjclose: Vec<YahooAdjClose>,
}

#[derive(Deserialize, Debug)]
struct YahooQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Deserialize, Debug)]
struct YahooAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Daily history from the Yahoo Finance chart API, symbols from the NASDAQ
/// Trader directory.
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
    directory: SymbolDirectory,
    max_attempts: usize,
    retry_delay: Duration,
}

const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Only transport failures are retried, and only while attempts remain.
fn should_retry(err: &ProviderError, attempt: usize, max_attempts: usize) -> bool {
    matches!(err, ProviderError::Request(_)) && attempt < max_attempts
}

impl YahooProvider {
    pub fn new(
        base_url: String,
        directory: SymbolDirectory,
        timeout: Duration,
        max_attempts: usize,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            directory,
            max_attempts: max_attempts.max(1),
            retry_delay: RETRY_DELAY,
        })
    }

    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let period1 = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive on Yahoo's side.
        let period2 = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=div%2Csplits&includeAdjustedClose=true",
            self.base_url,
            symbol.replace('^', "%5E"),
            period1,
            period2
        )
    }

    async fn fetch_chart(&self, url: &str) -> Result<YahooChartResponse, ProviderError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        match serde_json::from_str::<YahooChartResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => {
                Err(ProviderError::Api(format!("HTTP {} from chart endpoint", status)))
            }
            Err(e) => Err(ProviderError::Parse(e.to_string())),
        }
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn lookup_symbols(&self) -> Result<Vec<SymbolListing>, ProviderError> {
        self.directory.fetch(&self.client).await
    }

    async fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        let symbol = symbol.trim().to_uppercase();
        let url = self.chart_url(&symbol, start, end);

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self.fetch_chart(&url).await {
                Ok(resp) => break resp,
                Err(e) if should_retry(&e, attempt, self.max_attempts) => {
                    warn!(
                        "Failed to fetch data for {} (attempt {}/{}): {}",
                        symbol, attempt, self.max_attempts, e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        };

        let series = chart_to_series(&symbol, response, start, end)?;
        info!(
            "Fetched {} daily bars for {} ({} .. {})",
            series.history.len(),
            symbol,
            start,
            end
        );
        Ok(series)
    }
}

fn chart_to_series(
    symbol: &str,
    response: YahooChartResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceSeries, ProviderError> {
    if let Some(err) = response.chart.error {
        if err.code == "Not Found" {
            return Err(ProviderError::UnknownSymbol(symbol.to_string()));
        }
        return Err(ProviderError::Api(match err.description {
            Some(desc) => format!("{}: {}", err.code, desc),
            None => err.code,
        }));
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ProviderError::Parse(format!("no chart result for {}", symbol)))?;

    let mut history = Vec::with_capacity(result.timestamp.len());
    if !result.timestamp.is_empty() {
        let quote = result
            .indicators
            .quote
            .first()
            .ok_or_else(|| ProviderError::Parse(format!("no quote block for {}", symbol)))?;
        let adjclose = result.indicators.adjclose.first().map(|a| &a.adjclose);
        let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

        for (i, &timestamp) in result.timestamp.iter().enumerate() {
            let Some(date) = DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive()) else {
                continue;
            };
            if date < start || date > end {
                continue;
            }
            if let (Some(open), Some(high), Some(low), Some(close)) = (
                at(&quote.open, i),
                at(&quote.high, i),
                at(&quote.low, i),
                at(&quote.close, i),
            ) {
                history.push(Candle {
                    date,
                    open,
                    high,
                    low,
                    close,
                    adj_close: adjclose.and_then(|v| at(v, i)).unwrap_or(close),
                    volume: at(&quote.volume, i).unwrap_or(0.0),
                });
            }
        }
    }

    Ok(PriceSeries {
        symbol: symbol.to_string(),
        history,
    })
}
