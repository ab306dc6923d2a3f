use crate::config::{self, ProviderKind};
use crate::error::ProviderError;
use crate::{nasdaq, yahoo};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// One daily bar. `adj_close` is the close adjusted for dividends and splits.
#[derive(Clone, Debug, PartialEq)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: f64,
}

/// Chronologically ordered daily history for one symbol.
#[derive(Clone, Debug)]
pub struct PriceSeries {
    pub symbol: String,
    pub history: Vec<Candle>,
}

impl PriceSeries {
    pub fn adj_closes(&self) -> Vec<f64> {
        self.history.iter().map(|c| c.adj_close).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// `(min low, max high)` over the series, also covering adjusted closes.
    pub fn price_bounds(&self) -> Option<(f64, f64)> {
        if self.history.is_empty() {
            return None;
        }
        let min = self
            .history
            .iter()
            .map(|c| c.low.min(c.adj_close))
            .fold(f64::INFINITY, f64::min);
        let max = self
            .history
            .iter()
            .map(|c| c.high.max(c.adj_close))
            .fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }
}

/// An entry of the provider's symbol directory.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SymbolListing {
    pub symbol: String,
    pub name: String,
    pub etf: bool,
}

pub fn find_listing<'a>(listings: &'a [SymbolListing], symbol: &str) -> Option<&'a SymbolListing> {
    listings.iter().find(|l| l.symbol == symbol)
}

/// Source of symbols and daily price history.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn lookup_symbols(&self) -> Result<Vec<SymbolListing>, ProviderError>;

    /// Daily bars for `symbol` between `start` and `end`, both inclusive.
    async fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError>;
}

pub fn build_provider(kind: ProviderKind) -> anyhow::Result<Arc<dyn MarketDataProvider>> {
    info!("Using market data provider: {}", kind.as_str());
    let provider: Arc<dyn MarketDataProvider> = match kind {
        ProviderKind::Yahoo => Arc::new(yahoo::YahooProvider::new(
            config::yahoo_base_url(),
            nasdaq::SymbolDirectory::new(config::symbol_directory_url()),
            config::http_timeout(),
            config::retry_attempts(),
        )?),
        ProviderKind::Mock => Arc::new(MockProvider::default()),
    };
    Ok(provider)
}

/// Offline provider with a fixed directory and seeded random-walk prices.
pub struct MockProvider {
    listings: Vec<SymbolListing>,
}

impl Default for MockProvider {
    fn default() -> Self {
        let listing = |symbol: &str, name: &str, etf: bool| SymbolListing {
            symbol: symbol.to_string(),
            name: name.to_string(),
            etf,
        };
        Self {
            listings: vec![
                listing("AAPL", "Apple Inc. - Common Stock", false),
                listing("AMZN", "Amazon.com, Inc. - Common Stock", false),
                listing("GOOGL", "Alphabet Inc. - Class A Common Stock", false),
                listing("META", "Meta Platforms, Inc. - Class A Common Stock", false),
                listing("MSFT", "Microsoft Corporation - Common Stock", false),
                listing("NVDA", "NVIDIA Corporation - Common Stock", false),
                listing("TSLA", "Tesla, Inc. - Common Stock", false),
                listing("QQQ", "Invesco QQQ Trust, Series 1", true),
            ],
        }
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn lookup_symbols(&self) -> Result<Vec<SymbolListing>, ProviderError> {
        Ok(self.listings.clone())
    }

    async fn price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol != config::BENCHMARK_SYMBOL && find_listing(&self.listings, &symbol).is_none() {
            return Err(ProviderError::UnknownSymbol(symbol));
        }
        Ok(mock_series(&symbol, start, end))
    }
}

fn symbol_seed(symbol: &str) -> u64 {
    symbol
        .bytes()
        .fold(17_u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
}

/// Deterministic business-day random walk for `symbol` over `start..=end`.
pub fn mock_series(symbol: &str, start: NaiveDate, end: NaiveDate) -> PriceSeries {
    let seed = symbol_seed(symbol);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price = if symbol == config::BENCHMARK_SYMBOL {
        2600.0
    } else {
        50.0 + (seed % 400) as f64
    };

    let mut history = Vec::new();
    let mut date = start;
    while date <= end {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            let volatility = 0.02;
            let change: f64 = rng.gen_range(-volatility..volatility);
            let open = price;
            let close = open * (1.0 + change);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            history.push(Candle {
                date,
                open,
                high,
                low,
                close,
                adj_close: close,
                volume: rng.gen_range(1_000.0..10_000.0),
            });
            price = close;
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    PriceSeries {
        symbol: symbol.to_string(),
        history,
    }
}
