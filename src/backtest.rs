use crate::config::{self, BENCHMARK_LABEL, BENCHMARK_SYMBOL};
use crate::data::{find_listing, MarketDataProvider, PriceSeries};
use crate::error::BacktestError;
use crate::returns::{series_return, ReturnError, SimulatedInvestment};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt::Write as _;
use tracing::info;

pub const ABOUT: &str = "Pick a ticker, an amount and a date range. The app fetches daily prices \
for the ticker and for the S&P 500 (^GSPC), computes the simple return of each as \
(last adjusted close / first adjusted close) - 1, and shows what the amount would have become \
had it been invested in the ticker over the period. Prices are fetched fresh on every submission. \
Past performance says nothing about future results; this is not investment advice.";

/// Source of the return calculator, shown on the About tab.
pub const CALCULATOR_SOURCE: &str = include_str!("returns.rs");

/// Years outside this window are rejected before any data is requested.
pub const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1900..=2100;

/// A validated submission.
#[derive(Clone, Debug, PartialEq)]
pub struct BacktestRequest {
    pub symbol: String,
    pub amount: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BacktestRequest {
    pub fn new(symbol: &str, amount: f64, start: NaiveDate, end: NaiveDate) -> Result<Self, BacktestError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(BacktestError::InvalidInput("ticker symbol is required".to_string()));
        }
        if !amount.is_finite() || amount < 0.0 {
            return Err(BacktestError::InvalidInput(format!(
                "investment amount must be a non-negative number, got {}",
                amount
            )));
        }
        for date in [start, end] {
            if !YEAR_RANGE.contains(&date.year()) {
                return Err(BacktestError::InvalidInput(format!(
                    "date {} is outside the supported years {}..={}",
                    date,
                    YEAR_RANGE.start(),
                    YEAR_RANGE.end()
                )));
            }
        }
        if start > end {
            return Err(BacktestError::InvalidDateRange { start, end });
        }
        Ok(Self { symbol, amount, start, end })
    }
}

/// Raw form values as typed by the user.
#[derive(Clone, Debug)]
pub struct BacktestForm {
    pub symbol: String,
    pub amount: String,
    pub start: String,
    pub end: String,
}

impl Default for BacktestForm {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            amount: format!("{}", config::DEFAULT_INVESTMENT),
            start: config::default_start_date().to_string(),
            end: config::default_end_date().to_string(),
        }
    }
}

impl BacktestForm {
    pub fn to_request(&self) -> Result<BacktestRequest, BacktestError> {
        let amount = self
            .amount
            .trim()
            .trim_start_matches('$')
            .parse::<f64>()
            .map_err(|_| BacktestError::InvalidInput(format!("'{}' is not a valid amount", self.amount.trim())))?;
        let start = parse_date("start date", &self.start)?;
        let end = parse_date("end date", &self.end)?;
        BacktestRequest::new(&self.symbol, amount, start, end)
    }
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, BacktestError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        BacktestError::InvalidInput(format!("{} '{}' must be formatted YYYY-MM-DD", field, raw.trim()))
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metric {
    pub label: String,
    pub value: String,
    pub delta: Option<String>,
}

#[derive(Clone, Debug)]
pub struct BacktestReport {
    pub symbol: String,
    pub company_name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub stock_return: f64,
    pub benchmark_return: f64,
    pub investment: SimulatedInvestment,
    pub stock: PriceSeries,
    pub benchmark: PriceSeries,
}

impl BacktestReport {
    /// Simulated return, stock return and benchmark return, in display order.
    pub fn metrics(&self) -> Vec<Metric> {
        vec![
            Metric {
                label: "Simulated return".to_string(),
                value: format_currency(self.investment.final_value),
                delta: Some(format_currency(self.investment.delta)),
            },
            Metric {
                label: format!("{} stock return", self.symbol),
                value: format_percent(self.stock_return),
                delta: None,
            },
            Metric {
                label: format!("{} return", BENCHMARK_LABEL),
                value: format_percent(self.benchmark_return),
                delta: None,
            },
        ]
    }

    pub fn chart_title(&self) -> String {
        format!("{} and {} Chart", self.company_name, BENCHMARK_LABEL)
    }
}

pub fn format_currency(value: f64) -> String {
    if value < 0.0 {
        format!("-${:.2}", -value)
    } else {
        format!("${:.2}", value)
    }
}

pub fn format_percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

fn return_for(series: &PriceSeries) -> Result<f64, BacktestError> {
    series_return(series).map_err(|e| match e {
        ReturnError::EmptySeries => BacktestError::DataUnavailable {
            symbol: series.symbol.clone(),
        },
        ReturnError::ZeroBasePrice => BacktestError::DivisionByZero {
            symbol: series.symbol.clone(),
        },
    })
}

/// Runs one submission end to end: directory lookup, both price fetches,
/// returns and the simulated investment. Every call fetches from scratch.
pub async fn run_backtest(
    provider: &dyn MarketDataProvider,
    request: &BacktestRequest,
) -> Result<BacktestReport, BacktestError> {
    info!(
        "Backtesting {} from {} to {} with ${:.2} via {}",
        request.symbol,
        request.start,
        request.end,
        request.amount,
        provider.name()
    );

    let listings = provider.lookup_symbols().await?;
    let company_name = find_listing(&listings, &request.symbol)
        .map(|l| l.name.clone())
        .ok_or_else(|| BacktestError::UnknownSymbol(request.symbol.clone()))?;

    let stock = provider
        .price_history(&request.symbol, request.start, request.end)
        .await?;
    let benchmark = provider
        .price_history(BENCHMARK_SYMBOL, request.start, request.end)
        .await?;

    let stock_return = return_for(&stock)?;
    let benchmark_return = return_for(&benchmark)?;
    let investment = SimulatedInvestment::project(request.amount, stock_return);

    info!(
        "{} return {:.4}, {} return {:.4}",
        request.symbol, stock_return, BENCHMARK_LABEL, benchmark_return
    );

    Ok(BacktestReport {
        symbol: request.symbol.clone(),
        company_name,
        start: request.start,
        end: request.end,
        stock_return,
        benchmark_return,
        investment,
        stock,
        benchmark,
    })
}

/// Plain-text rendition used by the one-shot CLI mode.
pub fn render_text_report(report: &BacktestReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", report.company_name, report.symbol);
    let _ = writeln!(out, "Period: {} .. {}", report.start, report.end);
    let _ = writeln!(
        out,
        "Trading days: {} ({}), {} ({})",
        report.stock.history.len(),
        report.symbol,
        report.benchmark.history.len(),
        BENCHMARK_LABEL
    );
    for metric in report.metrics() {
        match &metric.delta {
            Some(delta) => {
                let _ = writeln!(out, "{:<24} {:>14}  ({})", metric.label, metric.value, delta);
            }
            None => {
                let _ = writeln!(out, "{:<24} {:>14}", metric.label, metric.value);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Candle, MockProvider, SymbolListing};
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Serves fixed adjusted-close sequences, one bar per day from `start`.
    struct StubProvider {
        stock: Vec<f64>,
        benchmark: Vec<f64>,
    }

    fn stub_series(symbol: &str, start: NaiveDate, prices: &[f64]) -> PriceSeries {
        let history = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Candle {
                date: start + chrono::Duration::days(i as i64),
                open: p,
                high: p,
                low: p,
                close: p,
                adj_close: p,
                volume: 1.0,
            })
            .collect();
        PriceSeries { symbol: symbol.to_string(), history }
    }

    #[async_trait]
    impl MarketDataProvider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn lookup_symbols(&self) -> Result<Vec<SymbolListing>, ProviderError> {
            Ok(vec![SymbolListing {
                symbol: "ACME".to_string(),
                name: "Acme Corp - Common Stock".to_string(),
                etf: false,
            }])
        }

        async fn price_history(
            &self,
            symbol: &str,
            start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<PriceSeries, ProviderError> {
            let prices = if symbol == BENCHMARK_SYMBOL { &self.benchmark } else { &self.stock };
            Ok(stub_series(symbol, start, prices))
        }
    }

    /// Records every call so repeated submissions can be checked for refetching.
    #[derive(Default)]
    struct CountingProvider {
        lookups: AtomicUsize,
        histories: AtomicUsize,
        benchmark_histories: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn lookup_symbols(&self) -> Result<Vec<SymbolListing>, ProviderError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SymbolListing {
                symbol: "ACME".to_string(),
                name: "Acme Corp - Common Stock".to_string(),
                etf: false,
            }])
        }

        async fn price_history(
            &self,
            symbol: &str,
            start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<PriceSeries, ProviderError> {
            self.histories.fetch_add(1, Ordering::SeqCst);
            if symbol == BENCHMARK_SYMBOL {
                self.benchmark_histories.fetch_add(1, Ordering::SeqCst);
            }
            Ok(stub_series(symbol, start, &[10.0, 11.0]))
        }
    }

    fn request(symbol: &str, amount: f64) -> BacktestRequest {
        BacktestRequest::new(symbol, amount, date(2020, 1, 1), date(2020, 12, 31)).unwrap()
    }

    #[tokio::test]
    async fn test_gain_report() {
        let provider = StubProvider {
            stock: vec![100.0, 95.0, 110.0],
            benchmark: vec![3000.0, 2700.0],
        };
        let report = run_backtest(&provider, &request("acme", 1000.0)).await.unwrap();

        assert_eq!(report.symbol, "ACME");
        assert_eq!(report.company_name, "Acme Corp - Common Stock");
        assert!((report.stock_return - 0.10).abs() < 1e-12);
        assert!((report.benchmark_return + 0.10).abs() < 1e-12);
        assert!((report.investment.final_value - 1100.0).abs() < 1e-9);

        let metrics = report.metrics();
        assert_eq!(metrics[0].label, "Simulated return");
        assert_eq!(metrics[0].value, "$1100.00");
        assert_eq!(metrics[0].delta.as_deref(), Some("$100.00"));
        assert_eq!(metrics[1].label, "ACME stock return");
        assert_eq!(metrics[1].value, "10.00%");
        assert_eq!(metrics[2].label, "S&P 500 return");
        assert_eq!(metrics[2].value, "-10.00%");
        assert_eq!(report.chart_title(), "Acme Corp - Common Stock and S&P 500 Chart");
    }

    #[tokio::test]
    async fn test_loss_and_flat_reports_show_delta() {
        let provider = StubProvider { stock: vec![100.0, 90.0], benchmark: vec![1.0, 1.0] };
        let report = run_backtest(&provider, &request("ACME", 1000.0)).await.unwrap();
        let metrics = report.metrics();
        assert_eq!(metrics[0].value, "$900.00");
        assert_eq!(metrics[0].delta.as_deref(), Some("-$100.00"));

        let provider = StubProvider { stock: vec![42.0, 42.0], benchmark: vec![1.0, 2.0] };
        let report = run_backtest(&provider, &request("ACME", 1000.0)).await.unwrap();
        assert_eq!(report.metrics()[0].delta.as_deref(), Some("$0.00"));
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let provider = StubProvider { stock: vec![1.0], benchmark: vec![1.0] };
        let err = run_backtest(&provider, &request("WXYZ", 1000.0)).await.unwrap_err();
        assert!(matches!(err, BacktestError::UnknownSymbol(ref s) if s == "WXYZ"));
    }

    #[tokio::test]
    async fn test_zero_first_price_is_division_by_zero() {
        let provider = StubProvider { stock: vec![0.0, 50.0], benchmark: vec![1.0, 2.0] };
        let err = run_backtest(&provider, &request("ACME", 1000.0)).await.unwrap_err();
        assert!(matches!(err, BacktestError::DivisionByZero { ref symbol } if symbol == "ACME"));
    }

    #[tokio::test]
    async fn test_empty_series_is_data_unavailable() {
        let provider = StubProvider { stock: vec![10.0, 11.0], benchmark: vec![] };
        let err = run_backtest(&provider, &request("ACME", 1000.0)).await.unwrap_err();
        assert!(matches!(err, BacktestError::DataUnavailable { ref symbol } if symbol == BENCHMARK_SYMBOL));
    }

    #[tokio::test]
    async fn test_mock_provider_end_to_end() {
        let provider = MockProvider::default();
        let req = BacktestRequest::new("nvda", 2500.0, date(2022, 1, 3), date(2022, 6, 30)).unwrap();
        let report = run_backtest(&provider, &req).await.unwrap();
        assert_eq!(report.stock.history.len(), report.benchmark.history.len());
        let expected = report.stock.history.last().unwrap().adj_close
            / report.stock.history[0].adj_close
            - 1.0;
        assert_eq!(report.stock_return, expected);

        let text = render_text_report(&report);
        assert!(text.starts_with("NVIDIA Corporation - Common Stock (NVDA)"));
        assert!(text.contains("S&P 500 return"));
    }

    #[tokio::test]
    async fn test_every_submission_refetches() {
        let provider = CountingProvider::default();
        let first = run_backtest(&provider, &request("ACME", 1000.0)).await.unwrap();
        let second = run_backtest(&provider, &request("ACME", 1000.0)).await.unwrap();
        assert_eq!(first.stock_return, second.stock_return);

        assert_eq!(provider.lookups.load(Ordering::SeqCst), 2);
        assert_eq!(provider.histories.load(Ordering::SeqCst), 4);
        assert_eq!(provider.benchmark_histories.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_request_validation() {
        let err = BacktestRequest::new("AAPL", 1000.0, date(2021, 5, 1), date(2021, 4, 1)).unwrap_err();
        assert!(matches!(err, BacktestError::InvalidDateRange { .. }));

        assert!(matches!(
            BacktestRequest::new("  ", 1000.0, date(2021, 1, 1), date(2021, 2, 1)),
            Err(BacktestError::InvalidInput(_))
        ));
        assert!(matches!(
            BacktestRequest::new("AAPL", -5.0, date(2021, 1, 1), date(2021, 2, 1)),
            Err(BacktestError::InvalidInput(_))
        ));
        assert!(BacktestRequest::new("AAPL", 0.0, date(2021, 1, 1), date(2021, 1, 1)).is_ok());

        assert!(matches!(
            BacktestRequest::new("AAPL", 1000.0, date(1, 1, 1), date(2021, 1, 1)),
            Err(BacktestError::InvalidInput(_))
        ));
        assert!(matches!(
            BacktestRequest::new("AAPL", 1000.0, date(2021, 1, 1), date(9999, 12, 31)),
            Err(BacktestError::InvalidInput(_))
        ));
        assert!(BacktestRequest::new("AAPL", 1000.0, date(1900, 1, 1), date(2100, 12, 31)).is_ok());
    }

    #[test]
    fn test_form_parsing() {
        let form = BacktestForm {
            symbol: " msft ".to_string(),
            amount: "$1500.50".to_string(),
            start: "2019-01-02".to_string(),
            end: " 2019-12-31".to_string(),
        };
        let req = form.to_request().unwrap();
        assert_eq!(req.symbol, "MSFT");
        assert_eq!(req.amount, 1500.5);
        assert_eq!(req.start, date(2019, 1, 2));
        assert_eq!(req.end, date(2019, 12, 31));

        let bad = BacktestForm { start: "01/02/2019".to_string(), ..form.clone() };
        assert!(matches!(bad.to_request(), Err(BacktestError::InvalidInput(_))));

        let bad = BacktestForm { amount: "lots".to_string(), ..form };
        assert!(matches!(bad.to_request(), Err(BacktestError::InvalidInput(_))));
    }

    #[test]
    fn test_default_form() {
        let form = BacktestForm::default();
        assert_eq!(form.amount, "1000");
        assert_eq!(form.start, "2017-12-22");
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_currency(1100.0), "$1100.00");
        assert_eq!(format_currency(-100.004), "-$100.00");
        assert_eq!(format_percent(0.1), "10.00%");
        assert_eq!(format_percent(-0.12346), "-12.35%");
    }
}
