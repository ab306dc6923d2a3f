use chrono::NaiveDate;
use std::time::Duration;
use tracing::warn;

/// Yahoo symbol of the benchmark index.
pub const BENCHMARK_SYMBOL: &str = "^GSPC";
pub const BENCHMARK_LABEL: &str = "S&P 500";

pub const DEFAULT_INVESTMENT: f64 = 1000.0;

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_SYMBOL_DIRECTORY_URL: &str =
    "https://www.nasdaqtrader.com/dynamic/SymDir/nasdaqtraded.txt";

pub const DEFAULT_WEBUI_PORT: u16 = 8080;

pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 12, 22).unwrap_or(NaiveDate::MIN)
}

pub fn default_end_date() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ProviderKind {
    Yahoo,
    Mock,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
            Self::Mock => "mock",
        }
    }
}

pub fn parse_provider_kind(raw: &str) -> ProviderKind {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yahoo" | "yfinance" => ProviderKind::Yahoo,
        "mock" | "offline" => ProviderKind::Mock,
        other => {
            warn!(
                "Unknown BACKTEST_DATA_PROVIDER={} ; defaulting to yahoo. Allowed values: yahoo | mock",
                other
            );
            ProviderKind::Yahoo
        }
    }
}

pub fn configured_provider_kind() -> ProviderKind {
    std::env::var("BACKTEST_DATA_PROVIDER")
        .map(|v| parse_provider_kind(&v))
        .unwrap_or(ProviderKind::Yahoo)
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses a numeric setting, clamped to `lo..=hi`; missing or unparsable values fall back to `default`.
fn parse_clamped(raw: Option<&str>, lo: u64, hi: u64, default: u64) -> u64 {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => default,
        Some(v) => match v.parse::<u64>() {
            Ok(n) => n.clamp(lo, hi),
            Err(_) => {
                warn!("Ignoring non-numeric setting value {:?}; using {}", v, default);
                default
            }
        },
    }
}

pub fn http_timeout() -> Duration {
    let raw = std::env::var("BACKTEST_HTTP_TIMEOUT_SECS").ok();
    Duration::from_secs(parse_clamped(raw.as_deref(), 1, 120, 15))
}

pub fn retry_attempts() -> usize {
    let raw = std::env::var("BACKTEST_RETRY_ATTEMPTS").ok();
    parse_clamped(raw.as_deref(), 1, 8, 1) as usize
}

pub fn yahoo_base_url() -> String {
    env_trimmed("BACKTEST_YAHOO_BASE_URL").unwrap_or_else(|| DEFAULT_YAHOO_BASE_URL.to_string())
}

pub fn symbol_directory_url() -> String {
    env_trimmed("BACKTEST_SYMBOL_DIRECTORY_URL")
        .unwrap_or_else(|| DEFAULT_SYMBOL_DIRECTORY_URL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_kind() {
        assert_eq!(parse_provider_kind("mock"), ProviderKind::Mock);
        assert_eq!(parse_provider_kind("  YAHOO "), ProviderKind::Yahoo);
        assert_eq!(parse_provider_kind("yfinance"), ProviderKind::Yahoo);
        assert_eq!(parse_provider_kind("polygon"), ProviderKind::Yahoo);
    }

    #[test]
    fn test_parse_clamped() {
        assert_eq!(parse_clamped(None, 1, 120, 15), 15);
        assert_eq!(parse_clamped(Some(""), 1, 120, 15), 15);
        assert_eq!(parse_clamped(Some("abc"), 1, 120, 15), 15);
        assert_eq!(parse_clamped(Some("-3"), 1, 120, 15), 15);
        assert_eq!(parse_clamped(Some(" 30 "), 1, 120, 15), 30);
        assert_eq!(parse_clamped(Some("0"), 1, 120, 15), 1);
        assert_eq!(parse_clamped(Some("600"), 1, 120, 15), 120);
        assert_eq!(parse_clamped(Some("0"), 1, 8, 1), 1);
        assert_eq!(parse_clamped(Some("20"), 1, 8, 1), 8);
        assert_eq!(parse_clamped(Some("3"), 1, 8, 1), 3);
    }

    #[test]
    fn test_default_dates() {
        assert_eq!(default_start_date().to_string(), "2017-12-22");
        assert!(default_end_date() > default_start_date());
    }
}
