use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by a `MarketDataProvider` implementation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure, timeout or a non-success HTTP status.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with an error payload.
    #[error("provider error: {0}")]
    Api(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// The payload could not be interpreted.
    #[error("malformed provider response: {0}")]
    Parse(String),
}

/// Everything that can stop a single backtest submission.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("no price data available for {symbol} in the selected range")]
    DataUnavailable { symbol: String },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("cannot compute return for {symbol}: first adjusted close is zero")]
    DivisionByZero { symbol: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Provider(ProviderError),
}

impl From<ProviderError> for BacktestError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::UnknownSymbol(symbol) => Self::UnknownSymbol(symbol),
            other => Self::Provider(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_unknown_symbol_lifts_to_backtest_variant() {
        let err: BacktestError = ProviderError::UnknownSymbol("ZZZZ".to_string()).into();
        assert!(matches!(err, BacktestError::UnknownSymbol(ref s) if s == "ZZZZ"));

        let err: BacktestError = ProviderError::Api("rate limited".to_string()).into();
        assert!(matches!(err, BacktestError::Provider(ProviderError::Api(_))));
        assert_eq!(err.to_string(), "provider error: rate limited");
    }
}
