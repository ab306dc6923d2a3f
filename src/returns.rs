use crate::data::PriceSeries;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReturnError {
    #[error("price series is empty")]
    EmptySeries,
    #[error("first price is zero")]
    ZeroBasePrice,
}

/// Simple total return over an ordered price sequence: `(last / first) - 1`.
pub fn simple_return(prices: &[f64]) -> Result<f64, ReturnError> {
    let (first, last) = match (prices.first(), prices.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(ReturnError::EmptySeries),
    };
    if first == 0.0 {
        return Err(ReturnError::ZeroBasePrice);
    }
    Ok((last / first) - 1.0)
}

/// Simple return of a series' adjusted closes.
pub fn series_return(series: &PriceSeries) -> Result<f64, ReturnError> {
    simple_return(&series.adj_closes())
}

/// Outcome of putting `principal` into an asset that returned `rate`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SimulatedInvestment {
    pub principal: f64,
    pub delta: f64,
    pub final_value: f64,
}

impl SimulatedInvestment {
    pub fn project(principal: f64, rate: f64) -> Self {
        let delta = principal * rate;
        Self {
            principal,
            delta,
            final_value: principal + delta,
        }
    }
}
