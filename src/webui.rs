use crate::backtest::{self, BacktestReport, BacktestRequest, Metric};
use crate::config::{self, BENCHMARK_LABEL, BENCHMARK_SYMBOL};
use crate::data::{MarketDataProvider, SymbolListing};
use crate::error::BacktestError;
use crate::returns::SimulatedInvestment;
use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const INDEX_HTML: &str = include_str!("../web/index.html");
const APP_JS: &str = include_str!("../web/app.js");

#[derive(Clone)]
struct WebState {
    provider: Arc<dyn MarketDataProvider>,
}

#[derive(Clone, Debug, Serialize)]
struct ApiError {
    error: String,
}

#[derive(Debug, Deserialize)]
struct BacktestRequestBody {
    symbol: String,
    amount: Option<f64>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct PricePoint {
    time: i64,
    value: f64,
}

#[derive(Debug, Serialize)]
struct CandlePoint {
    time: i64,
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    adj_close: f64,
}

#[derive(Debug, Serialize)]
struct BacktestResponse {
    symbol: String,
    company_name: String,
    chart_title: String,
    benchmark_label: &'static str,
    start: NaiveDate,
    end: NaiveDate,
    metrics: Vec<Metric>,
    stock_return: f64,
    benchmark_return: f64,
    investment: SimulatedInvestment,
    candles: Vec<CandlePoint>,
    benchmark: Vec<PricePoint>,
}

#[derive(Debug, Serialize)]
struct SymbolsResponse {
    symbols: Vec<SymbolListing>,
}

#[derive(Debug, Serialize)]
struct AboutResponse {
    about: &'static str,
    benchmark: &'static str,
    calculator_source: &'static str,
}

fn unix_time(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

impl From<&BacktestReport> for BacktestResponse {
    fn from(report: &BacktestReport) -> Self {
        let candles = report
            .stock
            .history
            .iter()
            .map(|c| CandlePoint {
                time: unix_time(c.date),
                date: c.date,
                open: c.open,
                high: c.high,
                low: c.low,
                close: c.close,
                adj_close: c.adj_close,
            })
            .collect();
        let benchmark = report
            .benchmark
            .history
            .iter()
            .map(|c| PricePoint {
                time: unix_time(c.date),
                value: c.adj_close,
            })
            .collect();

        Self {
            symbol: report.symbol.clone(),
            company_name: report.company_name.clone(),
            chart_title: report.chart_title(),
            benchmark_label: BENCHMARK_LABEL,
            start: report.start,
            end: report.end,
            metrics: report.metrics(),
            stock_return: report.stock_return,
            benchmark_return: report.benchmark_return,
            investment: report.investment,
            candles,
            benchmark,
        }
    }
}

fn router(provider: Arc<dyn MarketDataProvider>) -> Router {
    let state = WebState { provider };
    Router::new()
        .route("/", get(index))
        .route("/app.js", get(app_js))
        .route("/api/health", get(health))
        .route("/api/symbols", get(symbols))
        .route("/api/backtest", post(run_backtest))
        .route("/api/about", get(about))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_webui_server(port: u16, provider: Arc<dyn MarketDataProvider>) -> Result<()> {
    let app = router(provider);

    let addr = format!("0.0.0.0:{}", port);
    info!("WebUI listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn app_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], APP_JS)
}

async fn health(State(state): State<WebState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true, "provider": state.provider.name() }))
}

async fn symbols(
    State(state): State<WebState>,
) -> Result<Json<SymbolsResponse>, (StatusCode, Json<ApiError>)> {
    let symbols = state
        .provider
        .lookup_symbols()
        .await
        .map_err(|e| backtest_err(e.into()))?;
    Ok(Json(SymbolsResponse { symbols }))
}

async fn run_backtest(
    State(state): State<WebState>,
    payload: Result<Json<BacktestRequestBody>, JsonRejection>,
) -> Result<Json<BacktestResponse>, (StatusCode, Json<ApiError>)> {
    let Json(req) = payload.map_err(|r| backtest_err(BacktestError::InvalidInput(r.body_text())))?;
    let request = BacktestRequest::new(
        &req.symbol,
        req.amount.unwrap_or(config::DEFAULT_INVESTMENT),
        req.start.unwrap_or_else(config::default_start_date),
        req.end.unwrap_or_else(config::default_end_date),
    )
    .map_err(backtest_err)?;

    let report = backtest::run_backtest(state.provider.as_ref(), &request)
        .await
        .map_err(backtest_err)?;
    Ok(Json(BacktestResponse::from(&report)))
}

async fn about() -> Json<AboutResponse> {
    Json(AboutResponse {
        about: backtest::ABOUT,
        benchmark: BENCHMARK_SYMBOL,
        calculator_source: backtest::CALCULATOR_SOURCE,
    })
}

fn status_for(err: &BacktestError) -> StatusCode {
    match err {
        BacktestError::InvalidDateRange { .. } | BacktestError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        BacktestError::UnknownSymbol(_) => StatusCode::NOT_FOUND,
        BacktestError::DataUnavailable { .. } | BacktestError::DivisionByZero { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        BacktestError::Provider(_) => StatusCode::BAD_GATEWAY,
    }
}

fn backtest_err(err: BacktestError) -> (StatusCode, Json<ApiError>) {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!("Backtest failed: {}", err);
    }
    api_err(status, &err.to_string())
}

fn api_err(status: StatusCode, message: &str) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: message.to_string(),
        }),
    )
}
