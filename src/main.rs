mod app;
mod backtest;
mod config;
mod data;
mod error;
mod gui;
mod nasdaq;
mod returns;
mod tui;
mod ui;
mod webui;
mod yahoo;

use app::App;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use config::ProviderKind;
use std::io;
use std::process::ExitCode;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, ValueEnum)]
enum GuiRendererChoice {
    Auto,
    Wgpu,
    Glow,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Backtest-TUI: how would an investment in a stock have done against the S&P 500?",
    after_help = "EXAMPLES:
    # Interactive terminal dashboard
    cargo run --release

    # One-shot text report
    cargo run --release -- --report AAPL --start 2020-01-02 --end 2023-12-29 --amount 5000

    # Web dashboard on port 3000, offline data
    cargo run --release -- --webui --webui-port 3000 --provider mock

    # Launch GUI
    cargo run --release -- --gui"
)]
struct Args {
    /// Launch in GUI mode
    #[arg(long)]
    gui: bool,

    /// Launch in WebUI mode
    #[arg(long)]
    webui: bool,

    /// WebUI server port
    #[arg(long, default_value_t = config::DEFAULT_WEBUI_PORT)]
    webui_port: u16,

    /// GUI renderer backend (auto|wgpu|glow). Useful for RDP compatibility.
    #[arg(long, value_enum, default_value_t = GuiRendererChoice::Wgpu)]
    gui_renderer: GuiRendererChoice,

    /// Enable GUI safe mode for remote desktop (disables vsync/MSAA and hardware acceleration).
    #[arg(long)]
    gui_safe_mode: bool,

    /// Print a backtest report for SYMBOL and exit
    #[arg(long, value_name = "SYMBOL")]
    report: Option<String>,

    /// First day of the backtest (YYYY-MM-DD, default: 2017-12-22)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day of the backtest (YYYY-MM-DD, default: today)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Simulated investment amount in dollars
    #[arg(long, default_value_t = config::DEFAULT_INVESTMENT)]
    amount: f64,

    /// Market data provider; overrides BACKTEST_DATA_PROVIDER
    #[arg(long, value_enum)]
    provider: Option<ProviderKind>,
}

#[tokio::main]
async fn main() -> io::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("backtest_tui=info,wgpu_core=error,wgpu_hal=error")
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();

    let provider_kind = args.provider.unwrap_or_else(config::configured_provider_kind);
    let provider = match data::build_provider(provider_kind) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to set up market data provider: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    if let Some(symbol) = &args.report {
        let start = args.start.unwrap_or_else(config::default_start_date);
        let end = args.end.unwrap_or_else(config::default_end_date);
        let result = match backtest::BacktestRequest::new(symbol, args.amount, start, end) {
            Ok(request) => backtest::run_backtest(provider.as_ref(), &request).await,
            Err(e) => Err(e),
        };
        return match result {
            Ok(report) => {
                print!("{}", backtest::render_text_report(&report));
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                error!("Backtest failed: {}", e);
                Ok(ExitCode::FAILURE)
            }
        };
    }

    if args.gui {
        let mut options = eframe::NativeOptions::default();
        options.renderer = match args.gui_renderer {
            GuiRendererChoice::Auto => eframe::Renderer::Wgpu,
            GuiRendererChoice::Wgpu => eframe::Renderer::Wgpu,
            GuiRendererChoice::Glow => eframe::Renderer::Glow,
        };

        if args.gui_safe_mode {
            options.vsync = false;
            options.multisampling = 0;
            options.depth_buffer = 0;
            options.stencil_buffer = 0;
            options.hardware_acceleration = eframe::HardwareAcceleration::Off;
        }

        info!(
            "Launching GUI with renderer: {:?}, safe_mode={}",
            args.gui_renderer,
            args.gui_safe_mode
        );
        eframe::run_native(
            "Stock Backtest",
            options,
            Box::new(move |_cc| Ok(Box::new(gui::GuiApp::new(App::new(provider))))),
        ).map_err(|e| io::Error::other(e.to_string()))?;
        return Ok(ExitCode::SUCCESS);
    }

    if args.webui {
        return match webui::run_webui_server(args.webui_port, provider).await {
            Ok(_) => {
                info!("WebUI exited.");
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                error!("WebUI failed: {}", e);
                Ok(ExitCode::FAILURE)
            }
        };
    }

    let mut terminal = tui::init()?;
    let mut app = App::new(provider);
    let res = app.run(&mut terminal).await;

    tui::restore()?;

    if let Err(e) = res {
        error!("Error: {:?}", e);
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
