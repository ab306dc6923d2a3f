use eframe::egui;
use egui_plot::{BoxElem, BoxPlot, BoxSpread, Line, Plot, PlotPoints, PlotUi};
use crate::app::{App, AppState};
use crate::backtest::{self, BacktestReport};
use crate::config::BENCHMARK_LABEL;
use chrono::{NaiveDate, NaiveTime, TimeZone};
use std::collections::HashMap;

// ──────────────────────────────────────────────────────────────────────────────
// Color Palette
// ──────────────────────────────────────────────────────────────────────────────

const ACCENT_BLUE: egui::Color32 = egui::Color32::from_rgb(59, 130, 246);
const ACCENT_GREEN: egui::Color32 = egui::Color32::from_rgb(34, 197, 94);
const ACCENT_RED: egui::Color32 = egui::Color32::from_rgb(239, 68, 68);
const ACCENT_CYAN: egui::Color32 = egui::Color32::from_rgb(34, 211, 238);
const ACCENT_YELLOW: egui::Color32 = egui::Color32::from_rgb(250, 204, 21);

const BG_DARK: egui::Color32 = egui::Color32::from_rgb(15, 15, 20);
const BG_CARD: egui::Color32 = egui::Color32::from_rgb(24, 24, 32);
const BG_ELEVATED: egui::Color32 = egui::Color32::from_rgb(32, 32, 44);
const TEXT_PRIMARY: egui::Color32 = egui::Color32::from_rgb(226, 232, 240);
const TEXT_SECONDARY: egui::Color32 = egui::Color32::from_rgb(148, 163, 184);
const BORDER_SUBTLE: egui::Color32 = egui::Color32::from_rgb(51, 51, 68);

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(PartialEq, Clone, Copy)]
enum GuiTab {
    Chart,
    Prices,
    About,
}

pub struct GuiApp {
    app: App,
    active_tab: GuiTab,
}

impl GuiApp {
    pub fn new(mut app: App) -> Self {
        app.load_symbols();
        Self {
            app,
            active_tab: GuiTab::Chart,
        }
    }

    fn apply_theme(ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();

        style.visuals.window_rounding = egui::Rounding::same(8.0);
        style.visuals.widgets.noninteractive.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.inactive.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.active.rounding = egui::Rounding::same(6.0);
        style.visuals.widgets.hovered.rounding = egui::Rounding::same(6.0);

        style.visuals.dark_mode = true;
        style.visuals.panel_fill = BG_DARK;
        style.visuals.window_fill = BG_CARD;
        style.visuals.faint_bg_color = BG_ELEVATED;

        style.visuals.widgets.noninteractive.bg_fill = BG_CARD;
        style.visuals.widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, TEXT_SECONDARY);
        style.visuals.widgets.inactive.bg_fill = BG_ELEVATED;
        style.visuals.widgets.inactive.fg_stroke = egui::Stroke::new(1.0, TEXT_PRIMARY);
        style.visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(45, 45, 60);
        style.visuals.widgets.hovered.fg_stroke = egui::Stroke::new(1.0, egui::Color32::WHITE);
        style.visuals.widgets.active.bg_fill = ACCENT_BLUE;
        style.visuals.widgets.active.fg_stroke = egui::Stroke::new(1.0, egui::Color32::WHITE);

        style.visuals.selection.bg_fill = ACCENT_BLUE.linear_multiply(0.4);
        style.visuals.selection.stroke = egui::Stroke::new(1.0, ACCENT_BLUE);

        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        ctx.set_style(style);
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        Self::apply_theme(ctx);
        self.app.tick();
        if self.app.state == AppState::Loading || self.app.symbols_loading {
            ctx.request_repaint();
        }

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.add_space(8.0);
                ui.label(egui::RichText::new("Stock Backtest")
                    .size(18.0)
                    .strong()
                    .color(ACCENT_BLUE));
                ui.add_space(4.0);
                ui.label(egui::RichText::new(format!("vs. {}", BENCHMARK_LABEL))
                    .size(11.0)
                    .color(TEXT_SECONDARY));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.add_space(8.0);
                    for (tab, label) in [
                        (GuiTab::About, "About"),
                        (GuiTab::Prices, "Price data"),
                        (GuiTab::Chart, "Chart"),
                    ] {
                        let btn = ui.selectable_label(
                            self.active_tab == tab,
                            egui::RichText::new(label).size(13.0),
                        );
                        if btn.clicked() {
                            self.active_tab = tab;
                        }
                    }
                });
            });
            ui.add_space(4.0);
        });

        egui::SidePanel::left("form_panel")
            .resizable(false)
            .exact_width(280.0)
            .show(ctx, |ui| self.render_form(ui));

        egui::CentralPanel::default().show(ctx, |ui| {
            match self.active_tab {
                GuiTab::Chart => self.render_chart_tab(ui),
                GuiTab::Prices => self.render_prices_tab(ui),
                GuiTab::About => render_about_tab(ui),
            }
        });
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Form
// ──────────────────────────────────────────────────────────────────────────────

impl GuiApp {
    fn render_form(&mut self, ui: &mut egui::Ui) {
        ui.add_space(12.0);
        section_header(ui, "Select a ticker symbol");
        let symbol_response = ui.add(
            egui::TextEdit::singleline(&mut self.app.form.symbol)
                .desired_width(f32::INFINITY)
                .hint_text("e.g. AAPL, MSFT, NVDA..."),
        );
        if symbol_response.changed() {
            self.app.form.symbol = self.app.form.symbol.to_uppercase();
        }

        if self.app.symbols_loading {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(egui::RichText::new("Loading symbol list...").size(11.0).color(TEXT_SECONDARY));
            });
        } else {
            let matches: Vec<(String, String)> = self
                .app
                .suggestions(50)
                .into_iter()
                .filter(|l| l.symbol != self.app.form.symbol)
                .map(|l| (l.symbol.clone(), l.name.clone()))
                .collect();
            if !matches.is_empty() {
                egui::ScrollArea::vertical()
                    .max_height(160.0)
                    .show(ui, |ui| {
                        for (symbol, name) in matches {
                            let label = egui::RichText::new(format!("{:<6} {}", symbol, name)).size(11.0);
                            if ui.selectable_label(false, label).clicked() {
                                self.app.form.symbol = symbol;
                            }
                        }
                    });
            }
        }

        ui.add_space(8.0);
        section_header(ui, "Simulated investment amount");
        ui.add(egui::TextEdit::singleline(&mut self.app.form.amount).desired_width(f32::INFINITY));

        ui.add_space(8.0);
        ui.columns(2, |cols| {
            section_header(&mut cols[0], "Start date");
            cols[0].add(egui::TextEdit::singleline(&mut self.app.form.start).hint_text("YYYY-MM-DD"));
            section_header(&mut cols[1], "End date");
            cols[1].add(egui::TextEdit::singleline(&mut self.app.form.end).hint_text("YYYY-MM-DD"));
        });

        ui.add_space(12.0);
        let loading = self.app.state == AppState::Loading;
        let btn = ui.add_enabled(
            !loading,
            egui::Button::new(
                egui::RichText::new(if loading { "Fetching..." } else { "Submit" })
                    .size(15.0)
                    .strong()
                    .color(egui::Color32::WHITE),
            )
            .fill(ACCENT_BLUE)
            .rounding(egui::Rounding::same(8.0))
            .min_size(egui::vec2(ui.available_width(), 36.0)),
        );
        if btn.clicked() {
            self.app.trigger_fetch();
            self.active_tab = GuiTab::Chart;
        }

        if let Some(err) = &self.app.error_msg {
            ui.add_space(12.0);
            egui::Frame::none()
                .fill(egui::Color32::from_rgba_premultiplied(239, 68, 68, 25))
                .rounding(egui::Rounding::same(6.0))
                .inner_margin(egui::Margin::same(8.0))
                .show(ui, |ui| {
                    ui.label(egui::RichText::new(format!("Error: {}", err))
                        .color(ACCENT_RED)
                        .size(12.0));
                });
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Tabs
// ──────────────────────────────────────────────────────────────────────────────

impl GuiApp {
    fn render_chart_tab(&self, ui: &mut egui::Ui) {
        match (&self.app.state, &self.app.report) {
            (AppState::Loading, _) => render_centered_status(ui, "Fetching Market Data..."),
            (_, Some(report)) => render_report(ui, report),
            _ => render_centered_status(ui, "Choose a ticker and press Submit"),
        }
    }

    fn render_prices_tab(&self, ui: &mut egui::Ui) {
        let Some(report) = &self.app.report else {
            render_centered_status(ui, "No data yet");
            return;
        };

        let benchmark: HashMap<NaiveDate, f64> = report
            .benchmark
            .history
            .iter()
            .map(|c| (c.date, c.adj_close))
            .collect();

        egui::ScrollArea::vertical().show(ui, |ui| {
            egui::Grid::new("price_table")
                .striped(true)
                .num_columns(7)
                .spacing([16.0, 4.0])
                .show(ui, |ui| {
                    for header in ["Date", "Open", "High", "Low", "Close", "Adj Close"] {
                        ui.label(egui::RichText::new(header).strong().color(TEXT_PRIMARY));
                    }
                    ui.label(egui::RichText::new(format!("{} Adj Close", BENCHMARK_LABEL))
                        .strong()
                        .color(ACCENT_CYAN));
                    ui.end_row();

                    for c in &report.stock.history {
                        ui.label(c.date.to_string());
                        for v in [c.open, c.high, c.low, c.close, c.adj_close] {
                            ui.label(format!("{:.2}", v));
                        }
                        match benchmark.get(&c.date) {
                            Some(v) => ui.label(format!("{:.2}", v)),
                            None => ui.label("-"),
                        };
                        ui.end_row();
                    }
                });
        });
    }
}

fn render_about_tab(ui: &mut egui::Ui) {
    egui::ScrollArea::vertical().show(ui, |ui| {
        section_header(ui, "About");
        ui.label(egui::RichText::new(backtest::ABOUT).size(13.0).color(TEXT_PRIMARY));
        ui.add_space(12.0);
        section_header(ui, "Return calculator source");
        let mut source = backtest::CALCULATOR_SOURCE;
        ui.add(
            egui::TextEdit::multiline(&mut source)
                .code_editor()
                .desired_width(f32::INFINITY),
        );
    });
}

fn render_report(ui: &mut egui::Ui, report: &BacktestReport) {
    ui.label(egui::RichText::new(&report.company_name)
        .size(22.0)
        .strong()
        .color(TEXT_PRIMARY));
    ui.add_space(6.0);

    let signs = [report.investment.delta, report.stock_return, report.benchmark_return];
    ui.horizontal(|ui| {
        for (metric, sign) in report.metrics().into_iter().zip(signs) {
            let color = if sign < 0.0 { ACCENT_RED } else { ACCENT_GREEN };
            summary_card(ui, &metric.label, &metric.value, metric.delta.as_deref(), color);
        }
    });

    ui.add_space(8.0);
    egui::Frame::none()
        .fill(ACCENT_BLUE.linear_multiply(0.15))
        .rounding(egui::Rounding::same(6.0))
        .inner_margin(egui::Margin::symmetric(12.0, 6.0))
        .show(ui, |ui| {
            ui.label(egui::RichText::new(report.chart_title()).color(ACCENT_BLUE));
        });
    ui.add_space(6.0);

    egui::Frame::none()
        .fill(BG_CARD)
        .rounding(egui::Rounding::same(8.0))
        .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
        .inner_margin(egui::Margin::same(8.0))
        .show(ui, |ui| {
            let plot = Plot::new("backtest_chart")
                .legend(egui_plot::Legend::default().position(egui_plot::Corner::LeftTop))
                .x_axis_formatter(|x, _range| {
                    chrono::Utc.timestamp_opt(x.value as i64, 0)
                        .map(|dt| dt.format("%Y-%m-%d").to_string())
                        .single()
                        .unwrap_or_default()
                })
                .label_formatter(|name, value| {
                    let date = chrono::Utc.timestamp_opt(value.x as i64, 0)
                        .map(|dt| dt.format("%Y-%m-%d").to_string())
                        .single()
                        .unwrap_or_default();
                    format!("{}\nDate: {}\nPrice: ${:.2}", name, date, value.y)
                })
                .allow_drag(true)
                .allow_zoom(true);

            plot.show(ui, |plot_ui| draw_chart_data(plot_ui, report));
        });
}

fn date_to_x(date: NaiveDate) -> f64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp() as f64
}

fn draw_chart_data(plot_ui: &mut PlotUi, report: &BacktestReport) {
    let candles: Vec<BoxElem> = report
        .stock
        .history
        .iter()
        .map(|c| {
            let color = if c.close >= c.open { ACCENT_GREEN } else { ACCENT_RED };
            let body_low = c.open.min(c.close);
            let body_high = c.open.max(c.close);
            BoxElem::new(
                date_to_x(c.date),
                BoxSpread::new(c.low, body_low, (body_low + body_high) / 2.0, body_high, c.high),
            )
            .box_width(SECONDS_PER_DAY * 0.7)
            .whisker_width(0.0)
            .fill(color)
            .stroke(egui::Stroke::new(1.0, color))
        })
        .collect();
    plot_ui.box_plot(BoxPlot::new(candles).name(&report.company_name));

    let benchmark: PlotPoints = report
        .benchmark
        .history
        .iter()
        .map(|c| [date_to_x(c.date), c.adj_close])
        .collect();
    plot_ui.line(
        Line::new(benchmark)
            .name(BENCHMARK_LABEL)
            .color(ACCENT_YELLOW)
            .width(1.6),
    );
}

fn render_centered_status(ui: &mut egui::Ui, message: &str) {
    let available = ui.available_size();
    ui.vertical_centered(|ui| {
        ui.add_space(available.y * 0.3);
        ui.label(egui::RichText::new(message).size(16.0).color(TEXT_PRIMARY));
        ui.add_space(12.0);
        ui.spinner();
    });
}

// ──────────────────────────────────────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────────────────────────────────────

fn section_header(ui: &mut egui::Ui, text: &str) {
    ui.label(egui::RichText::new(text)
        .size(13.0)
        .strong()
        .color(TEXT_PRIMARY));
    ui.add_space(4.0);
}

fn summary_card(ui: &mut egui::Ui, label: &str, value: &str, delta: Option<&str>, color: egui::Color32) {
    egui::Frame::none()
        .fill(BG_CARD)
        .rounding(egui::Rounding::same(8.0))
        .stroke(egui::Stroke::new(1.0, BORDER_SUBTLE))
        .inner_margin(egui::Margin::same(12.0))
        .show(ui, |ui| {
            ui.set_min_width(160.0);
            ui.vertical_centered(|ui| {
                ui.label(egui::RichText::new(label)
                    .size(10.0)
                    .color(TEXT_SECONDARY));
                match delta {
                    Some(delta) => {
                        ui.label(egui::RichText::new(value)
                            .size(20.0)
                            .strong()
                            .color(TEXT_PRIMARY));
                        ui.label(egui::RichText::new(delta).size(12.0).color(color));
                    }
                    None => {
                        ui.label(egui::RichText::new(value)
                            .size(20.0)
                            .strong()
                            .color(color));
                    }
                }
            });
        });
}
