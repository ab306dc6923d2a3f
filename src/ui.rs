use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};
use chrono::NaiveDate;
use crate::app::{App, AppState, FormField};
use crate::backtest::BacktestReport;
use crate::config::BENCHMARK_LABEL;
use crate::data::Candle;

pub fn render(f: &mut Frame, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, layout[0]);

    match app.state {
        AppState::Input => render_input(f, app, layout[1]),
        AppState::Loading => render_loading(f, "Fetching market data...", layout[1]),
        AppState::Dashboard => render_dashboard(f, app, layout[1]),
    }

    render_footer(f, app, layout[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(" Stock Backtest ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(
            match app.state {
                AppState::Input => "Input",
                AppState::Loading => "Loading",
                AppState::Dashboard => "Dashboard",
            },
            Style::default().fg(Color::Yellow),
        ),
    ];

    if let Some(report) = &app.report {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            report.company_name.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            format!("  {} .. {}", report.start, report.end),
            Style::default().fg(Color::Gray),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let hint = match app.state {
        AppState::Input => "Tab/Shift+Tab: next/prev field | Enter: submit | Esc: quit",
        AppState::Loading => "Esc: quit",
        AppState::Dashboard => "r: edit inputs | q/Esc: quit",
    };

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(" Controls: ", Style::default().fg(Color::Gray)),
        Span::styled(hint, Style::default().fg(Color::White)),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(footer, area);
}

fn render_input(f: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(60),
            Constraint::Percentage(20),
        ])
        .split(area);

    let mut constraints = vec![Constraint::Length(1)];
    constraints.extend(FormField::ALL.iter().map(|_| Constraint::Length(3)));
    constraints.push(Constraint::Length(7));
    constraints.push(Constraint::Min(0));

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(columns[1]);

    for (i, field) in FormField::ALL.iter().enumerate() {
        let focused = app.focus == *field;
        let border = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        };
        let mut text = app.field_value(*field).to_string();
        if focused {
            text.push('_');
        }
        let input = Paragraph::new(text)
            .style(Style::default().fg(Color::White))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(border)
                    .title(format!(" {} ", field.label())),
            );
        f.render_widget(input, rows[i + 1]);
    }

    let lower = rows[FormField::ALL.len() + 1];
    if let Some(err) = &app.error_msg {
        let error = Paragraph::new(err.as_str())
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).title(" Error "));
        f.render_widget(error, lower);
        return;
    }

    let lines: Vec<Line> = if app.symbols_loading {
        vec![Line::from(Span::styled("Loading symbol list...", Style::default().fg(Color::Gray)))]
    } else {
        app.suggestions(5)
            .into_iter()
            .map(|l| {
                Line::from(vec![
                    Span::styled(format!("{:<8}", l.symbol), Style::default().fg(Color::Cyan)),
                    Span::raw(l.name.clone()),
                ])
            })
            .collect()
    };
    let suggestions = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Matching symbols "));
    f.render_widget(suggestions, lower);
}

fn render_loading(f: &mut Frame, msg: &str, area: Rect) {
    let block = Block::default().borders(Borders::ALL);
    let text = Paragraph::new(msg)
        .alignment(Alignment::Center)
        .block(block);
    f.render_widget(text, area);
}

fn render_dashboard(f: &mut Frame, app: &App, area: Rect) {
    let Some(report) = &app.report else {
        render_loading(f, "No report", area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    render_metrics(f, report, chunks[0]);
    render_chart(f, report, chunks[1]);
}

fn render_metrics(f: &mut Frame, report: &BacktestReport, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    let signs = [
        report.investment.delta,
        report.stock_return,
        report.benchmark_return,
    ];
    for ((metric, col), sign) in report.metrics().into_iter().zip(cols.iter()).zip(signs) {
        let color = if sign < 0.0 { Color::Red } else { Color::Green };
        let mut spans = vec![Span::styled(
            metric.value,
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )];
        if let Some(delta) = metric.delta {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(delta, Style::default().fg(color)));
        } else {
            spans[0].style = spans[0].style.fg(color);
        }
        let card = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title(format!(" {} ", metric.label)));
        f.render_widget(card, *col);
    }
}

fn render_chart(f: &mut Frame, report: &BacktestReport, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Line::from(vec![
            Span::styled(
                format!(" {} ", report.chart_title()),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!(" ┃ {} ", report.company_name), Style::default().fg(Color::Green)),
            Span::styled(format!(" • {} ", BENCHMARK_LABEL), Style::default().fg(Color::Cyan)),
        ]));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(10), Constraint::Min(0)])
        .split(inner);

    let bars = bucket_candles(&report.stock.history, cols[1].width as usize);
    let overlay = overlay_for(&bars, &report.benchmark.history);
    let Some((y_min, y_max)) = value_range(&bars, &overlay) else {
        render_loading(f, "No data in range", inner);
        return;
    };

    let axis = Paragraph::new(axis_labels(y_min, y_max, cols[0].height as usize))
        .style(Style::default().fg(Color::Gray));
    f.render_widget(axis, cols[0]);

    f.render_widget(CandleChart::new(&bars, &overlay, y_min, y_max), cols[1]);
}

fn axis_labels(y_min: f64, y_max: f64, height: usize) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(""); height];
    if height == 0 {
        return lines;
    }
    lines[0] = Line::from(format!("{:>9.2}", y_max));
    if height > 2 {
        lines[height / 2] = Line::from(format!("{:>9.2}", (y_min + y_max) / 2.0));
    }
    if height > 1 {
        lines[height - 1] = Line::from(format!("{:>9.2}", y_min));
    }
    lines
}

/// One chart column: OHLC aggregated over consecutive trading days.
#[derive(Clone, Debug, PartialEq)]
pub struct Bar {
    pub last_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Aggregates `candles` into at most `width` columns.
pub fn bucket_candles(candles: &[Candle], width: usize) -> Vec<Bar> {
    if candles.is_empty() || width == 0 {
        return Vec::new();
    }
    let per_bucket = candles.len().div_ceil(width);
    candles
        .chunks(per_bucket)
        .filter_map(|chunk| {
            let first = chunk.first()?;
            let last = chunk.last()?;
            Some(Bar {
                last_date: last.date,
                open: first.open,
                high: chunk.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max),
                low: chunk.iter().map(|c| c.low).fold(f64::INFINITY, f64::min),
                close: last.close,
            })
        })
        .collect()
}

/// Benchmark adjusted close as of each bar's last date.
pub fn overlay_for(bars: &[Bar], benchmark: &[Candle]) -> Vec<Option<f64>> {
    let mut idx = 0;
    let mut current = None;
    bars.iter()
        .map(|bar| {
            while idx < benchmark.len() && benchmark[idx].date <= bar.last_date {
                current = Some(benchmark[idx].adj_close);
                idx += 1;
            }
            current
        })
        .collect()
}

fn value_range(bars: &[Bar], overlay: &[Option<f64>]) -> Option<(f64, f64)> {
    if bars.is_empty() {
        return None;
    }
    let lows = bars.iter().map(|b| b.low).chain(overlay.iter().flatten().copied());
    let highs = bars.iter().map(|b| b.high).chain(overlay.iter().flatten().copied());
    let min = lows.fold(f64::INFINITY, f64::min);
    let max = highs.fold(f64::NEG_INFINITY, f64::max);
    Some((min, max))
}

/// Candlesticks, one column per bar, with the benchmark drawn on the same
/// price axis.
pub struct CandleChart<'a> {
    bars: &'a [Bar],
    overlay: &'a [Option<f64>],
    y_min: f64,
    y_max: f64,
}

impl<'a> CandleChart<'a> {
    pub fn new(bars: &'a [Bar], overlay: &'a [Option<f64>], y_min: f64, y_max: f64) -> Self {
        Self { bars, overlay, y_min, y_max }
    }
}

impl Widget for CandleChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if self.bars.is_empty() || area.width == 0 || area.height == 0 {
            return;
        }

        let height = area.height as i32;
        let span = (self.y_max - self.y_min).max(1e-6);
        let y_min = self.y_min;
        let row_of = |price: f64| -> u16 {
            let ratio = ((price - y_min) / span).clamp(0.0, 1.0);
            let rel = (ratio * (height as f64 - 1.0)).round() as i32;
            (area.y as i32 + height - 1 - rel) as u16
        };

        for (i, bar) in self.bars.iter().enumerate().take(area.width as usize) {
            let x = area.x + i as u16;
            let color = if bar.close >= bar.open { Color::Green } else { Color::Red };

            let (wick_top, wick_bottom) = (row_of(bar.high), row_of(bar.low));
            for y in wick_top..=wick_bottom {
                if let Some(cell) = buf.cell_mut((x, y)) {
                    cell.set_symbol("│").set_fg(color);
                }
            }

            let (body_top, body_bottom) = (row_of(bar.open.max(bar.close)), row_of(bar.open.min(bar.close)));
            for y in body_top..=body_bottom {
                if let Some(cell) = buf.cell_mut((x, y)) {
                    cell.set_symbol("█").set_fg(color);
                }
            }

            if let Some(Some(value)) = self.overlay.get(i) {
                if let Some(cell) = buf.cell_mut((x, row_of(*value))) {
                    cell.set_symbol("•").set_fg(Color::Cyan);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{run_backtest, BacktestRequest};
    use crate::data::MockProvider;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn candle(day: u32, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open,
            high,
            low,
            close,
            adj_close: close,
            volume: 0.0,
        }
    }

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_bucket_candles_aggregates_ohlc() {
        let candles = vec![
            candle(2, 10.0, 12.0, 9.0, 11.0),
            candle(3, 11.0, 15.0, 10.5, 14.0),
            candle(4, 14.0, 14.5, 8.0, 9.0),
        ];
        let bars = bucket_candles(&candles, 2);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, 10.0);
        assert_eq!(bars[0].close, 14.0);
        assert_eq!(bars[0].high, 15.0);
        assert_eq!(bars[0].low, 9.0);
        assert_eq!(bars[1].last_date, candles[2].date);

        assert_eq!(bucket_candles(&candles, 10).len(), 3);
        assert!(bucket_candles(&candles, 0).is_empty());
    }

    #[test]
    fn test_overlay_uses_latest_benchmark_value() {
        let bars = bucket_candles(&[candle(2, 1.0, 1.0, 1.0, 1.0), candle(5, 1.0, 1.0, 1.0, 1.0)], 5);
        let bench = vec![candle(3, 0.0, 0.0, 0.0, 20.0), candle(4, 0.0, 0.0, 0.0, 21.0)];
        assert_eq!(overlay_for(&bars, &bench), vec![None, Some(21.0)]);
    }

    #[test]
    fn test_candle_chart_colors_by_direction() {
        let bars = bucket_candles(&[candle(2, 10.0, 12.0, 8.0, 11.0), candle(3, 11.0, 11.5, 8.5, 9.0)], 2);
        let overlay = vec![None, None];
        let area = Rect::new(0, 0, 2, 10);
        let mut buf = Buffer::empty(area);
        CandleChart::new(&bars, &overlay, 8.0, 12.0).render(area, &mut buf);

        let column = |x: u16| (0..10).filter(|&y| buf[(x, y)].symbol() != " ").count();
        assert_eq!(column(0), 10);
        assert!(column(1) > 0);
        assert!((0..10).any(|y| buf[(0, y)].fg == Color::Green));
        assert!((0..10).any(|y| buf[(1, y)].fg == Color::Red));
    }

    #[tokio::test]
    async fn test_render_input_and_dashboard() {
        let provider = Arc::new(MockProvider::default());
        let mut app = App::new(provider.clone());
        app.form.symbol = "AAPL".to_string();

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| render(f, &app)).unwrap();
        let text = screen(&terminal);
        assert!(text.contains("Ticker symbol"));
        assert!(text.contains("AAPL_"));

        let request = BacktestRequest::new(
            "AAPL",
            1000.0,
            NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 29).unwrap(),
        )
        .unwrap();
        let report = run_backtest(provider.as_ref(), &request).await.unwrap();
        let simulated = report.metrics()[0].value.clone();
        app.report = Some(Arc::new(report));
        app.state = AppState::Dashboard;

        terminal.draw(|f| render(f, &app)).unwrap();
        let text = screen(&terminal);
        assert!(text.contains("Apple Inc. - Common Stock"));
        assert!(text.contains("Simulated return"));
        assert!(text.contains(&simulated));
        assert!(text.contains("S&P 500 return"));
    }
}
