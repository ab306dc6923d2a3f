use crate::backtest::{self, BacktestForm, BacktestReport};
use crate::data::{MarketDataProvider, SymbolListing};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppState {
    Input,
    Loading,
    Dashboard,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormField {
    Symbol,
    Amount,
    Start,
    End,
}

impl FormField {
    pub const ALL: [FormField; 4] = [Self::Symbol, Self::Amount, Self::Start, Self::End];

    pub fn label(self) -> &'static str {
        match self {
            Self::Symbol => "Ticker symbol",
            Self::Amount => "Simulated investment amount",
            Self::Start => "Start date",
            Self::End => "End date",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Symbol => Self::Amount,
            Self::Amount => Self::Start,
            Self::Start => Self::End,
            Self::End => Self::Symbol,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Symbol => Self::End,
            Self::Amount => Self::Symbol,
            Self::Start => Self::Amount,
            Self::End => Self::Start,
        }
    }
}

/// Front-end state shared by the terminal UI and the desktop GUI.
pub struct App {
    pub should_quit: bool,
    pub state: AppState,
    pub form: BacktestForm,
    pub focus: FormField,
    pub symbols: Vec<SymbolListing>,
    pub symbols_loading: bool,
    pub report: Option<Arc<BacktestReport>>,
    pub error_msg: Option<String>,
    provider: Arc<dyn MarketDataProvider>,
    report_rx: Option<mpsc::Receiver<Result<BacktestReport, String>>>,
    symbols_rx: Option<mpsc::Receiver<Result<Vec<SymbolListing>, String>>>,
}

impl App {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            should_quit: false,
            state: AppState::Input,
            form: BacktestForm::default(),
            focus: FormField::Symbol,
            symbols: Vec::new(),
            symbols_loading: false,
            report: None,
            error_msg: None,
            provider,
            report_rx: None,
            symbols_rx: None,
        }
    }

    pub fn field_value(&self, field: FormField) -> &str {
        match field {
            FormField::Symbol => &self.form.symbol,
            FormField::Amount => &self.form.amount,
            FormField::Start => &self.form.start,
            FormField::End => &self.form.end,
        }
    }

    fn field_mut(&mut self, field: FormField) -> &mut String {
        match field {
            FormField::Symbol => &mut self.form.symbol,
            FormField::Amount => &mut self.form.amount,
            FormField::Start => &mut self.form.start,
            FormField::End => &mut self.form.end,
        }
    }

    /// Fetches the symbol directory in the background; results arrive via `tick`.
    pub fn load_symbols(&mut self) {
        let (tx, rx) = mpsc::channel(1);
        let provider = self.provider.clone();
        self.symbols_loading = true;
        self.symbols_rx = Some(rx);
        tokio::spawn(async move {
            let res = provider.lookup_symbols().await.map_err(|e| e.to_string());
            let _ = tx.send(res).await;
        });
    }

    /// Validates the form and starts a backtest run in the background.
    pub fn trigger_fetch(&mut self) {
        if self.state == AppState::Loading {
            return;
        }
        let request = match self.form.to_request() {
            Ok(req) => req,
            Err(e) => {
                self.error_msg = Some(e.to_string());
                return;
            }
        };
        self.form.symbol = request.symbol.clone();

        let (tx, rx) = mpsc::channel(1);
        let provider = self.provider.clone();
        self.report_rx = Some(rx);
        self.state = AppState::Loading;
        self.error_msg = None;
        tokio::spawn(async move {
            let res = backtest::run_backtest(provider.as_ref(), &request)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(res).await;
        });
    }

    /// Drains finished background work.
    pub fn tick(&mut self) {
        if let Some(rx) = &mut self.symbols_rx {
            if let Ok(res) = rx.try_recv() {
                match res {
                    Ok(symbols) => self.symbols = symbols,
                    Err(e) => {
                        warn!("Symbol directory unavailable: {}", e);
                        self.error_msg = Some(format!("Symbol list unavailable: {}", e));
                    }
                }
                self.symbols_loading = false;
                self.symbols_rx = None;
            }
        }

        if let Some(rx) = &mut self.report_rx {
            if let Ok(res) = rx.try_recv() {
                match res {
                    Ok(report) => {
                        self.report = Some(Arc::new(report));
                        self.state = AppState::Dashboard;
                    }
                    Err(e) => {
                        self.error_msg = Some(e);
                        self.state = AppState::Input;
                    }
                }
                self.report_rx = None;
            }
        }
    }

    /// Directory entries whose symbol starts with the typed ticker.
    pub fn suggestions(&self, limit: usize) -> Vec<&SymbolListing> {
        let typed = self.form.symbol.trim().to_uppercase();
        if typed.is_empty() {
            return Vec::new();
        }
        self.symbols
            .iter()
            .filter(|l| l.symbol.starts_with(&typed))
            .take(limit)
            .collect()
    }

    /// Back to the form; the previous inputs are kept for editing.
    pub fn reset(&mut self) {
        self.state = AppState::Input;
        self.report = None;
        self.error_msg = None;
        self.focus = FormField::Symbol;
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match self.state {
            AppState::Input => match key.code {
                KeyCode::Char(c) => {
                    let c = if self.focus == FormField::Symbol { c.to_ascii_uppercase() } else { c };
                    self.field_mut(self.focus).push(c);
                }
                KeyCode::Backspace => {
                    self.field_mut(self.focus).pop();
                }
                KeyCode::Tab | KeyCode::Down => self.focus = self.focus.next(),
                KeyCode::BackTab | KeyCode::Up => self.focus = self.focus.prev(),
                KeyCode::Enter => self.trigger_fetch(),
                KeyCode::Esc => self.should_quit = true,
                _ => {}
            },
            AppState::Loading => {
                if key.code == KeyCode::Esc {
                    self.should_quit = true;
                }
            }
            AppState::Dashboard => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                KeyCode::Char('r') => self.reset(),
                _ => {}
            },
        }
    }

    pub async fn run(&mut self, terminal: &mut crate::tui::Tui) -> io::Result<()> {
        self.load_symbols();
        while !self.should_quit {
            self.tick();
            terminal.draw(|f| crate::ui::render(f, self))?;

            if event::poll(std::time::Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    self.handle_key(key);
                }
            }
            // Let spawned fetches make progress on the runtime.
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MockProvider;
    use crossterm::event::KeyModifiers;

    fn press(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    async fn wait_until_idle(app: &mut App) {
        for _ in 0..200 {
            app.tick();
            if app.state != AppState::Loading && !app.symbols_loading {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("background work did not finish");
    }

    #[test]
    fn test_focus_cycles_through_fields() {
        let mut focus = FormField::Symbol;
        for _ in 0..FormField::ALL.len() {
            focus = focus.next();
        }
        assert_eq!(focus, FormField::Symbol);
        assert_eq!(FormField::Symbol.prev(), FormField::End);
    }

    #[tokio::test]
    async fn test_typing_edits_focused_field() {
        let mut app = App::new(Arc::new(MockProvider::default()));
        type_text(&mut app, "aapl");
        assert_eq!(app.form.symbol, "AAPL");

        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, "50");
        assert_eq!(app.form.amount, "1050");

        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.focus, FormField::Symbol);
        press(&mut app, KeyCode::Esc);
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_invalid_form_stays_on_input() {
        let mut app = App::new(Arc::new(MockProvider::default()));
        type_text(&mut app, "AAPL");
        app.form.start = "2024-06-01".to_string();
        app.form.end = "2024-01-01".to_string();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state, AppState::Input);
        assert!(app.error_msg.as_deref().unwrap().contains("invalid date range"));
    }

    #[tokio::test]
    async fn test_submit_reaches_dashboard() {
        let mut app = App::new(Arc::new(MockProvider::default()));
        app.load_symbols();
        wait_until_idle(&mut app).await;
        assert!(!app.symbols.is_empty());

        type_text(&mut app, "ms");
        assert_eq!(app.suggestions(5)[0].symbol, "MSFT");
        type_text(&mut app, "ft");
        app.form.start = "2023-01-02".to_string();
        app.form.end = "2023-03-31".to_string();
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state, AppState::Loading);

        wait_until_idle(&mut app).await;
        assert_eq!(app.state, AppState::Dashboard);
        let report = app.report.clone().unwrap();
        assert_eq!(report.symbol, "MSFT");

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(app.state, AppState::Input);
        assert_eq!(app.form.symbol, "MSFT");
        assert!(app.report.is_none());
    }

    #[tokio::test]
    async fn test_unknown_symbol_returns_to_form() {
        let mut app = App::new(Arc::new(MockProvider::default()));
        type_text(&mut app, "ZZZZ");
        press(&mut app, KeyCode::Enter);
        wait_until_idle(&mut app).await;
        assert_eq!(app.state, AppState::Input);
        assert_eq!(app.error_msg.as_deref(), Some("unknown symbol: ZZZZ"));
    }
}
