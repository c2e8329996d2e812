/// Main TUI application

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::core::haproxy::parse_weight;
use crate::core::{
    ControlAction, ControlError, HaproxyControl, HttpStatusSource, PollEvent, Poller, StatusSource,
};
use crate::screens::{build_charts, build_panels, Dashboard, DashboardState, DelayChart, Dialog, NodePanel};
use crate::utils::AppConfig;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Overview,
    Charts,
}

impl View {
    pub fn title(&self) -> &'static str {
        match self {
            View::Overview => "Overview",
            View::Charts => "Charts",
        }
    }

    pub fn all() -> &'static [View] {
        &[View::Overview, View::Charts]
    }

    fn next(self) -> View {
        match self {
            View::Overview => View::Charts,
            View::Charts => View::Overview,
        }
    }
}

type ControlResult = (ControlAction, Result<String, ControlError>);

pub struct App {
    dashboard: Dashboard,
    config: AppConfig,
    poller: Poller,
    control: Arc<HaproxyControl>,
    current_view: View,
    selected_index: usize,
    should_quit: bool,
    last_tick: Instant,
    status_message: Option<String>,
    show_help: bool,
    // HAProxy control
    pending_action: Option<ControlAction>,
    weight_input: Option<String>,
    control_busy: bool,
    control_tx: UnboundedSender<ControlResult>,
    control_rx: UnboundedReceiver<ControlResult>,
    // Rendered models, rebuilt after every poll
    panels: Vec<NodePanel>,
    charts: Vec<DelayChart>,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let timeout = config.request_timeout()?;
        let source = Arc::new(HttpStatusSource::new(&config.base_url, timeout)?);
        Self::with_source(config, source)
    }

    pub fn with_source(config: AppConfig, source: Arc<dyn StatusSource>) -> Result<Self> {
        let timeout = config.request_timeout()?;
        let control = Arc::new(HaproxyControl::new(&config.base_url, timeout)?);
        let poller = Poller::new(source, config.poll_interval_secs, config.max_points);
        let (control_tx, control_rx) = unbounded_channel();

        Ok(Self {
            dashboard: Dashboard::new(),
            config,
            poller,
            control,
            current_view: View::Overview,
            selected_index: 0,
            should_quit: false,
            last_tick: Instant::now(),
            status_message: None,
            show_help: false,
            pending_action: None,
            weight_input: None,
            control_busy: false,
            control_tx,
            control_rx,
            panels: Vec::new(),
            charts: Vec::new(),
        })
    }

    fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
    }

    fn clear_status(&mut self) {
        self.status_message = None;
    }

    pub async fn run(&mut self) -> Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        info!(url = %self.config.base_url, "dashboard started");

        // First poll right away, then every period
        self.poller.start();
        self.poller.refresh();
        self.last_tick = Instant::now();

        let result = self.run_loop(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    async fn run_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> Result<()> {
        loop {
            // Finished status poll (non-blocking)
            while let Some(event) = self.poller.try_complete() {
                self.on_poll_event(event);
            }

            // Finished HAProxy commands (non-blocking)
            while let Ok((action, result)) = self.control_rx.try_recv() {
                self.on_control_result(action, result);
            }

            if self.last_tick.elapsed() >= TICK {
                self.last_tick = Instant::now();
                self.poller.on_second();
            }

            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key_event) = event::read()? {
                    if key_event.kind == KeyEventKind::Press {
                        self.handle_key(key_event.code).await;
                    }
                }
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    /// History is already updated when this runs; rebuild what gets drawn
    fn on_poll_event(&mut self, event: PollEvent) {
        debug!(?event, "poll finished");
        // The fresh countdown gets a full first second
        self.last_tick = Instant::now();
        self.rebuild_views();
    }

    fn rebuild_views(&mut self) {
        if let Some(snapshot) = self.poller.snapshot() {
            self.panels = build_panels(snapshot, &self.config);
        }
        self.charts = build_charts(self.poller.store(), self.poller.snapshot());

        let count = self.selectable_count();
        if count == 0 {
            self.selected_index = 0;
        } else if self.selected_index >= count {
            self.selected_index = count - 1;
        }
    }

    fn on_control_result(&mut self, action: ControlAction, result: Result<String, ControlError>) {
        self.control_busy = false;
        match result {
            Ok(message) => {
                self.set_status(format!("✓ {}", message));
                // Show the new HAProxy state without waiting for the countdown
                self.poller.refresh();
            }
            Err(e) => {
                warn!(action = %action, error = %e, "haproxy control failed");
                self.set_status(format!("✗ {} failed: {}", action, e));
            }
        }
    }

    fn selectable_count(&self) -> usize {
        match self.current_view {
            View::Overview => self.panels.len(),
            View::Charts => self.charts.len(),
        }
    }

    fn selected_host(&self) -> Option<String> {
        match self.current_view {
            View::Overview => self.panels.get(self.selected_index).map(|p| p.host.clone()),
            View::Charts => self.charts.get(self.selected_index).map(|c| c.host.clone()),
        }
    }

    async fn handle_key(&mut self, key: KeyCode) {
        // Dialogs take every key while open
        if self.pending_action.is_some() {
            self.handle_confirm_key(key);
            return;
        }
        if self.weight_input.is_some() {
            self.handle_weight_key(key);
            return;
        }

        if self.show_help {
            if matches!(key, KeyCode::Char('?') | KeyCode::F(1) | KeyCode::Esc | KeyCode::Char('q')) {
                self.show_help = false;
            }
            return;
        }

        self.clear_status();

        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('?') | KeyCode::F(1) => {
                self.show_help = true;
            }
            KeyCode::Char('r') => {
                if self.poller.refresh() {
                    self.set_status("Refreshing...".to_string());
                } else {
                    self.set_status("Refresh already in progress".to_string());
                }
            }
            KeyCode::Tab => {
                self.current_view = self.current_view.next();
                self.selected_index = self
                    .selected_index
                    .min(self.selectable_count().saturating_sub(1));
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_index = self.selected_index.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected_index + 1 < self.selectable_count() {
                    self.selected_index += 1;
                }
            }
            KeyCode::Char('e') => {
                if let Some(host) = self.selected_host() {
                    self.pending_action = Some(ControlAction::Enable { host });
                }
            }
            KeyCode::Char('d') => {
                if let Some(host) = self.selected_host() {
                    self.pending_action = Some(ControlAction::Disable { host });
                }
            }
            KeyCode::Char('w') => {
                if self.selected_host().is_some() {
                    self.weight_input = Some(String::new());
                }
            }
            KeyCode::Char('R') => {
                self.pending_action = Some(ControlAction::Restart);
            }
            _ => {}
        }
    }

    fn handle_confirm_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                if let Some(action) = self.pending_action.take() {
                    self.execute_action(action);
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.pending_action = None;
                self.set_status("Cancelled".to_string());
            }
            _ => {}
        }
    }

    fn handle_weight_key(&mut self, key: KeyCode) {
        let Some(input) = self.weight_input.as_mut() else {
            return;
        };

        match key {
            KeyCode::Char(c) if c.is_ascii_digit() => {
                if input.len() < 3 {
                    input.push(c);
                }
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Enter => {
                let parsed = parse_weight(input);
                match (parsed, self.selected_host()) {
                    (Ok(weight), Some(host)) => {
                        self.weight_input = None;
                        self.execute_action(ControlAction::SetWeight { host, weight });
                    }
                    (Err(e), _) => self.set_status(format!("✗ {}", e)),
                    (Ok(_), None) => self.weight_input = None,
                }
            }
            KeyCode::Esc => {
                self.weight_input = None;
                self.set_status("Cancelled".to_string());
            }
            _ => {}
        }
    }

    /// Send a HAProxy command in the background; one at a time
    fn execute_action(&mut self, action: ControlAction) {
        if self.control_busy {
            self.set_status("Another HAProxy command is still running".to_string());
            return;
        }

        self.control_busy = true;
        self.set_status(format!("{}...", action));

        let control = Arc::clone(&self.control);
        let tx = self.control_tx.clone();
        tokio::spawn(async move {
            let result = control.execute(&action).await;
            let _ = tx.send((action, result));
        });
    }

    fn render(&self, frame: &mut ratatui::Frame) {
        let weight_host = self.selected_host().unwrap_or_default();
        let dialog = if let Some(action) = &self.pending_action {
            Dialog::Confirm(action)
        } else if let Some(input) = &self.weight_input {
            Dialog::Weight {
                backend: &self.config.backend_name,
                host: &weight_host,
                input,
            }
        } else {
            Dialog::None
        };

        let state = DashboardState {
            view: self.current_view,
            base_url: &self.config.base_url,
            poll_state: self.poller.state(),
            last_success: self.poller.last_success(),
            last_error: self.poller.last_error().map(|e| e.to_string()),
            panels: &self.panels,
            charts: &self.charts,
            selected_index: self.selected_index,
            status_message: self.status_message.as_deref(),
            dialog,
            show_help: self.show_help,
        };

        self.dashboard.render(frame, &state);
    }
}
