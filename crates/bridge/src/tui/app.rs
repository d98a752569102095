//! TUI application state
//!
//! Holds what the screen shows and turns key actions into core commands.
//! All reconciliation state lives in the core; the app only mirrors events.

use anyhow::{Context, Result};
use common::{CoreCommand, CoreEvent, UiBridge};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use protocol::{DeviceRecord, TokenStatus};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::time::Duration;
use tracing::{error, warn};

use super::events::{Action, Event, EventHandler};
use super::ui;
use crate::wsl;
use bridge::BridgeConfig;
use bridge::core::NO_SELECTION;

/// Maximum number of lines kept in the log panel
const MAX_LOG_LINES: usize = 500;

/// Current dialog/popup being displayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    None,
    /// Help dialog showing keybindings
    Help,
    /// A device operation failed
    Error { title: String, message: String },
}

/// Application state
pub struct App {
    status: TokenStatus,
    status_description: String,
    devices: Vec<DeviceRecord>,
    total_devices: usize,
    show_all: bool,
    auto_attach: bool,
    selected_index: usize,
    logs: VecDeque<String>,
    dialog: Dialog,
    launch_requested: bool,
    should_quit: bool,
}

impl App {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            status: TokenStatus::Absent,
            status_description: "Security key: checking...".to_string(),
            devices: Vec::new(),
            total_devices: 0,
            show_all: config.show_all,
            auto_attach: config.auto_attach,
            selected_index: 0,
            logs: VecDeque::new(),
            dialog: Dialog::None,
            launch_requested: false,
            should_quit: false,
        }
    }

    pub fn status(&self) -> TokenStatus {
        self.status
    }

    pub fn status_description(&self) -> &str {
        &self.status_description
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn total_devices(&self) -> usize {
        self.total_devices
    }

    pub fn hidden_devices(&self) -> usize {
        self.total_devices.saturating_sub(self.devices.len())
    }

    pub fn show_all(&self) -> bool {
        self.show_all
    }

    pub fn auto_attach(&self) -> bool {
        self.auto_attach
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn selected_device(&self) -> Option<&DeviceRecord> {
        self.devices.get(self.selected_index)
    }

    pub fn logs(&self) -> &VecDeque<String> {
        &self.logs
    }

    pub fn dialog(&self) -> &Dialog {
        &self.dialog
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Append a timestamped line to the log panel
    pub fn log_line(&mut self, msg: impl AsRef<str>) {
        let ts = chrono::Local::now().format("%H:%M:%S");
        self.logs.push_back(format!("[{}] {}", ts, msg.as_ref()));
        while self.logs.len() > MAX_LOG_LINES {
            self.logs.pop_front();
        }
    }

    /// Handle user action, returning the command to send to the core
    pub fn handle_action(&mut self, action: Action) -> Option<CoreCommand> {
        if self.dialog != Dialog::None {
            match action {
                Action::Quit | Action::CloseDialog => self.dialog = Dialog::None,
                Action::ShowHelp => self.dialog = Dialog::Help,
                _ => {}
            }
            return None;
        }

        match action {
            Action::Quit => {
                self.should_quit = true;
                Some(CoreCommand::Shutdown)
            }
            Action::CloseDialog | Action::None => None,
            Action::Up => {
                self.selected_index = self.selected_index.saturating_sub(1);
                None
            }
            Action::Down => {
                if self.selected_index + 1 < self.devices.len() {
                    self.selected_index += 1;
                }
                None
            }
            Action::ShowHelp => {
                self.dialog = Dialog::Help;
                None
            }
            Action::Refresh => Some(CoreCommand::Refresh),
            Action::OpenWslRoot => {
                self.launch_requested = true;
                None
            }
            Action::ToggleAutoAttach => {
                self.auto_attach = !self.auto_attach;
                Some(CoreCommand::SetAutoAttach(self.auto_attach))
            }
            Action::ToggleShowAll => {
                self.show_all = !self.show_all;
                Some(CoreCommand::SetShowAll(self.show_all))
            }
            Action::Bind => self.device_command(CoreCommand::Bind),
            Action::Unbind => self.device_command(CoreCommand::Unbind),
            Action::Attach => self.device_command(CoreCommand::Attach),
            Action::Detach => self.device_command(CoreCommand::Detach),
        }
    }

    /// Take a pending request to open the WSL root shell
    pub fn take_launch_request(&mut self) -> bool {
        std::mem::take(&mut self.launch_requested)
    }

    /// Report the outcome of opening the WSL root shell
    pub fn record_launch(&mut self, result: io::Result<()>) {
        match result {
            Ok(()) => self.log_line(wsl::OPENED_MESSAGE),
            Err(e) => {
                let message = e.to_string();
                self.log_line(format!("ERROR: {}: {}", wsl::FAILED_TITLE, message));
                self.dialog = Dialog::Error {
                    title: wsl::FAILED_TITLE.to_string(),
                    message,
                };
            }
        }
    }

    fn device_command(&mut self, make: fn(String) -> CoreCommand) -> Option<CoreCommand> {
        if let Some(busid) = self.selected_device().map(|d| d.busid.clone()) {
            return Some(make(busid));
        }
        self.log_line(NO_SELECTION);
        None
    }

    /// Mirror one core event
    pub fn handle_core_event(&mut self, event: CoreEvent) {
        match event {
            CoreEvent::StatusChanged {
                status,
                description,
            } => {
                self.status = status;
                self.status_description = description;
            }
            CoreEvent::LogLine(line) => self.log_line(line),
            CoreEvent::SnapshotUpdated {
                devices,
                total,
                show_all,
            } => {
                let selected = self.selected_device().map(|d| d.busid.clone());
                self.devices = devices;
                self.total_devices = total;
                self.show_all = show_all;

                // Keep the same device selected when it is still listed
                self.selected_index = selected
                    .and_then(|busid| self.devices.iter().position(|d| d.busid == busid))
                    .unwrap_or(self.selected_index)
                    .min(self.devices.len().saturating_sub(1));

                let shown = self.devices.len();
                if show_all {
                    self.log_line(format!("Showing ALL devices: {}/{}.", shown, total));
                } else {
                    self.log_line(format!(
                        "Showing acceptable devices: {}/{}. Hidden: {}.",
                        shown,
                        total,
                        self.hidden_devices()
                    ));
                }
            }
            CoreEvent::OperationResult { title, outcome } => match outcome {
                Ok(detail) => {
                    self.log_line(&title);
                    if !detail.is_empty() {
                        self.log_line(detail);
                    }
                }
                Err(message) => {
                    self.log_line(format!("ERROR: {}: {}", title, message));
                    self.dialog = Dialog::Error { title, message };
                }
            },
        }
    }
}

/// Terminal wrapper for setup/teardown
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    /// Create and initialize the terminal
    pub fn new() -> Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }

    /// Enter TUI mode (raw mode, alternate screen)
    pub fn enter(&mut self) -> Result<()> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        self.terminal.hide_cursor()?;
        self.terminal.clear()?;
        Ok(())
    }

    /// Exit TUI mode (restore terminal state)
    pub fn exit(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    /// Draw the UI
    pub fn draw(&mut self, app: &App) -> Result<()> {
        self.terminal.draw(|frame| {
            ui::render(frame, app);
        })?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        // Best effort cleanup
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Run the TUI application
///
/// Core events are applied on each tick; key presses become core commands.
pub async fn run(bridge: UiBridge, config: &BridgeConfig) -> Result<()> {
    let mut tui = Tui::new()?;
    tui.enter()?;

    let mut app = App::new(config);
    let mut events = EventHandler::new(Duration::from_millis(250));

    loop {
        if let Err(e) = tui.draw(&app) {
            error!("Failed to draw UI: {:#}", e);
            break;
        }

        match events.next().await {
            Some(Event::Key(key)) => {
                if let Some(cmd) = app.handle_action(Action::from(key)) {
                    if let Err(e) = bridge.send_command(cmd).await {
                        warn!("Failed to send command: {:#}", e);
                        break;
                    }
                }
                if app.take_launch_request() {
                    app.record_launch(wsl::open_root_shell());
                }
            }
            Some(Event::Resize) => {
                // Terminal resize is handled automatically by ratatui
            }
            Some(Event::Tick) => {
                for event in bridge.drain_events() {
                    app.handle_core_event(event);
                }
            }
            None => break,
        }

        if app.should_quit() {
            break;
        }
    }

    tui.exit()?;

    // Quitting by closed input still stops the core
    if !app.should_quit() {
        bridge
            .send_command(CoreCommand::Shutdown)
            .await
            .context("Failed to send Shutdown command")?;
    }

    Ok(())
}
