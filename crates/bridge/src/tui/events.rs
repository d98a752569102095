//! TUI event handling
//!
//! Handles terminal events (keyboard, resize) using crossterm.
//! Provides an async event stream that integrates with tokio.

use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyModifiers};
use std::time::Duration;
use tokio::sync::mpsc;

/// Terminal event types
#[derive(Debug, Clone)]
pub enum Event {
    /// Keyboard input event
    Key(KeyEvent),
    /// Terminal resize event
    Resize,
    /// Tick event for periodic UI updates
    Tick,
}

/// User actions derived from keyboard input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    /// Ask the core for an immediate poll cycle
    Refresh,
    /// Enable sharing for the selected device
    Bind,
    /// Disable sharing for the selected device
    Unbind,
    /// Attach the selected device to WSL
    Attach,
    /// Detach the selected device from WSL
    Detach,
    ToggleAutoAttach,
    ToggleShowAll,
    /// Open a root shell in WSL
    OpenWslRoot,
    ShowHelp,
    CloseDialog,
    None,
}

impl From<KeyEvent> for Action {
    fn from(key: KeyEvent) -> Self {
        match key.code {
            // Quit
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
            KeyCode::Esc => Action::CloseDialog,

            // Navigation
            KeyCode::Up | KeyCode::Char('k') => Action::Up,
            KeyCode::Down | KeyCode::Char('j') => Action::Down,

            // Device operations
            KeyCode::Char('b') => Action::Bind,
            KeyCode::Char('u') => Action::Unbind,
            KeyCode::Char('a') => Action::Attach,
            KeyCode::Char('d') => Action::Detach,

            // Toggles
            KeyCode::Char('t') => Action::ToggleAutoAttach,
            KeyCode::Char('s') => Action::ToggleShowAll,

            KeyCode::Char('o') => Action::OpenWslRoot,
            KeyCode::Char('r') => Action::Refresh,
            KeyCode::Char('?') => Action::ShowHelp,

            _ => Action::None,
        }
    }
}

/// Event handler that polls terminal events in a background task
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Create a new event handler
    ///
    /// Spawns a blocking task that polls for terminal events and sends them
    /// through the channel, plus a tick every `tick_rate`.
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::task::spawn_blocking(move || {
            let mut last_tick = std::time::Instant::now();

            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::ZERO);

                if event::poll(timeout).unwrap_or(false) {
                    let sent = match event::read() {
                        // Ignore key release events on some platforms
                        Ok(CrosstermEvent::Key(key))
                            if key.kind == crossterm::event::KeyEventKind::Press =>
                        {
                            tx.send(Event::Key(key))
                        }
                        Ok(CrosstermEvent::Resize(_, _)) => tx.send(Event::Resize),
                        Ok(_) => Ok(()),
                        Err(_) => break,
                    };
                    if sent.is_err() {
                        break;
                    }
                }

                if last_tick.elapsed() >= tick_rate {
                    if tx.send(Event::Tick).is_err() {
                        break;
                    }
                    last_tick = std::time::Instant::now();
                }
            }
        });

        Self { rx }
    }

    /// Receive the next event
    ///
    /// Returns None if the event channel is closed.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn test_action_from_key_quit() {
        assert_eq!(Action::from(key('q')), Action::Quit);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(Action::from(ctrl_c), Action::Quit);
    }

    #[test]
    fn test_action_from_key_navigation() {
        let up = KeyEvent::new(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(Action::from(up), Action::Up);

        let down = KeyEvent::new(KeyCode::Down, KeyModifiers::NONE);
        assert_eq!(Action::from(down), Action::Down);

        assert_eq!(Action::from(key('k')), Action::Up);
        assert_eq!(Action::from(key('j')), Action::Down);
    }

    #[test]
    fn test_action_from_key_operations() {
        assert_eq!(Action::from(key('b')), Action::Bind);
        assert_eq!(Action::from(key('u')), Action::Unbind);
        assert_eq!(Action::from(key('a')), Action::Attach);
        assert_eq!(Action::from(key('d')), Action::Detach);
        assert_eq!(Action::from(key('t')), Action::ToggleAutoAttach);
        assert_eq!(Action::from(key('s')), Action::ToggleShowAll);
        assert_eq!(Action::from(key('r')), Action::Refresh);
        assert_eq!(Action::from(key('x')), Action::None);
    }

    #[test]
    fn test_action_from_key_open_wsl() {
        assert_eq!(Action::from(key('o')), Action::OpenWslRoot);
        assert_eq!(Action::from(key('?')), Action::ShowHelp);
    }
}
