//! TUI rendering with ratatui
//!
//! Implements the visual layout: token status chip, device table, log panel,
//! help bar and dialogs.

use protocol::{ShareState, TokenStatus};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use super::app::{App, Dialog};

/// Main render function
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Status chip + stats
            Constraint::Min(8),    // Device list
            Constraint::Length(10), // Log panel
            Constraint::Length(3), // Help bar
        ])
        .split(frame.area());

    render_status_bar(frame, app, chunks[0]);
    render_device_list(frame, app, chunks[1]);
    render_log_panel(frame, app, chunks[2]);
    render_help_bar(frame, chunks[3]);

    match app.dialog() {
        Dialog::None => {}
        Dialog::Help => render_help_dialog(frame),
        Dialog::Error { title, message } => render_error_dialog(frame, title, message),
    }
}

/// Chip colour for a token status
pub fn status_color(status: TokenStatus) -> Color {
    match status {
        TokenStatus::Absent => Color::Red,
        TokenStatus::HostOnly => Color::Blue,
        TokenStatus::AttachedToGuest => Color::Green,
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let color = status_color(app.status());
    let on_off = |on: bool| if on { "on" } else { "off" };

    let chip = Line::from(vec![
        Span::styled(
            format!(" {} ", app.status().label()),
            Style::default()
                .fg(Color::White)
                .bg(color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(app.status_description().to_string(), Style::default().fg(color)),
    ]);

    let stats = Line::from(vec![
        Span::styled("Devices: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.total_devices().to_string(), Style::default().fg(Color::Yellow)),
        Span::raw("  |  "),
        Span::styled("Visible: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.devices().len().to_string(), Style::default().fg(Color::Yellow)),
        Span::raw("  |  "),
        Span::styled("Hidden: ", Style::default().fg(Color::DarkGray)),
        Span::styled(app.hidden_devices().to_string(), Style::default().fg(Color::Yellow)),
        Span::raw("  |  "),
        Span::styled("Auto-attach: ", Style::default().fg(Color::DarkGray)),
        Span::styled(on_off(app.auto_attach()), Style::default().fg(Color::Cyan)),
        Span::raw("  |  "),
        Span::styled("Show all: ", Style::default().fg(Color::DarkGray)),
        Span::styled(on_off(app.show_all()), Style::default().fg(Color::Cyan)),
    ]);

    let status = Paragraph::new(vec![chip, stats]).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" USB Token Bridge ")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(Color::Blue)),
    );

    frame.render_widget(status, area);
}

fn render_device_list(frame: &mut Frame, app: &App, area: Rect) {
    let devices = app.devices();

    let header_cells = ["BUSID", "VID:PID", "Device", "State"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = devices
        .iter()
        .map(|device| {
            let state_style = match device.share_state() {
                ShareState::AttachedToGuest => Style::default().fg(Color::Green),
                ShareState::SharedWithHost => Style::default().fg(Color::Blue),
                ShareState::NotShared => Style::default().fg(Color::DarkGray),
            };
            Row::new(vec![
                Cell::from(device.busid.clone()),
                Cell::from(device.vidpid.clone()),
                Cell::from(device.descriptor.clone()),
                Cell::from(device.raw_state.clone()).style(state_style),
            ])
        })
        .collect();

    let title = if app.show_all() {
        format!(" USB Devices ({}) ", devices.len())
    } else {
        format!(" Security Tokens ({}/{}) ", devices.len(), app.total_devices())
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),  // BUSID
            Constraint::Length(10), // VID:PID
            Constraint::Min(20),    // Device
            Constraint::Length(16), // State
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Blue)),
    )
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = TableState::default();
    if !devices.is_empty() {
        state.select(Some(app.selected_index()));
    }

    frame.render_stateful_widget(table, area, &mut state);
}

fn render_log_panel(frame: &mut Frame, app: &App, area: Rect) {
    // Newest lines at the bottom, as many as fit
    let capacity = area.height.saturating_sub(2) as usize;
    let logs = app.logs();
    let lines: Vec<Line> = logs
        .iter()
        .skip(logs.len().saturating_sub(capacity))
        .map(|line| {
            let style = if line.contains("ERROR:") || line.contains("failed") {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            Line::from(Span::styled(line.clone(), style))
        })
        .collect();

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Log ")
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    frame.render_widget(panel, area);
}

fn render_help_bar(frame: &mut Frame, area: Rect) {
    let key_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let keys = [
        ("q", " Quit  "),
        ("j/k", " Navigate  "),
        ("r", " Refresh  "),
        ("b/u", " Share/Unshare  "),
        ("a/d", " Attach/Detach  "),
        ("t", " Auto-attach  "),
        ("s", " Show all  "),
        ("o", " WSL root  "),
        ("?", " Help"),
    ];

    let help_text: Vec<Span> = keys
        .iter()
        .flat_map(|(key, label)| [Span::styled(*key, key_style), Span::raw(*label)])
        .collect();

    let help = Paragraph::new(Line::from(help_text))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        )
        .alignment(Alignment::Center);

    frame.render_widget(help, area);
}

fn help_entry(key: &'static str, text: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<13}", key), Style::default().fg(Color::Cyan)),
        Span::raw(text),
    ])
}

fn help_heading(text: &'static str) -> Line<'static> {
    Line::from(vec![Span::styled(
        text,
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )])
}

fn render_help_dialog(frame: &mut Frame) {
    let area = centered_rect(60, 75, frame.area());

    let help_content = vec![
        help_heading("Navigation"),
        Line::from(""),
        help_entry("Up / k", "Move selection up"),
        help_entry("Down / j", "Move selection down"),
        Line::from(""),
        help_heading("Devices"),
        Line::from(""),
        help_entry("b", "Enable sharing (bind)"),
        help_entry("u", "Disable sharing (unbind), stops auto-attach"),
        help_entry("a", "Attach to WSL (bind + attach)"),
        help_entry("d", "Detach from WSL, stops auto-attach"),
        help_entry("r", "Refresh device list"),
        Line::from(""),
        help_heading("Options"),
        Line::from(""),
        help_entry("t", "Toggle auto-attach of known devices"),
        help_entry("s", "Toggle showing all devices"),
        Line::from(""),
        help_heading("General"),
        Line::from(""),
        help_entry("o", "Open WSL as root (wsl.exe -u root)"),
        help_entry("?", "Show this help"),
        help_entry("Esc", "Close dialog"),
        help_entry("q / Ctrl+C", "Quit application"),
        Line::from(""),
        help_heading("Token Status"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Red          ", Style::default().fg(Color::Red)),
            Span::raw("Token not detected"),
        ]),
        Line::from(vec![
            Span::styled("  Blue         ", Style::default().fg(Color::Blue)),
            Span::raw("Token on host"),
        ]),
        Line::from(vec![
            Span::styled("  Green        ", Style::default().fg(Color::Green)),
            Span::raw("Token attached to WSL"),
        ]),
    ];

    let help_paragraph = Paragraph::new(help_content)
        .block(
            Block::default()
                .title(" Help ")
                .title_alignment(Alignment::Center)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(Clear, area);
    frame.render_widget(help_paragraph, area);
}

fn render_error_dialog(frame: &mut Frame, title: &str, message: &str) {
    let area = centered_rect(60, 30, frame.area());

    let content = vec![
        Line::from(""),
        Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::White),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc to close",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let dialog = Paragraph::new(content)
        .block(
            Block::default()
                .title(format!(" {} ", title))
                .title_alignment(Alignment::Center)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    frame.render_widget(Clear, area);
    frame.render_widget(dialog, area);
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
