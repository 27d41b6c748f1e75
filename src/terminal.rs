// SPDX-License-Identifier: GPL-3.0-only

//! Terminal control surface
//!
//! Shows the session status and maps keys onto the same commands the keypad
//! triggers. The live view itself renders in the video sink window.

use crate::backends::camera::CaptureConfig;
use crate::backends::gpio::ButtonEvent;
use crate::config::Config;
use crate::constants::{app_info, timing, video};
use crate::control::{Command, ControllerStatus};
use crate::session::Session;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};
use std::io::{self, stdout};
use tracing::info;

const HELP: &str = "1 play  2 pause  3 zoom  4 awb  s stop  r resolution  k keypad  q quit";

/// Run the terminal surface until the user quits
pub fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::start(config);

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut session);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    session.shutdown();
    result
}

/// Key actions besides plain commands
enum KeyAction {
    Command(Command),
    NextResolution,
    RestartKeypad,
    Quit,
}

fn key_action(code: KeyCode, modifiers: KeyModifiers) -> Option<KeyAction> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(KeyAction::Quit),
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
        KeyCode::Char(digit @ '1'..='4') => {
            let id = digit as u8 - b'0';
            Command::from_button(ButtonEvent { id }).map(KeyAction::Command)
        }
        KeyCode::Char('s') => Some(KeyAction::Command(Command::Stop)),
        KeyCode::Char('r') => Some(KeyAction::NextResolution),
        KeyCode::Char('k') => Some(KeyAction::RestartKeypad),
        _ => None,
    }
}

/// Resolution preset following `current`, wrapping around
fn next_resolution(current: Option<CaptureConfig>) -> CaptureConfig {
    let presets = video::RESOLUTION_PRESETS.map(|(w, h)| CaptureConfig::new(w, h));
    let next = current
        .and_then(|c| presets.iter().position(|p| *p == c))
        .map_or(0, |i| (i + 1) % presets.len());
    presets[next]
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut Session,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut message = String::from("Ready");

    loop {
        // Keypad events queued since the last tick
        if session.process_pending().is_some() {
            break;
        }

        let status = session.controller().map(|c| c.status());
        let keypad = match (session.keypad_status(), session.keypad_error()) {
            (None, _) => "disabled".to_string(),
            (Some(_), Some(e)) => format!("unavailable ({})", e),
            (Some(status), None) => status.to_string(),
        };

        terminal.draw(|f| {
            let [panel_area, message_area, help_area] = Layout::vertical([
                Constraint::Min(7),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .areas(f.area());

            f.render_widget(status_panel(status, &keypad), panel_area);
            f.render_widget(Paragraph::new(message.as_str()), message_area);
            f.render_widget(StatusBar { message: HELP }, help_area);
        })?;

        if event::poll(timing::TERMINAL_TICK)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            let Some(action) = key_action(key.code, key.modifiers) else {
                continue;
            };

            match action {
                KeyAction::Quit => break,
                KeyAction::RestartKeypad => {
                    session.start_keypad();
                    message = match session.keypad_error() {
                        Some(e) => format!("Keypad: {}", e),
                        None => "Keypad restarted".to_string(),
                    };
                }
                KeyAction::NextResolution => {
                    let Some(controller) = session.controller_mut() else {
                        continue;
                    };
                    let target = next_resolution(controller.status().resolution);
                    message = match controller.set_resolution(target) {
                        Ok(()) => format!("Resolution {}", target),
                        Err(e) => format!("Error: {}", e),
                    };
                }
                KeyAction::Command(command) => {
                    let Some(controller) = session.controller_mut() else {
                        continue;
                    };
                    message = match controller.execute(command) {
                        Ok(()) => format!("Done: {}", command),
                        Err(e) => format!("Error: {}", e),
                    };
                }
            }
        }
    }

    info!("Leaving terminal surface");
    Ok(())
}

fn status_panel(status: Option<ControllerStatus>, keypad: &str) -> Paragraph<'static> {
    let label = Style::default().add_modifier(Modifier::BOLD);
    let row = |name: &'static str, value: String| {
        Line::from(vec![Span::styled(format!("{:<15}", name), label), Span::raw(value)])
    };

    let unavailable = || "unavailable".to_string();
    let lines = match status {
        Some(status) => vec![
            row(
                "Video",
                status.transport.map_or_else(unavailable, |t| t.to_string()),
            ),
            row(
                "Resolution",
                status.resolution.map_or_else(unavailable, |r| r.to_string()),
            ),
            row("Zoom", status.zoom.map_or_else(unavailable, |z| z.to_string())),
            row("White balance", status.white_balance.to_string()),
            row("Keypad", keypad.to_string()),
        ],
        None => vec![Line::from("Session closed")],
    };

    Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" mivonix {} ", app_info::version())),
    )
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}
