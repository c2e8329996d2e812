/// Main dashboard screen: header, view tabs, footer and overlays around the
/// overview and chart views

use chrono::{DateTime, Local};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::View;
use crate::core::{ControlAction, PollState};
use crate::screens::charts::{render_charts, DelayChart};
use crate::screens::status::{render_overview, NodePanel};
use crate::utils::{truncate_string, MAX_WEIGHT, MIN_WEIGHT};

/// Modal shown above the current view
#[derive(Debug, Clone, Copy)]
pub enum Dialog<'a> {
    None,
    Confirm(&'a ControlAction),
    Weight {
        backend: &'a str,
        host: &'a str,
        input: &'a str,
    },
}

/// Everything one frame needs
pub struct DashboardState<'a> {
    pub view: View,
    pub base_url: &'a str,
    pub poll_state: PollState,
    pub last_success: Option<DateTime<Local>>,
    pub last_error: Option<String>,
    pub panels: &'a [NodePanel],
    pub charts: &'a [DelayChart],
    pub selected_index: usize,
    pub status_message: Option<&'a str>,
    pub dialog: Dialog<'a>,
    pub show_help: bool,
}

pub struct Dashboard {
    title: String,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            title: format!("Galera Cluster Dashboard v{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn render(&self, frame: &mut Frame, state: &DashboardState) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4), // Title + poll status
                Constraint::Length(1), // View tabs
                Constraint::Min(0),    // Content
                Constraint::Length(3), // Footer
            ])
            .split(frame.size());

        frame.render_widget(self.render_header(state), chunks[0]);

        let tabs: Vec<(&str, bool)> = View::all()
            .iter()
            .map(|v| (v.title(), *v == state.view))
            .collect();
        frame.render_widget(self.render_tab_bar(&tabs), chunks[1]);

        match state.view {
            View::Overview => render_overview(frame, chunks[2], state.panels, state.selected_index),
            View::Charts => render_charts(frame, chunks[2], state.charts, state.selected_index),
        }

        frame.render_widget(self.render_footer(state), chunks[3]);

        match state.dialog {
            Dialog::None => {}
            Dialog::Confirm(action) => self.render_confirm_dialog(frame, action),
            Dialog::Weight {
                backend,
                host,
                input,
            } => self.render_weight_dialog(frame, backend, host, input),
        }

        if state.show_help {
            self.render_help(frame);
        }
    }

    fn render_header(&self, state: &DashboardState) -> Paragraph<'static> {
        let poll_span = match state.poll_state {
            PollState::Waiting(n) => Span::styled(
                format!("Next refresh in {}s", n),
                Style::default().fg(Color::Green),
            ),
            PollState::Fetching => Span::styled(
                "Refreshing...",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            PollState::Idle => Span::styled("Stopped", Style::default().fg(Color::DarkGray)),
        };

        let updated = state
            .last_success
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        let title_line = Line::from(vec![
            Span::styled(
                self.title.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(state.base_url.to_string(), Style::default().fg(Color::Gray)),
        ]);

        let mut status_line = vec![
            poll_span,
            Span::raw(" | "),
            Span::styled("Last update: ", Style::default().fg(Color::Gray)),
            Span::styled(updated, Style::default().fg(Color::White)),
            Span::raw(" | "),
            Span::styled("Nodes: ", Style::default().fg(Color::Gray)),
            Span::styled(state.panels.len().to_string(), Style::default().fg(Color::White)),
        ];
        if let Some(error) = &state.last_error {
            status_line.push(Span::raw(" | "));
            status_line.push(Span::styled(
                format!("Last poll failed: {}", truncate_string(error, 60)),
                Style::default().fg(Color::Red),
            ));
        }

        Paragraph::new(vec![title_line, Line::from(status_line)])
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL))
    }

    /// Render a tab bar showing available views with the active one highlighted
    fn render_tab_bar(&self, tabs: &[(&str, bool)]) -> Paragraph {
        let mut tab_spans = Vec::new();

        for (i, (tab_name, is_active)) in tabs.iter().enumerate() {
            if i > 0 {
                tab_spans.push(Span::raw(" "));
            }

            if *is_active {
                tab_spans.push(Span::styled(
                    format!(" {} ", tab_name),
                    Style::default()
                        .bg(Color::Blue)
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ));
            } else {
                tab_spans.push(Span::styled(
                    format!("[{}]", tab_name),
                    Style::default().fg(Color::Gray),
                ));
            }
        }

        tab_spans.push(Span::styled(
            "  Tab to switch",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ));

        Paragraph::new(Line::from(tab_spans)).alignment(Alignment::Left)
    }

    fn render_footer<'a>(&self, state: &DashboardState<'a>) -> Paragraph<'a> {
        let footer_text = match state.status_message {
            Some(status) => status.to_string(),
            None => match state.view {
                View::Overview => {
                    "[r]efresh | [e]nable | [d]isable | [w]eight | [R]estart HAProxy | [?] help | [q]uit"
                        .to_string()
                }
                View::Charts => "[r]efresh | [↑↓] select host | [?] help | [q]uit".to_string(),
            },
        };

        Paragraph::new(footer_text)
            .alignment(Alignment::Center)
            .style(if state.status_message.is_some() {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            })
            .block(Block::default().borders(Borders::ALL))
    }

    fn render_confirm_dialog(&self, frame: &mut Frame, action: &ControlAction) {
        let area = centered_rect(frame.size(), 60, 7);
        frame.render_widget(Clear, area);

        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                action.confirm_prompt(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("[y]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
                Span::raw(" confirm   "),
                Span::styled("[n]/[Esc]", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
                Span::raw(" cancel"),
            ]),
        ];

        let dialog = Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(Span::styled(
                        format!(" {} ", action),
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )),
            );
        frame.render_widget(dialog, area);
    }

    fn render_weight_dialog(&self, frame: &mut Frame, backend: &str, host: &str, input: &str) {
        let area = centered_rect(frame.size(), 60, 9);
        frame.render_widget(Clear, area);

        let text = vec![
            Line::from(vec![
                Span::styled("Backend: ", Style::default().fg(Color::Gray)),
                Span::styled(backend.to_string(), Style::default().fg(Color::White)),
            ]),
            Line::from(vec![
                Span::styled("Server: ", Style::default().fg(Color::Gray)),
                Span::styled(host.to_string(), Style::default().fg(Color::Green)),
            ]),
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    format!("Weight ({}-{}): ", MIN_WEIGHT, MAX_WEIGHT),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(
                    format!("{}_", input),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                "[Enter] apply | [Esc] cancel",
                Style::default().fg(Color::DarkGray),
            )),
        ];

        let dialog = Paragraph::new(text).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(Span::styled(
                    " Set HAProxy Weight ",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
        );
        frame.render_widget(dialog, area);
    }

    fn render_help(&self, frame: &mut Frame) {
        let popup_area = centered_rect(frame.size(), 72, 22);

        let section = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
        let help_text = vec![
            Line::from(Span::styled(
                "Galera Cluster Dashboard - Keyboard Shortcuts",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled("Navigation:", section)),
            Line::from("  [Tab]          Switch between Overview and Charts"),
            Line::from("  [↑ ↓] / [k j]  Select node"),
            Line::from(""),
            Line::from(Span::styled("Global Commands:", section)),
            Line::from("  [?] / [F1]     Toggle this help screen"),
            Line::from("  [r]            Refresh now (resets the countdown)"),
            Line::from("  [q] / [Esc]    Quit application"),
            Line::from(""),
            Line::from(Span::styled("HAProxy (selected node):", section)),
            Line::from("  [e]            Enable traffic to the node"),
            Line::from("  [d]            Disable traffic to the node"),
            Line::from("  [w]            Set the node's weight"),
            Line::from("  [R]            Restart HAProxy"),
            Line::from(""),
            Line::from(Span::styled(
                "Press [?] or [Esc] to close this help",
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            )),
        ];

        frame.render_widget(Clear, popup_area);
        let help_widget = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(Span::styled(
                        " Help ",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )),
            )
            .wrap(Wrap { trim: true });

        frame.render_widget(help_widget, popup_area);
    }
}

/// Centered box of at most `width` x `height` inside `area`
fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = area.width.min(width);
    let height = area.height.min(height);
    Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_fits_inside() {
        let area = Rect::new(0, 0, 100, 40);
        let r = centered_rect(area, 60, 8);
        assert_eq!(r, Rect::new(20, 16, 60, 8));

        let small = Rect::new(0, 0, 30, 5);
        let r = centered_rect(small, 60, 8);
        assert_eq!(r, Rect::new(0, 0, 30, 5));
    }
}
