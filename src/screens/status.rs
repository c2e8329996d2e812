/// Cluster overview: one panel per node
///
/// `build_panels` turns a snapshot into a plain model (pure, no terminal
/// involved); `render_overview` draws that model.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::core::snapshot::{ClusterSnapshot, HostStatus};
use crate::utils::{
    classify, flag_state, format_metric_value, AppConfig, MetricKind, Severity, METRIC_GROUPS,
};

/// Rows a panel needs: header (2), tallest group, badge line, borders
const PANEL_HEIGHT: u16 = 13;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub label: &'static str,
    pub text: String,
    pub severity: Severity,
    /// Set for true/false indicators
    pub flag: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePanel {
    pub host: String,
    pub up: bool,
    pub error: Option<String>,
    pub cluster_status: String,
    pub provider_version: String,
    pub current_connections: String,
    pub weight: u32,
    pub cert_failures: String,
    pub groups: Vec<Vec<MetricRow>>,
    pub need_more_slave: bool,
}

impl NodePanel {
    /// Worst severity across all rows
    pub fn worst(&self) -> Severity {
        self.groups
            .iter()
            .flatten()
            .map(|r| r.severity)
            .max()
            .unwrap_or(Severity::Normal)
    }
}

fn text_or_dash(node: &HostStatus, key: &str, fallback: &str) -> String {
    node.metric(key)
        .filter(|v| v.is_truthy())
        .and_then(|v| v.display())
        .unwrap_or_else(|| fallback.to_string())
}

pub fn build_panel(node: &HostStatus, snapshot: &ClusterSnapshot, config: &AppConfig) -> NodePanel {
    let groups = METRIC_GROUPS
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|def| {
                    let value = node.metric(def.key);
                    let flag = if def.kind == MetricKind::Flag {
                        Some(flag_state(value).unwrap_or(false))
                    } else {
                        None
                    };
                    MetricRow {
                        label: def.label,
                        text: format_metric_value(value, def.kind),
                        severity: classify(value, &config.thresholds_for(def)),
                        flag,
                    }
                })
                .collect()
        })
        .collect();

    NodePanel {
        host: node.host.clone(),
        up: node.is_up(),
        error: node.error.clone(),
        cluster_status: text_or_dash(node, "wsrep_cluster_status", "-"),
        provider_version: text_or_dash(node, "wsrep_provider_version", "-"),
        current_connections: text_or_dash(node, "haproxy_current", "0"),
        weight: snapshot.effective_weight(node),
        cert_failures: format_metric_value(
            node.metric("wsrep_local_cert_failures"),
            MetricKind::Number,
        ),
        groups,
        need_more_slave: node.need_more_slave(),
    }
}

pub fn build_panels(snapshot: &ClusterSnapshot, config: &AppConfig) -> Vec<NodePanel> {
    snapshot
        .nodes
        .iter()
        .map(|node| build_panel(node, snapshot, config))
        .collect()
}

pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Normal => Color::White,
        Severity::Warning => Color::Yellow,
        Severity::Danger => Color::Red,
    }
}

/// First panel index to draw so `selected` stays on screen
fn window_start(selected: usize, visible: usize) -> usize {
    if visible == 0 {
        return selected;
    }
    selected.saturating_sub(visible - 1)
}

pub fn render_overview(frame: &mut Frame, area: Rect, panels: &[NodePanel], selected: usize) {
    if panels.is_empty() {
        let empty = Paragraph::new("Waiting for the first status poll...")
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::ALL).title("Nodes"));
        frame.render_widget(empty, area);
        return;
    }

    let visible = ((area.height / PANEL_HEIGHT) as usize).max(1);
    let start = window_start(selected, visible);
    let shown: Vec<(usize, &NodePanel)> = panels.iter().enumerate().skip(start).take(visible).collect();

    let mut constraints: Vec<Constraint> = shown.iter().map(|_| Constraint::Length(PANEL_HEIGHT)).collect();
    constraints.push(Constraint::Min(0));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (slot, (index, panel)) in shown.into_iter().enumerate() {
        render_panel(frame, chunks[slot], panel, index == selected);
    }
}

fn render_panel(frame: &mut Frame, area: Rect, panel: &NodePanel, selected: bool) {
    if area.height < 3 || area.width < 10 {
        return;
    }

    let (state_text, state_color) = if panel.up {
        ("UP", Color::Green)
    } else {
        ("DOWN", Color::Red)
    };

    let border_style = if selected {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let title = Line::from(vec![
        Span::styled(
            format!(" {} ", panel.host),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{} ", state_text),
            Style::default().fg(state_color).add_modifier(Modifier::BOLD),
        ),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // node info
            Constraint::Min(0),    // metric groups
            Constraint::Length(1), // badges / error
        ])
        .split(inner);

    let label = Style::default().fg(Color::Gray);
    let info = vec![
        Line::from(vec![
            Span::styled("OSU: ", label),
            Span::raw(panel.cluster_status.clone()),
            Span::raw("  │  "),
            Span::styled("Ver: ", label),
            Span::raw(panel.provider_version.clone()),
            Span::raw("  │  "),
            Span::styled("certFail: ", label),
            Span::raw(panel.cert_failures.clone()),
        ]),
        Line::from(vec![
            Span::styled("Current: ", label),
            Span::styled(panel.current_connections.clone(), Style::default().fg(Color::Cyan)),
            Span::raw("  │  "),
            Span::styled("Weight: ", label),
            Span::styled(panel.weight.to_string(), Style::default().fg(Color::Cyan)),
        ]),
    ];
    frame.render_widget(Paragraph::new(info), rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            panel
                .groups
                .iter()
                .map(|_| Constraint::Ratio(1, panel.groups.len().max(1) as u32))
                .collect::<Vec<_>>(),
        )
        .split(rows[1]);

    for (group, column) in panel.groups.iter().zip(columns.iter()) {
        let lines: Vec<Line> = group.iter().map(metric_line).collect();
        frame.render_widget(Paragraph::new(lines), *column);
    }

    let footer = if let Some(error) = &panel.error {
        Line::from(Span::styled(
            format!("Error: {}", error),
            Style::default().fg(Color::Red),
        ))
    } else if panel.need_more_slave {
        Line::from(Span::styled(
            " NEED_MORE_SLAVE_T ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from("")
    };
    frame.render_widget(Paragraph::new(footer), rows[2]);
}

fn metric_line(row: &MetricRow) -> Line<'static> {
    let value_style = match row.flag {
        Some(true) => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Some(false) => Style::default().fg(Color::Green),
        None => {
            let style = Style::default().fg(severity_color(row.severity));
            if row.severity == Severity::Normal {
                style
            } else {
                style.add_modifier(Modifier::BOLD)
            }
        }
    };

    Line::from(vec![
        Span::styled(format!("{}: ", row.label), Style::default().fg(Color::Gray)),
        Span::styled(row.text.clone(), value_style),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(body: &str) -> ClusterSnapshot {
        ClusterSnapshot::from_body(body).unwrap()
    }

    fn row<'a>(panel: &'a NodePanel, label: &str) -> &'a MetricRow {
        panel
            .groups
            .iter()
            .flatten()
            .find(|r| r.label == label)
            .unwrap()
    }

    #[test]
    fn test_panel_formats_catalogue() {
        let snap = snapshot(
            r#"[{"host": "10.0.0.1", "status": {
                "wsrep_cluster_status": "Primary",
                "wsrep_provider_version": "26.4.14",
                "haproxy_current": 12,
                "wsrep_local_cert_failures": "1234",
                "wsrep_local_recv_queue": "10",
                "wsrep_local_send_queue": "3",
                "Memory_used": "3221225472",
                "wsrep_flow_control_active": "true",
                "wsrep_flow_control_paused": "0.000123",
                "gcache.size": "128M",
                "queries_per_second": 1532.456789
            }}]"#,
        );
        let panel = build_panel(&snap.nodes[0], &snap, &AppConfig::default());

        assert!(panel.up);
        assert_eq!(panel.cluster_status, "Primary");
        assert_eq!(panel.provider_version, "26.4.14");
        assert_eq!(panel.current_connections, "12");
        assert_eq!(panel.cert_failures, "1,234");
        assert_eq!(panel.weight, 1);
        assert_eq!(panel.groups.len(), 4);

        assert_eq!(row(&panel, "wsrep_local_recv_queue").severity, Severity::Warning);
        assert_eq!(row(&panel, "wsrep_local_send_queue").severity, Severity::Normal);
        assert_eq!(row(&panel, "Memory Used").text, "3.00 GB");
        assert_eq!(row(&panel, "wsrep_flow_control_active").flag, Some(true));
        assert_eq!(row(&panel, "wsrep_flow_control_paused").text, "0.000123");
        assert_eq!(row(&panel, "gcache.size").text, "128M");
        assert_eq!(row(&panel, "Queries/sec").text, "1,532.457");
        assert_eq!(row(&panel, "Slaves Connected").text, "-");
        assert_eq!(panel.worst(), Severity::Warning);
    }

    #[test]
    fn test_down_node_panel() {
        let snap = snapshot(r#"[{"host": "10.0.0.2", "status": null, "error": "timed out"}]"#);
        let panel = build_panel(&snap.nodes[0], &snap, &AppConfig::default());

        assert!(!panel.up);
        assert_eq!(panel.error.as_deref(), Some("timed out"));
        assert_eq!(panel.cluster_status, "-");
        assert_eq!(panel.current_connections, "0");
        assert!(panel.groups.iter().flatten().all(|r| r.text == "-"));
        assert_eq!(panel.worst(), Severity::Normal);
    }

    #[test]
    fn test_threshold_override_applies() {
        let snap = snapshot(r#"[{"host": "a", "status": {"wsrep_local_send_queue": "60"}}]"#);
        let mut config = AppConfig::default();
        config.thresholds.insert(
            "wsrep_local_send_queue".to_string(),
            crate::utils::Thresholds {
                warning: Some(20.0),
                danger: Some(60.0),
            },
        );

        let panel = build_panel(&snap.nodes[0], &snap, &config);
        assert_eq!(row(&panel, "wsrep_local_send_queue").severity, Severity::Danger);
    }

    #[test]
    fn test_build_is_deterministic() {
        let snap = snapshot(
            r#"{"nodes": [{"host": "a", "status": {"need_more_slave": 1}}, {"host": "b", "status": {}}],
                "haproxy_weights": {"galera_cluster_backend": {"b": 0}}}"#,
        );
        let config = AppConfig::default();
        let first = build_panels(&snap, &config);
        let second = build_panels(&snap, &config);
        assert_eq!(first, second);
        assert!(first[0].need_more_slave);
        assert_eq!(first[1].weight, 0);
    }

    #[test]
    fn test_window_start_keeps_selection_visible() {
        assert_eq!(window_start(0, 3), 0);
        assert_eq!(window_start(2, 3), 0);
        assert_eq!(window_start(5, 3), 3);
        assert_eq!(window_start(4, 1), 4);
    }
}
