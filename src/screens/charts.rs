/// Replication-delay charts, one per host
///
/// `build_chart` reduces a host's history to plot points; `render_charts`
/// draws them with a braille line chart.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::core::series::{SeriesStore, SeriesView};
use crate::core::snapshot::ClusterSnapshot;
use crate::utils::{format_clock_millis, DELAY_METRIC};

/// Smallest height a chart is drawn at
const MIN_CHART_HEIGHT: u16 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct DelayChart {
    pub host: String,
    /// Rounded latest reading, 0 without data
    pub latest: u64,
    /// (seconds since the first sample, transactions waiting)
    pub points: Vec<(f64, f64)>,
    pub x_max: f64,
    pub y_max: f64,
    pub first_ms: Option<i64>,
    pub last_ms: Option<i64>,
}

impl DelayChart {
    pub fn title(&self) -> String {
        format!(
            "{} | Replication Delay ({}) | Waiting: {} tx",
            self.host, DELAY_METRIC, self.latest
        )
    }
}

fn plot_value(v: f64) -> f64 {
    v.round().max(0.0)
}

pub fn build_chart(host: &str, view: &SeriesView) -> DelayChart {
    let first_ms = view.first().map(|s| s.timestamp);
    let last_ms = view.last().map(|s| s.timestamp);
    let origin = first_ms.unwrap_or(0);

    let points: Vec<(f64, f64)> = view
        .iter()
        .map(|(ts, v)| ((ts - origin) as f64 / 1000.0, plot_value(v)))
        .collect();

    let x_max = points.last().map(|(x, _)| *x).unwrap_or(0.0).max(1.0);
    let peak = points.iter().map(|(_, y)| *y).fold(0.0, f64::max);
    // Headroom above the peak, never a flat zero-height axis
    let y_max = (peak * 11.0 / 10.0).ceil().max(1.0);

    DelayChart {
        host: host.to_string(),
        latest: view.last().map(|s| plot_value(s.value) as u64).unwrap_or(0),
        points,
        x_max,
        y_max,
        first_ms,
        last_ms,
    }
}

/// Charts for the hosts of the current snapshot, in snapshot order, plus any
/// host that only exists in the history
pub fn build_charts(store: &SeriesStore, snapshot: Option<&ClusterSnapshot>) -> Vec<DelayChart> {
    let mut hosts: Vec<String> = snapshot
        .map(|s| s.nodes.iter().map(|n| n.host.clone()).collect())
        .unwrap_or_default();

    for host in store.hosts() {
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }

    hosts
        .iter()
        .map(|host| build_chart(host, &store.series_for(host)))
        .collect()
}

pub fn render_charts(frame: &mut Frame, area: Rect, charts: &[DelayChart], selected: usize) {
    if charts.is_empty() {
        let empty = Paragraph::new("No replication history yet")
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::ALL).title("Replication Delay"));
        frame.render_widget(empty, area);
        return;
    }

    let visible = ((area.height / MIN_CHART_HEIGHT) as usize).clamp(1, charts.len());
    let start = selected.saturating_sub(visible - 1).min(charts.len() - visible);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, visible as u32); visible])
        .split(area);

    for (slot, chart) in charts.iter().skip(start).take(visible).enumerate() {
        render_chart(frame, chunks[slot], chart, start + slot == selected);
    }
}

fn render_chart(frame: &mut Frame, area: Rect, chart: &DelayChart, selected: bool) {
    // Too small to draw anything useful
    if area.height < 4 || area.width < 20 {
        return;
    }

    let border_style = if selected {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(Span::styled(
            format!(" {} ", chart.title()),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));

    if chart.points.is_empty() {
        let empty = Paragraph::new("No samples yet")
            .style(Style::default().fg(Color::Gray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let line_color = if chart.latest > 0 { Color::Yellow } else { Color::Green };
    let dataset = Dataset::default()
        .name("waiting tx")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(line_color))
        .data(&chart.points);

    let x_labels = vec![
        Span::raw(chart.first_ms.map(format_clock_millis).unwrap_or_default()),
        Span::raw(chart.last_ms.map(format_clock_millis).unwrap_or_default()),
    ];
    let y_labels = vec![
        Span::raw("0"),
        Span::raw(format!("{}", chart.y_max as u64)),
    ];

    let widget = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, chart.x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("tx")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, chart.y_max])
                .labels(y_labels),
        );

    frame.render_widget(widget, area);
}
