//! TUI rendering module.
//!
//! This module handles all visual rendering using ratatui:
//! - One chart per score file, stacked vertically
//! - A strip of reference bases under each chart when zoomed in
//! - Hover text of the selected sequence
//! - Status bar with focus, range and mode info
//!
//! Charts are drawn from [`Trace`]s only; nothing here knows how the
//! traces were computed.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::annotate::BaseLabel;
use crate::model::{ViewId, ViewRange};
use crate::state::{AppMode, AppState, ChartPanel};
use crate::sync::ChartView;
use crate::trace::{build_traces, y_bounds, Trace};

/// Height of the hover panel (including borders).
const HOVER_PANEL_HEIGHT: u16 = 4;
/// Height of the status bar.
const STATUS_BAR_HEIGHT: u16 = 1;
/// Height of the base strip under each chart.
const BASE_STRIP_HEIGHT: u16 = 1;

/// Line colours, cycled per sequence.
const TRACK_COLORS: [Color; 5] = [Color::Blue, Color::Green, Color::Red, Color::Magenta, Color::Yellow];

/// Color scheme for nucleotides.
pub trait ColorScheme {
    fn get_color(&self, c: char) -> Color;
}

/// DNA nucleotide color scheme.
pub struct DnaColorScheme;

impl ColorScheme for DnaColorScheme {
    fn get_color(&self, c: char) -> Color {
        match c.to_ascii_uppercase() {
            'A' => Color::Red,
            'C' => Color::Green,
            'G' => Color::Yellow,
            'T' => Color::Blue,
            _ => Color::DarkGray,
        }
    }
}

/// Renders the complete UI.
pub fn render(frame: &mut Frame, state: &AppState) {
    let area = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(HOVER_PANEL_HEIGHT),
            Constraint::Length(STATUS_BAR_HEIGHT),
        ])
        .split(area);

    let charts_area = main_layout[0];
    let hover_area = main_layout[1];
    let status_area = main_layout[2];

    let slots: Vec<_> = state.views.slots().collect();
    for (slot, chart_area) in slots.iter().zip(chart_areas(charts_area, slots.len())) {
        render_chart(frame, state, slot.id, &slot.view, chart_area);
    }

    render_hover_panel(frame, state, hover_area);
    render_status_bar(frame, state, status_area);
}

/// Splits `area` into `count` equal chart slots.
pub fn chart_areas(area: Rect, count: usize) -> Vec<Rect> {
    if count == 0 {
        return Vec::new();
    }
    let constraints: Vec<Constraint> = (0..count).map(|_| Constraint::Ratio(1, count as u32)).collect();
    Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area)
        .to_vec()
}

/// Renders one chart and the base strip below it.
fn render_chart(frame: &mut Frame, state: &AppState, id: ViewId, panel: &ChartPanel, area: Rect) {
    let Some(file) = state.session.files.get(panel.file) else {
        return;
    };
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(BASE_STRIP_HEIGHT)])
        .split(area);

    let range = panel.range();
    let traces = build_traces(&state.session, file);

    // Datasets borrow their points, so collect them first
    let series: Vec<(Style, GraphType, Option<String>, Vec<(f64, f64)>)> = traces
        .iter()
        .enumerate()
        .flat_map(|(i, trace)| {
            let style = trace_style(trace, i);
            let graph = match trace {
                Trace::Marker { .. } => GraphType::Scatter,
                _ => GraphType::Line,
            };
            let named = !matches!(trace, Trace::StackedInterval { .. });
            trace
                .polylines()
                .into_iter()
                .enumerate()
                .map(move |(j, points)| {
                    let name = (named && j == 0).then(|| trace.name().to_string());
                    (style, graph, name, points)
                })
        })
        .collect();

    let datasets: Vec<Dataset> = series
        .iter()
        .map(|(style, graph, name, points)| {
            let dataset = Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(*graph)
                .style(*style)
                .data(points);
            match name {
                Some(name) => dataset.name(name.clone()),
                None => dataset,
            }
        })
        .collect();

    let [y_lo, y_hi] = y_bounds(&traces);
    let focused = id == state.focus;
    let border_style = if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let title = format!("{} [{:.0}-{:.0}]", file.name, range.start, range.end);

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).border_style(border_style).title(title))
        .x_axis(
            Axis::default()
                .bounds([range.start, range.end])
                .labels(vec![
                    Span::raw(format!("{:.0}", range.start)),
                    Span::raw(format!("{:.0}", (range.start + range.end) / 2.0)),
                    Span::raw(format!("{:.0}", range.end)),
                ]),
        )
        .y_axis(
            Axis::default()
                .bounds([y_lo, y_hi])
                .labels(vec![Span::raw(format!("{:.2}", y_lo)), Span::raw(format!("{:.2}", y_hi))]),
        );
    frame.render_widget(chart, parts[0]);

    let strip = base_strip(panel.labels(), range, parts[1].width as usize);
    frame.render_widget(Paragraph::new(strip), parts[1]);
}

fn trace_style(trace: &Trace, index: usize) -> Style {
    match trace {
        Trace::Line { .. } | Trace::Marker { .. } => Style::default().fg(TRACK_COLORS[index % TRACK_COLORS.len()]),
        Trace::StackedInterval { is_added: true, .. } => Style::default().fg(Color::Green),
        Trace::StackedInterval { is_added: false, .. } => Style::default().fg(Color::Red),
        Trace::Threshold { .. } => Style::default().fg(Color::Red).add_modifier(Modifier::DIM),
    }
}

/// Terminal column of every label on a strip `width` columns wide.
pub fn label_columns(labels: &[BaseLabel], range: ViewRange, width: usize) -> Vec<(usize, char)> {
    if width == 0 || !range.is_valid() {
        return Vec::new();
    }
    let scale = (width - 1) as f64 / range.width();
    labels
        .iter()
        .filter_map(|label| {
            let col = ((label.x as f64 - range.start) * scale).round();
            (col >= 0.0 && col < width as f64).then_some((col as usize, label.text))
        })
        .collect()
}

/// The row of coloured reference bases drawn under a chart.
fn base_strip(labels: &[BaseLabel], range: ViewRange, width: usize) -> Line<'static> {
    let scheme = DnaColorScheme;
    let mut cells: Vec<Option<char>> = vec![None; width];
    for (col, c) in label_columns(labels, range, width) {
        cells[col] = Some(c);
    }
    let spans: Vec<Span> = cells
        .into_iter()
        .map(|cell| match cell {
            Some(c) => Span::styled(c.to_string(), Style::default().fg(Color::Black).bg(scheme.get_color(c))),
            None => Span::raw(" "),
        })
        .collect();
    Line::from(spans)
}

/// Renders the hover text of the selected sequence at the focused chart's centre.
fn render_hover_panel(frame: &mut Frame, state: &AppState, area: Rect) {
    let inner_width = area.width.saturating_sub(2).max(1) as usize;
    let lines: Vec<Line> = match state.hover_text() {
        Some(text) => textwrap::wrap(text, inner_width)
            .into_iter()
            .map(|line| Line::from(line.into_owned()))
            .collect(),
        None => vec![Line::from(Span::styled(
            "no score at this position",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let block = Block::default().borders(Borders::ALL).title("Hover");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Renders the status bar at the bottom.
fn render_status_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    let (mode_str, command_str) = match &state.mode {
        AppMode::Normal => ("NORMAL", String::new()),
        AppMode::Command(cmd) => ("COMMAND", format!(":{}", cmd)),
    };

    let range_info = state
        .focused_range()
        .map(|r| format!("{:.0}-{:.0}", r.start, r.end))
        .unwrap_or_default();
    let sync_info = if state.views.is_syncing() { " | syncing" } else { "" };
    let position_info = format!(
        "Chart {}/{} | {}{} ",
        state.focus.0 + 1,
        state.chart_count(),
        range_info,
        sync_info
    );

    let message = state.status_message.as_deref().unwrap_or(&state.file_name);

    let left_content = if command_str.is_empty() {
        format!(" {} | {} ", mode_str, message)
    } else {
        format!(" {} | {} ", mode_str, command_str)
    };

    let left_len = left_content.len();
    let status_line = Line::from(vec![
        Span::styled(left_content, Style::default().fg(Color::Black).bg(Color::Cyan)),
        Span::styled(
            " ".repeat((area.width as usize).saturating_sub(left_len + position_info.len())),
            Style::default().bg(Color::Cyan),
        ),
        Span::styled(
            position_info,
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
    ]);

    frame.render_widget(Paragraph::new(status_line), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::LABEL_Y;

    #[test]
    fn test_dna_colors() {
        let scheme = DnaColorScheme;
        assert_eq!(scheme.get_color('A'), Color::Red);
        assert_eq!(scheme.get_color('a'), Color::Red); // Case insensitive
        assert_eq!(scheme.get_color('C'), Color::Green);
        assert_eq!(scheme.get_color('G'), Color::Yellow);
        assert_eq!(scheme.get_color('T'), Color::Blue);
        assert_eq!(scheme.get_color('-'), Color::DarkGray);
    }

    #[test]
    fn test_chart_areas() {
        let areas = chart_areas(Rect::new(0, 0, 80, 30), 3);
        assert_eq!(areas.len(), 3);
        assert!(areas.iter().all(|a| a.height == 10 && a.width == 80));
        assert!(chart_areas(Rect::new(0, 0, 80, 30), 0).is_empty());
    }

    #[test]
    fn test_label_columns() {
        let labels: Vec<BaseLabel> = "ACGTA"
            .chars()
            .enumerate()
            .map(|(i, text)| BaseLabel { x: 10 + i, y: LABEL_Y, text })
            .collect();
        let cols = label_columns(&labels, ViewRange::new(10.0, 14.0), 9);
        assert_eq!(cols, vec![(0, 'A'), (2, 'C'), (4, 'G'), (6, 'T'), (8, 'A')]);

        // Labels outside the strip are not drawn
        assert_eq!(label_columns(&labels, ViewRange::new(12.0, 14.0), 5).len(), 3);
        assert!(label_columns(&labels, ViewRange::new(10.0, 14.0), 0).is_empty());
    }

    #[test]
    fn test_base_strip_width() {
        let labels = vec![BaseLabel { x: 1, y: LABEL_Y, text: 'G' }];
        let line = base_strip(&labels, ViewRange::new(0.0, 2.0), 5);
        assert_eq!(line.spans.len(), 5);
        assert_eq!(line.spans[2].content, "G");
    }
}
