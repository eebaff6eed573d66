/// Widgets shared by the dashboard views
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::utils::format_abbrev;

/// Palette cycled through component bars
pub const BAR_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
    Color::LightRed,
];

/// Panel shown when a selection has nothing to display
pub fn render_no_data(f: &mut Frame, area: Rect, title: &str, message: &str) {
    let paragraph = Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled("Sem dados", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(Span::styled(message.to_string(), Style::default().fg(Color::Gray))),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title(title.to_string()));

    f.render_widget(paragraph, area);
}

/// Bar height for a currency amount; negative amounts draw as empty bars
pub fn bar_value(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// One labelled bar whose text shows the abbreviated amount
pub fn amount_bar(label: &str, value: f64, color: Color) -> Bar<'static> {
    Bar::default()
        .value(bar_value(value))
        .label(Line::from(label.to_string()))
        .text_value(format_abbrev(value))
        .style(Style::default().fg(color))
        .value_style(Style::default().fg(Color::Black).bg(color))
}

/// Vertical bar chart with one group per entry of `groups`
pub fn render_bar_chart(f: &mut Frame, area: Rect, title: &str, groups: Vec<(String, Vec<Bar<'static>>)>, bar_width: u16) {
    let mut chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .bar_width(bar_width)
        .bar_gap(1)
        .group_gap(3);
    for (label, bars) in groups {
        chart = chart.data(BarGroup::default().label(Line::from(label)).bars(&bars));
    }
    f.render_widget(chart, area);
}

/// Key/value line used by the side panels
pub fn key_value_line(key: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", key), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
    ])
}

/// Styled percentage: above 100% in red, otherwise green
pub fn styled_attainment(value: Option<f64>) -> Span<'static> {
    match value {
        Some(pct) if pct > 100.0 => Span::styled(format!("{:.1}%", pct), Style::default().fg(Color::Red)),
        Some(pct) => Span::styled(format!("{:.1}%", pct), Style::default().fg(Color::Green)),
        None => Span::styled("n/d".to_string(), Style::default().fg(Color::DarkGray)),
    }
}
