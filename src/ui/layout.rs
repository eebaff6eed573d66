use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::state::{DashboardState, Focus, Tab};

/// Screen regions of the dashboard
pub struct TuiLayout {
    pub tab_bar: Rect,
    pub selectors: Rect,
    pub content: Rect,
    pub status_bar: Rect,
}

impl TuiLayout {
    /// Create a new layout from the given area
    pub fn new(area: Rect) -> Self {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Tab bar
                Constraint::Length(3), // Selectors
                Constraint::Min(0),    // Content
                Constraint::Length(4), // Status bar
            ])
            .split(area);

        Self {
            tab_bar: chunks[0],
            selectors: chunks[1],
            content: chunks[2],
            status_bar: chunks[3],
        }
    }

    pub fn render_tab_bar(&self, f: &mut Frame, selected: Tab) {
        let titles: Vec<&str> = Tab::ALL.iter().map(|t| t.title()).collect();

        let tabs = Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).title("Remuneração de Administradores (CVM)"))
            .style(Style::default().fg(Color::White))
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .select(selected.index());

        f.render_widget(tabs, self.tab_bar);
    }

    /// Current company, body, year and metric; the focused one is highlighted
    pub fn render_selectors(&self, f: &mut Frame, state: &DashboardState) {
        let selector = |focus: Focus, value: String| -> Vec<Span<'static>> {
            let style = if state.focus == focus {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };
            vec![
                Span::styled(format!("{}: ", focus.label()), Style::default().fg(Color::Gray)),
                Span::styled(value, style),
                Span::raw("  "),
            ]
        };

        let mut spans = Vec::new();
        spans.extend(selector(Focus::Company, state.company_name().unwrap_or("-").to_string()));
        spans.extend(selector(Focus::Body, state.body_name().unwrap_or("-").to_string()));
        spans.extend(selector(
            Focus::Year,
            state.year_value().map(|y| y.to_string()).unwrap_or_else(|| "-".to_string()),
        ));
        spans.extend(selector(Focus::Metric, state.metric_value().label().to_string()));
        spans.push(Span::styled(
            format!("[{}]", state.mode.label()),
            Style::default().fg(Color::Cyan),
        ));

        let title = match &state.search {
            Some(query) => format!("Buscar empresa: {}_", query),
            None => "Seleção".to_string(),
        };
        let paragraph = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(paragraph, self.selectors);
    }

    /// Key hints plus a status message
    pub fn render_status_bar(&self, f: &mut Frame, status_text: &str) {
        let key = |k: &'static str, color: Color| Span::styled(k, Style::default().fg(color).add_modifier(Modifier::BOLD));
        let text = |t: &'static str| Span::styled(t, Style::default().fg(Color::Gray));

        let status_content = vec![
            Line::from(vec![
                key("Tab", Color::Yellow),
                text(" views • "),
                key("←/→", Color::Yellow),
                text(" selector • "),
                key("↑/↓", Color::Yellow),
                text(" value • "),
                key("/", Color::Cyan),
                text(" search • "),
                key("M", Color::Cyan),
                text(" total/per member • "),
                key("+/-", Color::Cyan),
                text(" market % • "),
                key("R", Color::Green),
                text(" reload • "),
                key("Q", Color::Red),
                text(" quit"),
            ]),
            Line::from(vec![Span::styled(status_text.to_string(), Style::default().fg(Color::Cyan))]),
        ];

        let paragraph = Paragraph::new(status_content)
            .block(Block::default().borders(Borders::ALL))
            .style(Style::default().fg(Color::White));

        f.render_widget(paragraph, self.status_bar);
    }
}

/// Split an area into two columns with the given left percentage
pub fn split_columns(area: Rect, left_pct: u16) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(left_pct), Constraint::Percentage(100 - left_pct.min(100))])
        .split(area);
    (chunks[0], chunks[1])
}

/// Split an area into rows with the given top percentage
pub fn split_rows(area: Rect, top_pct: u16) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(top_pct), Constraint::Percentage(100 - top_pct.min(100))])
        .split(area);
    (chunks[0], chunks[1])
}
