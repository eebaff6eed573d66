use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table},
    Frame, Terminal,
};
use std::io;
use std::path::PathBuf;
use tracing::warn;

use super::components::{
    amount_bar, key_value_line, render_bar_chart, render_no_data, styled_attainment, BAR_COLORS,
};
use super::layout::{split_columns, split_rows, TuiLayout};
use super::state::{DashboardState, Tab};
use crate::analysis::{
    attainment, composition, governance_report, individual_range, project, ranking, sector_statistics,
    ProjectionRequest, DEFAULT_RANKING_LIMIT,
};
use crate::analysis::Filters;
use crate::models::Component;
use crate::storage::{read_merged, MergedTable};
use crate::utils::{format_brl, format_brl_int, format_multiple, format_percent, year_label, CompanyIndex};

pub struct DashboardApp {
    pub table: MergedTable,
    pub source: Option<PathBuf>,
    pub index: CompanyIndex,
    pub state: DashboardState,
    pub should_quit: bool,
}

impl DashboardApp {
    pub fn new(table: MergedTable, global: Filters, source: Option<PathBuf>) -> Self {
        let state = DashboardState::new(&table, global);
        Self {
            index: CompanyIndex::new(&table),
            table,
            source,
            state,
            should_quit: false,
        }
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let layout = TuiLayout::new(f.area());
        layout.render_tab_bar(f, self.state.tab);
        layout.render_selectors(f, &self.state);

        if self.state.is_empty() {
            render_no_data(
                f,
                layout.content,
                self.state.tab.title(),
                "Nenhum dado encontrado para os filtros globais selecionados.",
            );
        } else {
            match self.state.tab {
                Tab::Composition => self.render_composition(f, layout.content),
                Tab::VariablePay => self.render_variable_pay(f, layout.content),
                Tab::IndividualPay => self.render_individual_pay(f, layout.content),
                Tab::Statistics => self.render_statistics(f, layout.content),
                Tab::Benchmark => self.render_benchmark(f, layout.content),
                Tab::Governance => self.render_governance(f, layout.content),
            }
        }

        layout.render_status_bar(f, &self.state.status);
    }

    /// Company, body and year of the current selection
    fn selection(&self) -> Option<(String, String, i32)> {
        Some((
            self.state.company_id()?.to_string(),
            self.state.body_name()?.to_string(),
            self.state.year_value()?,
        ))
    }

    fn render_composition(&self, f: &mut Frame, area: Rect) {
        let Some((company, body, year)) = self.selection() else {
            return render_no_data(f, area, "Composição", "Selecione empresa, órgão e ano.");
        };
        let bodies = composition(&self.table, &self.state.global, &company, year);
        let Some(selected) = bodies.iter().find(|b| b.body == body) else {
            return render_no_data(f, area, "Composição", "A empresa não reportou este órgão no ano selecionado.");
        };

        let (chart_area, detail_area) = split_columns(area, 60);
        let bars = selected
            .components
            .iter()
            .enumerate()
            .map(|(i, share)| amount_bar(share.component.label(), share.value, BAR_COLORS[i % BAR_COLORS.len()]))
            .collect();
        render_bar_chart(
            f,
            chart_area,
            &format!("Componentes - {} ({})", body, year_label(year, None)),
            vec![(year.to_string(), bars)],
            7,
        );

        let mut lines = vec![key_value_line("Total do órgão", format_brl(selected.total))];
        if let Some(disclosed) = selected.disclosed_total {
            lines.push(key_value_line("Total declarado", format_brl(disclosed)));
        }
        lines.push(Line::from(""));
        for share in &selected.components {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<18}", share.component.label()), Style::default().fg(Color::Gray)),
                Span::raw(format!("{:>22}  ", format_brl(share.value))),
                Span::styled(format_percent(share.share), Style::default().fg(Color::Cyan)),
            ]));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Outros órgãos:", Style::default().fg(Color::Gray))));
        for other in bodies.iter().filter(|b| b.body != body) {
            lines.push(key_value_line(&other.body, format_brl_int(other.total)));
        }

        let paragraph = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Detalhe"));
        f.render_widget(paragraph, detail_area);
    }

    fn render_variable_pay(&self, f: &mut Frame, area: Rect) {
        let Some((company, body, _)) = self.selection() else {
            return render_no_data(f, area, "Bônus e PLR", "Selecione empresa e órgão.");
        };
        let rows = attainment(&self.table, &self.state.global, &company, &body);
        if rows.is_empty() {
            return render_no_data(f, area, "Bônus e PLR", "Não há dados de bônus ou PLR para esta seleção.");
        }

        let (chart_area, table_area) = split_rows(area, 55);
        let groups = rows
            .iter()
            .map(|row| {
                let label = format!("{} {}", row.component.label(), row.year);
                let bars = vec![
                    amount_bar("Alvo", row.target, Color::Blue),
                    amount_bar("Pago", row.paid, Color::Green),
                    amount_bar("Máx", row.approved_max, Color::Yellow),
                ];
                (label, bars)
            })
            .collect();
        render_bar_chart(f, chart_area, &format!("Alvo x Pago x Máximo - {}", body), groups, 6);

        let header = Row::new(vec!["Ano", "Componente", "Mínimo", "Alvo", "Máximo", "Pago", "Pago/Alvo", "Máx/Alvo"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let table_rows: Vec<Row> = rows
            .iter()
            .map(|row| {
                Row::new(vec![
                    Line::from(row.year.to_string()),
                    Line::from(row.component.label()),
                    Line::from(format_brl_int(row.minimum)),
                    Line::from(format_brl_int(row.target)),
                    Line::from(format_brl_int(row.approved_max)),
                    Line::from(format_brl_int(row.paid)),
                    Line::from(styled_attainment(row.paid_vs_target)),
                    Line::from(styled_attainment(row.max_vs_target)),
                ])
            })
            .collect();
        let widths = [
            Constraint::Length(6),
            Constraint::Length(12),
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Length(10),
            Constraint::Length(10),
        ];
        let table = Table::new(table_rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title("Atingimento de metas"));
        f.render_widget(table, table_area);
    }

    fn render_individual_pay(&self, f: &mut Frame, area: Rect) {
        let Some((company, body, year)) = self.selection() else {
            return render_no_data(f, area, "Remuneração Individual", "Selecione empresa, órgão e ano.");
        };
        let (chart_area, ranking_area) = split_columns(area, 50);

        let rows = individual_range(&self.table, &self.state.global, &company, &body);
        if rows.is_empty() {
            render_no_data(f, chart_area, "Evolução", "Não há dados de remuneração individual para esta seleção.");
        } else {
            let groups = rows
                .iter()
                .map(|row| {
                    let bars = vec![
                        amount_bar("Máx", row.highest, Color::Red),
                        amount_bar("Méd", row.average, Color::Yellow),
                        amount_bar("Mín", row.lowest, Color::Green),
                    ];
                    (row.year.to_string(), bars)
                })
                .collect();
            render_bar_chart(f, chart_area, "Evolução da Remuneração Individual", groups, 6);
        }

        let metric = if self.state.metric_value().is_individual_metric() {
            self.state.metric_value()
        } else {
            Component::HighestIndividual
        };
        let top = ranking(&self.table, &self.state.global, year, &body, metric, self.state.mode, DEFAULT_RANKING_LIMIT);
        if top.is_empty() {
            return render_no_data(f, ranking_area, "Ranking", "Sem valores para o ano selecionado.");
        }
        let lines: Vec<Line> = top
            .iter()
            .map(|entry| {
                Line::from(vec![
                    Span::styled(format!("{:>2}. ", entry.position), Style::default().fg(Color::Gray)),
                    Span::raw(format!("{:<40.40} ", entry.company_name)),
                    Span::styled(format_brl_int(entry.value), Style::default().fg(Color::Cyan)),
                ])
            })
            .collect();
        let title = format!("Top {} - {} ({})", DEFAULT_RANKING_LIMIT, metric.label(), year);
        f.render_widget(Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title)), ranking_area);
    }

    fn render_statistics(&self, f: &mut Frame, area: Rect) {
        let Some((_, body, year)) = self.selection() else {
            return render_no_data(f, area, "Estatísticas", "Selecione órgão e ano.");
        };
        let metric = self.state.metric_value();
        let stats = sector_statistics(&self.table, &self.state.global, year, &body, metric, self.state.mode);
        let Some(overall) = &stats.overall else {
            return render_no_data(f, area, "Estatísticas", "Não há dados para gerar a tabela de quartis.");
        };

        let header = Row::new(vec!["Setor", "N", "Média", "Desvio", "Mínimo", "1º Quartil", "Mediana", "3º Quartil", "Máximo"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let summary_row = |label: String, s: &crate::analysis::Summary, style: Style| {
            Row::new(vec![
                label,
                s.count.to_string(),
                format_brl_int(s.mean),
                s.std_dev.map(format_brl_int).unwrap_or_else(|| "-".to_string()),
                format_brl_int(s.min),
                format_brl_int(s.q1),
                format_brl_int(s.median),
                format_brl_int(s.q3),
                format_brl_int(s.max),
            ])
            .style(style)
        };
        let mut rows: Vec<Row> = stats
            .sectors
            .iter()
            .map(|s| summary_row(s.sector.clone(), &s.summary, Style::default()))
            .collect();
        rows.push(summary_row(
            "AMOSTRA TOTAL".to_string(),
            overall,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));

        let widths = [
            Constraint::Min(24),
            Constraint::Length(4),
            Constraint::Length(15),
            Constraint::Length(15),
            Constraint::Length(15),
            Constraint::Length(15),
            Constraint::Length(15),
            Constraint::Length(15),
            Constraint::Length(15),
        ];
        let title = format!(
            "{} por setor - {} ({}, {})",
            metric.label(),
            body,
            year_label(year, None),
            self.state.mode.label()
        );
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(table, area);
    }

    fn render_benchmark(&self, f: &mut Frame, area: Rect) {
        let Some((company, body, _)) = self.selection() else {
            return render_no_data(f, area, "Benchmark", "Selecione empresa e órgão.");
        };
        let mut request = ProjectionRequest::new(company, body.clone());
        request.peers = self.state.sector_peers(&self.table);
        request.market_adjustment_pct = self.state.market_adjustment_pct;
        request.mode = self.state.mode;

        let result = match project(&self.table, &self.state.global, &request) {
            Ok(result) => result,
            Err(e) => return render_no_data(f, area, "Benchmark", &e.to_string()),
        };
        if result.is_empty() {
            return render_no_data(f, area, "Benchmark", "A empresa não tem histórico para o órgão selecionado.");
        }

        let (chart_area, detail_area) = split_rows(area, 60);
        let groups = result
            .years()
            .into_iter()
            .map(|year| {
                let mut bars = vec![amount_bar("Base", result.base.year_total(year), Color::Cyan)];
                if let Some(average) = &result.peer_average {
                    bars.push(amount_bar("Pares", average.year_total(year), Color::Magenta));
                }
                (year_label(year, Some(result.projection_year)), bars)
            })
            .collect();
        render_bar_chart(
            f,
            chart_area,
            &format!("Projeção e Benchmarking ({}) - ajuste de mercado {:+.0}%", body, request.market_adjustment_pct),
            groups,
            8,
        );

        let mut lines = vec![key_value_line(
            "Pares",
            request
                .peers
                .as_ref()
                .map(|p| format!("{} ({} empresas)", p.name, result.peers.len()))
                .unwrap_or_else(|| "nenhum".to_string()),
        )];
        if let Some(projected) = result.base.values.get(&result.projection_year) {
            for (component, value) in projected {
                lines.push(key_value_line(
                    &format!("{} {}", component.label(), result.projection_year),
                    format_brl_int(*value),
                ));
            }
        }
        f.render_widget(
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(result.base.label.clone())),
            detail_area,
        );
    }

    fn render_governance(&self, f: &mut Frame, area: Rect) {
        let Some(year) = self.state.year_value() else {
            return render_no_data(f, area, "Governança", "Selecione um ano.");
        };
        let report = governance_report(&self.table, &self.state.global, year);
        let (top, bottom) = split_rows(area, 50);
        let (slice_area, balance_area) = split_columns(top, 50);

        if report.pay_slice.companies.is_empty() {
            render_no_data(f, slice_area, "CEO Pay Slice", "Sem remuneração máxima e média válidas neste ano.");
        } else {
            let mut lines = vec![Line::from(vec![
                Span::styled("Média ", Style::default().fg(Color::Gray)),
                Span::raw(report.pay_slice.market_mean.map(format_multiple).unwrap_or_default()),
                Span::styled("  Mediana ", Style::default().fg(Color::Gray)),
                Span::raw(report.pay_slice.market_median.map(format_multiple).unwrap_or_default()),
                Span::styled("  Máximo ", Style::default().fg(Color::Gray)),
                Span::raw(report.pay_slice.market_max.map(format_multiple).unwrap_or_default()),
            ])];
            lines.extend(report.pay_slice.companies.iter().take(DEFAULT_RANKING_LIMIT).map(|c| {
                Line::from(vec![
                    Span::raw(format!("{:<32.32} ", c.company_name)),
                    Span::styled(format_multiple(c.multiple), Style::default().fg(Color::Red)),
                ])
            }));
            f.render_widget(
                Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(format!("CEO Pay Slice {}", year))),
                slice_area,
            );
        }

        if report.board_balance.is_empty() {
            render_no_data(f, balance_area, "Conselho x Diretoria", "Não há dados suficientes neste ano.");
        } else {
            let lines: Vec<Line> = report
                .board_balance
                .iter()
                .take(DEFAULT_RANKING_LIMIT)
                .map(|b| {
                    Line::from(vec![
                        Span::raw(format!("{:<32.32} ", b.company_name)),
                        Span::styled(format_multiple(b.ratio), Style::default().fg(Color::Yellow)),
                    ])
                })
                .collect();
            f.render_widget(
                Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Diretoria / Conselho")),
                balance_area,
            );
        }

        if report.terminations.is_empty() {
            render_no_data(f, bottom, "Rescisões", "Nenhum pagamento de rescisão acima de 1% do total.");
        } else {
            let lines: Vec<Line> = report
                .terminations
                .iter()
                .take(DEFAULT_RANKING_LIMIT)
                .map(|t| {
                    Line::from(vec![
                        Span::raw(format!("{:<32.32} {:<26.26} ", t.company_name, t.body)),
                        Span::styled(format_percent(t.share_pct), Style::default().fg(Color::Red)),
                        Span::styled(format!("  {}", format_brl_int(t.termination_total)), Style::default().fg(Color::Gray)),
                    ])
                })
                .collect();
            f.render_widget(
                Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Rescisões e Pós-Emprego (% do total)")),
                bottom,
            );
        }
    }

    pub fn handle_key_event(&mut self, key: KeyCode) -> Result<()> {
        if self.state.search.is_some() {
            self.handle_search_key(key);
            return Ok(());
        }

        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab => self.state.tab = self.state.tab.next(),
            KeyCode::BackTab => self.state.tab = self.state.tab.previous(),
            KeyCode::Char(c @ '1'..='6') => {
                let index = c as usize - '1' as usize;
                self.state.tab = Tab::ALL[index];
            }
            KeyCode::Right => self.state.next_focus(),
            KeyCode::Left => self.state.previous_focus(),
            KeyCode::Down => self.state.step_selection(1),
            KeyCode::Up => self.state.step_selection(-1),
            KeyCode::Char('m') | KeyCode::Char('M') => self.state.toggle_mode(),
            KeyCode::Char('+') => self.state.adjust_market(1.0),
            KeyCode::Char('-') => self.state.adjust_market(-1.0),
            KeyCode::Char('/') => self.state.search = Some(String::new()),
            KeyCode::Char('r') | KeyCode::Char('R') => self.reload()?,
            _ => {}
        }
        Ok(())
    }

    fn handle_search_key(&mut self, key: KeyCode) {
        let Some(query) = self.state.search.as_mut() else {
            return;
        };
        match key {
            KeyCode::Esc => self.state.search = None,
            KeyCode::Backspace => {
                query.pop();
            }
            KeyCode::Char(c) => query.push(c),
            KeyCode::Enter => {
                let query = query.clone();
                self.state.search = None;
                match self.index.resolve(&query) {
                    Some(id) if self.state.select_company(&id) => {
                        self.state.status = format!("Empresa selecionada: {}", self.index.name_of(&id).unwrap_or(&id));
                    }
                    _ => self.state.status = format!("Nenhuma empresa encontrada para '{}'", query),
                }
            }
            _ => {}
        }
    }

    /// Re-read the merged file from disk, keeping the current table on failure
    fn reload(&mut self) -> Result<()> {
        let Some(path) = self.source.clone() else {
            return Ok(());
        };
        match read_merged(&path) {
            Ok(table) => {
                let tab = self.state.tab;
                let global = self.state.global.clone();
                *self = DashboardApp::new(table, global, Some(path));
                self.state.tab = tab;
            }
            Err(e) => {
                warn!("Reload failed: {}", e);
                self.state.status = format!("Falha ao recarregar: {}", e);
            }
        }
        Ok(())
    }
}

/// Run the dashboard until the user quits
pub fn run_app(table: MergedTable, global: Filters, source: Option<PathBuf>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let mut app = DashboardApp::new(table, global, source);

    let result = loop {
        if let Err(e) = terminal.draw(|f| app.draw(f)) {
            break Err(e.into());
        }

        if let Ok(Event::Key(key)) = event::read() {
            if key.kind == KeyEventKind::Press {
                if let Err(e) = app.handle_key_event(key.code) {
                    break Err(e);
                }

                if app.should_quit {
                    break Ok(());
                }
            }
        }
    };

    // Cleanup terminal
    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::normalize::EXECUTIVE_BOARD;
    use crate::models::FilingRecord;
    use ratatui::backend::TestBackend;

    fn record(company: &str, year: i32, component: Component, paid: f64) -> FilingRecord {
        FilingRecord {
            company_id: company.to_string(),
            company_name: format!("CIA {}", company),
            year,
            body: EXECUTIVE_BOARD.to_string(),
            component,
            target: 80.0,
            paid,
            approved_max: 150.0,
            minimum: 0.0,
            members: 3.0,
            sector: "BANCOS".to_string(),
            state: "SP".to_string(),
            control: "PRIVADO".to_string(),
            filing_version: 1,
        }
    }

    fn app() -> DashboardApp {
        let table = MergedTable::from_records(vec![
            record("1", 2023, Component::Salary, 300.0),
            record("1", 2023, Component::Bonus, 100.0),
            record("1", 2023, Component::BodyTotal, 400.0),
            record("1", 2023, Component::HighestIndividual, 200.0),
            record("1", 2023, Component::AverageIndividual, 120.0),
            record("2", 2023, Component::Salary, 250.0),
        ]);
        DashboardApp::new(table, Filters::default(), None)
    }

    #[test]
    fn test_every_tab_renders() {
        let mut app = app();
        let mut terminal = Terminal::new(TestBackend::new(160, 50)).unwrap();
        for tab in Tab::ALL {
            app.state.tab = tab;
            terminal.draw(|f| app.draw(f)).unwrap();
        }
    }

    #[test]
    fn test_empty_table_renders_no_data() {
        let mut app = DashboardApp::new(MergedTable::default(), Filters::default(), None);
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();

        let buffer = terminal.backend().buffer().clone();
        let text: String = buffer.content.iter().map(|cell| cell.symbol()).collect();
        assert!(text.contains("Sem dados"));
    }

    #[test]
    fn test_search_selects_company() {
        let mut app = app();
        app.handle_key_event(KeyCode::Char('/')).unwrap();
        for c in "cia 2".chars() {
            app.handle_key_event(KeyCode::Char(c)).unwrap();
        }
        app.handle_key_event(KeyCode::Enter).unwrap();
        assert_eq!(app.state.company_id(), Some("2"));
        assert!(app.state.search.is_none());
    }

    #[test]
    fn test_keys_switch_tabs_and_quit() {
        let mut app = app();
        app.handle_key_event(KeyCode::Char('4')).unwrap();
        assert_eq!(app.state.tab, Tab::Statistics);
        app.handle_key_event(KeyCode::BackTab).unwrap();
        assert_eq!(app.state.tab, Tab::IndividualPay);
        app.handle_key_event(KeyCode::Char('q')).unwrap();
        assert!(app.should_quit);
    }
}
