use crate::analysis::{CalcMode, Filters, PeerGroup};
use crate::merger::normalize::EXECUTIVE_BOARD;
use crate::models::Component;
use crate::storage::MergedTable;

/// Dashboard tabs, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Composition,
    VariablePay,
    IndividualPay,
    Statistics,
    Benchmark,
    Governance,
}

impl Tab {
    pub const ALL: [Tab; 6] = [
        Tab::Composition,
        Tab::VariablePay,
        Tab::IndividualPay,
        Tab::Statistics,
        Tab::Benchmark,
        Tab::Governance,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Composition => "Composition",
            Tab::VariablePay => "Bonus & PLR",
            Tab::IndividualPay => "Individual Pay",
            Tab::Statistics => "Statistics",
            Tab::Benchmark => "Benchmark",
            Tab::Governance => "Governance",
        }
    }

    pub fn index(&self) -> usize {
        Tab::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn previous(&self) -> Tab {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

/// Selector that arrow keys currently change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Company,
    Body,
    Year,
    Metric,
}

impl Focus {
    const ORDER: [Focus; 4] = [Focus::Company, Focus::Body, Focus::Year, Focus::Metric];

    pub fn label(&self) -> &'static str {
        match self {
            Focus::Company => "Empresa",
            Focus::Body => "Órgão",
            Focus::Year => "Ano",
            Focus::Metric => "Métrica",
        }
    }

    fn shift(&self, step: isize) -> Focus {
        let len = Focus::ORDER.len() as isize;
        let index = Focus::ORDER.iter().position(|f| f == self).unwrap_or(0) as isize;
        Focus::ORDER[((index + step).rem_euclid(len)) as usize]
    }
}

/// Metrics offered on the statistics and ranking views
pub const STAT_METRICS: [Component; 7] = [
    Component::HighestIndividual,
    Component::AverageIndividual,
    Component::LowestIndividual,
    Component::BodyTotal,
    Component::Salary,
    Component::Bonus,
    Component::ShareRecognized,
];

/// User selections of the dashboard; everything else is recomputed on each render
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub tab: Tab,
    pub focus: Focus,
    pub companies: Vec<(String, String)>,
    pub company: usize,
    pub bodies: Vec<String>,
    pub body: usize,
    pub years: Vec<i32>,
    pub year: usize,
    pub metric: usize,
    pub mode: CalcMode,
    pub market_adjustment_pct: f64,
    /// Text typed after `/`; `None` outside search mode
    pub search: Option<String>,
    pub global: Filters,
    pub status: String,
}

impl DashboardState {
    pub fn new(table: &MergedTable, global: Filters) -> Self {
        let scoped = MergedTable::from_records(global.apply(table).into_iter().cloned().collect());
        let companies: Vec<(String, String)> = scoped.companies().into_iter().collect();
        let bodies = scoped.bodies();
        let years = scoped.years();
        let body = bodies.iter().position(|b| b == EXECUTIVE_BOARD).unwrap_or(0);

        Self {
            tab: Tab::Composition,
            focus: Focus::Company,
            status: format!("{} registros, {} empresas", scoped.len(), companies.len()),
            company: 0,
            body,
            year: years.len().saturating_sub(1),
            companies,
            bodies,
            years,
            metric: 0,
            mode: CalcMode::Total,
            market_adjustment_pct: 5.0,
            search: None,
            global,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    pub fn company_id(&self) -> Option<&str> {
        self.companies.get(self.company).map(|(id, _)| id.as_str())
    }

    pub fn company_name(&self) -> Option<&str> {
        self.companies.get(self.company).map(|(_, name)| name.as_str())
    }

    pub fn body_name(&self) -> Option<&str> {
        self.bodies.get(self.body).map(String::as_str)
    }

    pub fn year_value(&self) -> Option<i32> {
        self.years.get(self.year).copied()
    }

    pub fn metric_value(&self) -> Component {
        STAT_METRICS[self.metric % STAT_METRICS.len()]
    }

    pub fn next_focus(&mut self) {
        self.focus = self.focus.shift(1);
    }

    pub fn previous_focus(&mut self) {
        self.focus = self.focus.shift(-1);
    }

    /// Move the focused selector by `step`, wrapping around
    pub fn step_selection(&mut self, step: isize) {
        let wrap = |current: usize, len: usize| -> usize {
            if len == 0 {
                0
            } else {
                (current as isize + step).rem_euclid(len as isize) as usize
            }
        };
        match self.focus {
            Focus::Company => self.company = wrap(self.company, self.companies.len()),
            Focus::Body => self.body = wrap(self.body, self.bodies.len()),
            Focus::Year => self.year = wrap(self.year, self.years.len()),
            Focus::Metric => self.metric = wrap(self.metric, STAT_METRICS.len()),
        }
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            CalcMode::Total => CalcMode::PerMember,
            CalcMode::PerMember => CalcMode::Total,
        };
    }

    pub fn adjust_market(&mut self, delta: f64) {
        self.market_adjustment_pct = (self.market_adjustment_pct + delta).clamp(-50.0, 100.0);
    }

    pub fn select_company(&mut self, company_id: &str) -> bool {
        match self.companies.iter().position(|(id, _)| id == company_id) {
            Some(index) => {
                self.company = index;
                true
            }
            None => false,
        }
    }

    /// Peers for benchmarking: the selected company's sector
    pub fn sector_peers(&self, table: &MergedTable) -> Option<PeerGroup> {
        let company = self.company_id()?;
        let sector = table
            .records()
            .iter()
            .find(|r| r.company_id == company)
            .map(|r| r.sector.clone())?;
        Some(PeerGroup::from_sector(table, &sector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilingRecord;

    fn record(company: &str, year: i32, body: &str) -> FilingRecord {
        FilingRecord {
            company_id: company.to_string(),
            company_name: format!("CIA {}", company),
            year,
            body: body.to_string(),
            component: Component::Salary,
            target: 0.0,
            paid: 1.0,
            approved_max: 0.0,
            minimum: 0.0,
            members: 1.0,
            sector: "BANCOS".to_string(),
            state: "SP".to_string(),
            control: "PRIVADO".to_string(),
            filing_version: 1,
        }
    }

    fn table() -> MergedTable {
        MergedTable::from_records(vec![
            record("1", 2022, "CONSELHO FISCAL"),
            record("1", 2023, EXECUTIVE_BOARD),
            record("2", 2023, EXECUTIVE_BOARD),
        ])
    }

    #[test]
    fn test_defaults_pick_executive_board_and_last_year() {
        let state = DashboardState::new(&table(), Filters::default());
        assert_eq!(state.body_name(), Some(EXECUTIVE_BOARD));
        assert_eq!(state.year_value(), Some(2023));
        assert_eq!(state.company_id(), Some("1"));
    }

    #[test]
    fn test_selection_wraps() {
        let mut state = DashboardState::new(&table(), Filters::default());
        state.step_selection(-1);
        assert_eq!(state.company_id(), Some("2"));
        state.next_focus();
        state.next_focus();
        state.step_selection(1);
        assert_eq!(state.year_value(), Some(2022));
        state.previous_focus();
        state.previous_focus();
        state.previous_focus();
        assert_eq!(state.focus, Focus::Metric);
    }

    #[test]
    fn test_tabs_cycle() {
        assert_eq!(Tab::Governance.next(), Tab::Composition);
        assert_eq!(Tab::Composition.previous(), Tab::Governance);
    }

    #[test]
    fn test_empty_table() {
        let state = DashboardState::new(&MergedTable::default(), Filters::default());
        assert!(state.is_empty());
        assert_eq!(state.company_id(), None);
        assert_eq!(state.year_value(), None);
    }
}
