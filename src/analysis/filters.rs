use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::merger::normalize::{normalize_body, normalize_text};
use crate::models::{Component, FilingRecord};
use crate::storage::MergedTable;

/// How amounts are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CalcMode {
    #[default]
    Total,
    /// Amount divided by the number of remunerated members of the record
    PerMember,
}

impl CalcMode {
    /// Value of a record in this mode; `None` when a per-member value is undefined
    pub fn value(&self, amount: f64, members: f64) -> Option<f64> {
        match self {
            CalcMode::Total => Some(amount),
            CalcMode::PerMember if members > 0.0 => Some(amount / members),
            CalcMode::PerMember => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CalcMode::Total => "Total",
            CalcMode::PerMember => "Média por Membro",
        }
    }
}

/// A comparison set of companies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerGroup {
    pub name: String,
    pub companies: BTreeSet<String>,
}

impl PeerGroup {
    pub fn manual<I, S>(name: impl Into<String>, companies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            companies: companies.into_iter().map(Into::into).collect(),
        }
    }

    /// Every company of a sector
    pub fn from_sector(table: &MergedTable, sector: &str) -> Self {
        let sector = normalize_text(sector);
        let companies = table
            .records()
            .iter()
            .filter(|r| r.sector == sector)
            .map(|r| r.company_id.clone())
            .collect();
        Self { name: sector, companies }
    }

    pub fn contains(&self, company_id: &str) -> bool {
        self.companies.contains(company_id)
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }
}

/// Inclusive range of fiscal years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }
}

/// Record selection shared by all queries. Unset fields select everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub state: Option<String>,
    pub sector: Option<String>,
    pub control: Option<String>,
    pub company: Option<String>,
    pub body: Option<String>,
    pub years: Option<YearRange>,
    pub components: BTreeSet<Component>,
    pub peer_group: Option<PeerGroup>,
}

impl Filters {
    pub fn with_state(mut self, state: &str) -> Self {
        self.state = Some(normalize_text(state));
        self
    }

    pub fn with_sector(mut self, sector: &str) -> Self {
        self.sector = Some(normalize_text(sector));
        self
    }

    pub fn with_control(mut self, control: &str) -> Self {
        self.control = Some(normalize_text(control));
        self
    }

    pub fn with_company(mut self, company_id: &str) -> Self {
        self.company = Some(company_id.to_string());
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(normalize_body(body));
        self
    }

    pub fn with_years(mut self, years: YearRange) -> Self {
        self.years = Some(years);
        self
    }

    pub fn with_components(mut self, components: impl IntoIterator<Item = Component>) -> Self {
        self.components = components.into_iter().collect();
        self
    }

    pub fn with_peer_group(mut self, peers: PeerGroup) -> Self {
        self.peer_group = Some(peers);
        self
    }

    pub fn matches(&self, record: &FilingRecord) -> bool {
        let text_matches = |wanted: &Option<String>, actual: &str| wanted.as_deref().map_or(true, |w| w == actual);

        text_matches(&self.state, &record.state)
            && text_matches(&self.sector, &record.sector)
            && text_matches(&self.control, &record.control)
            && text_matches(&self.company, &record.company_id)
            && text_matches(&self.body, &record.body)
            && self.years.map_or(true, |range| range.contains(record.year))
            && (self.components.is_empty() || self.components.contains(&record.component))
            && self.peer_group.as_ref().map_or(true, |peers| peers.contains(&record.company_id))
    }

    pub fn apply<'a>(&self, table: &'a MergedTable) -> Vec<&'a FilingRecord> {
        table.records().iter().filter(|r| self.matches(r)).collect()
    }
}
