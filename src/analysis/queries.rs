//! Read-only queries over the merged table. Empty selections return empty results, never errors.

use serde::Serialize;
use std::collections::BTreeMap;

use super::filters::{CalcMode, Filters, PeerGroup};
use super::statistics::{describe, Summary};
use crate::merger::normalize::normalize_body;
use crate::models::{Component, FilingRecord};
use crate::storage::MergedTable;

pub const DEFAULT_RANKING_LIMIT: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentShare {
    pub component: Component,
    pub value: f64,
    /// Percentage of the body total
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyComposition {
    pub body: String,
    pub components: Vec<ComponentShare>,
    /// Sum of the pay-mix components
    pub total: f64,
    /// Total as disclosed by the company, when present
    pub disclosed_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearBreakdown {
    pub year: i32,
    pub components: Vec<(Component, f64)>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub position: usize,
    pub company_id: String,
    pub company_name: String,
    pub sector: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttainmentRow {
    pub year: i32,
    pub component: Component,
    pub minimum: f64,
    pub target: f64,
    pub approved_max: f64,
    pub paid: f64,
    /// Paid as a percentage of target; undefined without a target
    pub paid_vs_target: Option<f64>,
    pub max_vs_target: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndividualRangeRow {
    pub year: i32,
    pub highest: f64,
    pub average: f64,
    pub lowest: f64,
    pub members: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorSummary {
    pub sector: String,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorStatistics {
    pub year: i32,
    pub body: String,
    pub metric: Component,
    pub mode: CalcMode,
    pub sectors: Vec<SectorSummary>,
    /// The whole filtered sample
    pub overall: Option<Summary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyValue {
    pub company_id: String,
    pub company_name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerComparison {
    pub group: String,
    pub values: Vec<CompanyValue>,
    pub summary: Option<Summary>,
}

impl PeerComparison {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn company_body(filters: &Filters, company_id: &str, body: &str) -> Filters {
    filters.clone().with_company(company_id).with_body(body)
}

/// Component breakdown of every body of a company in one year
pub fn composition(table: &MergedTable, filters: &Filters, company_id: &str, year: i32) -> Vec<BodyComposition> {
    let mut bodies: BTreeMap<&str, Vec<&FilingRecord>> = BTreeMap::new();
    for record in filters
        .clone()
        .with_company(company_id)
        .apply(table)
        .into_iter()
        .filter(|r| r.year == year)
    {
        bodies.entry(record.body.as_str()).or_default().push(record);
    }

    bodies
        .into_iter()
        .map(|(body, records)| {
            let value_of = |component: Component| {
                records
                    .iter()
                    .find(|r| r.component == component)
                    .map(|r| r.paid)
            };
            let values: Vec<(Component, f64)> = Component::PAY_MIX
                .iter()
                .filter_map(|&c| value_of(c).filter(|v| *v != 0.0).map(|v| (c, v)))
                .collect();
            let total: f64 = values.iter().map(|(_, v)| v).sum();
            let components = values
                .into_iter()
                .map(|(component, value)| ComponentShare {
                    component,
                    value,
                    share: if total != 0.0 { value / total * 100.0 } else { 0.0 },
                })
                .collect();
            BodyComposition {
                body: body.to_string(),
                components,
                total,
                disclosed_total: value_of(Component::BodyTotal),
            }
        })
        .collect()
}

/// Pay-mix components of one body across years
pub fn evolution(
    table: &MergedTable,
    filters: &Filters,
    company_id: &str,
    body: &str,
    mode: CalcMode,
) -> Vec<YearBreakdown> {
    let mut years: BTreeMap<i32, Vec<(Component, f64)>> = BTreeMap::new();
    for record in company_body(filters, company_id, body).apply(table) {
        if !Component::PAY_MIX.contains(&record.component) {
            continue;
        }
        if let Some(value) = mode.value(record.paid, record.members) {
            years.entry(record.year).or_default().push((record.component, value));
        }
    }

    years
        .into_iter()
        .map(|(year, components)| YearBreakdown {
            year,
            total: components.iter().map(|(_, v)| v).sum(),
            components,
        })
        .collect()
}

/// Companies with the highest value of a component in a year, largest first
pub fn ranking(
    table: &MergedTable,
    filters: &Filters,
    year: i32,
    body: &str,
    metric: Component,
    mode: CalcMode,
    limit: usize,
) -> Vec<RankingEntry> {
    let mut entries: Vec<RankingEntry> = metric_values(table, filters, year, body, metric, mode)
        .into_iter()
        .map(|(record, value)| RankingEntry {
            position: 0,
            company_id: record.company_id.clone(),
            company_name: record.company_name.clone(),
            sector: record.sector.clone(),
            value,
        })
        .collect();

    entries.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.company_id.cmp(&b.company_id)));
    entries.truncate(limit);
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.position = index + 1;
    }
    entries
}

/// Bonus and PLR attainment per year
pub fn attainment(table: &MergedTable, filters: &Filters, company_id: &str, body: &str) -> Vec<AttainmentRow> {
    let percent = |value: f64, target: f64| (target > 0.0).then(|| value / target * 100.0);

    company_body(filters, company_id, body)
        .apply(table)
        .into_iter()
        .filter(|r| r.component.is_variable())
        .map(|r| AttainmentRow {
            year: r.year,
            component: r.component,
            minimum: r.minimum,
            target: r.target,
            approved_max: r.approved_max,
            paid: r.paid,
            paid_vs_target: percent(r.paid, r.target),
            max_vs_target: percent(r.approved_max, r.target),
        })
        .collect()
}

/// Highest, average and lowest individual pay per year
pub fn individual_range(table: &MergedTable, filters: &Filters, company_id: &str, body: &str) -> Vec<IndividualRangeRow> {
    let mut years: BTreeMap<i32, IndividualRangeRow> = BTreeMap::new();
    for record in company_body(filters, company_id, body).apply(table) {
        if !record.component.is_individual_metric() {
            continue;
        }
        let row = years.entry(record.year).or_insert(IndividualRangeRow {
            year: record.year,
            highest: 0.0,
            average: 0.0,
            lowest: 0.0,
            members: record.members,
        });
        match record.component {
            Component::HighestIndividual => row.highest = record.paid,
            Component::AverageIndividual => row.average = record.paid,
            Component::LowestIndividual => row.lowest = record.paid,
            _ => {}
        }
    }
    years.into_values().collect()
}

/// Quartile statistics of a metric grouped by sector, plus the whole sample
pub fn sector_statistics(
    table: &MergedTable,
    filters: &Filters,
    year: i32,
    body: &str,
    metric: Component,
    mode: CalcMode,
) -> SectorStatistics {
    let values = metric_values(table, filters, year, body, metric, mode);

    let mut by_sector: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (record, value) in &values {
        by_sector.entry(record.sector.as_str()).or_default().push(*value);
    }
    let sectors = by_sector
        .into_iter()
        .filter_map(|(sector, sample)| {
            describe(&sample).map(|summary| SectorSummary {
                sector: sector.to_string(),
                summary,
            })
        })
        .collect();

    let all: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
    SectorStatistics {
        year,
        body: normalize_body(body),
        metric,
        mode,
        sectors,
        overall: describe(&all),
    }
}

/// Statistics of a metric over the companies of a peer group
pub fn peer_comparison(
    table: &MergedTable,
    filters: &Filters,
    peers: &PeerGroup,
    year: i32,
    body: &str,
    metric: Component,
    mode: CalcMode,
) -> PeerComparison {
    let scoped = filters.clone().with_peer_group(peers.clone());
    let values: Vec<CompanyValue> = metric_values(table, &scoped, year, body, metric, mode)
        .into_iter()
        .map(|(record, value)| CompanyValue {
            company_id: record.company_id.clone(),
            company_name: record.company_name.clone(),
            value,
        })
        .collect();
    let sample: Vec<f64> = values.iter().map(|v| v.value).collect();

    PeerComparison {
        group: peers.name.clone(),
        summary: describe(&sample),
        values,
    }
}

/// Positive values of one component for every selected company in a year
fn metric_values<'a>(
    table: &'a MergedTable,
    filters: &Filters,
    year: i32,
    body: &str,
    metric: Component,
    mode: CalcMode,
) -> Vec<(&'a FilingRecord, f64)> {
    filters
        .clone()
        .with_body(body)
        .apply(table)
        .into_iter()
        .filter(|r| r.year == year && r.component == metric)
        .filter_map(|r| mode.value(r.paid, r.members).map(|v| (r, v)))
        .filter(|(_, v)| *v > 0.0)
        .collect()
}
