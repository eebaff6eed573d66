//! Budget projection of a company's pay mix against market peers.

use chrono::Datelike;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::filters::{CalcMode, Filters, PeerGroup, YearRange};
use crate::error::{PipelineError, PipelineResult};
use crate::models::Component;
use crate::storage::MergedTable;

/// Components shown in the projection grid
pub const PROJECTION_COMPONENTS: [Component; 6] = [
    Component::Salary,
    Component::Benefits,
    Component::Bonus,
    Component::ProfitSharing,
    Component::ShareBased,
    Component::OtherFixed,
];

pub const PEER_AVERAGE: &str = "Média dos Pares";

/// Scenario for a projection
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionRequest {
    pub company_id: String,
    pub body: String,
    /// Defaults to the year after the last year with data; must be later than that year
    pub projection_year: Option<i32>,
    /// Replaces the last year's value of a component
    pub last_year_overrides: BTreeMap<Component, f64>,
    /// Replaces the projected value of a component
    pub projection_overrides: BTreeMap<Component, f64>,
    pub peers: Option<PeerGroup>,
    /// Percentage applied to the peers' last year to project them
    pub market_adjustment_pct: f64,
    pub window: Option<YearRange>,
    pub mode: CalcMode,
}

impl ProjectionRequest {
    pub fn new(company_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            body: body.into(),
            projection_year: None,
            last_year_overrides: BTreeMap::new(),
            projection_overrides: BTreeMap::new(),
            peers: None,
            market_adjustment_pct: 5.0,
            window: None,
            mode: CalcMode::Total,
        }
    }
}

/// One company (or the peer average) across years
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionSeries {
    pub label: String,
    pub company_id: Option<String>,
    /// year -> component -> value
    pub values: BTreeMap<i32, BTreeMap<Component, f64>>,
}

impl ProjectionSeries {
    pub fn year_total(&self, year: i32) -> f64 {
        self.values.get(&year).map(|c| c.values().sum()).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionResult {
    pub projection_year: i32,
    pub base: ProjectionSeries,
    pub peers: Vec<ProjectionSeries>,
    pub peer_average: Option<ProjectionSeries>,
}

impl ProjectionResult {
    pub fn years(&self) -> Vec<i32> {
        self.base.values.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.base.values.values().all(|c| c.values().all(|v| *v == 0.0))
    }
}

/// Historical values per year for one company and body, zero-filled over `years`
fn history(
    table: &MergedTable,
    filters: &Filters,
    company_id: &str,
    body: &str,
    years: &[i32],
    mode: CalcMode,
) -> BTreeMap<i32, BTreeMap<Component, f64>> {
    let mut values: BTreeMap<i32, BTreeMap<Component, f64>> = years
        .iter()
        .map(|&y| (y, PROJECTION_COMPONENTS.iter().map(|&c| (c, 0.0)).collect()))
        .collect();

    let scoped = filters
        .clone()
        .with_company(company_id)
        .with_body(body)
        .with_components(PROJECTION_COMPONENTS);
    for record in scoped.apply(table) {
        if let (Some(year), Some(value)) = (values.get_mut(&record.year), mode.value(record.paid, record.members)) {
            year.insert(record.component, value);
        }
    }
    values
}

/// Project the next budget cycle of a company and compare it with peers.
///
/// Historical years are never overwritten: a projection year at or before the last year with
/// data is rejected with `InvalidProjection`.
pub fn project(table: &MergedTable, filters: &Filters, request: &ProjectionRequest) -> PipelineResult<ProjectionResult> {
    let historical_years: Vec<i32> = filters
        .clone()
        .with_body(&request.body)
        .apply(table)
        .iter()
        .map(|r| r.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let last_year = historical_years.last().copied();
    let projection_year = request
        .projection_year
        .unwrap_or_else(|| last_year.map_or_else(|| chrono::Utc::now().year(), |y| y + 1));
    if let Some(last_year) = last_year.filter(|&last| projection_year <= last) {
        return Err(PipelineError::InvalidProjection {
            year: projection_year,
            last_year,
        });
    }

    let mut base_values = history(table, filters, &request.company_id, &request.body, &historical_years, request.mode);
    if let Some(last) = last_year.and_then(|y| base_values.get_mut(&y)) {
        last.extend(request.last_year_overrides.iter().map(|(c, v)| (*c, *v)));
    }
    let mut projected: BTreeMap<Component, f64> = last_year
        .and_then(|y| base_values.get(&y).cloned())
        .unwrap_or_else(|| PROJECTION_COMPONENTS.iter().map(|&c| (c, 0.0)).collect());
    projected.extend(request.projection_overrides.iter().map(|(c, v)| (*c, *v)));
    base_values.insert(projection_year, projected);

    let company_name = table
        .companies()
        .get(&request.company_id)
        .cloned()
        .unwrap_or_else(|| request.company_id.clone());
    let base = ProjectionSeries {
        label: format!("{} (projeção)", company_name),
        company_id: Some(request.company_id.clone()),
        values: base_values,
    };

    let factor = 1.0 + request.market_adjustment_pct / 100.0;
    let names = table.companies();
    let peers: Vec<ProjectionSeries> = request
        .peers
        .iter()
        .flat_map(|group| group.companies.iter())
        .filter(|id| **id != request.company_id)
        .map(|id| {
            let mut values = history(table, filters, id, &request.body, &historical_years, request.mode);
            let projected: BTreeMap<Component, f64> = last_year
                .and_then(|y| values.get(&y))
                .map(|last| last.iter().map(|(c, v)| (*c, v * factor)).collect())
                .unwrap_or_else(|| PROJECTION_COMPONENTS.iter().map(|&c| (c, 0.0)).collect());
            values.insert(projection_year, projected);
            ProjectionSeries {
                label: names.get(id).cloned().unwrap_or_else(|| id.clone()),
                company_id: Some(id.clone()),
                values,
            }
        })
        .collect();

    let peer_average = (!peers.is_empty()).then(|| {
        let mut values: BTreeMap<i32, BTreeMap<Component, f64>> = BTreeMap::new();
        for peer in &peers {
            for (year, components) in &peer.values {
                let entry = values.entry(*year).or_default();
                for (component, value) in components {
                    *entry.entry(*component).or_insert(0.0) += value / peers.len() as f64;
                }
            }
        }
        ProjectionSeries {
            label: PEER_AVERAGE.to_string(),
            company_id: None,
            values,
        }
    });

    let mut result = ProjectionResult {
        projection_year,
        base,
        peers,
        peer_average,
    };
    if let Some(window) = request.window {
        let keep = |series: &mut ProjectionSeries| series.values.retain(|year, _| window.contains(*year));
        keep(&mut result.base);
        result.peers.iter_mut().for_each(keep);
        if let Some(average) = result.peer_average.as_mut() {
            keep(average);
        }
    }
    Ok(result)
}
