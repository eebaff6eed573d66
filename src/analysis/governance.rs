//! Governance risk indicators: pay dispersion, board versus executive pay and termination
//! payments.

use serde::Serialize;
use std::collections::BTreeMap;

use super::filters::Filters;
use super::statistics::describe;
use crate::merger::normalize::EXECUTIVE_BOARD;
use crate::models::Component;
use crate::storage::MergedTable;

/// Termination shares at or below this percentage are not reported
pub const TERMINATION_THRESHOLD_PCT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaySlice {
    pub company_id: String,
    pub company_name: String,
    pub highest: f64,
    pub average: f64,
    /// Highest individual pay divided by the board average
    pub multiple: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaySliceReport {
    pub year: i32,
    /// Largest multiple first
    pub companies: Vec<PaySlice>,
    pub market_mean: Option<f64>,
    pub market_median: Option<f64>,
    pub market_max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardBalance {
    pub company_id: String,
    pub company_name: String,
    pub executive_total: f64,
    pub board_total: f64,
    /// Executive total divided by board total
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminationFlag {
    pub company_id: String,
    pub company_name: String,
    pub body: String,
    pub sector: String,
    pub body_total: f64,
    pub termination_total: f64,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GovernanceReport {
    pub pay_slice: PaySliceReport,
    pub board_balance: Vec<BoardBalance>,
    pub terminations: Vec<TerminationFlag>,
}

/// Highest over average individual pay of the executive board, per company
pub fn ceo_pay_slice(table: &MergedTable, filters: &Filters, year: i32) -> PaySliceReport {
    let mut pairs: BTreeMap<&str, (&str, f64, f64)> = BTreeMap::new();
    for record in filters.clone().with_body(EXECUTIVE_BOARD).apply(table) {
        if record.year != year {
            continue;
        }
        let entry = pairs
            .entry(record.company_id.as_str())
            .or_insert((record.company_name.as_str(), 0.0, 0.0));
        match record.component {
            Component::HighestIndividual => entry.1 = record.paid,
            Component::AverageIndividual => entry.2 = record.paid,
            _ => {}
        }
    }

    let mut companies: Vec<PaySlice> = pairs
        .into_iter()
        .filter(|(_, (_, highest, average))| *highest > 0.0 && *average > 0.0)
        .map(|(id, (name, highest, average))| PaySlice {
            company_id: id.to_string(),
            company_name: name.to_string(),
            highest,
            average,
            multiple: highest / average,
        })
        .collect();
    companies.sort_by(|a, b| b.multiple.total_cmp(&a.multiple).then_with(|| a.company_id.cmp(&b.company_id)));

    let multiples: Vec<f64> = companies.iter().map(|c| c.multiple).collect();
    let summary = describe(&multiples);
    PaySliceReport {
        year,
        market_mean: summary.as_ref().map(|s| s.mean),
        market_median: summary.as_ref().map(|s| s.median),
        market_max: summary.as_ref().map(|s| s.max),
        companies,
    }
}

/// Executive board total against the councils' total, for companies disclosing both
pub fn board_balance(table: &MergedTable, filters: &Filters, year: i32) -> Vec<BoardBalance> {
    let mut totals: BTreeMap<&str, (&str, f64, f64)> = BTreeMap::new();
    for record in filters.clone().with_components([Component::BodyTotal]).apply(table) {
        if record.year != year {
            continue;
        }
        let entry = totals
            .entry(record.company_id.as_str())
            .or_insert((record.company_name.as_str(), 0.0, 0.0));
        if record.body.contains("DIRETORIA") {
            entry.1 += record.paid;
        } else if record.body.contains("CONSELHO") {
            entry.2 += record.paid;
        }
    }

    let mut balance: Vec<BoardBalance> = totals
        .into_iter()
        .filter(|(_, (_, executive, board))| *executive > 0.0 && *board > 0.0)
        .map(|(id, (name, executive_total, board_total))| BoardBalance {
            company_id: id.to_string(),
            company_name: name.to_string(),
            executive_total,
            board_total,
            ratio: executive_total / board_total,
        })
        .collect();
    balance.sort_by(|a, b| b.ratio.total_cmp(&a.ratio).then_with(|| a.company_id.cmp(&b.company_id)));
    balance
}

/// Bodies whose termination and post-employment pay exceed the threshold share of their total
pub fn termination_flags(table: &MergedTable, filters: &Filters, year: i32) -> Vec<TerminationFlag> {
    let scoped = filters.clone().with_components([
        Component::BodyTotal,
        Component::Termination,
        Component::PostEmployment,
    ]);

    let mut bodies: BTreeMap<(&str, &str), TerminationFlag> = BTreeMap::new();
    for record in scoped.apply(table) {
        if record.year != year {
            continue;
        }
        let flag = bodies
            .entry((record.company_id.as_str(), record.body.as_str()))
            .or_insert_with(|| TerminationFlag {
                company_id: record.company_id.clone(),
                company_name: record.company_name.clone(),
                body: record.body.clone(),
                sector: record.sector.clone(),
                body_total: 0.0,
                termination_total: 0.0,
                share_pct: 0.0,
            });
        match record.component {
            Component::BodyTotal => flag.body_total = record.paid,
            _ => flag.termination_total += record.paid,
        }
    }

    let mut flags: Vec<TerminationFlag> = bodies
        .into_values()
        .filter(|f| f.body_total > 0.0)
        .map(|mut f| {
            f.share_pct = f.termination_total / f.body_total * 100.0;
            f
        })
        .filter(|f| f.share_pct > TERMINATION_THRESHOLD_PCT)
        .collect();
    flags.sort_by(|a, b| b.share_pct.total_cmp(&a.share_pct));
    flags
}

pub fn governance_report(table: &MergedTable, filters: &Filters, year: i32) -> GovernanceReport {
    GovernanceReport {
        pay_slice: ceo_pay_slice(table, filters, year),
        board_balance: board_balance(table, filters, year),
        terminations: termination_flags(table, filters, year),
    }
}
