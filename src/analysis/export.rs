//! CSV export of query results.

use std::io::Write;
use std::path::Path;

use super::benchmark::{ProjectionResult, ProjectionSeries};
use super::governance::GovernanceReport;
use super::queries::{
    AttainmentRow, BodyComposition, IndividualRangeRow, PeerComparison, RankingEntry, SectorStatistics, YearBreakdown,
};
use super::statistics::Summary;
use crate::error::PipelineResult;
use crate::utils::sanitize_text;

/// A rectangular result ready to be written out
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write as comma-delimited CSV with control characters stripped from every cell
    pub fn write_to<W: Write>(&self, writer: W) -> PipelineResult<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(self.headers.iter().map(|h| sanitize_text(h)))?;
        for row in &self.rows {
            csv.write_record(row.iter().map(|cell| sanitize_text(cell)))?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn write_file(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.write_to(std::fs::File::create(path)?)
    }
}

/// Query results that can be exported
pub trait Exportable {
    fn to_export(&self) -> ExportTable;
}

fn num(value: f64) -> String {
    value.to_string()
}

fn opt(value: Option<f64>) -> String {
    value.map(num).unwrap_or_default()
}

fn summary_cells(summary: &Summary) -> Vec<String> {
    vec![
        summary.count.to_string(),
        num(summary.mean),
        opt(summary.std_dev),
        num(summary.min),
        num(summary.q1),
        num(summary.median),
        num(summary.q3),
        num(summary.max),
    ]
}

const SUMMARY_HEADERS: [&str; 8] = ["count", "mean", "std_dev", "min", "q1", "median", "q3", "max"];

impl Exportable for Vec<BodyComposition> {
    fn to_export(&self) -> ExportTable {
        let mut table = ExportTable::new(&["body", "component", "value", "share_pct", "body_total"]);
        for body in self {
            for share in &body.components {
                table.push(vec![
                    body.body.clone(),
                    share.component.code().to_string(),
                    num(share.value),
                    num(share.share),
                    num(body.total),
                ]);
            }
        }
        table
    }
}

impl Exportable for Vec<YearBreakdown> {
    fn to_export(&self) -> ExportTable {
        let mut table = ExportTable::new(&["year", "component", "value", "year_total"]);
        for year in self {
            for (component, value) in &year.components {
                table.push(vec![year.year.to_string(), component.code().to_string(), num(*value), num(year.total)]);
            }
        }
        table
    }
}

impl Exportable for Vec<RankingEntry> {
    fn to_export(&self) -> ExportTable {
        let mut table = ExportTable::new(&["position", "company_id", "company_name", "sector", "value"]);
        for entry in self {
            table.push(vec![
                entry.position.to_string(),
                entry.company_id.clone(),
                entry.company_name.clone(),
                entry.sector.clone(),
                num(entry.value),
            ]);
        }
        table
    }
}

impl Exportable for Vec<AttainmentRow> {
    fn to_export(&self) -> ExportTable {
        let mut table = ExportTable::new(&[
            "year",
            "component",
            "minimum",
            "target",
            "approved_max",
            "paid",
            "paid_vs_target_pct",
            "max_vs_target_pct",
        ]);
        for row in self {
            table.push(vec![
                row.year.to_string(),
                row.component.code().to_string(),
                num(row.minimum),
                num(row.target),
                num(row.approved_max),
                num(row.paid),
                opt(row.paid_vs_target),
                opt(row.max_vs_target),
            ]);
        }
        table
    }
}

impl Exportable for Vec<IndividualRangeRow> {
    fn to_export(&self) -> ExportTable {
        let mut table = ExportTable::new(&["year", "highest", "average", "lowest", "members"]);
        for row in self {
            table.push(vec![
                row.year.to_string(),
                num(row.highest),
                num(row.average),
                num(row.lowest),
                num(row.members),
            ]);
        }
        table
    }
}

impl Exportable for SectorStatistics {
    fn to_export(&self) -> ExportTable {
        let mut headers = vec!["sector"];
        headers.extend(SUMMARY_HEADERS);
        let mut table = ExportTable::new(&headers);
        for sector in &self.sectors {
            let mut row = vec![sector.sector.clone()];
            row.extend(summary_cells(&sector.summary));
            table.push(row);
        }
        if let Some(overall) = &self.overall {
            let mut row = vec!["TOTAL".to_string()];
            row.extend(summary_cells(overall));
            table.push(row);
        }
        table
    }
}

impl Exportable for PeerComparison {
    fn to_export(&self) -> ExportTable {
        let mut table = ExportTable::new(&["group", "company_id", "company_name", "value"]);
        for value in &self.values {
            table.push(vec![
                self.group.clone(),
                value.company_id.clone(),
                value.company_name.clone(),
                num(value.value),
            ]);
        }
        table
    }
}

fn push_series(table: &mut ExportTable, series: &ProjectionSeries, projection_year: i32) {
    for (year, components) in &series.values {
        for (component, value) in components {
            table.push(vec![
                series.label.clone(),
                year.to_string(),
                (*year == projection_year).to_string(),
                component.code().to_string(),
                num(*value),
            ]);
        }
    }
}

impl Exportable for ProjectionResult {
    fn to_export(&self) -> ExportTable {
        let mut table = ExportTable::new(&["series", "year", "projected", "component", "value"]);
        push_series(&mut table, &self.base, self.projection_year);
        for peer in &self.peers {
            push_series(&mut table, peer, self.projection_year);
        }
        if let Some(average) = &self.peer_average {
            push_series(&mut table, average, self.projection_year);
        }
        table
    }
}

impl Exportable for GovernanceReport {
    fn to_export(&self) -> ExportTable {
        let mut table = ExportTable::new(&["indicator", "company_id", "company_name", "body", "value", "detail"]);
        for slice in &self.pay_slice.companies {
            table.push(vec![
                "ceo_pay_slice".to_string(),
                slice.company_id.clone(),
                slice.company_name.clone(),
                crate::merger::normalize::EXECUTIVE_BOARD.to_string(),
                num(slice.multiple),
                format!("highest={} average={}", slice.highest, slice.average),
            ]);
        }
        for balance in &self.board_balance {
            table.push(vec![
                "board_balance".to_string(),
                balance.company_id.clone(),
                balance.company_name.clone(),
                String::new(),
                num(balance.ratio),
                format!("executive={} board={}", balance.executive_total, balance.board_total),
            ]);
        }
        for flag in &self.terminations {
            table.push(vec![
                "termination_share_pct".to_string(),
                flag.company_id.clone(),
                flag.company_name.clone(),
                flag.body.clone(),
                num(flag.share_pct),
                format!("termination={} total={}", flag.termination_total, flag.body_total),
            ]);
        }
        table
    }
}
