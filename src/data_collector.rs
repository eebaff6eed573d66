use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{write_raw_table, FilingSource, RawTable, TableKind};
use crate::error::PipelineResult;
use crate::merger::columns::{Column, ColumnMap};
use crate::merger::normalize::cnpj_digits;
use crate::merger::{merge_tables, MergeReport};
use crate::models::Config;
use crate::storage::write_merged;

pub const MANIFEST_FILE: &str = "refresh_manifest.json";

/// What the last successful refresh did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshManifest {
    pub refreshed_at: DateTime<Utc>,
    pub source: String,
    pub years: Vec<i32>,
    pub companies: Vec<String>,
    pub merged_file: PathBuf,
    pub input_rows: usize,
    pub emitted_rows: usize,
    pub duplicates_removed: usize,
    pub skipped_rows: usize,
}

/// Fetches every table a merge needs from one source
pub struct DataCollector {
    source: Arc<dyn FilingSource>,
    config: Config,
}

impl DataCollector {
    pub fn new(source: Arc<dyn FilingSource>, config: Config) -> Self {
        Self { source, config }
    }

    /// Fetch all yearly tables for the configured years plus the company registry.
    ///
    /// Requests run one at a time; the first failure aborts the collection.
    pub async fn collect(&self) -> PipelineResult<Vec<RawTable>> {
        info!(
            "📊 Collecting FRE tables for {:?} from {}",
            self.config.years,
            self.source.describe()
        );

        let mut tables = Vec::with_capacity(self.config.years.len() * TableKind::YEARLY.len() + 1);
        for &year in &self.config.years {
            for kind in TableKind::YEARLY {
                let table = self.source.fetch_table(kind, Some(year)).await?;
                tables.push(filter_companies(table, &self.config.companies));
            }
        }
        tables.push(self.source.fetch_table(TableKind::CompanyRegistry, None).await?);

        let rows: usize = tables.iter().map(RawTable::len).sum();
        info!("✅ Collected {} tables with {} rows", tables.len(), rows);
        Ok(tables)
    }

    /// Fetch, merge and replace the merged file.
    ///
    /// Nothing is written unless every table was fetched and the merge succeeded; the previous
    /// merged file stays in place on any error.
    pub async fn refresh(&self, save_raw: bool) -> Result<MergeReport> {
        let tables = self
            .collect()
            .await
            .with_context(|| format!("fetching from {}", self.source.describe()))?;

        let outcome = merge_tables(&tables).context("merging FRE tables")?;

        if save_raw {
            save_raw_snapshot(&self.config.raw_dir(), &tables, self.config.delimiter)
                .context("saving raw snapshot")?;
        }

        write_merged(&self.config.merged_file, &outcome.table)
            .with_context(|| format!("writing {}", self.config.merged_file.display()))?;

        let manifest = RefreshManifest {
            refreshed_at: Utc::now(),
            source: self.source.describe(),
            years: self.config.years.clone(),
            companies: self.config.companies.clone(),
            merged_file: self.config.merged_file.clone(),
            input_rows: outcome.report.input_rows,
            emitted_rows: outcome.report.emitted_rows,
            duplicates_removed: outcome.report.duplicates_removed,
            skipped_rows: outcome.report.skipped_rows,
        };
        write_manifest(&self.config.data_dir, &manifest)?;

        Ok(outcome.report)
    }
}

/// Keep only rows of the selected companies; an empty selection keeps everything
pub fn filter_companies(mut table: RawTable, companies: &[String]) -> RawTable {
    if companies.is_empty() || table.kind == TableKind::CompanyRegistry {
        return table;
    }
    let map = ColumnMap::resolve(&table, &[Column::Cnpj]);
    if !map.has(Column::Cnpj) {
        warn!("⚠️  {} has no CNPJ column; company filter not applied", table.name());
        return table;
    }

    let before = table.len();
    table
        .rows
        .retain(|row| companies.contains(&cnpj_digits(map.get(row, Column::Cnpj))));
    debug!("Company filter kept {} of {} rows in {}", table.len(), before, table.name());
    table
}

/// Persist raw tables under their portal file names
pub fn save_raw_snapshot(dir: &Path, tables: &[RawTable], delimiter: u8) -> PipelineResult<()> {
    for table in tables {
        write_raw_table(dir, table, delimiter)?;
    }
    info!("💾 Saved raw snapshot of {} tables to {}", tables.len(), dir.display());
    Ok(())
}

fn write_manifest(data_dir: &Path, manifest: &RefreshManifest) -> Result<()> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(manifest)?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Manifest of the last successful refresh, if any
pub fn read_manifest(data_dir: &Path) -> Result<Option<RefreshManifest>> {
    let path = data_dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)?;
    let manifest = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(manifest))
}
