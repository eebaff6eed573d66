//! The merged table and its CSV handoff file.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::models::FilingRecord;

/// Column order of the merged CSV
pub const MERGED_COLUMNS: [&str; 14] = [
    "company_id",
    "company_name",
    "year",
    "body",
    "component",
    "target",
    "paid",
    "approved_max",
    "minimum",
    "members",
    "sector",
    "state",
    "control",
    "filing_version",
];

/// Deduplicated filing records, sorted by natural key
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable {
    records: Vec<FilingRecord>,
}

impl MergedTable {
    /// Build a table from records; on duplicate keys the first record wins
    pub fn from_records(mut records: Vec<FilingRecord>) -> Self {
        // Stable sort keeps input order among equal keys
        records.sort_by_key(|r| r.key());
        records.dedup_by(|later, earlier| later.key() == earlier.key());
        Self { records }
    }

    pub fn records(&self) -> &[FilingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Company ids with their display name
    pub fn companies(&self) -> BTreeMap<String, String> {
        let mut companies = BTreeMap::new();
        for record in &self.records {
            companies
                .entry(record.company_id.clone())
                .or_insert_with(|| record.company_name.clone());
        }
        companies
    }

    pub fn years(&self) -> Vec<i32> {
        let years: BTreeSet<i32> = self.records.iter().map(|r| r.year).collect();
        years.into_iter().collect()
    }

    pub fn bodies(&self) -> Vec<String> {
        let bodies: BTreeSet<&str> = self.records.iter().map(|r| r.body.as_str()).collect();
        bodies.into_iter().map(str::to_string).collect()
    }

    pub fn sectors(&self) -> Vec<String> {
        let sectors: BTreeSet<&str> = self.records.iter().map(|r| r.sector.as_str()).collect();
        sectors.into_iter().map(str::to_string).collect()
    }
}

/// Temporary sibling used for the atomic replace
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "merged.csv".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

/// Write the merged table as comma-delimited UTF-8.
///
/// The file is written next to its destination and renamed over it, so readers only ever see
/// the previous or the new complete file.
pub fn write_merged(path: &Path, table: &MergedTable) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);

    let result = (|| -> PipelineResult<()> {
        // Header written by hand so an empty table still yields a readable file
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(&tmp)?;
        writer.write_record(MERGED_COLUMNS)?;
        for record in table.records() {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;
    info!("💾 Wrote {} records to {}", table.len(), path.display());
    Ok(())
}

/// Load a merged CSV written by `write_merged`
pub fn read_merged(path: &Path) -> PipelineResult<MergedTable> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        let not_found = matches!(e.kind(), csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound);
        if not_found {
            PipelineError::unavailable(path.display().to_string(), "merged file not found; run `refresh` first")
        } else {
            PipelineError::Csv(e)
        }
    })?;

    let mut records = Vec::new();
    for row in reader.deserialize::<FilingRecord>() {
        records.push(row.map_err(|e| PipelineError::parse(path.display().to_string(), e))?);
    }
    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(MergedTable::from_records(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Component;
    use pretty_assertions::assert_eq;

    fn record(company: &str, year: i32, component: Component, paid: f64) -> FilingRecord {
        FilingRecord {
            company_id: company.to_string(),
            company_name: format!("CIA {}", company),
            year,
            body: "DIRETORIA ESTATUTARIA".to_string(),
            component,
            target: 0.0,
            paid,
            approved_max: 0.0,
            minimum: 0.0,
            members: 3.0,
            sector: "BANCOS".to_string(),
            state: "SP".to_string(),
            control: "PRIVADO".to_string(),
            filing_version: 1,
        }
    }

    #[test]
    fn test_from_records_sorts_and_dedups() {
        let table = MergedTable::from_records(vec![
            record("2", 2023, Component::Salary, 1.0),
            record("1", 2023, Component::Salary, 2.0),
            record("2", 2023, Component::Salary, 3.0),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].company_id, "1");
        assert_eq!(table.records()[1].paid, 1.0);
    }

    #[test]
    fn test_csv_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.csv");
        let table = MergedTable::from_records(vec![
            record("1", 2022, Component::Bonus, 0.1 + 0.2),
            record("1", 2023, Component::ProfitSharing, 1234567.891),
        ]);

        write_merged(&path, &table).unwrap();
        let loaded = read_merged(&path).unwrap();
        assert_eq!(loaded, table);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("company_id,company_name,year,body,component,target,paid"));
        assert!(text.contains(",PLR,"));
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_merged(&dir.path().join("absent.csv"));
        assert!(matches!(result, Err(PipelineError::SourceUnavailable { .. })));
    }

    #[test]
    fn test_write_replaces_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.csv");
        write_merged(&path, &MergedTable::from_records(vec![record("1", 2023, Component::Salary, 1.0)])).unwrap();
        write_merged(&path, &MergedTable::default()).unwrap();

        assert!(read_merged(&path).unwrap().is_empty());
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
