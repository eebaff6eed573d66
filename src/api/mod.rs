use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

pub mod cvm_client;
pub mod directory_source;
pub use cvm_client::CvmClient;
pub use directory_source::DirectorySource;

/// Tables published by the CVM open-data portal that feed the merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// FRE item 8.2: total remuneration per administrative body
    BodyTotals,
    /// FRE item 8.3: bonus and profit-sharing ranges
    VariablePay,
    /// FRE item 8.15: highest, average and lowest individual pay
    IndividualRange,
    /// Registry of listed companies (sector, state, control)
    CompanyRegistry,
}

impl TableKind {
    pub const YEARLY: [TableKind; 3] = [
        TableKind::BodyTotals,
        TableKind::VariablePay,
        TableKind::IndividualRange,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            TableKind::BodyTotals => "remuneracao_total_orgao",
            TableKind::VariablePay => "remuneracao_variavel",
            TableKind::IndividualRange => "remuneracao_maxima_minima_media",
            TableKind::CompanyRegistry => "cad_cia_aberta",
        }
    }

    pub fn is_yearly(&self) -> bool {
        !matches!(self, TableKind::CompanyRegistry)
    }

    /// File name used both by the portal and by the raw snapshot directory
    pub fn file_name(&self, year: Option<i32>) -> String {
        match (self, year) {
            (TableKind::CompanyRegistry, _) => "cad_cia_aberta.csv".to_string(),
            (kind, Some(year)) => format!("fre_cia_aberta_{}_{}.csv", kind.slug(), year),
            (kind, None) => format!("fre_cia_aberta_{}.csv", kind.slug()),
        }
    }
}

/// A table as downloaded, before any cleaning
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub kind: TableKind,
    pub year: Option<i32>,
    pub origin: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn name(&self) -> String {
        self.kind.file_name(self.year)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Source of raw filing tables
#[async_trait::async_trait]
pub trait FilingSource: Send + Sync {
    /// Fetch one table; `year` is ignored for the company registry
    async fn fetch_table(&self, kind: TableKind, year: Option<i32>) -> PipelineResult<RawTable>;

    /// Where the tables come from, for log lines
    fn describe(&self) -> String;
}

/// Fixed delay between consecutive requests
pub struct ApiRateLimiter {
    delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl ApiRateLimiter {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            last_request: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Decode a downloaded body: UTF-8 (BOM stripped), falling back to ISO-8859-1
pub fn decode_body(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // Latin-1 maps every byte to the code point of the same value
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Parse a delimited body into a raw table
pub fn parse_raw_table(
    kind: TableKind,
    year: Option<i32>,
    origin: &str,
    bytes: &[u8],
    delimiter: u8,
) -> PipelineResult<RawTable> {
    let text = decode_body(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::parse(origin, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(PipelineError::parse(origin, "missing header row"));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PipelineError::parse(origin, e))?;
        rows.push(record.iter().map(|field| field.trim().to_string()).collect());
    }

    debug!("Parsed {} rows from {}", rows.len(), origin);
    Ok(RawTable {
        kind,
        year,
        origin: origin.to_string(),
        headers,
        rows,
    })
}

/// Persist a raw table under its portal file name (UTF-8, same delimiter)
pub fn write_raw_table(dir: &Path, table: &RawTable, delimiter: u8) -> PipelineResult<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(table.name());
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(&path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
