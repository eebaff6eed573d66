use std::path::PathBuf;
use tracing::info;

use super::{parse_raw_table, FilingSource, RawTable, TableKind};
use crate::error::{PipelineError, PipelineResult};

/// Reads portal tables that were already downloaded and unpacked into a directory
pub struct DirectorySource {
    dir: PathBuf,
    delimiter: u8,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            dir: dir.into(),
            delimiter,
        }
    }
}

#[async_trait::async_trait]
impl FilingSource for DirectorySource {
    async fn fetch_table(&self, kind: TableKind, year: Option<i32>) -> PipelineResult<RawTable> {
        let year = if kind.is_yearly() { year } else { None };
        let path = self.dir.join(kind.file_name(year));
        let origin = path.display().to_string();

        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::unavailable(origin, "file not found"));
            }
            Err(e) => return Err(e.into()),
        };

        let table = parse_raw_table(kind, year, &origin, &body, self.delimiter)?;
        info!("📂 {} rows from {}", table.len(), origin);
        Ok(table)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}
