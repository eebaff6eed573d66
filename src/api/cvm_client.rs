use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use super::{parse_raw_table, ApiRateLimiter, FilingSource, RawTable, TableKind};
use crate::error::{PipelineError, PipelineResult};
use crate::models::Config;

/// HTTP client for the CVM open-data portal (or a mirror with the same file names)
pub struct CvmClient {
    client: Client,
    base_url: Url,
    registry_url: Url,
    delimiter: u8,
    rate_limiter: ApiRateLimiter,
}

impl CvmClient {
    /// Create a new portal client
    pub fn new(config: &Config) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("cvm-pay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Config(format!("HTTP client: {}", e)))?;

        // Url::join drops the last path segment unless the base ends with '/'
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| PipelineError::Config(format!("base url '{}': {}", base, e)))?;
        let registry_url = Url::parse(config.registry_url.trim())
            .map_err(|e| PipelineError::Config(format!("registry url '{}': {}", config.registry_url, e)))?;

        Ok(Self {
            client,
            base_url,
            registry_url,
            delimiter: config.delimiter,
            rate_limiter: ApiRateLimiter::new(config.request_delay_ms),
        })
    }

    /// Endpoint for a table
    pub fn table_url(&self, kind: TableKind, year: Option<i32>) -> PipelineResult<Url> {
        if kind == TableKind::CompanyRegistry {
            return Ok(self.registry_url.clone());
        }
        let year = year.ok_or_else(|| {
            PipelineError::Config(format!("table '{}' needs a fiscal year", kind.slug()))
        })?;
        self.base_url
            .join(&kind.file_name(Some(year)))
            .map_err(|e| PipelineError::Config(e.to_string()))
    }

    async fn download(&self, url: &Url) -> PipelineResult<Vec<u8>> {
        self.rate_limiter.wait().await;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PipelineError::unavailable(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} answered {}", url, status);
            return Err(PipelineError::unavailable(url.as_str(), format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::unavailable(url.as_str(), e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl FilingSource for CvmClient {
    async fn fetch_table(&self, kind: TableKind, year: Option<i32>) -> PipelineResult<RawTable> {
        let url = self.table_url(kind, year)?;
        let body = self.download(&url).await?;
        let year = if kind.is_yearly() { year } else { None };
        let table = parse_raw_table(kind, year, url.as_str(), &body, self.delimiter)?;
        info!("⬇️  {} rows from {}", table.len(), url);
        Ok(table)
    }

    fn describe(&self) -> String {
        self.base_url.to_string()
    }
}
