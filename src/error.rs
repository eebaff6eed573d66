use thiserror::Error;

/// Failures of the fetch and merge stages.
///
/// Every variant is terminal for the stage that raised it: a failed refresh leaves the
/// previously merged file untouched.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source unavailable: {url} ({reason})")]
    SourceUnavailable { url: String, reason: String },

    #[error("could not parse {source_name}: {reason}")]
    ParseError { source_name: String, reason: String },

    #[error("malformed input: table '{table}' has no '{column}' column")]
    MalformedInput { table: String, column: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("projection year {year} must come after the last year with data ({last_year})")]
    InvalidProjection { year: i32, last_year: i32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub fn unavailable(url: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::SourceUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(source_name: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::ParseError {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(table: impl Into<String>, column: impl Into<String>) -> Self {
        PipelineError::MalformedInput {
            table: table.into(),
            column: column.into(),
        }
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
