pub mod benchmark;
pub mod export;
pub mod filters;
pub mod governance;
pub mod queries;
pub mod statistics;

pub use benchmark::{project, ProjectionRequest, ProjectionResult, ProjectionSeries, PROJECTION_COMPONENTS};
pub use export::{ExportTable, Exportable};
pub use filters::{CalcMode, Filters, PeerGroup, YearRange};
pub use governance::{governance_report, GovernanceReport};
pub use queries::*;
pub use statistics::{describe, Summary};
