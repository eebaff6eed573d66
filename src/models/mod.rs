use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{PipelineError, PipelineResult};

/// Placeholder for categorical attributes the registry does not disclose
pub const NOT_INFORMED: &str = "NAO INFORMADO";

/// Compensation components disclosed in FRE items 8.2, 8.3 and 8.15
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Component {
    #[serde(rename = "SALARY")]
    Salary,
    #[serde(rename = "BENEFITS")]
    Benefits,
    #[serde(rename = "COMMITTEES")]
    Committees,
    #[serde(rename = "OTHER_FIXED")]
    OtherFixed,
    #[serde(rename = "BONUS")]
    Bonus,
    #[serde(rename = "PLR")]
    ProfitSharing,
    #[serde(rename = "MEETINGS")]
    Meetings,
    #[serde(rename = "COMMISSIONS")]
    Commissions,
    #[serde(rename = "OTHER_VARIABLE")]
    OtherVariable,
    #[serde(rename = "POST_EMPLOYMENT")]
    PostEmployment,
    #[serde(rename = "TERMINATION")]
    Termination,
    #[serde(rename = "SHARE_BASED")]
    ShareBased,
    /// Share-based pay recognized in the year's results, broken down by plan type
    #[serde(rename = "SHARE_OPTIONS")]
    ShareOptions,
    #[serde(rename = "RESTRICTED_SHARES")]
    RestrictedShares,
    #[serde(rename = "OTHER_SHARE_PLANS")]
    OtherSharePlans,
    #[serde(rename = "SHARE_RECOGNIZED")]
    ShareRecognized,
    #[serde(rename = "BODY_TOTAL")]
    BodyTotal,
    #[serde(rename = "HIGHEST_INDIVIDUAL")]
    HighestIndividual,
    #[serde(rename = "AVERAGE_INDIVIDUAL")]
    AverageIndividual,
    #[serde(rename = "LOWEST_INDIVIDUAL")]
    LowestIndividual,
}

impl Component {
    pub const ALL: [Component; 20] = [
        Component::Salary,
        Component::Benefits,
        Component::Committees,
        Component::OtherFixed,
        Component::Bonus,
        Component::ProfitSharing,
        Component::Meetings,
        Component::Commissions,
        Component::OtherVariable,
        Component::PostEmployment,
        Component::Termination,
        Component::ShareBased,
        Component::ShareOptions,
        Component::RestrictedShares,
        Component::OtherSharePlans,
        Component::ShareRecognized,
        Component::BodyTotal,
        Component::HighestIndividual,
        Component::AverageIndividual,
        Component::LowestIndividual,
    ];

    /// Components that add up to the total remuneration of a body
    pub const PAY_MIX: [Component; 12] = [
        Component::Salary,
        Component::Benefits,
        Component::Committees,
        Component::OtherFixed,
        Component::Bonus,
        Component::ProfitSharing,
        Component::Meetings,
        Component::Commissions,
        Component::OtherVariable,
        Component::PostEmployment,
        Component::Termination,
        Component::ShareBased,
    ];

    /// Stable code written to the merged CSV
    pub fn code(&self) -> &'static str {
        match self {
            Component::Salary => "SALARY",
            Component::Benefits => "BENEFITS",
            Component::Committees => "COMMITTEES",
            Component::OtherFixed => "OTHER_FIXED",
            Component::Bonus => "BONUS",
            Component::ProfitSharing => "PLR",
            Component::Meetings => "MEETINGS",
            Component::Commissions => "COMMISSIONS",
            Component::OtherVariable => "OTHER_VARIABLE",
            Component::PostEmployment => "POST_EMPLOYMENT",
            Component::Termination => "TERMINATION",
            Component::ShareBased => "SHARE_BASED",
            Component::ShareOptions => "SHARE_OPTIONS",
            Component::RestrictedShares => "RESTRICTED_SHARES",
            Component::OtherSharePlans => "OTHER_SHARE_PLANS",
            Component::ShareRecognized => "SHARE_RECOGNIZED",
            Component::BodyTotal => "BODY_TOTAL",
            Component::HighestIndividual => "HIGHEST_INDIVIDUAL",
            Component::AverageIndividual => "AVERAGE_INDIVIDUAL",
            Component::LowestIndividual => "LOWEST_INDIVIDUAL",
        }
    }

    /// Human-readable label for charts and tables
    pub fn label(&self) -> &'static str {
        match self {
            Component::Salary => "Salário",
            Component::Benefits => "Benefícios",
            Component::Committees => "Comitês",
            Component::OtherFixed => "Outros Fixos",
            Component::Bonus => "Bônus",
            Component::ProfitSharing => "PLR",
            Component::Meetings => "Reuniões",
            Component::Commissions => "Comissões",
            Component::OtherVariable => "Outros Variáveis",
            Component::PostEmployment => "Pós-Emprego",
            Component::Termination => "Cessação",
            Component::ShareBased => "Ações",
            Component::ShareOptions => "Opções Exercidas",
            Component::RestrictedShares => "Ações Restritas",
            Component::OtherSharePlans => "Outros Planos de Ações",
            Component::ShareRecognized => "Ações Reconhecidas",
            Component::BodyTotal => "Total do Órgão",
            Component::HighestIndividual => "Remuneração Máxima",
            Component::AverageIndividual => "Remuneração Média",
            Component::LowestIndividual => "Remuneração Mínima",
        }
    }

    pub fn from_code(code: &str) -> Option<Component> {
        let code = code.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Component::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// Individual pay metrics use their own member count (FRE 8.15)
    pub fn is_individual_metric(&self) -> bool {
        matches!(
            self,
            Component::HighestIndividual | Component::AverageIndividual | Component::LowestIndividual
        )
    }

    /// Breakdown of share-based pay; overlaps `ShareBased`, so never part of the pay mix
    pub fn is_share_breakdown(&self) -> bool {
        matches!(
            self,
            Component::ShareOptions | Component::RestrictedShares | Component::OtherSharePlans | Component::ShareRecognized
        )
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Component::Bonus | Component::ProfitSharing)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One row of the merged table, keyed by (company, year, body, component)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingRecord {
    pub company_id: String,
    pub company_name: String,
    pub year: i32,
    pub body: String,
    pub component: Component,
    pub target: f64,
    pub paid: f64,
    pub approved_max: f64,
    pub minimum: f64,
    pub members: f64,
    pub sector: String,
    pub state: String,
    pub control: String,
    pub filing_version: u32,
}

/// Natural key of a filing record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub company_id: String,
    pub year: i32,
    pub body: String,
    pub component: Component,
}

impl FilingRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            company_id: self.company_id.clone(),
            year: self.year,
            body: self.body.clone(),
            component: self.component,
        }
    }

    pub fn has_values(&self) -> bool {
        self.target != 0.0 || self.paid != 0.0 || self.approved_max != 0.0 || self.minimum != 0.0
    }
}

/// Company attributes joined from the CVM registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub company_id: String,
    pub name: String,
    pub sector: String,
    pub state: String,
    pub control: String,
}

/// Runtime configuration for the pipeline
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub registry_url: String,
    pub data_dir: PathBuf,
    pub merged_file: PathBuf,
    pub years: Vec<i32>,
    pub companies: Vec<String>,
    pub delimiter: u8,
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> PipelineResult<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let data_dir = PathBuf::from(
            std::env::var("CVM_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
        );
        let merged_file = std::env::var("CVM_MERGED_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("dados_cvm_mesclados.csv"));

        let years = match std::env::var("CVM_YEARS") {
            Ok(years) => parse_years(&years)?,
            Err(_) => default_years(),
        };
        let companies = std::env::var("CVM_COMPANIES")
            .map(|list| parse_companies(&list))
            .unwrap_or_default();
        let delimiter = match std::env::var("CVM_DELIMITER") {
            Ok(value) => parse_delimiter(&value)?,
            Err(_) => b';',
        };
        let request_delay_ms = match std::env::var("CVM_REQUEST_DELAY_MS") {
            Ok(value) => parse_count("CVM_REQUEST_DELAY_MS", &value)?,
            Err(_) => 250,
        };
        let timeout_secs = match std::env::var("CVM_TIMEOUT_SECS") {
            Ok(value) => parse_count("CVM_TIMEOUT_SECS", &value)?,
            Err(_) => 60,
        };

        Ok(Config {
            base_url: std::env::var("CVM_BASE_URL")
                .unwrap_or_else(|_| "https://dados.cvm.gov.br/dados/CIA_ABERTA/DOC/FRE/DADOS/".to_string()),
            registry_url: std::env::var("CVM_REGISTRY_URL").unwrap_or_else(|_| {
                "https://dados.cvm.gov.br/dados/CIA_ABERTA/CAD/DADOS/cad_cia_aberta.csv".to_string()
            }),
            data_dir,
            merged_file,
            years,
            companies,
            delimiter,
            request_delay_ms,
            timeout_secs,
        })
    }

    /// Directory holding the raw snapshot of the last fetch
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }
}

/// The three most recent closed fiscal years plus the current one
pub fn default_years() -> Vec<i32> {
    let current = chrono::Utc::now().year();
    (current - 3..=current).collect()
}

/// Parse "2022-2024" or "2022,2024" into a sorted, deduplicated list of years
pub fn parse_years(list: &str) -> PipelineResult<Vec<i32>> {
    let mut years = Vec::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let start = parse_year(start)?;
            let end = parse_year(end)?;
            if start > end {
                return Err(PipelineError::Config(format!("empty year range: {}", part)));
            }
            years.extend(start..=end);
        } else {
            years.push(parse_year(part)?);
        }
    }
    if years.is_empty() {
        return Err(PipelineError::Config("no years selected".to_string()));
    }
    years.sort_unstable();
    years.dedup();
    Ok(years)
}

fn parse_year(value: &str) -> PipelineResult<i32> {
    let value = value.trim();
    match value.parse::<i32>() {
        Ok(year) if (1990..=2100).contains(&year) => Ok(year),
        _ => Err(PipelineError::Config(format!("invalid year: '{}'", value))),
    }
}

/// Company filters are CNPJ digits; punctuation is ignored
pub fn parse_companies(list: &str) -> Vec<String> {
    list.split(',')
        .map(|code| code.chars().filter(|c| c.is_ascii_digit()).collect::<String>())
        .filter(|code| !code.is_empty())
        .collect()
}

pub fn parse_delimiter(value: &str) -> PipelineResult<u8> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        v if v.len() == 1 && v.is_ascii() => Ok(v.as_bytes()[0]),
        v => Err(PipelineError::Config(format!("delimiter must be one ASCII character, got '{}'", v))),
    }
}

/// Non-negative integer setting such as a delay or a timeout
pub fn parse_count(name: &str, value: &str) -> PipelineResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| PipelineError::Config(format!("{} must be a non-negative integer, got '{}'", name, value)))
}
