use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::merger::normalize::{cnpj_digits, normalize_text};
use crate::storage::MergedTable;

/// Group the integer part with dots: 1234567 -> "1.234.567"
fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    grouped
}

/// Brazilian currency with cents: `R$ 1.234.567,89`
pub fn format_brl(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (integer, cents) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let sign = if value < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("R$ {}{},{}", sign, group_thousands(integer), cents)
}

/// Brazilian currency rounded to reais: `R$ 1.234.568`
pub fn format_brl_int(value: f64) -> String {
    let formatted = format!("{:.0}", value.abs());
    let sign = if value < 0.0 && formatted != "0" { "-" } else { "" };
    format!("R$ {}{}", sign, group_thousands(&formatted))
}

/// Short label for chart bars: `1,2M`, `500k`, `999`
pub fn format_abbrev(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0).replace('.', ",")
    } else if value >= 1_000.0 {
        format!("{:.0}k", value / 1_000.0)
    } else {
        format!("{}", value.trunc() as i64)
    }
}

/// Year label that marks the projection year
pub fn year_label(year: i32, projection_year: Option<i32>) -> String {
    if Some(year) == projection_year {
        format!("{} (projeção)", year)
    } else {
        year.to_string()
    }
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value).replace('.', ",")
}

pub fn format_multiple(value: f64) -> String {
    format!("{:.1}x", value)
}

/// Drop control characters that spreadsheet tools reject
pub fn sanitize_text(value: &str) -> String {
    value
        .chars()
        .filter(|&c| {
            let code = c as u32;
            !(code <= 0x08 || code == 0x0B || code == 0x0C || (0x0E..=0x1F).contains(&code) || (0x7F..=0x9F).contains(&code))
        })
        .collect()
}

/// Lookup of companies by CNPJ or approximate name
pub struct CompanyIndex {
    companies: Vec<(String, String)>,
    matcher: SkimMatcherV2,
}

impl CompanyIndex {
    pub fn new(table: &MergedTable) -> Self {
        Self {
            companies: table.companies().into_iter().collect(),
            matcher: SkimMatcherV2::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    /// Companies matching a query, best match first
    pub fn search(&self, query: &str) -> Vec<(String, String)> {
        let pattern = normalize_text(query);
        if pattern.is_empty() {
            return self.companies.clone();
        }

        let mut scored: Vec<(i64, &(String, String))> = self
            .companies
            .iter()
            .filter_map(|entry| {
                self.matcher
                    .fuzzy_match(&entry.1, &pattern)
                    .map(|score| (score, entry))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1 .1.cmp(&b.1 .1)));
        scored.into_iter().map(|(_, entry)| entry.clone()).collect()
    }

    /// Resolve a CNPJ, an exact id or the best name match to a company id
    pub fn resolve(&self, query: &str) -> Option<String> {
        let digits = cnpj_digits(query);
        if !digits.is_empty() && digits.len() == query.chars().filter(|c| c.is_alphanumeric()).count() {
            if let Some((id, _)) = self.companies.iter().find(|(id, _)| *id == digits) {
                return Some(id.clone());
            }
        }
        if let Some((id, _)) = self.companies.iter().find(|(id, _)| id == query) {
            return Some(id.clone());
        }
        let normalized = normalize_text(query);
        if let Some((id, _)) = self.companies.iter().find(|(_, name)| *name == normalized) {
            return Some(id.clone());
        }
        self.search(query).into_iter().next().map(|(id, _)| id)
    }

    pub fn name_of(&self, company_id: &str) -> Option<&str> {
        self.companies
            .iter()
            .find(|(id, _)| id == company_id)
            .map(|(_, name)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Component, FilingRecord};

    fn record(id: &str, name: &str) -> FilingRecord {
        FilingRecord {
            company_id: id.to_string(),
            company_name: name.to_string(),
            year: 2023,
            body: "DIRETORIA ESTATUTARIA".to_string(),
            component: Component::Salary,
            target: 0.0,
            paid: 1.0,
            approved_max: 0.0,
            minimum: 0.0,
            members: 1.0,
            sector: "BANCOS".to_string(),
            state: "SP".to_string(),
            control: "PRIVADO".to_string(),
            filing_version: 1,
        }
    }

    #[test]
    fn test_format_brl() {
        assert_eq!(format_brl(1234567.891), "R$ 1.234.567,89");
        assert_eq!(format_brl(0.5), "R$ 0,50");
        assert_eq!(format_brl(-1500.0), "R$ -1.500,00");
        assert_eq!(format_brl_int(1234567.4), "R$ 1.234.567");
        assert_eq!(format_brl_int(999.0), "R$ 999");
    }

    #[test]
    fn test_format_abbrev() {
        assert_eq!(format_abbrev(1_234_567.0), "1,2M");
        assert_eq!(format_abbrev(500_000.0), "500k");
        assert_eq!(format_abbrev(999.9), "999");
    }

    #[test]
    fn test_year_label() {
        assert_eq!(year_label(2026, Some(2026)), "2026 (projeção)");
        assert_eq!(year_label(2025, Some(2026)), "2025");
        assert_eq!(year_label(2025, None), "2025");
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("PETRO\u{0}BRAS\u{1b}\tSA\u{85}"), "PETROBRAS\tSA");
        assert_eq!(sanitize_text("AÇÚCAR\n"), "AÇÚCAR\n");
    }

    #[test]
    fn test_company_index_resolution() {
        let table = MergedTable::from_records(vec![
            record("33000167000101", "PETROLEO BRASILEIRO SA PETROBRAS"),
            record("60872504000123", "ITAU UNIBANCO HOLDING SA"),
        ]);
        let index = CompanyIndex::new(&table);
        assert_eq!(index.resolve("33.000.167/0001-01").as_deref(), Some("33000167000101"));
        assert_eq!(index.resolve("itau").as_deref(), Some("60872504000123"));
        assert_eq!(index.resolve("Petrobras").as_deref(), Some("33000167000101"));
        assert!(index.search("zzzz").is_empty());
    }
}
