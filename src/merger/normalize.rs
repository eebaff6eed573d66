//! Deterministic text and value normalization rules used by the merge stage.

use chrono::{Datelike, NaiveDate};

pub const EXECUTIVE_BOARD: &str = "DIRETORIA ESTATUTARIA";
pub const BOARD_OF_DIRECTORS: &str = "CONSELHO DE ADMINISTRACAO";
pub const FISCAL_COUNCIL: &str = "CONSELHO FISCAL";

/// Fold Portuguese diacritics to their base letter
fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        other => other,
    }
}

/// Trim, strip diacritics, upper-case, collapse whitespace and drop punctuation.
///
/// Dots and apostrophes vanish ("S.A." becomes "SA"); other punctuation except `&` and `/`
/// separates words.
pub fn normalize_text(value: &str) -> String {
    let mut cleaned = String::with_capacity(value.len());
    for c in value.chars().map(fold_char) {
        if c.is_alphanumeric() || c == '&' || c == '/' {
            cleaned.extend(c.to_uppercase());
        } else if c == '.' || c == '\'' {
            continue;
        } else {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical administrative body name
pub fn normalize_body(value: &str) -> String {
    let text = normalize_text(value);
    if text.contains("DIRETORIA") {
        EXECUTIVE_BOARD.to_string()
    } else if text.contains("CONSELHO") && text.contains("FISCAL") {
        FISCAL_COUNCIL.to_string()
    } else if text.contains("CONSELHO") && text.contains("ADMINISTRACAO") {
        BOARD_OF_DIRECTORS.to_string()
    } else {
        text
    }
}

/// Digits of a CNPJ, without punctuation
pub fn cnpj_digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalized header key used for alias matching
pub fn header_key(value: &str) -> String {
    normalize_text(&value.replace('_', " "))
}

/// Parse a disclosed amount; empty or unreadable values count as zero.
///
/// Accepts `1234.56`, `1234,56` and `1.234.567,89`.
pub fn parse_number(value: &str) -> f64 {
    let cleaned: String = value
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');
    let canonical = match (last_dot, last_comma) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) if cleaned.matches(',').count() == 1 => cleaned.replace(',', "."),
        (None, Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    match canonical.parse::<f64>() {
        Ok(number) if number.is_finite() => number,
        _ => 0.0,
    }
}

/// Years a filing can plausibly refer to
const FILING_YEARS: std::ops::RangeInclusive<i32> = 1990..=2100;

/// Fiscal year from a year column or a date (`YYYY-MM-DD` or `DD/MM/YYYY`)
pub fn parse_year(value: &str) -> Option<i32> {
    let value = value.trim();
    if value.len() == 4 {
        return value.parse::<i32>().ok().filter(|y| FILING_YEARS.contains(y));
    }
    // Truncate timestamps like "2023-12-31 00:00:00"
    let date_part = value.split_whitespace().next().unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%d/%m/%Y"))
        .ok()
        .map(|date| date.year())
        .filter(|y| FILING_YEARS.contains(y))
}

/// FRE document version; unreadable versions sort first
pub fn parse_version(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}
