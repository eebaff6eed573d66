//! Properties of the merge stage over hand-built raw tables

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use test_log::test;

use crate::common::test_data::{fre_table, REGISTRY};
use cvm_pay::api::{parse_raw_table, RawTable, TableKind};
use cvm_pay::error::PipelineError;
use cvm_pay::merger::merge_tables;
use cvm_pay::models::{Component, NOT_INFORMED};

fn raw(kind: TableKind, headers: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable {
        kind,
        year: Some(2023),
        origin: "fixture".to_string(),
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect(),
    }
}

fn fixture_tables(years: &[i32]) -> Vec<RawTable> {
    let mut tables = Vec::new();
    for &year in years {
        for kind in TableKind::YEARLY {
            let body = fre_table(kind, year);
            tables.push(parse_raw_table(kind, Some(year), "fixture", body.as_bytes(), b';').unwrap());
        }
    }
    tables.push(parse_raw_table(TableKind::CompanyRegistry, None, "fixture", REGISTRY.as_bytes(), b';').unwrap());
    tables
}

#[test]
fn test_case_variants_merge_to_one_row() {
    let table = raw(
        TableKind::BodyTotals,
        &["Nome_Companhia", "Ano_Exercicio_Social", "Orgao_Administracao", "Salario", "Total_Remuneracao_Orgao"],
        &[
            &["CompanyA", "2023", "Board", "100", "100"],
            &["CompanyA", "2023", "board", "100", "100"],
        ],
    );
    let outcome = merge_tables(&[table]).unwrap();
    let salaries: Vec<_> = outcome
        .table
        .records()
        .iter()
        .filter(|r| r.component == Component::Salary)
        .collect();
    assert_eq!(salaries.len(), 1);
    assert_eq!(salaries[0].company_id, "COMPANYA");
    assert_eq!(salaries[0].sector, NOT_INFORMED);
}

#[test]
fn test_no_duplicate_keys_across_years_and_versions() {
    let tables = fixture_tables(&[2021, 2022, 2023]);
    let outcome = merge_tables(&tables).unwrap();

    let keys: HashSet<_> = outcome.table.records().iter().map(|r| r.key()).collect();
    assert_eq!(keys.len(), outcome.table.len());
    assert_eq!(outcome.table.years(), vec![2021, 2022, 2023]);
    assert!(outcome.table.records().iter().all(|r| r.has_values()));
}

#[test]
fn test_input_order_does_not_change_the_result() {
    let tables = fixture_tables(&[2022, 2023]);
    let mut reversed = tables.clone();
    reversed.reverse();

    let forward = merge_tables(&tables).unwrap();
    let backward = merge_tables(&reversed).unwrap();
    assert_eq!(forward.table, backward.table);
}

#[test]
fn test_variable_pay_without_body_column_is_malformed() {
    let table = raw(
        TableKind::VariablePay,
        &["CNPJ_Companhia", "Data_Fim_Exercicio_Social", "Valor_Efetivo_Bonus"],
        &[&["1", "2023-12-31", "10"]],
    );
    assert_matches!(
        merge_tables(&[table]),
        Err(PipelineError::MalformedInput { ref column, .. }) if column.contains("Orgao_Administracao")
    );
}
