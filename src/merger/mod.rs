//! Merge stage: normalizes names, deduplicates administrative-body records and joins the
//! FRE tables into one table keyed by (company, year, body, component).

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::api::{RawTable, TableKind};
use crate::error::PipelineResult;
use crate::models::{Component, CompanyProfile, FilingRecord, RecordKey, NOT_INFORMED};
use crate::storage::MergedTable;

pub mod columns;
pub mod normalize;

use columns::{Column, ColumnMap};
use normalize::{cnpj_digits, normalize_body, normalize_text, parse_number, parse_version, parse_year};

const IDENTITY_COLUMNS: [Column; 7] = [
    Column::Cnpj,
    Column::CompanyName,
    Column::Year,
    Column::FiscalYearEnd,
    Column::ReferenceDate,
    Column::Version,
    Column::Body,
];

const YEAR_COLUMNS: [Column; 3] = [Column::Year, Column::FiscalYearEnd, Column::ReferenceDate];

const BODY_TOTAL_COLUMNS: [(Column, Component); 17] = [
    (Column::Salary, Component::Salary),
    (Column::Benefits, Component::Benefits),
    (Column::Committees, Component::Committees),
    (Column::OtherFixed, Component::OtherFixed),
    (Column::Bonus, Component::Bonus),
    (Column::ProfitSharing, Component::ProfitSharing),
    (Column::Meetings, Component::Meetings),
    (Column::Commissions, Component::Commissions),
    (Column::OtherVariable, Component::OtherVariable),
    (Column::PostEmployment, Component::PostEmployment),
    (Column::Termination, Component::Termination),
    (Column::ShareBased, Component::ShareBased),
    (Column::ShareOptions, Component::ShareOptions),
    (Column::RestrictedShares, Component::RestrictedShares),
    (Column::OtherSharePlans, Component::OtherSharePlans),
    (Column::ShareRecognized, Component::ShareRecognized),
    (Column::BodyTotal, Component::BodyTotal),
];

const INDIVIDUAL_COLUMNS: [(Column, Component); 3] = [
    (Column::Highest, Component::HighestIndividual),
    (Column::Average, Component::AverageIndividual),
    (Column::Lowest, Component::LowestIndividual),
];

/// Variable pay columns: (component, minimum, maximum, target, paid)
const VARIABLE_COLUMNS: [(Component, Column, Column, Column, Column); 2] = [
    (Component::Bonus, Column::BonusMin, Column::BonusMax, Column::BonusTarget, Column::BonusPaid),
    (
        Component::ProfitSharing,
        Column::PlrMin,
        Column::PlrMax,
        Column::PlrTarget,
        Column::PlrPaid,
    ),
];

/// Values one table contributes to a record; `None` means the table does not disclose it
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Values {
    target: Option<f64>,
    paid: Option<f64>,
    approved_max: Option<f64>,
    minimum: Option<f64>,
    members: Option<f64>,
}

#[derive(Debug, Clone)]
struct Contribution {
    key: RecordKey,
    company_name: String,
    /// Year of the FRE document the row was filed in; a fiscal year is restated by later documents
    document_year: i32,
    version: u32,
    values: Values,
}

impl Contribution {
    /// Later documents win over earlier ones, then higher versions of the same document
    fn precedence(&self) -> (i32, u32) {
        (self.document_year, self.version)
    }
}

/// Counters describing one merge run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub input_rows: usize,
    pub skipped_rows: usize,
    pub duplicates_removed: usize,
    pub emitted_rows: usize,
    pub companies: usize,
    pub tables: Vec<TableSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub rows: usize,
}

/// Result of a merge: the table plus what happened to the input
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table: MergedTable,
    pub report: MergeReport,
}

/// Merge raw portal tables into one normalized table.
///
/// Pure function of its input: the same tables always produce the same table.
pub fn merge_tables(tables: &[RawTable]) -> PipelineResult<MergeOutcome> {
    let mut report = MergeReport::default();

    let registry = match tables.iter().find(|t| t.kind == TableKind::CompanyRegistry) {
        Some(table) => {
            report.tables.push(TableSummary { name: table.name(), rows: table.len() });
            load_registry(table)?
        }
        None => {
            warn!("No company registry among the inputs; sector, state and control stay unknown");
            HashMap::new()
        }
    };

    // Deduplicate inside each table kind first, then join kinds in a fixed order so that
    // FRE 8.2 values take precedence over 8.3 values for the same key.
    let mut per_kind: Vec<(TableKind, BTreeMap<RecordKey, Contribution>)> = Vec::new();
    for kind in [TableKind::BodyTotals, TableKind::IndividualRange, TableKind::VariablePay] {
        let mut deduped: BTreeMap<RecordKey, Contribution> = BTreeMap::new();
        for table in tables.iter().filter(|t| t.kind == kind) {
            report.input_rows += table.len();
            report.tables.push(TableSummary { name: table.name(), rows: table.len() });

            let contributions = extract(table, &mut report)?;
            for contribution in contributions {
                match deduped.get(&contribution.key) {
                    Some(existing) => {
                        report.duplicates_removed += 1;
                        if contribution.precedence() > existing.precedence() {
                            debug!(
                                "Replacing {:?} with the {} document, version {}",
                                contribution.key, contribution.document_year, contribution.version
                            );
                            deduped.insert(contribution.key.clone(), contribution);
                        }
                    }
                    None => {
                        deduped.insert(contribution.key.clone(), contribution);
                    }
                }
            }
        }
        per_kind.push((kind, deduped));
    }

    let mut names: HashMap<String, String> = HashMap::new();
    let mut joined: BTreeMap<RecordKey, (Values, u32)> = BTreeMap::new();
    for (kind, contributions) in per_kind {
        for (key, contribution) in contributions {
            if !contribution.company_name.is_empty() {
                names
                    .entry(key.company_id.clone())
                    .or_insert_with(|| contribution.company_name.clone());
            }
            let (values, version) = joined.entry(key).or_insert((Values::default(), 0));
            combine(values, &contribution.values, kind);
            *version = (*version).max(contribution.version);
        }
    }

    let mut records = Vec::with_capacity(joined.len());
    for (key, (values, version)) in joined {
        let profile = registry.get(&key.company_id);
        let company_name = names
            .get(&key.company_id)
            .cloned()
            .or_else(|| profile.map(|p| p.name.clone()))
            .unwrap_or_else(|| key.company_id.clone());

        let record = FilingRecord {
            company_id: key.company_id,
            company_name,
            year: key.year,
            body: key.body,
            component: key.component,
            target: values.target.unwrap_or(0.0),
            paid: values.paid.unwrap_or(0.0),
            approved_max: values.approved_max.unwrap_or(0.0),
            minimum: values.minimum.unwrap_or(0.0),
            members: values.members.unwrap_or(0.0),
            sector: profile.map(|p| p.sector.clone()).unwrap_or_else(|| NOT_INFORMED.to_string()),
            state: profile.map(|p| p.state.clone()).unwrap_or_else(|| NOT_INFORMED.to_string()),
            control: profile.map(|p| p.control.clone()).unwrap_or_else(|| NOT_INFORMED.to_string()),
            filing_version: version,
        };
        if record.has_values() {
            records.push(record);
        }
    }

    let table = MergedTable::from_records(records);
    report.emitted_rows = table.len();
    report.companies = table.companies().len();

    info!(
        "🔗 Merged {} input rows into {} records ({} duplicates removed, {} rows skipped)",
        report.input_rows, report.emitted_rows, report.duplicates_removed, report.skipped_rows
    );
    Ok(MergeOutcome { table, report })
}

/// Fill fields not yet disclosed by an earlier table
fn combine(into: &mut Values, from: &Values, kind: TableKind) {
    into.target = into.target.or(from.target);
    into.paid = into.paid.or(from.paid);
    into.approved_max = into.approved_max.or(from.approved_max);
    into.minimum = into.minimum.or(from.minimum);
    // Variable pay ranges count the members eligible for bonus/PLR
    match (kind, from.members) {
        (TableKind::VariablePay, Some(members)) if members > 0.0 => into.members = Some(members),
        _ => into.members = into.members.or(from.members),
    }
}

fn extract(table: &RawTable, report: &mut MergeReport) -> PipelineResult<Vec<Contribution>> {
    let value_columns: Vec<Column> = match table.kind {
        TableKind::BodyTotals => {
            let mut cols: Vec<Column> = BODY_TOTAL_COLUMNS.iter().map(|(c, _)| *c).collect();
            cols.push(Column::Members);
            cols
        }
        TableKind::IndividualRange => {
            let mut cols: Vec<Column> = INDIVIDUAL_COLUMNS.iter().map(|(c, _)| *c).collect();
            cols.push(Column::IndividualMembers);
            cols
        }
        TableKind::VariablePay => {
            let mut cols = vec![Column::VariableMembers];
            for (_, min, max, target, paid) in VARIABLE_COLUMNS {
                cols.extend([min, max, target, paid]);
            }
            cols
        }
        TableKind::CompanyRegistry => return Ok(Vec::new()),
    };

    let mut wanted = IDENTITY_COLUMNS.to_vec();
    wanted.extend(&value_columns);
    let map = ColumnMap::resolve(table, &wanted);

    map.require_any(&[Column::Cnpj, Column::CompanyName])?;
    map.require_any(&YEAR_COLUMNS)?;
    map.require(Column::Body)?;
    let amount_columns: Vec<Column> = value_columns
        .iter()
        .copied()
        .filter(|c| !matches!(c, Column::Members | Column::VariableMembers | Column::IndividualMembers))
        .collect();
    map.require_any(&amount_columns)?;

    let mut contributions = Vec::new();
    for row in &table.rows {
        let company_name = normalize_text(map.get(row, Column::CompanyName));
        let cnpj = cnpj_digits(map.get(row, Column::Cnpj));
        let company_id = if cnpj.is_empty() { company_name.clone() } else { cnpj };
        let year = YEAR_COLUMNS
            .iter()
            .filter(|c| map.has(**c))
            .find_map(|c| parse_year(map.get(row, *c)));
        let body = normalize_body(map.get(row, Column::Body));

        let year = match year {
            Some(year) if !company_id.is_empty() && !body.is_empty() => year,
            _ => {
                report.skipped_rows += 1;
                debug!("Skipping row without company, year or body in {}", table.name());
                continue;
            }
        };
        let version = parse_version(map.get(row, Column::Version));
        let document_year = parse_year(map.get(row, Column::ReferenceDate))
            .or(table.year)
            .unwrap_or(0);

        let amount = |column: Column| -> Option<f64> {
            map.has(column).then(|| parse_number(map.get(row, column)))
        };

        let mut push = |component: Component, values: Values| {
            contributions.push(Contribution {
                key: RecordKey {
                    company_id: company_id.clone(),
                    year,
                    body: body.clone(),
                    component,
                },
                company_name: company_name.clone(),
                document_year,
                version,
                values,
            });
        };

        match table.kind {
            TableKind::BodyTotals => {
                let members = amount(Column::Members);
                for (column, component) in BODY_TOTAL_COLUMNS {
                    if let Some(paid) = amount(column) {
                        push(component, Values { paid: Some(paid), members, ..Values::default() });
                    }
                }
            }
            TableKind::IndividualRange => {
                let members = amount(Column::IndividualMembers);
                for (column, component) in INDIVIDUAL_COLUMNS {
                    if let Some(paid) = amount(column) {
                        push(component, Values { paid: Some(paid), members, ..Values::default() });
                    }
                }
            }
            TableKind::VariablePay => {
                let members = amount(Column::VariableMembers);
                for (component, min, max, target, paid) in VARIABLE_COLUMNS {
                    let values = Values {
                        target: amount(target),
                        paid: amount(paid),
                        approved_max: amount(max),
                        minimum: amount(min),
                        members,
                    };
                    if values.target.is_some() || values.paid.is_some() || values.approved_max.is_some() || values.minimum.is_some() {
                        push(component, values);
                    }
                }
            }
            TableKind::CompanyRegistry => {}
        }
    }
    Ok(contributions)
}

/// Company profiles keyed by CNPJ digits; the first row of a CNPJ wins
pub fn load_registry(table: &RawTable) -> PipelineResult<HashMap<String, CompanyProfile>> {
    let map = ColumnMap::resolve(
        table,
        &[Column::Cnpj, Column::CompanyName, Column::Sector, Column::State, Column::Control],
    );
    map.require(Column::Cnpj)?;

    let informed = |value: &str| {
        let text = normalize_text(value);
        if text.is_empty() {
            NOT_INFORMED.to_string()
        } else {
            text
        }
    };

    let mut profiles = HashMap::new();
    for row in &table.rows {
        let company_id = cnpj_digits(map.get(row, Column::Cnpj));
        if company_id.is_empty() {
            continue;
        }
        profiles.entry(company_id.clone()).or_insert_with(|| CompanyProfile {
            company_id,
            name: normalize_text(map.get(row, Column::CompanyName)),
            sector: informed(map.get(row, Column::Sector)),
            state: informed(map.get(row, Column::State)),
            control: informed(map.get(row, Column::Control)),
        });
    }
    debug!("Loaded {} company profiles", profiles.len());
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn raw(kind: TableKind, headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            kind,
            year: Some(2023),
            origin: "test".to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_case_variant_duplicates_collapse() {
        let table = raw(
            TableKind::BodyTotals,
            &["Nome_Companhia", "Data_Fim_Exercicio_Social", "Orgao_Administracao", "Salario"],
            &[
                &["CompanyA", "2023-12-31", "Board", "100"],
                &["CompanyA", "2023-12-31", "board", "100"],
            ],
        );
        let outcome = merge_tables(&[table]).unwrap();
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.report.duplicates_removed, 1);

        let record = &outcome.table.records()[0];
        assert_eq!(record.company_id, "COMPANYA");
        assert_eq!(record.body, "BOARD");
        assert_eq!(record.component, Component::Salary);
        assert_eq!(record.paid, 100.0);
    }

    #[test]
    fn test_highest_filing_version_wins() {
        let table = raw(
            TableKind::BodyTotals,
            &["CNPJ_Companhia", "Data_Fim_Exercicio_Social", "Versao", "Orgao_Administracao", "Salario"],
            &[
                &["11.111.111/0001-11", "2023-12-31", "1", "Diretoria Estatutária", "100"],
                &["11.111.111/0001-11", "2023-12-31", "3", "DIRETORIA ESTATUTARIA", "150"],
                &["11.111.111/0001-11", "2023-12-31", "2", "Diretoria", "120"],
            ],
        );
        let outcome = merge_tables(&[table]).unwrap();
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.table.records()[0].paid, 150.0);
        assert_eq!(outcome.table.records()[0].filing_version, 3);
    }

    #[test]
    fn test_later_document_wins_over_higher_version() {
        let headers = ["CNPJ_Companhia", "Data_Fim_Exercicio_Social", "Versao", "Orgao_Administracao", "Salario"];
        let mut earlier = raw(TableKind::BodyTotals, &headers, &[&["1", "2022-12-31", "3", "Diretoria", "100"]]);
        earlier.year = Some(2022);
        let later = raw(TableKind::BodyTotals, &headers, &[&["1", "2022-12-31", "1", "Diretoria", "110"]]);

        for tables in [vec![earlier.clone(), later.clone()], vec![later, earlier]] {
            let outcome = merge_tables(&tables).unwrap();
            assert_eq!(outcome.table.len(), 1);
            let record = &outcome.table.records()[0];
            assert_eq!(record.year, 2022);
            assert_eq!(record.paid, 110.0);
        }
    }

    #[test]
    fn test_reference_date_orders_documents_in_one_table() {
        let table = raw(
            TableKind::BodyTotals,
            &["CNPJ_Companhia", "Data_Fim_Exercicio_Social", "Data_Referencia", "Versao", "Orgao_Administracao", "Salario"],
            &[
                &["1", "2021-12-31", "2023-01-01", "1", "Diretoria", "130"],
                &["1", "2021-12-31", "2022-01-01", "4", "Diretoria", "90"],
            ],
        );
        let outcome = merge_tables(&[table]).unwrap();
        assert_eq!(outcome.report.duplicates_removed, 1);
        assert_eq!(outcome.table.records()[0].paid, 130.0);
    }

    #[test]
    fn test_share_based_breakdown_columns() {
        let table = raw(
            TableKind::BodyTotals,
            &[
                "CNPJ_Companhia",
                "Data_Fim_Exercicio_Social",
                "Orgao_Administracao",
                "Valor_Total_Opcoes_Acoes_Exercidas_Reconhecidas_Resultado_Exercicio",
                "Valor_Total_Acoes_Restritas_Entregues_Reconhecidas_Resultado_Exercicio",
                "Valor_Total_Outros_Planos_Baseados_Acoes_Reconhecidos_Resultado_Exercicio",
                "Valor_Total_Remuneracao_Baseada_Acoes_Reconhecida_Resultado_Exercicio",
            ],
            &[&["1", "2023-12-31", "Diretoria Estatutaria", "300", "500", "0", "800"]],
        );
        let outcome = merge_tables(&[table]).unwrap();
        let paid: Vec<(Component, f64)> = outcome.table.records().iter().map(|r| (r.component, r.paid)).collect();
        assert_eq!(
            paid,
            vec![
                (Component::ShareOptions, 300.0),
                (Component::RestrictedShares, 500.0),
                (Component::ShareRecognized, 800.0),
            ]
        );
    }

    #[test]
    fn test_variable_pay_joins_onto_body_totals() {
        let totals = raw(
            TableKind::BodyTotals,
            &["CNPJ_Companhia", "Data_Fim_Exercicio_Social", "Orgao_Administracao", "Quantidade_Membros_Remunerados", "Bonus"],
            &[&["1", "2023-12-31", "Diretoria Estatutaria", "5", "900"]],
        );
        let variable = raw(
            TableKind::VariablePay,
            &[
                "CNPJ_Companhia",
                "Data_Fim_Exercicio_Social",
                "Orgao_Administracao",
                "Quantidade_Membros_Remunerados",
                "Valor_Minimo_Bonus",
                "Valor_Maximo_Bonus",
                "Valor_Previsto_Metas_Atingidas_Bonus",
                "Valor_Efetivo_Bonus",
            ],
            &[&["1", "2023-12-31", "Diretoria Estatutaria", "4", "0", "2000", "1000", "950"]],
        );
        let outcome = merge_tables(&[variable, totals]).unwrap();
        assert_eq!(outcome.table.len(), 1);

        let bonus = &outcome.table.records()[0];
        assert_eq!(bonus.paid, 900.0);
        assert_eq!(bonus.target, 1000.0);
        assert_eq!(bonus.approved_max, 2000.0);
        assert_eq!(bonus.members, 4.0);
    }

    #[test]
    fn test_registry_join_and_defaults() {
        let totals = raw(
            TableKind::BodyTotals,
            &["CNPJ_Companhia", "Nome_Companhia", "Data_Fim_Exercicio_Social", "Orgao_Administracao", "Salario"],
            &[
                &["1", "Alfa S.A.", "2023-12-31", "Conselho de Administração", "10"],
                &["2", "Beta", "2023-12-31", "Conselho Fiscal", "5"],
            ],
        );
        let registry = raw(
            TableKind::CompanyRegistry,
            &["CNPJ_CIA", "DENOM_SOCIAL", "SETOR_ATIV", "UF", "CONTROLE_ACIONARIO"],
            &[&["1", "ALFA SA", "Bancos", "SP", "Privado"]],
        );
        let outcome = merge_tables(&[totals, registry]).unwrap();
        let records = outcome.table.records();
        assert_eq!(records[0].sector, "BANCOS");
        assert_eq!(records[0].state, "SP");
        assert_eq!(records[0].company_name, "ALFA SA");
        assert_eq!(records[1].sector, NOT_INFORMED);
    }

    #[test]
    fn test_missing_body_column_is_malformed() {
        let table = raw(
            TableKind::BodyTotals,
            &["CNPJ_Companhia", "Data_Fim_Exercicio_Social", "Salario"],
            &[&["1", "2023-12-31", "10"]],
        );
        assert_matches!(merge_tables(&[table]), Err(PipelineError::MalformedInput { .. }));
    }

    #[test]
    fn test_rows_without_year_are_skipped() {
        let table = raw(
            TableKind::BodyTotals,
            &["CNPJ_Companhia", "Data_Fim_Exercicio_Social", "Orgao_Administracao", "Salario"],
            &[&["1", "", "Diretoria", "10"], &["1", "2022-12-31", "Diretoria", "10"]],
        );
        let outcome = merge_tables(&[table]).unwrap();
        assert_eq!(outcome.report.skipped_rows, 1);
        assert_eq!(outcome.table.len(), 1);
    }

    #[test]
    fn test_all_zero_components_are_dropped() {
        let table = raw(
            TableKind::BodyTotals,
            &["CNPJ_Companhia", "Data_Fim_Exercicio_Social", "Orgao_Administracao", "Salario", "Bonus"],
            &[&["1", "2023-12-31", "Diretoria", "10", "0"]],
        );
        let outcome = merge_tables(&[table]).unwrap();
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.table.records()[0].component, Component::Salary);
    }
}
