//! End-to-end refresh from a directory of portal files

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use test_log::test;

use crate::common::logging::{init_test_logging, log_test_data, log_test_step};
use crate::common::test_data::{test_config, write_fre_fixture, ALFA, BETA, GAMA};
use cvm_pay::analysis::{governance_report, Filters};
use cvm_pay::api::{DirectorySource, TableKind};
use cvm_pay::data_collector::{read_manifest, DataCollector};
use cvm_pay::error::PipelineError;
use cvm_pay::merger::merge_tables;
use cvm_pay::merger::normalize::{BOARD_OF_DIRECTORS, EXECUTIVE_BOARD};
use cvm_pay::models::Component;
use cvm_pay::storage::read_merged;

fn collector(source_dir: &std::path::Path, data_dir: &std::path::Path) -> DataCollector {
    let config = test_config(data_dir, "http://unused.invalid/", vec![2023]);
    DataCollector::new(Arc::new(DirectorySource::new(source_dir, b';')), config)
}

#[test(tokio::test)]
async fn test_refresh_writes_merged_file_and_manifest() {
    init_test_logging();
    log_test_step("Refreshing from a fixture directory");

    let source = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_fre_fixture(source.path(), 2023);

    let report = collector(source.path(), data.path()).refresh(true).await.unwrap();
    log_test_data("Merge report", &report);
    assert_eq!(report.companies, 3);
    assert!(report.duplicates_removed > 0);
    assert_eq!(report.skipped_rows, 0);

    let table = read_merged(&data.path().join("dados_cvm_mesclados.csv")).unwrap();
    assert_eq!(table.len(), report.emitted_rows);

    let keys: HashSet<_> = table.records().iter().map(|r| r.key()).collect();
    assert_eq!(keys.len(), table.len());

    let find = |company: &str, body: &str, component: Component| {
        table
            .records()
            .iter()
            .find(|r| r.company_id == company && r.body == body && r.component == component)
            .cloned()
    };

    // Version 2 of the 8.2 filing replaces version 1
    let salary = find(ALFA, EXECUTIVE_BOARD, Component::Salary).unwrap();
    assert_eq!(salary.paid, 5_200_000.0);
    assert_eq!(salary.filing_version, 2);
    assert_eq!(salary.company_name, "ALFA SA");
    assert_eq!(salary.sector, "BANCOS");

    // 8.2 keeps the paid amount, 8.3 adds the range
    let bonus = find(ALFA, EXECUTIVE_BOARD, Component::Bonus).unwrap();
    assert_eq!(bonus.paid, 2_000_000.0);
    assert_eq!(bonus.target, 2_500_000.0);
    assert_eq!(bonus.approved_max, 4_000_000.0);

    // Zero amounts are not emitted
    assert_eq!(find(ALFA, EXECUTIVE_BOARD, Component::Termination), None);
    assert!(find(GAMA, EXECUTIVE_BOARD, Component::HighestIndividual).is_some());
    assert_eq!(find(BETA, EXECUTIVE_BOARD, Component::Salary).unwrap().sector, "ENERGIA ELETRICA");

    let manifest = read_manifest(data.path()).unwrap().unwrap();
    assert_eq!(manifest.years, vec![2023]);
    assert_eq!(manifest.emitted_rows, report.emitted_rows);

    assert!(data
        .path()
        .join("raw")
        .join(TableKind::BodyTotals.file_name(Some(2023)))
        .exists());
}

#[test(tokio::test)]
async fn test_failed_refresh_keeps_previous_file() {
    init_test_logging();
    let source = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_fre_fixture(source.path(), 2023);

    let collector = collector(source.path(), data.path());
    collector.refresh(false).await.unwrap();
    let merged = data.path().join("dados_cvm_mesclados.csv");
    let before = std::fs::read(&merged).unwrap();

    log_test_step("Removing one table and refreshing again");
    std::fs::remove_file(source.path().join(TableKind::IndividualRange.file_name(Some(2023)))).unwrap();
    let error = collector.refresh(false).await.unwrap_err();
    assert_matches!(
        error.downcast_ref::<PipelineError>(),
        Some(PipelineError::SourceUnavailable { .. })
    );

    assert_eq!(std::fs::read(&merged).unwrap(), before);
}

#[test(tokio::test)]
async fn test_merge_is_idempotent() {
    let source = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_fre_fixture(source.path(), 2023);

    let tables = collector(source.path(), data.path()).collect().await.unwrap();
    let first = merge_tables(&tables).unwrap();
    let second = merge_tables(&tables).unwrap();
    assert_eq!(first.table, second.table);
}

#[test(tokio::test)]
async fn test_governance_over_refreshed_data() {
    let source = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write_fre_fixture(source.path(), 2023);
    collector(source.path(), data.path()).refresh(false).await.unwrap();
    let table = read_merged(&data.path().join("dados_cvm_mesclados.csv")).unwrap();

    let report = governance_report(&table, &Filters::default(), 2023);
    let order: Vec<&str> = report.pay_slice.companies.iter().map(|c| c.company_id.as_str()).collect();
    assert_eq!(order, vec![BETA, ALFA, GAMA]);
    assert_eq!(report.pay_slice.market_max, Some(1_800_000.0 / 1_150_000.0));

    assert_eq!(report.board_balance.len(), 1);
    assert_eq!(report.board_balance[0].company_id, ALFA);
    assert_eq!(report.board_balance[0].ratio, 8_700_000.0 / 1_400_000.0);

    assert_eq!(report.terminations.len(), 1);
    assert_eq!(report.terminations[0].company_id, BETA);
    assert_eq!(report.terminations[0].share_pct, 400_000.0 / 4_600_000.0 * 100.0);

    let board = table
        .records()
        .iter()
        .filter(|r| r.body == BOARD_OF_DIRECTORS)
        .count();
    assert!(board > 0);
}
