//! Portal client against a mock HTTP server

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use test_log::test;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::logging::{init_test_logging, log_test_step};
use crate::common::test_data::{fre_table, test_config, REGISTRY};
use cvm_pay::api::{CvmClient, FilingSource, TableKind};
use cvm_pay::data_collector::DataCollector;
use cvm_pay::error::PipelineError;
use cvm_pay::storage::read_merged;

async fn mount_table(server: &MockServer, kind: TableKind, year: i32) {
    Mock::given(method("GET"))
        .and(path(format!("/{}", kind.file_name(Some(year)))))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(fre_table(kind, year).into_bytes()))
        .mount(server)
        .await;
}

#[test(tokio::test)]
async fn test_fetch_parses_portal_csv() {
    init_test_logging();
    let server = MockServer::start().await;
    mount_table(&server, TableKind::BodyTotals, 2023).await;

    let data = tempfile::tempdir().unwrap();
    let client = CvmClient::new(&test_config(data.path(), &server.uri(), vec![2023])).unwrap();
    let table = client.fetch_table(TableKind::BodyTotals, Some(2023)).await.unwrap();

    assert_eq!(table.kind, TableKind::BodyTotals);
    assert_eq!(table.year, Some(2023));
    assert_eq!(table.len(), 5);
    assert_eq!(table.headers[0], "CNPJ_Companhia");
}

#[test(tokio::test)]
async fn test_missing_table_is_source_unavailable() {
    init_test_logging();
    log_test_step("Requesting a table the server does not have");
    let server = MockServer::start().await;

    let data = tempfile::tempdir().unwrap();
    let client = CvmClient::new(&test_config(data.path(), &server.uri(), vec![2023])).unwrap();
    let result = client.fetch_table(TableKind::VariablePay, Some(2023)).await;

    assert_matches!(result, Err(PipelineError::SourceUnavailable { ref reason, .. }) if reason.contains("404"));
}

#[test(tokio::test)]
async fn test_refresh_over_http() {
    init_test_logging();
    let server = MockServer::start().await;
    for kind in TableKind::YEARLY {
        mount_table(&server, kind, 2023).await;
    }
    Mock::given(method("GET"))
        .and(path("/cad_cia_aberta.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(REGISTRY.as_bytes().to_vec()))
        .mount(&server)
        .await;

    let data = tempfile::tempdir().unwrap();
    let config = test_config(data.path(), &server.uri(), vec![2023]);
    let merged_file = config.merged_file.clone();
    let client = CvmClient::new(&config).unwrap();

    let report = DataCollector::new(Arc::new(client), config).refresh(false).await.unwrap();
    assert_eq!(report.companies, 3);

    let table = read_merged(&merged_file).unwrap();
    assert_eq!(table.len(), report.emitted_rows);
    assert_eq!(table.sectors().len(), 3);
}
