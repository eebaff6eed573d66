//! Quartile statistics against hand-computed reference values

use pretty_assertions::assert_eq;
use test_log::test;

use crate::common::test_data::create_test_record;
use cvm_pay::analysis::{peer_comparison, sector_statistics, CalcMode, Filters, PeerGroup};
use cvm_pay::merger::normalize::EXECUTIVE_BOARD;
use cvm_pay::models::{Component, FilingRecord};
use cvm_pay::storage::MergedTable;

fn in_sector(company: &str, sector: &str, paid: f64) -> FilingRecord {
    let mut record = create_test_record(company, 2023, EXECUTIVE_BOARD, Component::HighestIndividual, paid);
    record.sector = sector.to_string();
    record
}

fn sample_table() -> MergedTable {
    MergedTable::from_records(vec![
        in_sector("b1", "BANCOS", 10.0),
        in_sector("b2", "BANCOS", 20.0),
        in_sector("b3", "BANCOS", 30.0),
        in_sector("b4", "BANCOS", 40.0),
        in_sector("b5", "BANCOS", 50.0),
        in_sector("e1", "ENERGIA ELETRICA", 5.0),
        in_sector("e2", "ENERGIA ELETRICA", 7.0),
        in_sector("e3", "ENERGIA ELETRICA", -5.0),
    ])
}

#[test]
fn test_sector_quartiles_match_reference() {
    let stats = sector_statistics(
        &sample_table(),
        &Filters::default(),
        2023,
        EXECUTIVE_BOARD,
        Component::HighestIndividual,
        CalcMode::Total,
    );

    let banks = &stats.sectors[0];
    assert_eq!(banks.sector, "BANCOS");
    assert_eq!(
        (banks.summary.q1, banks.summary.median, banks.summary.q3),
        (20.0, 30.0, 40.0)
    );

    // Negative amounts are excluded from the sample
    let energy = &stats.sectors[1];
    assert_eq!(energy.summary.count, 2);
    assert_eq!(
        (energy.summary.q1, energy.summary.median, energy.summary.q3),
        (5.5, 6.0, 6.5)
    );

    let overall = stats.overall.unwrap();
    assert_eq!(overall.count, 7);
    assert_eq!(overall.q1, 8.5);
    assert_eq!(overall.median, 20.0);
    assert_eq!(overall.q3, 35.0);
    assert_eq!(overall.mean, 162.0 / 7.0);
}

#[test]
fn test_per_member_mode_divides_by_members() {
    let mut record = in_sector("b1", "BANCOS", 90.0);
    record.members = 3.0;
    let table = MergedTable::from_records(vec![record]);

    let stats = sector_statistics(
        &table,
        &Filters::default(),
        2023,
        EXECUTIVE_BOARD,
        Component::HighestIndividual,
        CalcMode::PerMember,
    );
    let overall = stats.overall.unwrap();
    assert_eq!(overall.median, 30.0);
    assert_eq!(overall.std_dev, None);
}

#[test]
fn test_peer_group_excluding_everyone_is_empty() {
    let peers = PeerGroup::manual("Nenhum", Vec::<String>::new());
    let comparison = peer_comparison(
        &sample_table(),
        &Filters::default(),
        &peers,
        2023,
        EXECUTIVE_BOARD,
        Component::HighestIndividual,
        CalcMode::Total,
    );
    assert!(comparison.is_empty());
    assert_eq!(comparison.summary, None);
    assert_eq!(comparison.group, "Nenhum");
}
