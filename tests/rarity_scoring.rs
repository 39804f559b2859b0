//! Logon session rarity scoring over synthetic process events.

mod common;

use casekit::error::CasekitError;
use casekit::nb::host::logon_sessions_rarity::LogonSessionsRarity;
use casekit::notebooklet::{Notebooklet, RunRequest};
use casekit::table::Table;

use common::{env, fixture_timespan};

/// Many routine service events in one session, one odd invocation in
/// another
fn process_events() -> Table {
    let mut csv = String::from(
        "TimeGenerated,Account,NewProcessName,CommandLine,SubjectLogonId,NewProcessId,ProcessId\n",
    );
    for i in 0..20 {
        csv.push_str(&format!(
            "2026-02-01T08:{:02}:00Z,NT AUTHORITY\\SYSTEM,C:\\Windows\\System32\\svchost.exe,svchost.exe -k netsvcs,0x3e7,{},4\n",
            i,
            100 + i
        ));
    }
    csv.push_str(
        "2026-02-01T09:00:00Z,corp\\mallory,C:\\Temp\\rundl132.exe,rundl132.exe -enc SQBFAFgA,0xdeadbeef,777,4\n",
    );
    Table::from_csv(&csv).unwrap()
}

#[test]
fn rare_session_ranks_first() {
    let mut nb = LogonSessionsRarity::new(env()).unwrap();
    nb.run(
        RunRequest::new()
            .with_data(process_events())
            .with_timespan(fixture_timespan()),
    )
    .unwrap();

    let result = nb.last().unwrap();
    let sessions = result.session_rarity.as_ref().unwrap();
    assert_eq!(sessions.len(), 2);
    // The one-off session sorts above the routine service session
    assert_eq!(sessions.get_str(0, "Session"), Some("0xdeadbeef"));
    let rare = sessions.get_f64(0, "MeanRarity").unwrap();
    let common_score = sessions.get_f64(1, "MeanRarity").unwrap();
    assert!(rare > common_score);
}

#[test]
fn rarity_scores_are_bounded() {
    let mut nb = LogonSessionsRarity::new(env()).unwrap();
    nb.run(
        RunRequest::new()
            .with_data(process_events())
            .with_timespan(fixture_timespan()),
    )
    .unwrap();

    let result = nb.last().unwrap();
    let events = result.processes_with_cluster.as_ref().unwrap();
    for i in 0..events.len() {
        let rarity = events.get_f64(i, "Rarity").unwrap();
        assert!((0.0..=1.0).contains(&rarity), "rarity {rarity} out of range");
    }
}

#[test]
fn clustered_events_share_rarity() {
    let mut nb = LogonSessionsRarity::new(env()).unwrap();
    nb.run(
        RunRequest::new()
            .with_data(process_events())
            .with_timespan(fixture_timespan()),
    )
    .unwrap();

    let result = nb.last().unwrap();
    let events = result.processes_with_cluster.as_ref().unwrap();
    let routine = events.filter_eq("SubjectLogonId", "0x3e7");
    let first = routine.get_f64(0, "Rarity").unwrap();
    for i in 1..routine.len() {
        assert_eq!(routine.get_f64(i, "Rarity"), Some(first));
    }
}

#[test]
fn cluster_table_has_one_row_per_cluster() {
    let mut nb = LogonSessionsRarity::new(env()).unwrap();
    nb.run(
        RunRequest::new()
            .with_data(process_events())
            .with_timespan(fixture_timespan()),
    )
    .unwrap();

    let result = nb.last().unwrap();
    let clusters = result.process_clusters.as_ref().unwrap();
    // 20 identical service events collapse into one cluster; the odd
    // invocation stands alone
    assert_eq!(clusters.len(), 2);
}

#[test]
fn missing_data_names_the_parameter() {
    let mut nb = LogonSessionsRarity::new(env()).unwrap();
    let err = nb
        .run(RunRequest::new().with_timespan(fixture_timespan()))
        .unwrap_err();
    match err {
        CasekitError::MissingParameter { name } => assert_eq!(name, "data"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn data_without_process_columns_is_rejected() {
    let table = Table::from_csv("TimeGenerated,Whatever\n2026-02-01T08:00:00Z,x\n").unwrap();
    let mut nb = LogonSessionsRarity::new(env()).unwrap();
    let err = nb
        .run(
            RunRequest::new()
                .with_data(table)
                .with_timespan(fixture_timespan()),
        )
        .unwrap_err();
    assert!(matches!(err, CasekitError::MissingParameter { .. }));
}

#[test]
fn process_tree_renders_for_account() {
    let (env, renderer) = common::env_with_renderer(false);
    let mut nb = LogonSessionsRarity::new(env).unwrap();
    nb.run(
        RunRequest::new()
            .with_data(process_events())
            .with_timespan(fixture_timespan()),
    )
    .unwrap();
    let before = renderer.rendered();
    nb.process_tree(Some("corp\\mallory"), None);
    assert!(renderer.rendered() > before);
}
