//! End-to-end notebooklet runs over the offline fixture environment.

mod common;

use std::sync::Arc;

use casekit::config::RunConfig;
use casekit::display::NullRenderer;
use casekit::error::CasekitError;
use casekit::nb::host::host_logons_summary::HostLogonsSummary;
use casekit::nb::host::host_summary::HostSummary;
use casekit::nb::host::win_host_events::WinHostEvents;
use casekit::notebooklet::{NotebookEnv, Notebooklet, RunRequest};
use casekit::registry::Registry;

use common::{ACCOUNT, HOST, env, env_with_renderer, fixture_timespan, query_only_providers};

#[test]
fn host_summary_defaults_populate_expected_fields() {
    let mut nb = HostSummary::new(env()).unwrap();
    nb.run(
        RunRequest::new()
            .with_value(HOST)
            .with_timespan(fixture_timespan()),
    )
    .unwrap();

    let result = nb.last().unwrap();
    // Default options ran
    assert!(result.host_entity.is_some());
    let entity = result.host_entity.as_ref().unwrap();
    assert_eq!(entity["HostName"], HOST);
    assert_eq!(entity["OSFamily"], "Windows");
    assert_eq!(result.related_alerts.as_ref().unwrap().len(), 2);
    assert!(result.related_bookmarks.is_some());
    assert!(result.summary.is_some());
    // Non-default options did not
    assert!(result.processes.is_none());
    assert!(result.process_ti.is_none());
    assert!(result.scheduled_tasks.is_none());
}

#[test]
fn run_without_value_names_the_parameter() {
    let mut nb = HostSummary::new(env()).unwrap();
    let err = nb
        .run(RunRequest::new().with_timespan(fixture_timespan()))
        .unwrap_err();
    match err {
        CasekitError::MissingParameter { name } => assert_eq!(name, "value"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn run_without_timespan_names_the_parameter() {
    let mut nb = HostSummary::new(env()).unwrap();
    let err = nb.run(RunRequest::new().with_value(HOST)).unwrap_err();
    match err {
        CasekitError::MissingParameter { name } => assert_eq!(name, "timespan"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_options_fail_before_any_step() {
    let mut nb = HostSummary::new(env()).unwrap();
    let err = nb
        .run(
            RunRequest::new()
                .with_value(HOST)
                .with_timespan(fixture_timespan())
                .with_options(["heartbeat", "+azure_api"]),
        )
        .unwrap_err();
    assert!(matches!(err, CasekitError::InvalidOption { .. }));
    assert!(nb.last().is_none());
}

#[test]
fn missing_provider_fails_at_construction() {
    // HostLogonsSummary requires geolitelookup, absent from this set
    let providers = query_only_providers();
    let env = Arc::new(NotebookEnv::new(
        providers,
        RunConfig::default(),
        Arc::new(NullRenderer),
    ));
    let err = HostLogonsSummary::new(env).unwrap_err();
    match err {
        CasekitError::MissingProvider { requirement } => {
            assert_eq!(requirement, "geolitelookup");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn provider_alternatives_satisfy_requirements() {
    // Every builtin requiring LogAnalytics|LocalData constructs against
    // the LocalData-only fixture set when its enrichment needs are met
    let mut nb = WinHostEvents::new(env()).unwrap();
    assert_eq!(nb.name(), "WinHostEvents");
    nb.run(
        RunRequest::new()
            .with_value(HOST)
            .with_timespan(fixture_timespan()),
    )
    .unwrap();
}

#[test]
fn win_host_events_defaults_and_expansion() {
    let mut nb = WinHostEvents::new(env()).unwrap();
    nb.run(
        RunRequest::new()
            .with_value(HOST)
            .with_timespan(fixture_timespan()),
    )
    .unwrap();
    let result = nb.last().unwrap();
    assert!(result.all_events.is_some());
    assert!(result.event_stats.is_some());
    assert!(result.account_events.is_some());
    // expand_events is not a default option
    assert!(result.expanded_events.is_none());

    nb.run(
        RunRequest::new()
            .with_value(HOST)
            .with_timespan(fixture_timespan())
            .with_options(["+expand_events"]),
    )
    .unwrap();
    let result = nb.last().unwrap();
    let expanded = result.expanded_events.as_ref().unwrap();
    assert!(expanded.has_column("TargetUserName"));
    assert_eq!(expanded.get_str(0, "TargetUserName"), Some("svc_backup"));
}

#[test]
fn explicit_option_subset_limits_executed_steps() {
    let mut nb = HostSummary::new(env()).unwrap();
    nb.run(
        RunRequest::new()
            .with_value(HOST)
            .with_timespan(fixture_timespan())
            .with_options(["heartbeat"]),
    )
    .unwrap();
    let result = nb.last().unwrap();
    assert!(result.host_entity.is_some());
    assert!(result.related_alerts.is_none());
    assert!(result.related_bookmarks.is_none());
}

#[test]
fn deterministic_providers_make_runs_idempotent() {
    let mut nb = HostSummary::new(env()).unwrap();
    let request = RunRequest::new()
        .with_value(HOST)
        .with_timespan(fixture_timespan());
    nb.run(request.clone()).unwrap();
    let first = nb.last().unwrap().clone();
    nb.run(request).unwrap();
    let second = nb.last().unwrap();

    assert_eq!(first.host_entity, second.host_entity);
    assert_eq!(first.related_alerts, second.related_alerts);
    assert_eq!(first.related_bookmarks, second.related_bookmarks);
    assert_eq!(first.summary, second.summary);
}

#[test]
fn silent_mode_suppresses_every_render() {
    let (env, renderer) = env_with_renderer(true);
    let mut nb = HostSummary::new(env).unwrap();
    nb.run(
        RunRequest::new()
            .with_value(HOST)
            .with_timespan(fixture_timespan()),
    )
    .unwrap();
    assert_eq!(renderer.rendered(), 0);

    let (env, renderer) = env_with_renderer(false);
    let mut nb = HostSummary::new(env).unwrap();
    nb.run(
        RunRequest::new()
            .with_value(HOST)
            .with_timespan(fixture_timespan()),
    )
    .unwrap();
    assert!(renderer.rendered() > 0);
}

#[test]
fn drill_down_helper_warns_before_run() {
    let (env, renderer) = env_with_renderer(false);
    let nb = HostSummary::new(env).unwrap();
    nb.alert_timeline();
    // The only render is the warning; no timeline was drawn
    assert_eq!(renderer.rendered(), 1);
}

#[test]
fn results_report_field_population() {
    let mut nb = HostSummary::new(env()).unwrap();
    let result = nb
        .run(
            RunRequest::new()
                .with_value(HOST)
                .with_timespan(fixture_timespan()),
        )
        .unwrap();
    assert!(result.has_data("related_alerts"));
    assert!(!result.has_data("processes"));
    assert!(!result.has_data("no_such_field"));
    assert_eq!(result.timespan(), &fixture_timespan());
}

#[test]
fn account_summary_via_registry() {
    let registry = Registry::builtin();
    let mut nb = registry
        .create("azsent.account.AccountSummary", env())
        .unwrap();
    let result = nb
        .run(
            RunRequest::new()
                .with_value(ACCOUNT)
                .with_timespan(fixture_timespan()),
        )
        .unwrap();
    assert!(result.has_data("account_activity"));
    assert!(result.has_data("ip_summary"));
    // get_host_logons is not a default option
    assert!(!result.has_data("host_logons"));
}

#[test]
fn network_flow_summary_groups_by_asn() {
    let registry = Registry::builtin();
    let mut nb = registry
        .create("azsent.network.NetworkFlowSummary", env())
        .unwrap();
    let result = nb
        .run(
            RunRequest::new()
                .with_value(HOST)
                .with_timespan(fixture_timespan()),
        )
        .unwrap();
    assert!(result.has_data("network_flows"));
    assert!(result.has_data("flow_summary"));
    assert!(result.has_data("flow_map"));
}

#[test]
fn url_summary_enriches_domain() {
    let registry = Registry::builtin();
    let mut nb = registry.create("azsent.url.UrlSummary", env()).unwrap();
    let result = nb
        .run(
            RunRequest::new()
                .with_value("http://bad.example/x")
                .with_timespan(fixture_timespan()),
        )
        .unwrap();
    assert!(result.has_data("ti_results"));
    let whois = result
        .fields()
        .into_iter()
        .find(|f| f.name == "whois")
        .unwrap();
    assert!(whois.value.is_populated());
    // alerts is not a default option
    assert!(!result.has_data("related_alerts"));
}

#[test]
fn alert_enrichment_flags_known_bad_observable() {
    let registry = Registry::builtin();
    let mut nb = registry.create("azsent.alert.EnrichAlerts", env()).unwrap();
    let result = nb
        .run(RunRequest::new().with_timespan(fixture_timespan()))
        .unwrap();
    assert!(result.has_data("alerts"));
    assert!(result.has_data("ti_results"));
    assert!(result.has_data("severity_summary"));
}

#[test]
fn get_help_includes_options_and_sections() {
    let nb = HostSummary::new(env()).unwrap();
    let help = nb.get_help();
    assert!(help.contains("HostSummary"));
    assert!(help.contains("Default Options"));
    assert!(help.contains("heartbeat"));
    assert!(help.contains("Host Entity Summary"));
}

#[test]
fn match_terms_scores_host_summary() {
    let nb = HostSummary::new(env()).unwrap();
    let (matched, count) = nb.match_terms("host");
    assert!(matched);
    assert!(count >= 1);
    let (matched, _) = nb.match_terms("kubernetes");
    assert!(!matched);
}
