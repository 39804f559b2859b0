//! Shared fixtures for the integration tests: an offline environment with
//! CSV-backed query data and static enrichment providers.

// Not every test binary uses every fixture.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use casekit::config::RunConfig;
use casekit::display::{RenderItem, Renderer};
use casekit::notebooklet::NotebookEnv;
use casekit::providers::{
    DataProviders, GeoRecord, LocalDataProvider, StaticGeoIpProvider, StaticTiProvider,
    StaticWhoisProvider, TiSeverity, TiVerdict, WhoisRecord,
};
use casekit::timespan::TimeSpan;

/// Renderer that counts calls, for asserting silent-mode behavior
#[derive(Default)]
pub struct CountingRenderer {
    count: AtomicUsize,
}

impl CountingRenderer {
    pub fn rendered(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Renderer for CountingRenderer {
    fn render(&self, _item: RenderItem<'_>) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

pub const HOST: &str = "victim00";
pub const ACCOUNT: &str = "corp\\alice";

const HEARTBEAT_CSV: &str = "\
Computer,OSFamily,OSName,ComputerEnvironment,AgentId
victim00,Windows,Windows Server 2019,Azure,aa-bb-cc
other01,Linux,Ubuntu 22.04,NonAzure,dd-ee-ff
";

const ALERTS_CSV: &str = "\
TimeGenerated,AlertName,Severity,Entities
2026-02-01T10:00:00Z,Suspicious PowerShell,High,\"cmd 10.1.1.1 http://bad.example/x\"
2026-02-01T11:00:00Z,Anomalous logon,Medium,\"203.0.113.9\"
";

const BOOKMARKS_CSV: &str = "\
TimeGenerated,BookmarkName,Notes
2026-02-01T12:00:00Z,Pivot point,Check lateral movement
";

const EVENT_SUMMARY_CSV: &str = "\
Activity,Count
4624 - An account was successfully logged on.,120
4688 - A new process has been created.,403
";

const HOST_EVENTS_CSV: &str = "\
TimeGenerated,Computer,Activity,EventData
2026-02-01T09:00:00Z,victim00,4720 - A user account was created.,\"{\"\"TargetUserName\"\":\"\"svc_backup\"\"}\"
2026-02-01T09:05:00Z,victim00,4688 - A new process has been created.,\"{\"\"NewProcessName\"\":\"\"cmd.exe\"\"}\"
";

const ACCT_EVENTS_CSV: &str = "\
TimeGenerated,Computer,Activity,EventData
2026-02-01T09:00:00Z,victim00,4720 - A user account was created.,\"{\"\"TargetUserName\"\":\"\"svc_backup\"\"}\"
";

const HOST_LOGONS_CSV: &str = "\
TimeGenerated,Computer,Account,LogonResult,IpAddress
2026-02-01T08:00:00Z,victim00,corp\\alice,Success,10.0.0.5
2026-02-01T08:10:00Z,victim00,corp\\alice,Failure,203.0.113.9
2026-02-01T08:11:00Z,victim00,corp\\bob,Success,10.0.0.6
";

const ACCOUNT_LOGONS_CSV: &str = "\
TimeGenerated,Computer,Account,LogonResult,IpAddress
2026-02-01T08:00:00Z,victim00,corp\\alice,Success,10.0.0.5
2026-02-01T09:30:00Z,files01,corp\\alice,Success,10.0.0.5
2026-02-01T09:45:00Z,files01,corp\\alice,Failure,203.0.113.9
";

const HOST_IPS_CSV: &str = "\
HostName,PrivateIpAddress,PublicIpAddress
victim00,10.0.0.5,203.0.113.50
";

const FLOWS_CSV: &str = "\
TimeGenerated,Computer,RemoteIpAddress,Asn,FlowCount
2026-02-01T08:00:00Z,victim00,203.0.113.9,AS64500,17
2026-02-01T08:30:00Z,victim00,198.51.100.2,AS64501,3
";

fn local_provider() -> LocalDataProvider {
    LocalDataProvider::new()
        .register_csv("Heartbeat.get_info_by_hostname", HEARTBEAT_CSV)
        .and_then(|p| p.register_csv("SecurityAlert.list_related_alerts", ALERTS_CSV))
        .and_then(|p| p.register_csv("SecurityAlert.list_alerts", ALERTS_CSV))
        .and_then(|p| p.register_csv("SecurityAlert.list_alerts_for_ip", ALERTS_CSV))
        .and_then(|p| p.register_csv("AzureSentinel.list_bookmarks_for_entity", BOOKMARKS_CSV))
        .and_then(|p| p.register_csv("SecurityEvent.summarize_events", EVENT_SUMMARY_CSV))
        .and_then(|p| p.register_csv("SecurityEvent.list_host_events", HOST_EVENTS_CSV))
        .and_then(|p| p.register_csv("SecurityEvent.account_change_events", ACCT_EVENTS_CSV))
        .and_then(|p| p.register_csv("SecurityEvent.list_host_logons", HOST_LOGONS_CSV))
        .and_then(|p| p.register_csv("SecurityEvent.list_logons_by_account", ACCOUNT_LOGONS_CSV))
        .and_then(|p| p.register_csv("SecurityEvent.list_logons_for_source_ip", HOST_LOGONS_CSV))
        .and_then(|p| p.register_csv("AzureNetwork.get_ips_for_host", HOST_IPS_CSV))
        .and_then(|p| {
            p.register_csv(
                "AzureNetworkAnalytics.list_azure_network_flows_by_host",
                FLOWS_CSV,
            )
        })
        .and_then(|p| p.register_csv("AzureNetworkAnalytics.list_flows_by_ip", FLOWS_CSV))
        .expect("fixture CSV is valid")
}

fn enrichment_ti() -> StaticTiProvider {
    StaticTiProvider::new().with_verdict(TiVerdict {
        ioc: "203.0.113.9".to_string(),
        severity: TiSeverity::High,
        provider: "static".to_string(),
        detail: Some("known scanner".to_string()),
        error: None,
    })
}

fn enrichment_geo() -> StaticGeoIpProvider {
    StaticGeoIpProvider::new().with_record(GeoRecord {
        ip: "203.0.113.9".to_string(),
        country: Some("Testland".to_string()),
        city: Some("Example City".to_string()),
        latitude: Some(51.5),
        longitude: Some(-0.1),
        asn: Some("AS64500".to_string()),
    })
}

fn enrichment_whois() -> StaticWhoisProvider {
    StaticWhoisProvider::new().with_record(WhoisRecord {
        domain: "bad.example".to_string(),
        registrar: Some("Example Registrar".to_string()),
        created: Some("2025-11-01".to_string()),
        name_servers: vec!["ns1.bad.example".to_string()],
    })
}

/// Full provider set over the CSV fixtures
pub fn full_providers() -> DataProviders {
    DataProviders::builder("LocalData", Arc::new(local_provider()))
        .ti("tilookup", Arc::new(enrichment_ti()))
        .geoip("geolitelookup", Arc::new(enrichment_geo()))
        .whois("whois", Arc::new(enrichment_whois()))
        .build()
}

/// Provider set with no enrichment providers loaded
pub fn query_only_providers() -> DataProviders {
    DataProviders::builder("LocalData", Arc::new(local_provider())).build()
}

/// Environment over the full provider set, returning the renderer so tests
/// can count display calls
pub fn env_with_renderer(silent: bool) -> (Arc<NotebookEnv>, Arc<CountingRenderer>) {
    let renderer = Arc::new(CountingRenderer::default());
    let config = RunConfig::default().with_silent(silent);
    let env = Arc::new(NotebookEnv::new(
        full_providers(),
        config,
        renderer.clone(),
    ));
    (env, renderer)
}

pub fn env() -> Arc<NotebookEnv> {
    env_with_renderer(false).0
}

/// Fixed February 2026 window covering all fixture timestamps
pub fn fixture_timespan() -> TimeSpan {
    TimeSpan::parse("2026-02-01T00:00:00Z", "2026-02-02T00:00:00Z").expect("valid fixture dates")
}
