//! Discovery round-trip, search ranking and namespace browsing.

use std::sync::Arc;

use casekit::error::{CasekitError, Result};
use casekit::notebooklet::{NotebookEnv, Notebooklet};
use casekit::registry::{NotebookletEntry, Registry};

const BUILTIN_PATHS: &[&str] = &[
    "azsent.account.AccountSummary",
    "azsent.alert.EnrichAlerts",
    "azsent.host.HostLogonsSummary",
    "azsent.host.HostSummary",
    "azsent.host.LogonSessionsRarity",
    "azsent.host.WinHostEvents",
    "azsent.network.IpSummary",
    "azsent.network.NetworkFlowSummary",
    "azsent.url.UrlSummary",
];

#[test]
fn every_builtin_appears_exactly_once() {
    let registry = Registry::builtin();
    assert_eq!(registry.len(), BUILTIN_PATHS.len());
    let mut paths = registry.paths();
    paths.sort();
    assert_eq!(paths, BUILTIN_PATHS);
}

#[test]
fn exact_path_lookup_round_trips() {
    let registry = Registry::builtin();
    for path in BUILTIN_PATHS {
        let entry = registry.get(path).unwrap_or_else(|| panic!("{path} missing"));
        assert_eq!(entry.path, *path);
    }
    assert!(registry.get("azsent.host.NoSuchThing").is_none());
}

#[test]
fn find_ranks_by_match_count() {
    let registry = Registry::builtin();
    let hits = registry.find("host", false);
    assert!(!hits.is_empty());
    // Scores are descending
    for window in hits.windows(2) {
        assert!(window[0].1 >= window[1].1);
    }
    assert!(hits.iter().any(|(path, _)| *path == "azsent.host.HostSummary"));
}

#[test]
fn find_full_match_requires_every_term() {
    let registry = Registry::builtin();
    let loose = registry.find("host, zzz_not_a_term", false);
    let strict = registry.find("host, zzz_not_a_term", true);
    assert!(!loose.is_empty());
    assert!(strict.is_empty());
}

#[test]
fn browse_exposes_capability_areas() {
    let registry = Registry::builtin();
    let root = registry.browse();
    let azsent = root.child("azsent").expect("azsent area");
    let host = azsent.child("host").expect("host area");
    assert_eq!(host.notebooklets().len(), 4);
    assert!(azsent.child("network").is_some());
    assert!(azsent.child("url").is_some());
}

#[test]
fn shared_registry_is_stable() {
    let a = Registry::shared();
    let b = Registry::shared();
    assert_eq!(a.len(), b.len());
    assert!(std::ptr::eq(a, b));
}

fn failing_ctor(_env: Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>> {
    Err(CasekitError::Internal {
        message: "never constructed".to_string(),
    })
}

#[test]
fn custom_entries_extend_the_builtins() {
    let custom = [NotebookletEntry {
        path: "contrib.host.SshdSummary",
        metadata_src: "metadata:\n  name: SshdSummary\n  keywords: [ssh]\n",
        ctor: failing_ctor,
    }];
    let registry = Registry::discover(&[&custom]);
    assert_eq!(registry.len(), BUILTIN_PATHS.len() + 1);
    assert!(registry.get("contrib.host.SshdSummary").is_some());
}

#[test]
fn broken_custom_entry_is_skipped_not_fatal() {
    let custom = [
        NotebookletEntry {
            path: "contrib.host.Broken",
            metadata_src: "metadata:\n  description: no name\n",
            ctor: failing_ctor,
        },
        NotebookletEntry {
            path: "contrib.host.Working",
            metadata_src: "metadata:\n  name: Working\n",
            ctor: failing_ctor,
        },
    ];
    let registry = Registry::discover(&[&custom]);
    assert!(registry.get("contrib.host.Broken").is_none());
    assert!(registry.get("contrib.host.Working").is_some());
    // The built-ins are unaffected by the broken entry
    assert!(registry.get("azsent.host.HostSummary").is_some());
}

#[test]
fn rebuilding_replaces_the_previous_registry_atomically() {
    let custom = [NotebookletEntry {
        path: "contrib.host.SshdSummary",
        metadata_src: "metadata:\n  name: SshdSummary\n",
        ctor: failing_ctor,
    }];
    let mut registry = Registry::builtin();
    assert!(registry.get("contrib.host.SshdSummary").is_none());
    registry = Registry::discover(&[&custom]);
    assert!(registry.get("contrib.host.SshdSummary").is_some());
}

#[test]
fn create_on_unknown_path_is_a_config_error() {
    let registry = Registry::builtin();
    let providers = casekit::providers::DataProviders::builder(
        "LocalData",
        Arc::new(casekit::providers::LocalDataProvider::new()),
    )
    .build();
    let env = Arc::new(NotebookEnv::new(
        providers,
        casekit::config::RunConfig::default(),
        Arc::new(casekit::display::NullRenderer),
    ));
    let err = registry.create("azsent.host.NoSuchThing", env).unwrap_err();
    assert!(matches!(err, CasekitError::Config { .. }));
}
