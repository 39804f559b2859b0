//! Built-in notebooklets, grouped by capability area.
//!
//! Each notebooklet module exports a `const ENTRY: NotebookletEntry`
//! (dotted path, embedded metadata document, constructor). Adding a
//! notebooklet means adding its module and listing its entry in
//! [`BUILTIN_NOTEBOOKLETS`]; callers can register out-of-tree notebooklets
//! by passing their own entry slices to `Registry::discover`.

pub mod account;
pub mod alert;
pub mod host;
pub mod network;
pub mod support;
pub mod url;

use crate::registry::NotebookletEntry;

/// Registration table scanned by `Registry::discover`
pub static BUILTIN_NOTEBOOKLETS: &[NotebookletEntry] = &[
    account::account_summary::ENTRY,
    alert::ti_enrich::ENTRY,
    host::host_summary::ENTRY,
    host::host_logons_summary::ENTRY,
    host::logon_sessions_rarity::ENTRY,
    host::win_host_events::ENTRY,
    network::ip_summary::ENTRY,
    network::network_flow_summary::ENTRY,
    url::url_summary::ENTRY,
];
