//! Host-focused notebooklets.

pub mod host_logons_summary;
pub mod host_summary;
pub mod logon_sessions_rarity;
pub mod win_host_events;
