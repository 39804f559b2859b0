//! Network-focused notebooklets.

pub mod ip_summary;
pub mod network_flow_summary;
