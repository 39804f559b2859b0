//! Account-focused notebooklets.

pub mod account_summary;
