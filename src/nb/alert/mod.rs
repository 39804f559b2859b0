//! Alert-focused notebooklets.

pub mod ti_enrich;
