//! URL-focused notebooklets.

pub mod url_summary;
