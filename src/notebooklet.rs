//! The notebooklet contract: run entry point, result shape, introspection.
//!
//! A notebooklet is a parameterized unit of investigative logic bound to a
//! metadata document. Implementations hold an [`Arc<NotebookEnv>`], verify
//! their required providers at construction, and start every `run` by
//! preparing a [`RunContext`] — which resolves the caller's option list and
//! normalizes the time span — before executing any step.

use std::collections::BTreeSet;
use std::sync::Arc;

use regex::RegexBuilder;
use serde_json::Value;

use crate::config::RunConfig;
use crate::display::{DisplayHandle, Renderer};
use crate::error::Result;
use crate::metadata::{NotebookletMetadata, SectionDocs};
use crate::options::resolve_options;
use crate::providers::DataProviders;
use crate::table::Table;
use crate::timespan::TimeSpan;

/// Immutable execution environment shared by every notebooklet instance:
/// provider handles, run configuration, and the display seam. Created once
/// by the caller's setup step and passed by reference into constructors.
pub struct NotebookEnv {
    pub providers: DataProviders,
    pub config: RunConfig,
    pub display: DisplayHandle,
}

impl NotebookEnv {
    pub fn new(providers: DataProviders, config: RunConfig, renderer: Arc<dyn Renderer>) -> Self {
        let display = DisplayHandle::new(renderer, config.silent);
        Self {
            providers,
            config,
            display,
        }
    }
}

/// Arguments for one `run` call
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Target identifier (host name, IP address, account name, URL, ...)
    pub value: Option<String>,
    /// Pre-fetched input data, for notebooklets that analyze a table
    pub data: Option<Table>,
    /// Query window; defaults to the last day when absent
    pub timespan: Option<TimeSpan>,
    /// Requested options, absolute or incremental
    pub options: Vec<String>,
}

impl RunRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_data(mut self, data: Table) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_timespan(mut self, timespan: TimeSpan) -> Self {
        self.timespan = Some(timespan);
        self
    }

    pub fn with_options(mut self, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// Per-run state computed before any step executes: the effective option
/// set and the normalized time span
#[derive(Debug, Clone)]
pub struct RunContext {
    options: BTreeSet<String>,
    pub timespan: TimeSpan,
}

impl RunContext {
    /// Resolve options and normalize the time span for one run. Every
    /// implementation calls this first; option errors surface before any
    /// provider call is made.
    pub fn prepare(metadata: &NotebookletMetadata, request: &RunRequest) -> Result<Self> {
        let options = resolve_options(metadata, &request.options)?;
        let timespan = request.timespan.clone().unwrap_or_default();
        Ok(Self { options, timespan })
    }

    pub fn is_enabled(&self, option: &str) -> bool {
        self.options.contains(option)
    }

    pub fn options(&self) -> &BTreeSet<String> {
        &self.options
    }
}

/// View of one declared result field
#[derive(Debug)]
pub enum FieldValue<'a> {
    Table(&'a Table),
    Text(&'a str),
    Entity(&'a Value),
    Scalar(f64),
    Unset,
}

impl<'a> FieldValue<'a> {
    /// View of an optional table field
    pub fn of_table(value: &'a Option<Table>) -> Self {
        match value {
            Some(table) => FieldValue::Table(table),
            None => FieldValue::Unset,
        }
    }

    /// View of an optional entity field
    pub fn of_entity(value: &'a Option<Value>) -> Self {
        match value {
            Some(entity) => FieldValue::Entity(entity),
            None => FieldValue::Unset,
        }
    }

    /// Populated means not-None, and for table-like values, non-empty
    pub fn is_populated(&self) -> bool {
        match self {
            FieldValue::Table(table) => !table.is_empty(),
            FieldValue::Text(text) => !text.is_empty(),
            FieldValue::Entity(_) | FieldValue::Scalar(_) => true,
            FieldValue::Unset => false,
        }
    }
}

#[derive(Debug)]
pub struct ResultField<'a> {
    pub name: &'static str,
    pub doc: &'static str,
    pub value: FieldValue<'a>,
}

impl std::fmt::Debug for dyn NotebookResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookResult")
            .field("description", &self.description())
            .finish()
    }
}

/// Common contract of every notebooklet result: a description, the time
/// span used, and the declared output fields in declaration order.
pub trait NotebookResult {
    fn description(&self) -> &str;

    fn timespan(&self) -> &TimeSpan;

    fn fields(&self) -> Vec<ResultField<'_>>;

    /// True iff the named declared field is populated. Unknown names are
    /// never populated; direct struct access stays compile-time checked.
    fn has_data(&self, name: &str) -> bool {
        self.fields()
            .iter()
            .any(|f| f.name == name && f.value.is_populated())
    }

    /// Render every populated field: its doc line, then the value
    fn render(&self, display: &DisplayHandle) {
        display.markdown(&format!("## {}", self.description()));
        display.text(&format!("Time span: {}", self.timespan()));
        for field in self.fields() {
            if !field.value.is_populated() {
                continue;
            }
            display.markdown(&format!("### {}", field.name));
            if !field.doc.is_empty() {
                display.text(field.doc);
            }
            match field.value {
                FieldValue::Table(table) => display.table(table),
                FieldValue::Text(text) => display.text(text),
                FieldValue::Entity(entity) => {
                    let body = serde_json::to_string_pretty(entity).unwrap_or_default();
                    display.markdown(&body);
                }
                FieldValue::Scalar(scalar) => display.text(&scalar.to_string()),
                FieldValue::Unset => {}
            }
        }
    }
}

/// Base contract every notebooklet implements
impl std::fmt::Debug for dyn Notebooklet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notebooklet").field("name", &self.name()).finish()
    }
}

pub trait Notebooklet {
    fn metadata(&self) -> &NotebookletMetadata;

    fn sections(&self) -> &SectionDocs;

    /// Execute the notebooklet. Implementations prepare a [`RunContext`]
    /// first, validate their own required parameters, gate each optional
    /// step on the resolved option set, and retain the populated result as
    /// their last result before returning it.
    fn run(&mut self, request: RunRequest) -> Result<Box<dyn NotebookResult>>;

    /// Result of the most recent `run`, if any
    fn last_result(&self) -> Option<&dyn NotebookResult>;

    fn name(&self) -> &str {
        &self.metadata().name
    }

    fn description(&self) -> &str {
        &self.metadata().description
    }

    fn keywords(&self) -> &[String] {
        &self.metadata().keywords
    }

    fn entity_types(&self) -> &[String] {
        &self.metadata().entity_types
    }

    fn default_options(&self) -> Vec<String> {
        self.metadata().default_option_names()
    }

    fn all_options(&self) -> Vec<String> {
        self.metadata().all_option_names()
    }

    /// Formatted option documentation
    fn list_options(&self) -> String {
        self.metadata().options_doc()
    }

    /// Help text: description, option documentation, and section text
    fn get_help(&self) -> String {
        let metadata = self.metadata();
        let mut help = format!("{}\n\n{}\n", metadata.name, metadata.description);
        help.push_str(&metadata.options_doc());
        for section in self.sections().values() {
            if !section.title.is_empty() {
                help.push_str(&format!("\n{}\n", section.title));
            }
            if !section.text.is_empty() {
                help.push_str(&format!("{}\n", section.text));
            }
        }
        help
    }

    /// Match search terms against this notebooklet's metadata; see
    /// [`match_terms`]
    fn match_terms(&self, search_terms: &str) -> (bool, usize) {
        match_terms(self.metadata(), search_terms)
    }
}

/// Case-insensitive search over a metadata record.
///
/// `search_terms` splits on commas and whitespace; each term is applied as
/// a regular expression (falling back to a literal substring when it does
/// not compile) against the searchable text: name, description, keywords,
/// entity types, and option names. Returns (all terms matched, count of
/// matched terms).
pub fn match_terms(metadata: &NotebookletMetadata, search_terms: &str) -> (bool, usize) {
    let mut search_text = metadata
        .search_terms()
        .into_iter()
        .collect::<Vec<_>>()
        .join(" ");
    search_text.push(' ');
    search_text.push_str(&metadata.description);

    let terms: Vec<&str> = search_terms
        .split([',', ' '])
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() {
        return (false, 0);
    }

    let mut matched = 0;
    for term in &terms {
        let hit = match RegexBuilder::new(term).case_insensitive(true).build() {
            Ok(re) => re.is_match(&search_text),
            Err(_) => search_text.to_lowercase().contains(&term.to_lowercase()),
        };
        if hit {
            matched += 1;
        }
    }
    (matched == terms.len(), matched)
}

/// Shared guard for drill-down helpers: warns when `run` has not produced
/// the named field yet. Returns true when the field is usable.
pub fn check_result_data(
    display: &DisplayHandle,
    result: Option<&dyn NotebookResult>,
    field: &str,
) -> bool {
    match result {
        Some(result) if result.has_data(field) => true,
        _ => {
            display.markdown(&format!(
                "Field '{}' is not populated. Please run the notebooklet (run()) before using this method.",
                field
            ));
            false
        }
    }
}
