//! Notebooklet metadata documents.
//!
//! Each notebooklet carries a YAML document with two top-level blocks:
//! `metadata` (name, options, keywords, entity types, required providers)
//! and `output` (section-keyed display text emitted as the corresponding
//! step runs). Built-in notebooklets embed the document with `include_str!`
//! and parse it once at registration; loading is pure, so parsing the same
//! source twice always yields the same record.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::error::{CasekitError, Result};

/// Separator for "any one of these satisfies" provider requirements
pub const PROVIDER_ALT_SEP: char = '|';

/// One declarable option: a name plus its doc string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDoc {
    pub name: String,
    pub doc: String,
}

/// Display unit for one output section
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SectionDoc {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_hd_level")]
    pub hd_level: u8,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub md: bool,
}

fn default_hd_level() -> u8 {
    2
}

/// Section key -> display unit, keyed identically to how notebooklet code
/// references sections at runtime
pub type SectionDocs = BTreeMap<String, SectionDoc>;

/// Parsed, immutable metadata record for one notebooklet
#[derive(Debug, Clone, Default)]
pub struct NotebookletMetadata {
    pub name: String,
    /// Dotted registry path, bound at registration time
    pub mod_name: String,
    pub description: String,
    pub default_options: Vec<OptionDoc>,
    pub other_options: Vec<OptionDoc>,
    pub keywords: Vec<String>,
    pub entity_types: Vec<String>,
    pub req_providers: Vec<String>,
}

impl NotebookletMetadata {
    /// Names of options enabled when the caller supplies none
    pub fn default_option_names(&self) -> Vec<String> {
        self.default_options.iter().map(|o| o.name.clone()).collect()
    }

    /// Union of default and other option names, sorted
    pub fn all_option_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .default_options
            .iter()
            .chain(self.other_options.iter())
            .map(|o| o.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Casefolded search terms: name, entity types, keywords and options
    pub fn search_terms(&self) -> BTreeSet<String> {
        let mut terms = BTreeSet::new();
        terms.insert(self.name.to_lowercase());
        for term in self
            .entity_types
            .iter()
            .chain(self.keywords.iter())
            .chain(self.all_option_names().iter())
        {
            terms.insert(term.to_lowercase());
        }
        terms
    }

    /// Formatted option documentation appended to notebooklet help text
    pub fn options_doc(&self) -> String {
        let mut lines = vec![
            String::new(),
            "Default Options".to_string(),
            "---------------".to_string(),
        ];
        append_option_lines(&mut lines, &self.default_options);
        lines.extend([
            String::new(),
            "Other Options".to_string(),
            "-------------".to_string(),
        ]);
        append_option_lines(&mut lines, &self.other_options);
        lines.push(String::new());
        lines.join("\n")
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CasekitError::Config {
                message: "metadata document is missing the mandatory 'name' field".to_string(),
            });
        }
        let defaults: BTreeSet<&str> =
            self.default_options.iter().map(|o| o.name.as_str()).collect();
        for opt in &self.other_options {
            if defaults.contains(opt.name.as_str()) {
                return Err(CasekitError::Config {
                    message: format!(
                        "option '{}' appears in both default_options and other_options of '{}'",
                        opt.name, self.name
                    ),
                });
            }
        }
        Ok(())
    }
}

fn append_option_lines(lines: &mut Vec<String>, options: &[OptionDoc]) {
    if options.is_empty() {
        lines.push("None".to_string());
        return;
    }
    for opt in options {
        if opt.doc.is_empty() {
            lines.push(format!("- {}", opt.name));
        } else {
            lines.push(format!("- {}: {}", opt.name, opt.doc));
        }
    }
}

/// An option entry in the YAML document: either a bare name or a
/// single-entry name-to-description mapping
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOption {
    Bare(String),
    Documented(BTreeMap<String, String>),
}

impl RawOption {
    fn into_option_doc(self) -> OptionDoc {
        match self {
            RawOption::Bare(name) => OptionDoc {
                name,
                doc: String::new(),
            },
            RawOption::Documented(map) => match map.into_iter().next() {
                Some((name, doc)) => OptionDoc { name, doc },
                None => OptionDoc {
                    name: String::new(),
                    doc: String::new(),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawMetadata {
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    default_options: Vec<RawOption>,
    #[serde(default)]
    other_options: Vec<RawOption>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    entity_types: Vec<String>,
    #[serde(default)]
    req_providers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    metadata: Option<RawMetadata>,
    #[serde(default)]
    output: SectionDocs,
}

/// Parse a metadata document and bind it to a registry path.
///
/// Fails with a `Config` error when the document cannot be parsed, when the
/// mandatory `name` field is absent, or when the option name-sets overlap.
pub fn load_metadata(source: &str, mod_name: &str) -> Result<(NotebookletMetadata, SectionDocs)> {
    let doc: RawDocument = serde_yaml::from_str(source)?;
    let raw = doc.metadata.ok_or_else(|| CasekitError::Config {
        message: "metadata document has no 'metadata' block".to_string(),
    })?;

    let metadata = NotebookletMetadata {
        name: raw.name.unwrap_or_default(),
        mod_name: mod_name.to_string(),
        description: raw.description,
        default_options: raw
            .default_options
            .into_iter()
            .map(RawOption::into_option_doc)
            .collect(),
        other_options: raw
            .other_options
            .into_iter()
            .map(RawOption::into_option_doc)
            .collect(),
        keywords: raw.keywords,
        entity_types: raw.entity_types,
        req_providers: raw.req_providers,
    };
    metadata.validate()?;
    Ok((metadata, doc.output))
}

/// Split a provider requirement into its alternatives, in declared order
pub fn provider_alternatives(requirement: &str) -> Vec<&str> {
    requirement
        .split(PROVIDER_ALT_SEP)
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .collect()
}
