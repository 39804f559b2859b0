//! Notebooklet discovery and the process-wide registry.
//!
//! Registration is explicit: each notebooklet module contributes a static
//! [`NotebookletEntry`] (dotted path, embedded metadata document,
//! constructor), and discovery walks the built-in table plus any
//! caller-supplied entry slices. A module whose metadata fails to parse is
//! skipped with a warning; the rest of the scan proceeds. The returned
//! [`Registry`] is immutable — re-running discovery builds a fresh value,
//! so a rebuild is never partially visible.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::error::{CasekitError, Result};
use crate::metadata::{NotebookletMetadata, SectionDocs, load_metadata};
use crate::notebooklet::{Notebooklet, NotebookEnv, match_terms};

/// Constructor signature every registered notebooklet provides
pub type NotebookletCtor = fn(Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>>;

/// Static registration record contributed by a notebooklet module
#[derive(Clone, Copy)]
pub struct NotebookletEntry {
    /// Dotted capability path, e.g. `azsent.host.HostSummary`
    pub path: &'static str,
    /// Embedded YAML metadata document
    pub metadata_src: &'static str,
    pub ctor: NotebookletCtor,
}

/// One discovered notebooklet: parsed metadata bound to its constructor
pub struct RegisteredNotebooklet {
    pub path: String,
    pub metadata: NotebookletMetadata,
    pub sections: SectionDocs,
    ctor: NotebookletCtor,
}

impl RegisteredNotebooklet {
    pub fn create(&self, env: Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>> {
        (self.ctor)(env)
    }
}

/// Hierarchical view over registered paths, navigable by capability area
#[derive(Debug, Default)]
pub struct BrowseNode {
    children: BTreeMap<String, BrowseNode>,
    notebooklets: Vec<String>,
}

impl BrowseNode {
    pub fn child(&self, name: &str) -> Option<&BrowseNode> {
        self.children.get(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &BrowseNode)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Full dotted paths of notebooklets registered directly at this node
    pub fn notebooklets(&self) -> &[String] {
        &self.notebooklets
    }

    fn insert(&mut self, segments: &[&str], full_path: &str) {
        match segments {
            [] => {}
            [_leaf] => self.notebooklets.push(full_path.to_string()),
            [head, rest @ ..] => self
                .children
                .entry((*head).to_string())
                .or_default()
                .insert(rest, full_path),
        }
    }
}

/// Immutable, queryable index of discovered notebooklets
pub struct Registry {
    entries: BTreeMap<String, RegisteredNotebooklet>,
}

impl Registry {
    /// Scan the built-in registration table plus any custom entry slices.
    ///
    /// Per-entry failures (unparseable metadata, duplicate path) are
    /// recorded as warnings and the entry skipped; the scan never aborts.
    pub fn discover(custom: &[&[NotebookletEntry]]) -> Registry {
        let mut entries = BTreeMap::new();
        let sources = std::iter::once(crate::nb::BUILTIN_NOTEBOOKLETS)
            .chain(custom.iter().copied())
            .flatten();
        for entry in sources {
            match load_metadata(entry.metadata_src, entry.path) {
                Ok((metadata, sections)) => {
                    if entries.contains_key(entry.path) {
                        warn!(path = entry.path, "duplicate notebooklet path; entry skipped");
                        continue;
                    }
                    debug!(path = entry.path, name = %metadata.name, "registered notebooklet");
                    entries.insert(
                        entry.path.to_string(),
                        RegisteredNotebooklet {
                            path: entry.path.to_string(),
                            metadata,
                            sections,
                            ctor: entry.ctor,
                        },
                    );
                }
                Err(err) => {
                    warn!(path = entry.path, error = %err, "skipping notebooklet with bad metadata");
                }
            }
        }
        Registry { entries }
    }

    /// Registry of built-in notebooklets only
    pub fn builtin() -> Registry {
        Self::discover(&[])
    }

    /// Shared read-only instance of the built-in registry
    pub fn shared() -> &'static Registry {
        static SHARED: Lazy<Registry> = Lazy::new(Registry::builtin);
        &SHARED
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact dotted-path lookup
    pub fn get(&self, path: &str) -> Option<&RegisteredNotebooklet> {
        self.entries.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredNotebooklet> {
        self.entries.values()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Instantiate the notebooklet at `path` against an environment
    pub fn create(&self, path: &str, env: Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>> {
        let registered = self.get(path).ok_or_else(|| CasekitError::Config {
            message: format!("no notebooklet registered at path '{}'", path),
        })?;
        registered.create(env)
    }

    /// Search registered metadata for `terms`, ranked by match count
    /// descending. With `full_match`, only notebooklets matching every
    /// term are returned.
    pub fn find(&self, terms: &str, full_match: bool) -> Vec<(&str, usize)> {
        let mut hits: Vec<(&str, usize)> = self
            .entries
            .values()
            .filter_map(|entry| {
                let (all, count) = match_terms(&entry.metadata, terms);
                if count == 0 || (full_match && !all) {
                    None
                } else {
                    Some((entry.path.as_str(), count))
                }
            })
            .collect();
        hits.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        hits
    }

    /// Hierarchical namespace over the registered paths
    pub fn browse(&self) -> BrowseNode {
        let mut root = BrowseNode::default();
        for path in self.entries.keys() {
            let segments: Vec<&str> = path.split('.').collect();
            root.insert(&segments, path);
        }
        root
    }
}
