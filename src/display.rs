//! Display collaborator seam.
//!
//! Notebooklets never render anything themselves; they hand structured
//! items to a [`Renderer`] through a [`DisplayHandle`]. The handle is the
//! single enforcement point for silent mode: when the run configuration is
//! silent, no renderer call is ever made, so individual notebooklets do not
//! check the flag.

use std::sync::Arc;

use tracing::info;

use crate::metadata::{SectionDoc, SectionDocs};
use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    Text,
    Markdown,
    Table,
    Timeline,
    Map,
    Tree,
}

/// One renderable item plus the column-role hints its kind needs
#[derive(Debug)]
pub enum RenderItem<'a> {
    Text(&'a str),
    Markdown(&'a str),
    Table(&'a Table),
    Timeline {
        data: &'a Table,
        time_column: &'a str,
        group_by: Option<&'a str>,
    },
    Map {
        data: &'a Table,
        latitude: &'a str,
        longitude: &'a str,
    },
    Tree {
        data: &'a Table,
        id_column: &'a str,
        parent_column: &'a str,
        label_column: &'a str,
    },
}

impl RenderItem<'_> {
    pub fn kind(&self) -> RenderKind {
        match self {
            RenderItem::Text(_) => RenderKind::Text,
            RenderItem::Markdown(_) => RenderKind::Markdown,
            RenderItem::Table(_) => RenderKind::Table,
            RenderItem::Timeline { .. } => RenderKind::Timeline,
            RenderItem::Map { .. } => RenderKind::Map,
            RenderItem::Tree { .. } => RenderKind::Tree,
        }
    }
}

/// Rendering backend. Implementations live outside this crate; the
/// built-ins below cover logging and fully suppressed output.
pub trait Renderer: Send + Sync {
    fn render(&self, item: RenderItem<'_>);
}

/// Discards everything
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&self, _item: RenderItem<'_>) {}
}

/// Renders through `tracing` log lines; the default backend for
/// terminal/offline use
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn render(&self, item: RenderItem<'_>) {
        match item {
            RenderItem::Text(text) | RenderItem::Markdown(text) => info!("{text}"),
            RenderItem::Table(table) => {
                info!(rows = table.len(), columns = ?table.columns(), "table");
            }
            RenderItem::Timeline { data, time_column, .. } => {
                info!(rows = data.len(), time_column, "timeline");
            }
            RenderItem::Map { data, .. } => info!(rows = data.len(), "map"),
            RenderItem::Tree { data, .. } => info!(rows = data.len(), "tree"),
        }
    }
}

/// Renderer plus the silent switch, shared by every notebooklet in one
/// environment
#[derive(Clone)]
pub struct DisplayHandle {
    renderer: Arc<dyn Renderer>,
    silent: bool,
}

impl DisplayHandle {
    pub fn new(renderer: Arc<dyn Renderer>, silent: bool) -> Self {
        Self { renderer, silent }
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    pub fn emit(&self, item: RenderItem<'_>) {
        if !self.silent {
            self.renderer.render(item);
        }
    }

    pub fn text(&self, text: &str) {
        self.emit(RenderItem::Text(text));
    }

    pub fn markdown(&self, text: &str) {
        self.emit(RenderItem::Markdown(text));
    }

    pub fn table(&self, table: &Table) {
        self.emit(RenderItem::Table(table));
    }

    pub fn timeline(&self, data: &Table, time_column: &str, group_by: Option<&str>) {
        self.emit(RenderItem::Timeline {
            data,
            time_column,
            group_by,
        });
    }

    pub fn map(&self, data: &Table, latitude: &str, longitude: &str) {
        self.emit(RenderItem::Map {
            data,
            latitude,
            longitude,
        });
    }

    pub fn tree(&self, data: &Table, id_column: &str, parent_column: &str, label_column: &str) {
        self.emit(RenderItem::Tree {
            data,
            id_column,
            parent_column,
            label_column,
        });
    }

    /// Emit the display unit for one output section: heading as markdown,
    /// then body text in the declared format. Unknown keys are ignored so a
    /// section can be dropped from the document without touching code.
    pub fn section(&self, sections: &SectionDocs, key: &str) {
        let Some(section) = sections.get(key) else {
            return;
        };
        self.render_section(section);
    }

    fn render_section(&self, section: &SectionDoc) {
        if !section.title.is_empty() {
            let hashes = "#".repeat(section.hd_level.clamp(1, 6) as usize);
            self.markdown(&format!("{} {}", hashes, section.title));
        }
        if !section.text.is_empty() {
            if section.md {
                self.markdown(&section.text);
            } else {
                self.text(&section.text);
            }
        }
    }
}
