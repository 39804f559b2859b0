//! Logon session rarity notebooklet.
//!
//! Clusters process-execution events by structural similarity (process
//! path, command-line shape, account, system-session flag) and scores each
//! cluster by how small a share of the data it covers. Sessions full of
//! common behavior score low; sessions containing one-off invocations
//! float to the top.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::analysis::cluster::{ClusterParams, cluster_sizes, dbscan, min_max_normalize};
use crate::analysis::features::{char_ord_score, delim_count, is_system_session};
use crate::error::{CasekitError, Result};
use crate::metadata::{NotebookletMetadata, SectionDocs, load_metadata};
use crate::notebooklet::{
    FieldValue, NotebookEnv, NotebookResult, Notebooklet, ResultField, RunContext, RunRequest,
    check_result_data,
};
use crate::registry::NotebookletEntry;
use crate::table::Table;
use crate::timespan::TimeSpan;

const METADATA_SRC: &str = include_str!("logon_sessions_rarity.yaml");

pub const PATH: &str = "azsent.host.LogonSessionsRarity";

pub const ENTRY: NotebookletEntry = NotebookletEntry {
    path: PATH,
    metadata_src: METADATA_SRC,
    ctor: new_boxed,
};

fn new_boxed(env: Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(LogonSessionsRarity::new(env)?))
}

/// Column roles resolved from whatever naming scheme the input table uses
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    pub account: Option<String>,
    pub timestamp: Option<String>,
    pub process: Option<String>,
    pub command: Option<String>,
    pub session: Option<String>,
    pub process_id: Option<String>,
    pub parent_id: Option<String>,
}

fn find_column(table: &Table, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|c| table.has_column(c))
        .map(|c| c.to_string())
}

fn map_columns(table: &Table) -> ColumnMap {
    ColumnMap {
        account: find_column(table, &["Account", "SubjectUserName", "acct", "uid"]),
        timestamp: find_column(table, &["TimeGenerated", "EventStartTime", "TimeStamp"]),
        process: find_column(table, &["NewProcessName", "Process", "exe"]),
        command: find_column(table, &["CommandLine", "cmd"]),
        session: find_column(table, &["SubjectLogonId", "LogonId", "ses"]),
        process_id: find_column(table, &["NewProcessId", "pid"]),
        parent_id: find_column(table, &["ProcessId", "ParentProcessId", "ppid"]),
    }
}

/// Logon session rarity results
#[derive(Debug, Clone)]
pub struct LogonSessionsRarityResult {
    pub description: String,
    pub timespan: TimeSpan,
    /// One row per cluster with its population, rarity and an example event
    pub process_clusters: Option<Table>,
    /// Input events with cluster id and rarity joined on
    pub processes_with_cluster: Option<Table>,
    /// Per-session rarity aggregates, most rare first
    pub session_rarity: Option<Table>,
}

impl NotebookResult for LogonSessionsRarityResult {
    fn description(&self) -> &str {
        &self.description
    }

    fn timespan(&self) -> &TimeSpan {
        &self.timespan
    }

    fn fields(&self) -> Vec<ResultField<'_>> {
        vec![
            ResultField {
                name: "process_clusters",
                doc: "Process clusters by account, process and command line, with an example event per cluster.",
                value: FieldValue::of_table(&self.process_clusters),
            },
            ResultField {
                name: "processes_with_cluster",
                doc: "Process events with a rarity value assigned to each.",
                value: FieldValue::of_table(&self.processes_with_cluster),
            },
            ResultField {
                name: "session_rarity",
                doc: "Logon sessions with averaged process rarity.",
                value: FieldValue::of_table(&self.session_rarity),
            },
        ]
    }
}

/// Calculates the relative rarity of logon sessions from process-execution
/// events, clustering events by process, command line and account.
pub struct LogonSessionsRarity {
    env: Arc<NotebookEnv>,
    metadata: NotebookletMetadata,
    sections: SectionDocs,
    column_map: ColumnMap,
    last: Option<LogonSessionsRarityResult>,
}

impl LogonSessionsRarity {
    pub fn new(env: Arc<NotebookEnv>) -> Result<Self> {
        let (metadata, sections) = load_metadata(METADATA_SRC, PATH)?;
        env.providers.check_required(&metadata.req_providers)?;
        Ok(Self {
            env,
            metadata,
            sections,
            column_map: ColumnMap::default(),
            last: None,
        })
    }

    pub fn last(&self) -> Option<&LogonSessionsRarityResult> {
        self.last.as_ref()
    }

    pub fn column_map(&self) -> &ColumnMap {
        &self.column_map
    }

    /// Display sessions ordered by mean process rarity
    pub fn list_sessions_by_rarity(&self) {
        if check_result_data(&self.env.display, self.last_result(), "session_rarity")
            && let Some(result) = &self.last
            && let Some(sessions) = &result.session_rarity
        {
            self.env.display.table(sessions);
        }
    }

    /// Display a timeline of process events scored by rarity
    pub fn plot_sessions_by_rarity(&self) {
        if check_result_data(
            &self.env.display,
            self.last_result(),
            "processes_with_cluster",
        ) && let Some(result) = &self.last
            && let Some(events) = &result.processes_with_cluster
            && let Some(time_column) = &self.column_map.timestamp
        {
            self.env
                .display
                .timeline(events, time_column, self.column_map.account.as_deref());
        }
    }

    /// Render a process tree for one account or logon session
    pub fn process_tree(&self, account: Option<&str>, session: Option<&str>) {
        if !check_result_data(
            &self.env.display,
            self.last_result(),
            "processes_with_cluster",
        ) {
            return;
        }
        let (Some(result), Some(id_column), Some(parent_column), Some(label_column)) = (
            &self.last,
            self.column_map.process_id.as_deref(),
            self.column_map.parent_id.as_deref(),
            self.column_map.process.as_deref(),
        ) else {
            self.env
                .display
                .markdown("Input data lacks process id columns; cannot build a tree.");
            return;
        };
        let Some(events) = &result.processes_with_cluster else {
            return;
        };

        let filtered = match (account, session) {
            (Some(account), _) => match &self.column_map.account {
                Some(column) => events.filter_eq(column, account),
                None => events.clone(),
            },
            (None, Some(session)) => match &self.column_map.session {
                Some(column) => events.filter_eq(column, session),
                None => events.clone(),
            },
            (None, None) => events.clone(),
        };
        self.env
            .display
            .tree(&filtered, id_column, parent_column, label_column);
    }

    fn engineer_features(&self, data: &Table, columns: &ColumnMap) -> Vec<Vec<f64>> {
        fn cell<'t>(data: &'t Table, row: usize, column: &Option<String>) -> &'t str {
            column
                .as_deref()
                .and_then(|c| data.get_str(row, c))
                .unwrap_or("")
        }

        let rows = data.len();
        let mut features = Vec::with_capacity(rows);
        for i in 0..rows {
            features.push(vec![
                char_ord_score(cell(data, i, &columns.process)),
                delim_count(cell(data, i, &columns.command)),
                char_ord_score(cell(data, i, &columns.account)),
                if is_system_session(cell(data, i, &columns.session)) {
                    1.0
                } else {
                    0.0
                },
            ]);
        }
        features
    }
}

impl Notebooklet for LogonSessionsRarity {
    fn metadata(&self) -> &NotebookletMetadata {
        &self.metadata
    }

    fn sections(&self) -> &SectionDocs {
        &self.sections
    }

    fn run(&mut self, request: RunRequest) -> Result<Box<dyn NotebookResult>> {
        let ctx = RunContext::prepare(&self.metadata, &request)?;
        let data = request
            .data
            .clone()
            .ok_or_else(|| CasekitError::missing_param("data"))?;

        let columns = map_columns(&data);
        if columns.process.is_none() || columns.session.is_none() {
            return Err(CasekitError::missing_param(
                "data (process and logon-session columns)",
            ));
        }

        let display = &self.env.display;
        display.section(&self.sections, "run");
        if self.env.config.verbose {
            display.text(&format!("Input data: {} events", data.len()));
        }

        let mut result = LogonSessionsRarityResult {
            description: self.metadata.description.clone(),
            timespan: ctx.timespan.clone(),
            process_clusters: None,
            processes_with_cluster: None,
            session_rarity: None,
        };

        // Cluster all events; rarity is the inverse of cluster share
        let mut features = self.engineer_features(&data, &columns);
        min_max_normalize(&mut features);
        let labels = dbscan(&features, &ClusterParams::default());
        let sizes = cluster_sizes(&labels);
        let total = data.len().max(1) as f64;
        let rarity: Vec<f64> = sizes.iter().map(|&s| 1.0 - s as f64 / total).collect();

        let mut labeled = data.clone();
        labeled.push_column(
            "ClusterId",
            labels
                .iter()
                .map(|l| match l {
                    crate::analysis::cluster::ClusterLabel::Member(id) => json!(id),
                    crate::analysis::cluster::ClusterLabel::Noise => Value::Null,
                })
                .collect(),
        );
        labeled.push_column("ClusterSize", sizes.iter().map(|&s| json!(s)).collect());
        labeled.push_column("Rarity", rarity.iter().map(|&r| json!(r)).collect());

        result.process_clusters = Some(build_cluster_table(&labeled, &columns));

        if ctx.is_enabled("session_rarity")
            && let Some(session_column) = &columns.session
        {
            let sessions = build_session_rarity(&labeled, session_column, &columns);
            display.section(&self.sections, "show_session_rarity");
            display.table(&sessions);
            result.session_rarity = Some(sessions);
        }

        if ctx.is_enabled("rarity_timeline")
            && let Some(time_column) = &columns.timestamp
        {
            display.timeline(&labeled, time_column, columns.account.as_deref());
        }

        result.processes_with_cluster = Some(labeled);

        self.column_map = columns;
        self.last = Some(result.clone());
        Ok(Box::new(result))
    }

    fn last_result(&self) -> Option<&dyn NotebookResult> {
        self.last.as_ref().map(|r| r as &dyn NotebookResult)
    }
}

fn build_cluster_table(labeled: &Table, columns: &ColumnMap) -> Table {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut clusters = Table::new([
        "ClusterId",
        "ClusterSize",
        "Rarity",
        "ExampleProcess",
        "ExampleCommandLine",
        "ExampleAccount",
    ]);
    for i in 0..labeled.len() {
        // Noise points are singleton clusters; give each its own key
        let key = match labeled.get(i, "ClusterId") {
            Some(Value::Null) | None => format!("noise-{i}"),
            Some(value) => value.to_string(),
        };
        if seen.contains_key(&key) {
            continue;
        }
        seen.insert(key, i);
        let cell = |column: &Option<String>| -> Value {
            column
                .as_deref()
                .and_then(|c| labeled.get(i, c))
                .cloned()
                .unwrap_or(Value::Null)
        };
        clusters.push_row(vec![
            labeled.get(i, "ClusterId").cloned().unwrap_or(Value::Null),
            labeled.get(i, "ClusterSize").cloned().unwrap_or(Value::Null),
            labeled.get(i, "Rarity").cloned().unwrap_or(Value::Null),
            cell(&columns.process),
            cell(&columns.command),
            cell(&columns.account),
        ]);
    }
    let mut sorted = clusters;
    sorted.sort_by_f64("Rarity", true);
    sorted
}

fn build_session_rarity(labeled: &Table, session_column: &str, columns: &ColumnMap) -> Table {
    struct SessionAgg {
        account: Value,
        count: usize,
        processes: Vec<String>,
        rarity_sum: f64,
        rarity_max: f64,
    }

    let mut aggregates: BTreeMap<String, SessionAgg> = BTreeMap::new();
    for i in 0..labeled.len() {
        let Some(session) = labeled.get_str(i, session_column) else {
            continue;
        };
        let rarity = labeled.get_f64(i, "Rarity").unwrap_or(0.0);
        let process = columns
            .process
            .as_deref()
            .and_then(|c| labeled.get_str(i, c))
            .unwrap_or("")
            .to_string();
        let entry = aggregates
            .entry(session.to_string())
            .or_insert_with(|| SessionAgg {
                account: columns
                    .account
                    .as_deref()
                    .and_then(|c| labeled.get(i, c))
                    .cloned()
                    .unwrap_or(Value::Null),
                count: 0,
                processes: Vec::new(),
                rarity_sum: 0.0,
                rarity_max: 0.0,
            });
        entry.count += 1;
        entry.rarity_sum += rarity;
        entry.rarity_max = entry.rarity_max.max(rarity);
        if !process.is_empty() && !entry.processes.contains(&process) {
            entry.processes.push(process);
        }
    }

    let mut sessions = Table::new([
        "Session",
        "Account",
        "EventCount",
        "DistinctProcesses",
        "MeanRarity",
        "MaxRarity",
    ]);
    for (session, agg) in aggregates {
        sessions.push_row(vec![
            json!(session),
            agg.account,
            json!(agg.count),
            json!(agg.processes.len()),
            json!(agg.rarity_sum / agg.count.max(1) as f64),
            json!(agg.rarity_max),
        ]);
    }
    sessions.sort_by_f64("MeanRarity", true);
    sessions
}
