//! Host logons summary notebooklet: success/failure breakdown, an
//! account-by-result matrix, a logon timeline, and a source-IP map.

use std::sync::Arc;

use serde_json::json;

use crate::error::{CasekitError, Result};
use crate::metadata::{NotebookletMetadata, SectionDocs, load_metadata};
use crate::nb::support::{count_by, geo_table};
use crate::notebooklet::{
    FieldValue, NotebookEnv, NotebookResult, Notebooklet, ResultField, RunContext, RunRequest,
};
use crate::registry::NotebookletEntry;
use crate::table::Table;
use crate::timespan::TimeSpan;

const METADATA_SRC: &str = include_str!("host_logons_summary.yaml");

pub const PATH: &str = "azsent.host.HostLogonsSummary";

pub const ENTRY: NotebookletEntry = NotebookletEntry {
    path: PATH,
    metadata_src: METADATA_SRC,
    ctor: new_boxed,
};

fn new_boxed(env: Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(HostLogonsSummary::new(env)?))
}

/// Host logons summary results
#[derive(Debug, Clone)]
pub struct HostLogonsSummaryResult {
    pub description: String,
    pub timespan: TimeSpan,
    /// Raw logon events used by the summaries
    pub logon_sessions: Option<Table>,
    /// Success/failure counts
    pub failed_success: Option<Table>,
    /// Account-by-result logon counts
    pub logon_matrix: Option<Table>,
    /// Geolocated logon source IPs
    pub logon_map: Option<Table>,
}

impl NotebookResult for HostLogonsSummaryResult {
    fn description(&self) -> &str {
        &self.description
    }

    fn timespan(&self) -> &TimeSpan {
        &self.timespan
    }

    fn fields(&self) -> Vec<ResultField<'_>> {
        vec![
            ResultField {
                name: "logon_sessions",
                doc: "Logon events for the host over the time span.",
                value: FieldValue::of_table(&self.logon_sessions),
            },
            ResultField {
                name: "failed_success",
                doc: "Counts of failed and successful logons.",
                value: FieldValue::of_table(&self.failed_success),
            },
            ResultField {
                name: "logon_matrix",
                doc: "Logon counts per account and result.",
                value: FieldValue::of_table(&self.logon_matrix),
            },
            ResultField {
                name: "logon_map",
                doc: "Geolocated logon source IP addresses.",
                value: FieldValue::of_table(&self.logon_map),
            },
        ]
    }
}

/// Summarizes logon activity on a host: who logged on, from where, and how
/// often it failed. Accepts pre-fetched logon data or queries it.
pub struct HostLogonsSummary {
    env: Arc<NotebookEnv>,
    metadata: NotebookletMetadata,
    sections: SectionDocs,
    last: Option<HostLogonsSummaryResult>,
}

impl std::fmt::Debug for HostLogonsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLogonsSummary")
            .field("metadata", &self.metadata)
            .field("last", &self.last)
            .finish()
    }
}

impl HostLogonsSummary {
    pub fn new(env: Arc<NotebookEnv>) -> Result<Self> {
        let (metadata, sections) = load_metadata(METADATA_SRC, PATH)?;
        env.providers.check_required(&metadata.req_providers)?;
        Ok(Self {
            env,
            metadata,
            sections,
            last: None,
        })
    }

    pub fn last(&self) -> Option<&HostLogonsSummaryResult> {
        self.last.as_ref()
    }
}

impl Notebooklet for HostLogonsSummary {
    fn metadata(&self) -> &NotebookletMetadata {
        &self.metadata
    }

    fn sections(&self) -> &SectionDocs {
        &self.sections
    }

    fn run(&mut self, request: RunRequest) -> Result<Box<dyn NotebookResult>> {
        let ctx = RunContext::prepare(&self.metadata, &request)?;
        // Either a host name to query for, or pre-fetched logon data
        if request.value.is_none() && request.data.is_none() {
            return Err(CasekitError::missing_param("value"));
        }
        if request.timespan.is_none() {
            return Err(CasekitError::missing_param("timespan"));
        }

        let display = &self.env.display;
        display.section(&self.sections, "run");

        let providers = &self.env.providers;
        let logons = match &request.data {
            Some(data) => data.clone(),
            None => {
                let host_name = request.value.as_deref().unwrap_or_default();
                providers.query().execute(
                    "SecurityEvent.list_host_logons",
                    &ctx.timespan,
                    &[("host_name", host_name)],
                )?
            }
        };

        let mut result = HostLogonsSummaryResult {
            description: self.metadata.description.clone(),
            timespan: ctx.timespan.clone(),
            logon_sessions: None,
            failed_success: None,
            logon_matrix: None,
            logon_map: None,
        };

        if logons.is_empty() {
            display.markdown("No logon events found for the host in this time span.");
            result.logon_sessions = Some(logons);
            self.last = Some(result.clone());
            return Ok(Box::new(result));
        }

        if ctx.is_enabled("failed_success") {
            let mut counts = Table::new(["LogonResult", "Count"]);
            for (logon_result, count) in logons.group_count("LogonResult") {
                counts.push_row(vec![json!(logon_result), json!(count)]);
            }
            display.section(&self.sections, "show_failed_success");
            display.table(&counts);
            result.failed_success = Some(counts);
        }

        if ctx.is_enabled("logon_matrix") {
            let matrix = count_by(&logons, "Account", "LogonResult");
            display.section(&self.sections, "show_logon_matrix");
            display.table(&matrix);
            result.logon_matrix = Some(matrix);
        }

        if ctx.is_enabled("timeline") {
            display.timeline(&logons, "TimeGenerated", Some("LogonResult"));
        }

        if ctx.is_enabled("logon_map")
            && let Some(geoip) = providers.geoip("geolitelookup")
        {
            let ips = logons.distinct_str("IpAddress");
            if !ips.is_empty() {
                let map_table = geo_table(&ips, &geoip);
                display.section(&self.sections, "show_logon_map");
                display.map(&map_table, "Latitude", "Longitude");
                result.logon_map = Some(map_table);
            }
        }

        result.logon_sessions = Some(logons);
        self.last = Some(result.clone());
        Ok(Box::new(result))
    }

    fn last_result(&self) -> Option<&dyn NotebookResult> {
        self.last.as_ref().map(|r| r as &dyn NotebookResult)
    }
}
