//! Host summary notebooklet: entity details, related alerts and bookmarks,
//! and an event overview for one host.

use std::sync::Arc;

use serde_json::{Value, json};

use crate::error::{CasekitError, Result};
use crate::metadata::{NotebookletMetadata, SectionDocs, load_metadata};
use crate::nb::support::{extract_iocs, ti_results_table};
use crate::notebooklet::{
    FieldValue, NotebookEnv, NotebookResult, Notebooklet, ResultField, RunContext, RunRequest,
    check_result_data,
};
use crate::registry::NotebookletEntry;
use crate::table::Table;
use crate::timespan::TimeSpan;

const METADATA_SRC: &str = include_str!("host_summary.yaml");

pub const PATH: &str = "azsent.host.HostSummary";

pub const ENTRY: NotebookletEntry = NotebookletEntry {
    path: PATH,
    metadata_src: METADATA_SRC,
    ctor: new_boxed,
};

fn new_boxed(env: Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(HostSummary::new(env)?))
}

/// Host summary results
#[derive(Debug, Clone)]
pub struct HostSummaryResult {
    pub description: String,
    pub timespan: TimeSpan,
    /// Host entity record: name, IP addresses, cloud resource details
    pub host_entity: Option<Value>,
    pub related_alerts: Option<Table>,
    pub related_bookmarks: Option<Table>,
    /// Event summary grouped by event id
    pub summary: Option<Table>,
    pub scheduled_tasks: Option<Table>,
    pub account_actions: Option<Table>,
    pub notable_events: Option<Table>,
    pub processes: Option<Table>,
    pub process_ti: Option<Table>,
}

impl HostSummaryResult {
    fn new(description: String, timespan: TimeSpan) -> Self {
        Self {
            description,
            timespan,
            host_entity: None,
            related_alerts: None,
            related_bookmarks: None,
            summary: None,
            scheduled_tasks: None,
            account_actions: None,
            notable_events: None,
            processes: None,
            process_ti: None,
        }
    }
}

impl NotebookResult for HostSummaryResult {
    fn description(&self) -> &str {
        &self.description
    }

    fn timespan(&self) -> &TimeSpan {
        &self.timespan
    }

    fn fields(&self) -> Vec<ResultField<'_>> {
        vec![
            ResultField {
                name: "host_entity",
                doc: "Host entity record with name, IP assignment and resource details.",
                value: FieldValue::of_entity(&self.host_entity),
            },
            ResultField {
                name: "related_alerts",
                doc: "Security alerts recorded for the host within the time span.",
                value: FieldValue::of_table(&self.related_alerts),
            },
            ResultField {
                name: "related_bookmarks",
                doc: "Investigation bookmarks relating to the host.",
                value: FieldValue::of_table(&self.related_bookmarks),
            },
            ResultField {
                name: "summary",
                doc: "Event summary for the host grouped by event type.",
                value: FieldValue::of_table(&self.summary),
            },
            ResultField {
                name: "scheduled_tasks",
                doc: "Scheduled task and service events.",
                value: FieldValue::of_table(&self.scheduled_tasks),
            },
            ResultField {
                name: "account_actions",
                doc: "Account management events on the host.",
                value: FieldValue::of_table(&self.account_actions),
            },
            ResultField {
                name: "notable_events",
                doc: "High-severity events for the host.",
                value: FieldValue::of_table(&self.notable_events),
            },
            ResultField {
                name: "processes",
                doc: "Process creation events for the host.",
                value: FieldValue::of_table(&self.processes),
            },
            ResultField {
                name: "process_ti",
                doc: "Threat intelligence results for process command-line observables.",
                value: FieldValue::of_table(&self.process_ti),
            },
        ]
    }
}

/// Queries and displays information about a host, including IP address
/// assignment, related alerts and bookmarks, and event summaries.
pub struct HostSummary {
    env: Arc<NotebookEnv>,
    metadata: NotebookletMetadata,
    sections: SectionDocs,
    last: Option<HostSummaryResult>,
}

impl HostSummary {
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

    /// Result of the most recent run, with concrete field types
    pub fn last(&self) -> Option<&HostSummaryResult> {
        self.last.as_ref()
    }

    /// Timeline of related alerts from the last run
    pub fn alert_timeline(&self) {
        if check_result_data(
            &self.env.display,
            self.last_result(),
            "related_alerts",
        ) && let Some(result) = &self.last
            && let Some(alerts) = &result.related_alerts
        {
            self.env
                .display
                .timeline(alerts, "TimeGenerated", Some("AlertName"));
        }
    }

    fn build_host_entity(&self, ctx: &RunContext, host_name: &str) -> Result<Value> {
        let providers = &self.env.providers;
        let mut entity = json!({ "HostName": host_name });

        if ctx.is_enabled("heartbeat") {
            let heartbeat = providers.query().execute(
                "Heartbeat.get_info_by_hostname",
                &ctx.timespan,
                &[("computer", host_name)],
            )?;
            if !heartbeat.is_empty() {
                for column in ["OSFamily", "OSName", "ComputerEnvironment", "AgentId"] {
                    if let Some(value) = heartbeat.get(0, column) {
                        entity[column] = value.clone();
                    }
                }
            }
        }

        if ctx.is_enabled("azure_net") {
            let interfaces = providers.query().execute(
                "AzureNetwork.get_ips_for_host",
                &ctx.timespan,
                &[("host_name", host_name)],
            )?;
            if !interfaces.is_empty() {
                entity["PrivateIpAddresses"] = json!(interfaces.distinct_str("PrivateIpAddress"));
                entity["PublicIpAddresses"] = json!(interfaces.distinct_str("PublicIpAddress"));
            }
        }

        // Cloud API details only apply when the dedicated provider is loaded
        if ctx.is_enabled("azure_api")
            && let Some(azure) = providers.named_query("azuredata")
        {
            let details = azure.execute(
                "AzureData.get_resource_details",
                &ctx.timespan,
                &[("host_name", host_name)],
            )?;
            if !details.is_empty() {
                entity["ResourceDetails"] = json!({
                    "Location": details.get(0, "Location").cloned().unwrap_or(Value::Null),
                    "VmSize": details.get(0, "VmSize").cloned().unwrap_or(Value::Null),
                    "Subscription": details.get(0, "Subscription").cloned().unwrap_or(Value::Null),
                });
            }
        }

        Ok(entity)
    }
}

impl Notebooklet for HostSummary {
    fn metadata(&self) -> &NotebookletMetadata {
        &self.metadata
    }

    fn sections(&self) -> &SectionDocs {
        &self.sections
    }

    fn run(&mut self, request: RunRequest) -> Result<Box<dyn NotebookResult>> {
        let ctx = RunContext::prepare(&self.metadata, &request)?;
        let host_name = request
            .value
            .clone()
            .ok_or_else(|| CasekitError::missing_param("value"))?;
        if request.timespan.is_none() {
            return Err(CasekitError::missing_param("timespan"));
        }

        let display = &self.env.display;
        display.section(&self.sections, "run");

        let mut result =
            HostSummaryResult::new(self.metadata.description.clone(), ctx.timespan.clone());
        let providers = &self.env.providers;

        result.host_entity = Some(self.build_host_entity(&ctx, &host_name)?);

        if ctx.is_enabled("alerts") {
            let alerts = providers.query().execute(
                "SecurityAlert.list_related_alerts",
                &ctx.timespan,
                &[("host_name", &host_name)],
            )?;
            display.section(&self.sections, "show_alerts");
            display.table(&alerts);
            result.related_alerts = Some(alerts);
        }

        if ctx.is_enabled("bookmarks") {
            let bookmarks = providers.query().execute(
                "AzureSentinel.list_bookmarks_for_entity",
                &ctx.timespan,
                &[("entity_id", &host_name)],
            )?;
            display.section(&self.sections, "show_bookmarks");
            display.table(&bookmarks);
            result.related_bookmarks = Some(bookmarks);
        }

        if ctx.is_enabled("scheduled_tasks") {
            result.scheduled_tasks = Some(providers.query().execute(
                "SecurityEvent.schdld_tasks_and_services",
                &ctx.timespan,
                &[("host_name", &host_name)],
            )?);
        }

        if ctx.is_enabled("account_actions") {
            result.account_actions = Some(providers.query().execute(
                "SecurityEvent.account_change_events",
                &ctx.timespan,
                &[("host_name", &host_name)],
            )?);
        }

        if ctx.is_enabled("notable_events") {
            result.notable_events = Some(providers.query().execute(
                "SecurityEvent.notable_events",
                &ctx.timespan,
                &[("host_name", &host_name)],
            )?);
        }

        if ctx.is_enabled("processes") {
            let processes = providers.query().execute(
                "SecurityEvent.list_host_processes",
                &ctx.timespan,
                &[("host_name", &host_name)],
            )?;
            display.section(&self.sections, "show_processes");
            result.processes = Some(processes);
        }

        if ctx.is_enabled("process_ti")
            && let Some(processes) = &result.processes
            && !processes.is_empty()
            && let Some(ti) = providers.ti("tilookup")
        {
            let iocs = extract_iocs(processes, "CommandLine");
            if !iocs.is_empty() {
                let verdicts = ti.lookup(&iocs)?;
                let ti_table = ti_results_table(&verdicts);
                display.section(&self.sections, "show_process_ti");
                display.table(&ti_table);
                result.process_ti = Some(ti_table);
            }
        }

        // Event summary runs regardless of options
        result.summary = Some(providers.query().execute(
            "SecurityEvent.summarize_events",
            &ctx.timespan,
            &[("host_name", &host_name)],
        )?);

        self.last = Some(result.clone());
        Ok(Box::new(result))
    }

    fn last_result(&self) -> Option<&dyn NotebookResult> {
        self.last.as_ref().map(|r| r as &dyn NotebookResult)
    }
}
