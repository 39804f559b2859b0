//! Windows host events notebooklet: event summary, account management
//! events, and optional expansion of packed event data.

use std::sync::Arc;

use crate::error::{CasekitError, Result};
use crate::metadata::{NotebookletMetadata, SectionDocs, load_metadata};
use crate::nb::support::expand_event_data;
use crate::notebooklet::{
    FieldValue, NotebookEnv, NotebookResult, Notebooklet, ResultField, RunContext, RunRequest,
};
use crate::registry::NotebookletEntry;
use crate::table::Table;
use crate::timespan::TimeSpan;

const METADATA_SRC: &str = include_str!("win_host_events.yaml");

pub const PATH: &str = "azsent.host.WinHostEvents";

pub const ENTRY: NotebookletEntry = NotebookletEntry {
    path: PATH,
    metadata_src: METADATA_SRC,
    ctor: new_boxed,
};

fn new_boxed(env: Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(WinHostEvents::new(env)?))
}

/// Windows host events results
#[derive(Debug, Clone)]
pub struct WinHostEventsResult {
    pub description: String,
    pub timespan: TimeSpan,
    /// All security events for the host
    pub all_events: Option<Table>,
    /// Events grouped by event id
    pub event_stats: Option<Table>,
    /// Account management events
    pub account_events: Option<Table>,
    /// Account management events with packed event data expanded
    pub expanded_events: Option<Table>,
}

impl NotebookResult for WinHostEventsResult {
    fn description(&self) -> &str {
        &self.description
    }

    fn timespan(&self) -> &TimeSpan {
        &self.timespan
    }

    fn fields(&self) -> Vec<ResultField<'_>> {
        vec![
            ResultField {
                name: "all_events",
                doc: "All security events for the host in the time span.",
                value: FieldValue::of_table(&self.all_events),
            },
            ResultField {
                name: "event_stats",
                doc: "Event counts grouped by event id.",
                value: FieldValue::of_table(&self.event_stats),
            },
            ResultField {
                name: "account_events",
                doc: "Account management events (creation, group changes, resets).",
                value: FieldValue::of_table(&self.account_events),
            },
            ResultField {
                name: "expanded_events",
                doc: "Account events with the packed EventData column expanded.",
                value: FieldValue::of_table(&self.expanded_events),
            },
        ]
    }
}

/// Queries Windows security events for a host and summarizes them by type,
/// with optional expansion of the packed event-data column.
pub struct WinHostEvents {
    env: Arc<NotebookEnv>,
    metadata: NotebookletMetadata,
    sections: SectionDocs,
    last: Option<WinHostEventsResult>,
}

impl WinHostEvents {
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

    pub fn last(&self) -> Option<&WinHostEventsResult> {
        self.last.as_ref()
    }

    /// Expand the packed event-data column of an arbitrary event table
    pub fn expand_events(&self, events: &Table) -> Result<Table> {
        expand_event_data(events, "EventData")
    }
}

impl Notebooklet for WinHostEvents {
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

        let mut result = WinHostEventsResult {
            description: self.metadata.description.clone(),
            timespan: ctx.timespan.clone(),
            all_events: None,
            event_stats: None,
            account_events: None,
            expanded_events: None,
        };
        let providers = &self.env.providers;

        if ctx.is_enabled("event_summary") {
            let events = providers.query().execute(
                "SecurityEvent.list_host_events",
                &ctx.timespan,
                &[("host_name", &host_name)],
            )?;
            let mut stats = Table::new(["Activity", "Count"]);
            for (activity, count) in events.group_count("Activity") {
                stats.push_row(vec![activity.into(), count.into()]);
            }
            display.section(&self.sections, "show_event_stats");
            display.table(&stats);
            result.all_events = Some(events);
            result.event_stats = Some(stats);
        }

        if ctx.is_enabled("acct_events") {
            let account_events = providers.query().execute(
                "SecurityEvent.account_change_events",
                &ctx.timespan,
                &[("host_name", &host_name)],
            )?;
            display.section(&self.sections, "show_acct_events");
            display.table(&account_events);

            if ctx.is_enabled("expand_events") && !account_events.is_empty() {
                result.expanded_events = Some(expand_event_data(&account_events, "EventData")?);
            }
            result.account_events = Some(account_events);
        }

        self.last = Some(result.clone());
        Ok(Box::new(result))
    }

    fn last_result(&self) -> Option<&dyn NotebookResult> {
        self.last.as_ref().map(|r| r as &dyn NotebookResult)
    }
}
