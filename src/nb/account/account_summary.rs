//! Account summary notebooklet: logon timeline, source-IP summary and
//! per-host logon breakdown for one account.

use std::sync::Arc;

use serde_json::json;

use crate::error::{CasekitError, Result};
use crate::metadata::{NotebookletMetadata, SectionDocs, load_metadata};
use crate::nb::support::geo_table;
use crate::notebooklet::{
    FieldValue, NotebookEnv, NotebookResult, Notebooklet, ResultField, RunContext, RunRequest,
    check_result_data,
};
use crate::registry::NotebookletEntry;
use crate::table::Table;
use crate::timespan::TimeSpan;

const METADATA_SRC: &str = include_str!("account_summary.yaml");

pub const PATH: &str = "azsent.account.AccountSummary";

pub const ENTRY: NotebookletEntry = NotebookletEntry {
    path: PATH,
    metadata_src: METADATA_SRC,
    ctor: new_boxed,
};

fn new_boxed(env: Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(AccountSummary::new(env)?))
}

/// Account summary results
#[derive(Debug, Clone)]
pub struct AccountSummaryResult {
    pub description: String,
    pub timespan: TimeSpan,
    /// Logon events for the account
    pub account_activity: Option<Table>,
    /// Geolocated logon source addresses
    pub ip_summary: Option<Table>,
    /// Logon counts per host
    pub host_logons: Option<Table>,
    /// Related security alerts
    pub related_alerts: Option<Table>,
}

impl NotebookResult for AccountSummaryResult {
    fn description(&self) -> &str {
        &self.description
    }

    fn timespan(&self) -> &TimeSpan {
        &self.timespan
    }

    fn fields(&self) -> Vec<ResultField<'_>> {
        vec![
            ResultField {
                name: "account_activity",
                doc: "Logon events for the account over the time span.",
                value: FieldValue::of_table(&self.account_activity),
            },
            ResultField {
                name: "ip_summary",
                doc: "Geolocated source addresses of the account's logons.",
                value: FieldValue::of_table(&self.ip_summary),
            },
            ResultField {
                name: "host_logons",
                doc: "Logon counts per host.",
                value: FieldValue::of_table(&self.host_logons),
            },
            ResultField {
                name: "related_alerts",
                doc: "Security alerts referencing the account.",
                value: FieldValue::of_table(&self.related_alerts),
            },
        ]
    }
}

/// Summarizes activity for one account: where it logged on from, which
/// hosts it touched, and any alerts that reference it.
pub struct AccountSummary {
    env: Arc<NotebookEnv>,
    metadata: NotebookletMetadata,
    sections: SectionDocs,
    last: Option<AccountSummaryResult>,
}

impl AccountSummary {
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

    pub fn last(&self) -> Option<&AccountSummaryResult> {
        self.last.as_ref()
    }

    /// Re-display the logon timeline from the last run
    pub fn activity_timeline(&self) {
        if check_result_data(&self.env.display, self.last_result(), "account_activity")
            && let Some(result) = &self.last
            && let Some(activity) = &result.account_activity
        {
            self.env
                .display
                .timeline(activity, "TimeGenerated", Some("Computer"));
        }
    }
}

impl Notebooklet for AccountSummary {
    fn metadata(&self) -> &NotebookletMetadata {
        &self.metadata
    }

    fn sections(&self) -> &SectionDocs {
        &self.sections
    }

    fn run(&mut self, request: RunRequest) -> Result<Box<dyn NotebookResult>> {
        let ctx = RunContext::prepare(&self.metadata, &request)?;
        let account = request
            .value
            .clone()
            .ok_or_else(|| CasekitError::missing_param("value"))?;
        if request.timespan.is_none() {
            return Err(CasekitError::missing_param("timespan"));
        }

        let display = &self.env.display;
        display.section(&self.sections, "run");

        let mut result = AccountSummaryResult {
            description: self.metadata.description.clone(),
            timespan: ctx.timespan.clone(),
            account_activity: None,
            ip_summary: None,
            host_logons: None,
            related_alerts: None,
        };
        let providers = &self.env.providers;
        let params: &[(&str, &str)] = &[("account", &account)];

        let activity = providers.query().execute(
            "SecurityEvent.list_logons_by_account",
            &ctx.timespan,
            params,
        )?;

        if activity.is_empty() {
            display.markdown("No logon activity found for the account in this time span.");
        }

        if ctx.is_enabled("get_timeline") && !activity.is_empty() {
            display.section(&self.sections, "show_timeline");
            display.timeline(&activity, "TimeGenerated", Some("Computer"));
        }

        if ctx.is_enabled("get_ip_summary")
            && !activity.is_empty()
            && let Some(geoip) = providers.geoip("geolitelookup")
        {
            let ips = activity.distinct_str("IpAddress");
            if !ips.is_empty() {
                let ip_summary = geo_table(&ips, &geoip);
                display.section(&self.sections, "show_ip_summary");
                display.table(&ip_summary);
                result.ip_summary = Some(ip_summary);
            }
        }

        if ctx.is_enabled("get_host_logons") && !activity.is_empty() {
            let mut hosts = Table::new(["Computer", "LogonCount"]);
            for (computer, count) in activity.group_count("Computer") {
                hosts.push_row(vec![json!(computer), json!(count)]);
            }
            display.section(&self.sections, "show_host_logons");
            display.table(&hosts);
            result.host_logons = Some(hosts);
        }

        if ctx.is_enabled("alerts") {
            let alerts = providers.query().execute(
                "SecurityAlert.list_related_alerts",
                &ctx.timespan,
                params,
            )?;
            display.section(&self.sections, "show_alerts");
            display.table(&alerts);
            result.related_alerts = Some(alerts);
        }

        result.account_activity = Some(activity);
        self.last = Some(result.clone());
        Ok(Box::new(result))
    }

    fn last_result(&self) -> Option<&dyn NotebookResult> {
        self.last.as_ref().map(|r| r as &dyn NotebookResult)
    }
}
