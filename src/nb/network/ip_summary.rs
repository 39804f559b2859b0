//! IP address summary notebooklet: geolocation, related alerts, logons and
//! flows for one address, with optional passive DNS and TI enrichment.

use std::sync::Arc;

use serde_json::json;

use crate::error::{CasekitError, Result};
use crate::metadata::{NotebookletMetadata, SectionDocs, load_metadata};
use crate::nb::support::{geo_table, ti_results_table};
use crate::notebooklet::{
    FieldValue, NotebookEnv, NotebookResult, Notebooklet, ResultField, RunContext, RunRequest,
};
use crate::registry::NotebookletEntry;
use crate::table::Table;
use crate::timespan::TimeSpan;

const METADATA_SRC: &str = include_str!("ip_summary.yaml");

pub const PATH: &str = "azsent.network.IpSummary";

pub const ENTRY: NotebookletEntry = NotebookletEntry {
    path: PATH,
    metadata_src: METADATA_SRC,
    ctor: new_boxed,
};

fn new_boxed(env: Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(IpSummary::new(env)?))
}

/// IP summary results
#[derive(Debug, Clone)]
pub struct IpSummaryResult {
    pub description: String,
    pub timespan: TimeSpan,
    /// Geolocation of the address
    pub geoip: Option<Table>,
    pub related_alerts: Option<Table>,
    /// Host logons originating from the address
    pub host_logons: Option<Table>,
    /// Accounts seen logging on from the address
    pub related_accounts: Option<Table>,
    /// Device network information referencing the address
    pub device_info: Option<Table>,
    pub network_flows: Option<Table>,
    pub related_bookmarks: Option<Table>,
    /// Agent heartbeat record, for addresses assigned to monitored hosts
    pub heartbeat: Option<Table>,
    pub passive_dns: Option<Table>,
    /// Threat intelligence verdicts for the address
    pub ti_results: Option<Table>,
}

impl NotebookResult for IpSummaryResult {
    fn description(&self) -> &str {
        &self.description
    }

    fn timespan(&self) -> &TimeSpan {
        &self.timespan
    }

    fn fields(&self) -> Vec<ResultField<'_>> {
        vec![
            ResultField {
                name: "geoip",
                doc: "Geolocation record for the address.",
                value: FieldValue::of_table(&self.geoip),
            },
            ResultField {
                name: "related_alerts",
                doc: "Security alerts referencing the address.",
                value: FieldValue::of_table(&self.related_alerts),
            },
            ResultField {
                name: "host_logons",
                doc: "Host logon events originating from the address.",
                value: FieldValue::of_table(&self.host_logons),
            },
            ResultField {
                name: "related_accounts",
                doc: "Accounts observed logging on from the address.",
                value: FieldValue::of_table(&self.related_accounts),
            },
            ResultField {
                name: "device_info",
                doc: "Device network information referencing the address.",
                value: FieldValue::of_table(&self.device_info),
            },
            ResultField {
                name: "network_flows",
                doc: "Network flows involving the address.",
                value: FieldValue::of_table(&self.network_flows),
            },
            ResultField {
                name: "related_bookmarks",
                doc: "Investigation bookmarks referencing the address.",
                value: FieldValue::of_table(&self.related_bookmarks),
            },
            ResultField {
                name: "heartbeat",
                doc: "Agent heartbeat record for the address.",
                value: FieldValue::of_table(&self.heartbeat),
            },
            ResultField {
                name: "passive_dns",
                doc: "Passive DNS resolutions for the address.",
                value: FieldValue::of_table(&self.passive_dns),
            },
            ResultField {
                name: "ti_results",
                doc: "Threat intelligence verdicts for the address.",
                value: FieldValue::of_table(&self.ti_results),
            },
        ]
    }
}

/// Summarizes what is known about one IP address: location, alerts,
/// logons, flows, and optional passive DNS and TI verdicts.
pub struct IpSummary {
    env: Arc<NotebookEnv>,
    metadata: NotebookletMetadata,
    sections: SectionDocs,
    last: Option<IpSummaryResult>,
}

impl IpSummary {
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

    pub fn last(&self) -> Option<&IpSummaryResult> {
        self.last.as_ref()
    }
}

impl Notebooklet for IpSummary {
    fn metadata(&self) -> &NotebookletMetadata {
        &self.metadata
    }

    fn sections(&self) -> &SectionDocs {
        &self.sections
    }

    fn run(&mut self, request: RunRequest) -> Result<Box<dyn NotebookResult>> {
        let ctx = RunContext::prepare(&self.metadata, &request)?;
        let ip_address = request
            .value
            .clone()
            .ok_or_else(|| CasekitError::missing_param("value"))?;
        if request.timespan.is_none() {
            return Err(CasekitError::missing_param("timespan"));
        }

        let display = &self.env.display;
        display.section(&self.sections, "run");

        let mut result = IpSummaryResult {
            description: self.metadata.description.clone(),
            timespan: ctx.timespan.clone(),
            geoip: None,
            related_alerts: None,
            host_logons: None,
            related_accounts: None,
            device_info: None,
            network_flows: None,
            related_bookmarks: None,
            heartbeat: None,
            passive_dns: None,
            ti_results: None,
        };
        let providers = &self.env.providers;
        let params: &[(&str, &str)] = &[("ip_address", &ip_address)];

        if ctx.is_enabled("geoip")
            && let Some(geoip) = providers.geoip("geolitelookup")
        {
            let geo = geo_table(std::slice::from_ref(&ip_address), &geoip);
            display.section(&self.sections, "show_geoip");
            display.map(&geo, "Latitude", "Longitude");
            result.geoip = Some(geo);
        }

        if ctx.is_enabled("alerts") {
            let alerts = providers.query().execute(
                "SecurityAlert.list_alerts_for_ip",
                &ctx.timespan,
                params,
            )?;
            display.section(&self.sections, "show_alerts");
            display.table(&alerts);
            result.related_alerts = Some(alerts);
        }

        if ctx.is_enabled("host_logons") {
            let logons = providers.query().execute(
                "SecurityEvent.list_logons_for_source_ip",
                &ctx.timespan,
                params,
            )?;
            if ctx.is_enabled("related_accounts") && !logons.is_empty() {
                let mut accounts = Table::new(["Account", "LogonCount"]);
                for (account, count) in logons.group_count("Account") {
                    accounts.push_row(vec![json!(account), json!(count)]);
                }
                display.section(&self.sections, "show_accounts");
                display.table(&accounts);
                result.related_accounts = Some(accounts);
            }
            result.host_logons = Some(logons);
        }

        if ctx.is_enabled("device_info") {
            result.device_info = Some(providers.query().execute(
                "DeviceNetworkInfo.list_devices_for_ip",
                &ctx.timespan,
                params,
            )?);
        }

        if ctx.is_enabled("network_flows") {
            let flows = providers.query().execute(
                "AzureNetworkAnalytics.list_flows_by_ip",
                &ctx.timespan,
                params,
            )?;
            display.section(&self.sections, "show_flows");
            display.table(&flows);
            result.network_flows = Some(flows);
        }

        if ctx.is_enabled("bookmarks") {
            result.related_bookmarks = Some(providers.query().execute(
                "AzureSentinel.list_bookmarks_for_entity",
                &ctx.timespan,
                &[("entity_id", &ip_address)],
            )?);
        }

        if ctx.is_enabled("heartbeat") {
            result.heartbeat = Some(providers.query().execute(
                "Heartbeat.get_info_by_ipaddress",
                &ctx.timespan,
                params,
            )?);
        }

        if ctx.is_enabled("passive_dns") {
            result.passive_dns = Some(providers.query().execute(
                "Network.get_passive_dns",
                &ctx.timespan,
                params,
            )?);
        }

        if ctx.is_enabled("ti")
            && let Some(ti) = providers.ti("tilookup")
        {
            let verdicts = ti.lookup(std::slice::from_ref(&ip_address))?;
            let ti_table = ti_results_table(&verdicts);
            display.section(&self.sections, "show_ti");
            display.table(&ti_table);
            result.ti_results = Some(ti_table);
        }

        self.last = Some(result.clone());
        Ok(Box::new(result))
    }

    fn last_result(&self) -> Option<&dyn NotebookResult> {
        self.last.as_ref().map(|r| r as &dyn NotebookResult)
    }
}
