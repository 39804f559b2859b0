//! Network flow summary notebooklet: flows for one host, grouped by ASN,
//! with a geographic view of the remote endpoints.

use std::sync::Arc;

use serde_json::json;

use crate::error::{CasekitError, Result};
use crate::metadata::{NotebookletMetadata, SectionDocs, load_metadata};
use crate::nb::support::{geo_table, ti_results_table};
use crate::notebooklet::{
    FieldValue, NotebookEnv, NotebookResult, Notebooklet, ResultField, RunContext, RunRequest,
    check_result_data,
};
use crate::registry::NotebookletEntry;
use crate::table::Table;
use crate::timespan::TimeSpan;

const METADATA_SRC: &str = include_str!("network_flow_summary.yaml");

pub const PATH: &str = "azsent.network.NetworkFlowSummary";

pub const ENTRY: NotebookletEntry = NotebookletEntry {
    path: PATH,
    metadata_src: METADATA_SRC,
    ctor: new_boxed,
};

fn new_boxed(env: Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(NetworkFlowSummary::new(env)?))
}

/// Network flow summary results
#[derive(Debug, Clone)]
pub struct NetworkFlowSummaryResult {
    pub description: String,
    pub timespan: TimeSpan,
    /// Host entity the flows belong to
    pub host_entity: Option<serde_json::Value>,
    pub network_flows: Option<Table>,
    /// Flow counts grouped by remote ASN
    pub flow_summary: Option<Table>,
    /// Geolocated remote endpoints
    pub flow_map: Option<Table>,
    /// TI verdicts for remote addresses
    pub ti_results: Option<Table>,
}

impl NotebookResult for NetworkFlowSummaryResult {
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
                doc: "Host entity the flows belong to.",
                value: FieldValue::of_entity(&self.host_entity),
            },
            ResultField {
                name: "network_flows",
                doc: "Network flows involving the host.",
                value: FieldValue::of_table(&self.network_flows),
            },
            ResultField {
                name: "flow_summary",
                doc: "Flow counts grouped by remote ASN.",
                value: FieldValue::of_table(&self.flow_summary),
            },
            ResultField {
                name: "flow_map",
                doc: "Geolocated remote flow endpoints.",
                value: FieldValue::of_table(&self.flow_map),
            },
            ResultField {
                name: "ti_results",
                doc: "Threat intelligence verdicts for remote flow addresses.",
                value: FieldValue::of_table(&self.ti_results),
            },
        ]
    }
}

/// Summarizes network flows for a host: volumes by remote network, remote
/// endpoint locations, and optional TI verdicts on the remote addresses.
pub struct NetworkFlowSummary {
    env: Arc<NotebookEnv>,
    metadata: NotebookletMetadata,
    sections: SectionDocs,
    last: Option<NetworkFlowSummaryResult>,
}

impl NetworkFlowSummary {
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

    pub fn last(&self) -> Option<&NetworkFlowSummaryResult> {
        self.last.as_ref()
    }

    /// Re-display the flow map from the last run
    pub fn show_map(&self) {
        if check_result_data(&self.env.display, self.last_result(), "flow_map")
            && let Some(result) = &self.last
            && let Some(map) = &result.flow_map
        {
            self.env.display.map(map, "Latitude", "Longitude");
        }
    }
}

impl Notebooklet for NetworkFlowSummary {
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

        let mut result = NetworkFlowSummaryResult {
            description: self.metadata.description.clone(),
            timespan: ctx.timespan.clone(),
            host_entity: None,
            network_flows: None,
            flow_summary: None,
            flow_map: None,
            ti_results: None,
        };
        let providers = &self.env.providers;

        if ctx.is_enabled("resolve_host") {
            let heartbeat = providers.query().execute(
                "Heartbeat.get_info_by_hostname",
                &ctx.timespan,
                &[("computer", &host_name)],
            )?;
            let mut entity = json!({ "HostName": host_name.clone() });
            if !heartbeat.is_empty()
                && let Some(os) = heartbeat.get(0, "OSFamily")
            {
                entity["OSFamily"] = os.clone();
            }
            result.host_entity = Some(entity);
        }

        if ctx.is_enabled("af_flows") {
            let flows = providers.query().execute(
                "AzureNetworkAnalytics.list_azure_network_flows_by_host",
                &ctx.timespan,
                &[("host_name", &host_name)],
            )?;
            if !flows.is_empty() {
                let mut summary = Table::new(["Asn", "FlowCount"]);
                for (asn, count) in flows.group_count("Asn") {
                    summary.push_row(vec![json!(asn), json!(count)]);
                }
                display.section(&self.sections, "show_flow_summary");
                display.table(&summary);
                result.flow_summary = Some(summary);
            }

            if ctx.is_enabled("geo_map")
                && !flows.is_empty()
                && let Some(geoip) = providers.geoip("geolitelookup")
            {
                let remote_ips = flows.distinct_str("RemoteIpAddress");
                let map_table = geo_table(&remote_ips, &geoip);
                display.section(&self.sections, "show_flow_map");
                display.map(&map_table, "Latitude", "Longitude");
                result.flow_map = Some(map_table);
            }

            if ctx.is_enabled("ti_flow_ip")
                && !flows.is_empty()
                && let Some(ti) = providers.ti("tilookup")
            {
                let remote_ips = flows.distinct_str("RemoteIpAddress");
                let verdicts = ti.lookup(&remote_ips)?;
                result.ti_results = Some(ti_results_table(&verdicts));
            }

            result.network_flows = Some(flows);
        }

        self.last = Some(result.clone());
        Ok(Box::new(result))
    }

    fn last_result(&self) -> Option<&dyn NotebookResult> {
        self.last.as_ref().map(|r| r as &dyn NotebookResult)
    }
}
