//! Alert TI enrichment notebooklet: batch threat-intelligence lookup over
//! the observables referenced by recent alerts.

use std::sync::Arc;

use serde_json::json;

use crate::error::{CasekitError, Result};
use crate::metadata::{NotebookletMetadata, SectionDocs, load_metadata};
use crate::nb::support::{extract_iocs, ti_results_table};
use crate::notebooklet::{
    FieldValue, NotebookEnv, NotebookResult, Notebooklet, ResultField, RunContext, RunRequest,
};
use crate::providers::TiSeverity;
use crate::registry::NotebookletEntry;
use crate::table::Table;
use crate::timespan::TimeSpan;

const METADATA_SRC: &str = include_str!("ti_enrich.yaml");

pub const PATH: &str = "azsent.alert.EnrichAlerts";

pub const ENTRY: NotebookletEntry = NotebookletEntry {
    path: PATH,
    metadata_src: METADATA_SRC,
    ctor: new_boxed,
};

fn new_boxed(env: Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(EnrichAlerts::new(env)?))
}

/// Alert enrichment results
#[derive(Debug, Clone)]
pub struct EnrichAlertsResult {
    pub description: String,
    pub timespan: TimeSpan,
    /// Alerts within the time span (optionally filtered)
    pub alerts: Option<Table>,
    /// TI verdicts for observables extracted from the alerts
    pub ti_results: Option<Table>,
    /// Verdict counts by severity
    pub severity_summary: Option<Table>,
}

impl NotebookResult for EnrichAlertsResult {
    fn description(&self) -> &str {
        &self.description
    }

    fn timespan(&self) -> &TimeSpan {
        &self.timespan
    }

    fn fields(&self) -> Vec<ResultField<'_>> {
        vec![
            ResultField {
                name: "alerts",
                doc: "Security alerts within the time span.",
                value: FieldValue::of_table(&self.alerts),
            },
            ResultField {
                name: "ti_results",
                doc: "Threat intelligence verdicts for observables in the alerts.",
                value: FieldValue::of_table(&self.ti_results),
            },
            ResultField {
                name: "severity_summary",
                doc: "TI verdict counts by severity.",
                value: FieldValue::of_table(&self.severity_summary),
            },
        ]
    }
}

/// Enriches recent alerts with threat intelligence over the observables
/// (IP addresses, URLs) they reference. An optional `value` filters alerts
/// by name substring.
pub struct EnrichAlerts {
    env: Arc<NotebookEnv>,
    metadata: NotebookletMetadata,
    sections: SectionDocs,
    last: Option<EnrichAlertsResult>,
}

impl EnrichAlerts {
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

    pub fn last(&self) -> Option<&EnrichAlertsResult> {
        self.last.as_ref()
    }
}

impl Notebooklet for EnrichAlerts {
    fn metadata(&self) -> &NotebookletMetadata {
        &self.metadata
    }

    fn sections(&self) -> &SectionDocs {
        &self.sections
    }

    fn run(&mut self, request: RunRequest) -> Result<Box<dyn NotebookResult>> {
        let ctx = RunContext::prepare(&self.metadata, &request)?;
        if request.timespan.is_none() {
            return Err(CasekitError::missing_param("timespan"));
        }

        let display = &self.env.display;
        display.section(&self.sections, "run");

        let providers = &self.env.providers;
        let mut alerts = match &request.data {
            Some(data) => data.clone(),
            None => providers
                .query()
                .execute("SecurityAlert.list_alerts", &ctx.timespan, &[])?,
        };
        if let Some(filter) = &request.value
            && alerts.has_column("AlertName")
        {
            let matching: Vec<usize> = (0..alerts.len())
                .filter(|&i| {
                    alerts
                        .get_str(i, "AlertName")
                        .is_some_and(|name| name.to_lowercase().contains(&filter.to_lowercase()))
                })
                .collect();
            let mut filtered = Table::new(alerts.columns().to_vec());
            for i in matching {
                filtered.push_row(alerts.rows().nth(i).map(<[_]>::to_vec).unwrap_or_default());
            }
            alerts = filtered;
        }

        let mut result = EnrichAlertsResult {
            description: self.metadata.description.clone(),
            timespan: ctx.timespan.clone(),
            alerts: None,
            ti_results: None,
            severity_summary: None,
        };

        if alerts.is_empty() {
            display.markdown("No alerts found in this time span.");
            result.alerts = Some(alerts);
            self.last = Some(result.clone());
            return Ok(Box::new(result));
        }

        if ctx.is_enabled("ti_lookup")
            && let Some(ti) = providers.ti("tilookup")
        {
            let column = if alerts.has_column("Entities") {
                "Entities"
            } else {
                "ExtendedProperties"
            };
            let iocs = extract_iocs(&alerts, column);
            if !iocs.is_empty() {
                let verdicts = ti.lookup(&iocs)?;

                let mut summary = Table::new(["Severity", "Count"]);
                for severity in [
                    TiSeverity::High,
                    TiSeverity::Warning,
                    TiSeverity::Information,
                    TiSeverity::Unknown,
                ] {
                    let count = verdicts.iter().filter(|v| v.severity == severity).count();
                    if count > 0 {
                        summary.push_row(vec![
                            json!(format!("{:?}", severity).to_lowercase()),
                            json!(count),
                        ]);
                    }
                }

                let ti_table = ti_results_table(&verdicts);
                display.section(&self.sections, "show_ti");
                display.table(&ti_table);
                result.ti_results = Some(ti_table);
                result.severity_summary = Some(summary);
            }
        }

        if ctx.is_enabled("details") {
            display.section(&self.sections, "show_details");
            display.table(&alerts);
        }

        result.alerts = Some(alerts);
        self.last = Some(result.clone());
        Ok(Box::new(result))
    }

    fn last_result(&self) -> Option<&dyn NotebookResult> {
        self.last.as_ref().map(|r| r as &dyn NotebookResult)
    }
}
