//! URL summary notebooklet: TI, WHOIS, DNS resolution history and related
//! alerts for one URL.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::error::{CasekitError, Result};
use crate::metadata::{NotebookletMetadata, SectionDocs, load_metadata};
use crate::nb::support::ti_results_table;
use crate::notebooklet::{
    FieldValue, NotebookEnv, NotebookResult, Notebooklet, ResultField, RunContext, RunRequest,
};
use crate::registry::NotebookletEntry;
use crate::table::Table;
use crate::timespan::TimeSpan;

const METADATA_SRC: &str = include_str!("url_summary.yaml");

pub const PATH: &str = "azsent.url.UrlSummary";

pub const ENTRY: NotebookletEntry = NotebookletEntry {
    path: PATH,
    metadata_src: METADATA_SRC,
    ctor: new_boxed,
};

fn new_boxed(env: Arc<NotebookEnv>) -> Result<Box<dyn Notebooklet>> {
    Ok(Box::new(UrlSummary::new(env)?))
}

static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-zA-Z][a-zA-Z0-9+.-]*://)?(?:[^/@]+@)?([^/:?#]+)").expect("static pattern")
});

/// Host part of a URL, or the input unchanged when it is already bare
pub fn extract_domain(url: &str) -> String {
    DOMAIN_RE
        .captures(url.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_else(|| url.trim().to_lowercase())
}

/// URL summary results
#[derive(Debug, Clone)]
pub struct UrlSummaryResult {
    pub description: String,
    pub timespan: TimeSpan,
    /// TI verdicts for the URL and its domain
    pub ti_results: Option<Table>,
    /// WHOIS registration record of the domain
    pub whois: Option<Table>,
    /// DNS resolutions observed for the domain
    pub dns_results: Option<Table>,
    pub related_alerts: Option<Table>,
}

impl NotebookResult for UrlSummaryResult {
    fn description(&self) -> &str {
        &self.description
    }

    fn timespan(&self) -> &TimeSpan {
        &self.timespan
    }

    fn fields(&self) -> Vec<ResultField<'_>> {
        vec![
            ResultField {
                name: "ti_results",
                doc: "Threat intelligence verdicts for the URL and its domain.",
                value: FieldValue::of_table(&self.ti_results),
            },
            ResultField {
                name: "whois",
                doc: "WHOIS registration record of the domain.",
                value: FieldValue::of_table(&self.whois),
            },
            ResultField {
                name: "dns_results",
                doc: "DNS resolutions observed for the domain.",
                value: FieldValue::of_table(&self.dns_results),
            },
            ResultField {
                name: "related_alerts",
                doc: "Security alerts referencing the URL.",
                value: FieldValue::of_table(&self.related_alerts),
            },
        ]
    }
}

/// Summarizes reputation and registration data for a URL: TI verdicts,
/// WHOIS, DNS history, and alerts that reference it.
pub struct UrlSummary {
    env: Arc<NotebookEnv>,
    metadata: NotebookletMetadata,
    sections: SectionDocs,
    last: Option<UrlSummaryResult>,
}

impl UrlSummary {
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

    pub fn last(&self) -> Option<&UrlSummaryResult> {
        self.last.as_ref()
    }
}

impl Notebooklet for UrlSummary {
    fn metadata(&self) -> &NotebookletMetadata {
        &self.metadata
    }

    fn sections(&self) -> &SectionDocs {
        &self.sections
    }

    fn run(&mut self, request: RunRequest) -> Result<Box<dyn NotebookResult>> {
        let ctx = RunContext::prepare(&self.metadata, &request)?;
        let url = request
            .value
            .clone()
            .ok_or_else(|| CasekitError::missing_param("value"))?;
        if request.timespan.is_none() {
            return Err(CasekitError::missing_param("timespan"));
        }
        let domain = extract_domain(&url);

        let display = &self.env.display;
        display.section(&self.sections, "run");

        let mut result = UrlSummaryResult {
            description: self.metadata.description.clone(),
            timespan: ctx.timespan.clone(),
            ti_results: None,
            whois: None,
            dns_results: None,
            related_alerts: None,
        };
        let providers = &self.env.providers;

        if ctx.is_enabled("ti")
            && let Some(ti) = providers.ti("tilookup")
        {
            let mut observables = vec![url.clone()];
            if domain != url {
                observables.push(domain.clone());
            }
            let verdicts = ti.lookup(&observables)?;
            let ti_table = ti_results_table(&verdicts);
            display.section(&self.sections, "show_ti");
            display.table(&ti_table);
            result.ti_results = Some(ti_table);
        }

        if ctx.is_enabled("whois")
            && let Some(whois) = providers.whois("whois")
        {
            let record = whois.lookup(&domain)?;
            let mut table = Table::new(["Domain", "Registrar", "Created", "NameServers"]);
            table.push_row(vec![
                json!(record.domain),
                record.registrar.map(Into::into).unwrap_or(serde_json::Value::Null),
                record.created.map(Into::into).unwrap_or(serde_json::Value::Null),
                json!(record.name_servers.join(", ")),
            ]);
            display.section(&self.sections, "show_whois");
            display.table(&table);
            result.whois = Some(table);
        }

        if ctx.is_enabled("dns") {
            let dns = providers.query().execute(
                "Network.dns_lookups_for_domain",
                &ctx.timespan,
                &[("domain", &domain)],
            )?;
            display.section(&self.sections, "show_dns");
            display.table(&dns);
            result.dns_results = Some(dns);
        }

        if ctx.is_enabled("alerts") {
            let alerts = providers.query().execute(
                "SecurityAlert.list_alerts_for_url",
                &ctx.timespan,
                &[("url", &url)],
            )?;
            display.section(&self.sections, "show_alerts");
            display.table(&alerts);
            result.related_alerts = Some(alerts);
        }

        self.last = Some(result.clone());
        Ok(Box::new(result))
    }

    fn last_result(&self) -> Option<&dyn NotebookResult> {
        self.last.as_ref().map(|r| r as &dyn NotebookResult)
    }
}
