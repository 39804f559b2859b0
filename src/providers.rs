//! Collaborator seams: query execution and enrichment lookups.
//!
//! The framework never talks to a backend directly. Notebooklets consume
//! these traits, and the environment binds named implementations. The crate
//! ships a file/CSV-backed [`LocalDataProvider`] and static enrichment stubs
//! for offline use and tests; real backends live outside this crate.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CasekitError, Result};
use crate::metadata::provider_alternatives;
use crate::table::Table;
use crate::timespan::TimeSpan;

/// Executes a named query over a time span.
///
/// An empty table is the normal no-rows-matched result and is never an
/// error; `Provider` errors are reserved for connectivity or auth failures.
pub trait QueryProvider: Send + Sync {
    fn execute(&self, query: &str, timespan: &TimeSpan, params: &[(&str, &str)]) -> Result<Table>;
}

/// Threat-intelligence verdict for a single observable.
///
/// Batch lookups return one verdict per input; a failed item carries its
/// error marker instead of aborting the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TiVerdict {
    pub ioc: String,
    pub severity: TiSeverity,
    pub provider: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TiSeverity {
    Unknown,
    Information,
    Warning,
    High,
}

pub trait TiProvider: Send + Sync {
    fn lookup(&self, values: &[String]) -> Result<Vec<TiVerdict>>;
}

/// Geolocation record for an IP address
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoRecord {
    pub ip: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub asn: Option<String>,
}

pub trait GeoIpProvider: Send + Sync {
    fn lookup(&self, ip: &str) -> Result<GeoRecord>;
}

/// WHOIS registration record for a domain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhoisRecord {
    pub domain: String,
    pub registrar: Option<String>,
    pub created: Option<String>,
    pub name_servers: Vec<String>,
}

pub trait WhoisProvider: Send + Sync {
    fn lookup(&self, domain: &str) -> Result<WhoisRecord>;
}

/// A named provider handle held by the environment
#[derive(Clone)]
pub enum ProviderHandle {
    Query(Arc<dyn QueryProvider>),
    Ti(Arc<dyn TiProvider>),
    GeoIp(Arc<dyn GeoIpProvider>),
    Whois(Arc<dyn WhoisProvider>),
}

/// The set of providers bound to one notebooklet environment.
///
/// Always carries a primary query provider; enrichment providers are
/// optional and looked up by name (`tilookup`, `geolitelookup`, `whois`,
/// ...). Requirement checking happens once, at notebooklet construction.
#[derive(Clone)]
pub struct DataProviders {
    query_name: String,
    query: Arc<dyn QueryProvider>,
    handles: BTreeMap<String, ProviderHandle>,
}

impl DataProviders {
    pub fn builder(
        query_name: impl Into<String>,
        query: Arc<dyn QueryProvider>,
    ) -> DataProvidersBuilder {
        DataProvidersBuilder {
            query_name: query_name.into(),
            query,
            handles: BTreeMap::new(),
        }
    }

    pub fn query(&self) -> &Arc<dyn QueryProvider> {
        &self.query
    }

    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    pub fn has_provider(&self, name: &str) -> bool {
        name == self.query_name || self.handles.contains_key(name)
    }

    /// First alternative of `requirement` that is present, in declared order
    pub fn resolve_requirement<'a>(&self, requirement: &'a str) -> Option<&'a str> {
        provider_alternatives(requirement)
            .into_iter()
            .find(|alt| self.has_provider(alt))
    }

    /// Verify that every requirement is satisfied by at least one of its
    /// alternatives. Fails with `MissingProvider` naming the first unmet
    /// requirement.
    pub fn check_required(&self, requirements: &[String]) -> Result<()> {
        for requirement in requirements {
            if self.resolve_requirement(requirement).is_none() {
                return Err(CasekitError::MissingProvider {
                    requirement: requirement.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn ti(&self, name: &str) -> Option<Arc<dyn TiProvider>> {
        match self.handles.get(name) {
            Some(ProviderHandle::Ti(p)) => Some(p.clone()),
            _ => None,
        }
    }

    pub fn geoip(&self, name: &str) -> Option<Arc<dyn GeoIpProvider>> {
        match self.handles.get(name) {
            Some(ProviderHandle::GeoIp(p)) => Some(p.clone()),
            _ => None,
        }
    }

    pub fn whois(&self, name: &str) -> Option<Arc<dyn WhoisProvider>> {
        match self.handles.get(name) {
            Some(ProviderHandle::Whois(p)) => Some(p.clone()),
            _ => None,
        }
    }

    /// Additional named query provider (e.g. `azuredata`); the primary
    /// provider is reachable via [`Self::query`]
    pub fn named_query(&self, name: &str) -> Option<Arc<dyn QueryProvider>> {
        match self.handles.get(name) {
            Some(ProviderHandle::Query(p)) => Some(p.clone()),
            _ => None,
        }
    }
}

pub struct DataProvidersBuilder {
    query_name: String,
    query: Arc<dyn QueryProvider>,
    handles: BTreeMap<String, ProviderHandle>,
}

impl DataProvidersBuilder {
    pub fn ti(mut self, name: impl Into<String>, provider: Arc<dyn TiProvider>) -> Self {
        self.handles.insert(name.into(), ProviderHandle::Ti(provider));
        self
    }

    pub fn geoip(mut self, name: impl Into<String>, provider: Arc<dyn GeoIpProvider>) -> Self {
        self.handles
            .insert(name.into(), ProviderHandle::GeoIp(provider));
        self
    }

    pub fn whois(mut self, name: impl Into<String>, provider: Arc<dyn WhoisProvider>) -> Self {
        self.handles
            .insert(name.into(), ProviderHandle::Whois(provider));
        self
    }

    /// Register an additional named query provider (e.g. `azuredata`)
    pub fn query_provider(
        mut self,
        name: impl Into<String>,
        provider: Arc<dyn QueryProvider>,
    ) -> Self {
        self.handles
            .insert(name.into(), ProviderHandle::Query(provider));
        self
    }

    pub fn build(self) -> DataProviders {
        DataProviders {
            query_name: self.query_name,
            query: self.query,
            handles: self.handles,
        }
    }
}

/// File/CSV-backed query provider for offline runs and tests.
///
/// Query names map to registered tables. A parameter whose key matches a
/// column name (case-insensitive) filters the rows; everything else is
/// returned as registered. Unknown query names yield an empty table.
#[derive(Default)]
pub struct LocalDataProvider {
    tables: BTreeMap<String, Table>,
}

impl LocalDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, query: impl Into<String>, table: Table) -> Self {
        self.tables.insert(query.into(), table);
        self
    }

    pub fn register_csv(self, query: impl Into<String>, csv_text: &str) -> Result<Self> {
        let table = Table::from_csv(csv_text)?;
        Ok(self.register(query, table))
    }

    pub fn register_csv_path(
        self,
        query: impl Into<String>,
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self> {
        let table = Table::from_csv_path(path)?;
        Ok(self.register(query, table))
    }
}

impl QueryProvider for LocalDataProvider {
    fn execute(&self, query: &str, _timespan: &TimeSpan, params: &[(&str, &str)]) -> Result<Table> {
        let Some(table) = self.tables.get(query) else {
            debug!(query, "no local fixture registered; returning empty table");
            return Ok(Table::default());
        };
        let mut result = table.clone();
        for (key, value) in params {
            let column = result
                .columns()
                .iter()
                .find(|c| c.eq_ignore_ascii_case(key))
                .cloned();
            if let Some(column) = column {
                result = result.filter_eq(&column, value);
            }
        }
        Ok(result)
    }
}

/// Static TI provider: a fixed verdict per known observable, benign
/// `Information` verdicts for the rest
#[derive(Default)]
pub struct StaticTiProvider {
    verdicts: BTreeMap<String, TiVerdict>,
}

impl StaticTiProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verdict(mut self, verdict: TiVerdict) -> Self {
        self.verdicts.insert(verdict.ioc.clone(), verdict);
        self
    }
}

impl TiProvider for StaticTiProvider {
    fn lookup(&self, values: &[String]) -> Result<Vec<TiVerdict>> {
        Ok(values
            .iter()
            .map(|value| {
                self.verdicts.get(value).cloned().unwrap_or(TiVerdict {
                    ioc: value.clone(),
                    severity: TiSeverity::Information,
                    provider: "static".to_string(),
                    detail: None,
                    error: None,
                })
            })
            .collect())
    }
}

/// Static geolocation provider keyed by IP
#[derive(Default)]
pub struct StaticGeoIpProvider {
    records: BTreeMap<String, GeoRecord>,
}

impl StaticGeoIpProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: GeoRecord) -> Self {
        self.records.insert(record.ip.clone(), record);
        self
    }
}

impl GeoIpProvider for StaticGeoIpProvider {
    fn lookup(&self, ip: &str) -> Result<GeoRecord> {
        Ok(self.records.get(ip).cloned().unwrap_or(GeoRecord {
            ip: ip.to_string(),
            ..Default::default()
        }))
    }
}

/// Static WHOIS provider keyed by domain
#[derive(Default)]
pub struct StaticWhoisProvider {
    records: BTreeMap<String, WhoisRecord>,
}

impl StaticWhoisProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: WhoisRecord) -> Self {
        self.records.insert(record.domain.clone(), record);
        self
    }
}

impl WhoisProvider for StaticWhoisProvider {
    fn lookup(&self, domain: &str) -> Result<WhoisRecord> {
        Ok(self.records.get(domain).cloned().unwrap_or(WhoisRecord {
            domain: domain.to_string(),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn providers() -> DataProviders {
        DataProviders::builder("LocalData", Arc::new(LocalDataProvider::new()))
            .ti("tilookup", Arc::new(StaticTiProvider::new()))
            .build()
    }

    #[test]
    fn has_provider_covers_query_and_handles() {
        let providers = providers();
        assert!(providers.has_provider("LocalData"));
        assert!(providers.has_provider("tilookup"));
        assert!(!providers.has_provider("geolitelookup"));
    }

    #[test]
    fn requirement_alternatives_bind_first_present() {
        let providers = providers();
        assert_eq!(
            providers.resolve_requirement("LogAnalytics|LocalData"),
            Some("LocalData")
        );
        assert_eq!(providers.resolve_requirement("azuredata"), None);
    }

    #[test]
    fn check_required_names_unmet_requirement() {
        let providers = providers();
        let err = providers
            .check_required(&["geolitelookup".to_string()])
            .unwrap_err();
        match err {
            CasekitError::MissingProvider { requirement } => {
                assert_eq!(requirement, "geolitelookup");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn local_provider_filters_on_matching_param() {
        let mut table = Table::new(["Account", "Count"]);
        table.push_row(vec![json!("alice"), json!(2)]);
        table.push_row(vec![json!("bob"), json!(5)]);
        let local = LocalDataProvider::new().register("Accounts.list", table);

        let result = local
            .execute(
                "Accounts.list",
                &TimeSpan::default(),
                &[("account", "alice")],
            )
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.get_str(0, "Account"), Some("alice"));
    }

    #[test]
    fn unknown_query_yields_empty_table() {
        let local = LocalDataProvider::new();
        let result = local
            .execute("No.Such.Query", &TimeSpan::default(), &[])
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn ti_batch_returns_one_verdict_per_input() {
        let ti = StaticTiProvider::new().with_verdict(TiVerdict {
            ioc: "10.0.0.1".to_string(),
            severity: TiSeverity::High,
            provider: "static".to_string(),
            detail: Some("known bad".to_string()),
            error: None,
        });
        let verdicts = ti
            .lookup(&["10.0.0.1".to_string(), "10.0.0.2".to_string()])
            .unwrap();
        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].severity, TiSeverity::High);
        assert_eq!(verdicts[1].severity, TiSeverity::Information);
    }
}
