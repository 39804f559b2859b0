//! Shared helpers for the built-in notebooklets: observable extraction,
//! enrichment-result tables, and event-data expansion.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};

use crate::error::Result;
use crate::providers::{GeoIpProvider, TiVerdict};
use crate::table::Table;

static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("static pattern")
});
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://[^\s'\x22]+").expect("static pattern")
});

/// Extract IPv4 addresses and URLs from one string column, deduplicated in
/// first-seen order
pub fn extract_iocs(table: &Table, column: &str) -> Vec<String> {
    let mut iocs: Vec<String> = Vec::new();
    for value in table.column_values(column) {
        let Some(text) = value.as_str() else { continue };
        for capture in IPV4_RE.find_iter(text).chain(URL_RE.find_iter(text)) {
            let ioc = capture.as_str().to_string();
            if !iocs.contains(&ioc) {
                iocs.push(ioc);
            }
        }
    }
    iocs
}

/// Flatten TI verdicts into a table sorted most-severe first
pub fn ti_results_table(verdicts: &[TiVerdict]) -> Table {
    let mut sorted: Vec<&TiVerdict> = verdicts.iter().collect();
    sorted.sort_by(|a, b| b.severity.cmp(&a.severity));
    let mut table = Table::new(["Ioc", "Severity", "Provider", "Detail", "Error"]);
    for verdict in sorted {
        table.push_row(vec![
            json!(verdict.ioc),
            json!(format!("{:?}", verdict.severity).to_lowercase()),
            json!(verdict.provider),
            verdict.detail.clone().map(Value::from).unwrap_or(Value::Null),
            verdict.error.clone().map(Value::from).unwrap_or(Value::Null),
        ]);
    }
    table
}

/// Geolocate a batch of IPs into a map-ready table. Lookup failures become
/// rows with null coordinates rather than aborting the batch.
pub fn geo_table(ips: &[String], provider: &Arc<dyn GeoIpProvider>) -> Table {
    let mut table = Table::new([
        "IpAddress",
        "Country",
        "City",
        "Latitude",
        "Longitude",
        "Asn",
    ]);
    for ip in ips {
        match provider.lookup(ip) {
            Ok(record) => table.push_row(vec![
                json!(record.ip),
                record.country.map(Value::from).unwrap_or(Value::Null),
                record.city.map(Value::from).unwrap_or(Value::Null),
                record.latitude.map(Value::from).unwrap_or(Value::Null),
                record.longitude.map(Value::from).unwrap_or(Value::Null),
                record.asn.map(Value::from).unwrap_or(Value::Null),
            ]),
            Err(_) => table.push_row(vec![
                json!(ip),
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
            ]),
        }
    }
    table
}

/// Expand a JSON-object column into real columns, one per key seen across
/// the table. Non-object cells leave the new columns null.
pub fn expand_event_data(table: &Table, column: &str) -> Result<Table> {
    let mut keys: Vec<String> = Vec::new();
    let mut parsed: Vec<Option<Value>> = Vec::new();
    for value in table.column_values(column) {
        let object = match &value {
            Value::String(s) => serde_json::from_str::<Value>(s).ok(),
            Value::Object(_) => Some(value.clone()),
            _ => None,
        };
        if let Some(Value::Object(map)) = &object {
            for key in map.keys() {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
        parsed.push(object);
    }

    let mut expanded = table.clone();
    for key in &keys {
        let values: Vec<Value> = parsed
            .iter()
            .map(|object| match object {
                Some(Value::Object(map)) => map.get(key).cloned().unwrap_or(Value::Null),
                _ => Value::Null,
            })
            .collect();
        expanded.push_column(key.clone(), values);
    }
    Ok(expanded)
}

/// Long-format count table grouped by two string columns
pub fn count_by(table: &Table, row_column: &str, group_column: &str) -> Table {
    let mut counts: Vec<(String, String, usize)> = Vec::new();
    for i in 0..table.len() {
        let (Some(row_key), Some(group_key)) = (
            table.get_str(i, row_column),
            table.get_str(i, group_column),
        ) else {
            continue;
        };
        match counts
            .iter_mut()
            .find(|(r, g, _)| r == row_key && g == group_key)
        {
            Some(entry) => entry.2 += 1,
            None => counts.push((row_key.to_string(), group_key.to_string(), 1)),
        }
    }
    let mut out = Table::new([row_column, group_column, "Count"]);
    for (row_key, group_key, count) in counts {
        out.push_row(vec![json!(row_key), json!(group_key), json!(count)]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::StaticGeoIpProvider;
    use serde_json::json;

    #[test]
    fn extract_iocs_finds_ips_and_urls() {
        let mut table = Table::new(["CommandLine"]);
        table.push_row(vec![json!("ping 10.0.0.1 && curl http://evil.example/p")]);
        table.push_row(vec![json!("ping 10.0.0.1")]);
        let iocs = extract_iocs(&table, "CommandLine");
        assert_eq!(iocs, vec!["10.0.0.1", "http://evil.example/p"]);
    }

    #[test]
    fn expand_event_data_adds_columns() {
        let mut table = Table::new(["EventID", "EventData"]);
        table.push_row(vec![json!(4688), json!(r#"{"User":"alice","Proc":"cmd"}"#)]);
        table.push_row(vec![json!(4624), json!("not json")]);
        let expanded = expand_event_data(&table, "EventData").unwrap();
        assert!(expanded.has_column("User"));
        assert_eq!(expanded.get_str(0, "User"), Some("alice"));
        assert_eq!(expanded.get(1, "User"), Some(&Value::Null));
    }

    #[test]
    fn count_by_produces_long_format() {
        let mut table = Table::new(["Account", "LogonResult"]);
        table.push_row(vec![json!("alice"), json!("Success")]);
        table.push_row(vec![json!("alice"), json!("Success")]);
        table.push_row(vec![json!("alice"), json!("Failure")]);
        let counts = count_by(&table, "Account", "LogonResult");
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.get_f64(0, "Count"), Some(2.0));
    }

    #[test]
    fn geo_table_is_batch_tolerant() {
        let provider: Arc<dyn GeoIpProvider> = Arc::new(StaticGeoIpProvider::new());
        let table = geo_table(&["203.0.113.7".to_string()], &provider);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get_str(0, "IpAddress"), Some("203.0.113.7"));
    }
}
