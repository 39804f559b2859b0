//! Option-set resolution for notebooklet runs.
//!
//! Callers select the steps a `run` executes with either explicit syntax
//! (bare option names replace the defaults) or incremental syntax (`+name`
//! adds to the defaults, `-name` removes). The two syntaxes cannot be mixed
//! in one call, and every referenced name must be declared by the
//! notebooklet's metadata.

use std::collections::BTreeSet;

use crate::error::{CasekitError, Result};
use crate::metadata::NotebookletMetadata;

/// Pseudo-option expanding to every declared option. Only recognized as a
/// single bare token.
pub const ALL_OPTIONS: &str = "all";

/// Compute the effective option set for one execution.
///
/// - empty `requested` selects the default options;
/// - all-bare entries replace the defaults with exactly those names;
/// - all-prefixed entries start from the defaults and apply `+`/`-` edits
///   in list order;
/// - mixing the two syntaxes, or naming an undeclared option, fails with
///   `InvalidOption`.
pub fn resolve_options(
    metadata: &NotebookletMetadata,
    requested: &[String],
) -> Result<BTreeSet<String>> {
    let defaults: BTreeSet<String> = metadata.default_option_names().into_iter().collect();
    if requested.is_empty() {
        return Ok(defaults);
    }

    let known: BTreeSet<String> = metadata.all_option_names().into_iter().collect();

    if requested.len() == 1 && requested[0] == ALL_OPTIONS {
        return Ok(known);
    }

    let prefixed = requested
        .iter()
        .filter(|opt| opt.starts_with('+') || opt.starts_with('-'))
        .count();
    if prefixed != 0 && prefixed != requested.len() {
        return Err(CasekitError::InvalidOption {
            message: "cannot mix explicit and incremental option syntax".to_string(),
        });
    }

    if prefixed == 0 {
        let unknown: Vec<&str> = requested
            .iter()
            .filter(|opt| !known.contains(opt.as_str()))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(unknown_options(metadata, &unknown));
        }
        return Ok(requested.iter().cloned().collect());
    }

    let mut effective = defaults;
    let mut unknown = Vec::new();
    for opt in requested {
        let (prefix, name) = opt.split_at(1);
        if !known.contains(name) {
            unknown.push(name);
            continue;
        }
        match prefix {
            "+" => {
                effective.insert(name.to_string());
            }
            "-" => {
                effective.remove(name);
            }
            _ => unreachable!("entries were checked for a +/- prefix"),
        }
    }
    if !unknown.is_empty() {
        return Err(unknown_options(metadata, &unknown));
    }
    Ok(effective)
}

fn unknown_options(metadata: &NotebookletMetadata, names: &[&str]) -> CasekitError {
    CasekitError::InvalidOption {
        message: format!(
            "unknown option(s) [{}] for '{}'; valid options are [{}]",
            names.join(", "),
            metadata.name,
            metadata.all_option_names().join(", ")
        ),
    }
}
