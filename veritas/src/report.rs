#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use miette::{NamedSource, Report};
use serde::Serialize;
use veritas_core::{Analysis, LiveRange, OwnershipError, TypeCheckError};

/// Machine-readable result of one `veritas check` run.
#[derive(Debug, Serialize)]
pub struct CheckReport<'a> {
    pub schema: &'static str,
    pub input: String,
    pub ok: bool,
    pub type_errors: &'a [TypeCheckError],
    pub ownership_errors: &'a [OwnershipError],
    /// Brand name to the base type it wraps.
    pub branded_types: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub live_ranges: &'a BTreeMap<String, Vec<LiveRange>>,
}

impl<'a> CheckReport<'a> {
    pub fn new(input: impl Into<String>, analysis: &'a Analysis) -> Self {
        Self {
            schema: "veritas.check.v1",
            input: input.into(),
            ok: analysis.ok(),
            type_errors: &analysis.type_errors,
            ownership_errors: &analysis.ownership_errors,
            branded_types: analysis
                .branded_types
                .iter()
                .map(|(brand, base)| (brand.clone(), base.to_string()))
                .collect(),
            live_ranges: &analysis.live_ranges,
        }
    }
}

/// One report per error, type errors first, with `source` attached when the
/// spans can be shown against it.
pub fn diagnostics(analysis: &Analysis, source: Option<&NamedSource<String>>) -> Vec<Report> {
    let attach = |report: Report| match source {
        Some(src) => report.with_source_code(src.clone()),
        None => report,
    };
    let type_errors = analysis.type_errors.iter().cloned().map(Report::new);
    let ownership_errors = analysis.ownership_errors.iter().cloned().map(Report::new);
    type_errors.chain(ownership_errors).map(attach).collect()
}

pub fn summary(analysis: &Analysis) -> String {
    format!(
        "{} type error(s), {} ownership error(s)",
        analysis.type_errors.len(),
        analysis.ownership_errors.len()
    )
}
