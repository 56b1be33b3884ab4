//! Mapping audit.
//!
//! Replays an enriched hierarchy against the configured critical mappings and
//! summarizes coverage. The audit never changes its input; a failed critical
//! rule is reported as data and only the CLI turns it into an exit status.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Config, ConfigSource};
use crate::error::{Error, Result};
use crate::matcher::{ConfidenceBand, EnrichedNode, MappingTarget};

pub const REPORT_FILE: &str = "audit-report.json";
pub const UNMATCHED_FILE: &str = "audit-unmatched.json";
const UNKNOWN_MODULE: &str = "(unknown)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalResult {
    pub pattern: String,
    pub min_confidence: f64,
    pub source: ConfigSource,
    /// Highest confidence among matching elements; 0 when none matched.
    pub best_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_target: Option<MappingTarget>,
    pub matched_elements: usize,
    pub passed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl BandDistribution {
    fn record(&mut self, band: ConfidenceBand) {
        match band {
            ConfidenceBand::High => self.high += 1,
            ConfidenceBand::Medium => self.medium += 1,
            ConfidenceBand::Low => self.low += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageMetrics {
    pub total_elements: usize,
    /// Elements with a winner.
    pub mapped_elements: usize,
    /// `mapped / total`, 0 for an empty hierarchy.
    pub coverage: f64,
    pub bands: BandDistribution,
    /// Winner count per module.
    pub modules: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedEntry {
    /// Child indices from the root list down to the element.
    pub path: Vec<usize>,
    pub element_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub confidence: f64,
    pub confidence_band: ConfidenceBand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<MappingTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub passed: bool,
    pub critical: Vec<CriticalResult>,
    pub metrics: CoverageMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Audit {
    pub report: AuditReport,
    pub unmatched: Vec<UnmatchedEntry>,
}

impl Audit {
    pub fn failed_rules(&self) -> impl Iterator<Item = &CriticalResult> {
        self.report.critical.iter().filter(|r| !r.passed)
    }

    /// Write `audit-report.json` and `audit-unmatched.json` into `out_dir`.
    pub fn write(&self, out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(out_dir).map_err(|source| Error::Write {
            path: out_dir.to_path_buf(),
            source,
        })?;
        let report = out_dir.join(REPORT_FILE);
        let unmatched = out_dir.join(UNMATCHED_FILE);
        write_json(&report, &self.report, "audit report")?;
        write_json(&unmatched, &self.unmatched, "unmatched listing")?;
        Ok((report, unmatched))
    }
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T, what: &'static str) -> Result<()> {
    let data = serde_json::to_string_pretty(value).map_err(|source| Error::Serialize { what, source })?;
    fs::write(path, data).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Read an enriched hierarchy previously written by `map`.
pub fn load_hierarchy(path: &Path) -> Result<Vec<EnrichedNode>> {
    let data = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&data).map_err(|source| Error::MalformedHierarchy {
        path: path.to_path_buf(),
        source,
    })
}

/// Audit `hierarchy` against `config.critical_mappings`.
pub fn audit(hierarchy: &[EnrichedNode], config: &Config) -> Audit {
    let mut nodes: Vec<(Vec<usize>, &EnrichedNode)> = Vec::new();
    for (i, root) in hierarchy.iter().enumerate() {
        let mut path = vec![i];
        root.walk(&mut |node, path| nodes.push((path.to_vec(), node)), &mut path);
    }

    let critical: Vec<CriticalResult> = config
        .critical_mappings
        .values()
        .map(|entry| {
            let matching: Vec<&EnrichedNode> = nodes
                .iter()
                .map(|(_, node)| *node)
                .filter(|node| {
                    let keys = node.element().match_keys();
                    entry.pattern.best_match(keys.iter().map(String::as_str)).is_some()
                })
                .collect();
            let best = matching
                .iter()
                .max_by(|a, b| a.mapping.confidence.total_cmp(&b.mapping.confidence));
            let best_confidence = best.map_or(0.0, |n| n.mapping.confidence);
            let passed = best.is_some() && best_confidence >= entry.rule.min_confidence;
            if !passed {
                warn!(
                    "Critical mapping {} unmet: best confidence {best_confidence:.2} < {:.2} ({} matching elements)",
                    entry.rule.pattern,
                    entry.rule.min_confidence,
                    matching.len()
                );
            }
            CriticalResult {
                pattern: entry.rule.pattern.clone(),
                min_confidence: entry.rule.min_confidence,
                source: entry.source,
                best_confidence,
                best_target: best.and_then(|n| n.mapping.winner.clone()),
                matched_elements: matching.len(),
                passed,
            }
        })
        .collect();

    let mut metrics = CoverageMetrics {
        total_elements: nodes.len(),
        ..CoverageMetrics::default()
    };
    let mut unmatched = Vec::new();
    for (path, node) in &nodes {
        let mapping = &node.mapping;
        metrics.bands.record(mapping.confidence_band);
        if let Some(ref winner) = mapping.winner {
            metrics.mapped_elements += 1;
            let module = winner.module.as_deref().unwrap_or(UNKNOWN_MODULE);
            *metrics.modules.entry(module.to_string()).or_default() += 1;
        }
        if mapping.winner.is_none() || mapping.confidence_band == ConfidenceBand::Low {
            unmatched.push(UnmatchedEntry {
                path: path.clone(),
                element_type: node.element_type.clone(),
                identifier: node.identifier.clone(),
                label: node.label.clone(),
                confidence: mapping.confidence,
                confidence_band: mapping.confidence_band,
                winner: mapping.winner.clone(),
            });
        }
    }
    if metrics.total_elements > 0 {
        metrics.coverage = metrics.mapped_elements as f64 / metrics.total_elements as f64;
    }

    let passed = critical.iter().all(|r| r.passed);
    info!(
        "Audited {} elements: {:.1}% mapped, {} of {} critical mappings met",
        metrics.total_elements,
        metrics.coverage * 100.0,
        critical.iter().filter(|r| r.passed).count(),
        critical.len()
    );

    Audit {
        report: AuditReport {
            passed,
            critical,
            metrics,
        },
        unmatched,
    }
}
