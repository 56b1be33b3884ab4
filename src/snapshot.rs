//! Accessibility snapshot input.
//!
//! The snapshot is produced by an external capture tool; this module only
//! deserializes it. Common spellings used by capture tools are accepted as
//! aliases.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityElement {
    #[serde(alias = "type", alias = "role", alias = "AXType", default)]
    pub element_type: String,
    #[serde(
        alias = "AXUniqueId",
        alias = "AXIdentifier",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub identifier: Option<String>,
    #[serde(
        alias = "AXLabel",
        alias = "title",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub label: Option<String>,
    #[serde(default)]
    pub frame: Frame,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AccessibilityElement>,
}

impl AccessibilityElement {
    /// Identifier, treating an empty string as absent.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref().filter(|s| !s.is_empty())
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref().filter(|s| !s.is_empty())
    }

    /// `elementType_label`, used by override and critical-mapping patterns.
    pub fn composite_key(&self) -> Option<String> {
        self.label()
            .map(|label| format!("{}_{}", self.element_type, label))
    }

    /// Keys a pattern is matched against, identifier first.
    pub fn match_keys(&self) -> Vec<String> {
        self.identifier()
            .map(str::to_string)
            .into_iter()
            .chain(self.composite_key())
            .collect()
    }

    /// Number of elements in this subtree, including `self`.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotDocument {
    Many(Vec<AccessibilityElement>),
    One(Box<AccessibilityElement>),
}

/// Parse a snapshot: a single root element or an array of roots.
/// Blank input is an empty snapshot.
pub fn parse_snapshot(data: &str) -> std::result::Result<Vec<AccessibilityElement>, serde_json::Error> {
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(match serde_json::from_str::<SnapshotDocument>(data)? {
        SnapshotDocument::Many(roots) => roots,
        SnapshotDocument::One(root) => vec![*root],
    })
}

pub fn load_snapshot(path: &Path) -> Result<Vec<AccessibilityElement>> {
    let data = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let roots = parse_snapshot(&data).map_err(|source| Error::MalformedSnapshot {
        path: path.to_path_buf(),
        source,
    })?;

    let total: usize = roots.iter().map(AccessibilityElement::count).sum();
    if total == 0 {
        warn!("Accessibility snapshot {} is empty", path.display());
    } else {
        info!("Loaded {total} accessibility elements from {}", path.display());
    }
    Ok(roots)
}
