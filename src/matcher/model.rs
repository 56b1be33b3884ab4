use serde::{Deserialize, Serialize};

use crate::snapshot::{AccessibilityElement, Frame};

pub const HIGH_THRESHOLD: f64 = 0.70;
pub const MEDIUM_THRESHOLD: f64 = 0.40;

/// A reason a source location was proposed for an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    ManualOverride,
    IdentifierExact,
    ClassName,
    IdentifierPrefix,
    LabelExact,
}

impl Signal {
    pub fn weight(&self) -> f64 {
        match self {
            Self::ManualOverride => 1.0,
            Self::IdentifierExact => 0.9,
            Self::ClassName => 0.7,
            Self::IdentifierPrefix => 0.6,
            Self::LabelExact => 0.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManualOverride => "manual_override",
            Self::IdentifierExact => "identifier_exact",
            Self::ClassName => "class_name",
            Self::IdentifierPrefix => "identifier_prefix",
            Self::LabelExact => "label_exact",
        }
    }
}

/// How several signals on one candidate combine into its confidence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalCombination {
    /// Strongest contributing signal.
    #[default]
    Max,
    /// Sum of distinct contributing signals, capped at 1.0.
    ///
    /// The confidence is then reproducible from the evidence list but need
    /// not equal any single entry's weight: 0.6 + 0.5 reports 1.0 with no
    /// 1.0 entry.
    CappedSum,
}

impl SignalCombination {
    pub fn combine(&self, evidence: &[Evidence]) -> f64 {
        match self {
            Self::Max => evidence.iter().map(|e| e.weight).fold(0.0, f64::max),
            Self::CappedSum => evidence.iter().map(|e| e.weight).sum::<f64>().min(1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= HIGH_THRESHOLD {
            Self::High
        } else if confidence >= MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub signal: Signal,
    pub weight: f64,
    pub detail: String,
}

impl Evidence {
    pub fn new(signal: Signal, detail: impl Into<String>) -> Self {
        Self {
            signal,
            weight: signal.weight(),
            detail: detail.into(),
        }
    }
}

/// A source location a UI element may have come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTarget {
    pub file: String,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Declaration name at or enclosing the location, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl std::fmt::Display for MappingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub target: MappingTarget,
    pub confidence: f64,
    pub confidence_band: ConfidenceBand,
    pub evidence: Vec<Evidence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingResult {
    pub winner: Option<MappingTarget>,
    pub confidence: f64,
    pub confidence_band: ConfidenceBand,
    pub evidence: Vec<Evidence>,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

impl MappingResult {
    /// The expected outcome when no signal fires.
    pub fn unmatched() -> Self {
        Self {
            winner: None,
            confidence: 0.0,
            confidence_band: ConfidenceBand::Low,
            evidence: Vec::new(),
            alternatives: Vec::new(),
        }
    }
}

/// One accessibility element paired with its mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedNode {
    pub element_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub frame: Frame,
    pub mapping: MappingResult,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EnrichedNode>,
}

impl EnrichedNode {
    /// The element this node describes, without its children.
    pub fn element(&self) -> AccessibilityElement {
        AccessibilityElement {
            element_type: self.element_type.clone(),
            identifier: self.identifier.clone(),
            label: self.label.clone(),
            frame: self.frame,
            children: Vec::new(),
        }
    }

    /// Depth-first walk over this node and its descendants.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a EnrichedNode, &[usize]), path: &mut Vec<usize>) {
        visit(self, path);
        for (i, child) in self.children.iter().enumerate() {
            path.push(i);
            child.walk(visit, path);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_thresholds() {
        assert_eq!(ConfidenceBand::from_confidence(1.0), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_confidence(0.7), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_confidence(0.69), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_confidence(0.4), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_confidence(0.39), ConfidenceBand::Low);
        assert_eq!(ConfidenceBand::from_confidence(0.0), ConfidenceBand::Low);
    }

    #[test]
    fn test_signal_weights_map_to_bands() {
        assert_eq!(
            ConfidenceBand::from_confidence(Signal::IdentifierExact.weight()),
            ConfidenceBand::High
        );
        assert_eq!(
            ConfidenceBand::from_confidence(Signal::ClassName.weight()),
            ConfidenceBand::High
        );
        assert_eq!(
            ConfidenceBand::from_confidence(Signal::IdentifierPrefix.weight()),
            ConfidenceBand::Medium
        );
        assert_eq!(
            ConfidenceBand::from_confidence(Signal::LabelExact.weight()),
            ConfidenceBand::Medium
        );
    }

    #[test]
    fn test_combination() {
        let evidence = vec![
            Evidence::new(Signal::IdentifierPrefix, "a"),
            Evidence::new(Signal::LabelExact, "b"),
        ];
        assert_eq!(SignalCombination::Max.combine(&evidence), 0.6);
        assert_eq!(SignalCombination::CappedSum.combine(&evidence), 1.0);
        assert_eq!(SignalCombination::Max.combine(&[]), 0.0);
    }

    #[test]
    fn test_capped_sum_is_reproducible_from_evidence() {
        let evidence = vec![
            Evidence::new(Signal::ClassName, "a"),
            Evidence::new(Signal::LabelExact, "b"),
        ];
        let confidence = SignalCombination::CappedSum.combine(&evidence);
        assert_eq!(confidence, 1.0);
        assert!(!evidence.iter().any(|e| e.weight == confidence));
        let sum: f64 = evidence.iter().map(|e| e.weight).sum();
        assert_eq!(confidence, sum.min(1.0));

        let single = [Evidence::new(Signal::LabelExact, "c")];
        assert_eq!(SignalCombination::CappedSum.combine(&single), 0.5);
    }

    #[test]
    fn test_band_serialization() {
        let json = serde_json::to_string(&ConfidenceBand::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
        let json = serde_json::to_string(&Signal::IdentifierPrefix).unwrap();
        assert_eq!(json, "\"identifier_prefix\"");
    }
}
