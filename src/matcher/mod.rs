//! Candidate matching: accessibility elements to ranked source locations.
//!
//! Matching is a pure function of the element, the merged configuration and
//! read-only snapshots of the index and registry. It never fails and performs
//! no I/O; an element nothing points at gets [`MappingResult::unmatched`].
use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::config::Config;
use crate::indexer::SourceIndex;
use crate::registry::IdentifierRegistry;
use crate::snapshot::AccessibilityElement;

pub mod model;
pub mod overrides;
mod signals;

pub use self::model::*;
use self::signals::{Hit, Lookups};

/// Every signal that fired for one `(file, line)`.
#[derive(Debug)]
struct Candidate {
    target: MappingTarget,
    depth: usize,
    evidence: Vec<Evidence>,
    confidence: f64,
}

impl Candidate {
    fn from_hit(hit: Hit) -> Self {
        Self {
            target: MappingTarget {
                file: hit.file,
                line: hit.line,
                module: Some(hit.module),
                symbol: hit.symbol,
            },
            depth: hit.depth,
            evidence: vec![hit.evidence],
            confidence: 0.0,
        }
    }

    /// Keep the first evidence per signal.
    fn absorb(&mut self, hit: Hit) {
        if self.target.symbol.is_none() {
            self.target.symbol = hit.symbol;
        }
        if !self.evidence.iter().any(|e| e.signal == hit.evidence.signal) {
            self.evidence.push(hit.evidence);
        }
    }

    fn into_alternative(self) -> Alternative {
        Alternative {
            target: self.target,
            confidence: self.confidence,
            confidence_band: ConfidenceBand::from_confidence(self.confidence),
            evidence: self.evidence,
        }
    }
}

fn by_weight(a: &Evidence, b: &Evidence) -> Ordering {
    b.weight
        .total_cmp(&a.weight)
        .then_with(|| a.signal.as_str().cmp(b.signal.as_str()))
}

pub struct Matcher<'a> {
    index: &'a SourceIndex,
    config: &'a Config,
    lookups: Lookups<'a>,
}

impl<'a> Matcher<'a> {
    pub fn new(index: &'a SourceIndex, registry: &'a IdentifierRegistry, config: &'a Config) -> Self {
        Self {
            index,
            config,
            lookups: Lookups::new(index, registry),
        }
    }

    /// Map one element (its children are not visited).
    pub fn match_element(&self, element: &AccessibilityElement) -> MappingResult {
        if let Some(hit) = overrides::resolve(self.config, element) {
            let rule = &hit.entry.rule;
            debug!("{} pinned by override {}", hit.key, rule.pattern);
            let evidence = Evidence::new(Signal::ManualOverride, hit.describe());
            return MappingResult {
                winner: Some(MappingTarget {
                    file: rule.file.clone(),
                    line: rule.line,
                    module: self.index.module_of(&rule.file).map(str::to_string),
                    symbol: rule.owner_type.clone(),
                }),
                confidence: evidence.weight,
                confidence_band: ConfidenceBand::from_confidence(evidence.weight),
                evidence: vec![evidence],
                alternatives: Vec::new(),
            };
        }

        let mut ranked = self.rank(self.collect(element));
        if ranked.is_empty() {
            return MappingResult::unmatched();
        }

        let best = ranked.remove(0);
        ranked.truncate(self.config.max_alternatives);
        MappingResult {
            winner: Some(best.target),
            confidence: best.confidence,
            confidence_band: ConfidenceBand::from_confidence(best.confidence),
            evidence: best.evidence,
            alternatives: ranked.into_iter().map(Candidate::into_alternative).collect(),
        }
    }

    /// Map a whole hierarchy, preserving its shape.
    pub fn enrich(&self, roots: &[AccessibilityElement]) -> Vec<EnrichedNode> {
        roots.iter().map(|root| self.enrich_node(root)).collect()
    }

    fn enrich_node(&self, element: &AccessibilityElement) -> EnrichedNode {
        EnrichedNode {
            element_type: element.element_type.clone(),
            identifier: element.identifier.clone(),
            label: element.label.clone(),
            frame: element.frame,
            mapping: self.match_element(element),
            children: self.enrich(&element.children),
        }
    }

    fn collect(&self, element: &AccessibilityElement) -> Vec<Candidate> {
        let mut hits: Vec<Hit> = Vec::new();
        if let Some(identifier) = element.identifier() {
            let exact = self.lookups.identifier_exact(identifier);
            // A family is only consulted for identifiers with no literal occurrence.
            if exact.is_empty() {
                hits.extend(self.lookups.identifier_prefix(identifier));
            }
            hits.extend(exact);
        }
        hits.extend(self.lookups.class_name(&element.element_type));
        if let Some(label) = element.label() {
            hits.extend(self.lookups.label_exact(label));
        }

        let mut candidates: BTreeMap<(String, usize), Candidate> = BTreeMap::new();
        for hit in hits {
            let key = (hit.file.clone(), hit.line);
            match candidates.get_mut(&key) {
                Some(candidate) => candidate.absorb(hit),
                None => {
                    candidates.insert(key, Candidate::from_hit(hit));
                }
            }
        }
        candidates.into_values().collect()
    }

    /// Score candidates and order them best first.
    fn rank(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        for candidate in &mut candidates {
            candidate.evidence.sort_by(by_weight);
            candidate.confidence = self.config.signal_combination.combine(&candidate.evidence);
        }

        candidates.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| {
                    self.config
                        .module_rank(a.target.module.as_deref())
                        .cmp(&self.config.module_rank(b.target.module.as_deref()))
                })
                .then_with(|| a.depth.cmp(&b.depth))
                .then_with(|| a.target.file.cmp(&b.target.file))
                .then_with(|| a.target.line.cmp(&b.target.line))
        });
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLayer, ConfigSource, OverrideRule};
    use crate::indexer::Indexer;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn index(root: &Path) -> (SourceIndex, IdentifierRegistry) {
        let index = Indexer::new(&Config::default()).unwrap().index_root(root).unwrap();
        let registry = IdentifierRegistry::from_index(&index);
        (index, registry)
    }

    fn element(element_type: &str, identifier: Option<&str>, label: Option<&str>) -> AccessibilityElement {
        AccessibilityElement {
            element_type: element_type.to_string(),
            identifier: identifier.map(str::to_string),
            label: label.map(str::to_string),
            ..AccessibilityElement::default()
        }
    }

    /// `submitButton` assigned on line 42 of Views/Form.swift.
    fn form_fixture(root: &Path) {
        let mut source = String::from("struct FormView {\n");
        for _ in 0..40 {
            source.push_str("    // padding\n");
        }
        source.push_str("    let submit = button.accessibilityIdentifier(\"submitButton\")\n}\n");
        write(root, "Views/Form.swift", &source);
    }

    #[test]
    fn test_exact_identifier_match() {
        let temp = tempdir().unwrap();
        form_fixture(temp.path());
        let (index, registry) = index(temp.path());
        let config = Config::default();
        let matcher = Matcher::new(&index, &registry, &config);

        let result = matcher.match_element(&element("UIButton", Some("submitButton"), None));
        let winner = result.winner.unwrap();
        assert_eq!(winner.file, "Views/Form.swift");
        assert_eq!(winner.line, 42);
        assert_eq!(winner.module.as_deref(), Some("Views"));
        assert_eq!(winner.symbol.as_deref(), Some("FormView"));
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.confidence_band, ConfidenceBand::High);
        assert_eq!(result.evidence[0].signal, Signal::IdentifierExact);
    }

    #[test]
    fn test_prefix_family_maps_to_enclosing_type() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "Views/CardCell.swift",
            "final class CardCell {\n    func configure() {\n        first.accessibilityIdentifier = \"card.0\"\n        second.accessibilityIdentifier = \"card.1\"\n    }\n}\n",
        );
        let (index, registry) = index(temp.path());
        let config = Config::default();
        let matcher = Matcher::new(&index, &registry, &config);

        let result = matcher.match_element(&element("Other", Some("card.7"), None));
        let winner = result.winner.unwrap();
        assert_eq!(winner.file, "Views/CardCell.swift");
        assert_eq!(winner.line, 1);
        assert_eq!(winner.symbol.as_deref(), Some("CardCell"));
        assert_eq!(result.confidence, 0.6);
        assert_eq!(result.confidence_band, ConfidenceBand::Medium);
        // Both occurrences collapse onto the one declaration.
        assert_eq!(result.evidence.len(), 1);
        assert!(result.alternatives.is_empty());

        // An exact hit suppresses the family, so no sibling shows up.
        let exact = matcher.match_element(&element("Other", Some("card.0"), None));
        assert_eq!(exact.confidence, 0.9);
        assert_eq!(exact.winner.unwrap().line, 3);
        assert!(exact.alternatives.is_empty());
        assert!(exact.evidence.iter().all(|e| e.signal == Signal::IdentifierExact));
    }

    #[test]
    fn test_interpolated_family() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "Feed/Row.swift",
            "struct FeedRow: View {\n    var body: some View {\n        Text(title).accessibilityIdentifier(\"feed.row.\\(index)\")\n    }\n}\n",
        );
        let (index, registry) = index(temp.path());
        let config = Config::default();
        let matcher = Matcher::new(&index, &registry, &config);

        let result = matcher.match_element(&element("Other", Some("feed.row.abc"), None));
        assert_eq!(result.winner.unwrap().symbol.as_deref(), Some("FeedRow"));
        assert_eq!(result.confidence, 0.6);
    }

    #[test]
    fn test_override_beats_exact_match() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "Home/Header.swift",
            "struct HeaderView {\n    let t = title.accessibilityIdentifier(\"home.header.title\")\n}\n",
        );
        let (index, registry) = index(temp.path());
        let config = Config::merge(vec![(
            ConfigSource::Project,
            PathBuf::from("config.json"),
            ConfigLayer {
                overrides: vec![OverrideRule {
                    pattern: "home.header.*".to_string(),
                    file: "Home/HomeScreen.swift".to_string(),
                    line: 10,
                    owner_type: Some("HomeScreen".to_string()),
                }],
                ..ConfigLayer::default()
            },
        )]);
        let matcher = Matcher::new(&index, &registry, &config);

        let result = matcher.match_element(&element("UILabel", Some("home.header.title"), None));
        let winner = result.winner.unwrap();
        assert_eq!(winner.file, "Home/HomeScreen.swift");
        assert_eq!(winner.line, 10);
        assert_eq!(winner.symbol.as_deref(), Some("HomeScreen"));
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.confidence_band, ConfidenceBand::High);
        assert_eq!(result.evidence.len(), 1);
        assert_eq!(result.evidence[0].signal, Signal::ManualOverride);
        assert!(result.alternatives.is_empty());
    }

    #[test]
    fn test_no_signal_is_null_safe() {
        let temp = tempdir().unwrap();
        form_fixture(temp.path());
        let (index, registry) = index(temp.path());
        let config = Config::default();
        let matcher = Matcher::new(&index, &registry, &config);

        let result = matcher.match_element(&element("Other", None, None));
        assert_eq!(result, MappingResult::unmatched());
        let result = matcher.match_element(&element("", Some("nothing.here"), Some("Nope")));
        assert!(result.winner.is_none());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.confidence_band, ConfidenceBand::Low);
    }

    #[test]
    fn test_class_name_and_label_signals() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "UI/PlayButton.swift",
            "final class PlayButton: UIButton {\n    func setup() {\n        setTitle(\"Play\", for: .normal)\n    }\n}\n",
        );
        let (index, registry) = index(temp.path());
        let config = Config::default();
        let matcher = Matcher::new(&index, &registry, &config);

        let result = matcher.match_element(&element("XCUIElementTypeButton", None, Some("Play")));
        let winner = result.winner.unwrap();
        assert_eq!(winner.symbol.as_deref(), Some("PlayButton"));
        assert_eq!(winner.line, 1);
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.evidence[0].signal, Signal::ClassName);

        assert_eq!(result.alternatives.len(), 1);
        let label = &result.alternatives[0];
        assert_eq!(label.target.line, 3);
        assert_eq!(label.confidence, 0.5);
        assert_eq!(label.confidence_band, ConfidenceBand::Medium);
        assert_eq!(label.evidence[0].signal, Signal::LabelExact);
    }

    #[test]
    fn test_ranking_prefers_module_priority_then_depth() {
        let temp = tempdir().unwrap();
        let source = "struct Screen {\n    let b = x.accessibilityIdentifier(\"shared\")\n}\n";
        write(temp.path(), "Alpha/Screen.swift", source);
        write(temp.path(), "Beta/Screen.swift", source);
        write(
            temp.path(),
            "Gamma/Top.swift",
            "let top = x.accessibilityIdentifier(\"shared\")\n",
        );
        let (index, registry) = index(temp.path());

        let config = Config::default();
        let matcher = Matcher::new(&index, &registry, &config);
        let result = matcher.match_element(&element("Other", Some("shared"), None));
        // Equal confidence, no priority: shallower depth wins, then path.
        assert_eq!(result.winner.unwrap().file, "Gamma/Top.swift");
        let files: Vec<&str> = result
            .alternatives
            .iter()
            .map(|a| a.target.file.as_str())
            .collect();
        assert_eq!(files, vec!["Alpha/Screen.swift", "Beta/Screen.swift"]);

        let config = Config {
            module_priority: vec!["Beta".to_string()],
            max_alternatives: 1,
            ..Config::default()
        };
        let matcher = Matcher::new(&index, &registry, &config);
        let result = matcher.match_element(&element("Other", Some("shared"), None));
        assert_eq!(result.winner.unwrap().file, "Beta/Screen.swift");
        assert_eq!(result.alternatives.len(), 1);
        assert_eq!(result.alternatives[0].target.file, "Gamma/Top.swift");
    }

    #[test]
    fn test_capped_sum_blends_signals() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "UI/Save.swift",
            "struct SaveView {\n    let b = Button(\"Save\").accessibilityIdentifier(\"saveButton\")\n}\n",
        );
        let (index, registry) = index(temp.path());
        // Identifier and label both point at line 2.
        let element = element("UIButton", Some("saveButton"), Some("Save"));

        let config = Config::default();
        let result = Matcher::new(&index, &registry, &config).match_element(&element);
        assert_eq!(result.confidence, 0.9);
        let signals: Vec<Signal> = result.evidence.iter().map(|e| e.signal).collect();
        assert_eq!(signals, vec![Signal::IdentifierExact, Signal::LabelExact]);

        let config = Config {
            signal_combination: SignalCombination::CappedSum,
            ..Config::default()
        };
        let result = Matcher::new(&index, &registry, &config).match_element(&element);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.winner.unwrap().line, 2);
    }

    #[test]
    fn test_evidence_completeness_and_enrich_shape() {
        let temp = tempdir().unwrap();
        form_fixture(temp.path());
        let (index, registry) = index(temp.path());
        let config = Config::default();
        let matcher = Matcher::new(&index, &registry, &config);

        let mut root = element("UIWindow", None, None);
        root.children = vec![
            element("UIButton", Some("submitButton"), Some("Submit")),
            element("UILabel", None, Some("Unrelated")),
        ];
        let enriched = matcher.enrich(&[root]);
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].children.len(), 2);

        let mut seen = 0;
        enriched[0].walk(
            &mut |node, _| {
                seen += 1;
                if node.mapping.winner.is_some() {
                    assert!(node
                        .mapping
                        .evidence
                        .iter()
                        .any(|e| e.weight == node.mapping.confidence));
                }
            },
            &mut Vec::new(),
        );
        assert_eq!(seen, 3);
        assert!(enriched[0].children[0].mapping.winner.is_some());
        assert!(enriched[0].children[1].mapping.winner.is_none());
    }
}
