use crate::config::{Config, MergedOverride};
use crate::pattern::PatternMatch;
use crate::snapshot::AccessibilityElement;

/// An override that applied to an element.
#[derive(Debug, Clone)]
pub struct OverrideHit<'c> {
    pub entry: &'c MergedOverride,
    /// The element key the pattern matched.
    pub key: String,
    pub strength: PatternMatch,
}

impl OverrideHit<'_> {
    pub fn describe(&self) -> String {
        let kind = match self.strength {
            PatternMatch::Exact => "exact",
            PatternMatch::Prefix(_) => "prefix",
        };
        format!(
            "{kind} override `{}` ({:?} config) matched `{}`",
            self.entry.rule.pattern, self.entry.source, self.key
        )
    }
}

/// The override that applies to `element`, if any.
///
/// Exact patterns beat prefix patterns; among prefix patterns the longest
/// literal prefix wins; remaining ties go to the rule merged last.
pub fn resolve<'c>(config: &'c Config, element: &AccessibilityElement) -> Option<OverrideHit<'c>> {
    let keys = element.match_keys();
    if keys.is_empty() {
        return None;
    }

    config
        .overrides
        .values()
        .filter_map(|entry| {
            keys.iter()
                .filter_map(|key| entry.pattern.matches(key).map(|m| (m, key)))
                // Prefer the identifier key when both keys match equally.
                .reduce(|best, next| if next.0 > best.0 { next } else { best })
                .map(|(strength, key)| OverrideHit {
                    entry,
                    key: key.clone(),
                    strength,
                })
        })
        .max_by(|a, b| {
            a.strength
                .cmp(&b.strength)
                .then_with(|| a.entry.order.cmp(&b.entry.order))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigLayer, ConfigSource, OverrideRule};
    use std::path::PathBuf;

    fn rule(pattern: &str, file: &str) -> OverrideRule {
        OverrideRule {
            pattern: pattern.to_string(),
            file: file.to_string(),
            line: 1,
            owner_type: None,
        }
    }

    fn config(layers: Vec<(ConfigSource, Vec<OverrideRule>)>) -> Config {
        Config::merge(
            layers
                .into_iter()
                .map(|(source, overrides)| {
                    (
                        source,
                        PathBuf::from("config.json"),
                        ConfigLayer {
                            overrides,
                            ..ConfigLayer::default()
                        },
                    )
                })
                .collect(),
        )
    }

    fn element(identifier: Option<&str>, label: Option<&str>) -> AccessibilityElement {
        AccessibilityElement {
            element_type: "UIButton".to_string(),
            identifier: identifier.map(str::to_string),
            label: label.map(str::to_string),
            ..AccessibilityElement::default()
        }
    }

    #[test]
    fn test_exact_beats_prefix() {
        let config = config(vec![(
            ConfigSource::Project,
            vec![rule("home.*", "Prefix.swift"), rule("home.title", "Exact.swift")],
        )]);
        let hit = resolve(&config, &element(Some("home.title"), None)).unwrap();
        assert_eq!(hit.entry.rule.file, "Exact.swift");
        assert_eq!(hit.key, "home.title");
        assert_eq!(hit.strength, PatternMatch::Exact);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let config = config(vec![(
            ConfigSource::Project,
            vec![
                rule("home.header.*", "Header.swift"),
                rule("home.*", "Home.swift"),
            ],
        )]);
        let hit = resolve(&config, &element(Some("home.header.title"), None)).unwrap();
        assert_eq!(hit.entry.rule.file, "Header.swift");
        assert!(hit.describe().starts_with("prefix override `home.header.*`"));
    }

    #[test]
    fn test_latest_source_wins_between_exact_matches() {
        // Identifier and composite key each hit a different exact rule.
        let config = config(vec![
            (ConfigSource::ToolDefaults, vec![rule("save", "Tool.swift")]),
            (
                ConfigSource::ProjectLocal,
                vec![rule("UIButton_Save", "Local.swift")],
            ),
        ]);
        let hit = resolve(&config, &element(Some("save"), Some("Save"))).unwrap();
        assert_eq!(hit.entry.rule.file, "Local.swift");
        assert_eq!(hit.key, "UIButton_Save");
    }

    #[test]
    fn test_composite_key_and_no_match() {
        let config = config(vec![(
            ConfigSource::Project,
            vec![rule("UIButton_Generate Music", "Music.swift")],
        )]);
        assert!(resolve(&config, &element(None, Some("Generate Music"))).is_some());
        assert!(resolve(&config, &element(Some("other"), Some("Other"))).is_none());
        assert!(resolve(&config, &element(None, None)).is_none());
    }
}
