//! Wiring between the indexer, registry, matcher and auditor.
//!
//! A [`Project`] is a checked source root plus the configuration merged for
//! it. The CLI subcommands are thin wrappers over its methods.
use std::path::{Path, PathBuf};

use tracing::info;

use crate::audit::{self, Audit};
use crate::config::{CONFIG_DIR, Config, ConfigLayer, PROJECT_CONFIG_FILE};
use crate::error::{Error, Result};
use crate::indexer::{check_root, Indexer, SourceIndex};
use crate::matcher::{EnrichedNode, Matcher};
use crate::registry::{self, IdentifierRegistry};
use crate::snapshot::AccessibilityElement;

pub struct Project {
    pub root: PathBuf,
    pub config: Config,
}

impl Project {
    /// Check `root` and load the layered configuration for it.
    pub fn open(root: &Path) -> Result<Self> {
        let root = check_root(root)?;
        let config = Config::load_for_root(&root)?;
        Ok(Self { root, config })
    }

    pub fn with_config(root: &Path, config: Config) -> Result<Self> {
        Ok(Self {
            root: check_root(root)?,
            config,
        })
    }

    pub fn index(&self) -> Result<SourceIndex> {
        Indexer::new(&self.config)?.index_root(&self.root)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.config.registry_file(&self.root)
    }

    pub fn registry(&self, index: &SourceIndex, rebuild: bool) -> IdentifierRegistry {
        registry::load_or_build(&self.registry_path(), index, rebuild)
    }

    /// Index, refresh the registry and map every element of `roots`.
    pub fn map(&self, roots: &[AccessibilityElement], rebuild: bool) -> Result<Vec<EnrichedNode>> {
        let index = self.index()?;
        let registry = self.registry(&index, rebuild);
        let enriched = Matcher::new(&index, &registry, &self.config).enrich(roots);

        let total: usize = roots.iter().map(AccessibilityElement::count).sum();
        info!("Mapped {total} elements against {} source files", index.file_count());
        Ok(enriched)
    }

    pub fn audit(&self, hierarchy: &[EnrichedNode]) -> Audit {
        audit::audit(hierarchy, &self.config)
    }
}

/// Process exit status for a finished audit: 0 when every critical rule
/// passed, 1 otherwise. Input and I/O errors exit with 2 before an audit exists.
pub fn audit_exit_status(audit: &Audit) -> u8 {
    if audit.report.passed { 0 } else { 1 }
}

pub fn write_index(path: &Path, index: &SourceIndex) -> Result<()> {
    audit::write_json(path, index, "source index")
}

pub fn write_hierarchy(path: &Path, hierarchy: &[EnrichedNode]) -> Result<()> {
    audit::write_json(path, &hierarchy, "enriched hierarchy")
}

pub fn to_json<T: serde::Serialize>(value: &T, what: &'static str) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|source| Error::Serialize { what, source })
}

/// Write the project config template unless one exists.
///
/// Returns the path written, or `None` when a config was already present and
/// `force` is not set.
pub fn init_config(root: &Path, force: bool) -> Result<Option<PathBuf>> {
    let root = check_root(root)?;
    let path = root.join(CONFIG_DIR).join(PROJECT_CONFIG_FILE);
    if path.exists() && !force {
        return Ok(None);
    }
    ConfigLayer::template().save(&path)?;
    info!("Wrote {}", path.display());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_init_config_does_not_clobber() {
        let temp = tempdir().unwrap();
        let written = init_config(temp.path(), false).unwrap().unwrap();
        assert!(written.ends_with(".uilink/config.json"));

        fs::write(&written, "{\"maxAlternatives\": 2}").unwrap();
        assert!(init_config(temp.path(), false).unwrap().is_none());
        assert_eq!(Project::open(temp.path()).unwrap().config.max_alternatives, 2);

        init_config(temp.path(), true).unwrap().unwrap();
        assert_eq!(Project::open(temp.path()).unwrap().config.max_alternatives, 5);
    }

    #[test]
    fn test_map_persists_registry() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("App")).unwrap();
        fs::write(
            temp.path().join("App/Login.swift"),
            "struct LoginView {\n    let b = x.accessibilityIdentifier(\"loginButton\")\n}\n",
        )
        .unwrap();

        let project = Project::open(temp.path()).unwrap();
        let roots = vec![AccessibilityElement {
            element_type: "UIButton".to_string(),
            identifier: Some("loginButton".to_string()),
            ..AccessibilityElement::default()
        }];
        let enriched = project.map(&roots, false).unwrap();
        assert_eq!(enriched[0].mapping.winner.as_ref().unwrap().line, 2);
        assert!(project.registry_path().exists());
    }

    #[test]
    fn test_audit_exit_status() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("App")).unwrap();
        fs::write(
            temp.path().join("App/Login.swift"),
            "struct LoginView {\n    let b = x.accessibilityIdentifier(\"loginButton\")\n}\n",
        )
        .unwrap();
        let project = Project::open(temp.path()).unwrap();
        let roots = vec![AccessibilityElement {
            element_type: "UIButton".to_string(),
            identifier: Some("loginButton".to_string()),
            label: Some("Log In".to_string()),
            ..AccessibilityElement::default()
        }];
        let enriched = project.map(&roots, false).unwrap();

        let rule = |pattern: &str| crate::config::CriticalMapping {
            pattern: pattern.to_string(),
            min_confidence: 0.8,
        };
        let rules_path = temp.path().join("rules.json");
        ConfigLayer {
            critical_mappings: vec![rule("loginButton")],
            ..ConfigLayer::default()
        }
        .save(&rules_path)
        .unwrap();
        let config = Config::load_with_rules(temp.path(), &rules_path).unwrap();
        let passing = Project::with_config(temp.path(), config).unwrap().audit(&enriched);
        assert!(passing.report.passed);
        assert_eq!(audit_exit_status(&passing), 0);

        ConfigLayer {
            critical_mappings: vec![rule("loginButton"), rule("signupButton")],
            ..ConfigLayer::default()
        }
        .save(&rules_path)
        .unwrap();
        let config = Config::load_with_rules(temp.path(), &rules_path).unwrap();
        let failing = Project::with_config(temp.path(), config).unwrap().audit(&enriched);
        assert!(!failing.report.passed);
        assert_eq!(audit_exit_status(&failing), 1);
    }

    #[test]
    fn test_map_forgets_deleted_source() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("App")).unwrap();
        fs::write(temp.path().join("App/Keep.swift"), "struct Keep {}\n").unwrap();
        fs::write(
            temp.path().join("App/Gone.swift"),
            "struct Gone {\n    let b = x.accessibilityIdentifier(\"goneButton\")\n}\n",
        )
        .unwrap();

        let project = Project::open(temp.path()).unwrap();
        let roots = vec![AccessibilityElement {
            element_type: "Other".to_string(),
            identifier: Some("goneButton".to_string()),
            ..AccessibilityElement::default()
        }];
        let before = project.map(&roots, false).unwrap();
        assert_eq!(before[0].mapping.winner.as_ref().unwrap().file, "App/Gone.swift");

        fs::remove_file(temp.path().join("App/Gone.swift")).unwrap();
        let after = project.map(&roots, false).unwrap();
        assert!(after[0].mapping.winner.is_none());
        assert_eq!(after[0].mapping.confidence, 0.0);
    }
}
