/// Configuration module for uilink.
///
/// Configuration is read from up to three JSON files in a fixed precedence
/// order (tool defaults → project → project-local) and merged into a single
/// [`Config`] value that is passed explicitly to the indexer, matcher and
/// auditor.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::matcher::SignalCombination;
use crate::pattern::Pattern;

pub const CONFIG_DIR: &str = ".uilink";
pub const PROJECT_CONFIG_FILE: &str = "config.json";
pub const LOCAL_CONFIG_FILE: &str = "config.local.json";
pub const REGISTRY_FILE: &str = "registry.json";
const TOOL_NAME: &str = "uilink";

// ── Default value functions ──────────────────────────────────────────

fn default_source_extensions() -> Vec<String> {
    vec!["swift".to_string()]
}

fn default_max_alternatives() -> usize {
    5
}

// ── Config file structs ──────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRule {
    pub pattern: String,
    pub file: String,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_type: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CriticalMapping {
    pub pattern: String,
    pub min_confidence: f64,
}

/// One configuration file as written on disk. Every key is optional so a
/// layer only contributes what it sets.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigLayer {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<OverrideRule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub module_priority: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub critical_mappings: Vec<CriticalMapping>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_extensions: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_alternatives: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_combination: Option<SignalCombination>,
}

/// Where a layer came from, in ascending precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigSource {
    ToolDefaults,
    Project,
    ProjectLocal,
    /// A rules file passed explicitly to `audit`.
    RulesFile,
}

/// An override after merging, remembering which layer supplied it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedOverride {
    pub rule: OverrideRule,
    pub pattern: Pattern,
    pub source: ConfigSource,
    /// Position in merge order; larger means merged later.
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedCritical {
    pub rule: CriticalMapping,
    pub pattern: Pattern,
    pub source: ConfigSource,
}

// ── Merged config ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Keyed by the raw pattern string.
    pub overrides: BTreeMap<String, MergedOverride>,
    pub module_priority: Vec<String>,
    pub critical_mappings: BTreeMap<String, MergedCritical>,
    pub source_extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub max_alternatives: usize,
    pub registry_path: Option<PathBuf>,
    pub signal_combination: SignalCombination,
    /// Files that contributed, in merge order.
    pub loaded_from: Vec<(ConfigSource, PathBuf)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            overrides: BTreeMap::new(),
            module_priority: Vec::new(),
            critical_mappings: BTreeMap::new(),
            source_extensions: default_source_extensions(),
            exclude: Vec::new(),
            max_alternatives: default_max_alternatives(),
            registry_path: None,
            signal_combination: SignalCombination::default(),
            loaded_from: Vec::new(),
        }
    }
}

/// The three config locations for one source root.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLocations {
    pub tool_defaults: Option<PathBuf>,
    pub project: PathBuf,
    pub project_local: PathBuf,
}

impl ConfigLocations {
    pub fn for_root(root: &Path) -> Self {
        Self {
            tool_defaults: dirs::config_dir().map(|d| d.join(TOOL_NAME).join(PROJECT_CONFIG_FILE)),
            project: root.join(CONFIG_DIR).join(PROJECT_CONFIG_FILE),
            project_local: root.join(CONFIG_DIR).join(LOCAL_CONFIG_FILE),
        }
    }

    /// Locations in precedence order, lowest first.
    pub fn ordered(&self) -> Vec<(ConfigSource, PathBuf)> {
        let mut out = Vec::new();
        if let Some(ref tool) = self.tool_defaults {
            out.push((ConfigSource::ToolDefaults, tool.clone()));
        }
        out.push((ConfigSource::Project, self.project.clone()));
        out.push((ConfigSource::ProjectLocal, self.project_local.clone()));
        out
    }
}

// ── Config implementation ────────────────────────────────────────────

impl ConfigLayer {
    /// Load one layer. Returns `Ok(None)` when the file does not exist.
    ///
    /// Malformed JSON or invalid values are fatal and name the file.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!("{} not found, skipping", path.display());
            return Ok(None);
        }

        let data = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let layer: ConfigLayer =
            serde_json::from_str(&data).map_err(|source| Error::MalformedConfig {
                path: path.to_path_buf(),
                source,
            })?;
        layer.validate(path)?;

        info!("Loaded configuration from {}", path.display());
        Ok(Some(layer))
    }

    /// Save this layer as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).map_err(|source| Error::Serialize {
            what: "config",
            source,
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, data).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate configuration values.
    pub fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |key: String, message: &str| Error::InvalidConfig {
            path: path.to_path_buf(),
            key,
            message: message.to_string(),
        };

        for (i, rule) in self.overrides.iter().enumerate() {
            if rule.pattern.is_empty() || rule.pattern == "*" {
                return Err(invalid(format!("overrides[{i}].pattern"), "must not be empty"));
            }
            if rule.file.is_empty() {
                return Err(invalid(format!("overrides[{i}].file"), "must not be empty"));
            }
            if rule.line == 0 {
                return Err(invalid(format!("overrides[{i}].line"), "must be 1-based"));
            }
        }
        for (i, rule) in self.critical_mappings.iter().enumerate() {
            if rule.pattern.is_empty() {
                return Err(invalid(
                    format!("criticalMappings[{i}].pattern"),
                    "must not be empty",
                ));
            }
            if !(0.0..=1.0).contains(&rule.min_confidence) {
                return Err(invalid(
                    format!("criticalMappings[{i}].minConfidence"),
                    "must be within [0, 1]",
                ));
            }
        }
        if self.source_extensions.iter().any(|e| e.is_empty() || e.starts_with('.')) {
            return Err(invalid(
                "sourceExtensions".to_string(),
                "entries must be bare extensions like \"swift\"",
            ));
        }
        Ok(())
    }

    /// Template written by `uilink init`.
    pub fn template() -> Self {
        Self {
            module_priority: Vec::new(),
            source_extensions: default_source_extensions(),
            max_alternatives: Some(default_max_alternatives()),
            ..Self::default()
        }
    }
}

fn read_layers(locations: &ConfigLocations) -> Result<Vec<(ConfigSource, PathBuf, ConfigLayer)>> {
    let mut layers = Vec::new();
    for (source, path) in locations.ordered() {
        if let Some(layer) = ConfigLayer::load(&path)? {
            layers.push((source, path, layer));
        }
    }
    if layers.is_empty() {
        info!("No configuration files found, using defaults");
    }
    Ok(layers)
}

/// The latest layer for which `pick` holds.
fn latest<'a>(
    layers: &'a [(ConfigSource, PathBuf, ConfigLayer)],
    pick: impl Fn(&ConfigLayer) -> bool,
) -> Option<&'a ConfigLayer> {
    layers.iter().rev().map(|(_, _, l)| l).find(|l| pick(*l))
}

impl Config {
    /// Load and merge every layer that exists for `root`.
    pub fn load_for_root(root: &Path) -> Result<Self> {
        Self::load_layered(&ConfigLocations::for_root(root))
    }

    pub fn load_layered(locations: &ConfigLocations) -> Result<Self> {
        Ok(Self::merge(read_layers(locations)?))
    }

    /// Layered config for `root` with an explicit rules file merged last.
    ///
    /// Unlike the layered locations, the rules file must exist.
    pub fn load_with_rules(root: &Path, rules: &Path) -> Result<Self> {
        let mut layers = read_layers(&ConfigLocations::for_root(root))?;
        let layer = ConfigLayer::load(rules)?.ok_or_else(|| Error::Read {
            path: rules.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "rules file not found"),
        })?;
        layers.push((ConfigSource::RulesFile, rules.to_path_buf(), layer));
        Ok(Self::merge(layers))
    }

    /// Ordered merge of layers, lowest precedence first.
    ///
    /// Pattern-keyed tables are rebuilt from the concatenation of all layers so
    /// that a later entry with an identical pattern replaces an earlier one.
    /// Scalars take the value from the latest layer that sets them; `exclude`
    /// accumulates.
    pub fn merge(layers: Vec<(ConfigSource, PathBuf, ConfigLayer)>) -> Self {
        let overrides: BTreeMap<String, MergedOverride> = layers
            .iter()
            .flat_map(|(source, _, layer)| layer.overrides.iter().map(move |r| (*source, r)))
            .enumerate()
            .map(|(order, (source, rule))| {
                (
                    rule.pattern.clone(),
                    MergedOverride {
                        pattern: Pattern::parse(&rule.pattern),
                        rule: rule.clone(),
                        source,
                        order,
                    },
                )
            })
            .collect();

        let critical_mappings: BTreeMap<String, MergedCritical> = layers
            .iter()
            .flat_map(|(source, _, layer)| layer.critical_mappings.iter().map(move |r| (*source, r)))
            .map(|(source, rule)| {
                (
                    rule.pattern.clone(),
                    MergedCritical {
                        pattern: Pattern::parse(&rule.pattern),
                        rule: rule.clone(),
                        source,
                    },
                )
            })
            .collect();

        let defaults = Self::default();
        Self {
            overrides,
            critical_mappings,
            module_priority: latest(&layers, |l| !l.module_priority.is_empty())
                .map(|l| l.module_priority.clone())
                .unwrap_or(defaults.module_priority),
            source_extensions: latest(&layers, |l| !l.source_extensions.is_empty())
                .map(|l| l.source_extensions.clone())
                .unwrap_or(defaults.source_extensions),
            exclude: layers
                .iter()
                .flat_map(|(_, _, l)| l.exclude.iter().cloned())
                .collect(),
            max_alternatives: latest(&layers, |l| l.max_alternatives.is_some())
                .and_then(|l| l.max_alternatives)
                .unwrap_or(defaults.max_alternatives),
            registry_path: latest(&layers, |l| l.registry_path.is_some())
                .and_then(|l| l.registry_path.as_ref())
                .map(PathBuf::from),
            signal_combination: latest(&layers, |l| l.signal_combination.is_some())
                .and_then(|l| l.signal_combination)
                .unwrap_or(defaults.signal_combination),
            loaded_from: layers.into_iter().map(|(s, p, _)| (s, p)).collect(),
        }
    }

    /// Registry artifact location for `root`.
    #[must_use]
    pub fn registry_file(&self, root: &Path) -> PathBuf {
        match self.registry_path {
            Some(ref path) if path.is_absolute() => path.clone(),
            Some(ref path) => root.join(path),
            None => root.join(CONFIG_DIR).join(REGISTRY_FILE),
        }
    }

    /// Rank of a module in `modulePriority`; unlisted modules rank last.
    #[must_use]
    pub fn module_rank(&self, module: Option<&str>) -> usize {
        module
            .and_then(|m| self.module_priority.iter().position(|p| p == m))
            .unwrap_or(self.module_priority.len())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
