/// Persisted identifier registry.
///
/// An `identifier → [location]` lookup derived from a [`SourceIndex`]. It is
/// pure derived state: it can always be rebuilt from a scan, and is only
/// persisted so repeated matching passes can skip re-deriving it. Writes go
/// through a temp file in the same directory followed by a rename, so readers
/// never observe a partial file.
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::indexer::{DeclRef, SourceIndex};

pub const REGISTRY_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryLocation {
    pub file: String,
    pub line: usize,
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_declaration: Option<DeclRef>,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierRegistry {
    pub version: u32,
    pub root: String,
    pub generated_at: DateTime<Utc>,
    pub identifiers: BTreeMap<String, Vec<RegistryLocation>>,
}

/// Why a registry has to be rebuilt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    Missing,
    Requested,
    RootChanged { recorded: String },
    Unreadable(String),
    VersionChanged(u32),
    SourceModified(String),
    IndexChanged,
}

impl std::fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "registry file absent"),
            Self::Requested => write!(f, "rebuild requested"),
            Self::RootChanged { recorded } => write!(f, "registry was built for {recorded}"),
            Self::Unreadable(e) => write!(f, "registry unreadable: {e}"),
            Self::VersionChanged(v) => write!(f, "registry version {v} is outdated"),
            Self::SourceModified(file) => write!(f, "{file} changed since the registry was built"),
            Self::IndexChanged => write!(f, "indexed identifiers no longer match the registry"),
        }
    }
}

impl IdentifierRegistry {
    /// Collapse the index's identifier occurrences, keeping every location.
    pub fn from_index(index: &SourceIndex) -> Self {
        let mut identifiers: BTreeMap<String, Vec<RegistryLocation>> = BTreeMap::new();
        for occurrence in &index.identifiers {
            identifiers
                .entry(occurrence.identifier.clone())
                .or_default()
                .push(RegistryLocation {
                    file: occurrence.file.clone(),
                    line: occurrence.line,
                    module: occurrence.module.clone(),
                    enclosing_declaration: occurrence.enclosing_declaration.clone(),
                    depth: occurrence.depth,
                });
        }

        Self {
            version: REGISTRY_VERSION,
            root: index.root.clone(),
            generated_at: Utc::now(),
            identifiers,
        }
    }

    pub fn get(&self, identifier: &str) -> &[RegistryLocation] {
        self.identifiers
            .get(identifier)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn location_count(&self) -> usize {
        self.identifiers.values().map(Vec::len).sum()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| Error::Serialize {
            what: "identifier registry",
            source,
        })
    }

    /// Persist atomically: write a sibling temp file, then rename over `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |source: std::io::Error| Error::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(write_err)?;

        let data = serde_json::to_vec_pretty(self).map_err(|source| Error::Serialize {
            what: "identifier registry",
            source,
        })?;
        let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
        temp.write_all(&data).map_err(write_err)?;
        temp.as_file().sync_all().map_err(write_err)?;
        temp.persist(path).map_err(|e| write_err(e.error))?;

        debug!("Wrote identifier registry to {}", path.display());
        Ok(())
    }
}

/// Decide whether the registry at `path` can be reused for `index`.
///
/// Returns the loaded registry when it is fresh, or the reason it is not.
/// Modification times only catch edits to files still in the index, so a
/// registry is fresh only when its identifier table equals the one derived
/// from `index`. Deleted, renamed and same-second edits all fail that test.
pub fn check_registry(
    path: &Path,
    index: &SourceIndex,
    force: bool,
) -> std::result::Result<IdentifierRegistry, RebuildReason> {
    if force {
        return Err(RebuildReason::Requested);
    }
    if !path.exists() {
        return Err(RebuildReason::Missing);
    }
    let registry =
        IdentifierRegistry::load(path).map_err(|e| RebuildReason::Unreadable(e.to_string()))?;
    if registry.version != REGISTRY_VERSION {
        return Err(RebuildReason::VersionChanged(registry.version));
    }
    if registry.root != index.root {
        return Err(RebuildReason::RootChanged {
            recorded: registry.root,
        });
    }
    if let Some(file) = modified_since(index, registry.generated_at) {
        return Err(RebuildReason::SourceModified(file));
    }
    if registry.identifiers != IdentifierRegistry::from_index(index).identifiers {
        return Err(RebuildReason::IndexChanged);
    }
    Ok(registry)
}

/// Load the registry at `path` if fresh, otherwise rebuild and persist it.
///
/// A failed write is logged and the in-memory registry is still returned.
pub fn load_or_build(path: &Path, index: &SourceIndex, force: bool) -> IdentifierRegistry {
    match check_registry(path, index, force) {
        Ok(registry) => {
            info!(
                "Reusing identifier registry {} ({} identifiers)",
                path.display(),
                registry.identifiers.len()
            );
            registry
        }
        Err(reason) => {
            info!("Rebuilding identifier registry: {reason}");
            let registry = IdentifierRegistry::from_index(index);
            if let Err(e) = registry.save(path) {
                warn!("Failed to persist identifier registry: {e}");
            }
            registry
        }
    }
}

fn modified_since(index: &SourceIndex, generated_at: DateTime<Utc>) -> Option<String> {
    let root = PathBuf::from(&index.root);
    index.modules.values().flatten().find_map(|file| {
        let modified: SystemTime = fs::metadata(root.join(file)).ok()?.modified().ok()?;
        let modified: DateTime<Utc> = modified.into();
        (modified > generated_at).then(|| file.clone())
    })
}

// ── Tests ────────────────────────────────────────────────────────────
