//! Project layout detection.
//!
//! Decides which directories of a source root belong to which module before
//! the walk starts. Detection never fails: a manifest that cannot be used
//! degrades to the plain-directory layout.
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::{debug, warn};

const GENERATED_MANIFEST: &str = "project.yml";
const PACKAGE_MANIFEST: &str = "Package.swift";
const PACKAGE_SOURCES_DIR: &str = "Sources";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectLayout {
    SingleRoot,
    GeneratedProject,
    PackageManifest,
    #[default]
    PlainDirectory,
}

impl ProjectLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleRoot => "single-root",
            Self::GeneratedProject => "generated-project",
            Self::PackageManifest => "package-manifest",
            Self::PlainDirectory => "plain-directory",
        }
    }
}

/// A directory (relative to the root) whose files belong to `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRoot {
    pub name: String,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    pub layout: ProjectLayout,
    /// Empty for [`ProjectLayout::PlainDirectory`]: modules are derived per file.
    pub modules: Vec<ModuleRoot>,
    fallback_module: String,
}

impl LayoutPlan {
    /// Directories to walk, relative to the root.
    pub fn walk_roots(&self) -> Vec<PathBuf> {
        if self.modules.is_empty() {
            return vec![PathBuf::new()];
        }
        let mut dirs: Vec<PathBuf> = self.modules.iter().map(|m| m.dir.clone()).collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }

    /// Module owning a root-relative file path (`/`-separated).
    ///
    /// Explicit module roots win by longest directory prefix; otherwise the
    /// first path component names the module.
    pub fn module_for(&self, rel_path: &str) -> String {
        let best = self
            .modules
            .iter()
            .filter(|m| {
                let dir = normalize(&m.dir);
                dir.is_empty() || rel_path == dir || rel_path.starts_with(&format!("{dir}/"))
            })
            .max_by_key(|m| normalize(&m.dir).len());
        if let Some(module) = best {
            return module.name.clone();
        }

        match rel_path.split_once('/') {
            Some((first, _)) => first.to_string(),
            None => self.fallback_module.clone(),
        }
    }
}

/// Detect the layout of `root`.
///
/// Order: generated project manifest, package manifest, single root
/// (`*.xcodeproj`), plain directory.
pub fn detect(root: &Path) -> LayoutPlan {
    let fallback_module = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "root".to_string());

    let plain = |fallback_module: String| LayoutPlan {
        layout: ProjectLayout::PlainDirectory,
        modules: Vec::new(),
        fallback_module,
    };

    let manifest = root.join(GENERATED_MANIFEST);
    if manifest.is_file() {
        match generated_project_modules(&manifest, root) {
            Ok(modules) if !modules.is_empty() => {
                debug!("Detected generated project with {} targets", modules.len());
                return LayoutPlan {
                    layout: ProjectLayout::GeneratedProject,
                    modules,
                    fallback_module,
                };
            }
            Ok(_) => warn!(
                "{} lists no usable source directories, falling back to plain directory",
                manifest.display()
            ),
            Err(e) => warn!("Failed to read {}: {e}", manifest.display()),
        }
        return plain(fallback_module);
    }

    if root.join(PACKAGE_MANIFEST).is_file() {
        let modules = package_modules(root);
        if modules.is_empty() {
            warn!(
                "{PACKAGE_MANIFEST} found but {PACKAGE_SOURCES_DIR}/ has no targets, falling back to plain directory"
            );
            return plain(fallback_module);
        }
        debug!("Detected package manifest with {} targets", modules.len());
        return LayoutPlan {
            layout: ProjectLayout::PackageManifest,
            modules,
            fallback_module,
        };
    }

    if let Some(project) = xcodeproj_name(root) {
        debug!("Detected single-root project {project}");
        return LayoutPlan {
            layout: ProjectLayout::SingleRoot,
            modules: vec![ModuleRoot {
                name: project.clone(),
                dir: PathBuf::new(),
            }],
            fallback_module: project,
        };
    }

    plain(fallback_module)
}

fn generated_project_modules(
    manifest: &Path,
    root: &Path,
) -> Result<Vec<ModuleRoot>, Box<dyn std::error::Error>> {
    let data = fs::read_to_string(manifest)?;
    let doc: Value = serde_yaml::from_str(&data)?;

    let Some(targets) = doc.get("targets").and_then(Value::as_mapping) else {
        return Ok(Vec::new());
    };

    let mut modules = Vec::new();
    for (name, target) in targets {
        let Some(name) = name.as_str() else { continue };
        let sources = match target.get("sources") {
            Some(Value::Sequence(items)) => items.iter().filter_map(source_path).collect(),
            Some(other) => source_path(other).into_iter().collect(),
            None => Vec::new(),
        };
        for dir in sources {
            let dir = PathBuf::from(dir.trim_start_matches("./"));
            if root.join(&dir).exists() {
                modules.push(ModuleRoot {
                    name: name.to_string(),
                    dir,
                });
            } else {
                warn!("Target {name} lists missing source path {}", dir.display());
            }
        }
    }
    modules.sort_by(|a, b| (&a.name, &a.dir).cmp(&(&b.name, &b.dir)));
    Ok(modules)
}

fn source_path(entry: &Value) -> Option<String> {
    match entry {
        Value::String(s) => Some(s.clone()),
        Value::Mapping(_) => entry.get("path").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn package_modules(root: &Path) -> Vec<ModuleRoot> {
    let sources = root.join(PACKAGE_SOURCES_DIR);
    let Ok(entries) = fs::read_dir(&sources) else {
        return Vec::new();
    };

    let mut modules: Vec<ModuleRoot> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            ModuleRoot {
                dir: Path::new(PACKAGE_SOURCES_DIR).join(&name),
                name,
            }
        })
        .collect();
    modules.sort_by(|a, b| a.name.cmp(&b.name));
    modules
}

fn xcodeproj_name(root: &Path) -> Option<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.extension().and_then(|e| e.to_str()) == Some("xcodeproj"))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .collect();
    names.sort();
    names.into_iter().next()
}

fn normalize(dir: &Path) -> String {
    dir.to_string_lossy()
        .replace('\\', "/")
        .trim_end_matches('/')
        .to_string()
}
