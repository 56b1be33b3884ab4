use crate::config::Config;
use crate::error::{Error, Result};
use crate::indexer::layout::{self, LayoutPlan};
use crate::indexer::model::{IndexWarning, SourceIndex};
use crate::indexer::swift;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory names that hold build output or vendored dependencies.
const IGNORED_DIRS: &[&str] = &[
    ".build",
    "build",
    "DerivedData",
    "Pods",
    "Carthage",
    "node_modules",
    ".git",
    ".swiftpm",
    ".uilink",
    "vendor",
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub indexed: usize,
    pub failed: usize,
}

pub struct Indexer {
    extensions: Vec<String>,
    excludes: GlobSet,
}

impl Indexer {
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude {
            let glob = Glob::new(pattern).map_err(|e| Error::InvalidConfig {
                path: PathBuf::from("<merged config>"),
                key: "exclude".to_string(),
                message: format!("has invalid glob {pattern:?}: {e}"),
            })?;
            builder.add(glob);
        }
        let excludes = builder.build().map_err(|e| Error::InvalidConfig {
            path: PathBuf::from("<merged config>"),
            key: "exclude".to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            extensions: config.source_extensions.clone(),
            excludes,
        })
    }

    /// Checks if a file extension is recognized
    fn is_supported_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e == ext)
    }

    fn is_excluded(&self, rel_path: &str) -> bool {
        !self.excludes.is_empty() && self.excludes.is_match(rel_path)
    }

    /// Index every recognized source file under `root`.
    ///
    /// A missing or unreadable root is fatal. A file that cannot be read or
    /// decoded is skipped and recorded in [`SourceIndex::warnings`].
    pub fn index_root<P: AsRef<Path>>(&self, root: P) -> Result<SourceIndex> {
        let root = root.as_ref();
        let root = check_root(root)?;
        let plan = layout::detect(&root);
        info!(
            "Indexing {} ({} layout)",
            root.display(),
            plan.layout.as_str()
        );

        let mut index = SourceIndex {
            root: path_key(&root),
            layout: plan.layout,
            ..SourceIndex::default()
        };
        let mut stats = IndexStats::default();

        for rel_path in self.discover_files(&root, &plan) {
            let module = plan.module_for(&rel_path);
            let path = root.join(&rel_path);

            let content = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Skipping unreadable file {rel_path}: {e}");
                    index.warnings.push(IndexWarning {
                        file: rel_path,
                        message: format!("unreadable: {e}"),
                    });
                    stats.failed += 1;
                    continue;
                }
            };
            let source = match String::from_utf8(content) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Skipping non-UTF-8 file {rel_path}: {e}");
                    index.warnings.push(IndexWarning {
                        file: rel_path,
                        message: format!("invalid UTF-8: {e}"),
                    });
                    stats.failed += 1;
                    continue;
                }
            };

            let scan = swift::scan_source(&source, &module, &rel_path);
            debug!(
                "{rel_path}: {} declarations, {} identifiers, {} literals",
                scan.declarations.len(),
                scan.identifiers.len(),
                scan.literals.len()
            );
            index.declarations.extend(scan.declarations);
            index.identifiers.extend(scan.identifiers);
            index.literals.extend(scan.literals);
            index.modules.entry(module).or_default().push(rel_path);
            stats.indexed += 1;
        }

        index.sort();
        info!(
            "Indexed {} files ({} failed): {} declarations, {} identifiers, {} literals",
            stats.indexed,
            stats.failed,
            index.declarations.len(),
            index.identifiers.len(),
            index.literals.len()
        );
        Ok(index)
    }

    /// Root-relative, `/`-separated paths of every eligible file, sorted.
    fn discover_files(&self, root: &Path, plan: &LayoutPlan) -> BTreeSet<String> {
        let mut files = BTreeSet::new();

        for walk_root in plan.walk_roots() {
            let start = root.join(&walk_root);
            // Walk builder respects .gitignore by default
            let walker = WalkBuilder::new(&start)
                .hidden(false)
                .filter_entry(|entry| {
                    let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                    !(is_dir && entry.depth() > 0 && is_ignored_dir(entry.file_name()))
                })
                .build();

            for entry in walker.into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                let ext = path
                    .extension()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default();
                if !self.is_supported_extension(ext) {
                    continue;
                }
                let Ok(rel) = path.strip_prefix(root) else {
                    continue;
                };
                let rel_path = path_key(rel);
                if self.is_excluded(&rel_path) {
                    debug!("Excluded by config: {rel_path}");
                    continue;
                }
                files.insert(rel_path);
            }
        }

        files
    }
}

fn is_ignored_dir(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    IGNORED_DIRS.contains(&name.as_ref())
}

/// Validate the source root and make it absolute.
pub fn check_root(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        return Err(Error::RootMissing(root.to_path_buf()));
    }
    let absolute = std::path::absolute(root).map_err(|source| Error::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;
    fs::read_dir(&absolute).map_err(|source| Error::RootUnreadable {
        path: absolute.clone(),
        source,
    })?;
    Ok(absolute)
}

/// Replace backslashes with forward slashes for cross-platform consistency.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
