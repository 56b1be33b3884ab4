//! Source indexing: layout detection, Swift recognition and the flat index.
pub mod core;
pub mod layout;
pub mod model;
pub mod swift;

pub use self::core::{check_root, path_key, IndexStats, Indexer};
pub use self::layout::{LayoutPlan, ModuleRoot, ProjectLayout};
pub use self::model::*;
