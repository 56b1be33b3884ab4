use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::layout::ProjectLayout;

/// Concrete flavour of a `type` declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Struct,
    Enum,
    Protocol,
    Actor,
}

impl TypeKind {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "class" => Some(Self::Class),
            "struct" => Some(Self::Struct),
            "enum" => Some(Self::Enum),
            "protocol" => Some(Self::Protocol),
            "actor" => Some(Self::Actor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Protocol => "protocol",
            Self::Actor => "actor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeclarationKind {
    Type(TypeKind),
    Extension,
    AssociatedType,
}

impl DeclarationKind {
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Type(_))
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Type(TypeKind::Protocol))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Type(kind) => kind.as_str(),
            Self::Extension => "extension",
            Self::AssociatedType => "associatedtype",
        }
    }
}

/// Back-reference to a declaration in the same file.
///
/// Declarations never own each other; `(file, line, name)` is enough to find
/// the referenced entry in the flat index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclRef {
    pub name: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDeclaration {
    pub kind: DeclarationKind,
    pub name: String,
    pub module: String,
    pub file: String,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conformances: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_type: Option<DeclRef>,
    pub depth: usize,
}

impl SourceDeclaration {
    pub fn to_ref(&self) -> DeclRef {
        DeclRef {
            name: self.name.clone(),
            line: self.line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierOccurrence {
    pub identifier: String,
    pub module: String,
    pub file: String,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_declaration: Option<DeclRef>,
    pub depth: usize,
}

/// A string literal that plausibly renders as visible text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringLiteral {
    pub text: String,
    pub module: String,
    pub file: String,
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclosing_declaration: Option<DeclRef>,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexWarning {
    pub file: String,
    pub message: String,
}

/// Flat, deterministic index of one source tree.
///
/// Every vector is ordered by `(module, file, line, name)` so two scans of an
/// unchanged tree serialize to identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceIndex {
    pub root: String,
    pub layout: ProjectLayout,
    pub modules: BTreeMap<String, Vec<String>>,
    pub declarations: Vec<SourceDeclaration>,
    pub identifiers: Vec<IdentifierOccurrence>,
    pub literals: Vec<StringLiteral>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<IndexWarning>,
}

impl SourceIndex {
    /// Look up the module a relative file path was indexed under.
    pub fn module_of(&self, file: &str) -> Option<&str> {
        self.modules
            .iter()
            .find(|(_, files)| files.iter().any(|f| f == file))
            .map(|(module, _)| module.as_str())
    }

    /// Find a declaration by back-reference within `file`.
    pub fn resolve(&self, file: &str, decl: &DeclRef) -> Option<&SourceDeclaration> {
        self.declarations
            .iter()
            .find(|d| d.file == file && d.line == decl.line && d.name == decl.name)
    }

    pub fn file_count(&self) -> usize {
        self.modules.values().map(Vec::len).sum()
    }

    pub(crate) fn sort(&mut self) {
        for files in self.modules.values_mut() {
            files.sort();
            files.dedup();
        }
        self.declarations.sort_by(|a, b| {
            (&a.module, &a.file, a.line, &a.name).cmp(&(&b.module, &b.file, b.line, &b.name))
        });
        self.identifiers.sort_by(|a, b| {
            (&a.module, &a.file, a.line, &a.identifier).cmp(&(
                &b.module,
                &b.file,
                b.line,
                &b.identifier,
            ))
        });
        self.literals.sort_by(|a, b| {
            (&a.module, &a.file, a.line, &a.text).cmp(&(&b.module, &b.file, b.line, &b.text))
        });
        self.warnings.sort_by(|a, b| a.file.cmp(&b.file));
    }
}
