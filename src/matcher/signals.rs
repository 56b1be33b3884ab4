//! Signal extraction.
//!
//! Each signal proposes source locations for one element. Lookup tables are
//! built once per matching pass from the index and registry, then queried per
//! element.
use std::collections::HashMap;

use super::model::{Evidence, Signal};
use crate::indexer::{SourceDeclaration, SourceIndex, StringLiteral};
use crate::registry::{IdentifierRegistry, RegistryLocation};

const FAMILY_SEPARATORS: [char; 3] = ['.', '_', '-'];
const INTERPOLATION_START: &str = "\\(";

/// One proposed location with the evidence for it.
#[derive(Debug, Clone)]
pub(crate) struct Hit {
    pub file: String,
    pub line: usize,
    pub module: String,
    pub symbol: Option<String>,
    pub depth: usize,
    pub evidence: Evidence,
}

/// Variable tail of an identifier family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    Digits,
    Interpolated,
}

#[derive(Debug)]
struct Family<'a> {
    prefix: &'a str,
    tail: Tail,
    identifier: &'a str,
    location: &'a RegistryLocation,
}

impl Family<'_> {
    fn accepts(&self, identifier: &str) -> bool {
        if identifier == self.identifier {
            return false;
        }
        let Some(rest) = identifier.strip_prefix(self.prefix) else {
            return false;
        };
        match self.tail {
            Tail::Digits => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
            Tail::Interpolated => !rest.is_empty(),
        }
    }
}

/// Split an identifier into its family prefix and tail kind.
///
/// `card.0` → (`card.`, digits), `card.\(index)` → (`card.`, interpolated).
/// Identifiers without a variable tail have no family.
fn family_of(identifier: &str) -> Option<(&str, Tail)> {
    if let Some(pos) = identifier.find(INTERPOLATION_START) {
        let prefix = &identifier[..pos];
        return prefix
            .ends_with(FAMILY_SEPARATORS)
            .then_some((prefix, Tail::Interpolated));
    }

    let split = identifier.rfind(FAMILY_SEPARATORS)?;
    let (prefix, tail) = identifier.split_at(split + 1);
    let variable = !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit());
    (variable && prefix.len() > 1).then_some((prefix, Tail::Digits))
}

/// Names an element type may be declared under.
///
/// `XCUIElementTypeButton`, `AXButton`, `Button` and `UIButton` all yield
/// `["Button", "UIButton"]` in some order.
pub(crate) fn type_names(element_type: &str) -> Vec<String> {
    let base = element_type
        .strip_prefix("XCUIElementType")
        .or_else(|| {
            element_type
                .strip_prefix("AX")
                .filter(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
        })
        .unwrap_or(element_type)
        .trim();
    if base.is_empty() {
        return Vec::new();
    }

    let toggled = match base.strip_prefix("UI") {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_uppercase()) => rest.to_string(),
        _ => format!("UI{base}"),
    };
    vec![base.to_string(), toggled]
}

/// Bare type name of one inheritance entry: generic arguments and module
/// qualification removed.
fn conformance_name(entry: &str) -> &str {
    let name = entry.split('<').next().unwrap_or(entry).trim();
    name.rsplit('.').next().unwrap_or(name)
}

#[derive(Debug, Clone, Copy)]
struct TypeEntry<'a> {
    decl: &'a SourceDeclaration,
    inherited: bool,
}

pub(crate) struct Lookups<'a> {
    index: &'a SourceIndex,
    registry: &'a IdentifierRegistry,
    families: Vec<Family<'a>>,
    types: HashMap<&'a str, Vec<TypeEntry<'a>>>,
    literals: HashMap<&'a str, Vec<&'a StringLiteral>>,
}

impl<'a> Lookups<'a> {
    pub fn new(index: &'a SourceIndex, registry: &'a IdentifierRegistry) -> Self {
        let families = registry
            .identifiers
            .iter()
            .filter_map(|(identifier, locations)| {
                let (prefix, tail) = family_of(identifier)?;
                Some(locations.iter().map(move |location| Family {
                    prefix,
                    tail,
                    identifier,
                    location,
                }))
            })
            .flatten()
            .collect();

        let mut types: HashMap<&str, Vec<TypeEntry>> = HashMap::new();
        for decl in index.declarations.iter().filter(|d| d.kind.is_type()) {
            types.entry(decl.name.as_str()).or_default().push(TypeEntry {
                decl,
                inherited: false,
            });
            for conformance in &decl.conformances {
                types
                    .entry(conformance_name(conformance))
                    .or_default()
                    .push(TypeEntry {
                        decl,
                        inherited: true,
                    });
            }
        }

        let mut literals: HashMap<&str, Vec<&StringLiteral>> = HashMap::new();
        for literal in &index.literals {
            literals.entry(literal.text.as_str()).or_default().push(literal);
        }

        Self {
            index,
            registry,
            families,
            types,
            literals,
        }
    }

    pub fn identifier_exact(&self, identifier: &str) -> Vec<Hit> {
        self.registry
            .get(identifier)
            .iter()
            .map(|location| Hit {
                file: location.file.clone(),
                line: location.line,
                module: location.module.clone(),
                symbol: location.enclosing_declaration.as_ref().map(|d| d.name.clone()),
                depth: location.depth,
                evidence: Evidence::new(
                    Signal::IdentifierExact,
                    format!("accessibilityIdentifier \"{identifier}\""),
                ),
            })
            .collect()
    }

    /// Family matches, attributed to the declaration enclosing each
    /// occurrence when the index knows it.
    pub fn identifier_prefix(&self, identifier: &str) -> Vec<Hit> {
        self.families
            .iter()
            .filter(|family| family.accepts(identifier))
            .map(|family| {
                let location = family.location;
                let evidence = Evidence::new(
                    Signal::IdentifierPrefix,
                    format!(
                        "\"{identifier}\" shares family \"{}\" with \"{}\"",
                        family.prefix, family.identifier
                    ),
                );
                let enclosing = location
                    .enclosing_declaration
                    .as_ref()
                    .and_then(|d| self.index.resolve(&location.file, d));
                match enclosing {
                    Some(decl) => Hit {
                        file: decl.file.clone(),
                        line: decl.line,
                        module: decl.module.clone(),
                        symbol: Some(decl.name.clone()),
                        depth: decl.depth,
                        evidence,
                    },
                    None => Hit {
                        file: location.file.clone(),
                        line: location.line,
                        module: location.module.clone(),
                        symbol: None,
                        depth: location.depth,
                        evidence,
                    },
                }
            })
            .collect()
    }

    pub fn class_name(&self, element_type: &str) -> Vec<Hit> {
        type_names(element_type)
            .iter()
            .filter_map(|name| self.types.get(name.as_str()).map(|e| (name, e)))
            .flat_map(|(name, entries)| {
                entries.iter().map(move |entry| {
                    let decl = entry.decl;
                    let detail = if entry.inherited {
                        format!("{} {} inherits {name}", decl.kind.as_str(), decl.name)
                    } else {
                        format!("{} {} matches element type", decl.kind.as_str(), decl.name)
                    };
                    Hit {
                        file: decl.file.clone(),
                        line: decl.line,
                        module: decl.module.clone(),
                        symbol: Some(decl.name.clone()),
                        depth: decl.depth,
                        evidence: Evidence::new(Signal::ClassName, detail),
                    }
                })
            })
            .collect()
    }

    pub fn label_exact(&self, label: &str) -> Vec<Hit> {
        self.literals
            .get(label)
            .into_iter()
            .flatten()
            .map(|literal| Hit {
                file: literal.file.clone(),
                line: literal.line,
                module: literal.module.clone(),
                symbol: literal.enclosing_declaration.as_ref().map(|d| d.name.clone()),
                depth: literal.depth,
                evidence: Evidence::new(Signal::LabelExact, format!("string literal \"{label}\"")),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_of() {
        assert_eq!(family_of("card.0"), Some(("card.", Tail::Digits)));
        assert_eq!(family_of("row_12"), Some(("row_", Tail::Digits)));
        assert_eq!(
            family_of("card.\\(index)"),
            Some(("card.", Tail::Interpolated))
        );
        assert_eq!(family_of("submitButton"), None);
        assert_eq!(family_of("home.header"), None);
        assert_eq!(family_of(".5"), None);
        assert_eq!(family_of("\\(id)"), None);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(type_names("XCUIElementTypeButton"), vec!["Button", "UIButton"]);
        assert_eq!(type_names("UIButton"), vec!["UIButton", "Button"]);
        assert_eq!(type_names("AXButton"), vec!["Button", "UIButton"]);
        assert_eq!(type_names("UILabel"), vec!["UILabel", "Label"]);
        assert!(type_names("").is_empty());
    }

    #[test]
    fn test_conformance_name() {
        assert_eq!(conformance_name(" UIViewController"), "UIViewController");
        assert_eq!(conformance_name("Collection<Int>"), "Collection");
        assert_eq!(conformance_name("SwiftUI.View"), "View");
    }
}
