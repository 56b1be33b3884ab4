//! Line-oriented Swift recognizer.
//!
//! A forward-scanning state machine over source lines: it strips comments and
//! string literals, counts braces, and keeps a stack of open declarations so
//! nested entries can point back at their owner. It recognizes declaration
//! headers, identifier assignments and label-like literals. It does not parse
//! Swift.
use std::sync::LazyLock;

use regex::Regex;

use super::model::{
    DeclRef, DeclarationKind, IdentifierOccurrence, SourceDeclaration, StringLiteral, TypeKind,
};

static TYPE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:@[\w.]+(?:\([^)]*\))?\s+)*(?:(?:public|private|fileprivate|internal|open|package|final|indirect|nonisolated|distributed|static|override|required|dynamic|mutating|nonmutating|async)(?:\([^)]*\))?\s+)*(class|struct|enum|protocol|actor)\s+([A-Za-z_][A-Za-z0-9_]*)",
    )
    .unwrap()
});

static EXTENSION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:@[\w.]+(?:\([^)]*\))?\s+)*(?:(?:public|private|fileprivate|internal|package|nonisolated)\s+)*extension\s+([A-Za-z_][A-Za-z0-9_.]*)",
    )
    .unwrap()
});

static ASSOCIATED_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*associatedtype\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());

// Literals are replaced by `"<index>"` placeholders before these run.
static IDENTIFIER_ASSIGNMENTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r#"\baccessibilityIdentifier\s*(?:=|\()\s*"(\d+)""#).unwrap(),
        Regex::new(r#"\baccessibility\(\s*identifier\s*:\s*"(\d+)""#).unwrap(),
    ]
});

static DOTTED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+(?:\.[A-Za-z0-9_-]+)+$").unwrap());

/// Words that can follow `class` or `struct`-like keywords without naming a type.
const NOT_A_TYPE_NAME: &[&str] = &[
    "func", "var", "let", "init", "deinit", "subscript", "case", "typealias", "override", "static",
    "final", "private", "public", "internal", "fileprivate", "open", "convenience", "required",
];

const MAX_LABEL_CHARS: usize = 120;

/// Everything recognized in a single file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FileScan {
    pub declarations: Vec<SourceDeclaration>,
    pub identifiers: Vec<IdentifierOccurrence>,
    pub literals: Vec<StringLiteral>,
}

#[derive(Debug, Default)]
struct LexState {
    block_comment: usize,
    multiline_string: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct Literal {
    text: String,
    interpolated: bool,
}

#[derive(Debug)]
struct LexedLine {
    code: String,
    literals: Vec<Literal>,
}

#[derive(Debug)]
struct OpenDecl {
    decl: DeclRef,
    is_protocol: bool,
    /// Brace depth just outside the body; `None` until the body's `{` is seen.
    open_depth: Option<usize>,
}

/// Scan one Swift file.
///
/// `module` and `file` are stamped on every entry; `file` should already be
/// root-relative with `/` separators.
pub fn scan_source(source: &str, module: &str, file: &str) -> FileScan {
    let mut scan = FileScan::default();
    let mut lex = LexState::default();
    let mut stack: Vec<OpenDecl> = Vec::new();
    let mut brace_depth = 0usize;

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let lexed = lex_line(raw_line, &mut lex);
        let code = lexed.code.as_str();

        let opened: Vec<&OpenDecl> = stack.iter().filter(|d| d.open_depth.is_some()).collect();
        let mut depth = opened.len();
        let mut enclosing = opened.last().map(|d| d.decl.clone());

        if let Some(decl) = recognize_declaration(code, module, file, line_no, depth, &enclosing) {
            enclosing = Some(decl.to_ref());
            stack.push(OpenDecl {
                decl: decl.to_ref(),
                is_protocol: decl.kind.is_protocol(),
                open_depth: None,
            });
            scan.declarations.push(decl);
            // Occurrences later on this line sit inside the new declaration.
            depth += 1;
        } else if let Some(caps) = ASSOCIATED_TYPE.captures(code) {
            let owner = stack
                .iter()
                .rev()
                .find(|d| d.is_protocol && d.open_depth.is_some());
            if let Some(owner) = owner {
                scan.declarations.push(SourceDeclaration {
                    kind: DeclarationKind::AssociatedType,
                    name: caps[1].to_string(),
                    module: module.to_string(),
                    file: file.to_string(),
                    line: line_no,
                    conformances: Vec::new(),
                    where_clause: None,
                    enclosing_type: Some(owner.decl.clone()),
                    depth,
                });
            }
        }

        let mut identifier_literals = Vec::new();
        for pattern in IDENTIFIER_ASSIGNMENTS.iter() {
            for caps in pattern.captures_iter(code) {
                let Ok(index) = caps[1].parse::<usize>() else {
                    continue;
                };
                let Some(literal) = lexed.literals.get(index) else {
                    continue;
                };
                if literal.text.is_empty() || identifier_literals.contains(&index) {
                    continue;
                }
                identifier_literals.push(index);
                scan.identifiers.push(IdentifierOccurrence {
                    identifier: literal.text.clone(),
                    module: module.to_string(),
                    file: file.to_string(),
                    line: line_no,
                    enclosing_declaration: enclosing.clone(),
                    depth,
                });
            }
        }

        for (index, literal) in lexed.literals.iter().enumerate() {
            if identifier_literals.contains(&index) || !is_label_like(literal) {
                continue;
            }
            scan.literals.push(StringLiteral {
                text: literal.text.clone(),
                module: module.to_string(),
                file: file.to_string(),
                line: line_no,
                enclosing_declaration: enclosing.clone(),
                depth,
            });
        }

        for ch in code.chars() {
            match ch {
                '{' => {
                    if let Some(top) = stack.last_mut() {
                        if top.open_depth.is_none() {
                            top.open_depth = Some(brace_depth);
                        }
                    }
                    brace_depth += 1;
                }
                '}' => {
                    brace_depth = brace_depth.saturating_sub(1);
                    while let Some(top) = stack.last() {
                        match top.open_depth {
                            Some(open) if brace_depth > open => break,
                            // A `}` before the header's own `{` means the header never opened.
                            _ => {
                                stack.pop();
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    scan
}

fn recognize_declaration(
    code: &str,
    module: &str,
    file: &str,
    line: usize,
    depth: usize,
    enclosing: &Option<DeclRef>,
) -> Option<SourceDeclaration> {
    let (kind, name, tail) = if let Some(caps) = TYPE_DECL.captures(code) {
        let name = caps.get(2)?;
        if NOT_A_TYPE_NAME.contains(&name.as_str()) {
            return None;
        }
        let kind = TypeKind::from_keyword(&caps[1])?;
        (
            DeclarationKind::Type(kind),
            name.as_str(),
            &code[name.end()..],
        )
    } else if let Some(caps) = EXTENSION_DECL.captures(code) {
        let name = caps.get(1)?;
        (
            DeclarationKind::Extension,
            name.as_str().trim_end_matches('.'),
            &code[name.end()..],
        )
    } else {
        return None;
    };

    let (conformances, where_clause) = split_header_tail(tail);
    Some(SourceDeclaration {
        kind,
        name: name.to_string(),
        module: module.to_string(),
        file: file.to_string(),
        line,
        conformances,
        where_clause,
        enclosing_type: enclosing.clone(),
        depth,
    })
}

/// Split what follows a declaration name into its inheritance/conformance
/// list and `where` clause. Generic parameters are skipped.
fn split_header_tail(tail: &str) -> (Vec<String>, Option<String>) {
    let mut rest = tail.trim_start();
    if rest.starts_with('<') {
        let mut depth = 0usize;
        let mut end = rest.len();
        for (i, ch) in rest.char_indices() {
            match ch {
                '<' => depth += 1,
                '>' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        end = i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        rest = rest[end..].trim_start();
    }
    if let Some(idx) = rest.find('{') {
        rest = &rest[..idx];
    }

    let (head, where_clause) = match find_keyword(rest, "where") {
        Some(idx) => {
            let clause = rest[idx + "where".len()..].trim();
            let clause = (!clause.is_empty()).then(|| clause.to_string());
            (&rest[..idx], clause)
        }
        None => (rest, None),
    };

    let conformances = match head.trim().strip_prefix(':') {
        Some(list) => split_top_level(list),
        None => Vec::new(),
    };
    (conformances, where_clause)
}

fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    text.match_indices(keyword).map(|(i, _)| i).find(|&i| {
        let before = i == 0 || !is_ident_byte(bytes[i - 1]);
        let after = bytes
            .get(i + keyword.len())
            .is_none_or(|b| !is_ident_byte(*b));
        before && after
    })
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn split_top_level(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in list.chars() {
        match ch {
            '<' | '(' | '[' => {
                depth += 1;
                current.push(ch);
            }
            '>' | ')' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn is_label_like(literal: &Literal) -> bool {
    let text = literal.text.trim();
    if literal.interpolated || text.is_empty() || text.contains('\\') {
        return false;
    }
    if text.chars().count() > MAX_LABEL_CHARS || !text.chars().any(char::is_alphabetic) {
        return false;
    }
    if text.contains("://") || text.starts_with('/') || text.contains('%') {
        return false;
    }
    !DOTTED_KEY.is_match(text)
}

// ── Lexing ───────────────────────────────────────────────────────────

fn lex_line(line: &str, state: &mut LexState) -> LexedLine {
    let chars: Vec<char> = line.chars().collect();
    let mut code = String::with_capacity(line.len());
    let mut literals = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if state.multiline_string {
            if starts_with(&chars, i, "\"\"\"") {
                state.multiline_string = false;
                i += 3;
            } else {
                i += 1;
            }
            continue;
        }
        if state.block_comment > 0 {
            if starts_with(&chars, i, "*/") {
                state.block_comment -= 1;
                i += 2;
            } else if starts_with(&chars, i, "/*") {
                state.block_comment += 1;
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }

        if starts_with(&chars, i, "//") {
            break;
        }
        if starts_with(&chars, i, "/*") {
            state.block_comment += 1;
            i += 2;
            continue;
        }

        let hashes = chars[i..].iter().take_while(|&&c| c == '#').count();
        let quote_at = i + hashes;
        if chars.get(quote_at) == Some(&'"') {
            if starts_with(&chars, quote_at, "\"\"\"") {
                state.multiline_string = true;
                code.push_str("\"\"");
                i = quote_at + 3;
                continue;
            }
            let (literal, end) = if hashes > 0 {
                read_raw_string(&chars, quote_at + 1, hashes)
            } else {
                read_string(&chars, quote_at + 1)
            };
            code.push('"');
            code.push_str(&literals.len().to_string());
            code.push('"');
            literals.push(literal);
            i = end;
            continue;
        }

        code.push(chars[i]);
        i += 1;
    }

    LexedLine { code, literals }
}

fn starts_with(chars: &[char], at: usize, pattern: &str) -> bool {
    let mut idx = at;
    for p in pattern.chars() {
        if chars.get(idx) != Some(&p) {
            return false;
        }
        idx += 1;
    }
    true
}

/// Read a `"..."` literal whose opening quote precedes `start`.
/// Returns the raw contents (escapes and interpolations kept verbatim) and
/// the index just past the closing quote.
fn read_string(chars: &[char], start: usize) -> (Literal, usize) {
    let mut text = String::new();
    let mut interpolated = false;
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            if chars.get(i + 1) == Some(&'(') {
                interpolated = true;
                text.push_str("\\(");
                i += 2;
                let mut depth = 1usize;
                while i < chars.len() && depth > 0 {
                    match chars[i] {
                        '"' => {
                            let (inner, end) = read_string(chars, i + 1);
                            text.push('"');
                            text.push_str(&inner.text);
                            text.push('"');
                            i = end;
                            continue;
                        }
                        '(' => depth += 1,
                        ')' => depth -= 1,
                        _ => {}
                    }
                    text.push(chars[i]);
                    i += 1;
                }
                continue;
            }
            text.push(c);
            if let Some(next) = chars.get(i + 1) {
                text.push(*next);
            }
            i += 2;
            continue;
        }
        if c == '"' {
            return (Literal { text, interpolated }, i + 1);
        }
        text.push(c);
        i += 1;
    }

    (Literal { text, interpolated }, chars.len())
}

fn read_raw_string(chars: &[char], start: usize, hashes: usize) -> (Literal, usize) {
    let closing: String = std::iter::once('"')
        .chain(std::iter::repeat_n('#', hashes))
        .collect();
    let interpolation: String = std::iter::once('\\')
        .chain(std::iter::repeat_n('#', hashes))
        .chain(std::iter::once('('))
        .collect();

    let mut i = start;
    while i < chars.len() {
        if starts_with(chars, i, &closing) {
            let text: String = chars[start..i].iter().collect();
            let interpolated = text.contains(&interpolation);
            return (Literal { text, interpolated }, i + closing.chars().count());
        }
        i += 1;
    }
    let text: String = chars[start..].iter().collect();
    let interpolated = text.contains(&interpolation);
    (Literal { text, interpolated }, chars.len())
}
