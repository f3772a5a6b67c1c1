//! Lexical [`ReferenceGraph`] over C#-style source files.
//!
//! No type checking happens here. A file belongs to the program unit of the
//! nearest enclosing directory holding a `*.csproj`; the loader type is
//! matched by namespace and class name; call sites are `Type.Method(` tokens.
//! Good enough for a CLI and for tests, not a compiler.

use async_trait::async_trait;
use regex::Regex;
use sqlnav_api::{
    ArgumentExpr, CallSite, DocumentContext, GraphError, GraphResult, MethodQuery, MethodSymbol,
    Range, ReferenceGraph, ReferenceLocation, Span, SymbolRef, UnitId,
};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::index::scanner::ARTIFACT_DIRS;

const PROJECT_EXTENSION: &str = "csproj";

static NAMESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*namespace\s+([A-Za-z_][\w.]*)").expect("valid regex"));

static USING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:global\s+)?using\s+(?:static\s+)?([A-Za-z_][\w.]*)\s*;")
        .expect("valid regex")
});

/// Method, constructor or local function head, up to its opening parenthesis.
/// Group 1 is the return type, group 2 the name.
static MEMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)(?:^|[;{}])[ \t]*(?:(?:public|private|protected|internal|static|async|virtual|override|sealed|abstract|partial|unsafe|extern|new|readonly)\s+)*(?:([\w<>\[\],.?]+(?:\s*<[^>]*>)?)\s+)?([A-Za-z_]\w*)\s*(?:<[^<>()]*>)?\s*\(",
    )
    .expect("valid regex")
});

static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:class|struct|record|interface)\s+([A-Za-z_]\w*)").expect("valid regex")
});

/// Words that open a statement, never a member declaration.
const STATEMENT_WORDS: &[&str] = &[
    "if", "else", "while", "for", "foreach", "switch", "catch", "using", "lock", "fixed",
    "return", "await", "throw", "yield", "case", "nameof", "typeof", "sizeof", "default",
    "checked", "unchecked", "when",
];

/// Byte range, end exclusive.
type Extent = (usize, usize);

fn within(extent: Extent, offset: usize) -> bool {
    extent.0 <= offset && offset < extent.1
}

/// A member with a body: method, constructor or local function.
struct Member {
    name: String,
    /// Between the parentheses.
    params: Extent,
    /// Block from `{` to `}`, or expression body from `=>` to `;`.
    body: Extent,
}

struct TypeDecl {
    name: String,
    body: Extent,
}

struct SourceFile {
    path: PathBuf,
    unit: UnitId,
    text: String,
    line_starts: Vec<usize>,
    /// Comments and string or char literals, in order.
    literals: Vec<Extent>,
    members: Vec<Member>,
    types: Vec<TypeDecl>,
}

impl SourceFile {
    fn new(path: PathBuf, unit: UnitId, text: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        let literals = literal_extents(&text);
        let mut file = Self {
            path,
            unit,
            text,
            line_starts,
            literals,
            members: Vec::new(),
            types: Vec::new(),
        };
        file.members = file.scan_members();
        file.types = file.scan_types();
        file
    }

    /// Zero-based (line, column) of a byte offset; columns count chars.
    fn position(&self, offset: usize) -> (usize, usize) {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let start = self.line_starts[line];
        let col = self.text.get(start..offset).map_or(0, |s| s.chars().count());
        (line, col)
    }

    fn range(&self, span: Span) -> Range {
        let (start_line, start_col) = self.position(span.start);
        let (end_line, end_col) = self.position(span.end);
        Range {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Whether `offset` is outside every comment and literal.
    fn is_code(&self, offset: usize) -> bool {
        let i = self.literals.partition_point(|&(start, _)| start <= offset);
        i == 0 || self.literals[i - 1].1 <= offset
    }

    /// First code byte at or after `from` accepted by `pred`.
    fn find_code(&self, from: usize, pred: impl Fn(u8) -> bool) -> Option<usize> {
        let bytes = self.text.as_bytes();
        (from..bytes.len()).find(|&i| pred(bytes[i]) && self.is_code(i))
    }

    /// Offset of the bracket closing the `(` or `{` at `open`.
    fn closing(&self, open: usize) -> Option<usize> {
        let bytes = self.text.as_bytes();
        let (opening, closing) = match bytes.get(open)? {
            b'(' => (b'(', b')'),
            b'{' => (b'{', b'}'),
            _ => return None,
        };
        let mut depth = 0usize;
        for (i, &b) in bytes.iter().enumerate().skip(open) {
            if (b != opening && b != closing) || !self.is_code(i) {
                continue;
            }
            if b == opening {
                depth += 1;
            } else {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
        }
        None
    }

    fn skip_whitespace(&self, from: usize) -> usize {
        let rest = &self.text[from..];
        from + (rest.len() - rest.trim_start().len())
    }

    fn scan_members(&self) -> Vec<Member> {
        let statement = |word: &str| STATEMENT_WORDS.contains(&word);
        let mut members = Vec::new();
        for captures in MEMBER_RE.captures_iter(&self.text) {
            let (Some(head), Some(name)) = (captures.get(0), captures.get(2)) else {
                continue;
            };
            if !self.is_code(name.start())
                || statement(name.as_str())
                || captures.get(1).is_some_and(|t| statement(t.as_str()))
            {
                continue;
            }
            let open = head.end() - 1;
            let Some(close) = self.closing(open) else {
                continue;
            };
            // A call statement ends here; only declarations carry a body
            let Some(body) = self.body_after(close + 1) else {
                continue;
            };
            members.push(Member {
                name: name.as_str().to_string(),
                params: (open + 1, close),
                body,
            });
        }
        members
    }

    fn body_after(&self, from: usize) -> Option<Extent> {
        let at = self.skip_whitespace(from);
        let rest = &self.text[at..];
        if rest.starts_with("=>") {
            return Some((at, self.find_code(at, |b| b == b';')?));
        }
        // Constraints and constructor initializers come before the block
        if !(rest.starts_with('{') || rest.starts_with(':') || rest.starts_with("where")) {
            return None;
        }
        let open = self.find_code(at, |b| b == b'{' || b == b';')?;
        if self.text.as_bytes()[open] != b'{' {
            return None;
        }
        Some((open, self.closing(open)?))
    }

    fn scan_types(&self) -> Vec<TypeDecl> {
        TYPE_RE
            .captures_iter(&self.text)
            .filter_map(|captures| {
                let name = captures.get(1)?;
                if !self.is_code(name.start()) {
                    return None;
                }
                let open = self.find_code(name.end(), |b| b == b'{' || b == b';')?;
                if self.text.as_bytes()[open] != b'{' {
                    return None;
                }
                Some(TypeDecl {
                    name: name.as_str().to_string(),
                    body: (open, self.closing(open)?),
                })
            })
            .collect()
    }

    /// Innermost member whose body holds `offset`.
    fn enclosing_member(&self, offset: usize) -> Option<&Member> {
        self.members
            .iter()
            .filter(|m| within(m.body, offset))
            .max_by_key(|m| m.body.0)
    }

    fn enclosing_type(&self, offset: usize) -> Option<&TypeDecl> {
        self.types
            .iter()
            .filter(|t| within(t.body, offset))
            .max_by_key(|t| t.body.0)
    }

    /// Matches of `decl_re` inside `extent` as (start, end), leaving out
    /// comments, literals and `==` comparisons.
    fn declarations<'a>(
        &'a self,
        decl_re: &'a Regex,
        extent: Extent,
    ) -> impl Iterator<Item = Extent> + 'a {
        decl_re
            .find_iter(&self.text[extent.0..extent.1])
            .map(move |m| (extent.0 + m.start(), extent.0 + m.end()))
            .filter(move |&(start, end)| self.is_code(start) && !self.text[end..].starts_with('='))
    }

    fn initializer(&self, end: usize) -> Option<ArgumentExpr> {
        parse_expression(&self.text, end, &self.path)
    }

    /// Initializer of a field or constant declared directly in `ty`.
    fn field_initializer(&self, decl_re: &Regex, ty: &TypeDecl) -> Option<ArgumentExpr> {
        let (_, end) = self.declarations(decl_re, ty.body).find(|&(start, _)| {
            self.enclosing_member(start).is_none()
                && self.enclosing_type(start).is_some_and(|t| t.body == ty.body)
        })?;
        self.initializer(end)
    }

    /// Bind a name used in this file the way C# scoping would: a parameter
    /// of the enclosing member, then a local declared earlier in its body,
    /// then a field of the enclosing type. `this.` skips straight to fields.
    fn scoped_initializer(&self, decl_re: &Regex, symbol: &SymbolRef) -> Option<ArgumentExpr> {
        if symbol.qualifier.is_none() {
            if let Some(member) = self.enclosing_member(symbol.offset) {
                let params = &self.text[member.params.0..member.params.1];
                if declares_parameter(params, &symbol.name) {
                    return None;
                }
                let local = self
                    .declarations(decl_re, (member.body.0, symbol.offset))
                    .last();
                if let Some((_, end)) = local {
                    return self.initializer(end);
                }
            }
        }
        self.field_initializer(decl_re, self.enclosing_type(symbol.offset)?)
    }

    fn namespaces(&self) -> impl Iterator<Item = &str> {
        NAMESPACE_RE
            .captures_iter(&self.text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
    }

    fn usings(&self) -> impl Iterator<Item = &str> {
        USING_RE
            .captures_iter(&self.text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

pub struct SourceGraph {
    root: PathBuf,
    extension: String,
    /// Loaded by `units()`, which starts every pass.
    files: RwLock<Arc<Vec<SourceFile>>>,
}

impl SourceGraph {
    pub fn new(root: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
            files: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-read every source file under the root.
    pub async fn reload(&self) -> GraphResult<usize> {
        let root = self.root.clone();
        let extension = self.extension.clone();
        let files = tokio::task::spawn_blocking(move || load_sources(&root, &extension))
            .await
            .map_err(|e| GraphError::Unavailable(e.to_string()))??;

        let count = files.len();
        *self.files.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(files);
        debug!("Loaded {} source files under {}", count, self.root.display());
        Ok(count)
    }

    fn files(&self) -> Arc<Vec<SourceFile>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ReferenceGraph for SourceGraph {
    async fn units(&self) -> GraphResult<Vec<UnitId>> {
        self.reload().await?;
        let units: BTreeSet<UnitId> = self.files().iter().map(|f| f.unit.clone()).collect();
        Ok(units.into_iter().collect())
    }

    async fn find_method(
        &self,
        unit: &UnitId,
        query: &MethodQuery,
    ) -> GraphResult<Option<MethodSymbol>> {
        let files = self.files();
        let (namespace, short) = split_type_name(&query.type_name);

        let Some(declaring) = files
            .iter()
            .find(|f| declares_method(f, namespace, short, &query.method_name))
        else {
            return Ok(None);
        };

        // The declaring unit sees it; others need a using, the same
        // namespace, or a fully qualified mention.
        let visible = files.iter().filter(|f| &f.unit == unit).any(|f| {
            f.path == declaring.path
                || f.usings().any(|u| u == namespace)
                || f.namespaces().any(|n| n == namespace || n.starts_with(&format!("{namespace}.")))
                || f.text.contains(&query.type_name)
        });

        Ok(visible.then(|| MethodSymbol {
            type_name: query.type_name.clone(),
            method_name: query.method_name.clone(),
            declared_in: Some(declaring.path.clone()),
        }))
    }

    async fn find_call_sites(&self, method: &MethodSymbol) -> GraphResult<Vec<CallSite>> {
        let (_, short) = split_type_name(&method.type_name);
        let pattern = format!(
            r"\b{}\s*\.\s*({})\s*\(",
            regex::escape(short),
            regex::escape(&method.method_name)
        );
        let call_re = Regex::new(&pattern).map_err(|e| GraphError::Analysis {
            unit: method.type_name.clone(),
            message: e.to_string(),
        })?;

        let mut sites = Vec::new();
        for file in self.files().iter() {
            for captures in call_re.captures_iter(&file.text) {
                let (Some(call), Some(name)) = (captures.get(0), captures.get(1)) else {
                    continue;
                };
                if !file.is_code(call.start()) {
                    continue;
                }

                let span = Span::new(name.start(), name.end());
                sites.push(CallSite {
                    location: ReferenceLocation {
                        file: file.path.clone(),
                        span,
                        range: file.range(span),
                        context: DocumentContext {
                            unit: file.unit.to_string(),
                            member: file.enclosing_member(call.start()).map(|m| m.name.clone()),
                        },
                    },
                    argument: parse_expression(&file.text, call.end(), &file.path),
                });
            }
        }
        Ok(sites)
    }

    async fn declaration_initializer(
        &self,
        symbol: &SymbolRef,
    ) -> GraphResult<Option<ArgumentExpr>> {
        let pattern = format!(r"\b(?:string|var)\s+{}\s*=", regex::escape(&symbol.name));
        let decl_re = Regex::new(&pattern).map_err(|e| GraphError::Analysis {
            unit: symbol.file.display().to_string(),
            message: e.to_string(),
        })?;

        let files = self.files();
        let initializer = match symbol.qualifier.as_deref() {
            None | Some("this") => files
                .iter()
                .find(|f| f.path == symbol.file)
                .and_then(|f| f.scoped_initializer(&decl_re, symbol)),
            // `Codes.Orders`: a field of the named type, wherever it lives
            Some(qualifier) => {
                let type_name = qualifier.rsplit('.').next().unwrap_or(qualifier);
                files.iter().find_map(|f| {
                    f.types
                        .iter()
                        .filter(|t| t.name == type_name)
                        .find_map(|t| f.field_initializer(&decl_re, t))
                })
            }
        };
        Ok(initializer)
    }
}

fn split_type_name(type_name: &str) -> (&str, &str) {
    type_name.rsplit_once('.').unwrap_or(("", type_name))
}

fn declares_method(file: &SourceFile, namespace: &str, short: &str, method: &str) -> bool {
    if !namespace.is_empty() && !file.namespaces().any(|n| n == namespace) {
        return false;
    }
    let class = format!(r"\bclass\s+{}\b", regex::escape(short));
    let signature = format!(
        r"\b{}\s*\(\s*(?:string|String|System\.String)\s+\w+\s*\)",
        regex::escape(method)
    );
    match (Regex::new(&class), Regex::new(&signature)) {
        (Ok(class), Ok(signature)) => class.is_match(&file.text) && signature.is_match(&file.text),
        _ => false,
    }
}

/// Whether a parameter list such as `string code, int n = 0` declares `name`.
fn declares_parameter(params: &str, name: &str) -> bool {
    params.split(',').any(|param| {
        let declared = param.split('=').next().unwrap_or(param).trim();
        declared.contains(char::is_whitespace)
            && declared.rsplit(char::is_whitespace).next() == Some(name)
    })
}

/// Extents of comments and of string and char literals. Interpolation holes
/// count as part of their string.
fn literal_extents(text: &str) -> Vec<Extent> {
    let bytes = text.as_bytes();
    let mut extents = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        i = match (bytes[i], bytes.get(i + 1)) {
            (b'/', Some(b'/')) => text[i..].find('\n').map_or(bytes.len(), |n| i + n),
            (b'/', Some(b'*')) => text[i + 2..].find("*/").map_or(bytes.len(), |n| i + n + 4),
            (b'"', _) => {
                let verbatim = bytes[..i].ends_with(b"@") || bytes[..i].ends_with(b"@$");
                literal_end(bytes, i + 1, b'"', verbatim)
            }
            (b'\'', _) => literal_end(bytes, i + 1, b'\'', false),
            _ => {
                i += 1;
                continue;
            }
        };
        extents.push((start, i));
    }
    extents
}

/// Offset just past the quote closing a literal whose body starts at `i`.
/// Regular literals also end at a line break.
fn literal_end(bytes: &[u8], mut i: usize, quote: u8, verbatim: bool) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b if b == quote && verbatim && bytes.get(i + 1) == Some(&quote) => i += 2,
            b if b == quote => return i + 1,
            b'\\' if !verbatim => i += 2,
            b'\n' if !verbatim => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Classify the expression starting at `at` (after skipping whitespace).
/// `None` when there is no expression, as in `Load()`.
fn parse_expression(text: &str, at: usize, file: &Path) -> Option<ArgumentExpr> {
    let start = at + (text[at..].len() - text[at..].trim_start().len());
    let rest = &text[start..];
    let first = rest.chars().next()?;

    let (expr, consumed) = match first {
        ')' | ';' | ',' => return None,
        '"' => match parse_string(&rest[1..], false) {
            Some((value, len)) => (ArgumentExpr::StringLiteral(value), len + 1),
            None => return Some(ArgumentExpr::Other),
        },
        '@' if rest[1..].starts_with('"') => match parse_string(&rest[2..], true) {
            Some((value, len)) => (ArgumentExpr::StringLiteral(value), len + 2),
            None => return Some(ArgumentExpr::Other),
        },
        c if c == '_' || c.is_alphabetic() => {
            let len = rest
                .find(|c: char| !(c == '_' || c == '.' || c.is_alphanumeric()))
                .unwrap_or(rest.len());
            let path = rest[..len].trim_end_matches('.');
            let name = path.rsplit('.').next().unwrap_or(path);
            let offset = start + path.len() - name.len();
            let qualifier = path[..path.len() - name.len()].trim_end_matches('.');
            let symbol = SymbolRef {
                name: name.to_string(),
                qualifier: (!qualifier.is_empty()).then(|| qualifier.to_string()),
                file: file.to_path_buf(),
                offset,
            };
            (ArgumentExpr::Symbol(symbol), len)
        }
        _ => return Some(ArgumentExpr::Other),
    };

    // Anything but the end of the expression (`+ x`, `(...)`, `.Trim()`) makes
    // it a runtime value
    match rest[consumed..].trim_start().chars().next() {
        Some(')' | ',' | ';') | None => Some(expr),
        _ => Some(ArgumentExpr::Other),
    }
}

/// Parse a string body up to its closing quote. Returns the value and the
/// byte length consumed including the closing quote.
fn parse_string(body: &str, verbatim: bool) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' if verbatim && matches!(chars.peek(), Some((_, '"'))) => {
                chars.next();
                value.push('"');
            }
            '"' => return Some((value, i + 1)),
            '\\' if !verbatim => {
                let (_, escaped) = chars.next()?;
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            '\n' if !verbatim => return None,
            other => value.push(other),
        }
    }
    None
}

fn load_sources(root: &Path, extension: &str) -> GraphResult<Vec<SourceFile>> {
    if !std::fs::metadata(root)?.is_dir() {
        return Err(GraphError::Unavailable(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut projects: HashMap<PathBuf, String> = HashMap::new();
    let mut sources = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !entry.file_type().is_dir()
            || entry
                .file_name()
                .to_str()
                .is_none_or(|name| !ARTIFACT_DIRS.iter().any(|a| a.eq_ignore_ascii_case(name)))
    });
    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if ext.eq_ignore_ascii_case(PROJECT_EXTENSION) {
            if let (Some(dir), Some(stem)) = (path.parent(), path.file_stem()) {
                projects.insert(dir.to_path_buf(), stem.to_string_lossy().into_owned());
            }
        } else if ext.eq_ignore_ascii_case(extension) {
            sources.push(path);
        }
    }

    let root_unit = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());

    let mut files = Vec::with_capacity(sources.len());
    for path in sources {
        let unit = path
            .ancestors()
            .skip(1)
            .take_while(|dir| dir.starts_with(root))
            .find_map(|dir| projects.get(dir))
            .cloned()
            .unwrap_or_else(|| root_unit.clone());
        match std::fs::read_to_string(&path) {
            Ok(text) => files.push(SourceFile::new(path, UnitId(unit), text)),
            Err(e) => warn!("Skipping unreadable {}: {}", path.display(), e),
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(text: &str) -> Option<ArgumentExpr> {
        parse_expression(text, 0, Path::new("/src/A.cs"))
    }

    fn symbol(name: &str, qualifier: Option<&str>, offset: usize) -> Option<ArgumentExpr> {
        Some(ArgumentExpr::Symbol(SymbolRef {
            name: name.to_string(),
            qualifier: qualifier.map(str::to_string),
            file: PathBuf::from("/src/A.cs"),
            offset,
        }))
    }

    fn source(text: &str) -> SourceFile {
        SourceFile::new(
            PathBuf::from("/src/A.cs"),
            UnitId("App".into()),
            text.to_string(),
        )
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(
            expr(r#" "orders.get")"#),
            Some(ArgumentExpr::StringLiteral("orders.get".into()))
        );
        assert_eq!(
            expr(r#"@"a""b");"#),
            Some(ArgumentExpr::StringLiteral("a\"b".into()))
        );
        assert_eq!(
            expr(r#""a\"b", 1)"#),
            Some(ArgumentExpr::StringLiteral("a\"b".into()))
        );
    }

    #[test]
    fn test_parse_symbols() {
        assert_eq!(expr("Code)"), symbol("Code", None, 0));
        assert_eq!(expr("Codes.Orders)"), symbol("Orders", Some("Codes"), 6));
        assert_eq!(expr("My.Codes.Orders)"), symbol("Orders", Some("My.Codes"), 9));
        assert_eq!(expr("this.code)"), symbol("code", Some("this"), 5));
        assert_eq!(expr("  name ;"), symbol("name", None, 2));
    }

    #[test]
    fn test_parse_runtime_values() {
        assert_eq!(expr(r#""a" + b)"#), Some(ArgumentExpr::Other));
        assert_eq!(expr("GetCode())"), Some(ArgumentExpr::Other));
        assert_eq!(expr(r#"$"x{y}")"#), Some(ArgumentExpr::Other));
        assert_eq!(expr(")"), None);
    }

    #[test]
    fn test_position() {
        let file = source("ab\ncdé\nf");
        assert_eq!(file.position(0), (0, 0));
        assert_eq!(file.position(3), (1, 0));
        assert_eq!(file.position(7), (1, 3));
        assert_eq!(file.position(8), (2, 0));
    }

    #[test]
    fn test_comments_and_literals_are_not_code() {
        let file = source(
            "var u = \"http://x\"; Load(u); // Load(a)\n/* Load(b)\n*/ var c = '\"'; var p = @\"C:\\\"; Load(c);",
        );
        let code_at = |needle: &str| file.is_code(file.text.find(needle).unwrap());
        assert!(code_at("Load(u)"));
        assert!(!code_at("http"));
        assert!(!code_at("Load(a)"));
        assert!(!code_at("Load(b)"));
        assert!(!code_at("C:"));
        assert!(code_at("Load(c)"));
    }

    #[test]
    fn test_enclosing_member() {
        let file = source(
            "class A {\n    public string Get(int id)\n    {\n        if (id > 0) { return X; }\n        return Y;\n    }\n    string Short(string code) => Load(code);\n}\n",
        );
        let name_at = |needle: &str| {
            file.enclosing_member(file.text.find(needle).unwrap())
                .map(|m| m.name.clone())
        };
        assert_eq!(name_at("return X"), Some("Get".to_string()));
        assert_eq!(name_at("return Y"), Some("Get".to_string()));
        assert_eq!(name_at("Load(code)"), Some("Short".to_string()));
        assert_eq!(name_at("class"), None);

        let ty = file.enclosing_type(file.text.find("return Y").unwrap()).unwrap();
        assert_eq!(ty.name, "A");
    }

    #[test]
    fn test_declares_parameter() {
        assert!(declares_parameter("string code", "code"));
        assert!(declares_parameter("int n, string code = null", "code"));
        assert!(declares_parameter("Dictionary<string, int> map, string code", "code"));
        assert!(!declares_parameter("string codes", "code"));
        assert!(!declares_parameter("", "code"));
    }
}
