//! Editor-facing features on top of the path index and the reference
//! analyzer. Everything here works on one line of text and a caret column;
//! columns count chars, not bytes.

pub mod completion;
pub mod navigation;

use crate::config::{DEFAULT_LOADER_METHOD, LOADER_TYPE_NAME};
use crate::error::{Result, SqlNavError};
use regex::Regex;
use sqlnav_api::MethodQuery;
use std::sync::LazyLock;

static DEFAULT_SYNTAX: LazyLock<LoaderSyntax> = LazyLock::new(|| {
    LoaderSyntax::new(LOADER_TYPE_NAME, DEFAULT_LOADER_METHOD).expect("valid regex")
});

/// How a loader call is spelled in source: `SqlLoader.Load("orders.get")`.
#[derive(Debug, Clone)]
pub struct LoaderSyntax {
    trigger: String,
    call: Regex,
}

impl LoaderSyntax {
    pub fn new(type_name: &str, method_name: &str) -> Result<Self> {
        let short = type_name.rsplit('.').next().unwrap_or(type_name);
        let call = Regex::new(&format!(
            r#"{}\.{}\(\s*"([^"]+)"\s*\)"#,
            regex::escape(short),
            regex::escape(method_name)
        ))
        .map_err(|e| SqlNavError::Config(format!("loader {type_name}.{method_name}: {e}")))?;
        Ok(Self {
            trigger: format!("{short}.{method_name}(\""),
            call,
        })
    }

    pub fn for_query(query: &MethodQuery) -> Result<Self> {
        Self::new(&query.type_name, &query.method_name)
    }

    /// Text that opens a code argument, up to and including the quote.
    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// Complete calls with a quoted literal; group 1 is the code.
    pub fn call_pattern(&self) -> &Regex {
        &self.call
    }
}

impl Default for LoaderSyntax {
    fn default() -> Self {
        DEFAULT_SYNTAX.clone()
    }
}

/// Byte offset of char column `col`, clamped to the end of `line`.
pub(crate) fn byte_offset(line: &str, col: usize) -> usize {
    line.char_indices()
        .nth(col)
        .map_or(line.len(), |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_from_query() {
        let syntax = LoaderSyntax::for_query(&MethodQuery::new("My.Data.SqlLoader", "Load")).unwrap();
        assert_eq!(syntax.trigger(), "SqlLoader.Load(\"");
        assert!(syntax.call_pattern().is_match(r#"SqlLoader.Load( "orders.get" )"#));
    }

    #[test]
    fn test_oversized_names_are_a_config_error() {
        let huge = "A".repeat(20_000_000);
        assert!(matches!(
            LoaderSyntax::new(&huge, "Load"),
            Err(SqlNavError::Config(_))
        ));
    }

    #[test]
    fn test_byte_offset() {
        assert_eq!(byte_offset("héllo", 2), 3);
        assert_eq!(byte_offset("abc", 10), 3);
    }
}
