use super::LoaderSyntax;
use crate::analyzer::COUNT_UNKNOWN;
use crate::index::PathIndex;
use sqlnav_api::Code;
use std::path::PathBuf;

pub const LOADING_SUMMARY: &str = "Loading SQL references...";

/// A quoted code inside a loader call, with its char columns (end exclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAtCaret {
    pub code: Code,
    pub start_col: usize,
    pub end_col: usize,
}

/// The code of the loader call under the caret. A caret right after the
/// last char of the code still counts.
pub fn code_at(syntax: &LoaderSyntax, line: &str, caret: usize) -> Option<CodeAtCaret> {
    let char_col = |byte: usize| line[..byte].chars().count();
    syntax
        .call_pattern()
        .captures_iter(line)
        .filter_map(|c| c.get(1))
        .map(|m| CodeAtCaret {
            code: Code::new(m.as_str()),
            start_col: char_col(m.start()),
            end_col: char_col(m.end()),
        })
        .find(|found| (found.start_col..=found.end_col).contains(&caret))
}

/// Resource file for the loader call under the caret, when it exists on disk.
pub fn resolve_resource(
    index: &PathIndex,
    syntax: &LoaderSyntax,
    line: &str,
    caret: usize,
) -> Option<PathBuf> {
    let found = code_at(syntax, line, caret)?;
    index
        .lookup_path_by_code(&found.code)
        .filter(|path| path.is_file())
}

/// Text shown above a resource file.
pub fn reference_summary(code: &Code, count: i64) -> String {
    if count == COUNT_UNKNOWN {
        return LOADING_SUMMARY.to_string();
    }
    format!("{}: {} references", code, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"var x = SqlLoader.Load( "orders.get" );"#;

    #[test]
    fn test_code_at_inclusive_bounds() {
        let syntax = LoaderSyntax::default();
        let start = LINE.find("orders").unwrap();
        let end = start + "orders.get".len();

        for caret in [start, start + 3, end] {
            let found = code_at(&syntax, LINE, caret).unwrap();
            assert_eq!(found.code, Code::new("orders.get"));
        }
        assert_eq!(code_at(&syntax, LINE, start - 2), None);
        assert_eq!(code_at(&syntax, LINE, end + 2), None);
    }

    #[test]
    fn test_code_at_picks_call_under_caret() {
        let syntax = LoaderSyntax::default();
        let line = r#"f(SqlLoader.Load("a.one"), SqlLoader.Load("b.two"))"#;
        let caret = line.find("b.two").unwrap() + 1;
        assert_eq!(
            code_at(&syntax, line, caret).map(|f| f.code),
            Some(Code::new("b.two"))
        );
    }

    #[test]
    fn test_code_at_ignores_non_literals() {
        let syntax = LoaderSyntax::default();
        assert_eq!(code_at(&syntax, "SqlLoader.Load(code)", 16), None);
    }

    #[test]
    fn test_reference_summary() {
        let code = Code::new("orders.get");
        assert_eq!(reference_summary(&code, -1), LOADING_SUMMARY);
        assert_eq!(reference_summary(&code, 0), "orders.get: 0 references");
        assert_eq!(reference_summary(&code, 3), "orders.get: 3 references");
    }
}
