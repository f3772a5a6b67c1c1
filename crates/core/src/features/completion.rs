use super::{LoaderSyntax, byte_offset};
use crate::index::PathIndex;
use sqlnav_api::Code;

/// Text typed between the last loader trigger before the caret and the caret.
///
/// `None` when no trigger precedes the caret or the string was already
/// closed. Empty when the caret sits right after the opening quote.
pub fn completion_prefix<'a>(syntax: &LoaderSyntax, line: &'a str, caret: usize) -> Option<&'a str> {
    let before = &line[..byte_offset(line, caret)];
    let trigger = before.rfind(syntax.trigger())?;
    let prefix = &before[trigger + syntax.trigger().len()..];
    (!prefix.contains('"')).then_some(prefix)
}

/// Codes offered at the caret, sorted.
pub fn complete(index: &PathIndex, syntax: &LoaderSyntax, line: &str, caret: usize) -> Vec<Code> {
    let Some(prefix) = completion_prefix(syntax, line, caret) else {
        return Vec::new();
    };
    let mut codes: Vec<Code> = index.prefix_search(prefix).iter().cloned().collect();
    codes.sort();
    codes
}
