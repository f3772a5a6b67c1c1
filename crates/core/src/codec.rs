//! Path ⇄ code conversion.
//!
//! A code is the path of a resource file relative to the index root, without
//! its extension, with every separator replaced by `.`:
//!
//! ```text
//! <root>/orders/get.sql  <->  orders.get
//! ```
//!
//! Names that contain a literal `.` (`v1.2/get.sql`) produce codes that do not
//! map back to the same path. That is a known limitation of the scheme.

use sqlnav_api::{CODE_SEPARATOR, Code};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

pub const DEFAULT_EXTENSION: &str = "sql";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeCodec {
    root: PathBuf,
    extension: String,
}

impl CodeCodec {
    pub fn new(root: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether `path` carries the tracked extension (case-insensitive).
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }

    /// Derive the code of `path`. `None` when the path is not under the root.
    ///
    /// Directories are accepted too and yield the prefix shared by the codes
    /// beneath them. The root itself yields the empty code.
    pub fn path_to_code(&self, path: &Path) -> Option<Code> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let relative = relative.to_string_lossy();

        let without_ext = match relative.len().checked_sub(self.extension.len() + 1) {
            Some(stem_len)
                if relative.is_char_boundary(stem_len)
                    && relative[stem_len..].starts_with('.')
                    && relative[stem_len + 1..].eq_ignore_ascii_case(&self.extension) =>
            {
                &relative[..stem_len]
            }
            _ => &relative[..],
        };

        let code = without_ext
            .trim_matches(|c| c == '/' || c == '\\')
            .replace(['/', '\\'], ".");
        Some(Code::from(code.trim_matches(CODE_SEPARATOR).to_string()))
    }

    /// Path of the resource file `code` names. `None` for the empty code.
    pub fn code_to_path(&self, code: &Code) -> Option<PathBuf> {
        if code.segments().next().is_none() {
            return None;
        }
        let relative = code
            .segments()
            .collect::<Vec<_>>()
            .join(&MAIN_SEPARATOR.to_string());
        Some(self.root.join(format!("{}.{}", relative, self.extension)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> CodeCodec {
        CodeCodec::new("/proj/sql", "sql")
    }

    #[test]
    fn test_path_to_code() {
        let codec = codec();
        assert_eq!(
            codec.path_to_code(Path::new("/proj/sql/orders/get.sql")),
            Some(Code::new("orders.get"))
        );
        assert_eq!(
            codec.path_to_code(Path::new("/proj/sql/top.SQL")),
            Some(Code::new("top"))
        );
        // Directories give their prefix
        assert_eq!(
            codec.path_to_code(Path::new("/proj/sql/orders/archive")),
            Some(Code::new("orders.archive"))
        );
        assert_eq!(codec.path_to_code(Path::new("/proj/sql")), Some(Code::new("")));
    }

    #[test]
    fn test_path_outside_root() {
        let codec = codec();
        assert_eq!(codec.path_to_code(Path::new("/proj/other/get.sql")), None);
        // Sibling whose name merely starts with the root's name
        assert_eq!(codec.path_to_code(Path::new("/proj/sqlx/get.sql")), None);
    }

    #[test]
    fn test_extension_only_stripped_at_end() {
        let codec = codec();
        assert_eq!(
            codec.path_to_code(Path::new("/proj/sql/sqlite/mysql.sql")),
            Some(Code::new("sqlite.mysql"))
        );
        assert_eq!(
            codec.path_to_code(Path::new("/proj/sql/notes.txt")),
            Some(Code::new("notes.txt"))
        );
    }

    #[test]
    fn test_code_to_path() {
        let codec = codec();
        assert_eq!(
            codec.code_to_path(&Code::new("orders.get")),
            Some(PathBuf::from("/proj/sql").join("orders").join("get.sql"))
        );
        assert_eq!(codec.code_to_path(&Code::new("")), None);
    }

    #[test]
    fn test_round_trip() {
        let codec = codec();
        for rel in ["a.sql", "orders/get.sql", "deep/er/still/list.sql"] {
            let path = Path::new("/proj/sql").join(rel);
            let code = codec.path_to_code(&path).unwrap();
            assert_eq!(codec.code_to_path(&code).unwrap(), path, "round trip of {rel}");
        }
    }

    #[test]
    fn test_literal_dots_are_lossy() {
        let codec = codec();
        let path = Path::new("/proj/sql/v1.2/get.sql");
        let code = codec.path_to_code(path).unwrap();
        assert_eq!(code.as_str(), "v1.2.get");
        assert_ne!(codec.code_to_path(&code).unwrap(), path);
    }

    #[test]
    fn test_matches_extension() {
        let codec = CodeCodec::new("/r", ".sql");
        assert_eq!(codec.extension(), "sql");
        assert!(codec.matches_extension(Path::new("/r/a.sql")));
        assert!(codec.matches_extension(Path::new("/r/a.Sql")));
        assert!(!codec.matches_extension(Path::new("/r/a.sqlx")));
        assert!(!codec.matches_extension(Path::new("/r/orders")));
    }
}
