//! Workspace configuration, read from `.sqlloadercfg.json`.
//!
//! ```json
//! { "SQLRoot": "Data/Sql", "SqlLoaderMetaPrefix": "My.Data" }
//! ```
//!
//! `SQLRoot` enables the path index features; without it the root is the
//! deepest directory holding every resource file of the workspace.
//! `SqlLoaderMetaPrefix` names the namespace of the `SqlLoader` type and
//! enables reference analysis.

use crate::codec::{CodeCodec, DEFAULT_EXTENSION};
use crate::debounce::DEFAULT_QUIET_PERIOD;
use crate::error::{Result, SqlNavError};
use crate::index::Scanner;
use serde::Deserialize;
use sqlnav_api::MethodQuery;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = ".sqlloadercfg.json";
pub const LOADER_TYPE_NAME: &str = "SqlLoader";
pub const DEFAULT_LOADER_METHOD: &str = "Load";
pub const DEFAULT_SOURCE_EXTENSION: &str = "cs";

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "PascalCase")]
struct ConfigFile {
    #[serde(rename = "SQLRoot")]
    sql_root: Option<String>,
    sql_loader_meta_prefix: Option<String>,
    extension: Option<String>,
    loader_method: Option<String>,
    source_extension: Option<String>,
    debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlNavConfig {
    pub workspace: PathBuf,
    /// Absolute, existing directory holding the resource files.
    pub sql_root: PathBuf,
    pub extension: String,
    /// Source files whose changes make the reference map stale.
    pub source_extension: String,
    /// `None` disables reference analysis.
    pub loader: Option<MethodQuery>,
    pub debounce: Duration,
}

impl SqlNavConfig {
    pub fn file_path(workspace: &Path) -> PathBuf {
        workspace.join(CONFIG_FILE_NAME)
    }

    /// Read the configuration of `workspace`. `Ok(None)` when it has no
    /// configuration file.
    pub fn load(workspace: &Path) -> Result<Option<Self>> {
        let path = Self::file_path(workspace);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        Self::parse(workspace, &text).map(Some)
    }

    pub fn parse(workspace: &Path, text: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(text)?;

        let extension = non_empty(file.extension)
            .map(|e| e.trim_start_matches('.').to_string())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        let mut config = match non_empty(file.sql_root) {
            Some(sql_root) => Self::with_root(workspace, Path::new(&sql_root))?,
            None => Self::discover(workspace, &extension)?,
        };
        config.extension = extension;

        config.loader = non_empty(file.sql_loader_meta_prefix).map(|prefix| {
            MethodQuery::new(
                loader_type_name(&prefix),
                non_empty(file.loader_method).unwrap_or_else(|| DEFAULT_LOADER_METHOD.to_string()),
            )
        });
        if let Some(extension) = non_empty(file.source_extension) {
            config.source_extension = extension.trim_start_matches('.').to_string();
        }
        if let Some(ms) = file.debounce_ms {
            config.debounce = Duration::from_millis(ms);
        }
        Ok(config)
    }

    /// Configuration with defaults for everything but the root. `root` is
    /// resolved against `workspace` and must be an existing directory.
    pub fn with_root(workspace: &Path, root: &Path) -> Result<Self> {
        let sql_root = normalize(&workspace.join(root));
        if !sql_root.is_dir() {
            return Err(SqlNavError::Config(format!(
                "SQLRoot {} is not a directory",
                sql_root.display()
            )));
        }
        Ok(Self {
            workspace: workspace.to_path_buf(),
            sql_root,
            extension: DEFAULT_EXTENSION.to_string(),
            source_extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            loader: None,
            debounce: DEFAULT_QUIET_PERIOD,
        })
    }

    /// Configuration rooted at the deepest directory holding every file with
    /// `extension` under `workspace`, build output directories aside.
    pub fn discover(workspace: &Path, extension: &str) -> Result<Self> {
        let codec = CodeCodec::new(workspace, extension);
        let root = Scanner::common_ancestor(workspace, &codec).ok_or_else(|| {
            SqlNavError::Config(format!(
                "SQLRoot is not set and no .{} files were found under {}",
                extension,
                workspace.display()
            ))
        })?;
        debug!("Discovered SQLRoot {}", root.display());
        let mut config = Self::with_root(workspace, &root)?;
        config.extension = extension.to_string();
        Ok(config)
    }

    /// Enable reference analysis against a fully qualified loader type.
    pub fn with_loader_type(mut self, type_name: impl Into<String>) -> Self {
        let method = self
            .loader
            .take()
            .map(|q| q.method_name)
            .unwrap_or_else(|| DEFAULT_LOADER_METHOD.to_string());
        self.loader = Some(MethodQuery::new(type_name, method));
        self
    }

    pub fn codec(&self) -> CodeCodec {
        CodeCodec::new(&self.sql_root, &self.extension)
    }

    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.source_extension))
    }
}

/// `My.Data` -> `My.Data.SqlLoader`
pub fn loader_type_name(prefix: &str) -> String {
    format!("{}.{}", prefix.trim_end_matches('.'), LOADER_TYPE_NAME)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Lexically resolve `.` and `..` so roots compare equal to watcher paths.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
