mod index;
mod query;
mod refs;
mod watch;

use clap::{Args, Parser, Subcommand};
use sqlnav_core::config::{CONFIG_FILE_NAME, SqlNavConfig};
use sqlnav_core::{StartOptions, Workspace};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sqlnav",
    version,
    about = "Navigate between SqlLoader.Load calls and the SQL files they name",
    long_about = "sqlnav indexes the SQL resource files of a workspace by their dotted code \
                  (orders/get.sql is orders.get) and finds every SqlLoader.Load call that \
                  references each code. Settings come from .sqlloadercfg.json in the workspace \
                  root and can be overridden on the command line."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct WorkspaceArgs {
    /// Workspace directory holding .sqlloadercfg.json. Defaults to the current directory.
    #[arg(long, short = 'w', value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// SQL root, relative to the workspace. Overrides SQLRoot.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Fully qualified loader type, e.g. My.Data.SqlLoader. Overrides SqlLoaderMetaPrefix.
    #[arg(long, value_name = "TYPE")]
    pub loader_type: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the index and list every code
    Index {
        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Print codes as a JSON array
        #[arg(long)]
        json: bool,
    },
    /// Codes offered at a caret position of a source line
    #[command(
        long_about = "Completes the code argument of a loader call. COLUMN is the caret column \
                      in chars; it defaults to the end of the line."
    )]
    Complete {
        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Source line, e.g. 'SqlLoader.Load("orders.'
        #[arg(value_name = "LINE")]
        line: String,

        #[arg(value_name = "COLUMN")]
        column: Option<usize>,
    },
    /// Resource file for a code, or for the loader call under a caret
    Resolve {
        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// A code (orders.get) or a source line containing a loader call
        #[arg(value_name = "CODE_OR_LINE")]
        target: String,

        /// Caret column when TARGET is a source line
        #[arg(long)]
        column: Option<usize>,
    },
    /// Code of a resource file
    Code {
        #[command(flatten)]
        workspace: WorkspaceArgs,

        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Call sites referencing a code, or a summary of all codes
    Refs {
        #[command(flatten)]
        workspace: WorkspaceArgs,

        /// Code to list references for; all codes when omitted
        #[arg(value_name = "CODE")]
        code: Option<String>,
    },
    /// Keep the index and reference counts live until Ctrl+C
    Watch {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let component = match &cli.command {
        Commands::Watch { .. } => "watch",
        _ => "cli",
    };
    let _guard = sqlnav_core::logging::init_logging(component, true);

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Index { workspace, json } => rt.block_on(index::run(workspace, json)),
        Commands::Complete {
            workspace,
            line,
            column,
        } => rt.block_on(query::complete(workspace, line, column)),
        Commands::Resolve {
            workspace,
            target,
            column,
        } => rt.block_on(query::resolve(workspace, target, column)),
        Commands::Code { workspace, file } => rt.block_on(query::code(workspace, file)),
        Commands::Refs { workspace, code } => rt.block_on(refs::run(workspace, code)),
        Commands::Watch { workspace } => rt.block_on(watch::run(workspace)),
    }
}

impl WorkspaceArgs {
    pub fn dir(&self) -> PathBuf {
        self.workspace
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Configuration file merged with the command line overrides.
    pub fn config(&self) -> Result<SqlNavConfig, Box<dyn std::error::Error>> {
        let dir = self.dir();
        let from_file = match SqlNavConfig::load(&dir) {
            Ok(config) => config,
            // The command line names the root, a broken file only loses the loader
            Err(err) if self.root.is_some() => {
                tracing::warn!("Ignoring {}: {}", CONFIG_FILE_NAME, err);
                None
            }
            Err(err) => return Err(err.into()),
        };

        let mut config = match (&self.root, from_file) {
            (Some(root), file) => {
                let mut config = SqlNavConfig::with_root(&dir, root)?;
                config.loader = file.and_then(|f| f.loader);
                config
            }
            (None, Some(file)) => file,
            (None, None) => {
                return Err(format!(
                    "no {} in {} and no --root given",
                    CONFIG_FILE_NAME,
                    dir.display()
                )
                .into());
            }
        };
        if let Some(loader_type) = &self.loader_type {
            config = config.with_loader_type(loader_type.clone());
        }
        Ok(config)
    }

    pub async fn open(&self, watch_files: bool) -> Result<Workspace, Box<dyn std::error::Error>> {
        let config = self.config()?;
        let workspace = Workspace::with_options(self.dir(), StartOptions { watch_files });
        workspace.start(config).await?;
        Ok(workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn args(dir: &std::path::Path) -> WorkspaceArgs {
        WorkspaceArgs {
            workspace: Some(dir.to_path_buf()),
            root: None,
            loader_type: None,
        }
    }

    #[test]
    fn test_config_requires_file_or_root() {
        let dir = tempdir().unwrap();
        assert!(args(dir.path()).config().is_err());

        fs::create_dir(dir.path().join("sql")).unwrap();
        let mut with_root = args(dir.path());
        with_root.root = Some(PathBuf::from("sql"));
        let config = with_root.config().unwrap();
        assert_eq!(config.sql_root, dir.path().join("sql"));
        assert!(config.loader.is_none());
    }

    #[test]
    fn test_overrides_merge_with_file() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "SQLRoot": "a", "SqlLoaderMetaPrefix": "My.Data" }"#,
        )
        .unwrap();

        let mut overridden = args(dir.path());
        overridden.root = Some(PathBuf::from("b"));
        let config = overridden.config().unwrap();
        assert_eq!(config.sql_root, dir.path().join("b"));
        assert_eq!(
            config.loader.map(|q| q.type_name),
            Some("My.Data.SqlLoader".to_string())
        );

        overridden.loader_type = Some("Acme.SqlLoader".into());
        assert_eq!(
            overridden.config().unwrap().loader.map(|q| q.type_name),
            Some("Acme.SqlLoader".to_string())
        );
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "sqlnav",
            "complete",
            "--root",
            "sql",
            r#"SqlLoader.Load("ord"#,
            "19",
        ])
        .unwrap();
        match cli.command {
            Commands::Complete { line, column, .. } => {
                assert_eq!(line, r#"SqlLoader.Load("ord"#);
                assert_eq!(column, Some(19));
            }
            _ => panic!("expected complete"),
        }
    }
}
