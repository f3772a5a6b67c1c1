use crate::WorkspaceArgs;
use sqlnav_core::Workspace;
use std::sync::Arc;
use tracing::info;

pub async fn run(args: WorkspaceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.config()?;
    let workspace = Arc::new(Workspace::new(args.dir()));
    workspace.start(config).await?;
    if args.root.is_none() && args.loader_type.is_none() {
        workspace.watch_config()?;
    }
    workspace.watch_documents()?;

    // Stays registered when a configuration change restarts the session
    let weak = Arc::downgrade(&workspace);
    workspace.subscribe(move || {
        if let Some(session) = weak.upgrade().and_then(|w| w.session()) {
            if let Some(analyzer) = session.analyzer() {
                let references: usize = analyzer.snapshot().values().map(Vec::len).sum();
                info!("References refreshed: {} call sites", references);
            }
        }
    });
    if !workspace.analysis_enabled() {
        info!("Reference analysis is off, watching SQL files only");
    }

    info!("Watching {}. Press Ctrl+C to stop.", workspace.dir().display());
    tokio::signal::ctrl_c().await?;
    workspace.close();
    info!("Watcher stopped.");
    Ok(())
}
