//! One open workspace: its configuration and everything built from it.
//!
//! Nothing on the query surface fails. Without a usable configuration the
//! workspace is stopped and every query answers empty.

use crate::analyzer::{
    COUNT_UNKNOWN, RecomputeOutcome, ReferenceAnalyzer, RefreshCallback, SubscriptionId,
};
use crate::config::{CONFIG_FILE_NAME, SqlNavConfig};
use crate::debounce::{DEFAULT_QUIET_PERIOD, Debouncer};
use crate::error::{Result, SqlNavError};
use crate::features::{LoaderSyntax, completion, navigation};
use crate::graph::{SharedGraph, SourceGraph};
use crate::index::{PathIndex, RebuildOutcome};
use crate::watch::{FsWatcher, spawn_index_watcher, translate_with_content, watch_channel};
use notify::RecursiveMode;
use sqlnav_api::{Code, ReferenceLocation};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What a running configuration owns. Dropping it stops its watchers.
pub struct Session {
    config: SqlNavConfig,
    index: Arc<PathIndex>,
    syntax: LoaderSyntax,
    references: Option<References>,
    cancel_token: CancellationToken,
    _fs_watcher: Option<FsWatcher>,
}

struct References {
    analyzer: Arc<ReferenceAnalyzer>,
    graph: SharedGraph,
    recompute: Debouncer,
}

impl Session {
    pub fn config(&self) -> &SqlNavConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<PathIndex> {
        &self.index
    }

    pub fn analyzer(&self) -> Option<&Arc<ReferenceAnalyzer>> {
        self.references.as_ref().map(|r| &r.analyzer)
    }

    fn shutdown(&self) {
        self.cancel_token.cancel();
        if let Some(references) = &self.references {
            references.recompute.cancel();
            references.analyzer.dispose();
        }
        self.index.dispose();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOptions {
    /// Keep the index in sync with the disk.
    pub watch_files: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self { watch_files: true }
    }
}

/// Handle of a [`Workspace::subscribe`] registration. Stays valid across
/// reconfigurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    callback: RefreshCallback,
    /// Registration on the running analyzer, if any.
    attached: Option<SubscriptionId>,
}

pub struct Workspace {
    dir: PathBuf,
    options: StartOptions,
    session: RwLock<Option<Arc<Session>>>,
    /// Refresh callbacks, re-attached to the analyzer of every new session.
    /// Locked before `session` whenever both are taken.
    listeners: Mutex<Vec<Listener>>,
    next_listener: AtomicU64,
    /// Workspace level watchers (configuration file, source documents).
    watchers: Mutex<Vec<(FsWatcher, CancellationToken)>>,
}

impl Workspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_options(dir, StartOptions::default())
    }

    pub fn with_options(dir: impl Into<PathBuf>, options: StartOptions) -> Self {
        Self {
            dir: dir.into(),
            options,
            session: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_active(&self) -> bool {
        self.session().is_some()
    }

    /// Whether the running configuration analyzes references.
    pub fn analysis_enabled(&self) -> bool {
        self.session().is_some_and(|s| s.analyzer().is_some())
    }

    /// Read the configuration file and start, or stop when it is missing or
    /// unusable. Returns whether the workspace is active afterwards.
    pub async fn reload(&self) -> bool {
        match SqlNavConfig::load(&self.dir) {
            Ok(Some(config)) => match self.start(config).await {
                Ok(()) => true,
                Err(err) => {
                    warn!("Failed to start {}: {}", self.dir.display(), err);
                    self.stop();
                    false
                }
            },
            Ok(None) => {
                info!("No {} in {}", CONFIG_FILE_NAME, self.dir.display());
                self.stop();
                false
            }
            Err(err) => {
                warn!("Ignoring configuration of {}: {}", self.dir.display(), err);
                self.stop();
                false
            }
        }
    }

    /// Replace the running configuration: rebuild the index and start from a
    /// fresh analyzer. Reference passes run lazily afterwards.
    pub async fn start(&self, config: SqlNavConfig) -> Result<()> {
        self.stop();
        let syntax = config
            .loader
            .as_ref()
            .map(LoaderSyntax::for_query)
            .transpose()?
            .unwrap_or_default();

        let index = Arc::new(PathIndex::new(config.codec()));
        let target = index.clone();
        let outcome = tokio::task::spawn_blocking(move || target.rebuild())
            .await
            .map_err(|e| SqlNavError::Internal(e.to_string()))??;
        if let RebuildOutcome::Rebuilt(count) = outcome {
            info!("Indexed {} codes under {}", count, index.root().display());
        }

        let cancel_token = CancellationToken::new();
        let fs_watcher = if self.options.watch_files {
            let (tx, rx) = watch_channel();
            match FsWatcher::start(index.root(), RecursiveMode::Recursive, tx) {
                Ok(watcher) => {
                    spawn_index_watcher(index.clone(), rx, cancel_token.clone());
                    Some(watcher)
                }
                Err(err) => {
                    warn!("Index of {} will not follow the disk: {}", index.root().display(), err);
                    None
                }
            }
        } else {
            None
        };

        let references = config.loader.clone().map(|query| {
            let analyzer = Arc::new(ReferenceAnalyzer::new(query));
            let graph: SharedGraph =
                Arc::new(SourceGraph::new(&config.workspace, &config.source_extension));
            let recompute = {
                let analyzer = analyzer.clone();
                let graph = graph.clone();
                Debouncer::spawn(config.debounce, move || {
                    let analyzer = analyzer.clone();
                    let graph = graph.clone();
                    async move {
                        analyzer.recompute(graph.as_ref()).await;
                    }
                })
            };
            References {
                analyzer,
                graph,
                recompute,
            }
        });

        let session = Arc::new(Session {
            config,
            index,
            syntax,
            references,
            cancel_token,
            _fs_watcher: fs_watcher,
        });
        let mut listeners = self.lock_listeners();
        if let Some(references) = &session.references {
            for listener in listeners.iter_mut() {
                listener.attached = Some(attach(&references.analyzer, &listener.callback));
            }
            if !listeners.is_empty() {
                references.recompute.signal();
            }
        } else {
            for listener in listeners.iter_mut() {
                listener.attached = None;
            }
        }
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    /// Tear down the running configuration, if any. Idempotent.
    pub fn stop(&self) {
        let previous = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = previous {
            info!("Stopping {}", session.index.root().display());
            session.shutdown();
        }
    }

    /// Follow the configuration file: changes reload (debounced), deletion
    /// stops. Ends with [`Workspace::close`].
    pub fn watch_config(self: &Arc<Self>) -> Result<()> {
        let (tx, mut rx) = watch_channel();
        let watcher = FsWatcher::start_with(
            &self.dir,
            RecursiveMode::NonRecursive,
            tx,
            translate_with_content,
        )?;
        let cancel_token = CancellationToken::new();

        let weak = Arc::downgrade(self);
        let reload = Debouncer::spawn(DEFAULT_QUIET_PERIOD, move || {
            let weak = weak.clone();
            async move {
                if let Some(workspace) = weak.upgrade() {
                    workspace.reload().await;
                }
            }
        });

        let token = cancel_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) if event.touches(CONFIG_FILE_NAME) => reload.signal(),
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            reload.shutdown().await;
        });

        self.keep_watcher(watcher, cancel_token);
        Ok(())
    }

    /// Feed changes of source documents under the workspace into
    /// [`Workspace::document_changed`]. Ends with [`Workspace::close`].
    pub fn watch_documents(self: &Arc<Self>) -> Result<()> {
        let (tx, mut rx) = watch_channel();
        let watcher = FsWatcher::start_with(
            &self.dir,
            RecursiveMode::Recursive,
            tx,
            translate_with_content,
        )?;
        let cancel_token = CancellationToken::new();

        let weak = Arc::downgrade(self);
        let token = cancel_token.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(e) => e,
                        None => break,
                    },
                };
                let Some(workspace) = weak.upgrade() else {
                    break;
                };
                for path in event.paths() {
                    workspace.document_changed(path);
                }
            }
        });

        self.keep_watcher(watcher, cancel_token);
        Ok(())
    }

    fn keep_watcher(&self, watcher: FsWatcher, cancel_token: CancellationToken) {
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((watcher, cancel_token));
    }

    /// Stop everything, including the workspace watchers.
    pub fn close(&self) {
        let watchers = std::mem::take(
            &mut *self.watchers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for (_, token) in watchers {
            token.cancel();
        }
        self.stop();
    }

    // Query surface

    pub fn prefix_search(&self, prefix: &str) -> Vec<Code> {
        let Some(session) = self.session() else {
            return Vec::new();
        };
        let mut codes: Vec<Code> = session.index.prefix_search(prefix).iter().cloned().collect();
        codes.sort();
        codes
    }

    pub fn complete(&self, line: &str, caret: usize) -> Vec<Code> {
        self.session()
            .map(|s| completion::complete(&s.index, &s.syntax, line, caret))
            .unwrap_or_default()
    }

    pub fn resolve_resource(&self, line: &str, caret: usize) -> Option<PathBuf> {
        let session = self.session()?;
        navigation::resolve_resource(&session.index, &session.syntax, line, caret)
    }

    pub fn lookup_path_by_code(&self, code: &Code) -> Option<PathBuf> {
        self.session()?.index.lookup_path_by_code(code)
    }

    pub fn lookup_code_by_path(&self, path: &Path) -> Option<Code> {
        self.session()?.index.lookup_code_by_path(path)
    }

    pub fn get_count(&self, code: &Code) -> i64 {
        self.session()
            .and_then(|s| s.analyzer().map(|a| a.get_count(code)))
            .unwrap_or(COUNT_UNKNOWN)
    }

    pub fn references(&self, code: &Code) -> Vec<ReferenceLocation> {
        self.session()
            .and_then(|s| s.analyzer().map(|a| a.references(code)))
            .unwrap_or_default()
    }

    /// Summary line for an indexed resource file; `None` for any other file
    /// or when analysis is off.
    pub fn reference_summary(&self, path: &Path) -> Option<String> {
        let session = self.session()?;
        let analyzer = session.analyzer()?;
        if !session.index.codec().matches_extension(path) {
            return None;
        }
        let code = session.index.lookup_code_by_path(path)?;
        if !session.index.contains(&code) {
            return None;
        }
        Some(navigation::reference_summary(&code, analyzer.get_count(&code)))
    }

    /// Register for "references refreshed" and schedule a pass. The callback
    /// survives reconfiguration: every later session notifies it too.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let callback: RefreshCallback = Arc::new(callback);

        let mut listeners = self.lock_listeners();
        let session = self.session();
        let references = session.as_ref().and_then(|s| s.references.as_ref());
        let attached = references.map(|r| {
            let subscription = attach(&r.analyzer, &callback);
            r.recompute.signal();
            subscription
        });
        listeners.push(Listener {
            id,
            callback,
            attached,
        });
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let Some(position) = listeners.iter().position(|l| l.id == id) else {
            return false;
        };
        let listener = listeners.remove(position);
        if let (Some(subscription), Some(analyzer)) = (
            listener.attached,
            self.session().and_then(|s| s.analyzer().cloned()),
        ) {
            analyzer.unsubscribe(subscription);
        }
        true
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A source document changed, was added or removed. Only files with the
    /// source extension count.
    pub fn document_changed(&self, path: &Path) {
        let Some(session) = self.session() else {
            return;
        };
        let Some(references) = &session.references else {
            return;
        };
        if session.config.is_source_file(path) {
            references.analyzer.notify_external_change();
            references.recompute.signal();
        }
    }

    /// Run a pass now, bypassing the debouncer.
    pub async fn recompute_now(&self) -> Option<RecomputeOutcome> {
        let session = self.session()?;
        let references = session.references.as_ref()?;
        Some(references.analyzer.recompute(references.graph.as_ref()).await)
    }
}

fn attach(analyzer: &ReferenceAnalyzer, callback: &RefreshCallback) -> SubscriptionId {
    let callback = callback.clone();
    analyzer.subscribe(move || callback())
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.close();
    }
}
