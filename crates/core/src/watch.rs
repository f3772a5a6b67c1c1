//! Filesystem watching for the path index.
//!
//! Events travel over one tagged channel: any source (the `notify` backed
//! [`FsWatcher`], a test, an editor integration) sends [`WatchEvent`]s and the
//! index watcher task applies them in arrival order.

use crate::error::Result;
use crate::index::{PathIndex, RebuildOutcome};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
    /// Something changed that cannot be diffed; forces a rebuild.
    Changed(PathBuf),
}

pub type WatchSender = mpsc::UnboundedSender<WatchEvent>;
pub type WatchReceiver = mpsc::UnboundedReceiver<WatchEvent>;

pub fn watch_channel() -> (WatchSender, WatchReceiver) {
    mpsc::unbounded_channel()
}

/// Map one `notify` event onto index events.
///
/// Pure content and metadata modifications are dropped, they never change
/// which codes exist.
pub fn translate(event: &Event, root: &Path) -> Vec<WatchEvent> {
    let first = || {
        event
            .paths
            .first()
            .cloned()
            .unwrap_or_else(|| root.to_path_buf())
    };

    if event.need_rescan() {
        return vec![WatchEvent::Changed(first())];
    }

    let each = |f: fn(PathBuf) -> WatchEvent| -> Vec<WatchEvent> {
        event.paths.iter().cloned().map(f).collect()
    };

    match event.kind {
        EventKind::Create(_) => each(WatchEvent::Created),
        EventKind::Remove(_) => each(WatchEvent::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            vec![WatchEvent::Renamed {
                from: event.paths[0].clone(),
                to: event.paths[1].clone(),
            }]
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(WatchEvent::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(WatchEvent::Created),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                if p.exists() {
                    WatchEvent::Created(p.clone())
                } else {
                    WatchEvent::Deleted(p.clone())
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Metadata(_)) | EventKind::Access(_) => {
            Vec::new()
        }
        EventKind::Any | EventKind::Other | EventKind::Modify(_) => {
            vec![WatchEvent::Changed(first())]
        }
    }
}

/// Like [`translate`], but content changes become `Changed` for the file.
/// Used where a file's content matters, not only its existence.
pub fn translate_with_content(event: &Event, root: &Path) -> Vec<WatchEvent> {
    match event.kind {
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Metadata(_)) if !event.need_rescan() => {
            event.paths.iter().cloned().map(WatchEvent::Changed).collect()
        }
        _ => translate(event, root),
    }
}

pub type Translator = fn(&Event, &Path) -> Vec<WatchEvent>;

/// `notify` backed event source. Events stop when it is dropped.
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    pub fn start(root: &Path, mode: RecursiveMode, tx: WatchSender) -> Result<Self> {
        Self::start_with(root, mode, tx, translate)
    }

    pub fn start_with(
        root: &Path,
        mode: RecursiveMode,
        tx: WatchSender,
        translator: Translator,
    ) -> Result<Self> {
        let base = root.to_path_buf();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for translated in translator(&event, &base) {
                        let _ = tx.send(translated);
                    }
                }
                Err(err) => {
                    tracing::warn!("Watch error under {}: {}", base.display(), err);
                    let _ = tx.send(WatchEvent::Changed(base.clone()));
                }
            },
            Config::default(),
        )?;
        watcher.watch(root, mode)?;
        Ok(Self { _watcher: watcher })
    }
}

impl WatchEvent {
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            WatchEvent::Created(path) | WatchEvent::Deleted(path) | WatchEvent::Changed(path) => {
                vec![path.as_path()]
            }
            WatchEvent::Renamed { from, to } => vec![from.as_path(), to.as_path()],
        }
    }

    /// Whether this event may concern a file named `file_name`. A bulk change
    /// on a directory always may.
    pub fn touches(&self, file_name: &str) -> bool {
        let named = |p: &Path| p.file_name().is_some_and(|n| n == file_name);
        match self {
            WatchEvent::Created(path) | WatchEvent::Deleted(path) => named(path),
            WatchEvent::Renamed { from, to } => named(from) || named(to),
            WatchEvent::Changed(path) => named(path) || !path.is_file(),
        }
    }

    /// Apply this event to `index`, rebuilding for `Changed`.
    /// Returns whether the code set may have changed.
    pub fn apply(&self, index: &PathIndex) -> Result<bool> {
        let changed = match self {
            WatchEvent::Created(path) => index.apply_create(path),
            WatchEvent::Deleted(path) => index.apply_delete(path),
            WatchEvent::Renamed { from, to } => index.apply_rename(from, to),
            WatchEvent::Changed(path) => {
                matches!(index.apply_bulk_change(path)?, RebuildOutcome::Rebuilt(_))
            }
        };
        Ok(changed)
    }
}

/// Drain `events` into `index` until cancelled or the channel closes.
///
/// Each event runs on the blocking pool (a rebuild walks the disk) and is
/// awaited before the next one starts, so delivery order is kept.
pub fn spawn_index_watcher(
    index: Arc<PathIndex>,
    mut events: WatchReceiver,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Started watching {}", index.root().display());
        loop {
            let event = tokio::select! {
                _ = cancel_token.cancelled() => break,
                event = events.recv() => match event {
                    Some(e) => e,
                    None => break,
                },
            };

            tracing::debug!("Watch event: {:?}", event);
            let target = index.clone();
            match tokio::task::spawn_blocking(move || event.apply(&target)).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => tracing::warn!("Failed to apply watch event: {}", err),
                Err(err) => tracing::error!("Watch handler panicked: {}", err),
            }
        }
        tracing::info!("File watcher task ended for {}", index.root().display());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, Flag, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_translate_create_and_remove() {
        let root = Path::new("/r");
        assert_eq!(
            translate(&event(EventKind::Create(CreateKind::File), &["/r/a.sql"]), root),
            vec![WatchEvent::Created(PathBuf::from("/r/a.sql"))]
        );
        assert_eq!(
            translate(&event(EventKind::Remove(RemoveKind::Folder), &["/r/orders"]), root),
            vec![WatchEvent::Deleted(PathBuf::from("/r/orders"))]
        );
    }

    #[test]
    fn test_translate_renames() {
        let root = Path::new("/r");
        let both = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/r/a.sql", "/r/b.sql"],
        );
        assert_eq!(
            translate(&both, root),
            vec![WatchEvent::Renamed {
                from: PathBuf::from("/r/a.sql"),
                to: PathBuf::from("/r/b.sql"),
            }]
        );
        assert_eq!(
            translate(&event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/r/a.sql"]), root),
            vec![WatchEvent::Deleted(PathBuf::from("/r/a.sql"))]
        );
        assert_eq!(
            translate(&event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/r/b.sql"]), root),
            vec![WatchEvent::Created(PathBuf::from("/r/b.sql"))]
        );
    }

    #[test]
    fn test_translate_ignores_content_changes() {
        let root = Path::new("/r");
        let data = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/r/a.sql"],
        );
        assert!(translate(&data, root).is_empty());
    }

    #[test]
    fn test_translate_with_content() {
        let root = Path::new("/r");
        let data = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/r/.sqlloadercfg.json"],
        );
        let events = translate_with_content(&data, root);
        assert_eq!(
            events,
            vec![WatchEvent::Changed(PathBuf::from("/r/.sqlloadercfg.json"))]
        );
        assert!(events[0].touches(".sqlloadercfg.json"));
        assert!(!WatchEvent::Created(PathBuf::from("/r/Repo.cs")).touches(".sqlloadercfg.json"));
        assert!(
            WatchEvent::Renamed {
                from: PathBuf::from("/r/tmp"),
                to: PathBuf::from("/r/.sqlloadercfg.json"),
            }
            .touches(".sqlloadercfg.json")
        );
    }

    #[test]
    fn test_translate_ambiguous_is_bulk_change() {
        let root = Path::new("/r");
        assert_eq!(
            translate(&event(EventKind::Other, &[]), root),
            vec![WatchEvent::Changed(PathBuf::from("/r"))]
        );
        let rescan = event(EventKind::Create(CreateKind::Any), &["/r/x"]).set_flag(Flag::Rescan);
        assert_eq!(
            translate(&rescan, root),
            vec![WatchEvent::Changed(PathBuf::from("/r/x"))]
        );
    }
}
