//! In-memory index of the codes under one root.
//!
//! The code set is kept behind a single `RwLock` holding an `Arc` snapshot:
//! - Readers clone the `Arc` and iterate without holding the lock
//! - Writers mutate in place through `Arc::make_mut`, which only copies the
//!   set while an older snapshot is still being read
//! - A rebuild scans the disk first and takes the lock only to swap the result

pub mod scanner;

pub use scanner::Scanner;

use crate::codec::CodeCodec;
use crate::error::Result;
use sqlnav_api::Code;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Uninitialized,
    Ready,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The set was replaced; carries the new number of codes.
    Rebuilt(usize),
    /// Another rebuild was in flight, nothing was done.
    AlreadyRunning,
    /// The index has been disposed.
    Disposed,
}

struct Inner {
    state: IndexState,
    codes: Arc<HashSet<Code>>,
}

pub struct PathIndex {
    codec: CodeCodec,
    inner: RwLock<Inner>,
    rebuilding: AtomicBool,
}

struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PathIndex {
    pub fn new(codec: CodeCodec) -> Self {
        Self {
            codec,
            inner: RwLock::new(Inner {
                state: IndexState::Uninitialized,
                codes: Arc::new(HashSet::new()),
            }),
            rebuilding: AtomicBool::new(false),
        }
    }

    pub fn codec(&self) -> &CodeCodec {
        &self.codec
    }

    pub fn root(&self) -> &Path {
        self.codec.root()
    }

    pub fn state(&self) -> IndexState {
        self.read().state
    }

    pub fn len(&self) -> usize {
        self.read().codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, code: &Code) -> bool {
        self.read().codes.contains(code)
    }

    /// Cheap snapshot of the current code set.
    pub fn snapshot(&self) -> Arc<HashSet<Code>> {
        self.read().codes.clone()
    }

    /// Rescan the root and replace the whole set.
    ///
    /// A request arriving while another rebuild runs is dropped; the running
    /// one is trusted to reflect the state it started from.
    pub fn rebuild(&self) -> Result<RebuildOutcome> {
        if self.state() == IndexState::Disposed {
            return Ok(RebuildOutcome::Disposed);
        }
        if self
            .rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rebuild of {} already in progress", self.root().display());
            return Ok(RebuildOutcome::AlreadyRunning);
        }
        let _guard = RebuildGuard(&self.rebuilding);

        let start = std::time::Instant::now();
        let codes = Scanner::scan_codes(&self.codec)?;
        let count = codes.len();

        let mut inner = self.write();
        if inner.state == IndexState::Disposed {
            return Ok(RebuildOutcome::Disposed);
        }
        inner.codes = Arc::new(codes);
        inner.state = IndexState::Ready;
        drop(inner);

        info!(
            "Indexed {} codes under {} in {:?}",
            count,
            self.root().display(),
            start.elapsed()
        );
        Ok(RebuildOutcome::Rebuilt(count))
    }

    /// A file or directory appeared. Returns whether the set changed.
    pub fn apply_create(&self, path: &Path) -> bool {
        if path.is_dir() {
            return self.insert_dir(path);
        }
        if !self.codec.matches_extension(path) || !path.is_file() {
            return false;
        }
        match self.code_of(path) {
            Some(code) => self.mutate(|codes| codes.insert(code)).unwrap_or(false),
            None => false,
        }
    }

    /// A file or directory disappeared. Returns whether the set changed.
    pub fn apply_delete(&self, path: &Path) -> bool {
        let Some(code) = self.codec.path_to_code(path) else {
            return false;
        };
        if self.codec.matches_extension(path) {
            return self.mutate(|codes| codes.remove(&code)).unwrap_or(false);
        }
        // Directory: drop everything beneath it
        self.mutate(|codes| {
            let before = codes.len();
            codes.retain(|c| !c.is_within(&code));
            before != codes.len()
        })
        .unwrap_or(false)
    }

    /// A file or directory moved from `old` to `new`. Either side may lie
    /// outside the root. Returns whether the set changed.
    pub fn apply_rename(&self, old: &Path, new: &Path) -> bool {
        let old_matches = self.codec.matches_extension(old);
        let new_matches = self.codec.matches_extension(new);

        if old_matches || new_matches {
            // Remove before adding, a case-only rename maps to the same code
            let removed = old_matches
                && self
                    .code_of(old)
                    .and_then(|code| self.mutate(|codes| codes.remove(&code)))
                    .unwrap_or(false);
            let added = new_matches
                && self
                    .code_of(new)
                    .and_then(|code| self.mutate(|codes| codes.insert(code)))
                    .unwrap_or(false);
            return removed || added;
        }

        match (
            self.codec.path_to_code(old),
            self.codec.path_to_code(new),
        ) {
            (Some(old_code), Some(new_code)) => self
                .mutate(|codes| {
                    let moved: Vec<Code> =
                        codes.iter().filter(|c| c.is_within(&old_code)).cloned().collect();
                    for code in &moved {
                        codes.remove(code);
                    }
                    for code in &moved {
                        if let Some(renamed) = code.replace_prefix(&old_code, &new_code) {
                            codes.insert(renamed);
                        }
                    }
                    !moved.is_empty()
                })
                .unwrap_or(false),
            // Moved out of the root
            (Some(_), None) => self.apply_delete(old),
            // Moved in from outside
            (None, Some(_)) => self.apply_create(new),
            (None, None) => false,
        }
    }

    /// Ambiguous or bulk change: not diffed, the whole index is rebuilt.
    pub fn apply_bulk_change(&self, path: &Path) -> Result<RebuildOutcome> {
        debug!("Bulk change at {}, rebuilding", path.display());
        self.rebuild()
    }

    /// Path of the resource file for `code`, only when the index knows it.
    /// Uses the indexed spelling of the code, so the result stays valid on
    /// case-sensitive filesystems.
    pub fn lookup_path_by_code(&self, code: &Code) -> Option<PathBuf> {
        let inner = self.read();
        if inner.state != IndexState::Ready {
            return None;
        }
        let stored = inner.codes.get(code)?;
        self.codec.code_to_path(stored)
    }

    /// Pure codec conversion, independent of index membership.
    pub fn lookup_code_by_path(&self, path: &Path) -> Option<Code> {
        self.codec.path_to_code(path).filter(|c| !c.is_empty())
    }

    /// Case-insensitive "starts with" search.
    ///
    /// The result reads a snapshot taken now and filters lazily; it can be
    /// iterated any number of times. Mutations that land afterwards are not
    /// reflected (weakly consistent read).
    pub fn prefix_search(&self, prefix: &str) -> PrefixMatches {
        PrefixMatches {
            snapshot: self.snapshot(),
            prefix: prefix.to_string(),
        }
    }

    /// Clear the set and refuse further mutations. Idempotent.
    pub fn dispose(&self) {
        let mut inner = self.write();
        inner.state = IndexState::Disposed;
        inner.codes = Arc::new(HashSet::new());
    }

    fn code_of(&self, path: &Path) -> Option<Code> {
        self.codec.path_to_code(path).filter(|c| !c.is_empty())
    }

    fn insert_dir(&self, dir: &Path) -> bool {
        let found: Vec<Code> = Scanner::matching_files(dir, &self.codec)
            .iter()
            .filter_map(|path| self.code_of(path))
            .collect();
        if found.is_empty() {
            return false;
        }
        self.mutate(|codes| {
            let before = codes.len();
            codes.extend(found);
            before != codes.len()
        })
        .unwrap_or(false)
    }

    /// Apply `f` to the code set while the index is ready. `None` otherwise.
    fn mutate<R>(&self, f: impl FnOnce(&mut HashSet<Code>) -> R) -> Option<R> {
        let mut inner = self.write();
        if inner.state != IndexState::Ready {
            return None;
        }
        Some(f(Arc::make_mut(&mut inner.codes)))
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lazily filtered view returned by [`PathIndex::prefix_search`].
pub struct PrefixMatches {
    snapshot: Arc<HashSet<Code>>,
    prefix: String,
}

impl PrefixMatches {
    pub fn iter(&self) -> impl Iterator<Item = &Code> + '_ {
        self.snapshot
            .iter()
            .filter(|code| code.starts_with_ignore_case(&self.prefix))
    }
}

impl<'a> IntoIterator for &'a PrefixMatches {
    type Item = &'a Code;
    type IntoIter = Box<dyn Iterator<Item = &'a Code> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
