use crate::codec::CodeCodec;
use sqlnav_api::Code;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Directory names skipped when discovering a root from the whole project.
pub const ARTIFACT_DIRS: &[&str] = &["bin", "obj", "target", "node_modules", ".git", ".vs", ".idea"];

pub struct Scanner;

impl Scanner {
    /// Codes of every file under the codec root carrying the tracked extension.
    ///
    /// Entries that vanish or cannot be read while walking are skipped; only a
    /// missing or unreadable root is an error.
    pub fn scan_codes(codec: &CodeCodec) -> io::Result<HashSet<Code>> {
        let root = codec.root();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("index root {} is not a directory", root.display()),
            ));
        }

        let codes = Self::matching_files(root, codec)
            .into_iter()
            .filter_map(|path| codec.path_to_code(&path))
            .filter(|code| !code.is_empty())
            .collect();
        Ok(codes)
    }

    /// Every file under `dir` carrying the codec's extension.
    pub fn matching_files(dir: &Path, codec: &CodeCodec) -> Vec<PathBuf> {
        Self::collect_files(dir, codec, |_| true)
    }

    /// Walk the whole project, skipping build artifacts, and return the
    /// deepest directory containing every matching file.
    pub fn common_ancestor(project_root: &Path, codec: &CodeCodec) -> Option<PathBuf> {
        let files = Self::collect_files(project_root, codec, |entry| !is_artifact_dir(entry));

        let mut parents = files.iter().filter_map(|f| f.parent());
        let mut ancestor = parents.next()?.to_path_buf();
        for parent in parents {
            while !parent.starts_with(&ancestor) {
                ancestor = ancestor.parent()?.to_path_buf();
            }
        }
        Some(ancestor)
    }

    fn collect_files(
        root: &Path,
        codec: &CodeCodec,
        keep: impl FnMut(&DirEntry) -> bool,
    ) -> Vec<PathBuf> {
        WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(keep)
            .filter_map(|entry| {
                let entry = entry.ok()?;
                if entry.file_type().is_file() && codec.matches_extension(entry.path()) {
                    return Some(entry.into_path());
                }
                None
            })
            .collect()
    }
}

fn is_artifact_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| ARTIFACT_DIRS.iter().any(|a| a.eq_ignore_ascii_case(name)))
}
