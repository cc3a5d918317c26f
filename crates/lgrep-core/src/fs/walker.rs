//! Directory walking with ignore rules, binary detection, and hashing

use super::{FileInfo, WalkOptions, WalkStats};
use crate::config::default_ignore_patterns;
use crate::error::{LgrepError, Result};
use crate::fs::detect_language;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::HashSet;
use std::hash::Hasher;
use std::io::Read;
use std::path::Path;
use twox_hash::XxHash64;
use walkdir::WalkDir;

/// Walks a directory tree applying the configured skip rules and
/// yielding [`FileInfo`] for every indexable file.
pub struct FileWalker {
    opts: WalkOptions,
    ignorer: Gitignore,
    ext_set: Option<HashSet<String>>,
    stats: WalkStats,
}

impl FileWalker {
    pub fn new(mut opts: WalkOptions) -> Result<Self> {
        let root = std::fs::canonicalize(&opts.root)
            .map_err(|e| LgrepError::InvalidInput(format!("root path does not exist: {}", e)))?;
        if !root.is_dir() {
            return Err(LgrepError::InvalidInput(format!(
                "root path is not a directory: {}",
                root.display()
            )));
        }
        opts.root = root;

        let ext_set = if opts.extensions.is_empty() {
            None
        } else {
            Some(
                opts.extensions
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_lowercase())
                    .collect(),
            )
        };

        let ignorer = build_ignorer(&opts)?;

        Ok(Self {
            opts,
            ignorer,
            ext_set,
            stats: WalkStats::default(),
        })
    }

    /// Walk the tree, calling `f` for each yielded file. Entry errors
    /// (permissions, races) are logged and skipped; they do not abort
    /// the walk.
    pub fn walk(&mut self, mut f: impl FnMut(FileInfo) -> Result<()>) -> Result<()> {
        self.stats = WalkStats::default();

        let root = self.opts.root.clone();
        let mut it = WalkDir::new(&root).into_iter();

        while let Some(entry) = it.next() {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    tracing::debug!(error = %err, "error accessing path");
                    continue;
                }
            };

            let path = entry.path();
            let rel = path.strip_prefix(&root).unwrap_or(path);
            let name = entry.file_name().to_string_lossy();

            if entry.file_type().is_dir() {
                if entry.depth() == 0 {
                    continue;
                }
                let skip = name == ".git"
                    || (!self.opts.include_hidden && name.starts_with('.'))
                    || self.ignorer.matched(rel, true).is_ignore();
                if skip {
                    self.stats.dirs_skipped += 1;
                    it.skip_current_dir();
                }
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            // Hard cap: stop the walk cleanly once reached
            if self.opts.max_file_count > 0 && self.stats.files_found >= self.opts.max_file_count {
                break;
            }

            if !self.opts.include_hidden && name.starts_with('.') {
                self.stats.files_skipped += 1;
                continue;
            }

            if let Some(exts) = &self.ext_set {
                let matched = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| exts.contains(&e.to_lowercase()))
                    .unwrap_or(false);
                if !matched {
                    self.stats.files_skipped += 1;
                    continue;
                }
            }

            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "failed to stat file");
                    continue;
                }
            };

            if self.opts.max_file_size > 0 && meta.len() > self.opts.max_file_size {
                self.stats.files_skipped += 1;
                self.stats.skipped_bytes += meta.len();
                continue;
            }

            match is_binary_file(path) {
                Ok(false) => {}
                _ => {
                    self.stats.files_skipped += 1;
                    continue;
                }
            }

            if self.ignorer.matched(rel, false).is_ignore() {
                self.stats.files_skipped += 1;
                continue;
            }

            let hash = match hash_file(path) {
                Ok(h) => h,
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "failed to hash file");
                    continue;
                }
            };

            let info = FileInfo {
                path: path.to_path_buf(),
                rel_path: rel.to_string_lossy().to_string(),
                size: meta.len(),
                mod_time: meta.modified().ok(),
                hash,
                language: detect_language(path),
            };

            self.stats.files_found += 1;
            self.stats.total_bytes += meta.len();

            f(info)?;
        }

        Ok(())
    }

    /// Statistics from the most recent walk.
    pub fn stats(&self) -> WalkStats {
        self.stats
    }
}

/// Compile configured + default ignore patterns, ORed with the root
/// `.gitignore` when enabled.
fn build_ignorer(opts: &WalkOptions) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(&opts.root);

    if opts.use_gitignore {
        let gitignore = opts.root.join(".gitignore");
        if gitignore.is_file() {
            if let Some(err) = builder.add(&gitignore) {
                tracing::warn!(path = %gitignore.display(), error = %err, "failed to parse .gitignore");
            }
        }
    }

    let defaults = default_ignore_patterns();
    for pattern in opts.ignore_patterns.iter().chain(defaults.iter()) {
        builder
            .add_line(None, pattern)
            .map_err(|e| LgrepError::InvalidInput(format!("invalid ignore pattern: {}", e)))?;
    }

    builder
        .build()
        .map_err(|e| LgrepError::InvalidInput(format!("failed to build ignore rules: {}", e)))
}

/// Compute the content fingerprint of raw bytes: xxhash64 as
/// lowercase 16-hex.
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(content);
    format!("{:016x}", hasher.finish())
}

/// Compute the content fingerprint of a file, streaming its bytes.
pub fn hash_file(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = XxHash64::with_seed(0);
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.write(&buf[..n]);
    }
    Ok(format!("{:016x}", hasher.finish()))
}

/// Sniff the first 8 KiB for binary content.
fn is_binary_file(path: &Path) -> Result<bool> {
    let mut file = std::fs::File::open(path)?;
    let mut buf = [0u8; 8192];
    let n = file.read(&mut buf)?;
    Ok(is_binary_content(&buf[..n]))
}

/// Any NUL byte, or more than 30% non-printable bytes, means binary.
fn is_binary_content(content: &[u8]) -> bool {
    if content.is_empty() {
        return false;
    }

    if content.contains(&0) {
        return true;
    }

    let non_printable = content
        .iter()
        .filter(|&&b| b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
        .count();

    non_printable as f64 / content.len() as f64 > 0.3
}
