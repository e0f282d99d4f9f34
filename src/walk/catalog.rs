//! Directory cataloguing: one enumeration pass per directory producing the
//! subdirectories to recurse into, the regular files to consider for
//! indexing, and the modification times that drive the freshness check.

use crate::index::stats::Stats;
use crate::index::types::{Config, INDEX_FILENAME};
use crate::output;
use crate::walk::ignore::{IgnoreFrame, IgnoreStack};
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// A catalogued filesystem item. The traversal root carries the maximum
/// modification time so it is always inspected; a sentinel entry (empty
/// pathname) on the work stack marks where an ignore frame must be popped.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Full pathname.
    pub path: PathBuf,
    /// Basename within the pathname.
    pub name: String,
    /// Modification time in microseconds since the epoch.
    pub mtime: u64,
    /// Size in bytes.
    pub size: u64,
}

impl Entry {
    pub fn new(path: PathBuf, name: String, mtime: u64, size: u64) -> Entry {
        Entry {
            path,
            name,
            mtime,
            size,
        }
    }

    /// Entry for the root of the tree to index.
    pub fn root(path: &Path) -> Entry {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Entry {
            path: path.to_path_buf(),
            name,
            mtime: u64::MAX,
            size: 0,
        }
    }

    /// Work-stack marker that pops one ignore frame when drained.
    pub fn sentinel() -> Entry {
        Entry {
            path: PathBuf::new(),
            name: String::new(),
            mtime: 0,
            size: 0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    pub fn basename_bytes(&self) -> &[u8] {
        self.name.as_bytes()
    }
}

/// What one directory enumeration produced.
pub struct Catalog {
    /// Regular files to consider for indexing.
    pub files: Vec<Entry>,
    /// Modification time of the existing index file, 0 when absent.
    pub index_time: u64,
    /// Newest modification time across `files`, 0 when none.
    pub last_time: u64,
}

/// Modification time in microseconds; 0 for pre-epoch or unavailable times.
pub fn mtime_micros(meta: &Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Enumerate the immediate children of `dir`.
///
/// Subdirectories are appended to the driver's `work` stack (not cleared);
/// when an ignore file is present, its frame is pushed and a sentinel entry
/// marks the pop point. Returns `None` when the directory cannot be opened
/// (reported, skipped). With `dir_only` set, only subdirectories are
/// collected and ignore files are not consulted (delete mode).
pub fn catalog_dir(
    dir: &Path,
    work: &mut Vec<Entry>,
    ignores: &mut IgnoreStack,
    config: &Config,
    stats: &mut Stats,
    dir_only: bool,
) -> Option<Catalog> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            output::error(config, "cannot open directory", dir, &e);
            return None;
        }
    };

    if !config.ignore_files.is_empty() && !dir_only {
        for ignore_name in &config.ignore_files {
            let ignore_path = dir.join(ignore_name);
            if !ignore_path.is_file() {
                continue;
            }
            match IgnoreFrame::load(&ignore_path) {
                Ok(frame) => {
                    ignores.push(frame);
                    work.push(Entry::sentinel());
                }
                Err(_) => {
                    output::warning(config, "cannot read ignore file", Some(&ignore_path));
                }
            }
        }
    }

    stats.num_dirs += 1;

    let mut catalog = Catalog {
        files: Vec::new(),
        index_time: 0,
        last_time: 0,
    };

    for dirent in entries {
        let dirent = match dirent {
            Ok(d) => d,
            Err(e) => {
                output::error(config, "cannot read directory", dir, &e);
                continue;
            }
        };
        let name = dirent.file_name().to_string_lossy().into_owned();
        let path = dirent.path();

        let meta = match fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                output::error(config, "cannot stat", &path, &e);
                continue;
            }
        };

        let file_type = meta.file_type();

        if file_type.is_file() && name == INDEX_FILENAME {
            catalog.index_time = mtime_micros(&meta);
            continue;
        }

        if name.starts_with('.') && !config.hidden {
            continue;
        }

        if file_type.is_dir() {
            if dir_only || ignores.include_dir(&path, &name) {
                let mtime = mtime_micros(&meta);
                work.push(Entry::new(path, name, mtime, meta.len()));
            } else {
                stats.ign_dirs += 1;
            }
        } else if file_type.is_file() && !dir_only {
            if ignores.include_file(&path, &name) {
                let mtime = mtime_micros(&meta);
                catalog.last_time = catalog.last_time.max(mtime);
                catalog.files.push(Entry::new(path, name, mtime, meta.len()));
            } else {
                stats.ign_files += 1;
            }
        } else if file_type.is_symlink() && !dir_only {
            // follow symlinks to files, never to directories
            let followed = if config.dereference_files {
                fs::metadata(&path).ok().filter(|m| m.is_file())
            } else {
                None
            };
            match followed {
                Some(m) => {
                    if ignores.include_file(&path, &name) {
                        let mtime = mtime_micros(&m);
                        catalog.last_time = catalog.last_time.max(mtime);
                        catalog.files.push(Entry::new(path, name, mtime, m.len()));
                    } else {
                        stats.ign_files += 1;
                    }
                }
                None => stats.num_links += 1,
            }
        } else {
            stats.num_other += 1;
        }
    }

    Some(catalog)
}
