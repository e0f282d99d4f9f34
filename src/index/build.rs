//! Tree driver: explicit-stack depth-first traversal over the directory
//! tree, one catalog pass and one index update per directory. Sentinel
//! entries on the work stack pop ignore frames in lockstep with the walk.

use crate::index::stats::Stats;
use crate::index::types::{Config, INDEX_FILENAME};
use crate::index::update::update_directory;
use crate::output;
use crate::walk::{catalog_dir, Entry, IgnoreStack};
use anyhow::Result;
use std::fs;
use std::path::Path;

/// Index (or, in check mode, audit) every directory under `path`.
pub fn index_tree(config: &Config, path: &Path) -> Result<Stats> {
    let mut stats = Stats::default();
    let mut ignores = IgnoreStack::new(path);
    let mut work = vec![Entry::root(path)];

    while let Some(visit) = work.pop() {
        if visit.is_sentinel() {
            ignores.pop();
            continue;
        }

        let mut catalog = match catalog_dir(
            &visit.path,
            &mut work,
            &mut ignores,
            config,
            &mut stats,
            false,
        ) {
            Some(catalog) => catalog,
            None => continue,
        };

        update_directory(&visit, &mut catalog, config, &mut stats);
    }

    Ok(stats)
}

/// Walk the tree removing every index file found. Symbolic links to
/// directories are never followed, files are not enumerated, and ignore
/// rules are not consulted.
pub fn delete_tree(config: &Config, path: &Path) -> Result<Stats> {
    // removal is best-effort and silent, like the rest of delete mode
    let config = Config {
        no_messages: true,
        ..config.clone()
    };

    let mut stats = Stats::default();
    let mut ignores = IgnoreStack::new(path);
    let mut work = vec![Entry::root(path)];

    while let Some(visit) = work.pop() {
        if visit.is_sentinel() {
            ignores.pop();
            continue;
        }

        let catalog = match catalog_dir(
            &visit.path,
            &mut work,
            &mut ignores,
            &config,
            &mut stats,
            true,
        ) {
            Some(catalog) => catalog,
            None => continue,
        };

        if catalog.index_time > 0 {
            let index_path = visit.path.join(INDEX_FILENAME);
            if let Err(e) = fs::remove_file(&index_path) {
                output::error(&config, "cannot remove", &index_path, &e);
            }
        }
    }

    Ok(stats)
}
