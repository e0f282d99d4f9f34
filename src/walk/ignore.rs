//! Layered gitignore-style include/exclude decisions over the walk.
//!
//! Each ignore file found in a directory pushes one [`IgnoreFrame`] holding
//! its globs in file order; the frame is popped when the traversal leaves
//! that directory, so the stack depth always equals the number of ignore
//! files on the path from the root. A glob whose first character is `!` is
//! a re-include override of an earlier exclude in the same frame.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};

/// One compiled ignore glob. A glob containing `/` is matched against the
/// pathname relative to the indexing root; a bare glob is matched against
/// the basename.
#[derive(Clone)]
struct IgnoreGlob {
    matcher: GlobMatcher,
    negate: bool,
    anchored: bool,
}

impl IgnoreGlob {
    fn compile(pattern: &str, negate: bool) -> Option<IgnoreGlob> {
        let anchored = pattern.contains('/');
        let mut pat = pattern;
        while let Some(rest) = pat.strip_prefix("./") {
            pat = rest;
        }
        let pat = pat.strip_prefix('/').unwrap_or(pat);
        let glob = GlobBuilder::new(pat)
            .literal_separator(anchored)
            .backslash_escape(true)
            .build()
            .ok()?;
        Some(IgnoreGlob {
            matcher: glob.compile_matcher(),
            negate,
            anchored,
        })
    }

    fn matches(&self, rel_path: &Path, basename: &str) -> bool {
        if self.anchored {
            self.matcher.is_match(rel_path)
        } else {
            self.matcher.is_match(basename)
        }
    }
}

/// The globs loaded from one ignore file.
pub struct IgnoreFrame {
    file_globs: Vec<IgnoreGlob>,
    dir_globs: Vec<IgnoreGlob>,
}

impl IgnoreFrame {
    /// Parse an ignore file. Lines are trimmed; empty lines and `#`
    /// comments are dropped; a trailing `/` makes a glob apply to
    /// directories only; all other globs apply to files and directories.
    pub fn load(ignore_path: &Path) -> Result<IgnoreFrame> {
        let bytes = fs::read(ignore_path)
            .with_context(|| format!("cannot read ignore file {}", ignore_path.display()))?;
        let text = String::from_utf8_lossy(&bytes);

        let mut frame = IgnoreFrame {
            file_globs: Vec::new(),
            dir_globs: Vec::new(),
        };

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (negate, glob) = match line.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, line),
            };
            if glob.is_empty() {
                continue;
            }

            if let Some(dir_glob) = glob.strip_suffix('/') {
                if dir_glob.is_empty() {
                    continue;
                }
                if let Some(compiled) = IgnoreGlob::compile(dir_glob, negate) {
                    frame.dir_globs.push(compiled);
                }
            } else if let Some(compiled) = IgnoreGlob::compile(glob, negate) {
                // a glob that names files conceptually excludes
                // same-named directories too
                frame.dir_globs.push(compiled.clone());
                frame.file_globs.push(compiled);
            }
        }

        Ok(frame)
    }
}

/// Stack of ignore frames along the current traversal path. Pathname
/// globs in every frame are matched against paths relative to the one
/// indexing root the walk started from.
pub struct IgnoreStack {
    root: PathBuf,
    frames: Vec<IgnoreFrame>,
}

impl IgnoreStack {
    pub fn new(root: &Path) -> IgnoreStack {
        IgnoreStack {
            root: root.to_path_buf(),
            frames: Vec::new(),
        }
    }

    pub fn push(&mut self, frame: IgnoreFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// True when the file at `path` is not excluded by the current frame.
    pub fn include_file(&self, path: &Path, basename: &str) -> bool {
        match self.frames.last() {
            Some(frame) => include(&frame.file_globs, &self.root, path, basename),
            None => true,
        }
    }

    /// True when the directory at `path` is not excluded by the current frame.
    pub fn include_dir(&self, path: &Path, basename: &str) -> bool {
        match self.frames.last() {
            Some(frame) => include(&frame.dir_globs, &self.root, path, basename),
            None => true,
        }
    }
}

/// Walk the glob list in order: a matching glob excludes, a matching
/// `!`-glob re-includes when currently excluded. Later rules win.
fn include(globs: &[IgnoreGlob], root: &Path, path: &Path, basename: &str) -> bool {
    let mut ok = true;
    let rel = path.strip_prefix(root).unwrap_or(path);
    for glob in globs {
        if glob.negate {
            if !ok && glob.matches(rel, basename) {
                ok = true;
            }
        } else if ok && glob.matches(rel, basename) {
            ok = false;
        }
    }
    ok
}
