//! Run statistics and the end-of-run summary report.

use crate::index::types::Config;

/// Counters accumulated over one traversal.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    /// Directories catalogued.
    pub num_dirs: u64,
    /// Files indexed (kept or newly written).
    pub num_files: u64,
    /// Symbolic links skipped.
    pub num_links: u64,
    /// Device/socket/fifo entries skipped.
    pub num_other: u64,
    /// Directories whose index was created (or would be, in check mode).
    pub add_dirs: i64,
    /// Files added to an index (or that would be).
    pub add_files: i64,
    /// Files whose record was stale and regenerated (or would be).
    pub mod_files: i64,
    /// Records dropped because their file is gone (or would be).
    pub del_files: i64,
    /// Directories excluded by ignore globs.
    pub ign_dirs: u64,
    /// Files excluded by ignore globs.
    pub ign_files: u64,
    /// Binary files registered without a fingerprint.
    pub bin_files: i64,
    /// Net index storage change in bytes (negative when shrinking).
    pub sum_hashes_size: i64,
    /// Bytes of file content scanned.
    pub sum_files_size: u64,
    /// Summed per-file noise, averaged in the report.
    pub sum_noise: f32,
}

impl Stats {
    /// True when an index run would write nothing: check mode exits 0.
    pub fn is_fresh(&self) -> bool {
        self.add_dirs == 0 && self.add_files == 0 && self.mod_files == 0 && self.del_files == 0
    }

    fn average_noise(&self) -> u32 {
        let indexed = self.mod_files + self.add_files;
        if indexed <= 0 {
            return 0;
        }
        (100.0 * self.sum_noise / indexed as f32 + 0.5) as u32
    }

    /// Print the summary block. Suppressed entirely by `--quiet`.
    pub fn report(&self, config: &Config) {
        if config.quiet {
            return;
        }

        if self.sum_files_size > 0 {
            println!(
                "\n{:13} bytes scanned and indexed with {}% noise on average",
                self.sum_files_size,
                self.average_noise()
            );
        }

        println!();
        println!(
            "{:13} files indexed in {} directories",
            self.num_files, self.num_dirs
        );
        if config.check {
            println!("{:13} directories not indexed", self.add_dirs);
            println!("{:13} new files not indexed", self.add_files);
            println!("{:13} modified files not indexed", self.mod_files);
            println!("{:13} deleted files are still indexed", self.del_files);
            println!(
                "{:13} binary files skipped with --ignore-binary",
                self.bin_files
            );
        } else {
            println!("{:13} new directories indexed", self.add_dirs);
            println!("{:13} new files indexed", self.add_files);
            println!("{:13} modified files indexed", self.mod_files);
            println!("{:13} deleted files removed from indexes", self.del_files);
            println!(
                "{:13} binary files skipped with --ignore-binary",
                self.bin_files
            );
        }
        if !config.ignore_files.is_empty() {
            println!(
                "{:13} directories ignored with --ignore-files",
                self.ign_dirs
            );
            println!("{:13} files ignored with --ignore-files", self.ign_files);
        }
        println!("{:13} symbolic links skipped", self.num_links);
        println!("{:13} devices skipped", self.num_other);
        if !config.check {
            if self.sum_hashes_size >= 0 {
                let per_file = if self.num_files > 0 {
                    self.sum_hashes_size / self.num_files as i64
                } else {
                    0
                };
                println!(
                    "{:13} bytes indexing storage increase at {} bytes/file",
                    self.sum_hashes_size, per_file
                );
            } else {
                println!(
                    "{:13} bytes indexing storage decrease",
                    self.sum_hashes_size
                );
            }
        }
        println!();

        if config.check {
            if self.is_fresh() {
                println!("Checked: indexes are fresh and up to date\n");
            } else {
                println!("Warning: some indexes appear to be stale and are outdated or missing\n");
            }
        } else {
            println!("Indexes are fresh and up to date\n");
        }
    }
}
