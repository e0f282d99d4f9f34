//! Incremental per-directory index update.
//!
//! Given a directory's catalog and its existing index, decide per file
//! whether its record is kept, dropped, or regenerated, compacting the
//! index in place with separate read and write cursors so unchanged
//! records are moved at most once and changed ones are rewritten by the
//! append pass. The whole update runs over a single read-write handle.

use crate::decompress::Source;
use crate::index::reader::{check_magic, read_exact_opt, read_header};
use crate::index::stats::Stats;
use crate::index::types::{Config, RecordHeader, INDEX_FILENAME, INDEX_MAGIC};
use crate::index::writer::{
    append_record, create_index, open_index_rw, shift_record, truncate_index,
};
use crate::output;
use crate::utils::Fingerprint;
use crate::walk::{Catalog, Entry};
use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::Path;

/// Reconcile one directory's catalog with its on-disk index.
///
/// All failures are reported and contained here: an unwritable index
/// abandons this directory's update and the traversal continues.
pub fn update_directory(visit: &Entry, catalog: &mut Catalog, config: &Config, stats: &mut Stats) {
    let index_path = visit.path.join(INDEX_FILENAME);
    let mut index_file: Option<File> = None;

    if !config.force {
        if catalog.index_time > 0 {
            // if the index file is newer than every file and than the
            // directory itself, everything indexed is still current
            if catalog.last_time <= catalog.index_time && visit.mtime <= catalog.index_time {
                stats.num_files += catalog.files.len() as u64;
                return;
            }

            let opened = if config.check {
                File::open(&index_path)
            } else {
                open_index_rw(&index_path)
            };
            match opened {
                Ok(mut file) => {
                    match reconcile(&mut file, catalog, config, stats) {
                        Ok(true) => index_file = Some(file),
                        // bad magic: treat as no existing index
                        Ok(false) => stats.add_dirs += 1,
                        Err(e) => {
                            output::error(config, "cannot update index file in", &visit.path, &e);
                            return;
                        }
                    }
                }
                Err(_) => stats.add_dirs += 1,
            }
        } else {
            stats.add_dirs += 1;
        }
    }

    if index_file.is_none() && !config.check {
        match create_index(&index_path) {
            Ok(file) => index_file = Some(file),
            Err(e) => output::error(config, "cannot create index file in", &visit.path, &e),
        }
    }

    match index_file {
        Some(mut file) if !config.check => {
            stats.num_files += catalog.files.len() as u64;
            append_entries(&mut file, catalog, &visit.path, config, stats);
        }
        _ => {
            // check mode, or the index could not be created
            stats.add_files += catalog.files.len() as i64;
        }
    }
}

/// Walk the existing records with read cursor `in_pos` and write cursor
/// `out_pos`, keeping, dropping, or invalidating each one. Returns false
/// when the magic does not verify (the caller recreates the index).
fn reconcile(
    file: &mut File,
    catalog: &mut Catalog,
    config: &Config,
    stats: &mut Stats,
) -> io::Result<bool> {
    file.seek(SeekFrom::Start(0))?;
    if !check_magic(file)? {
        return Ok(false);
    }

    let index_time = catalog.index_time;
    let files = &mut catalog.files;
    let mut in_pos = INDEX_MAGIC.len() as u64;
    let mut out_pos = in_pos;

    // an archive produces several records under one basename; the catalog
    // entry must outlive the whole run of them
    let mut postponed: Option<String> = None;

    loop {
        file.seek(SeekFrom::Start(in_pos))?;
        let header = match read_header(file)? {
            Some(h) => h,
            None => break,
        };
        let record_len = match header.record_len() {
            Some(n) => n,
            None => break,
        };

        let mut basename = vec![0u8; header.basename_len as usize];
        if !read_exact_opt(file, &mut basename)? {
            break;
        }

        if let Some(name) = &postponed {
            if name.as_bytes() != &basename[..] {
                // the archive's run of records ended
                if let Some(i) = files.iter().position(|e| e.name == *name) {
                    files.remove(i);
                }
                postponed = None;
            }
        }

        match files.iter().position(|e| e.basename_bytes() == &basename[..]) {
            Some(i) if files[i].mtime <= index_time => {
                // still current: keep, compacting down if records were dropped
                stats.num_files += 1;
                if header.is_binary() && header.logsize() == 0 {
                    stats.bin_files += 1;
                }
                if in_pos > out_pos && !config.check {
                    shift_record(file, in_pos, out_pos, record_len as usize)?;
                }
                if header.is_archive() {
                    postponed = Some(files[i].name.clone());
                } else {
                    files.remove(i);
                }
                out_pos += record_len;
            }
            None => {
                // the file is gone: drop the record
                stats.del_files += 1;
                if config.check {
                    out_pos += record_len;
                } else {
                    stats.sum_hashes_size -= record_len as i64;
                }
            }
            Some(_) => {
                // modified since indexing: drop, the append pass regenerates
                stats.mod_files += 1;
                if config.check {
                    out_pos += record_len;
                } else {
                    stats.add_files -= 1;
                    stats.sum_hashes_size -= record_len as i64;
                }
            }
        }

        in_pos += record_len;
    }

    if let Some(name) = postponed.take() {
        if let Some(i) = files.iter().position(|e| e.name == name) {
            files.remove(i);
        }
    }

    if !config.check {
        truncate_index(file, out_pos)?;
    }

    Ok(true)
}

/// Fingerprint and append every entry still in the catalog.
fn append_entries(
    file: &mut File,
    catalog: &mut Catalog,
    dir: &Path,
    config: &Config,
    stats: &mut Stats,
) {
    for entry in catalog.files.drain(..) {
        if let Err(e) = append_one(file, &entry, config, stats) {
            output::error(config, "cannot write index file in", dir, &e);
            break;
        }
    }
}

/// Index one catalogued file. `Err` means the index file itself could not
/// be written; unreadable content is reported and skipped here.
fn append_one(
    file: &mut File,
    entry: &Entry,
    config: &Config,
    stats: &mut Stats,
) -> io::Result<()> {
    if entry.size == 0 {
        let empty = Fingerprint {
            hashes: Vec::new(),
            noise: 0.0,
            binary: false,
        };
        return write_record(file, entry, &empty, 0, config, stats);
    }

    if config.decompress {
        return append_members(file, entry, config, stats);
    }

    let mut input = match File::open(&entry.path) {
        Ok(f) => f,
        Err(e) => {
            output::error(config, "cannot index", &entry.path, &e);
            return Ok(());
        }
    };
    match Fingerprint::scan(&mut input, config.accuracy, config.ignore_binary) {
        Ok(fp) => write_record(file, entry, &fp, 0, config, stats),
        Err(e) => {
            output::error(config, "cannot index", &entry.path, &e);
            Ok(())
        }
    }
}

/// Index a file through the decompression source, one record per member.
/// Corrupt or unsupported content falls back to the raw bytes.
fn append_members(
    file: &mut File,
    entry: &Entry,
    config: &Config,
    stats: &mut Stats,
) -> io::Result<()> {
    let mut source = match Source::open(&entry.path, config.zmax) {
        Ok(s) => s,
        Err(e) => {
            output::error(config, "cannot index", &entry.path, &e);
            return Ok(());
        }
    };

    let mut corrupt = false;
    loop {
        match source.next_member() {
            Ok(Some(member)) => {
                if member.dir {
                    continue;
                }
                let mut flags = 0u8;
                if member.archive {
                    flags |= RecordHeader::ARCHIVE;
                }
                if member.compressed {
                    flags |= RecordHeader::COMPRESSED;
                }
                match Fingerprint::scan(&mut source, config.accuracy, config.ignore_binary) {
                    Ok(fp) => {
                        write_record(file, entry, &fp, flags, config, stats)?;
                    }
                    Err(e) => {
                        if config.verbose {
                            output::warning(config, &e.to_string(), Some(&entry.path));
                        }
                        corrupt = true;
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                if config.verbose {
                    output::warning(config, &e.to_string(), Some(&entry.path));
                }
                corrupt = true;
                break;
            }
        }
    }
    drop(source);

    if corrupt {
        // corruption ends member iteration; the outer file's raw bytes
        // still get a record so its content stays represented
        let mut input = match File::open(&entry.path) {
            Ok(f) => f,
            Err(e) => {
                output::error(config, "cannot index", &entry.path, &e);
                return Ok(());
            }
        };
        if let Ok(fp) = Fingerprint::scan(&mut input, config.accuracy, config.ignore_binary) {
            write_record(file, entry, &fp, 0, config, stats)?;
        }
    }
    Ok(())
}

/// Append one record and account for it.
fn write_record(
    file: &mut File,
    entry: &Entry,
    fp: &Fingerprint,
    extra_flags: u8,
    config: &Config,
    stats: &mut Stats,
) -> io::Result<()> {
    let mut flags = extra_flags;
    if fp.binary {
        flags |= RecordHeader::BINARY;
    }

    let name = entry.basename_bytes();
    let basename_len = name.len().min(65535);
    let header = RecordHeader::new(
        config.accuracy,
        flags,
        fp.logsize(),
        basename_len as u16,
    );
    append_record(file, &header, &name[..basename_len], &fp.hashes)?;

    stats.add_files += 1;
    stats.sum_hashes_size += header.record_len().unwrap_or(0) as i64;
    if fp.binary && fp.hashes.is_empty() {
        stats.bin_files += 1;
    }
    if !fp.binary || !config.ignore_binary {
        let marker = if extra_flags != 0 {
            'A'
        } else if fp.binary {
            'B'
        } else {
            ' '
        };
        output::verbose_file(config, marker, entry.size, fp.noise, &entry.path);
        stats.sum_files_size += entry.size;
        stats.sum_noise += fp.noise;
    }
    Ok(())
}
