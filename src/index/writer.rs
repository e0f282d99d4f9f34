//! Write side of the index codec: create-with-magic, append, in-place
//! shift, and truncate. The incremental update engine performs all of its
//! I/O through one read-write handle per directory; these primitives keep
//! that handle's positioning explicit.

use crate::index::types::{RecordHeader, INDEX_MAGIC};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Create (or truncate) an index file and write the magic.
pub fn create_index(path: &Path) -> io::Result<File> {
    let mut file = File::create(path)?;
    file.write_all(&INDEX_MAGIC)?;
    Ok(file)
}

/// Open an existing index read-write, positioned at the start.
pub fn open_index_rw(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).write(true).open(path)
}

/// Append one record at the writer's current position.
pub fn append_record<W: Write + ?Sized>(
    writer: &mut W,
    header: &RecordHeader,
    basename: &[u8],
    hashes: &[u8],
) -> io::Result<()> {
    debug_assert_eq!(basename.len(), header.basename_len as usize);
    debug_assert_eq!(Some(hashes.len()), header.hashes_len());
    writer.write_all(&header.to_bytes())?;
    writer.write_all(basename)?;
    writer.write_all(hashes)
}

/// Move `len` bytes of a kept record from `in_pos` down to `out_pos`.
/// Record sizes are bounded (4 + 65535 + 65536), so one buffer suffices.
pub fn shift_record(file: &mut File, in_pos: u64, out_pos: u64, len: usize) -> io::Result<()> {
    debug_assert!(out_pos <= in_pos);
    let mut buf = vec![0u8; len];
    file.seek(SeekFrom::Start(in_pos))?;
    file.read_exact(&mut buf)?;
    file.seek(SeekFrom::Start(out_pos))?;
    file.write_all(&buf)
}

/// Truncate the index to `len` bytes and leave the handle positioned there.
pub fn truncate_index(file: &mut File, len: u64) -> io::Result<()> {
    file.set_len(len)?;
    file.seek(SeekFrom::Start(len))?;
    Ok(())
}
