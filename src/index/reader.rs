//! Read side of the index codec.
//!
//! An index file is the 5-byte magic followed by concatenated records. The
//! reader is deliberately forgiving about the tail: it stops at the last
//! complete record on EOF, short reads, or an out-of-range logsize, and
//! never fails on a malformed tail. A writer may have been interrupted
//! mid-record; readers must tolerate that.

use crate::index::types::{RecordHeader, INDEX_FILENAME, INDEX_MAGIC};
use anyhow::Result;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// One fully materialized record.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub header: RecordHeader,
    pub basename: Vec<u8>,
    pub hashes: Vec<u8>,
}

impl IndexRecord {
    pub fn basename_str(&self) -> String {
        String::from_utf8_lossy(&self.basename).into_owned()
    }
}

/// Read exactly `buf.len()` bytes; `Ok(false)` on EOF or a short tail.
pub fn read_exact_opt<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut n = 0;
    while n < buf.len() {
        match reader.read(&mut buf[n..]) {
            Ok(0) => return Ok(false),
            Ok(k) => n += k,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Read and verify the 5-byte magic at the current position.
pub fn check_magic<R: Read + ?Sized>(reader: &mut R) -> std::io::Result<bool> {
    let mut magic = [0u8; 5];
    Ok(read_exact_opt(reader, &mut magic)? && magic == INDEX_MAGIC)
}

/// Read a record header at the current position; `None` ends iteration.
pub fn read_header<R: Read + ?Sized>(reader: &mut R) -> std::io::Result<Option<RecordHeader>> {
    let mut bytes = [0u8; RecordHeader::SIZE];
    if !read_exact_opt(reader, &mut bytes)? {
        return Ok(None);
    }
    Ok(Some(RecordHeader::from_bytes(bytes)))
}

/// Sequential record reader over any byte stream.
pub struct IndexReader<R> {
    inner: R,
}

impl IndexReader<BufReader<File>> {
    /// Open the index of `dir`. `None` when the file is absent or its magic
    /// does not verify (both mean "no usable index").
    pub fn open(dir: &Path) -> Result<Option<IndexReader<BufReader<File>>>> {
        let path = dir.join(INDEX_FILENAME);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(_) => return Ok(None),
        };
        IndexReader::from_reader(BufReader::new(file))
    }
}

impl<R: Read> IndexReader<R> {
    /// Wrap a stream positioned at the magic. `None` when the magic is bad.
    pub fn from_reader(mut inner: R) -> Result<Option<IndexReader<R>>> {
        if !check_magic(&mut inner)? {
            return Ok(None);
        }
        Ok(Some(IndexReader { inner }))
    }

    /// The next complete record, or `None` at the end of the valid prefix.
    pub fn next_record(&mut self) -> Result<Option<IndexRecord>> {
        let header = match read_header(&mut self.inner)? {
            Some(h) => h,
            None => return Ok(None),
        };
        let hashes_len = match header.hashes_len() {
            Some(n) => n,
            None => return Ok(None),
        };

        let mut basename = vec![0u8; header.basename_len as usize];
        if !read_exact_opt(&mut self.inner, &mut basename)? {
            return Ok(None);
        }

        let mut hashes = vec![0u8; hashes_len];
        if !read_exact_opt(&mut self.inner, &mut hashes)? {
            return Ok(None);
        }

        Ok(Some(IndexRecord {
            header,
            basename,
            hashes,
        }))
    }

    /// Collect every complete record.
    pub fn records(&mut self) -> Result<Vec<IndexRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Convenience: all records of the index in `dir`, or `None` when the
/// directory has no usable index.
pub fn read_dir_index(dir: &Path) -> Result<Option<Vec<IndexRecord>>> {
    match IndexReader::open(dir)? {
        Some(mut reader) => Ok(Some(reader.records()?)),
        None => Ok(None),
    }
}
