//! Archive and compressed-file member streams for option `-z`.
//!
//! A [`Source`] exposes one file as a sequence of named member byte
//! streams: a gzip file yields its decompressed bytes as a single unnamed
//! member, a tar or zip container yields one member per entry, and any
//! other file yields itself. The `zmax` parameter bounds the number of
//! decompression stages applied (a plain tar costs 1, a `.tar.gz` costs 2);
//! beyond the budget, content is passed through as opaque bytes.
//!
//! Container parsing is intentionally small: ustar headers for tar, local
//! file headers (stored or deflate) for zip. Zip entries that defer their
//! sizes to a data descriptor are treated as unsupported.

use flate2::read::{DeflateDecoder, GzDecoder};
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_LOCAL_MAGIC: [u8; 4] = *b"PK\x03\x04";
const TAR_BLOCK: usize = 512;

/// Description of the member currently readable from the source.
#[derive(Debug, Clone)]
pub struct Member {
    /// Member pathname inside an archive; empty for a non-archive file.
    pub name: String,
    /// Directory entry inside an archive: drained, never fingerprinted.
    pub dir: bool,
    /// Some decompression stage was applied to the member's bytes.
    pub compressed: bool,
    /// The outer file is a multi-member container.
    pub archive: bool,
}

enum State {
    /// Single member: the (possibly gzip-unwrapped) stream itself.
    Plain {
        reader: Box<dyn Read>,
        yielded: bool,
    },
    /// Streaming ustar reader; the current member is counted off `reader`.
    Tar {
        reader: Box<dyn Read>,
        remaining: u64,
        padding: u64,
    },
    /// Zip local-header reader; each member is materialized, then decoded.
    Zip {
        reader: Box<dyn Read>,
        member: Option<Box<dyn Read>>,
    },
}

/// An open file viewed as a sequence of member byte streams. The source
/// itself implements [`Read`] for the current member; calling
/// [`Source::next_member`] drains whatever is left of it.
pub struct Source {
    state: State,
    /// Gzip stages applied outside the container.
    outer_compressed: bool,
    /// Stages spent so far, bounded by `zmax`.
    stages: u32,
    zmax: u32,
}

impl Source {
    /// Open `path` and sniff its decompression chain: gzip layers unwrap
    /// while stage budget remains, then a tar or zip container consumes one
    /// more stage. Anything else is a single plain member.
    pub fn open(path: &Path, zmax: u32) -> io::Result<Source> {
        let file = File::open(path)?;
        let mut reader: Box<dyn Read> = Box::new(BufReader::new(file));
        let mut stages = 0u32;
        let mut outer_compressed = false;

        loop {
            let mut head = [0u8; TAR_BLOCK];
            let n = read_up_to(&mut reader, &mut head)?;

            if n >= 2 && head[..2] == GZIP_MAGIC && stages < zmax {
                stages += 1;
                outer_compressed = true;
                reader = Box::new(GzDecoder::new(rechain(&head[..n], reader)));
                continue;
            }

            let state = if n == TAR_BLOCK && &head[257..262] == b"ustar" && stages < zmax {
                stages += 1;
                State::Tar {
                    reader: rechain(&head[..n], reader),
                    remaining: 0,
                    padding: 0,
                }
            } else if n >= 4 && head[..4] == ZIP_LOCAL_MAGIC && stages < zmax {
                stages += 1;
                State::Zip {
                    reader: rechain(&head[..n], reader),
                    member: None,
                }
            } else {
                State::Plain {
                    reader: rechain(&head[..n], reader),
                    yielded: false,
                }
            };

            return Ok(Source {
                state,
                outer_compressed,
                stages,
                zmax,
            });
        }
    }

    /// Advance to the next member, draining the remainder of the current
    /// one. `None` when the source is exhausted.
    pub fn next_member(&mut self) -> io::Result<Option<Member>> {
        let outer_compressed = self.outer_compressed;
        let unwrap_members = self.stages < self.zmax;
        match &mut self.state {
            State::Plain { yielded, .. } => {
                if *yielded {
                    return Ok(None);
                }
                *yielded = true;
                Ok(Some(Member {
                    name: String::new(),
                    dir: false,
                    compressed: outer_compressed,
                    archive: false,
                }))
            }
            State::Tar {
                reader,
                remaining,
                padding,
            } => {
                discard(reader, *remaining + *padding)?;
                *remaining = 0;
                *padding = 0;

                loop {
                    let mut block = [0u8; TAR_BLOCK];
                    if !read_exact_or_eof(reader, &mut block)? {
                        return Ok(None);
                    }
                    if block.iter().all(|&b| b == 0) {
                        return Ok(None);
                    }
                    if &block[257..262] != b"ustar" {
                        return Err(invalid("malformed tar header"));
                    }
                    let size = parse_octal(&block[124..136])
                        .ok_or_else(|| invalid("bad tar size field"))?;
                    *remaining = size;
                    *padding = (TAR_BLOCK as u64 - size % TAR_BLOCK as u64) % TAR_BLOCK as u64;

                    let mut name = tar_name(&block);
                    match block[156] {
                        b'0' | 0 => {
                            return Ok(Some(Member {
                                name,
                                dir: false,
                                compressed: outer_compressed,
                                archive: true,
                            }));
                        }
                        b'5' => {
                            if !name.ends_with('/') {
                                name.push('/');
                            }
                            return Ok(Some(Member {
                                name,
                                dir: true,
                                compressed: outer_compressed,
                                archive: true,
                            }));
                        }
                        _ => {
                            // links, pax headers, extensions: skip the entry
                            discard(reader, *remaining + *padding)?;
                            *remaining = 0;
                            *padding = 0;
                        }
                    }
                }
            }
            State::Zip { reader, member } => {
                *member = None;

                let mut sig = [0u8; 4];
                if !read_exact_or_eof(reader, &mut sig)? {
                    return Ok(None);
                }
                if sig != ZIP_LOCAL_MAGIC {
                    // central directory: no more members
                    return Ok(None);
                }

                let mut fixed = [0u8; 26];
                if !read_exact_or_eof(reader, &mut fixed)? {
                    return Err(invalid("truncated zip local header"));
                }
                let flags = u16_le(&fixed[2..4]);
                let method = u16_le(&fixed[4..6]);
                let comp_size = u32_le(&fixed[14..18]) as u64;
                let name_len = u16_le(&fixed[22..24]) as usize;
                let extra_len = u16_le(&fixed[24..26]) as u64;

                if flags & 0x08 != 0 {
                    return Err(invalid("zip data descriptor not supported"));
                }

                let mut name_bytes = vec![0u8; name_len];
                if !read_exact_or_eof(reader, &mut name_bytes)? {
                    return Err(invalid("truncated zip entry name"));
                }
                discard(reader, extra_len)?;

                let mut data = vec![0u8; comp_size as usize];
                if !read_exact_or_eof(reader, &mut data)? {
                    return Err(invalid("truncated zip entry data"));
                }

                let name = String::from_utf8_lossy(&name_bytes).into_owned();
                let dir = name.ends_with('/');

                let mut decoded: Box<dyn Read> = match method {
                    0 => Box::new(Cursor::new(data)),
                    8 => Box::new(DeflateDecoder::new(Cursor::new(data))),
                    _ => return Err(invalid("unsupported zip compression method")),
                };
                let mut compressed = method == 8 || outer_compressed;

                // a gzip stream inside the archive unwraps while budget remains
                if unwrap_members && !dir {
                    let mut peek = [0u8; 2];
                    let n = read_up_to(&mut decoded, &mut peek)?;
                    if n == 2 && peek == GZIP_MAGIC {
                        decoded = Box::new(GzDecoder::new(rechain(&peek[..n], decoded)));
                        compressed = true;
                    } else {
                        decoded = rechain(&peek[..n], decoded);
                    }
                }

                *member = Some(decoded);
                Ok(Some(Member {
                    name,
                    dir,
                    compressed,
                    archive: true,
                }))
            }
        }
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.state {
            State::Plain { reader, .. } => reader.read(buf),
            State::Tar {
                reader, remaining, ..
            } => {
                if *remaining == 0 {
                    return Ok(0);
                }
                let want = buf.len().min(*remaining as usize);
                let n = reader.read(&mut buf[..want])?;
                if n == 0 {
                    return Err(invalid("tar entry truncated"));
                }
                *remaining -= n as u64;
                Ok(n)
            }
            State::Zip { member, .. } => match member {
                Some(reader) => reader.read(buf),
                None => Ok(0),
            },
        }
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

fn rechain(head: &[u8], rest: Box<dyn Read>) -> Box<dyn Read> {
    Box::new(Cursor::new(head.to_vec()).chain(rest))
}

fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match reader.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

fn read_exact_or_eof<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    if buf.is_empty() {
        return Ok(true);
    }
    let n = read_up_to(reader, buf)?;
    if n == 0 {
        return Ok(false);
    }
    if n < buf.len() {
        return Err(invalid("unexpected end of stream"));
    }
    Ok(true)
}

fn discard<R: Read + ?Sized>(reader: &mut R, len: u64) -> io::Result<()> {
    if len > 0 {
        io::copy(&mut reader.take(len), &mut io::sink())?;
    }
    Ok(())
}

/// Octal size field: optional leading spaces, digits, NUL/space terminated.
fn parse_octal(field: &[u8]) -> Option<u64> {
    let mut value: u64 = 0;
    let mut seen = false;
    for &b in field {
        match b {
            b' ' if !seen => continue,
            b'0'..=b'7' => {
                seen = true;
                value = value.checked_mul(8)?.checked_add((b - b'0') as u64)?;
            }
            b'\0' | b' ' => break,
            _ => return None,
        }
    }
    seen.then_some(value)
}

fn tar_name(block: &[u8; TAR_BLOCK]) -> String {
    let name = field_str(&block[0..100]);
    let prefix = field_str(&block[345..500]);
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn field_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
