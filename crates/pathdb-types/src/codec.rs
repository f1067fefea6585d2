//! Order-preserving path ↔ key codec.
//!
//! A [`Path`] is stored under a single flat byte key. The encoding keeps the
//! store's plain byte ordering identical to segment-wise path ordering, so
//! that a directory and everything below it occupy one contiguous key range.
//!
//! # Format
//!
//! ```text
//! key     = segment *( SEP segment )        ; root path = empty key
//! SEP     = 0x00
//! segment = 1*( 0x01 0x01                   ; literal 0x00
//!             / 0x01 0x02                   ; literal 0x01
//!             / 0x02-0xFF )                 ; literal byte
//! ```
//!
//! Encoded segment bytes are always `>= 0x01`, so the separator sorts below
//! every segment continuation: `a` < `a SEP b` < `a SEP c` < `ab`.

use crate::error::TypeError;
use crate::path::{Path, SEPARATOR};

/// Byte joining encoded segments.
pub const SEP: u8 = 0x00;

/// Byte introducing an escape sequence inside a segment.
pub const ESCAPE: u8 = 0x01;

/// Encode a path into its sortable key.
pub fn encode(path: &Path) -> Vec<u8> {
    let hint: usize = path.segments().iter().map(|s| s.len() + 1).sum();
    let mut key = Vec::with_capacity(hint);
    for (i, segment) in path.segments().iter().enumerate() {
        if i > 0 {
            key.push(SEP);
        }
        encode_segment(segment.as_bytes(), &mut key);
    }
    key
}

fn encode_segment(segment: &[u8], out: &mut Vec<u8>) {
    for &b in segment {
        match b {
            0x00 => out.extend_from_slice(&[ESCAPE, 0x01]),
            0x01 => out.extend_from_slice(&[ESCAPE, 0x02]),
            _ => out.push(b),
        }
    }
}

/// Decode a key back into the path it was encoded from.
///
/// Fails with [`TypeError::InvalidEncoding`] on empty segments, broken
/// escape sequences, non-UTF-8 segments, or a literal `/` inside a segment.
pub fn decode(key: &[u8]) -> Result<Path, TypeError> {
    if key.is_empty() {
        return Ok(Path::root());
    }

    let mut segments = Vec::new();
    let mut current = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < key.len() {
        match key[i] {
            SEP => {
                segments.push(finish_segment(&mut current, start)?);
                start = i + 1;
            }
            ESCAPE => {
                let literal = match key.get(i + 1) {
                    Some(0x01) => 0x00,
                    Some(0x02) => 0x01,
                    Some(other) => {
                        return Err(invalid(i + 1, format!("bad escape 0x{other:02x}")));
                    }
                    None => return Err(invalid(i, "dangling escape byte")),
                };
                current.push(literal);
                i += 1;
            }
            b => current.push(b),
        }
        i += 1;
    }
    segments.push(finish_segment(&mut current, start)?);

    Ok(Path::from_validated(segments))
}

fn finish_segment(current: &mut Vec<u8>, start: usize) -> Result<String, TypeError> {
    if current.is_empty() {
        return Err(invalid(start, "empty segment"));
    }
    let bytes = std::mem::take(current);
    let segment =
        String::from_utf8(bytes).map_err(|e| invalid(start, format!("segment is not UTF-8: {e}")))?;
    if segment.contains(SEPARATOR) {
        return Err(invalid(start, "segment contains '/'"));
    }
    Ok(segment)
}

fn invalid(offset: usize, reason: impl Into<String>) -> TypeError {
    TypeError::InvalidEncoding {
        offset,
        reason: reason.into(),
    }
}

/// First key of the range holding every strict descendant of `path`.
///
/// For the root this is the empty key (the whole keyspace).
pub fn child_range_start(path: &Path) -> Vec<u8> {
    let mut key = encode(path);
    if !path.is_root() {
        key.push(SEP);
    }
    key
}

/// Smallest key greater than `path` and every key below it.
///
/// Returns `None` for the root, whose subtree has no upper bound.
pub fn subtree_end(path: &Path) -> Option<Vec<u8>> {
    if path.is_root() {
        return None;
    }
    let mut key = encode(path);
    key.push(SEP + 1);
    Some(key)
}

/// Smallest key strictly greater than `key`.
pub fn key_successor(key: &[u8]) -> Vec<u8> {
    let mut next = Vec::with_capacity(key.len() + 1);
    next.extend_from_slice(key);
    next.push(0x00);
    next
}
