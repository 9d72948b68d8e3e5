//! Schema-free diagnostic walker over raw feed bytes.
//!
//! Walks tag / wire-type / value triples without assuming any field
//! identity, recursing into length-delimited fields up to a fixed depth and
//! reporting every plausible interpretation of each value. This is the tool
//! used to reverse-engineer a vendor's renumbered schema before picking a
//! [`crate::schema::FeedSchema`]; it never feeds the production decode path.

use std::fmt::Write;

use crate::wire::{ByteReader, WireError, WireType};

/// Deep enough for feed -> entity -> trip update -> stop time -> event.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Render a field-by-field report of `bytes` as an indented text tree.
///
/// Never fails: a malformed region is reported in place and the walk stops
/// at that bound.
pub fn inspect(bytes: &[u8], max_depth: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "input: {} bytes", bytes.len());
    let mut reader = ByteReader::new(bytes);
    if let Err(err) = walk(&mut reader, 0, max_depth, &mut out) {
        let _ = writeln!(out, "!! walk stopped: {err}");
    }
    out
}

fn walk(
    reader: &mut ByteReader,
    depth: usize,
    max_depth: usize,
    out: &mut String,
) -> Result<(), WireError> {
    let indent = "  ".repeat(depth);
    while !reader.is_exhausted() {
        let tag = reader.read_tag()?;
        match tag.wire {
            WireType::Varint => {
                let value = reader.read_varint()?;
                let _ = writeln!(
                    out,
                    "{indent}field {} varint = {value} (i32: {})",
                    tag.field, value as u32 as i32
                );
            }
            WireType::Fixed64 => {
                let value = reader.read_float64()?;
                let _ = writeln!(
                    out,
                    "{indent}field {} fixed64 = {value} (bits: 0x{:016x})",
                    tag.field,
                    value.to_bits()
                );
            }
            WireType::Fixed32 => {
                let value = reader.read_float32()?;
                let _ = writeln!(
                    out,
                    "{indent}field {} fixed32 = {value} (bits: 0x{:08x})",
                    tag.field,
                    value.to_bits()
                );
            }
            WireType::LengthDelimited => {
                let body = reader.read_length_delimited()?;
                let _ = writeln!(out, "{indent}field {} len = {}", tag.field, body.len());
                describe_len_body(&body, depth, max_depth, out);
            }
        }
    }
    Ok(())
}

/// A length-delimited body may be a nested message, a string, or raw bytes.
/// Try the message reading first; if the bytes don't walk cleanly, fall
/// back to a string or hex preview.
fn describe_len_body(body: &[u8], depth: usize, max_depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth + 1);
    if body.is_empty() {
        return;
    }

    if depth + 1 < max_depth {
        let mut nested = String::new();
        let mut sub = ByteReader::new(body);
        if walk(&mut sub, depth + 1, max_depth, &mut nested).is_ok() {
            out.push_str(&nested);
            return;
        }
    }

    if body.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        let _ = writeln!(out, "{indent}as string: {:?}", String::from_utf8_lossy(body));
    } else {
        let _ = writeln!(out, "{indent}as bytes: {}", crate::parser::hex_preview(body));
    }
}
