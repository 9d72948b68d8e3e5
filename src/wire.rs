//! Cursor-based reader for the protobuf wire format.
//!
//! A [`ByteReader`] owns a flat copy of one byte range and walks it with a
//! cursor. Nested messages are read by slicing out their length-delimited
//! body into a new reader, so a sub-message can never read past its own
//! declared bound even when the enclosing buffer has trailing bytes.
//!
//! See <https://protobuf.dev/programming-guides/encoding/> for the wire
//! format itself.

use thiserror::Error;

/// Maximum number of bytes in an encoded varint.
///
/// 64 value bits at 7 bits per byte need 9 full bytes plus one bit of a
/// tenth byte.
const MAX_VARINT_LEN: usize = 10;

/// Errors raised by primitive wire reads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// A read requested more bytes than remain in the current bound, or a
    /// varint had no terminating byte within its allowed length.
    #[error("buffer underrun at offset {offset}: needed {needed} bytes, {remaining} remain")]
    BufferUnderrun {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    /// A tag carried a wire type outside {0, 1, 2, 5}.
    #[error("unknown wire type {0}")]
    UnknownWireType(u64),
}

/// How a field's value is physically encoded on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WireType {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl WireType {
    fn from_raw(raw: u64) -> Result<Self, WireError> {
        match raw {
            0 => Ok(Self::Varint),
            1 => Ok(Self::Fixed64),
            2 => Ok(Self::LengthDelimited),
            5 => Ok(Self::Fixed32),
            other => Err(WireError::UnknownWireType(other)),
        }
    }
}

/// A decoded field tag: field number plus wire type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub field: u64,
    pub wire: WireType,
}

/// Cursor over an owned, bounded byte range.
pub struct ByteReader {
    buf: Vec<u8>,
    pos: usize,
}

impl ByteReader {
    /// Create a reader over an owned copy of `bytes`.
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            buf: bytes.to_vec(),
            pos: 0,
        }
    }

    fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor offset within this reader's bound.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left before this reader's bound.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True once the cursor has reached the end of the bound.
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn underrun(&self, needed: usize) -> WireError {
        WireError::BufferUnderrun {
            offset: self.pos,
            needed,
            remaining: self.remaining(),
        }
    }

    /// Read a varint of up to 64 bits.
    pub fn read_varint(&mut self) -> Result<u64, WireError> {
        let mut value: u64 = 0;
        for index in 0..MAX_VARINT_LEN {
            let Some(&byte) = self.buf.get(self.pos + index) else {
                return Err(self.underrun(index + 1));
            };
            // High bit is the continuation bit, low 7 bits are payload.
            value |= ((byte & 0x7f) as u64) << (index * 7);
            if byte & 0x80 == 0 {
                self.pos += index + 1;
                return Ok(value);
            }
        }
        // No terminator within 10 bytes. The upstream feed occasionally
        // truncates mid-field, so this is reported as an underrun rather
        // than a distinct error.
        Err(self.underrun(MAX_VARINT_LEN + 1))
    }

    /// Read a varint and reinterpret its low 32 bits as two's-complement.
    ///
    /// This is deliberately NOT zigzag decoding. The vendor feed encodes
    /// signed delay/uncertainty fields as plain varints, so `-1` arrives as
    /// ten bytes of `0xff..0x01` and truncates back to `-1` here.
    pub fn read_signed_varint32(&mut self) -> Result<i32, WireError> {
        Ok(self.read_varint()? as u32 as i32)
    }

    fn read_exact<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let Some(bytes) = self.buf.get(self.pos..self.pos + N) else {
            return Err(self.underrun(N));
        };
        let arr: [u8; N] = bytes.try_into().unwrap();
        self.pos += N;
        Ok(arr)
    }

    /// Read a little-endian IEEE-754 single-precision float.
    pub fn read_float32(&mut self) -> Result<f32, WireError> {
        Ok(f32::from_le_bytes(self.read_exact::<4>()?))
    }

    /// Read a little-endian IEEE-754 double-precision float.
    pub fn read_float64(&mut self) -> Result<f64, WireError> {
        Ok(f64::from_le_bytes(self.read_exact::<8>()?))
    }

    /// Read a varint length prefix, then a copy of exactly that many bytes.
    pub fn read_length_delimited(&mut self) -> Result<Vec<u8>, WireError> {
        let len = self.read_varint()? as usize;
        let Some(bytes) = self
            .pos
            .checked_add(len)
            .and_then(|end| self.buf.get(self.pos..end))
        else {
            return Err(self.underrun(len));
        };
        let out = bytes.to_vec();
        self.pos += len;
        Ok(out)
    }

    /// Read a length-delimited field and wrap it in a reader scoped to
    /// exactly those bytes.
    pub fn sub_reader(&mut self) -> Result<ByteReader, WireError> {
        Ok(ByteReader::from_vec(self.read_length_delimited()?))
    }

    /// Read one field tag.
    pub fn read_tag(&mut self) -> Result<Tag, WireError> {
        let raw = self.read_varint()?;
        Ok(Tag {
            field: raw >> 3,
            wire: WireType::from_raw(raw & 0x7)?,
        })
    }

    /// Advance the cursor past one field value of the given wire type.
    pub fn skip(&mut self, wire: WireType) -> Result<(), WireError> {
        match wire {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => {
                self.read_exact::<8>()?;
            }
            WireType::LengthDelimited => {
                let len = self.read_varint()? as usize;
                if self.remaining() < len {
                    return Err(self.underrun(len));
                }
                self.pos += len;
            }
            WireType::Fixed32 => {
                self.read_exact::<4>()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn encode_varint(mut val: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(MAX_VARINT_LEN);
    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val != 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
        if val == 0 {
            return bytes;
        }
    }
}
