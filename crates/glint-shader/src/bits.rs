//! Bit-level packing primitives shared by every target.
//!
//! Fields are addressed by an absolute bit offset into a byte buffer. Bits are numbered LSB-first
//! within little-endian bytes: bit `n` lives in byte `n / 8` at bit position `n % 8`. Fields may
//! start and end anywhere; widths need not be multiples of 8.
//!
//! Values that do not fit their field are rejected with [`FieldOverflow`]. They are never masked,
//! since a silently truncated operand would still decode to *something*.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("value {value} does not fit in {width}-bit field at bit {offset}")]
pub struct FieldOverflow {
    pub offset: usize,
    pub width: u32,
    pub value: i128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BitsError {
    #[error(transparent)]
    Overflow(#[from] FieldOverflow),
    #[error("{width}-bit field at bit {offset} lies outside the {len_bits}-bit range")]
    OutOfBounds {
        offset: usize,
        width: u32,
        len_bits: usize,
    },
    #[error("invalid field width {0}")]
    InvalidWidth(u32),
}

/// A field at a fixed position relative to the start of an instruction word (or operand slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    pub offset: u32,
    pub width: u32,
}

impl Field {
    pub const fn new(offset: u32, width: u32) -> Self {
        Self { offset, width }
    }

    /// Bit just past the end of the field.
    pub const fn end(&self) -> u32 {
        self.offset + self.width
    }

    /// The same field relocated into a sub-word starting at `base` (relative offsets compose).
    pub const fn within(&self, base: u32) -> Self {
        Self::new(base + self.offset, self.width)
    }

    pub fn write(&self, buf: &mut Vec<u8>, base: usize, value: u64) -> Result<(), FieldOverflow> {
        write_field(buf, base + self.offset as usize, self.width, value)
    }

    pub fn write_signed(
        &self,
        buf: &mut Vec<u8>,
        base: usize,
        value: i64,
    ) -> Result<(), FieldOverflow> {
        write_signed_field(buf, base + self.offset as usize, self.width, value)
    }
}

/// Writes `value` into `width` bits at bit `offset`, growing `buf` with zero bytes as needed.
///
/// Bits of `buf` outside the field are preserved. Widths above 64 are accepted; the bits past the
/// 64th are written as zero.
pub fn write_field(
    buf: &mut Vec<u8>,
    offset: usize,
    width: u32,
    value: u64,
) -> Result<(), FieldOverflow> {
    if width < 64 && value >> width != 0 {
        return Err(FieldOverflow {
            offset,
            width,
            value: i128::from(value),
        });
    }

    let end = offset + width as usize;
    let needed = end.div_ceil(8);
    if buf.len() < needed {
        buf.resize(needed, 0);
    }

    let mut bit = offset;
    let mut remaining = width as usize;
    let mut value = value;
    while remaining > 0 {
        let byte = bit / 8;
        let shift = bit % 8;
        let take = (8 - shift).min(remaining);
        let mask = (((1u16 << take) - 1) as u8) << shift;
        buf[byte] = (buf[byte] & !mask) | (((value as u8) << shift) & mask);
        value >>= take;
        bit += take;
        remaining -= take;
    }
    Ok(())
}

/// Reads `width` bits at bit `offset`. Reads past the end of `buf` are errors, never zero-filled.
pub fn read_field(buf: &[u8], offset: usize, width: u32) -> Result<u64, BitsError> {
    if width > 64 {
        return Err(BitsError::InvalidWidth(width));
    }
    let len_bits = buf.len() * 8;
    match offset.checked_add(width as usize) {
        Some(end) if end <= len_bits => {}
        _ => {
            return Err(BitsError::OutOfBounds {
                offset,
                width,
                len_bits,
            })
        }
    }

    let mut out = 0u64;
    let mut bit = offset;
    let mut got = 0usize;
    while got < width as usize {
        let shift = bit % 8;
        let take = (8 - shift).min(width as usize - got);
        let byte = buf.get(bit / 8).copied().unwrap_or(0);
        let chunk = u64::from(byte >> shift) & ((1u64 << take) - 1);
        out |= chunk << got;
        bit += take;
        got += take;
    }
    Ok(out)
}

/// Two's-complement variant of [`write_field`]. `width` must be in `1..=64`.
pub fn write_signed_field(
    buf: &mut Vec<u8>,
    offset: usize,
    width: u32,
    value: i64,
) -> Result<(), FieldOverflow> {
    let overflow = FieldOverflow {
        offset,
        width,
        value: i128::from(value),
    };
    if width == 0 || width > 64 {
        return Err(overflow);
    }
    let min = -(1i128 << (width - 1));
    let max = (1i128 << (width - 1)) - 1;
    if !(min..=max).contains(&i128::from(value)) {
        return Err(overflow);
    }
    let raw = if width == 64 {
        value as u64
    } else {
        (value as u64) & ((1u64 << width) - 1)
    };
    write_field(buf, offset, width, raw)
}

/// Two's-complement variant of [`read_field`]; the result is sign-extended from `width` bits.
pub fn read_signed_field(buf: &[u8], offset: usize, width: u32) -> Result<i64, BitsError> {
    if width == 0 {
        return Err(BitsError::InvalidWidth(width));
    }
    let raw = read_field(buf, offset, width)?;
    let shift = 64 - width;
    Ok(((raw << shift) as i64) >> shift)
}

/// A window `[position, end)` of bits being decoded.
///
/// Cursors are plain values: every step returns a new cursor instead of mutating shared state, so
/// independent blobs can be decoded concurrently and a failed step leaves the caller's cursor
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitCursor {
    pub position: usize,
    pub end: usize,
}

impl BitCursor {
    pub fn new(position: usize, end: usize) -> Self {
        Self { position, end }
    }

    /// Cursor spanning all of `buf`.
    pub fn over(buf: &[u8]) -> Self {
        Self::new(0, buf.len() * 8)
    }

    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.position)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Byte containing the cursor position.
    pub fn byte_offset(&self) -> usize {
        self.position / 8
    }

    pub fn advance(self, bits: usize) -> Result<Self, BitsError> {
        if bits > self.remaining() {
            return Err(self.out_of_bounds(0, bits));
        }
        Ok(Self::new(self.position + bits, self.end))
    }

    /// Absolute bit offset of `field`, which is laid out relative to the cursor position.
    pub fn field(&self, field: Field) -> Result<usize, BitsError> {
        if field.end() as usize > self.remaining() {
            return Err(self.out_of_bounds(field.offset as usize, field.width as usize));
        }
        Ok(self.position + field.offset as usize)
    }

    pub fn read(&self, buf: &[u8], field: Field) -> Result<u64, BitsError> {
        read_field(buf, self.field(field)?, field.width)
    }

    pub fn read_signed(&self, buf: &[u8], field: Field) -> Result<i64, BitsError> {
        read_signed_field(buf, self.field(field)?, field.width)
    }

    /// Splits off the next `bits` bits: returns `(head, rest)`.
    pub fn split(self, bits: usize) -> Result<(Self, Self), BitsError> {
        let rest = self.advance(bits)?;
        Ok((Self::new(self.position, rest.position), rest))
    }

    fn out_of_bounds(&self, offset: usize, width: usize) -> BitsError {
        BitsError::OutOfBounds {
            offset: self.position + offset,
            width: u32::try_from(width).unwrap_or(u32::MAX),
            len_bits: self.end,
        }
    }
}
