//! Bounds-checked little-endian reads over a borrowed byte slice
//!
//! Every structure in a studio model is addressed by offsets stored inside
//! the buffer itself. `ByteView` validates each read against the slice
//! length so a corrupt offset surfaces as [`Error::OutOfBounds`] instead of
//! a panic.

use byteorder::{ByteOrder, LittleEndian};
use glam::{Quat, Vec3};

use crate::error::{Error, Result};

/// How an offset field is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetEncoding {
    /// `i32` relative to the start of the owning structure (0 = absent).
    Relative32,
    /// `u16` relative to the field's own position (0 = absent).
    Fix16,
}

impl OffsetEncoding {
    /// Width of the stored offset in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            OffsetEncoding::Relative32 => 4,
            OffsetEncoding::Fix16 => 2,
        }
    }
}

/// A borrowed, bounds-checked view over a byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    data: &'a [u8],
}

impl<'a> ByteView<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(Error::OutOfBounds {
                offset,
                len,
                size: self.data.len(),
            })
    }

    /// A sub-view of `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<ByteView<'a>> {
        self.bytes(offset, len).map(ByteView::new)
    }

    /// A sub-view from `offset` to the end of the buffer.
    pub fn tail(&self, offset: usize) -> Result<ByteView<'a>> {
        self.bytes(offset, self.data.len().saturating_sub(offset))
            .map(ByteView::new)
    }

    pub fn u8(&self, offset: usize) -> Result<u8> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub fn i8(&self, offset: usize) -> Result<i8> {
        Ok(self.u8(offset)? as i8)
    }

    pub fn u16(&self, offset: usize) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.bytes(offset, 2)?))
    }

    pub fn i16(&self, offset: usize) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.bytes(offset, 2)?))
    }

    pub fn u32(&self, offset: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.bytes(offset, 4)?))
    }

    pub fn i32(&self, offset: usize) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.bytes(offset, 4)?))
    }

    pub fn u64(&self, offset: usize) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.bytes(offset, 8)?))
    }

    pub fn i64(&self, offset: usize) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.bytes(offset, 8)?))
    }

    pub fn f32(&self, offset: usize) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.bytes(offset, 4)?))
    }

    /// Half-precision float widened to `f32`.
    pub fn f16(&self, offset: usize) -> Result<f32> {
        Ok(half::f16::from_bits(self.u16(offset)?).to_f32())
    }

    pub fn vec3(&self, offset: usize) -> Result<Vec3> {
        let b = self.bytes(offset, 12)?;
        Ok(Vec3::new(
            LittleEndian::read_f32(&b[0..4]),
            LittleEndian::read_f32(&b[4..8]),
            LittleEndian::read_f32(&b[8..12]),
        ))
    }

    /// Quaternion stored as `x, y, z, w`.
    pub fn quat(&self, offset: usize) -> Result<Quat> {
        let b = self.bytes(offset, 16)?;
        Ok(Quat::from_xyzw(
            LittleEndian::read_f32(&b[0..4]),
            LittleEndian::read_f32(&b[4..8]),
            LittleEndian::read_f32(&b[8..12]),
            LittleEndian::read_f32(&b[12..16]),
        ))
    }

    /// Row-major 3x4 matrix.
    pub fn matrix3x4(&self, offset: usize) -> Result<[f32; 12]> {
        let b = self.bytes(offset, 48)?;
        let mut out = [0.0f32; 12];
        LittleEndian::read_f32_into(b, &mut out);
        Ok(out)
    }

    /// NUL-terminated string starting at `offset`.
    pub fn cstr(&self, offset: usize) -> Result<String> {
        let tail = self.tail(offset)?.as_bytes();
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
    }

    /// Fixed-size inline string field, truncated at the first NUL.
    pub fn fixed_str(&self, offset: usize, len: usize) -> Result<String> {
        let raw = self.bytes(offset, len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Four-byte magic at `offset`.
    pub fn magic(&self, offset: usize) -> Result<[u8; 4]> {
        self.array(offset)
    }

    /// Copy `N` bytes starting at `offset` into an array.
    pub fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(offset, N)?);
        Ok(out)
    }

    /// Three consecutive `i16`.
    pub fn i16x3(&self, offset: usize) -> Result<[i16; 3]> {
        let b = self.bytes(offset, 6)?;
        Ok([
            LittleEndian::read_i16(&b[0..2]),
            LittleEndian::read_i16(&b[2..4]),
            LittleEndian::read_i16(&b[4..6]),
        ])
    }

    // ==================== Offset resolution ====================

    /// Resolve an offset field to an absolute position.
    ///
    /// `base` is the start of the owning structure and `field` the field's
    /// position inside it. Returns `None` when the stored value is zero.
    pub fn offset(&self, encoding: OffsetEncoding, base: usize, field: usize) -> Result<Option<usize>> {
        let pos = base.checked_add(field).ok_or(Error::OutOfBounds {
            offset: base,
            len: field,
            size: self.data.len(),
        })?;
        match encoding {
            OffsetEncoding::Relative32 => {
                let value = self.i32(pos)?;
                resolve_relative(base, value, pos)
            }
            OffsetEncoding::Fix16 => {
                let value = self.u16(pos)?;
                Ok((value != 0).then_some(pos + usize::from(value)))
            }
        }
    }

    /// Resolve an `i32` offset relative to its own field position.
    pub fn self_relative_i32(&self, pos: usize) -> Result<Option<usize>> {
        let value = self.i32(pos)?;
        resolve_relative(pos, value, pos)
    }

    /// Read a count stored with the width implied by `encoding`.
    pub fn count(&self, encoding: OffsetEncoding, pos: usize) -> Result<usize> {
        match encoding {
            OffsetEncoding::Relative32 => {
                let value = self.i32(pos)?;
                usize::try_from(value).map_err(|_| Error::InvalidOffset {
                    field: pos,
                    value: i64::from(value),
                })
            }
            OffsetEncoding::Fix16 => Ok(self.u16(pos)? as usize),
        }
    }

    /// String referenced by an offset field, empty when absent.
    pub fn string_at(&self, encoding: OffsetEncoding, base: usize, field: usize) -> Result<String> {
        match self.offset(encoding, base, field)? {
            Some(pos) => self.cstr(pos),
            None => Ok(String::new()),
        }
    }
}

fn resolve_relative(base: usize, value: i32, field: usize) -> Result<Option<usize>> {
    if value == 0 {
        return Ok(None);
    }
    base.checked_add_signed(value as isize)
        .map(Some)
        .ok_or(Error::InvalidOffset {
            field,
            value: i64::from(value),
        })
}

/// Table of `count` fixed-stride records starting at `offset`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableRef {
    pub count: usize,
    pub offset: Option<usize>,
}

impl TableRef {
    #[must_use]
    pub const fn empty() -> Self {
        Self { count: 0, offset: None }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0 || self.offset.is_none()
    }

    /// Absolute positions of each record for a given stride.
    ///
    /// Validates that the whole table fits inside `view`.
    pub fn records(&self, view: &ByteView<'_>, stride: usize) -> Result<Vec<usize>> {
        let Some(start) = self.offset else {
            return Ok(Vec::new());
        };
        if self.count == 0 {
            return Ok(Vec::new());
        }
        let total = self.count.checked_mul(stride).ok_or(Error::OutOfBounds {
            offset: start,
            len: usize::MAX,
            size: view.len(),
        })?;
        view.bytes(start, total)?;
        Ok((0..self.count).map(|i| start + i * stride).collect())
    }
}
