//! Vertex attribute flags
//!
//! Bits 0-1 position encoding, bit 2 color, bit 3 an opaque 8-byte field,
//! bits 4-7 an index into [`NORMAL_WEIGHT_TABLE`], and from bit 24 three
//! bits per texcoord channel.

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PositionFormat {
    None,
    /// Three `f32`.
    Float,
    /// [`Vector64`](crate::formats::packed::Vector64).
    Packed64,
    /// [`Vector48`](crate::formats::packed::Vector48).
    Packed48,
}

impl PositionFormat {
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            PositionFormat::None => 0,
            PositionFormat::Float => 12,
            PositionFormat::Packed64 => 8,
            PositionFormat::Packed48 => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TexcoordFormat {
    /// Two `f16`.
    Half,
    /// Two `f32`.
    Float,
}

impl TexcoordFormat {
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            TexcoordFormat::Half => 4,
            TexcoordFormat::Float => 8,
        }
    }
}

/// Normal and blend weight sub-encodings selected by bits 4-7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalWeightFormat {
    pub packed_normal: bool,
    pub packed_weights: bool,
}

const fn nw(packed_normal: bool, packed_weights: bool) -> NormalWeightFormat {
    NormalWeightFormat { packed_normal, packed_weights }
}

/// Bit 0 of the index selects the packed normal, bit 1 the packed weight
/// block. Bits 2-3 are not interpreted.
pub const NORMAL_WEIGHT_TABLE: [NormalWeightFormat; 16] = [
    nw(false, false),
    nw(true, false),
    nw(false, true),
    nw(true, true),
    nw(false, false),
    nw(true, false),
    nw(false, true),
    nw(true, true),
    nw(false, false),
    nw(true, false),
    nw(false, true),
    nw(true, true),
    nw(false, false),
    nw(true, false),
    nw(false, true),
    nw(true, true),
];

/// Byte positions of each attribute within one vertex record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexRecordLayout {
    pub position: Option<usize>,
    pub weights: Option<usize>,
    pub normal: Option<usize>,
    pub color: Option<usize>,
    /// One entry per present channel, in channel order.
    pub texcoords: Vec<(usize, TexcoordFormat)>,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct VertexFlags(pub u64);

impl VertexFlags {
    pub const POSITION_MASK: u64 = 0x3;
    pub const COLOR: u64 = 1 << 2;
    pub const OPAQUE_8: u64 = 1 << 3;
    pub const NORMAL_WEIGHT_SHIFT: u32 = 4;
    pub const NORMAL_WEIGHT_MASK: u64 = 0xF;
    pub const TEXCOORD_SHIFT: u32 = 24;
    pub const TEXCOORD_BITS: u32 = 3;
    pub const TEXCOORD_MASK: u64 = 0x7;
    pub const MAX_TEXCOORDS: usize = 8;

    /// Packed normal present, no weights.
    pub const NORMAL: u64 = 1 << Self::NORMAL_WEIGHT_SHIFT;
    /// Packed weight block present.
    pub const WEIGHTS: u64 = 2 << Self::NORMAL_WEIGHT_SHIFT;

    #[must_use]
    pub fn position(self) -> PositionFormat {
        match self.0 & Self::POSITION_MASK {
            1 => PositionFormat::Float,
            2 => PositionFormat::Packed64,
            3 => PositionFormat::Packed48,
            _ => PositionFormat::None,
        }
    }

    #[must_use]
    pub fn has_color(self) -> bool {
        self.0 & Self::COLOR != 0
    }

    #[must_use]
    pub fn has_opaque8(self) -> bool {
        self.0 & Self::OPAQUE_8 != 0
    }

    #[must_use]
    pub fn normal_weight(self) -> NormalWeightFormat {
        NORMAL_WEIGHT_TABLE[((self.0 >> Self::NORMAL_WEIGHT_SHIFT) & Self::NORMAL_WEIGHT_MASK) as usize]
    }

    /// Format of one texcoord channel, `None` if absent.
    pub fn texcoord(self, channel: usize) -> Result<Option<TexcoordFormat>> {
        let shift = Self::TEXCOORD_SHIFT + channel as u32 * Self::TEXCOORD_BITS;
        match (self.0 >> shift) & Self::TEXCOORD_MASK {
            0 => Ok(None),
            1 => Ok(Some(TexcoordFormat::Half)),
            2 => Ok(Some(TexcoordFormat::Float)),
            other => Err(Error::UnsupportedVertexFormat(format!(
                "texcoord channel {channel} format {other}"
            ))),
        }
    }

    /// Number of present texcoord channels.
    pub fn texcoord_count(self) -> Result<usize> {
        let mut count = 0;
        for channel in 0..Self::MAX_TEXCOORDS {
            if self.texcoord(channel)?.is_some() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Attribute positions inside a record: position, opaque field, weights,
    /// normal, color, then texcoords.
    pub fn record_layout(self) -> Result<VertexRecordLayout> {
        let mut pos = 0;
        let mut take = |present: bool, size: usize| {
            present.then(|| {
                let at = pos;
                pos += size;
                at
            })
        };

        let position_format = self.position();
        let position = take(position_format != PositionFormat::None, position_format.size());
        take(self.has_opaque8(), 8);
        let nw = self.normal_weight();
        let weights = take(nw.packed_weights, 8);
        let normal = take(nw.packed_normal, 4);
        let color = take(self.has_color(), 4);

        let mut texcoords = Vec::new();
        for channel in 0..Self::MAX_TEXCOORDS {
            if let Some(format) = self.texcoord(channel)? {
                if let Some(at) = take(true, format.size()) {
                    texcoords.push((at, format));
                }
            }
        }

        Ok(VertexRecordLayout {
            position,
            weights,
            normal,
            color,
            texcoords,
            size: pos,
        })
    }

    // ==================== Builders ====================

    #[must_use]
    pub fn with_position(self, format: PositionFormat) -> Self {
        let bits = match format {
            PositionFormat::None => 0,
            PositionFormat::Float => 1,
            PositionFormat::Packed64 => 2,
            PositionFormat::Packed48 => 3,
        };
        Self((self.0 & !Self::POSITION_MASK) | bits)
    }

    #[must_use]
    pub fn with_bits(self, bits: u64) -> Self {
        Self(self.0 | bits)
    }

    #[must_use]
    pub fn with_texcoord(self, channel: usize, format: TexcoordFormat) -> Self {
        let shift = Self::TEXCOORD_SHIFT + channel as u32 * Self::TEXCOORD_BITS;
        let value = match format {
            TexcoordFormat::Half => 1,
            TexcoordFormat::Float => 2,
        };
        Self((self.0 & !(Self::TEXCOORD_MASK << shift)) | (value << shift))
    }
}
