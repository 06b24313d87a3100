//! Packed blend weights
//!
//! Stored weights are fixed point with 32767 as unity. The last influence of
//! every vertex is never stored; it receives the remainder so the resolved
//! weights always sum to one.

use super::VertexWeight;
use crate::error::{Error, Result};
use crate::utils::ByteView;

/// Fixed-point unit weight.
pub const WEIGHT_UNIT: u32 = 32767;

/// Size of one extended weight entry (`u16` weight, `u16` bone).
pub const EXT_WEIGHT_STRIDE: usize = 4;

#[must_use]
pub fn unpack_weight(raw: u32) -> f32 {
    raw as f32 / WEIGHT_UNIT as f32
}

/// The 8-byte per-vertex weight block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackedWeights {
    pub weights: [u16; 2],
    pub bones: [u8; 3],
    /// Number of stored influences; the vertex has `count + 1` bones.
    pub count: u8,
}

impl PackedWeights {
    pub const SIZE: usize = 8;

    pub fn read(view: &ByteView<'_>, pos: usize) -> Result<Self> {
        let b = view.bytes(pos, Self::SIZE)?;
        Ok(Self {
            weights: [u16::from_le_bytes([b[0], b[1]]), u16::from_le_bytes([b[2], b[3]])],
            bones: [b[4], b[5], b[6]],
            count: b[7],
        })
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; 8] {
        let [w0, w1] = self.weights[0].to_le_bytes();
        let [w2, w3] = self.weights[1].to_le_bytes();
        [w0, w1, w2, w3, self.bones[0], self.bones[1], self.bones[2], self.count]
    }

    /// Total influences after the remainder weight is added.
    #[must_use]
    pub fn bone_count(self) -> usize {
        usize::from(self.count) + 1
    }

    /// More than three influences: extra weights live in the extended table.
    #[must_use]
    pub fn is_complex(self) -> bool {
        self.count >= 3
    }

    /// Resolve all influences, appending them to `out`.
    ///
    /// # Errors
    /// Complex weights fail with [`Error::InvalidVertexGroup`] when the mesh
    /// has no extended table, or `OutOfBounds` when an entry lies outside it.
    pub fn resolve(self, extended: Option<&ByteView<'_>>, out: &mut Vec<VertexWeight>) -> Result<()> {
        let mut stored = 0u32;
        let mut push = |bone: u32, raw: u32, out: &mut Vec<VertexWeight>| {
            stored += raw;
            out.push(VertexWeight {
                bone,
                weight: unpack_weight(raw),
            });
        };

        let remainder_bone = if self.is_complex() {
            let table = extended.ok_or_else(|| {
                Error::InvalidVertexGroup("complex weights without an extended weight table".into())
            })?;
            push(u32::from(self.bones[0]), u32::from(self.weights[0]), out);
            let start = usize::from(self.weights[1]);
            for i in 0..usize::from(self.count) - 1 {
                let pos = (start + i) * EXT_WEIGHT_STRIDE;
                let raw = u32::from(table.u16(pos)?);
                let bone = u32::from(table.u16(pos + 2)?);
                push(bone, raw, out);
            }
            self.bones[1]
        } else {
            let n = usize::from(self.count);
            for i in 0..n {
                push(u32::from(self.bones[i]), u32::from(self.weights[i]), out);
            }
            self.bones[n]
        };

        out.push(VertexWeight {
            bone: u32::from(remainder_bone),
            weight: unpack_weight(WEIGHT_UNIT.saturating_sub(stored)),
        });
        Ok(())
    }
}
