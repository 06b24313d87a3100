//! Sparse keyframe codecs used by datapoint tracks
//!
//! Each key carries a "frames until next sample" gap. Precision beyond the
//! packed bits comes from a separate per-key fixup table of `i16` triples.

use glam::{Quat, Vec3};

/// Scale applied to each 7-bit component, chosen by a 3-bit selector.
pub const SPARSE_QUAT_SCALES: [f32; 8] = [
    1.0 / 64.0,
    1.0 / 128.0,
    1.0 / 256.0,
    1.0 / 512.0,
    1.0 / 1024.0,
    1.0 / 2048.0,
    1.0 / 4096.0,
    1.0 / 8192.0,
];

/// Weight of one quaternion fixup unit.
pub const QUAT_FIXUP_STEP: f32 = 1.0 / 32768.0;

/// Weight of one position fixup unit.
pub const POSITION_FIXUP_STEP: f32 = 1.0 / 64.0;

fn sign_extend_7(v: u32) -> i32 {
    ((v << 25) as i32) >> 25
}

/// Sparse quaternion key (32 bits).
///
/// Bits 0-6, 7-13 and 14-20 hold three signed components, 21-23 the scale
/// selector, 24-25 the index of the dropped (largest, non-negative)
/// component and 26-31 the gap to the next key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SparseQuat32(pub u32);

impl SparseQuat32 {
    pub const SIZE: usize = 4;

    const COMPONENT_BITS: u32 = 7;
    const COMPONENT_MASK: u32 = 0x7F;
    const SCALE_SHIFT: u32 = 21;
    const SCALE_MASK: u32 = 0x7;
    const AXIS_SHIFT: u32 = 24;
    const AXIS_MASK: u32 = 0x3;
    const GAP_SHIFT: u32 = 26;
    pub const MAX_GAP: u32 = 0x3F;

    fn component(self, i: u32) -> i32 {
        sign_extend_7((self.0 >> (i * Self::COMPONENT_BITS)) & Self::COMPONENT_MASK)
    }

    #[must_use]
    pub fn scale_selector(self) -> usize {
        ((self.0 >> Self::SCALE_SHIFT) & Self::SCALE_MASK) as usize
    }

    #[must_use]
    pub fn dropped_axis(self) -> usize {
        ((self.0 >> Self::AXIS_SHIFT) & Self::AXIS_MASK) as usize
    }

    /// Frames until the next key.
    #[must_use]
    pub fn gap(self) -> u32 {
        self.0 >> Self::GAP_SHIFT
    }

    /// Unpack with an optional fixup triple.
    #[must_use]
    pub fn unpack(self, fixup: Option<[i16; 3]>) -> Quat {
        let scale = SPARSE_QUAT_SCALES[self.scale_selector()];
        let fixup = fixup.unwrap_or_default();
        let stored: [f32; 3] = std::array::from_fn(|i| {
            self.component(i as u32) as f32 * scale + f32::from(fixup[i]) * QUAT_FIXUP_STEP
        });
        let dropped = (1.0 - stored.iter().map(|c| c * c).sum::<f32>()).max(0.0).sqrt();

        let axis = self.dropped_axis();
        let mut out = [0.0f32; 4];
        let mut next = 0;
        for (i, slot) in out.iter_mut().enumerate() {
            if i == axis {
                *slot = dropped;
            } else {
                *slot = stored[next];
                next += 1;
            }
        }
        Quat::from_array(out)
    }

    /// Pack a unit quaternion, returning the key and its residual fixup.
    #[must_use]
    pub fn pack(q: Quat, gap: u32) -> (Self, [i16; 3]) {
        let mut c = q.to_array();
        let axis = (0..4)
            .max_by(|&a, &b| c[a].abs().total_cmp(&c[b].abs()))
            .unwrap_or(3);
        if c[axis] < 0.0 {
            for v in &mut c {
                *v = -*v;
            }
        }
        let stored: Vec<f32> = (0..4).filter(|&i| i != axis).map(|i| c[i]).collect();

        // Finest scale whose 7-bit range still covers every component.
        let max_abs = stored.iter().fold(0.0f32, |m, v| m.max(v.abs()));
        let selector = (0..SPARSE_QUAT_SCALES.len())
            .rev()
            .find(|&s| (max_abs / SPARSE_QUAT_SCALES[s]).round() <= 63.0)
            .unwrap_or(0);
        let scale = SPARSE_QUAT_SCALES[selector];

        let mut bits = 0u32;
        let mut fixup = [0i16; 3];
        for (i, &v) in stored.iter().enumerate() {
            let raw = (v / scale).round().clamp(-64.0, 63.0) as i32;
            bits |= (raw as u32 & Self::COMPONENT_MASK) << (i as u32 * Self::COMPONENT_BITS);
            let residual = (v - raw as f32 * scale) / QUAT_FIXUP_STEP;
            fixup[i] = residual.round().clamp(-32768.0, 32767.0) as i16;
        }
        bits |= (selector as u32) << Self::SCALE_SHIFT;
        bits |= (axis as u32) << Self::AXIS_SHIFT;
        bits |= gap.min(Self::MAX_GAP) << Self::GAP_SHIFT;
        (Self(bits), fixup)
    }
}

/// Sparse position key (64 bits).
///
/// Bits 0-15, 16-31 and 32-47 hold signed components, 48-56 a scale numerator
/// (factor = n / 512) and 57-63 the gap to the next key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SparsePos64(pub u64);

impl SparsePos64 {
    pub const SIZE: usize = 8;

    const SCALE_SHIFT: u32 = 48;
    const SCALE_MASK: u64 = 0x1FF;
    const GAP_SHIFT: u32 = 57;
    const SCALE_DENOMINATOR: f32 = 512.0;
    pub const MAX_GAP: u32 = 0x7F;

    fn component(self, i: u32) -> i16 {
        (self.0 >> (i * 16)) as u16 as i16
    }

    /// Per-key scale factor.
    #[must_use]
    pub fn factor(self) -> f32 {
        ((self.0 >> Self::SCALE_SHIFT) & Self::SCALE_MASK) as f32 / Self::SCALE_DENOMINATOR
    }

    /// Frames until the next key.
    #[must_use]
    pub fn gap(self) -> u32 {
        (self.0 >> Self::GAP_SHIFT) as u32
    }

    /// Unpack with an optional fixup triple. Scale is applied first.
    #[must_use]
    pub fn unpack(self, fixup: Option<[i16; 3]>) -> Vec3 {
        let factor = self.factor();
        let fixup = fixup.unwrap_or_default();
        Vec3::from_array(std::array::from_fn(|i| {
            f32::from(self.component(i as u32)) * factor + f32::from(fixup[i]) * POSITION_FIXUP_STEP
        }))
    }

    /// Pack a position, returning the key and its residual fixup.
    #[must_use]
    pub fn pack(v: Vec3, gap: u32) -> (Self, [i16; 3]) {
        let max_abs = v.abs().max_element();
        let numerator = (max_abs * Self::SCALE_DENOMINATOR / 32767.0)
            .ceil()
            .clamp(1.0, Self::SCALE_MASK as f32) as u64;
        let factor = numerator as f32 / Self::SCALE_DENOMINATOR;

        let mut bits = 0u64;
        let mut fixup = [0i16; 3];
        for (i, value) in v.to_array().into_iter().enumerate() {
            let raw = (value / factor).round().clamp(-32768.0, 32767.0) as i16;
            bits |= u64::from(raw as u16) << (i * 16);
            let residual = (value - f32::from(raw) * factor) / POSITION_FIXUP_STEP;
            fixup[i] = residual.round().clamp(-32768.0, 32767.0) as i16;
        }
        bits |= numerator << Self::SCALE_SHIFT;
        bits |= u64::from(gap.min(Self::MAX_GAP)) << Self::GAP_SHIFT;
        (Self(bits), fixup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sparse_quat_fields() {
        // x=1, y=-1, z=0, selector 2, dropped w, gap 5
        let raw = 1 | (0x7F << 7) | (2 << 21) | (3 << 24) | (5 << 26);
        let key = SparseQuat32(raw);
        assert_eq!(key.scale_selector(), 2);
        assert_eq!(key.dropped_axis(), 3);
        assert_eq!(key.gap(), 5);
        let q = key.unpack(None);
        assert!((q.x - 1.0 / 256.0).abs() < f32::EPSILON);
        assert!((q.y + 1.0 / 256.0).abs() < f32::EPSILON);
        assert!(q.w > 0.99);
    }

    #[test]
    fn test_fixup_added_after_scale() {
        let key = SparseQuat32(2 | (3 << 24));
        let q = key.unpack(Some([512, 0, 0]));
        assert!((q.x - (2.0 / 64.0 + 512.0 / 32768.0)).abs() < 1e-7);

        let (pos, _) = SparsePos64::pack(Vec3::new(10.0, 0.0, 0.0), 0);
        let base = pos.unpack(None);
        let fixed = pos.unpack(Some([64, 0, 0]));
        assert!((fixed.x - base.x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_sparse_pos_fields() {
        let (key, _) = SparsePos64::pack(Vec3::new(100.0, -50.0, 0.25), 9);
        assert_eq!(key.gap(), 9);
        assert!(key.factor() > 0.0);
        assert!(key.unpack(None).abs_diff_eq(Vec3::new(100.0, -50.0, 0.25), key.factor()));
    }

    fn quat_key(raw: [i32; 3], selector: u32, axis: u32, gap: u32) -> SparseQuat32 {
        let mut bits = 0u32;
        for (i, r) in raw.into_iter().enumerate() {
            bits |= (r as u32 & 0x7F) << (i * 7);
        }
        SparseQuat32(bits | (selector << 21) | (axis << 24) | (gap << 26))
    }

    #[test]
    fn test_every_dropped_axis() {
        let raw = [40, -20, 12];
        let scale = SPARSE_QUAT_SCALES[2];
        let stored = raw.map(|r| r as f32 * scale);
        let dropped = (1.0 - stored.iter().map(|c| c * c).sum::<f32>()).sqrt();

        for axis in 0..4u32 {
            let key = quat_key(raw, 2, axis, 3);
            assert_eq!(key.dropped_axis(), axis as usize);
            let q = key.unpack(None).to_array();
            assert!((q[axis as usize] - dropped).abs() < f32::EPSILON);
            let others: Vec<f32> = (0..4).filter(|&i| i != axis as usize).map(|i| q[i]).collect();
            assert_eq!(others, stored.to_vec());

            let (repacked, fixup) = SparseQuat32::pack(Quat::from_array(q), key.gap());
            assert_eq!(repacked, key);
            assert_eq!(fixup, [0; 3]);
        }
    }

    #[test]
    fn test_repack_drops_largest_component() {
        // x = 63/64 is stored while the much smaller w is dropped
        let key = quat_key([63, 0, 0], 0, 3, 0);
        let q = key.unpack(None);
        let (repacked, fixup) = SparseQuat32::pack(q, 0);
        assert_eq!(repacked.dropped_axis(), 0);
        assert!(same_rotation(repacked.unpack(Some(fixup)), q, 1e-4));
    }

    fn unit_quat() -> impl Strategy<Value = Quat> {
        (-1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0, -1.0f32..1.0)
            .prop_filter("non-degenerate", |(x, y, z, w)| x * x + y * y + z * z + w * w > 0.01)
            .prop_map(|(x, y, z, w)| Quat::from_xyzw(x, y, z, w).normalize())
    }

    fn same_rotation(a: Quat, b: Quat, eps: f32) -> bool {
        a.abs_diff_eq(b, eps) || a.abs_diff_eq(-b, eps)
    }

    proptest! {
        #[test]
        fn sparse_quat_round_trip(raw in any::<u32>()) {
            let key = SparseQuat32(raw);
            let q = key.unpack(None);
            // Only keys whose stored components describe a unit quaternion
            prop_assume!((q.length() - 1.0).abs() < 1e-4);
            let (repacked, fixup) = SparseQuat32::pack(q, key.gap());
            prop_assert_eq!(repacked.gap(), key.gap());
            prop_assert!(same_rotation(repacked.unpack(Some(fixup)), q, 1e-3));
        }

        #[test]
        fn sparse_quat_pack_unpack(q in unit_quat(), gap in 0u32..64) {
            let (key, fixup) = SparseQuat32::pack(q, gap);
            prop_assert_eq!(key.gap(), gap);
            prop_assert!(same_rotation(key.unpack(Some(fixup)), q, 1e-3));
        }

        #[test]
        fn sparse_quat_canonical_keys_reencode_exactly(
            raw in prop::array::uniform3(-63i32..=63),
            selector in 1u32..8,
            axis in 0u32..4,
            gap in 0u32..64,
        ) {
            // Keys already on the finest scale that holds their components
            prop_assume!(selector == 7 || raw.iter().any(|r| r.abs() >= 32));
            let key = quat_key(raw, selector, axis, gap);
            let (repacked, fixup) = SparseQuat32::pack(key.unpack(None), gap);
            prop_assert_eq!(repacked, key);
            prop_assert_eq!(fixup, [0; 3]);
        }

        #[test]
        fn sparse_pos_canonical_keys_reencode_exactly(
            mut raw in prop::array::uniform3(-32767i16..=32767),
            widest in 0usize..3,
            negative in any::<bool>(),
            numerator in 1u64..512,
            gap in 0u64..128,
        ) {
            raw[widest] = if negative { -32767 } else { 32767 };
            let mut bits = (numerator << 48) | (gap << 57);
            for (i, r) in raw.into_iter().enumerate() {
                bits |= u64::from(r as u16) << (i * 16);
            }
            let key = SparsePos64(bits);
            let (repacked, fixup) = SparsePos64::pack(key.unpack(None), key.gap());
            prop_assert_eq!(repacked, key);
            prop_assert_eq!(fixup, [0; 3]);
        }

        #[test]
        fn sparse_pos_round_trip(raw in any::<u64>()) {
            let key = SparsePos64(raw);
            let v = key.unpack(None);
            let (repacked, fixup) = SparsePos64::pack(v, key.gap());
            prop_assert_eq!(repacked.gap(), key.gap());
            let tolerance = repacked.factor() * 0.5 + POSITION_FIXUP_STEP;
            prop_assert!(repacked.unpack(Some(fixup)).abs_diff_eq(v, tolerance));
        }
    }
}
