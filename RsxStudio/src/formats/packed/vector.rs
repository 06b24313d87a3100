//! Packed vector types

use glam::Vec3;
use half::f16;

/// IEEE 754 half-precision scalar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Half(pub u16);

impl Half {
    #[must_use]
    pub fn unpack(self) -> f32 {
        f16::from_bits(self.0).to_f32()
    }

    #[must_use]
    pub fn pack(value: f32) -> Self {
        Self(f16::from_f32(value).to_bits())
    }
}

/// Three half floats (48 bits).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vector48 {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

impl Vector48 {
    pub const SIZE: usize = 6;

    #[must_use]
    pub fn from_bytes(b: [u8; 6]) -> Self {
        Self {
            x: u16::from_le_bytes([b[0], b[1]]),
            y: u16::from_le_bytes([b[2], b[3]]),
            z: u16::from_le_bytes([b[4], b[5]]),
        }
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; 6] {
        let [x0, x1] = self.x.to_le_bytes();
        let [y0, y1] = self.y.to_le_bytes();
        let [z0, z1] = self.z.to_le_bytes();
        [x0, x1, y0, y1, z0, z1]
    }

    #[must_use]
    pub fn unpack(self) -> Vec3 {
        Vec3::new(Half(self.x).unpack(), Half(self.y).unpack(), Half(self.z).unpack())
    }

    #[must_use]
    pub fn pack(v: Vec3) -> Self {
        Self {
            x: Half::pack(v.x).0,
            y: Half::pack(v.y).0,
            z: Half::pack(v.z).0,
        }
    }
}

/// Fixed-point vector in 64 bits: x and y are 21 bits, z is 22 bits.
///
/// Components are stored biased: `x, y` cover `[-1024, 1024)` and `z`
/// covers `[-2048, 2048)`, all with a step of 1/1024.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vector64(pub u64);

impl Vector64 {
    pub const SIZE: usize = 8;

    const XY_BITS: u32 = 21;
    const XY_MASK: u64 = (1 << Self::XY_BITS) - 1;
    const Z_MASK: u64 = (1 << 22) - 1;
    const Y_SHIFT: u32 = 21;
    const Z_SHIFT: u32 = 42;
    const XY_BIAS: f32 = 1024.0;
    const Z_BIAS: f32 = 2048.0;
    /// Quantization step.
    pub const STEP: f32 = 1.0 / 1024.0;

    #[must_use]
    pub fn unpack(self) -> Vec3 {
        let x = (self.0 & Self::XY_MASK) as f32;
        let y = ((self.0 >> Self::Y_SHIFT) & Self::XY_MASK) as f32;
        let z = ((self.0 >> Self::Z_SHIFT) & Self::Z_MASK) as f32;
        Vec3::new(
            x * Self::STEP - Self::XY_BIAS,
            y * Self::STEP - Self::XY_BIAS,
            z * Self::STEP - Self::Z_BIAS,
        )
    }

    #[must_use]
    pub fn pack(v: Vec3) -> Self {
        let quantize = |value: f32, bias: f32, mask: u64| -> u64 {
            let raw = ((value + bias) * 1024.0).round();
            raw.clamp(0.0, mask as f32) as u64
        };
        let x = quantize(v.x, Self::XY_BIAS, Self::XY_MASK);
        let y = quantize(v.y, Self::XY_BIAS, Self::XY_MASK);
        let z = quantize(v.z, Self::Z_BIAS, Self::Z_MASK);
        Self(x | (y << Self::Y_SHIFT) | (z << Self::Z_SHIFT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_vector48_known_values() {
        let v = Vector48::pack(Vec3::new(1.0, -2.5, 0.0));
        assert_eq!(v, Vector48 { x: 0x3C00, y: 0xC100, z: 0 });
        assert_eq!(v.unpack(), Vec3::new(1.0, -2.5, 0.0));
        assert_eq!(Vector48::from_bytes(v.to_bytes()), v);
    }

    #[test]
    fn test_vector64_extremes() {
        assert_eq!(Vector64(0).unpack(), Vec3::new(-1024.0, -1024.0, -2048.0));
        let v = Vector64::pack(Vec3::new(0.5, -0.25, 3.0));
        assert_eq!(v.unpack(), Vec3::new(0.5, -0.25, 3.0));
        // Out of range values saturate
        let v = Vector64::pack(Vec3::new(5000.0, -5000.0, 0.0));
        let u = v.unpack();
        assert!(u.x < 1024.0 && u.x > 1023.99);
        assert!((u.y + 1024.0).abs() < f32::EPSILON);
    }

    fn finite_half() -> impl Strategy<Value = u16> {
        any::<u16>().prop_filter("finite", |bits| f16::from_bits(*bits).is_finite())
    }

    proptest! {
        #[test]
        fn half_round_trip(bits in finite_half()) {
            prop_assert_eq!(Half::pack(Half(bits).unpack()).0, bits);
        }

        #[test]
        fn vector48_round_trip(x in finite_half(), y in finite_half(), z in finite_half()) {
            let v = Vector48 { x, y, z };
            prop_assert_eq!(Vector48::pack(v.unpack()), v);
        }

        #[test]
        fn vector64_round_trip(raw in any::<u64>()) {
            prop_assert_eq!(Vector64::pack(Vector64(raw).unpack()), Vector64(raw));
        }
    }
}
