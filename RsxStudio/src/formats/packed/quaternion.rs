//! Packed quaternion types
//!
//! Both types store x, y, z as biased fixed point and keep only the sign of
//! w, which is rebuilt from the unit-length constraint.

use glam::Quat;

fn rebuild_w(x: f32, y: f32, z: f32, negative: bool) -> f32 {
    let w = (1.0 - x * x - y * y - z * z).max(0.0).sqrt();
    if negative { -w } else { w }
}

/// Quaternion in 48 bits: x and y are 16 bits, z is 15 bits, plus w sign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quaternion48 {
    pub x: u16,
    pub y: u16,
    /// Low 15 bits hold z, the top bit is the w sign.
    pub zw: u16,
}

impl Quaternion48 {
    pub const SIZE: usize = 6;

    const Z_MASK: u16 = 0x7FFF;
    const WNEG_BIT: u16 = 0x8000;
    const XY_BIAS: f32 = 32768.0;
    const XY_SCALE: f32 = 32768.5;
    const Z_BIAS: f32 = 16384.0;
    const Z_SCALE: f32 = 16384.5;

    #[must_use]
    pub fn from_bytes(b: [u8; 6]) -> Self {
        Self {
            x: u16::from_le_bytes([b[0], b[1]]),
            y: u16::from_le_bytes([b[2], b[3]]),
            zw: u16::from_le_bytes([b[4], b[5]]),
        }
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; 6] {
        let [x0, x1] = self.x.to_le_bytes();
        let [y0, y1] = self.y.to_le_bytes();
        let [z0, z1] = self.zw.to_le_bytes();
        [x0, x1, y0, y1, z0, z1]
    }

    #[must_use]
    pub fn unpack(self) -> Quat {
        let x = (f32::from(self.x) - Self::XY_BIAS) / Self::XY_SCALE;
        let y = (f32::from(self.y) - Self::XY_BIAS) / Self::XY_SCALE;
        let z = (f32::from(self.zw & Self::Z_MASK) - Self::Z_BIAS) / Self::Z_SCALE;
        let w = rebuild_w(x, y, z, self.zw & Self::WNEG_BIT != 0);
        Quat::from_xyzw(x, y, z, w)
    }

    #[must_use]
    pub fn pack(q: Quat) -> Self {
        let x = ((q.x * Self::XY_SCALE).round() + Self::XY_BIAS).clamp(0.0, 65535.0) as u16;
        let y = ((q.y * Self::XY_SCALE).round() + Self::XY_BIAS).clamp(0.0, 65535.0) as u16;
        let z = ((q.z * Self::Z_SCALE).round() + Self::Z_BIAS).clamp(0.0, 32767.0) as u16;
        let wneg = if q.w.is_sign_negative() { Self::WNEG_BIT } else { 0 };
        Self { x, y, zw: z | wneg }
    }
}

/// Quaternion in 64 bits: x, y and z are 21 bits each, plus w sign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quaternion64(pub u64);

impl Quaternion64 {
    pub const SIZE: usize = 8;

    const MASK: u64 = (1 << 21) - 1;
    const Y_SHIFT: u32 = 21;
    const Z_SHIFT: u32 = 42;
    const WNEG_SHIFT: u32 = 63;
    const BIAS: f32 = 1_048_576.0;
    const SCALE: f32 = 1_048_576.5;

    #[must_use]
    pub fn unpack(self) -> Quat {
        let component = |shift: u32| ((self.0 >> shift) & Self::MASK) as f32;
        let x = (component(0) - Self::BIAS) / Self::SCALE;
        let y = (component(Self::Y_SHIFT) - Self::BIAS) / Self::SCALE;
        let z = (component(Self::Z_SHIFT) - Self::BIAS) / Self::SCALE;
        let w = rebuild_w(x, y, z, (self.0 >> Self::WNEG_SHIFT) & 1 == 1);
        Quat::from_xyzw(x, y, z, w)
    }

    #[must_use]
    pub fn pack(q: Quat) -> Self {
        let quantize =
            |v: f32| ((v * Self::SCALE).round() + Self::BIAS).clamp(0.0, Self::MASK as f32) as u64;
        let wneg = u64::from(q.w.is_sign_negative());
        Self(
            quantize(q.x)
                | (quantize(q.y) << Self::Y_SHIFT)
                | (quantize(q.z) << Self::Z_SHIFT)
                | (wneg << Self::WNEG_SHIFT),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identity() {
        let q = Quaternion64::pack(Quat::IDENTITY).unpack();
        assert!(q.abs_diff_eq(Quat::IDENTITY, 1e-6));
        let q = Quaternion48::pack(Quat::IDENTITY).unpack();
        assert!(q.abs_diff_eq(Quat::IDENTITY, 1e-4));
    }

    #[test]
    fn test_negative_w_sign_kept() {
        let q = Quat::from_xyzw(0.0, 0.6, 0.0, -0.8);
        let p = Quaternion64::pack(q).unpack();
        assert!(p.w < 0.0);
        assert!(p.abs_diff_eq(q, 1e-5));
        let p = Quaternion48::pack(q).unpack();
        assert!(p.abs_diff_eq(q, 1e-4));
    }

    proptest! {
        #[test]
        fn quaternion48_round_trip(x in any::<u16>(), y in any::<u16>(), zw in any::<u16>()) {
            let q = Quaternion48 { x, y, zw };
            prop_assert_eq!(Quaternion48::pack(q.unpack()), q);
        }

        #[test]
        fn quaternion64_round_trip(raw in any::<u64>()) {
            prop_assert_eq!(Quaternion64::pack(Quaternion64(raw).unpack()), Quaternion64(raw));
        }
    }
}
