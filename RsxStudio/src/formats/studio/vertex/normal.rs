//! 32-bit packed normal and tangent
//!
//! The normal is stored as two 9-bit components plus the index and sign of
//! the dropped (largest) component. The tangent is an angle around the
//! normal measured from a fixed reference frame.

use std::f32::consts::TAU;

use glam::Vec3;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PackedNormal(pub u32);

/// Decoded normal frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalFrame {
    pub normal: Vec3,
    pub tangent: Vec3,
    /// `1.0` or `-1.0`.
    pub binormal_sign: f32,
}

impl PackedNormal {
    const ANGLE_MASK: u32 = 0x3FF;
    const COMPONENT_MASK: u32 = 0x1FF;
    const A_SHIFT: u32 = 10;
    const B_SHIFT: u32 = 19;
    const SIGN_SHIFT: u32 = 28;
    const AXIS_SHIFT: u32 = 29;
    const AXIS_MASK: u32 = 0x3;
    const BINORMAL_SHIFT: u32 = 31;

    const COMPONENT_HALF: f32 = 255.5;
    const ANGLE_STEPS: f32 = 1024.0;

    #[must_use]
    pub fn unpack(self) -> NormalFrame {
        let raw = self.0;
        let a = ((raw >> Self::A_SHIFT) & Self::COMPONENT_MASK) as f32 / Self::COMPONENT_HALF - 1.0;
        let b = ((raw >> Self::B_SHIFT) & Self::COMPONENT_MASK) as f32 / Self::COMPONENT_HALF - 1.0;
        let sign = if (raw >> Self::SIGN_SHIFT) & 1 != 0 { -1.0 } else { 1.0 };
        let dropped = (1.0 - a * a - b * b).max(0.0).sqrt() * sign;

        let normal = match (raw >> Self::AXIS_SHIFT) & Self::AXIS_MASK {
            0 => Vec3::new(dropped, a, b),
            1 => Vec3::new(a, dropped, b),
            _ => Vec3::new(a, b, dropped),
        }
        .normalize_or_zero();

        let angle = (raw & Self::ANGLE_MASK) as f32 / Self::ANGLE_STEPS * TAU;
        let (t0, t1) = reference_frame(normal);
        let tangent = t0 * angle.cos() + t1 * angle.sin();

        let binormal_sign = if (raw >> Self::BINORMAL_SHIFT) & 1 != 0 { -1.0 } else { 1.0 };
        NormalFrame {
            normal,
            tangent,
            binormal_sign,
        }
    }

    /// Pack a unit normal and a tangent perpendicular to it.
    #[must_use]
    pub fn pack(normal: Vec3, tangent: Vec3, binormal_sign: f32) -> Self {
        let n = normal.normalize_or_zero();
        let c = n.to_array();
        let axis = if c[0].abs() >= c[1].abs() && c[0].abs() >= c[2].abs() {
            0
        } else if c[1].abs() >= c[2].abs() {
            1
        } else {
            2
        };
        let (a, b) = match axis {
            0 => (c[1], c[2]),
            1 => (c[0], c[2]),
            _ => (c[0], c[1]),
        };
        let quantize = |v: f32| ((v + 1.0) * Self::COMPONENT_HALF).round().clamp(0.0, 511.0) as u32;

        let (t0, t1) = reference_frame(n);
        let mut angle = tangent.dot(t1).atan2(tangent.dot(t0));
        if angle < 0.0 {
            angle += TAU;
        }
        let steps = (angle / TAU * Self::ANGLE_STEPS).round() as u32 & Self::ANGLE_MASK;

        let mut raw = steps;
        raw |= quantize(a) << Self::A_SHIFT;
        raw |= quantize(b) << Self::B_SHIFT;
        if c[axis] < 0.0 {
            raw |= 1 << Self::SIGN_SHIFT;
        }
        raw |= (axis as u32) << Self::AXIS_SHIFT;
        if binormal_sign < 0.0 {
            raw |= 1 << Self::BINORMAL_SHIFT;
        }
        Self(raw)
    }
}

/// Two unit vectors spanning the plane perpendicular to `normal`.
fn reference_frame(normal: Vec3) -> (Vec3, Vec3) {
    let reference = if normal.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let t0 = reference.cross(normal).normalize_or_zero();
    let t1 = normal.cross(t0);
    (t0, t1)
}
