//! Run-length encoded bone tracks
//!
//! A section starts with the per-bone flag nibbles, followed by one record
//! per bone whose nibble is non-zero. Each channel is either a static packed
//! value or a value pointer into run-length encoded `i16` streams.

use glam::{EulerRot, Quat, Vec3};

use super::track::{BoneSample, TrackFlags};
use super::{TrackContext, read_nibbles};
use crate::error::Result;
use crate::formats::packed::{Quaternion64, Vector48};
use crate::utils::ByteView;

const SIZE_MASK: u16 = 0x1FFF;
const ANIM_POSITION: u16 = 1 << 13;
const ANIM_ROTATION: u16 = 1 << 14;
const ANIM_SCALE: u16 = 1 << 15;

/// Size of a three-channel value pointer.
pub const VALUE_PTR_SIZE: usize = 6;

/// Euler radians (x roll, y pitch, z yaw) to a quaternion.
#[must_use]
pub fn euler_to_quat(euler: Vec3) -> Quat {
    Quat::from_euler(EulerRot::ZYX, euler.z, euler.y, euler.x)
}

/// Value of `frame` in a run-length stream starting at `stream`.
///
/// Each run is a `{valid u8, total u8}` header followed by `valid` values;
/// frames past `valid` inside a run repeat the last stored value.
pub fn extract_value(view: &ByteView<'_>, stream: usize, frame: usize, ctx: &TrackContext<'_>) -> Result<f32> {
    let mut at = stream;
    let mut k = frame;
    loop {
        let valid = view.u8(at)? as usize;
        let total = view.u8(at + 1)? as usize;
        if total == 0 || valid == 0 {
            return Err(ctx.malformed(format!("empty value run at {at}")));
        }
        if total > k {
            let index = if valid > k { k + 1 } else { valid };
            return Ok(f32::from(view.i16(at + index * 2)?));
        }
        k -= total;
        at += (valid + 1) * 2;
    }
}

/// Component `i` of a value pointer; a zero offset means zero.
pub fn value_component(
    view: &ByteView<'_>,
    ptr: usize,
    i: usize,
    frame: usize,
    ctx: &TrackContext<'_>,
) -> Result<f32> {
    let offset = view.i16(ptr + i * 2)?;
    if offset == 0 {
        return Ok(0.0);
    }
    let stream = ptr
        .checked_add_signed(isize::from(offset))
        .ok_or_else(|| ctx.malformed(format!("value pointer at {ptr} points before buffer")))?;
    extract_value(view, stream, frame, ctx)
}

/// Three-channel value pointer scaled per axis.
pub fn read_value_ptr(
    view: &ByteView<'_>,
    ptr: usize,
    frame: usize,
    scale: Vec3,
    ctx: &TrackContext<'_>,
) -> Result<Vec3> {
    Ok(Vec3::new(
        value_component(view, ptr, 0, frame, ctx)? * scale.x,
        value_component(view, ptr, 1, frame, ctx)? * scale.y,
        value_component(view, ptr, 2, frame, ctx)? * scale.z,
    ))
}

#[derive(Debug, Clone, Copy)]
struct RleRecord {
    at: usize,
    header: u16,
    flags: TrackFlags,
}

/// Record positions of one parsed section.
#[derive(Debug, Clone)]
pub struct RleSection {
    records: Vec<Option<RleRecord>>,
}

impl RleSection {
    pub fn parse(view: &ByteView<'_>, at: usize, ctx: &TrackContext<'_>) -> Result<Self> {
        let (flags, len) = read_nibbles(view, at, ctx.bones.len())?;
        let mut pos = at + len;
        let mut records = vec![None; flags.len()];
        for (bone, f) in flags.into_iter().enumerate() {
            if f.is_empty() {
                continue;
            }
            let header = view.u16(pos)?;
            let size = (header & SIZE_MASK) as usize;
            if size < 2 {
                return Err(ctx.malformed(format!("bone {bone} record size {size}")));
            }
            records[bone] = Some(RleRecord { at: pos, header, flags: f });
            pos += size;
        }
        Ok(Self { records })
    }

    pub fn sample(
        &self,
        view: &ByteView<'_>,
        bone: usize,
        frame: usize,
        ctx: &TrackContext<'_>,
    ) -> Result<BoneSample> {
        let Some(record) = self.records.get(bone).copied().flatten() else {
            return Ok(BoneSample::default());
        };
        let base = &ctx.bones[bone];
        let animated = |bit: u16| record.header & bit != 0;
        let mut sample = BoneSample {
            extra: record.flags.contains(TrackFlags::EXTRA),
            ..BoneSample::default()
        };
        let mut at = record.at + 2;

        let has_position = record.flags.contains(TrackFlags::POSITION);
        let pos_scale = if has_position && animated(ANIM_POSITION) {
            let scale = view.f32(at)?;
            at += 4;
            scale
        } else {
            0.0
        };

        if record.flags.contains(TrackFlags::ROTATION) {
            if animated(ANIM_ROTATION) {
                let rest = if ctx.delta { Vec3::ZERO } else { base.rotation };
                let euler = read_value_ptr(view, at, frame, base.rot_scale, ctx)? + rest;
                sample.rotation = Some(euler_to_quat(euler));
                at += VALUE_PTR_SIZE;
            } else {
                sample.rotation = Some(Quaternion64(view.u64(at)?).unpack());
                at += Quaternion64::SIZE;
            }
        }

        if has_position {
            if animated(ANIM_POSITION) {
                let rest = if ctx.delta { Vec3::ZERO } else { base.position };
                sample.position = Some(read_value_ptr(view, at, frame, Vec3::splat(pos_scale), ctx)? + rest);
            } else {
                sample.position = Some(Vector48::from_bytes(view.array(at)?).unpack());
            }
            at += VALUE_PTR_SIZE;
        }

        if record.flags.contains(TrackFlags::SCALE) {
            if animated(ANIM_SCALE) {
                let rest = if ctx.delta { Vec3::ONE } else { base.scale };
                sample.scale = Some(read_value_ptr(view, at, frame, base.scale_scale, ctx)? + rest);
            } else {
                sample.scale = Some(Vector48::from_bytes(view.array(at)?).unpack());
            }
        }

        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::formats::studio::bones::Bone;
    use pretty_assertions::assert_eq;

    fn ctx(bones: &[Bone]) -> TrackContext<'_> {
        TrackContext {
            name: "idle",
            bones,
            delta: false,
        }
    }

    #[test]
    fn test_value_runs() {
        // run 1: 2 stored values covering 3 frames, run 2: 1 value covering 2
        let mut buf = Vec::new();
        for v in [2u8, 3] {
            buf.push(v);
        }
        for v in [10i16, 20] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(&[1, 2]);
        buf.extend_from_slice(&(-5i16).to_le_bytes());

        let bones = [Bone::identity("root", -1)];
        let view = ByteView::new(&buf);
        let values: Vec<f32> = (0..5)
            .map(|f| extract_value(&view, 0, f, &ctx(&bones)).unwrap())
            .collect();
        assert_eq!(values, vec![10.0, 20.0, 20.0, -5.0, -5.0]);
        assert!(extract_value(&view, 0, 5, &ctx(&bones)).is_err());
    }

    #[test]
    fn test_zero_total_run_rejected() {
        let buf = [1u8, 0, 0, 0];
        let bones = [Bone::identity("root", -1)];
        let view = ByteView::new(&buf);
        assert!(matches!(
            extract_value(&view, 0, 0, &ctx(&bones)),
            Err(Error::MalformedAnimation { .. })
        ));
    }

    #[test]
    fn test_static_and_animated_channels() {
        let mut bone = Bone::identity("root", -1);
        bone.position = Vec3::new(1.0, 0.0, 0.0);
        bone.rot_scale = Vec3::splat(0.01);
        let bones = [bone];

        let mut buf = vec![0x03u8, 0];
        let record = buf.len();
        // header: animating position and rotation
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0.5f32.to_le_bytes());
        // rotation pointer: only z is animated
        let rot_ptr = buf.len();
        buf.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        // position pointer: only x is animated
        let pos_ptr = buf.len();
        buf.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        let size = buf.len() - record;
        let header = size as u16 | ANIM_POSITION | ANIM_ROTATION;
        buf[record..record + 2].copy_from_slice(&header.to_le_bytes());

        let rot_stream = buf.len();
        buf.extend_from_slice(&[1, 4]);
        buf.extend_from_slice(&100i16.to_le_bytes());
        let pos_stream = buf.len();
        buf.extend_from_slice(&[2, 2]);
        buf.extend_from_slice(&2i16.to_le_bytes());
        buf.extend_from_slice(&4i16.to_le_bytes());

        let z = (rot_stream - rot_ptr) as i16;
        buf[rot_ptr + 4..rot_ptr + 6].copy_from_slice(&z.to_le_bytes());
        let x = (pos_stream - pos_ptr) as i16;
        buf[pos_ptr..pos_ptr + 2].copy_from_slice(&x.to_le_bytes());

        let view = ByteView::new(&buf);
        let c = ctx(&bones);
        let section = RleSection::parse(&view, 0, &c).unwrap();
        let s0 = section.sample(&view, 0, 0, &c).unwrap();
        let s1 = section.sample(&view, 0, 1, &c).unwrap();
        assert_eq!(s0.position, Some(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(s1.position, Some(Vec3::new(3.0, 0.0, 0.0)));
        assert!(s0.scale.is_none());
        let expected = euler_to_quat(Vec3::new(0.0, 0.0, 1.0));
        assert!(s1.rotation.unwrap().abs_diff_eq(expected, 1e-6));
    }
}
