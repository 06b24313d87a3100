//! Linked per-bone animation records (r1, r2)

use glam::Vec3;

use super::TrackContext;
use super::rle::{VALUE_PTR_SIZE, euler_to_quat, read_value_ptr};
use super::track::BoneSample;
use crate::error::Result;
use crate::formats::packed::{Quaternion48, Quaternion64, Vector48};
use crate::utils::ByteView;

pub const RAW_POS: u8 = 0x01;
pub const RAW_ROT: u8 = 0x02;
pub const ANIM_POS: u8 = 0x04;
pub const ANIM_ROT: u8 = 0x08;
pub const DELTA: u8 = 0x10;
pub const RAW_ROT2: u8 = 0x20;

/// `{bone u8, flags u8, next i16}`
const RECORD_HEADER: usize = 4;

#[derive(Debug, Clone, Copy)]
struct LegacyRecord {
    at: usize,
    flags: u8,
}

/// Records of one clip, indexed by bone.
#[derive(Debug, Clone)]
pub struct LegacySection {
    records: Vec<Option<LegacyRecord>>,
}

impl LegacySection {
    pub fn parse(view: &ByteView<'_>, at: usize, ctx: &TrackContext<'_>) -> Result<Self> {
        let bone_count = ctx.bones.len();
        let mut records = vec![None; bone_count];
        let mut pos = at;
        for _ in 0..bone_count {
            let bone = view.u8(pos)? as usize;
            let flags = view.u8(pos + 1)?;
            let next = view.i16(pos + 2)?;
            if bone >= bone_count {
                return Err(ctx.malformed(format!("record for bone {bone} of {bone_count}")));
            }
            records[bone] = Some(LegacyRecord { at: pos, flags });
            if next == 0 {
                break;
            }
            pos = pos
                .checked_add_signed(isize::from(next))
                .ok_or_else(|| ctx.malformed(format!("record link {next} at {pos}")))?;
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
        let delta = ctx.delta || record.flags & DELTA != 0;
        let mut sample = BoneSample::default();
        let mut at = record.at + RECORD_HEADER;

        if record.flags & RAW_ROT != 0 {
            sample.rotation = Some(Quaternion48::from_bytes(view.array(at)?).unpack());
            at += Quaternion48::SIZE;
        } else if record.flags & RAW_ROT2 != 0 {
            sample.rotation = Some(Quaternion64(view.u64(at)?).unpack());
            at += Quaternion64::SIZE;
        } else if record.flags & ANIM_ROT != 0 {
            let rest = if delta { Vec3::ZERO } else { base.rotation };
            let euler = read_value_ptr(view, at, frame, base.rot_scale, ctx)? + rest;
            sample.rotation = Some(euler_to_quat(euler));
            at += VALUE_PTR_SIZE;
        }

        if record.flags & RAW_POS != 0 {
            sample.position = Some(Vector48::from_bytes(view.array(at)?).unpack());
        } else if record.flags & ANIM_POS != 0 {
            let rest = if delta { Vec3::ZERO } else { base.position };
            sample.position = Some(read_value_ptr(view, at, frame, base.pos_scale, ctx)? + rest);
        }

        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::formats::studio::bones::Bone;
    use glam::Quat;

    #[test]
    fn test_chain_with_raw_values() {
        let bones = [Bone::identity("root", -1), Bone::identity("hip", 0)];
        let ctx = TrackContext {
            name: "ref",
            bones: &bones,
            delta: false,
        };
        let q = Quaternion48::pack(Quat::from_rotation_x(0.5));
        let p = Vector48::pack(Vec3::new(1.0, 2.0, 3.0));

        let mut buf = vec![1u8, RAW_ROT | RAW_POS];
        buf.extend_from_slice(&16i16.to_le_bytes());
        buf.extend_from_slice(&q.to_bytes());
        buf.extend_from_slice(&p.to_bytes());
        buf.extend_from_slice(&[0u8, 0, 0, 0]);

        let view = ByteView::new(&buf);
        let section = LegacySection::parse(&view, 0, &ctx).unwrap();
        let hip = section.sample(&view, 1, 3, &ctx).unwrap();
        assert_eq!(hip.rotation, Some(q.unpack()));
        assert_eq!(hip.position, Some(Vec3::new(1.0, 2.0, 3.0)));
        let root = section.sample(&view, 0, 0, &ctx).unwrap();
        assert_eq!(root, BoneSample::default());
    }

    #[test]
    fn test_bone_index_checked() {
        let bones = [Bone::identity("root", -1)];
        let ctx = TrackContext {
            name: "bad",
            bones: &bones,
            delta: false,
        };
        let buf = [4u8, 0, 0, 0];
        let view = ByteView::new(&buf);
        assert!(matches!(
            LegacySection::parse(&view, 0, &ctx),
            Err(Error::MalformedAnimation { .. })
        ));
    }
}
