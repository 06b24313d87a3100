//! Root motion extraction
//!
//! Clips carry root motion either as a piecewise movement table or as a
//! sectioned frame movement block. Either way the result is one translation
//! and one yaw per frame, which can be folded into the origin bone.

use glam::{Quat, Vec3};
use serde::Serialize;

use super::anim::datapoint::{Keys, read_position_keys};
use super::anim::rle::value_component;
use super::anim::{AnimDesc, BonePose, DecodedBoneTrack, TrackContext, TrackFlags};
use super::layout::movement;
use crate::error::Result;
use crate::formats::packed::{Half, SparsePos64};
use crate::utils::ByteView;

/// Frame movement block fields.
pub mod frame_movement {
    /// `f32[4]` scales for x, y, z and yaw.
    pub const SCALE: usize = 0;
    pub const SECTION_FRAMES: usize = 16;
    pub const SECTION_COUNT: usize = 20;
    /// `i32` offsets relative to the block.
    pub const OFFSETS: usize = 24;

    /// Datapoint section: `u16` position key count, `u16` yaw key count.
    pub const DP_HEADER: usize = 4;
    pub const DP_FIXUP_SIZE: usize = 6;
    /// `{f16 yaw, u16 gap}`
    pub const DP_YAW_KEY: usize = 4;
}

/// Per-frame root translation and yaw (radians).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RootMotion {
    pub translation: Vec<Vec3>,
    pub yaw: Vec<f32>,
}

impl RootMotion {
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.translation.len()
    }

    /// Translation and yaw at `frame`; frames past the end hold the last value.
    #[must_use]
    pub fn at(&self, frame: usize) -> (Vec3, f32) {
        let i = frame.min(self.frame_count().saturating_sub(1));
        (
            self.translation.get(i).copied().unwrap_or(Vec3::ZERO),
            self.yaw.get(i).copied().unwrap_or(0.0),
        )
    }

    fn push(&mut self, translation: Vec3, yaw_degrees: f32) {
        self.translation.push(translation);
        self.yaw.push(yaw_degrees.to_radians());
    }
}

/// One piece of a legacy movement table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Movement {
    pub end_frame: i32,
    pub motion_flags: i32,
    /// Velocity at the start of the piece.
    pub v0: f32,
    /// Velocity at the end of the piece.
    pub v1: f32,
    /// Yaw at the end of the piece, in degrees.
    pub angle: f32,
    pub vector: Vec3,
    pub position: Vec3,
}

impl Movement {
    pub fn read(view: &ByteView<'_>, at: usize) -> Result<Self> {
        Ok(Self {
            end_frame: view.i32(at + movement::END_FRAME)?,
            motion_flags: view.i32(at + movement::MOTION_FLAGS)?,
            v0: view.f32(at + movement::V0)?,
            v1: view.f32(at + movement::V1)?,
            angle: view.f32(at + movement::ANGLE)?,
            vector: view.vec3(at + movement::VECTOR)?,
            position: view.vec3(at + movement::POSITION)?,
        })
    }
}

/// Movement table of a clip.
pub fn read_movements(view: &ByteView<'_>, desc: &AnimDesc) -> Result<Vec<Movement>> {
    desc.movements
        .records(view, movement::STRIDE)?
        .into_iter()
        .map(|at| Movement::read(view, at))
        .collect()
}

/// Sample a movement table at every frame.
///
/// Inside a piece the distance follows `v0 t + (v1 - v0) t^2 / 2` along the
/// piece's vector and yaw is blended linearly, `t` being the fraction of the
/// piece covered.
#[must_use]
pub fn sample_movements(movements: &[Movement], frames: usize) -> RootMotion {
    let mut motion = RootMotion::default();
    for frame in 0..frames {
        let frame = frame as f32;
        let mut prev_frame = 0.0;
        let mut position = Vec3::ZERO;
        let mut angle = 0.0;
        for m in movements {
            let end = m.end_frame as f32;
            if end >= frame {
                let span = end - prev_frame;
                let t = if span > 0.0 { (frame - prev_frame) / span } else { 1.0 };
                let d = m.v0 * t + 0.5 * (m.v1 - m.v0) * t * t;
                position += m.vector * d;
                angle = angle * (1.0 - t) + m.angle * t;
                break;
            }
            prev_frame = end;
            position = m.position;
            angle = m.angle;
        }
        motion.push(position, angle);
    }
    motion
}

/// Decode a frame movement block.
pub fn read_frame_movement(
    view: &ByteView<'_>,
    desc: &AnimDesc,
    at: usize,
    datapoint: bool,
    ctx: &TrackContext<'_>,
) -> Result<RootMotion> {
    let scale = [
        view.f32(at + frame_movement::SCALE)?,
        view.f32(at + frame_movement::SCALE + 4)?,
        view.f32(at + frame_movement::SCALE + 8)?,
        view.f32(at + frame_movement::SCALE + 12)?,
    ];
    let section_frames = view.i32(at + frame_movement::SECTION_FRAMES)?;
    let section_count = view.i32(at + frame_movement::SECTION_COUNT)?;
    let section_frames = usize::try_from(section_frames)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| ctx.malformed(format!("frame movement section size {section_frames}")))?;
    let section_count = usize::try_from(section_count)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| ctx.malformed(format!("frame movement section count {section_count}")))?;

    let mut motion = RootMotion::default();
    let mut dp_section: Option<(usize, Keys<Vec3>, Keys<f32>)> = None;

    for frame in 0..desc.frames {
        let index = (frame / section_frames).min(section_count - 1);
        let local = frame - index * section_frames;
        let offset = view.i32(at + frame_movement::OFFSETS + index * 4)?;
        if offset <= 0 {
            motion.push(Vec3::ZERO, 0.0);
            continue;
        }
        let section = at + offset as usize;

        if datapoint {
            let cached = matches!(&dp_section, Some((s, _, _)) if *s == section);
            if !cached {
                dp_section = Some((section, read_dp_positions(view, section)?, read_dp_yaw(view, section)?));
            }
            if let Some((_, positions, yaws)) = &dp_section {
                let position = positions.sample_vec3(local).unwrap_or(Vec3::ZERO);
                let yaw = yaws.sample(local, |a, b, t| a + (b - a) * t).unwrap_or(0.0);
                motion.push(position, yaw);
            }
        } else {
            let component = |i: usize| -> Result<f32> {
                Ok(value_component(view, section, i, local, ctx)? * scale[i])
            };
            motion.push(Vec3::new(component(0)?, component(1)?, component(2)?), component(3)?);
        }
    }
    Ok(motion)
}

fn read_dp_positions(view: &ByteView<'_>, section: usize) -> Result<Keys<Vec3>> {
    let count = view.u16(section)? as usize;
    read_position_keys(view, section + frame_movement::DP_HEADER, count)
}

fn read_dp_yaw(view: &ByteView<'_>, section: usize) -> Result<Keys<f32>> {
    let positions = view.u16(section)? as usize;
    let count = view.u16(section + 2)? as usize;
    let at = section
        + frame_movement::DP_HEADER
        + positions * (SparsePos64::SIZE + frame_movement::DP_FIXUP_SIZE);
    let mut values = Vec::with_capacity(count);
    let mut gaps = Vec::with_capacity(count);
    for i in 0..count {
        let key = at + i * frame_movement::DP_YAW_KEY;
        values.push(Half(view.u16(key)?).unpack());
        gaps.push(u32::from(view.u16(key + 2)?));
    }
    Ok(Keys::from_gaps(values, gaps))
}

/// Root motion of a clip, if it carries any.
pub fn decode_root_motion(
    view: &ByteView<'_>,
    desc: &AnimDesc,
    datapoint: bool,
    ctx: &TrackContext<'_>,
) -> Result<Option<RootMotion>> {
    if desc.has_frame_movement() {
        if let Some(at) = desc.frame_movement {
            return read_frame_movement(view, desc, at, datapoint, ctx).map(Some);
        }
    }
    if desc.movements.is_empty() {
        return Ok(None);
    }
    let movements = read_movements(view, desc)?;
    Ok(Some(sample_movements(&movements, desc.frames)))
}

/// Rewrite bone 0 so root motion is part of its local transform.
#[must_use]
pub fn fold_into_root(track: DecodedBoneTrack, motion: &RootMotion, rest: BonePose) -> DecodedBoneTrack {
    let mut track = track.with_channels(0, TrackFlags::POSITION | TrackFlags::ROTATION, rest);
    for frame in 0..track.frame_count() {
        let (translation, yaw) = motion.at(frame);
        let turn = Quat::from_rotation_z(yaw);
        let pose = track.pose(0, frame, rest);
        track.set_pose(
            0,
            frame,
            BonePose {
                position: turn * pose.position + translation,
                rotation: turn * pose.rotation,
                scale: pose.scale,
            },
        );
    }
    track
}
