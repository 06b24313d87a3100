//! Sparse keyframe ("datapoint") bone tracks
//!
//! Only keys where a value changes are stored. Each key carries the number
//! of frames until the next one; frames between keys are interpolated and
//! frames past the last key hold it.

use glam::{Quat, Vec3};

use super::track::{BoneSample, TrackFlags};
use super::{TrackContext, read_nibbles};
use crate::error::Result;
use crate::formats::packed::{SparsePos64, SparseQuat32};
use crate::utils::ByteView;

/// Per-bone header in a datapoint section.
pub mod header {
    pub const SIZE: usize = 16;
    pub const POSITION_KEYS: usize = 0;
    pub const ROTATION_KEYS: usize = 2;
    pub const SCALE_KEYS: usize = 4;
    pub const DATA_OFFSET: usize = 8;
}

/// Bytes of one fixup triple.
pub const FIXUP_SIZE: usize = 6;

/// Sorted keyframes of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Keys<T> {
    pub frames: Vec<u32>,
    pub values: Vec<T>,
}

impl<T: Copy> Keys<T> {
    /// Build keys from values and their gaps; the first key is at frame 0.
    #[must_use]
    pub fn from_gaps(values: Vec<T>, gaps: impl IntoIterator<Item = u32>) -> Self {
        let mut frames = Vec::with_capacity(values.len());
        let mut frame = 0u32;
        for gap in gaps.into_iter().take(values.len()) {
            frames.push(frame);
            frame = frame.saturating_add(gap.max(1));
        }
        Self { frames, values }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `frame`, blending the enclosing pair with `lerp`.
    pub fn sample(&self, frame: usize, lerp: impl Fn(T, T, f32) -> T) -> Option<T> {
        let frame = u32::try_from(frame).unwrap_or(u32::MAX);
        let next = self.frames.partition_point(|&k| k <= frame);
        if next == 0 {
            return self.values.first().copied();
        }
        let i = next - 1;
        let current = *self.values.get(i)?;
        let (Some(&end), Some(&target)) = (self.frames.get(next), self.values.get(next)) else {
            return Some(current);
        };
        let start = self.frames[i];
        if frame == start {
            return Some(current);
        }
        let t = (frame - start) as f32 / (end - start) as f32;
        Some(lerp(current, target, t))
    }
}

impl Keys<Vec3> {
    #[must_use]
    pub fn sample_vec3(&self, frame: usize) -> Option<Vec3> {
        self.sample(frame, Vec3::lerp)
    }
}

impl Keys<Quat> {
    #[must_use]
    pub fn sample_quat(&self, frame: usize) -> Option<Quat> {
        self.sample(frame, Quat::lerp)
    }
}

/// Read `count` sparse position keys and their fixups at `at`.
pub fn read_position_keys(view: &ByteView<'_>, at: usize, count: usize) -> Result<Keys<Vec3>> {
    let fixups = at + count * SparsePos64::SIZE;
    let mut values = Vec::with_capacity(count);
    let mut gaps = Vec::with_capacity(count);
    for i in 0..count {
        let key = SparsePos64(view.u64(at + i * SparsePos64::SIZE)?);
        values.push(key.unpack(Some(view.i16x3(fixups + i * FIXUP_SIZE)?)));
        gaps.push(key.gap());
    }
    Ok(Keys::from_gaps(values, gaps))
}

fn read_rotation_keys(view: &ByteView<'_>, at: usize, count: usize) -> Result<Keys<Quat>> {
    let fixups = at + count * SparseQuat32::SIZE;
    let mut values = Vec::with_capacity(count);
    let mut gaps = Vec::with_capacity(count);
    for i in 0..count {
        let key = SparseQuat32(view.u32(at + i * SparseQuat32::SIZE)?);
        values.push(key.unpack(Some(view.i16x3(fixups + i * FIXUP_SIZE)?)));
        gaps.push(key.gap());
    }
    Ok(Keys::from_gaps(values, gaps))
}

#[derive(Debug, Clone, Default)]
struct BoneKeys {
    position: Option<Keys<Vec3>>,
    rotation: Option<Keys<Quat>>,
    scale: Option<Keys<Vec3>>,
    extra: bool,
}

/// Fully unpacked keys of one section.
#[derive(Debug, Clone)]
pub struct DatapointSection {
    bones: Vec<Option<BoneKeys>>,
}

impl DatapointSection {
    pub fn parse(view: &ByteView<'_>, at: usize, ctx: &TrackContext<'_>) -> Result<Self> {
        let (flags, len) = read_nibbles(view, at, ctx.bones.len())?;
        let mut next_header = at + len;
        let mut bones = Vec::with_capacity(flags.len());

        for f in flags {
            if f.is_empty() {
                bones.push(None);
                continue;
            }
            let h = next_header;
            next_header += header::SIZE;
            let counts = [
                view.u16(h + header::POSITION_KEYS)? as usize,
                view.u16(h + header::ROTATION_KEYS)? as usize,
                view.u16(h + header::SCALE_KEYS)? as usize,
            ];
            let mut data = at + view.u32(h + header::DATA_OFFSET)? as usize;

            let mut keys = BoneKeys {
                extra: f.contains(TrackFlags::EXTRA),
                ..BoneKeys::default()
            };
            if f.contains(TrackFlags::POSITION) && counts[0] > 0 {
                keys.position = Some(read_position_keys(view, data, counts[0])?);
            }
            data += counts[0] * (SparsePos64::SIZE + FIXUP_SIZE);
            if f.contains(TrackFlags::ROTATION) && counts[1] > 0 {
                keys.rotation = Some(read_rotation_keys(view, data, counts[1])?);
            }
            data += counts[1] * (SparseQuat32::SIZE + FIXUP_SIZE);
            if f.contains(TrackFlags::SCALE) && counts[2] > 0 {
                keys.scale = Some(read_position_keys(view, data, counts[2])?);
            }
            bones.push(Some(keys));
        }
        Ok(Self { bones })
    }

    #[must_use]
    pub fn sample(&self, bone: usize, frame: usize) -> BoneSample {
        let Some(Some(keys)) = self.bones.get(bone) else {
            return BoneSample::default();
        };
        BoneSample {
            position: keys.position.as_ref().and_then(|k| k.sample_vec3(frame)),
            rotation: keys.rotation.as_ref().and_then(|k| k.sample_quat(frame)),
            scale: keys.scale.as_ref().and_then(|k| k.sample_vec3(frame)),
            extra: keys.extra,
        }
    }
}
