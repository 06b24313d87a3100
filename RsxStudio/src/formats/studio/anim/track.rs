//! Decoded per-bone animation tracks
//!
//! All channels of a clip live in one `f32` allocation. Each bone has an
//! entry giving its channel flags and the start of its block; inside a block
//! positions (3 floats per frame), rotations (4) and scales (3) follow each
//! other for the channels the bone carries.

use bitflags::bitflags;
use glam::{Quat, Vec3};
use serde::Serialize;

use crate::formats::studio::bones::Bone;

bitflags! {
    /// Channels animated for one bone.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
    pub struct TrackFlags: u8 {
        const POSITION = 0x1;
        const ROTATION = 0x2;
        const SCALE = 0x4;
        /// Set in the per-bone nibble but carries no decoded channel.
        const EXTRA = 0x8;
    }
}

impl TrackFlags {
    /// Flags from the low nibble of a per-bone flag byte.
    #[must_use]
    pub fn from_nibble(nibble: u8) -> Self {
        Self::from_bits_truncate(nibble & 0xF)
    }

    /// Floats stored per frame for these channels.
    #[must_use]
    pub fn floats_per_frame(self) -> usize {
        let mut n = 0;
        if self.contains(Self::POSITION) {
            n += 3;
        }
        if self.contains(Self::ROTATION) {
            n += 4;
        }
        if self.contains(Self::SCALE) {
            n += 3;
        }
        n
    }
}

/// Local transform of one bone at one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BonePose {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl BonePose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// The bone's base pose.
    #[must_use]
    pub fn from_bone(bone: &Bone) -> Self {
        Self {
            position: bone.position,
            rotation: bone.quat,
            scale: bone.scale,
        }
    }

    /// Default pose for missing channels: identity for delta clips, base pose otherwise.
    #[must_use]
    pub fn rest(bone: &Bone, delta: bool) -> Self {
        if delta { Self::IDENTITY } else { Self::from_bone(bone) }
    }
}

/// One bone's channels at one frame, as produced by a section decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoneSample {
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub scale: Option<Vec3>,
    pub extra: bool,
}

impl BoneSample {
    #[must_use]
    pub fn flags(&self) -> TrackFlags {
        let mut flags = TrackFlags::empty();
        flags.set(TrackFlags::POSITION, self.position.is_some());
        flags.set(TrackFlags::ROTATION, self.rotation.is_some());
        flags.set(TrackFlags::SCALE, self.scale.is_some());
        flags.set(TrackFlags::EXTRA, self.extra);
        flags
    }

    /// Fill missing channels from `rest`.
    #[must_use]
    pub fn resolve(&self, rest: BonePose) -> BonePose {
        BonePose {
            position: self.position.unwrap_or(rest.position),
            rotation: self.rotation.unwrap_or(rest.rotation),
            scale: self.scale.unwrap_or(rest.scale),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoneTrackEntry {
    pub flags: TrackFlags,
    /// Start of the bone's block in floats.
    pub offset: usize,
}

/// Per-frame channels of every bone in a clip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBoneTrack {
    frame_count: usize,
    data: Vec<f32>,
    bones: Vec<BoneTrackEntry>,
}

impl DecodedBoneTrack {
    /// Build a track whose bone `b` carries `flags[b]`, filled from `pose`.
    pub fn from_fn(
        frame_count: usize,
        flags: &[TrackFlags],
        mut pose: impl FnMut(usize, usize) -> BonePose,
    ) -> Self {
        let mut bones = Vec::with_capacity(flags.len());
        let mut total = 0;
        for &f in flags {
            bones.push(BoneTrackEntry { flags: f, offset: total });
            total += f.floats_per_frame() * frame_count;
        }
        let mut track = Self {
            frame_count,
            data: vec![0.0; total],
            bones,
        };
        for bone in 0..flags.len() {
            for frame in 0..frame_count {
                track.set_pose(bone, frame, pose(bone, frame));
            }
        }
        track
    }

    /// A clip holding `rest` for every bone, frame and channel.
    #[must_use]
    pub fn constant(frame_count: usize, rest: &[BonePose]) -> Self {
        let flags = vec![TrackFlags::POSITION | TrackFlags::ROTATION | TrackFlags::SCALE; rest.len()];
        Self::from_fn(frame_count, &flags, |bone, _| rest[bone])
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[must_use]
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[BoneTrackEntry] {
        &self.bones
    }

    #[must_use]
    pub fn flags(&self, bone: usize) -> TrackFlags {
        self.bones.get(bone).map(|e| e.flags).unwrap_or_default()
    }

    /// Bytes backing the whole clip.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Start of a channel's block in floats, if the bone carries it.
    fn channel_start(&self, bone: usize, channel: TrackFlags) -> Option<usize> {
        let entry = self.bones.get(bone)?;
        if !entry.flags.contains(channel) {
            return None;
        }
        let mut start = entry.offset;
        if channel != TrackFlags::POSITION && entry.flags.contains(TrackFlags::POSITION) {
            start += 3 * self.frame_count;
        }
        if channel == TrackFlags::SCALE && entry.flags.contains(TrackFlags::ROTATION) {
            start += 4 * self.frame_count;
        }
        Some(start)
    }

    fn channel(&self, bone: usize, channel: TrackFlags, width: usize) -> Option<&[f32]> {
        let start = self.channel_start(bone, channel)?;
        self.data.get(start..start + width * self.frame_count)
    }

    #[must_use]
    pub fn positions(&self, bone: usize) -> Option<&[[f32; 3]]> {
        bytemuck::try_cast_slice(self.channel(bone, TrackFlags::POSITION, 3)?).ok()
    }

    #[must_use]
    pub fn rotations(&self, bone: usize) -> Option<&[[f32; 4]]> {
        bytemuck::try_cast_slice(self.channel(bone, TrackFlags::ROTATION, 4)?).ok()
    }

    #[must_use]
    pub fn scales(&self, bone: usize) -> Option<&[[f32; 3]]> {
        bytemuck::try_cast_slice(self.channel(bone, TrackFlags::SCALE, 3)?).ok()
    }

    #[must_use]
    pub fn position(&self, bone: usize, frame: usize) -> Option<Vec3> {
        self.positions(bone)?.get(frame).map(|p| Vec3::from_array(*p))
    }

    #[must_use]
    pub fn rotation(&self, bone: usize, frame: usize) -> Option<Quat> {
        self.rotations(bone)?.get(frame).map(|q| Quat::from_array(*q))
    }

    #[must_use]
    pub fn scale(&self, bone: usize, frame: usize) -> Option<Vec3> {
        self.scales(bone)?.get(frame).map(|s| Vec3::from_array(*s))
    }

    /// Pose of a bone at a frame, falling back to `rest` for absent channels.
    #[must_use]
    pub fn pose(&self, bone: usize, frame: usize, rest: BonePose) -> BonePose {
        BonePose {
            position: self.position(bone, frame).unwrap_or(rest.position),
            rotation: self.rotation(bone, frame).unwrap_or(rest.rotation),
            scale: self.scale(bone, frame).unwrap_or(rest.scale),
        }
    }

    fn write(&mut self, bone: usize, frame: usize, channel: TrackFlags, values: &[f32]) {
        if frame >= self.frame_count {
            return;
        }
        if let Some(start) = self.channel_start(bone, channel) {
            let at = start + frame * values.len();
            if let Some(dst) = self.data.get_mut(at..at + values.len()) {
                dst.copy_from_slice(values);
            }
        }
    }

    /// Overwrite the channels a bone carries; other channels are ignored.
    pub fn set_pose(&mut self, bone: usize, frame: usize, pose: BonePose) {
        self.write(bone, frame, TrackFlags::POSITION, &pose.position.to_array());
        self.write(bone, frame, TrackFlags::ROTATION, &pose.rotation.to_array());
        self.write(bone, frame, TrackFlags::SCALE, &pose.scale.to_array());
    }

    /// Rebuild with extra channels on one bone, filled from `rest`.
    #[must_use]
    pub fn with_channels(self, bone: usize, add: TrackFlags, rest: BonePose) -> Self {
        let current = self.flags(bone);
        if current.contains(add) || bone >= self.bones.len() {
            return self;
        }
        let mut flags: Vec<TrackFlags> = self.bones.iter().map(|e| e.flags).collect();
        flags[bone] |= add;
        Self::from_fn(self.frame_count, &flags, |b, f| {
            let fallback = if b == bone { rest } else { BonePose::IDENTITY };
            self.pose(b, f, fallback)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_layout_follows_flags() {
        let flags = [
            TrackFlags::POSITION | TrackFlags::ROTATION,
            TrackFlags::empty(),
            TrackFlags::SCALE,
        ];
        let track = DecodedBoneTrack::from_fn(2, &flags, |bone, frame| BonePose {
            position: Vec3::splat(frame as f32),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(bone as f32),
        });
        assert_eq!(track.entries()[0].offset, 0);
        assert_eq!(track.entries()[1].offset, 14);
        assert_eq!(track.entries()[2].offset, 14);
        assert_eq!(track.as_bytes().len(), 20 * 4);
        assert_eq!(track.position(0, 1), Some(Vec3::ONE));
        assert_eq!(track.rotation(0, 0), Some(Quat::IDENTITY));
        assert!(track.positions(1).is_none());
        assert_eq!(track.scale(2, 0), Some(Vec3::splat(2.0)));
        assert!(track.position(2, 0).is_none());
    }

    #[test]
    fn test_pose_falls_back_to_rest() {
        let track = DecodedBoneTrack::from_fn(1, &[TrackFlags::ROTATION], |_, _| BonePose {
            rotation: Quat::from_rotation_z(1.0),
            ..BonePose::IDENTITY
        });
        let rest = BonePose {
            position: Vec3::new(1.0, 2.0, 3.0),
            ..BonePose::IDENTITY
        };
        let pose = track.pose(0, 0, rest);
        assert_eq!(pose.position, rest.position);
        assert_eq!(pose.rotation, Quat::from_rotation_z(1.0));
    }

    #[test]
    fn test_with_channels_preserves_existing() {
        let track = DecodedBoneTrack::from_fn(3, &[TrackFlags::SCALE], |_, f| BonePose {
            scale: Vec3::splat(f as f32),
            ..BonePose::IDENTITY
        });
        let rest = BonePose {
            position: Vec3::X,
            ..BonePose::IDENTITY
        };
        let track = track.with_channels(0, TrackFlags::POSITION, rest);
        assert_eq!(track.flags(0), TrackFlags::POSITION | TrackFlags::SCALE);
        assert_eq!(track.position(0, 2), Some(Vec3::X));
        assert_eq!(track.scale(0, 2), Some(Vec3::splat(2.0)));
    }

    #[test]
    fn test_nibble_flags() {
        assert_eq!(TrackFlags::from_nibble(0x3), TrackFlags::POSITION | TrackFlags::ROTATION);
        assert_eq!(TrackFlags::from_nibble(0xF8), TrackFlags::EXTRA);
        assert_eq!(TrackFlags::all().floats_per_frame(), 10);
    }
}
