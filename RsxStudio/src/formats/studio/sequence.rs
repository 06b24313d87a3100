//! Sequence descriptors and assembly
//!
//! Descriptors are read with the header pass. Assembly runs later, once
//! streamed sections and anim-data assets are resident: each referenced
//! clip is decoded, root motion is folded into bone 0 and delta clips are
//! scaled by the sequence's bone weight list.

use std::borrow::Cow;

use glam::{Quat, Vec3};
use serde::Serialize;

use super::anim::{
    AnimDesc, AnimFlags, BonePose, DecodedBoneTrack, ExternalBuffers, TrackCodec, TrackContext, decode_track,
};
use super::bones::Bone;
use super::header::NormalizedHeader;
use super::layout::WeightListField;
use super::movement::{RootMotion, decode_root_motion, fold_into_root};
use super::version::StudioVersion;
use crate::config::DecodeOptions;
use crate::error::{Error, Result};
use crate::utils::{ByteView, OffsetEncoding, TableRef};

/// Per-bone blend weights of a sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WeightList {
    AllOne,
    AllZero,
    Custom(Vec<f32>),
}

impl WeightList {
    /// Weights for the first `bone_count` bones.
    #[must_use]
    pub fn weights(&self, bone_count: usize) -> Cow<'_, [f32]> {
        match self {
            WeightList::AllOne => Cow::Owned(vec![1.0; bone_count]),
            WeightList::AllZero => Cow::Owned(vec![0.0; bone_count]),
            WeightList::Custom(weights) => Cow::Borrowed(&weights[..bone_count.min(weights.len())]),
        }
    }

    #[must_use]
    pub fn weight(&self, bone: usize) -> f32 {
        match self {
            WeightList::AllOne => 1.0,
            WeightList::AllZero => 0.0,
            WeightList::Custom(weights) => weights.get(bone).copied().unwrap_or(0.0),
        }
    }

    fn read(view: &ByteView<'_>, field: WeightListField, seq: usize, bone_count: usize) -> Result<Self> {
        let table = match field {
            WeightListField::Wide(pos) => match view.i32(seq + pos)? {
                0 => return Ok(WeightList::AllOne),
                -1 => return Ok(WeightList::AllZero),
                _ => view.offset(OffsetEncoding::Relative32, seq, pos)?,
            },
            WeightListField::Packed(pos) => match view.u16(seq + pos)? {
                0 => return Ok(WeightList::AllOne),
                0xFFFF => return Ok(WeightList::AllZero),
                _ => view.offset(OffsetEncoding::Fix16, seq, pos)?,
            },
        };
        let Some(table) = table else {
            return Ok(WeightList::AllOne);
        };
        let weights = (0..bone_count)
            .map(|b| view.f32(table + b * 4))
            .collect::<Result<Vec<_>>>()?;
        Ok(WeightList::Custom(weights))
    }
}

/// Where a sequence was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SequenceSource {
    Model,
    /// A separate sequence asset.
    External(String),
}

/// A sequence descriptor before its clips are decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeqDesc {
    pub index: usize,
    pub offset: usize,
    pub label: String,
    pub activity_name: String,
    pub flags: AnimFlags,
    pub activity: i32,
    pub activity_weight: i32,
    pub event_count: usize,
    pub bbox_min: Vec3,
    pub bbox_max: Vec3,
    pub group_size: [usize; 2],
    pub fade_in: f32,
    pub fade_out: f32,
    pub weights: WeightList,
    pub anim_data_guid: Option<u64>,
    /// Absolute positions of the referenced animation descriptors.
    pub anims: Vec<usize>,
    /// Why the animation references could not be resolved.
    pub invalid: Option<String>,
}

impl SeqDesc {
    /// Read the descriptor at `at`.
    ///
    /// `local_anims` resolves the `i16` indices used by r1 and r2.
    ///
    /// An anim index outside the local animation table or a bad anim entry
    /// is recorded in [`SeqDesc::invalid`] with no anims, so the sequence
    /// is skipped at assembly while its siblings still decode.
    ///
    /// # Errors
    /// Returns a bounds error if the descriptor itself cannot be read.
    pub fn parse(
        view: &ByteView<'_>,
        version: StudioVersion,
        index: usize,
        at: usize,
        local_anims: &TableRef,
        bone_count: usize,
    ) -> Result<Self> {
        let layout = version.seqdesc_layout();
        let enc = layout.encoding;
        let packed = enc == OffsetEncoding::Fix16;
        view.bytes(at, layout.stride)?;

        let (activity, activity_weight) = if packed {
            (
                i32::from(view.i16(at + layout.activity)?),
                i32::from(view.u16(at + layout.activity_weight)?),
            )
        } else {
            (view.i32(at + layout.activity)?, view.i32(at + layout.activity_weight)?)
        };
        let group_size = if packed {
            [
                view.u8(at + layout.group_size[0])? as usize,
                view.u8(at + layout.group_size[1])? as usize,
            ]
        } else {
            [
                view.count(enc, at + layout.group_size[0])?,
                view.count(enc, at + layout.group_size[1])?,
            ]
        };
        let (fade_in, fade_out) = if packed {
            (view.f16(at + layout.fade_in)?, view.f16(at + layout.fade_out)?)
        } else {
            (view.f32(at + layout.fade_in)?, view.f32(at + layout.fade_out)?)
        };

        let blend_count = view.count(enc, at + layout.blend_count)?;
        let (anims, invalid) = match resolve_anims(view, version, index, at, blend_count, local_anims) {
            Ok(anims) => (anims, None),
            Err(e) => {
                tracing::warn!(sequence = index, "Unresolved animation references: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        Ok(Self {
            index,
            offset: at,
            label: view.string_at(enc, at, layout.label)?,
            activity_name: view.string_at(enc, at, layout.activity_name)?,
            flags: AnimFlags::from_bits_retain(view.u32(at + layout.flags)?),
            activity,
            activity_weight,
            event_count: view.count(enc, at + layout.events.count)?,
            bbox_min: view.vec3(at + layout.bbox_min)?,
            bbox_max: view.vec3(at + layout.bbox_max)?,
            group_size,
            fade_in,
            fade_out,
            weights: WeightList::read(view, layout.weight_list, at, bone_count)?,
            anim_data_guid: layout.anim_data_guid.map(|pos| view.u64(at + pos)).transpose()?,
            anims,
            invalid,
        })
    }
}

/// Absolute animdesc positions referenced by the descriptor at `at`.
fn resolve_anims(
    view: &ByteView<'_>,
    version: StudioVersion,
    index: usize,
    at: usize,
    blend_count: usize,
    local_anims: &TableRef,
) -> Result<Vec<usize>> {
    let layout = version.seqdesc_layout();
    let malformed = |reason: String| Error::MalformedSequence { index, reason };
    let Some(table) = view.offset(layout.encoding, at, layout.anim_index)? else {
        return Ok(Vec::new());
    };

    if version.uses_local_anim_index() {
        let stride = version.animdesc_layout().stride;
        return (0..blend_count)
            .map(|i| {
                let local = view.i16(table + i * 2)?;
                let local = usize::try_from(local)
                    .ok()
                    .filter(|&l| l < local_anims.count)
                    .ok_or_else(|| malformed(format!("local anim index {local}")))?;
                local_anims
                    .offset
                    .map(|base| base + local * stride)
                    .ok_or_else(|| malformed("no local animation table".to_string()))
            })
            .collect();
    }

    (0..blend_count)
        .map(|i| {
            let entry = view.i32(table + i * 4)?;
            at.checked_add_signed(entry as isize)
                .filter(|_| entry != 0)
                .ok_or_else(|| malformed(format!("anim entry {i} offset {entry}")))
        })
        .collect()
}

/// Read every sequence descriptor of a model.
pub fn decode_seqdescs(view: &ByteView<'_>, header: &NormalizedHeader) -> Result<Vec<SeqDesc>> {
    let stride = header.version.seqdesc_layout().stride;
    header
        .sequences
        .records(view, stride)?
        .into_iter()
        .enumerate()
        .map(|(i, at)| SeqDesc::parse(view, header.version, i, at, &header.local_anims, header.bones.count))
        .collect()
}

/// One decoded clip of a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub desc: AnimDesc,
    pub track: DecodedBoneTrack,
    pub root_motion: Option<RootMotion>,
}

/// An assembled sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub desc: SeqDesc,
    pub source: SequenceSource,
    pub clips: Vec<AnimationClip>,
    /// Why decoding stopped early, if it did.
    pub skipped: Option<String>,
}

impl Sequence {
    #[must_use]
    pub fn label(&self) -> &str {
        &self.desc.label
    }

    /// Whether every referenced clip was decoded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_none() && self.clips.len() == self.desc.anims.len()
    }
}

/// Scale a delta clip by per-bone weights.
pub fn apply_weights(track: &mut DecodedBoneTrack, weights: &WeightList) {
    for bone in 0..track.bone_count() {
        let w = weights.weight(bone);
        if (w - 1.0).abs() <= f32::EPSILON {
            continue;
        }
        for frame in 0..track.frame_count() {
            let pose = track.pose(bone, frame, BonePose::IDENTITY);
            track.set_pose(
                bone,
                frame,
                BonePose {
                    position: pose.position * w,
                    rotation: Quat::IDENTITY.slerp(pose.rotation, w),
                    scale: Vec3::ONE.lerp(pose.scale, w),
                },
            );
        }
    }
}

fn check_bounds(desc: &AnimDesc, index: usize, options: &DecodeOptions) -> Result<()> {
    if !(desc.fps > 0.0 && desc.fps <= options.max_fps) {
        return Err(Error::MalformedSequence {
            index,
            reason: format!("animation '{}' has fps {}", desc.name, desc.fps),
        });
    }
    if desc.frames < 1 || desc.frames > options.max_frames {
        return Err(Error::MalformedSequence {
            index,
            reason: format!("animation '{}' has {} frames", desc.name, desc.frames),
        });
    }
    Ok(())
}

fn decode_clip(
    view: &ByteView<'_>,
    version: StudioVersion,
    seq: &SeqDesc,
    at: usize,
    bones: &[Bone],
    buffers: &ExternalBuffers<'_>,
    options: &DecodeOptions,
) -> Result<AnimationClip> {
    let desc = AnimDesc::parse(view, version, at)?;
    check_bounds(&desc, seq.index, options)?;

    let mut track = decode_track(*view, version, &desc, bones, buffers)?;
    let ctx = TrackContext {
        name: &desc.name,
        bones,
        delta: desc.is_delta(),
    };
    let datapoint = TrackCodec::select(version, &desc) == TrackCodec::Datapoint;
    let root_motion = decode_root_motion(view, &desc, datapoint, &ctx)?;

    if options.fold_root_motion && !desc.is_delta() {
        if let (Some(motion), Some(root)) = (&root_motion, bones.first()) {
            track = fold_into_root(track, motion, BonePose::from_bone(root));
        }
    }
    if options.apply_delta_weights && desc.is_delta() {
        apply_weights(&mut track, &seq.weights);
    }

    Ok(AnimationClip {
        desc,
        track,
        root_motion,
    })
}

/// Decode every clip of a sequence.
///
/// A descriptor whose anim references did not resolve yields no clips.
/// A malformed clip stops the sequence, keeping the clips already decoded.
/// Missing external data drops the whole sequence. Both are logged and
/// recorded in [`Sequence::skipped`]; neither fails the asset.
#[must_use]
pub fn assemble(
    view: &ByteView<'_>,
    version: StudioVersion,
    desc: SeqDesc,
    source: SequenceSource,
    bones: &[Bone],
    buffers: &ExternalBuffers<'_>,
    options: &DecodeOptions,
) -> Sequence {
    if let Some(reason) = desc.invalid.clone() {
        return Sequence {
            desc,
            source,
            clips: Vec::new(),
            skipped: Some(reason),
        };
    }

    let mut clips = Vec::with_capacity(desc.anims.len());
    let mut skipped = None;

    for &at in &desc.anims {
        match decode_clip(view, version, &desc, at, bones, buffers, options) {
            Ok(clip) => clips.push(clip),
            Err(e @ Error::MissingExternalData(_)) => {
                tracing::warn!(sequence = desc.index, label = %desc.label, "Skipping sequence: {}", e);
                clips.clear();
                skipped = Some(e.to_string());
                break;
            }
            Err(e) => {
                tracing::warn!(
                    sequence = desc.index,
                    label = %desc.label,
                    remaining = desc.anims.len() - clips.len(),
                    "Skipping remaining animations: {}",
                    e
                );
                skipped = Some(e.to_string());
                break;
            }
        }
    }

    Sequence {
        desc,
        source,
        clips,
        skipped,
    }
}

/// Assemble a sequence stored in its own asset against a model's skeleton.
///
/// The descriptor sits at the start of `data` and its clips are addressed
/// inside the same buffer.
///
/// # Errors
/// Fails if the descriptor cannot be read. Clip failures are recorded on
/// the returned sequence.
pub fn decode_external_sequence(
    name: &str,
    data: &[u8],
    version: StudioVersion,
    bones: &[Bone],
    buffers: &ExternalBuffers<'_>,
    options: &DecodeOptions,
) -> Result<Sequence> {
    if version.uses_local_anim_index() {
        return Err(Error::UnsupportedVersion(format!(
            "{version} has no external sequence assets"
        )));
    }
    let view = ByteView::new(data);
    let desc = SeqDesc::parse(&view, version, 0, 0, &TableRef::empty(), bones.len())?;
    Ok(assemble(
        &view,
        version,
        desc,
        SequenceSource::External(name.to_string()),
        bones,
        buffers,
        options,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::studio::anim::TrackFlags;
    use crate::formats::studio::layout::{ANIMDESC_V8, SEQDESC_PACKED, SEQDESC_WIDE};
    use pretty_assertions::assert_eq;

    fn put<const N: usize>(buf: &mut [u8], at: usize, bytes: [u8; N]) {
        buf[at..at + N].copy_from_slice(&bytes);
    }

    #[test]
    fn test_weight_list_sentinels() {
        let mut buf = vec![0u8; SEQDESC_WIDE.stride + 16];
        let view = ByteView::new(&buf);
        assert_eq!(WeightList::read(&view, SEQDESC_WIDE.weight_list, 0, 4).unwrap(), WeightList::AllOne);

        put(&mut buf, 156, (-1i32).to_le_bytes());
        let view = ByteView::new(&buf);
        assert_eq!(WeightList::read(&view, SEQDESC_WIDE.weight_list, 0, 4).unwrap(), WeightList::AllZero);

        let mut packed = vec![0u8; 64];
        put(&mut packed, 50, 0xFFFFu16.to_le_bytes());
        let view = ByteView::new(&packed);
        assert_eq!(WeightList::read(&view, SEQDESC_PACKED.weight_list, 0, 4).unwrap(), WeightList::AllZero);

        put(&mut packed, 50, 6u16.to_le_bytes());
        put(&mut packed, 56, 0.5f32.to_le_bytes());
        let view = ByteView::new(&packed);
        let list = WeightList::read(&view, SEQDESC_PACKED.weight_list, 0, 1).unwrap();
        assert_eq!(list, WeightList::Custom(vec![0.5]));
        assert_eq!(&*list.weights(3), &[0.5]);
        assert_eq!(&*WeightList::AllOne.weights(2), &[1.0, 1.0]);
    }

    #[test]
    fn test_builtin_weights_cover_every_bone() {
        let ones = WeightList::AllOne.weights(300);
        assert_eq!(ones.len(), 300);
        assert!(ones.iter().all(|&w| (w - 1.0).abs() < f32::EPSILON));
        let zeros = WeightList::AllZero.weights(1024);
        assert_eq!(zeros.len(), 1024);
        assert_eq!(zeros[1023], 0.0);
        assert_eq!(WeightList::AllOne.weight(299), 1.0);
    }

    #[test]
    fn test_delta_weights() {
        let mut track = DecodedBoneTrack::from_fn(1, &[TrackFlags::POSITION | TrackFlags::ROTATION | TrackFlags::SCALE; 2], |_, _| BonePose {
            position: Vec3::new(2.0, 0.0, 0.0),
            rotation: Quat::from_rotation_z(1.0),
            scale: Vec3::splat(3.0),
        });
        apply_weights(&mut track, &WeightList::Custom(vec![0.5, 1.0]));
        assert_eq!(track.position(0, 0), Some(Vec3::new(1.0, 0.0, 0.0)));
        assert!(track.rotation(0, 0).unwrap().abs_diff_eq(Quat::from_rotation_z(0.5), 1e-5));
        assert_eq!(track.scale(0, 0), Some(Vec3::splat(2.0)));
        assert_eq!(track.position(1, 0), Some(Vec3::new(2.0, 0.0, 0.0)));
    }

    fn wide_model(fps: f32, frames: i32) -> Vec<u8> {
        // seqdesc at 0, anim index table at 220, animdesc at 240
        let mut buf = vec![0u8; 400];
        put(&mut buf, 56, 1i32.to_le_bytes());
        put(&mut buf, 60, 220i32.to_le_bytes());
        put(&mut buf, 220, 240i32.to_le_bytes());
        let d = 240;
        put(&mut buf, d + ANIMDESC_V8.fps, fps.to_le_bytes());
        put(&mut buf, d + ANIMDESC_V8.frames, frames.to_le_bytes());
        buf
    }

    #[test]
    fn test_assemble_static_clip() {
        let buf = wide_model(30.0, 2);
        let view = ByteView::new(&buf);
        let bones = [Bone::identity("root", -1)];
        let desc = SeqDesc::parse(&view, StudioVersion::V10, 0, 0, &TableRef::empty(), 1).unwrap();
        assert_eq!(desc.anims, vec![240]);

        let seq = assemble(
            &view,
            StudioVersion::V10,
            desc,
            SequenceSource::Model,
            &bones,
            &ExternalBuffers::default(),
            &DecodeOptions::default(),
        );
        assert!(seq.is_complete());
        assert_eq!(seq.clips[0].track.frame_count(), 2);
        assert_eq!(seq.clips[0].track.rotation(0, 1), Some(Quat::IDENTITY));
    }

    #[test]
    fn test_bad_fps_skips_sequence() {
        let buf = wide_model(5000.0, 2);
        let view = ByteView::new(&buf);
        let bones = [Bone::identity("root", -1)];
        let desc = SeqDesc::parse(&view, StudioVersion::V10, 3, 0, &TableRef::empty(), 1).unwrap();
        let seq = assemble(
            &view,
            StudioVersion::V10,
            desc,
            SequenceSource::Model,
            &bones,
            &ExternalBuffers::default(),
            &DecodeOptions::default(),
        );
        assert!(seq.clips.is_empty());
        assert!(seq.skipped.unwrap().contains("fps"));
    }

    #[test]
    fn test_local_anim_index_checked() {
        let mut buf = vec![0u8; 300];
        put(&mut buf, 56, 1i32.to_le_bytes());
        put(&mut buf, 60, 220i32.to_le_bytes());
        put(&mut buf, 220, 2i16.to_le_bytes());
        let view = ByteView::new(&buf);
        let local = TableRef { count: 1, offset: Some(0) };
        let desc = SeqDesc::parse(&view, StudioVersion::R1, 0, 0, &local, 1).unwrap();
        assert!(desc.anims.is_empty());
        assert!(desc.invalid.as_deref().unwrap().contains("local anim index 2"));
    }

    #[test]
    fn test_zero_anim_entry_skips_sequence() {
        let mut buf = wide_model(30.0, 2);
        put(&mut buf, 220, 0i32.to_le_bytes());
        let view = ByteView::new(&buf);
        let bones = [Bone::identity("root", -1)];
        let desc = SeqDesc::parse(&view, StudioVersion::V10, 1, 0, &TableRef::empty(), 1).unwrap();
        assert_eq!(desc.invalid.as_deref(), Some("malformed sequence 1: anim entry 0 offset 0"));

        let seq = assemble(
            &view,
            StudioVersion::V10,
            desc,
            SequenceSource::Model,
            &bones,
            &ExternalBuffers::default(),
            &DecodeOptions::default(),
        );
        assert!(seq.clips.is_empty());
        assert!(!seq.is_complete());
        assert!(seq.skipped.unwrap().contains("anim entry 0"));
    }
}
