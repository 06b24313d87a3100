//! Animation track decoding
//!
//! A clip is decoded frame by frame: the revision's [`SectionAddressing`]
//! maps each frame to a section, the section is parsed once with the clip's
//! codec, and each bone is sampled from it. The per-frame samples are then
//! packed into one [`DecodedBoneTrack`].

pub mod datapoint;
pub mod desc;
pub mod legacy;
pub mod rle;
pub mod sections;
pub mod track;

pub use datapoint::{DatapointSection, Keys};
pub use desc::{AnimDesc, AnimFlags, SectionTable};
pub use legacy::LegacySection;
pub use rle::RleSection;
pub use sections::{DataSource, ExternalBuffers, SectionAddressing, SectionRef};
pub use track::{BonePose, BoneSample, BoneTrackEntry, DecodedBoneTrack, TrackFlags};

use super::bones::Bone;
use super::version::{LayoutFamily, StudioVersion};
use crate::error::{Error, Result};
use crate::utils::ByteView;

/// Clip-wide state shared by the section decoders.
#[derive(Debug, Clone, Copy)]
pub struct TrackContext<'b> {
    pub name: &'b str,
    pub bones: &'b [Bone],
    pub delta: bool,
}

impl TrackContext<'_> {
    #[must_use]
    pub fn malformed(&self, reason: String) -> Error {
        Error::MalformedAnimation {
            name: self.name.to_string(),
            reason,
        }
    }
}

/// Read the per-bone flag nibbles at `at`.
///
/// Two bones per byte, low nibble first; the array is padded to an even
/// byte count. Returns the flags and the array length in bytes.
pub fn read_nibbles(view: &ByteView<'_>, at: usize, bone_count: usize) -> Result<(Vec<TrackFlags>, usize)> {
    let len = bone_count.div_ceil(2).next_multiple_of(2);
    let bytes = view.bytes(at, len)?;
    let flags = (0..bone_count)
        .map(|bone| TrackFlags::from_nibble(bytes[bone / 2] >> ((bone % 2) * 4)))
        .collect();
    Ok((flags, len))
}

/// Track encoding of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackCodec {
    /// Linked per-bone records.
    Legacy,
    Rle,
    Datapoint,
}

impl TrackCodec {
    #[must_use]
    pub fn select(version: StudioVersion, desc: &AnimDesc) -> Self {
        if version.family() == LayoutFamily::Source {
            TrackCodec::Legacy
        } else if desc.is_datapoint() && version.supports_datapoint() {
            TrackCodec::Datapoint
        } else {
            TrackCodec::Rle
        }
    }
}

#[derive(Debug, Clone)]
enum ParsedSection {
    Legacy(LegacySection),
    Rle(RleSection),
    Datapoint(DatapointSection),
}

impl ParsedSection {
    fn parse(codec: TrackCodec, view: &ByteView<'_>, at: usize, ctx: &TrackContext<'_>) -> Result<Self> {
        Ok(match codec {
            TrackCodec::Legacy => ParsedSection::Legacy(LegacySection::parse(view, at, ctx)?),
            TrackCodec::Rle => ParsedSection::Rle(RleSection::parse(view, at, ctx)?),
            TrackCodec::Datapoint => ParsedSection::Datapoint(DatapointSection::parse(view, at, ctx)?),
        })
    }

    fn sample(&self, view: &ByteView<'_>, bone: usize, frame: usize, ctx: &TrackContext<'_>) -> Result<BoneSample> {
        match self {
            ParsedSection::Legacy(s) => s.sample(view, bone, frame, ctx),
            ParsedSection::Rle(s) => s.sample(view, bone, frame, ctx),
            ParsedSection::Datapoint(s) => Ok(s.sample(bone, frame)),
        }
    }
}

/// Decode every frame of a clip.
///
/// Clips without the valid flag produce the rest pose on every bone,
/// frame and channel.
///
/// # Errors
/// Returns [`Error::MalformedAnimation`] for inconsistent track data and
/// [`Error::MissingExternalData`] when a section lives in a buffer that was
/// not supplied.
pub fn decode_track(
    view: ByteView<'_>,
    version: StudioVersion,
    desc: &AnimDesc,
    bones: &[Bone],
    buffers: &ExternalBuffers<'_>,
) -> Result<DecodedBoneTrack> {
    let ctx = TrackContext {
        name: &desc.name,
        bones,
        delta: desc.is_delta(),
    };
    let rest: Vec<BonePose> = bones.iter().map(|b| BonePose::rest(b, ctx.delta)).collect();

    if !desc.is_valid() {
        return Ok(DecodedBoneTrack::constant(desc.frames, &rest));
    }

    let codec = TrackCodec::select(version, desc);
    let addressing = version.section_addressing();
    let mut current: Option<((DataSource, usize), ParsedSection)> = None;
    let mut samples = Vec::with_capacity(desc.frames * bones.len());

    for frame in 0..desc.frames {
        let section = addressing.locate(&view, desc, frame)?;
        let data = buffers.view(section.source, view)?;
        let parsed = match current.take() {
            Some((key, parsed)) if key == section.key() => parsed,
            _ => ParsedSection::parse(codec, &data, section.offset, &ctx)?,
        };
        for bone in 0..bones.len() {
            samples.push(parsed.sample(&data, bone, section.local_frame, &ctx)?);
        }
        current = Some((section.key(), parsed));
    }

    let mut flags = vec![TrackFlags::empty(); bones.len()];
    for (i, sample) in samples.iter().enumerate() {
        flags[i % bones.len().max(1)] |= sample.flags();
    }

    tracing::debug!(
        clip = %desc.name,
        frames = desc.frames,
        codec = ?codec,
        "Decoded animation track"
    );
    Ok(DecodedBoneTrack::from_fn(desc.frames, &flags, |bone, frame| {
        samples[frame * bones.len() + bone].resolve(rest[bone])
    }))
}
