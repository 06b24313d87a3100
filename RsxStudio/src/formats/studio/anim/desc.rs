//! Animation descriptors

use bitflags::bitflags;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::formats::studio::version::StudioVersion;
use crate::utils::{ByteView, OffsetEncoding, TableRef};

bitflags! {
    /// Animation descriptor flags.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
    pub struct AnimFlags: u32 {
        const LOOPING = 0x1;
        const SNAP = 0x2;
        const DELTA = 0x4;
        const AUTOPLAY = 0x8;
        const POST = 0x10;
        const ALLZEROS = 0x20;
        const CYCLEPOSE = 0x80;
        const REALTIME = 0x100;
        const LOCAL = 0x200;
        const HIDDEN = 0x400;
        const OVERRIDE = 0x800;
        const ACTIVITY = 0x1000;
        const EVENT = 0x2000;
        const WORLD = 0x4000;
        const VALID = 0x20000;
        const FRAMEMOVEMENT = 0x40000;
        const DATAPOINT = 0x200000;
        const _ = !0;
    }
}

/// Location of a clip's section table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionTable {
    /// Absolute position of the `i32` entries.
    pub offset: usize,
    pub frames_per_section: usize,
    /// Leading frames stored in the clip's base data.
    pub stall_frames: usize,
}

impl SectionTable {
    /// Number of entries covering `frames` frames.
    #[must_use]
    pub fn len(&self, frames: usize) -> usize {
        if self.frames_per_section == 0 {
            return 0;
        }
        frames
            .saturating_sub(self.stall_frames)
            .div_ceil(self.frames_per_section)
    }
}

/// A normalized animation descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimDesc {
    /// Absolute position of the descriptor in its buffer.
    pub offset: usize,
    pub name: String,
    pub fps: f32,
    pub flags: AnimFlags,
    pub frames: usize,
    /// Raw `animindex` value, relative to the descriptor.
    pub anim_index: i32,
    /// Absolute position of the clip's base data.
    pub data: Option<usize>,
    #[serde(skip)]
    pub movements: TableRef,
    pub frame_movement: Option<usize>,
    pub sections: Option<SectionTable>,
}

impl AnimDesc {
    /// Read the descriptor at `offset`.
    ///
    /// # Errors
    /// Returns [`Error::MalformedAnimation`] for a negative frame count and
    /// bounds errors for fields outside the buffer.
    pub fn parse(view: &ByteView<'_>, version: StudioVersion, offset: usize) -> Result<Self> {
        let layout = version.animdesc_layout();
        let enc = layout.encoding;
        view.bytes(offset, layout.stride)?;

        let name = view.string_at(enc, offset, layout.name)?;
        let frames = view.i32(offset + layout.frames)?;
        let frames = usize::try_from(frames).map_err(|_| Error::MalformedAnimation {
            name: name.clone(),
            reason: format!("negative frame count {frames}"),
        })?;

        let anim_index = view.i32(offset + layout.anim_index)?;
        let data = if anim_index == 0 {
            None
        } else {
            view.offset(OffsetEncoding::Relative32, offset, layout.anim_index)?
        };

        let movements = match layout.movements {
            Some(table) => TableRef {
                count: view.count(enc, offset + table.count)?,
                offset: view.offset(enc, offset, table.index)?,
            },
            None => TableRef::empty(),
        };

        let frame_movement = layout
            .frame_movement
            .map(|field| view.offset(enc, offset, field))
            .transpose()?
            .flatten();

        let sections = match (layout.section_index, layout.section_frames) {
            (Some(index), Some(frames_field)) => {
                let frames_per_section = view.count(enc, offset + frames_field)?;
                let stall_frames = layout
                    .stall_frames
                    .map(|pos| view.count(enc, offset + pos))
                    .transpose()?
                    .unwrap_or(0);
                match view.offset(enc, offset, index)? {
                    Some(table) if frames_per_section > 0 => Some(SectionTable {
                        offset: table,
                        frames_per_section,
                        stall_frames,
                    }),
                    _ => None,
                }
            }
            _ => None,
        };

        Ok(Self {
            offset,
            name,
            fps: view.f32(offset + layout.fps)?,
            flags: AnimFlags::from_bits_retain(view.u32(offset + layout.flags)?),
            frames,
            anim_index,
            data,
            movements,
            frame_movement,
            sections,
        })
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.flags.contains(AnimFlags::VALID)
    }

    #[must_use]
    pub fn is_delta(&self) -> bool {
        self.flags.contains(AnimFlags::DELTA)
    }

    #[must_use]
    pub fn is_datapoint(&self) -> bool {
        self.flags.contains(AnimFlags::DATAPOINT)
    }

    #[must_use]
    pub fn has_frame_movement(&self) -> bool {
        self.flags.contains(AnimFlags::FRAMEMOVEMENT) && self.frame_movement.is_some()
    }

    /// Clip length in seconds.
    #[must_use]
    pub fn duration(&self) -> f32 {
        if self.fps > 0.0 && self.frames > 1 {
            (self.frames - 1) as f32 / self.fps
        } else {
            0.0
        }
    }
}
