//! Frame to section resolution
//!
//! Long clips are split into fixed-size sections. Depending on the revision
//! the leading "stall" frames live in the clip's base data or in a separate
//! anim-data asset, and each later section is either stored in the model or
//! streamed from an external buffer.

use serde::Serialize;

use super::desc::AnimDesc;
use crate::error::{Error, Result};
use crate::utils::ByteView;

/// How a frame index maps to section data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SectionAddressing {
    /// One contiguous block at the clip's base data.
    NoStall,
    /// Stall frames in the base data, then numbered sections.
    StallFromBase,
    /// Stall frames in the anim-data asset, then numbered sections.
    StallFromAnimData,
}

/// Buffer holding a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataSource {
    Model,
    Streamed,
    AnimData,
}

/// Buffers resolved outside the model asset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalBuffers<'a> {
    /// Streamed trailing sections.
    pub streamed: Option<&'a [u8]>,
    /// Side anim-data asset.
    pub anim_data: Option<&'a [u8]>,
}

impl<'a> ExternalBuffers<'a> {
    /// Pick the buffer a section lives in.
    ///
    /// # Errors
    /// Returns [`Error::MissingExternalData`] when an external buffer is absent.
    pub fn view(&self, source: DataSource, model: ByteView<'a>) -> Result<ByteView<'a>> {
        match source {
            DataSource::Model => Ok(model),
            DataSource::Streamed => self
                .streamed
                .map(ByteView::new)
                .ok_or_else(|| Error::MissingExternalData("streamed animation sections".to_string())),
            DataSource::AnimData => self
                .anim_data
                .map(ByteView::new)
                .ok_or_else(|| Error::MissingExternalData("anim-data asset".to_string())),
        }
    }
}

/// Where one frame's data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRef {
    pub source: DataSource,
    /// Absolute position of the section in its buffer.
    pub offset: usize,
    /// Frame index inside the section.
    pub local_frame: usize,
}

impl SectionRef {
    #[must_use]
    pub fn key(&self) -> (DataSource, usize) {
        (self.source, self.offset)
    }
}

impl SectionAddressing {
    /// Resolve `frame` of `desc` to a section.
    ///
    /// # Errors
    /// Fails when the clip has no data for the frame or a section entry is
    /// unusable.
    pub fn locate(self, view: &ByteView<'_>, desc: &AnimDesc, frame: usize) -> Result<SectionRef> {
        let malformed = |reason: String| Error::MalformedAnimation {
            name: desc.name.clone(),
            reason,
        };
        let base = |source: DataSource, offset: Option<usize>| {
            offset
                .map(|offset| SectionRef {
                    source,
                    offset,
                    local_frame: frame,
                })
                .ok_or_else(|| malformed("valid clip without animation data".to_string()))
        };

        let stall_source = match self {
            SectionAddressing::NoStall => return base(DataSource::Model, desc.data),
            SectionAddressing::StallFromBase => (DataSource::Model, desc.data),
            SectionAddressing::StallFromAnimData => {
                let offset = usize::try_from(desc.anim_index)
                    .map_err(|_| malformed(format!("negative anim-data offset {}", desc.anim_index)))?;
                (DataSource::AnimData, Some(offset))
            }
        };

        let Some(sections) = desc.sections else {
            return base(stall_source.0, stall_source.1);
        };
        if frame < sections.stall_frames {
            return base(stall_source.0, stall_source.1);
        }

        let relative = frame - sections.stall_frames;
        let index = relative / sections.frames_per_section;
        let local_frame = relative % sections.frames_per_section;
        if index >= sections.len(desc.frames) {
            return Err(malformed(format!("frame {frame} past last section")));
        }
        let entry_pos = sections.offset + index * 4;
        let entry = view.i32(entry_pos)?;
        if entry < 0 {
            return Ok(SectionRef {
                source: DataSource::Streamed,
                offset: !entry as usize,
                local_frame,
            });
        }
        if entry == 0 {
            return Err(malformed(format!("empty entry for section {index}")));
        }
        let offset = desc
            .offset
            .checked_add(entry as usize)
            .ok_or(Error::InvalidOffset {
                field: entry_pos,
                value: i64::from(entry),
            })?;
        Ok(SectionRef {
            source: DataSource::Model,
            offset,
            local_frame,
        })
    }
}
