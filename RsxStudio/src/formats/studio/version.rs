//! Studio model format revisions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::anim::SectionAddressing;
use super::vertex::VgRevision;
use crate::error::{Error, Result};
use crate::utils::OffsetEncoding;

/// Known studio model revisions, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StudioVersion {
    R1,
    R2,
    V8,
    V9,
    V10,
    V11,
    V12,
    V12_1,
    V12_2,
    V12_3,
    V12_4,
    V12_5,
    V13,
    V14,
    V14_1,
    V15,
    V16,
    V17,
    V18,
    V19,
    V19_1,
}

/// Groups of revisions sharing a struct layout style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutFamily {
    /// Source-derived layouts with `i32` offsets (r1, r2).
    Source,
    /// Extended layouts with `i32` offsets (v8 to v15).
    R5,
    /// Compact layouts with 16-bit self-relative offsets (v16 and later).
    Packed,
}

/// Where a model's vertex data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexSource {
    /// Separate VTX/VVD/VVC/VVW files.
    LegacyFiles,
    /// Packed vertex group blocks.
    VertexGroup(VgRevision),
}

impl StudioVersion {
    pub const ALL: [StudioVersion; 21] = [
        StudioVersion::R1,
        StudioVersion::R2,
        StudioVersion::V8,
        StudioVersion::V9,
        StudioVersion::V10,
        StudioVersion::V11,
        StudioVersion::V12,
        StudioVersion::V12_1,
        StudioVersion::V12_2,
        StudioVersion::V12_3,
        StudioVersion::V12_4,
        StudioVersion::V12_5,
        StudioVersion::V13,
        StudioVersion::V14,
        StudioVersion::V14_1,
        StudioVersion::V15,
        StudioVersion::V16,
        StudioVersion::V17,
        StudioVersion::V18,
        StudioVersion::V19,
        StudioVersion::V19_1,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StudioVersion::R1 => "r1",
            StudioVersion::R2 => "r2",
            StudioVersion::V8 => "v8",
            StudioVersion::V9 => "v9",
            StudioVersion::V10 => "v10",
            StudioVersion::V11 => "v11",
            StudioVersion::V12 => "v12",
            StudioVersion::V12_1 => "v12.1",
            StudioVersion::V12_2 => "v12.2",
            StudioVersion::V12_3 => "v12.3",
            StudioVersion::V12_4 => "v12.4",
            StudioVersion::V12_5 => "v12.5",
            StudioVersion::V13 => "v13",
            StudioVersion::V14 => "v14",
            StudioVersion::V14_1 => "v14.1",
            StudioVersion::V15 => "v15",
            StudioVersion::V16 => "v16",
            StudioVersion::V17 => "v17",
            StudioVersion::V18 => "v18",
            StudioVersion::V19 => "v19",
            StudioVersion::V19_1 => "v19.1",
        }
    }

    #[must_use]
    pub fn family(self) -> LayoutFamily {
        match self {
            StudioVersion::R1 | StudioVersion::R2 => LayoutFamily::Source,
            StudioVersion::V8
            | StudioVersion::V9
            | StudioVersion::V10
            | StudioVersion::V11
            | StudioVersion::V12
            | StudioVersion::V12_1
            | StudioVersion::V12_2
            | StudioVersion::V12_3
            | StudioVersion::V12_4
            | StudioVersion::V12_5
            | StudioVersion::V13
            | StudioVersion::V14
            | StudioVersion::V14_1
            | StudioVersion::V15 => LayoutFamily::R5,
            StudioVersion::V16
            | StudioVersion::V17
            | StudioVersion::V18
            | StudioVersion::V19
            | StudioVersion::V19_1 => LayoutFamily::Packed,
        }
    }

    /// Encoding of offset fields inside structures.
    #[must_use]
    pub fn offset_encoding(self) -> OffsetEncoding {
        match self.family() {
            LayoutFamily::Source | LayoutFamily::R5 => OffsetEncoding::Relative32,
            LayoutFamily::Packed => OffsetEncoding::Fix16,
        }
    }

    /// How a frame index maps into animation sections.
    #[must_use]
    pub fn section_addressing(self) -> SectionAddressing {
        match self {
            StudioVersion::R1
            | StudioVersion::R2
            | StudioVersion::V8
            | StudioVersion::V9
            | StudioVersion::V10
            | StudioVersion::V11
            | StudioVersion::V12 => SectionAddressing::NoStall,
            StudioVersion::V19 | StudioVersion::V19_1 => SectionAddressing::StallFromAnimData,
            _ => SectionAddressing::StallFromBase,
        }
    }

    #[must_use]
    pub fn vertex_source(self) -> VertexSource {
        match self {
            StudioVersion::R1 | StudioVersion::R2 => VertexSource::LegacyFiles,
            StudioVersion::V8
            | StudioVersion::V9
            | StudioVersion::V10
            | StudioVersion::V11
            | StudioVersion::V12 => VertexSource::VertexGroup(VgRevision::Rev1),
            StudioVersion::V12_1
            | StudioVersion::V12_2
            | StudioVersion::V12_3
            | StudioVersion::V12_4
            | StudioVersion::V12_5
            | StudioVersion::V13 => VertexSource::VertexGroup(VgRevision::Rev2),
            StudioVersion::V14 | StudioVersion::V14_1 | StudioVersion::V15 => {
                VertexSource::VertexGroup(VgRevision::Rev3)
            }
            StudioVersion::V16
            | StudioVersion::V17
            | StudioVersion::V18
            | StudioVersion::V19
            | StudioVersion::V19_1 => VertexSource::VertexGroup(VgRevision::Rev4),
        }
    }

    /// Whether animation clips may use sparse datapoint tracks.
    #[must_use]
    pub fn supports_datapoint(self) -> bool {
        self >= StudioVersion::V16
    }

    /// Whether sequence descriptors carry an anim-data asset GUID.
    #[must_use]
    pub fn has_anim_data_guid(self) -> bool {
        self >= StudioVersion::V19
    }

    /// Whether sequences reference animations by local index rather than offset.
    #[must_use]
    pub fn uses_local_anim_index(self) -> bool {
        self.family() == LayoutFamily::Source
    }
}

impl fmt::Display for StudioVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudioVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        let normalized = lower.replace('_', ".");
        StudioVersion::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == normalized)
            .ok_or_else(|| Error::UnsupportedVersion(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_versions() {
        assert_eq!("v12.1".parse::<StudioVersion>().unwrap(), StudioVersion::V12_1);
        assert_eq!("V19_1".parse::<StudioVersion>().unwrap(), StudioVersion::V19_1);
        assert_eq!("r2".parse::<StudioVersion>().unwrap(), StudioVersion::R2);
        assert!(matches!(
            "v7".parse::<StudioVersion>(),
            Err(Error::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_display_round_trip() {
        for v in StudioVersion::ALL {
            assert_eq!(v.to_string().parse::<StudioVersion>().unwrap(), v);
        }
    }

    #[test]
    fn test_dispatch() {
        assert_eq!(StudioVersion::V12.section_addressing(), SectionAddressing::NoStall);
        assert_eq!(StudioVersion::V12_1.section_addressing(), SectionAddressing::StallFromBase);
        assert_eq!(StudioVersion::V19.section_addressing(), SectionAddressing::StallFromAnimData);
        assert_eq!(StudioVersion::R2.vertex_source(), VertexSource::LegacyFiles);
        assert_eq!(
            StudioVersion::V14_1.vertex_source(),
            VertexSource::VertexGroup(VgRevision::Rev3)
        );
        assert_eq!(StudioVersion::V16.offset_encoding(), OffsetEncoding::Fix16);
        assert!(!StudioVersion::V15.supports_datapoint());
    }
}
