//! Version-independent header view
//!
//! [`NormalizedHeader`] holds only resolved absolute offsets and counts into
//! the asset buffer. Fix-offset fields are resolved here, exactly once.

use serde::Serialize;

use super::layout::{HeaderLayout, NameField, TableField, hw_group};
use super::version::StudioVersion;
use crate::compression::CompressionType;
use crate::error::{Error, Result};
use crate::utils::{ByteView, OffsetEncoding, TableRef};

/// Skin replacement table location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkinTableRef {
    pub ref_count: usize,
    pub family_count: usize,
    pub offset: Option<usize>,
}

/// Per-LOD compressed vertex group descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HardwareGroup {
    /// Offset of the block inside the hardware data buffer.
    pub data_offset: usize,
    pub compressed_size: usize,
    pub decompressed_size: usize,
    pub compression: CompressionType,
    pub lod_index: u8,
    pub lod_count: u8,
    pub lod_map: u8,
    /// Unknown trailing fields, preserved raw.
    pub opaque: [u32; 2],
}

/// Name storage after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRef {
    Inline { offset: usize, len: usize },
    Offset(Option<usize>),
}

/// A raw header field with no known meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpaqueValue {
    pub pos: usize,
    pub raw: u64,
}

/// Logical view of a studio model header.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedHeader {
    pub version: StudioVersion,
    pub checksum: i32,
    pub flags: u32,
    pub name: NameRef,
    pub bones: TableRef,
    pub bone_data: Option<usize>,
    pub linear_bone: Option<usize>,
    pub attachments: TableRef,
    pub hitbox_sets: TableRef,
    pub local_anims: TableRef,
    pub sequences: TableRef,
    pub textures: TableRef,
    pub skins: SkinTableRef,
    pub body_parts: TableRef,
    pub ik_chains: TableRef,
    pub surface_prop: Option<usize>,
    pub mass: f32,
    pub hardware_groups: TableRef,
    pub lod_count: u8,
    pub opaque: Vec<OpaqueValue>,
}

impl NormalizedHeader {
    /// Build the normalized view for a given revision.
    ///
    /// # Errors
    /// Returns an error if the buffer is shorter than the header or any
    /// header offset field is invalid.
    pub fn parse(view: &ByteView<'_>, version: StudioVersion) -> Result<Self> {
        let layout = version.header_layout();
        view.bytes(0, layout.size)?;
        let enc = layout.encoding;

        let name = match layout.name {
            NameField::Inline { pos, len } => NameRef::Inline { offset: pos, len },
            NameField::Offset(pos) => NameRef::Offset(view.offset(enc, 0, pos)?),
        };

        let hardware_groups = match layout.hardware_groups {
            Some(fields) => TableRef {
                count: view.u16(fields.count)? as usize,
                offset: view.offset(enc, 0, fields.index)?,
            },
            None => TableRef::empty(),
        };
        let lod_count = match layout.hardware_groups {
            Some(fields) => view.u8(fields.lod_count)?,
            None => 0,
        };

        let skins = SkinTableRef {
            ref_count: view.count(enc, layout.skin_refs)?,
            family_count: view.count(enc, layout.skin_families)?,
            offset: view.offset(enc, 0, layout.skin_index)?,
        };

        let opaque = layout
            .opaque
            .iter()
            .map(|field| {
                let raw = match field.width {
                    1 => u64::from(view.u8(field.pos)?),
                    2 => u64::from(view.u16(field.pos)?),
                    4 => u64::from(view.u32(field.pos)?),
                    _ => view.u64(field.pos)?,
                };
                Ok(OpaqueValue { pos: field.pos, raw })
            })
            .collect::<Result<Vec<_>>>()?;

        let header = Self {
            version,
            checksum: view.i32(layout.checksum)?,
            flags: view.u32(layout.flags)?,
            name,
            bones: read_table(view, enc, layout.bones)?,
            bone_data: layout
                .bone_data
                .map(|pos| view.offset(enc, 0, pos))
                .transpose()?
                .flatten(),
            linear_bone: layout
                .linear_bone
                .map(|pos| view.offset(enc, 0, pos))
                .transpose()?
                .flatten(),
            attachments: read_table(view, enc, layout.attachments)?,
            hitbox_sets: read_table(view, enc, layout.hitbox_sets)?,
            local_anims: layout
                .local_anims
                .map(|t| read_table(view, enc, t))
                .transpose()?
                .unwrap_or_default(),
            sequences: read_table(view, enc, layout.sequences)?,
            textures: read_table(view, enc, layout.textures)?,
            skins,
            body_parts: read_table(view, enc, layout.body_parts)?,
            ik_chains: read_table(view, enc, layout.ik_chains)?,
            surface_prop: view.offset(enc, 0, layout.surface_prop)?,
            mass: view.f32(layout.mass)?,
            hardware_groups,
            lod_count,
            opaque,
        };

        tracing::debug!(
            "Parsed {} header: {} bones, {} sequences, {} body parts, {} hardware groups",
            version,
            header.bones.count,
            header.sequences.count,
            header.body_parts.count,
            header.hardware_groups.count
        );
        Ok(header)
    }

    #[must_use]
    pub fn layout(&self) -> &'static HeaderLayout {
        self.version.header_layout()
    }

    /// Resolve the model name.
    pub fn name(&self, view: &ByteView<'_>) -> Result<String> {
        match self.name {
            NameRef::Inline { offset, len } => view.fixed_str(offset, len),
            NameRef::Offset(Some(pos)) => view.cstr(pos),
            NameRef::Offset(None) => Ok(String::new()),
        }
    }

    pub fn surface_prop(&self, view: &ByteView<'_>) -> Result<Option<String>> {
        self.surface_prop.map(|pos| view.cstr(pos)).transpose()
    }

    /// Decode the hardware group descriptors.
    pub fn hardware_groups(&self, view: &ByteView<'_>) -> Result<Vec<HardwareGroup>> {
        self.hardware_groups
            .records(view, hw_group::STRIDE)?
            .into_iter()
            .map(|base| {
                Ok(HardwareGroup {
                    data_offset: view.u32(base + hw_group::DATA_OFFSET)? as usize,
                    compressed_size: view.u32(base + hw_group::COMPRESSED_SIZE)? as usize,
                    decompressed_size: view.u32(base + hw_group::DECOMPRESSED_SIZE)? as usize,
                    compression: CompressionType::from_u8(view.u8(base + hw_group::COMPRESSION)?)?,
                    lod_index: view.u8(base + hw_group::LOD_INDEX)?,
                    lod_count: view.u8(base + hw_group::LOD_COUNT)?,
                    lod_map: view.u8(base + hw_group::LOD_MAP)?,
                    opaque: [
                        view.u32(base + hw_group::OPAQUE[0])?,
                        view.u32(base + hw_group::OPAQUE[1])?,
                    ],
                })
            })
            .collect()
    }
}

fn read_table(view: &ByteView<'_>, enc: OffsetEncoding, field: TableField) -> Result<TableRef> {
    let count = view.count(enc, field.count)?;
    let offset = view.offset(enc, 0, field.index)?;
    if count > 0 && offset.is_none() {
        return Err(Error::InvalidOffset {
            field: field.index,
            value: 0,
        });
    }
    Ok(TableRef { count, offset })
}
