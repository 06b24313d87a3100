//! Packed vertex group blocks
//!
//! Revisions 1 and 2 are a single block with a table of `(offset, count)`
//! pairs followed by mesh and LOD records. Revision 3 concatenates one
//! revision 2 block per LOD. Revision 4 stores one block per hardware group,
//! each describing a single LOD with self-relative data offsets.

use super::flags::VertexFlags;
use crate::error::{Error, Result};
use crate::utils::ByteView;

pub const VG_MAGIC: [u8; 4] = *b"0tVG";

/// Vertex group block revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VgRevision {
    Rev1,
    Rev2,
    Rev3,
    Rev4,
}

impl VgRevision {
    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            VgRevision::Rev1 => 1,
            VgRevision::Rev2 => 2,
            VgRevision::Rev3 => 3,
            VgRevision::Rev4 => 4,
        }
    }
}

/// Slices of one packed mesh inside a vertex group block.
#[derive(Debug, Clone, Copy)]
pub struct RawMesh<'a> {
    pub flags: VertexFlags,
    pub stride: usize,
    pub vertex_count: usize,
    pub vertices: ByteView<'a>,
    /// `u16` triangle list indices.
    pub indices: ByteView<'a>,
    pub extended_weights: Option<ByteView<'a>>,
}

/// Meshes of one LOD, still borrowing the block.
#[derive(Debug, Clone)]
pub struct VgLod<'a> {
    pub index: usize,
    pub switch_point: f32,
    pub meshes: Vec<RawMesh<'a>>,
}

// ==================== Block layouts ====================

const VERSION: usize = 4;
const PAIRS_START: usize = 16;

/// Indices into the pair table.
mod pair {
    pub const MESHES: usize = 1;
    pub const INDICES: usize = 2;
    pub const VERTICES: usize = 3;
    pub const EXT_WEIGHTS: usize = 4;
    pub const LODS: usize = 6;
    pub const COUNT: usize = 9;
}

mod lod {
    pub const STRIDE: usize = 8;
    pub const FIRST_MESH: usize = 0;
    pub const MESH_COUNT: usize = 2;
    pub const SWITCH_POINT: usize = 4;
}

#[derive(Debug, Clone, Copy)]
struct GroupLayout {
    /// Width of each offset and count in the pair table.
    pair_width: usize,
    header_size: usize,
    mesh_stride: usize,
}

const GROUP_REV1: GroupLayout = GroupLayout {
    pair_width: 8,
    header_size: 160,
    mesh_stride: 72,
};

const GROUP_REV2: GroupLayout = GroupLayout {
    pair_width: 4,
    header_size: 88,
    mesh_stride: 56,
};

/// Mesh record fields shared by revisions 1 and 2.
mod mesh {
    pub const FLAGS: usize = 0;
    pub const VERT_OFFSET: usize = 8;
    pub const VERT_STRIDE: usize = 12;
    pub const VERT_COUNT: usize = 16;
    pub const EXT_OFFSET: usize = 24;
    pub const EXT_SIZE: usize = 28;
    pub const INDEX_OFFSET: usize = 32;
    pub const INDEX_COUNT: usize = 36;
}

/// Revision 3 container.
mod rev3 {
    pub const LOD_COUNT: usize = 8;
    pub const LOD_TABLE: usize = 12;
    pub const LOD_ENTRY: usize = 8;
}

/// Revision 4 per-group block.
mod rev4 {
    pub const MESH_COUNT: usize = 4;
    pub const MESHES: usize = 8;
    pub const MESH_STRIDE: usize = 48;
    pub const FLAGS: usize = 0;
    pub const VERT_STRIDE: usize = 8;
    pub const VERT_COUNT: usize = 12;
    pub const INDEX_COUNT: usize = 16;
    pub const EXT_SIZE: usize = 20;
    pub const VERT_OFFSET: usize = 24;
    pub const INDEX_OFFSET: usize = 28;
    pub const EXT_OFFSET: usize = 32;
}

#[derive(Debug, Clone, Copy, Default)]
struct Block {
    offset: usize,
    count: usize,
}

fn check_magic(view: &ByteView<'_>) -> Result<()> {
    let found = view.magic(0)?;
    if found != VG_MAGIC {
        return Err(Error::InvalidMagic {
            format: "vertex group",
            expected: VG_MAGIC,
            found,
        });
    }
    Ok(())
}

fn read_pairs(view: &ByteView<'_>, layout: GroupLayout) -> Result<[Block; pair::COUNT]> {
    let mut pairs = [Block::default(); pair::COUNT];
    for (i, block) in pairs.iter_mut().enumerate() {
        let pos = PAIRS_START + i * layout.pair_width * 2;
        let (offset, count) = if layout.pair_width == 8 {
            (view.i64(pos)?, view.i64(pos + 8)?)
        } else {
            (i64::from(view.i32(pos)?), i64::from(view.i32(pos + 4)?))
        };
        let to_usize = |value: i64, field: usize| {
            usize::try_from(value).map_err(|_| Error::InvalidOffset { field, value })
        };
        *block = Block {
            offset: to_usize(offset, pos)?,
            count: to_usize(count, pos + layout.pair_width)?,
        };
    }
    Ok(pairs)
}

/// Parse a revision 1, 2 or 3 vertex group.
///
/// # Errors
/// Fails on a bad magic, a version mismatch or any record outside the block.
pub fn parse_group<'a>(view: ByteView<'a>, revision: VgRevision) -> Result<Vec<VgLod<'a>>> {
    check_magic(&view)?;
    let version = view.u32(VERSION)?;
    if version != revision.as_u32() {
        return Err(Error::InvalidVertexGroup(format!(
            "expected revision {}, block declares {version}",
            revision.as_u32()
        )));
    }

    match revision {
        VgRevision::Rev1 => parse_indexed(view, GROUP_REV1, 0),
        VgRevision::Rev2 => parse_indexed(view, GROUP_REV2, 0),
        VgRevision::Rev3 => {
            let lod_count = view.u32(rev3::LOD_COUNT)? as usize;
            let mut lods = Vec::with_capacity(lod_count);
            for i in 0..lod_count {
                let entry = rev3::LOD_TABLE + i * rev3::LOD_ENTRY;
                let offset = view.u32(entry)? as usize;
                let size = view.u32(entry + 4)? as usize;
                let sub = view.slice(offset, size)?;
                check_magic(&sub)?;
                lods.extend(parse_indexed(sub, GROUP_REV2, lods.len())?);
            }
            Ok(lods)
        }
        VgRevision::Rev4 => Err(Error::InvalidVertexGroup(
            "revision 4 blocks are stored per hardware group".into(),
        )),
    }
}

fn parse_indexed(view: ByteView<'_>, layout: GroupLayout, first_lod: usize) -> Result<Vec<VgLod<'_>>> {
    view.bytes(0, layout.header_size)?;
    let pairs = read_pairs(&view, layout)?;
    let meshes = pairs[pair::MESHES];
    let lods = pairs[pair::LODS];

    (0..lods.count)
        .map(|i| {
            let at = lods.offset + i * lod::STRIDE;
            let first = usize::from(view.u16(at + lod::FIRST_MESH)?);
            let count = usize::from(view.u16(at + lod::MESH_COUNT)?);
            if first + count > meshes.count {
                return Err(Error::InvalidVertexGroup(format!(
                    "LOD {i} references meshes {first}..{} of {}",
                    first + count,
                    meshes.count
                )));
            }
            let raw = (first..first + count)
                .map(|m| read_indexed_mesh(&view, &pairs, meshes.offset + m * layout.mesh_stride))
                .collect::<Result<Vec<_>>>()?;
            Ok(VgLod {
                index: first_lod + i,
                switch_point: view.f32(at + lod::SWITCH_POINT)?,
                meshes: raw,
            })
        })
        .collect()
}

fn read_indexed_mesh<'a>(view: &ByteView<'a>, pairs: &[Block; pair::COUNT], at: usize) -> Result<RawMesh<'a>> {
    let stride = view.u32(at + mesh::VERT_STRIDE)? as usize;
    let vertex_count = view.u32(at + mesh::VERT_COUNT)? as usize;
    let vert_start = pairs[pair::VERTICES].offset + view.u32(at + mesh::VERT_OFFSET)? as usize;

    let index_count = view.u32(at + mesh::INDEX_COUNT)? as usize;
    let index_start = pairs[pair::INDICES].offset + view.u32(at + mesh::INDEX_OFFSET)? as usize * 2;

    let ext_size = view.u32(at + mesh::EXT_SIZE)? as usize;
    let ext_offset = view.i32(at + mesh::EXT_OFFSET)?;
    let extended_weights = if ext_size > 0 && ext_offset >= 0 {
        Some(view.slice(pairs[pair::EXT_WEIGHTS].offset + ext_offset as usize, ext_size)?)
    } else {
        None
    };

    Ok(RawMesh {
        flags: VertexFlags(view.u64(at + mesh::FLAGS)?),
        stride,
        vertex_count,
        vertices: view.slice(vert_start, vertex_count * stride)?,
        indices: view.slice(index_start, index_count * 2)?,
        extended_weights,
    })
}

/// Parse one decompressed revision 4 block.
///
/// # Errors
/// Fails if a mesh record or one of its data ranges lies outside the block.
pub fn parse_rev4(view: ByteView<'_>, lod_index: u8) -> Result<VgLod<'_>> {
    let mesh_count = usize::from(view.u16(rev4::MESH_COUNT)?);
    view.bytes(rev4::MESHES, mesh_count * rev4::MESH_STRIDE)?;

    let meshes = (0..mesh_count)
        .map(|m| {
            let at = rev4::MESHES + m * rev4::MESH_STRIDE;
            let stride = view.u32(at + rev4::VERT_STRIDE)? as usize;
            let vertex_count = view.u32(at + rev4::VERT_COUNT)? as usize;
            let index_count = view.u32(at + rev4::INDEX_COUNT)? as usize;
            let ext_size = view.u32(at + rev4::EXT_SIZE)? as usize;

            Ok(RawMesh {
                flags: VertexFlags(view.u64(at + rev4::FLAGS)?),
                stride,
                vertex_count,
                vertices: data_slice(&view, at + rev4::VERT_OFFSET, vertex_count * stride)?,
                indices: data_slice(&view, at + rev4::INDEX_OFFSET, index_count * 2)?,
                extended_weights: if ext_size > 0 {
                    Some(data_slice(&view, at + rev4::EXT_OFFSET, ext_size)?)
                } else {
                    None
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(VgLod {
        index: usize::from(lod_index),
        switch_point: 0.0,
        meshes,
    })
}

/// Data range addressed by a self-relative `i32` field.
fn data_slice<'a>(view: &ByteView<'a>, field: usize, len: usize) -> Result<ByteView<'a>> {
    match view.self_relative_i32(field)? {
        Some(start) => view.slice(start, len),
        None if len == 0 => Ok(ByteView::new(&[])),
        None => Err(Error::InvalidVertexGroup(format!(
            "{len} bytes of mesh data without an offset (field at {field})"
        ))),
    }
}
