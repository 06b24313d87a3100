//! Legacy four-file vertex set
//!
//! VTX holds the strip topology, VVD the vertex records with a per-LOD fixup
//! table, VVC optional colors and a second texcoord channel, VVW weights for
//! vertices with more than three bones.

use glam::{Vec3, Vec4};
use rayon::prelude::*;

use super::flags::{PositionFormat, TexcoordFormat, VertexFlags};
use super::normal::PackedNormal;
use super::writer::{MeshWriter, Stream};
use super::{DEFAULT_COLOR, Lod, Mesh, MeshVertex, VertexWeight};
use crate::error::{Error, Result};
use crate::formats::studio::tables::{BodyPart, ModelMesh, SubModel};
use crate::utils::{ByteView, OffsetEncoding, ScratchPool};

/// Raw legacy vertex files for one model.
#[derive(Debug, Clone, Default)]
pub struct LegacyVertexFiles {
    pub vtx: Vec<u8>,
    pub vvd: Vec<u8>,
    pub vvc: Option<Vec<u8>>,
    pub vvw: Option<Vec<u8>>,
}

pub const VVD_MAGIC: [u8; 4] = *b"IDSV";
pub const VVC_MAGIC: [u8; 4] = *b"IDCV";
pub const VVW_MAGIC: [u8; 4] = *b"IDVW";
pub const VTX_VERSION: i32 = 7;

/// Size of one VVD vertex record, also the unit of a model's vertex index.
pub const VVD_VERTEX_SIZE: usize = 48;

mod vvd {
    pub const LOD_COUNT: usize = 12;
    pub const LOD_VERTEX_COUNTS: usize = 16;
    pub const FIXUP_COUNT: usize = 48;
    pub const FIXUP_TABLE: usize = 52;
    pub const VERTEX_DATA: usize = 56;
    pub const TANGENT_DATA: usize = 60;
    pub const FIXUP_STRIDE: usize = 12;

    pub const WEIGHTS: usize = 0;
    pub const BONES: usize = 12;
    pub const BONE_COUNT: usize = 15;
    pub const POSITION: usize = 16;
    pub const NORMAL: usize = 28;
    pub const TEXCOORD: usize = 40;
    pub const TANGENT_SIZE: usize = 16;
}

mod vvc {
    pub const COLOR_DATA: usize = 48;
    pub const UV2_DATA: usize = 52;
}

mod vvw {
    pub const WEIGHT_DATA: usize = 48;
    pub const ENTRY_SIZE: usize = 8;
}

mod vtx {
    pub const VERSION: usize = 0;
    pub const LOD_COUNT: usize = 20;
    pub const BODY_PART_COUNT: usize = 28;
    pub const BODY_PART_OFFSET: usize = 32;
    pub const HEADER_SIZE: usize = 36;

    pub const BODY_PART_STRIDE: usize = 8;
    pub const MODEL_STRIDE: usize = 8;
    pub const LOD_STRIDE: usize = 12;
    pub const LOD_SWITCH_POINT: usize = 8;
    pub const MESH_STRIDE: usize = 9;

    pub const STRIP_GROUP_STRIDE: usize = 33;
    pub const SG_VERT_COUNT: usize = 0;
    pub const SG_VERT_OFFSET: usize = 4;
    pub const SG_INDEX_COUNT: usize = 8;
    pub const SG_INDEX_OFFSET: usize = 12;

    pub const VERTEX_STRIDE: usize = 9;
    pub const VERTEX_ORIGINAL: usize = 4;
}

fn expect_magic(view: &ByteView<'_>, format: &'static str, expected: [u8; 4]) -> Result<()> {
    let found = view.magic(0)?;
    if found != expected {
        return Err(Error::InvalidMagic {
            format,
            expected,
            found,
        });
    }
    Ok(())
}

/// `(count, offset)` pair where the offset is relative to `base`.
fn child_table(view: &ByteView<'_>, base: usize) -> Result<(usize, usize)> {
    let count = usize::try_from(view.i32(base)?).unwrap_or(0);
    let offset = view.i32(base + 4)?;
    let start = base.checked_add_signed(offset as isize).ok_or(Error::InvalidOffset {
        field: base + 4,
        value: i64::from(offset),
    })?;
    Ok((count, start))
}

#[derive(Debug, Clone, Copy)]
struct Fixup {
    lod: i32,
    source: usize,
    count: usize,
}

/// Parsed VVD plus the optional side files.
struct VertexFiles<'a> {
    vvd: ByteView<'a>,
    vertex_data: usize,
    tangent_data: Option<usize>,
    root_vertex_count: usize,
    fixups: Vec<Fixup>,
    colors: Option<(ByteView<'a>, usize)>,
    uv2: Option<(ByteView<'a>, usize)>,
    vvw: Option<(ByteView<'a>, usize)>,
}

impl<'a> VertexFiles<'a> {
    fn parse(files: &'a LegacyVertexFiles) -> Result<Self> {
        let vvd = ByteView::new(&files.vvd);
        expect_magic(&vvd, "vvd", VVD_MAGIC)?;

        let fixup_count = vvd.count(OffsetEncoding::Relative32, vvd::FIXUP_COUNT)?;
        let fixup_table = vvd.u32(vvd::FIXUP_TABLE)? as usize;
        let fixups = (0..fixup_count)
            .map(|i| {
                let at = fixup_table + i * vvd::FIXUP_STRIDE;
                Ok(Fixup {
                    lod: vvd.i32(at)?,
                    source: vvd.u32(at + 4)? as usize,
                    count: vvd.u32(at + 8)? as usize,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let tangent_data = match vvd.u32(vvd::TANGENT_DATA)? {
            0 => None,
            at => Some(at as usize),
        };

        let (colors, uv2) = match files.vvc.as_deref() {
            Some(data) => {
                let view = ByteView::new(data);
                expect_magic(&view, "vvc", VVC_MAGIC)?;
                let color = view.u32(vvc::COLOR_DATA)? as usize;
                let uv2 = view.u32(vvc::UV2_DATA)? as usize;
                ((color != 0).then_some((view, color)), (uv2 != 0).then_some((view, uv2)))
            }
            None => (None, None),
        };

        let vvw = match files.vvw.as_deref() {
            Some(data) => {
                let view = ByteView::new(data);
                expect_magic(&view, "vvw", VVW_MAGIC)?;
                Some((view, view.u32(vvw::WEIGHT_DATA)? as usize))
            }
            None => None,
        };

        tracing::debug!(
            "Legacy vertex set: {} LODs, {} fixups, colors: {}, extra weights: {}",
            vvd.i32(vvd::LOD_COUNT)?,
            fixups.len(),
            colors.is_some(),
            vvw.is_some()
        );

        Ok(Self {
            vvd,
            vertex_data: vvd.u32(vvd::VERTEX_DATA)? as usize,
            tangent_data,
            root_vertex_count: vvd.u32(vvd::LOD_VERTEX_COUNTS)? as usize,
            fixups,
            colors,
            uv2,
            vvw,
        })
    }

    /// Raw vertex order seen by one LOD after applying fixups.
    fn lod_table(&self, lod: usize) -> Vec<usize> {
        if self.fixups.is_empty() {
            return (0..self.root_vertex_count).collect();
        }
        self.fixups
            .iter()
            .filter(|f| usize::try_from(f.lod).is_ok_and(|l| l >= lod))
            .flat_map(|f| f.source..f.source + f.count)
            .collect()
    }

    fn flags(&self) -> VertexFlags {
        let mut flags = VertexFlags::default()
            .with_position(PositionFormat::Float)
            .with_bits(VertexFlags::NORMAL | VertexFlags::WEIGHTS)
            .with_texcoord(0, TexcoordFormat::Float);
        if self.colors.is_some() {
            flags = flags.with_bits(VertexFlags::COLOR);
        }
        if self.uv2.is_some() {
            flags = flags.with_texcoord(1, TexcoordFormat::Float);
        }
        flags
    }

    fn record(&self, vertex: usize) -> Result<ByteView<'a>> {
        self.vvd
            .slice(self.vertex_data + vertex * VVD_VERTEX_SIZE, VVD_VERTEX_SIZE)
    }

    fn bone_count(&self, vertex: usize) -> Result<usize> {
        Ok(usize::from(self.record(vertex)?.u8(vvd::BONE_COUNT)?))
    }

    fn packed_normal(&self, vertex: usize, record: &ByteView<'_>) -> Result<u32> {
        let normal = record.vec3(vvd::NORMAL)?;
        let (tangent, sign) = match self.tangent_data {
            Some(base) => {
                let t = self.vvd.bytes(base + vertex * vvd::TANGENT_SIZE, vvd::TANGENT_SIZE)?;
                let t = ByteView::new(t);
                let v = Vec4::new(t.f32(0)?, t.f32(4)?, t.f32(8)?, t.f32(12)?);
                (v.truncate(), v.w)
            }
            None => (Vec3::ZERO, 1.0),
        };
        Ok(PackedNormal::pack(normal, tangent, sign).0)
    }

    fn resolve_weights(&self, vertex: usize, out: &mut Vec<VertexWeight>) -> Result<()> {
        let record = self.record(vertex)?;
        let count = usize::from(record.u8(vvd::BONE_COUNT)?);
        if count == 0 {
            out.push(VertexWeight { bone: 0, weight: 1.0 });
        } else if count <= 3 {
            for i in 0..count {
                out.push(VertexWeight {
                    bone: u32::from(record.u8(vvd::BONES + i)?),
                    weight: record.f32(vvd::WEIGHTS + i * 4)?,
                });
            }
        } else {
            let (view, base) = self.vvw.ok_or(Error::MissingVertexData("vvw"))?;
            let start = record.u32(vvd::WEIGHTS + 8)? as usize;
            for i in 0..count {
                let at = base + (start + i) * vvw::ENTRY_SIZE;
                out.push(VertexWeight {
                    bone: u32::from(view.u16(at + 4)?),
                    weight: view.f32(at)?,
                });
            }
        }
        Ok(())
    }
}

/// One output mesh gathered from a VTX mesh's strip groups.
struct GatheredMesh {
    material: i32,
    vertices: Vec<usize>,
    indices: Vec<usize>,
}

/// Decode every LOD of a legacy model.
pub fn decode_legacy(
    files: &LegacyVertexFiles,
    body_parts: &[BodyPart],
    pool: &ScratchPool,
    max_lods: usize,
) -> Result<Vec<Lod>> {
    let vertex_files = VertexFiles::parse(files)?;
    let vtx = ByteView::new(&files.vtx);
    vtx.bytes(0, vtx::HEADER_SIZE)?;
    let version = vtx.i32(vtx::VERSION)?;
    if version != VTX_VERSION {
        return Err(Error::UnsupportedVertexFormat(format!("vtx version {version}")));
    }
    let lod_count = usize::try_from(vtx.i32(vtx::LOD_COUNT)?).unwrap_or(0).min(max_lods);

    (0..lod_count)
        .into_par_iter()
        .map(|lod| {
            let (switch_point, gathered) = gather_lod(&vtx, &vertex_files, body_parts, lod)?;
            let mut meshes = Vec::with_capacity(gathered.len());
            let mut rejected = 0;
            for (j, mesh) in gathered.iter().enumerate() {
                let mut slot = pool.checkout();
                match write_mesh(&vertex_files, mesh, &mut slot) {
                    Ok(mesh) => meshes.push(mesh),
                    Err(Error::BufferCapacityExceeded { requested, capacity }) => {
                        tracing::warn!(
                            lod,
                            mesh = j,
                            "Rejected mesh: needs {} bytes, scratch slot holds {}",
                            requested,
                            capacity
                        );
                        rejected += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(Lod {
                index: lod,
                switch_point,
                meshes,
                rejected,
            })
        })
        .collect()
}

fn gather_lod(
    vtx: &ByteView<'_>,
    files: &VertexFiles<'_>,
    body_parts: &[BodyPart],
    lod: usize,
) -> Result<(f32, Vec<GatheredMesh>)> {
    let table = files.lod_table(lod);
    let part_count = usize::try_from(vtx.i32(vtx::BODY_PART_COUNT)?).unwrap_or(0);
    let part_base = vtx.u32(vtx::BODY_PART_OFFSET)? as usize;
    let mut switch_point = None;
    let mut out = Vec::new();

    for (p, part) in body_parts.iter().enumerate().take(part_count) {
        let (model_count, model_base) = child_table(vtx, part_base + p * vtx::BODY_PART_STRIDE)?;
        for (m, model) in part.models.iter().enumerate().take(model_count) {
            let model_at = model_base + m * vtx::MODEL_STRIDE;
            let (lods, lod_base) = child_table(vtx, model_at)?;
            if lod >= lods {
                continue;
            }
            let lod_at = lod_base + lod * vtx::LOD_STRIDE;
            switch_point.get_or_insert(vtx.f32(lod_at + vtx::LOD_SWITCH_POINT)?);
            let (mesh_count, mesh_base) = child_table(vtx, lod_at)?;
            for (k, mdl_mesh) in model.meshes.iter().enumerate().take(mesh_count) {
                out.push(gather_mesh(
                    vtx,
                    &table,
                    model,
                    mdl_mesh,
                    mesh_base + k * vtx::MESH_STRIDE,
                )?);
            }
        }
    }
    Ok((switch_point.unwrap_or(0.0), out))
}

fn gather_mesh(
    vtx: &ByteView<'_>,
    table: &[usize],
    model: &SubModel,
    mdl_mesh: &ModelMesh,
    mesh_at: usize,
) -> Result<GatheredMesh> {
    let first = model.vertex_index as usize / VVD_VERTEX_SIZE + mdl_mesh.vertex_offset as usize;
    let (group_count, group_base) = child_table(vtx, mesh_at)?;
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for g in 0..group_count {
        let sg = group_base + g * vtx::STRIP_GROUP_STRIDE;
        let vert_count = vtx.u32(sg + vtx::SG_VERT_COUNT)? as usize;
        let vert_base = sg.checked_add_signed(vtx.i32(sg + vtx::SG_VERT_OFFSET)? as isize);
        let index_count = vtx.u32(sg + vtx::SG_INDEX_COUNT)? as usize;
        let index_base = sg.checked_add_signed(vtx.i32(sg + vtx::SG_INDEX_OFFSET)? as isize);
        let (Some(vert_base), Some(index_base)) = (vert_base, index_base) else {
            return Err(Error::InvalidOffset {
                field: sg,
                value: -1,
            });
        };

        let base = vertices.len();
        for v in 0..vert_count {
            let original = usize::from(vtx.u16(vert_base + v * vtx::VERTEX_STRIDE + vtx::VERTEX_ORIGINAL)?);
            let slot = first + original;
            let raw = *table.get(slot).ok_or_else(|| {
                Error::InvalidVertexGroup(format!("vertex {slot} outside the LOD table ({})", table.len()))
            })?;
            vertices.push(raw);
        }
        for i in 0..index_count {
            indices.push(base + usize::from(vtx.u16(index_base + i * 2)?));
        }
    }

    Ok(GatheredMesh {
        material: mdl_mesh.material,
        vertices,
        indices,
    })
}

fn write_mesh(files: &VertexFiles<'_>, mesh: &GatheredMesh, slot: &mut [u8]) -> Result<Mesh> {
    let flags = files.flags();
    let mut writer = MeshWriter::new(slot)?;

    writer.begin(Stream::Indices);
    for &index in &mesh.indices {
        let index = u16::try_from(index)
            .map_err(|_| Error::InvalidVertexGroup(format!("index {index} exceeds 16 bits")))?;
        writer.push(index)?;
    }

    writer.begin(Stream::Vertices);
    let mut weight_index = 0u32;
    for &vertex in &mesh.vertices {
        let record = files.record(vertex)?;
        let weight_count = files.bone_count(vertex)?.max(1) as u32;
        let color = match files.colors {
            Some((view, base)) => view.array(base + vertex * 4)?,
            None => DEFAULT_COLOR,
        };
        writer.push(MeshVertex {
            position: record.vec3(vvd::POSITION)?.to_array(),
            normal: files.packed_normal(vertex, &record)?,
            color,
            weight_index,
            weight_count,
        })?;
        weight_index += weight_count;
    }

    writer.begin(Stream::Texcoords);
    for &vertex in &mesh.vertices {
        let record = files.record(vertex)?;
        writer.push([record.f32(vvd::TEXCOORD)?, record.f32(vvd::TEXCOORD + 4)?])?;
        if let Some((view, base)) = files.uv2 {
            let at = base + vertex * 8;
            writer.push([view.f32(at)?, view.f32(at + 4)?])?;
        }
    }

    writer.begin(Stream::Weights);
    let mut resolved = Vec::new();
    for &vertex in &mesh.vertices {
        resolved.clear();
        files.resolve_weights(vertex, &mut resolved)?;
        for w in &resolved {
            writer.push(*w)?;
        }
    }

    let buffer = writer.finish();
    Ok(Mesh {
        material: mesh.material,
        flags,
        texcoord_channels: if files.uv2.is_some() { 2 } else { 1 },
        indices: buffer.indices()?,
        vertices: buffer.vertices()?,
        texcoords: buffer.texcoords()?,
        weights: buffer.weights()?,
    })
}
