//! Vertex decoding
//!
//! Produces per-LOD meshes from either the legacy four-file set or the packed
//! vertex group blocks. Each mesh is decoded into a scratch slot through
//! [`MeshWriter`] and then copied out into owned arrays.

pub mod flags;
pub mod legacy;
pub mod normal;
pub mod vg;
pub mod weights;
pub mod writer;

pub use flags::{PositionFormat, TexcoordFormat, VertexFlags};
pub use legacy::LegacyVertexFiles;
pub use normal::{NormalFrame, PackedNormal};
pub use vg::{RawMesh, VgLod, VgRevision};
pub use weights::{PackedWeights, WEIGHT_UNIT, unpack_weight};
pub use writer::{MeshBuffer, MeshWriter, Stream};

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rayon::prelude::*;
use serde::Serialize;

use super::header::{HardwareGroup, NormalizedHeader};
use super::tables::BodyPart;
use super::version::VertexSource;
use crate::compression::{CompressedBlock, Decompressors};
use crate::error::{Error, Result};
use crate::formats::packed::{Vector48, Vector64};
use crate::utils::{ByteView, ScratchPool};

/// Color used when a mesh stores none.
pub const DEFAULT_COLOR: [u8; 4] = [255, 255, 255, 255];

/// One decoded vertex as stored in the flat mesh buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct MeshVertex {
    pub position: [f32; 3],
    /// Raw [`PackedNormal`] bits.
    pub normal: u32,
    pub color: [u8; 4],
    /// First entry of this vertex in [`Mesh::weights`].
    pub weight_index: u32,
    pub weight_count: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize)]
pub struct VertexWeight {
    pub bone: u32,
    pub weight: f32,
}

/// A decoded mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub material: i32,
    pub flags: VertexFlags,
    /// Texcoord pairs stored per vertex.
    pub texcoord_channels: usize,
    pub indices: Vec<u16>,
    pub vertices: Vec<MeshVertex>,
    /// `vertices.len() * texcoord_channels` pairs, vertex-major.
    pub texcoords: Vec<[f32; 2]>,
    pub weights: Vec<VertexWeight>,
}

impl Mesh {
    #[must_use]
    pub fn vert_count(&self) -> usize {
        self.vertices.len()
    }

    /// Texcoord pairs of one vertex, one per channel.
    #[must_use]
    pub fn texcoords_of(&self, vertex: usize) -> &[[f32; 2]] {
        let start = vertex * self.texcoord_channels;
        self.texcoords
            .get(start..start + self.texcoord_channels)
            .unwrap_or(&[])
    }

    /// Resolved blend weights of one vertex.
    #[must_use]
    pub fn weights_of(&self, vertex: usize) -> &[VertexWeight] {
        self.vertices
            .get(vertex)
            .and_then(|v| {
                let start = v.weight_index as usize;
                self.weights.get(start..start + v.weight_count as usize)
            })
            .unwrap_or(&[])
    }

    /// Unpacked normal frame of one vertex, if the mesh stores normals.
    #[must_use]
    pub fn normal_frame(&self, vertex: usize) -> Option<NormalFrame> {
        if !self.flags.normal_weight().packed_normal {
            return None;
        }
        self.vertices.get(vertex).map(|v| PackedNormal(v.normal).unpack())
    }
}

/// Meshes of one level of detail.
#[derive(Debug, Clone, PartialEq)]
pub struct Lod {
    pub index: usize,
    pub switch_point: f32,
    pub meshes: Vec<Mesh>,
    /// Meshes dropped because they did not fit a scratch slot.
    pub rejected: usize,
}

/// Buffers that may carry vertex data for one model.
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexInputs<'a> {
    pub vertex_group: Option<&'a CompressedBlock>,
    pub hardware_data: Option<&'a [u8]>,
    pub legacy: Option<&'a LegacyVertexFiles>,
}

impl VertexInputs<'_> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertex_group.is_none() && self.hardware_data.is_none() && self.legacy.is_none()
    }
}

/// Decode up to `max_lods` levels of detail.
///
/// # Errors
/// Returns [`Error::MissingVertexData`] when the buffer this revision needs
/// was not supplied, or any decode error from a LOD.
pub fn decode_lods(
    view: &ByteView<'_>,
    header: &NormalizedHeader,
    body_parts: &[BodyPart],
    inputs: VertexInputs<'_>,
    decompressors: &Decompressors,
    pool: &ScratchPool,
    max_lods: usize,
) -> Result<Vec<Lod>> {
    let materials: Vec<i32> = body_parts
        .iter()
        .flat_map(BodyPart::meshes)
        .map(|m| m.material)
        .collect();

    let lods = match header.version.vertex_source() {
        VertexSource::LegacyFiles => {
            let files = inputs.legacy.ok_or(Error::MissingVertexData("legacy vertex files"))?;
            legacy::decode_legacy(files, body_parts, pool, max_lods)?
        }
        VertexSource::VertexGroup(VgRevision::Rev4) => {
            let data = inputs.hardware_data.ok_or(Error::MissingVertexData("hardware data"))?;
            let groups = lowest_lods(header.hardware_groups(view)?, max_lods);
            let data = ByteView::new(data);
            let blocks = groups
                .iter()
                .map(|group| {
                    let input = data.bytes(group.data_offset, group.compressed_size)?;
                    Ok((
                        group.lod_index,
                        decompressors.decompress(group.compression, input, group.decompressed_size)?,
                    ))
                })
                .collect::<Result<Vec<_>>>()?;
            let vg_lods = blocks
                .iter()
                .map(|(lod_index, block)| vg::parse_rev4(ByteView::new(block), *lod_index))
                .collect::<Result<Vec<_>>>()?;
            decode_vg_lods(vg_lods, &materials, pool)?
        }
        VertexSource::VertexGroup(revision) => {
            let block = inputs.vertex_group.ok_or(Error::MissingVertexData("vertex group"))?;
            let data = decompressors.decompress_block(block)?;
            let mut vg_lods = vg::parse_group(ByteView::new(&data), revision)?;
            vg_lods.truncate(max_lods);
            decode_vg_lods(vg_lods, &materials, pool)?
        }
    };

    tracing::debug!(
        "Decoded {} LODs ({} meshes) for {}",
        lods.len(),
        lods.iter().map(|l| l.meshes.len()).sum::<usize>(),
        header.version
    );
    Ok(lods)
}

/// Hardware groups ordered by LOD, keeping the `max_lods` most detailed.
fn lowest_lods(mut groups: Vec<HardwareGroup>, max_lods: usize) -> Vec<HardwareGroup> {
    groups.sort_by_key(|group| group.lod_index);
    groups.truncate(max_lods);
    groups
}

fn decode_vg_lods(lods: Vec<VgLod<'_>>, materials: &[i32], pool: &ScratchPool) -> Result<Vec<Lod>> {
    lods.into_par_iter()
        .map(|lod| {
            let mut meshes = Vec::with_capacity(lod.meshes.len());
            let mut rejected = 0;
            for (j, raw) in lod.meshes.iter().enumerate() {
                let material = materials.get(j).copied().unwrap_or(-1);
                let mut slot = pool.checkout();
                match decode_raw_mesh(raw, material, &mut slot) {
                    Ok(mesh) => meshes.push(mesh),
                    Err(Error::BufferCapacityExceeded { requested, capacity }) => {
                        tracing::warn!(
                            lod = lod.index,
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
                index: lod.index,
                switch_point: lod.switch_point,
                meshes,
                rejected,
            })
        })
        .collect()
}

/// Decode one packed mesh through a scratch slot.
///
/// # Errors
/// Returns [`Error::BufferCapacityExceeded`] if the decoded streams do not
/// fit `slot`, or a format error for inconsistent mesh records.
pub fn decode_raw_mesh(raw: &RawMesh<'_>, material: i32, slot: &mut [u8]) -> Result<Mesh> {
    let layout = raw.flags.record_layout()?;
    if layout.size > raw.stride {
        return Err(Error::InvalidVertexGroup(format!(
            "vertex record needs {} bytes, stride is {}",
            layout.size, raw.stride
        )));
    }
    let record = |i: usize| raw.vertices.slice(i * raw.stride, raw.stride);

    let mut writer = MeshWriter::new(slot)?;

    writer.begin(Stream::Indices);
    for i in 0..raw.indices.len() / 2 {
        let index = raw.indices.u16(i * 2)?;
        if usize::from(index) >= raw.vertex_count {
            return Err(Error::InvalidVertexGroup(format!(
                "index {index} outside {} vertices",
                raw.vertex_count
            )));
        }
        writer.push(index)?;
    }

    writer.begin(Stream::Vertices);
    let mut weight_index = 0u32;
    for i in 0..raw.vertex_count {
        let v = record(i)?;
        let position = match layout.position.map(|at| (at, raw.flags.position())) {
            Some((at, PositionFormat::Float)) => v.vec3(at)?,
            Some((at, PositionFormat::Packed64)) => Vector64(v.u64(at)?).unpack(),
            Some((at, PositionFormat::Packed48)) => Vector48::from_bytes(v.array(at)?).unpack(),
            _ => Vec3::ZERO,
        };
        let weight_count = match layout.weights {
            Some(at) => PackedWeights::read(&v, at)?.bone_count() as u32,
            None => 1,
        };
        writer.push(MeshVertex {
            position: position.to_array(),
            normal: layout.normal.map(|at| v.u32(at)).transpose()?.unwrap_or(0),
            color: layout.color.map(|at| v.array(at)).transpose()?.unwrap_or(DEFAULT_COLOR),
            weight_index,
            weight_count,
        })?;
        weight_index += weight_count;
    }

    writer.begin(Stream::Texcoords);
    for i in 0..raw.vertex_count {
        let v = record(i)?;
        for &(at, format) in &layout.texcoords {
            let uv = match format {
                TexcoordFormat::Half => [v.f16(at)?, v.f16(at + 2)?],
                TexcoordFormat::Float => [v.f32(at)?, v.f32(at + 4)?],
            };
            writer.push(uv)?;
        }
    }

    writer.begin(Stream::Weights);
    let mut resolved = Vec::new();
    for i in 0..raw.vertex_count {
        match layout.weights {
            Some(at) => {
                let v = record(i)?;
                resolved.clear();
                PackedWeights::read(&v, at)?.resolve(raw.extended_weights.as_ref(), &mut resolved)?;
                for w in &resolved {
                    writer.push(*w)?;
                }
            }
            None => writer.push(VertexWeight { bone: 0, weight: 1.0 })?,
        }
    }

    let buffer = writer.finish();
    Ok(Mesh {
        material,
        flags: raw.flags,
        texcoord_channels: layout.texcoords.len(),
        indices: buffer.indices()?,
        vertices: buffer.vertices()?,
        texcoords: buffer.texcoords()?,
        weights: buffer.weights()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::CompressionType;
    use pretty_assertions::assert_eq;

    fn raw_mesh<'a>(flags: VertexFlags, stride: usize, count: usize, vertices: &'a [u8], indices: &'a [u8]) -> RawMesh<'a> {
        RawMesh {
            flags,
            stride,
            vertex_count: count,
            vertices: ByteView::new(vertices),
            indices: ByteView::new(indices),
            extended_weights: None,
        }
    }

    fn hardware_group(lod_index: u8, data_offset: usize) -> HardwareGroup {
        HardwareGroup {
            data_offset,
            compressed_size: 16,
            decompressed_size: 16,
            compression: CompressionType::None,
            lod_index,
            lod_count: 3,
            lod_map: 0,
            opaque: [0; 2],
        }
    }

    #[test]
    fn test_hardware_groups_keep_most_detailed_lods() {
        let groups = vec![hardware_group(2, 0), hardware_group(0, 32), hardware_group(1, 64)];
        let kept = lowest_lods(groups.clone(), 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].lod_index, 0);
        assert_eq!(kept[0].data_offset, 32);

        let order: Vec<u8> = lowest_lods(groups, 8).iter().map(|g| g.lod_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_position_normal_mesh_gets_default_weight() {
        let flags = VertexFlags(0x11);
        let mut vertices = Vec::new();
        for i in 0..3 {
            for c in [i as f32, 0.0, 1.0] {
                vertices.extend_from_slice(&c.to_le_bytes());
            }
            vertices.extend_from_slice(&PackedNormal::pack(Vec3::Z, Vec3::X, 1.0).0.to_le_bytes());
        }
        let indices: Vec<u8> = [0u16, 1, 2].iter().flat_map(|i| i.to_le_bytes()).collect();
        let raw = raw_mesh(flags, 16, 3, &vertices, &indices);

        let mut slot = vec![0u8; 1024];
        let mesh = decode_raw_mesh(&raw, 2, &mut slot).unwrap();
        assert_eq!(mesh.vert_count(), 3);
        assert_eq!(mesh.material, 2);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.texcoord_channels, 0);
        assert_eq!(mesh.vertices[2].position, [2.0, 0.0, 1.0]);
        assert_eq!(mesh.vertices[1].color, DEFAULT_COLOR);
        for v in 0..3 {
            assert_eq!(mesh.weights_of(v), &[VertexWeight { bone: 0, weight: 1.0 }]);
        }
        assert!(mesh.normal_frame(0).is_some());
    }

    #[test]
    fn test_texcoords_and_weights() {
        let flags = VertexFlags::default()
            .with_position(PositionFormat::Float)
            .with_bits(VertexFlags::WEIGHTS | VertexFlags::COLOR)
            .with_texcoord(0, TexcoordFormat::Float);
        let mut v = Vec::new();
        for c in [1.0f32, 2.0, 3.0] {
            v.extend_from_slice(&c.to_le_bytes());
        }
        let weights = PackedWeights {
            weights: [12000, 8000],
            bones: [0, 1, 2],
            count: 2,
        };
        v.extend_from_slice(&weights.to_bytes());
        v.extend_from_slice(&[10, 20, 30, 40]);
        v.extend_from_slice(&0.25f32.to_le_bytes());
        v.extend_from_slice(&0.75f32.to_le_bytes());
        assert_eq!(v.len(), flags.record_layout().unwrap().size);

        let raw = raw_mesh(flags, v.len(), 1, &v, &[]);
        let mut slot = vec![0u8; 512];
        let mesh = decode_raw_mesh(&raw, 0, &mut slot).unwrap();
        assert_eq!(mesh.vertices[0].color, [10, 20, 30, 40]);
        assert_eq!(mesh.texcoords_of(0), &[[0.25, 0.75]]);
        let w = mesh.weights_of(0);
        assert_eq!(w.len(), 3);
        assert_eq!(w[2], VertexWeight { bone: 2, weight: unpack_weight(32767 - 20000) });
    }

    #[test]
    fn test_stride_smaller_than_record() {
        let flags = VertexFlags(0x11);
        let raw = raw_mesh(flags, 12, 0, &[], &[]);
        let mut slot = vec![0u8; 64];
        assert!(matches!(
            decode_raw_mesh(&raw, 0, &mut slot),
            Err(Error::InvalidVertexGroup(_))
        ));
    }

    #[test]
    fn test_small_slot_rejects_mesh() {
        let flags = VertexFlags::default().with_position(PositionFormat::Float);
        let vertices = vec![0u8; 12 * 8];
        let raw = raw_mesh(flags, 12, 8, &vertices, &[]);
        let mut slot = vec![0u8; 64];
        assert!(matches!(
            decode_raw_mesh(&raw, 0, &mut slot),
            Err(Error::BufferCapacityExceeded { .. })
        ));
    }
}
