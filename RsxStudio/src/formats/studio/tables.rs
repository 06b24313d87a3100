//! Attachment, hitbox, texture, skin and body part tables

use glam::Vec3;
use serde::Serialize;

use super::header::NormalizedHeader;
use super::layout::ModelName;
use super::version::LayoutFamily;
use crate::error::Result;
use crate::utils::{ByteView, TableRef};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub name: String,
    pub flags: u32,
    pub bone: i32,
    /// Row-major 3x4 local transform.
    pub matrix: [f32; 12],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hitbox {
    pub bone: i32,
    pub group: i32,
    pub min: Vec3,
    pub max: Vec3,
    pub name: String,
    pub critical_override: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitboxSet {
    pub name: String,
    pub hitboxes: Vec<Hitbox>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Texture {
    pub name: Option<String>,
    pub guid: Option<u64>,
}

/// A material slot of a body part model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMesh {
    pub material: i32,
    pub mesh_id: i32,
    pub vertex_count: u32,
    pub vertex_offset: u32,
    pub center: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubModel {
    pub name: String,
    pub vertex_count: u32,
    /// Byte offset of the model's first vertex in the legacy vertex file.
    pub vertex_index: u32,
    pub meshes: Vec<ModelMesh>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyPart {
    pub name: String,
    pub base: i32,
    pub models: Vec<SubModel>,
}

impl BodyPart {
    /// Iterate all meshes of all models in storage order.
    pub fn meshes(&self) -> impl Iterator<Item = &ModelMesh> {
        self.models.iter().flat_map(|m| m.meshes.iter())
    }
}

pub fn decode_attachments(view: &ByteView<'_>, header: &NormalizedHeader) -> Result<Vec<Attachment>> {
    let layout = header.version.attachment_layout();
    let enc = header.version.offset_encoding();
    header
        .attachments
        .records(view, layout.stride)?
        .into_iter()
        .map(|base| {
            Ok(Attachment {
                name: view.string_at(enc, base, layout.name)?,
                flags: view.u32(base + layout.flags)?,
                bone: view.i32(base + layout.bone)?,
                matrix: view.matrix3x4(base + layout.matrix)?,
            })
        })
        .collect()
}

pub fn decode_hitbox_sets(view: &ByteView<'_>, header: &NormalizedHeader) -> Result<Vec<HitboxSet>> {
    let (set_layout, box_layout) = header.version.hitbox_layouts();
    let enc = header.version.offset_encoding();
    let packed = header.version.family() == LayoutFamily::Packed;

    let small_int = |pos: usize| -> Result<i32> {
        if packed {
            Ok(i32::from(view.u16(pos)?))
        } else {
            view.i32(pos)
        }
    };

    header
        .hitbox_sets
        .records(view, set_layout.stride)?
        .into_iter()
        .map(|set| {
            let boxes = TableRef {
                count: view.count(enc, set + set_layout.hitboxes.count)?,
                offset: view.offset(enc, set, set_layout.hitboxes.index)?,
            };
            let hitboxes = boxes
                .records(view, box_layout.stride)?
                .into_iter()
                .map(|b| {
                    Ok(Hitbox {
                        bone: small_int(b + box_layout.bone)?,
                        group: small_int(b + box_layout.group)?,
                        min: view.vec3(b + box_layout.min)?,
                        max: view.vec3(b + box_layout.max)?,
                        name: view.string_at(enc, b, box_layout.name)?,
                        critical_override: small_int(b + box_layout.critical_override)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(HitboxSet {
                name: view.string_at(enc, set, set_layout.name)?,
                hitboxes,
            })
        })
        .collect()
}

pub fn decode_textures(view: &ByteView<'_>, header: &NormalizedHeader) -> Result<Vec<Texture>> {
    let layout = header.version.texture_layout();
    let enc = header.version.offset_encoding();
    header
        .textures
        .records(view, layout.stride)?
        .into_iter()
        .map(|base| {
            Ok(Texture {
                name: layout
                    .name
                    .map(|f| view.string_at(enc, base, f))
                    .transpose()?,
                guid: layout.guid.map(|f| view.u64(base + f)).transpose()?,
            })
        })
        .collect()
}

/// Skin families: `families x refs` table of texture indices.
pub fn decode_skins(view: &ByteView<'_>, header: &NormalizedHeader) -> Result<Vec<Vec<i16>>> {
    let skins = header.skins;
    let Some(start) = skins.offset else {
        return Ok(Vec::new());
    };
    let row = skins.ref_count * 2;
    view.bytes(start, row * skins.family_count)?;
    (0..skins.family_count)
        .map(|family| {
            (0..skins.ref_count)
                .map(|r| view.i16(start + family * row + r * 2))
                .collect()
        })
        .collect()
}

pub fn decode_body_parts(view: &ByteView<'_>, header: &NormalizedHeader) -> Result<Vec<BodyPart>> {
    let (part_layout, model_layout, mesh_layout) = header.version.body_part_layouts();
    let enc = header.version.offset_encoding();
    let packed = header.version.family() == LayoutFamily::Packed;

    header
        .body_parts
        .records(view, part_layout.stride)?
        .into_iter()
        .map(|part| {
            let models = TableRef {
                count: view.count(enc, part + part_layout.models.count)?,
                offset: view.offset(enc, part, part_layout.models.index)?,
            }
            .records(view, model_layout.stride)?
            .into_iter()
            .map(|model| {
                let meshes = TableRef {
                    count: view.count(enc, model + model_layout.meshes.count)?,
                    offset: view.offset(enc, model, model_layout.meshes.index)?,
                }
                .records(view, mesh_layout.stride)?
                .into_iter()
                .map(|mesh| {
                    let (material, mesh_id) = if packed {
                        (
                            i32::from(view.u16(mesh + mesh_layout.material)?),
                            i32::from(view.u16(mesh + mesh_layout.mesh_id)?),
                        )
                    } else {
                        (
                            view.i32(mesh + mesh_layout.material)?,
                            view.i32(mesh + mesh_layout.mesh_id)?,
                        )
                    };
                    Ok(ModelMesh {
                        material,
                        mesh_id,
                        vertex_count: view.u32(mesh + mesh_layout.vertex_count)?,
                        vertex_offset: view.u32(mesh + mesh_layout.vertex_offset)?,
                        center: view.vec3(mesh + mesh_layout.center)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

                let name = match model_layout.name {
                    ModelName::Inline { pos, len } => view.fixed_str(model + pos, len)?,
                    ModelName::Offset(pos) => view.string_at(enc, model, pos)?,
                };
                Ok(SubModel {
                    name,
                    vertex_count: view.u32(model + model_layout.vertex_count)?,
                    vertex_index: view.u32(model + model_layout.vertex_index)?,
                    meshes,
                })
            })
            .collect::<Result<Vec<_>>>()?;

            Ok(BodyPart {
                name: view.string_at(enc, part, part_layout.name)?,
                base: view.i32(part + part_layout.base)?,
                models,
            })
        })
        .collect()
}
