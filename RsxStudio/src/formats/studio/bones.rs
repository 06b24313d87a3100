//! Bone hierarchy decoding
//!
//! Three storage layouts produce the same [`Bone`]: one record per bone
//! (r1 through v15), a header array plus data array (v16 and later), and the
//! structure-of-arrays "linear bone" block used when the bone table is empty.

use bitflags::bitflags;
use glam::{Quat, Vec3};
use serde::Serialize;

use super::header::NormalizedHeader;
use super::layout::{
    BoneLayout, BoneRecordLayout, ColumnarBoneLayout, JIGGLE_FLOAT_COUNT, JIGGLE_SIZE,
    LinearBoneLayout, PROC_JIGGLE, IK_LINK_KNEE_DIR, IK_LINK_STRIDE,
};
use super::version::LayoutFamily;
use crate::error::{Error, Result};
use crate::utils::{ByteView, OffsetEncoding, TableRef};

bitflags! {
    /// Jiggle bone behaviour flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
    pub struct JiggleFlags: u32 {
        const IS_FLEXIBLE = 0x01;
        const IS_RIGID = 0x02;
        const HAS_YAW_CONSTRAINT = 0x04;
        const HAS_PITCH_CONSTRAINT = 0x08;
        const HAS_ANGLE_CONSTRAINT = 0x10;
        const HAS_LENGTH_CONSTRAINT = 0x20;
        const HAS_BASE_SPRING = 0x40;
        const IS_BOING = 0x80;
    }
}

/// `min, max, friction` for one constrained axis.
pub type AxisConstraint = [f32; 3];

/// Jiggle physics parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JiggleBone {
    pub flags: JiggleFlags,
    pub length: f32,
    pub tip_mass: f32,
    pub yaw_stiffness: f32,
    pub yaw_damping: f32,
    pub pitch_stiffness: f32,
    pub pitch_damping: f32,
    pub along_stiffness: f32,
    pub along_damping: f32,
    pub angle_limit: f32,
    pub yaw_limits: [f32; 2],
    pub yaw_friction: f32,
    pub yaw_bounce: f32,
    pub pitch_limits: [f32; 2],
    pub pitch_friction: f32,
    pub pitch_bounce: f32,
    pub base_mass: f32,
    pub base_stiffness: f32,
    pub base_damping: f32,
    pub base_left: AxisConstraint,
    pub base_up: AxisConstraint,
    pub base_forward: AxisConstraint,
    /// Boing parameters; their interpretation is unknown, kept raw.
    pub boing_raw: [f32; 5],
}

impl JiggleBone {
    fn read(view: &ByteView<'_>, pos: usize) -> Result<Self> {
        view.bytes(pos, JIGGLE_SIZE)?;
        let mut f = [0.0f32; JIGGLE_FLOAT_COUNT];
        for (i, slot) in f.iter_mut().enumerate() {
            *slot = view.f32(pos + 4 + i * 4)?;
        }
        Ok(Self {
            flags: JiggleFlags::from_bits_retain(view.u32(pos)?),
            length: f[0],
            tip_mass: f[1],
            yaw_stiffness: f[2],
            yaw_damping: f[3],
            pitch_stiffness: f[4],
            pitch_damping: f[5],
            along_stiffness: f[6],
            along_damping: f[7],
            angle_limit: f[8],
            yaw_limits: [f[9], f[10]],
            yaw_friction: f[11],
            yaw_bounce: f[12],
            pitch_limits: [f[13], f[14]],
            pitch_friction: f[15],
            pitch_bounce: f[16],
            base_mass: f[17],
            base_stiffness: f[18],
            base_damping: f[19],
            base_left: [f[20], f[21], f[22]],
            base_up: [f[23], f[24], f[25]],
            base_forward: [f[26], f[27], f[28]],
            boing_raw: [f[29], f[30], f[31], f[32], f[33]],
        })
    }
}

/// Procedural bone payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProceduralBone {
    Jiggle(Box<JiggleBone>),
    /// A rule this decoder does not interpret, kept by type and location.
    Opaque { kind: u32, offset: usize },
}

/// A decoded bone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    pub name: String,
    /// Parent index, -1 for roots.
    pub parent: i32,
    pub position: Vec3,
    pub quat: Quat,
    /// Euler rotation in radians.
    pub rotation: Vec3,
    pub scale: Vec3,
    pub pos_scale: Vec3,
    pub rot_scale: Vec3,
    pub scale_scale: Vec3,
    /// Row-major 3x4 matrix.
    pub pose_to_bone: [f32; 12],
    pub q_alignment: Quat,
    pub flags: u32,
    pub contents: i32,
    pub physics_bone: i32,
    pub surface_prop: Option<String>,
    pub procedural: Option<ProceduralBone>,
}

impl Bone {
    /// A bone with identity transforms.
    #[must_use]
    pub fn identity(name: impl Into<String>, parent: i32) -> Self {
        Self {
            name: name.into(),
            parent,
            position: Vec3::ZERO,
            quat: Quat::IDENTITY,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            pos_scale: Vec3::ZERO,
            rot_scale: Vec3::ZERO,
            scale_scale: Vec3::ZERO,
            pose_to_bone: [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            q_alignment: Quat::IDENTITY,
            flags: 0,
            contents: 0,
            physics_bone: -1,
            surface_prop: None,
            procedural: None,
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent < 0
    }
}

/// An inverse kinematics chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IkChain {
    pub name: String,
    pub link_type: i32,
    pub links: Vec<IkLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IkLink {
    pub bone: i32,
    pub knee_dir: Vec3,
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode the bone array for the header's revision.
///
/// # Errors
/// Returns an error if any bone record or referenced string lies outside
/// the buffer.
pub fn decode_bones(view: &ByteView<'_>, header: &NormalizedHeader) -> Result<Vec<Bone>> {
    let version = header.version;
    let bones = if header.bones.is_empty() {
        match header.linear_bone {
            Some(pos) => decode_linear_bones(view, pos, version.linear_bone_layout())?,
            None => Vec::new(),
        }
    } else {
        match version.bone_layout() {
            BoneLayout::Records(layout) => decode_bone_records(view, header.bones, &layout)?,
            BoneLayout::Columnar(layout) => {
                let data = header.bone_data.ok_or(Error::InvalidOffset {
                    field: version.header_layout().bone_data.unwrap_or_default(),
                    value: 0,
                })?;
                decode_columnar_bones(view, header.bones, data, &layout)?
            }
        }
    };

    tracing::debug!("Decoded {} bones ({})", bones.len(), version);
    Ok(bones)
}

fn decode_bone_records(
    view: &ByteView<'_>,
    table: TableRef,
    layout: &BoneRecordLayout,
) -> Result<Vec<Bone>> {
    let enc = OffsetEncoding::Relative32;
    table
        .records(view, layout.stride)?
        .into_iter()
        .map(|base| {
            let proc_type = view.u32(base + layout.proc_type)?;
            let procedural = match view.offset(enc, base, layout.proc_index)? {
                Some(pos) if proc_type == PROC_JIGGLE => {
                    Some(ProceduralBone::Jiggle(Box::new(JiggleBone::read(view, pos)?)))
                }
                Some(pos) if proc_type != 0 => Some(ProceduralBone::Opaque {
                    kind: proc_type,
                    offset: pos,
                }),
                _ => None,
            };
            let surface_prop = view
                .offset(enc, base, layout.surface_prop)?
                .map(|pos| view.cstr(pos))
                .transpose()?;

            Ok(Bone {
                name: view.string_at(enc, base, layout.name)?,
                parent: view.i32(base + layout.parent)?,
                position: view.vec3(base + layout.position)?,
                quat: view.quat(base + layout.quat)?,
                rotation: view.vec3(base + layout.rotation)?,
                scale: layout
                    .scale
                    .map(|f| view.vec3(base + f))
                    .transpose()?
                    .unwrap_or(Vec3::ONE),
                pos_scale: view.vec3(base + layout.pos_scale)?,
                rot_scale: view.vec3(base + layout.rot_scale)?,
                scale_scale: layout
                    .scale_scale
                    .map(|f| view.vec3(base + f))
                    .transpose()?
                    .unwrap_or(Vec3::ZERO),
                pose_to_bone: view.matrix3x4(base + layout.pose_to_bone)?,
                q_alignment: view.quat(base + layout.q_alignment)?,
                flags: view.u32(base + layout.flags)?,
                contents: view.i32(base + layout.contents)?,
                physics_bone: view.i32(base + layout.physics_bone)?,
                surface_prop,
                procedural,
            })
        })
        .collect()
}

fn decode_columnar_bones(
    view: &ByteView<'_>,
    table: TableRef,
    data_offset: usize,
    layout: &ColumnarBoneLayout,
) -> Result<Vec<Bone>> {
    let enc = OffsetEncoding::Fix16;
    let headers = table.records(view, layout.header_stride)?;
    let data = TableRef {
        count: table.count,
        offset: Some(data_offset),
    }
    .records(view, layout.data_stride)?;

    headers
        .into_iter()
        .zip(data)
        .map(|(h, d)| {
            let proc_type = u32::from(view.u8(d + layout.proc_type)?);
            // Packed procedural blocks have no documented layout.
            let procedural = match view.offset(enc, d, layout.proc_index)? {
                Some(pos) if proc_type != 0 => Some(ProceduralBone::Opaque {
                    kind: proc_type,
                    offset: pos,
                }),
                _ => None,
            };
            let surface_prop = view
                .offset(enc, h, layout.surface_prop)?
                .map(|pos| view.cstr(pos))
                .transpose()?;

            Ok(Bone {
                name: view.string_at(enc, h, layout.name)?,
                parent: i32::from(view.i16(d + layout.parent)?),
                position: view.vec3(d + layout.position)?,
                quat: view.quat(d + layout.quat)?,
                rotation: view.vec3(d + layout.rotation)?,
                scale: view.vec3(d + layout.scale)?,
                pos_scale: Vec3::ZERO,
                rot_scale: view.vec3(d + layout.rot_scale)?,
                scale_scale: view.vec3(d + layout.scale_scale)?,
                pose_to_bone: view.matrix3x4(d + layout.pose_to_bone)?,
                q_alignment: view.quat(d + layout.q_alignment)?,
                flags: view.u32(d + layout.flags)?,
                contents: view.i32(h + layout.contents)?,
                physics_bone: i32::from(view.u16(h + layout.physics_bone)?),
                surface_prop,
                procedural,
            })
        })
        .collect()
}

fn decode_linear_bones(
    view: &ByteView<'_>,
    base: usize,
    layout: &LinearBoneLayout,
) -> Result<Vec<Bone>> {
    let enc = layout.encoding;
    let count = view.count(enc, base + layout.count)?;
    let array = |field: usize| view.offset(enc, base, field);

    let flags = array(layout.flags)?;
    let parents = array(layout.parent)?;
    let positions = array(layout.position)?;
    let quats = array(layout.quat)?;
    let rotations = array(layout.rotation)?;
    let pose = array(layout.pose_to_bone)?;
    let pos_scales = layout.pos_scale.map(array).transpose()?.flatten();
    let rot_scales = layout.rot_scale.map(array).transpose()?.flatten();
    let alignments = layout.q_alignment.map(array).transpose()?.flatten();

    (0..count)
        .map(|i| {
            let mut bone = Bone::identity(format!("bone_{i}"), -1);
            if let Some(p) = parents {
                bone.parent = match enc {
                    OffsetEncoding::Relative32 => view.i32(p + i * 4)?,
                    OffsetEncoding::Fix16 => i32::from(view.i16(p + i * 2)?),
                };
            }
            if let Some(p) = flags {
                bone.flags = view.u32(p + i * 4)?;
            }
            if let Some(p) = positions {
                bone.position = view.vec3(p + i * 12)?;
            }
            if let Some(p) = quats {
                bone.quat = view.quat(p + i * 16)?;
            }
            if let Some(p) = rotations {
                bone.rotation = view.vec3(p + i * 12)?;
            }
            if let Some(p) = pose {
                bone.pose_to_bone = view.matrix3x4(p + i * 48)?;
            }
            if let Some(p) = pos_scales {
                bone.pos_scale = view.vec3(p + i * 12)?;
            }
            if let Some(p) = rot_scales {
                bone.rot_scale = view.vec3(p + i * 12)?;
            }
            if let Some(p) = alignments {
                bone.q_alignment = view.quat(p + i * 16)?;
            }
            Ok(bone)
        })
        .collect()
}

/// Decode IK chains and their links.
pub fn decode_ik_chains(view: &ByteView<'_>, header: &NormalizedHeader) -> Result<Vec<IkChain>> {
    let version = header.version;
    let layout = version.ik_chain_layout();
    let enc = version.offset_encoding();

    header
        .ik_chains
        .records(view, layout.stride)?
        .into_iter()
        .map(|base| {
            let link_count = view.count(enc, base + layout.link_count)?;
            let link_type = match version.family() {
                LayoutFamily::Packed => i32::from(view.u16(base + layout.link_type)?),
                _ => view.i32(base + layout.link_type)?,
            };
            let links = TableRef {
                count: link_count,
                offset: view.offset(enc, base, layout.link_index)?,
            }
            .records(view, IK_LINK_STRIDE)?
            .into_iter()
            .map(|link| {
                Ok(IkLink {
                    bone: view.i32(link)?,
                    knee_dir: view.vec3(link + IK_LINK_KNEE_DIR)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

            Ok(IkChain {
                name: view.string_at(enc, base, layout.name)?,
                link_type,
                links,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::studio::layout::{BONE_R5, LINEAR_BONE_WIDE};

    fn put_f32s(buf: &mut [u8], pos: usize, values: &[f32]) {
        for (i, v) in values.iter().enumerate() {
            buf[pos + i * 4..pos + i * 4 + 4].copy_from_slice(&v.to_le_bytes());
        }
    }

    fn put_i32(buf: &mut [u8], pos: usize, v: i32) {
        buf[pos..pos + 4].copy_from_slice(&v.to_le_bytes());
    }

    #[test]
    fn test_r5_bone_records() {
        let stride = BONE_R5.stride;
        let mut buf = vec![0u8; stride * 2 + 32 + JIGGLE_SIZE];
        let names = stride * 2;
        buf[names..names + 5].copy_from_slice(b"root\0");
        buf[names + 5..names + 11].copy_from_slice(b"child\0");

        put_i32(&mut buf, BONE_R5.name, names as i32);
        put_i32(&mut buf, BONE_R5.parent, -1);
        put_f32s(&mut buf, BONE_R5.quat, &[0.0, 0.0, 0.0, 1.0]);
        put_f32s(&mut buf, BONE_R5.scale.unwrap(), &[1.0, 1.0, 1.0]);

        let child = stride;
        put_i32(&mut buf, child + BONE_R5.name, (names + 5 - child) as i32);
        put_i32(&mut buf, child + BONE_R5.parent, 0);
        put_f32s(&mut buf, child + BONE_R5.position, &[0.0, 0.0, 10.0]);
        put_f32s(&mut buf, child + BONE_R5.quat, &[0.0, 0.0, 0.0, 1.0]);
        put_i32(&mut buf, child + BONE_R5.proc_type, PROC_JIGGLE as i32);
        let jiggle = names + 32;
        put_i32(&mut buf, child + BONE_R5.proc_index, (jiggle - child) as i32);
        put_i32(&mut buf, jiggle, 0x41);
        put_f32s(&mut buf, jiggle + 4, &[12.5]);

        let view = ByteView::new(&buf);
        let table = TableRef { count: 2, offset: Some(0) };
        let bones = decode_bone_records(&view, table, &BONE_R5).unwrap();

        assert_eq!(bones.len(), 2);
        assert_eq!(bones[0].name, "root");
        assert!(bones[0].is_root());
        assert_eq!(bones[1].name, "child");
        assert_eq!(bones[1].parent, 0);
        assert_eq!(bones[1].position, Vec3::new(0.0, 0.0, 10.0));
        match &bones[1].procedural {
            Some(ProceduralBone::Jiggle(j)) => {
                assert_eq!(j.flags, JiggleFlags::IS_FLEXIBLE | JiggleFlags::HAS_BASE_SPRING);
                assert!((j.length - 12.5).abs() < f32::EPSILON);
            }
            other => panic!("expected jiggle bone, got {other:?}"),
        }
    }

    #[test]
    fn test_linear_bones() {
        let mut buf = vec![0u8; 256];
        put_i32(&mut buf, LINEAR_BONE_WIDE.count, 2);
        put_i32(&mut buf, LINEAR_BONE_WIDE.parent, 64);
        put_i32(&mut buf, 64, -1);
        put_i32(&mut buf, 68, 0);
        put_i32(&mut buf, LINEAR_BONE_WIDE.position, 80);
        put_f32s(&mut buf, 80, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let view = ByteView::new(&buf);
        let bones = decode_linear_bones(&view, 0, &LINEAR_BONE_WIDE).unwrap();
        assert_eq!(bones.len(), 2);
        assert_eq!(bones[1].name, "bone_1");
        assert_eq!(bones[1].parent, 0);
        assert_eq!(bones[1].position, Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(bones[0].quat, Quat::IDENTITY);
    }

    #[test]
    fn test_bone_table_out_of_bounds() {
        let buf = vec![0u8; 100];
        let view = ByteView::new(&buf);
        let table = TableRef { count: 1, offset: Some(0) };
        assert!(matches!(
            decode_bone_records(&view, table, &BONE_R5),
            Err(Error::OutOfBounds { .. })
        ));
    }
}
