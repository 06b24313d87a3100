//! Per-revision field layouts
//!
//! Each revision's raw structures are described by a constant table of field
//! positions. Decoders read through these tables instead of casting bytes to
//! `#[repr(C)]` structs, so one decoder handles every revision of an entity.
//! All positions are byte offsets from the start of the structure.

use super::version::{LayoutFamily, StudioVersion};
use crate::utils::OffsetEncoding;

// ============================================================================
// Header
// ============================================================================

/// Where a header stores the model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameField {
    /// Fixed-size inline character array.
    Inline { pos: usize, len: usize },
    /// Offset field pointing at a NUL-terminated string.
    Offset(usize),
}

impl NameField {
    /// Position of the field inside the header.
    #[must_use]
    pub const fn offset_pos(&self) -> usize {
        match *self {
            NameField::Inline { pos, .. } | NameField::Offset(pos) => pos,
        }
    }
}

/// Count field followed by the matching offset field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableField {
    pub count: usize,
    pub index: usize,
}

const fn table(count: usize, index: usize) -> TableField {
    TableField { count, index }
}

/// Hardware group descriptor fields (packed headers only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareGroupFields {
    /// `u16` group count.
    pub count: usize,
    /// Offset field to the group table.
    pub index: usize,
    /// `u8` LOD count.
    pub lod_count: usize,
}

/// A header field whose meaning is not known; preserved raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpaqueField {
    pub pos: usize,
    pub width: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    pub encoding: OffsetEncoding,
    pub size: usize,
    pub checksum: usize,
    pub name: NameField,
    pub flags: usize,
    pub bones: TableField,
    /// Second array of the columnar bone layout.
    pub bone_data: Option<usize>,
    pub hitbox_sets: TableField,
    pub local_anims: Option<TableField>,
    pub sequences: TableField,
    pub textures: TableField,
    pub skin_refs: usize,
    pub skin_families: usize,
    pub skin_index: usize,
    pub body_parts: TableField,
    pub attachments: TableField,
    pub ik_chains: TableField,
    pub surface_prop: usize,
    pub mass: usize,
    pub linear_bone: Option<usize>,
    pub hardware_groups: Option<HardwareGroupFields>,
    pub opaque: &'static [OpaqueField],
}

pub const HEADER_R1: HeaderLayout = HeaderLayout {
    encoding: OffsetEncoding::Relative32,
    size: 408,
    checksum: 8,
    name: NameField::Inline { pos: 12, len: 64 },
    flags: 152,
    bones: table(156, 160),
    bone_data: None,
    hitbox_sets: table(172, 176),
    local_anims: Some(table(180, 184)),
    sequences: table(188, 192),
    textures: table(204, 208),
    skin_refs: 220,
    skin_families: 224,
    skin_index: 228,
    body_parts: table(232, 236),
    attachments: table(240, 244),
    ik_chains: table(284, 288),
    surface_prop: 308,
    mass: 328,
    linear_bone: None,
    hardware_groups: None,
    opaque: &[],
};

pub const HEADER_R2: HeaderLayout = HeaderLayout {
    size: 412,
    linear_bone: Some(404),
    ..HEADER_R1
};

pub const HEADER_V8: HeaderLayout = HeaderLayout {
    encoding: OffsetEncoding::Relative32,
    size: 400,
    checksum: 8,
    name: NameField::Offset(12),
    flags: 156,
    bones: table(160, 164),
    bone_data: None,
    hitbox_sets: table(176, 180),
    local_anims: Some(table(184, 188)),
    sequences: table(192, 196),
    textures: table(208, 212),
    skin_refs: 224,
    skin_families: 228,
    skin_index: 232,
    body_parts: table(236, 240),
    attachments: table(244, 248),
    ik_chains: table(288, 292),
    surface_prop: 312,
    mass: 332,
    linear_bone: Some(364),
    hardware_groups: None,
    opaque: &[],
};

pub const HEADER_V14: HeaderLayout = HeaderLayout {
    size: 404,
    textures: table(212, 216),
    skin_refs: 228,
    skin_families: 232,
    skin_index: 236,
    body_parts: table(240, 244),
    attachments: table(248, 252),
    ik_chains: table(292, 296),
    surface_prop: 316,
    mass: 336,
    linear_bone: Some(368),
    opaque: &[OpaqueField { pos: 208, width: 4 }],
    ..HEADER_V8
};

pub const HEADER_V16: HeaderLayout = HeaderLayout {
    encoding: OffsetEncoding::Fix16,
    size: 64,
    checksum: 4,
    name: NameField::Offset(8),
    flags: 0,
    bones: table(16, 18),
    bone_data: Some(20),
    hitbox_sets: table(26, 28),
    local_anims: None,
    sequences: table(30, 32),
    textures: table(34, 36),
    skin_refs: 38,
    skin_families: 40,
    skin_index: 42,
    body_parts: table(44, 46),
    attachments: table(22, 24),
    ik_chains: table(48, 50),
    surface_prop: 10,
    mass: 12,
    linear_bone: Some(52),
    hardware_groups: Some(HardwareGroupFields { count: 54, index: 56, lod_count: 58 }),
    opaque: &[],
};

pub const HEADER_V18: HeaderLayout = HeaderLayout {
    encoding: OffsetEncoding::Fix16,
    size: 68,
    checksum: 4,
    name: NameField::Offset(8),
    flags: 0,
    bones: table(18, 20),
    bone_data: Some(22),
    hitbox_sets: table(28, 30),
    local_anims: None,
    sequences: table(32, 34),
    textures: table(36, 38),
    skin_refs: 40,
    skin_families: 42,
    skin_index: 44,
    body_parts: table(46, 48),
    attachments: table(24, 26),
    ik_chains: table(50, 52),
    surface_prop: 10,
    mass: 12,
    linear_bone: Some(54),
    hardware_groups: Some(HardwareGroupFields { count: 56, index: 58, lod_count: 60 }),
    opaque: &[OpaqueField { pos: 16, width: 2 }],
};

// ============================================================================
// Bones
// ============================================================================

/// One bone per fixed-stride record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoneRecordLayout {
    pub stride: usize,
    pub name: usize,
    pub parent: usize,
    pub position: usize,
    pub quat: usize,
    pub rotation: usize,
    pub scale: Option<usize>,
    pub pos_scale: usize,
    pub rot_scale: usize,
    pub scale_scale: Option<usize>,
    pub pose_to_bone: usize,
    pub q_alignment: usize,
    pub flags: usize,
    pub proc_type: usize,
    pub proc_index: usize,
    pub physics_bone: usize,
    pub surface_prop: usize,
    pub contents: usize,
}

pub const BONE_SOURCE: BoneRecordLayout = BoneRecordLayout {
    stride: 216,
    name: 0,
    parent: 4,
    position: 32,
    quat: 44,
    rotation: 60,
    scale: None,
    pos_scale: 72,
    rot_scale: 84,
    scale_scale: None,
    pose_to_bone: 96,
    q_alignment: 144,
    flags: 160,
    proc_type: 164,
    proc_index: 168,
    physics_bone: 172,
    surface_prop: 176,
    contents: 180,
};

pub const BONE_R5: BoneRecordLayout = BoneRecordLayout {
    stride: 244,
    name: 0,
    parent: 4,
    position: 32,
    quat: 44,
    rotation: 60,
    scale: Some(72),
    pos_scale: 84,
    rot_scale: 96,
    scale_scale: Some(108),
    pose_to_bone: 120,
    q_alignment: 168,
    flags: 184,
    proc_type: 188,
    proc_index: 192,
    physics_bone: 196,
    surface_prop: 200,
    contents: 204,
};

/// Header array plus data array, one entry of each per bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnarBoneLayout {
    pub header_stride: usize,
    pub contents: usize,
    pub opaque_flags: usize,
    pub surface_prop_lookup: usize,
    pub surface_prop: usize,
    pub physics_bone: usize,
    pub name: usize,
    pub data_stride: usize,
    pub pose_to_bone: usize,
    pub q_alignment: usize,
    pub position: usize,
    pub quat: usize,
    pub rotation: usize,
    pub scale: usize,
    pub parent: usize,
    pub flags: usize,
    pub proc_type: usize,
    pub proc_index: usize,
    pub rot_scale: usize,
    pub scale_scale: usize,
}

pub const BONE_COLUMNAR: ColumnarBoneLayout = ColumnarBoneLayout {
    header_stride: 12,
    contents: 0,
    opaque_flags: 4,
    surface_prop_lookup: 5,
    surface_prop: 6,
    physics_bone: 8,
    name: 10,
    data_stride: 152,
    pose_to_bone: 0,
    q_alignment: 48,
    position: 64,
    quat: 76,
    rotation: 92,
    scale: 104,
    parent: 116,
    flags: 120,
    proc_type: 124,
    proc_index: 126,
    rot_scale: 128,
    scale_scale: 140,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoneLayout {
    Records(BoneRecordLayout),
    Columnar(ColumnarBoneLayout),
}

/// Linear (structure-of-arrays) bone block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBoneLayout {
    pub encoding: OffsetEncoding,
    pub count: usize,
    pub flags: usize,
    pub parent: usize,
    pub position: usize,
    pub quat: usize,
    pub rotation: usize,
    pub pose_to_bone: usize,
    pub pos_scale: Option<usize>,
    pub rot_scale: Option<usize>,
    pub q_alignment: Option<usize>,
}

pub const LINEAR_BONE_WIDE: LinearBoneLayout = LinearBoneLayout {
    encoding: OffsetEncoding::Relative32,
    count: 0,
    flags: 4,
    parent: 8,
    position: 12,
    quat: 16,
    rotation: 20,
    pose_to_bone: 24,
    pos_scale: Some(28),
    rot_scale: Some(32),
    q_alignment: Some(36),
};

pub const LINEAR_BONE_PACKED: LinearBoneLayout = LinearBoneLayout {
    encoding: OffsetEncoding::Fix16,
    count: 0,
    flags: 2,
    parent: 4,
    position: 6,
    quat: 8,
    rotation: 10,
    pose_to_bone: 12,
    pos_scale: None,
    rot_scale: None,
    q_alignment: None,
};

/// Procedural rule type for jiggle bones.
pub const PROC_JIGGLE: u32 = 5;

/// Jiggle parameter block: `i32` flags then `f32` fields in order.
pub const JIGGLE_FLOAT_COUNT: usize = 34;
pub const JIGGLE_SIZE: usize = 4 + JIGGLE_FLOAT_COUNT * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IkChainLayout {
    pub stride: usize,
    pub name: usize,
    pub link_type: usize,
    pub link_count: usize,
    pub link_index: usize,
}

pub const IK_CHAIN_WIDE: IkChainLayout = IkChainLayout {
    stride: 16,
    name: 0,
    link_type: 4,
    link_count: 8,
    link_index: 12,
};

pub const IK_CHAIN_PACKED: IkChainLayout = IkChainLayout {
    stride: 8,
    name: 0,
    link_count: 2,
    link_index: 4,
    link_type: 6,
};

pub const IK_LINK_STRIDE: usize = 28;
pub const IK_LINK_KNEE_DIR: usize = 4;

// ============================================================================
// Model tables
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentLayout {
    pub stride: usize,
    pub name: usize,
    pub flags: usize,
    pub bone: usize,
    pub matrix: usize,
}

pub const ATTACHMENT_WIDE: AttachmentLayout = AttachmentLayout {
    stride: 92,
    name: 0,
    flags: 4,
    bone: 8,
    matrix: 12,
};

pub const ATTACHMENT_PACKED: AttachmentLayout = AttachmentLayout {
    stride: 60,
    name: 0,
    flags: 4,
    bone: 8,
    matrix: 12,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitboxSetLayout {
    pub stride: usize,
    pub name: usize,
    pub hitboxes: TableField,
}

pub const HITBOX_SET_WIDE: HitboxSetLayout = HitboxSetLayout {
    stride: 12,
    name: 0,
    hitboxes: table(4, 8),
};

pub const HITBOX_SET_PACKED: HitboxSetLayout = HitboxSetLayout {
    stride: 6,
    name: 0,
    hitboxes: table(2, 4),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitboxLayout {
    pub stride: usize,
    pub bone: usize,
    pub group: usize,
    pub min: usize,
    pub max: usize,
    pub name: usize,
    pub critical_override: usize,
}

pub const HITBOX_WIDE: HitboxLayout = HitboxLayout {
    stride: 68,
    bone: 0,
    group: 4,
    min: 8,
    max: 20,
    name: 32,
    critical_override: 36,
};

pub const HITBOX_PACKED: HitboxLayout = HitboxLayout {
    stride: 36,
    bone: 0,
    group: 2,
    min: 4,
    max: 16,
    name: 28,
    critical_override: 30,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureLayout {
    pub stride: usize,
    pub name: Option<usize>,
    pub guid: Option<usize>,
}

pub const TEXTURE_SOURCE: TextureLayout = TextureLayout {
    stride: 64,
    name: Some(0),
    guid: None,
};

pub const TEXTURE_R5: TextureLayout = TextureLayout {
    stride: 12,
    name: Some(0),
    guid: Some(4),
};

pub const TEXTURE_PACKED: TextureLayout = TextureLayout {
    stride: 8,
    name: None,
    guid: Some(0),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyPartLayout {
    pub stride: usize,
    pub name: usize,
    pub models: TableField,
    pub base: usize,
}

pub const BODY_PART_WIDE: BodyPartLayout = BodyPartLayout {
    stride: 16,
    name: 0,
    models: table(4, 12),
    base: 8,
};

pub const BODY_PART_PACKED: BodyPartLayout = BodyPartLayout {
    stride: 12,
    name: 0,
    models: table(2, 8),
    base: 4,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelName {
    Inline { pos: usize, len: usize },
    Offset(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelLayout {
    pub stride: usize,
    pub name: ModelName,
    pub meshes: TableField,
    pub vertex_count: usize,
    pub vertex_index: usize,
}

pub const MODEL_WIDE: ModelLayout = ModelLayout {
    stride: 148,
    name: ModelName::Inline { pos: 0, len: 64 },
    meshes: table(72, 76),
    vertex_count: 80,
    vertex_index: 84,
};

pub const MODEL_PACKED: ModelLayout = ModelLayout {
    stride: 16,
    name: ModelName::Offset(0),
    meshes: table(2, 4),
    vertex_count: 8,
    vertex_index: 12,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshLayout {
    pub stride: usize,
    pub material: usize,
    pub mesh_id: usize,
    pub vertex_count: usize,
    pub vertex_offset: usize,
    pub center: usize,
}

pub const MESH_WIDE: MeshLayout = MeshLayout {
    stride: 116,
    material: 0,
    vertex_count: 8,
    vertex_offset: 12,
    mesh_id: 32,
    center: 36,
};

pub const MESH_PACKED: MeshLayout = MeshLayout {
    stride: 24,
    material: 0,
    mesh_id: 2,
    vertex_count: 4,
    vertex_offset: 8,
    center: 12,
};

/// Hardware group descriptor (packed revisions).
pub mod hw_group {
    pub const STRIDE: usize = 24;
    pub const DATA_OFFSET: usize = 0;
    pub const COMPRESSED_SIZE: usize = 4;
    pub const DECOMPRESSED_SIZE: usize = 8;
    pub const COMPRESSION: usize = 12;
    pub const LOD_INDEX: usize = 13;
    pub const LOD_COUNT: usize = 14;
    pub const LOD_MAP: usize = 15;
    pub const OPAQUE: [usize; 2] = [16, 20];
}

// ============================================================================
// Animation and sequence descriptors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimDescLayout {
    pub encoding: OffsetEncoding,
    pub stride: usize,
    pub name: usize,
    pub fps: usize,
    pub flags: usize,
    pub frames: usize,
    pub movements: Option<TableField>,
    pub frame_movement: Option<usize>,
    /// `i32` offset relative to the descriptor in every revision.
    pub anim_index: usize,
    pub ik_rules: Option<TableField>,
    pub section_index: Option<usize>,
    pub stall_frames: Option<usize>,
    pub section_frames: Option<usize>,
}

pub const ANIMDESC_SOURCE: AnimDescLayout = AnimDescLayout {
    encoding: OffsetEncoding::Relative32,
    stride: 100,
    name: 4,
    fps: 8,
    flags: 12,
    frames: 16,
    movements: Some(table(20, 24)),
    frame_movement: None,
    anim_index: 56,
    ik_rules: Some(table(60, 64)),
    section_index: Some(80),
    stall_frames: None,
    section_frames: Some(84),
};

pub const ANIMDESC_V8: AnimDescLayout = AnimDescLayout {
    encoding: OffsetEncoding::Relative32,
    stride: 56,
    name: 4,
    fps: 8,
    flags: 12,
    frames: 16,
    movements: Some(table(20, 24)),
    frame_movement: Some(28),
    anim_index: 32,
    ik_rules: Some(table(36, 40)),
    section_index: Some(44),
    stall_frames: None,
    section_frames: Some(48),
};

pub const ANIMDESC_V12_1: AnimDescLayout = AnimDescLayout {
    stride: 60,
    stall_frames: Some(48),
    section_frames: Some(52),
    ..ANIMDESC_V8
};

pub const ANIMDESC_PACKED: AnimDescLayout = AnimDescLayout {
    encoding: OffsetEncoding::Fix16,
    stride: 36,
    fps: 0,
    flags: 4,
    frames: 8,
    name: 12,
    movements: None,
    frame_movement: Some(14),
    anim_index: 16,
    ik_rules: Some(table(20, 22)),
    section_index: Some(24),
    stall_frames: Some(26),
    section_frames: Some(28),
};

/// Sequence weight list sentinel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightListField {
    /// `i32` offset: 0 all-one, -1 all-zero.
    Wide(usize),
    /// `u16` fix offset: 0 all-one, 0xFFFF all-zero.
    Packed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqDescLayout {
    pub encoding: OffsetEncoding,
    pub stride: usize,
    pub label: usize,
    pub activity_name: usize,
    pub flags: usize,
    pub activity: usize,
    pub activity_weight: usize,
    pub events: TableField,
    pub bbox_min: usize,
    pub bbox_max: usize,
    pub blend_count: usize,
    pub anim_index: usize,
    pub movement_index: Option<usize>,
    /// Two group size fields (`i32` wide, `u8` packed).
    pub group_size: [usize; 2],
    pub fade_in: usize,
    pub fade_out: usize,
    pub weight_list: WeightListField,
    pub anim_data_guid: Option<usize>,
}

pub const SEQDESC_WIDE: SeqDescLayout = SeqDescLayout {
    encoding: OffsetEncoding::Relative32,
    stride: 212,
    label: 4,
    activity_name: 8,
    flags: 12,
    activity: 16,
    activity_weight: 20,
    events: table(24, 28),
    bbox_min: 32,
    bbox_max: 44,
    blend_count: 56,
    anim_index: 60,
    movement_index: Some(64),
    group_size: [68, 72],
    fade_in: 104,
    fade_out: 108,
    weight_list: WeightListField::Wide(156),
    anim_data_guid: None,
};

pub const SEQDESC_PACKED: SeqDescLayout = SeqDescLayout {
    encoding: OffsetEncoding::Fix16,
    stride: 68,
    label: 0,
    activity_name: 2,
    flags: 4,
    activity: 8,
    activity_weight: 10,
    events: table(12, 14),
    bbox_min: 16,
    bbox_max: 28,
    blend_count: 40,
    anim_index: 42,
    movement_index: None,
    group_size: [48, 49],
    fade_in: 64,
    fade_out: 66,
    weight_list: WeightListField::Packed(50),
    anim_data_guid: None,
};

pub const SEQDESC_PACKED_GUID: SeqDescLayout = SeqDescLayout {
    stride: 76,
    anim_data_guid: Some(68),
    ..SEQDESC_PACKED
};

/// Legacy piecewise movement record.
pub mod movement {
    pub const STRIDE: usize = 44;
    pub const END_FRAME: usize = 0;
    pub const MOTION_FLAGS: usize = 4;
    pub const V0: usize = 8;
    pub const V1: usize = 12;
    pub const ANGLE: usize = 16;
    pub const VECTOR: usize = 20;
    pub const POSITION: usize = 32;
}

// ============================================================================
// Version dispatch
// ============================================================================

impl StudioVersion {
    #[must_use]
    pub fn header_layout(self) -> &'static HeaderLayout {
        match self {
            StudioVersion::R1 => &HEADER_R1,
            StudioVersion::R2 => &HEADER_R2,
            StudioVersion::V14 | StudioVersion::V14_1 | StudioVersion::V15 => &HEADER_V14,
            StudioVersion::V16 | StudioVersion::V17 => &HEADER_V16,
            StudioVersion::V18 | StudioVersion::V19 | StudioVersion::V19_1 => &HEADER_V18,
            _ => &HEADER_V8,
        }
    }

    #[must_use]
    pub fn bone_layout(self) -> BoneLayout {
        match self.family() {
            LayoutFamily::Source => BoneLayout::Records(BONE_SOURCE),
            LayoutFamily::R5 => BoneLayout::Records(BONE_R5),
            LayoutFamily::Packed => BoneLayout::Columnar(BONE_COLUMNAR),
        }
    }

    #[must_use]
    pub fn linear_bone_layout(self) -> &'static LinearBoneLayout {
        match self.family() {
            LayoutFamily::Source | LayoutFamily::R5 => &LINEAR_BONE_WIDE,
            LayoutFamily::Packed => &LINEAR_BONE_PACKED,
        }
    }

    #[must_use]
    pub fn ik_chain_layout(self) -> &'static IkChainLayout {
        match self.family() {
            LayoutFamily::Packed => &IK_CHAIN_PACKED,
            _ => &IK_CHAIN_WIDE,
        }
    }

    #[must_use]
    pub fn attachment_layout(self) -> &'static AttachmentLayout {
        match self.family() {
            LayoutFamily::Packed => &ATTACHMENT_PACKED,
            _ => &ATTACHMENT_WIDE,
        }
    }

    #[must_use]
    pub fn hitbox_layouts(self) -> (&'static HitboxSetLayout, &'static HitboxLayout) {
        match self.family() {
            LayoutFamily::Packed => (&HITBOX_SET_PACKED, &HITBOX_PACKED),
            _ => (&HITBOX_SET_WIDE, &HITBOX_WIDE),
        }
    }

    #[must_use]
    pub fn texture_layout(self) -> &'static TextureLayout {
        match self.family() {
            LayoutFamily::Source => &TEXTURE_SOURCE,
            LayoutFamily::R5 => &TEXTURE_R5,
            LayoutFamily::Packed => &TEXTURE_PACKED,
        }
    }

    #[must_use]
    pub fn body_part_layouts(
        self,
    ) -> (&'static BodyPartLayout, &'static ModelLayout, &'static MeshLayout) {
        match self.family() {
            LayoutFamily::Packed => (&BODY_PART_PACKED, &MODEL_PACKED, &MESH_PACKED),
            _ => (&BODY_PART_WIDE, &MODEL_WIDE, &MESH_WIDE),
        }
    }

    #[must_use]
    pub fn animdesc_layout(self) -> &'static AnimDescLayout {
        match self {
            StudioVersion::R1 | StudioVersion::R2 => &ANIMDESC_SOURCE,
            StudioVersion::V8
            | StudioVersion::V9
            | StudioVersion::V10
            | StudioVersion::V11
            | StudioVersion::V12 => &ANIMDESC_V8,
            v if v.family() == LayoutFamily::R5 => &ANIMDESC_V12_1,
            _ => &ANIMDESC_PACKED,
        }
    }

    #[must_use]
    pub fn seqdesc_layout(self) -> &'static SeqDescLayout {
        match self.family() {
            LayoutFamily::Source | LayoutFamily::R5 => &SEQDESC_WIDE,
            LayoutFamily::Packed if self.has_anim_data_guid() => &SEQDESC_PACKED_GUID,
            LayoutFamily::Packed => &SEQDESC_PACKED,
        }
    }
}
