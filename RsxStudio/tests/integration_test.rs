use glam::{Quat, Vec3};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rsxstudio::formats::packed::{Quaternion64, SparsePos64};
use rsxstudio::formats::studio::anim::datapoint::header as dp_header;
use rsxstudio::formats::studio::layout::{BoneLayout, NameField, TableField};
use rsxstudio::formats::studio::vertex::{PackedWeights, VertexFlags, WEIGHT_UNIT, unpack_weight};
use rsxstudio::formats::studio::{AnimFlags, LayoutFamily, SequenceSource};
use rsxstudio::prelude::*;
use rsxstudio::utils::OffsetEncoding;
use tempfile::tempdir;

const MODEL_NAME: &str = "synthetic";

// ============================================================================
// Buffer writer
// ============================================================================

struct Buf {
    data: Vec<u8>,
}

impl Buf {
    fn new(header_size: usize) -> Self {
        Self {
            data: vec![0; header_size.next_multiple_of(16)],
        }
    }

    /// Append `len` zeroed bytes, returning their position.
    fn alloc(&mut self, len: usize) -> usize {
        let at = self.data.len();
        self.data.resize(at + len.max(4).next_multiple_of(4), 0);
        at
    }

    fn put(&mut self, at: usize, bytes: &[u8]) {
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
    }

    fn u16(&mut self, at: usize, v: u16) {
        self.put(at, &v.to_le_bytes());
    }

    fn i16(&mut self, at: usize, v: i16) {
        self.put(at, &v.to_le_bytes());
    }

    fn u32(&mut self, at: usize, v: u32) {
        self.put(at, &v.to_le_bytes());
    }

    fn i32(&mut self, at: usize, v: i32) {
        self.put(at, &v.to_le_bytes());
    }

    fn f32(&mut self, at: usize, v: f32) {
        self.put(at, &v.to_le_bytes());
    }

    fn u64(&mut self, at: usize, v: u64) {
        self.put(at, &v.to_le_bytes());
    }

    fn i64(&mut self, at: usize, v: i64) {
        self.put(at, &v.to_le_bytes());
    }

    fn string(&mut self, s: &str) -> usize {
        let at = self.alloc(s.len() + 1);
        self.put(at, s.as_bytes());
        at
    }

    fn count(&mut self, enc: OffsetEncoding, at: usize, n: usize) {
        match enc {
            OffsetEncoding::Relative32 => self.i32(at, n as i32),
            OffsetEncoding::Fix16 => self.u16(at, n as u16),
        }
    }

    /// Store `target` in the offset field at `base + field`.
    fn offset(&mut self, enc: OffsetEncoding, base: usize, field: usize, target: usize) {
        match enc {
            OffsetEncoding::Relative32 => self.i32(base + field, target as i32 - base as i32),
            OffsetEncoding::Fix16 => self.u16(base + field, (target - (base + field)) as u16),
        }
    }

    fn table(&mut self, enc: OffsetEncoding, field: TableField, count: usize, at: usize) {
        self.count(enc, field.count, count);
        if count > 0 {
            self.offset(enc, 0, field.index, at);
        }
    }

    /// RLE section for one bone: static rotation, position through a value pointer.
    fn rle_section(&mut self, rotation: Quaternion64, pos_scale: f32, values: &[i16]) -> usize {
        let section = self.alloc(2 + 20 + 2 + values.len() * 2);
        self.put(section, &[0x03, 0x00]);
        let record = section + 2;
        self.u16(record, 20 | (1 << 13));
        self.f32(record + 2, pos_scale);
        self.u64(record + 6, rotation.0);
        let ptr = record + 14;
        let stream = record + 20;
        self.i16(ptr, (stream - ptr) as i16);
        self.put(stream, &[values.len() as u8, values.len() as u8]);
        for (i, v) in values.iter().enumerate() {
            self.i16(stream + 2 + i * 2, *v);
        }
        section
    }

    /// Datapoint section for one bone with position keys only.
    fn datapoint_section(&mut self, keys: &[(SparsePos64, [i16; 3])]) -> usize {
        let n = keys.len();
        let data_offset = 2 + dp_header::SIZE;
        let section = self.alloc(data_offset + n * (8 + 6));
        self.put(section, &[0x01, 0x00]);
        let h = section + 2;
        self.u16(h + dp_header::POSITION_KEYS, n as u16);
        self.u32(h + dp_header::DATA_OFFSET, data_offset as u32);
        let key_start = section + data_offset;
        let fixup_start = key_start + n * 8;
        for (i, (key, fixup)) in keys.iter().enumerate() {
            self.u64(key_start + i * 8, key.0);
            for (c, f) in fixup.iter().enumerate() {
                self.i16(fixup_start + i * 6 + c * 2, *f);
            }
        }
        section
    }
}

// ============================================================================
// Model writer
// ============================================================================

struct Synthetic {
    buf: Buf,
    seqdescs: Vec<usize>,
}

/// Header, `bones` bones, one body part with `meshes` meshes and `sequences`
/// empty sequence descriptors.
fn build_model(version: StudioVersion, bones: usize, meshes: usize, sequences: usize) -> Synthetic {
    let header = version.header_layout();
    let enc = header.encoding;
    let mut buf = Buf::new(header.size);

    match header.name {
        NameField::Inline { pos, .. } => buf.put(pos, MODEL_NAME.as_bytes()),
        NameField::Offset(pos) => {
            let name = buf.string(MODEL_NAME);
            buf.offset(enc, 0, pos, name);
        }
    }

    match version.bone_layout() {
        BoneLayout::Records(layout) => {
            let table = buf.alloc(bones * layout.stride);
            for i in 0..bones {
                let base = table + i * layout.stride;
                let name = buf.string(&format!("bone_{i}"));
                buf.offset(OffsetEncoding::Relative32, base, layout.name, name);
                buf.i32(base + layout.parent, i as i32 - 1);
            }
            buf.table(enc, header.bones, bones, table);
        }
        BoneLayout::Columnar(layout) => {
            let headers = buf.alloc(bones * layout.header_stride);
            let data = buf.alloc(bones * layout.data_stride);
            for i in 0..bones {
                let h = headers + i * layout.header_stride;
                let d = data + i * layout.data_stride;
                let name = buf.string(&format!("bone_{i}"));
                buf.offset(OffsetEncoding::Fix16, h, layout.name, name);
                buf.i16(d + layout.parent, i as i16 - 1);
            }
            buf.table(enc, header.bones, bones, headers);
            if let (Some(pos), true) = (header.bone_data, bones > 0) {
                buf.offset(enc, 0, pos, data);
            }
        }
    }

    let (part_layout, model_layout, mesh_layout) = version.body_part_layouts();
    let table_enc = version.offset_encoding();
    let packed = version.family() == LayoutFamily::Packed;
    let part = buf.alloc(part_layout.stride);
    let model = buf.alloc(model_layout.stride);
    let mesh_table = buf.alloc(meshes * mesh_layout.stride);
    buf.count(table_enc, part + part_layout.models.count, 1);
    buf.offset(table_enc, part, part_layout.models.index, model);
    buf.count(table_enc, model + model_layout.meshes.count, meshes);
    if meshes > 0 {
        buf.offset(table_enc, model, model_layout.meshes.index, mesh_table);
    }
    for i in 0..meshes {
        let at = mesh_table + i * mesh_layout.stride;
        if packed {
            buf.u16(at + mesh_layout.material, i as u16);
        } else {
            buf.i32(at + mesh_layout.material, i as i32);
        }
    }
    buf.table(enc, header.body_parts, 1, part);

    let seq_layout = version.seqdesc_layout();
    let seq_table = buf.alloc(sequences * seq_layout.stride);
    let seqdescs: Vec<usize> = (0..sequences).map(|i| seq_table + i * seq_layout.stride).collect();
    for (i, &at) in seqdescs.iter().enumerate() {
        let label = buf.string(&format!("seq_{i}"));
        buf.offset(seq_layout.encoding, at, seq_layout.label, label);
    }
    buf.table(enc, header.sequences, sequences, seq_table);

    Synthetic { buf, seqdescs }
}

/// Point sequence `seq` at one new animation descriptor and return its position.
fn add_clip(buf: &mut Buf, version: StudioVersion, seq: usize, flags: AnimFlags, frames: i32) -> usize {
    let seq_layout = version.seqdesc_layout();
    let layout = version.animdesc_layout();
    buf.count(seq_layout.encoding, seq + seq_layout.blend_count, 1);
    let anims = buf.alloc(4);
    buf.offset(seq_layout.encoding, seq, seq_layout.anim_index, anims);
    let desc = buf.alloc(layout.stride);
    buf.i32(anims, (desc - seq) as i32);

    let name = buf.string("clip");
    buf.offset(layout.encoding, desc, layout.name, name);
    buf.f32(desc + layout.fps, 30.0);
    buf.u32(desc + layout.flags, flags.bits());
    buf.i32(desc + layout.frames, frames);
    desc
}

fn link_data(buf: &mut Buf, version: StudioVersion, desc: usize, data: usize) {
    let field = version.animdesc_layout().anim_index;
    buf.i32(desc + field, (data - desc) as i32);
}

fn options() -> DecodeOptions {
    DecodeOptions::default().with_scratch(2, 64 * 1024)
}

fn parse(sources: ModelSources, version: StudioVersion) -> StudioModel {
    let options = options();
    StudioModel::parse(sources, version, &options, &options.scratch_pool(), &Decompressors::new()).unwrap()
}

// ============================================================================
// Vertex group writer (revision 1)
// ============================================================================

/// Single-LOD, single-mesh revision 1 vertex group.
fn vg_rev1(flags: u64, stride: usize, vertex_count: usize, vertices: &[u8], indices: &[u16]) -> Vec<u8> {
    let meshes = 160;
    let lods = meshes + 72;
    let index_start = lods + 8;
    let vertex_start = (index_start + indices.len() * 2).next_multiple_of(8);
    let mut buf = Buf {
        data: vec![0; vertex_start + vertices.len()],
    };

    buf.put(0, b"0tVG");
    buf.u32(4, 1);
    let mut pair = |buf: &mut Buf, index: usize, offset: usize, count: usize| {
        let at = 16 + index * 16;
        buf.i64(at, offset as i64);
        buf.i64(at + 8, count as i64);
    };
    pair(&mut buf, 1, meshes, 1);
    pair(&mut buf, 2, index_start, indices.len());
    pair(&mut buf, 3, vertex_start, vertex_count);
    pair(&mut buf, 6, lods, 1);

    buf.u64(meshes, flags);
    buf.u32(meshes + 12, stride as u32);
    buf.u32(meshes + 16, vertex_count as u32);
    buf.i32(meshes + 24, -1);
    buf.u32(meshes + 36, indices.len() as u32);

    buf.u16(lods + 2, 1);
    buf.f32(lods + 4, 0.0);

    for (i, index) in indices.iter().enumerate() {
        buf.u16(index_start + i * 2, *index);
    }
    buf.put(vertex_start, vertices);
    buf.data
}

fn weighted_vertex(position: [f32; 3], weights: PackedWeights) -> Vec<u8> {
    let mut record: Vec<u8> = position.iter().flat_map(|c| c.to_le_bytes()).collect();
    record.extend_from_slice(&weights.to_bytes());
    record
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_table_counts_every_version() {
    for version in StudioVersion::ALL {
        for (bones, meshes, sequences) in [(0, 0, 0), (1, 1, 1), (3, 2, 4)] {
            let synthetic = build_model(version, bones, meshes, sequences);
            let mut model = parse(ModelSources::new("counts", synthetic.buf.data), version);

            assert_eq!(model.bones.len(), bones, "{version} bones");
            for (i, bone) in model.bones.iter().enumerate() {
                assert_eq!(bone.name, format!("bone_{i}"), "{version} bone name");
                assert_eq!(bone.parent, i as i32 - 1, "{version} bone parent");
            }
            let mesh_materials: Vec<i32> = model.body_parts[0].meshes().map(|m| m.material).collect();
            assert_eq!(mesh_materials, (0..meshes as i32).collect::<Vec<_>>(), "{version} meshes");
            let labels: Vec<&str> = model.seqdescs.iter().map(|s| s.label.as_str()).collect();
            let expected: Vec<String> = (0..sequences).map(|i| format!("seq_{i}")).collect();
            assert_eq!(labels, expected, "{version} sequences");

            let view = ByteView::new(model.data());
            assert_eq!(model.header.name(&view).unwrap(), MODEL_NAME, "{version} name");
            assert!(model.lods.is_empty());

            model.decode_animations(&ExternalBuffers::default(), &options());
            let summary = model.summary();
            assert_eq!(summary.bones, bones);
            assert_eq!(summary.meshes, meshes);
            assert_eq!(summary.sequences, sequences);
            assert_eq!(summary.clips, 0);
            assert_eq!(summary.skipped_sequences, 0);
        }
    }
}

#[test]
fn test_vertex_group_float_positions() {
    let version = StudioVersion::V8;
    let synthetic = build_model(version, 2, 1, 0);

    let positions = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let mut vertices = Vec::new();
    for p in positions {
        vertices.extend(p.iter().flat_map(|c| c.to_le_bytes()));
        vertices.extend_from_slice(&0u32.to_le_bytes());
    }
    let flags = 1 | VertexFlags::NORMAL;
    let block = vg_rev1(flags, 16, 3, &vertices, &[0, 1, 2]);

    let sources = ModelSources::new("tri", synthetic.buf.data).with_vertex_group(CompressedBlock::raw(block));
    let model = parse(sources, version);

    assert_eq!(model.lods.len(), 1);
    let lod = &model.lods[0];
    assert_eq!(lod.rejected, 0);
    assert_eq!(lod.meshes.len(), 1);
    let mesh = &lod.meshes[0];
    assert_eq!(mesh.vert_count(), 3);
    assert_eq!(mesh.texcoord_channels, 0);
    assert_eq!(mesh.indices, vec![0, 1, 2]);
    assert_eq!(mesh.material, 0);
    for (i, p) in positions.iter().enumerate() {
        assert_eq!(mesh.vertices[i].position, *p);
        let weights = mesh.weights_of(i);
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].bone, 0);
        assert!((weights[0].weight - 1.0).abs() < f32::EPSILON);
    }
    assert_eq!(model.summary().lods[0].vertices, 3);
}

#[test]
fn test_vertex_group_remainder_weight() {
    let version = StudioVersion::V8;
    let synthetic = build_model(version, 3, 1, 0);
    let packed = PackedWeights {
        weights: [12000, 8000],
        bones: [0, 1, 2],
        count: 2,
    };
    let vertex = weighted_vertex([0.5, 0.5, 0.5], packed);
    let flags = 1 | VertexFlags::WEIGHTS;
    let block = vg_rev1(flags, vertex.len(), 1, &vertex, &[0, 0, 0]);

    let sources = ModelSources::new("skinned", synthetic.buf.data).with_vertex_group(CompressedBlock::raw(block));
    let model = parse(sources, version);
    let mesh = &model.lods[0].meshes[0];
    let weights = mesh.weights_of(0);

    assert_eq!(weights.len(), 3);
    assert_eq!(weights.iter().map(|w| w.bone).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert!((weights[2].weight - unpack_weight(12767)).abs() < 1e-6);
    let sum: f32 = weights.iter().map(|w| w.weight).sum();
    assert!((sum - 1.0).abs() < 1e-5);
}

#[test]
fn test_missing_vertex_group_is_an_error() {
    let version = StudioVersion::V14;
    let synthetic = build_model(version, 1, 1, 0);
    let sources = ModelSources::new("broken", synthetic.buf.data)
        .with_vertex_group(CompressedBlock::raw(b"nope".to_vec()));
    let options = options();
    let result = StudioModel::parse(sources, version, &options, &options.scratch_pool(), &Decompressors::new());
    assert!(result.is_err());
}

#[test]
fn test_rle_clip_decodes() {
    let version = StudioVersion::V10;
    let mut synthetic = build_model(version, 1, 0, 1);
    let seq = synthetic.seqdescs[0];
    let buf = &mut synthetic.buf;

    let rotation = Quaternion64::pack(Quat::from_rotation_z(0.5));
    let desc = add_clip(buf, version, seq, AnimFlags::VALID, 4);
    let data = buf.rle_section(rotation, 0.5, &[2, 4, 6, 8]);
    link_data(buf, version, desc, data);

    let mut model = parse(ModelSources::new("rle", synthetic.buf.data), version);
    model.decode_animations(&ExternalBuffers::default(), &options());

    let sequence = &model.sequences[0];
    assert!(sequence.is_complete(), "{:?}", sequence.skipped);
    assert_eq!(sequence.clips.len(), 1);
    let clip = &sequence.clips[0];
    assert_eq!(clip.desc.name, "clip");
    assert!(clip.root_motion.is_none());

    let track = &clip.track;
    assert_eq!(track.frame_count(), 4);
    let expected_rotation = rotation.unpack();
    for frame in 0..4 {
        let position = track.position(0, frame).unwrap();
        assert!(position.abs_diff_eq(Vec3::new(frame as f32 + 1.0, 0.0, 0.0), 1e-6));
        let q = track.rotation(0, frame).unwrap();
        assert!(q.abs_diff_eq(expected_rotation, 1e-6));
    }
}

#[test]
fn test_bad_anim_entry_skips_only_its_sequence() {
    let version = StudioVersion::V10;
    let mut synthetic = build_model(version, 1, 0, 2);
    let (good, bad) = (synthetic.seqdescs[0], synthetic.seqdescs[1]);
    let buf = &mut synthetic.buf;

    let desc = add_clip(buf, version, good, AnimFlags::VALID, 2);
    let data = buf.rle_section(Quaternion64::pack(Quat::IDENTITY), 1.0, &[1, 2]);
    link_data(buf, version, desc, data);

    let bad_desc = add_clip(buf, version, bad, AnimFlags::VALID, 2);
    // the anim entry table sits right before the descriptor
    buf.i32(bad_desc - 4, 0);

    let mut model = parse(ModelSources::new("mixed", synthetic.buf.data), version);
    assert_eq!(model.seqdescs.len(), 2);
    assert!(model.seqdescs[0].invalid.is_none());
    assert!(model.seqdescs[1].anims.is_empty());

    model.decode_animations(&ExternalBuffers::default(), &options());
    assert_eq!(model.sequences.len(), 2);
    assert!(model.sequences[0].is_complete(), "{:?}", model.sequences[0].skipped);
    assert_eq!(model.sequences[0].clips[0].track.frame_count(), 2);

    let skipped = &model.sequences[1];
    assert_eq!(skipped.label(), "seq_1");
    assert!(skipped.clips.is_empty());
    assert_eq!(
        skipped.skipped.as_deref(),
        Some("malformed sequence 1: anim entry 0 offset 0")
    );
}

fn datapoint_keys() -> ((SparsePos64, [i16; 3]), (SparsePos64, [i16; 3])) {
    (
        SparsePos64::pack(Vec3::new(1.0, 2.0, 3.0), 9),
        SparsePos64::pack(Vec3::new(5.0, -2.0, 0.5), 0),
    )
}

#[test]
fn test_datapoint_clip_interpolates() {
    let version = StudioVersion::V17;
    let mut synthetic = build_model(version, 1, 0, 1);
    let seq = synthetic.seqdescs[0];
    let buf = &mut synthetic.buf;

    let (a, b) = datapoint_keys();
    let desc = add_clip(buf, version, seq, AnimFlags::VALID | AnimFlags::DATAPOINT, 10);
    let data = buf.datapoint_section(&[a, b]);
    link_data(buf, version, desc, data);

    let mut model = parse(ModelSources::new("datapoint", synthetic.buf.data), version);
    model.decode_animations(&ExternalBuffers::default(), &options());

    let sequence = &model.sequences[0];
    assert!(sequence.is_complete(), "{:?}", sequence.skipped);
    let track = &sequence.clips[0].track;
    assert_eq!(track.frame_count(), 10);

    let first = a.0.unpack(Some(a.1));
    let last = b.0.unpack(Some(b.1));
    assert!(first.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-2));
    assert!(track.position(0, 0).unwrap().abs_diff_eq(first, 1e-6));
    assert!(track.position(0, 9).unwrap().abs_diff_eq(last, 1e-6));
    assert!(track.position(0, 5).unwrap().abs_diff_eq(first.lerp(last, 5.0 / 9.0), 1e-5));
}

#[test]
fn test_anim_data_sequence() {
    let version = StudioVersion::V19;
    let mut synthetic = build_model(version, 1, 0, 1);
    let seq = synthetic.seqdescs[0];

    let mut anim_data = Buf::new(16);
    let (a, b) = datapoint_keys();
    let section = anim_data.datapoint_section(&[a, b]);

    let desc = add_clip(&mut synthetic.buf, version, seq, AnimFlags::VALID | AnimFlags::DATAPOINT, 10);
    let field = version.animdesc_layout().anim_index;
    synthetic.buf.i32(desc + field, section as i32);

    let mut model = parse(ModelSources::new("streamed", synthetic.buf.data), version);

    model.decode_animations(&ExternalBuffers::default(), &options());
    let sequence = &model.sequences[0];
    assert!(sequence.skipped.is_some());
    assert!(sequence.clips.is_empty());
    assert_eq!(model.summary().skipped_sequences, 1);

    let buffers = ExternalBuffers {
        streamed: None,
        anim_data: Some(&anim_data.data),
    };
    model.decode_animations(&buffers, &options());
    let sequence = &model.sequences[0];
    assert!(sequence.is_complete(), "{:?}", sequence.skipped);
    let last = b.0.unpack(Some(b.1));
    assert!(sequence.clips[0].track.position(0, 9).unwrap().abs_diff_eq(last, 1e-6));
}

#[test]
fn test_external_sequence() {
    let version = StudioVersion::V17;
    let synthetic = build_model(version, 1, 0, 0);
    let mut model = parse(ModelSources::new("host", synthetic.buf.data), version);

    let mut external = Buf { data: Vec::new() };
    let seq = external.alloc(version.seqdesc_layout().stride);
    let (a, b) = datapoint_keys();
    let desc = add_clip(&mut external, version, seq, AnimFlags::VALID | AnimFlags::DATAPOINT, 10);
    let data = external.datapoint_section(&[a, b]);
    link_data(&mut external, version, desc, data);

    let sequence = model
        .add_external_sequence("walk_ext", &external.data, &ExternalBuffers::default(), &options())
        .unwrap();
    assert_eq!(sequence.source, SequenceSource::External("walk_ext".to_string()));
    assert!(sequence.is_complete(), "{:?}", sequence.skipped);
    assert_eq!(model.summary().clips, 1);
}

#[test]
fn test_batch_decode_with_sidecars() {
    let version = StudioVersion::V8;
    let dir = tempdir().unwrap();

    let mut vertices = Vec::new();
    for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        vertices.extend(p.iter().flat_map(|c| c.to_le_bytes()));
        vertices.extend_from_slice(&0u32.to_le_bytes());
    }
    let block = vg_rev1(1 | VertexFlags::NORMAL, 16, 3, &vertices, &[0, 1, 2]);
    std::fs::write(dir.path().join("tri.rmdl"), build_model(version, 2, 1, 1).buf.data).unwrap();
    std::fs::write(dir.path().join("tri.vg"), block).unwrap();
    std::fs::write(dir.path().join("bare.rmdl"), build_model(version, 1, 0, 0).buf.data).unwrap();

    let files = find_model_files(dir.path());
    assert_eq!(files.len(), 2);

    let result = batch_decode(&files, version, &options(), &Decompressors::new(), |_| {}).unwrap();
    assert_eq!(result.success_count(), 2);
    assert_eq!(result.fail_count(), 0);

    let tri = result
        .decoded
        .iter()
        .find(|asset| asset.model.name == "tri")
        .unwrap();
    assert_eq!(tri.model.lods.len(), 1);
    assert_eq!(tri.model.sequences.len(), 1);
    let bare = result
        .decoded
        .iter()
        .find(|asset| asset.model.name == "bare")
        .unwrap();
    assert!(bare.model.lods.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_vertex_weights_sum_to_unit(w0 in 0u16..=16000, w1 in 0u16..=16000, count in 0u8..=2) {
        let version = StudioVersion::V8;
        let synthetic = build_model(version, 3, 1, 0);
        let packed = PackedWeights { weights: [w0, w1], bones: [0, 1, 2], count };
        let vertex = weighted_vertex([0.0, 0.0, 0.0], packed);
        let block = vg_rev1(1 | VertexFlags::WEIGHTS, vertex.len(), 1, &vertex, &[0, 0, 0]);

        let sources = ModelSources::new("prop", synthetic.buf.data).with_vertex_group(CompressedBlock::raw(block));
        let model = parse(sources, version);
        let weights = model.lods[0].meshes[0].weights_of(0);

        prop_assert_eq!(weights.len(), usize::from(count) + 1);
        let units: u32 = weights.iter().map(|w| (w.weight * WEIGHT_UNIT as f32).round() as u32).sum();
        prop_assert_eq!(units, WEIGHT_UNIT);
    }
}
