//! Whole-model decode
//!
//! [`StudioModel::parse`] runs the per-asset passes in order: header, bones,
//! tables, then vertices per LOD. Animation is a second pass,
//! [`StudioModel::decode_animations`], run once every external buffer the
//! sequences may reference is resident.

use rayon::prelude::*;
use serde::Serialize;

use super::anim::ExternalBuffers;
use super::bones::{Bone, IkChain, decode_bones, decode_ik_chains};
use super::header::NormalizedHeader;
use super::sequence::{SeqDesc, Sequence, SequenceSource, assemble, decode_external_sequence, decode_seqdescs};
use super::tables::{
    Attachment, BodyPart, HitboxSet, Texture, decode_attachments, decode_body_parts, decode_hitbox_sets,
    decode_skins, decode_textures,
};
use super::version::StudioVersion;
use super::vertex::{LegacyVertexFiles, Lod, VertexInputs, decode_lods};
use crate::compression::{CompressedBlock, Decompressors};
use crate::config::DecodeOptions;
use crate::error::Result;
use crate::utils::{ByteView, ScratchPool};

/// Raw buffers making up one model asset.
#[derive(Debug, Clone, Default)]
pub struct ModelSources {
    pub name: String,
    pub model: Vec<u8>,
    /// Vertex group block (v8 to v15).
    pub vertex_group: Option<CompressedBlock>,
    /// Hardware data holding per-LOD groups (v16+).
    pub hardware_data: Option<Vec<u8>>,
    /// Four-file vertex set (r1, r2).
    pub legacy: Option<LegacyVertexFiles>,
}

impl ModelSources {
    pub fn new(name: impl Into<String>, model: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            model,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_vertex_group(mut self, block: CompressedBlock) -> Self {
        self.vertex_group = Some(block);
        self
    }

    #[must_use]
    pub fn with_hardware_data(mut self, data: Vec<u8>) -> Self {
        self.hardware_data = Some(data);
        self
    }

    #[must_use]
    pub fn with_legacy(mut self, files: LegacyVertexFiles) -> Self {
        self.legacy = Some(files);
        self
    }

    fn vertex_inputs(&self) -> VertexInputs<'_> {
        VertexInputs {
            vertex_group: self.vertex_group.as_ref(),
            hardware_data: self.hardware_data.as_deref(),
            legacy: self.legacy.as_ref(),
        }
    }
}

/// A decoded studio model.
#[derive(Debug, Clone)]
pub struct StudioModel {
    pub name: String,
    pub version: StudioVersion,
    pub header: NormalizedHeader,
    pub bones: Vec<Bone>,
    pub ik_chains: Vec<IkChain>,
    pub attachments: Vec<Attachment>,
    pub hitbox_sets: Vec<HitboxSet>,
    pub textures: Vec<Texture>,
    pub skins: Vec<Vec<i16>>,
    pub body_parts: Vec<BodyPart>,
    pub surface_prop: Option<String>,
    pub lods: Vec<Lod>,
    /// Sequence descriptors, decoded with the header.
    pub seqdescs: Vec<SeqDesc>,
    /// Filled by [`StudioModel::decode_animations`].
    pub sequences: Vec<Sequence>,
    data: Vec<u8>,
}

impl StudioModel {
    /// Decode everything except animation.
    ///
    /// Models without any vertex buffer decode with no LODs.
    ///
    /// # Errors
    /// Fails for an unreadable header or tables, or a vertex decode error
    /// other than a rejected mesh. No partial model is returned.
    pub fn parse(
        sources: ModelSources,
        version: StudioVersion,
        options: &DecodeOptions,
        pool: &ScratchPool,
        decompressors: &Decompressors,
    ) -> Result<Self> {
        let view = ByteView::new(&sources.model);
        let header = NormalizedHeader::parse(&view, version)?;
        let bones = decode_bones(&view, &header)?;
        let ik_chains = decode_ik_chains(&view, &header)?;
        let attachments = decode_attachments(&view, &header)?;
        let hitbox_sets = decode_hitbox_sets(&view, &header)?;
        let textures = decode_textures(&view, &header)?;
        let skins = decode_skins(&view, &header)?;
        let body_parts = decode_body_parts(&view, &header)?;
        let surface_prop = header.surface_prop(&view)?;
        let seqdescs = decode_seqdescs(&view, &header)?;
        tracing::debug!(
            asset = %sources.name,
            version = %version,
            bones = bones.len(),
            sequences = seqdescs.len(),
            "Decoded header and tables"
        );

        let inputs = sources.vertex_inputs();
        let lods = if inputs.is_empty() {
            tracing::debug!(asset = %sources.name, "No vertex data supplied");
            Vec::new()
        } else {
            decode_lods(&view, &header, &body_parts, inputs, decompressors, pool, options.max_lods)?
        };

        Ok(Self {
            name: sources.name,
            version,
            header,
            bones,
            ik_chains,
            attachments,
            hitbox_sets,
            textures,
            skins,
            body_parts,
            surface_prop,
            lods,
            seqdescs,
            sequences: Vec::new(),
            data: sources.model,
        })
    }

    /// Raw model buffer.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Assemble every sequence of the model.
    ///
    /// Sequence failures are recorded on each [`Sequence`]; the pass itself
    /// does not fail.
    pub fn decode_animations(&mut self, buffers: &ExternalBuffers<'_>, options: &DecodeOptions) {
        let view = ByteView::new(&self.data);
        let sequences: Vec<Sequence> = self
            .seqdescs
            .par_iter()
            .cloned()
            .map(|desc| {
                assemble(
                    &view,
                    self.version,
                    desc,
                    SequenceSource::Model,
                    &self.bones,
                    buffers,
                    options,
                )
            })
            .collect();
        let skipped = sequences.iter().filter(|s| s.skipped.is_some()).count();
        tracing::debug!(
            asset = %self.name,
            sequences = sequences.len(),
            skipped,
            "Decoded animations"
        );
        self.sequences = sequences;
    }

    /// Assemble an external sequence asset against this skeleton and append it.
    ///
    /// # Errors
    /// Fails if the sequence descriptor cannot be read.
    pub fn add_external_sequence(
        &mut self,
        name: &str,
        data: &[u8],
        buffers: &ExternalBuffers<'_>,
        options: &DecodeOptions,
    ) -> Result<&Sequence> {
        let sequence = decode_external_sequence(name, data, self.version, &self.bones, buffers, options)?;
        let index = self.sequences.len();
        self.sequences.push(sequence);
        Ok(&self.sequences[index])
    }

    #[must_use]
    pub fn summary(&self) -> ModelSummary {
        ModelSummary::new(self)
    }
}

/// Per-LOD counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LodSummary {
    pub index: usize,
    pub switch_point: f32,
    pub meshes: usize,
    pub vertices: usize,
    pub indices: usize,
    pub rejected: usize,
}

/// Entity counts of a decoded model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub version: StudioVersion,
    pub checksum: i32,
    pub surface_prop: Option<String>,
    pub mass: f32,
    pub bones: usize,
    pub procedural_bones: usize,
    pub ik_chains: usize,
    pub attachments: usize,
    pub hitbox_sets: usize,
    pub hitboxes: usize,
    pub textures: usize,
    pub skin_families: usize,
    pub body_parts: usize,
    pub models: usize,
    pub meshes: usize,
    pub lods: Vec<LodSummary>,
    pub sequences: usize,
    pub clips: usize,
    pub skipped_sequences: usize,
}

impl ModelSummary {
    fn new(model: &StudioModel) -> Self {
        Self {
            name: model.name.clone(),
            version: model.version,
            checksum: model.header.checksum,
            surface_prop: model.surface_prop.clone(),
            mass: model.header.mass,
            bones: model.bones.len(),
            procedural_bones: model.bones.iter().filter(|b| b.procedural.is_some()).count(),
            ik_chains: model.ik_chains.len(),
            attachments: model.attachments.len(),
            hitbox_sets: model.hitbox_sets.len(),
            hitboxes: model.hitbox_sets.iter().map(|s| s.hitboxes.len()).sum(),
            textures: model.textures.len(),
            skin_families: model.skins.len(),
            body_parts: model.body_parts.len(),
            models: model.body_parts.iter().map(|b| b.models.len()).sum(),
            meshes: model.body_parts.iter().map(|b| b.meshes().count()).sum(),
            lods: model
                .lods
                .iter()
                .map(|lod| LodSummary {
                    index: lod.index,
                    switch_point: lod.switch_point,
                    meshes: lod.meshes.len(),
                    vertices: lod.meshes.iter().map(|m| m.vert_count()).sum(),
                    indices: lod.meshes.iter().map(|m| m.indices.len()).sum(),
                    rejected: lod.rejected,
                })
                .collect(),
            sequences: model.seqdescs.len().max(model.sequences.len()),
            clips: model.sequences.iter().map(|s| s.clips.len()).sum(),
            skipped_sequences: model.sequences.iter().filter(|s| s.skipped.is_some()).count(),
        }
    }
}
