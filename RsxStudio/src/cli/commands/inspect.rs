//! Inspect command
//!
//! Decodes one model with its side buffers and prints a summary.

use std::path::Path;

use anyhow::Context;

use crate::cli::progress::{CUBE, FILM, LOOKING_GLASS, print_step};
use crate::compression::{CompressedBlock, Decompressors};
use crate::config::DecodeOptions;
use crate::formats::studio::{ExternalBuffers, LegacyVertexFiles, ModelSources, StudioModel, StudioVersion};

/// Arguments of the inspect command.
pub struct InspectArgs<'a> {
    pub model: &'a Path,
    pub version: StudioVersion,
    pub vg: Option<&'a Path>,
    pub hwdata: Option<&'a Path>,
    pub vtx: Option<&'a Path>,
    pub vvd: Option<&'a Path>,
    pub vvc: Option<&'a Path>,
    pub vvw: Option<&'a Path>,
    pub stream: Option<&'a Path>,
    pub anim_data: Option<&'a Path>,
    pub config: Option<&'a Path>,
    pub json: bool,
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_opt(path: Option<&Path>) -> anyhow::Result<Option<Vec<u8>>> {
    path.map(read).transpose()
}

/// Load options from `config`, or the defaults.
pub fn load_options(config: Option<&Path>) -> anyhow::Result<DecodeOptions> {
    Ok(match config {
        Some(path) => DecodeOptions::from_toml_file(path)?,
        None => DecodeOptions::default(),
    })
}

/// Decode and print a model.
///
/// # Errors
/// Returns an error if a file cannot be read or the model fails to decode.
pub fn execute(args: &InspectArgs<'_>) -> anyhow::Result<()> {
    let options = load_options(args.config)?;
    let name = args
        .model
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    if !args.json {
        print_step(1, 3, LOOKING_GLASS, &format!("Reading {}...", args.model.display()));
    }
    let mut sources = ModelSources::new(name, read(args.model)?);
    if let Some(vg) = read_opt(args.vg)? {
        sources = sources.with_vertex_group(CompressedBlock::raw(vg));
    }
    if let Some(hw) = read_opt(args.hwdata)? {
        sources = sources.with_hardware_data(hw);
    }
    if let (Some(vtx), Some(vvd)) = (read_opt(args.vtx)?, read_opt(args.vvd)?) {
        sources = sources.with_legacy(LegacyVertexFiles {
            vtx,
            vvd,
            vvc: read_opt(args.vvc)?,
            vvw: read_opt(args.vvw)?,
        });
    }
    let streamed = read_opt(args.stream)?;
    let anim_data = read_opt(args.anim_data)?;

    if !args.json {
        print_step(2, 3, CUBE, &format!("Decoding {} model...", args.version));
    }
    let pool = options.scratch_pool();
    let mut model = StudioModel::parse(sources, args.version, &options, &pool, &Decompressors::new())?;

    if options.decode_animations {
        if !args.json {
            print_step(3, 3, FILM, "Decoding animations...");
        }
        let buffers = ExternalBuffers {
            streamed: streamed.as_deref(),
            anim_data: anim_data.as_deref(),
        };
        model.decode_animations(&buffers, &options);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&model.summary())?);
    } else {
        print_model(&model);
    }
    Ok(())
}

fn print_model(model: &StudioModel) {
    let summary = model.summary();
    println!();
    println!("Studio Model Information");
    println!("========================");
    println!("Name:        {}", summary.name);
    println!("Version:     {}", summary.version);
    println!("Checksum:    {:#010x}", summary.checksum);
    if let Some(prop) = &summary.surface_prop {
        println!("Surface:     {prop}");
    }
    println!("Mass:        {}", summary.mass);
    println!(
        "Bones:       {} ({} procedural, {} IK chains)",
        summary.bones, summary.procedural_bones, summary.ik_chains
    );
    println!("Attachments: {}", summary.attachments);
    println!("Hitboxes:    {} in {} sets", summary.hitboxes, summary.hitbox_sets);
    println!("Textures:    {} ({} skin families)", summary.textures, summary.skin_families);
    println!(
        "Body parts:  {} ({} models, {} meshes)",
        summary.body_parts, summary.models, summary.meshes
    );
    println!();

    println!("LODs ({}):", summary.lods.len());
    for lod in &summary.lods {
        println!(
            "  [{}] switch {:>6.1} | {:>3} meshes | {:>7} vertices | {:>7} indices{}",
            lod.index,
            lod.switch_point,
            lod.meshes,
            lod.vertices,
            lod.indices,
            if lod.rejected > 0 {
                format!(" | {} rejected", lod.rejected)
            } else {
                String::new()
            }
        );
    }
    println!();

    println!("Sequences ({}):", model.sequences.len());
    for seq in &model.sequences {
        let frames: usize = seq.clips.iter().map(|c| c.desc.frames).sum();
        match &seq.skipped {
            Some(reason) => println!("  - {} (skipped: {reason})", seq.label()),
            None => println!(
                "  - {} ({} clips, {} frames{})",
                seq.label(),
                seq.clips.len(),
                frames,
                if seq.clips.iter().any(|c| c.root_motion.is_some()) {
                    ", root motion"
                } else {
                    ""
                }
            ),
        }
    }
}
