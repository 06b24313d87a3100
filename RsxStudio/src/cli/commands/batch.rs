//! Batch command

use std::path::Path;
use std::time::Instant;

use crate::batch::{BatchPhase, batch_decode, find_model_files};
use crate::cli::commands::inspect::load_options;
use crate::cli::progress::{CUBE, FILM, LOOKING_GLASS, print_done, print_step, simple_bar};
use crate::compression::Decompressors;
use crate::formats::studio::StudioVersion;

/// Decode every model under `dir`.
///
/// # Errors
/// Returns an error if the options cannot be loaded or the worker pool
/// cannot be built. Failed models are reported, not returned as errors.
pub fn execute(dir: &Path, version: StudioVersion, config: Option<&Path>, quiet: bool) -> anyhow::Result<()> {
    let start = Instant::now();
    let options = load_options(config)?;

    print_step(1, 3, LOOKING_GLASS, &format!("Scanning {}...", dir.display()));
    let files = find_model_files(dir);
    if files.is_empty() {
        println!("No model files found");
        return Ok(());
    }

    print_step(2, 3, CUBE, &format!("Decoding {} models...", files.len()));
    let bar = simple_bar(files.len() as u64, "Models    ", quiet);
    let result = batch_decode(&files, version, &options, &Decompressors::new(), |p| {
        if p.phase == BatchPhase::Animating {
            bar.set_prefix("Animations");
        }
        bar.set_length(p.total as u64);
        bar.set_position(p.current as u64);
        bar.set_message(p.file.clone());
    })?;
    bar.finish_and_clear();

    if options.decode_animations {
        print_step(3, 3, FILM, "Decoded animations");
    }

    let sequences: usize = result.decoded.iter().map(|a| a.model.sequences.len()).sum();
    let skipped: usize = result
        .decoded
        .iter()
        .map(|a| a.model.sequences.iter().filter(|s| s.skipped.is_some()).count())
        .sum();
    println!(
        "Decoded {} models ({} sequences, {} skipped), {} failed",
        result.success_count(),
        sequences,
        skipped,
        result.fail_count()
    );
    for (path, reason) in &result.failures {
        println!("  Failed {}: {reason}", path.display());
    }

    print_done(start.elapsed());
    Ok(())
}
