//! Batch model decoding
//!
//! Models are parsed in parallel on a fixed-size worker pool. Once every
//! model and its side buffers are resident, a second parallel pass decodes
//! animations.
//!
//! Side buffers are found next to the model by extension:
//!
//! | Extension  | Buffer                          |
//! |------------|---------------------------------|
//! | `.vg`      | vertex group block              |
//! | `.hwdata`  | hardware data (per-LOD groups)  |
//! | `.vtx` `.vvd` `.vvc` `.vvw` | legacy vertex files |
//! | `.stream`  | streamed animation sections     |
//! | `.animdata`| anim-data asset                 |

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::compression::{CompressedBlock, Decompressors};
use crate::config::DecodeOptions;
use crate::error::{Error, Result};
use crate::formats::studio::{ExternalBuffers, LegacyVertexFiles, ModelSources, StudioModel, StudioVersion};
use crate::utils::ScratchPool;

/// Model file extensions picked up by [`find_model_files`].
pub const MODEL_EXTENSIONS: &[&str] = &["mdl", "rmdl"];

/// Batch phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Parsing,
    Animating,
}

/// Progress update for a batch decode
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub phase: BatchPhase,
    pub current: usize,
    pub total: usize,
    pub file: String,
}

/// A successfully decoded model.
#[derive(Debug, Clone)]
pub struct DecodedAsset {
    pub path: PathBuf,
    pub model: StudioModel,
}

/// Result of a batch decode
#[derive(Debug, Default)]
pub struct BatchResult {
    pub decoded: Vec<DecodedAsset>,
    /// Failed models and the reason.
    pub failures: Vec<(PathBuf, String)>,
}

impl BatchResult {
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.decoded.len()
    }

    #[must_use]
    pub fn fail_count(&self) -> usize {
        self.failures.len()
    }
}

/// Animation buffers kept until the second pass.
#[derive(Debug, Default)]
struct SideBuffers {
    streamed: Option<Vec<u8>>,
    anim_data: Option<Vec<u8>>,
}

impl SideBuffers {
    fn external(&self) -> ExternalBuffers<'_> {
        ExternalBuffers {
            streamed: self.streamed.as_deref(),
            anim_data: self.anim_data.as_deref(),
        }
    }
}

/// Find all model files in a directory recursively
///
/// Returns a sorted list.
pub fn find_model_files<P: AsRef<Path>>(dir: P) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| {
            e.path().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| MODEL_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    files.sort();
    files
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

fn read_sidecar(model: &Path, extension: &str) -> Result<Option<Vec<u8>>> {
    let path = model.with_extension(extension);
    if path.is_file() {
        read_file(&path).map(Some)
    } else {
        Ok(None)
    }
}

/// Load a model and the vertex buffers stored beside it.
///
/// # Errors
/// Returns [`Error::FileRead`] if any present file cannot be read.
pub fn load_sources(path: &Path) -> Result<ModelSources> {
    let name = path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let mut sources = ModelSources::new(name, read_file(path)?);

    if let Some(vg) = read_sidecar(path, "vg")? {
        sources = sources.with_vertex_group(CompressedBlock::raw(vg));
    }
    if let Some(hw) = read_sidecar(path, "hwdata")? {
        sources = sources.with_hardware_data(hw);
    }
    if let (Some(vtx), Some(vvd)) = (read_sidecar(path, "vtx")?, read_sidecar(path, "vvd")?) {
        sources = sources.with_legacy(LegacyVertexFiles {
            vtx,
            vvd,
            vvc: read_sidecar(path, "vvc")?,
            vvw: read_sidecar(path, "vvw")?,
        });
    }
    Ok(sources)
}

fn load_side_buffers(path: &Path) -> Result<SideBuffers> {
    Ok(SideBuffers {
        streamed: read_sidecar(path, "stream")?,
        anim_data: read_sidecar(path, "animdata")?,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

fn decode_one(
    path: &Path,
    version: StudioVersion,
    options: &DecodeOptions,
    pool: &ScratchPool,
    decompressors: &Decompressors,
) -> Result<(StudioModel, SideBuffers)> {
    let sources = load_sources(path)?;
    let side = load_side_buffers(path)?;
    let model = StudioModel::parse(sources, version, options, pool, decompressors)?;
    Ok((model, side))
}

/// Decode many models of one revision in parallel
///
/// # Arguments
/// * `files` - Model files to decode
/// * `version` - Revision shared by every model
/// * `options` - Decode options; `worker_threads` sizes the pool
/// * `decompressors` - Block decompressors for compressed vertex data
/// * `progress` - Callback for progress updates
///
/// # Errors
/// Returns [`Error::ThreadPool`] if the worker pool cannot be built.
/// Per-model failures are collected in [`BatchResult::failures`].
pub fn batch_decode<F>(
    files: &[PathBuf],
    version: StudioVersion,
    options: &DecodeOptions,
    decompressors: &Decompressors,
    progress: F,
) -> Result<BatchResult>
where
    F: Fn(&BatchProgress) + Send + Sync,
{
    let workers = rayon::ThreadPoolBuilder::new()
        .num_threads(options.worker_threads)
        .build()?;
    let pool = options.scratch_pool();
    let total = files.len();
    let processed = AtomicUsize::new(0);

    let parsed: Vec<(PathBuf, Result<(StudioModel, SideBuffers)>)> = workers.install(|| {
        files
            .par_iter()
            .map(|path| {
                let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
                progress(&BatchProgress {
                    phase: BatchPhase::Parsing,
                    current,
                    total,
                    file: display_name(path),
                });
                (path.clone(), decode_one(path, version, options, &pool, decompressors))
            })
            .collect()
    });

    let mut result = BatchResult::default();
    let mut loaded = Vec::with_capacity(parsed.len());
    for (path, outcome) in parsed {
        match outcome {
            Ok(entry) => loaded.push((path, entry)),
            Err(e) => {
                tracing::warn!(asset = %path.display(), "Failed to decode model: {}", e);
                result.failures.push((path, e.to_string()));
            }
        }
    }

    if options.decode_animations {
        let animated = AtomicUsize::new(0);
        let count = loaded.len();
        workers.install(|| {
            loaded.par_iter_mut().for_each(|(path, (model, side))| {
                let current = animated.fetch_add(1, Ordering::SeqCst) + 1;
                progress(&BatchProgress {
                    phase: BatchPhase::Animating,
                    current,
                    total: count,
                    file: display_name(path),
                });
                model.decode_animations(&side.external(), options);
            });
        });
    }

    result.decoded = loaded
        .into_iter()
        .map(|(path, (model, _))| DecodedAsset { path, model })
        .collect();

    tracing::info!(
        decoded = result.success_count(),
        failed = result.fail_count(),
        "Batch decode finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_find_model_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.rmdl"), b"x").unwrap();
        std::fs::write(dir.path().join("sub/a.MDL"), b"x").unwrap();
        std::fs::write(dir.path().join("b.vg"), b"x").unwrap();

        let files = find_model_files(dir.path());
        assert_eq!(files, vec![dir.path().join("b.rmdl"), dir.path().join("sub/a.MDL")]);
    }

    #[test]
    fn test_sidecars_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("crate.rmdl");
        std::fs::write(&model, [1u8, 2]).unwrap();
        std::fs::write(dir.path().join("crate.vg"), [3u8]).unwrap();
        std::fs::write(dir.path().join("crate.vtx"), [4u8]).unwrap();

        let sources = load_sources(&model).unwrap();
        assert_eq!(sources.name, "crate");
        assert_eq!(sources.model, vec![1, 2]);
        assert_eq!(sources.vertex_group, Some(CompressedBlock::raw(vec![3])));
        // vtx without vvd is not a usable legacy set
        assert!(sources.legacy.is_none());
        assert!(sources.hardware_data.is_none());
    }

    #[test]
    fn test_failures_collected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("short.rmdl"), [0u8; 4]).unwrap();
        let files = find_model_files(dir.path());
        let seen = AtomicUsize::new(0);

        let result = batch_decode(
            &files,
            StudioVersion::V10,
            &DecodeOptions::default().with_worker_threads(2).with_scratch(1, 64),
            &Decompressors::new(),
            |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();
        assert_eq!(result.success_count(), 0);
        assert_eq!(result.fail_count(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
