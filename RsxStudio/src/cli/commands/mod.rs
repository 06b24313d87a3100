use clap::Subcommand;
use std::path::PathBuf;

use crate::formats::studio::StudioVersion;

pub mod batch;
pub mod inspect;

#[derive(Subcommand)]
pub enum Commands {
    /// Decode one model and print its contents
    Inspect {
        /// Model file
        #[arg(short, long)]
        model: PathBuf,

        /// Model revision (r1, r2, v8 ... v19.1)
        #[arg(short, long)]
        version: StudioVersion,

        /// Vertex group file (v8 to v15)
        #[arg(long)]
        vg: Option<PathBuf>,

        /// Hardware data file (v16 and later)
        #[arg(long)]
        hwdata: Option<PathBuf>,

        /// Legacy vertex topology file (r1, r2)
        #[arg(long, requires = "vvd")]
        vtx: Option<PathBuf>,

        /// Legacy vertex data file (r1, r2)
        #[arg(long, requires = "vtx")]
        vvd: Option<PathBuf>,

        /// Legacy vertex color file
        #[arg(long)]
        vvc: Option<PathBuf>,

        /// Legacy extra weight file
        #[arg(long)]
        vvw: Option<PathBuf>,

        /// Streamed animation sections
        #[arg(long)]
        stream: Option<PathBuf>,

        /// Anim-data asset
        #[arg(long)]
        anim_data: Option<PathBuf>,

        /// Decode options file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode every model under a directory
    Batch {
        /// Directory to search for models
        #[arg(short, long)]
        dir: PathBuf,

        /// Model revision shared by every model
        #[arg(short, long)]
        version: StudioVersion,

        /// Decode options file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Suppress progress bar
        #[arg(short, long)]
        quiet: bool,
    },
}

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Inspect {
                model,
                version,
                vg,
                hwdata,
                vtx,
                vvd,
                vvc,
                vvw,
                stream,
                anim_data,
                config,
                json,
            } => inspect::execute(&inspect::InspectArgs {
                model,
                version: *version,
                vg: vg.as_deref(),
                hwdata: hwdata.as_deref(),
                vtx: vtx.as_deref(),
                vvd: vvd.as_deref(),
                vvc: vvc.as_deref(),
                vvw: vvw.as_deref(),
                stream: stream.as_deref(),
                anim_data: anim_data.as_deref(),
                config: config.as_deref(),
                json: *json,
            }),
            Commands::Batch {
                dir,
                version,
                config,
                quiet,
            } => batch::execute(dir, *version, config.as_deref(), *quiet),
        }
    }
}
