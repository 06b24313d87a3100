//! RsxStudio CLI binary

fn main() -> anyhow::Result<()> {
    rsxstudio::cli::run_cli()
}
