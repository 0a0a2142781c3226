//! scene2gltf command-line binary

fn main() -> anyhow::Result<()> {
    scene2gltf::cli::run_cli()
}
