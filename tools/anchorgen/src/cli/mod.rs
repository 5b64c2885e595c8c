use std::path::Path;

use anchor_boxes::{AnchorPyramid, AnchorPyramidParams, Config};
use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};

pub mod generate;
pub mod shapes;

/// `anchorgen` - Inspect and export the anchor boxes of a detector
///
/// The anchors are described by a TOML file with the parameters of every detection head.
///
/// # Inspecting the box shapes
/// ```sh
/// anchorgen shapes --config anchors.toml
/// ```
///
/// # Exporting the anchors
/// Anchors depend on the size of the feature grids, one `HEIGHTxWIDTH` per head:
/// ```sh
/// anchorgen generate --config anchors.toml --grid 38x38 19x19 10x10 5x5 --output anchors.json
/// ```
///
/// Set `RUST_LOG=debug` to see how the anchors are built.
#[derive(Parser)]
#[clap(name = "anchorgen", version)]
pub struct Cli {
    #[clap(subcommand)]
    pub action: Commands,
}

/// All possible commands for the cli, used for clap derive macros.
#[derive(Parser)]
pub enum Commands {
    Shapes(shapes::Shapes),
    Generate(generate::Generate),
}

/// Load the anchor configuration at `path` and build the generators of all heads.
pub fn load_pyramid(path: &Path) -> Result<AnchorPyramid> {
    let params = AnchorPyramidParams::load_file(path)
        .wrap_err_with(|| format!("failed to load `{}`", path.display()))?;

    AnchorPyramid::new(params).wrap_err("invalid anchor configuration")
}

/// Parse a feature grid size given as `HEIGHTxWIDTH`.
pub fn parse_grid_size(value: &str) -> std::result::Result<(usize, usize), String> {
    let (height, width) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected `HEIGHTxWIDTH`, got `{value}`"))?;

    let parse = |dim: &str| {
        dim.trim()
            .parse::<usize>()
            .ok()
            .filter(|&dim| dim > 0)
            .ok_or_else(|| format!("`{dim}` is not a positive integer"))
    };

    Ok((parse(height)?, parse(width)?))
}

/// Create the file at `path`, or use stdout if there is none.
pub(crate) fn output_writer(path: Option<&Path>) -> Result<Box<dyn std::io::Write>> {
    match path {
        Some(path) => {
            let file = std::fs::File::create(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to create `{}`", path.display()))?;
            Ok(Box::new(std::io::BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_sizes() {
        assert_eq!(parse_grid_size("38x38"), Ok((38, 38)));
        assert_eq!(parse_grid_size("10X20"), Ok((10, 20)));
        assert!(parse_grid_size("10").is_err());
        assert!(parse_grid_size("0x5").is_err());
        assert!(parse_grid_size("ax5").is_err());
    }

    #[test]
    fn cli_is_valid() {
        use clap::CommandFactory;

        Cli::command().debug_assert();
    }
}
