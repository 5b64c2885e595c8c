use std::{io::Write, path::PathBuf};

use anchor_boxes::{AnchorTensor, BoxFormat};
use clap::{Parser, ValueEnum};
use itertools::Itertools;
use miette::{IntoDiagnostic, Result};
use ndarray::{Array2, Axis};
use serde::Serialize;

use super::{load_pyramid, output_writer, parse_grid_size};

/// File format of the exported anchors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Generate the anchors of every detection head.
///
/// Without `--output` a summary of every head is printed, otherwise the flat anchor table is
/// written to the given file.
#[derive(Parser)]
#[clap(name = "generate")]
pub struct Generate {
    /// Path to the anchor configuration
    #[clap(short, long, default_value = "anchors.toml")]
    pub config: PathBuf,

    /// Feature grid size of every head, as `HEIGHTxWIDTH`
    #[clap(short, long = "grid", num_args = 1.., required = true, value_parser = parse_grid_size)]
    pub grids: Vec<(usize, usize)>,

    /// File to write the anchors to, `-` for stdout
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Format of the exported anchors
    #[clap(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Serialize)]
struct AnchorTable {
    format: BoxFormat,
    n_boxes: Vec<usize>,
    grids: Vec<(usize, usize)>,
    anchors: Vec<Vec<f64>>,
}

impl Generate {
    pub fn generate(self) -> Result<()> {
        let pyramid = load_pyramid(&self.config)?;

        let Some(output) = self.output else {
            for (layer, tensor) in pyramid.generate(&self.grids)?.iter().enumerate() {
                print_summary(layer, tensor);
            }
            return Ok(());
        };

        let anchors = pyramid.generate_flat(&self.grids)?;
        tracing::info!(
            "writing {} anchors in {} format",
            anchors.nrows(),
            pyramid.format()
        );

        let path = (output.as_os_str() != "-").then_some(output.as_path());
        let mut writer = output_writer(path)?;

        match self.format {
            OutputFormat::Json => {
                let table = AnchorTable {
                    format: pyramid.format(),
                    n_boxes: pyramid.n_boxes(),
                    grids: self.grids,
                    anchors: anchors.outer_iter().map(|row| row.to_vec()).collect(),
                };
                serde_json::to_writer_pretty(&mut writer, &table).into_diagnostic()?;
                writeln!(writer).into_diagnostic()?;
            }
            OutputFormat::Csv => write_csv(&mut writer, pyramid.format(), &anchors)?,
        }

        writer.flush().into_diagnostic()
    }
}

fn coordinate_names(format: BoxFormat) -> [&'static str; 4] {
    match format {
        BoxFormat::Centroids => ["cx", "cy", "w", "h"],
        BoxFormat::Corners => ["xmin", "ymin", "xmax", "ymax"],
        BoxFormat::MinMax => ["xmin", "xmax", "ymin", "ymax"],
    }
}

fn write_csv(writer: &mut dyn Write, format: BoxFormat, anchors: &Array2<f64>) -> Result<()> {
    let header = coordinate_names(format)
        .into_iter()
        .chain(["var0", "var1", "var2", "var3"])
        .join(",");
    writeln!(writer, "{header}").into_diagnostic()?;

    for row in anchors.outer_iter() {
        writeln!(writer, "{}", row.iter().join(",")).into_diagnostic()?;
    }

    Ok(())
}

fn print_summary(layer: usize, tensor: &AnchorTensor) {
    let (grid_height, grid_width, n_boxes, _) = tensor.dim();
    let boxes = tensor.boxes();

    let ranges = (0..4)
        .map(|channel| {
            let values = boxes.index_axis(Axis(3), channel);
            let (min, max) = values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
                    (min.min(v), max.max(v))
                });
            format!("[{min:.2}, {max:.2}]")
        })
        .join(" ");

    println!(
        "head {layer}: {grid_height}x{grid_width} grid, {n_boxes} boxes per cell, {} anchors",
        tensor.num_anchors()
    );
    println!("  {} ranges: {ranges}", tensor.format());
}
