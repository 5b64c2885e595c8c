use std::path::PathBuf;

use clap::Parser;
use miette::Result;

use super::load_pyramid;

/// Print the box shapes of every detection head.
#[derive(Parser)]
#[clap(name = "shapes")]
pub struct Shapes {
    /// Path to the anchor configuration
    #[clap(short, long, default_value = "anchors.toml")]
    pub config: PathBuf,
}

impl Shapes {
    pub fn shapes(self) -> Result<()> {
        let pyramid = load_pyramid(&self.config)?;

        for (layer, head) in pyramid.heads().iter().enumerate() {
            let config = head.config();
            println!(
                "head {layer}: scale {:.4}, next scale {:.4}, {} boxes per cell",
                config.this_scale(),
                config.next_scale(),
                head.n_boxes()
            );

            for (index, shape) in head.box_shapes().iter().enumerate() {
                println!(
                    "  box {index}: {:.2} x {:.2} (w x h)",
                    shape.width, shape.height
                );
            }
        }

        Ok(())
    }
}
