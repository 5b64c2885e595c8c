//! Deterministic anchor box generation for SSD style object detectors.
//!
//! An [`AnchorGridGenerator`] places a fixed set of boxes around the center of every cell of a
//! feature grid, and an [`AnchorPyramid`] does the same for all detection heads of a network.
//! The [`convert`] module converts boxes between the supported [`BoxFormat`]s.
//!
//! ```
//! use anchor_boxes::{AnchorGridGenerator, AnchorGridParams};
//!
//! let generator = AnchorGridGenerator::from_params(AnchorGridParams {
//!     aspect_ratios: vec![1.0, 2.0],
//!     ..AnchorGridParams::new(300, 300, 0.2, 0.34)
//! })
//! .unwrap();
//!
//! let anchors = generator.generate(10, 10);
//! assert_eq!(anchors.dim(), (10, 10, 3, 8));
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod generator;
pub mod grid;
pub mod pyramid;
pub mod tensor;

pub use config::{AnchorGridConfig, AnchorGridParams, AxisPair, Config, ScalarOrPair};
pub use convert::{convert, convert_box, convert_inplace};
pub use error::{Error, Result};
pub use format::{BorderPixels, BoxFormat};
pub use generator::{AnchorGridGenerator, BoxShape};
pub use pyramid::{AnchorPyramid, AnchorPyramidParams};
pub use tensor::{ANCHOR_CHANNELS, AnchorTensor};
