use ndarray::{Array1, Array4, Axis};

use crate::{
    config::{AnchorGridConfig, AnchorGridParams},
    convert::convert_inplace,
    error::Result,
    format::{BorderPixels, BoxFormat},
    grid::{linspace, meshgrid},
    tensor::AnchorTensor,
};

/// Default position of the first anchor center, as a fraction of the step size.
const DEFAULT_OFFSET: f64 = 0.5;

/// Width and height of an anchor box, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxShape {
    pub width: f64,
    pub height: f64,
}

/// Generates the anchor boxes for a single feature grid.
///
/// For every cell of the grid a fixed list of box shapes is placed around the cell center.
/// The shapes are derived from the configured scales and aspect ratios, following the SSD
/// paper:
/// - for aspect ratio 1, a square box of `this_scale` times the shorter image side, and if
///   enabled a second square box using the geometric mean of `this_scale` and `next_scale`
/// - for every other aspect ratio `r`, a box of `scale * sqrt(r)` by `scale / sqrt(r)`
///
/// The generator is immutable and can be shared between threads.
#[derive(Debug, Clone)]
pub struct AnchorGridGenerator {
    config: AnchorGridConfig,
    box_shapes: Vec<BoxShape>,
}

impl AnchorGridGenerator {
    /// Create a new [`AnchorGridGenerator`] from a validated config.
    #[must_use]
    pub fn new(config: AnchorGridConfig) -> Self {
        let box_shapes = Self::create_box_shapes(&config);

        tracing::debug!(
            n_boxes = box_shapes.len(),
            this_scale = config.this_scale(),
            next_scale = config.next_scale(),
            "created anchor grid generator with box shapes {box_shapes:?}"
        );

        Self { config, box_shapes }
    }

    /// Validate `params` and create a new [`AnchorGridGenerator`].
    pub fn from_params(params: AnchorGridParams) -> Result<Self> {
        AnchorGridConfig::new(params).map(Self::new)
    }

    /// Compute the box shapes for every aspect ratio, in the order they appear in the grid.
    fn create_box_shapes(config: &AnchorGridConfig) -> Vec<BoxShape> {
        let side = f64::from(config.image_height().min(config.image_width()));
        let this_scale = config.this_scale();

        let mut shapes = Vec::with_capacity(config.n_boxes());
        let mut second_box = config.two_boxes_for_ar1();
        for &aspect_ratio in config.aspect_ratios() {
            if aspect_ratio == 1.0 {
                let size = this_scale * side;
                shapes.push(BoxShape {
                    width: size,
                    height: size,
                });

                // only the first aspect ratio of 1 gets a second box
                if std::mem::take(&mut second_box) {
                    // slightly larger box, using the geometric mean of this and the next scale
                    let size = (this_scale * config.next_scale()).sqrt() * side;
                    shapes.push(BoxShape {
                        width: size,
                        height: size,
                    });
                }
            } else {
                let sqrt_ar = aspect_ratio.sqrt();
                shapes.push(BoxShape {
                    width: this_scale * side * sqrt_ar,
                    height: this_scale * side / sqrt_ar,
                });
            }
        }

        shapes
    }

    #[must_use]
    pub fn config(&self) -> &AnchorGridConfig {
        &self.config
    }

    /// The number of boxes generated for every grid cell.
    #[must_use]
    pub fn n_boxes(&self) -> usize {
        self.box_shapes.len()
    }

    /// The box shapes generated for every grid cell, in order.
    #[must_use]
    pub fn box_shapes(&self) -> &[BoxShape] {
        &self.box_shapes
    }

    /// The `(height, width)` distance in pixels between neighbouring anchor centers.
    ///
    /// Without a configured step, the grid is assumed to tile the image exactly.
    #[must_use]
    pub fn steps(&self, grid_height: usize, grid_width: usize) -> (f64, f64) {
        match self.config.step() {
            Some(step) => step.split(),
            None => (
                f64::from(self.config.image_height()) / grid_height as f64,
                f64::from(self.config.image_width()) / grid_width as f64,
            ),
        }
    }

    /// The `(height, width)` offset of the first anchor center, as a fraction of the step.
    #[must_use]
    pub fn offsets(&self) -> (f64, f64) {
        self.config
            .offset()
            .map_or((DEFAULT_OFFSET, DEFAULT_OFFSET), |offset| offset.split())
    }

    /// The `(row, column)` center coordinates of the grid cells, in pixels.
    #[must_use]
    pub fn centers(&self, grid_height: usize, grid_width: usize) -> (Array1<f64>, Array1<f64>) {
        let (step_height, step_width) = self.steps(grid_height, grid_width);
        let (offset_height, offset_width) = self.offsets();

        let center_y = linspace(
            offset_height * step_height,
            (offset_height + grid_height as f64 - 1.0) * step_height,
            grid_height,
        );
        let center_x = linspace(
            offset_width * step_width,
            (offset_width + grid_width as f64 - 1.0) * step_width,
            grid_width,
        );

        (center_y, center_x)
    }

    /// Generate the anchors for a feature grid of the given size.
    ///
    /// The result has shape `(grid_height, grid_width, n_boxes, 8)`, where the last axis holds
    /// the box coordinates in the configured format followed by the four variances.
    ///
    /// Grid dimensions are expected to be positive.
    #[must_use]
    pub fn generate(&self, grid_height: usize, grid_width: usize) -> AnchorTensor {
        let _span = tracing::debug_span!("generate_anchors", grid_height, grid_width).entered();

        let (center_y, center_x) = self.centers(grid_height, grid_width);
        tracing::debug!(
            steps = ?self.steps(grid_height, grid_width),
            offsets = ?self.offsets(),
            "placing {} boxes per cell",
            self.n_boxes()
        );

        let (center_x_grid, center_y_grid) = meshgrid(&center_x, &center_y);

        // every cell gets every box shape, in cx, cy, w, h format
        let mut boxes = Array4::from_shape_fn(
            (grid_height, grid_width, self.n_boxes(), 4),
            |(row, col, index, channel)| match channel {
                0 => center_x_grid[[row, col]],
                1 => center_y_grid[[row, col]],
                2 => self.box_shapes[index].width,
                _ => self.box_shapes[index].height,
            },
        );

        // limits are applied in corner format
        convert_inplace(
            boxes.view_mut(),
            BoxFormat::Centroids,
            BoxFormat::Corners,
            BorderPixels::Half,
        );

        let image_width = f64::from(self.config.image_width());
        let image_height = f64::from(self.config.image_height());
        let x_channels = BoxFormat::Corners.x_channels();
        let y_channels = BoxFormat::Corners.y_channels();

        if self.config.clip_boxes() {
            for mut anchor in boxes.lanes_mut(Axis(3)) {
                for channel in x_channels {
                    anchor[channel] = clip_coordinate(anchor[channel], image_width);
                }
                for channel in y_channels {
                    anchor[channel] = clip_coordinate(anchor[channel], image_height);
                }
            }
        }

        if self.config.normalize_coords() {
            for mut anchor in boxes.lanes_mut(Axis(3)) {
                for channel in x_channels {
                    anchor[channel] /= image_width;
                }
                for channel in y_channels {
                    anchor[channel] /= image_height;
                }
            }
        }

        let coords = self.config.coords();
        convert_inplace(
            boxes.view_mut(),
            BoxFormat::Corners,
            coords,
            BorderPixels::Half,
        );

        let variances = self.config.variances();
        let anchors = Array4::from_shape_fn(
            (grid_height, grid_width, self.n_boxes(), 8),
            |(row, col, index, channel)| {
                if channel < 4 {
                    boxes[[row, col, index, channel]]
                } else {
                    variances[channel - 4]
                }
            },
        );

        tracing::trace!(
            clip_boxes = self.config.clip_boxes(),
            normalize_coords = self.config.normalize_coords(),
            "generated {} anchors in {coords} format",
            grid_height * grid_width * self.n_boxes()
        );

        AnchorTensor::new(anchors, coords)
    }
}

/// Clip a coordinate to `[0, bound - 1]`.
///
/// Values at or beyond `bound` saturate one pixel short of it, negative values become zero.
fn clip_coordinate(value: f64, bound: f64) -> f64 {
    if value >= bound {
        bound - 1.0
    } else if value < 0.0 {
        0.0
    } else {
        value
    }
}
