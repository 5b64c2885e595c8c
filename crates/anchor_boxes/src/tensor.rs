use ndarray::{Array2, Array4, Array5, ArrayView4, s};

use crate::format::BoxFormat;

/// Number of values stored per anchor, four coordinates followed by four variances.
pub const ANCHOR_CHANNELS: usize = 8;

/// The anchors of a single feature grid.
///
/// Indexed as `[row, column, box, channel]`. Channels `0..4` hold the box coordinates in
/// [`AnchorTensor::format`], channels `4..8` hold the variances, which are the same for
/// every anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorTensor {
    data: Array4<f64>,
    format: BoxFormat,
}

impl AnchorTensor {
    pub(crate) fn new(data: Array4<f64>, format: BoxFormat) -> Self {
        debug_assert_eq!(data.dim().3, ANCHOR_CHANNELS);
        Self { data, format }
    }

    /// The shape of the tensor, `(grid_height, grid_width, n_boxes, 8)`.
    #[must_use]
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    #[must_use]
    pub fn grid_height(&self) -> usize {
        self.data.dim().0
    }

    #[must_use]
    pub fn grid_width(&self) -> usize {
        self.data.dim().1
    }

    #[must_use]
    pub fn n_boxes(&self) -> usize {
        self.data.dim().2
    }

    /// Total number of anchors, over all cells and boxes.
    #[must_use]
    pub fn num_anchors(&self) -> usize {
        self.grid_height() * self.grid_width() * self.n_boxes()
    }

    /// The coordinate format of the box channels.
    #[must_use]
    pub fn format(&self) -> BoxFormat {
        self.format
    }

    /// View of the full tensor, coordinates and variances.
    #[must_use]
    pub fn view(&self) -> ArrayView4<'_, f64> {
        self.data.view()
    }

    /// View of the four box coordinate channels.
    #[must_use]
    pub fn boxes(&self) -> ArrayView4<'_, f64> {
        self.data.slice(s![.., .., .., ..4])
    }

    /// View of the four variance channels.
    #[must_use]
    pub fn variances(&self) -> ArrayView4<'_, f64> {
        self.data.slice(s![.., .., .., 4..])
    }

    #[must_use]
    pub fn into_inner(self) -> Array4<f64> {
        self.data
    }

    /// Flatten the anchors into `(num_anchors, 8)` rows.
    ///
    /// Rows are ordered by row, then column, then box, which is the order the anchors of
    /// multiple grids are concatenated in.
    #[must_use]
    pub fn flatten(&self) -> Array2<f64> {
        let (_, grid_width, n_boxes, _) = self.data.dim();

        Array2::from_shape_fn((self.num_anchors(), ANCHOR_CHANNELS), |(anchor, channel)| {
            let index = anchor % n_boxes;
            let col = (anchor / n_boxes) % grid_width;
            let row = anchor / (n_boxes * grid_width);
            self.data[[row, col, index, channel]]
        })
    }

    /// Replicate the anchors for every item in a batch.
    ///
    /// The result has shape `(batch_size, grid_height, grid_width, n_boxes, 8)` and is stored
    /// as `f32`, like the rest of the network output.
    #[must_use]
    pub fn batched(&self, batch_size: usize) -> Array5<f32> {
        let (grid_height, grid_width, n_boxes, channels) = self.data.dim();

        Array5::from_shape_fn(
            (batch_size, grid_height, grid_width, n_boxes, channels),
            |(_, row, col, index, channel)| self.data[[row, col, index, channel]] as f32,
        )
    }
}
