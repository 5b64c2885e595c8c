//! See [`Error`].

use miette::Diagnostic;
use thiserror::Error;

/// Type alias for [`Result<T, Error>`].
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for this crate.
///
/// Every variant except [`Error::Io`], [`Error::Deserialize`] and [`Error::GridCount`]
/// describes an invalid configuration, and is only ever returned while constructing a
/// validated config. Generating anchors from a validated config cannot fail.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("`image_height` and `image_width` must be greater than 0, but got {height}x{width}")]
    #[diagnostic(code(anchor_boxes::config::image_size))]
    ImageSize { height: i64, width: i64 },

    #[error("`this_scale` and `next_scale` must be > 0, but `this_scale` == {this}, `next_scale` == {next}")]
    #[diagnostic(code(anchor_boxes::config::scale))]
    Scale { this: f64, next: f64 },

    #[error("aspect ratios must not be empty")]
    #[diagnostic(code(anchor_boxes::config::aspect_ratios))]
    EmptyAspectRatios,

    #[error("all aspect ratios must be greater than zero, but the aspect ratios given are {0:?}")]
    #[diagnostic(code(anchor_boxes::config::aspect_ratios))]
    AspectRatio(Vec<f64>),

    #[error("4 variance values must be passed, but {0} values were received")]
    #[diagnostic(code(anchor_boxes::config::variances))]
    VarianceCount(usize),

    #[error("all variances must be > 0, but the variances given are {0:?}")]
    #[diagnostic(code(anchor_boxes::config::variances))]
    Variance(Vec<f64>),

    #[error("unexpected value `{0}` for `coords`")]
    #[diagnostic(
        code(anchor_boxes::config::coords),
        help("supported values are 'minmax', 'corners' and 'centroids'")
    )]
    Coords(String),

    #[error("`step` must be a single number or a pair of numbers, but {0} values were given")]
    #[diagnostic(code(anchor_boxes::config::step))]
    Step(usize),

    #[error("`offset` must be a single number or a pair of numbers, but {0} values were given")]
    #[diagnostic(code(anchor_boxes::config::offset))]
    Offset(usize),

    #[error("`n_predictor_layers` must be greater than 0")]
    #[diagnostic(code(anchor_boxes::config::n_predictor_layers))]
    PredictorLayers,

    #[error("either `min_scale` and `max_scale` or `scales` need to be specified")]
    #[diagnostic(code(anchor_boxes::config::scales))]
    MissingScales,

    #[error("it must be 0 < min_scale <= max_scale, but min_scale = {min} and max_scale = {max}")]
    #[diagnostic(code(anchor_boxes::config::scales))]
    ScaleRange { min: f64, max: f64 },

    #[error("`scales` must contain {expected} values (one per predictor layer plus one), but has {actual}")]
    #[diagnostic(code(anchor_boxes::config::scales))]
    ScaleCount { expected: usize, actual: usize },

    #[error("all values in `scales` must be greater than 0, but the scales given are {0:?}")]
    #[diagnostic(code(anchor_boxes::config::scales))]
    Scales(Vec<f64>),

    #[error("`{name}` must have one entry per predictor layer ({expected}), but has {actual}")]
    #[diagnostic(code(anchor_boxes::config::per_layer))]
    PerLayerCount {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("expected one grid size per anchor head ({expected}), but got {actual}")]
    #[diagnostic(code(anchor_boxes::pyramid::grid_count))]
    GridCount { expected: usize, actual: usize },

    /// IO error, this wraps a [`std::io::Error`]
    #[error("failed to read anchor configuration `{path}`")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Deserialize error, this wraps a [`toml::de::Error`]
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error was caused by an invalid anchor configuration.
    #[must_use]
    pub fn is_invalid_configuration(&self) -> bool {
        !matches!(
            self,
            Error::Io { .. } | Error::Deserialize(_) | Error::GridCount { .. }
        )
    }
}
