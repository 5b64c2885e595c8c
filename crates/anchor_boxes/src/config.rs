//! Configuration of a single anchor grid, and loading configurations from TOML files.
//!
//! Configurations come in two flavours: the raw [`AnchorGridParams`], which can be
//! deserialized or filled in by hand, and the validated [`AnchorGridConfig`], which is
//! immutable and can only be obtained through [`AnchorGridConfig::new`].

use std::path::Path;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::{Error, Result},
    format::BoxFormat,
};

/// A configuration that can be loaded from a TOML file.
pub trait Config: DeserializeOwned {
    /// File name of the configuration, relative to a configuration directory.
    const PATH: &'static str;

    /// Load the configuration from [`Self::PATH`] inside `dir`.
    fn load(dir: impl AsRef<Path>) -> Result<Self> {
        Self::load_file(dir.as_ref().join(Self::PATH))
    }

    /// Load the configuration from the file at `path`.
    fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;

        tracing::debug!("loaded anchor configuration from `{}`", path.display());

        Self::from_toml_str(&contents)
    }

    /// Parse the configuration from a TOML string.
    fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

/// A value given either once for both axes, or as a `(height, width)` pair.
///
/// This is the unvalidated form used in [`AnchorGridParams`], a sequence of any length
/// deserializes fine and is only rejected when the config is validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarOrPair {
    Scalar(f64),
    Sequence(Vec<f64>),
}

impl From<f64> for ScalarOrPair {
    fn from(value: f64) -> Self {
        ScalarOrPair::Scalar(value)
    }
}

impl From<(f64, f64)> for ScalarOrPair {
    fn from((height, width): (f64, f64)) -> Self {
        ScalarOrPair::Sequence(vec![height, width])
    }
}

impl From<[f64; 2]> for ScalarOrPair {
    fn from(value: [f64; 2]) -> Self {
        ScalarOrPair::Sequence(value.to_vec())
    }
}

impl ScalarOrPair {
    /// Validate the arity, returning the number of values on failure.
    fn validate(&self) -> std::result::Result<AxisPair, usize> {
        match self {
            ScalarOrPair::Scalar(value) => Ok(AxisPair::Uniform(*value)),
            ScalarOrPair::Sequence(values) => match values.as_slice() {
                [height, width] => Ok(AxisPair::Split {
                    height: *height,
                    width: *width,
                }),
                values => Err(values.len()),
            },
        }
    }
}

/// A validated value for the vertical and horizontal axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AxisPair {
    /// The same value for both axes.
    Uniform(f64),
    /// Separate values for both axes.
    Split { height: f64, width: f64 },
}

impl AxisPair {
    /// The `(height, width)` values.
    #[must_use]
    pub const fn split(self) -> (f64, f64) {
        match self {
            AxisPair::Uniform(value) => (value, value),
            AxisPair::Split { height, width } => (height, width),
        }
    }
}

/// Distance in pixels between the centers of neighbouring anchors.
pub type Step = AxisPair;

/// Position of the first anchor center, as a fraction of the [`Step`].
pub type Offset = AxisPair;

fn default_aspect_ratios() -> Vec<f64> {
    vec![0.5, 1.0, 2.0]
}

const fn default_two_boxes_for_ar1() -> bool {
    true
}

fn default_variances() -> Vec<f64> {
    vec![0.1, 0.1, 0.2, 0.2]
}

pub(crate) fn default_coords() -> String {
    BoxFormat::Centroids.to_string()
}

/// Unvalidated parameters for a single anchor grid.
///
/// ```
/// use anchor_boxes::config::{AnchorGridConfig, AnchorGridParams};
///
/// let params = AnchorGridParams {
///     aspect_ratios: vec![1.0, 2.0],
///     ..AnchorGridParams::new(300, 300, 0.2, 0.34)
/// };
/// let config = AnchorGridConfig::new(params).unwrap();
///
/// assert_eq!(config.n_boxes(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnchorGridParams {
    /// Height of the input images in pixels.
    pub image_height: i64,
    /// Width of the input images in pixels.
    pub image_width: i64,
    /// Size of the anchors as a fraction of the shorter image side.
    pub this_scale: f64,
    /// The next larger scale, used for the second box of aspect ratio 1.
    pub next_scale: f64,
    /// Width to height ratios of the anchors, in the order the boxes are emitted.
    #[serde(default = "default_aspect_ratios")]
    pub aspect_ratios: Vec<f64>,
    /// Whether to emit a second, larger box for aspect ratio 1.
    #[serde(default = "default_two_boxes_for_ar1")]
    pub two_boxes_for_ar1: bool,
    #[serde(default)]
    pub step: Option<ScalarOrPair>,
    #[serde(default)]
    pub offset: Option<ScalarOrPair>,
    #[serde(default)]
    pub clip_boxes: bool,
    #[serde(default = "default_variances")]
    pub variances: Vec<f64>,
    /// One of `centroids`, `corners` or `minmax`.
    #[serde(default = "default_coords")]
    pub coords: String,
    #[serde(default)]
    pub normalize_coords: bool,
}

impl AnchorGridParams {
    /// Parameters for the given image size and scales, with defaults for everything else.
    #[must_use]
    pub fn new(image_height: i64, image_width: i64, this_scale: f64, next_scale: f64) -> Self {
        Self {
            image_height,
            image_width,
            this_scale,
            next_scale,
            aspect_ratios: default_aspect_ratios(),
            two_boxes_for_ar1: default_two_boxes_for_ar1(),
            step: None,
            offset: None,
            clip_boxes: false,
            variances: default_variances(),
            coords: default_coords(),
            normalize_coords: false,
        }
    }
}

impl Config for AnchorGridParams {
    const PATH: &'static str = "anchor_grid.toml";
}

/// Validated, immutable configuration of a single anchor grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorGridConfig {
    image_height: u32,
    image_width: u32,
    this_scale: f64,
    next_scale: f64,
    aspect_ratios: Vec<f64>,
    two_boxes_for_ar1: bool,
    step: Option<Step>,
    offset: Option<Offset>,
    clip_boxes: bool,
    variances: [f64; 4],
    coords: BoxFormat,
    normalize_coords: bool,
}

impl AnchorGridConfig {
    /// Validate `params`.
    ///
    /// `this_scale <= next_scale` is expected, but not enforced.
    pub fn new(params: AnchorGridParams) -> Result<Self> {
        let image_size_error = || Error::ImageSize {
            height: params.image_height,
            width: params.image_width,
        };
        let image_height = u32::try_from(params.image_height)
            .ok()
            .filter(|&height| height > 0)
            .ok_or_else(image_size_error)?;
        let image_width = u32::try_from(params.image_width)
            .ok()
            .filter(|&width| width > 0)
            .ok_or_else(image_size_error)?;

        if !is_positive(params.this_scale) || !is_positive(params.next_scale) {
            return Err(Error::Scale {
                this: params.this_scale,
                next: params.next_scale,
            });
        }

        validate_aspect_ratios(&params.aspect_ratios)?;
        let variances = validate_variances(&params.variances)?;

        let coords = params
            .coords
            .parse::<BoxFormat>()
            .map_err(|_| Error::Coords(params.coords.clone()))?;

        let step = params
            .step
            .as_ref()
            .map(ScalarOrPair::validate)
            .transpose()
            .map_err(Error::Step)?;
        let offset = params
            .offset
            .as_ref()
            .map(ScalarOrPair::validate)
            .transpose()
            .map_err(Error::Offset)?;

        Ok(Self {
            image_height,
            image_width,
            this_scale: params.this_scale,
            next_scale: params.next_scale,
            aspect_ratios: params.aspect_ratios,
            two_boxes_for_ar1: params.two_boxes_for_ar1,
            step,
            offset,
            clip_boxes: params.clip_boxes,
            variances,
            coords,
            normalize_coords: params.normalize_coords,
        })
    }

    /// The number of anchor boxes generated for every grid cell.
    #[must_use]
    pub fn n_boxes(&self) -> usize {
        n_boxes(&self.aspect_ratios, self.two_boxes_for_ar1)
    }

    #[must_use]
    pub fn image_height(&self) -> u32 {
        self.image_height
    }

    #[must_use]
    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    #[must_use]
    pub fn this_scale(&self) -> f64 {
        self.this_scale
    }

    #[must_use]
    pub fn next_scale(&self) -> f64 {
        self.next_scale
    }

    #[must_use]
    pub fn aspect_ratios(&self) -> &[f64] {
        &self.aspect_ratios
    }

    #[must_use]
    pub fn two_boxes_for_ar1(&self) -> bool {
        self.two_boxes_for_ar1
    }

    #[must_use]
    pub fn step(&self) -> Option<Step> {
        self.step
    }

    #[must_use]
    pub fn offset(&self) -> Option<Offset> {
        self.offset
    }

    #[must_use]
    pub fn clip_boxes(&self) -> bool {
        self.clip_boxes
    }

    #[must_use]
    pub fn variances(&self) -> [f64; 4] {
        self.variances
    }

    #[must_use]
    pub fn coords(&self) -> BoxFormat {
        self.coords
    }

    #[must_use]
    pub fn normalize_coords(&self) -> bool {
        self.normalize_coords
    }
}

impl TryFrom<AnchorGridParams> for AnchorGridConfig {
    type Error = Error;

    fn try_from(params: AnchorGridParams) -> Result<Self> {
        Self::new(params)
    }
}

/// Number of boxes per cell for the given aspect ratios.
pub(crate) fn n_boxes(aspect_ratios: &[f64], two_boxes_for_ar1: bool) -> usize {
    if two_boxes_for_ar1 && aspect_ratios.contains(&1.0) {
        aspect_ratios.len() + 1
    } else {
        aspect_ratios.len()
    }
}

/// Whether `value` is a number greater than zero, NaN is not.
pub(crate) fn is_positive(value: f64) -> bool {
    value > 0.0
}

pub(crate) fn validate_aspect_ratios(aspect_ratios: &[f64]) -> Result<()> {
    if aspect_ratios.is_empty() {
        return Err(Error::EmptyAspectRatios);
    }

    if aspect_ratios.iter().any(|&ratio| !is_positive(ratio)) {
        return Err(Error::AspectRatio(aspect_ratios.to_vec()));
    }

    Ok(())
}

pub(crate) fn validate_variances(variances: &[f64]) -> Result<[f64; 4]> {
    let variances: [f64; 4] = variances
        .try_into()
        .map_err(|_| Error::VarianceCount(variances.len()))?;

    if variances.iter().any(|&variance| !is_positive(variance)) {
        return Err(Error::Variance(variances.to_vec()));
    }

    Ok(variances)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> AnchorGridParams {
        AnchorGridParams::new(300, 300, 0.2, 0.34)
    }

    #[test]
    fn defaults_are_valid() {
        let config = AnchorGridConfig::new(params()).unwrap();

        assert_eq!(config.aspect_ratios(), &[0.5, 1.0, 2.0]);
        assert_eq!(config.n_boxes(), 4);
        assert_eq!(config.variances(), [0.1, 0.1, 0.2, 0.2]);
        assert_eq!(config.coords(), BoxFormat::Centroids);
        assert_eq!(config.step(), None);
        assert_eq!(config.offset(), None);
    }

    #[test]
    fn box_count() {
        assert_eq!(n_boxes(&[1.0, 2.0], true), 3);
        assert_eq!(n_boxes(&[1.0, 2.0], false), 2);
        assert_eq!(n_boxes(&[0.5, 2.0], true), 2);
        // duplicates are allowed, but only one extra box is added
        assert_eq!(n_boxes(&[1.0, 1.0], true), 3);
    }

    #[test]
    fn rejects_image_size() {
        for (height, width) in [(0, 300), (300, -1), (i64::MAX, 300)] {
            let err = AnchorGridConfig::new(AnchorGridParams {
                image_height: height,
                image_width: width,
                ..params()
            })
            .unwrap_err();

            assert!(matches!(err, Error::ImageSize { .. }), "{err}");
        }
    }

    #[test]
    fn rejects_scales() {
        for (this, next) in [(0.0, 0.3), (0.2, -0.1), (f64::NAN, 0.3)] {
            let err = AnchorGridConfig::new(AnchorGridParams {
                this_scale: this,
                next_scale: next,
                ..params()
            })
            .unwrap_err();

            assert!(matches!(err, Error::Scale { .. }), "{err}");
            assert!(err.is_invalid_configuration());
        }
    }

    #[test]
    fn rejects_aspect_ratios() {
        let err = AnchorGridConfig::new(AnchorGridParams {
            aspect_ratios: vec![],
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, Error::EmptyAspectRatios));

        let err = AnchorGridConfig::new(AnchorGridParams {
            aspect_ratios: vec![1.0, 0.0],
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, Error::AspectRatio(_)));
    }

    #[test]
    fn rejects_variances() {
        let err = AnchorGridConfig::new(AnchorGridParams {
            variances: vec![0.1, 0.1, 0.2],
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, Error::VarianceCount(3)));

        let err = AnchorGridConfig::new(AnchorGridParams {
            variances: vec![0.1, 0.1, 0.2, -0.2],
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Variance(_)));
    }

    #[test]
    fn rejects_coords() {
        let err = AnchorGridConfig::new(AnchorGridParams {
            coords: "xywh".to_string(),
            ..params()
        })
        .unwrap_err();

        assert!(matches!(err, Error::Coords(ref coords) if coords == "xywh"));
    }

    #[test]
    fn step_and_offset_arity() {
        let config = AnchorGridConfig::new(AnchorGridParams {
            step: Some(8.0_f64.into()),
            offset: Some((0.25, 0.75).into()),
            ..params()
        })
        .unwrap();

        assert_eq!(config.step().map(AxisPair::split), Some((8.0, 8.0)));
        assert_eq!(config.offset().map(AxisPair::split), Some((0.25, 0.75)));

        let err = AnchorGridConfig::new(AnchorGridParams {
            step: Some(ScalarOrPair::Sequence(vec![8.0, 16.0, 32.0])),
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Step(3)));

        let err = AnchorGridConfig::new(AnchorGridParams {
            step: Some(ScalarOrPair::Sequence(vec![8.0])),
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Step(1)));

        let err = AnchorGridConfig::new(AnchorGridParams {
            offset: Some(ScalarOrPair::Sequence(vec![0.5])),
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Offset(1)));

        let err = AnchorGridConfig::new(AnchorGridParams {
            offset: Some(ScalarOrPair::Sequence(vec![])),
            ..params()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Offset(0)));
    }

    #[test]
    fn parse_toml() {
        let params = AnchorGridParams::from_toml_str(
            r#"
            image_height = 300
            image_width = 480
            this_scale = 0.2
            next_scale = 0.34
            aspect_ratios = [1.0, 2.0]
            step = [16, 32]
            offset = 0.5
            coords = "minmax"
            "#,
        )
        .unwrap();

        assert_eq!(params.step, Some(ScalarOrPair::Sequence(vec![16.0, 32.0])));
        assert_eq!(params.offset, Some(ScalarOrPair::Scalar(0.5)));
        assert!(params.two_boxes_for_ar1);

        let config = AnchorGridConfig::try_from(params).unwrap();
        assert_eq!(config.coords(), BoxFormat::MinMax);
        assert_eq!(config.image_width(), 480);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = AnchorGridParams::from_toml_str(
            r"
            image_height = 300
            image_width = 300
            this_scale = 0.2
            next_scale = 0.34
            scale = 0.1
            ",
        )
        .unwrap_err();

        assert!(matches!(err, Error::Deserialize(_)));
    }
}
