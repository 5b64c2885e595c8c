//! Anchors for all detection heads of a multi-scale detector.
//!
//! A detector predicts boxes from several feature grids of decreasing resolution. Each grid
//! gets its own [`AnchorGridGenerator`], with scales growing from the finest to the coarsest
//! grid. The anchors of all heads are concatenated into a single flat list per image.

use itertools::Itertools;
use ndarray::{Array2, Array3, s};
use serde::{Deserialize, Serialize};

use crate::{
    config::{
        AnchorGridConfig, AnchorGridParams, Config, ScalarOrPair, default_coords, is_positive,
        validate_aspect_ratios,
    },
    error::{Error, Result},
    format::BoxFormat,
    generator::AnchorGridGenerator,
    grid::linspace,
    tensor::{ANCHOR_CHANNELS, AnchorTensor},
};

const fn default_predictor_layers() -> usize {
    4
}

#[allow(clippy::unnecessary_wraps)]
const fn default_min_scale() -> Option<f64> {
    Some(0.1)
}

#[allow(clippy::unnecessary_wraps)]
const fn default_max_scale() -> Option<f64> {
    Some(0.9)
}

fn default_aspect_ratios() -> Vec<f64> {
    vec![0.5, 1.0, 2.0]
}

const fn default_two_boxes_for_ar1() -> bool {
    true
}

fn default_variances() -> Vec<f64> {
    vec![1.0; 4]
}

/// Unvalidated parameters for the anchors of all detection heads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnchorPyramidParams {
    pub image_height: i64,
    pub image_width: i64,
    /// Number of detection heads.
    #[serde(default = "default_predictor_layers")]
    pub n_predictor_layers: usize,
    /// Scale of the finest head, ignored if `scales` is set.
    #[serde(default = "default_min_scale")]
    pub min_scale: Option<f64>,
    /// Scale of the coarsest head, ignored if `scales` is set.
    ///
    /// The scales of the heads in between are linearly interpolated.
    #[serde(default = "default_max_scale")]
    pub max_scale: Option<f64>,
    /// Explicit scale per head, plus one extra scale used as `next_scale` of the last head.
    #[serde(default)]
    pub scales: Option<Vec<f64>>,
    /// Aspect ratios used by every head, ignored if `aspect_ratios_per_layer` is set.
    #[serde(default = "default_aspect_ratios")]
    pub aspect_ratios_global: Vec<f64>,
    #[serde(default)]
    pub aspect_ratios_per_layer: Option<Vec<Vec<f64>>>,
    #[serde(default = "default_two_boxes_for_ar1")]
    pub two_boxes_for_ar1: bool,
    /// Step per head, each either a single number or a `[height, width]` pair.
    #[serde(default)]
    pub steps: Option<Vec<ScalarOrPair>>,
    /// Offset per head, each either a single number or a `[height, width]` pair.
    #[serde(default)]
    pub offsets: Option<Vec<ScalarOrPair>>,
    #[serde(default)]
    pub clip_boxes: bool,
    #[serde(default = "default_variances")]
    pub variances: Vec<f64>,
    #[serde(default = "default_coords")]
    pub coords: String,
    #[serde(default)]
    pub normalize_coords: bool,
}

impl AnchorPyramidParams {
    /// Parameters for the given image size, with defaults for everything else.
    #[must_use]
    pub fn new(image_height: i64, image_width: i64) -> Self {
        Self {
            image_height,
            image_width,
            n_predictor_layers: default_predictor_layers(),
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            scales: None,
            aspect_ratios_global: default_aspect_ratios(),
            aspect_ratios_per_layer: None,
            two_boxes_for_ar1: default_two_boxes_for_ar1(),
            steps: None,
            offsets: None,
            clip_boxes: false,
            variances: default_variances(),
            coords: default_coords(),
            normalize_coords: false,
        }
    }

    /// The scale of every head, plus the trailing `next_scale` of the last head.
    fn resolve_scales(&self) -> Result<Vec<f64>> {
        let n_layers = self.n_predictor_layers;

        if let Some(scales) = &self.scales {
            if scales.len() != n_layers + 1 {
                return Err(Error::ScaleCount {
                    expected: n_layers + 1,
                    actual: scales.len(),
                });
            }

            if scales.iter().any(|&scale| !is_positive(scale)) {
                return Err(Error::Scales(scales.clone()));
            }

            return Ok(scales.clone());
        }

        let (Some(min_scale), Some(max_scale)) = (self.min_scale, self.max_scale) else {
            return Err(Error::MissingScales);
        };

        if !is_positive(min_scale) || max_scale.is_nan() || min_scale > max_scale {
            return Err(Error::ScaleRange {
                min: min_scale,
                max: max_scale,
            });
        }

        Ok(linspace(min_scale, max_scale, n_layers + 1).to_vec())
    }

    /// The aspect ratios of every head.
    fn resolve_aspect_ratios(&self) -> Result<Vec<Vec<f64>>> {
        let n_layers = self.n_predictor_layers;

        match &self.aspect_ratios_per_layer {
            Some(per_layer) => {
                check_per_layer("aspect_ratios_per_layer", per_layer.len(), n_layers)?;
                for aspect_ratios in per_layer {
                    validate_aspect_ratios(aspect_ratios)?;
                }

                Ok(per_layer.clone())
            }
            None => {
                validate_aspect_ratios(&self.aspect_ratios_global)?;

                Ok(vec![self.aspect_ratios_global.clone(); n_layers])
            }
        }
    }
}

impl Config for AnchorPyramidParams {
    const PATH: &'static str = "anchors.toml";
}

fn check_per_layer(name: &'static str, actual: usize, expected: usize) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::PerLayerCount {
            name,
            expected,
            actual,
        })
    }
}

/// Expand an optional per-head list into one optional value per head.
fn per_layer_values(
    name: &'static str,
    values: Option<&[ScalarOrPair]>,
    n_layers: usize,
) -> Result<Vec<Option<ScalarOrPair>>> {
    match values {
        Some(values) => {
            check_per_layer(name, values.len(), n_layers)?;
            Ok(values.iter().cloned().map(Some).collect())
        }
        None => Ok(vec![None; n_layers]),
    }
}

/// The anchor generators of all detection heads, ordered from the finest to the coarsest grid.
#[derive(Debug, Clone)]
pub struct AnchorPyramid {
    heads: Vec<AnchorGridGenerator>,
    scales: Vec<f64>,
    format: BoxFormat,
}

impl AnchorPyramid {
    /// Validate `params` and create a generator for every head.
    pub fn new(params: AnchorPyramidParams) -> Result<Self> {
        let n_layers = params.n_predictor_layers;
        if n_layers == 0 {
            return Err(Error::PredictorLayers);
        }

        let scales = params.resolve_scales()?;
        let aspect_ratios = params.resolve_aspect_ratios()?;
        let steps = per_layer_values("steps", params.steps.as_deref(), n_layers)?;
        let offsets = per_layer_values("offsets", params.offsets.as_deref(), n_layers)?;

        let heads = aspect_ratios
            .into_iter()
            .zip_eq(steps)
            .zip_eq(offsets)
            .enumerate()
            .map(|(layer, ((aspect_ratios, step), offset))| -> Result<_> {
                let config = AnchorGridConfig::new(AnchorGridParams {
                    image_height: params.image_height,
                    image_width: params.image_width,
                    this_scale: scales[layer],
                    next_scale: scales[layer + 1],
                    aspect_ratios,
                    two_boxes_for_ar1: params.two_boxes_for_ar1,
                    step,
                    offset,
                    clip_boxes: params.clip_boxes,
                    variances: params.variances.clone(),
                    coords: params.coords.clone(),
                    normalize_coords: params.normalize_coords,
                })?;

                tracing::trace!(layer, "validated anchor head config");

                Ok(AnchorGridGenerator::new(config))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            n_heads = heads.len(),
            "created anchor pyramid with scales {scales:?}"
        );

        // all heads share the same coordinate format, and there is at least one head
        let format = heads[0].config().coords();

        Ok(Self {
            heads,
            scales,
            format,
        })
    }

    /// The generator of every head.
    #[must_use]
    pub fn heads(&self) -> &[AnchorGridGenerator] {
        &self.heads
    }

    /// The scale of every head, plus the trailing `next_scale` of the last head.
    #[must_use]
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// The coordinate format shared by all heads.
    #[must_use]
    pub fn format(&self) -> BoxFormat {
        self.format
    }

    /// The number of boxes per cell of every head.
    #[must_use]
    pub fn n_boxes(&self) -> Vec<usize> {
        self.heads.iter().map(AnchorGridGenerator::n_boxes).collect()
    }

    /// Generate the anchors of every head, given the `(height, width)` of every feature grid.
    pub fn generate(&self, grid_sizes: &[(usize, usize)]) -> Result<Vec<AnchorTensor>> {
        if grid_sizes.len() != self.heads.len() {
            return Err(Error::GridCount {
                expected: self.heads.len(),
                actual: grid_sizes.len(),
            });
        }

        Ok(self
            .heads
            .iter()
            .zip_eq(grid_sizes)
            .map(|(head, &(grid_height, grid_width))| head.generate(grid_height, grid_width))
            .collect())
    }

    /// Generate the anchors of every head, concatenated into `(num_anchors, 8)` rows.
    pub fn generate_flat(&self, grid_sizes: &[(usize, usize)]) -> Result<Array2<f64>> {
        let tensors = self.generate(grid_sizes)?;
        let num_anchors = tensors.iter().map(AnchorTensor::num_anchors).sum();

        let mut flat = Array2::zeros((num_anchors, ANCHOR_CHANNELS));
        let mut start = 0;
        for tensor in &tensors {
            let end = start + tensor.num_anchors();
            flat.slice_mut(s![start..end, ..]).assign(&tensor.flatten());
            start = end;
        }

        Ok(flat)
    }

    /// Generate the flat anchors and replicate them for every item in a batch.
    ///
    /// The result has shape `(batch_size, num_anchors, 8)` and is stored as `f32`.
    pub fn batched(&self, grid_sizes: &[(usize, usize)], batch_size: usize) -> Result<Array3<f32>> {
        let flat = self.generate_flat(grid_sizes)?;
        let (num_anchors, channels) = flat.dim();

        Ok(Array3::from_shape_fn(
            (batch_size, num_anchors, channels),
            |(_, anchor, channel)| flat[[anchor, channel]] as f32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    const GRIDS: [(usize, usize); 4] = [(37, 50), (18, 25), (9, 12), (4, 6)];

    #[test]
    fn interpolated_scales() {
        let pyramid = AnchorPyramid::new(AnchorPyramidParams::new(300, 400)).unwrap();

        assert_eq!(pyramid.heads().len(), 4);
        assert_eq!(pyramid.scales().len(), 5);
        assert_abs_diff_eq!(pyramid.scales()[1], 0.3, epsilon = 1e-12);
        assert_eq!(pyramid.scales()[4], 0.9);

        let last = &pyramid.heads()[3];
        assert_abs_diff_eq!(last.config().this_scale(), 0.7, epsilon = 1e-12);
        assert_eq!(last.config().next_scale(), 0.9);
    }

    #[test]
    fn explicit_scales_override() {
        let pyramid = AnchorPyramid::new(AnchorPyramidParams {
            n_predictor_layers: 2,
            scales: Some(vec![0.1, 0.4, 0.8]),
            min_scale: None,
            max_scale: None,
            ..AnchorPyramidParams::new(300, 300)
        })
        .unwrap();

        assert_eq!(pyramid.scales(), &[0.1, 0.4, 0.8]);
        assert_eq!(pyramid.heads()[1].config().next_scale(), 0.8);
    }

    #[test]
    fn scale_errors() {
        let err = AnchorPyramid::new(AnchorPyramidParams {
            scales: Some(vec![0.1, 0.2, 0.3]),
            ..AnchorPyramidParams::new(300, 300)
        })
        .unwrap_err();
        assert!(matches!(
            err,
            Error::ScaleCount {
                expected: 5,
                actual: 3
            }
        ));

        let err = AnchorPyramid::new(AnchorPyramidParams {
            min_scale: None,
            ..AnchorPyramidParams::new(300, 300)
        })
        .unwrap_err();
        assert!(matches!(err, Error::MissingScales));

        let err = AnchorPyramid::new(AnchorPyramidParams {
            min_scale: Some(0.9),
            max_scale: Some(0.1),
            ..AnchorPyramidParams::new(300, 300)
        })
        .unwrap_err();
        assert!(matches!(err, Error::ScaleRange { .. }));

        let err = AnchorPyramid::new(AnchorPyramidParams {
            scales: Some(vec![0.1, 0.2, 0.0, 0.4, 0.5]),
            ..AnchorPyramidParams::new(300, 300)
        })
        .unwrap_err();
        assert!(matches!(err, Error::Scales(_)));
    }

    #[test]
    fn per_layer_aspect_ratios() {
        let pyramid = AnchorPyramid::new(AnchorPyramidParams {
            n_predictor_layers: 3,
            aspect_ratios_per_layer: Some(vec![vec![1.0, 2.0, 0.5], vec![1.0], vec![3.0]]),
            ..AnchorPyramidParams::new(300, 300)
        })
        .unwrap();

        assert_eq!(pyramid.n_boxes(), vec![4, 2, 1]);

        let err = AnchorPyramid::new(AnchorPyramidParams {
            aspect_ratios_per_layer: Some(vec![vec![1.0]]),
            ..AnchorPyramidParams::new(300, 300)
        })
        .unwrap_err();
        assert!(matches!(
            err,
            Error::PerLayerCount {
                name: "aspect_ratios_per_layer",
                ..
            }
        ));

        let err = AnchorPyramid::new(AnchorPyramidParams {
            n_predictor_layers: 2,
            aspect_ratios_per_layer: Some(vec![vec![1.0], vec![]]),
            ..AnchorPyramidParams::new(300, 300)
        })
        .unwrap_err();
        assert!(matches!(err, Error::EmptyAspectRatios));
    }

    #[test]
    fn steps_and_offsets_per_layer() {
        let pyramid = AnchorPyramid::new(AnchorPyramidParams {
            n_predictor_layers: 2,
            steps: Some(vec![8.0_f64.into(), (16.0, 32.0).into()]),
            offsets: Some(vec![0.5_f64.into(), 0.0_f64.into()]),
            ..AnchorPyramidParams::new(300, 300)
        })
        .unwrap();

        assert_eq!(pyramid.heads()[1].steps(1, 1), (16.0, 32.0));
        assert_eq!(pyramid.heads()[1].offsets(), (0.0, 0.0));

        let err = AnchorPyramid::new(AnchorPyramidParams {
            steps: Some(vec![8.0_f64.into()]),
            ..AnchorPyramidParams::new(300, 300)
        })
        .unwrap_err();
        assert!(matches!(err, Error::PerLayerCount { name: "steps", .. }));

        let err = AnchorPyramid::new(AnchorPyramidParams {
            n_predictor_layers: 1,
            offsets: Some(vec![ScalarOrPair::Sequence(vec![0.1, 0.2, 0.3])]),
            ..AnchorPyramidParams::new(300, 300)
        })
        .unwrap_err();
        assert!(matches!(err, Error::Offset(3)));
    }

    #[test]
    fn no_heads() {
        let err = AnchorPyramid::new(AnchorPyramidParams {
            n_predictor_layers: 0,
            ..AnchorPyramidParams::new(300, 300)
        })
        .unwrap_err();

        assert!(matches!(err, Error::PredictorLayers));
    }

    #[test]
    fn flat_anchors_concatenate_heads() {
        let pyramid = AnchorPyramid::new(AnchorPyramidParams::new(300, 400)).unwrap();
        let tensors = pyramid.generate(&GRIDS).unwrap();
        let flat = pyramid.generate_flat(&GRIDS).unwrap();

        let expected: usize = GRIDS.iter().map(|(h, w)| h * w * 4).sum();
        assert_eq!(flat.dim(), (expected, 8));

        // the first rows belong to the first head, the last rows to the last head
        assert_eq!(flat.row(0), tensors[0].flatten().row(0));
        let last = tensors[3].flatten();
        assert_eq!(flat.row(expected - 1), last.row(last.nrows() - 1));
    }

    #[test]
    fn grid_count_mismatch() {
        let pyramid = AnchorPyramid::new(AnchorPyramidParams::new(300, 300)).unwrap();
        let err = pyramid.generate(&GRIDS[..2]).unwrap_err();

        assert!(matches!(
            err,
            Error::GridCount {
                expected: 4,
                actual: 2
            }
        ));
        assert!(!err.is_invalid_configuration());
    }

    #[test]
    fn batched_flat_anchors() {
        let pyramid = AnchorPyramid::new(AnchorPyramidParams::new(300, 300)).unwrap();
        let batched = pyramid.batched(&GRIDS, 2).unwrap();
        let flat = pyramid.generate_flat(&GRIDS).unwrap();

        assert_eq!(batched.dim(), (2, flat.nrows(), 8));
        assert_eq!(batched.index_axis(ndarray::Axis(0), 1), flat.mapv(|v| v as f32));
    }

    #[test]
    fn parse_toml() {
        let params = AnchorPyramidParams::from_toml_str(
            r#"
            image_height = 300
            image_width = 480
            n_predictor_layers = 2
            scales = [0.08, 0.16, 0.32]
            aspect_ratios_per_layer = [[1.0, 2.0, 0.5], [1.0, 2.0]]
            steps = [8, [16, 32]]
            variances = [0.1, 0.1, 0.2, 0.2]
            coords = "corners"
            clip_boxes = true
            "#,
        )
        .unwrap();

        assert_eq!(
            params.steps,
            Some(vec![
                ScalarOrPair::Scalar(8.0),
                ScalarOrPair::Sequence(vec![16.0, 32.0])
            ])
        );

        let pyramid = AnchorPyramid::new(params).unwrap();
        assert_eq!(pyramid.n_boxes(), vec![4, 3]);
        assert_eq!(pyramid.format(), BoxFormat::Corners);
    }
}
