use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// The layout of the four coordinates of a box.
///
/// ```
/// use anchor_boxes::format::BoxFormat;
///
/// let format: BoxFormat = "minmax".parse().unwrap();
/// assert_eq!(format, BoxFormat::MinMax);
/// assert_eq!(format.to_string(), "minmax");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BoxFormat {
    /// `(center_x, center_y, width, height)`
    Centroids,
    /// `(xmin, ymin, xmax, ymax)`
    Corners,
    /// `(xmin, xmax, ymin, ymax)`
    MinMax,
}

impl BoxFormat {
    /// Channel indices of the two x coordinates.
    #[must_use]
    pub const fn x_channels(self) -> [usize; 2] {
        match self {
            BoxFormat::Centroids | BoxFormat::Corners => [0, 2],
            BoxFormat::MinMax => [0, 1],
        }
    }

    /// Channel indices of the two y coordinates.
    #[must_use]
    pub const fn y_channels(self) -> [usize; 2] {
        match self {
            BoxFormat::Centroids | BoxFormat::Corners => [1, 3],
            BoxFormat::MinMax => [2, 3],
        }
    }
}

/// How the boundary pixels of a box are counted when converting between extents and sizes.
///
/// With `Half` the boundary pixel is shared half-and-half between neighbouring boxes, so
/// `width = xmax - xmin`. `Include` counts both boundary pixels (`width = xmax - xmin + 1`),
/// `Exclude` counts neither (`width = xmax - xmin - 1`).
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BorderPixels {
    #[default]
    Half,
    Include,
    Exclude,
}

impl BorderPixels {
    /// The amount added to `max - min` to get the size of a box.
    #[must_use]
    pub const fn size_offset(self) -> f64 {
        match self {
            BorderPixels::Half => 0.0,
            BorderPixels::Include => 1.0,
            BorderPixels::Exclude => -1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_formats() {
        assert_eq!("centroids".parse::<BoxFormat>().unwrap(), BoxFormat::Centroids);
        assert_eq!("corners".parse::<BoxFormat>().unwrap(), BoxFormat::Corners);
        assert_eq!("minmax".parse::<BoxFormat>().unwrap(), BoxFormat::MinMax);
        assert!("xywh".parse::<BoxFormat>().is_err());
    }

    #[test]
    fn coordinate_channels() {
        assert_eq!(BoxFormat::Corners.x_channels(), [0, 2]);
        assert_eq!(BoxFormat::Corners.y_channels(), [1, 3]);
        assert_eq!(BoxFormat::MinMax.x_channels(), [0, 1]);
        assert_eq!(BoxFormat::MinMax.y_channels(), [2, 3]);
    }

    #[test]
    fn border_pixel_offsets() {
        assert_eq!(BorderPixels::default(), BorderPixels::Half);
        assert_eq!("include".parse::<BorderPixels>().unwrap().size_offset(), 1.0);
        assert_eq!(BorderPixels::Exclude.size_offset(), -1.0);
    }
}
