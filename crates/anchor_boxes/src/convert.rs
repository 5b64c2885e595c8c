//! Conversion between the [`BoxFormat`] coordinate layouts.
//!
//! All conversions act on the last axis of an array, which has to be exactly four wide.
//! Any number of leading axes is left untouched, so the same functions work for a single
//! box, a list of boxes or a full `(height, width, n_boxes, 4)` anchor grid.

use ndarray::{Array, ArrayBase, ArrayViewMut, Axis, Data, Dimension};

use crate::format::{BorderPixels, BoxFormat};

/// Convert `boxes` from one coordinate format to another, returning a new array.
///
/// The input is never modified.
///
/// ```
/// use anchor_boxes::convert::convert;
/// use anchor_boxes::format::{BorderPixels, BoxFormat};
/// use ndarray::array;
///
/// let corners = array![[10.0, 20.0, 50.0, 40.0]];
/// let centroids = convert(&corners, BoxFormat::Corners, BoxFormat::Centroids, BorderPixels::Half);
///
/// assert_eq!(centroids, array![[30.0, 30.0, 40.0, 20.0]]);
/// ```
///
/// # Panics
///
/// If `boxes` has no axes, or the last axis is not exactly 4 wide.
pub fn convert<S, D>(
    boxes: &ArrayBase<S, D>,
    from: BoxFormat,
    to: BoxFormat,
    border_pixels: BorderPixels,
) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let mut converted = boxes.to_owned();
    convert_inplace(converted.view_mut(), from, to, border_pixels);
    converted
}

/// Convert `boxes` in place, see [`convert`].
///
/// # Panics
///
/// If `boxes` has no axes, or the last axis is not exactly 4 wide.
pub fn convert_inplace<D: Dimension>(
    mut boxes: ArrayViewMut<'_, f64, D>,
    from: BoxFormat,
    to: BoxFormat,
    border_pixels: BorderPixels,
) {
    let Some(last) = boxes.ndim().checked_sub(1) else {
        panic!("cannot convert the coordinates of a zero-dimensional array");
    };
    let width = boxes.len_of(Axis(last));
    assert_eq!(
        width, 4,
        "the last axis of `boxes` must hold 4 coordinates, but it holds {width}"
    );

    if from == to {
        return;
    }

    for mut lane in boxes.lanes_mut(Axis(last)) {
        let converted = convert_box(
            [lane[0], lane[1], lane[2], lane[3]],
            from,
            to,
            border_pixels,
        );
        for (dst, src) in lane.iter_mut().zip(converted) {
            *dst = src;
        }
    }
}

/// Convert the coordinates of a single box.
///
/// Sizes are computed as `max - min + d` and extents as `center -/+ (size - d) / 2`, where
/// `d` is [`BorderPixels::size_offset`]. This keeps every round trip exact, and for
/// [`BorderPixels::Half`] reduces to the plain `max - min` and `center -/+ size / 2`.
#[must_use]
pub fn convert_box(
    coords: [f64; 4],
    from: BoxFormat,
    to: BoxFormat,
    border_pixels: BorderPixels,
) -> [f64; 4] {
    let d = border_pixels.size_offset();

    match (from, to) {
        (BoxFormat::Centroids, BoxFormat::Corners) => {
            let [cx, cy, w, h] = coords;
            let (half_w, half_h) = ((w - d) / 2.0, (h - d) / 2.0);
            [cx - half_w, cy - half_h, cx + half_w, cy + half_h]
        }
        (BoxFormat::Centroids, BoxFormat::MinMax) => {
            let [cx, cy, w, h] = coords;
            let (half_w, half_h) = ((w - d) / 2.0, (h - d) / 2.0);
            [cx - half_w, cx + half_w, cy - half_h, cy + half_h]
        }
        (BoxFormat::Corners, BoxFormat::Centroids) => {
            let [xmin, ymin, xmax, ymax] = coords;
            [
                (xmin + xmax) / 2.0,
                (ymin + ymax) / 2.0,
                xmax - xmin + d,
                ymax - ymin + d,
            ]
        }
        (BoxFormat::MinMax, BoxFormat::Centroids) => {
            let [xmin, xmax, ymin, ymax] = coords;
            [
                (xmin + xmax) / 2.0,
                (ymin + ymax) / 2.0,
                xmax - xmin + d,
                ymax - ymin + d,
            ]
        }
        // swapping the middle two channels is its own inverse
        (BoxFormat::Corners, BoxFormat::MinMax) | (BoxFormat::MinMax, BoxFormat::Corners) => {
            let [a, b, c, e] = coords;
            [a, c, b, e]
        }
        (BoxFormat::Centroids, BoxFormat::Centroids)
        | (BoxFormat::Corners, BoxFormat::Corners)
        | (BoxFormat::MinMax, BoxFormat::MinMax) => coords,
    }
}
