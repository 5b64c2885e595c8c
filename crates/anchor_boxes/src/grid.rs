use ndarray::{Array1, Array2};

/// Return `num` evenly spaced values over the closed interval `[start, stop]`.
///
/// This follows numpy's `linspace` to the bit: values are computed as `i * step + start`
/// and the last value is pinned to `stop`, so the endpoints are always exact even when
/// `stop - start` is not a multiple of the step.
///
/// ```
/// use anchor_boxes::grid::linspace;
///
/// assert_eq!(linspace(15.0, 285.0, 10)[9], 285.0);
/// assert_eq!(linspace(2.0, 7.0, 1).to_vec(), vec![2.0]);
/// ```
#[must_use]
pub fn linspace(start: f64, stop: f64, num: usize) -> Array1<f64> {
    let delta = stop - start;
    let mut values = Array1::from_iter((0..num).map(|i| i as f64));

    if num > 1 {
        let div = (num - 1) as f64;
        let step = delta / div;

        if step == 0.0 {
            values.mapv_inplace(|v| v / div * delta);
        } else {
            values.mapv_inplace(|v| v * step);
        }
    } else {
        values.mapv_inplace(|v| v * delta);
    }

    values += start;

    if num > 1 {
        values[num - 1] = stop;
    }

    values
}

/// Generate coordinate matrices from two coordinate vectors.
///
/// This is like numpy's meshgrid function with cartesian indexing, but for ndarray and
/// limited to two dimensions. Both grids have shape `(y.len(), x.len())`.
#[must_use]
pub fn meshgrid<T: Copy>(x: &Array1<T>, y: &Array1<T>) -> (Array2<T>, Array2<T>) {
    let shape = (y.len(), x.len());
    (
        Array2::from_shape_fn(shape, |(_, col)| x[col]),
        Array2::from_shape_fn(shape, |(row, _)| y[row]),
    )
}
