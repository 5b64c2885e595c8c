use anchor_boxes::{AnchorPyramid, AnchorPyramidParams};

fn main() -> anchor_boxes::Result<()> {
    let pyramid = AnchorPyramid::new(AnchorPyramidParams {
        n_predictor_layers: 6,
        scales: Some(vec![0.1, 0.2, 0.37, 0.54, 0.71, 0.88, 1.05]),
        aspect_ratios_per_layer: Some(vec![
            vec![1.0, 2.0, 0.5],
            vec![1.0, 2.0, 0.5, 3.0, 1.0 / 3.0],
            vec![1.0, 2.0, 0.5, 3.0, 1.0 / 3.0],
            vec![1.0, 2.0, 0.5, 3.0, 1.0 / 3.0],
            vec![1.0, 2.0, 0.5],
            vec![1.0, 2.0, 0.5],
        ]),
        steps: Some(vec![
            8.0_f64.into(),
            16.0_f64.into(),
            32.0_f64.into(),
            64.0_f64.into(),
            100.0_f64.into(),
            300.0_f64.into(),
        ]),
        variances: vec![0.1, 0.1, 0.2, 0.2],
        clip_boxes: true,
        normalize_coords: true,
        ..AnchorPyramidParams::new(300, 300)
    })?;

    let grids = [(38, 38), (19, 19), (10, 10), (5, 5), (3, 3), (1, 1)];
    let anchors = pyramid.batched(&grids, 1)?;

    println!("boxes per cell: {:?}", pyramid.n_boxes());
    println!("anchor tensor shape: {:?}", anchors.dim());

    Ok(())
}
