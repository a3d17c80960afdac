use image::RgbaImage;

/// Edge-energy blur estimator.
///
/// Samples the image on a fixed stride, applies an 8-neighbor Laplacian at
/// each sampled pixel over Rec. 601 luma, and averages the squared responses.
/// Sharp images carry strong local contrast and score high; defocused ones
/// collapse toward zero.
pub fn edge_energy_score(image: &RgbaImage, sample_step: u32) -> f64 {
    let step = sample_step.max(1);
    let (width, height) = image.dimensions();
    if width <= 2 * step || height <= 2 * step {
        return 0.0;
    }

    let luma = |x: u32, y: u32| -> f64 {
        let px = image.get_pixel(x, y).0;
        0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64
    };

    let mut sum = 0.0;
    let mut count = 0u64;
    let mut y = step;
    while y < height - step {
        let mut x = step;
        while x < width - step {
            let response = 8.0 * luma(x, y)
                - luma(x - 1, y - 1)
                - luma(x, y - 1)
                - luma(x + 1, y - 1)
                - luma(x - 1, y)
                - luma(x + 1, y)
                - luma(x - 1, y + 1)
                - luma(x, y + 1)
                - luma(x + 1, y + 1);
            sum += response * response;
            count += 1;
            x += step;
        }
        y += step;
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
