// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel statistics shared by the feature detectors.

use docverify_core::types::PixelRegion;
use image::{DynamicImage, GrayImage, RgbImage};

/// Summed-area table over a grayscale image.
///
/// `table[y * (width+1) + x]` holds the sum of all pixels in `[0, x) × [0, y)`.
/// The table is `(width+1) × (height+1)` with a zero-padded border.
pub struct IntegralImage {
    table: Vec<u64>,
    width: u32,
    height: u32,
}

impl IntegralImage {
    pub fn new(gray: &GrayImage) -> Self {
        let (w, h) = gray.dimensions();
        let stride = (w + 1) as usize;
        let mut table = vec![0u64; stride * (h + 1) as usize];

        for y in 0..h {
            let mut row_sum: u64 = 0;
            for x in 0..w {
                row_sum += gray.get_pixel(x, y).0[0] as u64;
                let idx = (y + 1) as usize * stride + (x + 1) as usize;
                let above = y as usize * stride + (x + 1) as usize;
                table[idx] = row_sum + table[above];
            }
        }

        Self {
            table,
            width: w,
            height: h,
        }
    }

    /// Mean of the half-open rectangle `[x0, x1) × [y0, y1)`, clamped to the
    /// image. Empty rectangles read as mid-gray.
    pub fn rect_mean(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> f64 {
        let stride = (self.width + 1) as usize;
        let x0 = x0.min(self.width) as usize;
        let y0 = y0.min(self.height) as usize;
        let x1 = (x1.min(self.width) as usize).max(x0);
        let y1 = (y1.min(self.height) as usize).max(y0);

        let area = ((x1 - x0) * (y1 - y0)) as f64;
        if area == 0.0 {
            return 128.0;
        }

        // S = I[y1][x1] - I[y0][x1] - I[y1][x0] + I[y0][x0]
        let sum = self.table[y1 * stride + x1] as f64
            - self.table[y0 * stride + x1] as f64
            - self.table[y1 * stride + x0] as f64
            + self.table[y0 * stride + x0] as f64;

        sum / area
    }

    /// Mean of the square of the given radius centred on `(cx, cy)`.
    pub fn region_mean(&self, cx: u32, cy: u32, radius: u32) -> f64 {
        self.rect_mean(
            cx.saturating_sub(radius),
            cy.saturating_sub(radius),
            cx + radius + 1,
            cy + radius + 1,
        )
    }
}

/// Signed difference between every pixel and its local mean, row-major.
pub fn high_pass(gray: &GrayImage, radius: u32) -> Vec<f64> {
    let integral = IntegralImage::new(gray);
    let (w, h) = gray.dimensions();
    let mut out = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            let p = gray.get_pixel(x, y).0[0] as f64;
            out.push(p - integral.region_mean(x, y, radius));
        }
    }
    out
}

/// Otsu threshold of a grayscale image: the value that maximises the
/// between-class variance. Pixels `<= threshold` form the dark class.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if total_pixels == 0 {
        return 128;
    }

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_background: f64 = 0.0;
    let mut weight_background: u64 = 0;
    let mut max_variance: f64 = 0.0;
    let mut best_threshold: u8 = 0;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between_variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = t as u8;
        }
    }

    best_threshold
}

/// Crop first, convert second: detectors only pay for the pixels they read.
pub fn crop_luma(image: &DynamicImage, region: PixelRegion) -> GrayImage {
    image
        .crop_imm(region.x, region.y, region.width, region.height)
        .to_luma8()
}

pub fn crop_rgb(image: &DynamicImage, region: PixelRegion) -> RgbImage {
    image
        .crop_imm(region.x, region.y, region.width, region.height)
        .to_rgb8()
}

/// Mean and population standard deviation of a grayscale image.
pub fn mean_std(gray: &GrayImage) -> (f64, f64) {
    let n = (gray.width() as u64 * gray.height() as u64) as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let (sum, sum_sq) = gray.pixels().fold((0.0, 0.0), |(s, sq), p| {
        let v = p.0[0] as f64;
        (s + v, sq + v * v)
    });
    let mean = sum / n;
    (mean, (sum_sq / n - mean * mean).max(0.0).sqrt())
}

/// Mean RGB over `[x0, x1) × [y0, y1)`.
pub fn mean_rgb(image: &RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) -> [f64; 3] {
    let mut acc = [0.0; 3];
    let mut n = 0.0;
    for y in y0..y1.min(image.height()) {
        for x in x0..x1.min(image.width()) {
            let p = image.get_pixel(x, y).0;
            for c in 0..3 {
                acc[c] += p[c] as f64;
            }
            n += 1.0;
        }
    }
    if n > 0.0 {
        for v in &mut acc {
            *v /= n;
        }
    }
    acc
}

pub fn color_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Mean colour of each cell of an `n × n` grid laid over the image.
pub fn grid_means(image: &RgbImage, n: u32) -> Vec<[f64; 3]> {
    let (w, h) = image.dimensions();
    let mut cells = Vec::with_capacity((n * n) as usize);
    for gy in 0..n {
        for gx in 0..n {
            let x0 = gx * w / n;
            let x1 = ((gx + 1) * w / n).max(x0 + 1);
            let y0 = gy * h / n;
            let y1 = ((gy + 1) * h / n).max(y0 + 1);
            cells.push(mean_rgb(image, x0, y0, x1, y1));
        }
    }
    cells
}

/// Nearest-rank percentile of `values`, which it sorts in place.
pub fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = ((p.clamp(0.0, 1.0) * values.len() as f64).ceil() as usize).max(1);
    values[rank - 1]
}
