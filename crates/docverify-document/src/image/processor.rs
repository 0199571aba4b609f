// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: grayscale, contrast adjustment, denoising, and the
// preparation pass run before text recognition. Operates on in-memory images
// using the `image` and `imageproc` crates.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, instrument};

/// Captures shorter than this on their long side are upscaled before OCR.
const OCR_MIN_LONG_SIDE: u32 = 1600;

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping
/// the transformed image, enabling method chaining.
///
/// ```ignore
/// let prepared = ImageProcessor::from_dynamic(capture.primary().clone())
///     .grayscale()
///     .stretch_contrast(0.01)
///     .denoise(0.8)
///     .into_dynamic();
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations ------------------------------------------------------

    /// Convert the image to grayscale (luma).
    pub fn grayscale(self) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    /// Adjust contrast by a factor. Values > 1.0 increase contrast; values
    /// < 1.0 decrease it. A value of 1.0 is a no-op.
    #[instrument(skip(self), fields(factor))]
    pub fn adjust_contrast(self, factor: f32) -> Self {
        let adjust = |channel: u8| -> u8 {
            let val = factor * (channel as f32 - 128.0) + 128.0;
            val.clamp(0.0, 255.0) as u8
        };

        let image = match self.image {
            DynamicImage::ImageLuma8(gray) => {
                let (w, h) = gray.dimensions();
                DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| {
                    Luma([adjust(gray.get_pixel(x, y).0[0])])
                }))
            }
            other => {
                let rgba = other.to_rgba8();
                let contrasted =
                    image::ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
                        let image::Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
                        image::Rgba([adjust(r), adjust(g), adjust(b), a])
                    });
                DynamicImage::ImageRgba8(contrasted)
            }
        };
        Self { image }
    }

    /// Linear histogram stretch on luma: the darkest and brightest `clip`
    /// fraction of pixels saturate, the rest spread over the full range.
    /// Evens out captures taken in dim or washed-out light.
    #[instrument(skip(self), fields(clip))]
    pub fn stretch_contrast(self, clip: f32) -> Self {
        let gray = self.image.to_luma8();
        let mut histogram = [0u64; 256];
        for pixel in gray.pixels() {
            histogram[pixel.0[0] as usize] += 1;
        }
        let total = gray.width() as u64 * gray.height() as u64;
        let cut = (total as f64 * clip.clamp(0.0, 0.49) as f64) as u64;

        let low = percentile_bin(&histogram, cut);
        let high = 255 - percentile_bin_rev(&histogram, cut);
        debug!(low, high, "Contrast stretch bounds");
        if high <= low {
            return Self {
                image: DynamicImage::ImageLuma8(gray),
            };
        }

        let span = (high - low) as f32;
        let (w, h) = gray.dimensions();
        let stretched = GrayImage::from_fn(w, h, |x, y| {
            let v = gray.get_pixel(x, y).0[0] as f32;
            Luma([((v - low as f32) * 255.0 / span).clamp(0.0, 255.0) as u8])
        });
        Self {
            image: DynamicImage::ImageLuma8(stretched),
        }
    }

    /// Gaussian denoise on luma.
    pub fn denoise(self, sigma: f32) -> Self {
        if sigma <= 0.0 {
            return self;
        }
        let gray = self.image.to_luma8();
        Self {
            image: DynamicImage::ImageLuma8(gaussian_blur_f32(&gray, sigma)),
        }
    }

    /// Scale up so the long side is at least `min_long_side`, preserving
    /// aspect ratio. Larger images are left alone.
    pub fn upscale_to(self, min_long_side: u32) -> Self {
        let long = self.image.width().max(self.image.height());
        if long == 0 || long >= min_long_side {
            return self;
        }
        let factor = min_long_side as f32 / long as f32;
        let w = (self.image.width() as f32 * factor).round() as u32;
        let h = (self.image.height() as f32 * factor).round() as u32;
        debug!(from = long, to = min_long_side, "Upscaling for OCR");
        Self {
            image: self
                .image
                .resize_exact(w, h, image::imageops::FilterType::CatmullRom),
        }
    }

    /// The preparation pass run before text recognition: grayscale,
    /// histogram stretch, a mild contrast boost, light denoising, and an
    /// upscale for small captures.
    #[instrument(skip(self), fields(width = self.image.width(), height = self.image.height()))]
    pub fn prepare_for_ocr(self) -> Self {
        self.grayscale()
            .stretch_contrast(0.01)
            .adjust_contrast(1.2)
            .denoise(0.6)
            .upscale_to(OCR_MIN_LONG_SIDE)
    }
}

/// First histogram bin at which the cumulative count exceeds `cut`.
fn percentile_bin(histogram: &[u64; 256], cut: u64) -> u8 {
    let mut acc = 0u64;
    for (bin, &count) in histogram.iter().enumerate() {
        acc += count;
        if acc > cut {
            return bin as u8;
        }
    }
    255
}

/// Same as [`percentile_bin`] counted from the bright end; returns the
/// distance from 255.
fn percentile_bin_rev(histogram: &[u64; 256], cut: u64) -> u8 {
    let mut acc = 0u64;
    for (offset, &count) in histogram.iter().rev().enumerate() {
        acc += count;
        if acc > cut {
            return offset as u8;
        }
    }
    255
}
