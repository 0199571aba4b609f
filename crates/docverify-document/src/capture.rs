// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The set of images supplied for one verification run.

use docverify_core::error::{Result, VerifyError};
use docverify_core::types::Dimensions;
use image::DynamicImage;
use tracing::{debug, instrument, warn};

use crate::integrity::{hash_bytes, hash_image};

const MM_PER_INCH: f32 = 25.4;

/// A primary capture plus the optional extra captures some detectors use.
///
/// Read-only once built; the pipeline shares it between concurrent tasks.
#[derive(Debug, Clone)]
pub struct CaptureSet {
    primary: DynamicImage,
    second_angle: Option<DynamicImage>,
    uv: Option<DynamicImage>,
    declared_dpi: Option<u32>,
    digest: String,
}

impl CaptureSet {
    /// Decode the primary capture. An unreadable primary image is fatal to
    /// the run.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let primary = image::load_from_memory(data)
            .map_err(|err| VerifyError::ImageDecode(format!("primary capture: {err}")))?;
        debug!(
            width = primary.width(),
            height = primary.height(),
            "Primary capture decoded"
        );
        Ok(Self {
            primary,
            second_angle: None,
            uv: None,
            declared_dpi: None,
            digest: hash_bytes(data),
        })
    }

    /// Wrap an already-decoded primary capture.
    pub fn from_image(primary: DynamicImage) -> Self {
        let digest = hash_image(&primary);
        Self {
            primary,
            second_angle: None,
            uv: None,
            declared_dpi: None,
            digest,
        }
    }

    /// Attach a capture taken at a different viewing angle. Undecodable
    /// bytes are dropped with a warning; the affected detectors then report
    /// the capture as missing.
    pub fn with_second_angle_bytes(self, data: &[u8]) -> Self {
        match decode_optional(data, "second-angle") {
            Some(img) => self.with_second_angle(img),
            None => self,
        }
    }

    /// Attach a UV-illuminated capture. Undecodable bytes are dropped with a
    /// warning.
    pub fn with_uv_bytes(self, data: &[u8]) -> Self {
        match decode_optional(data, "uv") {
            Some(img) => self.with_uv(img),
            None => self,
        }
    }

    pub fn with_second_angle(mut self, image: DynamicImage) -> Self {
        self.second_angle = Some(image);
        self
    }

    pub fn with_uv(mut self, image: DynamicImage) -> Self {
        self.uv = Some(image);
        self
    }

    /// Record the scanner resolution when the capture device reports one.
    pub fn with_declared_dpi(mut self, dpi: u32) -> Self {
        self.declared_dpi = Some(dpi);
        self
    }

    pub fn primary(&self) -> &DynamicImage {
        &self.primary
    }

    pub fn second_angle(&self) -> Option<&DynamicImage> {
        self.second_angle.as_ref()
    }

    pub fn uv(&self) -> Option<&DynamicImage> {
        self.uv.as_ref()
    }

    /// SHA-256 of the primary capture.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Resolution of the primary capture for a document of the given size.
    ///
    /// Uses the declared DPI when present. Otherwise assumes the document
    /// fills the frame and derives DPI from the longer side.
    pub fn effective_dpi(&self, dimensions: &Dimensions) -> u32 {
        if let Some(dpi) = self.declared_dpi {
            return dpi;
        }
        let long_px = self.primary.width().max(self.primary.height()) as f32;
        let long_in = dimensions.long_side_mm() / MM_PER_INCH;
        if long_in <= 0.0 {
            return 0;
        }
        (long_px / long_in).round() as u32
    }
}

fn decode_optional(data: &[u8], kind: &str) -> Option<DynamicImage> {
    match image::load_from_memory(data) {
        Ok(img) => Some(img),
        Err(err) => {
            warn!(kind, error = %err, "Ignoring undecodable optional capture");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 190, 180])));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn corrupt_primary_is_fatal() {
        let err = CaptureSet::from_bytes(b"definitely not an image").unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, VerifyError::ImageDecode(_)));
    }

    #[test]
    fn corrupt_uv_is_dropped() {
        let capture = CaptureSet::from_bytes(&png_bytes(20, 10))
            .unwrap()
            .with_uv_bytes(b"garbage")
            .with_second_angle_bytes(&png_bytes(20, 10));
        assert!(capture.uv().is_none());
        assert!(capture.second_angle().is_some());
    }

    #[test]
    fn digest_is_hash_of_encoded_bytes() {
        let bytes = png_bytes(8, 8);
        let capture = CaptureSet::from_bytes(&bytes).unwrap();
        assert_eq!(capture.digest(), hash_bytes(&bytes));
    }

    #[test]
    fn dpi_derived_from_long_side() {
        let id1 = Dimensions {
            width_mm: 85.6,
            height_mm: 54.0,
        };
        let capture = CaptureSet::from_image(DynamicImage::ImageRgb8(RgbImage::new(1011, 638)));
        assert_eq!(capture.effective_dpi(&id1), 300);
        let declared = capture.with_declared_dpi(1200);
        assert_eq!(declared.effective_dpi(&id1), 1200);
    }
}
