// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture fingerprinting: SHA-256 digests recorded in every report.

use image::DynamicImage;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Fingerprint an already-decoded image.
///
/// The dimensions and colour type are hashed together with the pixel buffer
/// so two images with identical bytes but different shapes never collide.
pub fn hash_image(image: &DynamicImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.width().to_le_bytes());
    hasher.update(image.height().to_le_bytes());
    hasher.update(format!("{:?}", image.color()).as_bytes());
    hasher.update(image.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn hash_empty_input() {
        assert_eq!(hash_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn hash_known_value() {
        let expected = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert_eq!(hash_bytes(b"hello"), expected);
    }

    #[test]
    fn image_hash_depends_on_shape() {
        let wide = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 2, Luma([7])));
        let tall = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 4, Luma([7])));
        assert_eq!(wide.as_bytes(), tall.as_bytes());
        assert_ne!(hash_image(&wide), hash_image(&tall));
        assert_eq!(hash_image(&wide), hash_image(&wide.clone()));
    }
}
