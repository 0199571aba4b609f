// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic specimens and forgery simulation for tests and benchmarks.
//
// `SpecimenRenderer` draws the signature each detector looks for into the
// hinted region of every declared security feature, giving a "perfect"
// document at a chosen resolution. `ForgerySimulator` then applies the
// classic tampering methods to it.

use docverify_core::types::{DetectorId, DocumentTypeSpec, PixelRegion, SecurityFeatureSpec};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;

use crate::capture::CaptureSet;
use crate::mrz::check_digit;

const MM_PER_INCH: f32 = 25.4;
const PAPER: Rgb<u8> = Rgb([236, 232, 220]);
const UV_DARK: Rgb<u8> = Rgb([20, 20, 40]);
const UV_GLOW: Rgb<u8> = Rgb([80, 220, 255]);

fn gray(v: u8) -> Rgb<u8> {
    Rgb([v, v, v])
}

/// A rendered document: front capture, second-angle capture and UV capture.
#[derive(Debug, Clone)]
pub struct Specimen {
    pub primary: RgbImage,
    pub second_angle: RgbImage,
    pub uv: RgbImage,
    pub dpi: u32,
}

impl Specimen {
    /// All three captures.
    pub fn capture(&self) -> CaptureSet {
        self.without_uv()
            .with_uv(DynamicImage::ImageRgb8(self.uv.clone()))
    }

    /// Front and second angle, no UV lamp.
    pub fn without_uv(&self) -> CaptureSet {
        self.primary_only()
            .with_second_angle(DynamicImage::ImageRgb8(self.second_angle.clone()))
    }

    pub fn primary_only(&self) -> CaptureSet {
        CaptureSet::from_image(DynamicImage::ImageRgb8(self.primary.clone()))
            .with_declared_dpi(self.dpi)
    }
}

/// Draws genuine-looking specimens of a document type.
#[derive(Debug, Clone, Copy)]
pub struct SpecimenRenderer {
    dpi: u32,
}

impl SpecimenRenderer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    pub fn render(&self, spec: &DocumentTypeSpec) -> Specimen {
        let px = |mm: f32| ((mm / MM_PER_INCH * self.dpi as f32).round() as u32).max(1);
        let (w, h) = (px(spec.dimensions.width_mm), px(spec.dimensions.height_mm));

        let mut specimen = Specimen {
            primary: RgbImage::from_pixel(w, h, PAPER),
            second_angle: RgbImage::from_pixel(w, h, PAPER),
            uv: RgbImage::from_pixel(w, h, UV_DARK),
            dpi: self.dpi,
        };

        for feature in &spec.security_features {
            let Some(region) = feature.region else {
                continue;
            };
            let area = region.to_pixels(w, h);
            match feature.detector {
                DetectorId::Hologram => {
                    paint(&mut specimen.primary, area, |fx, fy| hologram(fx, fy, 0.0));
                    paint(&mut specimen.second_angle, area, |fx, fy| hologram(fx, fy, 120.0));
                }
                DetectorId::UvReactive => {
                    fill(&mut specimen.uv, area, UV_GLOW);
                }
                detector => {
                    let dpi = self.dpi;
                    let draw = move |img: &mut RgbImage| print_feature(img, area, detector, dpi);
                    draw(&mut specimen.primary);
                    draw(&mut specimen.second_angle);
                }
            }
        }
        specimen
    }
}

/// Apply `colour(fx, fy)` over `area`, with `fx`/`fy` the position inside
/// the area as fractions.
fn paint(img: &mut RgbImage, area: PixelRegion, colour: impl Fn(f32, f32) -> Rgb<u8>) {
    for y in area.y..area.bottom().min(img.height()) {
        for x in area.x..area.right().min(img.width()) {
            let fx = (x - area.x) as f32 / area.width as f32;
            let fy = (y - area.y) as f32 / area.height as f32;
            img.put_pixel(x, y, colour(fx, fy));
        }
    }
}

fn fill(img: &mut RgbImage, area: PixelRegion, colour: Rgb<u8>) {
    paint(img, area, |_, _| colour);
}

/// Diffraction rainbow: hue runs diagonally across the patch and rotates
/// with the viewing angle.
fn hologram(fx: f32, fy: f32, angle: f32) -> Rgb<u8> {
    hsv((fx + fy) * 180.0 + angle, 0.6, 0.9)
}

fn hsv(hue: f32, saturation: f32, value: f32) -> Rgb<u8> {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = value * saturation;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = value - c;
    let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgb([to_u8(r), to_u8(g), to_u8(b)])
}

fn print_feature(img: &mut RgbImage, area: PixelRegion, detector: DetectorId, dpi: u32) {
    let (w, h) = (area.width, area.height);
    let local = |x: u32, y: u32| (x - area.x, y - area.y);

    for y in area.y..area.bottom().min(img.height()) {
        for x in area.x..area.right().min(img.width()) {
            let (lx, ly) = local(x, y);
            let ink = match detector {
                DetectorId::Watermark => (ly % 8 >= 4).then_some(Rgb([216, 212, 200])),
                DetectorId::GhostImage => Some(gray(if (lx / 6 + ly / 6) % 2 == 0 { 90 } else { 190 })),
                DetectorId::Guilloche => {
                    let wave = ly as f32 + 6.0 * (lx as f32 / 10.0).sin() + 12.0;
                    (wave.rem_euclid(6.0) < 2.0).then_some(gray(110))
                }
                DetectorId::Microprint => (ly % 3 != 2 && lx % 2 == 0).then_some(gray(60)),
                DetectorId::Embossing => {
                    let dx = lx as f32 - w as f32 / 2.0;
                    let dy = ly as f32 - h as f32 / 2.0;
                    let r = (dx * dx + dy * dy).sqrt() as u32;
                    Some(gray(match r % 8 {
                        0 | 1 => 255,
                        2 | 3 => 150,
                        _ => 210,
                    }))
                }
                DetectorId::SecurityThread => {
                    let half = (dpi / 60).max(3) / 2;
                    let (pos, centre) = if h >= w { (lx, w / 2) } else { (ly, h / 2) };
                    (pos.abs_diff(centre) <= half).then_some(gray(60))
                }
                DetectorId::MrzZone => {
                    let band = ly * 100 / h.max(1);
                    let in_band = (20..45).contains(&band) || (60..85).contains(&band);
                    (in_band && lx % 12 < 7 && (lx + ly) % 3 != 0).then_some(gray(40))
                }
                DetectorId::Hologram | DetectorId::UvReactive => None,
            };
            if let Some(colour) = ink {
                img.put_pixel(x, y, colour);
            }
        }
    }
}

/// Tampering methods applied to a rendered specimen.
pub struct ForgerySimulator<'a> {
    spec: &'a DocumentTypeSpec,
}

impl<'a> ForgerySimulator<'a> {
    pub fn new(spec: &'a DocumentTypeSpec) -> Self {
        Self { spec }
    }

    fn feature(&self, name: &str) -> Option<&SecurityFeatureSpec> {
        self.spec.security_features.iter().find(|f| f.name == name)
    }

    /// White out a feature's region on every capture. Returns false when
    /// the template has no such feature or it carries no region.
    pub fn remove_feature(&self, specimen: &mut Specimen, name: &str) -> bool {
        let Some(region) = self.feature(name).and_then(|f| f.region) else {
            return false;
        };
        let (w, h) = specimen.primary.dimensions();
        let area = region.to_pixels(w, h);
        fill(&mut specimen.primary, area, PAPER);
        fill(&mut specimen.second_angle, area, PAPER);
        fill(&mut specimen.uv, area, UV_DARK);
        true
    }

    /// Photograph or photocopy of a genuine document: fine detail is lost.
    pub fn recapture(&self, specimen: &mut Specimen, sigma: f32) {
        specimen.primary = gaussian_blur_f32(&specimen.primary, sigma);
        specimen.second_angle = gaussian_blur_f32(&specimen.second_angle, sigma);
    }

    /// Colour reprint with a red cast.
    pub fn shift_colors(&self, specimen: &mut Specimen, delta: u8) {
        for img in [&mut specimen.primary, &mut specimen.second_angle] {
            for pixel in img.pixels_mut() {
                pixel.0[0] = pixel.0[0].saturating_add(delta);
                pixel.0[2] = pixel.0[2].saturating_sub(delta);
            }
        }
    }
}

/// TD3 line 2 with check digits computed from the given parts.
pub fn compose_td3_line2(
    document_number: &str,
    nationality: &str,
    birth_date: &str,
    sex: char,
    expiry_date: &str,
    personal_number: &str,
) -> String {
    let pad = |s: &str, n: usize| format!("{s:<<n$}");
    let digit = |s: &str| check_digit(s).map_or('<', |d| char::from_digit(d, 10).unwrap_or('<'));

    let number = pad(document_number, 9);
    let personal = pad(personal_number, 14);
    let mut line = String::with_capacity(44);
    line.push_str(&number);
    line.push(digit(&number));
    line.push_str(&pad(nationality, 3));
    line.push_str(birth_date);
    line.push(digit(birth_date));
    line.push(sex);
    line.push_str(expiry_date);
    line.push(digit(expiry_date));
    line.push_str(&personal);
    line.push(digit(&personal));

    let composite = format!("{}{}{}", &line[0..10], &line[13..20], &line[21..43]);
    line.push(digit(&composite));
    line
}
