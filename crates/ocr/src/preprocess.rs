//! Image → ranked orientation candidates.
//!
//! Each requested rotation goes through grayscale, median denoise,
//! binarization, despeckle, trim and deskew, and is then scored by how many
//! upright digit-shaped ink components it shows.

use std::io::Cursor;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageDecoder, ImageReader, Rgb, RgbImage};
use imageproc::filter::median_filter;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::binarize::{despeckle, otsu_adaptive_union, sauvola};
use crate::geometry::{deskew, digit_quality, trim, OrientationQuality};
use crate::types::Rotation;

/// Upscaling by less than this is skipped.
const MIN_UPSCALE: f32 = 1.1;
const SHARPEN: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Binarization {
    #[default]
    Sauvola,
    /// Union of a global Otsu pass and a local adaptive-mean pass.
    OtsuAdaptive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub min_long_edge: u32,
    pub gamma: f32,
    pub trim_margin: u32,
    pub binarization: Binarization,
    pub sauvola_window: u32,
    pub sauvola_k: f32,
    pub adaptive_block: u32,
    pub adaptive_offset: f32,
    pub median_radius: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            min_long_edge: 1600,
            gamma: 1.1,
            trim_margin: 4,
            binarization: Binarization::Sauvola,
            sauvola_window: 41,
            sauvola_k: 0.2,
            adaptive_block: 35,
            adaptive_offset: 15.0,
            median_radius: 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ImageSource<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
    /// Already decoded; EXIF orientation is the caller's concern.
    Decoded(&'a DynamicImage),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareOptions {
    pub enhance: bool,
    /// Empty means all four.
    pub rotations: Vec<Rotation>,
}

#[derive(Debug, Clone)]
pub struct OrientationCandidate {
    pub rotation: Rotation,
    /// Binary page: ink 0, paper 255.
    pub image: GrayImage,
    /// Deskew correction applied, degrees clockwise.
    pub angle: f32,
    pub quality: OrientationQuality,
    pub enhanced: bool,
    pub binarization: Binarization,
}

/// Serializable view of an [`OrientationCandidate`] without its pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationSummary {
    pub rotation: Rotation,
    pub angle: f32,
    pub width: u32,
    pub height: u32,
    pub digit_candidates: usize,
    pub density: f32,
    pub score: f32,
    pub enhanced: bool,
    pub binarization: Binarization,
}

impl OrientationCandidate {
    pub fn summary(&self) -> OrientationSummary {
        OrientationSummary {
            rotation: self.rotation,
            angle: self.angle,
            width: self.image.width(),
            height: self.image.height(),
            digit_candidates: self.quality.digit_candidates,
            density: self.quality.density,
            score: self.quality.score,
            enhanced: self.enhanced,
            binarization: self.binarization,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Decode `source` and produce one candidate per requested rotation,
    /// best first.
    pub fn prepare(
        &self,
        source: ImageSource<'_>,
        options: &PrepareOptions,
    ) -> Result<Vec<OrientationCandidate>, PreprocessError> {
        let rgb = match source {
            ImageSource::Path(path) => decode(&std::fs::read(path)?)?,
            ImageSource::Bytes(bytes) => decode(bytes)?,
            ImageSource::Decoded(image) => image.to_rgb8(),
        };
        let rgb = if options.enhance { self.enhance(rgb) } else { rgb };

        let mut rotations: Vec<Rotation> = Vec::new();
        let requested = if options.rotations.is_empty() { &Rotation::ALL[..] } else { &options.rotations[..] };
        for rotation in requested {
            if !rotations.contains(rotation) {
                rotations.push(*rotation);
            }
        }

        let mut candidates: Vec<OrientationCandidate> = rotations
            .par_iter()
            .map(|&rotation| self.orient(&rgb, rotation, options.enhance))
            .collect();
        candidates.sort_by(|a, b| {
            b.quality
                .score
                .total_cmp(&a.quality.score)
                .then(a.angle.abs().total_cmp(&b.angle.abs()))
        });
        Ok(candidates)
    }

    /// Upscale small pages and sharpen, equalize lightness, gamma-correct.
    pub fn enhance(&self, image: RgbImage) -> RgbImage {
        let long_edge = image.width().max(image.height()).max(1);
        let scale = self.config.min_long_edge as f32 / long_edge as f32;
        let image = if scale > MIN_UPSCALE {
            let width = (image.width() as f32 * scale).round() as u32;
            let height = (image.height() as f32 * scale).round() as u32;
            let upscaled = imageops::resize(&image, width, height, FilterType::CatmullRom);
            imageops::filter3x3(&upscaled, &SHARPEN)
        } else {
            image
        };
        apply_gamma(equalize_lightness(image), self.config.gamma)
    }

    fn orient(&self, rgb: &RgbImage, rotation: Rotation, enhanced: bool) -> OrientationCandidate {
        let cfg = &self.config;
        let gray = imageops::grayscale(&rotation.apply(rgb));
        let gray = median_filter(&gray, cfg.median_radius, cfg.median_radius);

        let too_small = gray.width() < cfg.sauvola_window || gray.height() < cfg.sauvola_window;
        let binarization = match cfg.binarization {
            Binarization::Sauvola if too_small => {
                warn!(
                    rotation = rotation.degrees(),
                    width = gray.width(),
                    height = gray.height(),
                    "Image smaller than Sauvola window, using Otsu/adaptive union"
                );
                Binarization::OtsuAdaptive
            }
            chosen => chosen,
        };
        let binary = match binarization {
            Binarization::Sauvola => sauvola(&gray, cfg.sauvola_window, cfg.sauvola_k),
            Binarization::OtsuAdaptive => {
                otsu_adaptive_union(&gray, cfg.adaptive_block, cfg.adaptive_offset)
            }
        };

        let binary = trim(&despeckle(&binary), cfg.trim_margin);
        let (image, angle) = deskew(binary);
        let quality = digit_quality(&image);
        debug!(
            rotation = rotation.degrees(),
            angle,
            digits = quality.digit_candidates,
            score = quality.score,
            "Orientation prepared"
        );

        OrientationCandidate { rotation, image, angle, quality, enhanced, binarization }
    }
}

/// Decode with the EXIF orientation applied.
fn decode(bytes: &[u8]) -> Result<RgbImage, PreprocessError> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_decoder()?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image.to_rgb8())
}

fn ycbcr(p: &Rgb<u8>) -> (f32, f32, f32) {
    let [r, g, b] = p.0.map(f32::from);
    (
        0.299 * r + 0.587 * g + 0.114 * b,
        -0.168_736 * r - 0.331_264 * g + 0.5 * b,
        0.5 * r - 0.418_688 * g - 0.081_312 * b,
    )
}

fn channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Histogram-equalize luma (BT.601) and keep chroma.
fn equalize_lightness(image: RgbImage) -> RgbImage {
    let mut histogram = [0u64; 256];
    for p in image.pixels() {
        histogram[channel(ycbcr(p).0) as usize] += 1;
    }
    let mut cdf = [0u64; 256];
    let mut running = 0;
    for (slot, count) in cdf.iter_mut().zip(histogram) {
        running += count;
        *slot = running;
    }
    let total = running;
    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    if total == cdf_min {
        return image;
    }

    let span = (total - cdf_min) as f32;
    let lut: Vec<f32> = cdf
        .iter()
        .map(|&c| c.saturating_sub(cdf_min) as f32 * 255.0 / span)
        .collect();

    let mut out = image;
    for p in out.pixels_mut() {
        let (y, cb, cr) = ycbcr(p);
        let y = lut[channel(y) as usize];
        *p = Rgb([
            channel(y + 1.402 * cr),
            channel(y - 0.344_136 * cb - 0.714_136 * cr),
            channel(y + 1.772 * cb),
        ]);
    }
    out
}

fn apply_gamma(mut image: RgbImage, gamma: f32) -> RgbImage {
    if gamma <= 0.0 || (gamma - 1.0).abs() < f32::EPSILON {
        return image;
    }
    let lut: Vec<u8> = (0..=255u8)
        .map(|v| channel(255.0 * (v as f32 / 255.0).powf(1.0 / gamma)))
        .collect();
    for p in image.pixels_mut() {
        p.0 = p.0.map(|c| lut[c as usize]);
    }
    image
}
