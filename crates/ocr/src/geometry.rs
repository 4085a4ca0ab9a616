//! Ink geometry on binary pages: tight trimming, skew estimation from the
//! minimum-area rectangle, and the digit-likeness quality measure.

use image::{imageops, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use crate::binarize::{is_ink, PAPER};

/// Skews smaller than this (degrees) are not worth resampling for.
const MIN_SKEW_DEGREES: f32 = 0.1;

const DIGIT_MIN_HEIGHT: u32 = 12;
const DIGIT_MIN_WIDTH: u32 = 6;
const DIGIT_ASPECT: (f32, f32) = (0.15, 1.2);
const DENSITY_WEIGHT: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrientationQuality {
    /// Ink components shaped like a printed digit.
    pub digit_candidates: usize,
    /// Summed box area of those components over the page area.
    pub density: f32,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InkBox {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

fn ink_bounds(binary: &GrayImage) -> Option<InkBox> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, p) in binary.enumerate_pixels() {
        if !is_ink(p[0]) {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds.map(|(x0, y0, x1, y1)| InkBox { x: x0, y: y0, width: x1 - x0 + 1, height: y1 - y0 + 1 })
}

/// Crop to the ink bounding box grown by `margin` on every side (clipped to
/// the page). A page without ink is returned unchanged.
pub fn trim(binary: &GrayImage, margin: u32) -> GrayImage {
    let Some(ink) = ink_bounds(binary) else {
        return binary.clone();
    };
    let x = ink.x.saturating_sub(margin);
    let y = ink.y.saturating_sub(margin);
    let width = (ink.x + ink.width + margin).min(binary.width()) - x;
    let height = (ink.y + ink.height + margin).min(binary.height()) - y;
    imageops::crop_imm(binary, x, y, width, height).to_image()
}

/// Leftmost and rightmost ink pixel of every row. The convex hull of all ink
/// is the hull of these.
fn row_extremes(binary: &GrayImage) -> Vec<Point<i32>> {
    let mut points = Vec::new();
    for y in 0..binary.height() {
        let mut first = None;
        let mut last = None;
        for x in 0..binary.width() {
            if is_ink(binary.get_pixel(x, y)[0]) {
                first.get_or_insert(x);
                last = Some(x);
            }
        }
        if let (Some(a), Some(b)) = (first, last) {
            points.push(Point::new(a as i32, y as i32));
            if b != a {
                points.push(Point::new(b as i32, y as i32));
            }
        }
    }
    points
}

fn ink_hull(binary: &GrayImage) -> Vec<(f32, f32)> {
    convex_hull(row_extremes(binary))
        .into_iter()
        .map(|p| (p.x as f32, p.y as f32))
        .collect()
}

/// Orientation (degrees, folded into ±45) of the minimum-area rectangle
/// around the ink, by rotating calipers over the hull edges.
pub fn ink_skew(binary: &GrayImage) -> f32 {
    let hull = ink_hull(binary);
    if hull.len() < 3 {
        return 0.0;
    }
    let n = hull.len();
    let mut best_area = f32::MAX;
    let mut best_angle = 0.0_f32;
    for i in 0..n {
        let (ax, ay) = hull[i];
        let (bx, by) = hull[(i + 1) % n];
        let length = (bx - ax).hypot(by - ay);
        if length < f32::EPSILON {
            continue;
        }
        let (nx, ny) = ((bx - ax) / length, (by - ay) / length);
        let (mut min_n, mut max_n, mut min_p, mut max_p) = (f32::MAX, f32::MIN, f32::MAX, f32::MIN);
        for &(px, py) in &hull {
            let along = nx * (px - ax) + ny * (py - ay);
            let across = -ny * (px - ax) + nx * (py - ay);
            min_n = min_n.min(along);
            max_n = max_n.max(along);
            min_p = min_p.min(across);
            max_p = max_p.max(across);
        }
        let area = (max_n - min_n) * (max_p - min_p);
        if area < best_area {
            best_area = area;
            best_angle = ny.atan2(nx).to_degrees();
        }
    }
    best_angle - 90.0 * (best_angle / 90.0).round()
}

/// Rotate the ink to axis alignment. Returns the corrected page and the
/// applied correction in degrees (clockwise positive); 0 when no rotation
/// was needed.
pub fn deskew(binary: GrayImage) -> (GrayImage, f32) {
    let skew = ink_skew(&binary);
    if skew.abs() < MIN_SKEW_DEGREES {
        return (binary, 0.0);
    }
    let correction = -skew;
    let rotated = rotate_about_center(
        &binary,
        correction.to_radians(),
        Interpolation::Nearest,
        Luma([PAPER]),
    );
    (rotated, correction)
}

/// Count ink components shaped like printed digits (at least 6×12 px, width
/// over height within 0.15–1.2); `score = count + density × 10`.
pub fn digit_quality(binary: &GrayImage) -> OrientationQuality {
    let (width, height) = binary.dimensions();
    if width == 0 || height == 0 {
        return OrientationQuality::default();
    }
    let foreground = GrayImage::from_fn(width, height, |x, y| {
        Luma([if is_ink(binary.get_pixel(x, y)[0]) { 255 } else { 0 }])
    });

    let mut digit_candidates = 0usize;
    let mut area = 0u64;
    for contour in find_contours::<u32>(&foreground) {
        if !matches!(contour.border_type, BorderType::Outer) {
            continue;
        }
        let xs = contour.points.iter().map(|p| p.x);
        let ys = contour.points.iter().map(|p| p.y);
        let (Some(x0), Some(x1), Some(y0), Some(y1)) =
            (xs.clone().min(), xs.max(), ys.clone().min(), ys.max())
        else {
            continue;
        };
        let (w, h) = (x1 - x0 + 1, y1 - y0 + 1);
        if h < DIGIT_MIN_HEIGHT || w < DIGIT_MIN_WIDTH {
            continue;
        }
        let aspect = w as f32 / h as f32;
        if (DIGIT_ASPECT.0..=DIGIT_ASPECT.1).contains(&aspect) {
            digit_candidates += 1;
            area += (w * h) as u64;
        }
    }

    let density = area as f32 / (width as f32 * height as f32);
    OrientationQuality {
        digit_candidates,
        density,
        score: digit_candidates as f32 + density * DENSITY_WEIGHT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binarize::INK;

    /// Paper with ink rectangles `(x, y, w, h)`.
    fn page(width: u32, height: u32, blocks: &[(u32, u32, u32, u32)]) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let inked = blocks
                .iter()
                .any(|&(bx, by, bw, bh)| x >= bx && x < bx + bw && y >= by && y < by + bh);
            Luma([if inked { INK } else { PAPER }])
        })
    }

    #[test]
    fn trim_keeps_margin_around_ink() {
        let trimmed = trim(&page(100, 80, &[(30, 20, 10, 20)]), 4);
        assert_eq!(trimmed.dimensions(), (18, 28));
        assert_eq!(trimmed.get_pixel(4, 4)[0], INK);
        assert_eq!(trimmed.get_pixel(3, 3)[0], PAPER);
    }

    #[test]
    fn trim_clips_margin_at_page_edge() {
        let trimmed = trim(&page(50, 50, &[(1, 1, 10, 10)]), 4);
        assert_eq!(trimmed.dimensions(), (15, 15));
    }

    #[test]
    fn blank_page_is_not_trimmed() {
        let blank = page(40, 30, &[]);
        assert_eq!(trim(&blank, 4).dimensions(), (40, 30));
        assert_eq!(digit_quality(&blank), OrientationQuality::default());
        assert_eq!(deskew(blank).1, 0.0);
    }

    #[test]
    fn axis_aligned_ink_has_no_skew() {
        let row: Vec<_> = (0..6).map(|i| (20 + i * 24, 40, 12, 24)).collect();
        let (_, angle) = deskew(page(200, 120, &row));
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn sloped_ink_reports_its_skew() {
        // A staircase of blocks climbing 1 px per 20 px: about 2.9 degrees.
        let blocks: Vec<_> = (0..10).map(|i| (10 + i * 20, 60 - i, 20, 4)).collect();
        let binary = page(240, 100, &blocks);
        let skew = ink_skew(&binary);
        assert!(skew < -1.0 && skew > -5.0, "skew {skew}");
        let (_, correction) = deskew(binary);
        assert!((correction + skew).abs() < 1e-4);
    }

    #[test]
    fn digit_shaped_components_are_counted() {
        let digits: Vec<_> = (0..6).map(|i| (20 + i * 24, 40, 12, 24)).collect();
        let quality = digit_quality(&page(200, 120, &digits));
        assert_eq!(quality.digit_candidates, 6);
        let expected_density = (6 * 12 * 24) as f32 / (200.0 * 120.0);
        assert!((quality.density - expected_density).abs() < 1e-6);
        assert!((quality.score - (6.0 + expected_density * 10.0)).abs() < 1e-5);
    }

    #[test]
    fn wide_or_tiny_components_are_ignored() {
        let shapes = [(10, 10, 40, 12), (70, 10, 4, 4), (90, 10, 5, 30)];
        let quality = digit_quality(&page(120, 60, &shapes));
        assert_eq!(quality.digit_candidates, 0);
        assert_eq!(quality.score, 0.0);
    }

    #[test]
    fn hull_reaches_every_corner_of_the_ink() {
        let hull = ink_hull(&page(40, 30, &[(10, 5, 8, 6)]));
        for corner in [(10.0, 5.0), (17.0, 5.0), (17.0, 10.0), (10.0, 10.0)] {
            assert!(hull.contains(&corner), "{corner:?} missing from {hull:?}");
        }
        assert!(hull.iter().all(|&(x, y)| (10.0..=17.0).contains(&x) && (5.0..=10.0).contains(&y)));
        assert!(ink_hull(&page(40, 30, &[])).is_empty());
    }
}
