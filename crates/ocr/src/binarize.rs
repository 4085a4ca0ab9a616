//! Ink/paper thresholding. Output images are strictly two-level: [`INK`] on
//! [`PAPER`].

use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::definitions::Image;
use imageproc::distance_transform::Norm;
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use imageproc::morphology::{close, open};

pub const INK: u8 = 0;
pub const PAPER: u8 = 255;

/// Dynamic range of the standard deviation in Sauvola's formula.
const SAUVOLA_RANGE: f64 = 128.0;

/// Inclusive pixel rectangle around a centre, clipped to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl Window {
    /// Callers pass a pixel inside the image, so both dimensions are nonzero.
    fn around(x: u32, y: u32, radius: u32, (width, height): (u32, u32)) -> Self {
        Self {
            left: x.saturating_sub(radius),
            top: y.saturating_sub(radius),
            right: x.saturating_add(radius).min(width - 1),
            bottom: y.saturating_add(radius).min(height - 1),
        }
    }

    fn pixel_count(self) -> f64 {
        f64::from(self.right - self.left + 1) * f64::from(self.bottom - self.top + 1)
    }

    fn sum(self, integral: &Image<Luma<u64>>) -> f64 {
        sum_image_pixels(integral, self.left, self.top, self.right, self.bottom)[0] as f64
    }
}

/// Mean and standard deviation of `window`, from an integral image and an
/// integral image of squares.
fn window_stats(
    sum: &Image<Luma<u64>>,
    squares: &Image<Luma<u64>>,
    window: Window,
) -> (f64, f64) {
    let n = window.pixel_count();
    let mean = window.sum(sum) / n;
    let variance = (window.sum(squares) / n - mean * mean).max(0.0);
    (mean, variance.sqrt())
}

fn threshold_with(image: &GrayImage, threshold: impl Fn(u32, u32) -> f32) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let v = image.get_pixel(x, y)[0] as f32;
        Luma([if v > threshold(x, y) { PAPER } else { INK }])
    })
}

/// Sauvola local thresholding: `T = m · (1 + k · (s / 128 − 1))` over a
/// `window`-sized neighbourhood.
pub fn sauvola(image: &GrayImage, window: u32, k: f32) -> GrayImage {
    let sum = integral_image::<_, u64>(image);
    let squares = integral_squared_image::<_, u64>(image);
    let radius = window / 2;
    let k = f64::from(k);
    threshold_with(image, |x, y| {
        let (mean, std_dev) = window_stats(&sum, &squares, Window::around(x, y, radius, image.dimensions()));
        (mean * (1.0 + k * (std_dev / SAUVOLA_RANGE - 1.0))) as f32
    })
}

/// Local mean minus `offset` over a `block`-sized neighbourhood.
pub fn adaptive_mean(image: &GrayImage, block: u32, offset: f32) -> GrayImage {
    let sum = integral_image::<_, u64>(image);
    let radius = block / 2;
    threshold_with(image, |x, y| {
        let window = Window::around(x, y, radius, image.dimensions());
        (window.sum(&sum) / window.pixel_count()) as f32 - offset
    })
}

pub fn otsu(image: &GrayImage) -> GrayImage {
    let level = otsu_level(image) as f32;
    threshold_with(image, |_, _| level)
}

/// Paper wherever either the global Otsu or the local adaptive-mean result
/// says paper.
pub fn otsu_adaptive_union(image: &GrayImage, block: u32, offset: f32) -> GrayImage {
    let global = otsu(image);
    let local = adaptive_mean(image, block, offset);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([global.get_pixel(x, y)[0].max(local.get_pixel(x, y)[0])])
    })
}

/// Close then open the paper (the nonzero foreground) with a 3×3 square:
/// isolated ink specks disappear, then pinholes inside strokes fill in.
pub fn despeckle(binary: &GrayImage) -> GrayImage {
    let closed = close(binary, Norm::LInf, 1);
    open(&closed, Norm::LInf, 1)
}

pub fn is_ink(value: u8) -> bool {
    value < 128
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_with_block(width: u32, height: u32, paper: u8, ink: u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if (20..30).contains(&x) && (10..30).contains(&y) {
                Luma([ink])
            } else {
                Luma([paper])
            }
        })
    }

    fn ink_count(image: &GrayImage) -> usize {
        image.pixels().filter(|p| p[0] == INK).count()
    }

    #[test]
    fn sauvola_separates_block_from_paper() {
        let binary = sauvola(&page_with_block(60, 50, 230, 20), 41, 0.2);
        assert_eq!(ink_count(&binary), 200);
        assert_eq!(binary.get_pixel(25, 20)[0], INK);
        assert_eq!(binary.get_pixel(5, 5)[0], PAPER);
    }

    #[test]
    fn sauvola_keeps_blank_page_blank() {
        let blank = GrayImage::from_pixel(50, 50, Luma([240]));
        assert_eq!(ink_count(&sauvola(&blank, 41, 0.2)), 0);
    }

    #[test]
    fn union_fallback_finds_block() {
        let binary = otsu_adaptive_union(&page_with_block(60, 50, 230, 20), 35, 15.0);
        assert_eq!(binary.get_pixel(25, 20)[0], INK);
        assert_eq!(binary.get_pixel(55, 45)[0], PAPER);
        assert!(binary.pixels().all(|p| p[0] == INK || p[0] == PAPER));
    }

    #[test]
    fn despeckle_removes_single_pixel_noise() {
        let mut binary = page_with_block(60, 50, PAPER, INK);
        binary.put_pixel(50, 40, Luma([INK]));
        let cleaned = despeckle(&binary);
        assert_eq!(cleaned.get_pixel(50, 40)[0], PAPER);
        assert_eq!(ink_count(&cleaned), 200);
    }

    #[test]
    fn window_is_clipped_at_the_border() {
        assert_eq!(
            Window::around(1, 8, 3, (10, 10)),
            Window { left: 0, top: 5, right: 4, bottom: 9 }
        );
        assert_eq!(Window::around(1, 8, 3, (10, 10)).pixel_count(), 25.0);
    }

    #[test]
    fn window_stats_match_direct_computation() {
        let image = GrayImage::from_raw(3, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let sum = integral_image::<_, u64>(&image);
        let squares = integral_squared_image::<_, u64>(&image);

        // Right two columns: 2, 3, 5, 6.
        let (mean, std_dev) = window_stats(&sum, &squares, Window::around(2, 0, 1, (3, 2)));
        assert!((mean - 4.0).abs() < 1e-9);
        assert!((std_dev - 2.5f64.sqrt()).abs() < 1e-9);

        let uniform = GrayImage::from_pixel(10, 10, Luma([100]));
        let (mean, std_dev) = window_stats(
            &integral_image::<_, u64>(&uniform),
            &integral_squared_image::<_, u64>(&uniform),
            Window::around(0, 0, 3, (10, 10)),
        );
        assert_eq!(mean, 100.0);
        assert_eq!(std_dev, 0.0);
    }
}
