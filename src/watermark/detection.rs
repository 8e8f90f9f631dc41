//! Contour-based watermark localisation.
//!
//! Searches a bounded window at the target corner for a small, roughly
//! square or diamond-shaped mark:
//! 1. **Edges**: grayscale, light Gaussian blur, Canny, then dilation to merge
//!    the fragments of the mark's outline
//! 2. **Contours**: outermost borders of the edge blobs
//! 3. **Filter and score**: keep candidates with plausible area and aspect
//!    ratio, score each as `area / (distance_to_corner + 1)`
//!
//! A miss is not an error: callers fall back to the nominal corner offset.

use image::{imageops, GrayImage, RgbaImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};

use super::corner::{Corner, CornerFrame};

/// Tunables for corner watermark detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Side of the square search window at the corner, in pixels.
    pub window: u32,
    /// Gaussian blur sigma applied before edge detection.
    pub blur_sigma: f32,
    /// Canny low threshold.
    pub canny_low: f32,
    /// Canny high threshold.
    pub canny_high: f32,
    /// Dilation radius (Chebyshev) used to merge edge fragments.
    pub dilate_radius: u8,
    /// Smallest accepted contour area in px².
    pub min_area: f64,
    /// Largest accepted contour area in px².
    pub max_area: f64,
    /// Smallest accepted bounding-box aspect ratio (width / height).
    pub min_aspect: f64,
    /// Largest accepted bounding-box aspect ratio (width / height).
    pub max_aspect: f64,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            window: 100,
            blur_sigma: 1.0,
            canny_low: 50.0,
            canny_high: 150.0,
            dilate_radius: 1,
            min_area: 100.0,
            max_area: 3000.0,
            min_aspect: 0.5,
            max_aspect: 2.0,
        }
    }
}

/// A located watermark candidate, in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Centre of the candidate's bounding box.
    pub center: (u32, u32),
    /// Larger side of the bounding box.
    pub size: u32,
    /// Enclosed contour area in px².
    pub area: f64,
    /// `area / (distance_to_corner + 1)`.
    pub score: f64,
}

/// Axis-aligned bounds of a contour, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
}

impl Bounds {
    fn of(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let init = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        Some(points.iter().fold(init, |b, p| Self {
            min_x: b.min_x.min(p.x),
            min_y: b.min_y.min(p.y),
            max_x: b.max_x.max(p.x),
            max_y: b.max_y.max(p.y),
        }))
    }

    fn width(self) -> i32 {
        self.max_x - self.min_x + 1
    }

    fn height(self) -> i32 {
        self.max_y - self.min_y + 1
    }

    fn aspect(self) -> f64 {
        f64::from(self.width()) / f64::from(self.height())
    }

    fn center(self) -> (f64, f64) {
        (
            f64::from(self.min_x + self.max_x) / 2.0,
            f64::from(self.min_y + self.max_y) / 2.0,
        )
    }
}

/// Enclosed area of a closed polygon (shoelace formula).
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let area = twice.unsigned_abs() as f64 / 2.0;
    area
}

/// Edge map of a window: grayscale, blur, Canny, dilate.
fn edge_map(window: &RgbaImage, params: &DetectionParams) -> GrayImage {
    let gray = imageops::grayscale(window);
    let blurred = if params.blur_sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(&gray, params.blur_sigma)
    } else {
        gray
    };
    let edges = imageproc::edges::canny(&blurred, params.canny_low, params.canny_high);
    if params.dilate_radius == 0 {
        edges
    } else {
        imageproc::morphology::dilate(&edges, Norm::LInf, params.dilate_radius)
    }
}

/// Locate a watermark near `corner`.
///
/// Returns the highest-scoring candidate, or `None` when nothing passes the
/// area and aspect filters.
#[must_use]
pub fn detect_watermark(
    image: &RgbaImage,
    corner: Corner,
    params: &DetectionParams,
) -> Option<Detection> {
    let frame = CornerFrame::new(corner, image.width(), image.height());
    let rect = frame.rect(0, 0, params.window, params.window)?;
    let window = imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image();
    let edges = edge_map(&window, params);

    let (corner_x, corner_y) = frame.corner_point();
    let mut best: Option<Detection> = None;

    for contour in find_contours::<i32>(&edges) {
        // Outermost borders only; holes and nested shapes are part of a parent.
        if contour.border_type != BorderType::Outer || contour.parent.is_some() {
            continue;
        }
        let Some(bounds) = Bounds::of(&contour.points) else {
            continue;
        };
        let area = polygon_area(&contour.points);
        if !(params.min_area..=params.max_area).contains(&area) {
            continue;
        }
        if !(params.min_aspect..=params.max_aspect).contains(&bounds.aspect()) {
            continue;
        }

        let (cx, cy) = bounds.center();
        let cx = cx + f64::from(rect.x);
        let cy = cy + f64::from(rect.y);
        let distance = (cx - f64::from(corner_x)).hypot(cy - f64::from(corner_y));
        let score = area / (distance + 1.0);

        if best.is_none_or(|b| score > b.score) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let center = (cx.round() as u32, cy.round() as u32);
            #[allow(clippy::cast_sign_loss)]
            let size = bounds.width().max(bounds.height()) as u32;
            best = Some(Detection {
                center,
                size,
                area,
                score,
            });
        }
    }

    match &best {
        Some(d) => tracing::debug!(
            x = d.center.0,
            y = d.center.1,
            size = d.size,
            score = d.score,
            "watermark candidate found"
        ),
        None => tracing::debug!(?corner, "no watermark candidate in search window"),
    }
    best
}
