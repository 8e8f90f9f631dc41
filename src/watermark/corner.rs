//! Corner-relative geometry.
//!
//! Every removal method is written in corner-local coordinates: `(i, j)` is
//! the horizontal and vertical distance in pixels from the true corner pixel,
//! growing into the image. [`CornerFrame`] maps those back to image space.

use serde::{Deserialize, Serialize};

/// Image corner holding the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    /// Top-left corner.
    TopLeft,
    /// Top-right corner.
    TopRight,
    /// Bottom-left corner.
    BottomLeft,
    /// Bottom-right corner (where generators usually stamp their mark).
    #[default]
    BottomRight,
}

impl Corner {
    fn is_right(self) -> bool {
        matches!(self, Self::TopRight | Self::BottomRight)
    }

    fn is_bottom(self) -> bool {
        matches!(self, Self::BottomLeft | Self::BottomRight)
    }
}

impl std::str::FromStr for Corner {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "top-left" | "tl" => Ok(Self::TopLeft),
            "top-right" | "tr" => Ok(Self::TopRight),
            "bottom-left" | "bl" => Ok(Self::BottomLeft),
            "bottom-right" | "br" => Ok(Self::BottomRight),
            _ => Err(crate::Error::InvalidParameter(format!("unknown corner: {s}"))),
        }
    }
}

/// Axis-aligned pixel rectangle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// Number of pixels covered.
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Maps corner-local coordinates of one image to image coordinates.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CornerFrame {
    corner: Corner,
    width: u32,
    height: u32,
}

impl CornerFrame {
    pub(crate) fn new(corner: Corner, width: u32, height: u32) -> Self {
        Self {
            corner,
            width,
            height,
        }
    }

    /// Image pixel at local `(i, j)`, or `None` outside the image.
    pub(crate) fn to_image(self, i: u32, j: u32) -> Option<(u32, u32)> {
        if i >= self.width || j >= self.height {
            return None;
        }
        let x = if self.corner.is_right() { self.width - 1 - i } else { i };
        let y = if self.corner.is_bottom() { self.height - 1 - j } else { j };
        Some((x, y))
    }

    /// Local coordinates of image pixel `(x, y)`.
    pub(crate) fn to_local(self, x: u32, y: u32) -> (u32, u32) {
        let i = if self.corner.is_right() { self.width - 1 - x } else { x };
        let j = if self.corner.is_bottom() { self.height - 1 - y } else { y };
        (i, j)
    }

    /// Image rectangle covering local `[i0, i0 + len_i) x [j0, j0 + len_j)`,
    /// clipped to the image. `None` when nothing is left after clipping.
    pub(crate) fn rect(self, i0: u32, j0: u32, len_i: u32, len_j: u32) -> Option<PixelRect> {
        let i1 = i0.saturating_add(len_i).min(self.width);
        let j1 = j0.saturating_add(len_j).min(self.height);
        if i0 >= i1 || j0 >= j1 {
            return None;
        }
        let x = if self.corner.is_right() { self.width - i1 } else { i0 };
        let y = if self.corner.is_bottom() { self.height - j1 } else { j0 };
        Some(PixelRect {
            x,
            y,
            width: i1 - i0,
            height: j1 - j0,
        })
    }

    /// The true corner point (outer edge of the corner pixel) in image space.
    pub(crate) fn corner_point(self) -> (f32, f32) {
        #[allow(clippy::cast_precision_loss)]
        let x = if self.corner.is_right() { self.width as f32 } else { 0.0 };
        #[allow(clippy::cast_precision_loss)]
        let y = if self.corner.is_bottom() { self.height as f32 } else { 0.0 };
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_right_maps_origin_to_last_pixel() {
        let f = CornerFrame::new(Corner::BottomRight, 10, 8);
        assert_eq!(f.to_image(0, 0), Some((9, 7)));
        assert_eq!(f.to_image(9, 7), Some((0, 0)));
        assert_eq!(f.to_image(10, 0), None);
        assert_eq!(f.to_local(9, 7), (0, 0));
    }

    #[test]
    fn top_left_is_identity() {
        let f = CornerFrame::new(Corner::TopLeft, 10, 8);
        assert_eq!(f.to_image(3, 4), Some((3, 4)));
        assert_eq!(f.to_local(3, 4), (3, 4));
    }

    #[test]
    fn local_and_image_coordinates_round_trip_for_every_corner() {
        for corner in [Corner::TopLeft, Corner::TopRight, Corner::BottomLeft, Corner::BottomRight] {
            let f = CornerFrame::new(corner, 7, 5);
            let (x, y) = f.to_image(2, 1).unwrap();
            assert_eq!(f.to_local(x, y), (2, 1), "{corner:?}");
        }
    }

    #[test]
    fn rect_is_clipped_and_mirrored() {
        let f = CornerFrame::new(Corner::BottomRight, 100, 80);
        assert_eq!(
            f.rect(0, 0, 40, 40),
            Some(PixelRect { x: 60, y: 40, width: 40, height: 40 })
        );
        assert_eq!(
            f.rect(40, 80, 40, 40),
            None,
            "fully outside vertically"
        );
        assert_eq!(
            f.rect(90, 0, 40, 10),
            Some(PixelRect { x: 0, y: 70, width: 10, height: 10 })
        );

        let tl = CornerFrame::new(Corner::TopLeft, 100, 80);
        assert_eq!(
            tl.rect(5, 6, 10, 20),
            Some(PixelRect { x: 5, y: 6, width: 10, height: 20 })
        );
    }

    #[test]
    fn corner_parses_from_short_and_long_names() {
        assert_eq!("br".parse::<Corner>().unwrap(), Corner::BottomRight);
        assert_eq!("Top-Left".parse::<Corner>().unwrap(), Corner::TopLeft);
        assert!("middle".parse::<Corner>().is_err());
    }
}
