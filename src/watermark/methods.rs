//! The pure-pixel removal methods and the masks handed to inpainters.
//!
//! All methods work on the `size x size` square at the corner in
//! corner-local coordinates (see [`CornerFrame`]) and never touch alpha.

use image::{imageops, GrayImage, Luma, RgbaImage};

use super::corner::CornerFrame;
use super::{CloneBlend, CloneSource, PixelRect};
use crate::blending::{blend_rgb, mean_rgb, smoothstep};

/// Right triangle with both legs `size` long, anchored at the true corner.
pub(crate) fn triangle_mask(frame: CornerFrame, width: u32, height: u32, size: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let (i, j) = frame.to_local(x, y);
        let inside = u64::from(i) + u64::from(j) < u64::from(size);
        Luma([if inside { 255 } else { 0 }])
    })
}

/// Filled circle of `radius` around `center`.
pub(crate) fn ellipse_mask(width: u32, height: u32, center: (u32, u32), radius: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let to_i32 = |v: u32| i32::try_from(v).unwrap_or(i32::MAX);
    imageproc::drawing::draw_filled_ellipse_mut(
        &mut mask,
        (to_i32(center.0), to_i32(center.1)),
        to_i32(radius),
        to_i32(radius),
        Luma([255]),
    );
    mask
}

impl CloneBlend {
    /// Weight of the cloned source at local `(i, j)`; the rest is original.
    fn weight(self, i: u32, j: u32, size: u32) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let (fi, fj, fs) = (i as f32, j as f32, size as f32);
        match self {
            Self::None => 1.0,
            // Fade in from the outer vertical edge of the patch.
            Self::Horizontal => {
                let feather = (fs / 4.0).max(1.0);
                smoothstep(0.0, feather, fs - 1.0 - fi)
            }
            // Full clone around the corner, fading out toward the patch border.
            Self::Radial => 1.0 - smoothstep(0.75, 1.0, fi.hypot(fj) / fs),
        }
    }
}

fn source_offset(size: u32, offset_factor: f32) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let scaled = (size as f32 * offset_factor.max(0.0)).round() as u32;
    scaled.max(size)
}

/// Copy a same-size patch from further along one edge over the corner square.
///
/// Tries `source` first and the other direction second; `None` when the image
/// is too small for either.
pub(crate) fn clone_patch(
    image: &RgbaImage,
    frame: CornerFrame,
    size: u32,
    source: CloneSource,
    offset_factor: f32,
    blend: CloneBlend,
) -> Option<(RgbaImage, CloneSource)> {
    let (width, height) = image.dimensions();
    let offset = source_offset(size, offset_factor);
    let fits = |s: CloneSource| match s {
        CloneSource::Above => u64::from(size) + u64::from(offset) <= u64::from(height),
        CloneSource::Beside => u64::from(size) + u64::from(offset) <= u64::from(width),
    };
    let used = [source, source.other()].into_iter().find(|&s| fits(s))?;

    let mut out = image.clone();
    for j in 0..size {
        for i in 0..size {
            let target = frame.to_image(i, j);
            let from = match used {
                CloneSource::Above => frame.to_image(i, j + offset),
                CloneSource::Beside => frame.to_image(i + offset, j),
            };
            let (Some((tx, ty)), Some((sx, sy))) = (target, from) else {
                continue;
            };
            let src = image.get_pixel(sx, sy);
            blend_rgb(
                out.get_pixel_mut(tx, ty),
                [src[0], src[1], src[2]],
                blend.weight(i, j, size),
            );
        }
    }
    Some((out, used))
}

/// Blend the corner square toward the mean colour of an adjacent patch.
///
/// The blend factor grows linearly with the Euclidean distance into the
/// corner: 0 wherever the square meets the rest of the image, scaled by
/// `falloff` and clamped to 1 near the image corner.
pub(crate) fn radial_fill(
    image: &RgbaImage,
    frame: CornerFrame,
    size: u32,
    sample: u32,
    falloff: f32,
) -> RgbaImage {
    let whole = PixelRect {
        x: 0,
        y: 0,
        width: image.width(),
        height: image.height(),
    };
    let avg = frame
        .rect(size, size, sample, sample)
        .and_then(|r| mean_rgb(image, r))
        .or_else(|| mean_rgb(image, whole))
        .unwrap_or([0, 0, 0]);
    tracing::debug!(avg = ?avg, "radial fill colour");

    #[allow(clippy::cast_precision_loss)]
    let span = size.saturating_sub(1).max(1) as f32;
    let mut out = image.clone();
    for j in 0..size {
        for i in 0..size {
            let Some((x, y)) = frame.to_image(i, j) else {
                continue;
            };
            #[allow(clippy::cast_precision_loss)]
            let r = (i as f32).hypot(j as f32);
            let t = ((span - r) / span * falloff).clamp(0.0, 1.0);
            blend_rgb(out.get_pixel_mut(x, y), avg, t);
        }
    }
    out
}

/// Trim `margin` pixels off the two edges meeting at the corner, then scale
/// the rest back up to the original size.
pub(crate) fn crop_rescale(image: &RgbaImage, frame: CornerFrame, margin: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let margin = margin.min(width - 1).min(height - 1);
    if margin == 0 {
        return image.clone();
    }
    let Some(rect) = frame.rect(margin, margin, width - margin, height - margin) else {
        return image.clone();
    };
    let cropped = imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image();
    imageops::resize(&cropped, width, height, imageops::FilterType::Lanczos3)
}
