//! Pixel-to-plane mapping for recentre clicks.
//!
//! Screen y grows downward while the imaginary axis grows upward, so the
//! vertical offset is flipped. Both x and the real axis grow rightward.

use crate::error::PreconditionError;
use crate::params::ViewportParameters;
use crate::store::ImageInfo;

/// A click position in image pixels, `(0, 0)` at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickPoint {
    pub x: f64,
    pub y: f64,
}

impl ClickPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Whole-pixel `(row, col)` sent alongside a recentre request.
    pub fn row_col(self) -> (u32, u32) {
        (self.y.max(0.0) as u32, self.x.max(0.0) as u32)
    }
}

/// Pixel size of the image the click landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width_px: u32,
    pub height_px: u32,
}

impl ImageDimensions {
    pub fn new(width_px: u32, height_px: u32) -> Self {
        Self {
            width_px,
            height_px,
        }
    }

    /// The size an image generated from `params` comes back at.
    pub fn of_params(params: &ViewportParameters) -> Self {
        Self::new(params.cols, params.rows)
    }
}

impl From<&ImageInfo> for ImageDimensions {
    fn from(image: &ImageInfo) -> Self {
        Self::new(image.width_px, image.height_px)
    }
}

/// A point on the complex plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanePoint {
    pub re: f64,
    pub im: f64,
}

/// Map a click on the rendered image to the plane point it shows.
///
/// Clicking the geometric centre of the image returns `(center_re,
/// center_im)` unchanged. Zero-sized images are rejected instead of
/// producing infinities.
pub fn map_click_to_center(
    click: ClickPoint,
    image: ImageDimensions,
    center_re: f64,
    center_im: f64,
    pixel_division: f64,
) -> Result<PlanePoint, PreconditionError> {
    if image.width_px == 0 || image.height_px == 0 {
        return Err(PreconditionError::ZeroImageDimension {
            width: image.width_px,
            height: image.height_px,
        });
    }
    if !click.x.is_finite() || !click.y.is_finite() {
        return Err(PreconditionError::NonFiniteClick {
            x: click.x,
            y: click.y,
        });
    }

    let half_w = image.width_px as f64 / 2.0;
    let half_h = image.height_px as f64 / 2.0;
    let re = center_re + (click.x - half_w) * pixel_division;
    let im = center_im + (half_h - click.y) * pixel_division;

    if !re.is_finite() || !im.is_finite() {
        return Err(PreconditionError::NonFiniteCenter { re, im });
    }
    Ok(PlanePoint { re, im })
}
