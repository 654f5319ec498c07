use serde::{Deserialize, Serialize};

/// Intrinsic pixel size of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Rendered source page a figure is cropped from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureSource {
    pub page: u32,
    /// Base64-encoded image bytes (PNG or JPEG).
    #[serde(alias = "image_base64")]
    pub image: String,
    pub width: u32,
    pub height: u32,
}

impl FigureSource {
    #[must_use]
    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }
}

/// Selected region in source-image pixels.
///
/// Always at least 1×1 and fully inside the image it was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SelectionRect {
    /// Normalize two diagonal corners into a rectangle inside `image`.
    ///
    /// Corners are clamped to the image first; width and height are at least
    /// one pixel and never extend past the right/bottom edge.
    #[must_use]
    pub fn from_corners(a: (u32, u32), b: (u32, u32), image: ImageSize) -> Self {
        let (x, width) = normalize_axis(a.0, b.0, image.width);
        let (y, height) = normalize_axis(a.1, b.1, image.height);
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn right(&self) -> u32 {
        self.x + self.width
    }

    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.y + self.height
    }

    #[must_use]
    pub const fn top_left(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    #[must_use]
    pub const fn top_right(&self) -> (u32, u32) {
        (self.right(), self.y)
    }

    #[must_use]
    pub const fn bottom_left(&self) -> (u32, u32) {
        (self.x, self.bottom())
    }

    #[must_use]
    pub const fn bottom_right(&self) -> (u32, u32) {
        (self.right(), self.bottom())
    }

    #[must_use]
    pub fn fits_within(&self, image: ImageSize) -> bool {
        self.width >= 1
            && self.height >= 1
            && self.right() <= image.width
            && self.bottom() <= image.height
    }

    #[must_use]
    pub fn to_bbox(&self, image: ImageSize) -> FigureBBox {
        FigureBBox {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            image_width: image.width,
            image_height: image.height,
        }
    }
}

fn normalize_axis(a: u32, b: u32, limit: u32) -> (u32, u32) {
    let a = a.min(limit);
    let b = b.min(limit);
    let start = a.min(b).min(limit.saturating_sub(1));
    let end = a.max(b);
    let length = end.saturating_sub(start).max(1).min(limit.saturating_sub(start).max(1));
    (start, length)
}

/// Crop metadata sent alongside an uploaded figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigureBBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub image_width: u32,
    pub image_height: u32,
}
