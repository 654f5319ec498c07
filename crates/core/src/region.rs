//! Pointer-driven rectangle selection over a scaled source image.
//!
//! Pointer positions arrive in display pixels; selections are always kept in
//! source-image pixels so they can be cropped without further conversion.

use thiserror::Error;

use crate::model::{ImageSize, SelectionRect};

pub const MIN_ZOOM: f64 = 0.8;
pub const MAX_ZOOM: f64 = 2.5;
pub const ZOOM_STEP: f64 = 0.1;

/// Distance in display pixels within which a corner handle is grabbed.
pub const HANDLE_HIT_RADIUS: f64 = 8.0;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegionError {
    #[error("cannot select inside an empty image ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Size of the on-screen area, in display pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

impl DisplaySize {
    pub const DEFAULT_BOX: Self = Self::new(720.0, 540.0);

    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Clamp a zoom factor into `[MIN_ZOOM, MAX_ZOOM]`; non-finite input resets to 1.
#[must_use]
pub fn clamp_zoom(zoom: f64) -> f64 {
    if zoom.is_finite() {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}

/// Zoom after one wheel notch, or `None` when the modifier key is not held.
///
/// Scrolling up (negative `delta_y`) zooms in.
#[must_use]
pub fn wheel_zoom(current: f64, delta_y: f64, modifier: bool) -> Option<f64> {
    if !modifier || delta_y == 0.0 || !delta_y.is_finite() {
        return None;
    }
    let direction = if delta_y < 0.0 { 1.0 } else { -1.0 };
    let stepped = ((clamp_zoom(current) + direction * ZOOM_STEP) * 10.0).round() / 10.0;
    Some(clamp_zoom(stepped))
}

//
// ─── TRANSFORM ────────────────────────────────────────────────────────────────
//

/// Maps between display pixels and source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    image: ImageSize,
    max_box: DisplaySize,
    zoom: f64,
    scale: f64,
}

impl DisplayTransform {
    /// # Errors
    ///
    /// Returns `RegionError::EmptyImage` when either image dimension is zero.
    pub fn new(image: ImageSize, max_box: DisplaySize, zoom: f64) -> Result<Self, RegionError> {
        if image.is_empty() {
            return Err(RegionError::EmptyImage {
                width: image.width,
                height: image.height,
            });
        }
        let mut transform = Self {
            image,
            max_box,
            zoom: 1.0,
            scale: 1.0,
        };
        transform.set_zoom(zoom);
        Ok(transform)
    }

    /// Apply a new zoom factor and recompute the effective scale.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = clamp_zoom(zoom);
        let width = f64::from(self.image.width);
        let height = f64::from(self.image.height);

        // Base fit never upscales; the zoomed result is clamped back into the box.
        let base = (self.max_box.width / width)
            .min(self.max_box.height / height)
            .min(1.0);
        let zoomed = base * self.zoom;
        let fit = (self.max_box.width / (width * zoomed))
            .min(self.max_box.height / (height * zoomed))
            .min(1.0);
        self.scale = zoomed * fit;
    }

    #[must_use]
    pub fn image(&self) -> ImageSize {
        self.image
    }

    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Display pixels per source pixel.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[must_use]
    pub fn display_size(&self) -> DisplaySize {
        DisplaySize::new(
            f64::from(self.image.width) * self.scale,
            f64::from(self.image.height) * self.scale,
        )
    }

    /// Display point to source pixel, clamped to `[0, w] × [0, h]`.
    #[must_use]
    pub fn to_source(&self, x: f64, y: f64) -> (u32, u32) {
        (
            to_source_axis(x, self.scale, self.image.width),
            to_source_axis(y, self.scale, self.image.height),
        )
    }

    #[must_use]
    pub fn to_display(&self, x: u32, y: u32) -> (f64, f64) {
        (f64::from(x) * self.scale, f64::from(y) * self.scale)
    }

    /// Selection rectangle as `(left, top, width, height)` in display pixels.
    #[must_use]
    pub fn display_rect(&self, rect: &SelectionRect) -> (f64, f64, f64, f64) {
        let (left, top) = self.to_display(rect.x, rect.y);
        (
            left,
            top,
            f64::from(rect.width) * self.scale,
            f64::from(rect.height) * self.scale,
        )
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_source_axis(display: f64, scale: f64, limit: u32) -> u32 {
    if !display.is_finite() || display <= 0.0 {
        return 0;
    }
    let source = (display / scale).round();
    if source >= f64::from(limit) {
        limit
    } else {
        source as u32
    }
}

//
// ─── GESTURES ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointerId(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Pen,
    Touch,
}

impl PointerKind {
    /// Parse a DOM `pointerType` string; unknown kinds behave like a mouse.
    #[must_use]
    pub fn from_dom(kind: &str) -> Self {
        match kind {
            "touch" => Self::Touch,
            "pen" => Self::Pen,
            _ => Self::Mouse,
        }
    }
}

/// One pointer event in display coordinates relative to the image's top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub id: PointerId,
    pub kind: PointerKind,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Handle {
    pub const ALL: [Self; 4] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
    ];

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::TopLeft => Self::BottomRight,
            Self::TopRight => Self::BottomLeft,
            Self::BottomLeft => Self::TopRight,
            Self::BottomRight => Self::TopLeft,
        }
    }

    /// Source-pixel position of this corner on `rect`.
    #[must_use]
    pub fn corner(self, rect: &SelectionRect) -> (u32, u32) {
        match self {
            Self::TopLeft => rect.top_left(),
            Self::TopRight => rect.top_right(),
            Self::BottomLeft => rect.bottom_left(),
            Self::BottomRight => rect.bottom_right(),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "nw",
            Self::TopRight => "ne",
            Self::BottomLeft => "sw",
            Self::BottomRight => "se",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gesture {
    Create { anchor: (u32, u32) },
    Resize { handle: Handle, anchor: (u32, u32) },
}

impl Gesture {
    fn anchor(self) -> (u32, u32) {
        match self {
            Self::Create { anchor } | Self::Resize { anchor, .. } => anchor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GestureOwner {
    pointer: PointerId,
    gesture: Gesture,
}

/// Selection updates reported to the capture flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    /// The rectangle moved during a drag.
    Changed(SelectionRect),
    /// The drag ended on pointer release.
    Completed(SelectionRect),
}

impl SelectionEvent {
    #[must_use]
    pub fn rect(&self) -> SelectionRect {
        match self {
            Self::Changed(rect) | Self::Completed(rect) => *rect,
        }
    }
}

/// Single-pointer create/resize gesture machine.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSelector {
    transform: DisplayTransform,
    selection: Option<SelectionRect>,
    owner: Option<GestureOwner>,
}

impl RegionSelector {
    /// # Errors
    ///
    /// Returns `RegionError::EmptyImage` for a zero-sized image.
    pub fn new(image: ImageSize, max_box: DisplaySize) -> Result<Self, RegionError> {
        Ok(Self {
            transform: DisplayTransform::new(image, max_box, 1.0)?,
            selection: None,
            owner: None,
        })
    }

    /// Start from an existing selection, re-normalized into the image.
    #[must_use]
    pub fn with_selection(mut self, rect: SelectionRect) -> Self {
        let image = self.transform.image();
        self.selection = Some(SelectionRect::from_corners(
            rect.top_left(),
            rect.bottom_right(),
            image,
        ));
        self
    }

    #[must_use]
    pub fn transform(&self) -> &DisplayTransform {
        &self.transform
    }

    #[must_use]
    pub fn selection(&self) -> Option<SelectionRect> {
        self.selection
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.owner.is_some()
    }

    /// Handle being dragged, if the current gesture is a resize.
    #[must_use]
    pub fn active_handle(&self) -> Option<Handle> {
        match self.owner?.gesture {
            Gesture::Resize { handle, .. } => Some(handle),
            Gesture::Create { .. } => None,
        }
    }

    pub fn clear(&mut self) {
        self.selection = None;
        self.owner = None;
    }

    /// Handle whose corner lies within [`HANDLE_HIT_RADIUS`] of a display point.
    #[must_use]
    pub fn hit_handle(&self, x: f64, y: f64) -> Option<Handle> {
        let rect = self.selection?;
        Handle::ALL.into_iter().find(|handle| {
            let (cx, cy) = handle.corner(&rect);
            let (dx, dy) = self.transform.to_display(cx, cy);
            (dx - x).hypot(dy - y) <= HANDLE_HIT_RADIUS
        })
    }

    pub fn pointer_down(&mut self, input: PointerInput) -> Option<SelectionEvent> {
        if input.kind == PointerKind::Touch || self.owner.is_some() {
            return None;
        }
        let image = self.transform.image();
        let point = self.transform.to_source(input.x, input.y);

        let gesture = match (self.hit_handle(input.x, input.y), self.selection) {
            (Some(handle), Some(rect)) => Gesture::Resize {
                handle,
                anchor: handle.opposite().corner(&rect),
            },
            _ => Gesture::Create { anchor: point },
        };
        self.owner = Some(GestureOwner {
            pointer: input.id,
            gesture,
        });

        let rect = match gesture {
            Gesture::Create { anchor } => SelectionRect::from_corners(anchor, anchor, image),
            Gesture::Resize { .. } => SelectionRect::from_corners(gesture.anchor(), point, image),
        };
        self.selection = Some(rect);
        Some(SelectionEvent::Changed(rect))
    }

    pub fn pointer_move(&mut self, input: PointerInput) -> Option<SelectionEvent> {
        let owner = self.owner.filter(|owner| owner.pointer == input.id)?;
        let point = self.transform.to_source(input.x, input.y);
        let rect = SelectionRect::from_corners(owner.gesture.anchor(), point, self.transform.image());
        if self.selection == Some(rect) {
            return None;
        }
        self.selection = Some(rect);
        Some(SelectionEvent::Changed(rect))
    }

    /// Finish the gesture at the release point, clamped to the image.
    ///
    /// Also used when the pointer leaves the stage or loses capture.
    pub fn pointer_up(&mut self, input: PointerInput) -> Option<SelectionEvent> {
        let owner = self.owner.filter(|owner| owner.pointer == input.id)?;
        self.owner = None;
        let point = self.transform.to_source(input.x, input.y);
        let rect = SelectionRect::from_corners(owner.gesture.anchor(), point, self.transform.image());
        self.selection = Some(rect);
        Some(SelectionEvent::Completed(rect))
    }

    /// End the gesture without reporting completion.
    pub fn pointer_cancel(&mut self, id: PointerId) {
        if self.owner.is_some_and(|owner| owner.pointer == id) {
            self.owner = None;
        }
    }

    /// Returns the new zoom when the wheel changed it.
    pub fn wheel(&mut self, delta_y: f64, modifier: bool) -> Option<f64> {
        let zoom = wheel_zoom(self.transform.zoom(), delta_y, modifier)?;
        if (zoom - self.transform.zoom()).abs() < f64::EPSILON {
            return None;
        }
        self.transform.set_zoom(zoom);
        Some(zoom)
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.transform.set_zoom(zoom);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: ImageSize = ImageSize::new(800, 500);
    const MOUSE: PointerId = PointerId(1);

    fn at(x: f64, y: f64) -> PointerInput {
        PointerInput {
            id: MOUSE,
            kind: PointerKind::Mouse,
            x,
            y,
        }
    }

    /// Selector whose display scale is exactly 1.
    fn unscaled() -> RegionSelector {
        RegionSelector::new(PAGE, DisplaySize::new(800.0, 500.0)).unwrap()
    }

    fn drag(selector: &mut RegionSelector, from: (f64, f64), to: (f64, f64)) -> SelectionRect {
        selector.pointer_down(at(from.0, from.1));
        selector.pointer_move(at(to.0, to.1));
        selector.pointer_up(at(to.0, to.1)).unwrap().rect()
    }

    #[test]
    fn zoom_is_clamped() {
        assert!((clamp_zoom(10.0) - MAX_ZOOM).abs() < f64::EPSILON);
        assert!((clamp_zoom(0.1) - MIN_ZOOM).abs() < f64::EPSILON);
        assert!((clamp_zoom(f64::NAN) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn wheel_zoom_requires_modifier_and_steps() {
        assert_eq!(wheel_zoom(1.0, -120.0, false), None);
        assert_eq!(wheel_zoom(1.0, -120.0, true), Some(1.1));
        assert_eq!(wheel_zoom(1.0, 120.0, true), Some(0.9));
        assert_eq!(wheel_zoom(2.5, -1.0, true), Some(2.5));
        assert_eq!(wheel_zoom(0.8, 1.0, true), Some(0.8));
    }

    #[test]
    fn empty_image_is_rejected() {
        let err = RegionSelector::new(ImageSize::new(0, 10), DisplaySize::DEFAULT_BOX).unwrap_err();
        assert_eq!(err, RegionError::EmptyImage { width: 0, height: 10 });
    }

    #[test]
    fn base_fit_respects_box_and_aspect() {
        let transform =
            DisplayTransform::new(ImageSize::new(1440, 540), DisplaySize::DEFAULT_BOX, 1.0).unwrap();
        assert!((transform.scale() - 0.5).abs() < 1e-9);
        let size = transform.display_size();
        assert!((size.width - 720.0).abs() < 1e-9);
        assert!((size.height - 270.0).abs() < 1e-9);
    }

    #[test]
    fn zoomed_display_stays_inside_box() {
        let mut transform =
            DisplayTransform::new(ImageSize::new(200, 100), DisplaySize::DEFAULT_BOX, 1.0).unwrap();
        assert!((transform.scale() - 1.0).abs() < 1e-9);
        transform.set_zoom(2.0);
        assert!((transform.scale() - 2.0).abs() < 1e-9);
        transform.set_zoom(10.0);
        let size = transform.display_size();
        assert!(size.width <= 720.0 + 1e-9);
        assert!(size.height <= 540.0 + 1e-9);
        assert!((transform.zoom() - MAX_ZOOM).abs() < f64::EPSILON);
    }

    #[test]
    fn drag_produces_normalized_rect() {
        let mut selector = unscaled();
        let rect = drag(&mut selector, (10.0, 10.0), (100.0, 150.0));
        assert_eq!(
            rect,
            SelectionRect {
                x: 10,
                y: 10,
                width: 90,
                height: 140
            }
        );
    }

    #[test]
    fn drags_always_stay_inside_the_image() {
        let points = [
            (-50.0, -50.0),
            (0.0, 0.0),
            (799.6, 499.6),
            (900.0, 20.0),
            (400.0, 9000.0),
            (12.0, 12.0),
        ];
        for from in points {
            for to in points {
                let mut selector = unscaled();
                let rect = drag(&mut selector, from, to);
                assert!(rect.width >= 1 && rect.height >= 1);
                assert!(rect.fits_within(PAGE), "{from:?} -> {to:?} gave {rect:?}");
            }
        }
    }

    #[test]
    fn resize_keeps_opposite_corner() {
        let mut selector = unscaled();
        drag(&mut selector, (10.0, 10.0), (100.0, 150.0));

        // Grab the top-left handle from within the hit radius.
        selector.pointer_down(at(14.0, 7.0));
        selector.pointer_move(at(40.0, 60.0));
        let rect = selector.pointer_up(at(40.0, 60.0)).unwrap().rect();
        assert_eq!(rect.top_left(), (40, 60));
        assert_eq!(rect.bottom_right(), (100, 150));

        selector.pointer_down(at(100.0, 150.0));
        selector.pointer_move(at(300.0, 200.0));
        let rect = selector.pointer_up(at(300.0, 200.0)).unwrap().rect();
        assert_eq!(rect.top_left(), (40, 60));
        assert_eq!(rect.bottom_right(), (300, 200));

        // Top-right handle pins the bottom-left corner.
        selector.pointer_down(at(298.0, 62.0));
        let rect = selector.pointer_up(at(350.0, 30.0)).unwrap().rect();
        assert_eq!(rect.top_left(), (40, 30));
        assert_eq!(rect.bottom_right(), (350, 200));

        // Bottom-left handle pins the top-right corner.
        selector.pointer_down(at(41.0, 199.0));
        let rect = selector.pointer_up(at(20.0, 260.0)).unwrap().rect();
        assert_eq!(rect.top_left(), (20, 30));
        assert_eq!(rect.bottom_right(), (350, 260));
    }

    #[test]
    fn release_outside_the_stage_completes_at_the_edge() {
        let mut selector = unscaled();
        selector.pointer_down(at(10.0, 10.0));
        selector.pointer_move(at(200.0, 200.0));

        let completed = selector.pointer_up(at(-40.0, 9000.0));
        assert_eq!(
            completed,
            Some(SelectionEvent::Completed(SelectionRect {
                x: 0,
                y: 10,
                width: 10,
                height: 490
            }))
        );
        assert!(!selector.is_dragging());
        assert_eq!(selector.pointer_move(at(300.0, 300.0)), None);
        assert!(selector.pointer_down(at(400.0, 400.0)).is_some());
    }

    #[test]
    fn only_the_owning_pointer_drives_the_gesture() {
        let mut selector = unscaled();
        selector.pointer_down(at(10.0, 10.0));

        let other = PointerInput {
            id: PointerId(2),
            kind: PointerKind::Pen,
            x: 300.0,
            y: 300.0,
        };
        assert_eq!(selector.pointer_down(other), None);
        assert_eq!(selector.pointer_move(other), None);
        assert_eq!(selector.pointer_up(other), None);
        assert!(selector.is_dragging());

        let completed = selector.pointer_up(at(50.0, 50.0));
        assert!(matches!(completed, Some(SelectionEvent::Completed(_))));
    }

    #[test]
    fn touch_pointers_are_ignored() {
        let mut selector = unscaled();
        let touch = PointerInput {
            id: PointerId(7),
            kind: PointerKind::from_dom("touch"),
            x: 10.0,
            y: 10.0,
        };
        assert_eq!(selector.pointer_down(touch), None);
        assert_eq!(selector.selection(), None);
    }

    #[test]
    fn cancel_ends_gesture_without_completion() {
        let mut selector = unscaled();
        selector.pointer_down(at(10.0, 10.0));
        selector.pointer_move(at(60.0, 60.0));
        selector.pointer_cancel(MOUSE);
        assert!(!selector.is_dragging());
        assert_eq!(selector.pointer_up(at(60.0, 60.0)), None);
        assert!(selector.selection().is_some());
    }

    #[test]
    fn pointer_maps_through_display_scale() {
        let mut selector =
            RegionSelector::new(ImageSize::new(1440, 1080), DisplaySize::DEFAULT_BOX).unwrap();
        let rect = drag(&mut selector, (10.0, 10.0), (100.0, 150.0));
        assert_eq!(
            rect,
            SelectionRect {
                x: 20,
                y: 20,
                width: 180,
                height: 280
            }
        );
        assert_eq!(selector.wheel(-100.0, true), Some(1.1));
        assert_eq!(selector.wheel(-100.0, false), None);
    }
}
