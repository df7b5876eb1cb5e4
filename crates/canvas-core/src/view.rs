//! Camera model for the infinite canvas.
//!
//! Pure math converting pointer/wheel deltas and zoom anchor points into a
//! 2D affine view transform (pan x/y plus a uniform scale). Screen-space
//! coordinates are pixels; world-space coordinates are canvas units.

use serde::{Deserialize, Serialize};

/// Minimum allowed zoom scale.
pub const MIN_SCALE: f64 = 0.2;
/// Maximum allowed zoom scale.
pub const MAX_SCALE: f64 = 4.0;

/// Per-event zoom ratio. Only the sign of the wheel delta selects the
/// direction; the magnitude is ignored.
const ZOOM_IN_FACTOR: f64 = 1.1;
const ZOOM_OUT_FACTOR: f64 = 0.9;

/// A 2D point, in either screen or world coordinates depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Camera offset and zoom for the canvas.
///
/// `x`/`y` are the screen-space translation applied to the world layer and
/// `scale` is the uniform zoom, always clamped to `[MIN_SCALE, MAX_SCALE]`.
/// The view is never persisted; a fresh session starts centered on the
/// world origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

impl ViewState {
    /// Shifts the view by raw screen-space deltas. No scale adjustment.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Zooms around `anchor` (screen coordinates), preserving the world
    /// point currently under the anchor.
    ///
    /// A positive `delta` zooms in, a negative one zooms out. The offset is
    /// recomputed so that `world(anchor)` before the zoom equals
    /// `world(anchor)` after it.
    pub fn zoom(&mut self, delta: f64, anchor: Point) {
        let factor = if delta > 0.0 {
            ZOOM_IN_FACTOR
        } else {
            ZOOM_OUT_FACTOR
        };
        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);

        let world_x = (anchor.x - self.x) / self.scale;
        let world_y = (anchor.y - self.y) / self.scale;

        self.x = anchor.x - world_x * new_scale;
        self.y = anchor.y - world_y * new_scale;
        self.scale = new_scale;
    }

    /// Converts a screen-space point into world coordinates under this view.
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.x) / self.scale,
            (screen.y - self.y) / self.scale,
        )
    }

    /// Returns a view that places the given world point at the visual
    /// center of a `viewport_width` x `viewport_height` viewport, at the
    /// given scale.
    pub fn centered_on(
        world_x: f64,
        world_y: f64,
        scale: f64,
        viewport_width: f64,
        viewport_height: f64,
    ) -> Self {
        Self {
            x: viewport_width / 2.0 - world_x * scale,
            y: viewport_height / 2.0 - world_y * scale,
            scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pan_adds_screen_deltas() {
        let mut view = ViewState::default();
        view.pan(10.0, -4.0);
        view.pan(2.5, 1.0);
        assert_eq!(view.x, 12.5);
        assert_eq!(view.y, -3.0);
        assert_eq!(view.scale, 1.0);
    }

    #[test]
    fn zoom_preserves_anchor_world_point() {
        // Anchor invariance must hold for any starting scale in range and
        // either delta sign.
        for &scale in &[0.2, 0.5, 1.0, 2.37, 4.0] {
            for &delta in &[120.0, -120.0] {
                let mut view = ViewState {
                    x: 33.0,
                    y: -80.0,
                    scale,
                };
                let anchor = Point::new(401.0, 295.5);
                let before = view.screen_to_world(anchor);
                view.zoom(delta, anchor);
                let after = view.screen_to_world(anchor);
                assert!((before.x - after.x).abs() < 1e-9, "x drift at scale {scale}");
                assert!((before.y - after.y).abs() < 1e-9, "y drift at scale {scale}");
            }
        }
    }

    #[test]
    fn zoom_in_is_fixed_ratio() {
        let mut view = ViewState::default();
        view.zoom(1.0, Point::default());
        assert!((view.scale - 1.1).abs() < 1e-12);
        // Magnitude of the delta is irrelevant.
        let mut other = ViewState::default();
        other.zoom(5000.0, Point::default());
        assert_eq!(view.scale, other.scale);
    }

    #[test]
    fn repeated_zoom_in_clamps_at_max() {
        let mut view = ViewState::default();
        for _ in 0..200 {
            view.zoom(1.0, Point::new(100.0, 100.0));
            assert!(view.scale <= MAX_SCALE);
        }
        assert_eq!(view.scale, MAX_SCALE);
    }

    #[test]
    fn repeated_zoom_out_clamps_at_min() {
        let mut view = ViewState::default();
        for _ in 0..200 {
            view.zoom(-1.0, Point::new(100.0, 100.0));
            assert!(view.scale >= MIN_SCALE);
        }
        assert_eq!(view.scale, MIN_SCALE);
    }

    #[test]
    fn centered_on_places_world_point_at_viewport_center() {
        let view = ViewState::centered_on(120.0, -40.0, 2.0, 800.0, 600.0);
        let world = view.screen_to_world(Point::new(400.0, 300.0));
        assert!((world.x - 120.0).abs() < 1e-9);
        assert!((world.y - -40.0).abs() < 1e-9);
    }
}
