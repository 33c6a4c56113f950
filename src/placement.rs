//! # Placement Model
//!
//! A placement is a product image positioned and sized over the room image,
//! in display-pixel space. All functions here are pure: they return a new
//! [`Placement`] rather than mutating in place.
//!
//! ## Geometry
//!
//! ```text
//! aspect_ratio = natural_width / natural_height     (fixed at creation)
//! height       = width / aspect_ratio               (after create and resize)
//!
//!   position ──► ┌──────────────┐
//!                │              │
//!                │   product    │ height
//!                │              │
//!                └────────────[■] ◄── resize handle
//!                     width
//! ```
//!
//! Resizing is anchored at the top-left corner: the width grows rightward and
//! the height follows downward.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::media::ImageData;

/// Initial width of a freshly dropped placement, in display units.
pub const DEFAULT_WIDTH: f64 = 150.0;

/// Smallest width a resize may produce.
pub const MIN_WIDTH: f64 = 20.0;

/// Side length of the square resize handle at the bottom-right corner.
pub const HANDLE_SIZE: f64 = 16.0;

/// A position in display-pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A size in display-pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Creation-ordered placement identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlacementId(pub u64);

impl fmt::Display for PlacementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which part of a placement a point falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Body,
    Handle,
}

/// A product placed over the room image.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub id: PlacementId,
    pub image: ImageData,
    pub position: Point,
    pub size: Size,
    pub aspect_ratio: f64,
    pub description: String,
}

impl Placement {
    /// Create a placement centered under `drop_point`.
    ///
    /// Returns `None` if the natural size is unknown or degenerate (the
    /// product image has not finished loading).
    pub fn create(
        id: PlacementId,
        image: ImageData,
        description: impl Into<String>,
        drop_point: Point,
        natural_size: Option<(u32, u32)>,
    ) -> Option<Self> {
        let (natural_width, natural_height) = natural_size?;
        if natural_width == 0 || natural_height == 0 {
            return None;
        }

        let aspect_ratio = natural_width as f64 / natural_height as f64;
        let size = Size::new(DEFAULT_WIDTH, DEFAULT_WIDTH / aspect_ratio);
        let position = Point::new(
            drop_point.x - size.width / 2.0,
            drop_point.y - size.height / 2.0,
        );

        Some(Self {
            id,
            image,
            position,
            size,
            aspect_ratio,
            description: description.into(),
        })
    }

    /// Offset the position by `(dx, dy)`. Size and aspect ratio are untouched.
    pub fn moved_by(&self, dx: f64, dy: f64) -> Self {
        self.moved_to(Point::new(self.position.x + dx, self.position.y + dy))
    }

    /// Place the top-left corner at `position`.
    pub fn moved_to(&self, position: Point) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    /// Grow or shrink the width by `dx`, keeping the aspect ratio.
    pub fn resized_by(&self, dx: f64) -> Self {
        self.with_width(self.size.width + dx)
    }

    /// Set the width, clamped to [`MIN_WIDTH`]; height follows the aspect ratio.
    pub fn with_width(&self, width: f64) -> Self {
        let width = width.max(MIN_WIDTH);
        let height = (width / self.aspect_ratio).max(MIN_WIDTH / self.aspect_ratio);
        Self {
            size: Size::new(width, height),
            ..self.clone()
        }
    }

    /// Hit test against the placement body (handle included).
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.position.x
            && point.y >= self.position.y
            && point.x <= self.position.x + self.size.width
            && point.y <= self.position.y + self.size.height
    }

    /// Hit test against the bottom-right resize handle.
    pub fn handle_contains(&self, point: Point) -> bool {
        let right = self.position.x + self.size.width;
        let bottom = self.position.y + self.size.height;
        self.contains(point) && point.x >= right - HANDLE_SIZE && point.y >= bottom - HANDLE_SIZE
    }

    /// Classify a point as handle, body, or outside.
    pub fn hit(&self, point: Point) -> Option<Hit> {
        if self.handle_contains(point) {
            Some(Hit::Handle)
        } else if self.contains(point) {
            Some(Hit::Body)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::test_support::solid_png;

    fn sample(natural: (u32, u32)) -> Placement {
        Placement::create(
            PlacementId(1),
            solid_png(2, 2, [0, 0, 0, 255]),
            "a lamp",
            Point::new(100.0, 100.0),
            Some(natural),
        )
        .unwrap()
    }

    #[test]
    fn test_create_centers_under_drop_point() {
        let p = sample((300, 200));
        assert!((p.aspect_ratio - 1.5).abs() < 1e-9);
        assert_eq!(p.size, Size::new(150.0, 100.0));
        assert_eq!(p.position, Point::new(25.0, 50.0));
    }

    #[test]
    fn test_create_without_dimensions_is_noop() {
        let img = solid_png(2, 2, [0, 0, 0, 255]);
        let origin = Point::default();
        assert!(Placement::create(PlacementId(1), img.clone(), "x", origin, None).is_none());
        assert!(Placement::create(PlacementId(1), img, "x", origin, Some((0, 10))).is_none());
    }

    #[test]
    fn test_resize_keeps_aspect_ratio() {
        let p = sample((300, 200)).resized_by(50.0);
        assert!((p.size.width - 200.0).abs() < 1e-9);
        assert!((p.size.height - 200.0 / 1.5).abs() < 1e-9);
        assert_eq!(p.position, Point::new(25.0, 50.0));
    }

    #[test]
    fn test_resize_never_below_minimum() {
        for natural in [(300, 200), (100, 400), (50, 50)] {
            let p = sample(natural);
            for dx in [-149.0, -500.0, -1.0e9, f64::MIN / 2.0] {
                let r = p.resized_by(dx);
                assert!(r.size.width >= MIN_WIDTH, "width {} for dx {}", r.size.width, dx);
                assert!(
                    r.size.height >= MIN_WIDTH / r.aspect_ratio - 1e-12,
                    "height {} for dx {}",
                    r.size.height,
                    dx
                );
            }
        }
    }

    #[test]
    fn test_move_preserves_size_exactly() {
        let p = sample((123, 77)).resized_by(13.7);
        let m = p.moved_by(-31.25, 1e6);
        assert_eq!(m.size, p.size);
        assert_eq!(m.aspect_ratio.to_bits(), p.aspect_ratio.to_bits());
        assert_eq!(m.position, Point::new(p.position.x - 31.25, p.position.y + 1e6));
    }

    #[test]
    fn test_handle_hit_test() {
        // 25..175 x 50..150
        let p = sample((300, 200));
        assert!(p.handle_contains(Point::new(170.0, 145.0)));
        assert!(!p.handle_contains(Point::new(100.0, 100.0)));
        assert!(p.contains(Point::new(100.0, 100.0)));
        assert!(!p.contains(Point::new(10.0, 10.0)));
        assert_eq!(p.hit(Point::new(170.0, 145.0)), Some(Hit::Handle));
        assert_eq!(p.hit(Point::new(30.0, 55.0)), Some(Hit::Body));
        assert_eq!(p.hit(Point::new(0.0, 0.0)), None);
    }
}
