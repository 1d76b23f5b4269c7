//! Rectangles and insets.

use cgmath::{EuclideanSpace, Point2, Vector2, Zero};
use std::ops;

/// A rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Rectangle origin.
    pub origin: Point2<f64>,

    /// Rectangle size.
    pub size: Vector2<f64>,
}

impl Rect {
    /// Creates a new rectangle.
    pub fn new(origin: Point2<f64>, size: Vector2<f64>) -> Rect {
        Rect { origin, size }
    }

    /// Creates a new rectangle from its components.
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect {
            origin: Point2::new(x, y),
            size: Vector2::new(width, height),
        }
    }

    /// Returns a zero-sized rectangle at the origin.
    pub fn zero() -> Rect {
        Rect {
            origin: Point2::new(0., 0.),
            size: Vector2::zero(),
        }
    }

    pub fn x(&self) -> f64 {
        self.origin.x
    }

    pub fn y(&self) -> f64 {
        self.origin.y
    }

    pub fn width(&self) -> f64 {
        self.size.x
    }

    pub fn height(&self) -> f64 {
        self.size.y
    }

    /// The right edge.
    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.x
    }

    /// The bottom edge.
    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.y
    }

    /// Returns the center point.
    pub fn center(&self) -> Point2<f64> {
        self.origin + self.size / 2.
    }

    /// Returns true if the point is inside the rectangle.
    pub fn contains(&self, point: Point2<f64>) -> bool {
        point.x >= self.origin.x
            && point.y >= self.origin.y
            && point.x < self.max_x()
            && point.y < self.max_y()
    }

    /// Returns true if the two rectangles intersect.
    pub fn intersects(&self, rect: Rect) -> bool {
        self.origin.x < rect.max_x()
            && self.origin.y < rect.max_y()
            && rect.origin.x < self.max_x()
            && rect.origin.y < self.max_y()
    }

    /// Returns the intersection rectangle.
    pub fn intersect(&self, rect: Rect) -> Option<Rect> {
        if !self.intersects(rect) {
            return None;
        }

        let min_x = self.origin.x.max(rect.origin.x);
        let min_y = self.origin.y.max(rect.origin.y);
        let max_x = self.max_x().min(rect.max_x());
        let max_y = self.max_y().min(rect.max_y());

        Some(Rect::from_xywh(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// Returns a new rectangle with the given origin.
    pub fn with_origin(&self, origin: Point2<f64>) -> Rect {
        Rect {
            origin,
            size: self.size,
        }
    }

    /// Returns the same size at the origin.
    pub fn at_zero(&self) -> Rect {
        self.with_origin(Point2::new(0., 0.))
    }
}

impl ops::Add<Vector2<f64>> for Rect {
    type Output = Rect;
    fn add(self, offset: Vector2<f64>) -> Rect {
        Rect {
            origin: self.origin + offset,
            size: self.size,
        }
    }
}

impl ops::Add<Point2<f64>> for Rect {
    type Output = Rect;
    fn add(self, point: Point2<f64>) -> Rect {
        self + point.to_vec()
    }
}

/// Insets on four sides; used for margins.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Insets {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Insets {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Insets {
        Insets {
            left,
            top,
            right,
            bottom,
        }
    }

    /// `left + right`
    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    /// `top + bottom`
    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

#[test]
fn test_rect_intersect() {
    let a = Rect::from_xywh(0., 0., 10., 10.);
    let b = Rect::from_xywh(5., 5., 10., 10.);
    assert_eq!(
        a.intersect(b),
        Some(Rect::from_xywh(5., 5., 5., 5.)),
        "overlapping rects should intersect in their shared corner"
    );
    assert_eq!(
        a.intersect(Rect::from_xywh(10., 0., 5., 5.)),
        None,
        "touching edges do not intersect"
    );
    assert!(a.contains(Point2::new(0., 9.9)));
    assert!(!a.contains(Point2::new(10., 5.)), "max edge is exclusive");
    assert_eq!(a.center(), Point2::new(5., 5.));
}
