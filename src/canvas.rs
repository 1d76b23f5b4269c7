//! Drawing primitives.

use crate::color::Color;
use crate::rect::Rect;
use cgmath::{Point2, Vector2};
use core::any::Any;
use core::fmt;
use std::sync::Arc;

/// A snapshot of an off-screen surface.
///
/// The pixel data is backend-specific; backends downcast it with [`Image::downcast_ref`].
#[derive(Clone)]
pub struct Image {
    size: Vector2<f64>,
    data: Arc<dyn Any + Send + Sync>,
}

impl Image {
    pub fn new<T: Any + Send + Sync>(size: Vector2<f64>, data: T) -> Image {
        Image {
            size,
            data: Arc::new(data),
        }
    }

    /// Image size in canvas units.
    pub fn size(&self) -> Vector2<f64> {
        self.size
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Image({} × {})", self.size.x, self.size.y)
    }
}

/// A 2D drawing target.
///
/// Transforms and clips apply to all subsequent drawing until the state is restored.
pub trait Canvas {
    /// Pushes the current transform and clip; returns the save count before the push.
    fn save(&mut self) -> usize;

    /// Pops saved states until the save count equals `count`.
    fn restore_to_count(&mut self, count: usize);

    fn translate(&mut self, offset: Vector2<f64>);

    /// Scales uniformly about the current origin.
    fn scale(&mut self, factor: f64);

    /// Intersects the clip region with the rectangle.
    fn clip_rect(&mut self, rect: Rect);

    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Strokes the rectangle outline, centered on its edges.
    fn stroke_rect(&mut self, rect: Rect, color: Color, thickness: f64);

    /// Draws an image with its top left corner at `offset`, multiplying its alpha by `alpha`.
    fn draw_image(&mut self, image: &Image, offset: Point2<f64>, alpha: f64);
}
