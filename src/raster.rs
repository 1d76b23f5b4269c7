//! Software rendering backend.
//!
//! Renders into premultiplied floating-point RGBA bitmaps. Pixels are covered if their center
//! lies inside a shape; there is no anti-aliasing. Useful for headless rendering and for testing
//! what actually ends up on screen.

use crate::canvas::{Canvas, Image};
use crate::color::Color;
use crate::host::{Host, OpacitySurface};
use crate::rect::Rect;
use crate::tree::ViewTree;
use cgmath::{Matrix3, Point2, SquareMatrix, Vector2, Vector3};
use core::fmt;
use log::{trace, warn};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A premultiplied RGBA pixel.
pub type Pixel = [f64; 4];

#[derive(Clone, PartialEq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    pixels: Vec<Pixel>,
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Bitmap({}x{})", self.width, self.height)
    }
}

impl Bitmap {
    /// Creates a transparent bitmap.
    pub fn new(width: usize, height: usize) -> Bitmap {
        Bitmap {
            width,
            height,
            pixels: vec![[0.; 4]; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// # Panics
    /// - if the coordinates are out of bounds
    pub fn pixel(&self, x: usize, y: usize) -> Pixel {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        self.pixels[y * self.width + x]
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// The largest difference between any two corresponding channels.
    ///
    /// Returns infinity if the bitmaps have different sizes.
    pub fn max_difference(&self, other: &Bitmap) -> f64 {
        if self.width != other.width || self.height != other.height {
            return f64::INFINITY;
        }
        self.pixels
            .iter()
            .zip(&other.pixels)
            .flat_map(|(a, b)| a.iter().zip(b).map(|(a, b)| (a - b).abs()))
            .fold(0., f64::max)
    }

    fn bounds(&self) -> Rect {
        Rect::from_xywh(0., 0., self.width as f64, self.height as f64)
    }

    /// Composites a premultiplied pixel over the pixel at (x, y).
    fn blend(&mut self, x: usize, y: usize, src: Pixel) {
        let dst = &mut self.pixels[y * self.width + x];
        let inv = 1. - src[3];
        for i in 0..4 {
            dst[i] = src[i] + dst[i] * inv;
        }
    }
}

fn premultiply(color: Color) -> Pixel {
    let a = color.a.max(0.).min(1.);
    [color.r * a, color.g * a, color.b * a, a]
}

fn translation_matrix(offset: Vector2<f64>) -> Matrix3<f64> {
    Matrix3::new(1., 0., 0., 0., 1., 0., offset.x, offset.y, 1.)
}

fn scale_matrix(factor: f64) -> Matrix3<f64> {
    Matrix3::new(factor, 0., 0., 0., factor, 0., 0., 0., 1.)
}

fn transform_point(matrix: &Matrix3<f64>, point: Point2<f64>) -> Point2<f64> {
    let v = *matrix * Vector3::new(point.x, point.y, 1.);
    Point2::new(v.x, v.y)
}

/// Iterates over the pixels whose centers lie inside a device rect.
fn covered_pixels(rect: Rect) -> impl Iterator<Item = (usize, usize)> {
    let span = |min: f64, max: f64| {
        let start = (min - 0.5).ceil().max(0.) as usize;
        let end = (max - 0.5).ceil().max(0.) as usize;
        start..end
    };
    let ys = span(rect.y(), rect.max_y());
    let xs = span(rect.x(), rect.max_x());
    ys.flat_map(move |y| xs.clone().map(move |x| (x, y)))
}

#[derive(Debug, Clone, Copy)]
struct State {
    transform: Matrix3<f64>,
    /// Clip rect in device space.
    clip: Rect,
}

/// A canvas that draws into a [`Bitmap`].
pub struct RasterCanvas {
    bitmap: Bitmap,
    state: State,
    stack: Vec<State>,
}

impl fmt::Debug for RasterCanvas {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RasterCanvas")
            .field("bitmap", &self.bitmap)
            .field("state", &self.state)
            .field("saved", &self.stack.len())
            .finish()
    }
}

impl RasterCanvas {
    pub fn new(width: usize, height: usize) -> RasterCanvas {
        let bitmap = Bitmap::new(width, height);
        RasterCanvas {
            state: State {
                transform: Matrix3::identity(),
                clip: bitmap.bounds(),
            },
            bitmap,
            stack: Vec::new(),
        }
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    pub fn into_bitmap(self) -> Bitmap {
        self.bitmap
    }

    /// Maps a rect to device space. Only valid for translations and uniform scales.
    fn map_rect(&self, rect: Rect) -> Rect {
        let a = transform_point(&self.state.transform, rect.origin);
        let b = transform_point(
            &self.state.transform,
            Point2::new(rect.max_x(), rect.max_y()),
        );
        let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
        let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
        Rect::from_xywh(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    fn fill_device(&mut self, rect: Rect, src: Pixel) {
        let area = match rect.intersect(self.state.clip) {
            Some(area) => area,
            None => return,
        };
        for (x, y) in covered_pixels(area) {
            self.bitmap.blend(x, y, src);
        }
    }
}

impl Canvas for RasterCanvas {
    fn save(&mut self) -> usize {
        self.stack.push(self.state);
        self.stack.len() - 1
    }

    fn restore_to_count(&mut self, count: usize) {
        while self.stack.len() > count {
            if let Some(state) = self.stack.pop() {
                self.state = state;
            }
        }
    }

    fn translate(&mut self, offset: Vector2<f64>) {
        self.state.transform = self.state.transform * translation_matrix(offset);
    }

    fn scale(&mut self, factor: f64) {
        self.state.transform = self.state.transform * scale_matrix(factor);
    }

    fn clip_rect(&mut self, rect: Rect) {
        let device = self.map_rect(rect);
        self.state.clip = self
            .state
            .clip
            .intersect(device)
            .unwrap_or_else(|| Rect::from_xywh(0., 0., 0., 0.));
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let device = self.map_rect(rect);
        self.fill_device(device, premultiply(color));
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, thickness: f64) {
        // zero thickness is a one device pixel hairline
        let thickness = if thickness > 0. {
            thickness
        } else {
            1. / self.state.transform.x.x.abs().max(1e-9)
        };
        let half = thickness / 2.;
        let outer = Rect::from_xywh(
            rect.x() - half,
            rect.y() - half,
            rect.width() + thickness,
            rect.height() + thickness,
        );
        let inner_height = (rect.height() - thickness).max(0.);

        // four non-overlapping bands
        let bands = [
            Rect::from_xywh(outer.x(), outer.y(), outer.width(), thickness),
            Rect::from_xywh(outer.x(), outer.max_y() - thickness, outer.width(), thickness),
            Rect::from_xywh(outer.x(), outer.y() + thickness, thickness, inner_height),
            Rect::from_xywh(
                outer.max_x() - thickness,
                outer.y() + thickness,
                thickness,
                inner_height,
            ),
        ];
        let src = premultiply(color);
        for band in &bands {
            let device = self.map_rect(*band);
            self.fill_device(device, src);
        }
    }

    fn draw_image(&mut self, image: &Image, offset: Point2<f64>, alpha: f64) {
        let source = match image.downcast_ref::<Bitmap>() {
            Some(bitmap) => bitmap,
            None => {
                warn!("raster canvas can only draw bitmap images");
                return;
            }
        };
        let inverse = match self.state.transform.invert() {
            Some(inverse) => inverse,
            None => return,
        };

        let dest = self.map_rect(Rect::new(offset, image.size()));
        let area = match dest.intersect(self.state.clip) {
            Some(area) => area,
            None => return,
        };
        let alpha = alpha.max(0.).min(1.);

        for (x, y) in covered_pixels(area) {
            let p = transform_point(&inverse, Point2::new(x as f64 + 0.5, y as f64 + 0.5));
            let (u, v) = ((p.x - offset.x).floor(), (p.y - offset.y).floor());
            if u < 0. || v < 0. {
                continue;
            }
            let (u, v) = (u as usize, v as usize);
            if u >= source.width || v >= source.height {
                continue;
            }
            let texel = source.pixel(u, v);
            let src = [
                texel[0] * alpha,
                texel[1] * alpha,
                texel[2] * alpha,
                texel[3] * alpha,
            ];
            self.bitmap.blend(x, y, src);
        }
    }
}

/// An off-screen raster target. Counts itself as live until dropped.
pub struct RasterSurface {
    canvas: RasterCanvas,
    live: Arc<AtomicUsize>,
}

impl OpacitySurface for RasterSurface {
    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }

    fn snapshot(&mut self) -> Image {
        let bitmap = self.canvas.bitmap().clone();
        let size = Vector2::new(bitmap.width() as f64, bitmap.height() as f64);
        Image::new(size, bitmap)
    }
}

impl Drop for RasterSurface {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A host without a window: renders into bitmaps on demand and records repaint requests.
#[derive(Debug)]
pub struct HeadlessHost {
    width: usize,
    height: usize,
    invalidated: AtomicBool,
    invalidations: AtomicUsize,
    surfaces_created: AtomicUsize,
    live_surfaces: Arc<AtomicUsize>,
}

impl HeadlessHost {
    pub fn new(width: usize, height: usize) -> HeadlessHost {
        HeadlessHost {
            width,
            height,
            invalidated: AtomicBool::new(false),
            invalidations: AtomicUsize::new(0),
            surfaces_created: AtomicUsize::new(0),
            live_surfaces: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Returns whether a repaint was requested since the last call (or render), and resets it.
    pub fn take_invalidated(&self) -> bool {
        self.invalidated.swap(false, Ordering::SeqCst)
    }

    /// Total number of repaint requests.
    pub fn invalidation_count(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn surfaces_created(&self) -> usize {
        self.surfaces_created.load(Ordering::SeqCst)
    }

    /// Opacity surfaces that have not been dropped yet.
    pub fn live_surfaces(&self) -> usize {
        self.live_surfaces.load(Ordering::SeqCst)
    }

    /// Draws the tree’s root into a new bitmap.
    pub fn render(&self, tree: &ViewTree) -> Bitmap {
        self.invalidated.store(false, Ordering::SeqCst);
        let mut canvas = RasterCanvas::new(self.width, self.height);
        tree.draw_root(&mut canvas);
        canvas.into_bitmap()
    }
}

impl Host for HeadlessHost {
    fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    fn create_opacity_surface(&self) -> Box<dyn OpacitySurface> {
        trace!("creating {}x{} opacity surface", self.width, self.height);
        self.surfaces_created.fetch_add(1, Ordering::SeqCst);
        self.live_surfaces.fetch_add(1, Ordering::SeqCst);
        Box::new(RasterSurface {
            canvas: RasterCanvas::new(self.width, self.height),
            live: Arc::clone(&self.live_surfaces),
        })
    }
}

#[cfg(test)]
use crate::view::{Overlay, ViewNode};

#[cfg(test)]
fn assert_pixel(bitmap: &Bitmap, x: usize, y: usize, expected: Pixel) {
    let actual = bitmap.pixel(x, y);
    for i in 0..4 {
        assert!(
            (actual[i] - expected[i]).abs() < 1e-9,
            "pixel ({}, {}) is {:?}, expected {:?}",
            x,
            y,
            actual,
            expected
        );
    }
}

#[test]
fn test_raster_fill_and_stroke() {
    let mut canvas = RasterCanvas::new(10, 10);
    canvas.fill_rect(Rect::from_xywh(2., 2., 4., 4.), Color::rgba(1., 0., 0., 0.5));
    canvas.stroke_rect(Rect::from_xywh(1., 1., 8., 8.), Color::BLACK, 2.);
    let bitmap = canvas.into_bitmap();

    assert_pixel(&bitmap, 3, 3, [0.5, 0., 0., 0.5]);
    assert_pixel(&bitmap, 6, 6, [0., 0., 0., 0.]);
    assert_pixel(&bitmap, 0, 0, [0., 0., 0., 1.]);
    assert_pixel(&bitmap, 1, 5, [0., 0., 0., 1.]);
    assert_pixel(&bitmap, 2, 5, [0.5, 0., 0., 0.5]);
    assert_pixel(&bitmap, 9, 9, [0., 0., 0., 1.]);
    assert_pixel(&bitmap, 7, 7, [0., 0., 0., 0.]);
}

#[test]
fn test_raster_transforms_and_clip() {
    let mut canvas = RasterCanvas::new(10, 10);
    let count = canvas.save();
    canvas.translate(Vector2::new(5., 5.));
    canvas.scale(2.);
    canvas.translate(Vector2::new(-5., -5.));
    canvas.clip_rect(Rect::from_xywh(3., 3., 2., 4.));
    canvas.fill_rect(Rect::from_xywh(0., 0., 10., 10.), Color::WHITE);
    canvas.restore_to_count(count);
    canvas.fill_rect(Rect::from_xywh(9., 9., 1., 1.), Color::BLACK);
    let bitmap = canvas.into_bitmap();

    // the clip maps to (1, 1, 4, 8) in device space
    assert_pixel(&bitmap, 1, 1, [1., 1., 1., 1.]);
    assert_pixel(&bitmap, 4, 8, [1., 1., 1., 1.]);
    assert_pixel(&bitmap, 5, 5, [0., 0., 0., 0.]);
    assert_pixel(&bitmap, 0, 0, [0., 0., 0., 0.]);
    assert_pixel(&bitmap, 9, 9, [0., 0., 0., 1.]);
}

#[test]
fn test_opaque_and_composited_paths_agree() {
    let mut tree = ViewTree::new();
    let host = Arc::new(HeadlessHost::new(16, 16));
    let view = tree.insert(
        ViewNode::new()
            .background(Color::rgba(0.8, 0.1, 0.1, 0.6))
            .frame(Color::rgba(0.1, 0.1, 0.9, 0.7), 2.)
            .drawing(|canvas, info| {
                let r = info.render_bounds;
                canvas.fill_rect(
                    Rect::from_xywh(r.x() + 2., r.y() + 2., 5., 5.),
                    Color::rgba(0.2, 0.9, 0.3, 0.4),
                );
            }),
    );
    let child = tree.insert(ViewNode::new().background(Color::rgba(1., 1., 0., 0.5)));
    tree.add_subview(view, child).unwrap();
    tree.set_root(view, host.clone()).unwrap();
    tree.layout(view, Rect::from_xywh(2., 2., 12., 12.));
    tree.layout(child, Rect::from_xywh(4., 4., 8., 8.));

    let mut direct = RasterCanvas::new(16, 16);
    direct.fill_rect(Rect::from_xywh(0., 0., 16., 16.), Color::rgb(0.3, 0.3, 0.3));
    let mut composited = RasterCanvas::new(16, 16);
    composited.fill_rect(Rect::from_xywh(0., 0., 16., 16.), Color::rgb(0.3, 0.3, 0.3));

    tree.draw(view, &mut direct);
    assert_eq!(host.surfaces_created(), 0, "opaque views don’t need a surface");

    let mut surface = host.create_opacity_surface();
    tree.paint_content(view, surface.canvas());
    let image = surface.snapshot();
    composited.draw_image(&image, Point2::new(0., 0.), 1.);

    let difference = direct.bitmap().max_difference(composited.bitmap());
    assert!(difference < 1e-9, "paths differ by {}", difference);
}

#[test]
fn test_group_opacity_does_not_double_blend() {
    let mut tree = ViewTree::new();
    let host = Arc::new(HeadlessHost::new(10, 10));
    let root = tree.insert(ViewNode::with_delegate(Overlay).background(Color::WHITE));
    let group = tree.insert(ViewNode::new().opacity(0.5));
    let a = tree.insert(ViewNode::new().background(Color::BLACK));
    let b = tree.insert(ViewNode::new().background(Color::BLACK));
    tree.add_subview(root, group).unwrap();
    tree.add_subview(group, a).unwrap();
    tree.add_subview(group, b).unwrap();
    tree.set_root(root, host.clone()).unwrap();
    tree.layout(root, Rect::from_xywh(0., 0., 10., 10.));
    tree.layout(a, Rect::from_xywh(0., 0., 6., 6.));
    tree.layout(b, Rect::from_xywh(4., 4., 6., 6.));

    let bitmap = host.render(&tree);
    assert_pixel(&bitmap, 1, 1, [0.5, 0.5, 0.5, 1.]);
    assert_pixel(&bitmap, 5, 5, [0.5, 0.5, 0.5, 1.]);
    assert_pixel(&bitmap, 8, 1, [1., 1., 1., 1.]);
    assert_eq!(host.live_surfaces(), 0);
}

#[test]
fn test_scale_pivots_on_render_bounds_center() {
    let mut tree = ViewTree::new();
    let host = Arc::new(HeadlessHost::new(10, 10));
    let view = tree.insert(ViewNode::new().scale(2.).background(Color::BLACK));
    tree.set_root(view, host.clone()).unwrap();
    tree.layout(view, Rect::from_xywh(3., 3., 4., 4.));

    let bitmap = host.render(&tree);
    assert_pixel(&bitmap, 1, 1, [0., 0., 0., 1.]);
    assert_pixel(&bitmap, 8, 8, [0., 0., 0., 1.]);
    assert_pixel(&bitmap, 0, 0, [0., 0., 0., 0.]);
    assert_pixel(&bitmap, 9, 9, [0., 0., 0., 0.]);
}
