use crate::canvas::Canvas;
use crate::color::Color;
use crate::events::{Gesture, GestureRecognizer, GestureTarget};
use crate::host::Host;
use crate::rect::{Insets, Rect};
use crate::tree::ViewTree;
use cgmath::{Point2, Vector2, Zero};
use core::any::Any;
use core::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Threshold below which scale and opacity are considered to be exactly one.
pub const EPSILON: f64 = 1e-4;

/// A unique identifier for a view.
///
/// (this is just a UUID)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(u32, u16, u16, [u8; 8]);

impl ViewId {
    pub(crate) fn new() -> ViewId {
        let uuid = Uuid::new_v4();
        let (a, b, c, d) = uuid.as_fields();
        ViewId(a, b, c, *d)
    }
}

/// Custom drawing callback; called after the background and frame have been painted.
pub type DrawCallback = Arc<dyn Fn(&mut dyn Canvas, &DrawInfo) + Send + Sync>;

/// What a drawing callback gets to know about its view.
pub struct DrawInfo<'a> {
    pub view: ViewId,
    pub node: &'a ViewNode,
    /// Where the view is on the canvas, before scaling.
    pub render_bounds: Rect,
}

/// How a view is placed along one axis when it gets more space than it asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutOptions {
    Start,
    Center,
    End,
    Fill,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions::Fill
    }
}

impl LayoutOptions {
    /// Places a span of `requested` length inside `available`; returns (offset, length).
    pub fn place(self, available: f64, requested: f64) -> (f64, f64) {
        if self == LayoutOptions::Fill || !requested.is_finite() {
            return (0., available);
        }
        let length = requested.min(available).max(0.);
        match self {
            LayoutOptions::Start | LayoutOptions::Fill => (0., length),
            LayoutOptions::Center => ((available - length) / 2., length),
            LayoutOptions::End => (available - length, length),
        }
    }
}

/// A node in the view tree.
///
/// Geometry (`bounds`) is written by layout only. Translation, scale and opacity are never touched
/// by layout; they belong to whoever animates or assigns them.
pub struct ViewNode {
    pub(crate) bounds: Rect,

    /// Requested width, or a negative value if unconstrained.
    pub width_request: f64,

    /// Requested height, or a negative value if unconstrained.
    pub height_request: f64,

    pub margin: Insets,
    pub horizontal_options: LayoutOptions,
    pub vertical_options: LayoutOptions,

    /// Offset from the layout position.
    pub translation: Vector2<f64>,

    /// Uniform scale around the center of the render bounds.
    pub scale: f64,

    /// Background color, with which the render bounds will be filled.
    pub background: Color,

    pub frame_color: Color,
    pub frame_thickness: f64,

    /// View opacity, in `0..=1`. Translucent views are painted off-screen and composited.
    pub opacity: f64,

    /// Invisible views skip layout and drawing entirely.
    pub is_visible: bool,

    /// Whether contents will be clipped to the view’s render bounds.
    pub clip_to_bounds: bool,

    pub drawing: Option<DrawCallback>,
    pub gesture_recognizers: Vec<GestureRecognizer>,

    pub(crate) binding_context: Option<Arc<dyn Any + Send + Sync>>,
    pub(crate) parent: Option<ViewId>,
    pub(crate) subviews: Vec<ViewId>,
    pub(crate) container: Option<Arc<dyn Host>>,
    pub(crate) delegate: Option<Box<dyn Delegate>>,
}

struct DebugifyOption<'a, T>(&'a Option<T>);
impl<'a, T> fmt::Debug for DebugifyOption<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_some() {
            write!(f, "Some(..)")
        } else {
            write!(f, "None")
        }
    }
}

impl fmt::Debug for ViewNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ViewNode")
            .field("bounds", &self.bounds)
            .field("width_request", &self.width_request)
            .field("height_request", &self.height_request)
            .field("margin", &self.margin)
            .field("translation", &self.translation)
            .field("scale", &self.scale)
            .field("background", &self.background)
            .field("frame_color", &self.frame_color)
            .field("frame_thickness", &self.frame_thickness)
            .field("opacity", &self.opacity)
            .field("is_visible", &self.is_visible)
            .field("clip_to_bounds", &self.clip_to_bounds)
            .field("drawing", &DebugifyOption(&self.drawing))
            .field("gesture_recognizers", &self.gesture_recognizers)
            .field("binding_context", &DebugifyOption(&self.binding_context))
            .field("parent", &self.parent)
            .field("subviews", &self.subviews)
            .field("container", &DebugifyOption(&self.container))
            .field("delegate", &self.delegate)
            .finish()
    }
}

impl Default for ViewNode {
    fn default() -> Self {
        ViewNode {
            bounds: Rect::zero(),
            width_request: -1.,
            height_request: -1.,
            margin: Insets::default(),
            horizontal_options: LayoutOptions::Fill,
            vertical_options: LayoutOptions::Fill,
            translation: Vector2::zero(),
            scale: 1.,
            background: Color::TRANSPARENT,
            frame_color: Color::TRANSPARENT,
            frame_thickness: 0.,
            opacity: 1.,
            is_visible: true,
            clip_to_bounds: false,
            drawing: None,
            gesture_recognizers: Vec::new(),
            binding_context: None,
            parent: None,
            subviews: Vec::new(),
            container: None,
            delegate: None,
        }
    }
}

impl ViewNode {
    pub fn new() -> ViewNode {
        ViewNode::default()
    }

    /// Creates a node whose layout, drawing and hit testing are customized by a delegate.
    pub fn with_delegate<D: Delegate>(delegate: D) -> ViewNode {
        ViewNode {
            delegate: Some(Box::new(delegate)),
            ..ViewNode::default()
        }
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    pub fn frame(mut self, color: Color, thickness: f64) -> Self {
        self.frame_color = color;
        self.frame_thickness = thickness;
        self
    }

    pub fn opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn translation(mut self, x: f64, y: f64) -> Self {
        self.translation = Vector2::new(x, y);
        self
    }

    pub fn size_request(mut self, width: f64, height: f64) -> Self {
        self.width_request = width;
        self.height_request = height;
        self
    }

    pub fn margin(mut self, margin: Insets) -> Self {
        self.margin = margin;
        self
    }

    pub fn layout_options(mut self, horizontal: LayoutOptions, vertical: LayoutOptions) -> Self {
        self.horizontal_options = horizontal;
        self.vertical_options = vertical;
        self
    }

    pub fn clipped(mut self, clip_to_bounds: bool) -> Self {
        self.clip_to_bounds = clip_to_bounds;
        self
    }

    pub fn visible(mut self, is_visible: bool) -> Self {
        self.is_visible = is_visible;
        self
    }

    pub fn drawing<F>(mut self, drawing: F) -> Self
    where
        F: Fn(&mut dyn Canvas, &DrawInfo) + Send + Sync + 'static,
    {
        self.drawing = Some(Arc::new(drawing));
        self
    }

    pub fn gesture(mut self, recognizer: GestureRecognizer) -> Self {
        self.gesture_recognizers.push(recognizer);
        self
    }

    /// `(x, y, width, height)` as of the last layout pass.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn parent(&self) -> Option<ViewId> {
        self.parent
    }

    pub fn subviews(&self) -> &[ViewId] {
        &self.subviews
    }

    /// Returns the binding context if it is of type `T`.
    pub fn binding_context<T: Any>(&self) -> Option<&T> {
        self.binding_context
            .as_ref()
            .and_then(|ctx| (**ctx).downcast_ref::<T>())
    }

    pub fn is_opaque(&self) -> bool {
        (self.opacity - 1.).abs() < EPSILON
    }

    pub fn is_scaled(&self) -> bool {
        (self.scale - 1.).abs() > EPSILON
    }

    pub fn delegate(&self) -> Option<&dyn Delegate> {
        self.delegate.as_ref().map(|d| &**d)
    }
}

/// Customizes layout, size negotiation, painting and hit testing of a view.
///
/// Every method has a default that performs the base behavior, so implementors only override
/// what they need. Hooks that take `&mut self` are called with the delegate temporarily removed
/// from its node; reentrant calls on the same view fall back to the base behavior.
pub trait Delegate: Any + fmt::Debug + Send {
    /// Lays out a visible view.
    fn layout(&mut self, tree: &mut ViewTree, id: ViewId, rect: Rect) {
        tree.set_layout_bounds(id, rect);
    }

    /// Computes the size of a visible view, with margins already subtracted from the constraint.
    fn size_request(&self, tree: &ViewTree, id: ViewId, constraint: Vector2<f64>) -> Vector2<f64> {
        tree.base_size_request(id, constraint)
    }

    /// Paints the view contents.
    fn paint(&self, tree: &ViewTree, id: ViewId, canvas: &mut dyn Canvas) {
        tree.paint_content(id, canvas);
    }

    /// Appends gesture recognizers under `point`.
    fn collect_gesture_targets(
        &self,
        tree: &ViewTree,
        id: ViewId,
        point: Point2<f64>,
        matches: &mut Vec<GestureTarget>,
    ) {
        tree.collect_own_gesture_targets(id, point, matches);
    }

    /// Called after a gesture has been delivered to this view’s recognizers.
    fn on_gesture(&mut self, tree: &mut ViewTree, id: ViewId, gesture: &Gesture) {
        let _ = (tree, id, gesture);
    }

    /// Called from [`ViewTree::poll`] to process pending notifications.
    fn poll(&mut self, tree: &mut ViewTree, id: ViewId) {
        let _ = (tree, id);
    }

    /// Views owned by the delegate rather than listed as subviews; removed along with the view.
    fn owned_views(&self) -> Vec<ViewId> {
        Vec::new()
    }

    /// For downcasting.
    fn as_any(&self) -> &dyn Any;

    /// For downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Base behavior.
impl Delegate for () {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Stacks all subviews on top of each other, each one getting the full content rect.
///
/// Subviews with non-`Fill` layout options are sized by their size request and aligned within
/// the content rect instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overlay;

impl Delegate for Overlay {
    fn layout(&mut self, tree: &mut ViewTree, id: ViewId, rect: Rect) {
        tree.set_layout_bounds(id, rect);

        let content = rect.at_zero();
        for subview in tree.subviews_of(id) {
            let frame = match tree.get(subview) {
                Some(node) if node.is_visible => {
                    let (h, v) = (node.horizontal_options, node.vertical_options);
                    if h == LayoutOptions::Fill && v == LayoutOptions::Fill {
                        content
                    } else {
                        let size = tree.size_request(subview, content.width(), content.height());
                        let (x, width) = h.place(content.width(), size.x);
                        let (y, height) = v.place(content.height(), size.y);
                        Rect::from_xywh(x, y, width, height)
                    }
                }
                _ => continue,
            };
            tree.layout(subview, frame);
        }
    }

    fn size_request(&self, tree: &ViewTree, id: ViewId, constraint: Vector2<f64>) -> Vector2<f64> {
        let base = tree.base_size_request(id, constraint);
        let node = match tree.get(id) {
            Some(node) => node,
            None => return base,
        };
        if node.width_request >= 0. && node.height_request >= 0. {
            return base;
        }

        // measure subviews for the axes without an explicit request
        let mut measured = Vector2::zero();
        for subview in node.subviews() {
            let size = tree.size_request(*subview, constraint.x, constraint.y);
            measured.x = f64::max(measured.x, size.x);
            measured.y = f64::max(measured.y, size.y);
        }

        Vector2::new(
            if node.width_request >= 0. { base.x } else { measured.x },
            if node.height_request >= 0. { base.y } else { measured.y },
        )
    }

    fn collect_gesture_targets(
        &self,
        tree: &ViewTree,
        id: ViewId,
        point: Point2<f64>,
        matches: &mut Vec<GestureTarget>,
    ) {
        tree.collect_own_gesture_targets(id, point, matches);
        for subview in tree.subviews_of(id) {
            tree.collect_gesture_targets(subview, point, matches);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn test_layout_options_place() {
    assert_eq!(LayoutOptions::Fill.place(100., 20.), (0., 100.));
    assert_eq!(LayoutOptions::Start.place(100., 20.), (0., 20.));
    assert_eq!(LayoutOptions::Center.place(100., 20.), (40., 20.));
    assert_eq!(LayoutOptions::End.place(100., 20.), (80., 20.));
    assert_eq!(
        LayoutOptions::Center.place(100., f64::INFINITY),
        (0., 100.),
        "an unbounded request fills the available space"
    );
    assert_eq!(
        LayoutOptions::End.place(10., 20.),
        (0., 10.),
        "requests larger than the available space are clamped"
    );
}

#[test]
fn test_view_node_defaults() {
    let node = ViewNode::new();
    assert!(node.is_visible);
    assert!(node.is_opaque());
    assert!(!node.is_scaled());
    assert_eq!(node.width_request, -1.);
    assert_eq!(node.bounds(), Rect::zero());
    assert!(
        !ViewNode::new().opacity(0.5).is_opaque(),
        "opacity 0.5 is translucent"
    );
    assert!(
        !ViewNode::new().scale(1.00001).is_scaled(),
        "scales within epsilon of one are not scaled"
    );
}

#[test]
fn test_overlay_places_subviews_by_layout_options() {
    let mut tree = ViewTree::new();
    let overlay = tree.insert(ViewNode::with_delegate(Overlay));
    let filled = tree.insert(ViewNode::new());
    let badge = tree.insert(
        ViewNode::new()
            .size_request(20., 10.)
            .layout_options(LayoutOptions::Center, LayoutOptions::End),
    );
    let hidden = tree.insert(
        ViewNode::new()
            .size_request(20., 10.)
            .layout_options(LayoutOptions::Start, LayoutOptions::Start)
            .visible(false),
    );
    for subview in &[filled, badge, hidden] {
        tree.add_subview(overlay, *subview).unwrap();
    }

    tree.layout(overlay, Rect::from_xywh(10., 10., 100., 50.));
    assert_eq!(tree.bounds(overlay), Some(Rect::from_xywh(10., 10., 100., 50.)));
    assert_eq!(tree.bounds(filled), Some(Rect::from_xywh(0., 0., 100., 50.)));
    assert_eq!(tree.bounds(badge), Some(Rect::from_xywh(40., 40., 20., 10.)));
    assert_eq!(tree.bounds(hidden), Some(Rect::zero()), "invisible views are not laid out");
}

#[test]
fn test_overlay_size_request_measures_subviews() {
    let mut tree = ViewTree::new();
    let overlay = tree.insert(ViewNode::with_delegate(Overlay));
    let wide = tree.insert(ViewNode::new().size_request(30., 10.));
    let tall = tree.insert(ViewNode::new().size_request(20., 40.));
    let hidden = tree.insert(ViewNode::new().size_request(90., 90.).visible(false));
    for subview in &[wide, tall, hidden] {
        tree.add_subview(overlay, *subview).unwrap();
    }

    assert_eq!(tree.size_request(overlay, 100., 100.), Vector2::new(30., 40.));
    assert_eq!(
        tree.size_request(overlay, 25., 100.),
        Vector2::new(25., 40.),
        "subviews are measured under the same constraint"
    );

    tree.get_mut(overlay).unwrap().width_request = 50.;
    assert_eq!(
        tree.size_request(overlay, 100., 100.),
        Vector2::new(50., 40.),
        "an explicit request wins on its axis"
    );
}
