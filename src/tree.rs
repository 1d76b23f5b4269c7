use crate::animation::{Animator, Easing, GroupId};
use crate::canvas::Canvas;
use crate::events::{Gesture, GestureTarget};
use crate::host::Host;
use crate::rect::Rect;
use crate::view::{Delegate, DrawInfo, ViewId, ViewNode};
use cgmath::{EuclideanSpace, Point2, Vector2, Zero};
use core::any::Any;
use core::fmt;
use log::{debug, trace};
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Errors that may occur when changing the tree structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeError {
    NoSuchView(ViewId),
    /// The view would become its own ancestor.
    Cycle(ViewId),
    /// The view already has a superview (or is the root).
    AlreadyAttached(ViewId),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TreeError::NoSuchView(id) => write!(f, "no such view: {:?}", id),
            TreeError::Cycle(id) => write!(f, "view {:?} would become its own ancestor", id),
            TreeError::AlreadyAttached(id) => write!(f, "view {:?} is already attached", id),
        }
    }
}

impl Error for TreeError {}

/// A tree of views; owns all nodes and drives layout, drawing, gestures and animation.
///
/// Superview links are plain ids and never keep a view alive; ownership flows downward.
pub struct ViewTree {
    nodes: HashMap<ViewId, ViewNode>,
    root: Option<ViewId>,
    animator: Animator,
}

impl fmt::Debug for ViewTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ViewTree")
            .field("root", &self.root)
            .field("nodes", &self.nodes)
            .field("animator", &self.animator)
            .finish()
    }
}

/// Removes margins from a constraint. NaN clamps to zero; infinities are unconstrained.
fn shrink_constraint(constraint: f64, margin: f64) -> f64 {
    if constraint.is_infinite() {
        f64::INFINITY
    } else if constraint.is_nan() {
        0.
    } else {
        (constraint - margin).max(0.)
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.
    }
}

/// Sizing rule for one axis.
fn request_axis(request: f64, constraint: f64) -> f64 {
    if request >= 0. {
        if constraint.is_infinite() {
            request
        } else {
            request.min(constraint)
        }
    } else {
        constraint
    }
}

impl ViewTree {
    pub fn new() -> ViewTree {
        ViewTree {
            nodes: HashMap::new(),
            root: None,
            animator: Animator::new(),
        }
    }

    /// Adds a detached view to the tree.
    pub fn insert(&mut self, node: ViewNode) -> ViewId {
        let id = ViewId::new();
        self.nodes.insert(
            id,
            ViewNode {
                parent: None,
                container: None,
                ..node
            },
        );
        id
    }

    pub fn get(&self, id: ViewId) -> Option<&ViewNode> {
        self.nodes.get(&id)
    }

    /// Direct access to a node; does not invalidate. See [`batch`](ViewTree::batch).
    pub fn get_mut(&mut self, id: ViewId) -> Option<&mut ViewNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of views in the tree, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<ViewId> {
        self.root
    }

    pub fn parent(&self, id: ViewId) -> Option<ViewId> {
        self.nodes.get(&id).and_then(|node| node.parent)
    }

    pub fn subviews_of(&self, id: ViewId) -> Vec<ViewId> {
        self.nodes
            .get(&id)
            .map_or_else(Vec::new, |node| node.subviews.clone())
    }

    pub fn animator(&self) -> &Animator {
        &self.animator
    }

    pub(crate) fn animator_mut(&mut self) -> &mut Animator {
        &mut self.animator
    }

    /// Makes a detached view the root and attaches the host to it.
    pub fn set_root(&mut self, id: ViewId, host: Arc<dyn Host>) -> Result<(), TreeError> {
        match self.nodes.get(&id) {
            None => return Err(TreeError::NoSuchView(id)),
            Some(node) if node.parent.is_some() => return Err(TreeError::AlreadyAttached(id)),
            Some(_) => (),
        }

        if let Some(old_root) = self.root.take() {
            if let Some(node) = self.nodes.get_mut(&old_root) {
                node.container = None;
            }
        }

        if let Some(node) = self.nodes.get_mut(&id) {
            node.container = Some(host);
        }
        self.root = Some(id);
        self.invalidate(id);
        Ok(())
    }

    /// Appends `child` to the subviews of `parent`.
    pub fn add_subview(&mut self, parent: ViewId, child: ViewId) -> Result<(), TreeError> {
        self.check_attachable(parent, child)?;

        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.subviews.push(child);
        }
        self.invalidate(parent);
        Ok(())
    }

    fn check_attachable(&self, parent: ViewId, child: ViewId) -> Result<(), TreeError> {
        if !self.nodes.contains_key(&parent) {
            return Err(TreeError::NoSuchView(parent));
        }
        match self.nodes.get(&child) {
            None => return Err(TreeError::NoSuchView(child)),
            Some(node) if node.parent.is_some() || self.root == Some(child) => {
                return Err(TreeError::AlreadyAttached(child))
            }
            Some(_) => (),
        }

        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(TreeError::Cycle(child));
            }
            cursor = self.parent(id);
        }
        Ok(())
    }

    /// Links a view to a superview that owns it through its delegate rather than its subviews.
    pub(crate) fn adopt(&mut self, parent: ViewId, child: ViewId) -> Result<(), TreeError> {
        self.check_attachable(parent, child)?;
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        Ok(())
    }

    /// Detaches a view from its superview. The view stays in the tree.
    pub fn detach(&mut self, id: ViewId) -> Result<(), TreeError> {
        let parent = match self.nodes.get_mut(&id) {
            Some(node) => node.parent.take(),
            None => return Err(TreeError::NoSuchView(id)),
        };

        if let Some(parent) = parent {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.subviews.retain(|i| *i != id);
            }
            self.invalidate(parent);
        }
        Ok(())
    }

    /// Removes a view, its subviews, and all views owned by its delegate.
    ///
    /// Returns the detached node, whose subview list will be empty.
    pub fn remove_view(&mut self, id: ViewId) -> Option<ViewNode> {
        if self.detach(id).is_err() {
            return None;
        }
        if self.root == Some(id) {
            self.root = None;
        }

        let mut node = self.remove_recursive(id)?;
        node.subviews.clear();
        node.container = None;
        Some(node)
    }

    fn remove_recursive(&mut self, id: ViewId) -> Option<ViewNode> {
        let node = self.nodes.remove(&id)?;
        self.animator.cancel_view(id);

        let mut descendants = node.subviews.clone();
        if let Some(delegate) = &node.delegate {
            descendants.extend(delegate.owned_views());
        }
        for subview in descendants {
            // owned views may have been detached already
            if self.parent(subview) == Some(id) {
                self.remove_recursive(subview);
            }
        }

        trace!("removed view {:?}", id);
        Some(node)
    }

    /// Applies any number of property changes to a view and invalidates once.
    ///
    /// Returns false if the view does not exist.
    pub fn batch<F: FnOnce(&mut ViewNode)>(&mut self, id: ViewId, f: F) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => f(node),
            None => return false,
        }
        self.invalidate(id);
        true
    }

    pub fn set_translation(&mut self, id: ViewId, translation: Vector2<f64>) -> bool {
        self.batch(id, |node| node.translation = translation)
    }

    pub fn set_scale(&mut self, id: ViewId, scale: f64) -> bool {
        self.batch(id, |node| node.scale = scale)
    }

    /// Sets the opacity, clamped to `0..=1`.
    pub fn set_opacity(&mut self, id: ViewId, opacity: f64) -> bool {
        let opacity = if opacity.is_nan() {
            1.
        } else {
            opacity.max(0.).min(1.)
        };
        self.batch(id, |node| node.opacity = opacity)
    }

    pub fn set_visible(&mut self, id: ViewId, is_visible: bool) -> bool {
        self.batch(id, |node| node.is_visible = is_visible)
    }

    /// Binds a view to a data item.
    pub fn set_binding_context<T: Any + Send + Sync>(&mut self, id: ViewId, context: T) -> bool {
        let context: Arc<dyn Any + Send + Sync> = Arc::new(context);
        self.batch(id, |node| node.binding_context = Some(context))
    }

    /// Returns the delegate of a view if it is of type `D`.
    pub fn delegate<D: Delegate>(&self, id: ViewId) -> Option<&D> {
        self.nodes
            .get(&id)?
            .delegate
            .as_ref()?
            .as_any()
            .downcast_ref::<D>()
    }

    /// Runs a closure with mutable access to both a view’s delegate of type `D` and the tree.
    pub fn with_delegate<D, R, F>(&mut self, id: ViewId, f: F) -> Option<R>
    where
        D: Delegate,
        F: FnOnce(&mut D, &mut ViewTree) -> R,
    {
        let mut delegate = self.take_delegate(id)?;
        let result = delegate
            .as_any_mut()
            .downcast_mut::<D>()
            .map(|delegate| f(delegate, self));
        self.restore_delegate(id, delegate);
        result
    }

    // the delegate is removed from its node while its &mut hooks run, so it can borrow the tree
    fn take_delegate(&mut self, id: ViewId) -> Option<Box<dyn Delegate>> {
        self.nodes.get_mut(&id)?.delegate.take()
    }

    fn restore_delegate(&mut self, id: ViewId, delegate: Box<dyn Delegate>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.delegate = Some(delegate);
        }
    }

    /// Iterates over a view and all of its ancestors, innermost first.
    fn self_and_ancestors(&self, id: ViewId) -> impl Iterator<Item = &ViewNode> + '_ {
        let first = self.nodes.get(&id);
        std::iter::successors(first, move |node| {
            node.parent.and_then(|parent| self.nodes.get(&parent))
        })
    }

    /// `(x, y, width, height)` as of the last layout pass.
    pub fn bounds(&self, id: ViewId) -> Option<Rect> {
        self.nodes.get(&id).map(|node| node.bounds)
    }

    /// Product of this view’s scale and all ancestor scales.
    pub fn inherited_scale(&self, id: ViewId) -> f64 {
        self.self_and_ancestors(id).map(|node| node.scale).product()
    }

    /// Sum of this view’s translation and all ancestor translations.
    pub fn inherited_translation(&self, id: ViewId) -> Vector2<f64> {
        self.self_and_ancestors(id)
            .fold(Vector2::zero(), |acc, node| acc + node.translation)
    }

    /// Sum of this view’s layout position and all ancestor layout positions.
    pub fn inherited_position(&self, id: ViewId) -> Point2<f64> {
        self.self_and_ancestors(id)
            .fold(Point2::new(0., 0.), |acc, node| acc + node.bounds.origin.to_vec())
    }

    /// Where the view ends up on the canvas, ignoring scale.
    ///
    /// The root’s own position and translation count too, so a root laid out away from the
    /// origin moves the whole scene with it.
    pub fn render_bounds(&self, id: ViewId) -> Rect {
        let size = match self.nodes.get(&id) {
            Some(node) => node.bounds.size,
            None => return Rect::zero(),
        };
        let origin = self.inherited_position(id) + self.inherited_translation(id);
        Rect::new(origin, size)
    }

    /// Lays out a view in a rectangle relative to its superview.
    ///
    /// Invisible views are skipped and keep their previous geometry.
    pub fn layout(&mut self, id: ViewId, rect: Rect) {
        match self.nodes.get(&id) {
            Some(node) if node.is_visible => (),
            _ => return,
        }

        match self.take_delegate(id) {
            Some(mut delegate) => {
                delegate.layout(self, id, rect);
                self.restore_delegate(id, delegate);
            }
            None => self.set_layout_bounds(id, rect),
        }
    }

    /// Base layout: assigns the view’s geometry.
    pub fn set_layout_bounds(&mut self, id: ViewId, rect: Rect) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.bounds = rect;
        }
    }

    /// Computes the size a view would like to have within the given constraints, margins
    /// included. Infinite constraints are unconstrained.
    pub fn size_request(&self, id: ViewId, width: f64, height: f64) -> Vector2<f64> {
        let node = match self.nodes.get(&id) {
            Some(node) if node.is_visible => node,
            _ => return Vector2::zero(),
        };

        let margin_h = finite_or_zero(node.margin.horizontal());
        let margin_v = finite_or_zero(node.margin.vertical());
        let constraint = Vector2::new(
            shrink_constraint(width, margin_h),
            shrink_constraint(height, margin_v),
        );

        let mut result = match &node.delegate {
            Some(delegate) => delegate.size_request(self, id, constraint),
            None => self.base_size_request(id, constraint),
        };

        if result.x.is_finite() {
            result.x += margin_h;
        }
        if result.y.is_finite() {
            result.y += margin_v;
        }
        result
    }

    /// Base sizing rule: the size request clamped to the constraint on each axis that has one,
    /// or the constraint itself otherwise.
    pub fn base_size_request(&self, id: ViewId, constraint: Vector2<f64>) -> Vector2<f64> {
        match self.nodes.get(&id) {
            Some(node) => Vector2::new(
                request_axis(node.width_request, constraint.x),
                request_axis(node.height_request, constraint.y),
            ),
            None => Vector2::zero(),
        }
    }

    /// Finds the host by walking up to the root.
    pub fn host_of(&self, id: ViewId) -> Option<Arc<dyn Host>> {
        self.self_and_ancestors(id)
            .last()
            .and_then(|root| root.container.clone())
    }

    /// Requests a repaint from the host; does nothing for views that aren’t attached to one.
    pub fn invalidate(&self, id: ViewId) {
        if let Some(host) = self.host_of(id) {
            host.invalidate();
        }
    }

    /// Draws the root view.
    pub fn draw_root(&self, canvas: &mut dyn Canvas) {
        if let Some(root) = self.root {
            self.draw(root, canvas);
        }
    }

    /// Draws a view and its contents, applying its scale, clip and opacity.
    pub fn draw(&self, id: ViewId, canvas: &mut dyn Canvas) {
        let node = match self.nodes.get(&id) {
            Some(node) if node.is_visible => node,
            _ => return,
        };

        let render_bounds = self.render_bounds(id);
        let is_scaled = node.is_scaled();

        let saved = if is_scaled || node.clip_to_bounds {
            Some(canvas.save())
        } else {
            None
        };

        if is_scaled {
            // scale around the center of the view as it appears on the canvas
            let center = render_bounds.center().to_vec();
            canvas.translate(center);
            canvas.scale(node.scale);
            canvas.translate(-center);
        }

        if node.clip_to_bounds {
            canvas.clip_rect(render_bounds);
        }

        if node.is_opaque() {
            self.paint(id, node, canvas);
        } else {
            self.paint_composited(id, node, render_bounds, node.opacity, canvas);
        }

        if let Some(count) = saved {
            canvas.restore_to_count(count);
        }
    }

    /// Paints a view off-screen and composites the result with `opacity`, so that overlapping
    /// contents blend as one layer.
    fn paint_composited(
        &self,
        id: ViewId,
        node: &ViewNode,
        render_bounds: Rect,
        opacity: f64,
        canvas: &mut dyn Canvas,
    ) {
        let host = match self.host_of(id) {
            Some(host) => host,
            None => {
                trace!("not drawing translucent view {:?}: no host", id);
                return;
            }
        };

        let mut surface = host.create_opacity_surface();
        {
            let surface_canvas = surface.canvas();
            if node.clip_to_bounds {
                surface_canvas.clip_rect(render_bounds);
            }
            self.paint(id, node, surface_canvas);
        }
        let image = surface.snapshot();
        canvas.draw_image(&image, Point2::new(0., 0.), opacity);
    }

    fn paint(&self, id: ViewId, node: &ViewNode, canvas: &mut dyn Canvas) {
        match &node.delegate {
            Some(delegate) => delegate.paint(self, id, canvas),
            None => self.paint_content(id, canvas),
        }
    }

    /// Base paint routine: background, frame, custom drawing, then subviews in order.
    pub fn paint_content(&self, id: ViewId, canvas: &mut dyn Canvas) {
        let node = match self.nodes.get(&id) {
            Some(node) => node,
            None => return,
        };
        let render_bounds = self.render_bounds(id);

        if node.background.is_visible() {
            canvas.fill_rect(render_bounds, node.background);
        }

        if node.frame_color.is_visible() {
            canvas.stroke_rect(render_bounds, node.frame_color, node.frame_thickness);
        }

        if let Some(drawing) = &node.drawing {
            drawing(
                canvas,
                &DrawInfo {
                    view: id,
                    node,
                    render_bounds,
                },
            );
        }

        for subview in &node.subviews {
            self.draw(*subview, canvas);
        }
    }

    /// Returns all gesture recognizers under a point, starting from the root.
    ///
    /// Later entries belong to views that are drawn later and may shadow earlier ones.
    pub fn gesture_targets(&self, point: Point2<f64>) -> Vec<GestureTarget> {
        let mut matches = Vec::new();
        if let Some(root) = self.root {
            self.collect_gesture_targets(root, point, &mut matches);
        }
        matches
    }

    /// Appends gesture recognizers of a visible view (and, depending on its delegate, its
    /// contents) under a point.
    pub fn collect_gesture_targets(
        &self,
        id: ViewId,
        point: Point2<f64>,
        matches: &mut Vec<GestureTarget>,
    ) {
        let node = match self.nodes.get(&id) {
            Some(node) if node.is_visible => node,
            _ => return,
        };
        match &node.delegate {
            Some(delegate) => delegate.collect_gesture_targets(self, id, point, matches),
            None => self.collect_own_gesture_targets(id, point, matches),
        }
    }

    /// Appends the view’s own recognizers if the point is within its render bounds.
    pub fn collect_own_gesture_targets(
        &self,
        id: ViewId,
        point: Point2<f64>,
        matches: &mut Vec<GestureTarget>,
    ) {
        let node = match self.nodes.get(&id) {
            Some(node) => node,
            None => return,
        };
        if self.render_bounds(id).contains(point) {
            for recognizer in &node.gesture_recognizers {
                matches.push(GestureTarget {
                    view: id,
                    recognizer: recognizer.clone(),
                });
            }
        }
    }

    /// Delivers a recognized gesture to a view.
    ///
    /// Calls the handlers of all matching recognizers, then the delegate. Returns false if the
    /// view has no recognizer for this kind of gesture.
    pub fn dispatch_gesture(&mut self, id: ViewId, gesture: Gesture) -> bool {
        let recognizers: Vec<_> = match self.nodes.get(&id) {
            Some(node) => node
                .gesture_recognizers
                .iter()
                .filter(|r| r.accepts(&gesture))
                .cloned()
                .collect(),
            None => return false,
        };
        if recognizers.is_empty() {
            return false;
        }

        for recognizer in &recognizers {
            recognizer.fire(&gesture);
        }

        if let Some(mut delegate) = self.take_delegate(id) {
            delegate.on_gesture(self, id, &gesture);
            self.restore_delegate(id, delegate);
        }
        true
    }

    /// Animates a view’s translation from its current value.
    pub fn translate_to(
        &mut self,
        id: ViewId,
        to: Vector2<f64>,
        duration: Duration,
        easing: Easing,
    ) {
        self.translate_to_in_group(id, to, duration, easing, None);
    }

    pub(crate) fn translate_to_in_group(
        &mut self,
        id: ViewId,
        to: Vector2<f64>,
        duration: Duration,
        easing: Easing,
        group: Option<GroupId>,
    ) {
        let from = match self.nodes.get(&id) {
            Some(node) => node.translation,
            None => return,
        };
        self.animator
            .translate(id, from, to, duration, easing, group);
    }

    /// Advances animations to the frame time `now` (from a monotonic clock).
    ///
    /// Runs continuations of finished animation groups after applying the final values.
    pub fn tick(&mut self, now: Duration) {
        let frame = self.animator.advance(now);
        trace!(
            "tick at {:?}: {} updates, {} completions",
            now,
            frame.updates.len(),
            frame.completed.len()
        );

        for (id, translation) in frame.updates {
            self.set_translation(id, translation);
        }
        for continuation in frame.completed {
            continuation(self);
        }
    }

    /// Lets delegates process pending notifications (e.g. item source changes).
    pub fn poll(&mut self) {
        let ids: Vec<_> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.delegate.is_some())
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            if let Some(mut delegate) = self.take_delegate(id) {
                delegate.poll(self, id);
                self.restore_delegate(id, delegate);
            }
        }
    }

    /// Discards a view that a delegate owned: clears its superview link and drops it.
    pub(crate) fn discard(&mut self, id: ViewId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
        debug!("discarding view {:?}", id);
        self.remove_view(id);
    }
}

impl Default for ViewTree {
    fn default() -> Self {
        ViewTree::new()
    }
}

#[cfg(test)]
use crate::color::Color;
#[cfg(test)]
use crate::events::GestureRecognizer;
#[cfg(test)]
use crate::raster::HeadlessHost;
#[cfg(test)]
use crate::rect::Insets;
#[cfg(test)]
use crate::view::Overlay;

#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
enum Op {
    Save(usize),
    Restore(usize),
    Translate(Vector2<f64>),
    Scale(f64),
    Clip(Rect),
    Fill(Rect, Color),
    Stroke(Rect, Color, f64),
    Image(f64),
}

/// Records canvas operations.
#[cfg(test)]
#[derive(Default)]
struct Recorder {
    ops: Vec<Op>,
    depth: usize,
}

#[cfg(test)]
impl Canvas for Recorder {
    fn save(&mut self) -> usize {
        let count = self.depth;
        self.depth += 1;
        self.ops.push(Op::Save(count));
        count
    }
    fn restore_to_count(&mut self, count: usize) {
        self.depth = count;
        self.ops.push(Op::Restore(count));
    }
    fn translate(&mut self, offset: Vector2<f64>) {
        self.ops.push(Op::Translate(offset));
    }
    fn scale(&mut self, factor: f64) {
        self.ops.push(Op::Scale(factor));
    }
    fn clip_rect(&mut self, rect: Rect) {
        self.ops.push(Op::Clip(rect));
    }
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(Op::Fill(rect, color));
    }
    fn stroke_rect(&mut self, rect: Rect, color: Color, thickness: f64) {
        self.ops.push(Op::Stroke(rect, color, thickness));
    }
    fn draw_image(&mut self, _: &crate::canvas::Image, _: Point2<f64>, alpha: f64) {
        self.ops.push(Op::Image(alpha));
    }
}

#[cfg(test)]
fn chain(tree: &mut ViewTree) -> (ViewId, ViewId, ViewId) {
    let root = tree.insert(ViewNode::new().translation(10., 0.).scale(2.));
    let child = tree.insert(ViewNode::new().translation(5., 0.));
    let grandchild = tree.insert(ViewNode::new());
    tree.add_subview(root, child).unwrap();
    tree.add_subview(child, grandchild).unwrap();
    (root, child, grandchild)
}

#[test]
fn test_inherited_transforms_compose_down_the_chain() {
    let mut tree = ViewTree::new();
    let (root, child, grandchild) = chain(&mut tree);

    assert_eq!(tree.inherited_translation(grandchild).x, 15.);
    assert_eq!(tree.inherited_scale(grandchild), 2.);
    assert_eq!(tree.inherited_translation(child).x, 15.);
    assert_eq!(tree.inherited_translation(root).x, 10.);

    tree.layout(root, Rect::from_xywh(1., 2., 100., 100.));
    tree.layout(child, Rect::from_xywh(10., 20., 50., 50.));
    tree.layout(grandchild, Rect::from_xywh(3., 4., 5., 6.));
    assert_eq!(tree.inherited_position(grandchild), Point2::new(14., 26.));
    assert_eq!(
        tree.render_bounds(grandchild),
        Rect::from_xywh(29., 26., 5., 6.),
        "render bounds are inherited position plus inherited translation"
    );
}

#[test]
fn test_root_origin_shifts_the_scene() {
    let mut tree = ViewTree::new();
    let root = tree.insert(ViewNode::new());
    let child = tree.insert(ViewNode::new().background(Color::BLACK));
    tree.add_subview(root, child).unwrap();
    let host = Arc::new(HeadlessHost::new(20, 20));
    tree.set_root(root, host.clone()).unwrap();

    tree.layout(root, Rect::from_xywh(10., 10., 10., 10.));
    tree.layout(child, Rect::from_xywh(0., 0., 5., 5.));
    assert_eq!(tree.render_bounds(child), Rect::from_xywh(10., 10., 5., 5.));

    let bitmap = host.render(&tree);
    assert_eq!(bitmap.pixel(2, 2), [0., 0., 0., 0.]);
    assert_eq!(bitmap.pixel(12, 12), [0., 0., 0., 1.]);

    tree.layout(root, Rect::from_xywh(0., 0., 20., 20.));
    let bitmap = host.render(&tree);
    assert_eq!(bitmap.pixel(2, 2), [0., 0., 0., 1.]);
}

#[test]
fn test_layout_round_trips_and_skips_invisible_views() {
    let mut tree = ViewTree::new();
    let view = tree.insert(ViewNode::new());
    let rect = Rect::from_xywh(3., 4., 50., 60.);
    tree.layout(view, rect);
    assert_eq!(tree.bounds(view), Some(rect));

    tree.set_visible(view, false);
    tree.layout(view, Rect::from_xywh(0., 0., 1., 1.));
    assert_eq!(
        tree.bounds(view),
        Some(rect),
        "invisible views keep their geometry"
    );
}

#[test]
fn test_size_request_applies_margins_and_requests() {
    let mut tree = ViewTree::new();
    let view = tree.insert(
        ViewNode::new()
            .size_request(40., -1.)
            .margin(Insets::new(1., 2., 3., 4.)),
    );

    assert_eq!(tree.size_request(view, 100., 100.), Vector2::new(44., 100.));
    assert_eq!(
        tree.size_request(view, 20., f64::INFINITY),
        Vector2::new(20., f64::INFINITY),
        "requests are clamped to constraints; unconstrained axes stay unconstrained"
    );
    assert_eq!(
        tree.size_request(view, f64::INFINITY, f64::INFINITY).x,
        44.,
        "unconstrained axes with a request return the request"
    );

    let size = tree.size_request(view, f64::NAN, f64::NEG_INFINITY);
    assert!(!size.x.is_nan() && !size.y.is_nan(), "NaN must not propagate");
    assert_eq!(size.x, 4., "NaN constraints clamp to zero");
    assert_eq!(size.y, f64::INFINITY);

    tree.set_visible(view, false);
    assert_eq!(tree.size_request(view, 100., 100.), Vector2::zero());
}

#[test]
fn test_invalidation_reaches_the_host_through_the_root() {
    let mut tree = ViewTree::new();
    let (root, _, grandchild) = chain(&mut tree);
    let detached = tree.insert(ViewNode::new());

    // not attached to a host yet
    tree.invalidate(grandchild);

    let host = Arc::new(HeadlessHost::new(10, 10));
    tree.set_root(root, host.clone()).unwrap();
    assert!(host.take_invalidated());
    assert!(!host.take_invalidated(), "invalidations coalesce until taken");

    tree.invalidate(detached);
    assert!(!host.take_invalidated(), "detached views don’t reach the host");

    let before = host.invalidation_count();
    tree.batch(grandchild, |node| {
        node.opacity = 0.5;
        node.background = Color::WHITE;
        node.scale = 3.;
    });
    assert_eq!(host.invalidation_count(), before + 1, "a batch invalidates once");
    assert!(host.take_invalidated());

    tree.set_binding_context(grandchild, 42u32);
    assert!(host.take_invalidated(), "binding context changes invalidate");
    assert_eq!(tree.get(grandchild).unwrap().binding_context::<u32>(), Some(&42));
}

#[test]
fn test_structural_errors() {
    let mut tree = ViewTree::new();
    let (root, child, grandchild) = chain(&mut tree);
    let missing = ViewId::new();

    assert_eq!(tree.add_subview(grandchild, root), Err(TreeError::Cycle(root)));
    assert_eq!(
        tree.add_subview(root, grandchild),
        Err(TreeError::AlreadyAttached(grandchild))
    );
    assert_eq!(tree.add_subview(root, missing), Err(TreeError::NoSuchView(missing)));

    tree.detach(grandchild).unwrap();
    assert_eq!(tree.parent(grandchild), None);
    assert!(tree.subviews_of(child).is_empty());
    tree.add_subview(root, grandchild).unwrap();
    assert_eq!(tree.subviews_of(root), vec![child, grandchild]);
}

#[test]
fn test_removing_a_view_removes_its_subtree() {
    let mut tree = ViewTree::new();
    let (root, child, grandchild) = chain(&mut tree);
    let removed = tree.remove_view(child).expect("child should exist");
    assert_eq!(removed.parent(), None);
    assert!(!tree.contains(child));
    assert!(!tree.contains(grandchild));
    assert!(tree.subviews_of(root).is_empty());
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_draw_applies_scale_around_center_and_clip() {
    let mut tree = ViewTree::new();
    let view = tree.insert(
        ViewNode::new()
            .scale(2.)
            .clipped(true)
            .background(Color::BLACK)
            .frame(Color::WHITE, 2.),
    );
    tree.layout(view, Rect::from_xywh(10., 10., 20., 40.));

    let mut canvas = Recorder::default();
    tree.draw(view, &mut canvas);
    let bounds = Rect::from_xywh(10., 10., 20., 40.);
    assert_eq!(
        canvas.ops,
        vec![
            Op::Save(0),
            Op::Translate(Vector2::new(20., 30.)),
            Op::Scale(2.),
            Op::Translate(Vector2::new(-20., -30.)),
            Op::Clip(bounds),
            Op::Fill(bounds, Color::BLACK),
            Op::Stroke(bounds, Color::WHITE, 2.),
            Op::Restore(0),
        ]
    );
}

#[test]
fn test_draw_paints_subviews_in_order_and_skips_invisible() {
    let mut tree = ViewTree::new();
    let parent = tree.insert(ViewNode::with_delegate(Overlay));
    let a = tree.insert(ViewNode::new().background(Color::BLACK));
    let b = tree.insert(ViewNode::new().background(Color::WHITE));
    let hidden = tree.insert(ViewNode::new().background(Color::BLACK).visible(false));
    tree.add_subview(parent, a).unwrap();
    tree.add_subview(parent, hidden).unwrap();
    tree.add_subview(parent, b).unwrap();
    tree.layout(parent, Rect::from_xywh(5., 5., 10., 10.));

    let mut canvas = Recorder::default();
    tree.draw(parent, &mut canvas);
    let expected = Rect::from_xywh(5., 5., 10., 10.);
    assert_eq!(
        canvas.ops,
        vec![Op::Fill(expected, Color::BLACK), Op::Fill(expected, Color::WHITE)],
        "subviews fill the overlay and are drawn in order"
    );
}

#[test]
fn test_translucent_views_are_composited_once() {
    let mut tree = ViewTree::new();
    let root = tree.insert(ViewNode::with_delegate(Overlay));
    let view = tree.insert(ViewNode::new().opacity(0.5).background(Color::BLACK));
    tree.add_subview(root, view).unwrap();

    let mut canvas = Recorder::default();
    tree.layout(root, Rect::from_xywh(0., 0., 10., 10.));
    tree.draw(root, &mut canvas);
    assert!(canvas.ops.is_empty(), "translucent views need a host to draw");

    let host = Arc::new(HeadlessHost::new(10, 10));
    tree.set_root(root, host.clone()).unwrap();
    tree.draw(root, &mut canvas);
    assert_eq!(
        canvas.ops,
        vec![Op::Image(0.5)],
        "the background goes to the opacity surface, which is composited with the opacity"
    );
    assert_eq!(host.surfaces_created(), 1);
    assert_eq!(host.live_surfaces(), 0, "opacity surfaces are released after drawing");
}

#[test]
fn test_gesture_targets_follow_draw_order() {
    let mut tree = ViewTree::new();
    let root = tree.insert(ViewNode::with_delegate(Overlay).gesture(GestureRecognizer::tap()));
    let plain = tree.insert(ViewNode::new().gesture(GestureRecognizer::swipe()));
    let leaf = tree.insert(ViewNode::new().gesture(GestureRecognizer::tap()));
    tree.add_subview(root, plain).unwrap();
    tree.add_subview(plain, leaf).unwrap();
    tree.set_root(root, Arc::new(HeadlessHost::new(100, 100))).unwrap();
    tree.layout(root, Rect::from_xywh(0., 0., 100., 100.));
    tree.layout(plain, Rect::from_xywh(0., 0., 50., 50.));
    tree.layout(leaf, Rect::from_xywh(0., 0., 10., 10.));

    let views: Vec<_> = tree
        .gesture_targets(Point2::new(5., 5.))
        .into_iter()
        .map(|target| target.view)
        .collect();
    assert_eq!(
        views,
        vec![root, plain],
        "plain views don’t recurse into their subviews"
    );

    let views: Vec<_> = tree
        .gesture_targets(Point2::new(75., 75.))
        .into_iter()
        .map(|target| target.view)
        .collect();
    assert_eq!(views, vec![root], "points outside a view don’t match it");

    assert!(tree.dispatch_gesture(plain, Gesture::SwipeLeft));
    assert!(
        !tree.dispatch_gesture(plain, Gesture::Tap(Point2::new(1., 1.))),
        "the view has no tap recognizer"
    );
}

#[test]
fn test_tick_drives_translation_animations() {
    let mut tree = ViewTree::new();
    let view = tree.insert(ViewNode::new().translation(100., 0.));
    tree.translate_to(view, Vector2::zero(), Duration::from_millis(100), Easing::Linear);

    tree.tick(Duration::from_millis(1000));
    assert_eq!(
        tree.get(view).unwrap().translation,
        Vector2::new(100., 0.),
        "the clock starts on the first tick"
    );
    tree.tick(Duration::from_millis(1050));
    assert_eq!(tree.get(view).unwrap().translation, Vector2::new(50., 0.));
    tree.tick(Duration::from_millis(1150));
    assert_eq!(tree.get(view).unwrap().translation, Vector2::zero());
    assert!(!tree.animator().is_animating());
}
