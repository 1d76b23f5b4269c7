//! A container that shows one item of a list at a time and slides between pages.
//!
//! Pages are realized on demand from a [`DataTemplate`], bound to exactly one item through their
//! binding context, and discarded once superseded. At most two pages exist at once: the current
//! one and, during a transition, the incoming one.

use crate::animation::{Easing, GroupId};
use crate::binding::{CollectionChange, Observable, ObservableList};
use crate::canvas::Canvas;
use crate::events::{Gesture, GestureRecognizer, GestureTarget};
use crate::rect::Rect;
use crate::tree::ViewTree;
use crate::view::{Delegate, ViewId, ViewNode};
use cgmath::{Point2, Vector2, Zero};
use core::any::Any;
use core::fmt;
use core::marker::PhantomData;
use crossbeam::channel::Receiver;
use log::{debug, trace, warn};
use std::sync::Arc;
use std::time::Duration;

/// Creates page views.
pub trait DataTemplate: Send + Sync {
    /// Creates a new, unbound view. Called once per page.
    fn create_content(&self) -> ViewNode;
}

impl<F: Fn() -> ViewNode + Send + Sync> DataTemplate for F {
    fn create_content(&self) -> ViewNode {
        self()
    }
}

/// Items that can be shown in a paging view.
pub trait PageItem: Clone + PartialEq + Send + Sync + 'static {}

impl<T: Clone + PartialEq + Send + Sync + 'static> PageItem for T {}

/// Page transition settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagingOptions {
    pub duration: Duration,
    pub easing: Easing,
}

impl Default for PagingOptions {
    fn default() -> Self {
        PagingOptions {
            duration: Duration::from_millis(250),
            easing: Easing::CubicInOut,
        }
    }
}

/// A realized page: a view and the item it is bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub view: ViewId,
    pub item: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PagingState<T> {
    /// No transition; the current page (if any) shows the item at the visible page index.
    Idle { current: Option<Page<T>> },
    /// A page is sliding in while the previous one slides out.
    Transitioning {
        target: usize,
        outgoing: Page<T>,
        incoming: Page<T>,
        group: GroupId,
    },
}

/// Paging view delegate.
///
/// Use [`PagingContainer`] to create and drive one.
pub struct PagingView<T> {
    template: Arc<dyn DataTemplate>,
    options: PagingOptions,
    items: Option<ObservableList<T>>,
    changes: Option<Receiver<CollectionChange>>,
    selected_index: Observable<usize>,
    visible_page_index: Option<usize>,
    state: PagingState<T>,
}

impl<T: PageItem> fmt::Debug for PagingView<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PagingView")
            .field("options", &self.options)
            .field("items", &self.items.as_ref().map(|items| items.len()))
            .field("selected_index", &self.selected_index)
            .field("visible_page_index", &self.visible_page_index)
            .field("current", &self.current_page().map(|page| page.view))
            .field("incoming", &self.incoming_page().map(|page| page.view))
            .finish()
    }
}

impl<T: PageItem> PagingView<T> {
    pub fn new<D: DataTemplate + 'static>(template: D, options: PagingOptions) -> PagingView<T> {
        PagingView {
            template: Arc::new(template),
            options,
            items: None,
            changes: None,
            selected_index: Observable::new(0),
            visible_page_index: None,
            state: PagingState::Idle { current: None },
        }
    }

    pub fn state(&self) -> &PagingState<T> {
        &self.state
    }

    /// The page that is fully visible, or sliding out during a transition.
    pub fn current_page(&self) -> Option<&Page<T>> {
        match &self.state {
            PagingState::Idle { current } => current.as_ref(),
            PagingState::Transitioning { outgoing, .. } => Some(outgoing),
        }
    }

    pub fn incoming_page(&self) -> Option<&Page<T>> {
        match &self.state {
            PagingState::Idle { .. } => None,
            PagingState::Transitioning { incoming, .. } => Some(incoming),
        }
    }

    pub fn is_transitioning(&self) -> bool {
        self.incoming_page().is_some()
    }

    fn pages(&self) -> Vec<ViewId> {
        self.current_page()
            .into_iter()
            .chain(self.incoming_page())
            .map(|page| page.view)
            .collect()
    }

    /// The page that represents the selected index: the incoming page while transitioning.
    fn selected_page(&self) -> Option<&Page<T>> {
        self.incoming_page().or_else(|| self.current_page())
    }

    /// Replaces the item source and rebuilds.
    pub(crate) fn set_items(
        &mut self,
        tree: &mut ViewTree,
        id: ViewId,
        items: Option<ObservableList<T>>,
    ) {
        // dropping the old receiver unsubscribes from the old list
        self.changes = items.as_ref().map(|items| items.subscribe());
        self.items = items;

        if let Some(items) = &self.items {
            let selected = self.selected_index.get();
            if !items.is_empty() && selected >= items.len() {
                self.selected_index.set_internal(items.len() - 1);
            }
        }

        self.visible_page_index = None;
        self.setup_page(tree, id);
    }

    /// Slides to the page at `index`.
    ///
    /// Does nothing if the page is already visible, a transition is in flight, or there are no
    /// items. Commits the selected index immediately.
    pub(crate) fn animate_to_page(&mut self, tree: &mut ViewTree, id: ViewId, index: usize) {
        if self.visible_page_index == Some(index) || self.is_transitioning() {
            trace!("paging view {:?}: ignoring request for page {}", id, index);
            return;
        }
        let items = match &self.items {
            Some(items) => items.clone(),
            None => return,
        };
        let item = match items.get(index) {
            Some(item) => item,
            None => {
                warn!(
                    "paging view {:?}: dropping request for page {} of {}",
                    id,
                    index,
                    items.len()
                );
                return;
            }
        };

        let state = std::mem::replace(&mut self.state, PagingState::Idle { current: None });
        let outgoing = match state {
            PagingState::Idle {
                current: Some(page),
            } => page,
            _ => {
                // nothing to slide out
                self.selected_index.set_internal(index);
                self.setup_page(tree, id);
                return;
            }
        };

        let size = tree.bounds(id).map_or_else(Vector2::zero, |bounds| bounds.size);
        let offset = match self.visible_page_index {
            Some(visible) if visible > index => -size.x,
            _ => size.x,
        };

        let incoming = match self.realize(tree, id, item, size) {
            Some(page) => page,
            None => {
                self.state = PagingState::Idle {
                    current: Some(outgoing),
                };
                return;
            }
        };
        self.visible_page_index = Some(index);
        self.selected_index.set_internal(index);
        tree.set_translation(incoming.view, Vector2::new(offset, 0.));

        let group = tree
            .animator_mut()
            .begin_group(Box::new(move |tree: &mut ViewTree| {
                tree.with_delegate(id, |paging: &mut PagingView<T>, tree| {
                    paging.finish_transition(tree, id);
                });
            }));
        let PagingOptions { duration, easing } = self.options;
        tree.translate_to_in_group(incoming.view, Vector2::zero(), duration, easing, Some(group));
        tree.translate_to_in_group(
            outgoing.view,
            Vector2::new(-offset, 0.),
            duration,
            easing,
            Some(group),
        );

        debug!(
            "paging view {:?}: sliding to page {} (offset {})",
            id, index, offset
        );
        self.state = PagingState::Transitioning {
            target: index,
            outgoing,
            incoming,
            group,
        };
        tree.invalidate(id);
    }

    /// Swaps in the incoming page once both slides are done.
    ///
    /// Transitions torn down before completion abandon their group, so this only ever sees the
    /// transition that scheduled it.
    fn finish_transition(&mut self, tree: &mut ViewTree, id: ViewId) {
        let state = std::mem::replace(&mut self.state, PagingState::Idle { current: None });
        match state {
            PagingState::Transitioning {
                target,
                outgoing,
                incoming,
                ..
            } => {
                tree.discard(outgoing.view);
                debug!("paging view {:?}: now showing page {}", id, target);
                self.state = PagingState::Idle {
                    current: Some(incoming),
                };
                tree.invalidate(id);
            }
            state => self.state = state,
        }
    }

    /// Realizes a page for an item and lays it out to fill the container.
    fn realize(
        &self,
        tree: &mut ViewTree,
        id: ViewId,
        item: T,
        size: Vector2<f64>,
    ) -> Option<Page<T>> {
        let view = tree.insert(self.template.create_content());
        tree.set_binding_context(view, item.clone());
        if let Err(err) = tree.adopt(id, view) {
            debug!("paging view {:?}: could not adopt page: {}", id, err);
            tree.remove_view(view);
            return None;
        }
        tree.layout(view, Rect::new(Point2::new(0., 0.), size));
        Some(Page { view, item })
    }

    /// Discards all pages and abandons any running transition.
    fn clear_pages(&mut self, tree: &mut ViewTree) {
        match std::mem::replace(&mut self.state, PagingState::Idle { current: None }) {
            PagingState::Idle { current } => {
                if let Some(page) = current {
                    tree.discard(page.view);
                }
            }
            PagingState::Transitioning {
                outgoing,
                incoming,
                group,
                ..
            } => {
                tree.animator_mut().abandon_group(group);
                tree.discard(outgoing.view);
                tree.discard(incoming.view);
            }
        }
    }

    /// Synchronously shows the selected page if it isn’t visible yet; tears everything down if
    /// there are no items.
    fn setup_page(&mut self, tree: &mut ViewTree, id: ViewId) {
        let items = match &self.items {
            Some(items) if !items.is_empty() => items.clone(),
            _ => {
                debug!("paging view {:?}: no items", id);
                self.clear_pages(tree);
                self.visible_page_index = None;
                tree.invalidate(id);
                return;
            }
        };

        let selected = self.selected_index.get();
        if self.visible_page_index == Some(selected) {
            return;
        }
        let item = match items.get(selected) {
            Some(item) => item,
            None => {
                warn!(
                    "paging view {:?}: selected page {} of {} does not exist",
                    id,
                    selected,
                    items.len()
                );
                return;
            }
        };

        let size = tree.bounds(id).map_or_else(Vector2::zero, |bounds| bounds.size);
        self.clear_pages(tree);
        if let Some(page) = self.realize(tree, id, item, size) {
            tree.set_translation(page.view, Vector2::zero());
            debug!("paging view {:?}: rebuilt page {}", id, selected);
            self.state = PagingState::Idle {
                current: Some(page),
            };
            self.visible_page_index = Some(selected);
        }
        tree.invalidate(id);
    }

    /// Reconciles the selection with a changed item source.
    fn items_changed(&mut self, tree: &mut ViewTree, id: ViewId) {
        let items = match &self.items {
            Some(items) => items.clone(),
            None => return self.setup_page(tree, id),
        };
        let count = items.len();
        let selected = self.selected_index.get();

        if selected > count {
            let clamped = count.saturating_sub(1);
            debug!(
                "paging view {:?}: clamping selection {} to {}",
                id, selected, clamped
            );
            self.selected_index.set_internal(clamped);
            self.setup_page(tree, id);
        } else if selected < count
            && self.selected_page().map(|page| &page.item) != items.get(selected).as_ref()
        {
            self.visible_page_index = None;
            self.setup_page(tree, id);
        } else if count == 0 {
            self.setup_page(tree, id);
        }
    }

    fn swipe(&mut self, tree: &mut ViewTree, id: ViewId, gesture: &Gesture) {
        let count = match &self.items {
            Some(items) => items.len(),
            None => return,
        };
        let selected = self.selected_index.get();
        match gesture {
            Gesture::SwipeLeft if selected + 1 < count => {
                self.animate_to_page(tree, id, selected + 1)
            }
            Gesture::SwipeRight if selected > 0 => self.animate_to_page(tree, id, selected - 1),
            _ => (),
        }
    }
}

impl<T: PageItem> Delegate for PagingView<T> {
    fn layout(&mut self, tree: &mut ViewTree, id: ViewId, rect: Rect) {
        tree.set_layout_bounds(id, rect);
        for page in self.pages() {
            tree.layout(page, rect.at_zero());
        }
    }

    fn paint(&self, tree: &ViewTree, id: ViewId, canvas: &mut dyn Canvas) {
        tree.paint_content(id, canvas);
        // incoming is drawn last, above the current page
        for page in self.pages() {
            tree.draw(page, canvas);
        }
    }

    fn collect_gesture_targets(
        &self,
        tree: &ViewTree,
        id: ViewId,
        point: Point2<f64>,
        matches: &mut Vec<GestureTarget>,
    ) {
        tree.collect_own_gesture_targets(id, point, matches);
        for page in self.pages() {
            tree.collect_gesture_targets(page, point, matches);
        }
    }

    fn on_gesture(&mut self, tree: &mut ViewTree, id: ViewId, gesture: &Gesture) {
        self.swipe(tree, id, gesture);
    }

    fn poll(&mut self, tree: &mut ViewTree, id: ViewId) {
        let changed = match &self.changes {
            Some(changes) => changes.try_iter().count() > 0,
            None => false,
        };
        if changed {
            self.items_changed(tree, id);
        }

        if let Some(index) = self.selected_index.take_external_write() {
            self.animate_to_page(tree, id, index);
        }
    }

    fn owned_views(&self) -> Vec<ViewId> {
        self.pages()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A typed handle to a paging view in a [`ViewTree`].
///
/// All methods do nothing (or return `None`) if the view no longer exists.
pub struct PagingContainer<T> {
    id: ViewId,
    _item: PhantomData<fn() -> T>,
}

impl<T> Clone for PagingContainer<T> {
    fn clone(&self) -> Self {
        PagingContainer {
            id: self.id,
            _item: PhantomData,
        }
    }
}

impl<T> Copy for PagingContainer<T> {}

impl<T> fmt::Debug for PagingContainer<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PagingContainer({:?})", self.id)
    }
}

impl<T: PageItem> PagingContainer<T> {
    /// Adds a detached paging view with default options to the tree.
    pub fn new<D: DataTemplate + 'static>(tree: &mut ViewTree, template: D) -> Self {
        PagingContainer::with_options(tree, template, PagingOptions::default())
    }

    pub fn with_options<D: DataTemplate + 'static>(
        tree: &mut ViewTree,
        template: D,
        options: PagingOptions,
    ) -> Self {
        let node = ViewNode::with_delegate(PagingView::<T>::new(template, options))
            .clipped(true)
            .gesture(GestureRecognizer::swipe());
        PagingContainer {
            id: tree.insert(node),
            _item: PhantomData,
        }
    }

    /// Returns a handle if the view is a paging view for items of type `T`.
    pub fn from_id(tree: &ViewTree, id: ViewId) -> Option<Self> {
        tree.delegate::<PagingView<T>>(id).map(|_| PagingContainer {
            id,
            _item: PhantomData,
        })
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    fn view<'a>(&self, tree: &'a ViewTree) -> Option<&'a PagingView<T>> {
        tree.delegate::<PagingView<T>>(self.id)
    }

    fn update<R, F>(&self, tree: &mut ViewTree, f: F) -> Option<R>
    where
        F: FnOnce(&mut PagingView<T>, &mut ViewTree, ViewId) -> R,
    {
        let id = self.id;
        tree.with_delegate(id, |paging: &mut PagingView<T>, tree| f(paging, tree, id))
    }

    /// Sets (or clears) the item source and rebuilds the current page.
    pub fn set_items(&self, tree: &mut ViewTree, items: Option<ObservableList<T>>) {
        self.update(tree, |paging, tree, id| paging.set_items(tree, id, items));
    }

    pub fn items(&self, tree: &ViewTree) -> Option<ObservableList<T>> {
        self.view(tree).and_then(|paging| paging.items.clone())
    }

    pub fn selected_index(&self, tree: &ViewTree) -> Option<usize> {
        self.view(tree).map(|paging| paging.selected_index.get())
    }

    /// The two-way bindable selected index.
    ///
    /// Writes with [`Observable::set`] are picked up on the next [`ViewTree::poll`] and slide to
    /// the new page.
    pub fn selected(&self, tree: &ViewTree) -> Option<Observable<usize>> {
        self.view(tree).map(|paging| paging.selected_index.clone())
    }

    /// Selects a page and slides to it.
    ///
    /// The selection is stored even if the transition is dropped.
    pub fn set_selected_index(&self, tree: &mut ViewTree, index: usize) {
        self.update(tree, |paging, tree, id| {
            paging.selected_index.set_internal(index);
            paging.animate_to_page(tree, id, index);
        });
    }

    /// Slides to a page.
    ///
    /// Does nothing if the page is already visible, a transition is in flight, or the index is
    /// out of range.
    pub fn animate_to_page(&self, tree: &mut ViewTree, index: usize) {
        self.update(tree, |paging, tree, id| paging.animate_to_page(tree, id, index));
    }

    /// The index of the page that is (or is becoming) visible.
    pub fn visible_page_index(&self, tree: &ViewTree) -> Option<usize> {
        self.view(tree).and_then(|paging| paging.visible_page_index)
    }

    pub fn current_view(&self, tree: &ViewTree) -> Option<ViewId> {
        self.view(tree)
            .and_then(|paging| paging.current_page())
            .map(|page| page.view)
    }

    pub fn incoming_view(&self, tree: &ViewTree) -> Option<ViewId> {
        self.view(tree)
            .and_then(|paging| paging.incoming_page())
            .map(|page| page.view)
    }

    pub fn is_transitioning(&self, tree: &ViewTree) -> bool {
        self.view(tree).map_or(false, |paging| paging.is_transitioning())
    }

    pub fn state<'a>(&self, tree: &'a ViewTree) -> Option<&'a PagingState<T>> {
        self.view(tree).map(|paging| paging.state())
    }
}

#[cfg(test)]
use crate::color::Color;
#[cfg(test)]
use crate::raster::HeadlessHost;

#[cfg(test)]
fn page_template() -> ViewNode {
    ViewNode::new().drawing(|canvas, info| {
        if let Some(color) = info.node.binding_context::<Color>() {
            canvas.fill_rect(info.render_bounds, *color);
        }
    })
}

#[cfg(test)]
fn paging_fixture(items: Vec<&'static str>) -> (ViewTree, PagingContainer<&'static str>) {
    let mut tree = ViewTree::new();
    let paging = PagingContainer::new(&mut tree, ViewNode::new);
    tree.set_root(paging.id(), Arc::new(HeadlessHost::new(100, 50)))
        .unwrap();
    tree.layout(paging.id(), Rect::from_xywh(0., 0., 100., 50.));
    paging.set_items(&mut tree, Some(ObservableList::from(items)));
    (tree, paging)
}

#[cfg(test)]
fn bound_item(tree: &ViewTree, view: Option<ViewId>) -> Option<&'static str> {
    view.and_then(|view| tree.get(view))
        .and_then(|node| node.binding_context::<&'static str>())
        .cloned()
}

/// Runs every pending transition to completion.
#[cfg(test)]
fn settle(tree: &mut ViewTree) {
    let now = tree.animator().now();
    tree.tick(now);
    tree.tick(now + Duration::from_secs(1));
}

#[test]
fn test_paging_initial_page() {
    let (tree, paging) = paging_fixture(vec!["a", "b", "c"]);
    let current = paging.current_view(&tree);
    assert_eq!(bound_item(&tree, current), Some("a"));
    assert_eq!(paging.visible_page_index(&tree), Some(0));
    assert_eq!(paging.incoming_view(&tree), None);

    let current = current.unwrap();
    assert_eq!(tree.parent(current), Some(paging.id()));
    assert_eq!(
        tree.bounds(current),
        Some(Rect::from_xywh(0., 0., 100., 50.)),
        "pages fill the container"
    );
    assert!(tree.get(paging.id()).unwrap().clip_to_bounds);
}

#[test]
fn test_paging_transition_completes() {
    let (mut tree, paging) = paging_fixture(vec!["a", "b", "c"]);
    let old = paging.current_view(&tree).unwrap();

    paging.animate_to_page(&mut tree, 1);
    assert_eq!(paging.selected_index(&tree), Some(1), "selection is committed immediately");
    assert_eq!(paging.visible_page_index(&tree), Some(1));
    let incoming = paging.incoming_view(&tree).expect("should be transitioning");
    assert_eq!(bound_item(&tree, Some(incoming)), Some("b"));
    assert_eq!(
        tree.get(incoming).unwrap().translation,
        Vector2::new(100., 0.),
        "the next page enters from the right"
    );

    tree.tick(Duration::from_millis(0));
    tree.tick(Duration::from_millis(125));
    assert!(paging.is_transitioning(&tree));
    let halfway = tree.get(incoming).unwrap().translation.x;
    assert!((halfway - 50.).abs() < 1e-9, "incoming page at {}", halfway);
    assert!((tree.get(old).unwrap().translation.x + 50.).abs() < 1e-9);

    tree.tick(Duration::from_millis(250));
    assert_eq!(paging.current_view(&tree), Some(incoming));
    assert_eq!(bound_item(&tree, paging.current_view(&tree)), Some("b"));
    assert_eq!(paging.incoming_view(&tree), None);
    assert_eq!(paging.visible_page_index(&tree), Some(1));
    assert_eq!(paging.selected_index(&tree), Some(1));
    assert_eq!(tree.parent(old), None, "the old page should be detached");
    assert!(!tree.contains(old), "the old page should be gone");
    assert_eq!(tree.get(incoming).unwrap().translation, Vector2::zero());

    paging.animate_to_page(&mut tree, 0);
    let incoming = paging.incoming_view(&tree).unwrap();
    assert_eq!(
        tree.get(incoming).unwrap().translation,
        Vector2::new(-100., 0.),
        "the previous page enters from the left"
    );
}

#[test]
fn test_paging_coalesces_requests() {
    let (mut tree, paging) = paging_fixture(vec!["a", "b", "c"]);

    paging.animate_to_page(&mut tree, 1);
    let incoming = paging.incoming_view(&tree);
    paging.animate_to_page(&mut tree, 2);

    assert_eq!(paging.incoming_view(&tree), incoming, "the second request is dropped");
    match paging.state(&tree) {
        Some(PagingState::Transitioning { target, .. }) => assert_eq!(*target, 1),
        state => panic!("unexpected state {:?}", state),
    }
    assert_eq!(paging.selected_index(&tree), Some(1));
    assert_eq!(tree.len(), 3, "one container and two pages");

    settle(&mut tree);
    assert_eq!(paging.visible_page_index(&tree), Some(1));
    assert_eq!(bound_item(&tree, paging.current_view(&tree)), Some("b"));

    paging.animate_to_page(&mut tree, 1);
    assert!(!paging.is_transitioning(&tree), "the page is already visible");
    paging.animate_to_page(&mut tree, 7);
    assert!(!paging.is_transitioning(&tree), "there is no such page");
}

#[test]
fn test_paging_swipe_boundaries() {
    let (mut tree, paging) = paging_fixture(vec!["a", "b"]);
    let id = paging.id();

    assert!(tree.dispatch_gesture(id, Gesture::SwipeRight));
    assert!(!paging.is_transitioning(&tree), "already at the first page");

    tree.dispatch_gesture(id, Gesture::SwipeLeft);
    assert!(paging.is_transitioning(&tree));
    settle(&mut tree);
    assert!(!paging.is_transitioning(&tree));
    assert_eq!(paging.selected_index(&tree), Some(1));

    tree.dispatch_gesture(id, Gesture::SwipeLeft);
    assert!(!paging.is_transitioning(&tree), "already at the last page");

    tree.dispatch_gesture(id, Gesture::SwipeRight);
    assert!(paging.is_transitioning(&tree));
    assert_eq!(paging.selected_index(&tree), Some(0));
}

#[test]
fn test_paging_reconciles_removed_items() {
    let (mut tree, paging) = paging_fixture(vec!["a", "b", "c", "d", "e"]);
    paging.set_selected_index(&mut tree, 4);
    settle(&mut tree);
    assert_eq!(bound_item(&tree, paging.current_view(&tree)), Some("e"));

    let items = paging.items(&tree).unwrap();
    items.truncate(3);
    tree.poll();

    assert_eq!(paging.selected_index(&tree), Some(2));
    assert_eq!(paging.visible_page_index(&tree), Some(2));
    assert_eq!(bound_item(&tree, paging.current_view(&tree)), Some("c"));
    assert_eq!(tree.len(), 2, "only the rebuilt page should remain");
}

#[test]
fn test_paging_reconciles_replaced_items() {
    let (mut tree, paging) = paging_fixture(vec!["a", "b"]);
    let items = paging.items(&tree).unwrap();
    let old = paging.current_view(&tree);

    items.push("c");
    tree.poll();
    assert_eq!(paging.current_view(&tree), old, "unrelated changes keep the page");

    items.set(0, "z");
    tree.poll();
    assert_ne!(paging.current_view(&tree), old);
    assert_eq!(bound_item(&tree, paging.current_view(&tree)), Some("z"));
    assert_eq!(paging.selected_index(&tree), Some(0));

    items.clear();
    tree.poll();
    assert_eq!(paging.current_view(&tree), None, "no items means no pages");
    assert_eq!(tree.len(), 1);

    items.reset(vec!["x", "y"]);
    tree.poll();
    assert_eq!(bound_item(&tree, paging.current_view(&tree)), Some("x"));

    paging.set_items(&mut tree, None);
    assert_eq!(paging.current_view(&tree), None);
    items.push("w");
    tree.poll();
    assert_eq!(paging.current_view(&tree), None, "the old list is no longer observed");
}

#[test]
fn test_paging_external_selection_writes() {
    let (mut tree, paging) = paging_fixture(vec!["a", "b", "c"]);
    let selected = paging.selected(&tree).unwrap();

    selected.set(2);
    assert!(!paging.is_transitioning(&tree), "writes are picked up when polling");
    tree.poll();
    assert!(paging.is_transitioning(&tree));
    assert_eq!(bound_item(&tree, paging.incoming_view(&tree)), Some("c"));
}

#[test]
fn test_paging_draws_incoming_above_current() {
    let red = Color::rgb(1., 0., 0.);
    let blue = Color::rgb(0., 0., 1.);

    let mut tree = ViewTree::new();
    let paging = PagingContainer::new(&mut tree, page_template);
    let host = Arc::new(HeadlessHost::new(10, 10));
    tree.set_root(paging.id(), host.clone()).unwrap();
    tree.layout(paging.id(), Rect::from_xywh(0., 0., 10., 10.));
    paging.set_items(&mut tree, Some(ObservableList::from(vec![red, blue])));

    let bitmap = host.render(&tree);
    assert_eq!(bitmap.pixel(5, 5), [1., 0., 0., 1.]);

    paging.animate_to_page(&mut tree, 1);
    let bitmap = host.render(&tree);
    assert_eq!(
        bitmap.pixel(9, 5),
        [1., 0., 0., 1.],
        "the incoming page starts outside the clip"
    );

    // pile both pages on top of each other
    let current = paging.current_view(&tree).unwrap();
    let incoming = paging.incoming_view(&tree).unwrap();
    tree.set_translation(current, Vector2::zero());
    tree.set_translation(incoming, Vector2::zero());
    let bitmap = host.render(&tree);
    assert_eq!(bitmap.pixel(5, 5), [0., 0., 1., 1.]);
}

#[test]
fn test_paging_removal_takes_pages_along() {
    let (mut tree, paging) = paging_fixture(vec!["a", "b"]);
    paging.animate_to_page(&mut tree, 1);
    assert_eq!(tree.len(), 3);

    tree.remove_view(paging.id());
    assert!(tree.is_empty());
    assert!(!tree.animator().is_animating(), "page animations are cancelled");
    tree.tick(Duration::from_secs(1));
    assert_eq!(paging.current_view(&tree), None);
}

#[test]
fn test_paging_slides_after_idle_gap() {
    let (mut tree, paging) = paging_fixture(vec!["a", "b", "c"]);
    let ms = Duration::from_millis;
    tree.tick(ms(10_000));

    paging.animate_to_page(&mut tree, 1);
    let incoming = paging.incoming_view(&tree).unwrap();
    tree.tick(ms(10_016));
    assert!(
        paging.is_transitioning(&tree),
        "a slide must not finish on its first frame"
    );
    assert_eq!(tree.get(incoming).unwrap().translation, Vector2::new(100., 0.));

    tree.tick(ms(10_141));
    let halfway = tree.get(incoming).unwrap().translation.x;
    assert!((halfway - 50.).abs() < 1e-9, "incoming page at {}", halfway);

    tree.tick(ms(10_266));
    assert!(!paging.is_transitioning(&tree));
    assert_eq!(paging.current_view(&tree), Some(incoming));
}

#[test]
fn test_paging_reconciles_during_transition() {
    let (mut tree, paging) = paging_fixture(vec!["a", "b", "c"]);
    let items = paging.items(&tree).unwrap();
    paging.animate_to_page(&mut tree, 1);
    let incoming = paging.incoming_view(&tree);

    items.set(1, "q");
    tree.poll();
    assert!(!paging.is_transitioning(&tree), "the slide is torn down");
    let current = paging.current_view(&tree);
    assert_ne!(current, incoming);
    assert_eq!(bound_item(&tree, current), Some("q"));
    assert_eq!(paging.selected_index(&tree), Some(1));
    assert_eq!(paging.visible_page_index(&tree), Some(1));
    assert_eq!(tree.len(), 2);
    assert!(!tree.animator().is_animating());

    // the torn-down transition must never complete
    settle(&mut tree);
    assert_eq!(paging.current_view(&tree), current);
    assert_eq!(bound_item(&tree, current), Some("q"));
    assert_eq!(tree.len(), 2);
}

#[test]
fn test_paging_keeps_page_when_selection_equals_count() {
    let (mut tree, paging) = paging_fixture(vec!["a", "b", "c"]);
    paging.set_selected_index(&mut tree, 2);
    settle(&mut tree);
    let current = paging.current_view(&tree);
    assert_eq!(bound_item(&tree, current), Some("c"));

    let items = paging.items(&tree).unwrap();
    items.remove(2);
    tree.poll();
    assert_eq!(paging.current_view(&tree), current, "the removed item stays on screen");
    assert_eq!(bound_item(&tree, current), Some("c"));
    assert_eq!(paging.selected_index(&tree), Some(2));
    assert_eq!(paging.visible_page_index(&tree), Some(2));

    items.push("d");
    tree.poll();
    assert_ne!(paging.current_view(&tree), current);
    assert_eq!(bound_item(&tree, paging.current_view(&tree)), Some("d"));
}

#[test]
fn test_paging_failed_realize_keeps_selection() {
    let mut tree = ViewTree::new();
    let id = tree.insert(ViewNode::new());
    let mut paging = PagingView::new(ViewNode::new, PagingOptions::default());
    paging.set_items(&mut tree, id, Some(ObservableList::from(vec!["a", "b"])));
    let current = paging.current_page().cloned();
    assert_eq!(current.as_ref().map(|page| page.item), Some("a"));

    // pages can no longer be attached to the container
    tree.remove_view(id);
    paging.animate_to_page(&mut tree, id, 1);

    assert!(!paging.is_transitioning());
    assert_eq!(paging.current_page().cloned(), current);
    assert_eq!(paging.visible_page_index, Some(0));
    assert_eq!(paging.selected_index.get(), 0);
    assert_eq!(tree.len(), 1, "the unattached page is removed");
}

#[test]
fn test_paging_container_from_id() {
    let (mut tree, paging) = paging_fixture(vec!["a"]);
    let found = PagingContainer::<&'static str>::from_id(&tree, paging.id());
    assert_eq!(found.map(|handle| handle.id()), Some(paging.id()));
    assert_eq!(
        found.and_then(|handle| handle.selected_index(&tree)),
        Some(0)
    );
    assert!(PagingContainer::<u32>::from_id(&tree, paging.id()).is_none());

    let plain = tree.insert(ViewNode::new());
    assert!(PagingContainer::<&'static str>::from_id(&tree, plain).is_none());
}
