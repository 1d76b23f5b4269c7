//! Gestures.

use crate::view::ViewId;
use cgmath::Point2;
use core::fmt;
use parking_lot::Mutex;
use std::sync::Arc;

/// Kinds of gesture recognizers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    Swipe = 0,
    Tap = 1,
}

/// A recognized gesture, delivered to a view as a discrete notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// The finger moved towards the left; i.e. the user wants to see what’s on the right.
    SwipeLeft,
    /// The finger moved towards the right.
    SwipeRight,
    /// A tap at a location in the window coordinate system.
    Tap(Point2<f64>),
}

impl Gesture {
    pub fn kind(&self) -> GestureKind {
        match self {
            Gesture::SwipeLeft | Gesture::SwipeRight => GestureKind::Swipe,
            Gesture::Tap(_) => GestureKind::Tap,
        }
    }
}

pub struct EventHandler<Type>(Arc<Mutex<dyn FnMut(&Type) + Send>>);

impl<T> Clone for EventHandler<T> {
    fn clone(&self) -> Self {
        EventHandler(Arc::clone(&self.0))
    }
}

impl<T> EventHandler<T> {
    pub fn new<F: 'static + FnMut(&T) + Send>(handler: F) -> Self {
        EventHandler(Arc::new(Mutex::new(handler)))
    }

    pub fn call(&self, event: &T) {
        let mut handler = self.0.lock();
        (&mut *handler)(event);
    }
}

impl<T> fmt::Debug for EventHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EventHandler(..)")
    }
}

/// A gesture recognizer attached to a view.
///
/// Recognition itself happens in the host; the recognizer marks the view as interested in a kind
/// of gesture and optionally carries a handler that is called when one is delivered.
#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    kind: GestureKind,
    handler: Option<EventHandler<Gesture>>,
}

impl GestureRecognizer {
    pub fn swipe() -> GestureRecognizer {
        GestureRecognizer {
            kind: GestureKind::Swipe,
            handler: None,
        }
    }

    pub fn tap() -> GestureRecognizer {
        GestureRecognizer {
            kind: GestureKind::Tap,
            handler: None,
        }
    }

    pub fn with_handler<F: 'static + FnMut(&Gesture) + Send>(mut self, handler: F) -> Self {
        self.handler = Some(EventHandler::new(handler));
        self
    }

    pub fn kind(&self) -> GestureKind {
        self.kind
    }

    pub fn accepts(&self, gesture: &Gesture) -> bool {
        gesture.kind() == self.kind
    }

    pub(crate) fn fire(&self, gesture: &Gesture) {
        if let Some(handler) = &self.handler {
            handler.call(gesture);
        }
    }
}

/// A hit-test match: a view and one of its recognizers.
#[derive(Debug, Clone)]
pub struct GestureTarget {
    pub view: ViewId,
    pub recognizer: GestureRecognizer,
}

#[test]
fn test_recognizer_fires_handler() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let count = Arc::new(AtomicUsize::new(0));
    let count2 = Arc::clone(&count);
    let recognizer = GestureRecognizer::swipe().with_handler(move |gesture| {
        assert_eq!(*gesture, Gesture::SwipeLeft);
        count2.fetch_add(1, Ordering::SeqCst);
    });

    assert!(recognizer.accepts(&Gesture::SwipeLeft));
    assert!(!recognizer.accepts(&Gesture::Tap(Point2::new(0., 0.))));
    recognizer.fire(&Gesture::SwipeLeft);
    recognizer.clone().fire(&Gesture::SwipeLeft);
    assert_eq!(
        count.load(Ordering::SeqCst),
        2,
        "clones should share the same handler"
    );
}
