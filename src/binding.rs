//! Observable values and collections.
//!
//! These are the bindable sources views read from. Observers are notified synchronously;
//! notifications that need the view tree to react travel through channels that the tree drains in
//! [`ViewTree::poll`](crate::ViewTree::poll).

use crate::events::EventHandler;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies an observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Shared<T> {
    value: RwLock<T>,
    observers: Mutex<Vec<(SubscriptionId, EventHandler<T>)>>,
    next_id: AtomicU64,
    external_writes: (Sender<T>, Receiver<T>),
}

/// A shared value with change observers.
///
/// Writes come in two flavors: [`set`](Observable::set) is an *external* write (e.g. from a view
/// model bound to a view property), which the owning view picks up and reacts to, while
/// [`set_internal`](Observable::set_internal) is the owner committing its own state. Both notify
/// observers, but only external writes are queued for the owner, so a view writing back its own
/// state never triggers itself.
pub struct Observable<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(value: T) -> Observable<T> {
        Observable {
            shared: Arc::new(Shared {
                value: RwLock::new(value),
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                external_writes: channel::unbounded(),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.shared.value.read().clone()
    }

    /// Writes a new value from outside the owner.
    pub fn set(&self, value: T) {
        self.store(value.clone());
        // the receiver lives in `shared`, so this can’t be disconnected
        let _ = self.shared.external_writes.0.send(value);
    }

    /// Commits a value from the owner.
    pub fn set_internal(&self, value: T) {
        self.store(value);
    }

    fn store(&self, value: T) {
        *self.shared.value.write() = value.clone();

        // clone the list so observers may subscribe or unsubscribe while being notified
        let observers: Vec<_> = self
            .shared
            .observers
            .lock()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for observer in observers {
            observer.call(&value);
        }
    }

    /// Registers an observer that is called with every new value.
    pub fn subscribe<F: 'static + FnMut(&T) + Send>(&self, observer: F) -> SubscriptionId {
        let id = SubscriptionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared
            .observers
            .lock()
            .push((id, EventHandler::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.shared.observers.lock().retain(|(i, _)| *i != id);
    }

    /// Drains queued external writes and returns the most recent one.
    pub(crate) fn take_external_write(&self) -> Option<T> {
        self.shared.external_writes.1.try_iter().last()
    }
}

impl<T: Clone + Send + std::fmt::Debug + 'static> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Observable({:?})", self.get())
    }
}

/// A change to an [`ObservableList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionChange {
    /// `count` items were inserted at `index`.
    Insert { index: usize, count: usize },
    /// `count` items were removed from `index`.
    Remove { index: usize, count: usize },
    /// The item at `index` was replaced.
    Replace { index: usize },
    /// Anything could have changed.
    Reset,
}

struct ListShared<T> {
    items: RwLock<Vec<T>>,
    listeners: Mutex<Vec<Sender<CollectionChange>>>,
}

/// A shared, change-notifying list of items.
///
/// Clones refer to the same list.
pub struct ObservableList<T> {
    shared: Arc<ListShared<T>>,
}

impl<T> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        ObservableList {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> PartialEq for ObservableList<T> {
    /// Identity comparison.
    fn eq(&self, other: &ObservableList<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_list().entries(self.shared.items.read().iter()).finish()
    }
}

impl<T: Clone> ObservableList<T> {
    pub fn new() -> ObservableList<T> {
        ObservableList::from(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.shared.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.shared.items.read().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.shared.items.read().clone()
    }

    pub fn push(&self, item: T) {
        let index = {
            let mut items = self.shared.items.write();
            items.push(item);
            items.len() - 1
        };
        self.notify(CollectionChange::Insert { index, count: 1 });
    }

    /// # Panics
    /// - if `index > len`
    pub fn insert(&self, index: usize, item: T) {
        self.shared.items.write().insert(index, item);
        self.notify(CollectionChange::Insert { index, count: 1 });
    }

    /// Removes and returns the item at `index`, if it exists.
    pub fn remove(&self, index: usize) -> Option<T> {
        let removed = {
            let mut items = self.shared.items.write();
            if index < items.len() {
                Some(items.remove(index))
            } else {
                None
            }
        };
        if removed.is_some() {
            self.notify(CollectionChange::Remove { index, count: 1 });
        }
        removed
    }

    /// Replaces the item at `index`; returns false if there is no such item.
    pub fn set(&self, index: usize, item: T) -> bool {
        let replaced = match self.shared.items.write().get_mut(index) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        };
        if replaced {
            self.notify(CollectionChange::Replace { index });
        }
        replaced
    }

    /// Shortens the list to `len` items.
    pub fn truncate(&self, len: usize) {
        let count = {
            let mut items = self.shared.items.write();
            let count = items.len().saturating_sub(len);
            items.truncate(len);
            count
        };
        if count > 0 {
            self.notify(CollectionChange::Remove { index: len, count });
        }
    }

    pub fn clear(&self) {
        self.shared.items.write().clear();
        self.notify(CollectionChange::Reset);
    }

    /// Replaces all items.
    pub fn reset(&self, items: Vec<T>) {
        *self.shared.items.write() = items;
        self.notify(CollectionChange::Reset);
    }

    /// Returns a receiver for all future changes. Dropping it unsubscribes.
    pub fn subscribe(&self) -> Receiver<CollectionChange> {
        let (sender, receiver) = channel::unbounded();
        self.shared.listeners.lock().push(sender);
        receiver
    }

    fn notify(&self, change: CollectionChange) {
        // drop listeners whose receivers are gone
        self.shared
            .listeners
            .lock()
            .retain(|sender| sender.send(change).is_ok());
    }
}

impl<T: Clone> Default for ObservableList<T> {
    fn default() -> Self {
        ObservableList::new()
    }
}

impl<T> From<Vec<T>> for ObservableList<T> {
    fn from(items: Vec<T>) -> Self {
        ObservableList {
            shared: Arc::new(ListShared {
                items: RwLock::new(items),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }
}

#[test]
fn test_observable_write_channels() {
    let value = Observable::new(0usize);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = Arc::clone(&seen);
    let sub = value.subscribe(move |v| seen2.lock().push(*v));

    value.set_internal(1);
    assert_eq!(value.take_external_write(), None, "internal writes are not queued");

    value.set(2);
    value.set(3);
    assert_eq!(value.get(), 3);
    assert_eq!(
        value.take_external_write(),
        Some(3),
        "only the latest external write matters"
    );
    assert_eq!(value.take_external_write(), None);

    value.unsubscribe(sub);
    value.set_internal(4);
    assert_eq!(*seen.lock(), vec![1, 2, 3], "observers see every write until unsubscribed");
}

#[test]
fn test_list_notifications() {
    let list = ObservableList::from(vec!['a', 'b', 'c', 'd']);
    let changes = list.subscribe();

    list.push('e');
    list.truncate(3);
    list.remove(10);
    list.set(0, 'z');
    list.clear();

    let received: Vec<_> = changes.try_iter().collect();
    assert_eq!(
        received,
        vec![
            CollectionChange::Insert { index: 4, count: 1 },
            CollectionChange::Remove { index: 3, count: 2 },
            CollectionChange::Replace { index: 0 },
            CollectionChange::Reset,
        ]
    );

    drop(changes);
    list.push('x');
    assert_eq!(
        list.shared.listeners.lock().len(),
        0,
        "dropped receivers should be pruned"
    );
    assert_eq!(list.to_vec(), vec!['x']);
}
