//! Observable side: the subscriber list and its reentrancy protocol.

use super::handle::{AsObserver, Detach, ObserverId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

struct Entry<O: ?Sized> {
    id: ObserverId,
    observer: Weak<O>,
}

pub(crate) struct ObserverList<O: ?Sized + AsObserver> {
    /// `None` marks a subscriber removed while a notification pass was running.
    entries: RefCell<Vec<Option<Entry<O>>>>,
    /// Subscribers added while a notification pass was running.
    to_add: RefCell<Vec<Entry<O>>>,
    invocation_count: Cell<usize>,
    blocked: Cell<usize>,
}

impl<O: ?Sized + AsObserver> ObserverList<O> {
    fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            to_add: RefCell::new(Vec::new()),
            invocation_count: Cell::new(0),
            blocked: Cell::new(0),
        }
    }

    fn contains(&self, id: ObserverId) -> bool {
        self.entries.borrow().iter().flatten().any(|e| e.id == id)
            || self.to_add.borrow().iter().any(|e| e.id == id)
    }

    fn insert(&self, entry: Entry<O>) {
        if self.invocation_count.get() > 0 {
            self.to_add.borrow_mut().push(entry);
        } else {
            self.entries.borrow_mut().push(Some(entry));
        }
    }

    fn remove(&self, id: ObserverId) -> bool {
        {
            let mut to_add = self.to_add.borrow_mut();
            if let Some(pos) = to_add.iter().position(|e| e.id == id) {
                to_add.remove(pos);
                return true;
            }
        }

        let mut entries = self.entries.borrow_mut();
        let Some(pos) = entries
            .iter()
            .position(|e| e.as_ref().is_some_and(|e| e.id == id))
        else {
            return false;
        };

        if self.invocation_count.get() > 0 {
            entries[pos] = None;
        } else {
            entries.remove(pos);
        }
        true
    }

    fn flush(&self) {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|e| e.as_ref().is_some_and(|e| e.observer.strong_count() > 0));
        entries.extend(self.to_add.borrow_mut().drain(..).map(Some));
    }

    fn live_count(&self) -> usize {
        let live = self
            .entries
            .borrow()
            .iter()
            .flatten()
            .filter(|e| e.observer.strong_count() > 0)
            .count();
        live + self.to_add.borrow().len()
    }
}

impl<O: ?Sized + AsObserver> Detach for ObserverList<O> {
    fn detach(&self, id: ObserverId) {
        self.remove(id);
    }
}

impl<O: ?Sized + AsObserver> Drop for ObserverList<O> {
    fn drop(&mut self) {
        let addr = self as *const Self as *const ();
        for entry in self.entries.get_mut().drain(..).flatten() {
            if let Some(observer) = entry.observer.upgrade() {
                observer.as_observer().forget(addr);
            }
        }
        for entry in self.to_add.get_mut().drain(..) {
            if let Some(observer) = entry.observer.upgrade() {
                observer.as_observer().forget(addr);
            }
        }
    }
}

/// Keeps the invocation count raised for the lifetime of one notification pass.
struct Invocation<'a, O: ?Sized + AsObserver> {
    list: &'a ObserverList<O>,
}

impl<'a, O: ?Sized + AsObserver> Invocation<'a, O> {
    fn enter(list: &'a ObserverList<O>) -> Self {
        list.invocation_count.set(list.invocation_count.get() + 1);
        Self { list }
    }
}

impl<O: ?Sized + AsObserver> Drop for Invocation<'_, O> {
    fn drop(&mut self) {
        let remaining = self.list.invocation_count.get().saturating_sub(1);
        self.list.invocation_count.set(remaining);
        if remaining == 0 {
            self.list.flush();
        }
    }
}

/// A list of subscribers of type `O` (usually `dyn SomeObserverTrait`).
pub struct Observable<O: ?Sized + AsObserver + 'static> {
    list: Rc<ObserverList<O>>,
}

impl<O: ?Sized + AsObserver + 'static> Observable<O> {
    pub fn new() -> Self {
        Self {
            list: Rc::new(ObserverList::new()),
        }
    }

    /// Register `observer`. Returns `false` if it is already registered.
    pub fn add_observer(&self, observer: Rc<O>) -> bool {
        let handle = observer.as_observer();
        let id = handle.id();
        if self.list.contains(id) {
            return false;
        }

        self.list.insert(Entry {
            id,
            observer: Rc::downgrade(&observer),
        });
        let back_reference: Weak<dyn Detach> = Rc::downgrade(&self.list) as Weak<dyn Detach>;
        handle.attach(back_reference);
        true
    }

    /// Deregister `observer`. Returns `false` if it was not registered.
    pub fn remove_observer(&self, observer: &O) -> bool {
        let handle = observer.as_observer();
        if !self.list.remove(handle.id()) {
            return false;
        }
        handle.forget(Rc::as_ptr(&self.list) as *const ());
        true
    }

    /// Call `callback` once per live subscriber, in insertion order.
    ///
    /// Does nothing while notifications are blocked. Subscribers removed by an
    /// earlier callback of the same pass are skipped; subscribers added during
    /// the pass are not visited.
    pub fn for_each_observer<F>(&self, mut callback: F)
    where
        F: FnMut(&O),
    {
        if self.list.blocked.get() > 0 {
            return;
        }

        let _invocation = Invocation::enter(&self.list);
        let len = self.list.entries.borrow().len();
        for index in 0..len {
            let observer = self
                .list
                .entries
                .borrow()
                .get(index)
                .and_then(|e| e.as_ref())
                .and_then(|e| e.observer.upgrade());
            if let Some(observer) = observer {
                callback(&*observer);
            }
        }
    }

    pub fn observer_count(&self) -> usize {
        self.list.live_count()
    }

    pub fn is_blocked(&self) -> bool {
        self.list.blocked.get() > 0
    }

    /// True while a `for_each_observer` pass is running.
    pub fn is_notifying(&self) -> bool {
        self.list.invocation_count.get() > 0
    }

    pub fn start_blocking_notifications(&self) {
        self.list.blocked.set(self.list.blocked.get().saturating_add(1));
    }

    pub fn stop_blocking_notifications(&self) {
        self.list.blocked.set(self.list.blocked.get().saturating_sub(1));
    }

    /// Block notifications until the returned guard is dropped.
    pub fn block_notifications(&self) -> NotificationBlocker<'_, O> {
        self.start_blocking_notifications();
        NotificationBlocker { observable: self }
    }
}

impl<O: ?Sized + AsObserver + 'static> Default for Observable<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: ?Sized + AsObserver + 'static> fmt::Debug for Observable<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("observers", &self.observer_count())
            .field("blocked", &self.list.blocked.get())
            .finish()
    }
}

/// Scoped notification block. Releases exactly once when dropped.
#[must_use = "notifications are unblocked as soon as the blocker is dropped"]
pub struct NotificationBlocker<'a, O: ?Sized + AsObserver + 'static> {
    observable: &'a Observable<O>,
}

impl<O: ?Sized + AsObserver + 'static> Drop for NotificationBlocker<'_, O> {
    fn drop(&mut self) {
        self.observable.stop_blocking_notifications();
    }
}
