//! Subscriber-side handle.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Weak;

thread_local! {
    static NEXT_OBSERVER_ID: Cell<u64> = const { Cell::new(1) };
}

/// Identity of an [`Observer`], unique within the thread that created it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ObserverId(u64);

impl ObserverId {
    fn next() -> Self {
        NEXT_OBSERVER_ID.with(|next| {
            let id = next.get();
            next.set(id + 1);
            ObserverId(id)
        })
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Implemented by observer lists so an observer can remove itself without
/// knowing the concrete subscriber type of the list.
pub(crate) trait Detach {
    fn detach(&self, id: ObserverId);
}

/// Back-reference bookkeeping embedded in every subscriber.
///
/// Dropping the handle removes the subscriber from every observable it is
/// still attached to.
pub struct Observer {
    id: ObserverId,
    observables: RefCell<Vec<Weak<dyn Detach>>>,
}

impl Observer {
    pub fn new() -> Self {
        Self {
            id: ObserverId::next(),
            observables: RefCell::new(Vec::new()),
        }
    }

    #[inline]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Number of live observables this observer is attached to.
    pub fn observable_count(&self) -> usize {
        self.observables
            .borrow()
            .iter()
            .filter(|observable| observable.strong_count() > 0)
            .count()
    }

    /// Detach from every observable.
    pub fn detach_all(&self) {
        let observables = std::mem::take(&mut *self.observables.borrow_mut());
        for observable in observables {
            if let Some(observable) = observable.upgrade() {
                observable.detach(self.id);
            }
        }
    }

    pub(crate) fn attach(&self, observable: Weak<dyn Detach>) {
        let addr = observable.as_ptr() as *const ();
        let mut observables = self.observables.borrow_mut();
        observables.retain(|existing| existing.strong_count() > 0);
        if !observables
            .iter()
            .any(|existing| existing.as_ptr() as *const () == addr)
        {
            observables.push(observable);
        }
    }

    pub(crate) fn forget(&self, addr: *const ()) {
        self.observables.borrow_mut().retain(|existing| {
            existing.as_ptr() as *const () != addr && existing.strong_count() > 0
        });
    }
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.detach_all();
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.id.0)
            .field("observables", &self.observable_count())
            .finish()
    }
}

/// Gives an observable access to the [`Observer`] embedded in a subscriber.
///
/// Every observer trait in the crate has this as a supertrait.
pub trait AsObserver {
    fn as_observer(&self) -> &Observer;
}

impl AsObserver for Observer {
    fn as_observer(&self) -> &Observer {
        self
    }
}
