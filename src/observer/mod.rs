//! Publish/subscribe primitive used by properties, processors and the network.
//!
//! An [`Observable`] keeps weak references to its subscribers; every subscriber
//! embeds an [`Observer`] handle that remembers which observables it is attached
//! to. Dropping either side detaches it from the other, so neither owns the other.
//!
//! # Reentrancy
//!
//! ```text
//! for_each_observer ──► callback ──► remove_observer(self)   (tombstone written)
//!                               └──► add_observer(other)     (buffered in to_add)
//!        │
//!        └── outermost call returns ──► tombstones compacted, buffer appended
//! ```
//!
//! # Design
//!
//! - **Weak subscribers** — an observable never keeps a subscriber alive.
//! - **Tombstones** — removal during iteration writes `None` in place instead of
//!   shifting the list, so indices stay stable for the running pass.
//! - **Deferred adds** — subscribers added during iteration are not notified by
//!   that pass and land at the end of the list once it completes.
//! - **Blocking** — a saturating counter; [`NotificationBlocker`] releases it on drop.

mod handle;
mod list;

pub use handle::{AsObserver, Observer, ObserverId};
pub use list::{NotificationBlocker, Observable};
