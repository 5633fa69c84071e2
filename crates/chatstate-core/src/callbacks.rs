//! Ordered callback lists with handle-based removal.
//!
//! Closures have no usable identity in Rust, so every registration is given a
//! process-unique [`CallbackId`]. The [`Unsubscribe`] handle returned by
//! [`CallbackManager::add_callback`] is the only thing needed to remove it
//! again, from any place and any number of times.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CALLBACK_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

impl CallbackId {
    pub(crate) fn next() -> Self {
        Self(NEXT_CALLBACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

type Callback<T> = Rc<dyn Fn(&T)>;

struct Entries<T: ?Sized> {
    list: RefCell<Vec<(CallbackId, Callback<T>)>>,
}

impl<T: ?Sized> Entries<T> {
    fn remove(&self, id: CallbackId) {
        self.list.borrow_mut().retain(|(entry_id, _)| *entry_id != id);
    }
}

/// Shared, cloneable list of callbacks run in insertion order.
pub struct CallbackManager<T: ?Sized> {
    entries: Rc<Entries<T>>,
}

impl<T: ?Sized> Clone for CallbackManager<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<T: ?Sized + 'static> Default for CallbackManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for CallbackManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackManager")
            .field("len", &self.entries.list.borrow().len())
            .finish()
    }
}

impl<T: ?Sized + 'static> CallbackManager<T> {
    pub fn new() -> Self {
        Self {
            entries: Rc::new(Entries {
                list: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn add_callback(&self, callback: impl Fn(&T) + 'static) -> Unsubscribe {
        let id = CallbackId::next();
        self.entries
            .list
            .borrow_mut()
            .push((id, Rc::new(callback)));

        let entries: Weak<Entries<T>> = Rc::downgrade(&self.entries);
        Unsubscribe::new(id, move || {
            if let Some(entries) = entries.upgrade() {
                entries.remove(id);
            }
        })
    }

    pub fn remove_callback(&self, id: CallbackId) {
        self.entries.remove(id);
    }

    /// Run every registered callback with `value`.
    ///
    /// Iterates over a snapshot, so callbacks may add or remove callbacks
    /// (including themselves). A callback removed mid-run by an earlier one may
    /// still be invoked during this round.
    pub fn run_callbacks(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self
            .entries
            .list
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();

        for callback in snapshot {
            callback(value);
        }
    }

    pub fn has_callbacks(&self) -> bool {
        !self.entries.list.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.list.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_callbacks()
    }

    pub fn clear(&self) {
        self.entries.list.borrow_mut().clear();
    }
}

/// Handle that removes one registration. Idempotent, and a no-op once the
/// owning list is gone.
#[derive(Clone)]
pub struct Unsubscribe {
    id: CallbackId,
    detach: Rc<dyn Fn()>,
}

impl Unsubscribe {
    pub(crate) fn new(id: CallbackId, detach: impl Fn() + 'static) -> Self {
        Self {
            id,
            detach: Rc::new(detach),
        }
    }

    pub fn id(&self) -> CallbackId {
        self.id
    }

    pub fn unsubscribe(&self) {
        (self.detach)();
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe").field("id", &self.id).finish()
    }
}
