//! Shares one signal per selector among all of its consumers.
//!
//! Every [`Selector`] gets a unique id at construction. The bridge keeps one
//! entry per id that is in use, re-runs each entry's selector once per
//! notification pass and pushes the result into the entry's signal. The entry
//! is dropped with its last [`SelectorSignal`].

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{Action, Store};
use crate::callbacks::Unsubscribe;
use crate::signal::{create_signal, Signal, SignalSetter};

static NEXT_SELECTOR_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectorId(u64);

/// A state projection with a stable identity. Clones share the identity.
pub struct Selector<S, T> {
    id: SelectorId,
    select: Rc<dyn Fn(&S) -> T>,
}

impl<S, T> Clone for Selector<S, T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            select: Rc::clone(&self.select),
        }
    }
}

impl<S, T> Selector<S, T> {
    pub fn new(select: impl Fn(&S) -> T + 'static) -> Self {
        Self {
            id: SelectorId(NEXT_SELECTOR_ID.fetch_add(1, Ordering::Relaxed)),
            select: Rc::new(select),
        }
    }

    pub fn id(&self) -> SelectorId {
        self.id
    }

    pub fn select(&self, state: &S) -> T {
        (self.select)(state)
    }
}

struct BridgeEntry<S> {
    clients_count: usize,
    signal: Rc<dyn Any>,
    update: Rc<dyn Fn(&S)>,
}

struct BridgeInner<S> {
    current: Box<dyn Fn() -> Rc<S>>,
    entries: RefCell<HashMap<SelectorId, BridgeEntry<S>>>,
    subscription: RefCell<Option<Unsubscribe>>,
}

impl<S> BridgeInner<S> {
    fn update_all(&self, state: &S) {
        let updates: Vec<Rc<dyn Fn(&S)>> = self
            .entries
            .borrow()
            .values()
            .map(|entry| Rc::clone(&entry.update))
            .collect();

        for update in updates {
            update(state);
        }
    }

    fn release(&self, id: SelectorId) {
        let mut entries = self.entries.borrow_mut();
        if let Some(entry) = entries.get_mut(&id) {
            entry.clients_count = entry.clients_count.saturating_sub(1);
            if entry.clients_count == 0 {
                entries.remove(&id);
            }
        }
    }
}

impl<S> Drop for BridgeInner<S> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription.unsubscribe();
        }
    }
}

pub struct SelectorBridge<S> {
    inner: Rc<BridgeInner<S>>,
}

impl<S> Clone for SelectorBridge<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: 'static> SelectorBridge<S> {
    /// Create a bridge fed by `store`'s notification pass.
    pub fn attach<A: Action>(store: &Store<S, A>) -> Self {
        let for_current = store.clone();
        let inner = Rc::new(BridgeInner {
            current: Box::new(move || for_current.state()),
            entries: RefCell::new(HashMap::new()),
            subscription: RefCell::new(None),
        });

        let weak: Weak<BridgeInner<S>> = Rc::downgrade(&inner);
        let subscription = store.add_callback(move |state| {
            if let Some(inner) = weak.upgrade() {
                inner.update_all(state);
            }
        });
        *inner.subscription.borrow_mut() = Some(subscription);

        Self { inner }
    }

    /// Signal tracking `selector`'s value. The first consumer seeds it from the
    /// current state; later consumers share it.
    pub fn use_selector_signal<T>(&self, selector: &Selector<S, T>) -> SelectorSignal<S, T>
    where
        T: Clone + PartialEq + 'static,
    {
        let id = selector.id();
        {
            let mut entries = self.inner.entries.borrow_mut();
            if let Some(entry) = entries.get_mut(&id) {
                if let Some(signal) = entry.signal.downcast_ref::<Signal<T>>() {
                    entry.clients_count += 1;
                    return SelectorSignal {
                        id,
                        signal: signal.clone(),
                        bridge: Rc::downgrade(&self.inner),
                    };
                }
            }
        }

        let initial = selector.select(&(self.inner.current)());
        let (signal, setter): (Signal<T>, SignalSetter<T>) = create_signal(initial);
        let select = Rc::clone(&selector.select);
        let update: Rc<dyn Fn(&S)> = Rc::new(move |state: &S| setter.set(select(state)));

        self.inner.entries.borrow_mut().insert(
            id,
            BridgeEntry {
                clients_count: 1,
                signal: Rc::new(signal.clone()),
                update,
            },
        );

        SelectorSignal {
            id,
            signal,
            bridge: Rc::downgrade(&self.inner),
        }
    }

    /// Number of selectors with at least one consumer.
    pub fn active_selectors(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    pub fn clients_count(&self, id: SelectorId) -> usize {
        self.inner
            .entries
            .borrow()
            .get(&id)
            .map_or(0, |entry| entry.clients_count)
    }
}

/// One consumer's hold on a shared selector signal.
pub struct SelectorSignal<S, T> {
    id: SelectorId,
    signal: Signal<T>,
    bridge: Weak<BridgeInner<S>>,
}

impl<S, T> SelectorSignal<S, T> {
    pub fn signal(&self) -> &Signal<T> {
        &self.signal
    }
}

impl<S, T: Clone + PartialEq + 'static> SelectorSignal<S, T> {
    pub fn get(&self) -> T {
        self.signal.get()
    }
}

impl<S, T> Drop for SelectorSignal<S, T> {
    fn drop(&mut self) {
        if let Some(bridge) = self.bridge.upgrade() {
            bridge.release(self.id);
        }
    }
}
