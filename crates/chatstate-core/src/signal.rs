//! Minimal single-value reactive primitive.
//!
//! A [`Signal`] holds a value and a list of subscribed [`Effect`]s that run
//! synchronously whenever the value changes. Setting a value equal to the
//! current one is a no-op.
//!
//! # Effect identity
//!
//! An effect is identified by the [`EffectId`] assigned in [`Effect::new`];
//! clones of an `Effect` share that id. Subscribing, re-subscribing and
//! [`cleanup_effect`] all key on it, so the same `Effect` value (or a clone of
//! it) must be used for all three. Wrapping the same closure in two
//! `Effect::new` calls yields two unrelated effects.
//!
//! Every subscription made with an effect is recorded in a per-thread registry,
//! so [`cleanup_effect`] can detach the effect from every signal it touched in
//! O(number of its subscriptions).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::callbacks::{CallbackManager, Unsubscribe};

static NEXT_EFFECT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_EFFECT: RefCell<Option<Effect>> = const { RefCell::new(None) };
    static EFFECT_SUBSCRIPTIONS: RefCell<HashMap<EffectId, Vec<Unsubscribe>>> =
        RefCell::new(HashMap::new());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(u64);

/// A side-effecting function with a stable identity.
#[derive(Clone)]
pub struct Effect {
    id: EffectId,
    run: Rc<dyn Fn()>,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect").field("id", &self.id).finish()
    }
}

impl Effect {
    pub fn new(run: impl Fn() + 'static) -> Self {
        Self {
            id: EffectId(NEXT_EFFECT_ID.fetch_add(1, Ordering::Relaxed)),
            run: Rc::new(run),
        }
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Run the effect as the current effect: every [`Signal::get`] made during
    /// the run subscribes this effect to that signal.
    pub fn run(&self) {
        let _guard = CurrentEffectGuard::install(self.clone());
        (self.run)();
    }

    fn run_untracked(&self) {
        (self.run)();
    }
}

struct CurrentEffectGuard {
    previous: Option<Effect>,
}

impl CurrentEffectGuard {
    fn install(effect: Effect) -> Self {
        let previous = CURRENT_EFFECT.with(|current| current.replace(Some(effect)));
        Self { previous }
    }
}

impl Drop for CurrentEffectGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_EFFECT.with(|current| *current.borrow_mut() = previous);
    }
}

fn current_effect() -> Option<Effect> {
    CURRENT_EFFECT.with(|current| current.borrow().clone())
}

fn register_subscription(effect_id: EffectId, unsubscribe: Unsubscribe) {
    EFFECT_SUBSCRIPTIONS.with(|registry| {
        registry
            .borrow_mut()
            .entry(effect_id)
            .or_default()
            .push(unsubscribe);
    });
}

fn forget_subscription(effect_id: EffectId, unsubscribe: &Unsubscribe) {
    EFFECT_SUBSCRIPTIONS.with(|registry| {
        let mut registry = registry.borrow_mut();
        if let Some(list) = registry.get_mut(&effect_id) {
            list.retain(|entry| entry.id() != unsubscribe.id());
            if list.is_empty() {
                registry.remove(&effect_id);
            }
        }
    });
}

/// Detach `effect` from every signal it is subscribed to.
pub fn cleanup_effect(effect: &Effect) {
    let subscriptions = EFFECT_SUBSCRIPTIONS
        .with(|registry| registry.borrow_mut().remove(&effect.id()))
        .unwrap_or_default();

    for unsubscribe in subscriptions {
        unsubscribe.unsubscribe();
    }
}

/// Number of live subscriptions recorded for `effect`.
pub fn effect_subscription_count(effect: &Effect) -> usize {
    EFFECT_SUBSCRIPTIONS.with(|registry| {
        registry
            .borrow()
            .get(&effect.id())
            .map_or(0, |list| list.len())
    })
}

struct SignalInner<T> {
    value: RefCell<T>,
    effects: CallbackManager<()>,
    subscribed: RefCell<HashMap<EffectId, Unsubscribe>>,
}

/// Read side of a signal.
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

/// Write side of a signal.
pub struct SignalSetter<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Clone for SignalSetter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("value", &*self.inner.value.borrow())
            .field("effects", &self.inner.effects.len())
            .finish()
    }
}

pub fn create_signal<T: Clone + PartialEq + 'static>(initial: T) -> (Signal<T>, SignalSetter<T>) {
    let inner = Rc::new(SignalInner {
        value: RefCell::new(initial),
        effects: CallbackManager::new(),
        subscribed: RefCell::new(HashMap::new()),
    });

    (
        Signal {
            inner: Rc::clone(&inner),
        },
        SignalSetter { inner },
    )
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    /// Current value. Subscribes the running effect, if any.
    pub fn get(&self) -> T {
        if let Some(effect) = current_effect() {
            self.subscribe(&effect);
        }
        self.peek()
    }

    /// Current value without dependency tracking.
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Subscribe `effect`. Subscribing the same effect twice returns the
    /// existing handle.
    pub fn subscribe(&self, effect: &Effect) -> Unsubscribe {
        if let Some(existing) = self.inner.subscribed.borrow().get(&effect.id()) {
            return existing.clone();
        }

        let runner = effect.clone();
        let raw = self.inner.effects.add_callback(move |_| runner.run());

        let effect_id = effect.id();
        let weak: Weak<SignalInner<T>> = Rc::downgrade(&self.inner);
        let raw_for_detach = raw.clone();
        let unsubscribe = Unsubscribe::new(raw.id(), move || {
            raw_for_detach.unsubscribe();
            if let Some(inner) = weak.upgrade() {
                inner.subscribed.borrow_mut().remove(&effect_id);
            }
            forget_subscription(effect_id, &raw_for_detach);
        });

        self.inner
            .subscribed
            .borrow_mut()
            .insert(effect_id, unsubscribe.clone());
        register_subscription(effect_id, unsubscribe.clone());
        unsubscribe
    }

    /// Subscribe `effect` for a single notification.
    pub fn once(&self, effect: &Effect) -> Unsubscribe {
        let slot: Rc<RefCell<Option<Unsubscribe>>> = Rc::new(RefCell::new(None));

        let runner = effect.clone();
        let slot_for_run = Rc::clone(&slot);
        let raw = self.inner.effects.add_callback(move |_| {
            let taken = slot_for_run.borrow_mut().take();
            if let Some(unsubscribe) = taken {
                unsubscribe.unsubscribe();
                runner.run_untracked();
            }
        });

        let effect_id = effect.id();
        let raw_for_detach = raw.clone();
        let unsubscribe = Unsubscribe::new(raw.id(), move || {
            raw_for_detach.unsubscribe();
            forget_subscription(effect_id, &raw_for_detach);
        });

        *slot.borrow_mut() = Some(unsubscribe.clone());
        register_subscription(effect_id, unsubscribe.clone());
        unsubscribe
    }

    pub fn subscribers_count(&self) -> usize {
        self.inner.effects.len()
    }
}

impl<T: Clone + PartialEq + 'static> SignalSetter<T> {
    /// Store `value` and run subscribed effects.
    ///
    /// The no-op check uses `PartialEq`, not identity: a value that compares
    /// equal to the current one is dropped even if it is a separate allocation.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }

        self.inner.effects.run_callbacks(&());
    }

    pub fn signal(&self) -> Signal<T> {
        Signal {
            inner: Rc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting_effect() -> (Effect, Rc<Cell<u32>>) {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = Rc::clone(&runs);
        let effect = Effect::new(move || runs_clone.set(runs_clone.get() + 1));
        (effect, runs)
    }

    #[test]
    fn test_set_equal_value_is_noop() {
        let (signal, set) = create_signal(1);
        let (effect, runs) = counting_effect();
        signal.subscribe(&effect);

        set.set(2);
        set.set(2);
        assert_eq!(runs.get(), 1);
        assert_eq!(signal.peek(), 2);
    }

    #[test]
    fn test_rc_values_compare_cheaply() {
        let shared = Rc::new(vec![1, 2, 3]);
        let (signal, set) = create_signal(Rc::clone(&shared));
        let (effect, runs) = counting_effect();
        signal.subscribe(&effect);

        set.set(Rc::clone(&shared));
        assert_eq!(runs.get(), 0);

        set.set(Rc::new(vec![4]));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_equal_contents_in_new_allocation_is_noop() {
        let first = Rc::new(vec![1, 2, 3]);
        let (signal, set) = create_signal(Rc::clone(&first));
        let (effect, runs) = counting_effect();
        signal.subscribe(&effect);

        set.set(Rc::new(vec![1, 2, 3]));
        assert_eq!(runs.get(), 0);
        assert!(Rc::ptr_eq(&signal.peek(), &first));
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let (signal, set) = create_signal(false);
        let (effect, runs) = counting_effect();
        signal.once(&effect);

        set.set(true);
        set.set(false);
        assert_eq!(runs.get(), 1);
        assert_eq!(signal.subscribers_count(), 0);
        assert_eq!(effect_subscription_count(&effect), 0);
    }

    #[test]
    fn test_duplicate_subscribe_is_deduplicated() {
        let (signal, set) = create_signal(0);
        let (effect, runs) = counting_effect();

        signal.subscribe(&effect);
        signal.subscribe(&effect.clone());
        set.set(1);

        assert_eq!(runs.get(), 1);
        assert_eq!(signal.subscribers_count(), 1);
    }

    #[test]
    fn test_cleanup_effect_detaches_from_all_signals() {
        let (first, set_first) = create_signal(0);
        let (second, set_second) = create_signal("a".to_string());
        let (effect, runs) = counting_effect();

        first.subscribe(&effect);
        second.subscribe(&effect);
        assert_eq!(effect_subscription_count(&effect), 2);

        cleanup_effect(&effect);
        set_first.set(5);
        set_second.set("b".to_string());

        assert_eq!(runs.get(), 0);
        assert_eq!(first.subscribers_count(), 0);
        assert_eq!(second.subscribers_count(), 0);
        assert_eq!(effect_subscription_count(&effect), 0);
    }

    #[test]
    fn test_direct_unsubscribe_prunes_registry() {
        let (signal, _set) = create_signal(0);
        let (effect, _runs) = counting_effect();

        let unsubscribe = signal.subscribe(&effect);
        unsubscribe.unsubscribe();

        assert_eq!(effect_subscription_count(&effect), 0);
        // Re-subscribing after removal registers a fresh subscription.
        signal.subscribe(&effect);
        assert_eq!(signal.subscribers_count(), 1);
    }

    #[test]
    fn test_get_inside_effect_tracks_dependency() {
        let (source, set_source) = create_signal(1);
        let (doubled, set_doubled) = create_signal(2);

        let source_clone = source.clone();
        let effect = Effect::new(move || set_doubled.set(source_clone.get() * 2));
        effect.run();
        assert_eq!(source.subscribers_count(), 1);

        set_source.set(10);
        assert_eq!(doubled.peek(), 20);

        cleanup_effect(&effect);
        set_source.set(11);
        assert_eq!(doubled.peek(), 20);
    }

    #[test]
    fn test_effect_may_read_signal_it_is_notified_by() {
        let (signal, set) = create_signal(0);
        let seen = Rc::new(Cell::new(0));

        let signal_clone = signal.clone();
        let seen_clone = Rc::clone(&seen);
        let effect = Effect::new(move || seen_clone.set(signal_clone.peek()));
        signal.subscribe(&effect);

        set.set(42);
        assert_eq!(seen.get(), 42);
    }
}
