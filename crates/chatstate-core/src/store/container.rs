//! View bindings over the store.
//!
//! A container ties one consumer to a `map_state_to_props` selector. The
//! store refreshes every live container at the start of each notification
//! pass and calls the container's `force_update` only when the mapped props
//! changed.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

pub type MapStateToProps<S, O, P> = Box<dyn Fn(&S, &O) -> anyhow::Result<P>>;
pub type ActivationFn<S, O> = Box<dyn Fn(&S, &O) -> bool>;

pub(crate) trait ContainerEntry<S> {
    /// Re-map props against `state`. Returns whether the consumer was told to
    /// re-render.
    fn update(&self, state: &S) -> anyhow::Result<bool>;
}

struct ContainerState<S, O, P> {
    map_state_to_props: MapStateToProps<S, O, P>,
    activation_fn: Option<ActivationFn<S, O>>,
    own_props: RefCell<O>,
    mapped_props: RefCell<Option<P>>,
    force_update: Box<dyn Fn()>,
    update_count: Cell<u64>,
}

impl<S, O, P: PartialEq> ContainerEntry<S> for ContainerState<S, O, P> {
    fn update(&self, state: &S) -> anyhow::Result<bool> {
        let own_props = self.own_props.borrow();
        if let Some(activation_fn) = &self.activation_fn {
            if !activation_fn(state, &own_props) {
                return Ok(false);
            }
        }

        let new_props = (self.map_state_to_props)(state, &own_props)?;
        drop(own_props);

        if self.mapped_props.borrow().as_ref() == Some(&new_props) {
            return Ok(false);
        }

        *self.mapped_props.borrow_mut() = Some(new_props);
        self.update_count.set(self.update_count.get() + 1);
        (self.force_update)();
        Ok(true)
    }
}

type Entries<S> = RefCell<BTreeMap<ContainerId, Rc<dyn ContainerEntry<S>>>>;

/// Live containers of one store, refreshed in mount order.
pub(crate) struct ContainerRegistry<S> {
    entries: Rc<Entries<S>>,
}

impl<S: 'static> ContainerRegistry<S> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Rc::new(RefCell::new(BTreeMap::new())),
        }
    }

    pub(crate) fn connect<O, P>(
        &self,
        current: Rc<dyn Fn() -> Rc<S>>,
        map_state_to_props: MapStateToProps<S, O, P>,
        activation_fn: Option<ActivationFn<S, O>>,
        own_props: O,
        force_update: Box<dyn Fn()>,
    ) -> ContainerHandle<S, O, P>
    where
        O: PartialEq + 'static,
        P: Clone + PartialEq + 'static,
    {
        let id = ContainerId(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed));
        let state = Rc::new(ContainerState {
            map_state_to_props,
            activation_fn,
            own_props: RefCell::new(own_props),
            mapped_props: RefCell::new(None),
            force_update,
            update_count: Cell::new(0),
        });

        let entry: Rc<dyn ContainerEntry<S>> = state.clone();
        self.entries.borrow_mut().insert(id, entry);

        ContainerHandle {
            id,
            state,
            current,
            registry: Rc::downgrade(&self.entries),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Refresh every container against `state`. A failing selector is reported
    /// and skipped; the remaining containers still update.
    pub(crate) fn update_all(
        &self,
        state: &S,
        report: &dyn Fn(&anyhow::Error),
        slow_threshold: Option<Duration>,
    ) {
        let started_at = Instant::now();
        let snapshot: Vec<(ContainerId, Rc<dyn ContainerEntry<S>>)> = self
            .entries
            .borrow()
            .iter()
            .map(|(id, entry)| (*id, Rc::clone(entry)))
            .collect();

        for (id, entry) in snapshot {
            if let Err(err) = entry.update(state) {
                let err = err.context(format!("container {:?} failed to map props", id));
                report(&err);
            }
        }

        if let Some(threshold) = slow_threshold {
            let elapsed = started_at.elapsed();
            if elapsed > threshold {
                tracing::warn!(
                    "containers: slow update of {} containers: {} ms",
                    self.len(),
                    elapsed.as_millis()
                );
            }
        }
    }
}

/// Owner side of a container. Dropping it unmounts the container.
pub struct ContainerHandle<S, O, P> {
    id: ContainerId,
    state: Rc<ContainerState<S, O, P>>,
    current: Rc<dyn Fn() -> Rc<S>>,
    registry: Weak<Entries<S>>,
}

impl<S, O: PartialEq, P: Clone + PartialEq> ContainerHandle<S, O, P> {
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Props for a render with `own_props`.
    ///
    /// Maps against the current state on first render, and again whenever the
    /// own props changed and the activation function (if any) allows it. A
    /// failing selector keeps the previous props.
    pub fn render(&self, own_props: O) -> anyhow::Result<Option<P>> {
        let state = &self.state;
        let should_map = state.mapped_props.borrow().is_none()
            || (*state.own_props.borrow() != own_props && {
                let current = (self.current)();
                state
                    .activation_fn
                    .as_ref()
                    .map_or(true, |activation_fn| activation_fn(&current, &own_props))
            });

        let mut result = Ok(());
        if should_map {
            let current = (self.current)();
            match (state.map_state_to_props)(&current, &own_props) {
                Ok(props) => *state.mapped_props.borrow_mut() = Some(props),
                Err(err) => result = Err(err),
            }
        }

        *state.own_props.borrow_mut() = own_props;
        result.map(|_| self.props())
    }

    /// Props from the last successful mapping.
    pub fn props(&self) -> Option<P> {
        self.state.mapped_props.borrow().clone()
    }

    /// Number of times the notification pass asked this consumer to re-render.
    pub fn update_count(&self) -> u64 {
        self.state.update_count.get()
    }
}

impl<S, O, P> Drop for ContainerHandle<S, O, P> {
    fn drop(&mut self) {
        if let Some(entries) = self.registry.upgrade() {
            entries.borrow_mut().remove(&self.id);
        }
    }
}
