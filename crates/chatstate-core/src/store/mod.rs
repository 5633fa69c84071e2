//! Observable state container.
//!
//! The store owns one immutable state value and replaces it wholesale on every
//! commit. Actions are queued and drained one at a time; commits notify two
//! callback lists: immediate callbacks run synchronously inside the commit,
//! regular callbacks run once per tick in a coalesced notification pass that
//! yields to heavy animations.
//!
//! # Invariants
//!
//! 1. Committing the state that is already current is a no-op.
//! 2. Handlers of one action run in registration order, each seeing the state
//!    committed by the previous one.
//! 3. An action dispatched while another is being processed runs after it,
//!    never interleaved.
//! 4. Notification passes always observe the latest committed state.

mod container;
mod global;
mod selector;

pub use container::{ActivationFn, ContainerHandle, ContainerId, MapStateToProps};
pub use global::{Global, SetOptions, StoreError};
pub use selector::{Selector, SelectorBridge, SelectorId, SelectorSignal};

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{join_all, LocalBoxFuture};
use uuid::Uuid;

use crate::animation::HeavyAnimationGate;
use crate::callbacks::{CallbackId, CallbackManager, Unsubscribe};
use crate::config::CoreConfig;
use crate::scheduler::{SharedScheduler, Task, TickEndThrottle};
use container::ContainerRegistry;

/// A dispatchable action. Handlers are registered per [`Action::Kind`].
pub trait Action: 'static {
    type Kind: Copy + Eq + Hash + fmt::Debug + 'static;

    fn kind(&self) -> Self::Kind;
}

/// What a handler asks the store to do after it ran.
pub enum ActionResult<S> {
    /// Side effects only.
    None,
    /// Commit a new state with the dispatch's options.
    Commit(Global<S>),
    /// The dispatch completes when this future does. The future commits its
    /// own state changes.
    Pending(LocalBoxFuture<'static, ()>),
}

pub type ActionHandler<S, A> = Rc<dyn Fn(&Global<S>, &Actions<S, A>, &A) -> ActionResult<S>>;

type ErrorHandler = Rc<dyn Fn(&anyhow::Error)>;

struct QueuedAction<A> {
    action: A,
    options: SetOptions,
    done: oneshot::Sender<Result<(), StoreError>>,
}

struct StoreInner<S, A: Action> {
    debug_checks: bool,
    slow_containers_update: Duration,
    scheduler: SharedScheduler,
    gate: HeavyAnimationGate,

    current: RefCell<Rc<S>>,
    captured_id: Cell<Option<Uuid>>,
    release_captured_id: TickEndThrottle,

    force_on_heavy_animation: Cell<bool>,
    is_deferred_for_animation: Cell<bool>,
    run_callbacks_throttled: TickEndThrottle,
    callbacks: CallbackManager<Rc<S>>,
    immediate_callbacks: CallbackManager<Rc<S>>,
    containers: ContainerRegistry<S>,

    handlers: RefCell<HashMap<A::Kind, Vec<ActionHandler<S, A>>>>,
    action_queue: RefCell<VecDeque<QueuedAction<A>>>,
    is_draining: Cell<bool>,
    after_actions: RefCell<Vec<Task>>,

    error_handler: RefCell<ErrorHandler>,
}

/// Shared handle to one store instance.
pub struct Store<S, A: Action> {
    inner: Rc<StoreInner<S, A>>,
}

impl<S, A: Action> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: 'static, A: Action> Store<S, A> {
    pub fn new(
        initial: S,
        scheduler: SharedScheduler,
        gate: HeavyAnimationGate,
        config: &CoreConfig,
    ) -> Self {
        let inner = Rc::new_cyclic(|weak: &std::rc::Weak<StoreInner<S, A>>| {
            let for_release = weak.clone();
            let release_captured_id = TickEndThrottle::new(scheduler.clone(), move || {
                if let Some(inner) = for_release.upgrade() {
                    inner.captured_id.set(None);
                }
            });

            let for_callbacks = weak.clone();
            let run_callbacks_throttled = TickEndThrottle::new(scheduler.clone(), move || {
                if let Some(inner) = for_callbacks.upgrade() {
                    Store { inner }.run_callbacks();
                }
            });

            let default_handler: ErrorHandler = Rc::new(|err: &anyhow::Error| {
                tracing::error!("store: {:#}", err);
            });

            StoreInner {
                debug_checks: config.debug_checks,
                slow_containers_update: config.slow_containers_update(),
                scheduler,
                gate,
                current: RefCell::new(Rc::new(initial)),
                captured_id: Cell::new(None),
                release_captured_id,
                force_on_heavy_animation: Cell::new(true),
                is_deferred_for_animation: Cell::new(false),
                run_callbacks_throttled,
                callbacks: CallbackManager::new(),
                immediate_callbacks: CallbackManager::new(),
                containers: ContainerRegistry::new(),
                handlers: RefCell::new(HashMap::new()),
                action_queue: RefCell::new(VecDeque::new()),
                is_draining: Cell::new(false),
                after_actions: RefCell::new(Vec::new()),
                error_handler: RefCell::new(default_handler),
            }
        });

        Self { inner }
    }

    pub fn scheduler(&self) -> &SharedScheduler {
        &self.inner.scheduler
    }

    pub fn gate(&self) -> &HeavyAnimationGate {
        &self.inner.gate
    }

    pub fn debug_checks(&self) -> bool {
        self.inner.debug_checks
    }

    /// Current state without tagging.
    pub fn state(&self) -> Rc<S> {
        Rc::clone(&self.inner.current.borrow())
    }

    pub fn peek_global(&self) -> Global<S> {
        Global::from_rc(self.state())
    }

    /// Current state for a read-modify-write cycle. With debug checks on, the
    /// snapshot is tagged and the tag is released at tick end.
    pub fn get_global(&self) -> Global<S> {
        let inner = &self.inner;
        if !inner.debug_checks {
            return self.peek_global();
        }

        let captured_id = Uuid::new_v4();
        inner.captured_id.set(Some(captured_id));
        inner.release_captured_id.schedule();
        Global::captured(self.state(), captured_id)
    }

    pub fn set_global(&self, next: Global<S>, options: SetOptions) -> Result<(), StoreError> {
        let inner = &self.inner;
        if Rc::ptr_eq(next.state(), &inner.current.borrow()) {
            return Ok(());
        }

        if inner.debug_checks {
            let current = inner.captured_id.get();
            if let Some(captured) = next.captured_id() {
                if Some(captured) != current {
                    return Err(StoreError::StaleWrite { captured, current });
                }
            }
            inner.captured_id.set(None);
        }

        let state = next.into_rc();
        *inner.current.borrow_mut() = Rc::clone(&state);

        if !options.no_update {
            inner.immediate_callbacks.run_callbacks(&state);
        }

        if options.force_sync {
            inner.force_on_heavy_animation.set(true);
            self.run_callbacks();
        } else {
            if options.force_on_heavy_animation {
                inner.force_on_heavy_animation.set(true);
            }
            inner.run_callbacks_throttled.schedule();
        }

        Ok(())
    }

    /// Commit a state built outside any read-modify-write cycle, such as one
    /// restored from a cache.
    pub fn replace_global(&self, state: S, options: SetOptions) {
        if let Err(err) = self.set_global(Global::new(state), options) {
            self.report_error(&anyhow::Error::new(err));
        }
    }

    pub fn add_action_handler(
        &self,
        kind: A::Kind,
        handler: impl Fn(&Global<S>, &Actions<S, A>, &A) -> ActionResult<S> + 'static,
    ) {
        self.inner
            .handlers
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(Rc::new(handler));
    }

    pub fn handlers_count(&self, kind: A::Kind) -> usize {
        self.inner
            .handlers
            .borrow()
            .get(&kind)
            .map_or(0, |handlers| handlers.len())
    }

    pub fn dispatch(&self, action: A) -> Dispatched {
        self.dispatch_with(action, SetOptions::default())
    }

    /// Queue `action`. When nothing is being processed, the queue is drained
    /// before this returns. The returned future resolves once every handler
    /// ran and every continuation they returned completed.
    pub fn dispatch_with(&self, action: A, options: SetOptions) -> Dispatched {
        let (done, receiver) = oneshot::channel();
        self.inner.action_queue.borrow_mut().push_back(QueuedAction {
            action,
            options,
            done,
        });

        if !self.inner.is_draining.get() {
            self.drain();
        }

        Dispatched { receiver }
    }

    /// Run `task` once the current dispatch batch, including everything it
    /// queued, has been processed. Runs right away outside of a dispatch.
    pub fn exec_after_actions(&self, task: impl FnOnce() + 'static) {
        if self.inner.is_draining.get() {
            self.inner.after_actions.borrow_mut().push(Box::new(task));
        } else {
            task();
        }
    }

    pub fn actions(&self) -> Actions<S, A> {
        Actions {
            store: self.clone(),
        }
    }

    /// Register a callback for the coalesced notification pass.
    pub fn add_callback(&self, callback: impl Fn(&Rc<S>) + 'static) -> Unsubscribe {
        self.inner.callbacks.add_callback(callback)
    }

    /// Register a callback run synchronously on every commit.
    pub fn add_immediate_callback(&self, callback: impl Fn(&Rc<S>) + 'static) -> Unsubscribe {
        self.inner.immediate_callbacks.add_callback(callback)
    }

    pub fn remove_callback(&self, id: CallbackId) {
        self.inner.callbacks.remove_callback(id);
        self.inner.immediate_callbacks.remove_callback(id);
    }

    pub fn set_error_handler(&self, handler: impl Fn(&anyhow::Error) + 'static) {
        *self.inner.error_handler.borrow_mut() = Rc::new(handler);
    }

    /// Mount a container. Props are mapped on the first
    /// [`ContainerHandle::render`] and refreshed by every notification pass.
    pub fn connect<O, P>(
        &self,
        map_state_to_props: impl Fn(&S, &O) -> anyhow::Result<P> + 'static,
        activation_fn: Option<ActivationFn<S, O>>,
        own_props: O,
        force_update: impl Fn() + 'static,
    ) -> ContainerHandle<S, O, P>
    where
        O: PartialEq + 'static,
        P: Clone + PartialEq + 'static,
    {
        let weak = Rc::downgrade(&self.inner);
        let fallback = self.state();
        let current: Rc<dyn Fn() -> Rc<S>> = Rc::new(move || match weak.upgrade() {
            Some(inner) => Rc::clone(&inner.current.borrow()),
            None => Rc::clone(&fallback),
        });

        self.inner.containers.connect(
            current,
            Box::new(map_state_to_props),
            activation_fn,
            own_props,
            Box::new(force_update),
        )
    }

    pub fn containers_count(&self) -> usize {
        self.inner.containers.len()
    }

    fn report_error(&self, err: &anyhow::Error) {
        let handler = Rc::clone(&self.inner.error_handler.borrow());
        handler(err);
    }

    fn run_callbacks(&self) {
        let inner = &self.inner;

        if inner.force_on_heavy_animation.replace(false) {
            // Forced pass: runs even mid-animation.
        } else if inner.gate.is_heavy_animating() {
            if !inner.is_deferred_for_animation.replace(true) {
                tracing::trace!("store: notification pass deferred by heavy animation");
                let weak = Rc::downgrade(inner);
                inner.gate.on_fully_idle(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.is_deferred_for_animation.set(false);
                        inner.run_callbacks_throttled.schedule();
                    }
                });
            }
            return;
        }

        let state = self.state();
        let slow_threshold = inner.debug_checks.then_some(inner.slow_containers_update);
        inner
            .containers
            .update_all(&state, &|err| self.report_error(err), slow_threshold);
        inner.callbacks.run_callbacks(&state);
    }

    fn drain(&self) {
        let inner = &self.inner;
        inner.is_draining.set(true);
        let _guard = DrainGuard {
            is_draining: &inner.is_draining,
            queue: &inner.action_queue,
        };

        loop {
            loop {
                let next = inner.action_queue.borrow_mut().pop_front();
                let Some(queued) = next else {
                    break;
                };
                self.process_action(queued);
            }

            let after_actions = std::mem::take(&mut *inner.after_actions.borrow_mut());
            if after_actions.is_empty() {
                break;
            }
            for task in after_actions {
                task();
            }
        }
    }

    fn process_action(&self, queued: QueuedAction<A>) {
        let QueuedAction {
            action,
            options,
            done,
        } = queued;
        let kind = action.kind();

        let handlers = self
            .inner
            .handlers
            .borrow()
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        if handlers.is_empty() {
            tracing::debug!("store: no handlers for {:?}", kind);
        }

        let actions = self.actions();
        let mut first_error: Option<StoreError> = None;
        let mut pending = Vec::new();

        for handler in handlers {
            let global = self.get_global();
            match handler(&global, &actions, &action) {
                ActionResult::None => {}
                ActionResult::Commit(next) => {
                    if let Err(err) = self.set_global(next, options) {
                        self.report_error(
                            &anyhow::Error::new(err.clone())
                                .context(format!("handler for {:?} failed to commit", kind)),
                        );
                        first_error.get_or_insert(err);
                    }
                }
                ActionResult::Pending(future) => pending.push(future),
            }
        }

        let result = first_error.map_or(Ok(()), Err);
        if pending.is_empty() {
            let _ = done.send(result);
            return;
        }

        self.inner.scheduler.spawn(Box::pin(async move {
            join_all(pending).await;
            let _ = done.send(result);
        }));
    }
}

struct DrainGuard<'a, A> {
    is_draining: &'a Cell<bool>,
    queue: &'a RefCell<VecDeque<A>>,
}

impl<A> Drop for DrainGuard<'_, A> {
    fn drop(&mut self) {
        self.is_draining.set(false);
        self.queue.borrow_mut().clear();
    }
}

/// Handle passed to action handlers: dispatch further actions and commit
/// state from async continuations.
pub struct Actions<S, A: Action> {
    store: Store<S, A>,
}

impl<S, A: Action> Clone for Actions<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: 'static, A: Action> Actions<S, A> {
    pub fn dispatch(&self, action: A) -> Dispatched {
        self.store.dispatch(action)
    }

    pub fn dispatch_with(&self, action: A, options: SetOptions) -> Dispatched {
        self.store.dispatch_with(action, options)
    }

    pub fn exec_after_actions(&self, task: impl FnOnce() + 'static) {
        self.store.exec_after_actions(task);
    }

    pub fn get_global(&self) -> Global<S> {
        self.store.get_global()
    }

    pub fn set_global(&self, next: Global<S>, options: SetOptions) -> Result<(), StoreError> {
        self.store.set_global(next, options)
    }

    pub fn store(&self) -> &Store<S, A> {
        &self.store
    }
}

/// Completion of one dispatch.
#[must_use = "dropping the handle does not cancel the action; bind it to `_` to ignore completion"]
pub struct Dispatched {
    receiver: oneshot::Receiver<Result<(), StoreError>>,
}

impl Dispatched {
    /// Result if the dispatch already completed.
    pub fn try_result(&mut self) -> Option<Result<(), StoreError>> {
        match self.receiver.try_recv() {
            Ok(result) => result,
            Err(oneshot::Canceled) => Some(Err(StoreError::Cancelled)),
        }
    }
}

impl Future for Dispatched {
    type Output = Result<(), StoreError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|result| match result {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(StoreError::Cancelled),
        })
    }
}
