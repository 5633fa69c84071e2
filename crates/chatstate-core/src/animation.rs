//! Heavy-animation gate.
//!
//! Counts in-flight "heavy" animations and exposes the non-zero condition as a
//! signal. The store defers its notification pass while the gate is closed and
//! the folder manager waits for it before recomputing.

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::scheduler::{SharedScheduler, TimerId};
use crate::signal::{create_signal, Effect, Signal, SignalSetter};

struct GateInner {
    scheduler: SharedScheduler,
    default_timeout: Duration,
    count: Cell<u32>,
    blocking_count: Cell<u32>,
    heavy: (Signal<bool>, SignalSetter<bool>),
    blocking: (Signal<bool>, SignalSetter<bool>),
}

#[derive(Clone)]
pub struct HeavyAnimationGate {
    inner: Rc<GateInner>,
}

impl HeavyAnimationGate {
    pub fn new(scheduler: SharedScheduler, default_timeout: Duration) -> Self {
        Self {
            inner: Rc::new(GateInner {
                scheduler,
                default_timeout,
                count: Cell::new(0),
                blocking_count: Cell::new(0),
                heavy: create_signal(false),
                blocking: create_signal(false),
            }),
        }
    }

    /// Start a heavy animation. It ends when the returned handle's
    /// [`HeavyAnimationEnd::end`] is called or after `duration` (the gate's
    /// default timeout when `None`), whichever comes first.
    pub fn begin_heavy_animation(
        &self,
        duration: Option<Duration>,
        is_blocking: bool,
    ) -> HeavyAnimationEnd {
        let inner = &self.inner;

        inner.count.set(inner.count.get() + 1);
        if inner.count.get() == 1 {
            inner.heavy.1.set(true);
        }
        if is_blocking {
            inner.blocking_count.set(inner.blocking_count.get() + 1);
            if inner.blocking_count.get() == 1 {
                inner.blocking.1.set(true);
            }
        }

        let end = HeavyAnimationEnd {
            state: Rc::new(EndState {
                gate: Rc::downgrade(inner),
                is_blocking,
                ended: Cell::new(false),
                timer: Cell::new(None),
            }),
        };

        let timeout = duration.unwrap_or(inner.default_timeout);
        let auto_end = end.clone();
        let timer = inner
            .scheduler
            .set_timeout(timeout, Box::new(move || auto_end.finish(false)));
        end.state.timer.set(Some(timer));

        tracing::trace!(
            "heavy_animation: begin (count={}, blocking={})",
            inner.count.get(),
            inner.blocking_count.get()
        );
        end
    }

    pub fn is_heavy_animating(&self) -> bool {
        self.inner.count.get() > 0
    }

    pub fn is_blocking_animating(&self) -> bool {
        self.inner.blocking_count.get() > 0
    }

    pub fn heavy_animating_signal(&self) -> Signal<bool> {
        self.inner.heavy.0.clone()
    }

    pub fn blocking_animating_signal(&self) -> Signal<bool> {
        self.inner.blocking.0.clone()
    }

    /// Run `callback` once no heavy animation is in flight.
    ///
    /// The check happens at idle time. If an animation is running then, the
    /// callback waits for the gate to clear and checks again, since another
    /// animation may have started in between.
    pub fn on_fully_idle(&self, callback: impl FnOnce() + 'static) {
        Self::schedule_idle(Rc::downgrade(&self.inner), Box::new(callback));
    }

    fn schedule_idle(weak: Weak<GateInner>, callback: Box<dyn FnOnce()>) {
        let Some(inner) = weak.upgrade() else {
            return;
        };

        inner.scheduler.run_when_idle_or_now(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };

            if inner.count.get() == 0 {
                callback();
                return;
            }

            let slot = Rc::new(Cell::new(Some(callback)));
            let weak_for_effect = weak.clone();
            let effect = Effect::new(move || {
                if let Some(callback) = slot.take() {
                    Self::schedule_idle(weak_for_effect.clone(), callback);
                }
            });
            inner.heavy.0.once(&effect);
        }));
    }
}

struct EndState {
    gate: Weak<GateInner>,
    is_blocking: bool,
    ended: Cell<bool>,
    timer: Cell<Option<TimerId>>,
}

/// Ends one heavy animation. Cloneable; only the first `end` counts. Dropping
/// the handle does not end the animation, its timeout still will.
#[derive(Clone)]
pub struct HeavyAnimationEnd {
    state: Rc<EndState>,
}

impl HeavyAnimationEnd {
    pub fn end(&self) {
        self.finish(true);
    }

    pub fn is_ended(&self) -> bool {
        self.state.ended.get()
    }

    fn finish(&self, clear_timer: bool) {
        let state = &self.state;
        if state.ended.replace(true) {
            return;
        }

        let timer = state.timer.take();
        let Some(inner) = state.gate.upgrade() else {
            return;
        };

        if clear_timer {
            if let Some(timer) = timer {
                inner.scheduler.clear_timeout(timer);
            }
        }

        inner.count.set(inner.count.get().saturating_sub(1));
        if inner.count.get() == 0 {
            inner.heavy.1.set(false);
        }
        if state.is_blocking {
            inner
                .blocking_count
                .set(inner.blocking_count.get().saturating_sub(1));
            if inner.blocking_count.get() == 0 {
                inner.blocking.1.set(false);
            }
        }

        tracing::trace!("heavy_animation: end (count={})", inner.count.get());
    }
}
