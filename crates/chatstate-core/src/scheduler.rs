//! Scheduling seam between the state engine and the host event loop.
//!
//! Everything in this crate is single-threaded and cooperative. Work that must
//! not run inline (notification passes, idle-time recomputation, animation
//! timeouts, async action continuations) is handed to a [`Scheduler`].
//!
//! - [`ManualScheduler`] runs nothing until told to; tests drive it with
//!   [`ManualScheduler::flush`] and [`ManualScheduler::advance`].
//! - [`TokioScheduler`] maps every operation onto `tokio::task::spawn_local`
//!   and must be used from inside a `tokio::task::LocalSet`.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;

pub type Task = Box<dyn FnOnce()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

pub trait Scheduler {
    /// Run `task` once the current synchronous run of code has finished.
    fn on_tick_end(&self, task: Task);

    /// Run `task` when the event loop has nothing more urgent to do.
    fn run_when_idle_or_now(&self, task: Task);

    fn set_timeout(&self, delay: Duration, task: Task) -> TimerId;

    fn clear_timeout(&self, id: TimerId);

    /// Drive `future` to completion in the background.
    fn spawn(&self, future: LocalBoxFuture<'static, ()>);
}

pub type SharedScheduler = Rc<dyn Scheduler>;

/// Coalesces any number of [`TickEndThrottle::schedule`] calls made within one
/// tick into a single run of the task at tick end.
#[derive(Clone)]
pub struct TickEndThrottle {
    scheduler: SharedScheduler,
    pending: Rc<Cell<bool>>,
    task: Rc<dyn Fn()>,
}

impl TickEndThrottle {
    pub fn new(scheduler: SharedScheduler, task: impl Fn() + 'static) -> Self {
        Self {
            scheduler,
            pending: Rc::new(Cell::new(false)),
            task: Rc::new(task),
        }
    }

    pub fn schedule(&self) {
        if self.pending.replace(true) {
            return;
        }

        let pending = Rc::clone(&self.pending);
        let task = Rc::clone(&self.task);
        self.scheduler.on_tick_end(Box::new(move || {
            pending.set(false);
            task();
        }));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }
}

struct ThrottleInner {
    scheduler: SharedScheduler,
    interval: Duration,
    run_first: bool,
    task: Rc<dyn Fn()>,
    timer: Cell<Option<TimerId>>,
    pending: Cell<bool>,
}

impl Drop for ThrottleInner {
    fn drop(&mut self) {
        if let Some(id) = self.timer.take() {
            self.scheduler.clear_timeout(id);
        }
    }
}

/// Interval throttle.
///
/// The first call runs the task immediately (when `run_first`) and opens an
/// interval. Calls made while the interval is open are folded into one run at
/// the next interval boundary. The interval closes at the first boundary with
/// nothing pending.
#[derive(Clone)]
pub struct Throttle {
    inner: Rc<ThrottleInner>,
}

impl Throttle {
    pub fn new(
        scheduler: SharedScheduler,
        interval: Duration,
        run_first: bool,
        task: impl Fn() + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(ThrottleInner {
                scheduler,
                interval,
                run_first,
                task: Rc::new(task),
                timer: Cell::new(None),
                pending: Cell::new(false),
            }),
        }
    }

    pub fn call(&self) {
        let inner = &self.inner;
        inner.pending.set(true);

        if inner.timer.get().is_some() {
            return;
        }

        Self::arm(inner);
        if inner.run_first {
            inner.pending.set(false);
            let task = Rc::clone(&inner.task);
            task();
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.timer.get().is_some()
    }

    pub fn cancel(&self) {
        self.inner.pending.set(false);
        if let Some(id) = self.inner.timer.take() {
            self.inner.scheduler.clear_timeout(id);
        }
    }

    fn arm(inner: &Rc<ThrottleInner>) {
        let weak: Weak<ThrottleInner> = Rc::downgrade(inner);
        let id = inner.scheduler.set_timeout(
            inner.interval,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    Self::on_interval(&inner);
                }
            }),
        );
        inner.timer.set(Some(id));
    }

    fn on_interval(inner: &Rc<ThrottleInner>) {
        inner.timer.set(None);
        if !inner.pending.get() {
            return;
        }

        inner.pending.set(false);
        Self::arm(inner);
        let task = Rc::clone(&inner.task);
        task();
    }
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_timer: u64,
    tick_end: VecDeque<Task>,
    idle: VecDeque<Task>,
    timers: BTreeMap<(Duration, TimerId), Task>,
    deadlines: HashMap<TimerId, Duration>,
}

/// Deterministic scheduler with a virtual clock.
pub struct ManualScheduler {
    state: RefCell<ManualState>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            state: RefCell::new(ManualState::default()),
            pool: RefCell::new(pool),
            spawner,
        }
    }

    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    pub fn pending_timers(&self) -> usize {
        self.state.borrow().timers.len()
    }

    /// Run every queued tick-end task, including ones queued while running.
    /// Returns whether anything ran.
    pub fn flush_ticks(&self) -> bool {
        let mut ran = false;
        while let Some(task) = self.pop(|state| state.tick_end.pop_front()) {
            task();
            ran = true;
        }
        ran
    }

    /// Run the idle tasks queued before this call.
    pub fn run_idle(&self) -> bool {
        let batch: Vec<Task> = self.state.borrow_mut().idle.drain(..).collect();
        let ran = !batch.is_empty();
        for task in batch {
            task();
        }
        ran
    }

    /// Run everything runnable at the current virtual time until quiescent:
    /// spawned futures, tick-end tasks, idle tasks and due timers.
    pub fn flush(&self) {
        loop {
            self.pool.borrow_mut().run_until_stalled();

            if self.flush_ticks() {
                continue;
            }
            if self.run_idle() {
                continue;
            }
            if self.run_due_timer() {
                continue;
            }
            break;
        }
    }

    /// Move the virtual clock forward by `delta`, firing timers in deadline
    /// order and flushing after each one.
    pub fn advance(&self, delta: Duration) {
        let target = self.now() + delta;
        self.flush();

        loop {
            let next = {
                let mut state = self.state.borrow_mut();
                let due = state
                    .timers
                    .keys()
                    .next()
                    .copied()
                    .filter(|(deadline, _)| *deadline <= target);
                due.and_then(|key| {
                    state.deadlines.remove(&key.1);
                    state.now = key.0;
                    state.timers.remove(&key)
                })
            };

            match next {
                Some(task) => {
                    task();
                    self.flush();
                }
                None => break,
            }
        }

        self.state.borrow_mut().now = target;
        self.flush();
    }

    fn run_due_timer(&self) -> bool {
        let task = {
            let mut state = self.state.borrow_mut();
            let now = state.now;
            let due = state
                .timers
                .keys()
                .next()
                .copied()
                .filter(|(deadline, _)| *deadline <= now);
            due.and_then(|key| {
                state.deadlines.remove(&key.1);
                state.timers.remove(&key)
            })
        };

        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    fn pop(&self, f: impl FnOnce(&mut ManualState) -> Option<Task>) -> Option<Task> {
        f(&mut self.state.borrow_mut())
    }
}

impl Scheduler for ManualScheduler {
    fn on_tick_end(&self, task: Task) {
        self.state.borrow_mut().tick_end.push_back(task);
    }

    fn run_when_idle_or_now(&self, task: Task) {
        self.state.borrow_mut().idle.push_back(task);
    }

    fn set_timeout(&self, delay: Duration, task: Task) -> TimerId {
        let mut state = self.state.borrow_mut();
        state.next_timer += 1;
        let id = TimerId(state.next_timer);
        let deadline = state.now + delay;
        state.timers.insert((deadline, id), task);
        state.deadlines.insert(id, deadline);
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        let mut state = self.state.borrow_mut();
        if let Some(deadline) = state.deadlines.remove(&id) {
            state.timers.remove(&(deadline, id));
        }
    }

    fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        if let Err(err) = self.spawner.spawn_local(future) {
            tracing::error!("scheduler: failed to spawn future: {}", err);
        }
    }
}

/// Scheduler backed by the tokio current-thread runtime.
///
/// Every method calls `tokio::task::spawn_local`, which panics outside a
/// `LocalSet`.
pub struct TokioScheduler {
    next_timer: Cell<u64>,
    timers: Rc<RefCell<HashMap<TimerId, tokio::task::JoinHandle<()>>>>,
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self {
            next_timer: Cell::new(0),
            timers: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    pub fn active_timers(&self) -> usize {
        self.timers.borrow().len()
    }
}

impl Scheduler for TokioScheduler {
    fn on_tick_end(&self, task: Task) {
        tokio::task::spawn_local(async move { task() });
    }

    fn run_when_idle_or_now(&self, task: Task) {
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            task();
        });
    }

    fn set_timeout(&self, delay: Duration, task: Task) -> TimerId {
        let id = TimerId(self.next_timer.get() + 1);
        self.next_timer.set(id.0);

        let timers = Rc::clone(&self.timers);
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            timers.borrow_mut().remove(&id);
            task();
        });
        self.timers.borrow_mut().insert(id, handle);
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        if let Some(handle) = self.timers.borrow_mut().remove(&id) {
            handle.abort();
        }
    }

    fn spawn(&self, future: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(future);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, impl Fn() + 'static) {
        let count = Rc::new(Cell::new(0));
        let count_clone = Rc::clone(&count);
        (count, move || count_clone.set(count_clone.get() + 1))
    }

    #[test]
    fn test_tick_end_throttle_coalesces() {
        let scheduler = ManualScheduler::shared();
        let (count, task) = counter();
        let throttle = TickEndThrottle::new(scheduler.clone(), task);

        throttle.schedule();
        throttle.schedule();
        throttle.schedule();
        assert!(throttle.is_pending());
        assert_eq!(count.get(), 0);

        scheduler.flush();
        assert_eq!(count.get(), 1);
        assert!(!throttle.is_pending());

        throttle.schedule();
        scheduler.flush();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_throttle_leading_and_trailing_runs() {
        let scheduler = ManualScheduler::shared();
        let (count, task) = counter();
        let throttle = Throttle::new(scheduler.clone(), Duration::from_millis(500), true, task);

        throttle.call();
        assert_eq!(count.get(), 1);

        throttle.call();
        throttle.call();
        assert_eq!(count.get(), 1);

        scheduler.advance(Duration::from_millis(500));
        assert_eq!(count.get(), 2);
        assert!(throttle.is_active());

        // Nothing pending at the next boundary closes the interval.
        scheduler.advance(Duration::from_millis(500));
        assert_eq!(count.get(), 2);
        assert!(!throttle.is_active());

        throttle.call();
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_throttle_without_run_first_waits_for_interval() {
        let scheduler = ManualScheduler::shared();
        let (count, task) = counter();
        let throttle = Throttle::new(scheduler.clone(), Duration::from_millis(100), false, task);

        throttle.call();
        assert_eq!(count.get(), 0);

        scheduler.advance(Duration::from_millis(100));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_throttle_cancel_and_drop_clear_timer() {
        let scheduler = ManualScheduler::shared();
        let (count, task) = counter();
        let throttle = Throttle::new(scheduler.clone(), Duration::from_millis(100), true, task);

        throttle.call();
        throttle.call();
        throttle.cancel();
        assert_eq!(scheduler.pending_timers(), 0);

        scheduler.advance(Duration::from_millis(200));
        assert_eq!(count.get(), 1);

        throttle.call();
        assert_eq!(scheduler.pending_timers(), 1);
        drop(throttle);
        assert_eq!(scheduler.pending_timers(), 0);
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let scheduler = ManualScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for (delay, tag) in [(30, "c"), (10, "a"), (20, "b")] {
            let log = Rc::clone(&log);
            scheduler.set_timeout(
                Duration::from_millis(delay),
                Box::new(move || log.borrow_mut().push(tag)),
            );
        }

        let cleared = {
            let log = Rc::clone(&log);
            scheduler.set_timeout(
                Duration::from_millis(15),
                Box::new(move || log.borrow_mut().push("x")),
            )
        };
        scheduler.clear_timeout(cleared);

        scheduler.advance(Duration::from_millis(25));
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(scheduler.now(), Duration::from_millis(25));

        scheduler.advance(Duration::from_millis(10));
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_flush_runs_ticks_before_idle() {
        let scheduler = ManualScheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let push = |tag: &'static str| {
            let log = Rc::clone(&log);
            Box::new(move || log.borrow_mut().push(tag)) as Task
        };

        scheduler.run_when_idle_or_now(push("idle"));
        scheduler.on_tick_end(push("tick"));
        scheduler.flush();

        assert_eq!(*log.borrow(), vec!["tick", "idle"]);
    }

    #[test]
    fn test_spawned_future_runs_on_flush() {
        let scheduler = ManualScheduler::new();
        let (count, task) = counter();

        let (tx, rx) = futures::channel::oneshot::channel::<()>();
        scheduler.spawn(Box::pin(async move {
            if rx.await.is_ok() {
                task();
            }
        }));
        scheduler.flush();
        assert_eq!(count.get(), 0);

        scheduler.on_tick_end(Box::new(move || {
            let _ = tx.send(());
        }));
        scheduler.flush();
        assert_eq!(count.get(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_tokio_scheduler_timeout_and_clear() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let scheduler = TokioScheduler::new();
                let (count, task) = counter();
                let (_other_count, other_task) = counter();

                scheduler.set_timeout(Duration::from_millis(5), Box::new(task));
                let cleared = scheduler.set_timeout(Duration::from_millis(5), Box::new(other_task));
                scheduler.clear_timeout(cleared);

                tokio::time::sleep(Duration::from_millis(30)).await;
                assert_eq!(count.get(), 1);
                assert_eq!(scheduler.active_timers(), 0);
            })
            .await;
    }
}
