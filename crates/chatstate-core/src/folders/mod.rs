//! Per-folder chat lists and unread counters, kept up to date with the store.
//!
//! [`FolderManager`] stays inert until something reads from it or subscribes.
//! From then on it follows every notification pass of the store through an
//! interval throttle, waits for heavy animations to finish and runs one
//! incremental [`FolderEngine`] pass. Results are published through per-folder
//! and global callback lists.

mod engine;
mod summary;

pub use engine::{
    ChatsCountByFolderId, FolderChange, FolderEngine, OrderedIds, UnreadCountersByFolderId,
};
pub use summary::{
    is_chat_in_folder, ChatSummary, ChatSummaryInputs, FolderMembership, FolderRules,
    FolderSummary, UnreadCounters,
};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use crate::actions::{GlobalActionKind, GlobalStore};
use crate::callbacks::{CallbackManager, Unsubscribe};
use crate::config::CoreConfig;
use crate::constants::ALL_FOLDER_ID;
use crate::models::FolderId;
use crate::scheduler::Throttle;
use crate::store::ActionResult;

#[derive(Default)]
struct ManagerCallbacks {
    ordered_ids: RefCell<HashMap<FolderId, CallbackManager<OrderedIds>>>,
    chats_count: CallbackManager<ChatsCountByFolderId>,
    unread_counters: CallbackManager<UnreadCountersByFolderId>,
}

impl ManagerCallbacks {
    fn ordered_ids_for(&self, folder_id: FolderId) -> CallbackManager<OrderedIds> {
        self.ordered_ids
            .borrow_mut()
            .entry(folder_id)
            .or_default()
            .clone()
    }

    fn publish(&self, changes: &[FolderChange]) {
        for change in changes {
            match change {
                FolderChange::OrderedIds(folder_id, ids) => {
                    let callbacks = self.ordered_ids.borrow().get(folder_id).cloned();
                    if let Some(callbacks) = callbacks {
                        callbacks.run_callbacks(ids);
                    }
                }
                FolderChange::ChatsCount(chats_count) => {
                    self.chats_count.run_callbacks(chats_count);
                }
                FolderChange::UnreadCounters(unread_counters) => {
                    self.unread_counters.run_callbacks(unread_counters);
                }
            }
        }
    }
}

struct ManagerInner {
    store: GlobalStore,
    is_master_tab: bool,
    debug_checks: bool,
    slow_update: Duration,

    is_initialized: Cell<bool>,
    engine: RefCell<FolderEngine>,
    callbacks: RefCell<Rc<ManagerCallbacks>>,
    throttle: Throttle,
    subscription: RefCell<Option<Unsubscribe>>,
}

impl ManagerInner {
    fn update(&self) {
        let state = self.store.state();
        let started_at = Instant::now();

        let changes = match self.engine.try_borrow_mut() {
            Ok(mut engine) => engine.update(&state),
            Err(_) => {
                tracing::warn!("folder_manager: update skipped, engine busy");
                return;
            }
        };

        let elapsed = started_at.elapsed();
        if self.debug_checks && elapsed > self.slow_update {
            tracing::warn!("folder_manager: slow update: {} ms", elapsed.as_millis());
        }

        if changes.is_empty() {
            return;
        }

        let callbacks = Rc::clone(&self.callbacks.borrow());
        callbacks.publish(&changes);
    }

    fn reset(&self) {
        tracing::debug!("folder_manager: reset");
        self.throttle.cancel();
        *self.engine.borrow_mut() = FolderEngine::new();
        *self.callbacks.borrow_mut() = Rc::new(ManagerCallbacks::default());
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription.unsubscribe();
        }
    }
}

/// Shared handle to the folder lists of one store.
#[derive(Clone)]
pub struct FolderManager {
    inner: Rc<ManagerInner>,
}

impl FolderManager {
    pub fn new(store: &GlobalStore, config: &CoreConfig) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<ManagerInner>| {
            let for_throttle = weak.clone();
            let throttle = Throttle::new(
                Rc::clone(store.scheduler()),
                config.folder_update_throttle(),
                true,
                move || {
                    let Some(inner) = for_throttle.upgrade() else {
                        return;
                    };
                    let for_idle = for_throttle.clone();
                    inner.store.gate().on_fully_idle(move || {
                        if let Some(inner) = for_idle.upgrade() {
                            inner.update();
                        }
                    });
                },
            );

            ManagerInner {
                store: store.clone(),
                is_master_tab: config.is_master_tab,
                debug_checks: config.debug_checks,
                slow_update: config.slow_folder_update(),
                is_initialized: Cell::new(false),
                engine: RefCell::new(FolderEngine::new()),
                callbacks: RefCell::new(Rc::new(ManagerCallbacks::default())),
                throttle,
                subscription: RefCell::new(None),
            }
        });

        Self { inner }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_initialized.get()
    }

    fn ensure_initialized(&self) {
        let inner = &self.inner;
        if inner.is_initialized.replace(true) {
            return;
        }

        let weak = Rc::downgrade(inner);
        let subscription = inner.store.add_callback(move |_state| {
            if let Some(inner) = weak.upgrade() {
                inner.throttle.call();
            }
        });
        *inner.subscription.borrow_mut() = Some(subscription);

        let weak = Rc::downgrade(inner);
        inner
            .store
            .add_action_handler(GlobalActionKind::Reset, move |_global, _actions, _action| {
                if let Some(inner) = weak.upgrade() {
                    inner.reset();
                }
                ActionResult::None
            });

        if inner.is_master_tab {
            tracing::debug!("folder_manager: initialized, first pass scheduled");
            inner.throttle.call();
        } else {
            tracing::debug!("folder_manager: initialized, building folders now");
            inner.update();
        }
    }

    /// Ordered chat ids of `folder_id`: pinned chats first, then the rest by
    /// recency. `None` until the folder has been materialized.
    pub fn get_ordered_ids(&self, folder_id: FolderId) -> Option<OrderedIds> {
        self.ensure_initialized();
        self.inner.engine.borrow().ordered_ids(folder_id)
    }

    pub fn get_pinned_chats_count(&self, folder_id: FolderId) -> usize {
        self.ensure_initialized();
        self.inner.engine.borrow().pinned_count(folder_id)
    }

    pub fn get_chats_count(&self) -> ChatsCountByFolderId {
        self.ensure_initialized();
        self.inner.engine.borrow().chats_count()
    }

    pub fn get_unread_counters(&self) -> UnreadCountersByFolderId {
        self.ensure_initialized();
        self.inner.engine.borrow().unread_counters()
    }

    pub fn get_all_notifications_count(&self) -> u32 {
        self.get_unread_counters()
            .get(&ALL_FOLDER_ID)
            .map_or(0, |counters| counters.notifications_count)
    }

    /// Recency key of a listed chat.
    pub fn get_order_key(&self, chat_id: &str) -> Option<i64> {
        self.ensure_initialized();
        self.inner.engine.borrow().order_key(chat_id)
    }

    pub fn add_ordered_ids_callback(
        &self,
        folder_id: FolderId,
        callback: impl Fn(&OrderedIds) + 'static,
    ) -> Unsubscribe {
        self.ensure_initialized();
        let callbacks = Rc::clone(&self.inner.callbacks.borrow());
        callbacks.ordered_ids_for(folder_id).add_callback(callback)
    }

    pub fn add_chats_count_callback(
        &self,
        callback: impl Fn(&ChatsCountByFolderId) + 'static,
    ) -> Unsubscribe {
        self.ensure_initialized();
        self.inner.callbacks.borrow().chats_count.add_callback(callback)
    }

    pub fn add_unread_counters_callback(
        &self,
        callback: impl Fn(&UnreadCountersByFolderId) + 'static,
    ) -> Unsubscribe {
        self.ensure_initialized();
        self.inner
            .callbacks
            .borrow()
            .unread_counters
            .add_callback(callback)
    }

    /// Run one pass against the current state right away, bypassing the
    /// throttle and the animation gate.
    pub fn update_now(&self) {
        self.ensure_initialized();
        self.inner.update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{install_handlers, GlobalAction};
    use crate::animation::HeavyAnimationGate;
    use crate::models::{Chat, ChatListType, ChatType, GlobalState};
    use crate::scheduler::ManualScheduler;
    use crate::store::SetOptions;

    fn setup(is_master_tab: bool) -> (Rc<ManualScheduler>, GlobalStore, FolderManager) {
        let scheduler = ManualScheduler::shared();
        let gate = HeavyAnimationGate::new(scheduler.clone(), Duration::from_millis(1000));
        let config = CoreConfig {
            is_master_tab,
            ..CoreConfig::default()
        };
        let store = GlobalStore::new(GlobalState::default(), scheduler.clone(), gate, &config);
        install_handlers(&store);
        let manager = FolderManager::new(&store, &config);
        (scheduler, store, manager)
    }

    fn load_chats(store: &GlobalStore, ids: &[&str]) {
        let chats = ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let mut chat = Chat::new(*id, ChatType::Private);
                chat.creation_date = Some(index as i64);
                chat
            })
            .collect();
        let _ = store.dispatch(GlobalAction::UpsertChats { chats });
        let _ = store.dispatch(GlobalAction::SetChatList {
            list: ChatListType::Active,
            ids: ids.iter().map(|id| id.to_string()).collect(),
            pinned_ids: None,
            is_fully_loaded: Some(true),
        });
    }

    #[test]
    fn test_inert_until_first_access() {
        let (scheduler, store, manager) = setup(true);
        load_chats(&store, &["a"]);
        scheduler.flush();

        assert!(!manager.is_initialized());
        assert_eq!(store.handlers_count(GlobalActionKind::Reset), 1);

        assert!(manager.get_ordered_ids(ALL_FOLDER_ID).is_none());
        assert!(manager.is_initialized());
        assert_eq!(store.handlers_count(GlobalActionKind::Reset), 2);

        scheduler.flush();
        assert_eq!(
            manager.get_ordered_ids(ALL_FOLDER_ID).as_deref(),
            Some(&vec!["a".to_string()])
        );
    }

    #[test]
    fn test_non_master_builds_eagerly() {
        let (_scheduler, store, manager) = setup(false);
        load_chats(&store, &["a", "b"]);

        assert_eq!(
            manager.get_ordered_ids(ALL_FOLDER_ID).as_deref(),
            Some(&vec!["b".to_string(), "a".to_string()])
        );
        assert_eq!(manager.get_chats_count().get(&ALL_FOLDER_ID), Some(&2));
    }

    #[test]
    fn test_updates_are_throttled() {
        let (scheduler, store, manager) = setup(false);
        load_chats(&store, &["a"]);
        manager.get_chats_count();

        let runs = Rc::new(Cell::new(0));
        let runs_clone = Rc::clone(&runs);
        let _unsubscribe = manager.add_ordered_ids_callback(ALL_FOLDER_ID, move |_| {
            runs_clone.set(runs_clone.get() + 1);
        });

        load_chats(&store, &["a", "b"]);
        scheduler.flush();
        assert_eq!(runs.get(), 1);

        load_chats(&store, &["a", "b", "c"]);
        scheduler.flush();
        assert_eq!(runs.get(), 1);
        assert_eq!(manager.get_chats_count().get(&ALL_FOLDER_ID), Some(&2));

        scheduler.advance(Duration::from_millis(500));
        assert_eq!(runs.get(), 2);
        assert_eq!(manager.get_chats_count().get(&ALL_FOLDER_ID), Some(&3));
    }

    #[test]
    fn test_update_waits_for_heavy_animation() {
        let (scheduler, store, manager) = setup(false);
        manager.get_chats_count();

        let end = store.gate().begin_heavy_animation(Some(Duration::from_secs(10)), false);
        let chats = vec![Chat::new("a", ChatType::Channel)];
        let _ = store.dispatch_with(GlobalAction::UpsertChats { chats }, SetOptions::forced());
        let _ = store.dispatch_with(
            GlobalAction::SetChatList {
                list: ChatListType::Active,
                ids: vec!["a".into()],
                pinned_ids: None,
                is_fully_loaded: Some(true),
            },
            SetOptions::forced(),
        );
        scheduler.flush();
        assert_eq!(manager.get_chats_count().get(&ALL_FOLDER_ID), None);

        end.end();
        scheduler.flush();
        assert_eq!(manager.get_chats_count().get(&ALL_FOLDER_ID), Some(&1));
    }

    #[test]
    fn test_callbacks_may_read_back() {
        let (_scheduler, store, manager) = setup(false);
        manager.get_chats_count();

        let seen = Rc::new(Cell::new(0));
        let seen_clone = Rc::clone(&seen);
        let reader = manager.clone();
        let _unsubscribe = manager.add_unread_counters_callback(move |_| {
            seen_clone.set(reader.get_chats_count().len());
        });

        load_chats(&store, &["a"]);
        manager.update_now();
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_reset_drops_results_and_subscribers() {
        let (scheduler, store, manager) = setup(false);
        load_chats(&store, &["a"]);
        assert!(manager.get_ordered_ids(ALL_FOLDER_ID).is_some());

        let runs = Rc::new(Cell::new(0));
        let runs_clone = Rc::clone(&runs);
        let _unsubscribe = manager.add_chats_count_callback(move |_| {
            runs_clone.set(runs_clone.get() + 1);
        });

        let _ = store.dispatch(GlobalAction::Reset);
        scheduler.flush();
        assert!(manager.get_ordered_ids(ALL_FOLDER_ID).is_none());

        load_chats(&store, &["b"]);
        manager.update_now();
        assert_eq!(runs.get(), 0);
        assert_eq!(manager.get_chats_count().get(&ALL_FOLDER_ID), Some(&1));
    }

    #[test]
    fn test_all_notifications_count() {
        let (_scheduler, store, manager) = setup(false);
        load_chats(&store, &["a", "b"]);
        let _ = store.dispatch(GlobalAction::UpdateChatUnread {
            chat_id: "a".into(),
            unread_count: Some(4),
            unread_mentions_count: None,
        });
        manager.update_now();

        assert_eq!(manager.get_all_notifications_count(), 4);
        assert_eq!(
            manager.get_unread_counters().get(&ALL_FOLDER_ID),
            Some(&UnreadCounters {
                chats_count: 1,
                notifications_count: 4
            })
        );
    }
}
