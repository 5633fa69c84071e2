use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use chatstate_core::constants::ALL_FOLDER_ID;
use chatstate_core::models::{Chat, ChatListType, ChatType, NotifyException};
use chatstate_core::selectors::{select_chat, select_is_chat_muted};
use chatstate_core::store::{Selector, SelectorBridge};
use chatstate_core::{
    install_handlers, CoreConfig, Effect, FolderManager, GlobalAction, GlobalState, GlobalStore,
    HeavyAnimationGate, ManualScheduler, SetOptions,
};

fn setup() -> (Rc<ManualScheduler>, GlobalStore) {
    let scheduler = ManualScheduler::shared();
    let gate = HeavyAnimationGate::new(scheduler.clone(), Duration::from_secs(5));
    let store = GlobalStore::new(
        GlobalState::default(),
        scheduler.clone(),
        gate,
        &CoreConfig::default(),
    );
    install_handlers(&store);
    (scheduler, store)
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
fn test_container_sees_last_of_coalesced_commits() {
    let (scheduler, store) = setup();
    load_chats(&store, &["1"]);
    scheduler.flush();

    let rerenders = Rc::new(Cell::new(0));
    let rerenders_clone = Rc::clone(&rerenders);
    let handle = store.connect(
        |state: &GlobalState, chat_id: &String| {
            Ok(select_chat(state, chat_id).and_then(|chat| chat.unread_count))
        },
        None,
        "1".to_string(),
        move || rerenders_clone.set(rerenders_clone.get() + 1),
    );
    assert_eq!(handle.render("1".to_string()).unwrap(), Some(None));

    for unread_count in 1..=3 {
        let _ = store.dispatch(GlobalAction::UpdateChatUnread {
            chat_id: "1".into(),
            unread_count: Some(unread_count),
            unread_mentions_count: None,
        });
    }
    scheduler.flush();

    assert_eq!(rerenders.get(), 1);
    assert_eq!(handle.props(), Some(Some(3)));
}

#[test]
fn test_selector_signal_follows_mute_state() {
    let (scheduler, store) = setup();
    load_chats(&store, &["1"]);
    scheduler.flush();

    let bridge = SelectorBridge::attach(&store);
    let selector = Selector::new(|state: &GlobalState| {
        select_chat(state, "1").is_some_and(|chat| select_is_chat_muted(state, chat))
    });
    let is_muted = bridge.use_selector_signal(&selector);
    assert!(!is_muted.get());

    let changes = Rc::new(RefCell::new(Vec::new()));
    let changes_clone = Rc::clone(&changes);
    let signal = is_muted.signal().clone();
    let effect = Effect::new(move || changes_clone.borrow_mut().push(signal.peek()));
    let _subscription = is_muted.signal().subscribe(&effect);

    // unrelated commit, selected value unchanged
    let _ = store.dispatch(GlobalAction::SetDraftDate {
        chat_id: "1".into(),
        date: Some(5),
    });
    scheduler.flush();
    assert!(changes.borrow().is_empty());

    let _ = store.dispatch(GlobalAction::UpdateNotifyException {
        chat_id: "1".into(),
        exception: Some(NotifyException {
            is_muted: Some(true),
            ..Default::default()
        }),
    });
    scheduler.flush();
    assert_eq!(*changes.borrow(), vec![true]);
}

#[test]
fn test_folder_results_wait_for_heavy_animation() {
    let (scheduler, store) = setup();
    let config = CoreConfig {
        is_master_tab: true,
        ..CoreConfig::default()
    };
    let manager = FolderManager::new(&store, &config);

    load_chats(&store, &["1", "2"]);
    let published = Rc::new(RefCell::new(Vec::new()));
    let published_clone = Rc::clone(&published);
    let _subscription = manager.add_ordered_ids_callback(ALL_FOLDER_ID, move |ids| {
        published_clone.borrow_mut().push(ids.to_vec());
    });
    scheduler.advance(Duration::from_secs(1));
    assert_eq!(
        manager.get_ordered_ids(ALL_FOLDER_ID).map(|ids| ids.to_vec()),
        Some(vec!["2".to_string(), "1".to_string()])
    );
    published.borrow_mut().clear();

    let animation = store.gate().begin_heavy_animation(None, false);
    let _ = store.dispatch(GlobalAction::SetDraftDate {
        chat_id: "1".into(),
        date: Some(100),
    });
    scheduler.advance(Duration::from_millis(500));
    assert!(published.borrow().is_empty());

    animation.end();
    scheduler.advance(Duration::from_secs(1));
    assert_eq!(
        *published.borrow(),
        vec![vec!["1".to_string(), "2".to_string()]]
    );
}

#[test]
fn test_forced_dispatch_notifies_during_animation() {
    let (scheduler, store) = setup();
    load_chats(&store, &["1"]);
    scheduler.flush();

    let passes = Rc::new(Cell::new(0));
    let passes_clone = Rc::clone(&passes);
    let _subscription = store.add_callback(move |_| passes_clone.set(passes_clone.get() + 1));

    let _animation = store.gate().begin_heavy_animation(None, true);
    let _ = store.dispatch(GlobalAction::MarkChatRead {
        chat_id: "1".into(),
    });
    let _ = store.dispatch(GlobalAction::ToggleChatUnread {
        chat_id: "1".into(),
    });
    scheduler.flush();
    assert_eq!(passes.get(), 0);

    let _ = store.dispatch_with(
        GlobalAction::SetDraftDate {
            chat_id: "1".into(),
            date: Some(7),
        },
        SetOptions::forced(),
    );
    scheduler.flush();
    assert_eq!(passes.get(), 1);
    assert_eq!(
        select_chat(&store.state(), "1").map(|chat| chat.has_unread_mark),
        Some(true)
    );
}
