use std::collections::HashMap;
use std::rc::Rc;

use super::GlobalAction;
use crate::constants::ARCHIVED_FOLDER_ID;
use crate::models::{
    Chat, ChatListType, ChatMessages, ChatsState, GlobalState, IdList, MessagesState, TopicsInfo,
};

fn with_chats(global: &GlobalState, chats: ChatsState) -> GlobalState {
    GlobalState {
        chats: Rc::new(chats),
        ..global.clone()
    }
}

/// Replace one chat record. `update` returns `None` to leave it untouched.
fn update_chat(
    global: &GlobalState,
    chat_id: &str,
    update: impl FnOnce(&Chat) -> Option<Chat>,
) -> Option<GlobalState> {
    let current = global.chats.by_id.get(chat_id)?;
    let next = update(current)?;
    if next == **current {
        return None;
    }

    let mut by_id = (*global.chats.by_id).clone();
    by_id.insert(chat_id.to_string(), Rc::new(next));

    Some(with_chats(
        global,
        ChatsState {
            by_id: Rc::new(by_id),
            ..(*global.chats).clone()
        },
    ))
}

fn list_contains(list: &Option<IdList>, chat_id: &str) -> bool {
    list.as_ref().is_some_and(|ids| ids.iter().any(|id| id == chat_id))
}

fn without_id(list: &Option<IdList>, chat_id: &str) -> Option<IdList> {
    list.as_ref()
        .map(|ids| Rc::new(ids.iter().filter(|id| *id != chat_id).cloned().collect()))
}

fn with_id_first(list: &Option<IdList>, chat_id: &str) -> Option<IdList> {
    let mut ids = vec![chat_id.to_string()];
    if let Some(current) = list {
        ids.extend(current.iter().filter(|id| *id != chat_id).cloned());
    }
    Some(Rc::new(ids))
}

pub(super) fn set_chat_list(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::SetChatList {
        list,
        ids,
        pinned_ids,
        is_fully_loaded,
    } = action
    else {
        return None;
    };

    let mut chats = (*global.chats).clone();
    let mut changed = false;

    if chats.list_ids.get(*list).as_deref() != Some(ids) {
        *chats.list_ids.get_mut(*list) = Some(Rc::new(ids.clone()));
        changed = true;
    }

    if let Some(pinned_ids) = pinned_ids {
        if chats.ordered_pinned_ids.get(*list).as_deref() != Some(pinned_ids) {
            *chats.ordered_pinned_ids.get_mut(*list) = Some(Rc::new(pinned_ids.clone()));
            changed = true;
        }
    }

    if let Some(is_fully_loaded) = is_fully_loaded {
        if *chats.is_fully_loaded.get(*list) != *is_fully_loaded {
            *chats.is_fully_loaded.get_mut(*list) = *is_fully_loaded;
            changed = true;
        }
    }

    changed.then(|| with_chats(global, chats))
}

pub(super) fn upsert_chats(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::UpsertChats { chats: incoming } = action else {
        return None;
    };

    let mut by_id: Option<HashMap<String, Rc<Chat>>> = None;
    for chat in incoming {
        let unchanged = global
            .chats
            .by_id
            .get(&chat.id)
            .is_some_and(|current| **current == *chat);
        if unchanged {
            continue;
        }

        by_id
            .get_or_insert_with(|| (*global.chats.by_id).clone())
            .insert(chat.id.clone(), Rc::new(chat.clone()));
    }

    let by_id = by_id?;
    Some(with_chats(
        global,
        ChatsState {
            by_id: Rc::new(by_id),
            ..(*global.chats).clone()
        },
    ))
}

pub(super) fn delete_chat(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::DeleteChat { chat_id } = action else {
        return None;
    };
    if !global.chats.by_id.contains_key(chat_id) {
        return None;
    }

    let mut chats = (*global.chats).clone();

    let mut by_id = (*chats.by_id).clone();
    by_id.remove(chat_id);
    chats.by_id = Rc::new(by_id);

    for list in ChatListType::ALL {
        if list_contains(chats.list_ids.get(list), chat_id) {
            let next = without_id(chats.list_ids.get(list), chat_id);
            *chats.list_ids.get_mut(list) = next;
        }
        if list_contains(chats.ordered_pinned_ids.get(list), chat_id) {
            let next = without_id(chats.ordered_pinned_ids.get(list), chat_id);
            *chats.ordered_pinned_ids.get_mut(list) = next;
        }
    }

    if chats.topics_info_by_id.contains_key(chat_id) {
        let mut topics = (*chats.topics_info_by_id).clone();
        topics.remove(chat_id);
        chats.topics_info_by_id = Rc::new(topics);
    }

    if chats.notify_exception_by_id.contains_key(chat_id) {
        let mut exceptions = (*chats.notify_exception_by_id).clone();
        exceptions.remove(chat_id);
        chats.notify_exception_by_id = Rc::new(exceptions);
    }

    Some(with_chats(global, chats))
}

pub(super) fn update_chat_unread(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::UpdateChatUnread {
        chat_id,
        unread_count,
        unread_mentions_count,
    } = action
    else {
        return None;
    };

    update_chat(global, chat_id, |chat| {
        Some(Chat {
            unread_count: *unread_count,
            unread_mentions_count: *unread_mentions_count,
            ..chat.clone()
        })
    })
}

fn read_chat(chat: &Chat) -> Chat {
    Chat {
        unread_count: None,
        unread_mentions_count: None,
        has_unread_mark: false,
        ..chat.clone()
    }
}

pub(super) fn mark_chat_read(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::MarkChatRead { chat_id } = action else {
        return None;
    };

    update_chat(global, chat_id, |chat| Some(read_chat(chat)))
}

/// Marked or counted unread chats become read; read chats get the manual mark.
pub(super) fn toggle_chat_unread(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::ToggleChatUnread { chat_id } = action else {
        return None;
    };

    update_chat(global, chat_id, |chat| {
        let is_unread = chat.has_unread_mark
            || chat.unread_count.unwrap_or(0) > 0
            || chat.unread_mentions_count.unwrap_or(0) > 0;
        if is_unread {
            Some(read_chat(chat))
        } else {
            Some(Chat {
                has_unread_mark: true,
                ..chat.clone()
            })
        }
    })
}

/// Moves the chat between the active and archived lists and unpins it.
pub(super) fn toggle_chat_archived(
    global: &GlobalState,
    action: &GlobalAction,
) -> Option<GlobalState> {
    let GlobalAction::ToggleChatArchived { chat_id } = action else {
        return None;
    };

    let chat = global.chats.by_id.get(chat_id)?;
    let (from, to, folder_id) = if chat.is_archived() {
        (ChatListType::Archived, ChatListType::Active, None)
    } else {
        (
            ChatListType::Active,
            ChatListType::Archived,
            Some(ARCHIVED_FOLDER_ID),
        )
    };

    let mut next = (*global.chats).clone();

    let mut by_id = (*next.by_id).clone();
    by_id.insert(
        chat_id.clone(),
        Rc::new(Chat {
            folder_id,
            ..(**chat).clone()
        }),
    );
    next.by_id = Rc::new(by_id);

    if list_contains(next.list_ids.get(from), chat_id) {
        let list = without_id(next.list_ids.get(from), chat_id);
        *next.list_ids.get_mut(from) = list;
    }
    if next.list_ids.get(to).is_some() && !list_contains(next.list_ids.get(to), chat_id) {
        let list = with_id_first(next.list_ids.get(to), chat_id);
        *next.list_ids.get_mut(to) = list;
    }
    if list_contains(next.ordered_pinned_ids.get(from), chat_id) {
        let pinned = without_id(next.ordered_pinned_ids.get(from), chat_id);
        *next.ordered_pinned_ids.get_mut(from) = pinned;
    }

    Some(with_chats(global, next))
}

/// Pins at the top of `list`, or unpins if already pinned there.
pub(super) fn toggle_chat_pinned(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::ToggleChatPinned { chat_id, list } = action else {
        return None;
    };
    if !global.chats.by_id.contains_key(chat_id) {
        return None;
    }

    let mut chats = (*global.chats).clone();
    let current = chats.ordered_pinned_ids.get(*list);
    let next = if list_contains(current, chat_id) {
        without_id(current, chat_id)
    } else {
        with_id_first(current, chat_id)
    };
    *chats.ordered_pinned_ids.get_mut(*list) = next;

    Some(with_chats(global, chats))
}

pub(super) fn set_draft_date(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::SetDraftDate { chat_id, date } = action else {
        return None;
    };

    update_chat(global, chat_id, |chat| {
        Some(Chat {
            draft_date: *date,
            ..chat.clone()
        })
    })
}

/// Stores the message, makes it the chat's last message when it is the
/// newest, bumps the unread counter for incoming messages and lists the chat
/// if no loaded list has it yet.
pub(super) fn new_message(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::NewMessage { message } = action else {
        return None;
    };
    let chat = global.chats.by_id.get(&message.chat_id)?;
    let chat_id = &message.chat_id;

    let mut by_chat_id = (*global.messages.by_chat_id).clone();
    let mut chat_messages: ChatMessages = by_chat_id
        .get(chat_id)
        .map(|messages| (**messages).clone())
        .unwrap_or_default();

    let current_last = global
        .chats
        .last_message_ids
        .all
        .get(chat_id)
        .and_then(|id| chat_messages.by_id.get(id))
        .map(|last| (last.date, last.id));
    let is_newest = current_last.map_or(true, |last| (message.date, message.id) >= last);

    chat_messages
        .by_id
        .insert(message.id, Rc::new(message.clone()));
    by_chat_id.insert(chat_id.clone(), Rc::new(chat_messages));

    let mut chats = (*global.chats).clone();

    if is_newest {
        let mut all = (*chats.last_message_ids.all).clone();
        all.insert(chat_id.clone(), message.id);
        chats.last_message_ids.all = Rc::new(all);
    }

    if !message.is_outgoing {
        let mut by_id = (*chats.by_id).clone();
        by_id.insert(
            chat_id.clone(),
            Rc::new(Chat {
                unread_count: Some(chat.unread_count.unwrap_or(0) + 1),
                ..(**chat).clone()
            }),
        );
        chats.by_id = Rc::new(by_id);
    }

    let list = if chat.is_archived() {
        ChatListType::Archived
    } else {
        ChatListType::Active
    };
    if chats.list_ids.get(list).is_some() && !list_contains(chats.list_ids.get(list), chat_id) {
        let ids = with_id_first(chats.list_ids.get(list), chat_id);
        *chats.list_ids.get_mut(list) = ids;
    }

    Some(GlobalState {
        chats: Rc::new(chats),
        messages: Rc::new(MessagesState {
            by_chat_id: Rc::new(by_chat_id),
        }),
        ..global.clone()
    })
}

pub(super) fn update_topics_info(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::UpdateTopicsInfo { chat_id, info } = action else {
        return None;
    };
    if !global.chats.by_id.contains_key(chat_id) {
        return None;
    }
    let unchanged = global
        .chats
        .topics_info_by_id
        .get(chat_id)
        .is_some_and(|current| **current == *info);
    if unchanged {
        return None;
    }

    let mut topics: HashMap<String, Rc<TopicsInfo>> = (*global.chats.topics_info_by_id).clone();
    topics.insert(chat_id.clone(), Rc::new(info.clone()));

    Some(with_chats(
        global,
        ChatsState {
            topics_info_by_id: Rc::new(topics),
            ..(*global.chats).clone()
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatType, Message};

    fn state_with(chats: Vec<Chat>, active: &[&str]) -> GlobalState {
        let by_id = chats
            .into_iter()
            .map(|chat| (chat.id.clone(), Rc::new(chat)))
            .collect();
        let mut state = ChatsState {
            by_id: Rc::new(by_id),
            ..Default::default()
        };
        state.list_ids.active = Some(Rc::new(active.iter().map(|id| id.to_string()).collect()));
        state.list_ids.archived = Some(Rc::new(Vec::new()));

        GlobalState {
            chats: Rc::new(state),
            ..Default::default()
        }
    }

    fn ids(list: &Option<IdList>) -> Vec<String> {
        list.as_ref().map(|ids| ids.to_vec()).unwrap_or_default()
    }

    #[test]
    fn test_unchanged_upsert_is_noop() {
        let chat = Chat::new("1", ChatType::Private);
        let global = state_with(vec![chat.clone()], &["1"]);

        let action = GlobalAction::UpsertChats { chats: vec![chat] };
        assert!(upsert_chats(&global, &action).is_none());
    }

    #[test]
    fn test_upsert_shares_untouched_slices() {
        let global = state_with(vec![Chat::new("1", ChatType::Private)], &["1"]);
        let mut changed = Chat::new("1", ChatType::Private);
        changed.title = "renamed".into();

        let next = upsert_chats(&global, &GlobalAction::UpsertChats { chats: vec![changed] }).unwrap();
        assert!(Rc::ptr_eq(&global.users, &next.users));
        assert!(!Rc::ptr_eq(&global.chats.by_id, &next.chats.by_id));
        assert_eq!(next.chats.by_id["1"].title, "renamed");
        // The previous snapshot is untouched.
        assert_eq!(global.chats.by_id["1"].title, "");
    }

    #[test]
    fn test_toggle_archived_moves_between_lists() {
        let global = state_with(
            vec![Chat::new("1", ChatType::Private), Chat::new("2", ChatType::Private)],
            &["1", "2"],
        );

        let action = GlobalAction::ToggleChatArchived {
            chat_id: "2".into(),
        };
        let archived = toggle_chat_archived(&global, &action).unwrap();
        assert!(archived.chats.by_id["2"].is_archived());
        assert_eq!(ids(&archived.chats.list_ids.active), vec!["1"]);
        assert_eq!(ids(&archived.chats.list_ids.archived), vec!["2"]);

        let restored = toggle_chat_archived(&archived, &action).unwrap();
        assert!(!restored.chats.by_id["2"].is_archived());
        assert_eq!(ids(&restored.chats.list_ids.active), vec!["2", "1"]);
    }

    #[test]
    fn test_toggle_unread() {
        let mut chat = Chat::new("1", ChatType::Private);
        chat.unread_count = Some(2);
        let global = state_with(vec![chat], &["1"]);
        let action = GlobalAction::ToggleChatUnread {
            chat_id: "1".into(),
        };

        let read = toggle_chat_unread(&global, &action).unwrap();
        assert_eq!(read.chats.by_id["1"].unread_count, None);

        let marked = toggle_chat_unread(&read, &action).unwrap();
        assert!(marked.chats.by_id["1"].has_unread_mark);
    }

    #[test]
    fn test_toggle_unread_with_only_mentions_reads_chat() {
        let mut chat = Chat::new("1", ChatType::SuperGroup);
        chat.unread_mentions_count = Some(2);
        let global = state_with(vec![chat], &["1"]);

        let action = GlobalAction::ToggleChatUnread {
            chat_id: "1".into(),
        };
        let read = toggle_chat_unread(&global, &action).unwrap();
        let chat = &read.chats.by_id["1"];
        assert_eq!(chat.unread_mentions_count, None);
        assert!(!chat.has_unread_mark);
    }

    #[test]
    fn test_new_message_updates_last_message_and_unread() {
        let global = state_with(vec![Chat::new("1", ChatType::Private)], &[]);
        let action = GlobalAction::NewMessage {
            message: Message {
                id: 5,
                chat_id: "1".into(),
                date: 100,
                is_outgoing: false,
                text: "hi".into(),
            },
        };

        let next = new_message(&global, &action).unwrap();
        assert_eq!(next.chats.last_message_ids.all.get("1"), Some(&5));
        assert_eq!(next.chats.by_id["1"].unread_count, Some(1));
        assert_eq!(ids(&next.chats.list_ids.active), vec!["1"]);

        let older = GlobalAction::NewMessage {
            message: Message {
                id: 4,
                chat_id: "1".into(),
                date: 90,
                is_outgoing: true,
                text: String::new(),
            },
        };
        let after_older = new_message(&next, &older).unwrap();
        assert_eq!(after_older.chats.last_message_ids.all.get("1"), Some(&5));
        assert_eq!(after_older.chats.by_id["1"].unread_count, Some(1));
    }

    #[test]
    fn test_delete_chat_removes_from_lists() {
        let global = state_with(
            vec![Chat::new("1", ChatType::Private), Chat::new("2", ChatType::Private)],
            &["1", "2"],
        );
        let pinned = toggle_chat_pinned(
            &global,
            &GlobalAction::ToggleChatPinned {
                chat_id: "1".into(),
                list: ChatListType::Active,
            },
        )
        .unwrap();

        let next = delete_chat(
            &pinned,
            &GlobalAction::DeleteChat {
                chat_id: "1".into(),
            },
        )
        .unwrap();
        assert!(!next.chats.by_id.contains_key("1"));
        assert_eq!(ids(&next.chats.list_ids.active), vec!["2"]);
        assert!(ids(&next.chats.ordered_pinned_ids.active).is_empty());
    }

    #[test]
    fn test_set_chat_list_detects_no_change() {
        let global = state_with(vec![], &["1"]);
        let action = GlobalAction::SetChatList {
            list: ChatListType::Active,
            ids: vec!["1".into()],
            pinned_ids: None,
            is_fully_loaded: Some(false),
        };
        assert!(set_chat_list(&global, &action).is_none());
    }
}
