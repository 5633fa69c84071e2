//! Read-only lookups over [`GlobalState`].

use std::rc::Rc;

use crate::models::notify::is_chat_muted;
use crate::models::{
    Chat, ChatFolder, ChatListType, FolderId, GlobalState, Message, NotifyDefaults,
    NotifyException, TopicsInfo, User,
};

pub fn select_chat<'a>(global: &'a GlobalState, chat_id: &str) -> Option<&'a Rc<Chat>> {
    global.chats.by_id.get(chat_id)
}

pub fn select_user<'a>(global: &'a GlobalState, user_id: &str) -> Option<&'a Rc<User>> {
    global.users.by_id.get(user_id)
}

pub fn select_chat_folder<'a>(
    global: &'a GlobalState,
    folder_id: FolderId,
) -> Option<&'a Rc<ChatFolder>> {
    global.chat_folders.by_id.get(&folder_id)
}

pub fn select_topics_info<'a>(global: &'a GlobalState, chat_id: &str) -> Option<&'a Rc<TopicsInfo>> {
    global.chats.topics_info_by_id.get(chat_id)
}

/// Last message of `chat_id` in the "all" context, or in the saved-dialogs
/// context for [`ChatListType::Saved`].
pub fn select_chat_last_message<'a>(
    global: &'a GlobalState,
    chat_id: &str,
    list: ChatListType,
) -> Option<&'a Rc<Message>> {
    let ids = match list {
        ChatListType::Saved => &global.chats.last_message_ids.saved,
        ChatListType::Active | ChatListType::Archived => &global.chats.last_message_ids.all,
    };
    let message_id = ids.get(chat_id)?;

    global
        .messages
        .by_chat_id
        .get(chat_id)
        .and_then(|messages| messages.by_id.get(message_id))
}

pub fn select_notify_defaults(global: &GlobalState) -> &Rc<NotifyDefaults> {
    &global.settings.notify_defaults
}

pub fn select_notify_exception<'a>(
    global: &'a GlobalState,
    chat_id: &str,
) -> Option<&'a NotifyException> {
    global.chats.notify_exception_by_id.get(chat_id)
}

pub fn select_is_chat_muted(global: &GlobalState, chat: &Chat) -> bool {
    is_chat_muted(
        chat.chat_type.peer_type(),
        select_notify_defaults(global),
        select_notify_exception(global, &chat.id),
    )
}

pub fn select_is_chat_pinned(global: &GlobalState, chat_id: &str, list: ChatListType) -> bool {
    global
        .chats
        .ordered_pinned_ids
        .get(list)
        .as_ref()
        .is_some_and(|ids| ids.iter().any(|id| id == chat_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessages, ChatType, ChatsState, MessagesState};
    use std::collections::HashMap;

    #[test]
    fn test_last_message_uses_list_context() {
        let mut chats = ChatsState::default();
        chats.last_message_ids.all = Rc::new(HashMap::from([("c".to_string(), 2)]));
        chats.last_message_ids.saved = Rc::new(HashMap::from([("c".to_string(), 1)]));

        let mut messages = ChatMessages::default();
        for (id, date) in [(1, 100), (2, 200)] {
            messages.by_id.insert(
                id,
                Rc::new(Message {
                    id,
                    chat_id: "c".into(),
                    date,
                    is_outgoing: false,
                    text: String::new(),
                }),
            );
        }

        let global = GlobalState {
            chats: Rc::new(chats),
            messages: Rc::new(MessagesState {
                by_chat_id: Rc::new(HashMap::from([("c".to_string(), Rc::new(messages))])),
            }),
            ..Default::default()
        };

        let all = select_chat_last_message(&global, "c", ChatListType::Active).unwrap();
        let saved = select_chat_last_message(&global, "c", ChatListType::Saved).unwrap();
        assert_eq!(all.date, 200);
        assert_eq!(saved.date, 100);
        assert!(select_chat_last_message(&global, "missing", ChatListType::Active).is_none());
    }

    #[test]
    fn test_is_chat_muted_reads_exception() {
        let chat = Chat::new("g", ChatType::SuperGroup);
        let mut chats = ChatsState::default();
        chats.notify_exception_by_id = Rc::new(HashMap::from([(
            "g".to_string(),
            NotifyException {
                is_muted: Some(true),
                ..Default::default()
            },
        )]));
        let global = GlobalState {
            chats: Rc::new(chats),
            ..Default::default()
        };

        assert!(select_is_chat_muted(&global, &chat));
        assert!(!select_is_chat_muted(
            &GlobalState::default(),
            &Chat::new("g", ChatType::SuperGroup)
        ));
    }
}
