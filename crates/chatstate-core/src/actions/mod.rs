//! State transitions of [`GlobalState`].
//!
//! [`GlobalAction`] is the closed set of transitions; [`install_handlers`]
//! registers one reducer per [`GlobalActionKind`]. Reducers never mutate:
//! every slice or map they touch is rebuilt, untouched ones are shared with
//! the previous state. A transition that references a missing chat or folder,
//! or changes nothing, commits nothing.

mod chats;
mod folders;
mod settings;
mod users;

use serde::{Deserialize, Serialize};

use crate::models::{
    Chat, ChatFolder, ChatListType, FolderId, GlobalState, Message, NotifyException,
    NotifySettings, PeerType, TopicsInfo, User,
};
use crate::store::{Action, ActionResult, Actions, Global, Store};

pub type GlobalStore = Store<GlobalState, GlobalAction>;
pub type GlobalActions = Actions<GlobalState, GlobalAction>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GlobalAction {
    /// Sign-out: drop everything.
    Reset,
    #[serde(rename_all = "camelCase")]
    SetChatList {
        list: ChatListType,
        ids: Vec<String>,
        #[serde(default)]
        pinned_ids: Option<Vec<String>>,
        #[serde(default)]
        is_fully_loaded: Option<bool>,
    },
    UpsertChats {
        chats: Vec<Chat>,
    },
    #[serde(rename_all = "camelCase")]
    DeleteChat {
        chat_id: String,
    },
    #[serde(rename_all = "camelCase")]
    UpdateChatUnread {
        chat_id: String,
        unread_count: Option<u32>,
        unread_mentions_count: Option<u32>,
    },
    #[serde(rename_all = "camelCase")]
    MarkChatRead {
        chat_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ToggleChatUnread {
        chat_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ToggleChatArchived {
        chat_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ToggleChatPinned {
        chat_id: String,
        list: ChatListType,
    },
    #[serde(rename_all = "camelCase")]
    SetDraftDate {
        chat_id: String,
        date: Option<i64>,
    },
    NewMessage {
        message: Message,
    },
    UpsertUsers {
        users: Vec<User>,
    },
    UpsertChatFolder {
        folder: ChatFolder,
    },
    #[serde(rename_all = "camelCase")]
    DeleteChatFolder {
        folder_id: FolderId,
    },
    #[serde(rename_all = "camelCase")]
    UpdateNotifyDefaults {
        peer_type: PeerType,
        settings: NotifySettings,
    },
    #[serde(rename_all = "camelCase")]
    UpdateNotifyException {
        chat_id: String,
        exception: Option<NotifyException>,
    },
    #[serde(rename_all = "camelCase")]
    UpdateTopicsInfo {
        chat_id: String,
        info: TopicsInfo,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalActionKind {
    Reset,
    SetChatList,
    UpsertChats,
    DeleteChat,
    UpdateChatUnread,
    MarkChatRead,
    ToggleChatUnread,
    ToggleChatArchived,
    ToggleChatPinned,
    SetDraftDate,
    NewMessage,
    UpsertUsers,
    UpsertChatFolder,
    DeleteChatFolder,
    UpdateNotifyDefaults,
    UpdateNotifyException,
    UpdateTopicsInfo,
}

impl GlobalActionKind {
    pub const ALL: [GlobalActionKind; 17] = [
        GlobalActionKind::Reset,
        GlobalActionKind::SetChatList,
        GlobalActionKind::UpsertChats,
        GlobalActionKind::DeleteChat,
        GlobalActionKind::UpdateChatUnread,
        GlobalActionKind::MarkChatRead,
        GlobalActionKind::ToggleChatUnread,
        GlobalActionKind::ToggleChatArchived,
        GlobalActionKind::ToggleChatPinned,
        GlobalActionKind::SetDraftDate,
        GlobalActionKind::NewMessage,
        GlobalActionKind::UpsertUsers,
        GlobalActionKind::UpsertChatFolder,
        GlobalActionKind::DeleteChatFolder,
        GlobalActionKind::UpdateNotifyDefaults,
        GlobalActionKind::UpdateNotifyException,
        GlobalActionKind::UpdateTopicsInfo,
    ];
}

impl Action for GlobalAction {
    type Kind = GlobalActionKind;

    fn kind(&self) -> GlobalActionKind {
        match self {
            GlobalAction::Reset => GlobalActionKind::Reset,
            GlobalAction::SetChatList { .. } => GlobalActionKind::SetChatList,
            GlobalAction::UpsertChats { .. } => GlobalActionKind::UpsertChats,
            GlobalAction::DeleteChat { .. } => GlobalActionKind::DeleteChat,
            GlobalAction::UpdateChatUnread { .. } => GlobalActionKind::UpdateChatUnread,
            GlobalAction::MarkChatRead { .. } => GlobalActionKind::MarkChatRead,
            GlobalAction::ToggleChatUnread { .. } => GlobalActionKind::ToggleChatUnread,
            GlobalAction::ToggleChatArchived { .. } => GlobalActionKind::ToggleChatArchived,
            GlobalAction::ToggleChatPinned { .. } => GlobalActionKind::ToggleChatPinned,
            GlobalAction::SetDraftDate { .. } => GlobalActionKind::SetDraftDate,
            GlobalAction::NewMessage { .. } => GlobalActionKind::NewMessage,
            GlobalAction::UpsertUsers { .. } => GlobalActionKind::UpsertUsers,
            GlobalAction::UpsertChatFolder { .. } => GlobalActionKind::UpsertChatFolder,
            GlobalAction::DeleteChatFolder { .. } => GlobalActionKind::DeleteChatFolder,
            GlobalAction::UpdateNotifyDefaults { .. } => GlobalActionKind::UpdateNotifyDefaults,
            GlobalAction::UpdateNotifyException { .. } => GlobalActionKind::UpdateNotifyException,
            GlobalAction::UpdateTopicsInfo { .. } => GlobalActionKind::UpdateTopicsInfo,
        }
    }
}

/// Reducer: the next state, or `None` when the action changes nothing.
type Reducer = fn(&GlobalState, &GlobalAction) -> Option<GlobalState>;

fn reducer_for(kind: GlobalActionKind) -> Reducer {
    match kind {
        GlobalActionKind::Reset => reset,
        GlobalActionKind::SetChatList => chats::set_chat_list,
        GlobalActionKind::UpsertChats => chats::upsert_chats,
        GlobalActionKind::DeleteChat => chats::delete_chat,
        GlobalActionKind::UpdateChatUnread => chats::update_chat_unread,
        GlobalActionKind::MarkChatRead => chats::mark_chat_read,
        GlobalActionKind::ToggleChatUnread => chats::toggle_chat_unread,
        GlobalActionKind::ToggleChatArchived => chats::toggle_chat_archived,
        GlobalActionKind::ToggleChatPinned => chats::toggle_chat_pinned,
        GlobalActionKind::SetDraftDate => chats::set_draft_date,
        GlobalActionKind::NewMessage => chats::new_message,
        GlobalActionKind::UpsertUsers => users::upsert_users,
        GlobalActionKind::UpsertChatFolder => folders::upsert_chat_folder,
        GlobalActionKind::DeleteChatFolder => folders::delete_chat_folder,
        GlobalActionKind::UpdateNotifyDefaults => settings::update_notify_defaults,
        GlobalActionKind::UpdateNotifyException => settings::update_notify_exception,
        GlobalActionKind::UpdateTopicsInfo => chats::update_topics_info,
    }
}

fn reset(_global: &GlobalState, _action: &GlobalAction) -> Option<GlobalState> {
    Some(GlobalState::default())
}

/// Register the reducer of every action kind on `store`.
pub fn install_handlers(store: &GlobalStore) {
    for kind in GlobalActionKind::ALL {
        let reducer = reducer_for(kind);
        store.add_action_handler(
            kind,
            move |global: &Global<GlobalState>, _actions: &GlobalActions, action: &GlobalAction| {
                match reducer(global, action) {
                    Some(next) => ActionResult::Commit(global.derive(next)),
                    None => ActionResult::None,
                }
            },
        );
    }
}
