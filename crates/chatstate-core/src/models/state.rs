use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::chat::{Chat, TopicsInfo};
use super::folder::{ChatFolder, FolderId};
use super::message::Message;
use super::notify::{NotifyDefaults, NotifyException};
use super::user::User;
use crate::constants::{ALL_FOLDER_ID, ARCHIVED_FOLDER_ID, SAVED_FOLDER_ID};

/// Ordered chat ids shared between state snapshots.
pub type IdList = Rc<Vec<String>>;

/// The three server-ordered chat lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatListType {
    Active,
    Archived,
    Saved,
}

impl ChatListType {
    pub const ALL: [ChatListType; 3] = [
        ChatListType::Active,
        ChatListType::Archived,
        ChatListType::Saved,
    ];

    /// Meta-folder backed by this list.
    pub fn folder_id(self) -> FolderId {
        match self {
            ChatListType::Active => ALL_FOLDER_ID,
            ChatListType::Archived => ARCHIVED_FOLDER_ID,
            ChatListType::Saved => SAVED_FOLDER_ID,
        }
    }

    pub fn from_folder_id(folder_id: FolderId) -> Option<Self> {
        Self::ALL.into_iter().find(|list| list.folder_id() == folder_id)
    }
}

/// One value per [`ChatListType`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatLists<T> {
    #[serde(default)]
    pub active: T,
    #[serde(default)]
    pub archived: T,
    #[serde(default)]
    pub saved: T,
}

impl<T> ChatLists<T> {
    pub fn get(&self, list: ChatListType) -> &T {
        match list {
            ChatListType::Active => &self.active,
            ChatListType::Archived => &self.archived,
            ChatListType::Saved => &self.saved,
        }
    }

    pub fn get_mut(&mut self, list: ChatListType) -> &mut T {
        match list {
            ChatListType::Active => &mut self.active,
            ChatListType::Archived => &mut self.archived,
            ChatListType::Saved => &mut self.saved,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LastMessageIds {
    pub all: Rc<HashMap<String, i64>>,
    pub saved: Rc<HashMap<String, i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatsState {
    pub by_id: Rc<HashMap<String, Rc<Chat>>>,
    pub list_ids: ChatLists<Option<IdList>>,
    pub ordered_pinned_ids: ChatLists<Option<IdList>>,
    pub is_fully_loaded: ChatLists<bool>,
    pub last_message_ids: LastMessageIds,
    pub topics_info_by_id: Rc<HashMap<String, Rc<TopicsInfo>>>,
    pub notify_exception_by_id: Rc<HashMap<String, NotifyException>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsersState {
    pub by_id: Rc<HashMap<String, Rc<User>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatMessages {
    pub by_id: HashMap<i64, Rc<Message>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagesState {
    pub by_chat_id: Rc<HashMap<String, Rc<ChatMessages>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatFoldersState {
    pub by_id: Rc<HashMap<FolderId, Rc<ChatFolder>>>,
    pub ordered_ids: Option<Rc<Vec<FolderId>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsState {
    pub notify_defaults: Rc<NotifyDefaults>,
}

/// Whole application state. Never mutated in place: every transition builds
/// a new value that shares untouched slices with the previous one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalState {
    pub chats: Rc<ChatsState>,
    pub users: Rc<UsersState>,
    pub messages: Rc<MessagesState>,
    pub chat_folders: Rc<ChatFoldersState>,
    pub settings: Rc<SettingsState>,
}
