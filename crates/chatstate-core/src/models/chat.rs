use serde::{Deserialize, Serialize};

use super::folder::FolderId;
use super::notify::PeerType;
use crate::constants::ARCHIVED_FOLDER_ID;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatType {
    #[serde(rename = "chatTypePrivate")]
    Private,
    #[serde(rename = "chatTypeSecret")]
    Secret,
    #[serde(rename = "chatTypeBasicGroup")]
    BasicGroup,
    #[serde(rename = "chatTypeSuperGroup")]
    SuperGroup,
    #[serde(rename = "chatTypeChannel")]
    Channel,
}

impl ChatType {
    pub fn is_private(self) -> bool {
        matches!(self, ChatType::Private | ChatType::Secret)
    }

    pub fn is_group(self) -> bool {
        matches!(self, ChatType::BasicGroup | ChatType::SuperGroup)
    }

    /// Which notification default applies to chats of this type.
    pub fn peer_type(self) -> PeerType {
        match self {
            ChatType::Private | ChatType::Secret => PeerType::Users,
            ChatType::BasicGroup | ChatType::SuperGroup => PeerType::Groups,
            ChatType::Channel => PeerType::Channels,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default)]
    pub is_not_joined: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<FolderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_mentions_count: Option<u32>,
    #[serde(default)]
    pub has_unread_mark: bool,
    #[serde(default)]
    pub is_forum: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_date: Option<i64>,
}

impl Chat {
    pub fn new(id: impl Into<String>, chat_type: ChatType) -> Self {
        Self {
            id: id.into(),
            chat_type,
            title: String::new(),
            is_restricted: false,
            is_not_joined: false,
            migrated_to: None,
            folder_id: None,
            unread_count: None,
            unread_mentions_count: None,
            has_unread_mark: false,
            is_forum: false,
            creation_date: None,
            draft_date: None,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.folder_id == Some(ARCHIVED_FOLDER_ID)
    }
}

/// Forum topic counters for one chat
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicsInfo {
    #[serde(default)]
    pub total_count: u32,
    #[serde(default)]
    pub unread_topics_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_deserializes_with_sparse_fields() {
        let chat: Chat = serde_json::from_str(
            r#"{"id":"-100","type":"chatTypeChannel","folderId":1,"unreadCount":4}"#,
        )
        .unwrap();

        assert_eq!(chat.chat_type, ChatType::Channel);
        assert!(chat.is_archived());
        assert_eq!(chat.unread_count, Some(4));
        assert_eq!(chat.unread_mentions_count, None);
        assert!(!chat.has_unread_mark);
    }

    #[test]
    fn test_peer_type_mapping() {
        assert_eq!(ChatType::Secret.peer_type(), PeerType::Users);
        assert_eq!(ChatType::SuperGroup.peer_type(), PeerType::Groups);
        assert_eq!(ChatType::Channel.peer_type(), PeerType::Channels);
        assert!(ChatType::BasicGroup.is_group());
        assert!(!ChatType::Channel.is_private());
    }
}
