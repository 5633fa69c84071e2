//! Flattened views of folders and chats used by the folder engine.

use std::collections::HashSet;

use serde::Serialize;

use crate::constants::{
    ALL_FOLDER_ID, ARCHIVED_FOLDER_ID, SAVED_FOLDER_ID, SERVICE_NOTIFICATIONS_USER_ID,
};
use crate::models::notify::is_chat_muted;
use crate::models::{
    Chat, ChatFolder, ChatType, FolderId, Message, NotifyDefaults, NotifyException, TopicsInfo,
    User,
};

/// Rule set of a user-defined folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderRules {
    pub contacts: bool,
    pub non_contacts: bool,
    pub groups: bool,
    pub channels: bool,
    pub bots: bool,
    pub exclude_muted: bool,
    pub exclude_read: bool,
    pub exclude_archived: bool,
    pub excluded_chat_ids: HashSet<String>,
    pub included_chat_ids: HashSet<String>,
}

/// Membership source of a folder: an authoritative list or a rule set,
/// never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderMembership {
    List(HashSet<String>),
    Rules(FolderRules),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderSummary {
    pub id: FolderId,
    pub ordered_pinned_ids: Vec<String>,
    pub pinned_chat_ids: HashSet<String>,
    pub membership: FolderMembership,
}

impl FolderSummary {
    /// Summary of a meta-folder backed by a server-ordered list.
    pub fn from_list(id: FolderId, list_ids: &[String], pinned_ids: Option<&[String]>) -> Self {
        let ordered_pinned_ids = pinned_ids.map(<[String]>::to_vec).unwrap_or_default();
        Self {
            id,
            pinned_chat_ids: ordered_pinned_ids.iter().cloned().collect(),
            ordered_pinned_ids,
            membership: FolderMembership::List(list_ids.iter().cloned().collect()),
        }
    }

    pub fn from_folder(folder: &ChatFolder) -> Self {
        Self {
            id: folder.id,
            ordered_pinned_ids: folder.pinned_chat_ids.clone(),
            pinned_chat_ids: folder.pinned_chat_ids.iter().cloned().collect(),
            membership: FolderMembership::Rules(FolderRules {
                contacts: folder.contacts,
                non_contacts: folder.non_contacts,
                groups: folder.groups,
                channels: folder.channels,
                bots: folder.bots,
                exclude_muted: folder.exclude_muted,
                exclude_read: folder.exclude_read,
                exclude_archived: folder.exclude_archived,
                excluded_chat_ids: folder.excluded_chat_ids.iter().cloned().collect(),
                included_chat_ids: folder.included_chat_ids.iter().cloned().collect(),
            }),
        }
    }

    /// Whether the saved-dialogs ordering and listing apply.
    pub fn is_saved(&self) -> bool {
        self.id == SAVED_FOLDER_ID
    }
}

/// Everything the folder engine needs to know about one chat.
///
/// Holds plain values only, so two summaries built from the same inputs
/// compare equal and an unchanged rebuild can be detected with `==`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: String,
    pub chat_type: ChatType,
    /// Visible in the active/archived lists and eligible for user folders.
    pub is_listed: bool,
    /// Visible in the saved-dialogs list.
    pub is_listed_in_saved: bool,
    pub is_archived: bool,
    pub is_muted: bool,
    pub is_unread: bool,
    pub unread_count: u32,
    pub unread_mentions_count: u32,
    pub order: i64,
    pub saved_order: i64,
    pub is_user_bot: bool,
    pub is_user_contact: bool,
}

/// Inputs of one [`ChatSummary`].
pub struct ChatSummaryInputs<'a> {
    pub chat: &'a Chat,
    pub user: Option<&'a User>,
    pub topics_info: Option<&'a TopicsInfo>,
    pub last_message: Option<&'a Message>,
    pub last_saved_message: Option<&'a Message>,
    pub notify_defaults: &'a NotifyDefaults,
    pub notify_exception: Option<&'a NotifyException>,
    pub in_main_list: bool,
    pub in_saved_list: bool,
}

impl ChatSummary {
    pub fn build(inputs: &ChatSummaryInputs<'_>) -> Self {
        let chat = inputs.chat;
        let should_hide_service_chat =
            chat.id == SERVICE_NOTIFICATIONS_USER_ID && inputs.last_message.is_none();

        let unread_count = if chat.is_forum {
            inputs
                .topics_info
                .map(|info| info.unread_topics_count)
                .unwrap_or_else(|| chat.unread_count.unwrap_or(0))
        } else {
            chat.unread_count.unwrap_or(0)
        };
        let unread_mentions_count = chat.unread_mentions_count.unwrap_or(0);

        let order = [
            chat.creation_date.unwrap_or(0),
            chat.draft_date.unwrap_or(0),
            inputs.last_message.map_or(0, |message| message.date),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);

        let user = inputs.user.filter(|_| chat.chat_type.is_private());

        Self {
            id: chat.id.clone(),
            chat_type: chat.chat_type,
            is_listed: inputs.in_main_list
                && !chat.is_restricted
                && !chat.is_not_joined
                && chat.migrated_to.is_none()
                && !should_hide_service_chat,
            is_listed_in_saved: inputs.in_saved_list && !chat.is_restricted,
            is_archived: chat.is_archived(),
            is_muted: is_chat_muted(
                chat.chat_type.peer_type(),
                inputs.notify_defaults,
                inputs.notify_exception,
            ),
            is_unread: unread_count > 0 || unread_mentions_count > 0 || chat.has_unread_mark,
            unread_count,
            unread_mentions_count,
            order,
            saved_order: inputs.last_saved_message.map_or(0, |message| message.date),
            is_user_bot: user.is_some_and(User::is_bot),
            is_user_contact: user.is_some_and(|user| user.is_contact),
        }
    }

    /// Sort key within `folder`.
    pub fn order_in(&self, folder: &FolderSummary) -> i64 {
        if folder.is_saved() {
            self.saved_order
        } else {
            self.order
        }
    }
}

pub fn is_chat_in_folder(chat: &ChatSummary, folder: &FolderSummary) -> bool {
    let rules = match &folder.membership {
        FolderMembership::List(ids) => {
            let is_visible = match folder.id {
                ALL_FOLDER_ID => chat.is_listed && !chat.is_archived,
                ARCHIVED_FOLDER_ID => chat.is_listed && chat.is_archived,
                _ => chat.is_listed_in_saved,
            };
            return is_visible && ids.contains(&chat.id);
        }
        FolderMembership::Rules(rules) => rules,
    };

    if !chat.is_listed {
        return false;
    }

    if rules.excluded_chat_ids.contains(&chat.id) {
        return false;
    }
    if rules.included_chat_ids.contains(&chat.id) || folder.pinned_chat_ids.contains(&chat.id) {
        return true;
    }

    if rules.exclude_archived && chat.is_archived {
        return false;
    }
    if rules.exclude_read && !chat.is_unread {
        return false;
    }
    if rules.exclude_muted && chat.is_muted && chat.unread_mentions_count == 0 {
        return false;
    }

    match chat.chat_type {
        ChatType::Private | ChatType::Secret => {
            if chat.is_user_bot {
                rules.bots
            } else if chat.is_user_contact {
                rules.contacts
            } else {
                rules.non_contacts
            }
        }
        ChatType::Channel => rules.channels,
        ChatType::BasicGroup | ChatType::SuperGroup => rules.groups,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCounters {
    pub chats_count: u32,
    pub notifications_count: u32,
}

impl UnreadCounters {
    /// Add one chat. Mentions always notify; otherwise muted chats are silent
    /// and a manual unread mark counts as one notification.
    pub fn add(&mut self, chat: &ChatSummary) {
        if !chat.is_unread {
            return;
        }

        self.chats_count += 1;
        self.notifications_count += chat.unread_mentions_count;

        if !chat.is_muted {
            if chat.unread_count > 0 {
                self.notifications_count += chat.unread_count;
            } else if chat.unread_mentions_count == 0 {
                self.notifications_count += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserType;

    fn inputs<'a>(chat: &'a Chat, defaults: &'a NotifyDefaults) -> ChatSummaryInputs<'a> {
        ChatSummaryInputs {
            chat,
            user: None,
            topics_info: None,
            last_message: None,
            last_saved_message: None,
            notify_defaults: defaults,
            notify_exception: None,
            in_main_list: true,
            in_saved_list: false,
        }
    }

    fn rule_folder(configure: impl FnOnce(&mut ChatFolder)) -> FolderSummary {
        let mut folder = ChatFolder::new(2, "Test");
        configure(&mut folder);
        FolderSummary::from_folder(&folder)
    }

    fn summary(chat_type: ChatType, configure: impl FnOnce(&mut ChatSummary)) -> ChatSummary {
        let defaults = NotifyDefaults::default();
        let chat = Chat::new("c", chat_type);
        let mut summary = ChatSummary::build(&inputs(&chat, &defaults));
        configure(&mut summary);
        summary
    }

    #[test]
    fn test_summary_equality_for_equal_inputs() {
        let defaults = NotifyDefaults::default();
        let first = Chat::new("1", ChatType::Channel);
        let second = first.clone();

        assert_eq!(
            ChatSummary::build(&inputs(&first, &defaults)),
            ChatSummary::build(&inputs(&second, &defaults))
        );
    }

    #[test]
    fn test_order_is_latest_of_creation_draft_and_message() {
        let defaults = NotifyDefaults::default();
        let mut chat = Chat::new("1", ChatType::Private);
        chat.creation_date = Some(10);
        chat.draft_date = Some(30);
        let message = Message {
            id: 1,
            chat_id: "1".into(),
            date: 20,
            is_outgoing: false,
            text: String::new(),
        };

        let mut summary_inputs = inputs(&chat, &defaults);
        summary_inputs.last_message = Some(&message);
        summary_inputs.last_saved_message = Some(&message);
        let summary = ChatSummary::build(&summary_inputs);

        assert_eq!(summary.order, 30);
        assert_eq!(summary.saved_order, 20);
    }

    #[test]
    fn test_service_chat_hidden_without_message() {
        let defaults = NotifyDefaults::default();
        let chat = Chat::new(SERVICE_NOTIFICATIONS_USER_ID, ChatType::Private);
        assert!(!ChatSummary::build(&inputs(&chat, &defaults)).is_listed);

        let message = Message {
            id: 1,
            chat_id: chat.id.clone(),
            date: 1,
            is_outgoing: false,
            text: String::new(),
        };
        let mut with_message = inputs(&chat, &defaults);
        with_message.last_message = Some(&message);
        assert!(ChatSummary::build(&with_message).is_listed);
    }

    #[test]
    fn test_forum_uses_unread_topics() {
        let defaults = NotifyDefaults::default();
        let mut chat = Chat::new("f", ChatType::SuperGroup);
        chat.is_forum = true;
        chat.unread_count = Some(40);
        let topics = TopicsInfo {
            total_count: 5,
            unread_topics_count: 2,
        };

        let mut summary_inputs = inputs(&chat, &defaults);
        summary_inputs.topics_info = Some(&topics);
        assert_eq!(ChatSummary::build(&summary_inputs).unread_count, 2);
    }

    #[test]
    fn test_private_user_flags() {
        let defaults = NotifyDefaults::default();
        let chat = Chat::new("u", ChatType::Private);
        let mut bot = User::new("u");
        bot.user_type = UserType::Bot;

        let mut summary_inputs = inputs(&chat, &defaults);
        summary_inputs.user = Some(&bot);
        let summary = ChatSummary::build(&summary_inputs);
        assert!(summary.is_user_bot);
        assert!(!summary.is_user_contact);
    }

    #[test]
    fn test_rule_precedence() {
        let muted_channel = summary(ChatType::Channel, |chat| chat.is_muted = true);

        let folder = rule_folder(|folder| {
            folder.channels = true;
            folder.exclude_muted = true;
        });
        assert!(!is_chat_in_folder(&muted_channel, &folder));

        let included = rule_folder(|folder| {
            folder.exclude_muted = true;
            folder.included_chat_ids = vec!["c".into()];
        });
        assert!(is_chat_in_folder(&muted_channel, &included));

        let excluded_wins = rule_folder(|folder| {
            folder.channels = true;
            folder.included_chat_ids = vec!["c".into()];
            folder.excluded_chat_ids = vec!["c".into()];
        });
        assert!(!is_chat_in_folder(&muted_channel, &excluded_wins));

        let pinned = rule_folder(|folder| folder.pinned_chat_ids = vec!["c".into()]);
        assert!(is_chat_in_folder(&muted_channel, &pinned));
    }

    #[test]
    fn test_muted_chat_with_mentions_survives_exclude_muted() {
        let chat = summary(ChatType::BasicGroup, |chat| {
            chat.is_muted = true;
            chat.unread_mentions_count = 1;
            chat.is_unread = true;
        });
        let folder = rule_folder(|folder| {
            folder.groups = true;
            folder.exclude_muted = true;
        });
        assert!(is_chat_in_folder(&chat, &folder));
    }

    #[test]
    fn test_private_chat_categories() {
        let contacts = rule_folder(|folder| folder.contacts = true);
        let non_contacts = rule_folder(|folder| folder.non_contacts = true);
        let bots = rule_folder(|folder| folder.bots = true);

        let contact = summary(ChatType::Private, |chat| chat.is_user_contact = true);
        let stranger = summary(ChatType::Private, |_| {});
        let bot = summary(ChatType::Private, |chat| chat.is_user_bot = true);

        assert!(is_chat_in_folder(&contact, &contacts));
        assert!(!is_chat_in_folder(&contact, &non_contacts));
        assert!(is_chat_in_folder(&stranger, &non_contacts));
        assert!(is_chat_in_folder(&bot, &bots));
        assert!(!is_chat_in_folder(&bot, &non_contacts));
    }

    #[test]
    fn test_meta_list_respects_archive_flag() {
        let all = FolderSummary::from_list(ALL_FOLDER_ID, &["c".to_string()], None);
        let archived = FolderSummary::from_list(ARCHIVED_FOLDER_ID, &["c".to_string()], None);

        let active_chat = summary(ChatType::Private, |_| {});
        let archived_chat = summary(ChatType::Private, |chat| chat.is_archived = true);

        assert!(is_chat_in_folder(&active_chat, &all));
        assert!(!is_chat_in_folder(&active_chat, &archived));
        assert!(is_chat_in_folder(&archived_chat, &archived));
        assert!(!is_chat_in_folder(&archived_chat, &all));
    }

    #[test]
    fn test_unread_counters() {
        let mut counters = UnreadCounters::default();
        counters.add(&summary(ChatType::Private, |chat| {
            chat.is_unread = true;
            chat.unread_count = 3;
        }));
        assert_eq!(
            counters,
            UnreadCounters {
                chats_count: 1,
                notifications_count: 3
            }
        );

        let mut muted = UnreadCounters::default();
        muted.add(&summary(ChatType::Private, |chat| {
            chat.is_unread = true;
            chat.unread_count = 3;
            chat.is_muted = true;
        }));
        assert_eq!(
            muted,
            UnreadCounters {
                chats_count: 1,
                notifications_count: 0
            }
        );

        let mut marked = UnreadCounters::default();
        marked.add(&summary(ChatType::Private, |chat| chat.is_unread = true));
        assert_eq!(marked.notifications_count, 1);

        let mut mentions = UnreadCounters::default();
        mentions.add(&summary(ChatType::SuperGroup, |chat| {
            chat.is_unread = true;
            chat.is_muted = true;
            chat.unread_count = 10;
            chat.unread_mentions_count = 2;
        }));
        assert_eq!(mentions.notifications_count, 2);
    }
}
