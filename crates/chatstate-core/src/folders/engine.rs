//! Incremental computation of folder lists and counters.
//!
//! [`FolderEngine::update`] compares the new state with the one seen on the
//! previous pass and only rebuilds what changed: folder summaries whose
//! definition or backing list changed, chat summaries whose inputs changed,
//! and the results of folders that gained, lost or reordered a member.
//! Running it once on a fresh engine is a full rebuild.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::summary::{
    is_chat_in_folder, ChatSummary, ChatSummaryInputs, FolderMembership, FolderSummary,
    UnreadCounters,
};
use crate::constants::{is_meta_folder, ALL_FOLDER_ID, ARCHIVED_FOLDER_ID, SAVED_FOLDER_ID};
use crate::models::{
    Chat, ChatListType, FolderId, GlobalState, IdList, Message, NotifyDefaults, NotifyException,
    TopicsInfo, User,
};
use crate::selectors::{select_chat_last_message, select_notify_exception};

pub type OrderedIds = Rc<Vec<String>>;
pub type ChatsCountByFolderId = Rc<HashMap<FolderId, usize>>;
pub type UnreadCountersByFolderId = Rc<HashMap<FolderId, UnreadCounters>>;

/// One published result of an update pass.
#[derive(Debug, Clone, PartialEq)]
pub enum FolderChange {
    /// New ordered ids of a folder. A deleted folder publishes an empty list.
    OrderedIds(FolderId, OrderedIds),
    ChatsCount(ChatsCountByFolderId),
    UnreadCounters(UnreadCountersByFolderId),
}

/// Inputs a chat summary was built from, compared by reference.
struct ChatDeps {
    chat: Rc<Chat>,
    user: Option<Rc<User>>,
    topics_info: Option<Rc<TopicsInfo>>,
    last_message: Option<Rc<Message>>,
    last_saved_message: Option<Rc<Message>>,
    notify_defaults: Rc<NotifyDefaults>,
    notify_exception: Option<NotifyException>,
    in_main_list: bool,
    in_saved_list: bool,
}

fn same_rc<T>(left: &Option<Rc<T>>, right: &Option<Rc<T>>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => Rc::ptr_eq(left, right),
        (None, None) => true,
        _ => false,
    }
}

impl ChatDeps {
    fn same_as(&self, other: &ChatDeps) -> bool {
        Rc::ptr_eq(&self.chat, &other.chat)
            && same_rc(&self.user, &other.user)
            && same_rc(&self.topics_info, &other.topics_info)
            && same_rc(&self.last_message, &other.last_message)
            && same_rc(&self.last_saved_message, &other.last_saved_message)
            && Rc::ptr_eq(&self.notify_defaults, &other.notify_defaults)
            && self.notify_exception == other.notify_exception
            && self.in_main_list == other.in_main_list
            && self.in_saved_list == other.in_saved_list
    }

    fn summary(&self) -> ChatSummary {
        ChatSummary::build(&ChatSummaryInputs {
            chat: &self.chat,
            user: self.user.as_deref(),
            topics_info: self.topics_info.as_deref(),
            last_message: self.last_message.as_deref(),
            last_saved_message: self.last_saved_message.as_deref(),
            notify_defaults: &self.notify_defaults,
            notify_exception: self.notify_exception.as_ref(),
            in_main_list: self.in_main_list,
            in_saved_list: self.in_saved_list,
        })
    }
}

#[derive(Default)]
pub struct FolderEngine {
    prev: Option<GlobalState>,
    folder_summaries: HashMap<FolderId, FolderSummary>,
    chat_summaries: HashMap<String, ChatSummary>,
    chat_deps: HashMap<String, ChatDeps>,
    folder_ids_by_chat_id: HashMap<String, Vec<FolderId>>,
    members_by_folder_id: HashMap<FolderId, HashSet<String>>,
    ordered_ids_by_folder_id: HashMap<FolderId, OrderedIds>,
    pinned_count_by_folder_id: HashMap<FolderId, usize>,
    chats_count_by_folder_id: ChatsCountByFolderId,
    unread_counters_by_folder_id: UnreadCountersByFolderId,
}

impl FolderEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every result from `global` in one pass.
    pub fn rebuild(global: &GlobalState) -> Self {
        let mut engine = Self::new();
        engine.update(global);
        engine
    }

    pub fn ordered_ids(&self, folder_id: FolderId) -> Option<OrderedIds> {
        self.ordered_ids_by_folder_id.get(&folder_id).cloned()
    }

    pub fn ordered_ids_by_folder_id(&self) -> &HashMap<FolderId, OrderedIds> {
        &self.ordered_ids_by_folder_id
    }

    pub fn pinned_count(&self, folder_id: FolderId) -> usize {
        self.pinned_count_by_folder_id
            .get(&folder_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn chats_count(&self) -> ChatsCountByFolderId {
        Rc::clone(&self.chats_count_by_folder_id)
    }

    pub fn unread_counters(&self) -> UnreadCountersByFolderId {
        Rc::clone(&self.unread_counters_by_folder_id)
    }

    pub fn order_key(&self, chat_id: &str) -> Option<i64> {
        self.chat_summaries.get(chat_id).map(|summary| summary.order)
    }

    pub fn chat_summary(&self, chat_id: &str) -> Option<&ChatSummary> {
        self.chat_summaries.get(chat_id)
    }

    /// Bring every result up to date with `global` and return what changed.
    pub fn update(&mut self, global: &GlobalState) -> Vec<FolderChange> {
        if let Some(prev) = &self.prev {
            if Rc::ptr_eq(&prev.chats, &global.chats)
                && Rc::ptr_eq(&prev.users, &global.users)
                && Rc::ptr_eq(&prev.messages, &global.messages)
                && Rc::ptr_eq(&prev.chat_folders, &global.chat_folders)
                && Rc::ptr_eq(&prev.settings, &global.settings)
            {
                return Vec::new();
            }
        }

        let mut affected: HashSet<FolderId> = HashSet::new();
        let mut patched: HashSet<FolderId> = HashSet::new();
        let mut changes = Vec::new();

        let (folders_changed, removed) = self.update_folders(global);
        let mut counters_changed = self.purge_folders(&removed, &mut changes);

        self.update_fully_loaded(global, &mut affected);
        self.update_chats(global, folders_changed, &mut affected, &mut patched);

        counters_changed |= self.update_results(&affected, &patched, &mut changes);
        if counters_changed {
            changes.push(FolderChange::ChatsCount(self.chats_count()));
            changes.push(FolderChange::UnreadCounters(self.unread_counters()));
        }

        tracing::debug!(
            "folder_manager: {} folders affected, {} changes",
            affected.len(),
            changes.len()
        );

        self.prev = Some(global.clone());
        changes
    }

    /// Refresh folder summaries. Returns whether any summary changed and the
    /// ids of folders that no longer exist.
    ///
    /// A rebuilt summary does not make its folder affected by itself: every
    /// chat is re-evaluated afterwards and marks the folders it lands in.
    fn update_folders(&mut self, global: &GlobalState) -> (bool, Vec<FolderId>) {
        let prev_chats = self.prev.as_ref().map(|prev| Rc::clone(&prev.chats));
        let prev_folders = self.prev.as_ref().map(|prev| Rc::clone(&prev.chat_folders));
        let mut removed = Vec::new();
        let mut changed = false;

        for list in ChatListType::ALL {
            let folder_id = list.folder_id();
            let ids = global.chats.list_ids.get(list);
            let pinned_ids = global.chats.ordered_pinned_ids.get(list);

            let unchanged = prev_chats.as_ref().is_some_and(|prev| {
                same_rc(prev.list_ids.get(list), ids)
                    && same_rc(prev.ordered_pinned_ids.get(list), pinned_ids)
            });
            if unchanged {
                continue;
            }

            match ids {
                Some(ids) => {
                    let summary = FolderSummary::from_list(
                        folder_id,
                        ids,
                        pinned_ids.as_ref().map(|pinned| pinned.as_slice()),
                    );
                    self.folder_summaries.insert(folder_id, summary);
                    changed = true;
                }
                None => {
                    if self.folder_summaries.remove(&folder_id).is_some() {
                        removed.push(folder_id);
                    }
                }
            }
        }

        let folders = &global.chat_folders.by_id;
        if prev_folders
            .as_ref()
            .is_some_and(|prev| Rc::ptr_eq(&prev.by_id, folders))
        {
            return (changed, removed);
        }

        for (folder_id, folder) in folders.iter() {
            if is_meta_folder(*folder_id) {
                continue;
            }

            let unchanged = prev_folders.as_ref().is_some_and(|prev| {
                prev.by_id
                    .get(folder_id)
                    .is_some_and(|prev_folder| Rc::ptr_eq(prev_folder, folder))
            });
            if unchanged {
                continue;
            }

            self.folder_summaries
                .insert(*folder_id, FolderSummary::from_folder(folder));
            changed = true;
        }

        let deleted: Vec<FolderId> = self
            .folder_summaries
            .keys()
            .copied()
            .filter(|folder_id| !is_meta_folder(*folder_id) && !folders.contains_key(folder_id))
            .collect();
        for folder_id in deleted {
            self.folder_summaries.remove(&folder_id);
            removed.push(folder_id);
        }

        (changed || !removed.is_empty(), removed)
    }

    /// Drop every result of `removed`. Returns whether any counter went away.
    fn purge_folders(&mut self, removed: &[FolderId], changes: &mut Vec<FolderChange>) -> bool {
        let mut counters_changed = false;

        for folder_id in removed {
            self.members_by_folder_id.remove(folder_id);
            self.pinned_count_by_folder_id.remove(folder_id);
            if self.ordered_ids_by_folder_id.remove(folder_id).is_some() {
                changes.push(FolderChange::OrderedIds(*folder_id, Rc::new(Vec::new())));
            }
            if self.chats_count_by_folder_id.contains_key(folder_id) {
                Rc::make_mut(&mut self.chats_count_by_folder_id).remove(folder_id);
                counters_changed = true;
            }
            if self.unread_counters_by_folder_id.contains_key(folder_id) {
                Rc::make_mut(&mut self.unread_counters_by_folder_id).remove(folder_id);
                counters_changed = true;
            }
            for folder_ids in self.folder_ids_by_chat_id.values_mut() {
                folder_ids.retain(|id| id != folder_id);
            }
            tracing::debug!("folder_manager: dropped folder {}", folder_id);
        }

        counters_changed
    }

    fn update_fully_loaded(&self, global: &GlobalState, affected: &mut HashSet<FolderId>) {
        let loaded = &global.chats.is_fully_loaded;

        if let Some(prev) = &self.prev {
            for list in ChatListType::ALL {
                if prev.chats.is_fully_loaded.get(list) != loaded.get(list) {
                    affected.insert(list.folder_id());
                }
            }
        }

        if loaded.active && loaded.archived {
            for folder_id in self.folder_summaries.keys() {
                if !self.ordered_ids_by_folder_id.contains_key(folder_id) {
                    affected.insert(*folder_id);
                }
            }
        }
    }

    fn update_chats(
        &mut self,
        global: &GlobalState,
        folders_changed: bool,
        affected: &mut HashSet<FolderId>,
        patched: &mut HashSet<FolderId>,
    ) {
        let mut candidates: HashSet<String> = self.chat_summaries.keys().cloned().collect();
        for list in ChatListType::ALL {
            if let Some(ids) = global.chats.list_ids.get(list) {
                candidates.extend(ids.iter().cloned());
            }
        }

        for chat_id in candidates {
            let Some(deps) = self.collect_deps(global, &chat_id) else {
                self.remove_chat(&chat_id, affected, patched);
                continue;
            };

            if !folders_changed
                && self
                    .chat_deps
                    .get(&chat_id)
                    .is_some_and(|prev| prev.same_as(&deps))
            {
                continue;
            }

            let summary = deps.summary();
            self.chat_deps.insert(chat_id.clone(), deps);

            if !folders_changed && self.chat_summaries.get(&chat_id) == Some(&summary) {
                continue;
            }

            let folder_ids = self.build_chat_folder_ids(&summary);
            self.chat_summaries.insert(chat_id.clone(), summary);
            self.update_lists_for_chat(&chat_id, folder_ids, affected, patched);
        }
    }

    /// Inputs of `chat_id`, or `None` when it is missing or in no list.
    fn collect_deps(&self, global: &GlobalState, chat_id: &str) -> Option<ChatDeps> {
        let chat = global.chats.by_id.get(chat_id)?;
        let in_list = |folder_id: FolderId| {
            self.folder_summaries
                .get(&folder_id)
                .is_some_and(|folder| match &folder.membership {
                    FolderMembership::List(ids) => ids.contains(chat_id),
                    FolderMembership::Rules(_) => false,
                })
        };

        let in_main_list = in_list(ALL_FOLDER_ID) || in_list(ARCHIVED_FOLDER_ID);
        let in_saved_list = in_list(SAVED_FOLDER_ID);
        if !in_main_list && !in_saved_list {
            return None;
        }

        let user = chat
            .chat_type
            .is_private()
            .then(|| global.users.by_id.get(chat_id).cloned())
            .flatten();

        Some(ChatDeps {
            chat: Rc::clone(chat),
            user,
            topics_info: global.chats.topics_info_by_id.get(chat_id).cloned(),
            last_message: select_chat_last_message(global, chat_id, ChatListType::Active).cloned(),
            last_saved_message: select_chat_last_message(global, chat_id, ChatListType::Saved)
                .cloned(),
            notify_defaults: Rc::clone(&global.settings.notify_defaults),
            notify_exception: select_notify_exception(global, chat_id).cloned(),
            in_main_list,
            in_saved_list,
        })
    }

    fn build_chat_folder_ids(&self, summary: &ChatSummary) -> Vec<FolderId> {
        let mut folder_ids: Vec<FolderId> = self
            .folder_summaries
            .values()
            .filter(|folder| is_chat_in_folder(summary, folder))
            .map(|folder| folder.id)
            .collect();
        folder_ids.sort_unstable();
        folder_ids
    }

    fn remove_chat(
        &mut self,
        chat_id: &str,
        affected: &mut HashSet<FolderId>,
        patched: &mut HashSet<FolderId>,
    ) {
        self.chat_summaries.remove(chat_id);
        self.chat_deps.remove(chat_id);
        self.update_lists_for_chat(chat_id, Vec::new(), affected, patched);
        self.folder_ids_by_chat_id.remove(chat_id);
    }

    /// Patch folder membership after `chat_id` moved to `folder_ids`. Every
    /// folder it is in or left must be materialized again.
    fn update_lists_for_chat(
        &mut self,
        chat_id: &str,
        folder_ids: Vec<FolderId>,
        affected: &mut HashSet<FolderId>,
        patched: &mut HashSet<FolderId>,
    ) {
        let prev_folder_ids = self
            .folder_ids_by_chat_id
            .get(chat_id)
            .cloned()
            .unwrap_or_default();

        for folder_id in &prev_folder_ids {
            if folder_ids.contains(folder_id) {
                continue;
            }
            if let Some(members) = self.members_by_folder_id.get_mut(folder_id) {
                members.remove(chat_id);
                patched.insert(*folder_id);
            }
            affected.insert(*folder_id);
        }

        for folder_id in &folder_ids {
            if !prev_folder_ids.contains(folder_id) {
                self.members_by_folder_id
                    .entry(*folder_id)
                    .or_default()
                    .insert(chat_id.to_string());
                patched.insert(*folder_id);
            }
            affected.insert(*folder_id);
        }

        if folder_ids.is_empty() {
            self.folder_ids_by_chat_id.remove(chat_id);
        } else {
            self.folder_ids_by_chat_id
                .insert(chat_id.to_string(), folder_ids);
        }
    }

    /// Materialize every affected folder. Ordered-id changes are appended to
    /// `changes`; returns whether any counter changed.
    fn update_results(
        &mut self,
        affected: &HashSet<FolderId>,
        patched: &HashSet<FolderId>,
        changes: &mut Vec<FolderChange>,
    ) -> bool {
        let mut counters_changed = false;
        let mut folder_ids: Vec<FolderId> = affected.iter().copied().collect();
        folder_ids.sort_unstable();

        for folder_id in folder_ids {
            let Some(folder) = self.folder_summaries.get(&folder_id) else {
                continue;
            };
            let members = self.members_by_folder_id.get(&folder_id);
            let (ordered_ids, pinned_count) = self.order_members(folder, members);

            let prev_ids = self.ordered_ids_by_folder_id.get(&folder_id);
            let is_changed = prev_ids.is_none()
                || self.pinned_count_by_folder_id.get(&folder_id) != Some(&pinned_count)
                || patched.contains(&folder_id)
                || prev_ids.is_some_and(|prev| **prev != ordered_ids);

            let counters = if folder.is_saved() {
                UnreadCounters::default()
            } else {
                let mut counters = UnreadCounters::default();
                for chat_id in &ordered_ids {
                    if let Some(summary) = self.chat_summaries.get(chat_id) {
                        counters.add(summary);
                    }
                }
                counters
            };
            let chats_count = ordered_ids.len();

            if is_changed {
                let ordered_ids: IdList = Rc::new(ordered_ids);
                self.ordered_ids_by_folder_id
                    .insert(folder_id, Rc::clone(&ordered_ids));
                self.pinned_count_by_folder_id.insert(folder_id, pinned_count);
                changes.push(FolderChange::OrderedIds(folder_id, ordered_ids));
            }

            if self.chats_count_by_folder_id.get(&folder_id) != Some(&chats_count) {
                Rc::make_mut(&mut self.chats_count_by_folder_id).insert(folder_id, chats_count);
                counters_changed = true;
            }
            if self.unread_counters_by_folder_id.get(&folder_id) != Some(&counters) {
                Rc::make_mut(&mut self.unread_counters_by_folder_id).insert(folder_id, counters);
                counters_changed = true;
            }
        }

        counters_changed
    }

    /// Pinned members in declared order, then the rest by recency descending
    /// with ties broken by id.
    fn order_members(
        &self,
        folder: &FolderSummary,
        members: Option<&HashSet<String>>,
    ) -> (Vec<String>, usize) {
        let Some(members) = members else {
            return (Vec::new(), 0);
        };

        let mut seen = HashSet::new();
        let mut ordered: Vec<String> = folder
            .ordered_pinned_ids
            .iter()
            .filter(|id| members.contains(*id) && seen.insert(id.as_str()))
            .cloned()
            .collect();
        let pinned_count = ordered.len();

        let mut rest: Vec<(i64, &String)> = members
            .iter()
            .filter(|id| !seen.contains(id.as_str()))
            .map(|id| {
                let key = self
                    .chat_summaries
                    .get(id)
                    .map_or(0, |summary| summary.order_in(folder));
                (key, id)
            })
            .collect();
        rest.sort_unstable_by_key(|(key, id)| (Reverse(*key), *id));
        ordered.extend(rest.into_iter().map(|(_, id)| id.clone()));

        (ordered, pinned_count)
    }
}
