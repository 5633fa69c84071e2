use std::collections::{BTreeMap, HashMap};

use chatstate_core::constants::{is_meta_folder, ALL_FOLDER_ID, ARCHIVED_FOLDER_ID, SAVED_FOLDER_ID};
use chatstate_core::folders::{
    ChatsCountByFolderId, FolderEngine, OrderedIds, UnreadCountersByFolderId,
};
use chatstate_core::models::FolderId;
use chatstate_core::{FolderManager, GlobalState, UnreadCounters};
use serde::Serialize;

/// Read access to materialized folder results.
pub trait FolderResults {
    fn ordered_ids(&self, folder_id: FolderId) -> Option<OrderedIds>;
    fn pinned_count(&self, folder_id: FolderId) -> usize;
    fn chats_count(&self) -> ChatsCountByFolderId;
    fn unread_counters(&self) -> UnreadCountersByFolderId;
}

impl FolderResults for FolderEngine {
    fn ordered_ids(&self, folder_id: FolderId) -> Option<OrderedIds> {
        FolderEngine::ordered_ids(self, folder_id)
    }

    fn pinned_count(&self, folder_id: FolderId) -> usize {
        FolderEngine::pinned_count(self, folder_id)
    }

    fn chats_count(&self) -> ChatsCountByFolderId {
        FolderEngine::chats_count(self)
    }

    fn unread_counters(&self) -> UnreadCountersByFolderId {
        FolderEngine::unread_counters(self)
    }
}

impl FolderResults for FolderManager {
    fn ordered_ids(&self, folder_id: FolderId) -> Option<OrderedIds> {
        self.get_ordered_ids(folder_id)
    }

    fn pinned_count(&self, folder_id: FolderId) -> usize {
        self.get_pinned_chats_count(folder_id)
    }

    fn chats_count(&self) -> ChatsCountByFolderId {
        self.get_chats_count()
    }

    fn unread_counters(&self) -> UnreadCountersByFolderId {
        self.get_unread_counters()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderReport {
    pub id: FolderId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordered_ids: Option<Vec<String>>,
    pub pinned_count: usize,
    pub chats_count: usize,
    pub unread: UnreadCounters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub actions_applied: usize,
    pub all_notifications_count: u32,
    pub folders: Vec<FolderReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches_full_rebuild: Option<bool>,
}

impl Report {
    pub fn collect(
        results: &impl FolderResults,
        state: &GlobalState,
        actions_applied: usize,
    ) -> Self {
        let chats_count = results.chats_count();
        let unread_counters = results.unread_counters();

        let folders = folder_titles(state)
            .into_iter()
            .map(|(id, title)| FolderReport {
                id,
                title,
                ordered_ids: results.ordered_ids(id).map(|ids| ids.to_vec()),
                pinned_count: results.pinned_count(id),
                chats_count: chats_count.get(&id).copied().unwrap_or(0),
                unread: unread_counters.get(&id).copied().unwrap_or_default(),
            })
            .collect();

        Self {
            actions_applied,
            all_notifications_count: unread_counters
                .get(&ALL_FOLDER_ID)
                .map_or(0, |counters| counters.notifications_count),
            folders,
            matches_full_rebuild: None,
        }
    }

    pub fn folder(&self, folder_id: FolderId) -> Option<&FolderReport> {
        self.folders.iter().find(|folder| folder.id == folder_id)
    }
}

/// Meta-folders first, then user folders in their declared order. Folders
/// missing from the declared order follow by id.
fn folder_titles(state: &GlobalState) -> Vec<(FolderId, String)> {
    let mut titles = vec![
        (ALL_FOLDER_ID, "All".to_string()),
        (ARCHIVED_FOLDER_ID, "Archived".to_string()),
        (SAVED_FOLDER_ID, "Saved".to_string()),
    ];

    let folders = &state.chat_folders.by_id;
    let mut remaining: BTreeMap<FolderId, String> = folders
        .iter()
        .filter(|(id, _)| !is_meta_folder(**id))
        .map(|(id, folder)| (*id, folder.title.clone()))
        .collect();

    if let Some(ordered_ids) = &state.chat_folders.ordered_ids {
        for id in ordered_ids.iter() {
            if let Some(title) = remaining.remove(id) {
                titles.push((*id, title));
            }
        }
    }
    titles.extend(remaining);

    titles
}

/// Whether two result sets agree on every folder's ordered ids and counters.
/// Folders without a result compare equal to empty ones.
pub fn same_results(
    left: &impl FolderResults,
    right: &impl FolderResults,
    state: &GlobalState,
) -> bool {
    let ids: Vec<FolderId> = folder_titles(state).into_iter().map(|(id, _)| id).collect();
    let non_empty = |map: &HashMap<FolderId, usize>| -> BTreeMap<FolderId, usize> {
        map.iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, count)| (*id, *count))
            .collect()
    };
    let unread = |map: &HashMap<FolderId, UnreadCounters>| -> BTreeMap<FolderId, UnreadCounters> {
        map.iter()
            .filter(|(_, counters)| **counters != UnreadCounters::default())
            .map(|(id, counters)| (*id, *counters))
            .collect()
    };

    ids.iter().all(|id| {
        left.ordered_ids(*id).map(|ids| ids.to_vec()).unwrap_or_default()
            == right.ordered_ids(*id).map(|ids| ids.to_vec()).unwrap_or_default()
            && left.pinned_count(*id) == right.pinned_count(*id)
    }) && non_empty(&left.chats_count()) == non_empty(&right.chats_count())
        && unread(&left.unread_counters()) == unread(&right.unread_counters())
}
