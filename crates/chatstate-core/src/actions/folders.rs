use std::rc::Rc;

use super::GlobalAction;
use crate::models::{ChatFoldersState, GlobalState};

pub(super) fn upsert_chat_folder(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::UpsertChatFolder { folder } = action else {
        return None;
    };

    let current = &global.chat_folders;
    if current
        .by_id
        .get(&folder.id)
        .is_some_and(|existing| **existing == *folder)
    {
        return None;
    }

    let is_new = !current.by_id.contains_key(&folder.id);
    let mut by_id = (*current.by_id).clone();
    by_id.insert(folder.id, Rc::new(folder.clone()));

    let ordered_ids = if is_new {
        let mut ids = current
            .ordered_ids
            .as_deref()
            .cloned()
            .unwrap_or_default();
        ids.push(folder.id);
        Some(Rc::new(ids))
    } else {
        current.ordered_ids.clone()
    };

    Some(GlobalState {
        chat_folders: Rc::new(ChatFoldersState {
            by_id: Rc::new(by_id),
            ordered_ids,
        }),
        ..global.clone()
    })
}

pub(super) fn delete_chat_folder(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::DeleteChatFolder { folder_id } = action else {
        return None;
    };

    let current = &global.chat_folders;
    if !current.by_id.contains_key(folder_id) {
        return None;
    }

    let mut by_id = (*current.by_id).clone();
    by_id.remove(folder_id);

    let ordered_ids = current.ordered_ids.as_ref().map(|ids| {
        Rc::new(
            ids.iter()
                .copied()
                .filter(|id| id != folder_id)
                .collect::<Vec<_>>(),
        )
    });

    Some(GlobalState {
        chat_folders: Rc::new(ChatFoldersState {
            by_id: Rc::new(by_id),
            ordered_ids,
        }),
        ..global.clone()
    })
}
