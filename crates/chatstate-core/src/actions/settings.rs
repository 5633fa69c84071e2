use std::rc::Rc;

use super::GlobalAction;
use crate::models::{ChatsState, GlobalState, SettingsState};

pub(super) fn update_notify_defaults(
    global: &GlobalState,
    action: &GlobalAction,
) -> Option<GlobalState> {
    let GlobalAction::UpdateNotifyDefaults {
        peer_type,
        settings,
    } = action
    else {
        return None;
    };

    if global.settings.notify_defaults.get(*peer_type) == settings {
        return None;
    }

    let mut defaults = (*global.settings.notify_defaults).clone();
    *defaults.get_mut(*peer_type) = settings.clone();

    Some(GlobalState {
        settings: Rc::new(SettingsState {
            notify_defaults: Rc::new(defaults),
        }),
        ..global.clone()
    })
}

/// Sets or, with `None`, clears the per-chat notification override.
pub(super) fn update_notify_exception(
    global: &GlobalState,
    action: &GlobalAction,
) -> Option<GlobalState> {
    let GlobalAction::UpdateNotifyException { chat_id, exception } = action else {
        return None;
    };

    let current = global.chats.notify_exception_by_id.get(chat_id);
    if current == exception.as_ref() {
        return None;
    }

    let mut exceptions = (*global.chats.notify_exception_by_id).clone();
    match exception {
        Some(exception) => {
            exceptions.insert(chat_id.clone(), exception.clone());
        }
        None => {
            exceptions.remove(chat_id);
        }
    }

    Some(GlobalState {
        chats: Rc::new(ChatsState {
            notify_exception_by_id: Rc::new(exceptions),
            ..(*global.chats).clone()
        }),
        ..global.clone()
    })
}
