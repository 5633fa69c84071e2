use std::rc::Rc;

use super::GlobalAction;
use crate::models::{GlobalState, UsersState};

pub(super) fn upsert_users(global: &GlobalState, action: &GlobalAction) -> Option<GlobalState> {
    let GlobalAction::UpsertUsers { users } = action else {
        return None;
    };

    let mut by_id = None;
    for user in users {
        let unchanged = global
            .users
            .by_id
            .get(&user.id)
            .is_some_and(|current| **current == *user);
        if unchanged {
            continue;
        }

        by_id
            .get_or_insert_with(|| (*global.users.by_id).clone())
            .insert(user.id.clone(), Rc::new(user.clone()));
    }

    Some(GlobalState {
        users: Rc::new(UsersState {
            by_id: Rc::new(by_id?),
        }),
        ..global.clone()
    })
}
