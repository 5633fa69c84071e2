use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use uuid::Uuid;

/// A state snapshot as handed out by the store.
///
/// With debug checks enabled, [`Store::get_global`](super::Store::get_global)
/// tags the snapshot with a random id. A successor built with
/// [`Global::derive`] inherits the tag, and committing it fails once another
/// snapshot has been read or committed in between.
pub struct Global<S> {
    state: Rc<S>,
    captured_id: Option<Uuid>,
}

impl<S> Clone for Global<S> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            captured_id: self.captured_id,
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Global<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Global")
            .field("captured_id", &self.captured_id)
            .field("state", &self.state)
            .finish()
    }
}

impl<S> Deref for Global<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.state
    }
}

impl<S> Global<S> {
    /// Untagged snapshot.
    pub fn new(state: S) -> Self {
        Self::from_rc(Rc::new(state))
    }

    pub fn from_rc(state: Rc<S>) -> Self {
        Self {
            state,
            captured_id: None,
        }
    }

    pub(crate) fn captured(state: Rc<S>, captured_id: Uuid) -> Self {
        Self {
            state,
            captured_id: Some(captured_id),
        }
    }

    pub fn state(&self) -> &Rc<S> {
        &self.state
    }

    pub fn into_rc(self) -> Rc<S> {
        self.state
    }

    pub fn captured_id(&self) -> Option<Uuid> {
        self.captured_id
    }

    /// Successor snapshot carrying this snapshot's tag.
    pub fn derive(&self, next: S) -> Self {
        Self {
            state: Rc::new(next),
            captured_id: self.captured_id,
        }
    }

    pub fn ptr_eq(&self, other: &Global<S>) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("attempt to set an outdated global (captured {captured}, current {current:?})")]
    StaleWrite {
        captured: Uuid,
        current: Option<Uuid>,
    },

    #[error("dispatch dropped before completion")]
    Cancelled,
}

/// Delivery options for a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Run the next notification pass even while a heavy animation is in flight.
    pub force_on_heavy_animation: bool,
    /// Run the notification pass synchronously instead of at tick end.
    pub force_sync: bool,
    /// Skip the immediate callbacks for this commit.
    pub no_update: bool,
}

impl SetOptions {
    pub fn forced() -> Self {
        Self {
            force_on_heavy_animation: true,
            ..Default::default()
        }
    }

    pub fn sync() -> Self {
        Self {
            force_sync: true,
            ..Default::default()
        }
    }

    pub fn silent() -> Self {
        Self {
            no_update: true,
            ..Default::default()
        }
    }
}
