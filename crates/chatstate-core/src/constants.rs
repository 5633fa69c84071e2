//! Application-wide constants
//!
//! Folder ids of the built-in meta-folders and tuning values shared by the
//! store and the folder manager.

use crate::models::FolderId;

/// Main chat list
pub const ALL_FOLDER_ID: FolderId = 0;
/// Archived chats
pub const ARCHIVED_FOLDER_ID: FolderId = 1;
/// Saved-messages dialogs
pub const SAVED_FOLDER_ID: FolderId = -1;

/// The three folders whose membership comes straight from the chat lists
pub const META_FOLDER_IDS: [FolderId; 3] = [ALL_FOLDER_ID, ARCHIVED_FOLDER_ID, SAVED_FOLDER_ID];

/// Service notifications chat, hidden from the lists until it has a message
pub const SERVICE_NOTIFICATIONS_USER_ID: &str = "777000";

// Scheduling defaults (milliseconds)
pub const FOLDER_UPDATE_THROTTLE_MS: u64 = 500;
pub const SLOW_FOLDER_UPDATE_MS: u64 = 6;
pub const SLOW_CONTAINERS_UPDATE_MS: u64 = 7;
pub const DEFAULT_HEAVY_ANIMATION_TIMEOUT_MS: u64 = 1000;

pub fn is_meta_folder(folder_id: FolderId) -> bool {
    META_FOLDER_IDS.contains(&folder_id)
}
