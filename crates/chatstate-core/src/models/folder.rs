use serde::{Deserialize, Serialize};

pub type FolderId = i32;

/// User-defined chat folder: inclusion rules plus explicit chat lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatFolder {
    pub id: FolderId,
    pub title: String,
    pub pinned_chat_ids: Vec<String>,
    pub excluded_chat_ids: Vec<String>,
    pub included_chat_ids: Vec<String>,
    pub contacts: bool,
    pub non_contacts: bool,
    pub groups: bool,
    pub channels: bool,
    pub bots: bool,
    pub exclude_muted: bool,
    pub exclude_read: bool,
    pub exclude_archived: bool,
}

impl ChatFolder {
    pub fn new(id: FolderId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Default::default()
        }
    }
}
