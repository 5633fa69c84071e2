use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub chat_id: String,
    /// Unix seconds
    pub date: i64,
    #[serde(default)]
    pub is_outgoing: bool,
    #[serde(default)]
    pub text: String,
}
