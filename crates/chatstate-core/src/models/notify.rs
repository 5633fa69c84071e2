use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PeerType {
    Users,
    Groups,
    Channels,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifySettings {
    pub is_muted: bool,
    pub show_previews: bool,
    pub is_silent: bool,
}

/// Notification defaults per peer type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifyDefaults {
    pub users: NotifySettings,
    pub groups: NotifySettings,
    pub channels: NotifySettings,
}

impl NotifyDefaults {
    pub fn get(&self, peer_type: PeerType) -> &NotifySettings {
        match peer_type {
            PeerType::Users => &self.users,
            PeerType::Groups => &self.groups,
            PeerType::Channels => &self.channels,
        }
    }

    pub fn get_mut(&mut self, peer_type: PeerType) -> &mut NotifySettings {
        match peer_type {
            PeerType::Users => &mut self.users,
            PeerType::Groups => &mut self.groups,
            PeerType::Channels => &mut self.channels,
        }
    }
}

/// Per-chat override. Unset fields defer to the peer-type default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifyException {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_previews: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_silent: Option<bool>,
}

pub fn is_chat_muted(
    peer_type: PeerType,
    defaults: &NotifyDefaults,
    exception: Option<&NotifyException>,
) -> bool {
    exception
        .and_then(|exception| exception.is_muted)
        .unwrap_or_else(|| defaults.get(peer_type).is_muted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_overrides_default() {
        let mut defaults = NotifyDefaults::default();
        defaults.channels.is_muted = true;

        assert!(is_chat_muted(PeerType::Channels, &defaults, None));
        assert!(!is_chat_muted(PeerType::Groups, &defaults, None));

        let unmute = NotifyException {
            is_muted: Some(false),
            ..Default::default()
        };
        assert!(!is_chat_muted(PeerType::Channels, &defaults, Some(&unmute)));

        let empty = NotifyException::default();
        assert!(is_chat_muted(PeerType::Channels, &defaults, Some(&empty)));
    }
}
