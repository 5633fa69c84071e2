pub mod chat;
pub mod folder;
pub mod message;
pub mod notify;
pub mod state;
pub mod user;

pub use chat::{Chat, ChatType, TopicsInfo};
pub use folder::{ChatFolder, FolderId};
pub use message::Message;
pub use notify::{NotifyDefaults, NotifyException, NotifySettings, PeerType};
pub use state::{
    ChatListType, ChatLists, ChatMessages, ChatsState, ChatFoldersState, GlobalState, IdList,
    LastMessageIds, MessagesState, SettingsState, UsersState,
};
pub use user::{User, UserType};
