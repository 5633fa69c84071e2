pub mod actions;
pub mod animation;
pub mod callbacks;
pub mod config;
pub mod constants;
pub mod folders;
pub mod models;
pub mod scheduler;
pub mod selectors;
pub mod signal;
pub mod store;

pub use actions::{install_handlers, GlobalAction, GlobalActionKind, GlobalActions, GlobalStore};
pub use animation::{HeavyAnimationEnd, HeavyAnimationGate};
pub use callbacks::{CallbackId, CallbackManager, Unsubscribe};
pub use config::CoreConfig;
pub use folders::{FolderManager, UnreadCounters};
pub use models::GlobalState;
pub use scheduler::{ManualScheduler, Scheduler, SharedScheduler, TokioScheduler};
pub use signal::{cleanup_effect, create_signal, Effect, Signal, SignalSetter};
pub use store::{ActionResult, Global, SetOptions, Store, StoreError};
