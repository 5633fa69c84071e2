pub mod replay;
pub mod report;
pub mod scenario;
pub mod tracing_setup;

pub use replay::{inspect, replay, ReplayOptions};
pub use report::{same_results, FolderReport, FolderResults, Report};
pub use scenario::{load_actions, load_snapshot};
pub use tracing_setup::init_tracing;
