mod deferred;
mod paths;

pub use deferred::{DeferredDeleteError, schedule_delete_on_reboot};
pub use paths::{AppPaths, AppPathsError};
