mod config;
mod context;
mod editor;
mod log_store;
mod logging;
mod notifier;
mod watch;

pub use config::*;
pub use context::*;
pub use editor::*;
pub use log_store::*;
pub use logging::*;
pub use notifier::*;
pub use watch::*;
