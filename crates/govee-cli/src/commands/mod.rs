//! Command implementations for the CLI.

mod history;
mod info;
mod scan;
mod set;
mod status;

pub use history::{HistoryArgs, cmd_history};
pub use info::cmd_info;
pub use scan::{cmd_measure, cmd_scan};
pub use set::cmd_set;
pub use status::cmd_status;
