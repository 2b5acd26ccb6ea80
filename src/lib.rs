//! sortling - a file triage utility
//!
//! This library lets a user walk through the files of a source folder, assign
//! each one to a destination folder, and commit all assignments as bulk moves.
//! Every assignment change can be undone and redone, the listing can be
//! filtered by a regex over file names, settings persist between runs, and
//! plugins can extend the shell with their own actions.

pub mod assignment;
pub mod cli;
pub mod command;
pub mod config;
pub mod history;
pub mod logging;
pub mod output;
pub mod plugin;
pub mod plugins;
pub mod preview;
pub mod session;

pub use assignment::{ApplyReport, AssignmentError, AssignmentStore, MovedFile};
pub use command::TriageCommand;
pub use config::{ConfigError, ConfigStore, CoreConfig};
pub use history::{ActionHistory, Command};
pub use plugin::{Plugin, PluginError, PluginHost, PluginRegistry};
pub use session::{HostContext, Panel, Session, SessionEvent};

pub use cli::{Args, run_cli};
