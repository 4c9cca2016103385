/// CLI argument parsing and command handling - Gateway
mod args;
mod commands;

pub use args::{AnalyzeArgs, Cli, Commands, ConfigAction, SetArgs};
pub use commands::{already_reported, handle_command, list_models};
