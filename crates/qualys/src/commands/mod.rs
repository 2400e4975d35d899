//! Command dispatch: bridges CLI args -> registry calls -> output formatting.

pub mod about;
pub mod call;
pub mod config_cmd;
pub mod endpoints;
pub mod token;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::config::Session;
use crate::error::CliError;

/// Dispatch a network-bound command to its handler.
pub async fn dispatch(
    cmd: Command,
    session: &Session,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Call(args) => call::handle(session, args, global).await,
        Command::About => about::handle(session, global).await,
        Command::Token(args) => token::handle(session, &args, global).await,
        // Handled before a session is opened
        Command::Endpoints(_) | Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
