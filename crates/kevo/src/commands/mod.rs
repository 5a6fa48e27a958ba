//! Command dispatch: bridges CLI args -> portal calls -> output formatting.

pub mod config_cmd;
pub mod locks;
pub mod watch;

use kevo_api::KevoClient;

use crate::cli::{Command, GlobalOpts};
use crate::config::Profile;
use crate::error::CliError;

/// Dispatch a portal-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &KevoClient,
    profile: &Profile,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Show(args) => locks::show(client, &args, profile, global).await,
        Command::Lock(args) => locks::lock(client, &args, profile, global).await,
        Command::Unlock(args) => locks::unlock(client, &args, profile, global).await,
        Command::Watch(args) => watch::handle(client, &args, profile, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
