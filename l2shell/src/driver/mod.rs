//! Session layer: command execution on a device shell.
//!
//! [`Session`] owns one connection and runs commands through the
//! [`CommandAutomaton`]. [`SharedSession`] lets several tasks use one
//! session, one command at a time.

mod automaton;
mod builder;
mod interactive;
pub(crate) mod response;
mod session;
mod shared;

pub use automaton::CommandAutomaton;
pub use builder::SessionBuilder;
pub use interactive::{
    Interaction, InteractionBuilder, InteractionBuilderWithPattern, InteractionScript,
};
pub use response::Transcript;
pub use session::Session;
pub use shared::SharedSession;

use std::future::Future;

use crate::error::Result;

/// Anything that can run commands on a device shell.
///
/// Vendor drivers are written against this trait so they work the same on
/// a private [`Session`] and on a [`SharedSession`].
pub trait CommandExecutor: Send {
    /// Run a command, answering the interaction script, and return the
    /// cleaned transcript.
    fn execute(
        &mut self,
        command: &str,
        interactions: &InteractionScript,
    ) -> impl Future<Output = Result<Transcript>> + Send;

    /// Run a command that needs no interaction.
    fn send_command(&mut self, command: &str) -> impl Future<Output = Result<Transcript>> + Send {
        async move {
            let interactions = InteractionScript::new();
            self.execute(command, &interactions).await
        }
    }

    /// Run several commands in order, stopping at the first failure.
    fn send_commands(
        &mut self,
        commands: &[&str],
    ) -> impl Future<Output = Result<Vec<Transcript>>> + Send {
        async move {
            let mut transcripts = Vec::with_capacity(commands.len());
            for command in commands {
                transcripts.push(self.send_command(command).await?);
            }
            Ok(transcripts)
        }
    }

    /// Close the connection. Never fails.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
