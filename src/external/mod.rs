//! External tool abstractions
//!
//! Git runs as a child process behind [`CommandExecutor`], so working-copy
//! logic can be tested without a real repository or network.

pub mod command;
pub mod git;
#[cfg(test)]
pub(crate) mod testing;

pub use command::{CommandError, CommandExecutor, CommandOutput, ProcessCommandExecutor};
pub use git::{Checkout, CommitIdentity, GitError, GitHost, GitWorkspace, MergeState};
