//! Child command execution.

use std::future::Future;
use std::io;

use tokio::process::Command;
use tracing::debug;

/// Runs one command line and reports whether it exited cleanly. The
/// transaction treats the command as opaque; quoting and output streaming
/// stay with the implementation.
pub trait CommandRunner {
    fn run(&self, command_line: &str) -> impl Future<Output = io::Result<bool>>;
}

/// Hands the command line to the platform shell, inheriting stdio so the
/// child's output streams straight through.
#[derive(Debug, Default, Clone)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    async fn run(&self, command_line: &str) -> io::Result<bool> {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C");
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c");
            c
        };
        cmd.arg(command_line);
        // The child must not outlive an interrupted transaction.
        cmd.kill_on_drop(true);
        let status = cmd.status().await?;
        debug!(code = ?status.code(), "command exited");
        Ok(status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn true_succeeds_false_fails() {
        let runner = ShellRunner;
        assert!(runner.run("exit 0").await.unwrap());
        assert!(!runner.run("exit 3").await.unwrap());
    }
}
