//! Executes actions by spawning `xdotool key`.

use log::{debug, error, warn};
use tokio::process::Command;

use super::{keysym::to_key_chords, ActionExecutor};

const XDOTOOL_BIN: &str = "xdotool";

/// Sends hotkeys to the focused X11 window.
#[derive(Debug, Clone)]
pub struct XdotoolExecutor {
    program: String,
}

impl XdotoolExecutor {
    pub fn new() -> Self {
        Self::with_program(XDOTOOL_BIN)
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    fn command(&self, chords: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("key").arg("--clearmodifiers").args(chords);
        cmd
    }
}

impl Default for XdotoolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionExecutor for XdotoolExecutor {
    /// Spawns the key sender and returns without waiting; the child is
    /// reaped on a background task.
    fn execute(&self, action: &str) {
        let chords = match to_key_chords(action) {
            Ok(chords) => chords,
            Err(e) => {
                warn!("Ignoring action {:?}: {}", action, e);
                return;
            }
        };

        debug!("Sending keys {:?}", chords);
        let mut child = match self.command(&chords).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn {}: {}", self.program, e);
                return;
            }
        };

        let action = action.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => warn!("Action {:?} exited with {}", action, status),
                Err(e) => error!("Failed to wait for action {:?}: {}", action, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_command_line() {
        let executor = XdotoolExecutor::new();
        let chords = to_key_chords("ctrl+pagedown, enter").unwrap();
        let cmd = executor.command(&chords);
        let cmd = cmd.as_std();

        let args: Vec<_> =
            cmd.get_args().map(|arg| arg.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "xdotool");
        assert_eq!(args, vec!["key", "--clearmodifiers", "ctrl+Next", "Return"]);
    }

    #[tokio::test]
    async fn test_execute_missing_program_does_not_panic() {
        init_logger();
        let executor = XdotoolExecutor::with_program("/nonexistent/xdotool");

        executor.execute("pagedown");
        executor.execute("");
    }
}
