//! Relaunching the binary after `POL_SetupWindow_restart`.

use anyhow::{Context, Result};
use std::process::Command;
use tracing::info;

/// Replace this process with a fresh copy started with the same arguments.
/// Only returns on failure (or, off unix, once the child has been spawned).
pub(crate) fn relaunch() -> Result<()> {
    let exe = std::env::current_exe().context("failed to locate the running binary")?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    info!(exe = %exe.display(), ?args, "restarting");

    let mut command = Command::new(&exe);
    command.args(&args);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let error = command.exec();
        Err(error).with_context(|| format!("failed to exec {}", exe.display()))
    }

    #[cfg(not(unix))]
    {
        command
            .spawn()
            .with_context(|| format!("failed to start {}", exe.display()))?;
        Ok(())
    }
}
