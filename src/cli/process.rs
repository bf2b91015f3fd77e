use std::{path::Path, process::Stdio};

use anyhow::{Context, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

/// Terminates every other process running the executable at `name`.
pub fn kill_previous_servers(name: &Path) -> Result<()> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(anyhow::Error::msg)?;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| name == *v)
            .is_some()
        {
            info!("Stopping daemon {pid}");
            // This will forcefully terminate the process on Windows.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
        }
    }
    Ok(())
}

/// Shuts down previous daemons and starts a new one from `daemon_path`. The daemon detaches
/// itself, so this returns as soon as it is spawned.
pub fn restart_server(daemon_path: &Path, dir: Option<&Path>, address: &str) -> Result<()> {
    kill_previous_servers(daemon_path)?;
    let mut command = std::process::Command::new(daemon_path);
    command.args(["--address", address]);
    if let Some(dir) = dir {
        command.arg("--dir").arg(dir);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
    }
    #[cfg(not(unix))]
    command.stdin(Stdio::null());

    info!("Spawning {daemon_path:?}");
    #[allow(clippy::zombie_processes)]
    let _ = command
        .spawn()
        .with_context(|| format!("Failed to start {daemon_path:?}"))?;
    Ok(())
}
