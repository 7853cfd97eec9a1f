// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent daemon child process lifecycle.
//!
//! Each eval owns one daemon process for its lifetime. Shutdown is
//! SIGTERM, a short grace window, then SIGKILL; `kill_on_drop` backstops
//! paths that never reach [`AgentDaemon::shutdown`].

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, warn};

/// Grace window between SIGTERM and SIGKILL.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(1200);

/// A running agent daemon owned by one driver invocation.
pub struct AgentDaemon {
    child: tokio::process::Child,
    port: u16,
}

impl AgentDaemon {
    /// Spawn the daemon with `--port <port>` appended to `argv`, rooted in
    /// the eval folder. Output is discarded; the daemon's own behaviour is
    /// observed over HTTP.
    pub fn spawn(argv: &[String], dir: &Path, port: u16) -> anyhow::Result<Self> {
        let (program, args) = argv.split_first().context("agent command is empty")?;
        let child = tokio::process::Command::new(program)
            .args(args)
            .arg("--port")
            .arg(port.to_string())
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn agent daemon {program}"))?;
        debug!(program, port, dir = %dir.display(), "agent daemon started");
        Ok(Self { child, port })
    }

    /// Base URL the daemon serves on.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// OS process id, `None` once the child has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Terminate the daemon: SIGTERM, grace window, then SIGKILL.
    pub async fn shutdown(mut self) {
        let Some(pid) = self.child.id() else {
            // Already exited; reap it.
            let _ = self.child.wait().await;
            return;
        };
        send_term(pid);
        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(_) => debug!(pid, "agent daemon exited"),
            Err(_) => {
                warn!(pid, "agent daemon ignored SIGTERM, killing");
                let _ = self.child.start_kill();
                let _ = self.child.wait().await;
            }
        }
    }
}

#[cfg(unix)]
fn send_term(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
}

// Graceful shutdown semantics are unspecified off Unix; fall straight
// through to the SIGKILL path.
#[cfg(not(unix))]
fn send_term(_pid: u32) {}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
