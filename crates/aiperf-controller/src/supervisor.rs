//! Subprocess service manager (§4.7 step 2, step 6): spawns each worker and
//! the records manager as its own OS process, re-invoking this same binary
//! with a subcommand and a path to its serialized JSON config, then
//! supervises their lifetime (stdout/stderr passthrough, SIGTERM-then-SIGKILL
//! shutdown).
//!
//! Owns a map of child handles and reaps them on stop; the subprocess
//! protocol re-execs this binary with a subcommand and a config path rather
//! than spawning an arbitrary command line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::Result;

struct Supervised {
    child: Child,
    config_path: PathBuf,
}

/// Owns every subprocess the controller spawned, keyed by service id.
pub struct Supervisor {
    exe: PathBuf,
    children: HashMap<String, Supervised>,
}

impl Supervisor {
    pub fn new() -> Result<Self> {
        Ok(Self { exe: std::env::current_exe()?, children: HashMap::new() })
    }

    /// Spawns `self.exe <subcommand> --service-id <id> --config <path>`,
    /// forwarding stdout/stderr lines to the tracing subscriber so a
    /// subprocess's structured JSON logs flow through the controller's own
    /// log sink.
    pub fn spawn(&mut self, subcommand: &str, service_id: &str, config_path: &Path) -> Result<()> {
        let mut child = Command::new(&self.exe)
            .arg(subcommand)
            .arg("--service-id")
            .arg(service_id)
            .arg("--config")
            .arg(config_path)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            spawn_line_forwarder(service_id.to_string(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_forwarder(service_id.to_string(), "stderr", stderr);
        }

        info!(service_id, pid = child.id(), "spawned subprocess");
        self.children.insert(service_id.to_string(), Supervised { child, config_path: config_path.to_path_buf() });
        Ok(())
    }

    /// Sends SIGTERM to every live child, waits up to `grace`, then SIGKILLs
    /// whatever hasn't exited (§4.7 step 8, §5 subprocess shutdown).
    pub async fn stop_all(&mut self, grace: Duration) {
        for (service_id, supervised) in &mut self.children {
            terminate(service_id, &mut supervised.child);
        }

        for (service_id, supervised) in &mut self.children {
            match timeout(grace, supervised.child.wait()).await {
                Ok(Ok(status)) => info!(service_id, ?status, "subprocess exited"),
                Ok(Err(e)) => warn!(service_id, error = %e, "error waiting for subprocess"),
                Err(_) => {
                    warn!(service_id, "subprocess did not exit within the grace period, killing");
                    let _ = supervised.child.kill().await;
                }
            }
            let _ = std::fs::remove_file(&supervised.config_path);
        }
        self.children.clear();
    }

    /// Immediate SIGKILL of every live child, no grace period (second SIGINT).
    pub async fn kill_all(&mut self) {
        for (service_id, supervised) in &mut self.children {
            if let Err(e) = supervised.child.kill().await {
                warn!(service_id, error = %e, "failed to kill subprocess");
            }
            let _ = std::fs::remove_file(&supervised.config_path);
        }
        self.children.clear();
    }

    /// Returns the service ids of any child that has already exited, taking
    /// them out of the supervised set so a caller can turn the exit into a
    /// `ServiceFailed` (§7 Service lifecycle errors).
    pub fn reap_exited(&mut self) -> Vec<(String, Option<i32>)> {
        let mut exited = Vec::new();
        self.children.retain(|service_id, supervised| match supervised.child.try_wait() {
            Ok(Some(status)) => {
                exited.push((service_id.clone(), status.code()));
                let _ = std::fs::remove_file(&supervised.config_path);
                false
            }
            _ => true,
        });
        exited
    }
}

fn terminate(service_id: &str, child: &mut Child) {
    let Some(pid) = child.id() else { return };
    #[cfg(unix)]
    {
        // SAFETY: `pid` came from the child we just spawned; SIGTERM is a
        // request, never unsafe to send to a process we own.
        let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if result != 0 {
            warn!(service_id, pid, "failed to send SIGTERM");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (service_id, pid);
    }
}

fn spawn_line_forwarder<R>(service_id: String, stream_name: &'static str, stream: R)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.is_empty() {
                continue;
            }
            info!(service_id = %service_id, stream = stream_name, "{line}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert_child(supervisor: &mut Supervisor, service_id: &str, child: Child, config_path: PathBuf) {
        supervisor.children.insert(service_id.to_string(), Supervised { child, config_path });
    }

    #[test]
    fn new_captures_the_current_executable() {
        let supervisor = Supervisor::new().unwrap();
        assert!(supervisor.exe.exists());
    }

    #[tokio::test]
    async fn reap_exited_removes_and_reports_finished_children() {
        let mut supervisor = Supervisor::new().unwrap();
        let child = Command::new("true").spawn().unwrap();
        insert_child(&mut supervisor, "worker-0", child, PathBuf::from("/tmp/does-not-matter.json"));

        // give the child a moment to actually exit
        tokio::time::sleep(Duration::from_millis(50)).await;

        let exited = supervisor.reap_exited();
        assert_eq!(exited.len(), 1);
        assert_eq!(exited[0].0, "worker-0");
        assert!(supervisor.children.is_empty());
    }

    #[tokio::test]
    async fn reap_exited_leaves_running_children_in_place() {
        let mut supervisor = Supervisor::new().unwrap();
        let child = Command::new("sleep").arg("5").spawn().unwrap();
        insert_child(&mut supervisor, "worker-0", child, PathBuf::from("/tmp/does-not-matter.json"));

        let exited = supervisor.reap_exited();
        assert!(exited.is_empty());
        assert_eq!(supervisor.children.len(), 1);

        supervisor.kill_all().await;
    }

    #[tokio::test]
    async fn stop_all_terminates_children_within_the_grace_period() {
        let mut supervisor = Supervisor::new().unwrap();
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        insert_child(&mut supervisor, "worker-0", child, PathBuf::from("/tmp/does-not-matter.json"));

        supervisor.stop_all(Duration::from_secs(2)).await;
        assert!(supervisor.children.is_empty());
    }
}
