//! Process lifecycle management for external tools
//!
//! A destructive tool (`disko`, `mkfs.xfs`, `zpool`) must never keep running
//! after the installer is gone: an orphaned `disko` would keep repartitioning
//! disks nobody is watching.
//!
//! - Tools are spawned in their own process group
//! - Their PIDs are tracked in a global registry while they run
//! - On SIGINT/SIGTERM/SIGHUP or guard drop, every group gets SIGTERM,
//!   then SIGKILL after a grace period
//! - `PR_SET_PDEATHSIG` covers the case where the installer itself is killed

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Registry tracking all running tool processes
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    /// Set once termination started, so a second signal does not repeat it
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    pub fn register(&mut self, pid: u32) {
        self.pids.insert(pid);
        debug!("Registered tool process PID {}", pid);
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        debug!("Unregistered tool process PID {}", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// SIGTERM every tracked group, then SIGKILL whatever is still running
    /// after `grace_period`. Runs at most once.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if std::mem::replace(&mut self.cleanup_initiated, true) || self.pids.is_empty() {
            return;
        }

        let groups: Vec<u32> = self.pids.drain().collect();
        info!("Terminating {} running tool process(es)", groups.len());
        signal_groups(&groups, Signal::SIGTERM);

        let deadline = Instant::now() + grace_period;
        while Instant::now() < deadline && groups.iter().any(|&pid| is_running(pid)) {
            std::thread::sleep(Duration::from_millis(100));
        }

        let stubborn: Vec<u32> = groups.into_iter().filter(|&pid| is_running(pid)).collect();
        if stubborn.is_empty() {
            info!("All tool processes terminated");
        } else {
            warn!("{} tool process group(s) ignored SIGTERM, sending SIGKILL", stubborn.len());
            signal_groups(&stubborn, Signal::SIGKILL);
        }
    }
}

/// Each tool leads its own group; the negative PID reaches everything it
/// spawned (`sgdisk`, `zpool create`, `mkfs.*` under `disko`).
fn signal_groups(groups: &[u32], sig: Signal) {
    for &pgid in groups {
        match signal::kill(Pid::from_raw(-(pgid as i32)), sig) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => error!("{} to process group {} failed: {}", sig, pgid, e),
        }
    }
}

/// Exited and zombie processes are not running.
fn is_running(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => !matches!(proc_state(&stat), Some('Z' | 'X')),
        Err(_) => true,
    }
}

/// State letter from `/proc/<pid>/stat`. The command name is parenthesised
/// and may contain spaces, so the state follows the last `)`.
fn proc_state(stat: &str) -> Option<char> {
    let (_, rest) = stat.rsplit_once(')')?;
    rest.trim_start().chars().next()
}

/// RAII guard that terminates all running tools on drop.
/// Held by `main` for the lifetime of the process.
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }

    pub fn child_count(&self) -> usize {
        self.registry.lock().map(|r| r.count()).unwrap_or(0)
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(Duration::from_secs(5));
        }
    }
}

fn signal_name(sig: i32) -> &'static str {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    match sig {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGHUP => "SIGHUP",
        _ => "signal",
    }
}

/// Stop running tools on SIGINT, SIGTERM or SIGHUP, then exit with
/// `128 + signal`. Call once at startup.
pub fn init_signal_handlers() -> std::io::Result<()> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    std::thread::Builder::new()
        .name("tuinix-signals".to_string())
        .spawn(move || {
            let Some(sig) = signals.forever().next() else {
                return;
            };
            warn!("Received {}, stopping running tools", signal_name(sig));
            if let Ok(mut registry) = ChildRegistry::global().lock() {
                registry.terminate_all(Duration::from_secs(3));
            }
            std::process::exit(128 + sig);
        })?;
    Ok(())
}

/// Spawning tools in their own process group
pub trait CommandProcessGroup {
    /// Lead a new process group and receive SIGTERM if the installer dies.
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;
        self.process_group(0);
        // SAFETY: prctl is async-signal-safe and touches no parent state
        unsafe {
            self.pre_exec(|| {
                nix::sys::prctl::set_pdeathsig(Signal::SIGTERM).map_err(std::io::Error::from)
            });
        }
        self
    }
}
