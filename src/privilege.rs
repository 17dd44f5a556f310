//! OS-level bootstrap concerns: dropping root privileges and backgrounding
//! the process. Both are plain POSIX syscalls, so they run before the async
//! runtime exists — forking a running multi-threaded runtime is unsound,
//! since only the calling thread survives into the child.

use nix::unistd::{self, ForkResult, Gid, Uid};

use crate::error::StartupError;

/// Sets gid then uid to the given unprivileged pair. Both steps must
/// succeed; either failure is fatal at startup.
pub fn drop_privileges(uid: u32, gid: u32) -> Result<(), StartupError> {
    unistd::setgid(Gid::from_raw(gid))
        .map_err(|source| StartupError::PrivilegeDrop { uid, gid, source })?;
    unistd::setuid(Uid::from_raw(uid))
        .map_err(|source| StartupError::PrivilegeDrop { uid, gid, source })?;
    Ok(())
}

/// Forks into the background. The parent prints the child's PID to stdout
/// and exits 0; the child returns to continue startup. Safe to call only
/// before any additional threads (e.g. the tokio runtime) have been started.
pub fn daemonize() -> Result<(), StartupError> {
    // SAFETY: called from `main` before the tokio runtime or any other
    // thread exists, so the child inherits a single-threaded process image.
    match unsafe { unistd::fork() }.map_err(StartupError::Fork)? {
        ForkResult::Parent { child } => {
            println!("started successfully with PID {child}");
            std::process::exit(0);
        }
        ForkResult::Child => Ok(()),
    }
}
