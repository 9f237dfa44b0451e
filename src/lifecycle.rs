//! Lifecycle (C6): the process-wide signal-driven shutdown flag, plus the
//! boundary concerns named out of the core scope — daemonization and
//! privilege dropping — retained here because a complete operational
//! binary still needs them, matching the original `main.c`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_hook::consts::{SIGHUP, SIGINT, SIGPIPE, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;

use crate::error::GatewayError;

/// Installs SIGHUP/SIGINT/SIGTERM/SIGQUIT handlers that set `shutdown`,
/// and ignores SIGPIPE. Runs the signal-watching loop on a dedicated
/// thread for the life of the process.
pub fn install_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<(), GatewayError> {
    unsafe {
        signal_hook::low_level::register(SIGPIPE, || {})
            .map_err(|e| GatewayError::Config(format!("failed to ignore SIGPIPE: {e}")))?;
    }

    let mut signals = Signals::new([SIGHUP, SIGINT, SIGTERM, SIGQUIT])
        .map_err(|e| GatewayError::Config(format!("failed to install signal handlers: {e}")))?;

    std::thread::Builder::new()
        .name("httpgw-signals".into())
        .spawn(move || {
            for signal in signals.forever() {
                tracing::info!(signal, "received shutdown signal");
                shutdown.store(true, Ordering::Release);
            }
        })
        .map_err(|e| GatewayError::Config(format!("failed to spawn signal thread: {e}")))?;

    Ok(())
}

/// Forks into the background, starts a new session, redirects the standard
/// streams to `/dev/null`, and changes into `$TMPDIR` (or `/tmp`).
///
/// The parent process exits immediately on a successful fork; only the
/// child returns from this function.
pub fn daemonize() -> Result<(), GatewayError> {
    use nix::unistd::{chdir, fork, setsid, ForkResult};

    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => std::process::exit(0),
        Ok(ForkResult::Child) => {}
        Err(e) => return Err(GatewayError::Config(format!("fork failed: {e}"))),
    }

    setsid().map_err(|e| GatewayError::Config(format!("setsid failed: {e}")))?;

    redirect_stdio_to_dev_null()?;

    let tmpdir = std::env::var("TMPDIR").unwrap_or_else(|_| "/tmp".to_string());
    chdir(tmpdir.as_str())
        .map_err(|e| GatewayError::Config(format!("failed to chdir to '{tmpdir}': {e}")))?;

    Ok(())
}

fn redirect_stdio_to_dev_null() -> Result<(), GatewayError> {
    use std::os::unix::io::AsRawFd;

    let dev_null = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .map_err(|e| GatewayError::Config(format!("failed to open /dev/null: {e}")))?;
    let fd = dev_null.as_raw_fd();

    for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        if unsafe { libc::dup2(fd, target) } < 0 {
            return Err(GatewayError::Config(
                "failed to redirect standard stream to /dev/null".into(),
            ));
        }
    }
    Ok(())
}

/// Drops privileges to `group`, then `user`, in that order — matching the
/// group-before-user ordering of the original `hp_drop_privileges`, which
/// must run while the process can still resolve both names (i.e. before
/// dropping `user`'s elevated privileges).
pub fn drop_privileges(user: Option<&str>, group: Option<&str>) -> Result<(), GatewayError> {
    use nix::unistd::{Gid, Group, Uid, User};

    if let Some(group) = group {
        let resolved = Group::from_name(group)
            .map_err(|e| GatewayError::Config(format!("failed to resolve group '{group}': {e}")))?
            .ok_or_else(|| GatewayError::Config(format!("group '{group}' does not exist")))?;
        nix::unistd::setegid(Gid::from_raw(resolved.gid.as_raw()))
            .map_err(|e| GatewayError::Config(format!("setegid failed: {e}")))?;
    }

    if let Some(user) = user {
        let resolved = User::from_name(user)
            .map_err(|e| GatewayError::Config(format!("failed to resolve user '{user}': {e}")))?
            .ok_or_else(|| GatewayError::Config(format!("user '{user}' does not exist")))?;
        nix::unistd::seteuid(Uid::from_raw(resolved.uid.as_raw()))
            .map_err(|e| GatewayError::Config(format!("seteuid failed: {e}")))?;
    }

    Ok(())
}
