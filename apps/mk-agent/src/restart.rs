// restart.rs — clean process replacement and the supervisor loop.

use std::process::Command;
use std::time::{Duration, Instant};

/// Replace this process with a fresh instance running the same
/// arguments. Stores must be flushed before calling — nothing buffered
/// survives the exec.
pub fn reexec() -> anyhow::Result<()> {
    let exe = std::env::current_exe()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    tracing::info!(exe = %exe.display(), "replacing process image");

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // exec only returns on failure.
        let err = Command::new(&exe).args(&args).exec();
        Err(anyhow::anyhow!("exec failed: {}", err))
    }
    #[cfg(not(unix))]
    {
        let status = Command::new(&exe).args(&args).status()?;
        std::process::exit(status.code().unwrap_or(0));
    }
}

const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Uptime after which a crash is treated as fresh, resetting backoff.
const STABLE_UPTIME: Duration = Duration::from_secs(120);

/// Supervise `mk-agent run`: restart on unexpected exit with doubling
/// backoff. A clean exit stops supervision. `child_args` is the complete
/// argument vector for the child, including the `run` subcommand.
pub fn supervise(child_args: &[String]) -> anyhow::Result<()> {
    let exe = std::env::current_exe()?;
    let mut backoff = BACKOFF_INITIAL;

    loop {
        tracing::info!(args = ?child_args, "supervisor spawning agent");
        let started = Instant::now();
        let status = Command::new(&exe).args(child_args).status()?;

        if status.success() {
            tracing::info!("agent exited cleanly, supervision done");
            return Ok(());
        }

        if started.elapsed() >= STABLE_UPTIME {
            backoff = BACKOFF_INITIAL;
        }
        tracing::warn!(
            code = status.code(),
            backoff_secs = backoff.as_secs(),
            "agent exited unexpectedly, restarting"
        );
        std::thread::sleep(backoff);
        backoff = (backoff * 2).min(BACKOFF_MAX);
    }
}
