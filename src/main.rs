//! duplexd binary entrypoint.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use duplexd::cli::{self, Command};
use duplexd::config::SyncConfig;
use duplexd::fs_adapter::LocalFsAdapter;
use duplexd::session::SessionCoordinator;
use duplexd::transport::LoopbackTransport;
use duplexd::version;

fn print_version() {
    println!("{}", version::full_version_string());
}

fn main() {
    let command = match cli::parse_args_impl(print_version) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("duplexd: {e}");
            cli::print_usage();
            std::process::exit(2);
        }
    };

    if let Err(e) = run(command) {
        eprintln!("duplexd: {e}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Sync {
            root,
            mirror,
            exclude,
            include,
            debounce_ms,
            once,
        } => run_sync(root, mirror, exclude, include, debounce_ms, once),
    }
}

/// Run one sync session. The only `PeerConnection` this crate ships is the
/// in-process `LoopbackTransport`, so `--mirror` drives two
/// `SessionCoordinator`s against each other in this same process -- a
/// demo/test topology, not a production deployment (see `DESIGN.md`). A
/// production build would plug a real transport in here instead.
fn run_sync(
    root: std::path::PathBuf,
    mirror: Option<std::path::PathBuf>,
    exclude: Vec<String>,
    include: Vec<String>,
    debounce_ms: u64,
    once: bool,
) -> Result<()> {
    let mirror_root = mirror.ok_or_else(|| {
        anyhow::anyhow!("--mirror is required: duplexd ships only the in-process loopback demo transport")
    })?;

    let mut config_a = SyncConfig {
        root: root.clone(),
        mirror_root: Some(mirror_root.clone()),
        debounce_ms,
        extra_excludes: exclude.clone(),
        extra_includes: include.clone(),
        ..SyncConfig::default()
    };
    let mut config_b = SyncConfig {
        root: mirror_root,
        mirror_root: Some(root),
        debounce_ms,
        extra_excludes: exclude,
        extra_includes: include,
        ..SyncConfig::default()
    };

    let mut session_a = SessionCoordinator::new(std::mem::take(&mut config_a));
    let mut session_b = SessionCoordinator::new(std::mem::take(&mut config_b));

    let (peer_a, peer_b) = LoopbackTransport::pair();
    let fs_a = Arc::new(LocalFsAdapter::new(debounce_ms));
    let fs_b = Arc::new(LocalFsAdapter::new(debounce_ms));
    let peer_a = Arc::new(peer_a);
    let peer_b = Arc::new(peer_b);

    let shutdown_a = session_a.shutdown_handle();
    let shutdown_b = session_b.shutdown_handle();
    register_signal_handlers(shutdown_a.clone())?;
    register_signal_handlers(shutdown_b.clone())?;

    let handle_a = std::thread::spawn(move || session_a.run(fs_a, peer_a));
    let handle_b = std::thread::spawn(move || session_b.run(fs_b, peer_b));

    if once {
        // The reconciler's run loop only exits once its inbox disconnects
        // (no live producer left); there is no direct "initial pass done"
        // signal to wait on from here, so `--once` gives both sides a fixed
        // settling window before requesting shutdown. Good enough for
        // scriptable/test use; a real completion signal would need the
        // reconciler to publish its own idle event.
        std::thread::sleep(Duration::from_millis(debounce_ms * 2 + 500));
        shutdown_a.store(true, Ordering::SeqCst);
        shutdown_b.store(true, Ordering::SeqCst);
    }

    let result_a = handle_a.join().map_err(|_| anyhow::anyhow!("session A thread panicked"))?;
    let result_b = handle_b.join().map_err(|_| anyhow::anyhow!("session B thread panicked"))?;
    result_a?;
    result_b?;
    Ok(())
}

#[cfg(unix)]
fn register_signal_handlers(shutdown: Arc<std::sync::atomic::AtomicBool>) -> Result<()> {
    use signal_hook::consts::signal;
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([signal::SIGTERM, signal::SIGINT])?;
    std::thread::spawn(move || {
        for _ in &mut signals {
            shutdown.store(true, Ordering::SeqCst);
            break;
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn register_signal_handlers(_shutdown: Arc<std::sync::atomic::AtomicBool>) -> Result<()> {
    Ok(())
}
