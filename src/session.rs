//! `SessionCoordinator`: wires the five workers of a sync session together
//! (local-watcher, local-scanner, remote-reader, remote-writer,
//! filesystem-writer) around a single-threaded `Reconciler`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::fs_adapter::FsAdapter;
use crate::reconciler::{FsCommand, Reconciler};
use crate::task_runner::TaskRunner;
use crate::transport::PeerConnection;
use crate::update::{InboxItem, InitialScanDone, Side, Update};

const OUTBOUND_CAPACITY: usize = 256;
const FS_COMMAND_CAPACITY: usize = 256;
const POLL_INTERVAL: Duration = Duration::from_millis(200);

type FailureSlot = Arc<Mutex<Option<String>>>;

/// Orchestrates one sync session: starts all five workers, and tears the
/// whole session down if any one of them fails.
pub struct SessionCoordinator {
    config: SyncConfig,
    runner: TaskRunner,
    shutdown: Arc<AtomicBool>,
}

impl SessionCoordinator {
    pub fn new(config: SyncConfig) -> Self {
        SessionCoordinator {
            config,
            runner: TaskRunner::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle the caller can flip to request an orderly stop (wired to
    /// SIGINT/SIGTERM by `main.rs`, matching the teacher's `watch_cmd.rs`).
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Start all five workers and block until the session ends: either the
    /// reconciler's inbox closes because every producer stopped (the
    /// `shutdown` flag was flipped and all workers drained out), or a
    /// worker failed and brought the others down with it.
    pub fn run<F, P>(&mut self, fs: Arc<F>, peer: Arc<P>) -> Result<(), SyncError>
    where
        F: FsAdapter + 'static,
        P: PeerConnection + 'static,
    {
        let root = self.config.root.clone();
        let (extra_excludes, extra_includes) = self.config.compile_rules();

        let (inbox_tx, inbox_rx) = std::sync::mpsc::channel::<InboxItem>();
        let (outbound_tx, outbound_rx) = sync_channel(OUTBOUND_CAPACITY);
        let (fs_cmd_tx, fs_cmd_rx) = sync_channel::<FsCommand>(FS_COMMAND_CAPACITY);

        let mut reconciler = Reconciler::new(
            root.clone(),
            ArcFsAdapter(fs.clone()),
            extra_excludes,
            extra_includes,
            inbox_rx,
            outbound_tx,
            fs_cmd_tx,
            self.config.flush_idle_ms,
        );

        let failure: FailureSlot = Arc::new(Mutex::new(None));

        self.spawn_local_scanner(fs.clone(), peer.clone(), root.clone(), inbox_tx.clone(), failure.clone());
        self.spawn_local_watcher(fs.clone(), root.clone(), inbox_tx.clone(), failure.clone());
        self.spawn_remote_reader(peer.clone(), inbox_tx.clone(), failure.clone());
        self.spawn_remote_writer(peer.clone(), outbound_rx, failure.clone());
        self.spawn_filesystem_writer(fs.clone(), root.clone(), fs_cmd_rx, failure.clone());

        // Drop our own sender: once every worker's clone is also dropped
        // (all of them finished), the inbox channel disconnects and the
        // reconciler's `run()` returns instead of blocking forever.
        drop(inbox_tx);

        // The reconciler itself runs on the calling thread: it is the one
        // component that must never be preempted by another owner of the
        // tree, so it is not handed to the TaskRunner like the I/O workers.
        let reconcile_result = reconciler.run();

        self.runner.stop_all();

        if let Some(message) = failure.lock().unwrap().take() {
            return Err(SyncError::ProtocolViolation { reason: message });
        }
        reconcile_result
    }

    fn spawn_local_scanner<F: FsAdapter + 'static, P: PeerConnection + 'static>(
        &mut self,
        fs: Arc<F>,
        peer: Arc<P>,
        root: PathBuf,
        inbox_tx: Sender<InboxItem>,
        failure: FailureSlot,
    ) {
        self.runner.run_task_with_stop(
            "local-scanner",
            self.shutdown.clone(),
            move |_stop| {
                for update in fs.scan(&root) {
                    send_to_inbox(&inbox_tx, InboxItem::Update { side: Side::Local, update })?;
                }
                send_to_inbox(
                    &inbox_tx,
                    InboxItem::ScanDone(InitialScanDone(Side::Local)),
                )?;
                // Tell the peer our initial scan is done, so its
                // remote-reader can mark *our* side's scan complete on its
                // own inbox (see `spawn_remote_reader`'s `Ok(Ok(None))` arm).
                peer.send_scan_done().map_err(anyhow::Error::from)
            },
            move |name, err| record_failure(&failure, name, err),
        );
    }

    fn spawn_local_watcher<F: FsAdapter + 'static>(
        &mut self,
        fs: Arc<F>,
        root: PathBuf,
        inbox_tx: Sender<InboxItem>,
        failure: FailureSlot,
    ) {
        self.runner.run_task_with_stop(
            "local-watcher",
            self.shutdown.clone(),
            move |stop| {
                let rx = fs.watch(&root, stop.clone());
                while !stop.load(Ordering::SeqCst) {
                    match rx.recv_timeout(POLL_INTERVAL) {
                        Ok(update) => {
                            send_to_inbox(&inbox_tx, InboxItem::Update { side: Side::Local, update })?
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                Ok(())
            },
            move |name, err| record_failure(&failure, name, err),
        );
    }

    fn spawn_remote_reader<P: PeerConnection + 'static>(
        &mut self,
        peer: Arc<P>,
        inbox_tx: Sender<InboxItem>,
        failure: FailureSlot,
    ) {
        self.runner.run_task_with_stop(
            "remote-reader",
            self.shutdown.clone(),
            move |stop| {
                // `PeerConnection::recv` has no timeout of its own, so the
                // blocking read runs on a shadow thread; this loop polls a
                // local channel instead and can notice `stop` promptly. The
                // shadow thread is abandoned once `stop` fires -- acceptable
                // for the in-process loopback demo this crate ships, but a
                // production transport should expose a `close()` that
                // unblocks `recv()` directly instead.
                let (tx, rx) = std::sync::mpsc::channel();
                {
                    let peer = peer.clone();
                    std::thread::spawn(move || loop {
                        let item = peer.recv();
                        let is_err = item.is_err();
                        if tx.send(item).is_err() || is_err {
                            break;
                        }
                    });
                }
                while !stop.load(Ordering::SeqCst) {
                    match rx.recv_timeout(POLL_INTERVAL) {
                        Ok(Ok(Some(update))) => send_to_inbox(
                            &inbox_tx,
                            InboxItem::Update { side: Side::Remote, update },
                        )?,
                        Ok(Ok(None)) => send_to_inbox(
                            &inbox_tx,
                            InboxItem::ScanDone(InitialScanDone(Side::Remote)),
                        )?,
                        Ok(Err(e)) => return Err(e.into()),
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                Ok(())
            },
            move |name, err| record_failure(&failure, name, err),
        );
    }

    fn spawn_remote_writer<P: PeerConnection + 'static>(
        &mut self,
        peer: Arc<P>,
        outbound_rx: std::sync::mpsc::Receiver<Update>,
        failure: FailureSlot,
    ) {
        self.runner.run_task_with_stop(
            "remote-writer",
            self.shutdown.clone(),
            move |stop| {
                while !stop.load(Ordering::SeqCst) {
                    match outbound_rx.recv_timeout(POLL_INTERVAL) {
                        Ok(update) => peer.send(update)?,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                Ok(())
            },
            move |name, err| record_failure(&failure, name, err),
        );
    }

    fn spawn_filesystem_writer<F: FsAdapter + 'static>(
        &mut self,
        fs: Arc<F>,
        root: PathBuf,
        fs_cmd_rx: std::sync::mpsc::Receiver<FsCommand>,
        failure: FailureSlot,
    ) {
        self.runner.run_task_with_stop(
            "filesystem-writer",
            self.shutdown.clone(),
            move |stop| {
                while !stop.load(Ordering::SeqCst) {
                    match fs_cmd_rx.recv_timeout(POLL_INTERVAL) {
                        Ok(command) => apply_fs_command(fs.as_ref(), &root, command)?,
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                Ok(())
            },
            move |name, err| record_failure(&failure, name, err),
        );
    }
}

fn send_to_inbox(tx: &Sender<InboxItem>, item: InboxItem) -> anyhow::Result<()> {
    tx.send(item).map_err(|_| anyhow::anyhow!("reconciler inbox closed"))
}

fn apply_fs_command<F: FsAdapter>(fs: &F, root: &Path, command: FsCommand) -> anyhow::Result<()> {
    match command {
        FsCommand::Write { path, data, mod_time } => fs.write(root, &path, &data, mod_time)?,
        FsCommand::Mkdir { path } => fs.mkdir(root, &path)?,
        FsCommand::Delete { path } => fs.delete(root, &path)?,
        FsCommand::Mklink { path, target } => fs.mklink(root, &path, &target)?,
    }
    Ok(())
}

fn record_failure(failure: &FailureSlot, name: &str, err: anyhow::Error) {
    eprintln!("duplexd: worker '{name}' failed: {err}");
    let mut guard = failure.lock().unwrap();
    if guard.is_none() {
        *guard = Some(format!("{name}: {err}"));
    }
}

/// Thin `FsAdapter` wrapper over `Arc<F>` so `Reconciler<F>` can share the
/// same adapter instance the worker closures above hold, without every
/// trait method taking `Arc` in its own signature.
struct ArcFsAdapter<F>(Arc<F>);

impl<F: FsAdapter> FsAdapter for ArcFsAdapter<F> {
    fn scan(&self, root: &Path) -> Vec<Update> {
        self.0.scan(root)
    }
    fn watch(&self, root: &Path, stop: Arc<AtomicBool>) -> std::sync::mpsc::Receiver<Update> {
        self.0.watch(root, stop)
    }
    fn read(&self, root: &Path, path: &str) -> std::io::Result<(Vec<u8>, i64)> {
        self.0.read(root, path)
    }
    fn write(&self, root: &Path, path: &str, data: &[u8], mod_time: i64) -> std::io::Result<()> {
        self.0.write(root, path, data, mod_time)
    }
    fn mkdir(&self, root: &Path, path: &str) -> std::io::Result<()> {
        self.0.mkdir(root, path)
    }
    fn delete(&self, root: &Path, path: &str) -> std::io::Result<()> {
        self.0.delete(root, path)
    }
    fn mklink(&self, root: &Path, path: &str, target: &str) -> std::io::Result<()> {
        self.0.mklink(root, path, target)
    }
}
