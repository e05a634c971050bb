//! Orchestration of one chroot session.
//!
//! The controller walks `Init -> MountingEssentials -> ResolvSetup ->
//! Running -> CleaningUp -> Done`. Once the essential mounts exist they are
//! held by a guard that tears them down on every exit path. A signal
//! watcher, armed before mounting starts, can jump to `Interrupted` at any
//! point: it runs the same teardown and then terminates the process.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fchroot_common::config::ChrootConfig;
use fchroot_common::constants::EXIT_FAILURE;
use fchroot_common::error::Result;
use fchroot_common::types::Phase;

use crate::filesystem::unmount::{TeardownReport, unmount_all};
use crate::filesystem::{MountTable, mount, resolv};
use crate::launcher::Launcher;
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::signal::SignalWatcher;

/// The single teardown routine shared by the normal path and the signal
/// watcher.
///
/// Runs are serialized, and setup holds the same lock, so a signal that
/// arrives mid-mount waits for the step in flight and then sees every mount
/// it produced.
pub struct Teardown<M> {
    table: Arc<M>,
    root: PathBuf,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    session: Mutex<()>,
    interrupted: AtomicBool,
}

impl<M: MountTable> Teardown<M> {
    /// Creates a teardown routine for `root`.
    pub fn new(
        table: Arc<M>,
        root: impl Into<PathBuf>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            table,
            root: root.into(),
            policy,
            sleeper,
            session: Mutex::new(()),
            interrupted: AtomicBool::new(false),
        }
    }

    /// Unmounts everything under the root that is still mounted.
    ///
    /// Safe to call any number of times.
    pub fn run(&self) -> TeardownReport {
        let _session = self.lock();
        unmount_all(&*self.table, &self.root, &self.policy, &*self.sleeper)
    }

    /// Marks the session as interrupted and runs teardown.
    pub fn interrupt(&self) -> TeardownReport {
        self.interrupted.store(true, Ordering::SeqCst);
        self.run()
    }

    /// Returns whether a signal triggered teardown.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scoped ownership of the mounted state.
///
/// Dropping the guard without calling [`MountedRoot::release`] still runs
/// teardown.
struct MountedRoot<'a, M: MountTable> {
    teardown: &'a Teardown<M>,
    released: bool,
}

impl<'a, M: MountTable> MountedRoot<'a, M> {
    const fn new(teardown: &'a Teardown<M>) -> Self {
        Self {
            teardown,
            released: false,
        }
    }

    fn release(mut self) -> TeardownReport {
        self.released = true;
        self.teardown.run()
    }
}

impl<M: MountTable> Drop for MountedRoot<'_, M> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.teardown.run();
        }
    }
}

/// Drives a chroot session from the first mount to the final unmount.
pub struct Controller<'a, M, L> {
    config: &'a ChrootConfig,
    table: Arc<M>,
    launcher: L,
    teardown: Arc<Teardown<M>>,
    phase: Arc<Mutex<Phase>>,
}

impl<'a, M, L> Controller<'a, M, L>
where
    M: MountTable + 'static,
    L: Launcher,
{
    /// Creates a controller using the default unmount retry policy.
    pub fn new(config: &'a ChrootConfig, table: Arc<M>, launcher: L) -> Self {
        Self::with_retry(
            config,
            table,
            launcher,
            RetryPolicy::unmount(),
            Arc::new(ThreadSleeper),
        )
    }

    /// Creates a controller with an explicit retry policy and sleeper.
    pub fn with_retry(
        config: &'a ChrootConfig,
        table: Arc<M>,
        launcher: L,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        let teardown = Arc::new(Teardown::new(
            Arc::clone(&table),
            config.root(),
            policy,
            sleeper,
        ));
        Self {
            config,
            table,
            launcher,
            teardown,
            phase: Arc::new(Mutex::new(Phase::Init)),
        }
    }

    /// Returns the current lifecycle phase.
    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the shared teardown routine.
    pub fn teardown(&self) -> Arc<Teardown<M>> {
        Arc::clone(&self.teardown)
    }

    /// Runs the whole session and returns the exit code to report.
    ///
    /// The first message on `interrupts` after the watcher starts triggers early
    /// teardown followed by `exit(EXIT_FAILURE)`. The binary passes
    /// [`std::process::exit`].
    ///
    /// # Errors
    ///
    /// Returns a setup error if mounting or resolver provisioning fails, and
    /// a launch error if the command cannot be started. Mounts are torn down
    /// before returning in every case except a failed mount step.
    pub fn run<X>(&self, interrupts: Receiver<()>, exit: X) -> Result<i32>
    where
        X: FnOnce(i32) + Send + 'static,
    {
        let root = self.config.root();
        self.check_root_mountpoint(root);
        let _watcher = self.arm_watcher(interrupts, exit)?;

        let mounted = {
            let _session = self.teardown.lock();
            self.enter(Phase::MountingEssentials);
            let _ = mount::mount_all(&*self.table, root)?;
            MountedRoot::new(&*self.teardown)
        };

        self.enter(Phase::ResolvSetup);
        if self.config.skip_resolv {
            tracing::debug!("skipping resolv.conf setup");
        } else {
            let _session = self.teardown.lock();
            // Teardown may already have run; a link made now would outlive it.
            if !self.teardown.is_interrupted() {
                let _ = resolv::provision(root, &self.config.host_resolv)?;
            }
        }

        if self.teardown.is_interrupted() {
            return Ok(EXIT_FAILURE);
        }

        self.enter(Phase::Running);
        let outcome = self
            .launcher
            .launch(root, self.config.user_spec.as_deref(), &self.config.command);

        self.enter(Phase::CleaningUp);
        let report = mounted.release();
        if !report.is_clean() {
            tracing::warn!(failed = report.failures.len(), "some mounts are still present");
        }
        self.enter(Phase::Done);

        if self.teardown.is_interrupted() {
            return Ok(EXIT_FAILURE);
        }
        outcome
    }

    fn check_root_mountpoint(&self, root: &Path) {
        if self.table.is_mounted(root) {
            tracing::debug!(root = %root.display(), "chroot directory is a mountpoint");
        } else {
            tracing::warn!(
                root = %root.display(),
                "chroot directory is not a mountpoint; this is fine for a plain directory chroot"
            );
        }
    }

    fn arm_watcher<X>(&self, interrupts: Receiver<()>, exit: X) -> Result<SignalWatcher>
    where
        X: FnOnce(i32) + Send + 'static,
    {
        let teardown = Arc::clone(&self.teardown);
        let phase = Arc::clone(&self.phase);
        SignalWatcher::spawn(interrupts, move || {
            tracing::warn!("received interrupt signal, unmounting");
            *phase.lock().unwrap_or_else(PoisonError::into_inner) = Phase::Interrupted;
            let _ = teardown.interrupt();
            exit(EXIT_FAILURE);
        })
    }

    fn enter(&self, next: Phase) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase == Phase::Interrupted {
            return;
        }
        let current = *phase;
        tracing::debug!(from = %current, to = %next, "phase transition");
        *phase = next;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::{OnceLock, mpsc};
    use std::time::{Duration, Instant};

    use fchroot_common::error::FchrootError;
    use fchroot_common::types::MountSpec;

    use super::*;
    use crate::testing::{FakeMountTable, Op, RecordingSleeper};

    /// Launcher returning a fixed result and recording how often it ran.
    struct StubLauncher {
        result: fn() -> Result<i32>,
        calls: Cell<usize>,
    }

    impl StubLauncher {
        fn new(result: fn() -> Result<i32>) -> Self {
            Self {
                result,
                calls: Cell::new(0),
            }
        }
    }

    impl Launcher for StubLauncher {
        fn launch(
            &self,
            _root: &Path,
            _user_spec: Option<&str>,
            _command: &[String],
        ) -> Result<i32> {
            self.calls.set(self.calls.get() + 1);
            (self.result)()
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        config: ChrootConfig,
        table: Arc<FakeMountTable>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("r1");
        std::fs::create_dir_all(&root).expect("mkdir");
        let host = dir.path().join("host-resolv.conf");
        std::fs::write(&host, b"nameserver 192.0.2.1\n").expect("write");
        let config = ChrootConfig::new(&root, Vec::new()).with_host_resolv(&host);
        Fixture {
            _dir: dir,
            root,
            config,
            table: Arc::new(FakeMountTable::new()),
        }
    }

    fn controller<'a, L: Launcher>(
        fx: &'a Fixture,
        config: &'a ChrootConfig,
        launcher: L,
    ) -> Controller<'a, FakeMountTable, L> {
        Controller::with_retry(
            config,
            Arc::clone(&fx.table),
            launcher,
            RetryPolicy::unmount(),
            Arc::new(RecordingSleeper::default()),
        )
    }

    fn no_interrupts() -> Receiver<()> {
        mpsc::channel().1
    }

    fn expected_ops(root: &Path) -> Vec<Op> {
        vec![
            Op::Mount(root.join("proc")),
            Op::Mount(root.join("sys")),
            Op::Mount(root.join("dev")),
            Op::Unmount(root.join("dev")),
            Op::Unmount(root.join("sys")),
            Op::Unmount(root.join("proc")),
        ]
    }

    #[test]
    fn normal_run_mounts_launches_and_cleans_up() {
        let fx = fixture();
        let launcher = StubLauncher::new(|| Ok(7));
        let ctl = controller(&fx, &fx.config, launcher);

        let code = ctl
            .run(no_interrupts(), |_| unreachable!("exit must not be called"))
            .expect("run");

        assert_eq!(code, 7);
        assert_eq!(ctl.launcher.calls.get(), 1);
        assert_eq!(fx.table.ops(), expected_ops(&fx.root));
        assert!(fx.table.mounted().is_empty());
        assert!(std::fs::symlink_metadata(fx.root.join("etc/resolv.conf")).is_err());
        assert_eq!(ctl.phase(), Phase::Done);
    }

    #[test]
    fn leftover_mount_is_reused_and_released() {
        let fx = fixture();
        let table = Arc::new(FakeMountTable::with_mounted([fx.root.join("proc")]));
        let ctl = Controller::with_retry(
            &fx.config,
            Arc::clone(&table),
            StubLauncher::new(|| Ok(0)),
            RetryPolicy::unmount(),
            Arc::new(RecordingSleeper::default()),
        );

        let code = ctl.run(no_interrupts(), |_| {}).expect("run");

        assert_eq!(code, 0);
        assert!(!table.ops().contains(&Op::Mount(fx.root.join("proc"))));
        assert!(table.mounted().is_empty());
    }

    #[test]
    fn skip_resolv_leaves_etc_untouched() {
        let fx = fixture();
        let config = fx.config.clone().with_skip_resolv(true);
        let ctl = controller(&fx, &config, StubLauncher::new(|| Ok(0)));

        let _ = ctl.run(no_interrupts(), |_| {}).expect("run");

        assert!(!fx.root.join("etc").exists());
    }

    #[test]
    fn mount_failure_aborts_without_teardown() {
        let fx = fixture();
        fx.table.fail_mount(fx.root.join("sys"));
        let ctl = controller(&fx, &fx.config, StubLauncher::new(|| Ok(0)));

        let err = ctl.run(no_interrupts(), |_| {}).expect_err("must fail");

        assert!(matches!(err, FchrootError::Mount { .. }));
        assert_eq!(ctl.launcher.calls.get(), 0);
        assert_eq!(fx.table.mounted(), vec![fx.root.join("proc")]);
        assert!(!fx.table.ops().iter().any(|op| matches!(op, Op::Unmount(_))));
    }

    #[test]
    fn resolv_failure_tears_mounts_down() {
        let fx = fixture();
        let config = fx.config.clone().with_host_resolv(fx.root.join("missing"));
        std::fs::create_dir_all(fx.root.join("etc")).expect("mkdir");
        std::fs::write(fx.root.join("etc/resolv.conf"), b"stale\n").expect("write");
        let ctl = controller(&fx, &config, StubLauncher::new(|| Ok(0)));

        let err = ctl.run(no_interrupts(), |_| {}).expect_err("must fail");

        assert!(matches!(err, FchrootError::ResolvOpen { .. }));
        assert_eq!(ctl.launcher.calls.get(), 0);
        assert!(fx.table.mounted().is_empty());
    }

    #[test]
    fn launch_failure_still_cleans_up() {
        let fx = fixture();
        let ctl = controller(
            &fx,
            &fx.config,
            StubLauncher::new(|| {
                Err(FchrootError::Launch {
                    program: "chroot".into(),
                    message: "not found".into(),
                })
            }),
        );

        let err = ctl.run(no_interrupts(), |_| {}).expect_err("must fail");

        assert!(matches!(err, FchrootError::Launch { .. }));
        assert_eq!(fx.table.ops(), expected_ops(&fx.root));
    }

    /// Launcher that raises an interrupt while "running" and waits until the
    /// watcher has called exit.
    struct InterruptingLauncher {
        interrupt: mpsc::Sender<()>,
        exited: mpsc::Receiver<(i32, Vec<PathBuf>)>,
        observed: Cell<Option<(i32, Vec<PathBuf>)>>,
    }

    impl Launcher for InterruptingLauncher {
        fn launch(
            &self,
            _root: &Path,
            _user_spec: Option<&str>,
            _command: &[String],
        ) -> Result<i32> {
            self.interrupt.send(()).expect("send interrupt");
            let seen = self
                .exited
                .recv_timeout(Duration::from_secs(10))
                .expect("watcher must call exit");
            self.observed.set(Some(seen));
            Ok(0)
        }
    }

    #[test]
    fn interrupt_while_running_unmounts_before_exit() {
        let fx = fixture();
        let (int_tx, int_rx) = mpsc::channel();
        let (exit_tx, exit_rx) = mpsc::channel();
        let launcher = InterruptingLauncher {
            interrupt: int_tx,
            exited: exit_rx,
            observed: Cell::new(None),
        };
        let ctl = controller(&fx, &fx.config, launcher);
        let table = Arc::clone(&fx.table);

        let code = ctl
            .run(int_rx, move |code| {
                exit_tx.send((code, table.mounted())).expect("report exit");
            })
            .expect("run");

        let (exit_code, mounted_at_exit) = ctl.launcher.observed.take().expect("observed");
        assert_eq!(exit_code, EXIT_FAILURE);
        assert!(mounted_at_exit.is_empty());
        assert_eq!(code, EXIT_FAILURE);
        assert_eq!(ctl.phase(), Phase::Interrupted);
        assert_eq!(fx.table.ops(), expected_ops(&fx.root));
    }

    /// Mount table that raises an interrupt while mounting `trigger` and
    /// holds the mount step open until the watcher has seen it.
    struct InterruptingTable {
        inner: FakeMountTable,
        trigger: PathBuf,
        interrupt: Mutex<Option<mpsc::Sender<()>>>,
        teardown: OnceLock<Arc<Teardown<Self>>>,
    }

    impl MountTable for InterruptingTable {
        fn is_mounted(&self, path: &Path) -> bool {
            self.inner.is_mounted(path)
        }

        fn mount(&self, spec: &MountSpec, target: &Path) -> Result<()> {
            self.inner.mount(spec, target)?;
            if target != self.trigger {
                return Ok(());
            }
            if let Some(tx) = self.interrupt.lock().unwrap().take() {
                tx.send(()).expect("send interrupt");
            }
            let teardown = self.teardown.get().expect("teardown registered");
            let deadline = Instant::now() + Duration::from_secs(10);
            while !teardown.is_interrupted() {
                assert!(Instant::now() < deadline, "watcher never saw the interrupt");
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        }

        fn unmount(&self, target: &Path) -> Result<()> {
            self.inner.unmount(target)
        }
    }

    #[test]
    fn interrupt_during_mounting_skips_launch() {
        let fx = fixture();
        let (int_tx, int_rx) = mpsc::channel();
        let (exit_tx, exit_rx) = mpsc::channel();
        let table = Arc::new(InterruptingTable {
            inner: FakeMountTable::new(),
            trigger: fx.root.join("dev"),
            interrupt: Mutex::new(Some(int_tx)),
            teardown: OnceLock::new(),
        });
        let ctl = Controller::with_retry(
            &fx.config,
            Arc::clone(&table),
            StubLauncher::new(|| Ok(0)),
            RetryPolicy::unmount(),
            Arc::new(RecordingSleeper::default()),
        );
        assert!(table.teardown.set(ctl.teardown()).is_ok());

        let code = ctl
            .run(int_rx, move |code| {
                exit_tx.send(code).expect("report exit");
            })
            .expect("run");
        let exit_code = exit_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("watcher must call exit");

        assert_eq!(code, EXIT_FAILURE);
        assert_eq!(exit_code, EXIT_FAILURE);
        assert_eq!(ctl.launcher.calls.get(), 0);
        assert_eq!(ctl.phase(), Phase::Interrupted);
        assert!(table.inner.mounted().is_empty());
        assert_eq!(table.inner.ops(), expected_ops(&fx.root));
        assert!(std::fs::symlink_metadata(fx.root.join("etc/resolv.conf")).is_err());
    }

    #[test]
    fn teardown_is_idempotent() {
        let fx = fixture();
        let ctl = controller(&fx, &fx.config, StubLauncher::new(|| Ok(0)));
        let _ = ctl.run(no_interrupts(), |_| {}).expect("run");
        let ops = fx.table.ops().len();

        let report = ctl.teardown().run();

        assert_eq!(report.skipped.len(), 3);
        assert_eq!(fx.table.ops().len(), ops);
    }
}
