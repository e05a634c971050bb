//! Interrupt and termination handling.
//!
//! The process-wide handler only forwards the signal into a channel. A
//! dedicated watcher thread owns the receiving end and runs the supplied
//! action, which is expected to tear the mounts down and exit.

use std::sync::mpsc::{self, Receiver};
use std::thread::JoinHandle;

use fchroot_common::error::{FchrootError, Result};

/// Installs the process signal handler for `SIGINT`, `SIGTERM`, and
/// `SIGHUP`, returning the channel that receives one message per signal.
///
/// # Errors
///
/// Returns an error if a handler is already installed or the OS refuses
/// the installation.
pub fn install_handler() -> Result<Receiver<()>> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| signal_error("failed to install signal handler", &e))?;
    Ok(rx)
}

/// Background thread waiting for the first interrupt.
#[derive(Debug)]
pub struct SignalWatcher {
    handle: JoinHandle<()>,
}

impl SignalWatcher {
    /// Spawns the watcher thread.
    ///
    /// `on_interrupt` runs once when the first message arrives. If every
    /// sender is dropped first, the thread ends without running it.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<F>(interrupts: Receiver<()>, on_interrupt: F) -> Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = std::thread::Builder::new()
            .name("fchroot-signal".into())
            .spawn(move || {
                if interrupts.recv().is_ok() {
                    on_interrupt();
                }
            })
            .map_err(|e| signal_error("failed to start signal watcher", &e))?;
        Ok(Self { handle })
    }

    /// Waits for the watcher thread to finish.
    pub fn join(self) {
        let _ = self.handle.join();
    }
}

fn signal_error(step: &str, cause: &dyn std::fmt::Display) -> FchrootError {
    FchrootError::Signal {
        message: format!("{step}: {cause}"),
    }
}
