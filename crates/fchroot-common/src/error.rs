//! Unified error types for the fchroot workspace.
//!
//! Every failure is sorted into one of three classes. Setup failures abort
//! the run, teardown failures are reported and skipped, and launch failures
//! end the run without a command exit code to report.

use std::path::PathBuf;

use thiserror::Error;

/// How a failure propagates through the chroot lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Aborts setup immediately and terminates the process.
    SetupFatal,
    /// Logged as a diagnostic; teardown continues with the next target.
    TeardownSoft,
    /// The confined command could not be started at all.
    LaunchFatal,
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum FchrootError {
    /// A mount point or configuration directory could not be created.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The kernel rejected a mount request.
    #[error("failed to mount {source_path} -> {target}: {source}")]
    Mount {
        /// Mount source (host path or pseudo-filesystem name).
        source_path: PathBuf,
        /// Mount point inside the chroot.
        target: PathBuf,
        /// Underlying error reported by `mount(2)`.
        source: std::io::Error,
    },

    /// The kernel rejected an unmount request.
    #[error("failed to unmount {target}: {source}")]
    Unmount {
        /// Mount point that is still mounted.
        target: PathBuf,
        /// Underlying error reported by `umount2(2)`.
        source: std::io::Error,
    },

    /// An existing resolv.conf inside the chroot could not be replaced.
    #[error("failed to remove existing {path}: {source}")]
    ResolvRemove {
        /// Path of the entry that could not be removed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The host resolver configuration could not be opened.
    #[error("failed to open {path}: {source}")]
    ResolvOpen {
        /// Host resolver file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Copying the host resolver configuration into the chroot failed.
    #[error("failed to copy resolv.conf to {path}: {source}")]
    ResolvCopy {
        /// Destination inside the chroot.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The confinement command could not be started.
    #[error("failed to launch {program}: {message}")]
    Launch {
        /// Program that was being started.
        program: String,
        /// Description of the launch failure.
        message: String,
    },

    /// A permission or privilege requirement is not met.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Description of the denied operation.
        message: String,
    },

    /// Signal handling could not be set up.
    #[error("signal handling failed: {message}")]
    Signal {
        /// Description of the failed step.
        message: String,
    },
}

impl FchrootError {
    /// Returns the propagation class of this error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Unmount { .. } => ErrorClass::TeardownSoft,
            Self::Launch { .. } => ErrorClass::LaunchFatal,
            Self::DirectoryCreate { .. }
            | Self::Mount { .. }
            | Self::ResolvRemove { .. }
            | Self::ResolvOpen { .. }
            | Self::ResolvCopy { .. }
            | Self::PermissionDenied { .. }
            | Self::Signal { .. } => ErrorClass::SetupFatal,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, FchrootError>;
