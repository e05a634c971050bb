//! Filesystem state managed under the chroot root.
//!
//! Provides mount-state probing, essential mounting and unmounting, and
//! resolver configuration provisioning. Mount state is always queried live
//! from the kernel because other processes may change it at any time.

pub mod mount;
pub mod probe;
pub mod resolv;
pub mod unmount;

use std::path::Path;

use fchroot_common::error::Result;
use fchroot_common::types::MountSpec;

pub use probe::HostMountTable;

/// Access to the kernel mount table.
///
/// Implementors must answer [`MountTable::is_mounted`] from live state on
/// every call; callers rely on that to keep mounting and unmounting
/// idempotent across concurrent invocations.
pub trait MountTable: Send + Sync {
    /// Returns whether `path` is itself a mount point.
    ///
    /// Nonexistent and unmounted paths yield `false`.
    fn is_mounted(&self, path: &Path) -> bool;

    /// Mounts `spec` at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the mount.
    fn mount(&self, spec: &MountSpec, target: &Path) -> Result<()>;

    /// Unmounts whatever is mounted at `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the unmount, e.g. because the
    /// target is busy.
    fn unmount(&self, target: &Path) -> Result<()>;
}
