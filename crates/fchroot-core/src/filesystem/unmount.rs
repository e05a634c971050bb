//! Reverse-order teardown of the essential mounts.
//!
//! Teardown never fails as a whole: each target is attempted regardless of
//! what happened to the others, and failures are returned as diagnostics.

use std::path::{Path, PathBuf};

use fchroot_common::constants::{CHROOT_RESOLV_CONF, ESSENTIAL_MOUNTS};
use fchroot_common::error::FchrootError;
use fchroot_common::types::MountSpec;

use super::MountTable;
use crate::retry::{RetryPolicy, Sleeper, retry};

/// A target that stayed mounted after every retry.
#[derive(Debug)]
pub struct UnmountFailure {
    /// Mount point that is still mounted.
    pub target: PathBuf,
    /// Error from the final attempt.
    pub error: FchrootError,
}

impl UnmountFailure {
    /// Command the operator can run to finish the job by hand.
    #[must_use]
    pub fn remedy(&self) -> String {
        format!("umount {}", self.target.display())
    }
}

/// Outcome of a teardown pass.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Targets unmounted by this pass, in unmount order.
    pub unmounted: Vec<PathBuf>,
    /// Targets that were not mounted.
    pub skipped: Vec<PathBuf>,
    /// Targets that could not be unmounted.
    pub failures: Vec<UnmountFailure>,
    /// Whether a resolv.conf symlink was removed.
    pub resolv_link_removed: bool,
}

impl TeardownReport {
    /// Returns whether every mounted target was released.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Unmounts the essential filesystems under `root` in reverse mount order,
/// then removes a resolv.conf symlink if one is present.
pub fn unmount_all<M, S>(
    table: &M,
    root: &Path,
    policy: &RetryPolicy,
    sleeper: &S,
) -> TeardownReport
where
    M: MountTable + ?Sized,
    S: Sleeper + ?Sized,
{
    unmount_specs(table, root, &ESSENTIAL_MOUNTS, policy, sleeper)
}

/// Unmounts `specs` under `root`, walking the slice backwards.
pub fn unmount_specs<M, S>(
    table: &M,
    root: &Path,
    specs: &[MountSpec],
    policy: &RetryPolicy,
    sleeper: &S,
) -> TeardownReport
where
    M: MountTable + ?Sized,
    S: Sleeper + ?Sized,
{
    tracing::info!(root = %root.display(), "unmounting filesystems");
    let mut report = TeardownReport::default();

    for spec in specs.iter().rev() {
        let target = spec.target(root);

        if !table.is_mounted(&target) {
            tracing::debug!(target = %target.display(), "not mounted, skipping");
            report.skipped.push(target);
            continue;
        }

        tracing::debug!(target = %target.display(), "unmounting");
        match retry(policy, sleeper, |_| table.unmount(&target)) {
            Ok(()) => {
                tracing::info!(target = %target.display(), "unmounted");
                report.unmounted.push(target);
            }
            Err(error) => {
                let failure = UnmountFailure { target, error };
                tracing::error!(
                    target = %failure.target.display(),
                    attempts = policy.attempts,
                    error = %failure.error,
                    remedy = %failure.remedy(),
                    "failed to unmount, unmount it manually"
                );
                report.failures.push(failure);
            }
        }
    }

    report.resolv_link_removed = remove_resolv_link(&root.join(CHROOT_RESOLV_CONF));
    tracing::info!(
        unmounted = report.unmounted.len(),
        failed = report.failures.len(),
        "cleanup completed"
    );
    report
}

// A regular file may be user content, so only symlinks are removed.
fn remove_resolv_link(path: &Path) -> bool {
    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return false;
    };
    if !meta.file_type().is_symlink() {
        return false;
    }
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed resolv.conf symlink");
            true
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "could not remove resolv.conf symlink");
            false
        }
    }
}
