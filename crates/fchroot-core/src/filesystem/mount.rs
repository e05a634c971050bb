//! Essential filesystem mounting under the chroot root.
//!
//! Mounts `/proc`, `/sys`, and `/dev` in table order, creating mount points
//! as needed and skipping targets that are already mounted.

use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use fchroot_common::constants::{ESSENTIAL_MOUNTS, MOUNT_DIR_MODE};
use fchroot_common::error::{FchrootError, Result};
use fchroot_common::types::MountSpec;

use super::MountTable;

/// What a mount pass did to each target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountReport {
    /// Targets mounted by this pass, in mount order.
    pub mounted: Vec<PathBuf>,
    /// Targets that were already mounted and left alone.
    pub skipped: Vec<PathBuf>,
}

/// Mounts every essential filesystem under `root`.
///
/// # Errors
///
/// Returns an error if a mount point cannot be created or a mount fails.
/// Mounts made earlier in the same pass are left in place.
pub fn mount_all<M: MountTable + ?Sized>(table: &M, root: &Path) -> Result<MountReport> {
    mount_specs(table, root, &ESSENTIAL_MOUNTS)
}

/// Mounts `specs` under `root` in the given order, stopping at the first
/// failure.
///
/// # Errors
///
/// Returns [`FchrootError::DirectoryCreate`] or [`FchrootError::Mount`] for
/// the first step that fails.
pub fn mount_specs<M: MountTable + ?Sized>(
    table: &M,
    root: &Path,
    specs: &[MountSpec],
) -> Result<MountReport> {
    tracing::info!(root = %root.display(), "mounting essential filesystems");
    let mut report = MountReport::default();

    for spec in specs {
        let target = spec.target(root);
        create_mount_point(&target)?;

        if table.is_mounted(&target) {
            tracing::debug!(target = %target.display(), "already mounted, skipping");
            report.skipped.push(target);
            continue;
        }

        tracing::debug!(source = %spec, target = %target.display(), "mounting");
        table.mount(spec, &target)?;
        tracing::info!(name = spec.name, target = %target.display(), "mounted");
        report.mounted.push(target);
    }

    Ok(report)
}

fn create_mount_point(target: &Path) -> Result<()> {
    let fail = |source: io::Error| FchrootError::DirectoryCreate {
        path: target.to_path_buf(),
        source,
    };
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(MOUNT_DIR_MODE)
        .create(target)
        .map_err(fail)?;

    // A symlink here would redirect the mount onto the host.
    if std::fs::symlink_metadata(target)
        .map_err(fail)?
        .file_type()
        .is_symlink()
    {
        return Err(fail(io::Error::new(
            io::ErrorKind::InvalidInput,
            "mount point is a symbolic link",
        )));
    }
    Ok(())
}
