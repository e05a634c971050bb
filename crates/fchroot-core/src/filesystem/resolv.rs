//! Name resolution inside the chroot.
//!
//! Links the chroot's `etc/resolv.conf` to the host file so resolver
//! changes stay visible, and falls back to a byte copy when the link cannot
//! be created.

use std::fs::File;
use std::path::Path;

use fchroot_common::constants::{CHROOT_ETC_DIR, CHROOT_RESOLV_CONF, MOUNT_DIR_MODE};
use fchroot_common::error::{FchrootError, Result};

/// How the resolver configuration was made available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvOutcome {
    /// A symbolic link to the host file was created.
    Linked,
    /// The host file was copied byte for byte.
    Copied,
}

/// Exposes `host_resolv` as `etc/resolv.conf` under `root`.
///
/// # Errors
///
/// Returns an error if `etc` cannot be created, an existing entry cannot be
/// removed, the host file cannot be opened, or the copy fails.
pub fn provision(root: &Path, host_resolv: &Path) -> Result<ResolvOutcome> {
    use std::os::unix::fs::DirBuilderExt;

    let etc = root.join(CHROOT_ETC_DIR);
    let dest = root.join(CHROOT_RESOLV_CONF);
    tracing::debug!(dest = %dest.display(), "setting up resolv.conf");

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(MOUNT_DIR_MODE)
        .create(&etc)
        .map_err(|e| FchrootError::DirectoryCreate {
            path: etc.clone(),
            source: e,
        })?;

    match std::os::unix::fs::symlink(host_resolv, &dest) {
        Ok(()) => {
            tracing::info!(
                host = %host_resolv.display(),
                dest = %dest.display(),
                "resolv.conf symlinked"
            );
            return Ok(ResolvOutcome::Linked);
        }
        Err(e) => {
            tracing::debug!(dest = %dest.display(), error = %e, "symlink failed, copying instead");
        }
    }

    copy_resolv(host_resolv, &dest)?;
    tracing::info!(
        host = %host_resolv.display(),
        dest = %dest.display(),
        "resolv.conf copied"
    );
    Ok(ResolvOutcome::Copied)
}

fn copy_resolv(host_resolv: &Path, dest: &Path) -> Result<()> {
    if std::fs::symlink_metadata(dest).is_ok() {
        std::fs::remove_file(dest).map_err(|e| FchrootError::ResolvRemove {
            path: dest.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(path = %dest.display(), "removed existing resolv.conf");
    }

    let mut src = File::open(host_resolv).map_err(|e| FchrootError::ResolvOpen {
        path: host_resolv.to_path_buf(),
        source: e,
    })?;
    let mut dst = File::create(dest).map_err(|e| FchrootError::ResolvCopy {
        path: dest.to_path_buf(),
        source: e,
    })?;
    let _ = std::io::copy(&mut src, &mut dst).map_err(|e| FchrootError::ResolvCopy {
        path: dest.to_path_buf(),
        source: e,
    })?;
    Ok(())
}
