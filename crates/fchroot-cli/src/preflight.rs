//! Checks that must pass before anything under the chroot is touched.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use fchroot_common::config::ChrootConfig;
use fchroot_common::error::FchrootError;
use nix::unistd::Uid;

use crate::args::Cli;

/// Turns parsed arguments into the immutable run configuration.
///
/// # Errors
///
/// Returns an error if the process is not root or the chroot directory is
/// unusable.
pub fn build_config(cli: Cli) -> anyhow::Result<ChrootConfig> {
    require_root()?;
    let root = resolve_root(&cli.chroot_dir)?;
    tracing::debug!(root = %root.display(), "using chroot directory");

    Ok(ChrootConfig::new(root, cli.command)
        .with_user_spec(cli.user_spec)
        .with_skip_resolv(cli.skip_resolv))
}

fn require_root() -> anyhow::Result<()> {
    ensure_root(nix::unistd::geteuid())?;
    Ok(())
}

fn ensure_root(euid: Uid) -> fchroot_common::error::Result<()> {
    if euid.is_root() {
        Ok(())
    } else {
        Err(FchrootError::PermissionDenied {
            message: "This program must be run as root".into(),
        })
    }
}

/// Makes `dir` absolute after checking that it is an existing directory.
///
/// # Errors
///
/// Returns an error if `dir` is missing, not a directory, or cannot be made
/// absolute.
pub fn resolve_root(dir: &Path) -> anyhow::Result<PathBuf> {
    let meta = std::fs::metadata(dir)
        .with_context(|| format!("Chroot directory does not exist: {}", dir.display()))?;
    if !meta.is_dir() {
        bail!("Chroot path is not a directory: {}", dir.display());
    }
    std::path::absolute(dir)
        .with_context(|| format!("Failed to get absolute path of {}", dir.display()))
}
