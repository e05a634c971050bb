//! Mount-point detection and kernel mount calls for the host.

use std::ffi::OsString;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

use fchroot_common::constants::MOUNTINFO_PATH;
use fchroot_common::error::{FchrootError, Result};
use fchroot_common::types::MountSpec;

use super::MountTable;

/// Mount table of the running kernel.
///
/// Reads `/proc/self/mountinfo` for probing and issues `mount(2)` and
/// `umount2(2)` directly.
#[derive(Debug, Clone)]
pub struct HostMountTable {
    mountinfo: PathBuf,
}

impl HostMountTable {
    /// Creates a table backed by the calling process's mountinfo.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mountinfo(MOUNTINFO_PATH)
    }

    /// Creates a table that probes an alternative mountinfo file.
    #[must_use]
    pub fn with_mountinfo(path: impl Into<PathBuf>) -> Self {
        Self {
            mountinfo: path.into(),
        }
    }
}

impl Default for HostMountTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MountTable for HostMountTable {
    fn is_mounted(&self, path: &Path) -> bool {
        let wanted = resolve_mount_point(path);
        match std::fs::read(&self.mountinfo) {
            Ok(content) => mount_points(&content).any(|point| point == wanted),
            Err(e) => {
                tracing::debug!(
                    mountinfo = %self.mountinfo.display(),
                    error = %e,
                    "mount table unreadable, treating path as unmounted"
                );
                false
            }
        }
    }

    fn mount(&self, spec: &MountSpec, target: &Path) -> Result<()> {
        mount_spec(spec, target)
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        unmount_target(target)
    }
}

/// Resolves `path` the way mountinfo lists it without following a symlink
/// in the final component.
fn resolve_mount_point(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map_or_else(|_| path.to_path_buf(), |parent| parent.join(name)),
        _ => std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

/// Iterates over the mount-point column of mountinfo content.
///
/// Octal escapes such as `\040` are decoded. Malformed lines are skipped.
pub fn mount_points(content: &[u8]) -> impl Iterator<Item = PathBuf> + '_ {
    content
        .split(|&b| b == b'\n')
        .filter_map(|line| line.split(|&b| b == b' ').nth(4))
        .map(|field| PathBuf::from(OsString::from_vec(unescape(field))))
}

fn unescape(field: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(field.len());
    let mut i = 0;
    while i < field.len() {
        if field[i] == b'\\' {
            if let Some(byte) = field.get(i + 1..i + 4).and_then(decode_octal) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(field[i]);
        i += 1;
    }
    out
}

fn decode_octal(digits: &[u8]) -> Option<u8> {
    let mut value: u16 = 0;
    for &d in digits {
        if !(b'0'..=b'7').contains(&d) {
            return None;
        }
        value = value * 8 + u16::from(d - b'0');
    }
    u8::try_from(value).ok()
}

#[cfg(target_os = "linux")]
fn mount_spec(spec: &MountSpec, target: &Path) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    let flags = if spec.is_bind() {
        MsFlags::MS_BIND
    } else {
        MsFlags::empty()
    };
    mount(Some(spec.source), target, spec.fs_kind, flags, None::<&str>).map_err(|e| {
        FchrootError::Mount {
            source_path: PathBuf::from(spec.source),
            target: target.to_path_buf(),
            source: e.into(),
        }
    })
}

#[cfg(not(target_os = "linux"))]
fn mount_spec(spec: &MountSpec, target: &Path) -> Result<()> {
    Err(FchrootError::Mount {
        source_path: PathBuf::from(spec.source),
        target: target.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Unsupported, "Linux required"),
    })
}

#[cfg(target_os = "linux")]
fn unmount_target(target: &Path) -> Result<()> {
    use nix::mount::{MntFlags, umount2};

    umount2(target, MntFlags::UMOUNT_NOFOLLOW).map_err(|e| {
        FchrootError::Unmount {
            target: target.to_path_buf(),
            source: e.into(),
        }
    })
}

#[cfg(not(target_os = "linux"))]
fn unmount_target(target: &Path) -> Result<()> {
    Err(FchrootError::Unmount {
        target: target.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Unsupported, "Linux required"),
    })
}
