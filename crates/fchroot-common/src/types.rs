//! Domain primitive types used across the fchroot workspace.

use std::fmt;
use std::path::{Path, PathBuf};

/// One entry of the essential mount table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountSpec {
    /// Directory name under the chroot root, also used in log output.
    pub name: &'static str,
    /// Host path or pseudo-filesystem source.
    pub source: &'static str,
    /// Filesystem type; `None` means a bind mount of `source`.
    pub fs_kind: Option<&'static str>,
}

impl MountSpec {
    /// Describes a typed mount such as `proc` or `sysfs`.
    #[must_use]
    pub const fn typed(name: &'static str, source: &'static str, fs_kind: &'static str) -> Self {
        Self {
            name,
            source,
            fs_kind: Some(fs_kind),
        }
    }

    /// Describes a bind mount of a host directory.
    #[must_use]
    pub const fn bind(name: &'static str, source: &'static str) -> Self {
        Self {
            name,
            source,
            fs_kind: None,
        }
    }

    /// Returns whether this entry is a bind mount.
    #[must_use]
    pub const fn is_bind(&self) -> bool {
        self.fs_kind.is_none()
    }

    /// Computes the mount point for this entry under `root`.
    ///
    /// The result is derived on every call and never cached.
    #[must_use]
    pub fn target(&self, root: &Path) -> PathBuf {
        root.join(self.name)
    }
}

impl fmt::Display for MountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fs_kind {
            Some(kind) => write!(f, "{} ({kind})", self.source),
            None => write!(f, "{} (bind)", self.source),
        }
    }
}

/// Lifecycle phase of a single chroot invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Pre-flight checks done, nothing touched yet.
    Init,
    /// Essential filesystems are being mounted.
    MountingEssentials,
    /// Resolver configuration is being provisioned.
    ResolvSetup,
    /// The confined command is running.
    Running,
    /// Mounts are being torn down on the normal path.
    CleaningUp,
    /// Teardown finished.
    Done,
    /// A signal arrived and early teardown took over.
    Interrupted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::MountingEssentials => write!(f, "mounting-essentials"),
            Self::ResolvSetup => write!(f, "resolv-setup"),
            Self::Running => write!(f, "running"),
            Self::CleaningUp => write!(f, "cleaning-up"),
            Self::Done => write!(f, "done"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}
