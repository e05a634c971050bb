//! System-wide constants and default paths.

use std::time::Duration;

use crate::types::MountSpec;

/// Pseudo-filesystems mounted inside every chroot, in mount order.
///
/// Teardown walks this table backwards.
pub const ESSENTIAL_MOUNTS: [MountSpec; 3] = [
    MountSpec::typed("proc", "/proc", "proc"),
    MountSpec::typed("sys", "/sys", "sysfs"),
    MountSpec::bind("dev", "/dev"),
];

/// Command run inside the chroot when none is given.
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Host resolver configuration exposed inside the chroot.
pub const HOST_RESOLV_CONF: &str = "/etc/resolv.conf";

/// Directory inside the chroot that holds the resolver configuration.
pub const CHROOT_ETC_DIR: &str = "etc";

/// Resolver configuration path relative to the chroot root.
pub const CHROOT_RESOLV_CONF: &str = "etc/resolv.conf";

/// Permission bits for directories created under the chroot root.
pub const MOUNT_DIR_MODE: u32 = 0o755;

/// Total number of unmount attempts per target.
pub const UNMOUNT_ATTEMPTS: u32 = 3;

/// Pause between two unmount attempts.
pub const UNMOUNT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Kernel mount table of the calling process.
pub const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// Binary that performs the actual confinement.
pub const CHROOT_BINARY: &str = "chroot";

/// Exit code for setup failures, launch failures, and interruption.
pub const EXIT_FAILURE: i32 = 1;

/// Offset added to a signal number when the child dies from a signal.
pub const SIGNAL_EXIT_BASE: i32 = 128;
