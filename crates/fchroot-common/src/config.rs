//! Run configuration for a single fchroot invocation.

use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_SHELL, HOST_RESOLV_CONF};

/// Immutable settings for one chroot session.
///
/// Built once at startup and passed by reference to every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChrootConfig {
    /// Absolute path of the chroot root.
    pub root: PathBuf,
    /// Optional `user[:group]` the command runs as.
    pub user_spec: Option<String>,
    /// Skip resolver configuration provisioning.
    pub skip_resolv: bool,
    /// Command and arguments to run inside the chroot. Never empty.
    pub command: Vec<String>,
    /// Host resolver configuration to expose inside the chroot.
    pub host_resolv: PathBuf,
}

impl ChrootConfig {
    /// Creates a configuration for `root`, falling back to the default
    /// shell when `command` is empty.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, command: Vec<String>) -> Self {
        let command = if command.is_empty() {
            vec![DEFAULT_SHELL.to_owned()]
        } else {
            command
        };
        Self {
            root: root.into(),
            user_spec: None,
            skip_resolv: false,
            command,
            host_resolv: PathBuf::from(HOST_RESOLV_CONF),
        }
    }

    /// Sets the `user[:group]` specification. Empty strings are ignored.
    #[must_use]
    pub fn with_user_spec(mut self, user_spec: Option<String>) -> Self {
        self.user_spec = user_spec.filter(|s| !s.is_empty());
        self
    }

    /// Enables or disables resolver configuration provisioning.
    #[must_use]
    pub const fn with_skip_resolv(mut self, skip: bool) -> Self {
        self.skip_resolv = skip;
        self
    }

    /// Overrides the host resolver configuration path.
    #[must_use]
    pub fn with_host_resolv(mut self, path: impl Into<PathBuf>) -> Self {
        self.host_resolv = path.into();
        self
    }

    /// Returns the chroot root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
