//! In-memory fakes for exercising the lifecycle without root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use fchroot_common::error::{FchrootError, Result};
use fchroot_common::types::MountSpec;

use crate::filesystem::MountTable;
use crate::retry::Sleeper;

const EPERM: i32 = 1;
const EBUSY: i32 = 16;
const EINVAL: i32 = 22;

/// A mount-table call recorded by [`FakeMountTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Mount(PathBuf),
    Unmount(PathBuf),
}

#[derive(Debug, Default)]
struct State {
    mounted: Vec<PathBuf>,
    ops: Vec<Op>,
    failing_mounts: Vec<PathBuf>,
    unmount_failures: HashMap<PathBuf, u32>,
}

/// Mount table that keeps its state in memory and records every call.
#[derive(Debug, Default)]
pub struct FakeMountTable {
    state: Mutex<State>,
}

impl FakeMountTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mounted(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let table = Self::new();
        table.lock().mounted.extend(paths);
        table
    }

    pub fn fail_mount(&self, target: PathBuf) {
        self.lock().failing_mounts.push(target);
    }

    /// Makes the next `times` unmounts of `target` fail with `EBUSY`.
    pub fn fail_unmount(&self, target: PathBuf, times: u32) {
        let _ = self.lock().unmount_failures.insert(target, times);
    }

    pub fn ops(&self) -> Vec<Op> {
        self.lock().ops.clone()
    }

    pub fn mounted(&self) -> Vec<PathBuf> {
        self.lock().mounted.clone()
    }

    pub fn unmount_attempts(&self, target: &Path) -> usize {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Unmount(p) if p == target))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl MountTable for FakeMountTable {
    fn is_mounted(&self, path: &Path) -> bool {
        self.lock().mounted.iter().any(|p| p == path)
    }

    fn mount(&self, spec: &MountSpec, target: &Path) -> Result<()> {
        let mut state = self.lock();
        state.ops.push(Op::Mount(target.to_path_buf()));
        if state.failing_mounts.iter().any(|p| p == target) {
            return Err(FchrootError::Mount {
                source_path: PathBuf::from(spec.source),
                target: target.to_path_buf(),
                source: std::io::Error::from_raw_os_error(EPERM),
            });
        }
        state.mounted.push(target.to_path_buf());
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        let mut state = self.lock();
        state.ops.push(Op::Unmount(target.to_path_buf()));
        if let Some(remaining) = state.unmount_failures.get_mut(target) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FchrootError::Unmount {
                    target: target.to_path_buf(),
                    source: std::io::Error::from_raw_os_error(EBUSY),
                });
            }
        }
        let before = state.mounted.len();
        state.mounted.retain(|p| p != target);
        if state.mounted.len() == before {
            return Err(FchrootError::Unmount {
                target: target.to_path_buf(),
                source: std::io::Error::from_raw_os_error(EINVAL),
            });
        }
        Ok(())
    }
}

/// Sleeper that records requested pauses instead of blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
