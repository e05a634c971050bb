//! # fchroot-core
//!
//! Mount lifecycle for a usable chroot environment.
//!
//! This crate provides:
//! - **Filesystem**: mount-state probing, essential mounts (`proc`, `sys`,
//!   `dev`), reverse-order teardown, and resolv.conf provisioning.
//! - **Retry**: a bounded retry combinator with an injectable sleeper.
//! - **Launcher**: the `chroot` invocation with inherited stdio.
//! - **Signal**: an interrupt watcher that runs teardown out of band.
//! - **Lifecycle**: the controller tying the steps together with
//!   guaranteed teardown on every exit path.
//!
//! Kernel access goes through the [`filesystem::MountTable`] trait so the
//! lifecycle can be exercised without root privileges.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod filesystem;
pub mod launcher;
pub mod lifecycle;
pub mod retry;
pub mod signal;

#[cfg(test)]
pub(crate) mod testing;
