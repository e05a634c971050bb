//! # fchroot
//!
//! Runs a command inside a chroot after mounting `proc`, `sys`, and `dev`
//! and exposing the host's resolver configuration. Mounts are removed when
//! the command exits or when fchroot receives an interrupt.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod args;
mod preflight;

use std::sync::Arc;

use clap::Parser;
use fchroot_common::constants::EXIT_FAILURE;
use fchroot_core::filesystem::HostMountTable;
use fchroot_core::launcher::ChrootLauncher;
use fchroot_core::lifecycle::Controller;
use tracing_subscriber::EnvFilter;

use crate::args::Cli;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("error: {e:#}");
            }
            EXIT_FAILURE
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = preflight::build_config(cli)?;
    let interrupts = fchroot_core::signal::install_handler()?;

    let controller = Controller::new(
        &config,
        Arc::new(HostMountTable::new()),
        ChrootLauncher::new(),
    );
    controller
        .run(interrupts, |code| std::process::exit(code))
        .map_err(|e| {
            tracing::debug!(class = ?e.class(), "session failed");
            e.into()
        })
}
