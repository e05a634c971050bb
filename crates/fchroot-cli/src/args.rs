//! Command-line definition.

use std::path::PathBuf;

use clap::Parser;

const AFTER_HELP: &str = "\
Examples:
  fchroot /mnt/chroot
  fchroot -u nobody /mnt/chroot /bin/sh
  fchroot -v /mnt/chroot /bin/bash -l

Default command: /bin/bash

proc, sys, and dev are mounted under CHROOT_DIR before the command starts
and unmounted after it exits or when fchroot is interrupted.";

/// fchroot — simple chroot wrapper with auto-mounting.
#[derive(Parser, Debug)]
#[command(name = "fchroot", version, about, long_about = None, after_help = AFTER_HELP)]
pub struct Cli {
    /// Run the command as USER[:GROUP].
    #[arg(short = 'u', long = "userspec", value_name = "USER[:GROUP]")]
    pub user_spec: Option<String>,

    /// Do not set up resolv.conf inside the chroot.
    #[arg(short = 'r', long = "skip-resolv")]
    pub skip_resolv: bool,

    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory to chroot into.
    #[arg(value_name = "CHROOT_DIR")]
    pub chroot_dir: PathBuf,

    /// Command and arguments to run inside the chroot.
    #[arg(value_name = "COMMAND", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}
