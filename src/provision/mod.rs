// src/provision/mod.rs

//! What gets run on the host, and in which order.
//!
//! - [`command`]: quoted shell command construction.
//! - [`install`]: the `hab` installer and the `hab` user.
//! - [`supervisor`]: supervisor install and launch (unmanaged or systemd).
//! - [`service`]: per-service install, `user.toml` and `hab sup start`.
//! - [`sequence`]: the stage controller tying them together.

pub mod command;
pub mod install;
pub mod sequence;
pub mod service;
pub mod supervisor;

pub use command::{ShellCommand, shell_quote};
pub use sequence::{ProvisionOutcome, Provisioner, Stage, StageFailure, provision};
