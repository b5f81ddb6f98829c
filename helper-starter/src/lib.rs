// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Starts and supervises the watchdog that runs the helper server for an
//! Apache or Nginx frontend.
//!
//! Architecturally this is a single startup episode and its teardown:
//! 1. A Unix socket pair is created before forking. The child rebinds its
//!    end onto descriptor 3, closes every other inherited descriptor, and
//!    executes the watchdog binary with a fixed positional argument vector.
//!    Failures before the exec are reported back over that same channel as
//!    token messages, so the parent can tell an exec failure apart from a
//!    crash later on.
//! 2. The parent reads exactly one startup report from the channel. A
//!    successful report carries the helper server's socket endpoints (with
//!    base64-encoded passwords) and its registration in the server instance
//!    directory. A closed channel with no report triggers the startup
//!    post-mortem: a still-running watchdog is killed for violating the
//!    protocol, one killed by a signal is named by it, and a clean exit
//!    without a report is a crash for an unknown reason. Every failure
//!    branch kills and reaps the watchdog before the error is surfaced.
//! 3. Discarding a live [`HelperStarter`] runs the shutdown sequence: a
//!    graceful `exit` exchange over the control socket, the one-byte
//!    clean-shutdown sentinel when that exchange fully succeeds, and an
//!    unconditional close-and-reap either way.
//!
//! The watchdog itself owns pool policy and the helper server's request
//! loop; this crate only starts, authenticates, and tears it down.

#![cfg(unix)]

mod config;
mod constants;
mod error;
mod feedback;
mod handshake;
mod instance_dir;
mod launcher;
mod shutdown;
mod supervisor;

pub use config::{FrontendKind, StarterConfig};
pub use constants::FEEDBACK_FD;
pub use error::{InstanceDirError, StartError};
pub use instance_dir::{Generation, InstanceDir};
pub use supervisor::{HelperStarter, RunningHelper, SocketEndpoint};
