// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg(unix)]

mod exec;
mod fds;
mod interrupt;
mod process;

pub use exec::{PreparedExec, PreparedExecError};
pub use fds::close_inherited_fds;
pub use interrupt::InterruptGuard;
pub use process::{kill_and_reap, terminate, wait_for_readable, waitpid_blocking, PollError};
