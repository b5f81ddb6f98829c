// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Protocol constants shared between the starter and the watchdog.

use std::os::unix::io::RawFd;

/// Descriptor number the watchdog expects its feedback channel on. The
/// launcher rebinds the child end of the channel here before exec, and the
/// number is also passed in the argument vector.
pub const FEEDBACK_FD: RawFd = 3;

/// argv[0] of the watchdog process.
pub(crate) const WATCHDOG_PROGRAM_NAME: &str = "helper-watchdog";

/// Leading token of a successful startup report.
pub(crate) const MSG_INITIALIZED: &str = "initialized";

/// Leading token of a failed OS-facing operation, reported either by the
/// pre-exec child or by the watchdog itself.
pub(crate) const MSG_SYSTEM_ERROR: &str = "system error";

/// Leading token reporting that the watchdog binary could not be executed.
pub(crate) const MSG_EXEC_ERROR: &str = "exec error";

/// Principal the starter authenticates as on the control socket.
pub(crate) const CONTROL_PRINCIPAL: &str = "_web_server";

/// The graceful-exit command.
pub(crate) const CONTROL_EXIT_COMMAND: &str = "exit";

/// Authentication acknowledgement expected after the exit command.
pub(crate) const CONTROL_AUTH_OK: &str = "Passed security";

/// Command acknowledgement expected after the authentication one.
pub(crate) const CONTROL_EXIT_ACK: &str = "exit command received";

/// The clean-shutdown sentinel written to the feedback descriptor after a
/// fully acknowledged exit exchange. Its value is irrelevant; its presence
/// tells the watchdog the owner asked for this exit.
pub(crate) const SHUTDOWN_SENTINEL: &[u8] = b"x";
