// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Spawns the watchdog: prepares argv and an environment snapshot before
//! the fork, rebinds the feedback channel onto the protocol descriptor in
//! the child, scrubs every other inherited descriptor, and execs. The child
//! reports its own failures back over the feedback channel so the parent's
//! handshake can tell "could not even exec" apart from "crashed later".

use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd};
use std::os::unix::net::UnixStream;
use std::path::Path;

use hscommon::unix_utils::{close_inherited_fds, terminate, InterruptGuard, PreparedExec};
use hscommon::MessageChannel;
use nix::errno::Errno;
use nix::sys::signal::{self, SigSet, SigmaskHow};
use nix::unistd::{fork, ForkResult, Pid};
use tracing::debug;

use crate::config::{FrontendKind, StarterConfig};
use crate::constants::{FEEDBACK_FD, MSG_EXEC_ERROR, MSG_SYSTEM_ERROR};
use crate::error::StartError;
use crate::feedback::FeedbackChannel;

pub(crate) struct LaunchedWatchdog {
    pub(crate) pid: Pid,
    pub(crate) feedback: OwnedFd,
}

/// Forks and executes the watchdog binary at `binary`, handing it the child
/// end of a fresh feedback channel on descriptor 3. The fork runs with
/// asynchronous signals blocked; the parent end and the pid come back as
/// exclusively owned state.
pub(crate) fn spawn_watchdog(
    kind: FrontendKind,
    config: &StarterConfig,
    binary: &Path,
) -> Result<LaunchedWatchdog, StartError> {
    let binary_str = binary
        .to_str()
        .ok_or(StartError::InvalidConfig("the installation root must be valid UTF-8"))?;
    let args = config.watchdog_args(kind);
    // The watchdog inherits this process's environment. Entries that are
    // not valid UTF-8 are dropped rather than panicking the launch.
    let env: Vec<(String, String)> = std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect();
    let prepared = PreparedExec::new(binary_str, &args, &env)
        .map_err(|_| StartError::InvalidConfig("watchdog arguments must not contain NUL bytes"))?;

    let channel = FeedbackChannel::create()?;
    let guard = InterruptGuard::block();
    let (parent_end, child_end) = channel.into_ends();

    // Safety: the child only runs the code in this module before exec.
    match unsafe { fork() } {
        Ok(ForkResult::Child) => run_watchdog_child(parent_end, child_end, &prepared, binary_str),
        Ok(ForkResult::Parent { child }) => {
            drop(child_end);
            drop(guard);
            debug!(pid = child.as_raw(), watchdog = binary_str, "spawned helper watchdog");
            Ok(LaunchedWatchdog {
                pid: child,
                feedback: parent_end,
            })
        }
        Err(errno) => {
            drop(guard);
            Err(StartError::Fork(errno))
        }
    }
}

fn run_watchdog_child(
    parent_end: OwnedFd,
    child_end: OwnedFd,
    prepared: &PreparedExec,
    binary: &str,
) -> ! {
    // Undo the spawn guard's mask; the watchdog must not inherit a fully
    // blocked signal set across exec.
    let _ = signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None);
    drop(parent_end);

    let raw = child_end.as_raw_fd();
    if raw != FEEDBACK_FD {
        // Safety: raw is a valid open descriptor owned by child_end.
        if unsafe { libc::dup2(raw, FEEDBACK_FD) } == -1 {
            report_startup_failure(child_end, "dup2() failed", Errno::last());
        }
        drop(child_end);
    } else {
        // Already on the protocol slot; leave it open across exec.
        let _ = child_end.into_raw_fd();
    }
    let _ = close_inherited_fds(FEEDBACK_FD + 1);

    let errno = prepared.exec();
    // Only reachable when exec failed.
    // Safety: descriptor 3 is the channel end rebound above.
    let stream = unsafe { UnixStream::from_raw_fd(FEEDBACK_FD) };
    let mut channel = MessageChannel::new(stream);
    if channel
        .write_message(&[MSG_EXEC_ERROR, &(errno as i32).to_string()])
        .is_err()
    {
        eprintln!("helper-starter: could not execute {binary}: {errno}");
    }
    terminate();
}

/// Last-resort child reporting: try the feedback channel, fall back to
/// stderr, then exit non-zero.
fn report_startup_failure(end: OwnedFd, message: &str, errno: Errno) -> ! {
    let mut channel = MessageChannel::new(UnixStream::from(end));
    if channel
        .write_message(&[MSG_SYSTEM_ERROR, message, &(errno as i32).to_string()])
        .is_err()
    {
        eprintln!("helper-starter: {message}: {errno}");
    }
    terminate();
}
