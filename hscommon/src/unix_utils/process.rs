// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use libc::{nfds_t, poll, pollfd, POLLERR, POLLHUP, POLLIN};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use std::os::unix::io::RawFd;
use thiserror::Error;

use super::interrupt::InterruptGuard;
use crate::deadline::Deadline;

#[derive(Debug, Eq, PartialEq, Error)]
pub enum PollError {
    #[error("poll failed with errno {0}")]
    Poll(i32),
    #[error("poll returned unexpected revents {0:#x}")]
    Unexpected(i16),
}

/// Blocking reap of a single child, retrying `EINTR`.
pub fn waitpid_blocking(pid: Pid) -> nix::Result<WaitStatus> {
    loop {
        match waitpid(pid, None) {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}

/// SIGKILL followed by a blocking reap. The pair runs with asynchronous
/// signals blocked: tearing it in the middle is exactly how a process leak
/// or a double reap happens.
pub fn kill_and_reap(pid: Pid) {
    let _guard = InterruptGuard::block();
    let _ = signal::kill(pid, Signal::SIGKILL);
    let _ = waitpid_blocking(pid);
}

/// Waits until `fd` has data or a hangup to deliver, or the deadline
/// expires. Returns `Ok(false)` on an expired deadline.
pub fn wait_for_readable(fd: RawFd, deadline: &Deadline) -> Result<bool, PollError> {
    let mut poll_fds = [pollfd {
        fd,
        events: POLLIN,
        revents: 0,
    }];

    loop {
        let timeout_ms = deadline.remaining().as_millis().min(i32::MAX as u128) as i32;
        let poll_result =
            unsafe { poll(poll_fds.as_mut_ptr(), poll_fds.len() as nfds_t, timeout_ms) };
        match poll_result {
            -1 => match Errno::last_raw() {
                libc::EAGAIN | libc::EINTR => continue,
                errno => return Err(PollError::Poll(errno)),
            },
            0 => return Ok(false),
            _ => {
                let revents = poll_fds[0].revents;
                // A hangup or error state still means the next read returns
                // immediately, which is all the caller needs.
                if revents & (POLLIN | POLLHUP | POLLERR) != 0 {
                    return Ok(true);
                }
                return Err(PollError::Unexpected(revents));
            }
        }
    }
}

/// Ends the process without raising an abort or running atexit handlers.
pub fn terminate() -> ! {
    // Safety: no preconditions
    unsafe { libc::_exit(libc::EXIT_FAILURE) }
}
