// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io;
use std::os::unix::io::RawFd;

#[cfg(target_os = "macos")]
const SELF_FD_DIR: &str = "/dev/fd";

#[cfg(not(target_os = "macos"))]
const SELF_FD_DIR: &str = "/proc/self/fd";

/// Closes every open descriptor numbered `first` or above, from an explicit
/// listing of this process's open descriptors. Intended for the window
/// between fork and exec, where the child owns every descriptor it sees.
///
/// The listing is collected in full before the first close so the directory
/// iteration is never invalidated; the descriptor backing the listing itself
/// just fails its close with EBADF, which is ignored.
pub fn close_inherited_fds(first: RawFd) -> io::Result<()> {
    let mut fds = Vec::new();
    for entry in fs::read_dir(SELF_FD_DIR)? {
        let entry = entry?;
        if let Some(fd) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<RawFd>().ok())
        {
            if fd >= first {
                fds.push(fd);
            }
        }
    }
    for fd in fds {
        // Safety: no preconditions; a stale number fails with EBADF.
        unsafe { libc::close(fd) };
    }
    Ok(())
}
