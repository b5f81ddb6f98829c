// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use std::os::unix::io::OwnedFd;

use crate::error::StartError;

/// The one-shot startup channel, created before forking. The child end is
/// rebound onto [`crate::FEEDBACK_FD`] in the child and must survive exec,
/// so neither end carries close-on-exec.
pub(crate) struct FeedbackChannel {
    parent: OwnedFd,
    child: OwnedFd,
}

impl FeedbackChannel {
    pub(crate) fn create() -> Result<Self, StartError> {
        let (parent, child) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )
        .map_err(StartError::SocketPair)?;
        Ok(Self { parent, child })
    }

    pub(crate) fn into_ends(self) -> (OwnedFd, OwnedFd) {
        (self.parent, self.child)
    }
}
