// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client side of an authenticated message-channel conversation. Connecting
//! sends the principal name and the password as two scalars; everything
//! after that is ordinary token messages.

use std::io;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::channel::{ChannelError, MessageChannel};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot connect to {path}: {source}")]
    Connect { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("server closed the connection")]
    Disconnected,
    #[error("server sent an unexpected reply: {0:?}")]
    UnexpectedReply(Vec<String>),
}

#[derive(Debug)]
pub struct MessageClient {
    channel: MessageChannel<UnixStream>,
}

impl MessageClient {
    /// Connects to the Unix socket at `path` and authenticates as
    /// `principal` with `password`.
    pub fn connect(path: &Path, principal: &str, password: &[u8]) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path).map_err(|source| ClientError::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        let mut channel = MessageChannel::new(stream);
        channel.write_scalar(principal.as_bytes())?;
        channel.write_scalar(password)?;
        Ok(Self { channel })
    }

    pub fn write(&mut self, tokens: &[&str]) -> Result<(), ClientError> {
        Ok(self.channel.write_message(tokens)?)
    }

    pub fn read(&mut self) -> Result<Vec<String>, ClientError> {
        self.channel.read_message()?.ok_or(ClientError::Disconnected)
    }

    /// Reads one reply and requires its leading token to equal `token`.
    pub fn expect(&mut self, token: &str) -> Result<(), ClientError> {
        let reply = self.read()?;
        if reply.first().map(String::as_str) == Some(token) {
            Ok(())
        } else {
            Err(ClientError::UnexpectedReply(reply))
        }
    }
}
