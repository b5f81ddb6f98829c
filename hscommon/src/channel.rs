// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Token message framing shared by the feedback channel and the control
//! socket. A message is a sequence of UTF-8 tokens, each terminated by a
//! NUL byte, prefixed by the big-endian `u16` byte length of the payload.
//! Credentials travel as scalars: a big-endian `u32` length followed by raw
//! bytes. A stream that is already closed reads as "no message"; closing in
//! the middle of a frame is an error.

use std::io::{self, Read, Write};
use thiserror::Error;

/// Payload byte limit of a single token message frame.
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// Payload byte limit of a single scalar.
pub const MAX_SCALAR_LEN: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("i/o error on message channel: {0}")]
    Io(#[from] io::Error),
    #[error("message channel closed in the middle of a frame")]
    Truncated,
    #[error("payload of {0} bytes exceeds the frame limit")]
    Oversized(usize),
    #[error("message token contains a NUL byte")]
    EmbeddedNul,
    #[error("message frame is malformed")]
    BadFrame,
}

/// A message channel over any byte stream.
#[derive(Debug)]
pub struct MessageChannel<S> {
    inner: S,
}

impl<S> MessageChannel<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: Write> MessageChannel<S> {
    /// Writes one token message and flushes it.
    pub fn write_message(&mut self, tokens: &[&str]) -> Result<(), ChannelError> {
        let mut payload = Vec::with_capacity(tokens.iter().map(|t| t.len() + 1).sum());
        for token in tokens {
            if token.as_bytes().contains(&0) {
                return Err(ChannelError::EmbeddedNul);
            }
            payload.extend_from_slice(token.as_bytes());
            payload.push(0);
        }
        if payload.len() > MAX_MESSAGE_LEN {
            return Err(ChannelError::Oversized(payload.len()));
        }
        self.inner.write_all(&(payload.len() as u16).to_be_bytes())?;
        self.inner.write_all(&payload)?;
        self.inner.flush()?;
        Ok(())
    }

    /// Writes one length-prefixed scalar and flushes it.
    pub fn write_scalar(&mut self, value: &[u8]) -> Result<(), ChannelError> {
        if value.len() > MAX_SCALAR_LEN {
            return Err(ChannelError::Oversized(value.len()));
        }
        self.inner.write_all(&(value.len() as u32).to_be_bytes())?;
        self.inner.write_all(value)?;
        self.inner.flush()?;
        Ok(())
    }
}

impl<S: Read> MessageChannel<S> {
    /// Reads one token message. `Ok(None)` means the stream was already at
    /// end of file; end of file inside a frame is [`ChannelError::Truncated`].
    pub fn read_message(&mut self) -> Result<Option<Vec<String>>, ChannelError> {
        let mut header = [0u8; 2];
        if !self.fill_or_eof(&mut header)? {
            return Ok(None);
        }
        let len = u16::from_be_bytes(header) as usize;
        let mut payload = vec![0u8; len];
        self.fill(&mut payload)?;
        split_tokens(&payload).map(Some)
    }

    /// Reads one scalar. Scalars are only exchanged mid-conversation, so end
    /// of file here is always [`ChannelError::Truncated`].
    pub fn read_scalar(&mut self) -> Result<Vec<u8>, ChannelError> {
        let mut header = [0u8; 4];
        self.fill(&mut header)?;
        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_SCALAR_LEN {
            return Err(ChannelError::Oversized(len));
        }
        let mut payload = vec![0u8; len];
        self.fill(&mut payload)?;
        Ok(payload)
    }

    // Ok(false) on a clean end of file before the first byte.
    fn fill_or_eof(&mut self, buf: &mut [u8]) -> Result<bool, ChannelError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => return Err(ChannelError::Truncated),
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(true)
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<(), ChannelError> {
        self.inner.read_exact(buf).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => ChannelError::Truncated,
            _ => ChannelError::Io(err),
        })
    }
}

fn split_tokens(payload: &[u8]) -> Result<Vec<String>, ChannelError> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    // Every token, including the last, carries its NUL terminator.
    if payload.last() != Some(&0) {
        return Err(ChannelError::BadFrame);
    }
    payload[..payload.len() - 1]
        .split(|byte| *byte == 0)
        .map(|raw| {
            std::str::from_utf8(raw)
                .map(str::to_string)
                .map_err(|_| ChannelError::BadFrame)
        })
        .collect()
}
