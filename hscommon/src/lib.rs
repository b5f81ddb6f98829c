// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared support for the helper-server starter: the token message channel
//! spoken on the feedback and control sockets, and the low-level Unix
//! process plumbing (prepared execve, descriptor scrubbing, reaping, signal
//! masking) the launcher and teardown paths are built on.

#![cfg(unix)]

pub mod channel;
pub mod client;
pub mod deadline;
pub mod unix_utils;

pub use channel::{ChannelError, MessageChannel};
pub use client::{ClientError, MessageClient};
pub use deadline::Deadline;
