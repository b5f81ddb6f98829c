// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use hscommon::ChannelError;
use thiserror::Error;

/// Everything `start()` can fail with. Whenever one of these is returned
/// after the watchdog process existed, the process has already been killed
/// and reaped; callers never inherit an orphan along with an error.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("cannot create a Unix socket pair: {0}")]
    SocketPair(#[source] nix::Error),
    #[error("cannot fork the watchdog process: {0}")]
    Fork(#[source] nix::Error),
    /// An OS-facing operation failed, reported over the feedback channel.
    #[error("{message} (errno {code})")]
    System { message: String, code: i32 },
    /// The child could not execute the watchdog binary.
    #[error("unable to execute the watchdog binary {path} (errno {code})")]
    Exec { path: PathBuf, code: i32 },
    #[error("unable to read the watchdog's startup feedback: {0}")]
    Feedback(#[from] ChannelError),
    #[error("the watchdog returned an invalid startup feedback message")]
    MalformedFeedback,
    #[error("the watchdog sent an unknown startup feedback message {0:?}")]
    UnknownFeedback(String),
    /// The feedback channel closed while the watchdog was still running.
    #[error("an unknown error occurred during watchdog startup")]
    StartupUnknown,
    #[error("the watchdog was killed with signal {signal} during startup")]
    KilledDuringStartup { signal: String },
    #[error("the watchdog crashed during startup for an unknown reason")]
    CrashedDuringStartup,
    #[error("the watchdog did not report startup feedback within {0:?}")]
    HandshakeTimeout(Duration),
    #[error("startup feedback carried an undecodable socket password")]
    BadPassword(#[source] base64::DecodeError),
    #[error(transparent)]
    InstanceDir(#[from] InstanceDirError),
    #[error("invalid starter configuration: {0}")]
    InvalidConfig(&'static str),
}

#[derive(Debug, Error)]
pub enum InstanceDirError {
    #[error("server instance directory {0} does not exist")]
    Missing(PathBuf),
    #[error("generation {index} does not exist in {dir}")]
    MissingGeneration { dir: PathBuf, index: u32 },
    #[error("cannot inspect server instance directory {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}
