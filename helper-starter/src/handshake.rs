// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The startup handshake: one token message from the watchdog, parsed in a
//! single step into a closed outcome set, plus the analysis that runs when
//! the channel closes without any message at all. Every failure branch
//! kills and reaps the watchdog before surfacing, so `start()` can never
//! hand its caller both an error and an orphan.

use std::os::unix::io::{AsRawFd, OwnedFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hscommon::unix_utils::{kill_and_reap, wait_for_readable, InterruptGuard, PollError};
use hscommon::{ChannelError, Deadline, MessageChannel};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::debug;

use crate::constants::{MSG_EXEC_ERROR, MSG_INITIALIZED, MSG_SYSTEM_ERROR};
use crate::error::{InstanceDirError, StartError};
use crate::instance_dir::{Generation, InstanceDir};
use crate::supervisor::SocketEndpoint;

/// Everything a successful startup report resolves to.
pub(crate) struct HandshakeSuccess {
    pub(crate) request_socket: SocketEndpoint,
    pub(crate) control_socket: SocketEndpoint,
    pub(crate) instance_dir: Arc<InstanceDir>,
    pub(crate) generation: Arc<Generation>,
}

/// The closed set of startup reports a watchdog can send.
#[derive(Debug, PartialEq, Eq)]
enum StartupFeedback {
    Initialized {
        request_socket_path: String,
        request_socket_password: Vec<u8>,
        control_socket_path: String,
        control_socket_password: Vec<u8>,
        instance_dir_path: String,
        generation_index: u32,
    },
    SystemError {
        message: String,
        code: i32,
    },
    ExecError {
        code: i32,
    },
}

/// Drives the handshake to completion against the watchdog at `watchdog`.
pub(crate) fn complete_handshake(
    feedback: &OwnedFd,
    watchdog: Pid,
    binary: &Path,
    timeout: Option<Duration>,
) -> Result<HandshakeSuccess, StartError> {
    let tokens = match read_feedback(feedback, timeout) {
        Ok(Some(tokens)) => tokens,
        Ok(None) => return Err(disambiguate_eof(watchdog)),
        Err(err) => {
            kill_and_reap(watchdog);
            return Err(err);
        }
    };

    let report = match parse_feedback(&tokens) {
        Ok(report) => report,
        Err(err) => {
            kill_and_reap(watchdog);
            return Err(err);
        }
    };

    match report {
        StartupFeedback::Initialized {
            request_socket_path,
            request_socket_password,
            control_socket_path,
            control_socket_password,
            instance_dir_path,
            generation_index,
        } => match resolve_handles(&instance_dir_path, generation_index) {
            Ok((instance_dir, generation)) => {
                debug!(
                    control = %control_socket_path,
                    generation = generation_index,
                    "watchdog reported successful startup"
                );
                Ok(HandshakeSuccess {
                    request_socket: SocketEndpoint::new(
                        PathBuf::from(request_socket_path),
                        request_socket_password,
                    ),
                    control_socket: SocketEndpoint::new(
                        PathBuf::from(control_socket_path),
                        control_socket_password,
                    ),
                    instance_dir,
                    generation,
                })
            }
            Err(err) => {
                kill_and_reap(watchdog);
                Err(err.into())
            }
        },
        StartupFeedback::SystemError { message, code } => {
            kill_and_reap(watchdog);
            Err(StartError::System { message, code })
        }
        StartupFeedback::ExecError { code } => {
            kill_and_reap(watchdog);
            Err(StartError::Exec {
                path: binary.to_path_buf(),
                code,
            })
        }
    }
}

/// Reads the first feedback message, optionally bounded by a deadline.
/// `Ok(None)` means the channel closed without a message.
fn read_feedback(
    feedback: &OwnedFd,
    timeout: Option<Duration>,
) -> Result<Option<Vec<String>>, StartError> {
    if let Some(bound) = timeout {
        let deadline = Deadline::new(bound);
        match wait_for_readable(feedback.as_raw_fd(), &deadline) {
            Ok(true) => {}
            Ok(false) => return Err(StartError::HandshakeTimeout(bound)),
            Err(PollError::Poll(code)) => {
                return Err(StartError::System {
                    message: "poll() on the feedback channel failed".to_string(),
                    code,
                })
            }
            Err(err @ PollError::Unexpected(_)) => {
                return Err(StartError::System {
                    message: err.to_string(),
                    code: 0,
                })
            }
        }
    }
    let duplicate = feedback
        .try_clone()
        .map_err(|err| StartError::Feedback(ChannelError::Io(err)))?;
    let mut channel = MessageChannel::new(UnixStream::from(duplicate));
    channel.read_message().map_err(StartError::Feedback)
}

/// One parse step over the token sequence: one variant per protocol row.
fn parse_feedback(tokens: &[String]) -> Result<StartupFeedback, StartError> {
    match tokens.first().map(String::as_str) {
        Some(MSG_INITIALIZED) => {
            if tokens.len() != 7 {
                return Err(StartError::MalformedFeedback);
            }
            Ok(StartupFeedback::Initialized {
                request_socket_path: tokens[1].clone(),
                request_socket_password: decode_password(&tokens[2])?,
                control_socket_path: tokens[3].clone(),
                control_socket_password: decode_password(&tokens[4])?,
                instance_dir_path: tokens[5].clone(),
                generation_index: parse_number(&tokens[6])?,
            })
        }
        Some(MSG_SYSTEM_ERROR) => {
            if tokens.len() != 3 {
                return Err(StartError::MalformedFeedback);
            }
            Ok(StartupFeedback::SystemError {
                message: tokens[1].clone(),
                code: parse_number(&tokens[2])?,
            })
        }
        Some(MSG_EXEC_ERROR) => {
            if tokens.len() != 2 {
                return Err(StartError::MalformedFeedback);
            }
            Ok(StartupFeedback::ExecError {
                code: parse_number(&tokens[1])?,
            })
        }
        Some(other) => Err(StartError::UnknownFeedback(other.to_string())),
        None => Err(StartError::MalformedFeedback),
    }
}

fn parse_number<T: std::str::FromStr>(token: &str) -> Result<T, StartError> {
    token.parse().map_err(|_| StartError::MalformedFeedback)
}

fn decode_password(token: &str) -> Result<Vec<u8>, StartError> {
    BASE64.decode(token).map_err(StartError::BadPassword)
}

fn resolve_handles(
    instance_dir_path: &str,
    generation_index: u32,
) -> Result<(Arc<InstanceDir>, Arc<Generation>), InstanceDirError> {
    let instance_dir = InstanceDir::open(instance_dir_path)?;
    let generation = instance_dir.generation(generation_index)?;
    Ok((instance_dir, generation))
}

/// The channel closed with zero tokens: decide what happened. A watchdog
/// that is still alive violated the protocol and gets killed; one that died
/// on a signal is named by it; one that exited on its own crashed for a
/// reason it never reported. The probe itself reaps the exited cases.
fn disambiguate_eof(watchdog: Pid) -> StartError {
    let _guard = InterruptGuard::block();
    match waitpid(watchdog, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::StillAlive) => {
            kill_and_reap(watchdog);
            StartError::StartupUnknown
        }
        Ok(WaitStatus::Signaled(_, signal, _)) => StartError::KilledDuringStartup {
            signal: signal.to_string(),
        },
        Ok(_) | Err(_) => StartError::CrashedDuringStartup,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn b64(value: &[u8]) -> String {
        BASE64.encode(value)
    }

    #[test]
    fn test_parse_initialized_decodes_passwords_and_index() {
        let report = parse_feedback(&tokens(&[
            "initialized",
            "/tmp/req.sock",
            &b64(b"pw1"),
            "/tmp/msg.sock",
            &b64(b"pw2"),
            "/tmp/inst",
            "2",
        ]))
        .unwrap();
        assert_eq!(
            report,
            StartupFeedback::Initialized {
                request_socket_path: "/tmp/req.sock".to_string(),
                request_socket_password: b"pw1".to_vec(),
                control_socket_path: "/tmp/msg.sock".to_string(),
                control_socket_password: b"pw2".to_vec(),
                instance_dir_path: "/tmp/inst".to_string(),
                generation_index: 2,
            }
        );
    }

    #[test]
    fn test_parse_initialized_with_wrong_count_is_malformed() {
        let result = parse_feedback(&tokens(&["initialized", "/only/one/arg"]));
        assert!(matches!(result, Err(StartError::MalformedFeedback)));
    }

    #[test]
    fn test_parse_system_error_carries_message_and_code() {
        let report =
            parse_feedback(&tokens(&["system error", "socket() failed", "13"])).unwrap();
        assert_eq!(
            report,
            StartupFeedback::SystemError {
                message: "socket() failed".to_string(),
                code: 13,
            }
        );
    }

    #[test]
    fn test_parse_exec_error_carries_code() {
        let report = parse_feedback(&tokens(&["exec error", "2"])).unwrap();
        assert_eq!(report, StartupFeedback::ExecError { code: 2 });
    }

    #[test]
    fn test_parse_unknown_leading_token_is_named() {
        let result = parse_feedback(&tokens(&["bonjour", "le monde"]));
        match result {
            Err(StartError::UnknownFeedback(token)) => assert_eq!(token, "bonjour"),
            other => panic!("expected UnknownFeedback, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_message_is_malformed() {
        assert!(matches!(
            parse_feedback(&[]),
            Err(StartError::MalformedFeedback)
        ));
    }

    #[test]
    fn test_parse_rejects_an_undecodable_password() {
        let result = parse_feedback(&tokens(&[
            "initialized",
            "/tmp/req.sock",
            "not base64!",
            "/tmp/msg.sock",
            &b64(b"pw2"),
            "/tmp/inst",
            "2",
        ]));
        assert!(matches!(result, Err(StartError::BadPassword(_))));
    }

    #[test]
    fn test_parse_rejects_a_non_numeric_generation() {
        let result = parse_feedback(&tokens(&[
            "initialized",
            "/tmp/req.sock",
            &b64(b"pw1"),
            "/tmp/msg.sock",
            &b64(b"pw2"),
            "/tmp/inst",
            "two",
        ]));
        assert!(matches!(result, Err(StartError::MalformedFeedback)));
    }

    #[test]
    fn test_parse_rejects_a_non_numeric_errno() {
        let result = parse_feedback(&tokens(&["exec error", "ENOENT"]));
        assert!(matches!(result, Err(StartError::MalformedFeedback)));
    }
}
