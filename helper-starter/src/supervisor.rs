// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::os::unix::io::OwnedFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nix::unistd::Pid;
use tracing::debug;

use crate::config::{FrontendKind, StarterConfig};
use crate::error::StartError;
use crate::handshake::complete_handshake;
use crate::instance_dir::{Generation, InstanceDir};
use crate::launcher::spawn_watchdog;
use crate::shutdown;

/// An authenticated Unix-socket endpoint reported by the watchdog.
#[derive(Debug, Clone)]
pub struct SocketEndpoint {
    path: PathBuf,
    password: Vec<u8>,
}

impl SocketEndpoint {
    pub(crate) fn new(path: PathBuf, password: Vec<u8>) -> Self {
        Self { path, password }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The decoded connection password.
    pub fn password(&self) -> &[u8] {
        &self.password
    }
}

/// Everything owned while the watchdog runs. The existence of one of these
/// implies a live, handshaked watchdog; there is no half-populated state.
#[derive(Debug)]
pub struct RunningHelper {
    pid: Pid,
    feedback: OwnedFd,
    request_socket: Option<SocketEndpoint>,
    control_socket: SocketEndpoint,
    instance_dir: Arc<InstanceDir>,
    generation: Arc<Generation>,
}

impl RunningHelper {
    /// The watchdog's pid.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// The helper server's request socket; present only for the Nginx
    /// frontend, which serves requests over its own socket.
    pub fn request_socket(&self) -> Option<&SocketEndpoint> {
        self.request_socket.as_ref()
    }

    /// The control socket the graceful-exit command goes to.
    pub fn control_socket(&self) -> &SocketEndpoint {
        &self.control_socket
    }

    pub fn instance_dir(&self) -> &Arc<InstanceDir> {
        &self.instance_dir
    }

    pub fn generation(&self) -> &Arc<Generation> {
        &self.generation
    }

    pub(crate) fn into_parts(self) -> (Pid, OwnedFd, SocketEndpoint) {
        (self.pid, self.feedback, self.control_socket)
    }
}

/// Starts the helper server through the watchdog and owns the watchdog for
/// the rest of its life. One starter owns at most one watchdog at a time,
/// and `start()` is all-or-nothing: on any failure the spawned process has
/// been killed and reaped by the time the error is returned.
#[derive(Debug)]
pub struct HelperStarter {
    kind: FrontendKind,
    running: Option<RunningHelper>,
}

impl HelperStarter {
    /// Creates a starter for the given frontend. Nothing is spawned until
    /// [`start`](Self::start).
    pub fn new(kind: FrontendKind) -> Self {
        Self {
            kind,
            running: None,
        }
    }

    pub fn kind(&self) -> FrontendKind {
        self.kind
    }

    /// Pid of the watchdog, if one is currently owned.
    pub fn pid(&self) -> Option<Pid> {
        self.running.as_ref().map(RunningHelper::pid)
    }

    /// The running-state bundle; `None` while no watchdog is owned.
    pub fn runtime(&self) -> Option<&RunningHelper> {
        self.running.as_ref()
    }

    /// Spawns the watchdog and drives the startup handshake. On success the
    /// starter owns the watchdog, its feedback descriptor, both socket
    /// endpoints, and the instance-directory handles, all committed at
    /// once.
    ///
    /// # Panics
    ///
    /// Calling this while a watchdog is already owned is a caller bug, not
    /// a recoverable condition.
    pub fn start(&mut self, config: &StarterConfig) -> Result<(), StartError> {
        assert!(
            self.running.is_none(),
            "start() called while a watchdog is already owned"
        );
        config.validate()?;
        let binary = self.kind.watchdog_binary(&config.install_root);
        let launched = spawn_watchdog(self.kind, config, &binary)?;
        let success =
            complete_handshake(&launched.feedback, launched.pid, &binary, config.handshake_timeout)?;
        self.running = Some(RunningHelper {
            pid: launched.pid,
            feedback: launched.feedback,
            request_socket: self
                .kind
                .has_request_socket()
                .then_some(success.request_socket),
            control_socket: success.control_socket,
            instance_dir: success.instance_dir,
            generation: success.generation,
        });
        Ok(())
    }

    /// Releases ownership without contacting or signaling the process. The
    /// feedback descriptor is closed and every handle dropped; destruction
    /// afterwards is a no-op.
    pub fn detach(&mut self) {
        if let Some(running) = self.running.take() {
            debug!(pid = running.pid().as_raw(), "detaching from helper watchdog");
        }
    }

    /// Best-effort teardown: ask the helper server to exit over the control
    /// socket, then close the feedback descriptor and reap the watchdog.
    /// Never fails; a broken control channel degrades to the watchdog's own
    /// abnormal-shutdown handling, which still reaps cleanly.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            shutdown::run(running);
        }
    }
}

impl Drop for HelperStarter {
    fn drop(&mut self) {
        self.stop();
    }
}
