// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{FEEDBACK_FD, WATCHDOG_PROGRAM_NAME};
use crate::error::StartError;

/// Which web-server frontend the watchdog serves. The variant selects the
/// watchdog binary and whether a request socket exists at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendKind {
    Apache,
    Nginx,
}

impl FrontendKind {
    /// The frontend tag passed to the watchdog as its second argument.
    pub fn tag(self) -> &'static str {
        match self {
            FrontendKind::Apache => "apache",
            FrontendKind::Nginx => "nginx",
        }
    }

    /// Only the Nginx helper server serves requests over its own socket;
    /// the Apache frontend talks to the helper server in-process.
    pub fn has_request_socket(self) -> bool {
        matches!(self, FrontendKind::Nginx)
    }

    /// Path of the watchdog binary under the installation root.
    pub(crate) fn watchdog_binary(self, install_root: &Path) -> PathBuf {
        match self {
            FrontendKind::Apache => install_root.join("ext/apache2/helper-watchdog"),
            FrontendKind::Nginx => install_root.join("ext/nginx/helper-watchdog"),
        }
    }
}

/// Launch parameters for the watchdog. Everything except
/// `handshake_timeout` travels to the watchdog in its argument vector.
#[derive(Debug, Clone)]
pub struct StarterConfig {
    /// Log verbosity forwarded to the watchdog.
    pub log_level: u32,
    /// Pid of the web server that owns this starter; the watchdog exits
    /// when that process goes away.
    pub web_server_pid: libc::pid_t,
    /// Scratch directory for the helper server.
    pub temp_dir: PathBuf,
    /// Whether the helper server may switch worker processes to per-user
    /// identities.
    pub user_switching: bool,
    /// Account worker processes run as when user switching is off or no
    /// per-user identity applies.
    pub default_user: String,
    pub worker_uid: libc::uid_t,
    pub worker_gid: libc::gid_t,
    /// Installation root the watchdog binary is resolved under.
    pub install_root: PathBuf,
    /// Command the helper server uses to start worker runtimes.
    pub runtime_command: String,
    pub max_pool_size: u32,
    /// 0 means unlimited.
    pub max_instances_per_app: u32,
    /// Seconds an idle worker survives before the pool reclaims it.
    pub pool_idle_time: u32,
    /// Upper bound on the startup handshake. `None` blocks until the
    /// watchdog reports or the channel closes.
    pub handshake_timeout: Option<Duration>,
}

impl StarterConfig {
    pub(crate) fn validate(&self) -> Result<(), StartError> {
        if self.max_pool_size == 0 {
            return Err(StartError::InvalidConfig("max pool size must be at least 1"));
        }
        if self.default_user.is_empty() {
            return Err(StartError::InvalidConfig("a default user is required"));
        }
        Ok(())
    }

    /// The watchdog's fixed positional argument vector. Order is part of
    /// the protocol; the watchdog indexes into argv.
    pub(crate) fn watchdog_args(&self, kind: FrontendKind) -> Vec<String> {
        vec![
            WATCHDOG_PROGRAM_NAME.to_string(),
            kind.tag().to_string(),
            self.log_level.to_string(),
            FEEDBACK_FD.to_string(),
            self.web_server_pid.to_string(),
            self.temp_dir.display().to_string(),
            if self.user_switching { "true" } else { "false" }.to_string(),
            self.default_user.clone(),
            self.worker_uid.to_string(),
            self.worker_gid.to_string(),
            self.install_root.display().to_string(),
            self.runtime_command.clone(),
            self.max_pool_size.to_string(),
            self.max_instances_per_app.to_string(),
            self.pool_idle_time.to_string(),
        ]
    }
}
