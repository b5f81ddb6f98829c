// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Teardown of a live watchdog. The cooperative tier asks the helper server
//! to exit over the control socket and, once both acknowledgements arrive,
//! writes the single clean-shutdown sentinel byte to the feedback
//! descriptor. If any step fails the sentinel is skipped: the watchdog
//! observes the descriptor closing bare, concludes the shutdown is
//! abnormal, and kills the helper server itself. Either way the descriptor
//! is closed and the watchdog reaped, so no zombie remains.

use hscommon::unix_utils::{waitpid_blocking, InterruptGuard};
use hscommon::{ClientError, MessageClient};
use nix::unistd;
use tracing::debug;

use crate::constants::{
    CONTROL_AUTH_OK, CONTROL_EXIT_ACK, CONTROL_EXIT_COMMAND, CONTROL_PRINCIPAL, SHUTDOWN_SENTINEL,
};
use crate::supervisor::{RunningHelper, SocketEndpoint};

pub(crate) fn run(running: RunningHelper) {
    let _guard = InterruptGuard::block();
    let (pid, feedback, control_socket) = running.into_parts();

    match negotiate_exit(&control_socket) {
        Ok(()) => {
            let _ = unistd::write(&feedback, SHUTDOWN_SENTINEL);
        }
        Err(err) => {
            debug!(
                pid = pid.as_raw(),
                error = %err,
                "graceful exit declined; relying on abnormal-shutdown handling"
            );
        }
    }

    drop(feedback);
    if let Err(err) = waitpid_blocking(pid) {
        debug!(pid = pid.as_raw(), error = %err, "could not reap helper watchdog");
    }
}

/// The cooperative half: authenticate, send `exit`, and require both
/// acknowledgements before the sentinel may be written.
fn negotiate_exit(control: &SocketEndpoint) -> Result<(), ClientError> {
    let mut client = MessageClient::connect(control.path(), CONTROL_PRINCIPAL, control.password())?;
    client.write(&[CONTROL_EXIT_COMMAND])?;
    client.expect(CONTROL_AUTH_OK)?;
    client.expect(CONTROL_EXIT_ACK)?;
    Ok(())
}
