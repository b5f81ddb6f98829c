// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use nix::sys::signal::{self, SigSet, SigmaskHow};

// Lexically-scoped mask over asynchronous signal delivery. The fork, every
// kill-then-reap pair, and the whole teardown sequence run inside one of
// these; a signal landing between a kill and its reap, or between a fork
// and recording the pid, is exactly how a process leak happens. The mask is
// restored on drop, so the blocking handshake read stays interruptible by
// simply not holding a guard across it.
pub struct InterruptGuard {
    old_mask: SigSet,
}

impl InterruptGuard {
    pub fn block() -> Self {
        let mut old_mask = SigSet::empty();
        // Best effort: a mask that cannot be installed leaves delivery as it
        // was, which is also what restoring would produce.
        let _ = signal::sigprocmask(
            SigmaskHow::SIG_BLOCK,
            Some(&SigSet::all()),
            Some(&mut old_mask),
        );
        Self { old_mask }
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        let _ = signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.old_mask), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;

    fn current_mask() -> SigSet {
        let mut mask = SigSet::empty();
        signal::sigprocmask(SigmaskHow::SIG_BLOCK, None, Some(&mut mask)).unwrap();
        mask
    }

    #[test]
    fn test_guard_blocks_and_restores_delivery() {
        let before = current_mask();
        assert!(!before.contains(Signal::SIGTERM));
        {
            let _guard = InterruptGuard::block();
            assert!(current_mask().contains(Signal::SIGTERM));
            assert!(current_mask().contains(Signal::SIGINT));
        }
        assert!(!current_mask().contains(Signal::SIGTERM));
    }
}
