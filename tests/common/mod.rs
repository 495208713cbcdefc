//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::{Duration, Instant};
use viewbar::pipeline::{Notice, PipelineMachine};

/// Create a test timeout duration
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Poll `machine` until `done` holds, collecting notices on the way.
///
/// Panics after [`test_timeout`].
pub fn poll_until(
    machine: &mut PipelineMachine,
    mut done: impl FnMut(&PipelineMachine) -> bool,
) -> Vec<Notice> {
    let deadline = Instant::now() + test_timeout();
    let mut notices = Vec::new();
    loop {
        notices.extend(machine.poll());
        if done(machine) {
            return notices;
        }
        assert!(
            Instant::now() < deadline,
            "Timed out waiting; machine is {} with snapshot:\n{}",
            machine.status(),
            machine.snapshot()
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}
