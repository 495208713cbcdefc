//! Identity types for stages and sync requests.
//!
//! Both IDs are newtypes over `u64` minted by monotonic counters. A
//! `StageId` is never reused within a session; a `SyncToken` is minted per
//! `CommitPipeline` and echoed back by the backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a materialized stage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StageId(pub u64);

impl StageId {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StageId({})", self.0)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic token attached to each pipeline commit.
///
/// `SyncToken::NONE` is never minted; it stands for "nothing dispatched yet".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SyncToken(pub u64);

impl SyncToken {
    pub const NONE: SyncToken = SyncToken(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// The token following this one.
    #[inline]
    pub fn next(self) -> SyncToken {
        SyncToken(self.0 + 1)
    }
}

impl fmt::Debug for SyncToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "SyncToken(NONE)")
        } else {
            write!(f, "SyncToken({})", self.0)
        }
    }
}

impl fmt::Display for SyncToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Hands out stage IDs. Never rewinds, even when stages are removed.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> StageId {
        let id = StageId(self.next);
        self.next += 1;
        id
    }
}
