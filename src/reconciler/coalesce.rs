//! Single-writer admission with one coalesced follow-up.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No cycle in flight.
    Idle,
    /// A cycle is in flight and nothing new arrived since it started.
    Running,
    /// A cycle is in flight and at least one trigger arrived after it started.
    Dirty,
}

/// What a trigger should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Caller must start a driver for this generation.
    Start { generation: u64 },
    /// A driver is already running; the caller's change lands in `generation`.
    Coalesced { generation: u64 },
}

/// What the driver should do after finishing a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    RunAgain { generation: u64 },
    Done,
}

#[derive(Debug)]
struct Inner {
    state: RunState,
    /// Generation of the in-flight (or last) cycle.
    generation: u64,
}

#[derive(Debug)]
pub struct Coalescer {
    inner: Mutex<Inner>,
}

impl Default for Coalescer {
    fn default() -> Self {
        Self::new()
    }
}

impl Coalescer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { state: RunState::Idle, generation: 0 }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The critical sections never panic midway; a poisoned lock still holds valid state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn admit(&self) -> Admission {
        let mut inner = self.lock();
        match inner.state {
            RunState::Idle => {
                inner.generation += 1;
                inner.state = RunState::Running;
                Admission::Start { generation: inner.generation }
            }
            RunState::Running | RunState::Dirty => {
                inner.state = RunState::Dirty;
                Admission::Coalesced { generation: inner.generation + 1 }
            }
        }
    }

    pub fn complete(&self) -> Completion {
        let mut inner = self.lock();
        match inner.state {
            RunState::Dirty => {
                inner.generation += 1;
                inner.state = RunState::Running;
                Completion::RunAgain { generation: inner.generation }
            }
            RunState::Running | RunState::Idle => {
                inner.state = RunState::Idle;
                Completion::Done
            }
        }
    }

    /// True when a follow-up cycle is already pending.
    pub fn is_dirty(&self) -> bool {
        self.lock().state == RunState::Dirty
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }
}
