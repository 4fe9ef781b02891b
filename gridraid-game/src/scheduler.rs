//! Scheduled work for the engine: the self-rescheduling tick and the deferred
//! automation resume.
//!
//! Every scheduled tick carries the generation it was issued under. Cancelling
//! bumps the generation, so a tick handle that outlived its session can never
//! be mistaken for the current one.

/// Handle for one scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHandle {
    generation: u64,
    due_ms: u64,
}

impl TickHandle {
    #[must_use]
    pub const fn due_ms(self) -> u64 {
        self.due_ms
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickScheduler {
    generation: u64,
    tick: Option<TickHandle>,
    resume_at: Option<u64>,
}

impl TickScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the next tick, replacing any pending one.
    pub fn schedule_tick(&mut self, due_ms: u64) -> TickHandle {
        let handle = TickHandle {
            generation: self.generation,
            due_ms,
        };
        self.tick = Some(handle);
        handle
    }

    /// Drop the pending tick and invalidate every handle issued so far.
    pub fn cancel_tick(&mut self) {
        self.tick = None;
        self.generation = self.generation.wrapping_add(1);
    }

    #[must_use]
    pub const fn pending_tick(&self) -> Option<TickHandle> {
        self.tick
    }

    /// Whether `handle` belongs to the current generation.
    #[must_use]
    pub const fn is_current(&self, handle: TickHandle) -> bool {
        handle.generation == self.generation
    }

    /// Take the pending tick if it is due.
    pub fn take_due_tick(&mut self, now_ms: u64) -> Option<TickHandle> {
        match self.tick {
            Some(handle) if handle.due_ms <= now_ms => self.tick.take(),
            _ => None,
        }
    }

    pub const fn schedule_resume(&mut self, at_ms: u64) {
        self.resume_at = Some(at_ms);
    }

    /// Drop a pending resume. Returns whether one was pending.
    pub const fn cancel_resume(&mut self) -> bool {
        self.resume_at.take().is_some()
    }

    #[must_use]
    pub const fn resume_pending(&self) -> bool {
        self.resume_at.is_some()
    }

    /// Take the pending resume if it is due.
    pub fn take_due_resume(&mut self, now_ms: u64) -> bool {
        match self.resume_at {
            Some(at) if at <= now_ms => {
                self.resume_at = None;
                true
            }
            _ => false,
        }
    }

    /// Earliest instant anything is scheduled for.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        let tick = self.tick.map(TickHandle::due_ms);
        match (tick, self.resume_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}
