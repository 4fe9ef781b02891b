//! Collaborator seams: the automation toggle and the presentation layer.
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use crate::catalog::RaidDefinition;
use crate::outcome::RaidOutcome;
use crate::resources::ResourceBag;

/// Structured notifications the engine emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RaidEvent {
    Started {
        raid_id: String,
        definition: Box<RaidDefinition>,
        duration_ms: u64,
    },
    Progress {
        raid_id: String,
        progress: f64,
        remaining_ms: u64,
    },
    Completed {
        raid_id: String,
        outcome: RaidOutcome,
    },
    Cancelled {
        raid_id: String,
        refunded: ResourceBag,
    },
    CompletionFailed {
        raid_id: String,
        reason: String,
    },
    SystemUnlocked,
}

impl RaidEvent {
    /// Dotted event name as hosts subscribe to it.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "raid.started",
            Self::Progress { .. } => "raid.progress",
            Self::Completed { .. } => "raid.completed",
            Self::Cancelled { .. } => "raid.cancelled",
            Self::CompletionFailed { .. } => "raid.completion_failed",
            Self::SystemUnlocked => "raid.system_unlocked",
        }
    }
}

/// The auto-click automation subsystem, seen from the raid engine.
pub trait AutomationCoordinator {
    fn is_active(&self) -> bool;
    fn request_pause(&mut self);
    fn request_resume(&mut self);
}

/// Rendering-free presentation capabilities.
pub trait PresentationPort {
    /// Block or unblock interactions that conflict with an active raid.
    fn set_blocked(&mut self, blocked: bool);
    /// Short user-facing message.
    fn notify(&mut self, message: &str);
    fn emit(&mut self, event: &RaidEvent);
}

/// Emit `raid.system_unlocked` when the unlocking structure first reaches level 1.
/// Called by the structure collaborator after a level change.
pub fn announce_system_unlock<P>(port: &mut P, previous_level: u32, current_level: u32) -> bool
where
    P: PresentationPort + ?Sized,
{
    let unlocked = previous_level < 1 && current_level >= 1;
    if unlocked {
        log::info!("raid system unlocked");
        port.emit(&RaidEvent::SystemUnlocked);
        port.notify("Raids unlocked");
    }
    unlocked
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationIntent {
    Pause,
    Resume,
}

#[derive(Debug, Default)]
struct AutoClickerState {
    active: bool,
    intents: Vec<AutomationIntent>,
}

/// In-memory auto-clicker. Clones share state so a handle kept outside the
/// engine observes every intent.
#[derive(Debug, Clone, Default)]
pub struct AutoClicker {
    state: Rc<RefCell<AutoClickerState>>,
}

impl AutoClicker {
    #[must_use]
    pub fn new(active: bool) -> Self {
        let clicker = Self::default();
        clicker.state.borrow_mut().active = active;
        clicker
    }

    /// Toggle the clicker as the player would.
    pub fn set_active(&self, active: bool) {
        self.state.borrow_mut().active = active;
    }

    #[must_use]
    pub fn intents(&self) -> Vec<AutomationIntent> {
        self.state.borrow().intents.clone()
    }

    #[must_use]
    pub fn count(&self, intent: AutomationIntent) -> usize {
        self.state
            .borrow()
            .intents
            .iter()
            .filter(|seen| **seen == intent)
            .count()
    }
}

impl AutomationCoordinator for AutoClicker {
    fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    fn request_pause(&mut self) {
        let mut state = self.state.borrow_mut();
        state.active = false;
        state.intents.push(AutomationIntent::Pause);
    }

    fn request_resume(&mut self) {
        let mut state = self.state.borrow_mut();
        state.active = true;
        state.intents.push(AutomationIntent::Resume);
    }
}

#[derive(Debug, Default)]
struct EventLogState {
    blocked: bool,
    notices: Vec<String>,
    events: Vec<RaidEvent>,
}

/// Recording presentation port. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    state: Rc<RefCell<EventLogState>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.state.borrow().blocked
    }

    #[must_use]
    pub fn notices(&self) -> Vec<String> {
        self.state.borrow().notices.clone()
    }

    #[must_use]
    pub fn events(&self) -> Vec<RaidEvent> {
        self.state.borrow().events.clone()
    }

    /// Events with the given dotted name.
    #[must_use]
    pub fn named(&self, name: &str) -> Vec<RaidEvent> {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|event| event.name() == name)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.notices.clear();
        state.events.clear();
    }
}

impl PresentationPort for EventLog {
    fn set_blocked(&mut self, blocked: bool) {
        self.state.borrow_mut().blocked = blocked;
    }

    fn notify(&mut self, message: &str) {
        self.state.borrow_mut().notices.push(message.to_string());
    }

    fn emit(&mut self, event: &RaidEvent) {
        self.state.borrow_mut().events.push(event.clone());
    }
}
