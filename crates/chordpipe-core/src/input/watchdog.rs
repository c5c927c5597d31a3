// Chordpipe Stuck-Key Watchdog
// Force-releases keys held longer than their configured timeout

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::clock::{Clock, MonotonicClock};
use crate::event::{Event, EventType, Stage, Value, NOOP_FIELD};

/// A tracked keydown waiting for its release
#[derive(Debug, Clone, PartialEq)]
pub struct StuckKeyEntry {
    pub deadline: Instant,
    pub key: Value,
    pub event: Event,
}

/// Releases keys whose keyup never arrives.
///
/// Some keys (typically the Windows key after a secure-desktop switch) lose
/// their release event. For keys with a configured timeout, a keydown arms a
/// deadline; the first event seen after it passes triggers a `noop` keyup
/// that downstream stages treat as bookkeeping. There is no timer: expiry is
/// only checked when an event arrives.
pub struct StuckKeyWatchdog<C = MonotonicClock> {
    field: String,
    timeouts: Vec<(Value, Duration)>,
    /// Sorted by deadline, at most one entry per key
    entries: Vec<StuckKeyEntry>,
    clock: C,
}

impl StuckKeyWatchdog<MonotonicClock> {
    pub fn new(field: impl Into<String>, timeouts: Vec<(Value, Duration)>) -> Self {
        Self::with_clock(field, timeouts, MonotonicClock)
    }
}

impl<C: Clock> StuckKeyWatchdog<C> {
    pub fn with_clock(field: impl Into<String>, timeouts: Vec<(Value, Duration)>, clock: C) -> Self {
        Self {
            field: field.into(),
            timeouts,
            entries: Vec::new(),
            clock,
        }
    }

    /// Live entries in deadline order
    pub fn entries(&self) -> &[StuckKeyEntry] {
        &self.entries
    }

    fn timeout_for(&self, key: &Value) -> Option<Duration> {
        self.timeouts
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, timeout)| *timeout)
    }

    fn forget(&mut self, key: &Value) {
        self.entries.retain(|entry| &entry.key != key);
    }

    fn arm(&mut self, key: Value, timeout: Duration, event: Event, now: Instant) {
        self.forget(&key);
        let deadline = now + timeout;
        let at = self.entries.partition_point(|entry| entry.deadline <= deadline);
        self.entries.insert(at, StuckKeyEntry { deadline, key, event });
    }

    /// Emit forced releases for every expired entry, in deadline order.
    /// Returns whether `current` is a keyup for one of them.
    fn expire(&mut self, now: Instant, current: &Event, out: &mut VecDeque<Event>) -> bool {
        let expired = self.entries.partition_point(|entry| entry.deadline <= now);
        let mut current_released = false;
        for entry in self.entries.drain(..expired) {
            if current.is(&EventType::KeyUp) && current.key(&self.field) == Some(&entry.key) {
                current_released = true;
            }
            log::debug!("watchdog: forcing release of {}", entry.key);
            out.push_back(
                entry
                    .event
                    .with_kind(EventType::KeyUp)
                    .with(NOOP_FIELD, true),
            );
        }
        current_released
    }
}

impl<C: Clock> Stage for StuckKeyWatchdog<C> {
    fn name(&self) -> &'static str {
        "watchdog"
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        let now = self.clock.now();
        if self.expire(now, &event, out) {
            // Downstream already saw the forced release; only the injector
            // still needs the real one.
            out.push_back(Event::output(&event));
            return;
        }
        if let Some(key) = event.key(&self.field).cloned() {
            match event.kind() {
                EventType::KeyDown => {
                    if let Some(timeout) = self.timeout_for(&key) {
                        self.arm(key, timeout, event.clone(), now);
                    }
                }
                EventType::KeyUp => self.forget(&key),
                _ => {}
            }
        }
        out.push_back(event);
    }
}
