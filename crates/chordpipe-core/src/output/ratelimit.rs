// Chordpipe Rate Limiter
// Minimum spacing between output events

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::clock::{Clock, MonotonicClock};
use crate::event::{Event, Stage};

/// Predicate selecting which events are rate limited
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

/// Keeps at least `1/n` seconds between consecutive matching events.
///
/// Events that are already spread out get no extra delay. When one comes
/// too early the whole pipeline blocks until its slot; this is a fixed
/// interval throttle, there are no burst credits. Non-matching events pass
/// immediately and do not move the baseline.
pub struct RateLimiter<C = MonotonicClock> {
    min_gap: Duration,
    filter: Option<EventFilter>,
    last: Option<Instant>,
    clock: C,
}

impl RateLimiter<MonotonicClock> {
    /// `per_second` may be fractional; zero or less disables limiting
    pub fn new(per_second: f64) -> Self {
        Self::with_clock(per_second, MonotonicClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(per_second: f64, clock: C) -> Self {
        Self {
            min_gap: Duration::try_from_secs_f64(per_second.recip())
                .unwrap_or(Duration::ZERO),
            filter: None,
            last: None,
            clock,
        }
    }

    /// Only limit events matching `filter`
    pub fn with_filter(mut self, filter: impl Fn(&Event) -> bool + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn min_gap(&self) -> Duration {
        self.min_gap
    }

    fn applies_to(&self, event: &Event) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }
}

impl<C: Clock> Stage for RateLimiter<C> {
    fn name(&self) -> &'static str {
        "ratelimit"
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        if self.applies_to(&event) {
            let now = self.clock.now();
            let slot = match self.last {
                Some(last) if last + self.min_gap > now => {
                    let slot = last + self.min_gap;
                    log::trace!("ratelimit: holding event for {:?}", slot - now);
                    self.clock.sleep(slot - now);
                    slot
                }
                _ => now,
            };
            self.last = Some(slot);
        }
        out.push_back(event);
    }
}
