// Chordpipe Startup Release
// Releases keys that were already down when the listener started

use std::collections::VecDeque;

use crate::event::{Event, EventType, Stage};
use crate::key::{VKEYS_DOWN, WIN_VIRTUALKEY};

/// After the `init` event, sends an `output`-wrapped keyup for every virtual
/// key listed in its `vkeysdown`, so nothing in between can swallow them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseAllAtInit;

impl Stage for ReleaseAllAtInit {
    fn name(&self) -> &'static str {
        "release-at-init"
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        let held: Vec<_> = if event.is(&EventType::Init) {
            event
                .get(VKEYS_DOWN)
                .and_then(|v| v.as_items())
                .map(<[_]>::to_vec)
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        out.push_back(event);
        for vk in held {
            log::debug!("releasing {} held at startup", vk);
            out.push_back(Event::output(&Event::key_up(WIN_VIRTUALKEY, vk)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Pipeline, Value};

    #[test]
    fn test_init_releases_held_keys() {
        let init = Event::new(EventType::Init).with(
            VKEYS_DOWN,
            Value::List(vec![Value::from(0x5Bu64), Value::from(0xA0u64)]),
        );
        let out: Vec<Event> = Pipeline::new(vec![init.clone()].into_iter())
            .stage(ReleaseAllAtInit)
            .collect();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], init);
        assert_eq!(
            out[1].sink_document(),
            Event::key_up(WIN_VIRTUALKEY, 0x5Bu64).to_value()
        );
        assert_eq!(out[2].kind(), &EventType::Output);
    }

    #[test]
    fn test_other_events_pass() {
        let events = vec![Event::new(EventType::Init), Event::key_down(WIN_VIRTUALKEY, 65u64)];
        let out: Vec<Event> = Pipeline::new(events.clone().into_iter())
            .stage(ReleaseAllAtInit)
            .collect();
        assert_eq!(out, events);
    }
}
