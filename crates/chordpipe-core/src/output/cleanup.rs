// Chordpipe Injector Cleanup
// Reduces key events to what the key injector understands

use std::collections::VecDeque;

use crate::event::{Event, EventType, Stage};
use crate::key::{UNICODE_CODEPOINT, WIN_EXTENDED, WIN_SCANCODE, WIN_VIRTUALKEY};

const KEPT_FIELDS: [&str; 4] = [WIN_SCANCODE, WIN_VIRTUALKEY, WIN_EXTENDED, UNICODE_CODEPOINT];
const SENDABLE_FIELDS: [&str; 3] = [WIN_VIRTUALKEY, WIN_SCANCODE, UNICODE_CODEPOINT];

/// Last stage before the sink.
///
/// Key events keep only their non-empty injector fields and are dropped when
/// nothing sendable is left. `output` events pass as-is; every other event
/// (ui, chord leftovers, exit) is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendkeyCleanup;

impl Stage for SendkeyCleanup {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        match event.kind() {
            EventType::Output => out.push_back(event),
            kind if kind.is_key() => {
                let mut cleaned = Event::new(kind.clone());
                let mut sendable = false;
                for field in KEPT_FIELDS {
                    if let Some(value) = event.get(field).filter(|v| v.is_truthy()) {
                        cleaned.insert(field, value.clone());
                        sendable |= SENDABLE_FIELDS.contains(&field);
                    }
                }
                if sendable {
                    out.push_back(cleaned);
                } else {
                    log::trace!("cleanup: nothing to send in {}", event);
                }
            }
            _ => {}
        }
    }
}
