// Chordpipe Repeat Normalizer
// Turns OS auto-repeat into explicit up/down pairs

use std::collections::VecDeque;

use smallvec::SmallVec;

use crate::event::{Event, EventType, Stage, Value};

/// Inserts a keyup before any keydown/keypress for a key already down.
///
/// The chord detector ignores a second keydown for a held key, so without
/// this stage holding a key produces a single chord. With it, every repeat
/// closes a chord of its own.
#[derive(Debug, Clone)]
pub struct RepeatNormalizer {
    field: String,
    down: SmallVec<[Value; 8]>,
}

impl RepeatNormalizer {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            down: SmallVec::new(),
        }
    }

    fn position(&self, key: &Value) -> Option<usize> {
        self.down.iter().position(|k| k == key)
    }
}

impl Stage for RepeatNormalizer {
    fn name(&self) -> &'static str {
        "repeat"
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        let Some(key) = event.key(&self.field).cloned() else {
            out.push_back(event);
            return;
        };
        let held = self.position(&key);
        match event.kind() {
            EventType::KeyDown | EventType::KeyPress if held.is_some() => {
                out.push_back(event.clone().with_kind(EventType::KeyUp));
            }
            _ => {}
        }
        match event.kind() {
            EventType::KeyDown if held.is_none() => self.down.push(key),
            EventType::KeyUp | EventType::KeyPress => {
                if let Some(i) = held {
                    self.down.remove(i);
                }
            }
            _ => {}
        }
        out.push_back(event);
    }
}
