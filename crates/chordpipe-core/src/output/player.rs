// Chordpipe Chord Player
// Chord events back to key events, keeping shared modifiers held

use std::collections::VecDeque;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::event::{Event, EventType, Stage, Value, REPEAT_FIELD};

/// Converts chords to key events.
///
/// ```text
///  Chord        | Key events
///   Alt+Tab     | Alt down, Tab press
///   Alt+Tab     | Tab press
///   Ctrl+Alt+P  | Ctrl down, P press
///  (keyup_all)  | Alt up, Ctrl up
/// ```
///
/// Modifiers stay down until a `keyup_all` or a chord that does not use
/// them, so consecutive chords sharing modifiers never release and re-press
/// them in between.
#[derive(Debug, Clone)]
pub struct ChordPlayer {
    field: String,
    ui_key: String,
    held: SmallVec<[Value; 8]>,
}

impl ChordPlayer {
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            ui_key: format!("chords_to_events.keysdown.{field}"),
            field,
            held: SmallVec::new(),
        }
    }

    /// Modifiers currently held on the output, in press order
    pub fn held(&self) -> &[Value] {
        &self.held
    }

    fn snapshot(&self) -> Event {
        let mut data = IndexMap::new();
        data.insert(self.ui_key.clone(), Value::List(self.held.to_vec()));
        Event::ui(data)
    }

    fn release_all(&mut self, out: &mut VecDeque<Event>) {
        for key in self.held.drain(..).rev() {
            out.push_back(Event::key_up(&self.field, key));
        }
    }

    fn play(&mut self, mods: &[Value], key: &Value, repeat: u64, out: &mut VecDeque<Event>) {
        let mut i = self.held.len();
        while i > 0 {
            i -= 1;
            if !mods.contains(&self.held[i]) {
                let released = self.held.remove(i);
                out.push_back(Event::key_up(&self.field, released));
            }
        }
        for modifier in mods {
            if !self.held.contains(modifier) {
                out.push_back(Event::key_down(&self.field, modifier.clone()));
                self.held.push(modifier.clone());
            }
        }
        for _ in 0..repeat {
            out.push_back(Event::key_press(&self.field, key.clone()));
        }
    }
}

impl Stage for ChordPlayer {
    fn name(&self) -> &'static str {
        "chord-play"
    }

    fn start(&mut self, out: &mut VecDeque<Event>) {
        out.push_back(self.snapshot());
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        match event.kind() {
            EventType::KeyUpAll => {
                self.release_all(out);
                out.push_back(self.snapshot());
                out.push_back(event);
            }
            EventType::Chord => {
                let Some((key, mods)) = event.chord_keys().and_then(<[Value]>::split_last) else {
                    log::warn!("dropping chord without keys: {}", event);
                    return;
                };
                let repeat = event
                    .get(REPEAT_FIELD)
                    .and_then(Value::as_u64)
                    .unwrap_or(1);
                self.play(mods, key, repeat, out);
                out.push_back(self.snapshot());
            }
            _ => out.push_back(event),
        }
    }
}
