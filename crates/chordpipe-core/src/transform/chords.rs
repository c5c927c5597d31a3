// Chordpipe Chord Detection
// Raw down/up events to chord events, letting any key act as a modifier

use std::collections::VecDeque;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::event::{Event, EventType, Stage, Value};

/// Converts key events to chords.
///
/// ```text
///  Key event | Chord event
///   A down   | -
///   S down   | -
///   J down   | -
///   J up     | [A S J]
///   A up     | -
///   S up     | -   (then keyup_all)
/// ```
///
/// Keys are kept in press order. `mods` splits that sequence: keys before it
/// already served as modifiers of an emitted chord, keys from it on are still
/// pending. Releasing a pending key closes a chord of everything up to and
/// including it; releasing a settled modifier only shrinks `mods`.
///
/// A `keyup_all` is emitted whenever no keys remain down, which lets
/// [`ChordPlayer`](crate::output::ChordPlayer) keep modifiers held between
/// chords the way the user did (Alt+Tab, Tab, Tab, release Alt).
#[derive(Debug, Clone)]
pub struct ChordDetector {
    field: String,
    ui_key: String,
    down: SmallVec<[Value; 8]>,
    mods: usize,
}

impl ChordDetector {
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            ui_key: format!("events_to_chords.keysdown.{field}"),
            field,
            down: SmallVec::new(),
            mods: 0,
        }
    }

    /// Keys currently down, in press order
    pub fn keys_down(&self) -> &[Value] {
        &self.down
    }

    /// Number of leading keys already consumed as modifiers
    pub fn committed(&self) -> usize {
        self.mods
    }

    fn snapshot(&self) -> Event {
        let mut data = IndexMap::new();
        data.insert(self.ui_key.clone(), Value::List(self.down.to_vec()));
        Event::ui(data)
    }

    fn key_down(&mut self, key: Value, out: &mut VecDeque<Event>) {
        if !self.down.contains(&key) {
            self.down.push(key);
        }
        out.push_back(self.snapshot());
    }

    fn key_up(&mut self, key: &Value, noop: bool, out: &mut VecDeque<Event>) {
        let Some(i) = self.down.iter().position(|k| k == key) else {
            log::trace!("chords: ignoring release of {} (not down)", key);
            return;
        };
        if i >= self.mods {
            if !noop {
                out.push_back(Event::chord(self.down[..=i].to_vec()));
                self.mods = i;
            }
        } else {
            self.mods -= 1;
        }
        self.down.remove(i);
        out.push_back(self.snapshot());
        if self.down.is_empty() {
            out.push_back(Event::key_up_all());
        }
    }
}

impl Stage for ChordDetector {
    fn name(&self) -> &'static str {
        "chord-detect"
    }

    fn start(&mut self, out: &mut VecDeque<Event>) {
        out.push_back(self.snapshot());
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        match event.kind() {
            EventType::KeyDown => match event.key(&self.field) {
                Some(key) => self.key_down(key.clone(), out),
                None => log::trace!("chords: keydown without {}", self.field),
            },
            EventType::KeyUp => match event.key(&self.field) {
                Some(key) => {
                    let key = key.clone();
                    self.key_up(&key, event.is_noop(), out)
                }
                None => log::trace!("chords: keyup without {}", self.field),
            },
            EventType::Exit => {
                out.push_back(Event::key_up_all());
                out.push_back(event);
            }
            _ => out.push_back(event),
        }
    }
}
