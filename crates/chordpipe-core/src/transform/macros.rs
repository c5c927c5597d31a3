// Chordpipe Macro Engine
// Record, save, cancel and play back sequences of chords

use std::collections::VecDeque;

use indexmap::IndexMap;
use strum_macros::{AsRefStr, Display};

use super::store::{MacroStore, MacroTable};
use crate::event::{Event, EventType, Stage, Value};

/// What a chord means to the macro engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroTrigger {
    /// Ordinary chord
    None,
    /// Begin recording (while waiting) or cancel it (while recording)
    Toggle,
    /// Save under this name (while recording) or play it back (while waiting)
    Name(String),
}

/// Decision function mapping a chord's keys to a trigger
pub type MacroTest = Box<dyn Fn(&[Value]) -> MacroTrigger>;

/// Reported in `ui` events as `macro.state`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum MacroState {
    Waiting,
    Recording,
    Playback,
}

/// Reported in `ui` events as `macro.transition`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum MacroTransition {
    Record,
    Save,
    Cancel,
    Playback,
    FinishPlayback,
}

/// Config-driven trigger rules.
///
/// A chord equal to `toggle` toggles recording; a chord made of `prefix`
/// plus one more key names a macro after that key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MacroBindings {
    pub toggle: Vec<Value>,
    pub prefix: Vec<Value>,
}

impl MacroBindings {
    pub fn trigger(&self, chord: &[Value]) -> MacroTrigger {
        if !self.toggle.is_empty() && chord == self.toggle.as_slice() {
            return MacroTrigger::Toggle;
        }
        match chord.split_last() {
            Some((last, mods)) if !self.prefix.is_empty() && mods == self.prefix.as_slice() => {
                MacroTrigger::Name(last.render())
            }
            _ => MacroTrigger::None,
        }
    }

    pub fn into_test(self) -> MacroTest {
        Box::new(move |chord| self.trigger(chord))
    }
}

enum Mode {
    Waiting,
    Recording(Vec<Event>),
}

/// Macro record/playback over the chord stream.
///
/// ```text
///  TRANSITION      FROM        TO
///  record          waiting  -> recording
///  save            recording -> waiting
///  cancel          recording -> waiting
///  playback        waiting  -> playback
///  finishplayback  playback -> waiting
/// ```
///
/// Trigger chords are consumed. While recording, every other chord is both
/// recorded and forwarded. Playback emits the stored chords downstream in
/// order, bracketed by `ui` events.
pub struct MacroEngine {
    test: MacroTest,
    store: MacroStore,
    macros: MacroTable,
    mode: Mode,
}

impl MacroEngine {
    /// Create the engine, loading any macros already in `store`
    pub fn new(test: MacroTest, store: MacroStore) -> Self {
        let macros = store.load();
        Self {
            test,
            store,
            macros,
            mode: Mode::Waiting,
        }
    }

    pub fn state(&self) -> MacroState {
        match self.mode {
            Mode::Waiting => MacroState::Waiting,
            Mode::Recording(_) => MacroState::Recording,
        }
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    fn ui(state: MacroState, transition: Option<MacroTransition>) -> Event {
        let mut data = IndexMap::new();
        data.insert("macro.state".to_string(), Value::from(state.as_ref()));
        if let Some(transition) = transition {
            data.insert(
                "macro.transition".to_string(),
                Value::from(transition.as_ref()),
            );
        }
        Event::ui(data)
    }

    fn save(&mut self, name: String, recorded: Vec<Event>) {
        log::debug!("macro {:?}: saved {} chord(s)", name, recorded.len());
        self.macros.insert(name, recorded);
        if let Err(e) = self.store.save(&self.macros) {
            log::warn!("could not persist macros: {}", e);
        }
    }

    fn play(&self, name: &str, event: Event, out: &mut VecDeque<Event>) {
        match self.macros.get(name) {
            Some(recorded) => {
                log::debug!("macro {:?}: playing {} chord(s)", name, recorded.len());
                out.push_back(Self::ui(
                    MacroState::Playback,
                    Some(MacroTransition::Playback),
                ));
                out.extend(recorded.iter().cloned());
                out.push_back(Self::ui(
                    MacroState::Waiting,
                    Some(MacroTransition::FinishPlayback),
                ));
            }
            None => {
                log::debug!("macro {:?}: unknown, passing chord through", name);
                out.push_back(event);
            }
        }
    }
}

impl Stage for MacroEngine {
    fn name(&self) -> &'static str {
        "macro"
    }

    fn start(&mut self, out: &mut VecDeque<Event>) {
        out.push_back(Self::ui(MacroState::Waiting, None));
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        let trigger = event
            .chord_keys()
            .map(|keys| (self.test)(keys))
            .unwrap_or(MacroTrigger::None);

        match trigger {
            MacroTrigger::None => {
                if let Mode::Recording(recorded) = &mut self.mode {
                    if event.is(&EventType::Chord) {
                        recorded.push(event.clone());
                    }
                }
                out.push_back(event);
            }
            MacroTrigger::Toggle => match std::mem::replace(&mut self.mode, Mode::Waiting) {
                Mode::Waiting => {
                    log::debug!("macro: recording");
                    self.mode = Mode::Recording(Vec::new());
                    out.push_back(Self::ui(
                        MacroState::Recording,
                        Some(MacroTransition::Record),
                    ));
                }
                Mode::Recording(recorded) => {
                    log::debug!("macro: cancelled, dropped {} chord(s)", recorded.len());
                    out.push_back(Self::ui(MacroState::Waiting, Some(MacroTransition::Cancel)));
                }
            },
            MacroTrigger::Name(name) => match std::mem::replace(&mut self.mode, Mode::Waiting) {
                Mode::Recording(recorded) => {
                    self.save(name, recorded);
                    out.push_back(Self::ui(MacroState::Waiting, Some(MacroTransition::Save)));
                }
                Mode::Waiting => self.play(&name, event, out),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(name: &str) -> Value {
        Value::from(name)
    }

    fn chord(keys: &[&str]) -> Event {
        Event::chord(keys.iter().map(|s| k(s)).collect())
    }

    fn engine() -> MacroEngine {
        let bindings = MacroBindings {
            toggle: vec![k("Win"), k("R")],
            prefix: vec![k("Win")],
        };
        MacroEngine::new(bindings.into_test(), MacroStore::in_memory())
    }

    fn feed(stage: &mut MacroEngine, event: Event) -> Vec<Event> {
        let mut out = VecDeque::new();
        stage.process(event, &mut out);
        out.into_iter().collect()
    }

    fn transition(event: &Event) -> Option<String> {
        event
            .get("data")?
            .as_map()?
            .get("macro.transition")?
            .as_str()
            .map(str::to_string)
    }

    #[test]
    fn test_state_names() {
        assert_eq!(MacroState::Recording.to_string(), "recording");
        assert_eq!(MacroTransition::FinishPlayback.as_ref(), "finishplayback");
    }

    #[test]
    fn test_bindings() {
        let bindings = MacroBindings {
            toggle: vec![k("Win"), k("R")],
            prefix: vec![k("Win")],
        };
        assert_eq!(bindings.trigger(&[k("Win"), k("R")]), MacroTrigger::Toggle);
        assert_eq!(
            bindings.trigger(&[k("Win"), k("M")]),
            MacroTrigger::Name("M".to_string())
        );
        assert_eq!(bindings.trigger(&[k("M")]), MacroTrigger::None);
        assert_eq!(bindings.trigger(&[k("Ctrl"), k("M")]), MacroTrigger::None);
        assert_eq!(MacroBindings::default().trigger(&[k("M")]), MacroTrigger::None);
    }

    #[test]
    fn test_record_save_and_play() {
        let mut stage = engine();
        let out = feed(&mut stage, chord(&["Win", "R"]));
        assert_eq!(out.len(), 1);
        assert_eq!(transition(&out[0]).as_deref(), Some("record"));
        assert_eq!(stage.state(), MacroState::Recording);

        assert_eq!(feed(&mut stage, chord(&["A"])), vec![chord(&["A"])]);
        let unrelated = Event::new(EventType::KeyUpAll);
        assert_eq!(feed(&mut stage, unrelated.clone()), vec![unrelated]);
        assert_eq!(feed(&mut stage, chord(&["Ctrl", "B"])), vec![chord(&["Ctrl", "B"])]);

        let out = feed(&mut stage, chord(&["Win", "M"]));
        assert_eq!(transition(&out[0]).as_deref(), Some("save"));
        assert_eq!(stage.state(), MacroState::Waiting);
        assert_eq!(stage.macros()["M"], vec![chord(&["A"]), chord(&["Ctrl", "B"])]);

        let out = feed(&mut stage, chord(&["Win", "M"]));
        assert_eq!(out.len(), 4);
        assert_eq!(transition(&out[0]).as_deref(), Some("playback"));
        assert_eq!(out[1], chord(&["A"]));
        assert_eq!(out[2], chord(&["Ctrl", "B"]));
        assert_eq!(transition(&out[3]).as_deref(), Some("finishplayback"));
    }

    #[test]
    fn test_cancel_discards_recording() {
        let mut stage = engine();
        feed(&mut stage, chord(&["Win", "R"]));
        feed(&mut stage, chord(&["A"]));
        let out = feed(&mut stage, chord(&["Win", "R"]));
        assert_eq!(out.len(), 1);
        assert_eq!(transition(&out[0]).as_deref(), Some("cancel"));
        assert!(stage.macros().is_empty());
        assert_eq!(stage.state(), MacroState::Waiting);
    }

    #[test]
    fn test_unknown_name_passes_through() {
        let mut stage = engine();
        let out = feed(&mut stage, chord(&["Win", "Q"]));
        assert_eq!(out, vec![chord(&["Win", "Q"])]);
    }

    #[test]
    fn test_start_reports_waiting() {
        let mut stage = engine();
        let mut out = VecDeque::new();
        stage.start(&mut out);
        let data = out[0].get("data").and_then(Value::as_map).unwrap();
        assert_eq!(data.get("macro.state"), Some(&k("waiting")));
        assert!(!data.contains_key("macro.transition"));
    }
}
