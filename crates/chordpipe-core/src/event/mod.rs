// Chordpipe Events
// The tagged record flowing through every stage, and the pipeline that moves it

pub mod pipeline;
pub mod value;
pub mod wire;

use std::fmt;

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use pipeline::{Pipeline, Stage, Staged};
pub use value::Value;
pub use wire::{write_events, LineSource, WireError};

/// Field carrying the chord key list on `chord` events
pub const CHORD_FIELD: &str = "chord";
/// Field carrying the nested document on `output` and `ui` events
pub const DATA_FIELD: &str = "data";
/// Marker set by the stuck-key watchdog on forced releases
pub const NOOP_FIELD: &str = "noop";
/// Optional repeat count on `chord` events
pub const REPEAT_FIELD: &str = "repeat";

/// Event discriminant (the `type` field)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    KeyDown,
    KeyUp,
    KeyPress,
    Chord,
    KeyUpAll,
    Ui,
    Output,
    Exit,
    AltGrPresent,
    Init,
    /// Any type no stage knows about; carried through untouched
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::KeyDown => "keydown",
            EventType::KeyUp => "keyup",
            EventType::KeyPress => "keypress",
            EventType::Chord => "chord",
            EventType::KeyUpAll => "keyup_all",
            EventType::Ui => "ui",
            EventType::Output => "output",
            EventType::Exit => "exit",
            EventType::AltGrPresent => "altgr_present",
            EventType::Init => "init",
            EventType::Other(s) => s,
        }
    }

    /// keydown, keyup or keypress
    pub fn is_key(&self) -> bool {
        matches!(
            self,
            EventType::KeyDown | EventType::KeyUp | EventType::KeyPress
        )
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        match s {
            "keydown" => EventType::KeyDown,
            "keyup" => EventType::KeyUp,
            "keypress" => EventType::KeyPress,
            "chord" => EventType::Chord,
            "keyup_all" => EventType::KeyUpAll,
            "ui" => EventType::Ui,
            "output" => EventType::Output,
            "exit" => EventType::Exit,
            "altgr_present" => EventType::AltGrPresent,
            "init" => EventType::Init,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single event: a discriminant plus an open, ordered attribute map.
///
/// Stages that do not consume a field must leave it alone, so everything
/// besides `type` lives in `fields` regardless of whether chordpipe knows it.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventType,
    fields: IndexMap<String, Value>,
}

impl Event {
    pub fn new(kind: EventType) -> Self {
        Self {
            kind,
            fields: IndexMap::new(),
        }
    }

    /// Builder-style field insertion
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Same fields, different discriminant
    pub fn with_kind(mut self, kind: EventType) -> Self {
        self.kind = kind;
        self
    }

    pub fn kind(&self) -> &EventType {
        &self.kind
    }

    pub fn is(&self, kind: &EventType) -> bool {
        &self.kind == kind
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn key_down(field: &str, key: impl Into<Value>) -> Self {
        Self::new(EventType::KeyDown).with(field, key)
    }

    pub fn key_up(field: &str, key: impl Into<Value>) -> Self {
        Self::new(EventType::KeyUp).with(field, key)
    }

    pub fn key_press(field: &str, key: impl Into<Value>) -> Self {
        Self::new(EventType::KeyPress).with(field, key)
    }

    pub fn chord(keys: Vec<Value>) -> Self {
        Self::new(EventType::Chord).with(CHORD_FIELD, Value::List(keys))
    }

    pub fn key_up_all() -> Self {
        Self::new(EventType::KeyUpAll)
    }

    pub fn exit() -> Self {
        Self::new(EventType::Exit)
    }

    /// A `ui` event whose `data` is the given map
    pub fn ui(data: IndexMap<String, Value>) -> Self {
        Self::new(EventType::Ui).with(DATA_FIELD, Value::Map(data))
    }

    /// Wrap an event so it reaches the sink as-is, bypassing every stage
    pub fn output(inner: &Event) -> Self {
        Self::new(EventType::Output).with(DATA_FIELD, inner.to_value())
    }

    /// Key identity under `field`, for key events only
    pub fn key(&self, field: &str) -> Option<&Value> {
        if self.kind.is_key() {
            self.fields.get(field)
        } else {
            None
        }
    }

    /// Whether the watchdog marked this as a forced release
    pub fn is_noop(&self) -> bool {
        self.fields.get(NOOP_FIELD).is_some_and(Value::is_truthy)
    }

    /// Keys of a `chord` event (list or set payload)
    pub fn chord_keys(&self) -> Option<&[Value]> {
        if self.kind == EventType::Chord {
            self.fields.get(CHORD_FIELD).and_then(Value::as_items)
        } else {
            None
        }
    }

    /// The whole event as a map value, `type` first
    pub fn to_value(&self) -> Value {
        let mut map = IndexMap::with_capacity(self.fields.len() + 1);
        map.insert("type".to_string(), Value::from(self.kind.as_str()));
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.clone());
        }
        Value::Map(map)
    }

    /// Rebuild an event from a map value with a string `type`
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Map(mut map) = value else {
            return None;
        };
        let kind = match map.shift_remove("type") {
            Some(Value::String(s)) => EventType::from(s.as_str()),
            _ => return None,
        };
        Some(Self { kind, fields: map })
    }

    /// The document the sink writes: `output` events unwrap to their payload
    pub fn sink_document(&self) -> Value {
        if self.kind == EventType::Output {
            if let Some(data) = self.fields.get(DATA_FIELD) {
                return data.clone();
            }
        }
        self.to_value()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("type", self.kind.as_str())?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    fields: IndexMap<String, Value>,
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEvent::deserialize(deserializer)?;
        Ok(Self {
            kind: EventType::from(raw.kind.as_str()),
            fields: raw.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_round_trips_names() {
        for name in [
            "keydown",
            "keyup",
            "keypress",
            "chord",
            "keyup_all",
            "ui",
            "output",
            "exit",
            "altgr_present",
            "init",
        ] {
            assert_eq!(EventType::from(name).as_str(), name);
        }
        assert_eq!(
            EventType::from("mouse"),
            EventType::Other("mouse".to_string())
        );
    }

    #[test]
    fn test_deserialize_keeps_unknown_fields_in_order() {
        let event: Event =
            serde_json::from_str(r#"{"type":"keydown","zeta":1,"alpha":"x","win_virtualkey":65}"#)
                .unwrap();
        assert_eq!(event.kind(), &EventType::KeyDown);
        let names: Vec<&str> = event.fields().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["zeta", "alpha", "win_virtualkey"]);
    }

    #[test]
    fn test_deserialize_requires_type() {
        let result: Result<Event, _> = serde_json::from_str(r#"{"win_virtualkey":65}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_puts_type_first() {
        let event = Event::key_up("physkey", "E0038").with("noop", true);
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"keyup","physkey":"E0038","noop":true}"#
        );
    }

    #[test]
    fn test_output_unwraps_for_sink() {
        let inner = Event::key_up("win_virtualkey", 91);
        let wrapped = Event::output(&inner);
        assert_eq!(wrapped.kind(), &EventType::Output);
        assert_eq!(wrapped.sink_document(), inner.to_value());
    }

    #[test]
    fn test_value_round_trip() {
        let event = Event::chord(vec![Value::from("A"), Value::from("B")]);
        assert_eq!(Event::from_value(event.to_value()), Some(event));
    }

    #[test]
    fn test_key_only_on_key_events() {
        let down = Event::key_down("physkey", "_001E");
        assert_eq!(down.key("physkey"), Some(&Value::from("_001E")));
        let chord = Event::chord(vec![Value::from("_001E")]);
        assert_eq!(chord.key("physkey"), None);
        assert_eq!(chord.chord_keys().map(|k| k.len()), Some(1));
    }
}
