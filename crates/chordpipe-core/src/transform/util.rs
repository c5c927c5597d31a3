// Chordpipe Utility Stages
// Small pass/filter stages for inspecting and trimming the stream

use std::collections::VecDeque;

use crate::event::{Event, EventType, Stage};

/// Forwards everything unchanged, logging each event at debug level
#[derive(Debug, Clone)]
pub struct DebugTap {
    label: String,
}

impl DebugTap {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Stage for DebugTap {
    fn name(&self) -> &'static str {
        "debug"
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        log::debug!("[{}] {}", self.label, event);
        out.push_back(event);
    }
}

/// Keeps only events of the listed types
#[derive(Debug, Clone)]
pub struct SelectTypes {
    types: Vec<EventType>,
}

impl SelectTypes {
    pub fn new(types: impl IntoIterator<Item = EventType>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }
}

impl Stage for SelectTypes {
    fn name(&self) -> &'static str {
        "select-types"
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        if self.types.contains(event.kind()) {
            out.push_back(event);
        }
    }
}

/// Drops events of the listed types
#[derive(Debug, Clone)]
pub struct ExceptTypes {
    types: Vec<EventType>,
}

impl ExceptTypes {
    pub fn new(types: impl IntoIterator<Item = EventType>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }
}

impl Stage for ExceptTypes {
    fn name(&self) -> &'static str {
        "except-types"
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        if !self.types.contains(event.kind()) {
            out.push_back(event);
        }
    }
}

/// Strips every field not listed; the type is always kept
#[derive(Debug, Clone)]
pub struct SelectFields {
    fields: Vec<String>,
}

impl SelectFields {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl Stage for SelectFields {
    fn name(&self) -> &'static str {
        "select-fields"
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        let mut kept = Event::new(event.kind().clone());
        for (field, value) in event.fields() {
            if self.fields.iter().any(|f| f == field) {
                kept.insert(field.clone(), value.clone());
            }
        }
        out.push_back(kept);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Pipeline;

    fn sample() -> Vec<Event> {
        vec![
            Event::key_down("physkey", "A").with("win_time", 5u64),
            Event::new(EventType::Ui),
            Event::exit(),
        ]
    }

    #[test]
    fn test_debug_tap_is_identity() {
        let out: Vec<Event> = Pipeline::new(sample().into_iter())
            .stage(DebugTap::new("tap"))
            .collect();
        assert_eq!(out, sample());
    }

    #[test]
    fn test_select_and_except_types() {
        let kept: Vec<Event> = Pipeline::new(sample().into_iter())
            .stage(SelectTypes::new([EventType::KeyDown]))
            .collect();
        assert_eq!(kept.len(), 1);

        let dropped: Vec<Event> = Pipeline::new(sample().into_iter())
            .stage(ExceptTypes::new([EventType::Ui]))
            .collect();
        assert_eq!(dropped.len(), 2);
        assert!(dropped.iter().all(|e| !e.is(&EventType::Ui)));
    }

    #[test]
    fn test_select_fields() {
        let out: Vec<Event> = Pipeline::new(sample().into_iter().take(1))
            .stage(SelectFields::new(["physkey"]))
            .collect();
        assert_eq!(out, vec![Event::key_down("physkey", "A")]);
    }
}
