// Chordpipe AltGr Reconstruction
// Output half of the AltGr correction protocol

use std::collections::VecDeque;

use crate::event::{Event, EventType, Stage, Value};
use crate::key::{
    is_altgr_scancode, VK_LCONTROL, VK_RMENU, WIN_EXTENDED, WIN_SCANCODE, WIN_TIME, WIN_VIRTUALKEY,
};

/// Scancode and extended flag of the left-control event that accompanies AltGr
#[derive(Debug, Clone, PartialEq)]
struct Companion {
    scancode: Value,
    extended: Value,
}

/// Rebuilds what the OS expects for AltGr.
///
/// Until an `altgr_present` marker arrives this stage is a pass-through.
/// Afterwards every right-alt key event is bracketed by a synthesized
/// left-control event carrying the remembered scancode; a right-alt keypress
/// expands to control down, alt down, control up, alt up. Left-control events
/// with an AltGr-range scancode are dropped (the bracketing already stands
/// in for them); ordinary left control passes untouched.
#[derive(Debug, Clone, Default)]
pub struct AltGrReconstructor {
    companion: Option<Companion>,
}

impl AltGrReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.companion.is_some()
    }

    fn control_event(companion: &Companion, kind: EventType, source: &Event) -> Event {
        let mut event = Event::new(kind)
            .with(WIN_SCANCODE, companion.scancode.clone())
            .with(WIN_EXTENDED, companion.extended.clone())
            .with(WIN_VIRTUALKEY, VK_LCONTROL);
        if let Some(time) = source.get(WIN_TIME) {
            event.insert(WIN_TIME, time.clone());
        }
        event
    }
}

impl Stage for AltGrReconstructor {
    fn name(&self) -> &'static str {
        "altgr-reconstruct"
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        if event.is(&EventType::AltGrPresent) {
            self.companion = Some(Companion {
                scancode: event.get(WIN_SCANCODE).cloned().unwrap_or_default(),
                extended: event.get(WIN_EXTENDED).cloned().unwrap_or_default(),
            });
            return;
        }
        let Some(companion) = &self.companion else {
            out.push_back(event);
            return;
        };
        let vk = event.key(WIN_VIRTUALKEY).and_then(Value::as_u64);
        match vk {
            Some(VK_LCONTROL) => {
                let scancode = event.get(WIN_SCANCODE).and_then(Value::as_u64).unwrap_or(0);
                if !is_altgr_scancode(scancode) {
                    out.push_back(event);
                }
            }
            Some(VK_RMENU) => match event.kind() {
                EventType::KeyPress => {
                    out.push_back(Self::control_event(companion, EventType::KeyDown, &event));
                    out.push_back(event.clone().with_kind(EventType::KeyDown));
                    out.push_back(Self::control_event(companion, EventType::KeyUp, &event));
                    out.push_back(event.with_kind(EventType::KeyUp));
                }
                kind => {
                    out.push_back(Self::control_event(companion, kind.clone(), &event));
                    out.push_back(event);
                }
            },
            _ => out.push_back(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Pipeline;

    fn marker() -> Event {
        Event::new(EventType::AltGrPresent)
            .with(WIN_SCANCODE, 0x21Du64)
            .with(WIN_EXTENDED, false)
    }

    fn key(kind: EventType, scancode: u64, vk: u64) -> Event {
        Event::new(kind)
            .with(WIN_SCANCODE, scancode)
            .with(WIN_VIRTUALKEY, vk)
    }

    fn run(events: Vec<Event>) -> Vec<Event> {
        Pipeline::new(events.into_iter())
            .stage(AltGrReconstructor::new())
            .collect()
    }

    #[test]
    fn test_pass_through_without_marker() {
        let events = vec![
            key(EventType::KeyDown, 0x38, VK_RMENU),
            key(EventType::KeyDown, 0x21D, VK_LCONTROL),
        ];
        assert_eq!(run(events.clone()), events);
    }

    #[test]
    fn test_marker_consumed_and_right_alt_bracketed() {
        let out = run(vec![
            marker(),
            key(EventType::KeyDown, 0x38, VK_RMENU).with(WIN_TIME, 7u64),
            key(EventType::KeyUp, 0x38, VK_RMENU),
        ]);
        let control_down = Event::new(EventType::KeyDown)
            .with(WIN_SCANCODE, 0x21Du64)
            .with(WIN_EXTENDED, false)
            .with(WIN_VIRTUALKEY, VK_LCONTROL)
            .with(WIN_TIME, 7u64);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], control_down);
        assert_eq!(out[1].get(WIN_VIRTUALKEY), Some(&Value::from(VK_RMENU)));
        assert_eq!(out[2].kind(), &EventType::KeyUp);
        assert_eq!(out[2].get(WIN_VIRTUALKEY), Some(&Value::from(VK_LCONTROL)));
        assert_eq!(out[3], key(EventType::KeyUp, 0x38, VK_RMENU));
    }

    #[test]
    fn test_keypress_expands_to_four_events() {
        let out = run(vec![marker(), Event::key_press(WIN_VIRTUALKEY, VK_RMENU)]);
        let summary: Vec<(&EventType, Option<u64>)> = out
            .iter()
            .map(|e| (e.kind(), e.get(WIN_VIRTUALKEY).and_then(Value::as_u64)))
            .collect();
        assert_eq!(
            summary,
            vec![
                (&EventType::KeyDown, Some(VK_LCONTROL)),
                (&EventType::KeyDown, Some(VK_RMENU)),
                (&EventType::KeyUp, Some(VK_LCONTROL)),
                (&EventType::KeyUp, Some(VK_RMENU)),
            ]
        );
    }

    #[test]
    fn test_control_filtering_after_marker() {
        let genuine = key(EventType::KeyDown, 0x1D, VK_LCONTROL);
        let injected = Event::key_down(WIN_VIRTUALKEY, VK_LCONTROL);
        let out = run(vec![
            marker(),
            genuine.clone(),
            key(EventType::KeyDown, 0x21D, VK_LCONTROL),
            injected.clone(),
        ]);
        assert_eq!(out, vec![genuine, injected]);
    }
}
