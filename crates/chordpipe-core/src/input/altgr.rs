// Chordpipe AltGr Detection
// Input half of the AltGr correction protocol

use std::collections::VecDeque;

use crate::event::{Event, EventType, Stage, Value};
use crate::key::{
    is_altgr_scancode, VK_LCONTROL, VK_RMENU, WIN_EXTENDED, WIN_SCANCODE, WIN_TIME, WIN_VIRTUALKEY,
};

/// Detects AltGr and strips its companion left-control events.
///
/// On layouts with AltGr, one physical press is reported as a left-control
/// event with an out-of-range scancode plus a right-alt event, and the
/// releases are not reliable. The first such left-control event announces
/// AltGr with a one-shot `altgr_present` marker (consumed by
/// [`AltGrReconstructor`](crate::output::AltGrReconstructor)); from then on
/// every left-control event with that scancode is dropped, so the stages in
/// between only ever see right-alt.
#[derive(Debug, Clone, Default)]
pub struct AltGrDetector {
    scancode: Option<u64>,
}

impl AltGrDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.scancode.is_some()
    }
}

/// (scancode, virtual key) of a hardware keydown/keyup for lctrl or rmenu
fn control_or_altgr(event: &Event) -> Option<(u64, u64)> {
    if !matches!(event.kind(), EventType::KeyDown | EventType::KeyUp) || !event.contains(WIN_TIME) {
        return None;
    }
    let scancode = event.get(WIN_SCANCODE)?.as_u64()?;
    let vk = event.get(WIN_VIRTUALKEY)?.as_u64()?;
    (vk == VK_LCONTROL || vk == VK_RMENU).then_some((scancode, vk))
}

impl Stage for AltGrDetector {
    fn name(&self) -> &'static str {
        "altgr-detect"
    }

    fn process(&mut self, event: Event, out: &mut VecDeque<Event>) {
        let Some((scancode, vk)) = control_or_altgr(&event) else {
            out.push_back(event);
            return;
        };
        if vk != VK_LCONTROL {
            out.push_back(event);
            return;
        }
        if self.scancode.is_none() && is_altgr_scancode(scancode) {
            log::debug!("AltGr detected (scancode {:#x})", scancode);
            self.scancode = Some(scancode);
            let extended = event.get(WIN_EXTENDED).cloned().unwrap_or(Value::Bool(false));
            out.push_back(
                Event::new(EventType::AltGrPresent)
                    .with(WIN_SCANCODE, scancode)
                    .with(WIN_EXTENDED, extended),
            );
        }
        if self.scancode != Some(scancode) {
            out.push_back(event);
        }
    }
}
