// Chordpipe Key Fields
// Field names and virtual-key codes shared by the listener, stages and injector

/// Windows scancode field
pub const WIN_SCANCODE: &str = "win_scancode";
/// Windows virtual-key field
pub const WIN_VIRTUALKEY: &str = "win_virtualkey";
/// Extended-key flag field
pub const WIN_EXTENDED: &str = "win_extended";
/// Listener timestamp; present only on events that came from the hardware
pub const WIN_TIME: &str = "win_time";
/// Unicode codepoint field (typed characters)
pub const UNICODE_CODEPOINT: &str = "unicode_codepoint";
/// Virtual keys still down when the listener started (on `init`)
pub const VKEYS_DOWN: &str = "vkeysdown";

/// VK_LCONTROL
pub const VK_LCONTROL: u64 = 0xA2;
/// VK_RMENU (right alt, AltGr when present)
pub const VK_RMENU: u64 = 0xA5;
/// Left-control events above this scancode are the AltGr companion event
pub const ALTGR_SCANCODE_MIN: u64 = 0x200;

/// Whether a scancode falls in the AltGr companion range
pub fn is_altgr_scancode(scancode: u64) -> bool {
    scancode > ALTGR_SCANCODE_MIN
}
