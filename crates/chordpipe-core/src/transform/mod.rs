// Chordpipe Transform Stages
// Chord detection and the macro engine that runs on the chord stream

pub mod chords;
pub mod macros;
pub mod store;
pub mod util;

pub use chords::ChordDetector;
pub use macros::{MacroBindings, MacroEngine, MacroState, MacroTest, MacroTransition, MacroTrigger};
pub use store::{MacroStore, MacroStoreError, MacroTable};
pub use util::{DebugTap, ExceptTypes, SelectFields, SelectTypes};
