// Chordpipe Core Library
// Key event pipeline: chording, macros and AltGr correction

pub mod clock;
pub mod config;
pub mod event;
pub mod input;
pub mod key;
pub mod output;
pub mod transform;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{Config, ConfigError};
pub use event::{
    write_events, Event, EventType, LineSource, Pipeline, Stage, Staged, Value, WireError,
};
pub use input::{AltGrDetector, ReleaseAllAtInit, RepeatNormalizer, StuckKeyWatchdog};
pub use output::{AltGrReconstructor, ChordPlayer, RateLimiter, SendkeyCleanup};
pub use transform::{
    ChordDetector, MacroBindings, MacroEngine, MacroStore, MacroStoreError, MacroTrigger,
};
