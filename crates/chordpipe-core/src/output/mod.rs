// Chordpipe Output Stages
// Stages between the chord stream and the key injector

mod altgr;
mod cleanup;
mod player;
mod ratelimit;

pub use altgr::AltGrReconstructor;
pub use cleanup::SendkeyCleanup;
pub use player::ChordPlayer;
pub use ratelimit::{EventFilter, RateLimiter};
