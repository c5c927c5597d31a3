// Chordpipe Input Stages
// Stages that run close to the listener, before chord detection

mod altgr;
mod init;
mod repeat;
mod watchdog;

pub use altgr::AltGrDetector;
pub use init::ReleaseAllAtInit;
pub use repeat::RepeatNormalizer;
pub use watchdog::{StuckKeyEntry, StuckKeyWatchdog};
