// Chordpipe Config API
// TOML pipeline configuration

pub mod parser;

pub use parser::{
    default_config_content, AltGrConfig, Config, ConfigError, FieldConfig, GeneralConfig,
    MacroConfig, RateLimitConfig, TimeoutEntry, WatchdogConfig,
};
