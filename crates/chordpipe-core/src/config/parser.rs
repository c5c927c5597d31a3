// Chordpipe Config Parser - TOML with Serde
// Parses the pipeline configuration and assembles the stage list

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::event::{EventType, Stage, Value};
use crate::input::{AltGrDetector, ReleaseAllAtInit, RepeatNormalizer, StuckKeyWatchdog};
use crate::output::{AltGrReconstructor, ChordPlayer, RateLimiter, SendkeyCleanup};
use crate::transform::{ChordDetector, DebugTap, MacroBindings, MacroEngine, MacroStore};

/// Configuration parser errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Root of the TOML file.
///
/// Every section is optional; a stage whose section is missing is left out
/// of the pipeline (AltGr correction, startup release and cleanup are on by
/// default).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub altgr: AltGrConfig,

    /// Repeat normalization
    #[serde(default)]
    pub repeat: Option<FieldConfig>,

    /// Stuck-key watchdog
    #[serde(default)]
    pub watchdog: Option<WatchdogConfig>,

    /// Chord detection and playback
    #[serde(default)]
    pub chords: Option<FieldConfig>,

    /// Macro record/playback (needs `[chords]`)
    #[serde(default, rename = "macro")]
    pub macros: Option<MacroConfig>,

    /// Output rate limiting
    #[serde(default)]
    pub ratelimit: Option<RateLimitConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Release keys reported down in the `init` event
    #[serde(default = "default_true")]
    pub release_at_init: bool,

    /// Strip events down to what the injector accepts
    #[serde(default = "default_true")]
    pub cleanup: bool,

    /// Log the stream entering and leaving the pipeline
    #[serde(default)]
    pub debug: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            release_at_init: true,
            cleanup: true,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AltGrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for AltGrConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// A stage parameterized only by its key identity field
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    pub field: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchdogConfig {
    pub field: String,
    #[serde(default)]
    pub timeouts: Vec<TimeoutEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutEntry {
    pub key: serde_json::Value,
    pub ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MacroConfig {
    /// Macro file; defaults to the data directory
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Keep macros in memory only
    #[serde(default)]
    pub no_file: bool,

    /// Chord that begins/cancels recording
    #[serde(default)]
    pub toggle: Vec<serde_json::Value>,

    /// Modifiers that, plus one key, save or play the macro named after it
    #[serde(default)]
    pub prefix: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Events per second, may be fractional
    pub per_second: f64,

    /// Event types to limit; all events when absent
    #[serde(default)]
    pub types: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

impl MacroConfig {
    pub fn bindings(&self) -> MacroBindings {
        MacroBindings {
            toggle: self.toggle.iter().cloned().map(Value::from).collect(),
            prefix: self.prefix.iter().cloned().map(Value::from).collect(),
        }
    }

    pub fn store(&self) -> MacroStore {
        if self.no_file {
            return MacroStore::in_memory();
        }
        match self.file.as_deref().map(expand_home).or_else(MacroStore::default_path) {
            Some(path) => MacroStore::at(path),
            None => {
                log::warn!("no data directory for the macro file, macros will not persist");
                MacroStore::in_memory()
            }
        }
    }
}

impl WatchdogConfig {
    pub fn timeouts(&self) -> Vec<(Value, Duration)> {
        self.timeouts
            .iter()
            .map(|t| (Value::from(t.key.clone()), Duration::from_millis(t.ms)))
            .collect()
    }
}

impl Config {
    /// Load a config file
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate config text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Default config path (~/.config/chordpipe/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("chordpipe").join("config.toml"))
    }

    /// Load from the default location, or defaults if there is no file
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                log::debug!("loading config from {}", path.display());
                return Self::from_toml_path(path);
            }
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (section, field) in [
            ("repeat", self.repeat.as_ref().map(|c| c.field.as_str())),
            ("chords", self.chords.as_ref().map(|c| c.field.as_str())),
            ("watchdog", self.watchdog.as_ref().map(|c| c.field.as_str())),
        ] {
            if field == Some("") {
                return Err(ConfigError::InvalidValue(format!(
                    "[{section}] field must not be empty"
                )));
            }
        }
        if self.macros.is_some() && self.chords.is_none() {
            return Err(ConfigError::InvalidValue(
                "[macro] requires a [chords] section".to_string(),
            ));
        }
        if let Some(macros) = &self.macros {
            if macros.toggle.is_empty() && macros.prefix.is_empty() {
                log::warn!("[macro] has neither toggle nor prefix, it will never trigger");
            }
        }
        if let Some(ratelimit) = &self.ratelimit {
            if !(ratelimit.per_second.is_finite() && ratelimit.per_second > 0.0) {
                return Err(ConfigError::InvalidValue(
                    "[ratelimit] per_second must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Assemble the stage list in pipeline order
    pub fn build_stages(&self) -> Vec<Box<dyn Stage>> {
        let mut stages: Vec<Box<dyn Stage>> = Vec::new();

        if self.general.debug {
            stages.push(Box::new(DebugTap::new("in")));
        }
        if self.general.release_at_init {
            stages.push(Box::new(ReleaseAllAtInit));
        }
        if self.altgr.enabled {
            stages.push(Box::new(AltGrDetector::new()));
        }
        if let Some(repeat) = &self.repeat {
            stages.push(Box::new(RepeatNormalizer::new(&repeat.field)));
        }
        if let Some(watchdog) = &self.watchdog {
            stages.push(Box::new(StuckKeyWatchdog::new(
                &watchdog.field,
                watchdog.timeouts(),
            )));
        }
        if let Some(chords) = &self.chords {
            stages.push(Box::new(ChordDetector::new(&chords.field)));
            if let Some(macros) = &self.macros {
                stages.push(Box::new(MacroEngine::new(
                    macros.bindings().into_test(),
                    macros.store(),
                )));
            }
            stages.push(Box::new(ChordPlayer::new(&chords.field)));
        }
        if self.altgr.enabled {
            stages.push(Box::new(AltGrReconstructor::new()));
        }
        if let Some(ratelimit) = &self.ratelimit {
            let limiter = RateLimiter::new(ratelimit.per_second);
            stages.push(match &ratelimit.types {
                Some(types) => {
                    let types: Vec<EventType> =
                        types.iter().map(|t| EventType::from(t.as_str())).collect();
                    Box::new(limiter.with_filter(move |e| types.contains(e.kind())))
                }
                None => Box::new(limiter),
            });
        }
        if self.general.debug {
            stages.push(Box::new(DebugTap::new("out")));
        }
        if self.general.cleanup {
            stages.push(Box::new(SendkeyCleanup));
        }

        log::debug!(
            "pipeline: {}",
            stages.iter().map(|s| s.name()).collect::<Vec<_>>().join(" -> ")
        );
        stages
    }
}

/// Commented starter config
pub fn default_config_content() -> &'static str {
    r#"# Chordpipe configuration
# Place this file at: ~/.config/chordpipe/config.toml

[general]
release_at_init = true
cleanup = true
debug = false

[altgr]
enabled = true

[repeat]
field = "win_virtualkey"

[watchdog]
field = "win_virtualkey"
# Left and right Windows keys lose their release after a secure-desktop switch
timeouts = [{ key = 91, ms = 5000 }, { key = 92, ms = 5000 }]

[chords]
field = "win_virtualkey"

[macro]
# file = "~/.local/share/chordpipe/macros.json"
toggle = [93, 82]   # Menu+R: begin/cancel recording
prefix = [93]       # Menu+<key>: save as / play <key>

[ratelimit]
per_second = 500
types = ["keydown", "keyup", "keypress"]
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage_names(config: &Config) -> Vec<&'static str> {
        config.build_stages().iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_empty_config_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(config.general.release_at_init);
        assert!(config.general.cleanup);
        assert!(config.altgr.enabled);
        assert_eq!(
            stage_names(&config),
            vec!["release-at-init", "altgr-detect", "altgr-reconstruct", "cleanup"]
        );
    }

    #[test]
    fn test_default_content_parses_in_pipeline_order() {
        let mut config = Config::from_toml(default_config_content()).unwrap();
        config.macros.as_mut().unwrap().no_file = true;
        assert_eq!(
            stage_names(&config),
            vec![
                "release-at-init",
                "altgr-detect",
                "repeat",
                "watchdog",
                "chord-detect",
                "macro",
                "chord-play",
                "altgr-reconstruct",
                "ratelimit",
                "cleanup",
            ]
        );
    }

    #[test]
    fn test_watchdog_timeouts() {
        let config = Config::from_toml(
            r#"
[watchdog]
field = "physkey"
timeouts = [{ key = "E005B", ms = 2500 }, { key = 92, ms = 10 }]
"#,
        )
        .unwrap();
        let timeouts = config.watchdog.unwrap().timeouts();
        assert_eq!(
            timeouts,
            vec![
                (Value::from("E005B"), Duration::from_millis(2500)),
                (Value::from(92u64), Duration::from_millis(10)),
            ]
        );
    }

    #[test]
    fn test_macro_bindings_from_toml() {
        let config = Config::from_toml(
            r#"
[chords]
field = "physkey"

[macro]
no_file = true
toggle = ["E005D", "_0013"]
prefix = ["E005D"]
"#,
        )
        .unwrap();
        let bindings = config.macros.unwrap().bindings();
        assert_eq!(bindings.toggle, vec![Value::from("E005D"), Value::from("_0013")]);
        assert_eq!(bindings.prefix, vec![Value::from("E005D")]);
    }

    #[test]
    fn test_macro_without_chords_rejected() {
        let result = Config::from_toml("[macro]\nprefix = [1]\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_zero_rate_rejected() {
        let result = Config::from_toml("[ratelimit]\nper_second = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_fractional_rate_accepted() {
        let config = Config::from_toml("[ratelimit]\nper_second = 0.5\n").unwrap();
        assert_eq!(config.ratelimit.unwrap().per_second, 0.5);
        let config = Config::from_toml("[ratelimit]\nper_second = 500\n").unwrap();
        assert_eq!(config.ratelimit.unwrap().per_second, 500.0);
    }

    #[test]
    fn test_unknown_section_rejected() {
        let result = Config::from_toml("[bogus]\nx = 1\n");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_explicit_macro_file_used() {
        let config = MacroConfig {
            file: Some(PathBuf::from("/tmp/chordpipe-macros.json")),
            no_file: false,
            toggle: vec![],
            prefix: vec![],
        };
        assert_eq!(
            config.store().path(),
            Some(Path::new("/tmp/chordpipe-macros.json"))
        );
    }

    #[test]
    fn test_expand_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/m.json")), home.join("m.json"));
        }
        assert_eq!(expand_home(Path::new("/abs/m.json")), PathBuf::from("/abs/m.json"));
    }
}
