// Chordpipe Macro Store
// Persistence of the macro table as a single JSON document

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::event::{Event, Value};

/// Macro name to recorded chord events, kept in name order
pub type MacroTable = BTreeMap<String, Vec<Event>>;

/// Errors that can occur when reading or writing the macro file
#[derive(Debug, thiserror::Error)]
pub enum MacroStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid macro file: {0}")]
    Format(String),
}

/// Where macros live between sessions.
///
/// The file is rewritten in full on every save. Set-valued payloads are
/// written as `{"__set__": [...]}` so they come back as sets.
#[derive(Debug, Clone, Default)]
pub struct MacroStore {
    path: Option<PathBuf>,
}

impl MacroStore {
    /// A store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self { path: None }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Default location (~/.local/share/chordpipe/macros.json)
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("chordpipe").join("macros.json"))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the table; a missing or unreadable file means no macros
    pub fn load(&self) -> MacroTable {
        match self.try_load() {
            Ok(table) => table,
            Err(MacroStoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no macro file yet, starting empty");
                MacroTable::new()
            }
            Err(e) => {
                log::warn!("ignoring macro file: {}", e);
                MacroTable::new()
            }
        }
    }

    pub fn try_load(&self) -> Result<MacroTable, MacroStoreError> {
        let Some(path) = &self.path else {
            return Ok(MacroTable::new());
        };
        let content = fs::read_to_string(path)?;
        let table = decode_table(&content)?;
        log::debug!("loaded {} macro(s) from {}", table.len(), path.display());
        Ok(table)
    }

    /// Rewrite the whole file. No-op for an in-memory store.
    pub fn save(&self, table: &MacroTable) -> Result<(), MacroStoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, encode_table(table)?)?;
        log::debug!("saved {} macro(s) to {}", table.len(), path.display());
        Ok(())
    }
}

/// Compact JSON with sorted keys and tagged sets
pub fn encode_table(table: &MacroTable) -> Result<String, MacroStoreError> {
    let doc: serde_json::Map<String, serde_json::Value> = table
        .iter()
        .map(|(name, events)| {
            let events = events.iter().map(|e| e.to_value().to_tagged()).collect();
            (name.clone(), serde_json::Value::Array(events))
        })
        .collect();
    Ok(serde_json::to_string(&sorted(serde_json::Value::Object(doc)))?)
}

pub fn decode_table(content: &str) -> Result<MacroTable, MacroStoreError> {
    let doc: serde_json::Value = serde_json::from_str(content)?;
    let serde_json::Value::Object(doc) = doc else {
        return Err(MacroStoreError::Format("top level is not an object".to_string()));
    };
    let mut table = MacroTable::new();
    for (name, events) in doc {
        let serde_json::Value::Array(events) = events else {
            return Err(MacroStoreError::Format(format!("macro {name:?} is not a list")));
        };
        let events = events
            .into_iter()
            .map(|e| {
                Event::from_value(Value::from_tagged(e))
                    .ok_or_else(|| MacroStoreError::Format(format!("bad event in macro {name:?}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        table.insert(name, events);
    }
    Ok(table)
}

/// Sort object keys at every level, independent of serde_json's map backing
fn sorted(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(obj) => {
            let entries: BTreeMap<String, serde_json::Value> =
                obj.into_iter().map(|(k, v)| (k, sorted(v))).collect();
            serde_json::Value::Object(entries.into_iter().collect())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sorted).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("chordpipe-store-{}-{}", std::process::id(), name))
            .join("macros.json")
    }

    fn sample() -> MacroTable {
        let mut table = MacroTable::new();
        table.insert(
            "m".to_string(),
            vec![
                Event::chord(vec![Value::from("A")]),
                Event::new(EventType::Chord)
                    .with("chord", Value::set(vec![Value::from("S"), Value::from("D")])),
            ],
        );
        table.insert("a".to_string(), vec![]);
        table
    }

    #[test]
    fn test_encoding_is_sorted_and_tags_sets() {
        let text = encode_table(&sample()).unwrap();
        assert_eq!(
            text,
            r#"{"a":[],"m":[{"chord":["A"],"type":"chord"},{"chord":{"__set__":["D","S"]},"type":"chord"}]}"#
        );
    }

    #[test]
    fn test_decode_restores_sets() {
        let table = decode_table(&encode_table(&sample()).unwrap()).unwrap();
        assert_eq!(table, sample());
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_file("roundtrip");
        let store = MacroStore::at(&path);
        store.save(&sample()).unwrap();
        assert_eq!(store.load(), sample());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let store = MacroStore::at(temp_file("missing"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let path = temp_file("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        assert!(MacroStore::at(&path).load().is_empty());
        fs::write(&path, r#"{"m": 5}"#).unwrap();
        assert!(MacroStore::at(&path).load().is_empty());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_in_memory_store_never_writes() {
        let store = MacroStore::in_memory();
        assert!(store.save(&sample()).is_ok());
        assert!(store.load().is_empty());
    }
}
