//! The full `apps.json` document.

use std::fs;
use std::io;
use std::path::Path;

use gamesphere_sources::ManagedKey;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::HostError;
use crate::record::HostAppRecord;

const APPS: &str = "apps";
const ENV: &str = "env";

/// What an [`HostDocument::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added,
    Updated,
    Unchanged,
}

/// The host's application list plus every other root field, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct HostDocument {
    root: Map<String, Value>,
    apps: Vec<HostAppRecord>,
}

impl Default for HostDocument {
    /// `{"env": "", "apps": []}`, what the host writes on first start.
    fn default() -> Self {
        let mut root = Map::new();
        root.insert(ENV.into(), Value::String(String::new()));
        root.insert(APPS.into(), Value::Array(Vec::new()));
        Self {
            root,
            apps: Vec::new(),
        }
    }
}

impl HostDocument {
    /// Loads a document. A missing file yields the default empty document.
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "host document not found, starting empty");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(HostError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let doc = Self::parse(&text).map_err(|reason| HostError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!(path = %path.display(), apps = doc.apps.len(), "loaded host document");
        Ok(doc)
    }

    /// Parses document text. The root must be an object and `apps`, when
    /// present, an array of objects.
    pub fn parse(text: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let Value::Object(mut root) = value else {
            return Err("root is not a JSON object".into());
        };

        // Records live in `apps`; the root keeps an empty placeholder so the
        // field keeps its position on save.
        let apps = match root.insert(APPS.into(), Value::Array(Vec::new())) {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(map) => Ok(HostAppRecord::from_map(map)),
                    other => Err(format!("apps[{i}] is {}, expected an object", kind(&other))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => return Err(format!("\"apps\" is {}, expected an array", kind(&other))),
        };
        if !root.contains_key(ENV) {
            root.insert(ENV.into(), Value::String(String::new()));
        }

        Ok(Self { root, apps })
    }

    pub fn list(&self) -> &[HostAppRecord] {
        &self.apps
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn find_managed(&self, key: &ManagedKey) -> Option<&HostAppRecord> {
        self.apps
            .iter()
            .find(|r| r.managed_key().as_ref() == Some(key))
    }

    /// Replaces the record with the same managed key in place, or appends.
    ///
    /// Records without a managed key are always appended.
    pub fn upsert(&mut self, record: HostAppRecord) -> UpsertOutcome {
        let existing = record.managed_key().and_then(|key| {
            self.apps
                .iter()
                .position(|r| !r.is_stock() && r.managed_key().as_ref() == Some(&key))
        });
        match existing {
            Some(index) if self.apps[index] == record => UpsertOutcome::Unchanged,
            Some(index) => {
                self.apps[index] = record;
                UpsertOutcome::Updated
            }
            None => {
                self.apps.push(record);
                UpsertOutcome::Added
            }
        }
    }

    /// Removes managed, non-stock records matching `predicate`. Returns them.
    pub fn remove_managed<F>(&mut self, mut predicate: F) -> Vec<HostAppRecord>
    where
        F: FnMut(&ManagedKey, &HostAppRecord) -> bool,
    {
        let mut removed = Vec::new();
        self.apps.retain(|record| {
            if record.is_stock() {
                return true;
            }
            match record.managed_key() {
                Some(key) if predicate(&key, record) => {
                    removed.push(record.clone());
                    false
                }
                _ => true,
            }
        });
        removed
    }

    /// Removes everything except stock records. Returns what was removed.
    pub fn reset_to_stock(&mut self) -> Vec<HostAppRecord> {
        let (stock, removed): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.apps).into_iter().partition(HostAppRecord::is_stock);
        self.apps = stock;
        removed
    }

    pub fn to_value(&self) -> Value {
        let mut root = self.root.clone();
        let apps = self
            .apps
            .iter()
            .map(|r| Value::Object(r.as_map().clone()))
            .collect();
        root.insert(APPS.into(), Value::Array(apps));
        Value::Object(root)
    }

    /// Serializes with 4-space indentation, keeping field order.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.to_value().serialize(&mut ser)?;
        buf.push(b'\n');
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Writes the whole document atomically (temp file then rename).
    pub fn save(&self, path: &Path) -> Result<(), HostError> {
        let text = self.to_json_string().map_err(|e| HostError::Write {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        atomic_write(path, text.as_bytes()).map_err(|source| HostError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), apps = self.apps.len(), "saved host document");
        Ok(())
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Writes `contents` to a temp file beside `path`, then renames it over
/// `path`. Readers see either the old file or the new one, never a mix.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");
    let temp_path = parent.join(format!(".{file_name}.tmp.{}", std::process::id()));

    if let Err(e) = fs::write(&temp_path, contents) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}
