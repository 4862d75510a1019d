//! One entry of the host's application list.

use gamesphere_sources::{ManagedKey, Origin};
use gamesphere_steam::parse_rungameid;
use serde_json::{Map, Value};

/// Field holding the managed marker, `"<origin>:<stable_id>"`.
pub const MANAGED_FIELD: &str = "gamesphere-id";

/// Entries the host ships with. Never removed, not even by a full reset.
pub const STOCK_NAMES: &[&str] = &["Desktop", "Steam Big Picture", "Virtual Display", "Remote Input"];

pub const NAME: &str = "name";
pub const CMD: &str = "cmd";
pub const IMAGE_PATH: &str = "image-path";
pub const WORKING_DIR: &str = "working-dir";
pub const UUID: &str = "uuid";

/// A record in `apps.json`.
///
/// Wraps the raw JSON object so fields this tool does not model (prep
/// commands, detached lists, Apollo extras) survive a round-trip untouched
/// and in their original order.
#[derive(Debug, Clone, PartialEq)]
pub struct HostAppRecord(Map<String, Value>);

impl HostAppRecord {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// A new managed record with the defaults the host expects for games.
    pub fn managed(key: &ManagedKey, name: &str, cmd: &str) -> Self {
        let mut map = Map::new();
        map.insert(NAME.into(), name.into());
        map.insert(CMD.into(), cmd.into());
        map.insert("output".into(), "".into());
        map.insert("auto-detach".into(), "true".into());
        map.insert("wait-all".into(), "true".into());
        map.insert("exit-timeout".into(), "5".into());
        map.insert("elevated".into(), "false".into());
        map.insert(IMAGE_PATH.into(), "".into());
        map.insert(MANAGED_FIELD.into(), key.to_string().into());
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Returns a string field; non-string values read as absent.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Sets a string field, keeping its position when it already exists.
    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        self.0.insert(field.to_string(), Value::String(value.into()));
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    pub fn name(&self) -> &str {
        self.get_str(NAME).unwrap_or_default()
    }

    pub fn cmd(&self) -> &str {
        self.get_str(CMD).unwrap_or_default()
    }

    pub fn image_path(&self) -> &str {
        self.get_str(IMAGE_PATH).unwrap_or_default()
    }

    pub fn working_dir(&self) -> Option<&str> {
        self.get_str(WORKING_DIR).filter(|d| !d.is_empty())
    }

    /// Identity of a record this tool manages.
    ///
    /// Records without the marker field whose command launches
    /// `steam://rungameid/<id>` are adopted as managed Steam entries.
    pub fn managed_key(&self) -> Option<ManagedKey> {
        if let Some(marker) = self.get_str(MANAGED_FIELD) {
            return ManagedKey::parse(marker);
        }
        parse_rungameid(self.cmd()).map(|id| ManagedKey::new(Origin::Steam, id.to_string()))
    }

    pub fn is_managed(&self) -> bool {
        self.managed_key().is_some()
    }

    pub fn is_stock(&self) -> bool {
        self.get_str(MANAGED_FIELD).is_none() && STOCK_NAMES.contains(&self.name())
    }

    /// Gives the record a fresh uppercase v4 UUID unless it has one.
    pub fn ensure_uuid(&mut self) {
        if self.get_str(UUID).is_none_or(str::is_empty) {
            self.set(UUID, uuid::Uuid::new_v4().to_string().to_uppercase());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> HostAppRecord {
        match value {
            Value::Object(map) => HostAppRecord::from_map(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn marker_identifies_managed() {
        let rec = record(json!({"name": "Hades", "cmd": "x", "gamesphere-id": "epic:abc"}));
        assert_eq!(rec.managed_key(), Some(ManagedKey::new(Origin::Epic, "abc")));
        assert!(!rec.is_stock());
    }

    #[test]
    fn legacy_steam_commands_are_adopted() {
        let rec = record(json!({"name": "Dota 2", "cmd": "steam steam://rungameid/570"}));
        assert_eq!(rec.managed_key(), Some(ManagedKey::new(Origin::Steam, "570")));
    }

    #[test]
    fn hand_added_entries_are_unmanaged() {
        let rec = record(json!({"name": "Emulator", "cmd": "retroarch"}));
        assert!(!rec.is_managed());
        assert!(!rec.is_stock());
    }

    #[test]
    fn stock_entries() {
        let rec = record(json!({"name": "Desktop", "image-path": "desktop.png"}));
        assert!(rec.is_stock());
        assert!(!rec.is_managed());
        let rec = record(json!({"name": "Steam Big Picture", "detached": ["steam://open/bigpicture"]}));
        assert!(rec.is_stock());
    }

    #[test]
    fn managed_defaults_and_order() {
        let key = ManagedKey::new(Origin::Steam, "570");
        let rec = HostAppRecord::managed(&key, "Dota 2", "steam://rungameid/570");
        let fields: Vec<&str> = rec.as_map().keys().map(String::as_str).collect();
        assert_eq!(fields[..2], ["name", "cmd"]);
        assert_eq!(rec.get_str("exit-timeout"), Some("5"));
        assert_eq!(rec.get_str(MANAGED_FIELD), Some("steam:570"));
    }

    #[test]
    fn set_keeps_field_position() {
        let mut rec = record(json!({"name": "A", "prep-cmd": [], "cmd": "a"}));
        rec.set("name", "B");
        let fields: Vec<&str> = rec.as_map().keys().map(String::as_str).collect();
        assert_eq!(fields, ["name", "prep-cmd", "cmd"]);
        assert_eq!(rec.name(), "B");
    }

    #[test]
    fn uuid_assigned_once() {
        let mut rec = record(json!({"name": "A"}));
        rec.ensure_uuid();
        let first = rec.get_str(UUID).unwrap().to_string();
        assert_eq!(first.len(), 36);
        assert_eq!(first, first.to_uppercase());
        rec.ensure_uuid();
        assert_eq!(rec.get_str(UUID).unwrap(), first);
    }
}
