//! Normalized game records shared by every provider.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Where a game was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Steam,
    Epic,
    Xbox,
    Custom,
}

impl Origin {
    /// Returns all origins.
    pub fn all() -> &'static [Origin] {
        &[Origin::Steam, Origin::Epic, Origin::Xbox, Origin::Custom]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Steam => "steam",
            Origin::Epic => "epic",
            Origin::Xbox => "xbox",
            Origin::Custom => "custom",
        }
    }

    /// Whether a managed entry is removed once its game stops being
    /// discovered. Xbox folders and custom lists may be temporarily
    /// unavailable, so their entries only go away on explicit request.
    pub fn removes_when_absent(&self) -> bool {
        match self {
            Origin::Steam | Origin::Epic => true,
            Origin::Xbox | Origin::Custom => false,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "steam" => Ok(Origin::Steam),
            "epic" => Ok(Origin::Epic),
            "xbox" => Ok(Origin::Xbox),
            "custom" => Ok(Origin::Custom),
            other => Err(format!("unknown origin: {other}")),
        }
    }
}

/// Identity of a game across runs: `(origin, stable_id)`.
///
/// Also the artwork cache key and the value of the managed marker written
/// into host records (`"<origin>:<stable_id>"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagedKey {
    pub origin: Origin,
    pub stable_id: String,
}

impl ManagedKey {
    pub fn new(origin: Origin, stable_id: impl Into<String>) -> Self {
        Self {
            origin,
            stable_id: stable_id.into(),
        }
    }

    /// Parses the `"<origin>:<stable_id>"` marker form.
    pub fn parse(marker: &str) -> Option<Self> {
        let (origin, id) = marker.split_once(':')?;
        if id.is_empty() {
            return None;
        }
        Some(Self::new(origin.parse().ok()?, id))
    }

    /// A filesystem-safe, collision-free file stem, e.g. `steam_570`.
    ///
    /// IDs that need sanitizing get a short hash of the original ID appended
    /// so two IDs never map to the same stem.
    pub fn file_stem(&self) -> String {
        let safe: String = self
            .stable_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if safe == self.stable_id {
            format!("{}_{safe}", self.origin)
        } else {
            let hash = Sha256::digest(self.stable_id.as_bytes());
            format!("{}_{safe}_{}", self.origin, hex::encode(&hash[..4]))
        }
    }
}

impl fmt::Display for ManagedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.stable_id)
    }
}

/// What the artwork lookup should search by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageHint {
    /// Steam app ID: CDN first, then the community API by app ID.
    SteamAppId(u32),
    /// Display name for a community API search.
    Name(String),
    /// An image the user supplied; used as-is, never fetched.
    File(PathBuf),
}

/// A generated launch script standing in for the real command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchShortcut {
    pub path: PathBuf,
    /// The command line the script runs.
    pub target: String,
}

/// One installed game as seen by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEntry {
    pub origin: Origin,
    pub stable_id: String,
    pub display_name: String,
    /// Command the host runs. Points at `shortcut` when one is generated.
    pub launch_command: String,
    pub working_directory: Option<String>,
    pub image_hint: ImageHint,
    pub shortcut: Option<LaunchShortcut>,
}

impl GameEntry {
    pub fn key(&self) -> ManagedKey {
        ManagedKey::new(self.origin, self.stable_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_roundtrip() {
        for origin in Origin::all() {
            assert_eq!(origin.as_str().parse::<Origin>().unwrap(), *origin);
        }
        assert!("gog".parse::<Origin>().is_err());
    }

    #[test]
    fn removal_policy() {
        assert!(Origin::Steam.removes_when_absent());
        assert!(Origin::Epic.removes_when_absent());
        assert!(!Origin::Xbox.removes_when_absent());
        assert!(!Origin::Custom.removes_when_absent());
    }

    #[test]
    fn marker_roundtrip() {
        let key = ManagedKey::new(Origin::Epic, "4fe75bbc5a674f4f9b356b5c90567da5");
        assert_eq!(key.to_string(), "epic:4fe75bbc5a674f4f9b356b5c90567da5");
        assert_eq!(ManagedKey::parse(&key.to_string()), Some(key));
    }

    #[test]
    fn marker_id_may_contain_colons() {
        let key = ManagedKey::parse("custom:Emu: SNES").unwrap();
        assert_eq!(key.origin, Origin::Custom);
        assert_eq!(key.stable_id, "Emu: SNES");
    }

    #[test]
    fn marker_rejects_garbage() {
        assert!(ManagedKey::parse("570").is_none());
        assert!(ManagedKey::parse("steam:").is_none());
        assert!(ManagedKey::parse("gog:1").is_none());
    }

    #[test]
    fn file_stem_plain_id() {
        assert_eq!(ManagedKey::new(Origin::Steam, "570").file_stem(), "steam_570");
    }

    #[test]
    fn file_stem_sanitized_ids_do_not_collide() {
        let a = ManagedKey::new(Origin::Custom, "My Game").file_stem();
        let b = ManagedKey::new(Origin::Custom, "My/Game").file_stem();
        assert!(a.starts_with("custom_My_Game_"));
        assert_ne!(a, b);
        assert!(!a.contains(' '));
    }
}
