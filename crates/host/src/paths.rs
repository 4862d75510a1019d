//! Default locations for host files and per-user data.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which streaming host owns the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    #[default]
    Sunshine,
    /// Sunshine fork that requires a `uuid` on every app.
    Apollo,
}

impl HostKind {
    fn dir_name(&self) -> &'static str {
        match self {
            HostKind::Sunshine => "Sunshine",
            HostKind::Apollo => "Apollo",
        }
    }

    /// Host configuration directory for a default install.
    pub fn config_root(&self) -> Option<PathBuf> {
        if cfg!(windows) {
            let program_files =
                std::env::var("ProgramFiles").unwrap_or_else(|_| r"C:\Program Files".into());
            Some(PathBuf::from(program_files).join(self.dir_name()).join("config"))
        } else {
            config_dir().map(|d| d.join(self.dir_name().to_lowercase()))
        }
    }

    /// Default `apps.json` location.
    pub fn default_apps_path(&self) -> Option<PathBuf> {
        self.config_root().map(|d| d.join("apps.json"))
    }

    /// Default thumbnails directory the host serves covers from.
    pub fn default_covers_dir(&self) -> Option<PathBuf> {
        self.config_root().map(|d| d.join("covers"))
    }

    pub fn requires_uuid(&self) -> bool {
        matches!(self, HostKind::Apollo)
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HostKind::Sunshine => "sunshine",
            HostKind::Apollo => "apollo",
        })
    }
}

impl FromStr for HostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sunshine" => Ok(HostKind::Sunshine),
            "apollo" => Ok(HostKind::Apollo),
            other => Err(format!("unknown host: {other}")),
        }
    }
}

/// Returns the platform-specific config directory.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }

    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(".config"))
    }
}

/// Per-user data directory of this tool.
pub fn app_data_dir() -> Option<PathBuf> {
    config_dir().map(|d| d.join("gamesphere"))
}
