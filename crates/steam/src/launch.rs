//! Launch commands that start a Steam app through the Steam client.

use std::fmt;
use std::path::Path;

const RUNGAMEID_PREFIX: &str = "steam://rungameid/";
const FLATPAK_APP_ID: &str = "com.valvesoftware.Steam";

/// How the host should hand a `steam://` URI to the Steam client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchStyle {
    /// Bare URI, resolved by the OS protocol handler (Windows).
    #[default]
    Uri,
    /// `steam <uri>`, for native Linux installs.
    Client,
    /// `flatpak run com.valvesoftware.Steam <uri>`.
    Flatpak,
}

impl LaunchStyle {
    /// Picks a style for the current platform, detecting Flatpak Steam from
    /// the location of the library index.
    pub fn detect(library_index: &Path) -> Self {
        if cfg!(windows) {
            return LaunchStyle::Uri;
        }
        let flatpak = library_index
            .components()
            .any(|c| c.as_os_str() == FLATPAK_APP_ID);
        if flatpak {
            LaunchStyle::Flatpak
        } else {
            LaunchStyle::Client
        }
    }
}

impl fmt::Display for LaunchStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchStyle::Uri => write!(f, "uri"),
            LaunchStyle::Client => write!(f, "client"),
            LaunchStyle::Flatpak => write!(f, "flatpak"),
        }
    }
}

/// Returns `steam://rungameid/<app_id>`.
pub fn rungameid_uri(app_id: u32) -> String {
    format!("{RUNGAMEID_PREFIX}{app_id}")
}

/// Builds the host launch command for an app.
pub fn launch_command(app_id: u32, style: LaunchStyle) -> String {
    let uri = rungameid_uri(app_id);
    match style {
        LaunchStyle::Uri => uri,
        LaunchStyle::Client => format!("steam {uri}"),
        LaunchStyle::Flatpak => format!("flatpak run {FLATPAK_APP_ID} {uri}"),
    }
}

/// Extracts the app ID from any command containing `steam://rungameid/<digits>`.
pub fn parse_rungameid(cmd: &str) -> Option<u32> {
    let start = cmd.find(RUNGAMEID_PREFIX)? + RUNGAMEID_PREFIX.len();
    let digits: String = cmd[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
