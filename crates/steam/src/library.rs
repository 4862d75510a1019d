//! Installed-app discovery from `libraryfolders.vdf` and app manifests.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::SteamError;
use crate::paths::{install_dir, steamapps_dir};
use crate::vdf::{VdfObject, load_vdf};

/// Steam runtime/tool app IDs that are installed like games but never are.
const TOOL_APP_IDS: &[u32] = &[
    228980,  // Steamworks Common Redistributables
    1070560, // Steam Linux Runtime 1.0 (scout)
    1391110, // Steam Linux Runtime 2.0 (soldier)
    1628350, // Steam Linux Runtime 3.0 (sniper)
    1493710, // Proton Experimental
    2180100, // Proton Hotfix
    1826330, // Proton EasyAntiCheat Runtime
    1161040, // Proton BattlEye Runtime
    250820,  // SteamVR
];

const TOOL_NAME_PREFIXES: &[&str] = &["Proton ", "Steam Linux Runtime", "Steamworks Common"];

/// State flag bit set once an app is fully installed.
const STATE_FULLY_INSTALLED: u32 = 4;

/// A library root listed in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryFolder {
    pub path: PathBuf,
    /// App IDs the index claims live in this library.
    pub app_ids: Vec<u32>,
}

/// An installed app read from its `appmanifest_<id>.acf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledApp {
    pub app_id: u32,
    pub name: String,
    pub install_dir: PathBuf,
    pub library: PathBuf,
}

impl InstalledApp {
    /// True for runtimes, compatibility tools and redistributables.
    pub fn is_tool(&self) -> bool {
        TOOL_APP_IDS.contains(&self.app_id)
            || TOOL_NAME_PREFIXES.iter().any(|p| self.name.starts_with(p))
    }
}

/// Reads the library index and returns its library roots.
pub fn load_library_folders(index_path: &Path) -> Result<Vec<LibraryFolder>, SteamError> {
    let root = load_vdf(index_path)?;
    parse_library_folders(&root, index_path)
}

/// Extracts library roots from a parsed index.
///
/// Handles the current layout (`"0" { "path" ... "apps" { ... } }`) and the
/// legacy one (`"1" "D:\\SteamLibrary"`), where the Steam root is implicit.
fn parse_library_folders(
    root: &VdfObject,
    index_path: &Path,
) -> Result<Vec<LibraryFolder>, SteamError> {
    let folders = root
        .get_object("libraryfolders")
        .ok_or(SteamError::MissingLibraryFolders)?;

    let mut result: Vec<LibraryFolder> = Vec::new();
    let mut legacy = false;

    for (key, value) in folders.iter() {
        if key.parse::<u32>().is_err() {
            continue;
        }
        if let Some(path) = value.as_str() {
            legacy = true;
            result.push(LibraryFolder {
                path: PathBuf::from(path),
                app_ids: Vec::new(),
            });
        } else if let Some(obj) = value.as_object() {
            let Some(path) = obj.get_str("path") else {
                warn!(entry = key, "library folder without a path, skipping");
                continue;
            };
            let app_ids = obj
                .get_object("apps")
                .map(|apps| apps.iter().filter_map(|(id, _)| id.parse().ok()).collect())
                .unwrap_or_default();
            result.push(LibraryFolder {
                path: PathBuf::from(path),
                app_ids,
            });
        }
    }

    // Legacy indexes omit the Steam root itself: <root>/steamapps/libraryfolders.vdf.
    if legacy
        && let Some(steam_root) = index_path.parent().and_then(Path::parent)
        && !result.iter().any(|f| f.path == steam_root)
    {
        result.insert(
            0,
            LibraryFolder {
                path: steam_root.to_path_buf(),
                app_ids: Vec::new(),
            },
        );
    }

    Ok(result)
}

/// Reads one `appmanifest_<id>.acf`.
///
/// Returns `Ok(None)` for apps that are not fully installed. Missing `name`
/// falls back to the install directory name; missing `appid` falls back to
/// the manifest file name.
pub fn read_app_manifest(path: &Path, library: &Path) -> Result<Option<InstalledApp>, SteamError> {
    let root = load_vdf(path)?;
    let state = root
        .get_object("AppState")
        .ok_or_else(|| SteamError::Vdf(format!("{}: missing AppState", path.display())))?;

    let app_id = state
        .get_str("appid")
        .and_then(|s| s.parse::<u32>().ok())
        .or_else(|| app_id_from_manifest_name(path))
        .ok_or_else(|| SteamError::Vdf(format!("{}: missing appid", path.display())))?;

    if let Some(flags) = state.get_str("StateFlags").and_then(|s| s.parse::<u32>().ok())
        && flags & STATE_FULLY_INSTALLED == 0
    {
        debug!(app_id, flags, "app not fully installed, skipping");
        return Ok(None);
    }

    let installdir = state.get_str("installdir").unwrap_or_default();
    let name = state
        .get_str("name")
        .filter(|n| !n.trim().is_empty())
        .map(str::to_string)
        .or_else(|| (!installdir.is_empty()).then(|| installdir.to_string()))
        .unwrap_or_else(|| format!("Steam App {app_id}"));

    Ok(Some(InstalledApp {
        app_id,
        name,
        install_dir: install_dir(library, installdir),
        library: library.to_path_buf(),
    }))
}

fn app_id_from_manifest_name(path: &Path) -> Option<u32> {
    path.file_stem()?
        .to_str()?
        .strip_prefix("appmanifest_")?
        .parse()
        .ok()
}

/// Part of a library that could not be looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: String,
    /// App IDs that may live there (index listing, or the manifest name).
    pub app_ids: Vec<u32>,
}

/// Installed apps plus every library or manifest that had to be skipped.
///
/// A non-empty `skipped` list means `apps` may be missing games that are
/// still installed, e.g. on an unplugged drive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryScan {
    pub apps: Vec<InstalledApp>,
    pub skipped: Vec<SkippedSource>,
}

impl LibraryScan {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Lists installed, non-tool apps across every library in the index.
///
/// The index itself must parse. Unreadable libraries and broken manifests
/// do not fail the scan; they are returned in [`LibraryScan::skipped`].
/// Apps are sorted by app ID and deduplicated.
pub fn installed_apps(index_path: &Path) -> Result<LibraryScan, SteamError> {
    let folders = load_library_folders(index_path)?;
    let mut scan = LibraryScan::default();

    for folder in &folders {
        let steamapps = steamapps_dir(&folder.path);
        let entries = match fs::read_dir(&steamapps) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    library = %folder.path.display(),
                    listed_apps = folder.app_ids.len(),
                    error = %e,
                    "library folder unreadable, skipping"
                );
                scan.skipped.push(SkippedSource {
                    path: steamapps,
                    reason: e.to_string(),
                    app_ids: folder.app_ids.clone(),
                });
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let is_manifest = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("appmanifest_") && n.ends_with(".acf"));
            if !is_manifest {
                continue;
            }

            match read_app_manifest(&path, &folder.path) {
                Ok(Some(app)) if app.is_tool() => {
                    debug!(app_id = app.app_id, name = %app.name, "skipping Steam tool");
                }
                Ok(Some(app)) => scan.apps.push(app),
                Ok(None) => {}
                Err(e) => {
                    warn!(manifest = %path.display(), error = %e, "skipping unreadable manifest");
                    scan.skipped.push(SkippedSource {
                        app_ids: app_id_from_manifest_name(&path).into_iter().collect(),
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    scan.apps.sort_by_key(|a| a.app_id);
    scan.apps.dedup_by_key(|a| a.app_id);
    debug!(
        count = scan.apps.len(),
        libraries = folders.len(),
        skipped = scan.skipped.len(),
        "steam apps discovered"
    );
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_vdf;

    fn write_manifest(steamapps: &Path, app_id: u32, name: &str, flags: u32) {
        fs::create_dir_all(steamapps).unwrap();
        let text = format!(
            "\"AppState\"\n{{\n\t\"appid\"\t\t\"{app_id}\"\n\t\"name\"\t\t\"{name}\"\n\t\"StateFlags\"\t\t\"{flags}\"\n\t\"installdir\"\t\t\"{name}\"\n}}\n"
        );
        fs::write(steamapps.join(format!("appmanifest_{app_id}.acf")), text).unwrap();
    }

    fn write_index(steam_root: &Path, libraries: &[&Path]) -> PathBuf {
        let listed: Vec<(&Path, &[u32])> = libraries.iter().map(|l| (*l, &[][..])).collect();
        write_index_with_apps(steam_root, &listed)
    }

    fn write_index_with_apps(steam_root: &Path, libraries: &[(&Path, &[u32])]) -> PathBuf {
        let mut text = String::from("\"libraryfolders\"\n{\n");
        for (i, (lib, apps)) in libraries.iter().enumerate() {
            let escaped = lib.to_string_lossy().replace('\\', "\\\\");
            let listed: String = apps.iter().map(|id| format!("\t\t\t\"{id}\"\t\"1\"\n")).collect();
            text.push_str(&format!(
                "\t\"{i}\"\n\t{{\n\t\t\"path\"\t\t\"{escaped}\"\n\t\t\"apps\"\n\t\t{{\n{listed}\t\t}}\n\t}}\n"
            ));
        }
        text.push_str("}\n");
        let steamapps = steamapps_dir(steam_root);
        fs::create_dir_all(&steamapps).unwrap();
        let index = steamapps.join("libraryfolders.vdf");
        fs::write(&index, text).unwrap();
        index
    }

    #[test]
    fn installed_apps_across_libraries() {
        let tmp = tempfile::tempdir().unwrap();
        let main = tmp.path().join("Steam");
        let extra = tmp.path().join("Library2");
        write_manifest(&steamapps_dir(&main), 570, "Dota 2", 4);
        write_manifest(&steamapps_dir(&main), 228980, "Steamworks Common Redistributables", 4);
        write_manifest(&steamapps_dir(&extra), 1245620, "ELDEN RING", 4);
        write_manifest(&steamapps_dir(&extra), 440, "Team Fortress 2", 1026);
        let index = write_index(&main, &[&main, &extra]);

        let scan = installed_apps(&index).unwrap();
        assert!(scan.is_complete());
        let apps = scan.apps;
        let ids: Vec<u32> = apps.iter().map(|a| a.app_id).collect();
        assert_eq!(ids, vec![570, 1245620]);
        assert_eq!(apps[1].name, "ELDEN RING");
        assert_eq!(apps[1].library, extra);
    }

    #[test]
    fn missing_library_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let main = tmp.path().join("Steam");
        write_manifest(&steamapps_dir(&main), 570, "Dota 2", 4);
        let gone = tmp.path().join("unplugged");
        let index = write_index_with_apps(&main, &[(&main, &[570]), (&gone, &[1245620])]);

        let scan = installed_apps(&index).unwrap();
        assert_eq!(scan.apps.len(), 1);
        assert!(!scan.is_complete());
        assert_eq!(scan.skipped.len(), 1);
        assert_eq!(scan.skipped[0].path, steamapps_dir(&gone));
        assert_eq!(scan.skipped[0].app_ids, vec![1245620]);
    }

    #[test]
    fn broken_manifest_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let main = tmp.path().join("Steam");
        write_manifest(&steamapps_dir(&main), 570, "Dota 2", 4);
        fs::write(steamapps_dir(&main).join("appmanifest_620.acf"), "\"Other\"\n{\n}\n").unwrap();
        let index = write_index(&main, &[&main]);

        let scan = installed_apps(&index).unwrap();
        assert_eq!(scan.apps.len(), 1);
        assert_eq!(scan.skipped.len(), 1);
        assert_eq!(scan.skipped[0].app_ids, vec![620]);
    }

    #[test]
    fn legacy_index_includes_steam_root() {
        let text = "\"LibraryFolders\"\n{\n\t\"TimeNextStatsReport\"\t\t\"1\"\n\t\"1\"\t\t\"D:\\\\SteamLibrary\"\n}\n";
        let root = parse_vdf(text).unwrap();
        let index = Path::new("/steam/steamapps/libraryfolders.vdf");
        let folders = parse_library_folders(&root, index).unwrap();
        let paths: Vec<&Path> = folders.iter().map(|f| f.path.as_path()).collect();
        assert_eq!(paths, vec![Path::new("/steam"), Path::new("D:\\SteamLibrary")]);
    }

    #[test]
    fn index_without_section_is_parse_error() {
        let root = parse_vdf("\"something\" { }").unwrap();
        let err = parse_library_folders(&root, Path::new("/x/libraryfolders.vdf")).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn malformed_index_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let index = tmp.path().join("libraryfolders.vdf");
        fs::write(&index, "\"libraryfolders\"\n{\n\t\"0\"\n\t{\n").unwrap();
        let err = installed_apps(&index).unwrap_err();
        assert!(err.is_parse_error(), "{err}");
    }

    #[test]
    fn unreadable_index_is_io_error() {
        let err = installed_apps(Path::new("/nonexistent/libraryfolders.vdf")).unwrap_err();
        assert!(matches!(err, SteamError::Io { .. }));
        assert!(!err.is_parse_error());
    }

    #[test]
    fn manifest_tolerates_missing_optional_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("appmanifest_4000.acf");
        fs::write(&path, "\"AppState\" { \"installdir\" \"GarrysMod\" }").unwrap();
        let app = read_app_manifest(&path, tmp.path()).unwrap().unwrap();
        assert_eq!(app.app_id, 4000);
        assert_eq!(app.name, "GarrysMod");
    }

    #[test]
    fn tool_detection_by_name() {
        let app = InstalledApp {
            app_id: 1,
            name: "Proton 8.0".into(),
            install_dir: PathBuf::new(),
            library: PathBuf::new(),
        };
        assert!(app.is_tool());
    }
}
