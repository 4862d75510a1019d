use std::path::PathBuf;

use winreg::RegKey;
use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};

use crate::SteamError;

const DEFAULT_INSTALL: &str = r"C:\Program Files (x86)\Steam";

#[derive(Clone, Copy)]
enum Hive {
    User,
    Machine,
}

/// Registry values that may hold the Steam root, most specific first.
const REGISTRY_LOCATIONS: &[(Hive, &str, &str)] = &[
    (Hive::User, r"Software\Valve\Steam", "SteamPath"),
    (Hive::Machine, r"SOFTWARE\Wow6432Node\Valve\Steam", "InstallPath"),
    (Hive::Machine, r"SOFTWARE\Valve\Steam", "InstallPath"),
];

/// Returns the Steam base directory on Windows.
///
/// Registry locations are only trusted when they point at a folder with a
/// `steamapps` directory; the stock install folder is the last resort.
pub(crate) fn get_base_dir() -> Result<PathBuf, SteamError> {
    REGISTRY_LOCATIONS
        .iter()
        .filter_map(|(hive, subkey, value)| read_registry_path(*hive, subkey, value))
        .chain(std::iter::once(PathBuf::from(DEFAULT_INSTALL)))
        .find(|dir| dir.join("steamapps").is_dir())
        .ok_or(SteamError::NotFound)
}

fn read_registry_path(hive: Hive, subkey: &str, value: &str) -> Option<PathBuf> {
    let root = match hive {
        Hive::User => RegKey::predef(HKEY_CURRENT_USER),
        Hive::Machine => RegKey::predef(HKEY_LOCAL_MACHINE),
    };
    let key = root.open_subkey(subkey).ok()?;
    let path: String = key.get_value(value).ok()?;
    // HKCU stores forward slashes.
    Some(PathBuf::from(path.replace('/', "\\")))
}
