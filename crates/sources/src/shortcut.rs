//! Generated launch scripts.
//!
//! Epic, Xbox and custom games can launch through a small script in a
//! shortcuts folder instead of the raw command. Each script carries a marker
//! line so cleanup only ever deletes files this tool wrote.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::command::quote_path;
use crate::entry::{GameEntry, LaunchShortcut, Origin};

const MARKER: &str = "gamesphere launch shortcut";

#[cfg(windows)]
const EXTENSION: &str = "cmd";
#[cfg(not(windows))]
const EXTENSION: &str = "sh";

/// Routes an entry's launch through a script in `folder`.
///
/// Only computes paths; nothing is written until [`write_shortcut`]. Steam
/// entries are left alone since their URI already is the indirection.
pub fn attach_shortcut(entry: &mut GameEntry, folder: &Path) {
    if entry.origin == Origin::Steam || entry.shortcut.is_some() {
        return;
    }
    let path = folder.join(format!("{}.{EXTENSION}", entry.key().file_stem()));
    let target = std::mem::replace(&mut entry.launch_command, quote_path(&path));
    entry.shortcut = Some(LaunchShortcut { path, target });
}

fn render(target: &str, working_dir: Option<&str>) -> String {
    if cfg!(windows) {
        let mut script = format!("@echo off\r\nrem {MARKER}\r\n");
        if let Some(dir) = working_dir {
            script.push_str(&format!("cd /d \"{dir}\"\r\n"));
        }
        script.push_str(&format!("{target}\r\n"));
        script
    } else {
        let mut script = format!("#!/bin/sh\n# {MARKER}\n");
        if let Some(dir) = working_dir {
            script.push_str(&format!("cd \"{dir}\" || exit 1\n"));
        }
        script.push_str(&format!("exec {target}\n"));
        script
    }
}

/// Writes the script if missing or stale. Returns whether the file changed.
pub fn write_shortcut(shortcut: &LaunchShortcut, working_dir: Option<&str>) -> io::Result<bool> {
    let script = render(&shortcut.target, working_dir);
    if fs::read_to_string(&shortcut.path).is_ok_and(|existing| existing == script) {
        return Ok(false);
    }
    if let Some(parent) = shortcut.path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&shortcut.path, script)?;
    set_executable(&shortcut.path)?;
    debug!(path = %shortcut.path.display(), "wrote launch shortcut");
    Ok(true)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// True when the file is a script this tool generated.
pub fn is_generated(path: &Path) -> bool {
    fs::read_to_string(path).is_ok_and(|text| text.lines().take(3).any(|l| l.contains(MARKER)))
}

/// Deletes one generated script.
///
/// Refuses files outside `folder` and files without the marker. Returns
/// whether a file was deleted.
pub fn delete_shortcut(path: &Path, folder: &Path) -> io::Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let folder = fs::canonicalize(folder)?;
    let abs = fs::canonicalize(path)?;
    if !abs.starts_with(&folder) || !is_generated(&abs) {
        debug!(path = %abs.display(), "not a generated shortcut, leaving it");
        return Ok(false);
    }
    fs::remove_file(&abs)?;
    debug!(path = %abs.display(), "deleted launch shortcut");
    Ok(true)
}

/// Deletes every generated script directly inside `folder`.
pub fn delete_all_shortcuts(folder: &Path) -> io::Result<u32> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut deleted = 0u32;
    let paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    for path in paths {
        if path.is_file() && is_generated(&path) {
            fs::remove_file(&path)?;
            deleted += 1;
        }
    }
    if deleted > 0 {
        info!(folder = %folder.display(), deleted, "deleted launch shortcuts");
    }
    Ok(deleted)
}
