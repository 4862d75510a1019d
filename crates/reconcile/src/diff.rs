//! Desired set vs. current document.

use std::collections::{HashMap, HashSet};

use gamesphere_host::{HostAppRecord, HostDocument, MANAGED_FIELD};
use gamesphere_sources::{GameEntry, ImageHint, ManagedKey, Origin};

/// Changes needed to bring the document in line with the desired set.
#[derive(Debug, Default)]
pub struct Diff {
    pub to_add: Vec<GameEntry>,
    /// Managed entries whose name, command, working directory or supplied
    /// image changed.
    pub to_update: Vec<GameEntry>,
    /// Otherwise unchanged entries whose thumbnail is missing. They only
    /// become updates if artwork turns up.
    pub to_repair: Vec<GameEntry>,
    pub to_remove: Vec<ManagedKey>,
    /// Entries a hand-added record already launches.
    pub skipped: Vec<GameEntry>,
    pub unchanged: usize,
}

impl Diff {
    /// Entries that may need a thumbnail lookup.
    pub fn image_candidates(&self) -> impl Iterator<Item = &GameEntry> {
        self.to_add
            .iter()
            .chain(&self.to_update)
            .chain(&self.to_repair)
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty()
            && self.to_update.is_empty()
            && self.to_repair.is_empty()
            && self.to_remove.is_empty()
    }
}

/// Computes the diff.
///
/// `removable` lists the origins whose absent entries may be removed this
/// run. `image_present` reports whether a record's `image-path` points at a
/// usable file.
pub fn compute_diff(
    desired: &[GameEntry],
    document: &HostDocument,
    removable: &HashSet<Origin>,
    image_present: impl Fn(&str) -> bool,
) -> Diff {
    let mut current: HashMap<ManagedKey, &HostAppRecord> = HashMap::new();
    let mut user_commands: HashSet<&str> = HashSet::new();
    for record in document.list() {
        if record.is_stock() {
            continue;
        }
        match record.managed_key() {
            Some(key) => {
                current.entry(key).or_insert(record);
            }
            None => {
                user_commands.insert(record.cmd().trim());
            }
        }
    }

    let mut diff = Diff::default();
    let mut desired_keys = HashSet::new();

    for entry in desired {
        let key = entry.key();
        desired_keys.insert(key.clone());

        let Some(record) = current.get(&key) else {
            if user_commands.contains(entry.launch_command.trim()) {
                diff.skipped.push(entry.clone());
            } else {
                diff.to_add.push(entry.clone());
            }
            continue;
        };

        if metadata_changed(entry, record) {
            diff.to_update.push(entry.clone());
        } else if !image_present(record.image_path()) {
            diff.to_repair.push(entry.clone());
        } else {
            diff.unchanged += 1;
        }
    }

    let mut to_remove: Vec<ManagedKey> = current
        .into_keys()
        .filter(|key| removable.contains(&key.origin) && !desired_keys.contains(key))
        .collect();
    to_remove.sort();
    diff.to_remove = to_remove;
    diff
}

fn metadata_changed(entry: &GameEntry, record: &HostAppRecord) -> bool {
    let supplied_image_moved = match &entry.image_hint {
        ImageHint::File(path) => record.image_path() != path.to_string_lossy(),
        ImageHint::SteamAppId(_) | ImageHint::Name(_) => false,
    };
    record.name() != entry.display_name
        || record.cmd() != entry.launch_command
        || record.working_dir() != entry.working_directory.as_deref()
        || record.get_str(MANAGED_FIELD).is_none()
        || supplied_image_moved
}
