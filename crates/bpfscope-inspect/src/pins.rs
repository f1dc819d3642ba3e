//! PinScanner: maps object IDs to the paths they are pinned at.
//!
//! The kernel has no reverse lookup from object to pin, so the scanner walks
//! the pin filesystem once, opens every file it finds, and records the ID
//! behind it. The index is built lazily on first use and rebuilt only on
//! [`refresh`](PinScanner::refresh).
//!
//! The scanner is safe to share across threads; concurrent first users
//! trigger exactly one scan.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use walkdir::WalkDir;

use bpfscope_core::{MapId, ProgramId};
use bpfscope_sys::{Kernel, MapHandle, ProgramHandle};

#[derive(Debug, Default)]
struct PinIndex {
    scanned: bool,
    programs: HashMap<ProgramId, Vec<PathBuf>>,
    maps: HashMap<MapId, Vec<PathBuf>>,
}

/// Lazily built index of pinned programs and maps under one root.
pub struct PinScanner<K: Kernel> {
    kernel: Arc<K>,
    root: PathBuf,
    index: RwLock<PinIndex>,
}

impl<K: Kernel> PinScanner<K> {
    pub fn new(kernel: Arc<K>, root: impl Into<PathBuf>) -> Self {
        PinScanner {
            kernel,
            root: root.into(),
            index: RwLock::new(PinIndex::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Builds the index unless it already exists.
    pub fn ensure_scanned(&self) {
        if self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .scanned
        {
            return;
        }
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have scanned while we waited.
        if index.scanned {
            return;
        }
        self.scan_into(&mut index);
    }

    /// Discards the index and scans again.
    pub fn refresh(&self) {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        self.scan_into(&mut index);
    }

    /// Paths `id` is pinned at. Empty for unpinned or unknown programs.
    pub fn program_pins(&self, id: ProgramId) -> Vec<PathBuf> {
        self.ensure_scanned();
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.programs.get(&id).cloned().unwrap_or_default()
    }

    /// Paths `id` is pinned at. Empty for unpinned or unknown maps.
    pub fn map_pins(&self, id: MapId) -> Vec<PathBuf> {
        self.ensure_scanned();
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.maps.get(&id).cloned().unwrap_or_default()
    }

    fn scan_into(&self, index: &mut PinIndex) {
        index.programs.clear();
        index.maps.clear();
        index.scanned = true;

        if !self.root.exists() {
            tracing::debug!(root = %self.root.display(), "pin root missing; bpffs not mounted?");
            return;
        }

        let mut skipped = 0usize;
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable pin entry");
                    skipped += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if !self.index_pin(&path, index) {
                skipped += 1;
            }
        }

        tracing::debug!(
            root = %self.root.display(),
            programs = index.programs.values().map(Vec::len).sum::<usize>(),
            maps = index.maps.values().map(Vec::len).sum::<usize>(),
            skipped,
            "pin scan complete"
        );
    }

    /// Records `path` if it pins a program or a map. Programs are tried
    /// first; a path is only opened as a map when that fails.
    fn index_pin(&self, path: &Path, index: &mut PinIndex) -> bool {
        if let Ok(program) = self.kernel.open_pinned_program(path) {
            match program.info() {
                Ok(info) if info.id != 0 => {
                    index
                        .programs
                        .entry(ProgramId(info.id))
                        .or_default()
                        .push(path.to_path_buf());
                    return true;
                }
                Ok(_) => return false,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "pinned program info failed");
                    return false;
                }
            }
        }

        match self.kernel.open_pinned_map(path) {
            Ok(map) => match map.info() {
                Ok(info) if info.id != 0 => {
                    index
                        .maps
                        .entry(MapId(info.id))
                        .or_default()
                        .push(path.to_path_buf());
                    true
                }
                Ok(_) => false,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "pinned map info failed");
                    false
                }
            },
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "not a pinned program or map");
                false
            }
        }
    }
}
