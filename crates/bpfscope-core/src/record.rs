//! Normalized records produced from live kernel objects.
//!
//! Records are built per query from an open handle, never persisted, and not
//! mutated after construction except to attach pinned paths on request.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{MapId, ProgramId};

/// Length in bytes of a program tag (the kernel's truncated SHA of the
/// instructions).
pub const TAG_LEN: usize = 8;

/// Metadata of one loaded program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub id: ProgramId,
    /// Lowercase program type tag, e.g. `xdp` or `kprobe`.
    pub kind: String,
    /// Object name. Not unique.
    pub name: String,
    /// Program tag as 16 lowercase hex characters. Not unique.
    pub tag: String,
    pub gpl_compatible: bool,
    /// Approximate wall-clock load time; `None` when the kernel did not
    /// report one.
    pub loaded_at: Option<DateTime<Utc>>,
    pub uid: u32,
    pub bytes_xlated: u32,
    pub bytes_jited: u32,
    pub bytes_memlock: u64,
    pub map_ids: Vec<MapId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pinned_paths: Vec<PathBuf>,
}

/// Metadata of one map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRecord {
    pub id: MapId,
    /// Lowercase map type tag, e.g. `hash` or `percpu_array`.
    pub kind: String,
    pub name: String,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub flags: u32,
    pub bytes_memlock: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pinned_paths: Vec<PathBuf>,
}

/// One key/value pair copied out of a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl MapEntry {
    /// Copies a borrowed pair into an owned entry.
    pub fn copied(key: &[u8], value: &[u8]) -> Self {
        MapEntry {
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }
}
