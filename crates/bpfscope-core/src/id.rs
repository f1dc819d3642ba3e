//! Kernel object ID newtypes.
//!
//! Program and map IDs live in independent kernel ID spaces, so they are
//! distinct types: a `MapId` cannot be passed where a `ProgramId` is expected.
//! ID 0 is never assigned to a live object and serves as the walk sentinel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kernel-assigned program identifier. Unique at any instant, recycled later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(pub u32);

/// Kernel-assigned map identifier. Unique at any instant, recycled later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub u32);

impl ProgramId {
    /// The position before the first program in the ID space.
    pub const SENTINEL: ProgramId = ProgramId(0);
}

impl MapId {
    /// The position before the first map in the ID space.
    pub const SENTINEL: MapId = MapId(0);
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProgramId {
    fn from(raw: u32) -> Self {
        ProgramId(raw)
    }
}

impl From<u32> for MapId {
    fn from(raw: u32) -> Self {
        MapId(raw)
    }
}
