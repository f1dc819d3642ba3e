//! The [`Kernel`] trait: the raw primitives inspection is built on.
//!
//! The kernel offers no bulk listing and no snapshot. Everything the engines
//! do is composed from these calls:
//! - `next_*_id` walks an ID space one step at a time;
//! - `open_*` turns an ID or a pinned path into a scoped handle;
//! - handle methods query metadata and step through map contents.
//!
//! All backends implement these traits, so the engines can run against the
//! live kernel or [`InMemoryKernel`](crate::InMemoryKernel) unchanged.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};

use bpfscope_core::{MapId, ProgramId};

use crate::error::KernelError;

/// Wall clock and time since boot, sampled together.
///
/// Program load times are reported relative to boot; converting them to
/// wall-clock time needs both readings from the same instant. `since_boot`
/// is `None` when the boot clock could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSample {
    pub wall: DateTime<Utc>,
    pub since_boot: Option<Duration>,
}

/// Program metadata as the kernel reports it.
///
/// Optional fields are the ones a backend may be unable to provide.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawProgramInfo {
    pub prog_type: u32,
    /// 0 when the kernel did not report an ID.
    pub id: u32,
    pub tag: [u8; 8],
    pub name: String,
    pub gpl_compatible: Option<bool>,
    /// Load time measured from boot.
    pub load_time: Option<Duration>,
    pub created_by_uid: Option<u32>,
    pub xlated_len: Option<u32>,
    pub jited_len: Option<u32>,
    pub memlock: Option<u64>,
    pub map_ids: Vec<u32>,
}

/// Map metadata as the kernel reports it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawMapInfo {
    pub map_type: u32,
    /// 0 when the kernel did not report an ID.
    pub id: u32,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub flags: u32,
    pub name: String,
    pub memlock: Option<u64>,
}

/// An open reference to a loaded program. Dropping it releases the
/// kernel-side reference.
pub trait ProgramHandle {
    fn info(&self) -> Result<RawProgramInfo, KernelError>;
}

/// An open reference to a map. Dropping it releases the kernel-side
/// reference.
pub trait MapHandle {
    fn info(&self) -> Result<RawMapInfo, KernelError>;

    /// Length of every key buffer passed to this handle.
    fn key_len(&self) -> usize;

    /// Bytes one lookup writes. Equals the value size except for per-CPU
    /// maps, which return one 8-byte-aligned slot per possible CPU.
    fn value_len(&self) -> usize;

    /// Copies the value stored under `key` into `value`.
    ///
    /// `key` must be `key_len()` bytes and `value` `value_len()` bytes.
    /// An absent key is [`KernelError::NotFound`].
    fn lookup(&self, key: &[u8], value: &mut [u8]) -> Result<(), KernelError>;

    /// Writes the key following `key` (or the first key when `None`) into
    /// `next`.
    ///
    /// No following key is [`KernelError::EndOfSequence`], whether the map
    /// is empty or `key` was the last one.
    fn next_key(&self, key: Option<&[u8]>, next: &mut [u8]) -> Result<(), KernelError>;
}

/// The storage-independent contract over a BPF subsystem.
pub trait Kernel: Send + Sync {
    type Program: ProgramHandle;
    type Map: MapHandle;

    /// Smallest live program ID greater than `after`.
    fn next_program_id(&self, after: ProgramId) -> Result<ProgramId, KernelError>;

    /// Smallest live map ID greater than `after`.
    fn next_map_id(&self, after: MapId) -> Result<MapId, KernelError>;

    fn open_program(&self, id: ProgramId) -> Result<Self::Program, KernelError>;

    /// Opens the program pinned at `path`. A path pinning anything else is
    /// [`KernelError::WrongObjectType`].
    fn open_pinned_program(&self, path: &Path) -> Result<Self::Program, KernelError>;

    fn open_map(&self, id: MapId) -> Result<Self::Map, KernelError>;

    /// Opens the map pinned at `path`. A path pinning anything else is
    /// [`KernelError::WrongObjectType`].
    fn open_pinned_map(&self, path: &Path) -> Result<Self::Map, KernelError>;

    fn sample_clock(&self) -> ClockSample;
}
