//! In-memory implementation of [`Kernel`].
//!
//! [`InMemoryKernel`] is a first-class backend for tests and for running the
//! engines where no BPF subsystem is reachable. It reproduces the kernel
//! behaviors the engines depend on:
//! - IDs are allocated ascending and never reused while the kernel lives;
//! - `next_key` with an unknown key restarts at the first key, as the
//!   kernel's hash maps do;
//! - handles keep their object alive after it is removed from the table;
//! - pins resolve by exact path.
//!
//! It also exposes knobs for the races and faults a live kernel produces:
//! IDs that are listed but vanish before they can be opened, blanket
//! permission denial, and injected map faults.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{TimeZone, Utc};

use bpfscope_core::kind::is_per_cpu_map;
use bpfscope_core::{MapId, ProgramId};

use crate::error::{KernelError, ObjectKind};
use crate::traits::{
    ClockSample, Kernel, MapHandle, ProgramHandle, RawMapInfo, RawProgramInfo,
};

/// Program definition registered with [`InMemoryKernel::add_program`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeProgram {
    pub prog_type: u32,
    pub name: String,
    pub tag: [u8; 8],
    pub gpl_compatible: bool,
    /// Load time measured from boot.
    pub load_time: Option<Duration>,
    pub uid: u32,
    pub xlated_len: u32,
    pub jited_len: u32,
    pub memlock: Option<u64>,
    pub map_ids: Vec<MapId>,
}

impl FakeProgram {
    pub fn new(prog_type: u32, name: &str) -> Self {
        FakeProgram {
            prog_type,
            name: name.to_string(),
            tag: [0; 8],
            gpl_compatible: false,
            load_time: None,
            uid: 0,
            xlated_len: 0,
            jited_len: 0,
            memlock: None,
            map_ids: Vec::new(),
        }
    }
}

/// Map definition registered with [`InMemoryKernel::add_map`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeMap {
    pub map_type: u32,
    pub name: String,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
    pub flags: u32,
    pub memlock: Option<u64>,
}

impl FakeMap {
    /// A `BPF_MAP_TYPE_HASH` map.
    pub fn hash(name: &str, key_size: u32, value_size: u32, max_entries: u32) -> Self {
        FakeMap {
            map_type: 1,
            name: name.to_string(),
            key_size,
            value_size,
            max_entries,
            flags: 0,
            memlock: None,
        }
    }
}

/// A fault injected into one map's primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapFault {
    /// Every `next_key` call after the first `after_steps` fails with `errno`.
    NextKey { after_steps: usize, errno: i32 },
    /// Every lookup fails with `errno`.
    Lookup { errno: i32 },
    /// `key` is still walked by `next_key` but lookups report it missing,
    /// as if it was deleted between the two calls.
    LookupVanishes { key: Vec<u8> },
}

#[derive(Debug)]
struct StoredProgram {
    id: ProgramId,
    def: FakeProgram,
}

#[derive(Debug)]
struct StoredMap {
    id: MapId,
    def: FakeMap,
    /// Entries in kernel iteration order.
    entries: RwLock<Vec<(Vec<u8>, Vec<u8>)>>,
    fault: RwLock<Option<MapFault>>,
    next_key_calls: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pin {
    Program(ProgramId),
    Map(MapId),
    Other,
}

#[derive(Debug)]
struct KernelState {
    programs: BTreeMap<ProgramId, Arc<StoredProgram>>,
    maps: BTreeMap<MapId, Arc<StoredMap>>,
    pins: HashMap<PathBuf, Pin>,
    vanishing_programs: BTreeSet<ProgramId>,
    vanishing_maps: BTreeSet<MapId>,
    denied: bool,
    last_program_id: u32,
    last_map_id: u32,
    clock: ClockSample,
    possible_cpus: usize,
}

/// In-memory implementation of [`Kernel`].
#[derive(Debug)]
pub struct InMemoryKernel {
    state: RwLock<KernelState>,
    pinned_opens: AtomicUsize,
}

impl InMemoryKernel {
    /// Creates an empty kernel whose clock reads a fixed instant, ten
    /// thousand seconds after boot.
    pub fn new() -> Self {
        let wall = Utc
            .timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap_or_default();
        InMemoryKernel {
            state: RwLock::new(KernelState {
                programs: BTreeMap::new(),
                maps: BTreeMap::new(),
                pins: HashMap::new(),
                vanishing_programs: BTreeSet::new(),
                vanishing_maps: BTreeSet::new(),
                denied: false,
                last_program_id: 0,
                last_map_id: 0,
                clock: ClockSample {
                    wall,
                    since_boot: Some(Duration::from_secs(10_000)),
                },
                possible_cpus: 1,
            }),
            pinned_opens: AtomicUsize::new(0),
        }
    }

    /// Number of open-by-path calls made so far, successful or not.
    pub fn pinned_opens(&self) -> usize {
        self.pinned_opens.load(Ordering::SeqCst)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, KernelState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, KernelState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads a program and returns its newly assigned ID.
    pub fn add_program(&self, def: FakeProgram) -> ProgramId {
        let mut state = self.write();
        state.last_program_id += 1;
        let id = ProgramId(state.last_program_id);
        state
            .programs
            .insert(id, Arc::new(StoredProgram { id, def }));
        id
    }

    /// Creates a map and returns its newly assigned ID.
    pub fn add_map(&self, def: FakeMap) -> MapId {
        let mut state = self.write();
        state.last_map_id += 1;
        let id = MapId(state.last_map_id);
        state.maps.insert(
            id,
            Arc::new(StoredMap {
                id,
                def,
                entries: RwLock::new(Vec::new()),
                fault: RwLock::new(None),
                next_key_calls: AtomicUsize::new(0),
            }),
        );
        id
    }

    /// Removes a program from the ID table. Open handles keep working.
    pub fn remove_program(&self, id: ProgramId) {
        self.write().programs.remove(&id);
    }

    /// Removes a map from the ID table. Open handles keep working.
    pub fn remove_map(&self, id: MapId) {
        self.write().maps.remove(&id);
    }

    /// Inserts or overwrites an entry. New keys go to the end of the
    /// iteration order.
    pub fn insert_entry(&self, map: MapId, key: &[u8], value: &[u8]) -> Result<(), KernelError> {
        let stored = self.stored_map(map)?;
        if key.len() != stored.def.key_size as usize || value.len() != stored.def.value_size as usize {
            return Err(KernelError::Other {
                errno: libc::EINVAL,
            });
        }
        let mut entries = stored.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter_mut().find(|(k, _)| k.as_slice() == key) {
            Some((_, v)) => *v = value.to_vec(),
            None => entries.push((key.to_vec(), value.to_vec())),
        }
        Ok(())
    }

    /// Deletes an entry. Deleting an absent key is [`KernelError::NotFound`].
    pub fn delete_entry(&self, map: MapId, key: &[u8]) -> Result<(), KernelError> {
        let stored = self.stored_map(map)?;
        let mut entries = stored.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(k, _)| k.as_slice() != key);
        if entries.len() == before {
            return Err(KernelError::NotFound);
        }
        Ok(())
    }

    pub fn pin_program(&self, path: impl Into<PathBuf>, id: ProgramId) {
        self.write().pins.insert(path.into(), Pin::Program(id));
    }

    pub fn pin_map(&self, path: impl Into<PathBuf>, id: MapId) {
        self.write().pins.insert(path.into(), Pin::Map(id));
    }

    /// Pins an object that is neither a program nor a map, such as a link.
    pub fn pin_other(&self, path: impl Into<PathBuf>) {
        self.write().pins.insert(path.into(), Pin::Other);
    }

    /// Keeps `id` visible to the ID walk but makes every open fail, as when
    /// a program is unloaded between discovery and open.
    pub fn vanish_program_on_open(&self, id: ProgramId) {
        self.write().vanishing_programs.insert(id);
    }

    /// Map counterpart of [`vanish_program_on_open`](Self::vanish_program_on_open).
    pub fn vanish_map_on_open(&self, id: MapId) {
        self.write().vanishing_maps.insert(id);
    }

    /// Makes every ID walk and open fail with [`KernelError::PermissionDenied`].
    pub fn deny_access(&self, denied: bool) {
        self.write().denied = denied;
    }

    pub fn inject_map_fault(&self, map: MapId, fault: MapFault) {
        if let Some(stored) = self.read().maps.get(&map) {
            *stored.fault.write().unwrap_or_else(PoisonError::into_inner) = Some(fault);
        }
    }

    pub fn set_clock(&self, clock: ClockSample) {
        self.write().clock = clock;
    }

    /// Number of CPUs per-CPU maps hold a value slot for.
    pub fn set_possible_cpus(&self, cpus: usize) {
        self.write().possible_cpus = cpus.max(1);
    }

    fn stored_map(&self, id: MapId) -> Result<Arc<StoredMap>, KernelError> {
        self.read()
            .maps
            .get(&id)
            .cloned()
            .ok_or(KernelError::NotFound)
    }

    fn check_access(state: &KernelState) -> Result<(), KernelError> {
        if state.denied {
            return Err(KernelError::PermissionDenied);
        }
        Ok(())
    }

    fn resolve_pin(&self, path: &Path, expected: ObjectKind) -> Result<Pin, KernelError> {
        self.pinned_opens.fetch_add(1, Ordering::SeqCst);
        let state = self.read();
        Self::check_access(&state)?;
        let pin = *state.pins.get(path).ok_or(KernelError::NotFound)?;
        let found = match pin {
            Pin::Program(_) => ObjectKind::Program,
            Pin::Map(_) => ObjectKind::Map,
            Pin::Other => ObjectKind::Other,
        };
        if found != expected {
            return Err(KernelError::WrongObjectType { expected, found });
        }
        Ok(pin)
    }

    fn handle_for_map(&self, stored: Arc<StoredMap>) -> MemoryMap {
        let possible_cpus = self.read().possible_cpus;
        let (slot_len, value_len) = if is_per_cpu_map(stored.def.map_type) {
            let slot = per_cpu_slot_len(stored.def.value_size);
            (slot, slot * possible_cpus)
        } else {
            (stored.def.value_size as usize, stored.def.value_size as usize)
        };
        MemoryMap {
            stored,
            slot_len,
            value_len,
        }
    }
}

impl Default for InMemoryKernel {
    fn default() -> Self {
        Self::new()
    }
}

fn per_cpu_slot_len(value_size: u32) -> usize {
    (value_size as usize + 7) & !7
}

/// Handle to a program in an [`InMemoryKernel`].
#[derive(Debug, Clone)]
pub struct MemoryProgram {
    stored: Arc<StoredProgram>,
}

/// Handle to a map in an [`InMemoryKernel`].
#[derive(Debug, Clone)]
pub struct MemoryMap {
    stored: Arc<StoredMap>,
    /// Bytes per CPU slot; the whole value for ordinary maps.
    slot_len: usize,
    value_len: usize,
}

impl ProgramHandle for MemoryProgram {
    fn info(&self) -> Result<RawProgramInfo, KernelError> {
        let def = &self.stored.def;
        Ok(RawProgramInfo {
            prog_type: def.prog_type,
            id: self.stored.id.0,
            tag: def.tag,
            name: def.name.clone(),
            gpl_compatible: Some(def.gpl_compatible),
            load_time: def.load_time,
            created_by_uid: Some(def.uid),
            xlated_len: Some(def.xlated_len),
            jited_len: Some(def.jited_len),
            memlock: def.memlock,
            map_ids: def.map_ids.iter().map(|m| m.0).collect(),
        })
    }
}

impl MapHandle for MemoryMap {
    fn info(&self) -> Result<RawMapInfo, KernelError> {
        let def = &self.stored.def;
        Ok(RawMapInfo {
            map_type: def.map_type,
            id: self.stored.id.0,
            key_size: def.key_size,
            value_size: def.value_size,
            max_entries: def.max_entries,
            flags: def.flags,
            name: def.name.clone(),
            memlock: def.memlock,
        })
    }

    fn key_len(&self) -> usize {
        self.stored.def.key_size as usize
    }

    fn value_len(&self) -> usize {
        self.value_len
    }

    fn lookup(&self, key: &[u8], value: &mut [u8]) -> Result<(), KernelError> {
        if key.len() != self.key_len() || value.len() != self.value_len {
            return Err(KernelError::Other {
                errno: libc::EINVAL,
            });
        }
        match &*self.stored.fault.read().unwrap_or_else(PoisonError::into_inner) {
            Some(MapFault::Lookup { errno }) => {
                return Err(KernelError::from_access_errno(*errno));
            }
            Some(MapFault::LookupVanishes { key: gone }) if gone.as_slice() == key => {
                return Err(KernelError::NotFound);
            }
            _ => {}
        }

        let entries = self.stored.entries.read().unwrap_or_else(PoisonError::into_inner);
        let (_, stored) = entries
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .ok_or(KernelError::NotFound)?;
        // Per-CPU entries hold one value; every CPU slot reports it.
        value.fill(0);
        for slot in value.chunks_mut(self.slot_len.max(1)) {
            let n = slot.len().min(stored.len());
            slot[..n].copy_from_slice(&stored[..n]);
        }
        Ok(())
    }

    fn next_key(&self, key: Option<&[u8]>, next: &mut [u8]) -> Result<(), KernelError> {
        if next.len() != self.key_len() || key.is_some_and(|k| k.len() != self.key_len()) {
            return Err(KernelError::Other {
                errno: libc::EINVAL,
            });
        }
        let calls = self.stored.next_key_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(MapFault::NextKey { after_steps, errno }) =
            &*self.stored.fault.read().unwrap_or_else(PoisonError::into_inner)
        {
            if calls >= *after_steps {
                return Err(KernelError::from_walk_errno(*errno));
            }
        }

        let entries = self.stored.entries.read().unwrap_or_else(PoisonError::into_inner);
        let position = match key {
            None => 0,
            Some(current) => match entries.iter().position(|(k, _)| k.as_slice() == current) {
                Some(index) => index + 1,
                // Unknown keys restart the walk.
                None => 0,
            },
        };
        let (found, _) = entries.get(position).ok_or(KernelError::EndOfSequence)?;
        next.copy_from_slice(found);
        Ok(())
    }
}

impl Kernel for InMemoryKernel {
    type Program = MemoryProgram;
    type Map = MemoryMap;

    fn next_program_id(&self, after: ProgramId) -> Result<ProgramId, KernelError> {
        let state = self.read();
        Self::check_access(&state)?;
        state
            .programs
            .range(ProgramId(after.0.saturating_add(1))..)
            .next()
            .filter(|_| after.0 < u32::MAX)
            .map(|(id, _)| *id)
            .ok_or(KernelError::EndOfSequence)
    }

    fn next_map_id(&self, after: MapId) -> Result<MapId, KernelError> {
        let state = self.read();
        Self::check_access(&state)?;
        state
            .maps
            .range(MapId(after.0.saturating_add(1))..)
            .next()
            .filter(|_| after.0 < u32::MAX)
            .map(|(id, _)| *id)
            .ok_or(KernelError::EndOfSequence)
    }

    fn open_program(&self, id: ProgramId) -> Result<MemoryProgram, KernelError> {
        let state = self.read();
        Self::check_access(&state)?;
        if state.vanishing_programs.contains(&id) {
            return Err(KernelError::NotFound);
        }
        let stored = state.programs.get(&id).cloned().ok_or(KernelError::NotFound)?;
        Ok(MemoryProgram { stored })
    }

    fn open_pinned_program(&self, path: &Path) -> Result<MemoryProgram, KernelError> {
        let Pin::Program(id) = self.resolve_pin(path, ObjectKind::Program)? else {
            return Err(KernelError::NotFound);
        };
        self.open_program(id)
    }

    fn open_map(&self, id: MapId) -> Result<MemoryMap, KernelError> {
        let stored = {
            let state = self.read();
            Self::check_access(&state)?;
            if state.vanishing_maps.contains(&id) {
                return Err(KernelError::NotFound);
            }
            state.maps.get(&id).cloned().ok_or(KernelError::NotFound)?
        };
        Ok(self.handle_for_map(stored))
    }

    fn open_pinned_map(&self, path: &Path) -> Result<MemoryMap, KernelError> {
        let Pin::Map(id) = self.resolve_pin(path, ObjectKind::Map)? else {
            return Err(KernelError::NotFound);
        };
        self.open_map(id)
    }

    fn sample_clock(&self) -> ClockSample {
        self.read().clock
    }
}
