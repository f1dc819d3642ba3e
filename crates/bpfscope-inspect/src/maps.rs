//! MapService: map enumeration, single-key access and full iteration.
//!
//! Maps have no snapshot primitive. A dump walks next-key/lookup pairs over
//! live contents, so concurrent writers may cause keys to be missed or seen
//! twice; a walk that clearly runs away is aborted instead of looping.

use std::path::Path;
use std::sync::Arc;

use bpfscope_core::{InspectError, MapEntry, MapId, MapRecord, MapRef};
use bpfscope_sys::{Kernel, KernelError, MapCursor, MapHandle};

use crate::classify::{call_error, open_error};
use crate::extract;
use crate::pins::PinScanner;
use crate::walk::walk_ids;

/// Where a next-key query starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor<'k> {
    /// Ask for the first key.
    Start,
    /// Ask for the key following this one.
    After(&'k [u8]),
}

/// Result of a next-key query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStep {
    /// First key of the map, answering [`Cursor::Start`].
    First(Vec<u8>),
    /// Key following the cursor key.
    Next(Vec<u8>),
    /// [`Cursor::Start`] on a map with no keys.
    MapEmpty,
    /// The cursor key was the last one.
    NoMoreKeys,
}

/// The map enumeration and iteration engine.
pub struct MapService<K: Kernel> {
    kernel: Arc<K>,
}

impl<K: Kernel> MapService<K> {
    pub fn new(kernel: Arc<K>) -> Self {
        MapService { kernel }
    }

    /// Lists every map, ascending by ID. See
    /// [`ProgramService::list`](crate::ProgramService::list) for the
    /// discard and failure rules, which are identical.
    pub fn list(&self) -> Result<Vec<MapRecord>, InspectError> {
        let mut records = Vec::new();
        walk_ids(
            MapId::SENTINEL,
            "maps",
            |after| self.kernel.next_map_id(after),
            |id| match self.get_by_id(id) {
                Ok(record) => records.push(record),
                // Freed between discovery and open.
                Err(e) => tracing::debug!(%id, error = %e, "skipping map"),
            },
        )?;
        Ok(records)
    }

    pub fn get_by_id(&self, id: MapId) -> Result<MapRecord, InspectError> {
        let handle = self.open(id)?;
        Self::record(&handle, &format!("map {}", id))
    }

    /// All maps named `name`. Names are not unique.
    pub fn get_by_name(&self, name: &str) -> Result<Vec<MapRecord>, InspectError> {
        Ok(self
            .list_loaded()?
            .into_iter()
            .filter(|m| m.name == name)
            .collect())
    }

    pub fn get_by_pinned_path(&self, path: &Path) -> Result<MapRecord, InspectError> {
        let subject = format!("map pinned at {}", path.display());
        let handle = self
            .kernel
            .open_pinned_map(path)
            .map_err(|e| open_error(e, &subject))?;
        Self::record(&handle, &subject)
    }

    /// Resolves a reference to the maps it names. Name references may
    /// yield none.
    pub fn show(&self, reference: &MapRef) -> Result<Vec<MapRecord>, InspectError> {
        match reference {
            MapRef::Id(id) => self.get_by_id(*id).map(|m| vec![m]),
            MapRef::Name(name) => self.get_by_name(name),
            MapRef::Pinned(path) => self.get_by_pinned_path(path).map(|m| vec![m]),
        }
    }

    /// Resolves a reference to exactly one map.
    ///
    /// A name shared by several maps resolves to the lowest ID.
    pub fn resolve(&self, reference: &MapRef) -> Result<MapRecord, InspectError> {
        match reference {
            MapRef::Id(id) => self.get_by_id(*id),
            MapRef::Pinned(path) => self.get_by_pinned_path(path),
            MapRef::Name(name) => self
                .get_by_name(name)?
                .into_iter()
                .next()
                .ok_or_else(|| InspectError::not_found(reference.to_string())),
        }
    }

    pub fn attach_pins(&self, records: &mut [MapRecord], pins: &PinScanner<K>) {
        for record in records {
            record.pinned_paths = pins.map_pins(record.id);
        }
    }

    /// Copies every entry of the map, in kernel iteration order.
    ///
    /// All or nothing: a failure mid-walk discards what was read so far.
    pub fn dump(&self, id: MapId) -> Result<Vec<MapEntry>, InspectError> {
        let operation = format!("dumping map {}", id);
        let handle = self.open(id)?;
        let info = handle.info().map_err(|e| call_error(e, &operation))?;

        let mut cursor = MapCursor::new(&handle, info.max_entries);
        let mut entries = Vec::new();
        while let Some((key, value)) = cursor.next_entry().map_err(|e| call_error(e, &operation))? {
            entries.push(MapEntry::copied(key, value));
        }
        tracing::debug!(%id, count = entries.len(), "map dumped");
        Ok(entries)
    }

    /// Returns the value stored under `key`.
    pub fn lookup(&self, id: MapId, key: &[u8]) -> Result<Vec<u8>, InspectError> {
        let handle = self.open(id)?;
        check_key(&handle, key)?;
        let mut value = vec![0u8; handle.value_len()];
        match handle.lookup(key, &mut value) {
            Ok(()) => Ok(value),
            Err(KernelError::NotFound) => Err(InspectError::KeyNotFound),
            Err(e) => Err(call_error(e, &format!("looking up key in map {}", id))),
        }
    }

    /// One next-key step from `cursor`.
    pub fn next_key(&self, id: MapId, cursor: Cursor<'_>) -> Result<KeyStep, InspectError> {
        let handle = self.open(id)?;
        let prev = match cursor {
            Cursor::Start => None,
            Cursor::After(key) => {
                check_key(&handle, key)?;
                Some(key)
            }
        };

        let mut next = vec![0u8; handle.key_len()];
        match (handle.next_key(prev, &mut next), prev) {
            (Ok(()), None) => Ok(KeyStep::First(next)),
            (Ok(()), Some(_)) => Ok(KeyStep::Next(next)),
            (Err(KernelError::EndOfSequence), None) => Ok(KeyStep::MapEmpty),
            (Err(KernelError::EndOfSequence), Some(_)) => Ok(KeyStep::NoMoreKeys),
            (Err(e), _) => Err(InspectError::OperationFailed {
                operation: format!("getting next key of map {}", id),
                reason: e.to_string(),
            }),
        }
    }

    /// Key-returning form of [`next_key`](Self::next_key). `None` or an
    /// empty key asks for the first key.
    pub fn get_next_key(&self, id: MapId, key: Option<&[u8]>) -> Result<Vec<u8>, InspectError> {
        let cursor = match key {
            Some(k) if !k.is_empty() => Cursor::After(k),
            _ => Cursor::Start,
        };
        match self.next_key(id, cursor)? {
            KeyStep::First(k) | KeyStep::Next(k) => Ok(k),
            KeyStep::MapEmpty => Err(InspectError::MapEmpty),
            KeyStep::NoMoreKeys => Err(InspectError::NoMoreKeys),
        }
    }

    fn list_loaded(&self) -> Result<Vec<MapRecord>, InspectError> {
        match self.list() {
            Err(InspectError::NotFound { .. }) => Ok(Vec::new()),
            other => other,
        }
    }

    fn open(&self, id: MapId) -> Result<K::Map, InspectError> {
        self.kernel
            .open_map(id)
            .map_err(|e| open_error(e, &format!("map {}", id)))
    }

    fn record(handle: &K::Map, subject: &str) -> Result<MapRecord, InspectError> {
        let raw = handle
            .info()
            .map_err(|e| call_error(e, &format!("reading info of {}", subject)))?;
        extract::map_record(raw)
    }
}

fn check_key<H: MapHandle>(handle: &H, key: &[u8]) -> Result<(), InspectError> {
    if key.len() != handle.key_len() {
        return Err(InspectError::invalid_input(format!(
            "key is {} bytes, map expects {}",
            key.len(),
            handle.key_len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpfscope_sys::{FakeMap, InMemoryKernel, MapFault};

    fn service() -> (Arc<InMemoryKernel>, MapService<InMemoryKernel>) {
        let kernel = Arc::new(InMemoryKernel::new());
        (kernel.clone(), MapService::new(kernel))
    }

    fn two_entry_map(kernel: &InMemoryKernel) -> MapId {
        let id = kernel.add_map(FakeMap::hash("pairs", 4, 4, 16));
        kernel
            .insert_entry(id, &[0, 1, 2, 3], &[0x10, 0x11, 0x12, 0x13])
            .unwrap();
        kernel
            .insert_entry(id, &[4, 5, 6, 7], &[0x20, 0x21, 0x22, 0x23])
            .unwrap();
        id
    }

    #[test]
    fn key_walk_scenario() {
        let (kernel, maps) = service();
        let id = two_entry_map(&kernel);

        assert_eq!(
            maps.next_key(id, Cursor::Start).unwrap(),
            KeyStep::First(vec![0, 1, 2, 3])
        );
        assert_eq!(
            maps.next_key(id, Cursor::After(&[0, 1, 2, 3])).unwrap(),
            KeyStep::Next(vec![4, 5, 6, 7])
        );
        assert_eq!(
            maps.next_key(id, Cursor::After(&[4, 5, 6, 7])).unwrap(),
            KeyStep::NoMoreKeys
        );
        assert_eq!(
            maps.lookup(id, &[0, 1, 2, 3]).unwrap(),
            vec![0x10, 0x11, 0x12, 0x13]
        );
        assert_eq!(
            maps.lookup(id, &[0xff; 4]).unwrap_err(),
            InspectError::KeyNotFound
        );
    }

    #[test]
    fn empty_map() {
        let (kernel, maps) = service();
        let id = kernel.add_map(FakeMap::hash("empty", 4, 4, 16));
        assert!(maps.dump(id).unwrap().is_empty());
        assert_eq!(maps.next_key(id, Cursor::Start).unwrap(), KeyStep::MapEmpty);
        assert_eq!(
            maps.get_next_key(id, None).unwrap_err(),
            InspectError::MapEmpty
        );
    }

    #[test]
    fn first_key_is_stable() {
        let (kernel, maps) = service();
        let id = two_entry_map(&kernel);
        let first = maps.next_key(id, Cursor::Start).unwrap();
        assert_eq!(maps.next_key(id, Cursor::Start).unwrap(), first);
    }

    #[test]
    fn get_next_key_errors() {
        let (kernel, maps) = service();
        let id = two_entry_map(&kernel);
        assert_eq!(maps.get_next_key(id, Some(&[])).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(
            maps.get_next_key(id, Some(&[4, 5, 6, 7])).unwrap_err(),
            InspectError::NoMoreKeys
        );
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        let (kernel, maps) = service();
        let id = two_entry_map(&kernel);
        assert!(matches!(
            maps.lookup(id, &[1, 2]),
            Err(InspectError::InvalidInput { .. })
        ));
        assert!(matches!(
            maps.next_key(id, Cursor::After(&[1])),
            Err(InspectError::InvalidInput { .. })
        ));
    }

    #[test]
    fn missing_map_is_not_key_not_found() {
        let (_, maps) = service();
        assert_eq!(
            maps.lookup(MapId(3), &[0; 4]).unwrap_err(),
            InspectError::not_found("map 3")
        );
    }

    #[test]
    fn list_matches_get_by_id() {
        let (kernel, maps) = service();
        two_entry_map(&kernel);
        let mut array = FakeMap::hash("counters", 4, 8, 256);
        array.map_type = 2;
        array.flags = 0x400;
        array.memlock = Some(4096);
        kernel.add_map(array);

        let listed = maps.list().unwrap();
        assert_eq!(listed.len(), 2);
        for record in listed {
            assert_eq!(maps.get_by_id(record.id).unwrap(), record);
        }
    }

    #[test]
    fn absent_id_is_not_found() {
        let (kernel, maps) = service();
        two_entry_map(&kernel);
        assert_eq!(
            maps.get_by_id(MapId(99)).unwrap_err(),
            InspectError::not_found("map 99")
        );
    }

    #[test]
    fn empty_table_is_not_found() {
        let (_, maps) = service();
        assert_eq!(
            maps.list().unwrap_err(),
            InspectError::not_found("loaded maps")
        );
        assert!(maps.get_by_name("x").unwrap().is_empty());
    }

    #[test]
    fn denied_listing() {
        let (kernel, maps) = service();
        two_entry_map(&kernel);
        kernel.deny_access(true);
        assert!(matches!(
            maps.list(),
            Err(InspectError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn dump_count_matches_key_walk() {
        let (kernel, maps) = service();
        let id = kernel.add_map(FakeMap::hash("walk", 2, 1, 64));
        for i in 0..10u8 {
            kernel.insert_entry(id, &[i, i], &[i]).unwrap();
        }

        let mut steps = 0;
        let mut cursor = maps.get_next_key(id, None).unwrap();
        loop {
            steps += 1;
            match maps.get_next_key(id, Some(&cursor)) {
                Ok(next) => cursor = next,
                Err(InspectError::NoMoreKeys) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(maps.dump(id).unwrap().len(), steps);
    }

    #[test]
    fn dump_failure_discards_partial_result() {
        let (kernel, maps) = service();
        let id = two_entry_map(&kernel);
        kernel.inject_map_fault(
            id,
            MapFault::NextKey {
                after_steps: 1,
                errno: libc::EIO,
            },
        );
        assert!(matches!(
            maps.dump(id),
            Err(InspectError::OperationFailed { .. })
        ));
    }

    #[test]
    fn lookup_denial() {
        let (kernel, maps) = service();
        let id = two_entry_map(&kernel);
        kernel.inject_map_fault(id, MapFault::Lookup { errno: libc::EPERM });
        assert!(matches!(
            maps.lookup(id, &[0, 1, 2, 3]),
            Err(InspectError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn resolve_by_name_picks_lowest_id() {
        let (kernel, maps) = service();
        let first = kernel.add_map(FakeMap::hash("shared", 4, 4, 8));
        kernel.add_map(FakeMap::hash("shared", 4, 4, 8));
        assert_eq!(
            maps.resolve(&MapRef::Name("shared".into())).unwrap().id,
            first
        );
        assert_eq!(
            maps.resolve(&MapRef::Name("absent".into())).unwrap_err(),
            InspectError::not_found("map named absent")
        );
    }

    proptest::proptest! {
        #[test]
        fn dump_returns_every_entry_in_kernel_order(
            entries in proptest::collection::btree_map(
                proptest::prelude::any::<u32>(),
                proptest::prelude::any::<u32>(),
                0..32,
            )
        ) {
            let (kernel, maps) = service();
            let id = kernel.add_map(FakeMap::hash("prop", 4, 4, 64));
            for (key, value) in &entries {
                kernel
                    .insert_entry(id, &key.to_le_bytes(), &value.to_le_bytes())
                    .unwrap();
            }

            let dumped = maps.dump(id).unwrap();
            proptest::prop_assert_eq!(dumped.len(), entries.len());
            for (entry, (key, value)) in dumped.iter().zip(&entries) {
                proptest::prop_assert_eq!(&entry.key, &key.to_le_bytes().to_vec());
                proptest::prop_assert_eq!(&entry.value, &value.to_le_bytes().to_vec());
            }
        }
    }
}
