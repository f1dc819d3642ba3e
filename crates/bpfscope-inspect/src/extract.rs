//! Raw kernel info to normalized records.
//!
//! Extraction is pure: the same raw info and clock sample always produce the
//! same record. An object whose ID cannot be resolved fails as a whole;
//! every other missing field falls back to zero or false.

use std::time::Duration;

use chrono::{DateTime, Utc};

use bpfscope_core::{
    map_type_name, program_type_name, InspectError, MapId, MapRecord, ProgramId, ProgramRecord,
};
use bpfscope_sys::{ClockSample, RawMapInfo, RawProgramInfo};

/// Builds a [`ProgramRecord`] from kernel info.
pub fn program_record(
    raw: RawProgramInfo,
    clock: &ClockSample,
) -> Result<ProgramRecord, InspectError> {
    if raw.id == 0 {
        return Err(unresolved("program"));
    }
    Ok(ProgramRecord {
        id: ProgramId(raw.id),
        kind: program_type_name(raw.prog_type),
        name: raw.name,
        tag: hex::encode(raw.tag),
        gpl_compatible: raw.gpl_compatible.unwrap_or(false),
        loaded_at: raw.load_time.and_then(|t| wall_clock_load_time(t, clock)),
        uid: raw.created_by_uid.unwrap_or(0),
        bytes_xlated: raw.xlated_len.unwrap_or(0),
        bytes_jited: raw.jited_len.unwrap_or(0),
        bytes_memlock: raw.memlock.unwrap_or(0),
        map_ids: raw.map_ids.into_iter().map(MapId).collect(),
        pinned_paths: Vec::new(),
    })
}

/// Builds a [`MapRecord`] from kernel info.
pub fn map_record(raw: RawMapInfo) -> Result<MapRecord, InspectError> {
    if raw.id == 0 {
        return Err(unresolved("map"));
    }
    Ok(MapRecord {
        id: MapId(raw.id),
        kind: map_type_name(raw.map_type),
        name: raw.name,
        key_size: raw.key_size,
        value_size: raw.value_size,
        max_entries: raw.max_entries,
        flags: raw.flags,
        bytes_memlock: raw.memlock.unwrap_or(0),
        pinned_paths: Vec::new(),
    })
}

/// Converts a since-boot load time to wall-clock time.
///
/// Computed as `wall - (since_boot - load_time)`. Suspend time and clock
/// adjustments make this an approximation. Without a boot-clock reading
/// there is no load time.
pub fn wall_clock_load_time(load_time: Duration, clock: &ClockSample) -> Option<DateTime<Utc>> {
    let age = clock.since_boot?.saturating_sub(load_time);
    let age = chrono::Duration::from_std(age).ok()?;
    clock.wall.checked_sub_signed(age)
}

fn unresolved(what: &str) -> InspectError {
    InspectError::OperationFailed {
        operation: format!("reading {} info", what),
        reason: "kernel reported no ID".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn clock() -> ClockSample {
        ClockSample {
            wall: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            since_boot: Some(Duration::from_secs(3_600)),
        }
    }

    fn raw_program() -> RawProgramInfo {
        RawProgramInfo {
            prog_type: 6,
            id: 42,
            tag: [0xf0, 0x05, 0x5c, 0x08, 0x99, 0x3f, 0xea, 0x1e],
            name: "xdp_pass".into(),
            gpl_compatible: Some(true),
            load_time: Some(Duration::from_secs(3_000)),
            created_by_uid: Some(0),
            xlated_len: Some(96),
            jited_len: Some(64),
            memlock: Some(4096),
            map_ids: vec![3, 9],
        }
    }

    #[test]
    fn program_fields_are_normalized() {
        let record = program_record(raw_program(), &clock()).unwrap();
        assert_eq!(record.id, ProgramId(42));
        assert_eq!(record.kind, "xdp");
        assert_eq!(record.tag, "f0055c08993fea1e");
        assert!(record.gpl_compatible);
        assert_eq!(record.map_ids, vec![MapId(3), MapId(9)]);
        assert_eq!(
            record.loaded_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 11, 50, 0).unwrap())
        );
    }

    #[test]
    fn unreported_fields_default() {
        let raw = RawProgramInfo {
            id: 5,
            prog_type: 999,
            ..RawProgramInfo::default()
        };
        let record = program_record(raw, &clock()).unwrap();
        assert_eq!(record.kind, "type 999");
        assert!(!record.gpl_compatible);
        assert_eq!(record.loaded_at, None);
        assert_eq!(record.bytes_memlock, 0);
        assert!(record.map_ids.is_empty());
    }

    #[test]
    fn missing_id_fails_extraction() {
        let raw = RawProgramInfo {
            id: 0,
            ..raw_program()
        };
        assert!(matches!(
            program_record(raw, &clock()),
            Err(InspectError::OperationFailed { .. })
        ));
        assert!(matches!(
            map_record(RawMapInfo::default()),
            Err(InspectError::OperationFailed { .. })
        ));
    }

    #[test]
    fn map_fields_are_copied() {
        let record = map_record(RawMapInfo {
            map_type: 2,
            id: 7,
            key_size: 4,
            value_size: 8,
            max_entries: 256,
            flags: 0x400,
            name: "counters".into(),
            memlock: None,
        })
        .unwrap();
        assert_eq!(record.kind, "array");
        assert_eq!(record.flags, 0x400);
        assert_eq!(record.bytes_memlock, 0);
    }

    #[test]
    fn load_after_sample_clamps_to_wall() {
        let at = wall_clock_load_time(Duration::from_secs(9_999), &clock());
        assert_eq!(at, Some(clock().wall));
    }

    #[test]
    fn unreadable_boot_clock_omits_load_time() {
        let clock = ClockSample {
            since_boot: None,
            ..clock()
        };
        let record = program_record(raw_program(), &clock).unwrap();
        assert_eq!(record.loaded_at, None);
        assert_eq!(record.id, ProgramId(42));
    }
}
