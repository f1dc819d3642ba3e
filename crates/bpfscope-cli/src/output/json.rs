//! JSON views. Field names follow bpftool's JSON output; byte strings are
//! arrays of `"0x.."` strings.

use std::path::PathBuf;

use chrono::Local;
use serde::Serialize;

use bpfscope_core::{MapEntry, MapId, MapRecord, ProgramId, ProgramRecord};

use super::plain::LOADED_AT_FORMAT;

#[derive(Debug, Serialize)]
pub(super) struct ProgramView<'a> {
    id: ProgramId,
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
    tag: &'a str,
    gpl_compatible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    loaded_at: Option<String>,
    uid: u32,
    bytes_xlated: u32,
    bytes_jited: u32,
    bytes_memlock: u64,
    #[serde(skip_serializing_if = "<[MapId]>::is_empty")]
    map_ids: &'a [MapId],
    #[serde(skip_serializing_if = "<[PathBuf]>::is_empty")]
    pinned: &'a [PathBuf],
}

#[derive(Debug, Serialize)]
pub(super) struct Programs<'a> {
    programs: Vec<ProgramView<'a>>,
}

#[derive(Debug, Serialize)]
pub(super) struct MapView<'a> {
    id: MapId,
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
    key_size: u32,
    value_size: u32,
    max_entries: u32,
    flags: u32,
    bytes_memlock: u64,
    #[serde(skip_serializing_if = "<[PathBuf]>::is_empty")]
    pinned: &'a [PathBuf],
}

#[derive(Debug, Serialize)]
pub(super) struct Maps<'a> {
    maps: Vec<MapView<'a>>,
}

#[derive(Debug, Serialize)]
pub(super) struct EntryView {
    key: Vec<String>,
    value: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct Entries {
    entries: Vec<EntryView>,
    count: usize,
}

#[derive(Debug, Serialize)]
pub(super) struct NextKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<Vec<String>>,
    next_key: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ErrorView<'a> {
    error: &'a str,
}

fn byte_strings(bytes: &[u8]) -> Vec<String> {
    bytes.iter().map(|b| format!("0x{:02x}", b)).collect()
}

pub(super) fn programs(records: &[ProgramRecord]) -> Programs<'_> {
    Programs {
        programs: records
            .iter()
            .map(|p| ProgramView {
                id: p.id,
                kind: &p.kind,
                name: &p.name,
                tag: &p.tag,
                gpl_compatible: p.gpl_compatible,
                loaded_at: p.loaded_at.map(|at| {
                    at.with_timezone(&Local)
                        .format(LOADED_AT_FORMAT)
                        .to_string()
                }),
                uid: p.uid,
                bytes_xlated: p.bytes_xlated,
                bytes_jited: p.bytes_jited,
                bytes_memlock: p.bytes_memlock,
                map_ids: &p.map_ids,
                pinned: &p.pinned_paths,
            })
            .collect(),
    }
}

pub(super) fn maps(records: &[MapRecord]) -> Maps<'_> {
    Maps {
        maps: records
            .iter()
            .map(|m| MapView {
                id: m.id,
                kind: &m.kind,
                name: &m.name,
                key_size: m.key_size,
                value_size: m.value_size,
                max_entries: m.max_entries,
                flags: m.flags,
                bytes_memlock: m.bytes_memlock,
                pinned: &m.pinned_paths,
            })
            .collect(),
    }
}

pub(super) fn entry(key: &[u8], value: &[u8]) -> EntryView {
    EntryView {
        key: byte_strings(key),
        value: byte_strings(value),
    }
}

pub(super) fn entries(entries: &[MapEntry]) -> Entries {
    Entries {
        entries: entries.iter().map(|e| entry(&e.key, &e.value)).collect(),
        count: entries.len(),
    }
}

pub(super) fn next_key(key: Option<&[u8]>, next: &[u8]) -> NextKey {
    NextKey {
        key: key.map(byte_strings),
        next_key: byte_strings(next),
    }
}

pub(super) fn error(message: &str) -> ErrorView<'_> {
    ErrorView { error: message }
}
