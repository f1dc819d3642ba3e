//! bpftool-style plain text.

use std::fmt::Write;

use chrono::Local;

use bpfscope_core::{MapEntry, MapRecord, ProgramRecord};

use crate::hex::format_hex_bytes;

/// Timestamp layout of the `loaded_at` field.
pub(crate) const LOADED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

pub(super) fn programs(records: &[ProgramRecord]) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        program(&mut out, record);
    }
    out
}

fn program(out: &mut String, p: &ProgramRecord) {
    let gpl = if p.gpl_compatible { "  gpl" } else { "" };
    let _ = writeln!(out, "{}: {}  name {}  tag {}{}", p.id, p.kind, p.name, p.tag, gpl);

    match p.loaded_at {
        Some(at) => {
            let local = at.with_timezone(&Local).format(LOADED_AT_FORMAT);
            let _ = writeln!(out, "\tloaded_at {}  uid {}", local, p.uid);
        }
        None => {
            let _ = writeln!(out, "\tuid {}", p.uid);
        }
    }

    let _ = write!(
        out,
        "\txlated {}B  jited {}B  memlock {}B",
        p.bytes_xlated, p.bytes_jited, p.bytes_memlock
    );
    if !p.map_ids.is_empty() {
        let ids: Vec<String> = p.map_ids.iter().map(|id| id.to_string()).collect();
        let _ = write!(out, "  map_ids {}", ids.join(","));
    }
    for path in &p.pinned_paths {
        let _ = write!(out, "\n\tpinned {}", path.display());
    }
}

pub(super) fn maps(records: &[MapRecord]) -> String {
    let mut out = String::new();
    for (i, m) in records.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{}: {}  name {}  flags 0x{:x}", m.id, m.kind, m.name, m.flags);
        let _ = write!(
            out,
            "\tkey {}B  value {}B  max_entries {}  memlock {}B",
            m.key_size, m.value_size, m.max_entries, m.bytes_memlock
        );
        for path in &m.pinned_paths {
            let _ = write!(out, "\n\tpinned {}", path.display());
        }
    }
    out
}

pub(super) fn entries(entries: &[MapEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        let _ = writeln!(
            out,
            "key: {}  value: {}",
            format_hex_bytes(&e.key),
            format_hex_bytes(&e.value)
        );
    }
    let plural = if entries.len() == 1 { "" } else { "s" };
    let _ = write!(out, "Found {} element{}", entries.len(), plural);
    out
}

pub(super) fn entry(key: &[u8], value: &[u8]) -> String {
    format!(
        "key: {} value: {}",
        format_hex_bytes(key),
        format_hex_bytes(value)
    )
}

pub(super) fn next_key(key: Option<&[u8]>, next: &[u8]) -> String {
    let mut out = String::new();
    if let Some(key) = key {
        let _ = writeln!(out, "key:\n{}", format_hex_bytes(key));
    }
    let _ = write!(out, "next key:\n{}", format_hex_bytes(next));
    out
}
